//! Catalog configuration loaded from TOML.
//!
//! # Responsibility
//! - Describe the base URI, logging, search, job and tenant settings.
//! - Provide defaults matching the built-in tenant models.
//!
//! # Invariants
//! - A config returned by `from_toml_str` or `load` has passed `validate()`.
//!
//! # See also
//! - `model::factory::ModelRegistry::define_tenant_models`

use crate::similarity::SimilaritySettings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(toml::de::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "cannot read {}: {source}", path.display()),
            Self::Parse(err) => write!(f, "invalid catalog config: {err}"),
            Self::Invalid(message) => write!(f, "invalid catalog config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Log directory; logging stays off when unset.
    pub dir: Option<PathBuf>,
    /// Size at which the active log file is rotated.
    pub max_file_bytes: u64,
    /// Rotated files kept on disk.
    pub keep_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: crate::logging::default_log_level().to_string(),
            dir: None,
            max_file_bytes: 10 * 1024 * 1024,
            keep_files: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Similarity hits must score strictly above this value.
    pub min_score: f64,
    pub limit: usize,
}

impl SearchConfig {
    pub fn settings(&self) -> SimilaritySettings {
        SimilaritySettings {
            min_score: self.min_score,
            limit: self.limit,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_score: 0.0,
            limit: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    pub max_attempts: u32,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// One model defined for a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    pub vocabularies: Vec<String>,
    /// `prefix.Local` type references.
    pub types: Vec<String>,
}

impl ModelConfig {
    fn new(name: &str, vocabularies: &[&str], types: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            vocabularies: vocabularies.iter().map(|v| v.to_string()).collect(),
            types: types.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// Resource, Concept and Agent models every tenant starts with.
pub fn default_models() -> Vec<ModelConfig> {
    vec![
        ModelConfig::new(
            "Resource",
            &["dc", "mods", "bibo"],
            &["dc.BibliographicResource", "mods.ModsResource", "bibo.Document"],
        ),
        ModelConfig::new("Concept", &["skos", "mads"], &["skos.Concept", "mads.Concept"]),
        ModelConfig::new("Agent", &["foaf", "vcard"], &["foaf.Agent", "vcard.Agent"]),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantConfig {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "default_models")]
    pub models: Vec<ModelConfig>,
}

impl TenantConfig {
    /// Tenant with the default models.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            models: default_models(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Base URL used for graph and linked-data export.
    pub base_uri: String,
    pub logging: LoggingConfig,
    pub search: SearchConfig,
    pub jobs: JobsConfig,
    pub tenants: Vec<TenantConfig>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_uri: "http://localhost".to_string(),
            logging: LoggingConfig::default(),
            search: SearchConfig::default(),
            jobs: JobsConfig::default(),
            tenants: Vec::new(),
        }
    }
}

impl CatalogConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.base_uri.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "base_uri must be an http(s) URL, got `{}`",
                self.base_uri
            )));
        }
        if self.logging.max_file_bytes == 0 || self.logging.keep_files == 0 {
            return Err(ConfigError::Invalid(
                "logging.max_file_bytes and logging.keep_files must be positive".to_string(),
            ));
        }
        if !self.search.min_score.is_finite() || self.search.min_score < 0.0 {
            return Err(ConfigError::Invalid(
                "search.min_score must be a non-negative number".to_string(),
            ));
        }
        if self.search.limit == 0 {
            return Err(ConfigError::Invalid("search.limit must be positive".to_string()));
        }
        if self.jobs.max_attempts == 0 {
            return Err(ConfigError::Invalid("jobs.max_attempts must be positive".to_string()));
        }

        let mut seen = BTreeSet::new();
        for tenant in &self.tenants {
            if tenant.id.is_empty() || !tenant.id.chars().all(|ch| ch.is_ascii_alphanumeric()) {
                return Err(ConfigError::Invalid(format!(
                    "tenant id must be alphanumeric, got `{}`",
                    tenant.id
                )));
            }
            if !seen.insert(tenant.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate tenant id `{}`", tenant.id)));
            }
            for model in &tenant.models {
                if model.vocabularies.is_empty() || model.types.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "model `{}` of tenant `{}` needs vocabularies and types",
                        model.name, tenant.id
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn tenant(&self, id: &str) -> Option<&TenantConfig> {
        self.tenants.iter().find(|tenant| tenant.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::{CatalogConfig, ConfigError};

    #[test]
    fn empty_document_uses_defaults() {
        let config = CatalogConfig::from_toml_str("").unwrap();
        assert_eq!(config, CatalogConfig::default());
        assert_eq!(config.search.limit, 20);
        assert_eq!(config.jobs.max_attempts, 3);
    }

    #[test]
    fn tenants_get_default_models_unless_listed() {
        let config = CatalogConfig::from_toml_str(
            r#"
            base_uri = "https://catalog.example.org"

            [search]
            min_score = 0.5

            [[tenants]]
            id = "1"
            email = "library@example.org"

            [[tenants]]
            id = "2"

            [[tenants.models]]
            name = "Work"
            vocabularies = ["dc"]
            types = ["dc.BibliographicResource"]
            "#,
        )
        .unwrap();

        assert_eq!(config.search.min_score, 0.5);
        let first = config.tenant("1").unwrap();
        let names: Vec<&str> = first.models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Resource", "Concept", "Agent"]);
        assert_eq!(config.tenant("2").unwrap().models[0].name, "Work");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = CatalogConfig::from_toml_str("base_uri = \"ftp://x\"").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = CatalogConfig::from_toml_str("[[tenants]]\nid = \"1\"\n[[tenants]]\nid = \"1\"")
            .unwrap_err();
        assert!(err.to_string().contains("duplicate tenant"));

        let err = CatalogConfig::from_toml_str("[logging]\nkeep_files = 0").unwrap_err();
        assert!(err.to_string().contains("keep_files"));

        let err = CatalogConfig::from_toml_str("[search]\nlimit = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reads_file_and_reports_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ladder.toml");
        std::fs::write(&path, "[jobs]\nmax_attempts = 5\n").unwrap();
        assert_eq!(CatalogConfig::load(&path).unwrap().jobs.max_attempts, 5);

        let missing = dir.path().join("absent.toml");
        assert!(matches!(
            CatalogConfig::load(&missing),
            Err(ConfigError::Io { .. })
        ));
    }
}
