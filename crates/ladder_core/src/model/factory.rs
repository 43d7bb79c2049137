//! Dynamic model factory and per-tenant model registry.
//!
//! # Responsibility
//! - Define record models at runtime from loosely specified input.
//! - Keep an explicit `(namespace, name)` registry of model descriptors.
//!
//! # Invariants
//! - Defining an already registered model returns the existing descriptor.
//! - Invalid input never leaves a partial registration behind.
//! - Removing a model also drops its cached index mapping.

use crate::config::TenantConfig;
use crate::model::descriptor::{ModelDescriptor, ModelKey, VocabBinding};
use crate::search::mapping::{IndexMapping, MappingCache};
use crate::vocab::VocabularyRegistry;
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex must compile"));

/// Input of [`ModelRegistry::define_model`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDefinition {
    pub name: String,
    pub namespace: String,
    /// Vocabulary prefixes, e.g. `dc`.
    pub vocabularies: Vec<String>,
    /// Type references in `prefix.Local` form, e.g. `dc.BibliographicResource`.
    pub types: Vec<String>,
}

impl ModelDefinition {
    pub fn new<V, T>(
        name: impl Into<String>,
        namespace: impl Into<String>,
        vocabularies: V,
        types: T,
    ) -> Self
    where
        V: IntoIterator,
        V::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            vocabularies: vocabularies.into_iter().map(Into::into).collect(),
            types: types.into_iter().map(Into::into).collect(),
        }
    }

    /// Reads `{name, namespace|module, vocabularies|vocabs, types}`.
    pub fn from_json(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let name = object.get("name")?.as_str()?;
        let namespace = object
            .get("namespace")
            .or_else(|| object.get("module"))?
            .as_str()?;
        let vocabularies = string_list(object.get("vocabularies").or_else(|| object.get("vocabs"))?)?;
        let types = string_list(object.get("types")?)?;
        Some(Self::new(name, namespace, vocabularies, types))
    }
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect()
}

/// Namespace used for a tenant's models.
pub fn tenant_namespace(tenant_id: &str) -> String {
    format!("L{tenant_id}")
}

/// Registry of runtime-defined models.
#[derive(Debug)]
pub struct ModelRegistry {
    vocabularies: Arc<VocabularyRegistry>,
    models: RwLock<BTreeMap<ModelKey, Arc<ModelDescriptor>>>,
    mappings: MappingCache,
}

impl ModelRegistry {
    pub fn new(vocabularies: Arc<VocabularyRegistry>) -> Self {
        Self {
            vocabularies,
            models: RwLock::new(BTreeMap::new()),
            mappings: MappingCache::new(),
        }
    }

    pub fn vocabularies(&self) -> &Arc<VocabularyRegistry> {
        &self.vocabularies
    }

    /// Defines a model, or returns the one already registered under the
    /// same `(namespace, name)`.
    ///
    /// Returns `None` when the namespace or name is not an identifier, or
    /// when either list is empty. Unknown vocabularies are skipped and
    /// types survive only when their vocabulary declares them as a class.
    pub fn define_model(&self, definition: &ModelDefinition) -> Option<Arc<ModelDescriptor>> {
        let namespace = definition.namespace.trim();
        let name = classify(definition.name.trim());
        if !IDENTIFIER.is_match(namespace) || !IDENTIFIER.is_match(&name) {
            warn!(
                "event=model_define module=factory status=skip reason=invalid_identifier namespace={} name={}",
                namespace, definition.name
            );
            return None;
        }
        if definition.vocabularies.is_empty() || definition.types.is_empty() {
            warn!(
                "event=model_define module=factory status=skip reason=empty_lists namespace={} name={}",
                namespace, name
            );
            return None;
        }

        let key = ModelKey::new(namespace, name.clone());
        let mut models = self.models.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = models.get(&key) {
            return Some(existing.clone());
        }

        let bindings: Vec<VocabBinding> = definition
            .vocabularies
            .iter()
            .filter_map(|prefix| self.vocabularies.get(&prefix.trim().to_ascii_lowercase()))
            .map(VocabBinding::all)
            .collect();
        let types: Vec<String> = definition
            .types
            .iter()
            .filter_map(|reference| self.vocabularies.resolve_class(reference))
            .collect();

        let descriptor = Arc::new(ModelDescriptor::new(namespace, name, bindings, types));
        info!(
            "event=model_define module=factory status=ok model={} vocabularies={} types={}",
            key,
            descriptor.bindings().len(),
            descriptor.types().len()
        );
        models.insert(key, descriptor.clone());
        Some(descriptor)
    }

    /// Loosely typed variant of [`ModelRegistry::define_model`].
    pub fn define_model_from_json(&self, value: &Value) -> Option<Arc<ModelDescriptor>> {
        self.define_model(&ModelDefinition::from_json(value)?)
    }

    /// Defines every configured model of a tenant in its namespace.
    pub fn define_tenant_models(&self, tenant: &TenantConfig) -> Vec<Arc<ModelDescriptor>> {
        let namespace = tenant_namespace(&tenant.id);
        tenant
            .models
            .iter()
            .filter_map(|model| {
                self.define_model(&ModelDefinition::new(
                    model.name.clone(),
                    namespace.clone(),
                    model.vocabularies.clone(),
                    model.types.clone(),
                ))
            })
            .collect()
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<Arc<ModelDescriptor>> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&ModelKey::new(namespace, classify(name)))
            .cloned()
    }

    /// Models of one namespace in name order.
    pub fn models_in(&self, namespace: &str) -> Vec<Arc<ModelDescriptor>> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(key, _)| key.namespace == namespace)
            .map(|(_, descriptor)| descriptor.clone())
            .collect()
    }

    pub fn remove_model(&self, namespace: &str, name: &str) -> Option<Arc<ModelDescriptor>> {
        let key = ModelKey::new(namespace, classify(name));
        let removed = self
            .models
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
        if removed.is_some() {
            self.mappings.invalidate(&key);
            info!("event=model_remove module=factory status=ok model={}", key);
        }
        removed
    }

    /// Cached index mapping of a registered model.
    pub fn mapping(&self, namespace: &str, name: &str) -> Option<Arc<IndexMapping>> {
        let descriptor = self.get(namespace, name)?;
        Some(self.mappings.get_or_build(&descriptor))
    }

    pub fn mapping_for(&self, descriptor: &ModelDescriptor) -> Arc<IndexMapping> {
        self.mappings.get_or_build(descriptor)
    }
}

/// Upper-cases the first character: `resource` -> `Resource`.
fn classify(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::{tenant_namespace, ModelDefinition, ModelRegistry};
    use crate::vocab::VocabularyRegistry;
    use serde_json::json;
    use std::sync::Arc;

    fn registry() -> ModelRegistry {
        ModelRegistry::new(Arc::new(VocabularyRegistry::builtin()))
    }

    #[test]
    fn define_model_filters_unknown_vocabularies_and_types() {
        let registry = registry();
        let descriptor = registry
            .define_model(&ModelDefinition::new(
                "resource",
                "Ltenant1",
                ["dc", "nope"],
                ["dc.BibliographicResource", "dc.title", "nope.Thing", "dc.BibliographicResource"],
            ))
            .expect("valid definition");

        assert_eq!(descriptor.name(), "Resource");
        assert_eq!(descriptor.bindings().len(), 1);
        assert_eq!(
            descriptor.types(),
            ["http://purl.org/dc/terms/BibliographicResource".to_string()]
        );
    }

    #[test]
    fn define_model_is_idempotent() {
        let registry = registry();
        let definition = ModelDefinition::new("Agent", "Lt", ["foaf"], ["foaf.Agent"]);
        let first = registry.define_model(&definition).unwrap();
        let second = registry.define_model(&definition).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn malformed_definitions_register_nothing() {
        let registry = registry();
        assert!(registry
            .define_model(&ModelDefinition::new("Agent", "bad-ns", ["foaf"], ["foaf.Agent"]))
            .is_none());
        assert!(registry
            .define_model(&ModelDefinition::new("Agent", "Lt", Vec::<String>::new(), ["foaf.Agent"]))
            .is_none());
        assert!(registry
            .define_model_from_json(&json!({"name": "Agent", "module": "Lt", "vocabs": "foaf"}))
            .is_none());
        assert!(registry.models_in("Lt").is_empty());
    }

    #[test]
    fn json_definition_accepts_legacy_keys() {
        let registry = registry();
        let descriptor = registry
            .define_model_from_json(&json!({
                "name": "concept",
                "module": "Lt",
                "vocabs": ["skos", "mads"],
                "types": ["skos.Concept", "mads.Concept"]
            }))
            .expect("definition");
        assert_eq!(descriptor.types().len(), 2);
        assert!(registry.get("Lt", "Concept").is_some());
    }

    #[test]
    fn remove_model_drops_mapping() {
        let registry = registry();
        registry
            .define_model(&ModelDefinition::new("Agent", "Lt", ["foaf"], ["foaf.Agent"]))
            .unwrap();
        let mapping = registry.mapping("Lt", "Agent").expect("mapping");
        assert!(mapping.property("foaf").is_some());

        assert!(registry.remove_model("Lt", "Agent").is_some());
        assert!(registry.mapping("Lt", "Agent").is_none());
    }

    #[test]
    fn tenant_namespace_prefixes_id() {
        assert_eq!(tenant_namespace("42"), "L42");
    }
}
