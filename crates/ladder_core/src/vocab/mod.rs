//! Vocabulary binding registry.
//!
//! # Responsibility
//! - Declare the RDF vocabularies a model can bind field groups to.
//! - Resolve predicate and class IRIs back to `(prefix, local)` terms.
//!
//! # Invariants
//! - Prefixes are unique within one registry.
//! - A term resolves only when its vocabulary declares it.
//!
//! # See also
//! - `model::descriptor` for per-model vocabulary bindings.

mod builtin;

use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use builtin::{
    BIBO, DC, FOAF, MADS, MODS, PRISM, RDF, RDFS, SKOS, VCARD,
};

/// Whether a vocabulary term names a property or a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermKind {
    Property,
    Class,
}

/// A resolved vocabulary term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabTerm {
    pub prefix: String,
    pub local: String,
    pub uri: String,
    pub kind: TermKind,
}

impl VocabTerm {
    /// Prefixed name, e.g. `dc:title`.
    pub fn pname(&self) -> String {
        format!("{}:{}", self.prefix, self.local)
    }
}

/// One namespace with its declared properties and classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    prefix: String,
    uri: String,
    properties: BTreeSet<String>,
    classes: BTreeSet<String>,
}

impl Vocabulary {
    pub fn new(prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            uri: uri.into(),
            properties: BTreeSet::new(),
            classes: BTreeSet::new(),
        }
    }

    pub fn with_properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties
            .extend(properties.into_iter().map(Into::into));
        self
    }

    pub fn with_classes<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.classes.extend(classes.into_iter().map(Into::into));
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn has_property(&self, local: &str) -> bool {
        self.properties.contains(local)
    }

    pub fn has_class(&self, local: &str) -> bool {
        self.classes.contains(local)
    }

    /// Declared properties in sorted order.
    pub fn properties(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(String::as_str)
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(String::as_str)
    }

    pub fn term_uri(&self, local: &str) -> String {
        format!("{}{}", self.uri, local)
    }

    fn term(&self, local: &str) -> Option<VocabTerm> {
        let kind = if self.has_property(local) {
            TermKind::Property
        } else if self.has_class(local) {
            TermKind::Class
        } else {
            return None;
        };

        Some(VocabTerm {
            prefix: self.prefix.clone(),
            local: local.to_string(),
            uri: self.term_uri(local),
            kind,
        })
    }
}

/// Registration errors for custom vocabularies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VocabularyError {
    InvalidPrefix(String),
    InvalidUri(String),
    DuplicatePrefix(String),
}

impl Display for VocabularyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPrefix(value) => write!(f, "vocabulary prefix is invalid: `{value}`"),
            Self::InvalidUri(value) => {
                write!(f, "vocabulary uri must end with `/` or `#`: `{value}`")
            }
            Self::DuplicatePrefix(value) => {
                write!(f, "vocabulary prefix already registered: `{value}`")
            }
        }
    }
}

impl Error for VocabularyError {}

/// Prefix-keyed vocabulary lookup table.
#[derive(Debug, Clone, Default)]
pub struct VocabularyRegistry {
    vocabularies: BTreeMap<String, Vocabulary>,
}

impl VocabularyRegistry {
    /// Empty registry; see [`VocabularyRegistry::builtin`] for the default set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with every built-in vocabulary.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for vocabulary in builtin::all() {
            registry
                .vocabularies
                .insert(vocabulary.prefix.clone(), vocabulary);
        }
        registry
    }

    pub fn register(&mut self, vocabulary: Vocabulary) -> Result<(), VocabularyError> {
        if !is_valid_prefix(&vocabulary.prefix) {
            return Err(VocabularyError::InvalidPrefix(vocabulary.prefix));
        }
        if !(vocabulary.uri.ends_with('/') || vocabulary.uri.ends_with('#')) {
            return Err(VocabularyError::InvalidUri(vocabulary.uri));
        }
        if self.vocabularies.contains_key(&vocabulary.prefix) {
            return Err(VocabularyError::DuplicatePrefix(vocabulary.prefix));
        }
        self.vocabularies
            .insert(vocabulary.prefix.clone(), vocabulary);
        Ok(())
    }

    pub fn get(&self, prefix: &str) -> Option<&Vocabulary> {
        self.vocabularies.get(prefix)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vocabulary> {
        self.vocabularies.values()
    }

    /// Splits `uri` into the longest matching vocabulary namespace and a local
    /// name, whether or not the local name is declared.
    pub fn qname<'a>(&'a self, uri: &'a str) -> Option<(&'a str, &'a str)> {
        self.vocabularies
            .values()
            .filter(|vocabulary| uri.starts_with(vocabulary.uri.as_str()))
            .max_by_key(|vocabulary| vocabulary.uri.len())
            .and_then(|vocabulary| {
                let local = &uri[vocabulary.uri.len()..];
                if local.is_empty() {
                    None
                } else {
                    Some((vocabulary.prefix.as_str(), local))
                }
            })
    }

    /// Resolves a full IRI to a declared term.
    pub fn find_term(&self, uri: &str) -> Option<VocabTerm> {
        let (prefix, local) = self.qname(uri)?;
        self.vocabularies.get(prefix)?.term(local)
    }

    /// Resolves `prefix.Local` or `prefix:Local` references to a declared class IRI.
    pub fn resolve_class(&self, reference: &str) -> Option<String> {
        let (prefix, local) = reference
            .split_once('.')
            .or_else(|| reference.split_once(':'))?;
        let vocabulary = self.vocabularies.get(prefix.trim())?;
        let local = local.trim();
        vocabulary
            .has_class(local)
            .then(|| vocabulary.term_uri(local))
    }

    /// Prefixed name for any IRI under a known namespace, else the IRI itself.
    pub fn pname(&self, uri: &str) -> String {
        match self.qname(uri) {
            Some((prefix, local)) => format!("{prefix}:{local}"),
            None => uri.to_string(),
        }
    }
}

fn is_valid_prefix(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_')
}

#[cfg(test)]
mod tests {
    use super::{TermKind, Vocabulary, VocabularyError, VocabularyRegistry, DC};

    #[test]
    fn builtin_registry_resolves_declared_terms() {
        let registry = VocabularyRegistry::builtin();
        let term = registry
            .find_term("http://purl.org/dc/terms/title")
            .expect("dc:title should resolve");

        assert_eq!(term.prefix, "dc");
        assert_eq!(term.local, "title");
        assert_eq!(term.kind, TermKind::Property);
        assert_eq!(term.pname(), "dc:title");
    }

    #[test]
    fn undeclared_local_names_do_not_resolve() {
        let registry = VocabularyRegistry::builtin();
        assert!(registry
            .find_term("http://purl.org/dc/terms/notATerm")
            .is_none());
        assert!(registry.find_term("http://unknown.example/ns#title").is_none());
    }

    #[test]
    fn qname_splits_known_namespaces_even_for_undeclared_terms() {
        let registry = VocabularyRegistry::builtin();
        assert_eq!(
            registry.qname("http://purl.org/dc/terms/whatever"),
            Some(("dc", "whatever"))
        );
        assert_eq!(registry.pname("urn:x:y"), "urn:x:y");
    }

    #[test]
    fn resolve_class_accepts_dot_and_colon_forms() {
        let registry = VocabularyRegistry::builtin();
        assert_eq!(
            registry.resolve_class("dc.BibliographicResource").as_deref(),
            Some("http://purl.org/dc/terms/BibliographicResource")
        );
        assert_eq!(
            registry.resolve_class("skos:Concept").as_deref(),
            Some("http://www.w3.org/2004/02/skos/core#Concept")
        );
        assert!(registry.resolve_class("dc.title").is_none());
        assert!(registry.resolve_class("nope.Thing").is_none());
    }

    #[test]
    fn register_rejects_duplicates_and_bad_uris() {
        let mut registry = VocabularyRegistry::builtin();
        let err = registry
            .register(Vocabulary::new(DC, "http://purl.org/dc/terms/"))
            .expect_err("duplicate prefix must fail");
        assert_eq!(err, VocabularyError::DuplicatePrefix("dc".to_string()));

        let err = registry
            .register(Vocabulary::new("ex", "http://example.org/ns"))
            .expect_err("uri without separator must fail");
        assert!(matches!(err, VocabularyError::InvalidUri(_)));

        registry
            .register(
                Vocabulary::new("ex", "http://example.org/ns#")
                    .with_properties(["label"])
                    .with_classes(["Thing"]),
            )
            .expect("custom vocabulary should register");
        assert!(registry
            .find_term("http://example.org/ns#label")
            .is_some());
    }
}
