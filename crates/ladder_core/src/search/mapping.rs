//! Search index mapping builder and per-model mapping cache.
//!
//! # Responsibility
//! - Derive the index mapping of a model from its descriptor.
//! - Cache one mapping per `(namespace, model)` until invalidated.
//!
//! # Invariants
//! - `build_mapping` is pure: the same descriptor yields the same mapping.
//! - The cache never hands out a mapping for a removed model once
//!   `invalidate` has been called.

use crate::model::descriptor::{ModelDescriptor, ModelKey};
use crate::model::record::{RAW_MARC_KEY, RAW_MODS_KEY};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};

/// Boost applied to the `heading` field.
pub const HEADING_BOOST: u32 = 2;

const TIMESTAMP_FIELDS: &[&str] = &["created_at", "deleted_at", "updated_at"];
const HIERARCHY_FIELDS: &[&str] = &["parent_id", "parent_ids", "group_ids"];

/// Whether string values are tokenized or indexed verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indexing {
    Analyzed,
    NotAnalyzed,
}

/// Mapping of one document field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldMapping {
    /// Nested object indexed field by field (vocabulary groups).
    Object,
    Date,
    String {
        index: Indexing,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        boost: Option<u32>,
    },
    /// Same value indexed under several sub-fields.
    MultiField {
        fields: BTreeMap<String, FieldMapping>,
    },
}

impl FieldMapping {
    pub fn analyzed() -> Self {
        Self::String {
            index: Indexing::Analyzed,
            boost: None,
        }
    }

    pub fn exact() -> Self {
        Self::String {
            index: Indexing::NotAnalyzed,
            boost: None,
        }
    }

    /// Analyzed text plus a `raw` exact sub-field.
    pub fn analyzed_with_raw(name: &str) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(name.to_string(), Self::analyzed());
        fields.insert("raw".to_string(), Self::exact());
        Self::MultiField { fields }
    }

    /// Whether values reach full-text matching.
    pub fn is_full_text(&self) -> bool {
        match self {
            Self::Object => true,
            Self::Date => false,
            Self::String { index, .. } => *index == Indexing::Analyzed,
            Self::MultiField { fields } => fields.values().any(Self::is_full_text),
        }
    }

    /// Whether values are kept verbatim for exact matching and facets.
    pub fn is_exact(&self) -> bool {
        match self {
            Self::Object => false,
            Self::Date => true,
            Self::String { index, .. } => *index == Indexing::NotAnalyzed,
            Self::MultiField { fields } => fields.values().any(Self::is_exact),
        }
    }
}

/// Template applied to fields without an explicit mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicTemplate {
    pub name: String,
    /// Glob over field names; `*` matches all.
    pub matches: String,
    pub mapping: FieldMapping,
}

/// Index mapping of one model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMapping {
    pub namespace: String,
    pub model: String,
    pub compress_source: bool,
    pub timestamp_enabled: bool,
    pub properties: BTreeMap<String, FieldMapping>,
    pub dynamic_templates: Vec<DynamicTemplate>,
}

impl IndexMapping {
    pub fn key(&self) -> ModelKey {
        ModelKey::new(self.namespace.clone(), self.model.clone())
    }

    pub fn property(&self, name: &str) -> Option<&FieldMapping> {
        self.properties.get(name)
    }

    /// Explicit or template mapping for `name`.
    pub fn resolve(&self, name: &str) -> Option<&FieldMapping> {
        self.properties.get(name).or_else(|| {
            self.dynamic_templates
                .iter()
                .find(|template| glob_matches(&template.matches, name))
                .map(|template| &template.mapping)
        })
    }

    /// Whether a top-level document key reaches the index.
    pub fn indexes_field(&self, name: &str) -> bool {
        !name.starts_with('_')
            && name != RAW_MARC_KEY
            && name != RAW_MODS_KEY
            && self.resolve(name).is_some()
    }

    /// Top-level keys of `document` indexed field by field as `group.field`.
    ///
    /// Covers declared vocabulary groups and groups of dynamic fields that
    /// only a template maps.
    pub fn group_names(&self, document: &Value) -> BTreeSet<String> {
        let Some(top) = document.as_object() else {
            return BTreeSet::new();
        };
        top.iter()
            .filter(|(name, value)| is_group(value) && self.indexes_field(name))
            .filter(|(name, _)| self.resolve(name).is_some_and(FieldMapping::is_full_text))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Score multiplier of a top-level field.
    pub fn boost(&self, name: &str) -> f64 {
        match self.properties.get(name) {
            Some(FieldMapping::String {
                boost: Some(boost), ..
            }) => f64::from(*boost),
            _ => 1.0,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Objects other than JSON-LD literals and references.
pub fn is_group(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|object| !object.contains_key("@value") && !object.contains_key("@id"))
}

fn glob_matches(pattern: &str, name: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => pattern == name,
    }
}

/// Builds the index mapping for one model descriptor.
pub fn build_mapping(descriptor: &ModelDescriptor) -> IndexMapping {
    let mut properties = BTreeMap::new();

    properties.insert(
        "heading".to_string(),
        FieldMapping::String {
            index: Indexing::Analyzed,
            boost: Some(HEADING_BOOST),
        },
    );
    properties.insert(
        "rdf_types".to_string(),
        FieldMapping::analyzed_with_raw("rdf_types"),
    );

    for binding in descriptor.bindings() {
        properties.insert(binding.prefix.clone(), FieldMapping::Object);
    }
    for field in TIMESTAMP_FIELDS {
        properties.insert(field.to_string(), FieldMapping::Date);
    }
    for field in HIERARCHY_FIELDS {
        properties.insert(field.to_string(), FieldMapping::exact());
    }
    for relation in descriptor.relations() {
        properties.insert(relation.document_key(), FieldMapping::exact());
    }

    IndexMapping {
        namespace: descriptor.namespace().to_string(),
        model: descriptor.name().to_string(),
        compress_source: true,
        timestamp_enabled: true,
        properties,
        dynamic_templates: vec![DynamicTemplate {
            name: "auto_facet".to_string(),
            matches: "*".to_string(),
            mapping: FieldMapping::analyzed_with_raw("{name}"),
        }],
    }
}

/// Lazily built mappings keyed by model.
#[derive(Debug, Default)]
pub struct MappingCache {
    entries: Mutex<BTreeMap<ModelKey, Arc<IndexMapping>>>,
}

impl MappingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached mapping for the descriptor's model, building it on first use.
    pub fn get_or_build(&self, descriptor: &ModelDescriptor) -> Arc<IndexMapping> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .entry(descriptor.key())
            .or_insert_with(|| Arc::new(build_mapping(descriptor)))
            .clone()
    }

    pub fn get(&self, key: &ModelKey) -> Option<Arc<IndexMapping>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Drops the cached mapping; returns whether one was cached.
    pub fn invalidate(&self, key: &ModelKey) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::{build_mapping, FieldMapping, Indexing, MappingCache};
    use crate::model::descriptor::{ModelDescriptor, VocabBinding};
    use crate::vocab::VocabularyRegistry;
    use std::sync::Arc;

    fn concept() -> ModelDescriptor {
        let vocabularies = VocabularyRegistry::builtin();
        ModelDescriptor::new(
            "Ltest",
            "Concept",
            vec![
                VocabBinding::all(vocabularies.get("skos").unwrap()),
                VocabBinding::all(vocabularies.get("mads").unwrap()),
            ],
            vec![],
        )
    }

    #[test]
    fn mapping_covers_groups_dates_ids_and_heading() {
        let mapping = build_mapping(&concept());

        assert_eq!(mapping.property("skos"), Some(&FieldMapping::Object));
        assert_eq!(mapping.property("mads"), Some(&FieldMapping::Object));
        assert_eq!(mapping.property("updated_at"), Some(&FieldMapping::Date));
        assert_eq!(mapping.property("agent_ids"), Some(&FieldMapping::exact()));
        assert_eq!(mapping.property("group_ids"), Some(&FieldMapping::exact()));
        assert_eq!(
            mapping.property("heading"),
            Some(&FieldMapping::String {
                index: Indexing::Analyzed,
                boost: Some(2)
            })
        );
        assert_eq!(mapping.boost("heading"), 2.0);
        assert_eq!(mapping.boost("skos"), 1.0);
    }

    #[test]
    fn unseen_fields_fall_back_to_auto_facet_template() {
        let mapping = build_mapping(&concept());
        let resolved = mapping.resolve("anything_new").expect("template applies");

        assert!(resolved.is_full_text());
        assert!(resolved.is_exact());
        assert_eq!(mapping.dynamic_templates[0].name, "auto_facet");
    }

    #[test]
    fn group_names_include_template_mapped_groups() {
        let mapping = build_mapping(&concept());
        let document = serde_json::json!({
            "_context": {"edition": "http://prismstandard.org/namespaces/basic/2.0/edition"},
            "skos": {"prefLabel": ["Islands"]},
            "prism": {"edition": ["2nd"]},
            "heading": "Islands",
            "raw_marc": "H4sIAAAAAAAA",
            "note": {"@value": "literal", "@language": "en"}
        });

        let groups: Vec<String> = mapping.group_names(&document).into_iter().collect();
        assert_eq!(groups, vec!["prism".to_string(), "skos".to_string()]);
        assert!(!mapping.indexes_field("raw_marc"));
        assert!(mapping.indexes_field("prism"));
    }

    #[test]
    fn cache_reuses_and_invalidates_entries() {
        let descriptor = concept();
        let cache = MappingCache::new();

        let first = cache.get_or_build(&descriptor);
        let second = cache.get_or_build(&descriptor);
        assert!(Arc::ptr_eq(&first, &second));

        assert!(cache.invalidate(&descriptor.key()));
        assert!(cache.get(&descriptor.key()).is_none());
        assert!(!Arc::ptr_eq(&first, &cache.get_or_build(&descriptor)));
    }

    #[test]
    fn mapping_serializes_with_type_tags() {
        let json = build_mapping(&concept()).to_json();
        assert_eq!(json["properties"]["heading"]["type"], "string");
        assert_eq!(json["properties"]["heading"]["boost"], 2);
        assert_eq!(json["properties"]["rdf_types"]["type"], "multi_field");
    }
}
