//! Immutable schema descriptors for record models.
//!
//! # Responsibility
//! - Describe one model: its vocabulary bindings, static RDF types and
//!   relation slots.
//! - Precompute the static field bindings every record of the model exposes.
//!
//! # Invariants
//! - Static types are unique and kept in declaration order.
//! - Static field names are unique; later vocabularies that reuse a local
//!   name get a `prefix_local` field name.
//! - Descriptors are never mutated after construction; share them via `Arc`.

use crate::model::fields::{AccessorKind, FieldBinding};
use crate::vocab::Vocabulary;
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// Registry key of one model definition.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModelKey {
    pub namespace: String,
    pub name: String,
}

impl ModelKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl Display for ModelKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{}", self.namespace, self.name)
    }
}

/// Field group bound to one vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabBinding {
    pub prefix: String,
    pub uri: String,
    /// Bound local names, sorted.
    pub fields: Vec<String>,
}

impl VocabBinding {
    /// Binds every property the vocabulary declares.
    pub fn all(vocabulary: &Vocabulary) -> Self {
        Self {
            prefix: vocabulary.prefix().to_string(),
            uri: vocabulary.uri().to_string(),
            fields: vocabulary.properties().map(str::to_string).collect(),
        }
    }

    /// Binds the listed properties that the vocabulary declares.
    pub fn only<I, S>(vocabulary: &Vocabulary, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fields: BTreeSet<String> = fields
            .into_iter()
            .filter(|field| vocabulary.has_property(field.as_ref()))
            .map(|field| field.as_ref().to_string())
            .collect();

        Self {
            prefix: vocabulary.prefix().to_string(),
            uri: vocabulary.uri().to_string(),
            fields: fields.into_iter().collect(),
        }
    }
}

/// Many-valued or single-valued relation slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Many,
    One,
}

/// Named relation slot on a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationSpec {
    pub name: String,
    /// Model kind of related records, e.g. `agent`.
    pub target: String,
    pub cardinality: Cardinality,
    /// Predicate linking the record to related records in the graph view.
    pub predicate: String,
}

impl RelationSpec {
    pub fn many(
        name: impl Into<String>,
        target: impl Into<String>,
        predicate: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            cardinality: Cardinality::Many,
            predicate: predicate.into(),
        }
    }

    pub fn one(
        name: impl Into<String>,
        target: impl Into<String>,
        predicate: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            cardinality: Cardinality::One,
            predicate: predicate.into(),
        }
    }

    /// Key used in the document form: `agent_ids` or `parent_id`.
    pub fn document_key(&self) -> String {
        match self.cardinality {
            Cardinality::Many => format!("{}_ids", self.name),
            Cardinality::One => format!("{}_id", self.name),
        }
    }
}

pub const DC_TERMS: &str = "http://purl.org/dc/terms/";

/// Field paths searched in order for a record heading.
pub const DEFAULT_HEADING_FIELDS: &[&str] = &[
    "dc.title",
    "mods.titlePrincipal",
    "skos.prefLabel",
    "mads.authoritativeLabel",
    "foaf.name",
    "vcard.fn",
];

/// Schema descriptor for one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    namespace: String,
    name: String,
    bindings: Vec<VocabBinding>,
    types: Vec<String>,
    relations: Vec<RelationSpec>,
    static_fields: Vec<FieldBinding>,
    heading_fields: Vec<String>,
}

impl ModelDescriptor {
    /// Builds a descriptor with the default relation slots: `resource`,
    /// `agent` and `concept` (many) plus `parent` (one).
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        bindings: Vec<VocabBinding>,
        types: Vec<String>,
    ) -> Self {
        let name = name.into();
        let kind = name.to_ascii_lowercase();
        let mut seen = BTreeSet::new();
        let types = types
            .into_iter()
            .filter(|uri| seen.insert(uri.clone()))
            .collect();
        let static_fields = static_field_bindings(&bindings);

        Self {
            namespace: namespace.into(),
            name,
            bindings,
            types,
            relations: default_relations(&kind),
            static_fields,
            heading_fields: DEFAULT_HEADING_FIELDS
                .iter()
                .map(|field| field.to_string())
                .collect(),
        }
    }

    pub fn with_relations(mut self, relations: Vec<RelationSpec>) -> Self {
        self.relations = relations;
        self
    }

    pub fn with_heading_fields(mut self, fields: Vec<String>) -> Self {
        self.heading_fields = fields;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lowercase model kind used in IRIs and reference tags.
    pub fn kind(&self) -> String {
        self.name.to_ascii_lowercase()
    }

    pub fn key(&self) -> ModelKey {
        ModelKey::new(self.namespace.clone(), self.name.clone())
    }

    pub fn bindings(&self) -> &[VocabBinding] {
        &self.bindings
    }

    pub fn binding(&self, prefix: &str) -> Option<&VocabBinding> {
        self.bindings.iter().find(|binding| binding.prefix == prefix)
    }

    /// Statically declared RDF type IRIs.
    pub fn types(&self) -> &[String] {
        &self.types
    }

    pub fn declares_type(&self, uri: &str) -> bool {
        self.types.iter().any(|declared| declared == uri)
    }

    pub fn relations(&self) -> &[RelationSpec] {
        &self.relations
    }

    pub fn relation(&self, name: &str) -> Option<&RelationSpec> {
        self.relations.iter().find(|relation| relation.name == name)
    }

    pub fn relation_for_predicate(&self, predicate: &str) -> Option<&RelationSpec> {
        self.relations
            .iter()
            .find(|relation| relation.predicate == predicate)
    }

    pub fn static_fields(&self) -> &[FieldBinding] {
        &self.static_fields
    }

    pub fn heading_fields(&self) -> &[String] {
        &self.heading_fields
    }
}

fn default_relations(kind: &str) -> Vec<RelationSpec> {
    vec![
        RelationSpec::many("resource", "resource", format!("{DC_TERMS}relation")),
        RelationSpec::many("agent", "agent", format!("{DC_TERMS}creator")),
        RelationSpec::many("concept", "concept", format!("{DC_TERMS}subject")),
        RelationSpec::one("parent", kind, format!("{DC_TERMS}isPartOf")),
    ]
}

fn static_field_bindings(bindings: &[VocabBinding]) -> Vec<FieldBinding> {
    let mut names = BTreeSet::new();
    let mut fields = Vec::new();

    for binding in bindings {
        for local in &binding.fields {
            let name = if names.contains(local) {
                format!("{}_{}", binding.prefix, local)
            } else {
                local.clone()
            };
            names.insert(name.clone());
            fields.push(FieldBinding {
                name,
                prefix: binding.prefix.clone(),
                local: local.clone(),
                predicate: format!("{}{}", binding.uri, local),
                kind: AccessorKind::Static,
                multiple: true,
            });
        }
    }

    fields
}

#[cfg(test)]
mod tests {
    use super::{ModelDescriptor, RelationSpec, VocabBinding};
    use crate::vocab::VocabularyRegistry;

    #[test]
    fn static_fields_qualify_colliding_local_names() {
        let vocabularies = VocabularyRegistry::builtin();
        let descriptor = ModelDescriptor::new(
            "Ltest",
            "Resource",
            vec![
                VocabBinding::only(vocabularies.get("dc").unwrap(), ["title", "abstract"]),
                VocabBinding::only(vocabularies.get("mods").unwrap(), ["abstract", "genre"]),
            ],
            vec![],
        );

        let names: Vec<_> = descriptor
            .static_fields()
            .iter()
            .map(|field| field.name.as_str())
            .collect();
        assert_eq!(names, vec!["abstract", "title", "mods_abstract", "genre"]);
    }

    #[test]
    fn only_binding_ignores_undeclared_properties() {
        let vocabularies = VocabularyRegistry::builtin();
        let binding = VocabBinding::only(vocabularies.get("skos").unwrap(), ["prefLabel", "bogus"]);
        assert_eq!(binding.fields, vec!["prefLabel".to_string()]);
    }

    #[test]
    fn types_are_deduplicated_in_order() {
        let descriptor = ModelDescriptor::new(
            "Ltest",
            "Concept",
            vec![],
            vec!["t:b".to_string(), "t:a".to_string(), "t:b".to_string()],
        );
        assert_eq!(descriptor.types(), ["t:b".to_string(), "t:a".to_string()]);
        assert!(descriptor.declares_type("t:a"));
        assert_eq!(descriptor.kind(), "concept");
    }

    #[test]
    fn relation_document_keys_follow_cardinality() {
        assert_eq!(
            RelationSpec::many("agent", "agent", "p:creator").document_key(),
            "agent_ids"
        );
        assert_eq!(
            RelationSpec::one("parent", "resource", "p:isPartOf").document_key(),
            "parent_id"
        );
    }
}
