//! Per-record field table and dynamic property definition.
//!
//! # Responsibility
//! - Hold the ordered `(field_name, predicate, accessor_kind)` bindings a
//!   record exposes: static ones from its descriptor, dynamic ones from its
//!   context.
//! - Define new dynamic properties when unknown predicates show up.
//!
//! # Invariants
//! - Field names are unique within one table.
//! - Static bindings always precede dynamic bindings.
//! - A predicate that does not resolve against the vocabulary registry never
//!   produces a binding.

use crate::model::descriptor::ModelDescriptor;
use crate::vocab::VocabularyRegistry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// How a field came to exist on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessorKind {
    /// Declared by the model descriptor.
    Static,
    /// Added to one record instance from its context.
    Dynamic,
}

/// One addressable field and the predicate it maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldBinding {
    /// Flat accessor name used by `Record::get`/`Record::set`.
    pub name: String,
    /// Vocabulary group the values are stored under.
    pub prefix: String,
    /// Local name inside the vocabulary group.
    pub local: String,
    /// Absolute predicate IRI.
    pub predicate: String,
    pub kind: AccessorKind,
    /// Append (`true`) or replace (`false`) on statement ingestion.
    pub multiple: bool,
}

/// Options for [`FieldTable::define_property`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyOptions {
    pub multiple: bool,
}

impl Default for PropertyOptions {
    fn default() -> Self {
        Self { multiple: true }
    }
}

/// Context entry added by a successful property definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextDelta {
    pub field_name: String,
    pub predicate: String,
}

/// Field access errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    UnknownField(String),
    UnknownRelation(String),
}

impl Display for FieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownField(name) => write!(f, "unknown field: `{name}`"),
            Self::UnknownRelation(name) => write!(f, "unknown relation: `{name}`"),
        }
    }
}

impl Error for FieldError {}

/// Ordered field bindings for one record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTable {
    bindings: Vec<FieldBinding>,
}

impl FieldTable {
    /// Table with only the descriptor's static bindings.
    pub fn from_descriptor(descriptor: &ModelDescriptor) -> Self {
        Self {
            bindings: descriptor.static_fields().to_vec(),
        }
    }

    /// Re-applies a persisted context on top of the static bindings.
    ///
    /// Entries shadowed by a static field of the same name, or whose
    /// predicate no longer resolves, are skipped.
    pub fn rehydrate(
        descriptor: &ModelDescriptor,
        context: &BTreeMap<String, String>,
        vocabularies: &VocabularyRegistry,
    ) -> Self {
        let mut table = Self::from_descriptor(descriptor);
        for (field_name, predicate) in context {
            if table.get(field_name).is_some() {
                continue;
            }
            let Some(term) = vocabularies.find_term(predicate) else {
                continue;
            };
            table.bindings.push(FieldBinding {
                name: field_name.clone(),
                prefix: term.prefix,
                local: term.local,
                predicate: term.uri,
                kind: AccessorKind::Dynamic,
                multiple: true,
            });
        }
        table
    }

    pub fn get(&self, name: &str) -> Option<&FieldBinding> {
        self.bindings.iter().find(|binding| binding.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldBinding> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Dynamic binding mapped to `predicate`, if any.
    pub fn dynamic_for_predicate(&self, predicate: &str) -> Option<&FieldBinding> {
        self.bindings
            .iter()
            .find(|binding| binding.kind == AccessorKind::Dynamic && binding.predicate == predicate)
    }

    /// First binding of either kind mapped to `predicate`.
    pub fn for_predicate(&self, predicate: &str) -> Option<&FieldBinding> {
        self.bindings
            .iter()
            .find(|binding| binding.predicate == predicate)
    }

    /// Dynamic field name → predicate IRI.
    pub fn context(&self) -> BTreeMap<String, String> {
        self.bindings
            .iter()
            .filter(|binding| binding.kind == AccessorKind::Dynamic)
            .map(|binding| (binding.name.clone(), binding.predicate.clone()))
            .collect()
    }

    /// Defines a dynamic field for `predicate`.
    ///
    /// Returns `None` without side effects when the predicate does not
    /// resolve or a dynamic field for it already exists. A name that collides
    /// with an existing field is replaced by the predicate's `prefix_local`
    /// form, then numbered until unique.
    pub fn define_property(
        &mut self,
        field_name: &str,
        predicate: &str,
        options: &PropertyOptions,
        vocabularies: &VocabularyRegistry,
    ) -> Option<ContextDelta> {
        let term = vocabularies.find_term(predicate)?;
        if self.dynamic_for_predicate(&term.uri).is_some() {
            return None;
        }

        let name = self.unique_name(field_name, &term.prefix, &term.local);
        self.bindings.push(FieldBinding {
            name: name.clone(),
            prefix: term.prefix,
            local: term.local,
            predicate: term.uri.clone(),
            kind: AccessorKind::Dynamic,
            multiple: options.multiple,
        });

        Some(ContextDelta {
            field_name: name,
            predicate: term.uri,
        })
    }

    fn unique_name(&self, requested: &str, prefix: &str, local: &str) -> String {
        let requested = requested.trim();
        if !requested.is_empty() && self.get(requested).is_none() {
            return requested.to_string();
        }

        let qualified = format!("{prefix}_{local}");
        if self.get(&qualified).is_none() {
            return qualified;
        }

        (2..)
            .map(|n| format!("{qualified}_{n}"))
            .find(|candidate| self.get(candidate).is_none())
            .unwrap_or(qualified)
    }
}

#[cfg(test)]
mod tests {
    use super::{AccessorKind, FieldTable, PropertyOptions};
    use crate::model::descriptor::{ModelDescriptor, VocabBinding};
    use crate::vocab::VocabularyRegistry;
    use std::collections::BTreeMap;

    fn dc_only() -> (ModelDescriptor, VocabularyRegistry) {
        let vocabularies = VocabularyRegistry::builtin();
        let descriptor = ModelDescriptor::new(
            "Ltest",
            "Thing",
            vec![VocabBinding::only(
                vocabularies.get("dc").expect("dc vocabulary"),
                ["title", "abstract"],
            )],
            vec![],
        );
        (descriptor, vocabularies)
    }

    #[test]
    fn define_property_registers_dynamic_binding() {
        let (descriptor, vocabularies) = dc_only();
        let mut table = FieldTable::from_descriptor(&descriptor);

        let delta = table
            .define_property(
                "alternative",
                "http://purl.org/dc/terms/alternative",
                &PropertyOptions::default(),
                &vocabularies,
            )
            .expect("dc:alternative should be definable");

        assert_eq!(delta.field_name, "alternative");
        let binding = table.get("alternative").expect("binding installed");
        assert_eq!(binding.kind, AccessorKind::Dynamic);
        assert_eq!(binding.prefix, "dc");
        assert_eq!(
            table.context().get("alternative").map(String::as_str),
            Some("http://purl.org/dc/terms/alternative")
        );
    }

    #[test]
    fn colliding_name_is_qualified_with_predicate_prefix() {
        let (descriptor, vocabularies) = dc_only();
        let mut table = FieldTable::from_descriptor(&descriptor);

        let delta = table
            .define_property(
                "abstract",
                "http://www.loc.gov/mods/rdf/v1#abstract",
                &PropertyOptions::default(),
                &vocabularies,
            )
            .expect("mods:abstract should be definable");

        assert_eq!(delta.field_name, "mods_abstract");
        assert_eq!(
            table.get("abstract").map(|binding| binding.kind),
            Some(AccessorKind::Static)
        );
    }

    #[test]
    fn unresolvable_predicate_is_a_no_op() {
        let (descriptor, vocabularies) = dc_only();
        let mut table = FieldTable::from_descriptor(&descriptor);
        let before = table.clone();

        let delta = table.define_property(
            "mystery",
            "http://unknown.example/ns#mystery",
            &PropertyOptions::default(),
            &vocabularies,
        );

        assert!(delta.is_none());
        assert_eq!(table, before);
    }

    #[test]
    fn redefining_same_predicate_does_not_add_second_field() {
        let (descriptor, vocabularies) = dc_only();
        let mut table = FieldTable::from_descriptor(&descriptor);
        let predicate = "http://purl.org/dc/terms/alternative";

        table
            .define_property("alternative", predicate, &PropertyOptions::default(), &vocabularies)
            .expect("first definition");
        let second =
            table.define_property("alternative", predicate, &PropertyOptions::default(), &vocabularies);

        assert!(second.is_none());
        assert_eq!(table.context().len(), 1);
    }

    #[test]
    fn rehydrate_skips_unknown_and_shadowed_entries() {
        let (descriptor, vocabularies) = dc_only();
        let mut context = BTreeMap::new();
        context.insert(
            "alternative".to_string(),
            "http://purl.org/dc/terms/alternative".to_string(),
        );
        context.insert(
            "title".to_string(),
            "http://purl.org/dc/terms/title".to_string(),
        );
        context.insert(
            "ghost".to_string(),
            "http://unknown.example/ns#ghost".to_string(),
        );

        let table = FieldTable::rehydrate(&descriptor, &context, &vocabularies);
        let dynamic = table.context();

        assert_eq!(dynamic.len(), 1);
        assert!(dynamic.contains_key("alternative"));
        assert_eq!(
            table.get("title").map(|binding| binding.kind),
            Some(AccessorKind::Static)
        );
    }
}
