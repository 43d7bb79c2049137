//! Canonical document form, fingerprints and structural diffs.
//!
//! # Responsibility
//! - Reduce a record document to its comparable content.
//! - Handle embedded record references under one of three id policies.
//! - Hash the canonical form for create-or-reuse lookups.
//!
//! # Invariants
//! - Output never contains `_id`, `_context`, `_types`, `rdf_types` or
//!   empty collections.
//! - Keys are sorted, so serialization is deterministic.
//! - `normalize(normalize(x, p), p) == normalize(x, p)` for every policy.
//!
//! # See also
//! - `similarity` for the consumers of the canonical form.

pub mod diff;

use crate::model::record::{is_reference_token, Record};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

pub use diff::{diff, diff_with, Change};

/// Internal fields removed at every level.
const STRIPPED_KEYS: &[&str] = &["_id", "_context", "_types", "rdf_types"];

/// Relation kinds a reference can resolve to, in increasing priority.
const RELATION_KINDS: &[&str] = &["resource", "agent", "concept"];

/// Id lists used to tag references under [`IdPolicy::Resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationIds {
    /// Kind used for references found in no list.
    pub default_kind: String,
    pub resource: BTreeSet<String>,
    pub agent: BTreeSet<String>,
    pub concept: BTreeSet<String>,
}

impl RelationIds {
    pub fn new(default_kind: impl Into<String>) -> Self {
        Self {
            default_kind: default_kind.into(),
            ..Self::default()
        }
    }

    /// Reads `resource_ids`, `agent_ids` and `concept_ids` from a document.
    pub fn from_document(document: &Value, default_kind: impl Into<String>) -> Self {
        let read = |key: &str| -> BTreeSet<String> {
            document
                .get(key)
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default()
        };
        Self {
            default_kind: default_kind.into(),
            resource: read("resource_ids"),
            agent: read("agent_ids"),
            concept: read("concept_ids"),
        }
    }

    /// Kind of the record `id` refers to; later lists win.
    pub fn kind_of(&self, id: &str) -> &str {
        if self.concept.contains(id) {
            "concept"
        } else if self.agent.contains(id) {
            "agent"
        } else if self.resource.contains(id) {
            "resource"
        } else {
            &self.default_kind
        }
    }

    fn is_kind(&self, key: &str) -> bool {
        key == self.default_kind || RELATION_KINDS.contains(&key)
    }
}

/// Treatment of values shaped like record ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdPolicy {
    /// Leave references untouched.
    Keep,
    /// Remove references.
    Omit,
    /// Replace each reference with `{kind: id}`.
    Resolve(RelationIds),
}

/// Canonical form of `document` under `policy`.
///
/// Only object-valued top-level entries (vocabulary groups) are kept.
pub fn normalize(document: &Value, policy: &IdPolicy) -> Value {
    normalize_with(document, policy, None)
}

/// Like [`normalize`], keeping only top-level keys in `allowed` when given.
pub fn normalize_with(document: &Value, policy: &IdPolicy, allowed: Option<&BTreeSet<String>>) -> Value {
    let mut output = Map::new();
    let Some(top) = document.as_object() else {
        return Value::Object(output);
    };

    for (key, value) in top {
        if STRIPPED_KEYS.contains(&key.as_str()) {
            continue;
        }
        if allowed.is_some_and(|allowed| !allowed.contains(key)) {
            continue;
        }
        let Value::Object(group) = value else {
            continue;
        };
        if let Some(normalized) = normalize_object(group, policy) {
            output.insert(key.clone(), normalized);
        }
    }

    Value::Object(output)
}

fn normalize_object(object: &Map<String, Value>, policy: &IdPolicy) -> Option<Value> {
    if let IdPolicy::Resolve(ids) = policy {
        if is_resolved_pair(object, ids) {
            return Some(Value::Object(object.clone()));
        }
    }

    let normalized: Map<String, Value> = object
        .iter()
        .filter(|(key, _)| !STRIPPED_KEYS.contains(&key.as_str()))
        .filter_map(|(key, value)| normalize_value(value, policy).map(|value| (key.clone(), value)))
        .collect();

    (!normalized.is_empty()).then_some(Value::Object(normalized))
}

fn normalize_value(value: &Value, policy: &IdPolicy) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(object) => normalize_object(object, policy),
        Value::Array(items) => {
            let items: Vec<Value> = items
                .iter()
                .filter_map(|item| normalize_value(item, policy))
                .collect();
            (!items.is_empty()).then_some(Value::Array(items))
        }
        Value::String(text) if is_reference_token(text) => match policy {
            IdPolicy::Keep => Some(value.clone()),
            IdPolicy::Omit => None,
            IdPolicy::Resolve(ids) => {
                let mut pair = Map::new();
                pair.insert(ids.kind_of(text).to_string(), value.clone());
                Some(Value::Object(pair))
            }
        },
        other => Some(other.clone()),
    }
}

fn is_resolved_pair(object: &Map<String, Value>, ids: &RelationIds) -> bool {
    object.len() == 1
        && object.iter().all(|(key, value)| {
            ids.is_kind(key) && value.as_str().is_some_and(is_reference_token)
        })
}

/// SHA-256 hex digest of a canonical document.
pub fn hash_canonical(canonical: &Value) -> String {
    let serialized = serde_json::to_string(canonical).unwrap_or_default();
    format!("{:x}", Sha256::digest(serialized.as_bytes()))
}

/// Fingerprint of a document: the hash of its `omit` canonical form.
pub fn fingerprint(document: &Value) -> String {
    hash_canonical(&normalize(document, &IdPolicy::Omit))
}

/// Capability of values that have a canonical document form.
pub trait Normalizable {
    fn document(&self) -> Value;

    /// Kind used for unresolved references under `resolve`.
    fn default_kind(&self) -> String;

    fn normalized(&self, policy: &IdPolicy) -> Value {
        normalize(&self.document(), policy)
    }

    /// `resolve` canonical form using the value's own relation id lists.
    fn resolved(&self) -> Value {
        let document = self.document();
        let ids = RelationIds::from_document(&document, self.default_kind());
        normalize(&document, &IdPolicy::Resolve(ids))
    }

    fn fingerprint(&self) -> String {
        fingerprint(&self.document())
    }
}

impl Normalizable for Record {
    fn document(&self) -> Value {
        self.to_document()
    }

    fn default_kind(&self) -> String {
        self.kind()
    }
}
