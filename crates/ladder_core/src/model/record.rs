//! Catalog record: attribute view, field table and graph view.
//!
//! # Responsibility
//! - Own one record's vocabulary-grouped values, dynamic context, pending
//!   types, relations, raw payloads and timestamps.
//! - Provide generic field dispatch (`get`/`set`/`push`) over the field
//!   table instead of generated accessors.
//! - Convert to and from the JSON document form stored by repositories.
//!
//! # Invariants
//! - `types` never contains a type the descriptor declares statically.
//! - Every value lives at `vocab_groups[binding.prefix][binding.local]` of
//!   the binding that wrote it.
//! - Loading a document re-applies context and re-asserts pending types
//!   before the record is handed out.
//!
//! # See also
//! - `graph::sync` for statement ingestion into records.
//! - `normalize` for the canonical form of the document.

use crate::graph::{sync, Graph, Literal, Statement, Term, RDF_TYPE};
use crate::model::descriptor::{Cardinality, ModelDescriptor};
use crate::model::fields::{ContextDelta, FieldBinding, FieldError, FieldTable, PropertyOptions};
use crate::model::payload::{CompressedPayload, RawPayloads};
use crate::vocab::VocabularyRegistry;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Stable record identifier.
pub type RecordId = Uuid;

/// Prefix of the internal subject IRI of a record.
pub const SUBJECT_PREFIX: &str = "urn:uuid:";

/// Document keys of the compressed source payloads. Kept apart from the
/// vocabulary groups, which may use the `mods` prefix.
pub const RAW_MARC_KEY: &str = "raw_marc";
pub const RAW_MODS_KEY: &str = "raw_mods";

static REFERENCE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("reference token regex must compile")
});

/// Returns whether `value` has the shape of a record id.
///
/// This is a structural check only; any literal with the same shape is
/// treated as a reference.
pub fn is_reference_token(value: &str) -> bool {
    REFERENCE_TOKEN.is_match(value)
}

/// Internal graph subject IRI for `id`.
pub fn subject_iri(id: RecordId) -> String {
    format!("{SUBJECT_PREFIX}{id}")
}

/// Parses an internal subject IRI back into a record id.
pub fn parse_subject_iri(iri: &str) -> Option<RecordId> {
    let token = iri.strip_prefix(SUBJECT_PREFIX)?;
    is_reference_token(token)
        .then(|| Uuid::parse_str(token).ok())
        .flatten()
}

/// Current wall clock in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}

/// One value stored in a vocabulary field.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldValue {
    Literal(Literal),
    Iri(String),
    /// Reference to another record.
    Ref(RecordId),
}

impl FieldValue {
    pub fn plain(value: impl Into<String>) -> Self {
        Self::Literal(Literal::plain(value))
    }

    pub fn tagged(value: impl Into<String>, language: impl Into<String>) -> Self {
        Self::Literal(Literal::tagged(value, language))
    }

    pub fn iri(value: impl Into<String>) -> Self {
        Self::Iri(value.into())
    }

    /// Text used for search and similarity.
    pub fn text(&self) -> String {
        match self {
            Self::Literal(literal) => literal.value.clone(),
            Self::Iri(iri) => iri.clone(),
            Self::Ref(id) => id.to_string(),
        }
    }

    /// Value for a statement object.
    pub fn to_term(&self) -> Term {
        match self {
            Self::Literal(literal) => Term::Literal(literal.clone()),
            Self::Iri(iri) => Term::Iri(iri.clone()),
            Self::Ref(id) => Term::Iri(subject_iri(*id)),
        }
    }

    /// Value for a statement object term; blank nodes carry no value.
    pub fn from_term(term: &Term) -> Option<Self> {
        match term {
            Term::Literal(literal) => Some(Self::Literal(literal.clone())),
            Term::Iri(iri) => Some(match parse_subject_iri(iri) {
                Some(id) => Self::Ref(id),
                None => Self::Iri(iri.clone()),
            }),
            Term::Blank(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Literal(Literal {
                value,
                language: None,
            }) => Value::String(value.clone()),
            Self::Literal(Literal {
                value,
                language: Some(language),
            }) => {
                let mut object = Map::new();
                object.insert("@value".to_string(), Value::String(value.clone()));
                object.insert("@language".to_string(), Value::String(language.clone()));
                Value::Object(object)
            }
            Self::Iri(iri) => {
                let mut object = Map::new();
                object.insert("@id".to_string(), Value::String(iri.clone()));
                Value::Object(object)
            }
            Self::Ref(id) => Value::String(id.to_string()),
        }
    }

    /// Reads a document value; strings shaped like ids become references.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(text) if is_reference_token(text) => {
                Uuid::parse_str(text).ok().map(Self::Ref)
            }
            Value::String(text) => Some(Self::plain(text.clone())),
            Value::Number(number) => Some(Self::plain(number.to_string())),
            Value::Bool(flag) => Some(Self::plain(flag.to_string())),
            Value::Object(object) => {
                if let Some(Value::String(iri)) = object.get("@id") {
                    return Some(Self::Iri(iri.clone()));
                }
                let Some(Value::String(text)) = object.get("@value") else {
                    return None;
                };
                match object.get("@language") {
                    Some(Value::String(language)) => Some(Self::tagged(text.clone(), language.clone())),
                    _ => Some(Self::plain(text.clone())),
                }
            }
            Value::Null | Value::Array(_) => None,
        }
    }
}

/// Creation, update and soft-delete instants in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamps {
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

impl Timestamps {
    pub fn at(now: i64) -> Self {
        Self {
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}

/// Validation failures for persisted or about-to-persist records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordValidationError {
    NilId,
    StaticTypeInTypes(String),
    ContextShadowsStaticField(String),
    UpdatedBeforeCreated { created_at: i64, updated_at: i64 },
}

impl Display for RecordValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId => write!(f, "record id must not be nil"),
            Self::StaticTypeInTypes(uri) => {
                write!(f, "statically declared type stored as pending type: {uri}")
            }
            Self::ContextShadowsStaticField(name) => {
                write!(f, "context field `{name}` collides with a declared field")
            }
            Self::UpdatedBeforeCreated {
                created_at,
                updated_at,
            } => write!(
                f,
                "updated_at ({updated_at}) is earlier than created_at ({created_at})"
            ),
        }
    }
}

impl Error for RecordValidationError {}

/// Errors reading the document form of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    NotAnObject,
    MissingId,
    InvalidId(String),
    InvalidField { key: String, message: String },
}

impl Display for DocumentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "record document must be a JSON object"),
            Self::MissingId => write!(f, "record document has no `_id`"),
            Self::InvalidId(value) => write!(f, "record document has invalid `_id`: {value}"),
            Self::InvalidField { key, message } => {
                write!(f, "record document field `{key}` is invalid: {message}")
            }
        }
    }
}

impl Error for DocumentError {}

/// One catalog record of a registered model.
#[derive(Debug, Clone)]
pub struct Record {
    id: RecordId,
    descriptor: Arc<ModelDescriptor>,
    fields: FieldTable,
    types: Vec<String>,
    vocab_groups: BTreeMap<String, BTreeMap<String, Vec<FieldValue>>>,
    relations: BTreeMap<String, Vec<RecordId>>,
    raw: RawPayloads,
    timestamps: Timestamps,
    graph: Graph,
}

impl Record {
    /// Creates an empty record with a generated id.
    pub fn new(descriptor: Arc<ModelDescriptor>) -> Self {
        Self::with_id(Uuid::new_v4(), descriptor)
    }

    /// Creates an empty record with a caller-provided id.
    pub fn with_id(id: RecordId, descriptor: Arc<ModelDescriptor>) -> Self {
        let fields = FieldTable::from_descriptor(&descriptor);
        let mut record = Self {
            id,
            descriptor,
            fields,
            types: Vec::new(),
            vocab_groups: BTreeMap::new(),
            relations: BTreeMap::new(),
            raw: RawPayloads::default(),
            timestamps: Timestamps::at(now_epoch_ms()),
            graph: Graph::new(),
        };
        record.reassert_types();
        record
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn descriptor(&self) -> &Arc<ModelDescriptor> {
        &self.descriptor
    }

    pub fn kind(&self) -> String {
        self.descriptor.kind()
    }

    /// Internal graph subject of this record.
    pub fn subject(&self) -> Term {
        Term::Iri(subject_iri(self.id))
    }

    pub fn fields(&self) -> &FieldTable {
        &self.fields
    }

    /// Types asserted on this instance beyond the static ones.
    pub fn types(&self) -> &[String] {
        &self.types
    }

    /// Static types followed by instance types.
    pub fn effective_types(&self) -> Vec<String> {
        self.descriptor
            .types()
            .iter()
            .chain(self.types.iter())
            .cloned()
            .collect()
    }

    /// Asserts an RDF type on the record.
    ///
    /// Statically declared types are never stored; pending types are
    /// appended once. Every effective type is re-asserted in the graph view
    /// either way. Returns whether `types` changed.
    pub fn assert_type(&mut self, uri: &str) -> bool {
        let added = !self.descriptor.declares_type(uri) && !self.types.iter().any(|t| t == uri);
        if added {
            self.types.push(uri.to_string());
        }
        self.reassert_types();
        added
    }

    fn reassert_types(&mut self) {
        let subject = self.subject();
        for uri in self.effective_types() {
            self.graph.insert(Statement::new(
                subject.clone(),
                RDF_TYPE,
                Term::Iri(uri),
            ));
        }
    }

    pub fn context(&self) -> BTreeMap<String, String> {
        self.fields.context()
    }

    /// Defines a dynamic field on this record; see [`FieldTable::define_property`].
    pub fn define_property(
        &mut self,
        field_name: &str,
        predicate: &str,
        options: &PropertyOptions,
        vocabularies: &VocabularyRegistry,
    ) -> Option<ContextDelta> {
        self.fields
            .define_property(field_name, predicate, options, vocabularies)
    }

    fn binding(&self, field: &str) -> Result<FieldBinding, FieldError> {
        self.fields
            .get(field)
            .cloned()
            .ok_or_else(|| FieldError::UnknownField(field.to_string()))
    }

    /// Values of one field; unset fields read as empty.
    pub fn get(&self, field: &str) -> Result<&[FieldValue], FieldError> {
        let binding = self
            .fields
            .get(field)
            .ok_or_else(|| FieldError::UnknownField(field.to_string()))?;
        Ok(self.values_at(&binding.prefix, &binding.local))
    }

    /// Replaces every value of one field.
    pub fn set(&mut self, field: &str, values: Vec<FieldValue>) -> Result<(), FieldError> {
        let binding = self.binding(field)?;
        let mut deduped: Vec<FieldValue> = Vec::with_capacity(values.len());
        for value in values {
            if !deduped.contains(&value) {
                deduped.push(value);
            }
        }
        self.write_values(&binding.prefix, &binding.local, deduped);
        Ok(())
    }

    /// Appends one value unless already present; returns whether it was added.
    pub fn push(&mut self, field: &str, value: FieldValue) -> Result<bool, FieldError> {
        let binding = self.binding(field)?;
        Ok(self.push_at(&binding.prefix, &binding.local, value))
    }

    /// Raw access by vocabulary group and local name.
    pub fn values_at(&self, prefix: &str, local: &str) -> &[FieldValue] {
        self.vocab_groups
            .get(prefix)
            .and_then(|group| group.get(local))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub(crate) fn push_at(&mut self, prefix: &str, local: &str, value: FieldValue) -> bool {
        let values = self
            .vocab_groups
            .entry(prefix.to_string())
            .or_default()
            .entry(local.to_string())
            .or_default();
        if values.contains(&value) {
            return false;
        }
        values.push(value);
        true
    }

    pub(crate) fn write_values(&mut self, prefix: &str, local: &str, values: Vec<FieldValue>) {
        if values.is_empty() {
            if let Some(group) = self.vocab_groups.get_mut(prefix) {
                group.remove(local);
                if group.is_empty() {
                    self.vocab_groups.remove(prefix);
                }
            }
            return;
        }
        self.vocab_groups
            .entry(prefix.to_string())
            .or_default()
            .insert(local.to_string(), values);
    }

    pub fn vocab_groups(&self) -> &BTreeMap<String, BTreeMap<String, Vec<FieldValue>>> {
        &self.vocab_groups
    }

    /// Ids held by one relation slot.
    pub fn related(&self, relation: &str) -> &[RecordId] {
        self.relations
            .get(relation)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn relations(&self) -> &BTreeMap<String, Vec<RecordId>> {
        &self.relations
    }

    /// Adds `id` to a relation slot. Single-valued slots are replaced.
    pub fn relate(&mut self, relation: &str, id: RecordId) -> Result<bool, FieldError> {
        let spec = self
            .descriptor
            .relation(relation)
            .ok_or_else(|| FieldError::UnknownRelation(relation.to_string()))?;
        let ids = self.relations.entry(spec.name.clone()).or_default();
        match spec.cardinality {
            Cardinality::One => {
                let changed = ids.as_slice() != [id];
                *ids = vec![id];
                Ok(changed)
            }
            Cardinality::Many if ids.contains(&id) => Ok(false),
            Cardinality::Many => {
                ids.push(id);
                Ok(true)
            }
        }
    }

    pub fn unrelate(&mut self, relation: &str, id: RecordId) -> bool {
        let Some(ids) = self.relations.get_mut(relation) else {
            return false;
        };
        let before = ids.len();
        ids.retain(|existing| *existing != id);
        let removed = ids.len() != before;
        if ids.is_empty() {
            self.relations.remove(relation);
        }
        removed
    }

    pub fn raw_payloads(&self) -> &RawPayloads {
        &self.raw
    }

    pub fn raw_payloads_mut(&mut self) -> &mut RawPayloads {
        &mut self.raw
    }

    pub fn timestamps(&self) -> Timestamps {
        self.timestamps
    }

    pub fn is_deleted(&self) -> bool {
        self.timestamps.deleted_at.is_some()
    }

    /// Moves `updated_at` forward; never earlier than `created_at`.
    pub fn touch(&mut self, now: i64) {
        self.timestamps.updated_at = now.max(self.timestamps.created_at);
    }

    pub fn mark_deleted(&mut self, now: i64) {
        self.touch(now);
        self.timestamps.deleted_at = Some(self.timestamps.updated_at);
    }

    /// Graph view holding asserted types and ingested statements.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub(crate) fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    /// Re-derives this record's own statements from its attributes.
    ///
    /// Statements about other subjects (embedded blank nodes) are kept.
    pub fn refresh_graph(&mut self) {
        let subject = self.subject();
        let derived = sync::derive_statements(self, None);
        self.graph.retain(|statement| statement.subject != subject);
        self.graph.merge(&derived);
    }

    /// First non-empty value among the descriptor's heading fields.
    pub fn heading(&self) -> Option<String> {
        self.descriptor
            .heading_fields()
            .iter()
            .filter_map(|path| path.split_once('.'))
            .flat_map(|(prefix, local)| self.values_at(prefix, local).iter())
            .map(FieldValue::text)
            .find(|text| !text.trim().is_empty())
    }

    pub fn validate(&self) -> Result<(), RecordValidationError> {
        if self.id.is_nil() {
            return Err(RecordValidationError::NilId);
        }
        if let Some(uri) = self
            .types
            .iter()
            .find(|uri| self.descriptor.declares_type(uri))
        {
            return Err(RecordValidationError::StaticTypeInTypes(uri.clone()));
        }
        if let Some(name) = self
            .fields
            .context()
            .into_keys()
            .find(|name| self.descriptor.static_fields().iter().any(|f| &f.name == name))
        {
            return Err(RecordValidationError::ContextShadowsStaticField(name));
        }
        if self.timestamps.updated_at < self.timestamps.created_at {
            return Err(RecordValidationError::UpdatedBeforeCreated {
                created_at: self.timestamps.created_at,
                updated_at: self.timestamps.updated_at,
            });
        }
        Ok(())
    }

    /// JSON document form persisted by repositories.
    pub fn to_document(&self) -> Value {
        let mut document = Map::new();
        document.insert("_id".to_string(), Value::String(self.id.to_string()));

        let context: Map<String, Value> = self
            .context()
            .into_iter()
            .map(|(name, predicate)| (name, Value::String(predicate)))
            .collect();
        document.insert("_context".to_string(), Value::Object(context));
        document.insert(
            "_types".to_string(),
            Value::Array(self.types.iter().cloned().map(Value::String).collect()),
        );
        document.insert(
            "rdf_types".to_string(),
            Value::Array(self.effective_types().into_iter().map(Value::String).collect()),
        );

        for (prefix, group) in &self.vocab_groups {
            let group: Map<String, Value> = group
                .iter()
                .map(|(local, values)| {
                    (
                        local.clone(),
                        Value::Array(values.iter().map(FieldValue::to_json).collect()),
                    )
                })
                .collect();
            document.insert(prefix.clone(), Value::Object(group));
        }

        for spec in self.descriptor.relations() {
            let ids = self.related(&spec.name);
            if ids.is_empty() {
                continue;
            }
            let value = match spec.cardinality {
                Cardinality::Many => {
                    Value::Array(ids.iter().map(|id| Value::String(id.to_string())).collect())
                }
                Cardinality::One => Value::String(ids[0].to_string()),
            };
            document.insert(spec.document_key(), value);
        }

        if let Some(heading) = self.heading() {
            document.insert("heading".to_string(), Value::String(heading));
        }
        if let Some(marc) = &self.raw.marc {
            document.insert(
                RAW_MARC_KEY.to_string(),
                Value::String(marc.as_encoded().to_string()),
            );
        }
        if let Some(mods) = &self.raw.mods {
            document.insert(
                RAW_MODS_KEY.to_string(),
                Value::String(mods.as_encoded().to_string()),
            );
        }

        document.insert("created_at".to_string(), Value::from(self.timestamps.created_at));
        document.insert("updated_at".to_string(), Value::from(self.timestamps.updated_at));
        if let Some(deleted_at) = self.timestamps.deleted_at {
            document.insert("deleted_at".to_string(), Value::from(deleted_at));
        }

        Value::Object(document)
    }

    /// Restores a record from its document form.
    ///
    /// Context entries are re-applied and pending types re-asserted before
    /// the graph view is derived.
    pub fn from_document(
        descriptor: Arc<ModelDescriptor>,
        document: &Value,
        vocabularies: &VocabularyRegistry,
    ) -> Result<Self, DocumentError> {
        let object = document.as_object().ok_or(DocumentError::NotAnObject)?;
        let id = match object.get("_id") {
            Some(Value::String(raw)) => {
                Uuid::parse_str(raw).map_err(|_| DocumentError::InvalidId(raw.clone()))?
            }
            Some(other) => return Err(DocumentError::InvalidId(other.to_string())),
            None => return Err(DocumentError::MissingId),
        };

        let context = read_string_map(object, "_context")?;
        let mut record = Self::with_id(id, descriptor.clone());
        record.fields = FieldTable::rehydrate(&descriptor, &context, vocabularies);

        for uri in read_string_list(object, "_types")? {
            record.assert_type(&uri);
        }

        let bound_prefixes: Vec<String> = record
            .fields
            .iter()
            .map(|binding| binding.prefix.clone())
            .collect();
        for prefix in bound_prefixes {
            if record.vocab_groups.contains_key(&prefix) {
                continue;
            }
            let Some(Value::Object(group)) = object.get(&prefix) else {
                continue;
            };
            for (local, values) in group {
                let values = match values {
                    Value::Array(items) => items.iter().filter_map(FieldValue::from_json).collect(),
                    single => FieldValue::from_json(single).into_iter().collect(),
                };
                record.write_values(&prefix, local, values);
            }
        }

        for spec in descriptor.relations() {
            let key = spec.document_key();
            let ids = match object.get(&key) {
                None | Some(Value::Null) => continue,
                Some(Value::String(raw)) => vec![parse_id(&key, raw)?],
                Some(Value::Array(items)) => items
                    .iter()
                    .map(|item| match item {
                        Value::String(raw) => parse_id(&key, raw),
                        other => Err(invalid_field(&key, format!("expected id string, got {other}"))),
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                Some(other) => {
                    return Err(invalid_field(&key, format!("expected ids, got {other}")))
                }
            };
            for related in ids {
                record
                    .relate(&spec.name, related)
                    .map_err(|err| invalid_field(&key, err.to_string()))?;
            }
        }

        record.raw.marc =
            read_optional_string(object, RAW_MARC_KEY)?.map(CompressedPayload::from_encoded);
        record.raw.mods =
            read_optional_string(object, RAW_MODS_KEY)?.map(CompressedPayload::from_encoded);

        let now = record.timestamps.created_at;
        let created_at = read_optional_i64(object, "created_at")?.unwrap_or(now);
        record.timestamps = Timestamps {
            created_at,
            updated_at: read_optional_i64(object, "updated_at")?.unwrap_or(created_at),
            deleted_at: read_optional_i64(object, "deleted_at")?,
        };

        record.refresh_graph();
        Ok(record)
    }
}

fn invalid_field(key: &str, message: impl Into<String>) -> DocumentError {
    DocumentError::InvalidField {
        key: key.to_string(),
        message: message.into(),
    }
}

fn parse_id(key: &str, raw: &str) -> Result<RecordId, DocumentError> {
    Uuid::parse_str(raw).map_err(|err| invalid_field(key, err.to_string()))
}

fn read_string_map(
    object: &Map<String, Value>,
    key: &str,
) -> Result<BTreeMap<String, String>, DocumentError> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(BTreeMap::new()),
        Some(Value::Object(entries)) => entries
            .iter()
            .map(|(name, value)| match value {
                Value::String(text) => Ok((name.clone(), text.clone())),
                other => Err(invalid_field(key, format!("expected string for `{name}`, got {other}"))),
            })
            .collect(),
        Some(other) => Err(invalid_field(key, format!("expected object, got {other}"))),
    }
}

fn read_string_list(object: &Map<String, Value>, key: &str) -> Result<Vec<String>, DocumentError> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(text) => Ok(text.clone()),
                other => Err(invalid_field(key, format!("expected string, got {other}"))),
            })
            .collect(),
        Some(other) => Err(invalid_field(key, format!("expected array, got {other}"))),
    }
}

fn read_optional_string(
    object: &Map<String, Value>,
    key: &str,
) -> Result<Option<String>, DocumentError> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.clone())),
        Some(other) => Err(invalid_field(key, format!("expected string, got {other}"))),
    }
}

fn read_optional_i64(object: &Map<String, Value>, key: &str) -> Result<Option<i64>, DocumentError> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            .map(Some)
            .ok_or_else(|| invalid_field(key, format!("expected epoch milliseconds, got {value}"))),
    }
}
