//! Graph-level exports: RDF/XML, framed JSON-LD and qname documents.
//!
//! # Responsibility
//! - Rewrite internal `urn:uuid:` subjects to `<base>/<kind>/<id>` IRIs.
//! - Serialize graphs as RDF/XML and records as JSON-LD or qname maps.
//!
//! # Invariants
//! - Exports never mutate records or graphs.
//! - A related record whose types overlap the container's declared types
//!   is referenced by `@id`, never embedded.

use crate::graph::sync::RecordSource;
use crate::graph::{Graph, Literal, Term, RDF_TYPE};
use crate::model::record::{parse_subject_iri, FieldValue, Record, RecordId};
use crate::vocab::{VocabularyRegistry, RDF};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";

/// Export failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportError {
    Xml(String),
    /// Predicate IRI cannot be split into namespace and local name.
    UnsplittablePredicate(String),
}

impl Display for ExportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Xml(message) => write!(f, "rdf/xml serialization failed: {message}"),
            Self::UnsplittablePredicate(iri) => {
                write!(f, "predicate has no namespace/local split: {iri}")
            }
        }
    }
}

impl Error for ExportError {}

/// Naive English plural used for qname relation references.
pub fn pluralize(kind: &str) -> String {
    if let Some(stem) = kind.strip_suffix('y') {
        format!("{stem}ies")
    } else if kind.ends_with('s') {
        format!("{kind}es")
    } else {
        format!("{kind}s")
    }
}

/// Exporter anchored at a public base URL.
#[derive(Debug, Clone)]
pub struct Exporter<'a> {
    base: String,
    vocabularies: &'a VocabularyRegistry,
    kinds: BTreeMap<RecordId, String>,
}

impl<'a> Exporter<'a> {
    /// `base` is `<scheme>://<host>`; a trailing slash is ignored.
    pub fn new(base: &str, vocabularies: &'a VocabularyRegistry) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            vocabularies,
            kinds: BTreeMap::new(),
        }
    }

    /// Registers the model kind of each record for IRI rewriting.
    pub fn with_records<'r, I>(mut self, records: I) -> Self
    where
        I: IntoIterator<Item = &'r Record>,
    {
        for record in records {
            self.kinds.insert(record.id(), record.kind());
        }
        self
    }

    pub fn register(&mut self, id: RecordId, kind: impl Into<String>) {
        self.kinds.insert(id, kind.into());
    }

    pub fn record_iri(&self, record: &Record) -> String {
        format!("{}/{}/{}", self.base, record.kind(), record.id())
    }

    /// Public IRI of an id, when its kind is known.
    pub fn id_iri(&self, id: RecordId) -> Option<String> {
        self.kinds
            .get(&id)
            .map(|kind| format!("{}/{}/{}", self.base, kind, id))
    }

    /// Rewrites internal subject IRIs of known records; other terms pass.
    pub fn rewrite(&self, term: &Term) -> Term {
        match term {
            Term::Iri(iri) => match parse_subject_iri(iri).and_then(|id| self.id_iri(id)) {
                Some(public) => Term::Iri(public),
                None => term.clone(),
            },
            _ => term.clone(),
        }
    }

    /// Kind of a record referenced by `container`, from the registered
    /// kinds or else from the relation slot or field that holds the id.
    pub fn kind_of(&self, container: &Record, id: RecordId) -> Option<String> {
        if let Some(kind) = self.kinds.get(&id) {
            return Some(kind.clone());
        }
        if id == container.id() {
            return Some(container.kind());
        }
        let descriptor = container.descriptor();
        if let Some(spec) = descriptor
            .relations()
            .iter()
            .find(|spec| container.related(&spec.name).contains(&id))
        {
            return Some(spec.target.clone());
        }
        container
            .fields()
            .iter()
            .filter(|binding| {
                container
                    .values_at(&binding.prefix, &binding.local)
                    .contains(&FieldValue::Ref(id))
            })
            .find_map(|binding| descriptor.relation_for_predicate(&binding.predicate))
            .map(|spec| spec.target.clone())
    }

    /// RDF/XML of `record` and, with `related`, every record reachable
    /// from it. Ids are rewritten using the kinds the records imply.
    pub fn record_rdf_xml(
        &self,
        record: &Record,
        related: Option<&dyn RecordSource>,
    ) -> Result<String, ExportError> {
        let graph = crate::graph::sync::derive_statements(record, related);
        let mut exporter = self.clone();
        exporter.learn_kinds(record, related, &mut BTreeSet::new());
        exporter.rdf_xml(&graph)
    }

    fn learn_kinds(
        &mut self,
        record: &Record,
        related: Option<&dyn RecordSource>,
        visited: &mut BTreeSet<RecordId>,
    ) {
        if !visited.insert(record.id()) {
            return;
        }
        self.kinds.entry(record.id()).or_insert_with(|| record.kind());

        let mut referenced: Vec<RecordId> = record
            .relations()
            .values()
            .flatten()
            .copied()
            .collect();
        for binding in record.fields().iter() {
            for value in record.values_at(&binding.prefix, &binding.local) {
                if let FieldValue::Ref(id) = value {
                    referenced.push(*id);
                }
            }
        }

        for id in referenced {
            match related.and_then(|source| source.record(id)) {
                Some(other) => self.learn_kinds(other, related, visited),
                None => {
                    if let Some(kind) = self.kind_of(record, id) {
                        self.kinds.entry(id).or_insert(kind);
                    }
                }
            }
        }
    }

    /// Serializes `graph` as RDF/XML with one description per subject.
    ///
    /// Only ids with a registered kind are rewritten; see
    /// [`Exporter::record_rdf_xml`] for export from a record.
    pub fn rdf_xml(&self, graph: &Graph) -> Result<String, ExportError> {
        let mut namespaces = Namespaces::new(self.vocabularies);
        let mut descriptions: Vec<(Term, Vec<(String, String, Term)>)> = Vec::new();

        for subject in graph.subjects() {
            let mut properties = Vec::new();
            for statement in graph.about(subject) {
                let (prefix, local) = namespaces.split(&statement.predicate)?;
                properties.push((prefix, local, self.rewrite(&statement.object)));
            }
            descriptions.push((self.rewrite(subject), properties));
        }

        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        write(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut root = BytesStart::new("rdf:RDF");
        for (prefix, uri) in namespaces.declared() {
            root.push_attribute((format!("xmlns:{prefix}").as_str(), uri.as_str()));
        }
        write(&mut writer, Event::Start(root))?;

        for (subject, properties) in descriptions {
            let mut description = BytesStart::new("rdf:Description");
            match &subject {
                Term::Blank(label) => description.push_attribute(("rdf:nodeID", label.as_str())),
                other => description.push_attribute(("rdf:about", other.lexical())),
            }
            write(&mut writer, Event::Start(description))?;

            for (prefix, local, object) in properties {
                let name = format!("{prefix}:{local}");
                let mut element = BytesStart::new(name.as_str());
                match &object {
                    Term::Iri(iri) => {
                        element.push_attribute(("rdf:resource", iri.as_str()));
                        write(&mut writer, Event::Empty(element))?;
                    }
                    Term::Blank(label) => {
                        element.push_attribute(("rdf:nodeID", label.as_str()));
                        write(&mut writer, Event::Empty(element))?;
                    }
                    Term::Literal(Literal { value, language }) => {
                        if let Some(language) = language {
                            element.push_attribute(("xml:lang", language.as_str()));
                        }
                        write(&mut writer, Event::Start(element))?;
                        write(&mut writer, Event::Text(BytesText::new(value)))?;
                        write(&mut writer, Event::End(BytesEnd::new(name.as_str())))?;
                    }
                }
            }

            write(&mut writer, Event::End(BytesEnd::new("rdf:Description")))?;
        }

        write(&mut writer, Event::End(BytesEnd::new("rdf:RDF")))?;
        String::from_utf8(writer.into_inner()).map_err(|err| ExportError::Xml(err.to_string()))
    }

    /// Compacted JSON-LD of `record`, framed on its type.
    ///
    /// Related records found in `related` are embedded unless they share a
    /// type with the container's declared types.
    pub fn jsonld(&self, record: &Record, related: Option<&dyn RecordSource>) -> Value {
        let mut context = BTreeMap::new();
        let mut visited = BTreeSet::new();
        let mut node = self.jsonld_node(record, related, &mut context, &mut visited);
        let context: Map<String, Value> = context
            .into_iter()
            .map(|(prefix, uri)| (prefix, Value::String(uri)))
            .collect();
        node.insert("@context".to_string(), Value::Object(context));
        Value::Object(node)
    }

    fn jsonld_node(
        &self,
        record: &Record,
        related: Option<&dyn RecordSource>,
        context: &mut BTreeMap<String, String>,
        visited: &mut BTreeSet<RecordId>,
    ) -> Map<String, Value> {
        visited.insert(record.id());
        let mut node = Map::new();
        node.insert("@id".to_string(), Value::String(self.record_iri(record)));

        let types: Vec<Value> = record
            .effective_types()
            .iter()
            .map(|uri| Value::String(self.compact(uri, context)))
            .collect();
        if !types.is_empty() {
            node.insert("@type".to_string(), compact_list(types));
        }

        let mut properties: BTreeMap<String, Vec<Value>> = BTreeMap::new();
        for statement in crate::graph::sync::derive_statements(record, None).iter() {
            if statement.subject != record.subject() || statement.predicate == RDF_TYPE {
                continue;
            }
            let key = self.compact(&statement.predicate, context);
            let value = match &statement.object {
                Term::Iri(iri) => match parse_subject_iri(iri) {
                    Some(id) => self.jsonld_reference(record, id, related, context, visited),
                    None => id_object(iri.clone()),
                },
                Term::Literal(literal) => FieldValue::Literal(literal.clone()).to_json(),
                Term::Blank(label) => id_object(format!("_:{label}")),
            };
            properties.entry(key).or_default().push(value);
        }

        for (key, values) in properties {
            node.insert(key, compact_list(values));
        }
        node
    }

    fn jsonld_reference(
        &self,
        container: &Record,
        id: RecordId,
        related: Option<&dyn RecordSource>,
        context: &mut BTreeMap<String, String>,
        visited: &mut BTreeSet<RecordId>,
    ) -> Value {
        let target = related.and_then(|source| source.record(id));
        match target {
            Some(other)
                if !visited.contains(&id)
                    && !other
                        .effective_types()
                        .iter()
                        .any(|uri| container.descriptor().declares_type(uri)) =>
            {
                Value::Object(self.jsonld_node(other, related, context, visited))
            }
            Some(other) => id_object(self.record_iri(other)),
            None => id_object(match self.kind_of(container, id) {
                Some(kind) => format!("{}/{}/{}", self.base, kind, id),
                None => crate::model::record::subject_iri(id),
            }),
        }
    }

    fn compact(&self, iri: &str, context: &mut BTreeMap<String, String>) -> String {
        match self.vocabularies.qname(iri) {
            Some((prefix, local)) => {
                if let Some(vocabulary) = self.vocabularies.get(prefix) {
                    context.insert(prefix.to_string(), vocabulary.uri().to_string());
                }
                format!("{prefix}:{local}")
            }
            None => iri.to_string(),
        }
    }

    /// Qname-keyed document: `{prefix: {local: values}}`.
    ///
    /// Relation slots render as `"<plural-kind>:<id>"` strings, or as nested
    /// qname documents when `related` can resolve the ids.
    pub fn qname(&self, record: &Record, related: Option<&dyn RecordSource>) -> Value {
        let mut visited = BTreeSet::new();
        Value::Object(self.qname_node(record, related, &mut visited))
    }

    fn qname_node(
        &self,
        record: &Record,
        related: Option<&dyn RecordSource>,
        visited: &mut BTreeSet<RecordId>,
    ) -> Map<String, Value> {
        visited.insert(record.id());
        let mut groups: BTreeMap<String, BTreeMap<String, Vec<Value>>> = BTreeMap::new();

        if let Some(first) = record.effective_types().first() {
            groups
                .entry(RDF.to_string())
                .or_default()
                .insert("type".to_string(), vec![Value::String(self.vocabularies.pname(first))]);
        }

        for binding in record.fields().iter() {
            let values = record.values_at(&binding.prefix, &binding.local);
            if values.is_empty() {
                continue;
            }
            let Some((prefix, local)) = self.vocabularies.qname(&binding.predicate) else {
                continue;
            };
            let slot = groups
                .entry(prefix.to_string())
                .or_default()
                .entry(local.to_string())
                .or_default();
            for value in values {
                let rendered = match value {
                    FieldValue::Ref(id) => self.qname_reference(*id, related, visited),
                    other => Value::String(other.text()),
                };
                if !slot.contains(&rendered) {
                    slot.push(rendered);
                }
            }
        }

        for spec in record.descriptor().relations() {
            let ids = record.related(&spec.name);
            if ids.is_empty() {
                continue;
            }
            let Some((prefix, local)) = self.vocabularies.qname(&spec.predicate) else {
                continue;
            };
            let slot = groups
                .entry(prefix.to_string())
                .or_default()
                .entry(local.to_string())
                .or_default();
            for id in ids {
                let rendered = match related.and_then(|source| source.record(*id)) {
                    Some(other) if !visited.contains(id) => {
                        Value::Object(self.qname_node(other, related, visited))
                    }
                    _ => Value::String(format!("{}:{}", pluralize(&spec.target), id)),
                };
                slot.push(rendered);
            }
        }

        groups
            .into_iter()
            .map(|(prefix, fields)| {
                let fields: Map<String, Value> = fields
                    .into_iter()
                    .map(|(local, values)| (local, compact_list(values)))
                    .collect();
                (prefix, Value::Object(fields))
            })
            .collect()
    }

    fn qname_reference(
        &self,
        id: RecordId,
        related: Option<&dyn RecordSource>,
        visited: &mut BTreeSet<RecordId>,
    ) -> Value {
        match related.and_then(|source| source.record(id)) {
            Some(other) if !visited.contains(&id) => {
                Value::Object(self.qname_node(other, related, visited))
            }
            Some(other) => Value::String(format!("{}:{}", pluralize(&other.kind()), id)),
            None => match self.kinds.get(&id) {
                Some(kind) => Value::String(format!("{}:{}", pluralize(kind), id)),
                None => Value::String(id.to_string()),
            },
        }
    }
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), ExportError> {
    writer
        .write_event(event)
        .map(|_| ())
        .map_err(|err| ExportError::Xml(err.to_string()))
}

fn id_object(iri: String) -> Value {
    let mut object = Map::new();
    object.insert("@id".to_string(), Value::String(iri));
    Value::Object(object)
}

fn compact_list(mut values: Vec<Value>) -> Value {
    if values.len() == 1 {
        values.remove(0)
    } else {
        Value::Array(values)
    }
}

/// Prefix assignment for RDF/XML element names.
struct Namespaces<'v> {
    vocabularies: &'v VocabularyRegistry,
    declared: BTreeMap<String, String>,
    generated: usize,
}

impl<'v> Namespaces<'v> {
    fn new(vocabularies: &'v VocabularyRegistry) -> Self {
        let mut declared = BTreeMap::new();
        declared.insert(RDF.to_string(), RDF_NS.to_string());
        Self {
            vocabularies,
            declared,
            generated: 0,
        }
    }

    fn split(&mut self, predicate: &str) -> Result<(String, String), ExportError> {
        if let Some((prefix, local)) = self.vocabularies.qname(predicate) {
            if is_xml_name(local) {
                if let Some(vocabulary) = self.vocabularies.get(prefix) {
                    self.declared
                        .insert(prefix.to_string(), vocabulary.uri().to_string());
                    return Ok((prefix.to_string(), local.to_string()));
                }
            }
        }

        let cut = predicate
            .rfind(|ch| ch == '#' || ch == '/')
            .map(|index| index + 1)
            .filter(|index| *index < predicate.len())
            .ok_or_else(|| ExportError::UnsplittablePredicate(predicate.to_string()))?;
        let (namespace, local) = predicate.split_at(cut);
        if !is_xml_name(local) {
            return Err(ExportError::UnsplittablePredicate(predicate.to_string()));
        }

        if let Some((prefix, _)) = self.declared.iter().find(|(_, uri)| uri.as_str() == namespace) {
            return Ok((prefix.clone(), local.to_string()));
        }
        let prefix = format!("ns{}", self.generated);
        self.generated += 1;
        self.declared.insert(prefix.clone(), namespace.to_string());
        Ok((prefix, local.to_string()))
    }

    fn declared(&self) -> impl Iterator<Item = (&String, &String)> {
        self.declared.iter()
    }
}

fn is_xml_name(local: &str) -> bool {
    let mut chars = local.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.'))
}
