//! Graph synchronizer: reconciles record attributes with RDF statements.
//!
//! # Responsibility
//! - Ingest statements into records, defining dynamic fields on demand.
//! - Derive the statements of a record from its attributes.
//! - Import a graph rooted at one node as a record plus embedded records.
//!
//! # Invariants
//! - Statically declared types are never stored as pending types.
//! - Ingesting the same statement twice changes nothing the second time.
//! - Derivation visits each record at most once, so relation cycles end.
//!
//! # See also
//! - `model::fields` for dynamic property definition.

use crate::graph::{Graph, Statement, Term, RDF_TYPE};
use crate::model::factory::ModelRegistry;
use crate::model::fields::PropertyOptions;
use crate::model::record::{subject_iri, FieldValue, Record, RecordId};
use crate::model::ModelDescriptor;
use crate::vocab::VocabularyRegistry;
use log::debug;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// What ingesting one statement did to a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Object was a statically declared type.
    Discarded,
    /// Object was a blank node; kept in the graph for relation handling.
    Relation,
    TypeAsserted { added: bool },
    /// Value written through `field`; `defined` when the field was created
    /// for this statement.
    Stored { field: String, defined: bool },
    /// Predicate does not resolve, or the subject is not the record.
    GraphOnly,
}

impl IngestOutcome {
    fn label(&self) -> &'static str {
        match self {
            Self::Discarded => "discarded",
            Self::Relation => "relation",
            Self::TypeAsserted { .. } => "type",
            Self::Stored { .. } => "stored",
            Self::GraphOnly => "graph_only",
        }
    }
}

/// Lookup of related records during derivation.
pub trait RecordSource {
    fn record(&self, id: RecordId) -> Option<&Record>;
}

impl RecordSource for BTreeMap<RecordId, Record> {
    fn record(&self, id: RecordId) -> Option<&Record> {
        self.get(&id)
    }
}

impl RecordSource for HashMap<RecordId, Record> {
    fn record(&self, id: RecordId) -> Option<&Record> {
        self.get(&id)
    }
}

impl RecordSource for Vec<Record> {
    fn record(&self, id: RecordId) -> Option<&Record> {
        self.iter().find(|record| record.id() == id)
    }
}

/// Result of [`GraphSynchronizer::records_from_graph`].
#[derive(Debug, Clone)]
pub struct GraphImport {
    pub root: Record,
    /// One record per blank node reachable from the root.
    pub embedded: Vec<Record>,
}

/// Statement ingestion against one vocabulary registry.
#[derive(Debug, Clone)]
pub struct GraphSynchronizer {
    vocabularies: Arc<VocabularyRegistry>,
}

impl GraphSynchronizer {
    pub fn new(vocabularies: Arc<VocabularyRegistry>) -> Self {
        Self { vocabularies }
    }

    pub fn vocabularies(&self) -> &VocabularyRegistry {
        &self.vocabularies
    }

    /// Ingests one statement into `record`.
    ///
    /// Rules apply in order, first match wins: static type object,
    /// blank-node object, `rdf:type`, field definition, value write. Every
    /// statement that is not discarded lands in the record's graph view.
    /// A statement about any other subject, blank or not, is forwarded to
    /// the graph view only.
    pub fn ingest_statement(&self, record: &mut Record, statement: Statement) -> IngestOutcome {
        let outcome = if statement.subject != record.subject() {
            record.graph_mut().insert(statement);
            IngestOutcome::GraphOnly
        } else {
            self.apply(record, &statement.predicate, statement.object)
        };
        debug!(
            "event=statement_ingest module=sync status=ok record={} outcome={}",
            record.id(),
            outcome.label()
        );
        outcome
    }

    /// Ingests every statement of `graph` whose subject is `subject`.
    pub fn ingest_graph(
        &self,
        record: &mut Record,
        graph: &Graph,
        subject: &Term,
    ) -> Vec<IngestOutcome> {
        graph
            .about(subject)
            .map(|statement| self.ingest_statement(record, statement.clone()))
            .collect()
    }

    fn apply(&self, record: &mut Record, predicate: &str, object: Term) -> IngestOutcome {
        if let Term::Iri(iri) = &object {
            if record.descriptor().declares_type(iri) {
                return IngestOutcome::Discarded;
            }
        }

        let subject = record.subject();
        if object.is_blank() {
            record
                .graph_mut()
                .insert(Statement::new(subject, predicate, object));
            return IngestOutcome::Relation;
        }

        if predicate == RDF_TYPE {
            let added = record.assert_type(object.lexical());
            return IngestOutcome::TypeAsserted { added };
        }

        let mut defined = false;
        if record.fields().for_predicate(predicate).is_none() {
            let local = self
                .vocabularies
                .qname(predicate)
                .map(|(_, local)| local.to_string())
                .unwrap_or_default();
            defined = record
                .define_property(&local, predicate, &PropertyOptions::default(), &self.vocabularies)
                .is_some();
        }

        let binding = record
            .fields()
            .dynamic_for_predicate(predicate)
            .or_else(|| record.fields().for_predicate(predicate))
            .cloned();

        let outcome = match (binding, FieldValue::from_term(&object)) {
            (Some(binding), Some(value)) => {
                if binding.multiple {
                    record.push_at(&binding.prefix, &binding.local, value);
                } else {
                    record.write_values(&binding.prefix, &binding.local, vec![value]);
                }
                IngestOutcome::Stored {
                    field: binding.name,
                    defined,
                }
            }
            _ => IngestOutcome::GraphOnly,
        };

        record
            .graph_mut()
            .insert(Statement::new(subject, predicate, object));
        outcome
    }

    /// Imports the node `root` of `graph` as a record of `descriptor`.
    ///
    /// Blank-node objects become embedded records when the predicate is a
    /// relation slot of the parent's model, or when one of the node's types
    /// is declared by a model in the same namespace.
    pub fn records_from_graph(
        &self,
        graph: &Graph,
        root: &Term,
        descriptor: Arc<ModelDescriptor>,
        models: &ModelRegistry,
    ) -> GraphImport {
        let mut embedded = Vec::new();
        let mut visited = BTreeSet::new();
        let root = self.import_node(graph, root, descriptor, models, &mut embedded, &mut visited);
        GraphImport { root, embedded }
    }

    fn import_node(
        &self,
        graph: &Graph,
        node: &Term,
        descriptor: Arc<ModelDescriptor>,
        models: &ModelRegistry,
        embedded: &mut Vec<Record>,
        visited: &mut BTreeSet<Term>,
    ) -> Record {
        visited.insert(node.clone());
        let mut record = Record::new(descriptor.clone());

        for statement in graph.about(node) {
            let outcome = self.apply(&mut record, &statement.predicate, statement.object.clone());
            if outcome != IngestOutcome::Relation || visited.contains(&statement.object) {
                continue;
            }
            let Some(target) =
                embedded_descriptor(graph, &statement.object, &statement.predicate, &descriptor, models)
            else {
                continue;
            };

            let child = self.import_node(graph, &statement.object, target, models, embedded, visited);
            link_embedded(&mut record, &statement.predicate, child.id());
            embedded.push(child);
        }

        record
    }
}

fn embedded_descriptor(
    graph: &Graph,
    node: &Term,
    predicate: &str,
    parent: &ModelDescriptor,
    models: &ModelRegistry,
) -> Option<Arc<ModelDescriptor>> {
    if let Some(relation) = parent.relation_for_predicate(predicate) {
        if let Some(target) = models.get(parent.namespace(), &relation.target) {
            return Some(target);
        }
    }

    let types: Vec<&str> = graph
        .objects(node, RDF_TYPE)
        .filter_map(Term::as_iri)
        .collect();
    models
        .models_in(parent.namespace())
        .into_iter()
        .find(|candidate| types.iter().any(|uri| candidate.declares_type(uri)))
}

fn link_embedded(record: &mut Record, predicate: &str, child: RecordId) {
    let relation = record
        .descriptor()
        .relation_for_predicate(predicate)
        .map(|relation| relation.name.clone());
    if let Some(relation) = relation {
        if let Err(err) = record.relate(&relation, child) {
            debug!("event=embedded_link module=sync status=skip relation={relation} error={err}");
        }
    } else if let Some(binding) = record.fields().for_predicate(predicate).cloned() {
        record.push_at(&binding.prefix, &binding.local, FieldValue::Ref(child));
    }
    let subject = record.subject();
    record
        .graph_mut()
        .insert(Statement::new(subject, predicate, Term::Iri(subject_iri(child))));
}

/// Rebuilds the statements of `record` from its attributes.
///
/// With `related`, statements of every reachable related record are
/// included; each record is visited once.
pub fn derive_statements(record: &Record, related: Option<&dyn RecordSource>) -> Graph {
    let mut graph = Graph::new();
    let mut visited = BTreeSet::new();
    derive_into(record, related, &mut graph, &mut visited);
    graph
}

fn derive_into(
    record: &Record,
    related: Option<&dyn RecordSource>,
    graph: &mut Graph,
    visited: &mut BTreeSet<RecordId>,
) {
    if !visited.insert(record.id()) {
        return;
    }

    let subject = record.subject();
    for uri in record.effective_types() {
        graph.insert(Statement::new(subject.clone(), RDF_TYPE, Term::Iri(uri)));
    }

    for (prefix, group) in record.vocab_groups() {
        for (local, values) in group {
            let Some(predicate) = predicate_for(record, prefix, local) else {
                continue;
            };
            for value in values {
                graph.insert(Statement::new(subject.clone(), predicate.clone(), value.to_term()));
            }
        }
    }

    let mut pending = Vec::new();
    for spec in record.descriptor().relations() {
        for id in record.related(&spec.name) {
            graph.insert(Statement::new(
                subject.clone(),
                spec.predicate.clone(),
                Term::Iri(subject_iri(*id)),
            ));
            pending.push(*id);
        }
    }

    if let Some(source) = related {
        for id in pending {
            if let Some(other) = source.record(id) {
                derive_into(other, related, graph, visited);
            }
        }
    }
}

fn predicate_for(record: &Record, prefix: &str, local: &str) -> Option<String> {
    record
        .fields()
        .iter()
        .find(|binding| binding.prefix == prefix && binding.local == local)
        .map(|binding| binding.predicate.clone())
        .or_else(|| {
            record
                .descriptor()
                .binding(prefix)
                .map(|binding| format!("{}{}", binding.uri, local))
        })
}

#[cfg(test)]
mod tests {
    use super::{derive_statements, GraphSynchronizer, IngestOutcome};
    use crate::graph::{Graph, Statement, Term, RDF_TYPE};
    use crate::model::descriptor::{ModelDescriptor, VocabBinding};
    use crate::model::factory::{ModelDefinition, ModelRegistry};
    use crate::model::record::{FieldValue, Record};
    use crate::vocab::VocabularyRegistry;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    const DC: &str = "http://purl.org/dc/terms/";
    const BIBLIOGRAPHIC: &str = "http://purl.org/dc/terms/BibliographicResource";

    fn setup() -> (GraphSynchronizer, Arc<ModelDescriptor>) {
        let vocabularies = Arc::new(VocabularyRegistry::builtin());
        let descriptor = ModelDescriptor::new(
            "Ltest",
            "Resource",
            vec![VocabBinding::only(vocabularies.get("dc").unwrap(), ["title"])],
            vec![BIBLIOGRAPHIC.to_string()],
        );
        (GraphSynchronizer::new(vocabularies), Arc::new(descriptor))
    }

    fn about(record: &Record, predicate: &str, object: Term) -> Statement {
        Statement::new(record.subject(), predicate, object)
    }

    #[test]
    fn static_type_objects_are_discarded() {
        let (sync, descriptor) = setup();
        let mut record = Record::new(descriptor);
        let statement = about(&record, RDF_TYPE, Term::iri(BIBLIOGRAPHIC));

        assert_eq!(sync.ingest_statement(&mut record, statement), IngestOutcome::Discarded);
        assert!(record.types().is_empty());
    }

    #[test]
    fn unknown_predicate_defines_field_once() {
        let (sync, descriptor) = setup();
        let mut record = Record::new(descriptor);
        let statement = about(&record, &format!("{DC}alternative"), Term::literal("Comet"));

        let first = sync.ingest_statement(&mut record, statement.clone());
        let second = sync.ingest_statement(&mut record, statement);

        assert_eq!(
            first,
            IngestOutcome::Stored {
                field: "alternative".to_string(),
                defined: true
            }
        );
        assert_eq!(
            second,
            IngestOutcome::Stored {
                field: "alternative".to_string(),
                defined: false
            }
        );
        assert_eq!(record.context().len(), 1);
        assert_eq!(record.get("alternative").unwrap(), [FieldValue::plain("Comet")]);
    }

    #[test]
    fn unresolvable_predicate_only_reaches_graph() {
        let (sync, descriptor) = setup();
        let mut record = Record::new(descriptor);
        let statement = about(&record, "http://unknown.example/ns#odd", Term::literal("x"));

        assert_eq!(
            sync.ingest_statement(&mut record, statement.clone()),
            IngestOutcome::GraphOnly
        );
        assert!(record.context().is_empty());
        assert!(record.graph().contains(&statement));
    }

    #[test]
    fn statements_about_other_subjects_only_reach_graph() {
        let (sync, descriptor) = setup();
        let mut record = Record::new(descriptor);
        let statement = Statement::new(
            Term::iri("http://other.example/x"),
            format!("{DC}title"),
            Term::literal("Not mine"),
        );

        assert_eq!(
            sync.ingest_statement(&mut record, statement.clone()),
            IngestOutcome::GraphOnly
        );
        assert!(record.get("title").unwrap().is_empty());
        assert!(record.context().is_empty());
        assert!(record.graph().contains(&statement));
    }

    #[test]
    fn repeated_type_statement_is_asserted_once() {
        let (sync, descriptor) = setup();
        let mut record = Record::new(descriptor);
        let book = "http://purl.org/ontology/bibo/Book";
        let statement = about(&record, RDF_TYPE, Term::iri(book));

        assert_eq!(
            sync.ingest_statement(&mut record, statement.clone()),
            IngestOutcome::TypeAsserted { added: true }
        );
        assert_eq!(
            sync.ingest_statement(&mut record, statement.clone()),
            IngestOutcome::TypeAsserted { added: false }
        );
        assert_eq!(record.types(), [book.to_string()]);
        assert!(record.graph().contains(&statement));
    }

    #[test]
    fn blank_objects_are_kept_as_relations() {
        let (sync, descriptor) = setup();
        let mut record = Record::new(descriptor);
        let statement = about(&record, &format!("{DC}creator"), Term::blank("b0"));

        assert_eq!(
            sync.ingest_statement(&mut record, statement.clone()),
            IngestOutcome::Relation
        );
        assert!(record.graph().contains(&statement));
        assert!(record.vocab_groups().is_empty());
    }

    #[test]
    fn derive_statements_terminates_on_relation_cycles() {
        let (_, descriptor) = setup();
        let mut a = Record::new(descriptor.clone());
        let mut b = Record::new(descriptor);
        a.push("title", FieldValue::plain("A")).unwrap();
        b.push("title", FieldValue::plain("B")).unwrap();
        a.relate("resource", b.id()).unwrap();
        b.relate("resource", a.id()).unwrap();

        let mut source = BTreeMap::new();
        source.insert(b.id(), b.clone());
        source.insert(a.id(), a.clone());

        let graph = derive_statements(&a, Some(&source));
        assert!(graph.contains(&Statement::new(
            b.subject(),
            format!("{DC}title"),
            Term::literal("B")
        )));
        assert_eq!(graph.subjects().len(), 2);
    }

    #[test]
    fn records_from_graph_embeds_blank_nodes_as_related_records() {
        let vocabularies = Arc::new(VocabularyRegistry::builtin());
        let models = ModelRegistry::new(vocabularies.clone());
        let resource = models
            .define_model(&ModelDefinition::new(
                "Resource",
                "Ltest",
                ["dc"],
                ["dc.BibliographicResource"],
            ))
            .unwrap();
        models
            .define_model(&ModelDefinition::new("Agent", "Ltest", ["foaf"], ["foaf.Person"]))
            .unwrap();
        let sync = GraphSynchronizer::new(vocabularies);

        let root = Term::iri("http://example.org/resource/1");
        let person = Term::blank("p1");
        let graph: Graph = vec![
            Statement::new(root.clone(), format!("{DC}title"), Term::literal("Moominsummer Madness")),
            Statement::new(root.clone(), format!("{DC}creator"), person.clone()),
            Statement::new(
                person.clone(),
                RDF_TYPE,
                Term::iri("http://xmlns.com/foaf/0.1/Person"),
            ),
            Statement::new(person, "http://xmlns.com/foaf/0.1/name", Term::literal("Tove Jansson")),
        ]
        .into_iter()
        .collect();

        let import = sync.records_from_graph(&graph, &root, resource, &models);
        assert_eq!(import.embedded.len(), 1);
        let agent = &import.embedded[0];
        assert_eq!(agent.get("name").unwrap(), [FieldValue::plain("Tove Jansson")]);
        assert_eq!(import.root.related("agent"), [agent.id()]);
        assert!(agent.types().is_empty());
    }
}
