//! RDF statement model for the graph view of records.
//!
//! # Responsibility
//! - Define terms, statements and ordered in-memory graphs.
//! - Host the graph synchronizer and the graph-level exports.
//!
//! # Invariants
//! - A `Graph` never holds the same statement twice.
//! - Predicates are absolute IRIs.
//! - Iteration order over a graph is deterministic.

pub mod export;
pub mod sync;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// `rdf:type` predicate IRI.
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// Literal value with an optional language tag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Literal {
    pub value: String,
    pub language: Option<String>,
}

impl Literal {
    pub fn plain(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            language: None,
        }
    }

    pub fn tagged(value: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            language: Some(language.into()),
        }
    }
}

/// Subject or object position of a statement.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Term {
    Iri(String),
    /// Anonymous node, identified by its graph-local label.
    Blank(String),
    Literal(Literal),
}

impl Term {
    pub fn iri(value: impl Into<String>) -> Self {
        Self::Iri(value.into())
    }

    pub fn blank(label: impl Into<String>) -> Self {
        Self::Blank(label.into())
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(Literal::plain(value))
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Blank(_))
    }

    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Self::Iri(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Lexical form used when a term is stored as a plain attribute value.
    pub fn lexical(&self) -> &str {
        match self {
            Self::Iri(value) | Self::Blank(value) => value.as_str(),
            Self::Literal(literal) => literal.value.as_str(),
        }
    }
}

impl Display for Term {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Iri(value) => write!(f, "<{value}>"),
            Self::Blank(label) => write!(f, "_:{label}"),
            Self::Literal(Literal {
                value,
                language: Some(lang),
            }) => write!(f, "{value:?}@{lang}"),
            Self::Literal(Literal {
                value,
                language: None,
            }) => write!(f, "{value:?}"),
        }
    }
}

/// One RDF triple.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Statement {
    pub subject: Term,
    pub predicate: String,
    pub object: Term,
}

impl Statement {
    pub fn new(subject: Term, predicate: impl Into<String>, object: Term) -> Self {
        Self {
            subject,
            predicate: predicate.into(),
            object,
        }
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <{}> {} .", self.subject, self.predicate, self.object)
    }
}

/// Ordered, duplicate-free statement set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    statements: BTreeSet<Statement>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts one statement; returns `false` when it was already present.
    pub fn insert(&mut self, statement: Statement) -> bool {
        self.statements.insert(statement)
    }

    pub fn contains(&self, statement: &Statement) -> bool {
        self.statements.contains(statement)
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn clear(&mut self) {
        self.statements.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Statement> {
        self.statements.iter()
    }

    /// Statements whose subject equals `subject`, in graph order.
    pub fn about<'a>(&'a self, subject: &'a Term) -> impl Iterator<Item = &'a Statement> + 'a {
        self.statements
            .iter()
            .filter(move |statement| &statement.subject == subject)
    }

    /// Objects for one `(subject, predicate)` pair.
    pub fn objects<'a>(
        &'a self,
        subject: &'a Term,
        predicate: &'a str,
    ) -> impl Iterator<Item = &'a Term> + 'a {
        self.about(subject)
            .filter(move |statement| statement.predicate == predicate)
            .map(|statement| &statement.object)
    }

    /// Distinct subjects in graph order.
    pub fn subjects(&self) -> Vec<&Term> {
        let mut seen = BTreeSet::new();
        self.statements
            .iter()
            .map(|statement| &statement.subject)
            .filter(|subject| seen.insert(*subject))
            .collect()
    }

    /// Keeps only statements matching `keep`.
    pub fn retain(&mut self, keep: impl FnMut(&Statement) -> bool) {
        self.statements.retain(keep);
    }

    /// Copies every statement of `other` into this graph.
    pub fn merge(&mut self, other: &Graph) {
        for statement in other.iter() {
            self.statements.insert(statement.clone());
        }
    }
}

impl FromIterator<Statement> for Graph {
    fn from_iter<I: IntoIterator<Item = Statement>>(iter: I) -> Self {
        Self {
            statements: iter.into_iter().collect(),
        }
    }
}

impl Extend<Statement> for Graph {
    fn extend<I: IntoIterator<Item = Statement>>(&mut self, iter: I) {
        self.statements.extend(iter);
    }
}

impl<'a> IntoIterator for &'a Graph {
    type Item = &'a Statement;
    type IntoIter = std::collections::btree_set::Iter<'a, Statement>;

    fn into_iter(self) -> Self::IntoIter {
        self.statements.iter()
    }
}
