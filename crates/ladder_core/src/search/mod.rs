//! Search collaborator boundary, index mappings and document forms.
//!
//! # Responsibility
//! - Define the `SearchIndex` trait the core queries through.
//! - Build per-model index mappings and the documents sent for indexing.
//! - Ship a SQLite FTS5 implementation of the trait.
//!
//! # See also
//! - `similarity` for the queries built on top of this boundary.

pub mod document;
pub mod fts;
pub mod mapping;

use crate::db::DbError;
use crate::model::descriptor::ModelKey;
use crate::model::record::RecordId;
use mapping::IndexMapping;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use document::{IndexForm, Indexable};
pub use fts::SqliteSearchIndex;
pub use mapping::{build_mapping, MappingCache};

/// Result type for search APIs.
pub type SearchResult<T> = Result<T, SearchError>;

/// Search-layer error for query building, DB interaction and row decoding.
#[derive(Debug)]
pub enum SearchError {
    InvalidQuery { query: String, message: String },
    /// No mapping stored for the model.
    UnknownModel(ModelKey),
    Db(DbError),
    InvalidData(String),
}

impl Display for SearchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidQuery { query, message } => {
                write!(f, "invalid full-text query `{query}`: {message}")
            }
            Self::UnknownModel(key) => write!(f, "no index mapping for model {key}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid search row: {message}"),
        }
    }
}

impl Error for SearchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidQuery { .. } | Self::UnknownModel(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for SearchError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for SearchError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Optional full-text clause on one `group.field` path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldClause {
    pub field: String,
    pub text: String,
}

/// "More like this" query: any clause may match, listed ids never do.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityQuery {
    pub namespace: String,
    pub model: String,
    pub should: Vec<FieldClause>,
    pub must_not: Vec<RecordId>,
    pub min_score: f64,
    pub limit: usize,
}

/// One scored search result.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredHit {
    pub id: RecordId,
    pub score: f64,
}

/// Search collaborator used by the core.
pub trait SearchIndex {
    /// Stores or replaces the mapping of one model.
    fn put_mapping(&self, mapping: &IndexMapping) -> SearchResult<()>;

    /// Indexes (or re-indexes) one document of a model.
    fn index_document(&self, key: &ModelKey, id: RecordId, document: &Value) -> SearchResult<()>;

    fn remove_document(&self, id: RecordId) -> SearchResult<()>;

    fn similar(&self, query: &SimilarityQuery) -> SearchResult<Vec<ScoredHit>>;

    /// Exact value counts of one raw field, most frequent first.
    fn facet_counts(&self, key: &ModelKey, field: &str) -> SearchResult<Vec<(String, u64)>>;
}
