//! Similarity and duplicate detection over canonical record forms.
//!
//! # Responsibility
//! - Build full-text similarity queries from a record's canonical form.
//! - Report candidates whose canonical content matches exactly.
//! - Score pairs of records with plain string-similarity algorithms.
//!
//! # Invariants
//! - A record never appears in its own similarity results.
//! - Results are ordered by descending score, ties by id.
//! - Query clauses never contain search-syntax punctuation.

pub mod algorithms;

use crate::model::record::RecordId;
use crate::normalize::{diff, normalize_with, IdPolicy, Normalizable};
use crate::search::mapping::IndexMapping;
use crate::search::{FieldClause, ScoredHit, SearchIndex, SearchResult, SimilarityQuery};
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

pub use algorithms::{soundex, Algorithm, UnknownAlgorithm};

static QUERY_PUNCTUATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[-+!(){}\[\]^"~*?:;,.\\]|&&|\|\|"#).expect("punctuation regex must compile")
});

/// Score floor and result cap for similarity queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilaritySettings {
    /// Hits must score strictly above this value.
    pub min_score: f64,
    pub limit: usize,
}

impl Default for SimilaritySettings {
    fn default() -> Self {
        Self {
            min_score: 0.0,
            limit: 20,
        }
    }
}

/// Removes query-syntax punctuation from free text.
pub fn strip_query_punctuation(text: &str) -> String {
    QUERY_PUNCTUATION.replace_all(text, "").into_owned()
}

/// Leaf scalars of a canonical value joined with single spaces.
pub fn flatten_tokens(value: &Value) -> String {
    let mut tokens = Vec::new();
    collect_tokens(value, &mut tokens);
    tokens.join(" ")
}

fn collect_tokens(value: &Value, tokens: &mut Vec<String>) {
    match value {
        Value::Null => {}
        Value::String(text) => {
            if !text.trim().is_empty() {
                tokens.push(text.trim().to_string());
            }
        }
        Value::Bool(flag) => tokens.push(flag.to_string()),
        Value::Number(number) => tokens.push(number.to_string()),
        Value::Array(items) => items.iter().for_each(|item| collect_tokens(item, tokens)),
        Value::Object(object) => object
            .iter()
            .filter(|(key, _)| key.as_str() != "@language")
            .for_each(|(_, item)| collect_tokens(item, tokens)),
    }
}

/// One optional clause per non-empty `group.field` of the canonical form,
/// for every group the index stores field by field.
pub fn similarity_clauses(document: &Value, mapping: &IndexMapping) -> Vec<FieldClause> {
    let groups = mapping.group_names(document);
    let canonical = normalize_with(document, &IdPolicy::Omit, Some(&groups));
    let Some(groups) = canonical.as_object() else {
        return Vec::new();
    };

    let mut clauses = Vec::new();
    for (prefix, group) in groups {
        let Some(fields) = group.as_object() else {
            continue;
        };
        for (local, values) in fields {
            let text = strip_query_punctuation(&flatten_tokens(values));
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            if text.is_empty() {
                continue;
            }
            clauses.push(FieldClause {
                field: format!("{prefix}.{local}"),
                text,
            });
        }
    }
    clauses
}

/// Similarity queries against one search index.
pub struct SimilarityEngine<'a, I: SearchIndex + ?Sized> {
    index: &'a I,
    settings: SimilaritySettings,
}

impl<'a, I: SearchIndex + ?Sized> SimilarityEngine<'a, I> {
    pub fn new(index: &'a I, settings: SimilaritySettings) -> Self {
        Self { index, settings }
    }

    pub fn settings(&self) -> SimilaritySettings {
        self.settings
    }

    /// Builds the query `find_similar` sends to the index.
    pub fn query_for<N: Normalizable + ?Sized>(
        &self,
        id: RecordId,
        value: &N,
        mapping: &IndexMapping,
    ) -> SimilarityQuery {
        SimilarityQuery {
            namespace: mapping.namespace.clone(),
            model: mapping.model.clone(),
            should: similarity_clauses(&value.document(), mapping),
            must_not: vec![id],
            min_score: self.settings.min_score,
            limit: self.settings.limit,
        }
    }

    /// Records of the same model whose content resembles `value`.
    pub fn find_similar<N: Normalizable + ?Sized>(
        &self,
        id: RecordId,
        value: &N,
        mapping: &IndexMapping,
    ) -> SearchResult<Vec<ScoredHit>> {
        let query = self.query_for(id, value, mapping);
        if query.should.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<ScoredHit> = self
            .index
            .similar(&query)?
            .into_iter()
            .filter(|hit| hit.id != id && hit.score > query.min_score)
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(query.limit);

        info!(
            "event=similarity_query module=similarity status=ok model={}::{} clauses={} hits={}",
            query.namespace,
            query.model,
            query.should.len(),
            hits.len()
        );
        Ok(hits)
    }

    /// Similar records whose canonical content has no differences.
    ///
    /// `load` returns the stored document of a candidate id.
    pub fn exact_duplicates<N, F>(
        &self,
        id: RecordId,
        value: &N,
        mapping: &IndexMapping,
        mut load: F,
    ) -> SearchResult<Vec<RecordId>>
    where
        N: Normalizable + ?Sized,
        F: FnMut(RecordId) -> Option<Value>,
    {
        let document = value.document();
        let hits = self.find_similar(id, value, mapping)?;
        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                let candidate = load(hit.id)?;
                diff(&document, &candidate).is_empty().then_some(hit.id)
            })
            .collect())
    }
}

/// Scores two values with each requested algorithm over their flattened
/// `omit` canonical forms.
pub fn string_similarity<A, B>(a: &A, b: &B, algorithms: &[Algorithm]) -> Vec<(Algorithm, f64)>
where
    A: Normalizable + ?Sized,
    B: Normalizable + ?Sized,
{
    let left = flatten_tokens(&a.normalized(&IdPolicy::Omit));
    let right = flatten_tokens(&b.normalized(&IdPolicy::Omit));
    algorithms
        .iter()
        .map(|algorithm| (*algorithm, algorithm.score(&left, &right)))
        .collect()
}
