//! SQLite FTS5-based search index.
//!
//! # Responsibility
//! - Store per-model index mappings and route document fields by them.
//! - Answer "more like this" queries with bm25-ranked, boosted scores.
//! - Count exact values for facets.
//!
//! # Invariants
//! - Re-indexing a record replaces all of its previous rows.
//! - Group fields are stored as `group.field`, whether mapped or templated.
//! - Each clause is matched only against its own field of its own model.
//! - Result ordering is deterministic by score then id.

use super::mapping::{is_group, FieldMapping, IndexMapping};
use super::{ScoredHit, SearchError, SearchIndex, SearchResult, SimilarityQuery};
use crate::db::DbError;
use crate::model::descriptor::ModelKey;
use crate::model::record::RecordId;
use crate::similarity::flatten_tokens;
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Search index backed by the `search_*` tables of a catalog database.
pub struct SqliteSearchIndex<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSearchIndex<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Stored mapping of one model.
    pub fn mapping(&self, key: &ModelKey) -> SearchResult<IndexMapping> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT mapping_json FROM index_mappings WHERE model_key = ?1;",
                params![key.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let json = json.ok_or_else(|| SearchError::UnknownModel(key.clone()))?;
        serde_json::from_str(&json)
            .map_err(|err| SearchError::InvalidData(format!("mapping of {key}: {err}")))
    }

    /// Number of full-text rows stored for a record.
    pub fn indexed_row_count(&self, id: RecordId) -> SearchResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT (SELECT COUNT(*) FROM search_fts WHERE record_id = ?1)
                  + (SELECT COUNT(*) FROM search_raw WHERE record_id = ?1);",
            params![id.to_string()],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn insert_text(&self, key: &str, id: &str, field: &str, text: &str) -> SearchResult<()> {
        if text.trim().is_empty() {
            return Ok(());
        }
        self.conn.execute(
            "INSERT INTO search_fts (record_id, model, field, body) VALUES (?1, ?2, ?3, ?4);",
            params![id, key, field, text],
        )?;
        Ok(())
    }

    fn insert_raw(&self, key: &str, id: &str, field: &str, value: &Value) -> SearchResult<()> {
        for token in raw_values(value) {
            self.conn.execute(
                "INSERT INTO search_raw (record_id, model, field, value) VALUES (?1, ?2, ?3, ?4);",
                params![id, key, field, token],
            )?;
        }
        Ok(())
    }

    fn route(
        &self,
        key: &str,
        id: &str,
        field: &str,
        mapping: &FieldMapping,
        value: &Value,
    ) -> SearchResult<()> {
        match (mapping, value) {
            (FieldMapping::Object, Value::Object(entries)) => {
                for (local, values) in entries {
                    self.insert_text(key, id, &format!("{field}.{local}"), &flatten_tokens(values))?;
                }
                Ok(())
            }
            (FieldMapping::Object, other) => self.insert_text(key, id, field, &flatten_tokens(other)),
            (mapping, Value::Object(entries)) if is_group(value) => {
                for (local, values) in entries {
                    self.route(key, id, &format!("{field}.{local}"), mapping, values)?;
                }
                Ok(())
            }
            (mapping, value) => {
                if mapping.is_full_text() {
                    self.insert_text(key, id, field, &flatten_tokens(value))?;
                }
                if mapping.is_exact() {
                    self.insert_raw(key, id, field, value)?;
                }
                Ok(())
            }
        }
    }

    fn clause_scores(
        &self,
        model: &str,
        field: &str,
        match_expr: &str,
        boost: f64,
        scores: &mut BTreeMap<String, f64>,
    ) -> SearchResult<()> {
        let mut stmt = self.conn.prepare(
            "SELECT record_id, bm25(search_fts) AS relevance
             FROM search_fts
             WHERE search_fts MATCH ?1
               AND model = ?2
               AND field = ?3;",
        )?;
        let mut rows = stmt
            .query(params![match_expr, model, field])
            .map_err(|err| map_query_error(err, match_expr))?;

        while let Some(row) = rows.next().map_err(|err| map_query_error(err, match_expr))? {
            let id: String = row.get("record_id")?;
            let rank: f64 = row.get("relevance")?;
            // bm25() is negative; better matches are smaller.
            *scores.entry(id).or_insert(0.0) += -rank * boost;
        }
        Ok(())
    }
}

impl SearchIndex for SqliteSearchIndex<'_> {
    fn put_mapping(&self, mapping: &IndexMapping) -> SearchResult<()> {
        let json = serde_json::to_string(mapping)
            .map_err(|err| SearchError::InvalidData(format!("mapping: {err}")))?;
        self.conn.execute(
            "INSERT INTO index_mappings (model_key, mapping_json) VALUES (?1, ?2)
             ON CONFLICT(model_key) DO UPDATE SET mapping_json = excluded.mapping_json;",
            params![mapping.key().to_string(), json],
        )?;
        info!(
            "event=mapping_put module=search status=ok model={} properties={}",
            mapping.key(),
            mapping.properties.len()
        );
        Ok(())
    }

    fn index_document(&self, key: &ModelKey, id: RecordId, document: &Value) -> SearchResult<()> {
        let mapping = self.mapping(key)?;
        let Some(object) = document.as_object() else {
            return Err(SearchError::InvalidData(format!(
                "document of {id} is not an object"
            )));
        };

        let tx = self.conn.unchecked_transaction()?;
        self.remove_document(id)?;

        let model = key.to_string();
        let record_id = id.to_string();
        for (field, value) in object {
            if !mapping.indexes_field(field) {
                continue;
            }
            let Some(field_mapping) = mapping.resolve(field) else {
                continue;
            };
            self.route(&model, &record_id, field, field_mapping, value)?;
        }
        tx.commit()?;

        debug!("event=document_index module=search status=ok model={model} id={record_id}");
        Ok(())
    }

    fn remove_document(&self, id: RecordId) -> SearchResult<()> {
        let record_id = id.to_string();
        self.conn
            .execute("DELETE FROM search_fts WHERE record_id = ?1;", params![record_id])?;
        self.conn
            .execute("DELETE FROM search_raw WHERE record_id = ?1;", params![record_id])?;
        Ok(())
    }

    fn similar(&self, query: &SimilarityQuery) -> SearchResult<Vec<ScoredHit>> {
        if query.limit == 0 || query.should.is_empty() {
            return Ok(Vec::new());
        }
        let key = ModelKey::new(query.namespace.clone(), query.model.clone());
        let mapping = self.mapping(&key)?;
        let model = key.to_string();

        let mut scores = BTreeMap::new();
        for clause in &query.should {
            let Some(match_expr) = build_match_expression(&clause.text) else {
                continue;
            };
            let top_level = clause.field.split('.').next().unwrap_or(&clause.field);
            let boost = mapping.boost(top_level);
            self.clause_scores(&model, &clause.field, &match_expr, boost, &mut scores)?;
        }

        let excluded: Vec<String> = query.must_not.iter().map(Uuid::to_string).collect();
        let mut hits = Vec::new();
        for (id, score) in scores {
            if excluded.contains(&id) || score <= query.min_score {
                continue;
            }
            let id = Uuid::parse_str(&id)
                .map_err(|_| SearchError::InvalidData(format!("invalid uuid `{id}`")))?;
            hits.push(ScoredHit { id, score });
        }
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(query.limit);
        Ok(hits)
    }

    fn facet_counts(&self, key: &ModelKey, field: &str) -> SearchResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT value, COUNT(*) AS hits
             FROM search_raw
             WHERE model = ?1 AND field = ?2
             GROUP BY value
             ORDER BY hits DESC, value ASC;",
        )?;
        let rows = stmt.query_map(params![key.to_string(), field], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = Vec::new();
        for row in rows {
            let (value, hits) = row?;
            counts.push((value, u64::try_from(hits).unwrap_or(0)));
        }
        Ok(counts)
    }
}

/// Verbatim scalar values of a raw field.
fn raw_values(value: &Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::String(text) => vec![text.clone()],
        Value::Bool(flag) => vec![flag.to_string()],
        Value::Number(number) => vec![number.to_string()],
        Value::Array(items) => items.iter().flat_map(raw_values).collect(),
        Value::Object(object) => match (object.get("@value"), object.get("@id")) {
            (Some(inner), _) | (None, Some(inner)) => raw_values(inner),
            (None, None) => object.values().flat_map(raw_values).collect(),
        },
    }
}

/// Any-term match expression; `None` for blank text.
fn build_match_expression(text: &str) -> Option<String> {
    let terms = text
        .split_whitespace()
        .map(escape_fts_term)
        .collect::<Vec<_>>();
    if terms.is_empty() {
        return None;
    }
    Some(terms.join(" OR "))
}

fn escape_fts_term(raw: &str) -> String {
    let escaped = raw.replace('"', "\"\"");
    format!("\"{escaped}\"")
}

fn map_query_error(err: rusqlite::Error, query: &str) -> SearchError {
    if is_match_syntax_error(&err) {
        return SearchError::InvalidQuery {
            query: query.to_string(),
            message: err.to_string(),
        };
    }

    SearchError::Db(DbError::Sqlite(err))
}

fn is_match_syntax_error(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => {
            let msg = message.to_lowercase();
            (msg.contains("fts5") && msg.contains("syntax"))
                || msg.contains("malformed match expression")
                || msg.contains("unterminated")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{build_match_expression, escape_fts_term, raw_values};
    use serde_json::json;

    #[test]
    fn match_expression_ors_quoted_terms() {
        assert_eq!(
            build_match_expression("Comet  Moominland").as_deref(),
            Some("\"Comet\" OR \"Moominland\"")
        );
        assert_eq!(build_match_expression("   "), None);
    }

    #[test]
    fn quotes_are_doubled() {
        assert_eq!(escape_fts_term("say\"hi"), "\"say\"\"hi\"");
    }

    #[test]
    fn raw_values_unwrap_literals_and_iris() {
        let value = json!(["a", {"@value": "b", "@language": "en"}, {"@id": "http://x/c"}, 4]);
        assert_eq!(raw_values(&value), vec!["a", "b", "http://x/c", "4"]);
    }
}
