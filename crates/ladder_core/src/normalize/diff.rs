//! Structural diff over canonical documents.

use super::{normalize, IdPolicy};
use serde_json::Value;
use std::collections::BTreeSet;

/// One difference between two canonical documents.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Added { path: String, value: Value },
    Removed { path: String, value: Value },
    Modified { path: String, before: Value, after: Value },
}

impl Change {
    pub fn path(&self) -> &str {
        match self {
            Self::Added { path, .. } | Self::Removed { path, .. } | Self::Modified { path, .. } => {
                path
            }
        }
    }
}

/// Differences between `a` and `b` after `keep` normalization.
///
/// Arrays are compared index by index; paths look like `dc.title[0]`.
pub fn diff(a: &Value, b: &Value) -> Vec<Change> {
    diff_with(a, b, &IdPolicy::Keep)
}

pub fn diff_with(a: &Value, b: &Value, policy: &IdPolicy) -> Vec<Change> {
    let mut changes = Vec::new();
    compare("", &normalize(a, policy), &normalize(b, policy), &mut changes);
    changes
}

fn compare(path: &str, before: &Value, after: &Value, changes: &mut Vec<Change>) {
    match (before, after) {
        (Value::Object(left), Value::Object(right)) => {
            let keys: BTreeSet<&String> = left.keys().chain(right.keys()).collect();
            for key in keys {
                let child = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                match (left.get(key), right.get(key)) {
                    (Some(l), Some(r)) => compare(&child, l, r, changes),
                    (Some(l), None) => changes.push(Change::Removed {
                        path: child,
                        value: l.clone(),
                    }),
                    (None, Some(r)) => changes.push(Change::Added {
                        path: child,
                        value: r.clone(),
                    }),
                    (None, None) => {}
                }
            }
        }
        (Value::Array(left), Value::Array(right)) => {
            for index in 0..left.len().max(right.len()) {
                let child = format!("{path}[{index}]");
                match (left.get(index), right.get(index)) {
                    (Some(l), Some(r)) => compare(&child, l, r, changes),
                    (Some(l), None) => changes.push(Change::Removed {
                        path: child,
                        value: l.clone(),
                    }),
                    (None, Some(r)) => changes.push(Change::Added {
                        path: child,
                        value: r.clone(),
                    }),
                    (None, None) => {}
                }
            }
        }
        (l, r) if l == r => {}
        (l, r) => changes.push(Change::Modified {
            path: path.to_string(),
            before: l.clone(),
            after: r.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{diff, Change};
    use serde_json::json;

    #[test]
    fn identical_documents_have_no_changes() {
        let document = json!({"_id": "x", "dc": {"title": ["Same Title"]}});
        assert!(diff(&document, &document).is_empty());
    }

    #[test]
    fn internal_fields_do_not_count_as_changes() {
        let a = json!({"_id": "a", "updated_at": 1, "dc": {"title": ["Same Title"]}});
        let b = json!({"_id": "b", "updated_at": 2, "dc": {"title": ["Same Title"]}});
        assert!(diff(&a, &b).is_empty());
    }

    #[test]
    fn changes_carry_dotted_paths() {
        let a = json!({"dc": {"title": ["Comet"], "creator": ["Tove"]}});
        let b = json!({"dc": {"title": ["Comet", "Kometen"], "date": ["1946"]}, "bibo": {"isbn": ["91"]}});

        let changes = diff(&a, &b);
        let paths: Vec<&str> = changes.iter().map(Change::path).collect();
        assert_eq!(paths, vec!["bibo", "dc.creator", "dc.date", "dc.title[1]"]);
        assert!(matches!(changes[1], Change::Removed { .. }));
    }

    #[test]
    fn scalar_changes_are_modifications() {
        let a = json!({"dc": {"title": ["Comet"]}});
        let b = json!({"dc": {"title": ["Kometen"]}});
        assert_eq!(
            diff(&a, &b),
            vec![Change::Modified {
                path: "dc.title[0]".to_string(),
                before: json!("Comet"),
                after: json!("Kometen"),
            }]
        );
    }
}
