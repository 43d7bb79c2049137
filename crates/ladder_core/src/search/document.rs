//! Documents sent to the search collaborator.
//!
//! # Responsibility
//! - Select how a record is serialized for indexing.
//!
//! # Invariants
//! - The `Document` form never carries `_id`; the id travels separately.

use crate::graph::export::Exporter;
use crate::graph::sync::RecordSource;
use crate::model::record::Record;
use serde_json::Value;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Custom serializer for [`IndexForm::Custom`].
pub type IndexSerializer = Arc<dyn Fn(&Record) -> Value + Send + Sync>;

/// Serialization used for the search document of a model.
#[derive(Clone, Default)]
pub enum IndexForm {
    /// Framed JSON-LD.
    LinkedData,
    /// `prefix: {field: value}` map; `related` nests related records.
    QName { related: bool },
    /// Raw record document without `_id`.
    #[default]
    Document,
    Custom(IndexSerializer),
}

impl Debug for IndexForm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LinkedData => write!(f, "LinkedData"),
            Self::QName { related } => f.debug_struct("QName").field("related", related).finish(),
            Self::Document => write!(f, "Document"),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Capability of values that can be indexed.
pub trait Indexable {
    fn indexed_json(
        &self,
        form: &IndexForm,
        exporter: &Exporter<'_>,
        related: Option<&dyn RecordSource>,
    ) -> Value;
}

impl Indexable for Record {
    fn indexed_json(
        &self,
        form: &IndexForm,
        exporter: &Exporter<'_>,
        related: Option<&dyn RecordSource>,
    ) -> Value {
        match form {
            IndexForm::LinkedData => exporter.jsonld(self, related),
            IndexForm::QName { related: true } => exporter.qname(self, related),
            IndexForm::QName { related: false } => exporter.qname(self, None),
            IndexForm::Document => {
                let mut document = self.to_document();
                if let Some(object) = document.as_object_mut() {
                    object.remove("_id");
                }
                document
            }
            IndexForm::Custom(serialize) => serialize(self),
        }
    }
}
