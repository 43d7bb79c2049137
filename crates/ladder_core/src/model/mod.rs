//! Record data model, schema descriptors and the dynamic model factory.
//!
//! # Responsibility
//! - Define the record shape shared by the graph, normalizer, similarity
//!   and search layers.
//! - Keep schema knowledge in explicit descriptor objects.
//!
//! # Invariants
//! - Every record is identified by a stable `RecordId`.
//! - Deletion is a soft-delete timestamp, never a hard delete.
//!
//! # See also
//! - `vocab` for the vocabularies descriptors bind to.

pub mod descriptor;
pub mod factory;
pub mod fields;
pub mod payload;
pub mod record;

pub use descriptor::{Cardinality, ModelDescriptor, ModelKey, RelationSpec, VocabBinding};
pub use factory::{tenant_namespace, ModelDefinition, ModelRegistry};
pub use fields::{AccessorKind, ContextDelta, FieldBinding, FieldError, FieldTable, PropertyOptions};
pub use payload::{CompressedPayload, RawPayloads};
pub use record::{
    is_reference_token, now_epoch_ms, DocumentError, FieldValue, Record, RecordId,
    RecordValidationError, Timestamps,
};
