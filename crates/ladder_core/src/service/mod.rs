//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository, search index and synchronizer calls into
//!   catalog-level operations.
//! - Keep CLI and embedding layers decoupled from storage details.

pub mod record_service;

pub use record_service::{CatalogError, CatalogResult, CatalogService, CreateOutcome};
