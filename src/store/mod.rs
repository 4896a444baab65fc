//! Vector-store boundary: named collections of embedded records.
//!
//! The store is an external collaborator; the core only depends on this
//! narrow trait. [`memory::MemoryStore`] is the in-process reference
//! implementation used by tests and the demo binary.
use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

pub mod memory;

/// Collection names for the retrieval tiers.
pub mod collections {
    /// Raw retrieval chunks with full metadata.
    pub const DOCUMENTS: &str = "documents";
    /// Compressed summaries of logical sentence groups.
    pub const LOGICAL_SUMMARIES: &str = "logical_summaries";
    /// Paragraph-level summaries for wider context.
    pub const PARAGRAPH_SUMMARIES: &str = "paragraph_summaries";
    /// Full original document texts, stored for re-processing.
    pub const ORIGINAL_TEXTS: &str = "original_texts";

    /// The tiers that participate in similarity search.
    pub const SEARCHABLE: [&str; 3] = [DOCUMENTS, LOGICAL_SUMMARIES, PARAGRAPH_SUMMARIES];
}

/// Flat metadata map stored alongside each record.
pub type Metadata = HashMap<String, Value>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("store backend error: {0}")]
    Backend(String),
}

/// A record to be written: id, embedding, document text, metadata.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub embedding: Vec<f32>,
    pub document: String,
    pub metadata: Metadata,
}

/// A record fetched by id or by document filter (no distance attached).
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub id: String,
    pub document: String,
    pub metadata: Metadata,
}

/// A ranked similarity match.
#[derive(Debug, Clone)]
pub struct QueryMatch {
    pub id: String,
    pub document: String,
    pub metadata: Metadata,
    pub distance: f32,
}

/// Allow/deny filter on the `filename` metadata field.
#[derive(Debug, Default, Clone)]
pub struct DocumentFilter {
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
}

impl DocumentFilter {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.include.is_none() && self.exclude.is_none()
    }

    /// Whether a record with this filename passes the filter.
    #[must_use]
    pub fn matches(&self, filename: &str) -> bool {
        if let Some(include) = &self.include {
            if !include.iter().any(|f| f == filename) {
                return false;
            }
        }
        if let Some(exclude) = &self.exclude {
            if exclude.iter().any(|f| f == filename) {
                return false;
            }
        }
        true
    }
}

/// Trait for the external vector store, addressed by collection name.
///
/// `add` get-or-creates the target collection; read operations on a
/// collection that was never written return `CollectionNotFound`.
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert records, replacing any existing record with the same id.
    async fn add(&self, collection: &str, records: Vec<VectorRecord>) -> Result<(), StoreError>;

    /// Approximate-nearest-neighbor query, smallest distance first.
    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        n_results: usize,
        filter: Option<&DocumentFilter>,
    ) -> Result<Vec<QueryMatch>, StoreError>;

    /// Fetch specific records by id; unknown ids are silently absent.
    async fn get_by_ids(
        &self,
        collection: &str,
        ids: &[String],
    ) -> Result<Vec<StoredRecord>, StoreError>;

    /// Fetch up to `limit` records whose `filename` metadata matches.
    async fn get_by_document(
        &self,
        collection: &str,
        filename: &str,
        limit: usize,
    ) -> Result<Vec<StoredRecord>, StoreError>;

    /// Delete records by id.
    async fn delete(&self, collection: &str, ids: &[String]) -> Result<(), StoreError>;

    /// List the names of all existing collections.
    async fn list_collections(&self) -> Result<Vec<String>, StoreError>;
}

/// Read the `filename` metadata field of a record, if present.
#[must_use]
pub fn record_filename(metadata: &Metadata) -> Option<&str> {
    metadata.get("filename").and_then(|v| v.as_str())
}
