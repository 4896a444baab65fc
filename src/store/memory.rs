/// In-memory vector store with brute-force cosine search.
///
/// Collections are created on first write and live behind a single
/// `RwLock`; good enough for tests, demos, and small corpora.
use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use super::{
    DocumentFilter, Metadata, QueryMatch, StoreError, StoredRecord, VectorRecord, VectorStore,
    record_filename,
};

#[derive(Debug, Clone)]
struct MemoryRecord {
    id: String,
    embedding: Vec<f32>,
    document: String,
    metadata: Metadata,
}

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<MemoryRecord>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Cosine distance in [0, 2]; zero-norm vectors are treated as maximally
/// distant rather than producing NaN.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[async_trait::async_trait]
impl VectorStore for MemoryStore {
    async fn add(&self, collection: &str, records: Vec<VectorRecord>) -> Result<(), StoreError> {
        let mut collections = self
            .collections
            .write()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let entries = collections.entry(collection.to_string()).or_default();

        for record in records {
            // Upsert: same id replaces the previous record
            entries.retain(|r| r.id != record.id);
            entries.push(MemoryRecord {
                id: record.id,
                embedding: record.embedding,
                document: record.document,
                metadata: record.metadata,
            });
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        n_results: usize,
        filter: Option<&DocumentFilter>,
    ) -> Result<Vec<QueryMatch>, StoreError> {
        let collections = self
            .collections
            .read()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let entries = collections
            .get(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;

        let mut matches = Vec::new();
        for record in entries {
            if record.embedding.len() != embedding.len() {
                return Err(StoreError::DimensionMismatch {
                    expected: record.embedding.len(),
                    got: embedding.len(),
                });
            }
            if let Some(f) = filter {
                let filename = record_filename(&record.metadata).unwrap_or("");
                if !f.matches(filename) {
                    continue;
                }
            }
            matches.push(QueryMatch {
                id: record.id.clone(),
                document: record.document.clone(),
                metadata: record.metadata.clone(),
                distance: cosine_distance(&record.embedding, embedding),
            });
        }

        matches.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(n_results);

        debug!(
            "query on '{collection}' returned {} of {} records",
            matches.len(),
            entries.len()
        );
        Ok(matches)
    }

    async fn get_by_ids(
        &self,
        collection: &str,
        ids: &[String],
    ) -> Result<Vec<StoredRecord>, StoreError> {
        let collections = self
            .collections
            .read()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let entries = collections
            .get(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;

        Ok(entries
            .iter()
            .filter(|r| ids.iter().any(|id| id == &r.id))
            .map(|r| StoredRecord {
                id: r.id.clone(),
                document: r.document.clone(),
                metadata: r.metadata.clone(),
            })
            .collect())
    }

    async fn get_by_document(
        &self,
        collection: &str,
        filename: &str,
        limit: usize,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        let collections = self
            .collections
            .read()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let entries = collections
            .get(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;

        Ok(entries
            .iter()
            .filter(|r| record_filename(&r.metadata) == Some(filename))
            .take(limit)
            .map(|r| StoredRecord {
                id: r.id.clone(),
                document: r.document.clone(),
                metadata: r.metadata.clone(),
            })
            .collect())
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<(), StoreError> {
        let mut collections = self
            .collections
            .write()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let entries = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;
        entries.retain(|r| !ids.iter().any(|id| id == &r.id));
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        let collections = self
            .collections
            .read()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
