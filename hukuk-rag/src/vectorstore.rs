//! Vector store trait for persisting index entries and searching them.

use std::cmp::Ordering;

use async_trait::async_trait;

use crate::document::{IndexEntry, SearchResult};
use crate::error::{RagError, Result};
use crate::manifest::BuildManifest;

/// A storage backend for index entries with similarity search.
///
/// Implementations manage named collections of [`IndexEntry`]s. Every
/// backend ranks with [`cosine_similarity`] and breaks ties with
/// [`rank`], so build-time and query-time scoring always agree.
///
/// # Example
///
/// ```rust,ignore
/// use hukuk_rag::{VectorStore, InMemoryVectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("docs").await?;
/// store.upsert("docs", &entries).await?;
/// let results = store.search("docs", &query_embedding, 3).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a named collection. No-op if it already exists.
    async fn create_collection(&self, name: &str) -> Result<()>;

    /// Delete a named collection, its entries, and its manifest.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Write a batch of entries. The batch is applied entirely or not at all.
    ///
    /// Entries must have non-empty embeddings of the collection's dimension.
    async fn upsert(&self, collection: &str, entries: &[IndexEntry]) -> Result<()>;

    /// Search for the `top_k` most similar entries to the given embedding.
    ///
    /// Returns results ordered by descending similarity score.
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>>;

    /// Number of entries in a collection.
    async fn count(&self, collection: &str) -> Result<usize>;

    /// Store the build manifest of a collection, replacing any previous one.
    async fn write_manifest(&self, collection: &str, manifest: &BuildManifest) -> Result<()>;

    /// Load the build manifest of a collection, if one was written.
    async fn read_manifest(&self, collection: &str) -> Result<Option<BuildManifest>>;
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Sort by descending score and keep the first `top_k`.
///
/// Equal scores are ordered by entry id, shorter first, so `doc_2` precedes
/// `doc_10` and ties resolve to the earlier chunk.
pub fn rank(mut scored: Vec<SearchResult>, top_k: usize) -> Vec<SearchResult> {
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.entry.id.len().cmp(&b.entry.id.len()))
            .then_with(|| a.entry.id.cmp(&b.entry.id))
    });
    scored.truncate(top_k);
    scored
}

/// Check a batch before it is written: no empty embeddings, one dimension.
///
/// `expected` is the dimension already stored in the collection, if any.
/// Returns the batch dimension.
pub(crate) fn validate_batch(
    backend: &str,
    entries: &[IndexEntry],
    expected: Option<usize>,
) -> Result<Option<usize>> {
    let mut dimensions = expected;
    for entry in entries {
        let len = entry.embedding.len();
        if len == 0 {
            return Err(RagError::VectorStoreError {
                backend: backend.to_string(),
                message: format!("entry '{}' has no embedding", entry.id),
            });
        }
        match dimensions {
            Some(d) if d != len => {
                return Err(RagError::VectorStoreError {
                    backend: backend.to_string(),
                    message: format!(
                        "entry '{}' has dimension {len}, collection uses {d}",
                        entry.id
                    ),
                });
            }
            _ => dimensions = Some(len),
        }
    }
    Ok(dimensions)
}

/// Reject a query whose dimension differs from the collection's.
pub(crate) fn check_query_dimensions(
    backend: &str,
    query: &[f32],
    stored: Option<usize>,
) -> Result<()> {
    match stored {
        Some(d) if d != query.len() => Err(RagError::VectorStoreError {
            backend: backend.to_string(),
            message: format!("query has dimension {}, collection uses {d}", query.len()),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::EntryMetadata;

    fn result(id: &str, score: f32) -> SearchResult {
        SearchResult {
            entry: IndexEntry {
                id: id.to_string(),
                embedding: vec![1.0],
                text: String::new(),
                metadata: EntryMetadata { source_id: 0, source_question: None },
            },
            score,
        }
    }

    #[test]
    fn ties_resolve_by_chunk_position() {
        let ranked = rank(
            vec![result("doc_10", 0.5), result("doc_2", 0.5), result("doc_3", 0.9)],
            3,
        );
        let ids: Vec<_> = ranked.iter().map(|r| r.entry.id.as_str()).collect();
        assert_eq!(ids, vec!["doc_3", "doc_2", "doc_10"]);
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = [0.3, -0.2, 0.9];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&v, &[0.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn batch_validation_catches_mixed_dimensions() {
        let mut short = result("doc_1", 0.0).entry;
        short.embedding = vec![1.0, 2.0];
        let long = result("doc_0", 0.0).entry;
        assert!(validate_batch("test", &[long.clone(), short], None).is_err());
        assert_eq!(validate_batch("test", &[long.clone()], None).unwrap(), Some(1));
        assert!(validate_batch("test", &[long], Some(4)).is_err());
    }
}
