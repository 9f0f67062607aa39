//! Building a persisted vector collection from chunks.
//!
//! A build always starts from an empty collection. Chunks are embedded in
//! batches, chunks without an embedding are dropped, and the rest are
//! written in atomic batches. A failed batch is counted and skipped, never
//! retried. The finished collection must answer a sanity query before its
//! [`BuildManifest`] is written.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::RagConfig;
use crate::document::{Chunk, IndexEntry};
use crate::embedding::EmbeddingClient;
use crate::error::{RagError, Result};
use crate::manifest::{BuildManifest, MANIFEST_FORMAT_VERSION};
use crate::vectorstore::VectorStore;

/// Counters from one index build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    /// Name of the collection that was rebuilt.
    pub collection: String,
    /// Chunks handed to the build.
    pub total_chunks: usize,
    /// Chunks dropped because they came back without an embedding.
    pub dropped_chunks: usize,
    /// Embedding batches where every item failed.
    pub failed_embed_batches: usize,
    /// Persist batches the store rejected.
    pub failed_persist_batches: usize,
    /// Entries in the collection after the build.
    pub entry_count: usize,
    /// Embedding dimension of the stored entries.
    pub dimensions: usize,
    /// Id of the top hit of the sanity query.
    pub sanity_hit: String,
}

/// Runs reset → embed → filter → persist → verify → manifest.
///
/// # Example
///
/// ```rust,ignore
/// use hukuk_rag::{EmbeddingClient, IndexBuilder, RagConfig};
///
/// let config = RagConfig::default();
/// let client = EmbeddingClient::new(provider, config.ingest_retry);
/// let report = IndexBuilder::new(config, client, store).build(chunks).await?;
/// println!("{} entries", report.entry_count);
/// ```
pub struct IndexBuilder {
    config: RagConfig,
    client: EmbeddingClient,
    store: Arc<dyn VectorStore>,
}

impl IndexBuilder {
    /// Create a builder writing into `store` under `config.collection_name`.
    pub fn new(config: RagConfig, client: EmbeddingClient, store: Arc<dyn VectorStore>) -> Self {
        Self { config, client, store }
    }

    /// Build the collection from `chunks`, replacing whatever was there.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::VectorStoreError`] if the collection cannot be
    /// reset, and [`RagError::VerificationFailed`] if the finished
    /// collection is empty or the sanity query finds nothing. Failures of
    /// individual batches are reported in the [`BuildReport`] instead.
    pub async fn build(&self, chunks: Vec<Chunk>) -> Result<BuildReport> {
        let collection = self.config.collection_name.as_str();
        let total_chunks = chunks.len();
        info!(collection, total_chunks, "building index");

        self.store.delete_collection(collection).await?;
        self.store.create_collection(collection).await?;

        let (entries, failed_embed_batches) = self.embed_all(chunks).await;
        let dropped_chunks = total_chunks - entries.len();
        if dropped_chunks > 0 {
            warn!(collection, dropped_chunks, "chunks without embeddings were dropped");
        }
        let dimensions = entries.first().map(|e| e.embedding.len()).unwrap_or_default();

        let failed_persist_batches = self.persist(collection, &entries).await;
        let entry_count = self.store.count(collection).await?;
        info!(collection, entry_count, failed_persist_batches, "persisted entries");

        let sanity_hit = self.verify(collection, entry_count).await?;

        let report = BuildReport {
            collection: collection.to_string(),
            total_chunks,
            dropped_chunks,
            failed_embed_batches,
            failed_persist_batches,
            entry_count,
            dimensions,
            sanity_hit,
        };
        self.store.write_manifest(collection, &self.manifest(&report)).await?;
        info!(collection, entry_count, dropped_chunks, "index build complete");
        Ok(report)
    }

    /// Embed in batches and pair each surviving chunk with its vector.
    ///
    /// Ids come from the chunk's position in the input, so they stay
    /// stable when earlier chunks are dropped.
    async fn embed_all(&self, chunks: Vec<Chunk>) -> (Vec<IndexEntry>, usize) {
        let batch_size = self.config.embed_batch_size.max(1);
        let mut embeddings = Vec::with_capacity(chunks.len());
        let mut failed_batches = 0;
        let batch_count = chunks.len().div_ceil(batch_size);

        for (n, batch) in chunks.chunks(batch_size).enumerate() {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let vectors = self.client.embed_documents(&texts).await;
            if vectors.iter().all(Option::is_none) {
                failed_batches += 1;
                error!(
                    batch = n + 1,
                    of = batch_count,
                    size = batch.len(),
                    "embedding batch failed"
                );
            }
            embeddings.extend(vectors);

            if n + 1 < batch_count && !self.config.batch_pause().is_zero() {
                tokio::time::sleep(self.config.batch_pause()).await;
            }
        }

        let entries = chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .filter_map(|(position, (chunk, embedding))| {
                let embedding = embedding?;
                Some(IndexEntry::from_chunk(position, chunk, embedding))
            })
            .collect();
        (entries, failed_batches)
    }

    /// Write entries in batches. Returns how many batches failed.
    async fn persist(&self, collection: &str, entries: &[IndexEntry]) -> usize {
        let mut failed = 0;
        for (n, batch) in entries.chunks(self.config.persist_batch_size.max(1)).enumerate() {
            if let Err(e) = self.store.upsert(collection, batch).await {
                failed += 1;
                error!(
                    collection,
                    batch = n + 1,
                    size = batch.len(),
                    error = %e,
                    "persist batch failed"
                );
            }
        }
        failed
    }

    async fn verify(&self, collection: &str, entry_count: usize) -> Result<String> {
        let failed = |reason: String| RagError::VerificationFailed {
            collection: collection.to_string(),
            reason,
        };
        if entry_count == 0 {
            return Err(failed("collection is empty".to_string()));
        }

        let query = self.config.sanity_query.as_str();
        let embedding = self
            .client
            .embed_query(query)
            .await
            .map_err(|e| failed(format!("could not embed sanity query: {e}")))?;
        let hits = self.store.search(collection, &embedding, 1).await?;
        let top = hits
            .into_iter()
            .next()
            .ok_or_else(|| failed(format!("sanity query '{query}' returned no results")))?;
        info!(collection, query, hit = %top.entry.id, score = top.score, "sanity query passed");
        Ok(top.entry.id)
    }

    fn manifest(&self, report: &BuildReport) -> BuildManifest {
        BuildManifest {
            format_version: MANIFEST_FORMAT_VERSION,
            collection: report.collection.clone(),
            corpus_id: self.config.corpus_id.clone(),
            embedding_model: self.config.embedding_model.clone(),
            dimensions: report.dimensions,
            chunk_size: self.config.chunk_size,
            chunk_overlap: self.config.chunk_overlap,
            total_chunks: report.total_chunks,
            entry_count: report.entry_count,
            dropped_chunks: report.dropped_chunks,
            failed_embed_batches: report.failed_embed_batches,
            failed_persist_batches: report.failed_persist_batches,
            built_at: Utc::now(),
        }
    }
}
