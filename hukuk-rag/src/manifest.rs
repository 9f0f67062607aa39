//! Build manifest written after a verified index build.
//!
//! The serving side reads the manifest before it accepts queries, so a
//! half-built or foreign collection is rejected up front instead of
//! producing empty answers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::RagConfig;
use crate::error::{RagError, Result};

/// Version of the on-disk entry layout. Bump when the schema changes.
pub const MANIFEST_FORMAT_VERSION: u32 = 1;

/// Summary of a completed build, persisted alongside the collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildManifest {
    pub format_version: u32,
    pub collection: String,
    pub corpus_id: String,
    pub embedding_model: String,
    pub dimensions: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub total_chunks: usize,
    pub entry_count: usize,
    pub dropped_chunks: usize,
    pub failed_embed_batches: usize,
    pub failed_persist_batches: usize,
    pub built_at: DateTime<Utc>,
}

impl BuildManifest {
    /// Check that this manifest describes a collection the given config can query.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::CollectionNotReady`] when the format version is
    /// unknown, the collection is empty, or it was embedded with a different
    /// model than the one configured for queries.
    pub fn ensure_compatible(&self, config: &RagConfig) -> Result<()> {
        let not_ready = |reason: String| RagError::CollectionNotReady {
            collection: self.collection.clone(),
            reason,
        };

        if self.format_version != MANIFEST_FORMAT_VERSION {
            return Err(not_ready(format!(
                "manifest format {} is not supported (expected {MANIFEST_FORMAT_VERSION})",
                self.format_version
            )));
        }
        if self.entry_count == 0 {
            return Err(not_ready("collection has no entries".to_string()));
        }
        if self.embedding_model != config.embedding_model {
            return Err(not_ready(format!(
                "built with embedding model '{}' but '{}' is configured",
                self.embedding_model, config.embedding_model
            )));
        }
        Ok(())
    }
}
