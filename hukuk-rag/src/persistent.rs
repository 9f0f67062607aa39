//! Disk-persisted vector store backed by sled.
//!
//! Each collection lives in its own sled tree with JSON-encoded entries
//! keyed by entry id. A batch of entries is written with a single
//! `apply_batch`, so readers never observe half of a batch. Collection
//! dimensions and build manifests live in two bookkeeping trees.
//!
//! sled calls block, so every operation runs on tokio's blocking pool.
//!
//! This module is only available when the `sled` feature is enabled.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::document::{IndexEntry, SearchResult};
use crate::error::{RagError, Result};
use crate::manifest::BuildManifest;
use crate::vectorstore::{
    VectorStore, check_query_dimensions, cosine_similarity, rank, validate_batch,
};

const BACKEND: &str = "sled";
const MANIFEST_TREE: &str = "__manifests__";
const DIMENSIONS_TREE: &str = "__dimensions__";

fn store_err(message: impl Into<String>) -> RagError {
    RagError::VectorStoreError { backend: BACKEND.to_string(), message: message.into() }
}

fn collection_tree(name: &str) -> String {
    format!("collection:{name}")
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| store_err(format!("blocking task failed: {e}")))?
}

/// A vector store persisted to a directory on disk.
///
/// # Example
///
/// ```rust,ignore
/// use hukuk_rag::persistent::SledVectorStore;
///
/// // Ingestion: start from a clean directory.
/// let store = SledVectorStore::recreate("./chroma_db_law_local_full")?;
///
/// // Serving: the directory must already exist.
/// let store = SledVectorStore::open_existing("./chroma_db_law_local_full")?;
/// ```
#[derive(Debug, Clone)]
pub struct SledVectorStore {
    db: sled::Db,
    path: PathBuf,
}

impl SledVectorStore {
    /// Open or create a store at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::VectorStoreError`] if sled cannot open the directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let db = sled::open(&path)
            .map_err(|e| store_err(format!("failed to open '{}': {e}", path.display())))?;
        debug!(path = %path.display(), "opened vector store");
        Ok(Self { db, path })
    }

    /// Open a store that must already exist, as the serving path does.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::VectorStoreError`] if `path` does not exist.
    pub fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(store_err(format!(
                "vector store path '{}' does not exist; build the index first",
                path.display()
            )));
        }
        Self::open(path)
    }

    /// Destroy everything at `path` and open a fresh store there.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::VectorStoreError`] if the old directory cannot be
    /// removed or the new store cannot be opened.
    pub fn recreate(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            std::fs::remove_dir_all(path).map_err(|e| {
                store_err(format!("failed to remove old store '{}': {e}", path.display()))
            })?;
            info!(path = %path.display(), "removed previous vector store");
        }
        Self::open(path)
    }

    /// The directory this store lives in.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn has_collection(db: &sled::Db, name: &str) -> bool {
        let tree = collection_tree(name);
        db.tree_names().iter().any(|n| &**n == tree.as_bytes())
    }

    fn existing_tree(db: &sled::Db, name: &str) -> Result<sled::Tree> {
        if !Self::has_collection(db, name) {
            return Err(store_err(format!("collection '{name}' does not exist")));
        }
        db.open_tree(collection_tree(name)).map_err(|e| store_err(e.to_string()))
    }

    fn stored_dimensions(db: &sled::Db, name: &str) -> Result<Option<usize>> {
        let dims = db.open_tree(DIMENSIONS_TREE).map_err(|e| store_err(e.to_string()))?;
        let raw = dims.get(name.as_bytes()).map_err(|e| store_err(e.to_string()))?;
        Ok(raw.and_then(|bytes| {
            let arr = <[u8; 8]>::try_from(&*bytes).ok()?;
            Some(u64::from_be_bytes(arr) as usize)
        }))
    }
}

#[async_trait]
impl VectorStore for SledVectorStore {
    async fn create_collection(&self, name: &str) -> Result<()> {
        let db = self.db.clone();
        let name = name.to_string();
        blocking(move || {
            db.open_tree(collection_tree(&name)).map_err(|e| store_err(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let db = self.db.clone();
        let name = name.to_string();
        blocking(move || {
            db.drop_tree(collection_tree(&name)).map_err(|e| store_err(e.to_string()))?;
            for meta in [MANIFEST_TREE, DIMENSIONS_TREE] {
                let tree = db.open_tree(meta).map_err(|e| store_err(e.to_string()))?;
                tree.remove(name.as_bytes()).map_err(|e| store_err(e.to_string()))?;
            }
            db.flush().map_err(|e| store_err(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn upsert(&self, collection: &str, entries: &[IndexEntry]) -> Result<()> {
        let db = self.db.clone();
        let name = collection.to_string();
        let entries = entries.to_vec();
        blocking(move || {
            let tree = Self::existing_tree(&db, &name)?;
            let stored = Self::stored_dimensions(&db, &name)?;
            let dimensions = validate_batch(BACKEND, &entries, stored)?;

            let mut batch = sled::Batch::default();
            for entry in &entries {
                let value = serde_json::to_vec(entry)
                    .map_err(|e| store_err(format!("failed to encode '{}': {e}", entry.id)))?;
                batch.insert(entry.id.as_bytes(), value);
            }
            tree.apply_batch(batch).map_err(|e| store_err(e.to_string()))?;

            if stored.is_none() {
                if let Some(d) = dimensions {
                    let dims = db.open_tree(DIMENSIONS_TREE).map_err(|e| store_err(e.to_string()))?;
                    dims.insert(name.as_bytes(), (d as u64).to_be_bytes().to_vec())
                        .map_err(|e| store_err(e.to_string()))?;
                }
            }
            db.flush().map_err(|e| store_err(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let db = self.db.clone();
        let name = collection.to_string();
        let query = embedding.to_vec();
        blocking(move || {
            let tree = Self::existing_tree(&db, &name)?;
            check_query_dimensions(BACKEND, &query, Self::stored_dimensions(&db, &name)?)?;

            let mut scored = Vec::with_capacity(tree.len());
            for item in tree.iter() {
                let (_, value) = item.map_err(|e| store_err(e.to_string()))?;
                let entry: IndexEntry = serde_json::from_slice(&value)
                    .map_err(|e| store_err(format!("corrupt entry: {e}")))?;
                let score = cosine_similarity(&entry.embedding, &query);
                scored.push(SearchResult { entry, score });
            }
            Ok(rank(scored, top_k))
        })
        .await
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let db = self.db.clone();
        let name = collection.to_string();
        blocking(move || Ok(Self::existing_tree(&db, &name)?.len())).await
    }

    async fn write_manifest(&self, collection: &str, manifest: &BuildManifest) -> Result<()> {
        let db = self.db.clone();
        let name = collection.to_string();
        let value = serde_json::to_vec(manifest)
            .map_err(|e| store_err(format!("failed to encode manifest: {e}")))?;
        blocking(move || {
            Self::existing_tree(&db, &name)?;
            let tree = db.open_tree(MANIFEST_TREE).map_err(|e| store_err(e.to_string()))?;
            tree.insert(name.as_bytes(), value).map_err(|e| store_err(e.to_string()))?;
            db.flush().map_err(|e| store_err(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn read_manifest(&self, collection: &str) -> Result<Option<BuildManifest>> {
        let db = self.db.clone();
        let name = collection.to_string();
        blocking(move || {
            let tree = db.open_tree(MANIFEST_TREE).map_err(|e| store_err(e.to_string()))?;
            let Some(raw) = tree.get(name.as_bytes()).map_err(|e| store_err(e.to_string()))?
            else {
                return Ok(None);
            };
            serde_json::from_slice(&raw)
                .map(Some)
                .map_err(|e| store_err(format!("corrupt manifest: {e}")))
        })
        .await
    }
}
