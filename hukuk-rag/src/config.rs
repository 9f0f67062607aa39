//! Configuration for ingestion and query pipelines.
//!
//! Values are layered: [`RagConfig::default`], then an optional JSON file
//! ([`RagConfig::from_file`]), then `HUKUK_*` environment variables
//! ([`RagConfig::apply_env`]). The API credential is not part of the config;
//! providers read it separately.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::retry::RetryPolicy;

/// Configuration parameters shared by the index builder, retriever and synthesizer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Directory holding the persisted vector collection.
    pub collection_path: PathBuf,
    /// Name of the collection inside the store.
    pub collection_name: String,
    /// Identifier of the corpus the collection was built from.
    pub corpus_id: String,
    /// Embedding model identifier (e.g. `models/text-embedding-004`).
    pub embedding_model: String,
    /// Generative model identifier (e.g. `gemini-2.0-flash`).
    pub generation_model: String,
    /// Number of passages retrieved per question.
    pub top_k: usize,
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Chunks per embedding request during ingestion.
    pub embed_batch_size: usize,
    /// Entries per write to the vector store.
    pub persist_batch_size: usize,
    /// Pause between embedding batches, in milliseconds.
    pub batch_pause_ms: u64,
    /// Sampling temperature for answer generation.
    pub temperature: f32,
    /// Query run against a freshly built collection to verify it.
    pub sanity_query: String,
    /// Retry policy for batch embedding during ingestion.
    pub ingest_retry: RetryPolicy,
    /// Retry policy for single query embedding.
    pub query_retry: RetryPolicy,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            collection_path: PathBuf::from("./chroma_db_law_local_full"),
            collection_name: "hukuk_tr_collection_full_local".to_string(),
            corpus_id: "Renicames/turkish-law-chatbot".to_string(),
            embedding_model: "models/text-embedding-004".to_string(),
            generation_model: "gemini-2.0-flash".to_string(),
            top_k: 3,
            chunk_size: 1000,
            chunk_overlap: 150,
            embed_batch_size: 100,
            persist_batch_size: 4000,
            batch_pause_ms: 1000,
            temperature: 0.3,
            sanity_query: "Anayasa nedir?".to_string(),
            ingest_retry: RetryPolicy::ingestion(),
            query_retry: RetryPolicy::query(),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Start a builder from this config, to override some fields.
    pub fn into_builder(self) -> RagConfigBuilder {
        RagConfigBuilder { config: self }
    }

    /// Load a config from a JSON file. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the file cannot be read, parsed,
    /// or fails validation.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RagError::ConfigError(format!("failed to read config '{}': {e}", path.display()))
        })?;
        let config: RagConfig = serde_json::from_str(&raw).map_err(|e| {
            RagError::ConfigError(format!("failed to parse config '{}': {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields from `HUKUK_*` process environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a numeric variable does not parse
    /// or the result fails validation.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Override fields from a variable lookup function.
    ///
    /// Recognized keys: `HUKUK_COLLECTION_PATH`, `HUKUK_COLLECTION_NAME`,
    /// `HUKUK_CORPUS_ID`, `HUKUK_EMBEDDING_MODEL`, `HUKUK_GENERATION_MODEL`,
    /// `HUKUK_TOP_K`, `HUKUK_CHUNK_SIZE`, `HUKUK_CHUNK_OVERLAP`.
    pub fn apply_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(v) = lookup("HUKUK_COLLECTION_PATH") {
            self.collection_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("HUKUK_COLLECTION_NAME") {
            self.collection_name = v;
        }
        if let Some(v) = lookup("HUKUK_CORPUS_ID") {
            self.corpus_id = v;
        }
        if let Some(v) = lookup("HUKUK_EMBEDDING_MODEL") {
            self.embedding_model = v;
        }
        if let Some(v) = lookup("HUKUK_GENERATION_MODEL") {
            self.generation_model = v;
        }
        if let Some(v) = lookup("HUKUK_TOP_K") {
            self.top_k = parse_var("HUKUK_TOP_K", &v)?;
        }
        if let Some(v) = lookup("HUKUK_CHUNK_SIZE") {
            self.chunk_size = parse_var("HUKUK_CHUNK_SIZE", &v)?;
        }
        if let Some(v) = lookup("HUKUK_CHUNK_OVERLAP") {
            self.chunk_overlap = parse_var("HUKUK_CHUNK_OVERLAP", &v)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// The pause inserted between embedding batches.
    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }

    /// Validate that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k`, `embed_batch_size` or `persist_batch_size` is zero
    /// - `temperature` is outside `[0, 2]`
    /// - a retry policy allows no attempts
    /// - `collection_name` is empty
    pub fn validate(&self) -> Result<()> {
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if self.embed_batch_size == 0 || self.persist_batch_size == 0 {
            return Err(RagError::ConfigError("batch sizes must be greater than zero".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(RagError::ConfigError(format!(
                "temperature ({}) must be within [0, 2]",
                self.temperature
            )));
        }
        if self.ingest_retry.max_attempts == 0 || self.query_retry.max_attempts == 0 {
            return Err(RagError::ConfigError("retry policies need at least one attempt".into()));
        }
        if self.collection_name.trim().is_empty() {
            return Err(RagError::ConfigError("collection_name must not be empty".to_string()));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| RagError::ConfigError(format!("{key} has an invalid value: '{value}'")))
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the directory of the persisted collection.
    pub fn collection_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.collection_path = path.into();
        self
    }

    /// Set the collection name.
    pub fn collection_name(mut self, name: impl Into<String>) -> Self {
        self.config.collection_name = name.into();
        self
    }

    /// Set the corpus identifier recorded in the build manifest.
    pub fn corpus_id(mut self, id: impl Into<String>) -> Self {
        self.config.corpus_id = id.into();
        self
    }

    /// Set the embedding model identifier.
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model = model.into();
        self
    }

    /// Set the generative model identifier.
    pub fn generation_model(mut self, model: impl Into<String>) -> Self {
        self.config.generation_model = model.into();
        self
    }

    /// Set the number of passages retrieved per question.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of chunks per embedding request.
    pub fn embed_batch_size(mut self, size: usize) -> Self {
        self.config.embed_batch_size = size;
        self
    }

    /// Set the number of entries per vector store write.
    pub fn persist_batch_size(mut self, size: usize) -> Self {
        self.config.persist_batch_size = size;
        self
    }

    /// Set the pause between embedding batches.
    pub fn batch_pause(mut self, pause: Duration) -> Self {
        self.config.batch_pause_ms = pause.as_millis() as u64;
        self
    }

    /// Set the generation temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Set the query used to verify a freshly built collection.
    pub fn sanity_query(mut self, query: impl Into<String>) -> Self {
        self.config.sanity_query = query.into();
        self
    }

    /// Set the retry policy for ingestion batches.
    pub fn ingest_retry(mut self, policy: RetryPolicy) -> Self {
        self.config.ingest_retry = policy;
        self
    }

    /// Set the retry policy for query embedding.
    pub fn query_retry(mut self, policy: RetryPolicy) -> Self {
        self.config.query_retry = policy;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
