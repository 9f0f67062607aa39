//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] wires the components together for both phases:
//! ingestion (chunk → embed → persist → verify) and serving
//! (retrieve → prompt → generate). Everything is injected through
//! [`RagPipeline::builder()`]; nothing is global.
//!
//! # Example
//!
//! ```rust,ignore
//! use hukuk_rag::{RagPipeline, RagConfig, InMemoryVectorStore};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(embedder))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .generator(Arc::new(generator))
//!     .build()?;
//!
//! let report = pipeline.ingest(&records).await?;
//! let answer = pipeline.ask("Anayasa nedir?").await?;
//! ```

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{error, info};

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::RagConfig;
use crate::document::SourceRecord;
use crate::embedding::{EmbeddingClient, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::generation::Generator;
use crate::index::{BuildReport, IndexBuilder};
use crate::retriever::Retriever;
use crate::synthesizer::{AnswerSynthesizer, SynthesizedAnswer};
use crate::vectorstore::VectorStore;

/// The RAG pipeline orchestrator.
///
/// The retriever is opened lazily on the first question and then shared.
/// A pipeline without a generator can ingest but not answer.
pub struct RagPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    chunker: Arc<dyn Chunker>,
    synthesizer: Option<AnswerSynthesizer>,
    retriever: OnceCell<Retriever>,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    /// Chunk `records` and build the collection from scratch.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] when the corpus yields no chunks,
    /// and passes through reset and verification failures from
    /// [`IndexBuilder::build`].
    pub async fn ingest(&self, records: &[SourceRecord]) -> Result<BuildReport> {
        let chunks = self.chunker.split(records);
        info!(records = records.len(), chunks = chunks.len(), "corpus chunked");
        if chunks.is_empty() {
            return Err(RagError::PipelineError("corpus produced no chunks".to_string()));
        }

        let client =
            EmbeddingClient::new(self.embedding_provider.clone(), self.config.ingest_retry);
        let builder = IndexBuilder::new(self.config.clone(), client, self.vector_store.clone());
        builder.build(chunks).await.inspect_err(|e| {
            error!(collection = %self.config.collection_name, error = %e, "index build failed");
        })
    }

    /// The retriever for the configured collection, opened on first use.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::CollectionNotReady`] if the collection cannot
    /// serve queries.
    pub async fn retriever(&self) -> Result<&Retriever> {
        self.retriever
            .get_or_try_init(|| async {
                let client =
                    EmbeddingClient::new(self.embedding_provider.clone(), self.config.query_retry);
                Retriever::open(self.vector_store.clone(), &self.config, client).await
            })
            .await
    }

    /// Answer one question.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if no generator was configured and
    /// [`RagError::CollectionNotReady`] if the collection cannot be opened.
    /// Failures while answering are folded into the returned answer.
    pub async fn ask(&self, question: &str) -> Result<SynthesizedAnswer> {
        let synthesizer = self.synthesizer.as_ref().ok_or_else(|| {
            RagError::ConfigError("a generator is required to answer questions".to_string())
        })?;
        let retriever = self.retriever().await?;
        Ok(synthesizer.answer(question, retriever).await)
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `config`, `embedding_provider` and `vector_store` are required. The
/// chunker defaults to a [`RecursiveChunker`] sized from the config.
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
    generator: Option<Arc<dyn Generator>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Override the chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the generative model used to answer questions.
    pub fn generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Build the [`RagPipeline`], validating the config and required fields.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing or
    /// the config is invalid.
    pub fn build(self) -> Result<RagPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::ConfigError("config is required".to_string()))?;
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;
        let chunker = self
            .chunker
            .unwrap_or_else(|| Arc::new(RecursiveChunker::from_config(&config)));
        let synthesizer =
            self.generator.map(|generator| AnswerSynthesizer::from_config(generator, &config));

        Ok(RagPipeline {
            config,
            embedding_provider,
            vector_store,
            chunker,
            synthesizer,
            retriever: OnceCell::new(),
        })
    }
}
