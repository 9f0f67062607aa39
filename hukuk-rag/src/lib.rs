//! # hukuk-rag
//!
//! Retrieval-augmented question answering over a Turkish-law Q&A corpus.
//!
//! ## Overview
//!
//! Ingestion runs offline and builds a persisted vector collection:
//!
//! - [`RecursiveChunker`] splits corpus answers into overlapping chunks
//! - [`EmbeddingClient`] embeds them with retry and backoff
//! - [`IndexBuilder`] persists them in batches and verifies the result
//!
//! Serving answers one question per turn:
//!
//! - [`Retriever`] embeds the question and finds the closest chunks
//! - [`AnswerSynthesizer`] prompts the model and appends source citations
//!
//! Backends sit behind traits: [`EmbeddingProvider`], [`Generator`] and
//! [`VectorStore`]. The `gemini` feature provides REST-backed Gemini
//! implementations and the `sled` feature an on-disk store.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use hukuk_rag::*;
//!
//! let config = RagConfig::default();
//! let pipeline = RagPipeline::builder()
//!     .config(config)
//!     .embedding_provider(Arc::new(embedder))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .generator(Arc::new(generator))
//!     .build()?;
//!
//! pipeline.ingest(&load_corpus("corpus.jsonl")?).await?;
//! let answer = pipeline.ask("Anayasa nedir?").await?;
//! println!("{}", answer.text);
//! ```

pub mod chunking;
pub mod config;
pub mod corpus;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod index;
pub mod inmemory;
pub mod manifest;
pub mod mock;
pub mod pipeline;
pub mod prompt;
pub mod retriever;
pub mod retry;
pub mod synthesizer;
pub mod vectorstore;

#[cfg(feature = "gemini")]
pub mod gemini;

#[cfg(feature = "sled")]
pub mod persistent;

pub use chunking::{Chunker, RecursiveChunker};
pub use config::{RagConfig, RagConfigBuilder};
pub use corpus::{load_corpus, parse_corpus};
pub use document::{Chunk, Embedding, EntryMetadata, IndexEntry, SearchResult, SourceRecord};
pub use embedding::{EmbedInput, EmbeddingClient, EmbeddingProvider, TaskType};
pub use error::{RagError, Result};
pub use generation::{
    GenerationRequest, GenerationResponse, GenerationSettings, Generator, HarmBlockThreshold,
    HarmCategory, SafetySetting,
};
pub use index::{BuildReport, IndexBuilder};
pub use inmemory::InMemoryVectorStore;
pub use manifest::BuildManifest;
pub use pipeline::{RagPipeline, RagPipelineBuilder};
pub use prompt::PromptTemplate;
pub use retriever::{Passage, RetrievalResult, Retriever};
pub use retry::RetryPolicy;
pub use synthesizer::{AnswerSynthesizer, SynthesizedAnswer};
pub use vectorstore::VectorStore;

#[cfg(feature = "gemini")]
pub use gemini::{GeminiClient, GeminiEmbeddingProvider, GeminiGenerator};

#[cfg(feature = "sled")]
pub use persistent::SledVectorStore;
