//! Error types for the `hukuk-rag` crate.

use thiserror::Error;

/// Errors that can occur in ingestion and query operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The upstream service rejected the call because of a rate limit or
    /// exhausted quota.
    #[error("Rate limited ({provider}): {message}")]
    RateLimited {
        /// The provider that reported the limit.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred while calling the generative model.
    #[error("Generation error ({provider}): {message}")]
    GenerationError {
        /// The generation provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The corpus file could not be read or parsed.
    #[error("Corpus error: {0}")]
    CorpusError(String),

    /// The collection is missing, empty, or was built with an incompatible setup.
    #[error("Collection '{collection}' is not ready: {reason}")]
    CollectionNotReady {
        /// The collection that was requested.
        collection: String,
        /// Why the collection cannot serve queries.
        reason: String,
    },

    /// The post-build sanity query returned nothing.
    #[error("Verification of collection '{collection}' failed: {reason}")]
    VerificationFailed {
        /// The collection that was verified.
        collection: String,
        /// What the sanity query observed.
        reason: String,
    },

    /// A prompt template could not be rendered.
    #[error("Prompt error: {0}")]
    PromptError(String),

    /// An error in pipeline orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),
}

impl RagError {
    /// Whether the error signals rate limiting or resource exhaustion upstream.
    ///
    /// Providers that map HTTP 429 to [`RagError::RateLimited`] are detected
    /// directly; other variants are matched on the usual quota wording.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            RagError::RateLimited { .. } => true,
            RagError::EmbeddingError { message, .. }
            | RagError::GenerationError { message, .. } => {
                let message = message.to_ascii_lowercase();
                message.contains("resource_exhausted")
                    || message.contains("rate limit")
                    || message.contains("quota")
                    || message.contains("429")
            }
            _ => false,
        }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
