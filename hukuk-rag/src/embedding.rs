//! Embedding provider trait and the retrying embedding client.
//!
//! [`EmbeddingProvider`] is the raw backend seam (Gemini, mocks).
//! [`EmbeddingClient`] wraps a provider with a [`RetryPolicy`] and
//! normalizes single and batch calls into one result shape: a sequence of
//! optional embeddings, one slot per input.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::document::Embedding;
use crate::error::{RagError, Result};
use crate::retry::RetryPolicy;

/// What an embedding will be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskType {
    /// A passage stored in the index.
    #[serde(rename = "RETRIEVAL_DOCUMENT")]
    Document,
    /// A user question used for lookup.
    #[serde(rename = "RETRIEVAL_QUERY")]
    Query,
}

impl TaskType {
    /// The wire name used by the embedding API.
    pub fn as_api_str(&self) -> &'static str {
        match self {
            TaskType::Document => "RETRIEVAL_DOCUMENT",
            TaskType::Query => "RETRIEVAL_QUERY",
        }
    }
}

/// A backend that generates vector embeddings from text.
///
/// The default [`embed_batch`](EmbeddingProvider::embed_batch) calls
/// [`embed`](EmbeddingProvider::embed) sequentially; backends with a native
/// batch endpoint should override it. A `None` slot in a batch result marks
/// an item the backend could not embed.
///
/// Per-item failures never fail the batch unless every item failed, in
/// which case the last error is returned so the batch can be retried.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text.
    async fn embed(&self, text: &str, task_type: TaskType) -> Result<Embedding>;

    /// Generate embedding vectors for a batch of texts, one slot per input.
    async fn embed_batch(
        &self,
        texts: &[&str],
        task_type: TaskType,
    ) -> Result<Vec<Option<Embedding>>> {
        let mut results = Vec::with_capacity(texts.len());
        let mut last_error = None;
        for (position, text) in texts.iter().enumerate() {
            match self.embed(text, task_type).await {
                Ok(embedding) => results.push(Some(embedding)),
                Err(e) => {
                    warn!(position, error = %e, "item embedding failed");
                    results.push(None);
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) if results.iter().all(Option::is_none) => Err(e),
            _ => Ok(results),
        }
    }
}

/// Input to [`EmbeddingClient::embed`].
#[derive(Debug, Clone, Copy)]
pub enum EmbedInput<'a> {
    /// One string; failures surface as an error.
    Single(&'a str),
    /// Many strings; failures degrade to `None` slots.
    Batch(&'a [&'a str]),
}

/// An [`EmbeddingProvider`] wrapped with a retry policy.
#[derive(Clone)]
pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
    policy: RetryPolicy,
}

impl EmbeddingClient {
    /// Wrap `provider` with `policy`.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    /// The retry policy in effect.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Embed a single string or a batch.
    ///
    /// `task_type` is honoured only for [`EmbedInput::Single`]; batches are
    /// always embedded as [`TaskType::Document`]. On exhausted retries a
    /// batch yields `None` for every input, while a single string returns the
    /// last error.
    ///
    /// # Errors
    ///
    /// Only [`EmbedInput::Single`] produces errors.
    pub async fn embed(
        &self,
        input: EmbedInput<'_>,
        task_type: TaskType,
    ) -> Result<Vec<Option<Embedding>>> {
        match input {
            EmbedInput::Single(text) => {
                let embedding = self
                    .policy
                    .run("embed", |_| async move {
                        let embedding = self.provider.embed(text, task_type).await?;
                        if embedding.is_empty() {
                            return Err(RagError::EmbeddingError {
                                provider: "client".into(),
                                message: "provider returned an empty embedding".into(),
                            });
                        }
                        Ok(embedding)
                    })
                    .await?;
                Ok(vec![Some(embedding)])
            }
            EmbedInput::Batch(texts) => Ok(self.embed_batch(texts).await),
        }
    }

    /// Embed a user query with [`TaskType::Query`].
    ///
    /// # Errors
    ///
    /// Returns the provider's last error once retries are exhausted.
    pub async fn embed_query(&self, query: &str) -> Result<Embedding> {
        self.embed(EmbedInput::Single(query), TaskType::Query)
            .await?
            .pop()
            .flatten()
            .ok_or_else(|| RagError::EmbeddingError {
                provider: "client".into(),
                message: "no embedding returned for query".into(),
            })
    }

    /// Embed passages for the index. Never fails; failed items are `None`.
    pub async fn embed_documents(&self, texts: &[&str]) -> Vec<Option<Embedding>> {
        self.embed_batch(texts).await
    }

    async fn embed_batch(&self, texts: &[&str]) -> Vec<Option<Embedding>> {
        if texts.is_empty() {
            return Vec::new();
        }
        debug!(batch_size = texts.len(), "embedding batch");

        let result = self
            .policy
            .run("embed_batch", |_| async move {
                let embeddings = self.provider.embed_batch(texts, TaskType::Document).await?;
                if embeddings.len() != texts.len() {
                    return Err(RagError::EmbeddingError {
                        provider: "client".into(),
                        message: format!(
                            "provider returned {} embeddings for {} inputs",
                            embeddings.len(),
                            texts.len()
                        ),
                    });
                }
                Ok(embeddings)
            })
            .await;

        match result {
            Ok(embeddings) => {
                embeddings.into_iter().map(|e| e.filter(|v| !v.is_empty())).collect()
            }
            Err(e) => {
                error!(batch_size = texts.len(), error = %e, "batch embedding exhausted retries");
                vec![None; texts.len()]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockEmbeddingProvider;

    #[tokio::test(start_paused = true)]
    async fn batch_is_always_document_typed() {
        let provider = Arc::new(MockEmbeddingProvider::new(8));
        let client = EmbeddingClient::new(provider.clone(), RetryPolicy::query());

        client.embed(EmbedInput::Batch(&["a", "b"]), TaskType::Query).await.unwrap();
        client.embed(EmbedInput::Single("c"), TaskType::Query).await.unwrap();

        assert_eq!(provider.task_types(), vec![TaskType::Document, TaskType::Query]);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_batch_degrades_to_nones() {
        let provider = Arc::new(MockEmbeddingProvider::new(8).failing_batches(usize::MAX));
        let client = EmbeddingClient::new(provider.clone(), RetryPolicy::ingestion());

        let result = client.embed(EmbedInput::Batch(&["a", "b", "c"]), TaskType::Document).await;

        assert_eq!(result.unwrap(), vec![None, None, None]);
        assert_eq!(provider.batch_calls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_single_surfaces_error() {
        let provider = Arc::new(MockEmbeddingProvider::new(8).failing_singles(usize::MAX));
        let client = EmbeddingClient::new(provider.clone(), RetryPolicy::query());

        assert!(client.embed_query("Anayasa nedir?").await.is_err());
        assert_eq!(provider.single_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_batch_failure_recovers() {
        let provider = Arc::new(MockEmbeddingProvider::new(8).failing_batches(2));
        let client = EmbeddingClient::new(provider.clone(), RetryPolicy::ingestion());

        let embeddings = client.embed_documents(&["a", "b"]).await;
        assert!(embeddings.iter().all(Option::is_some));
        assert_eq!(provider.batch_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_query_waits_longer_before_retrying() {
        let policy = RetryPolicy::query();

        let throttled = Arc::new(MockEmbeddingProvider::new(8).failing_singles(1).rate_limited());
        let started = tokio::time::Instant::now();
        EmbeddingClient::new(throttled, policy).embed_query("Anayasa nedir?").await.unwrap();
        let throttled_wait = started.elapsed();

        let transient = Arc::new(MockEmbeddingProvider::new(8).failing_singles(1));
        let started = tokio::time::Instant::now();
        EmbeddingClient::new(transient, policy).embed_query("Anayasa nedir?").await.unwrap();
        let transient_wait = started.elapsed();

        assert!(throttled_wait >= policy.wait_after(1, true));
        assert!(transient_wait >= policy.wait_after(1, false));
        assert!(transient_wait < policy.wait_after(1, true));
    }

    /// Relies on the trait's sequential batch fallback.
    struct SequentialOnly(MockEmbeddingProvider);

    #[async_trait]
    impl EmbeddingProvider for SequentialOnly {
        async fn embed(&self, text: &str, task_type: TaskType) -> Result<Embedding> {
            self.0.embed(text, task_type).await
        }
    }

    #[tokio::test]
    async fn sequential_fallback_keeps_good_items() {
        let provider = SequentialOnly(MockEmbeddingProvider::new(8).null_for("bad"));

        let slots = provider.embed_batch(&["good", "bad", "fine"], TaskType::Document).await;

        let slots = slots.unwrap();
        assert!(slots[0].is_some());
        assert!(slots[1].is_none());
        assert!(slots[2].is_some());
    }

    #[tokio::test]
    async fn sequential_fallback_fails_when_nothing_embeds() {
        let provider = SequentialOnly(MockEmbeddingProvider::new(8).null_for("bad"));

        assert!(provider.embed_batch(&["bad", "bad"], TaskType::Document).await.is_err());
        assert!(provider.embed_batch(&[], TaskType::Document).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn per_item_failures_stay_isolated() {
        let provider = Arc::new(MockEmbeddingProvider::new(8).null_for("bad"));
        let client = EmbeddingClient::new(provider, RetryPolicy::ingestion());

        let embeddings = client.embed_documents(&["good", "bad", "fine"]).await;
        assert!(embeddings[0].is_some());
        assert!(embeddings[1].is_none());
        assert!(embeddings[2].is_some());
    }
}
