//! Deterministic test doubles for the embedding and generation seams.
//!
//! [`MockEmbeddingProvider`] hashes text into a normalized vector, so
//! identical strings always map to identical embeddings and an exact-text
//! query scores 1.0 against its own chunk. Failures can be scripted per
//! call kind. [`MockGenerator`] replays queued responses and records the
//! prompts it received.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::document::Embedding;
use crate::embedding::{EmbeddingProvider, TaskType};
use crate::error::{RagError, Result};
use crate::generation::{GenerationRequest, GenerationResponse, Generator};

/// Hash-based embedding provider with scriptable failures.
#[derive(Debug, Default)]
pub struct MockEmbeddingProvider {
    dimensions: usize,
    failing_batches: usize,
    failing_singles: usize,
    rate_limited: bool,
    null_texts: HashSet<String>,
    batch_calls: AtomicUsize,
    single_calls: AtomicUsize,
    task_types: Mutex<Vec<TaskType>>,
}

impl MockEmbeddingProvider {
    /// Create a provider producing `dimensions`-long vectors.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions, ..Self::default() }
    }

    /// Fail the first `n` batch calls.
    pub fn failing_batches(mut self, n: usize) -> Self {
        self.failing_batches = n;
        self
    }

    /// Fail the first `n` single-text calls.
    pub fn failing_singles(mut self, n: usize) -> Self {
        self.failing_singles = n;
        self
    }

    /// Report scripted failures as rate limits instead of transient errors.
    pub fn rate_limited(mut self) -> Self {
        self.rate_limited = true;
        self
    }

    /// Return `None` for this text inside batches, and an error for it alone.
    pub fn null_for(mut self, text: impl Into<String>) -> Self {
        self.null_texts.insert(text.into());
        self
    }

    /// Number of batch calls received so far.
    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    /// Number of single-text calls received so far.
    pub fn single_calls(&self) -> usize {
        self.single_calls.load(Ordering::SeqCst)
    }

    /// Task types of every call, in order.
    pub fn task_types(&self) -> Vec<TaskType> {
        self.task_types.lock().map(|t| t.clone()).unwrap_or_default()
    }

    /// The embedding this provider returns for `text`.
    pub fn vector_for(&self, text: &str) -> Embedding {
        let hash = text.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        let mut emb = vec![0.0f32; self.dimensions];
        for (i, v) in emb.iter_mut().enumerate() {
            // Top 24 bits only: they fit an f32 mantissa exactly.
            let bits = splitmix64(hash ^ i as u64) >> 40;
            *v = bits as f32 / (1u32 << 24) as f32 - 0.5;
        }
        let norm: f32 = emb.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            emb.iter_mut().for_each(|x| *x /= norm);
        }
        emb
    }

    fn record(&self, task_type: TaskType) {
        if let Ok(mut types) = self.task_types.lock() {
            types.push(task_type);
        }
    }

    fn scripted_failure(&self) -> RagError {
        if self.rate_limited {
            RagError::RateLimited { provider: "Mock".into(), message: "RESOURCE_EXHAUSTED".into() }
        } else {
            RagError::EmbeddingError {
                provider: "Mock".into(),
                message: "transient failure".into(),
            }
        }
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str, task_type: TaskType) -> Result<Embedding> {
        let call = self.single_calls.fetch_add(1, Ordering::SeqCst);
        self.record(task_type);
        if call < self.failing_singles || self.null_texts.contains(text) {
            return Err(self.scripted_failure());
        }
        Ok(self.vector_for(text))
    }

    async fn embed_batch(
        &self,
        texts: &[&str],
        task_type: TaskType,
    ) -> Result<Vec<Option<Embedding>>> {
        let call = self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.record(task_type);
        if call < self.failing_batches {
            return Err(self.scripted_failure());
        }
        Ok(texts
            .iter()
            .map(|t| (!self.null_texts.contains(*t)).then(|| self.vector_for(t)))
            .collect())
    }
}

fn splitmix64(seed: u64) -> u64 {
    let mut z = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// A generator that replays queued responses.
///
/// When the queue is empty it answers with the fallback text.
#[derive(Debug)]
pub struct MockGenerator {
    responses: Mutex<VecDeque<Result<GenerationResponse>>>,
    fallback: String,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockGenerator {
    /// A generator that always answers with `text`.
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fallback: text.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a response to be returned before falling back.
    pub fn then(self, response: Result<GenerationResponse>) -> Self {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(response);
        }
        self
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// The prompt of the most recent request.
    pub fn last_prompt(&self) -> Option<String> {
        self.requests().last().map(|r| r.prompt.clone())
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let queued = self.responses.lock().ok().and_then(|mut q| q.pop_front());
        queued.unwrap_or_else(|| Ok(GenerationResponse::text(self.fallback.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vectorstore::cosine_similarity;

    const ANAYASA: &str = "Anayasa, devletin temel yapısını düzenleyen en üstün kanundur.";
    const MIRAS: &str = "Yasal ve atanmış mirasçılar terekeye birlikte sahip olurlar.";

    #[test]
    fn distinct_long_texts_get_distinct_directions() {
        let provider = MockEmbeddingProvider::new(64);
        let a = provider.vector_for(ANAYASA);
        let b = provider.vector_for(MIRAS);

        assert!(cosine_similarity(&a, &b) < 0.99);
        assert!(cosine_similarity(&a, &provider.vector_for("madde 3")) < 0.99);
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn components_vary_within_one_vector() {
        let provider = MockEmbeddingProvider::new(16);
        let v = provider.vector_for(MIRAS);
        assert!(v.iter().any(|x| (x - v[0]).abs() > 1e-3));
        assert_eq!(v, provider.vector_for(MIRAS));
    }
}
