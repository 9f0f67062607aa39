//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::time::Duration;

use async_trait::async_trait;
use hukuk_rag::document::{Embedding, SourceRecord};
use hukuk_rag::embedding::{EmbeddingProvider, TaskType};
use hukuk_rag::error::Result;
use hukuk_rag::{RagConfig, RetryPolicy};

/// A config that never sleeps: zero batch pause and immediate retries.
pub fn fast_config() -> RagConfig {
    RagConfig::builder()
        .collection_name("test_collection")
        .batch_pause(Duration::ZERO)
        .ingest_retry(RetryPolicy::immediate(2))
        .query_retry(RetryPolicy::immediate(1))
        .build()
        .unwrap()
}

pub fn record(id: i64, question: &str, answer: &str) -> SourceRecord {
    SourceRecord { id, question: question.to_string(), answer: answer.to_string() }
}

/// Counts vocabulary words, so texts sharing a topic land close together.
pub struct KeywordEmbedder {
    vocabulary: Vec<&'static str>,
}

impl KeywordEmbedder {
    pub fn legal() -> Self {
        Self {
            vocabulary: vec![
                "anayasa", "devlet", "temel", "kanun", "miras", "mirasçı", "kira", "kiracı",
                "boşanma", "evlilik", "nafaka", "ceza", "hapis", "işçi", "kıdem", "tazminat",
            ],
        }
    }

    pub fn vector_for(&self, text: &str) -> Embedding {
        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = lowered.split(|c: char| !c.is_alphanumeric()).collect();
        let mut v: Vec<f32> = self
            .vocabulary
            .iter()
            .map(|word| tokens.iter().filter(|t| t.starts_with(word)).count() as f32)
            .collect();
        // Keeps every vector non-zero.
        v.push(0.1);
        v
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str, _task_type: TaskType) -> Result<Embedding> {
        Ok(self.vector_for(text))
    }
}

pub fn legal_corpus() -> Vec<SourceRecord> {
    vec![
        record(
            0,
            "Anayasa nedir?",
            "Anayasa, devletin temel yapısını, yasama, yürütme ve yargı organlarını ve \
             temel hak ve özgürlükleri düzenleyen en üstün kanundur.",
        ),
        record(
            1,
            "Kiracı kira bedelini ödemezse ne olur?",
            "Kiracı kira bedelini ödemezse kiraya veren yazılı süre vererek kira \
             sözleşmesini feshedebilir.",
        ),
        record(
            2,
            "Boşanmada nafaka nasıl belirlenir?",
            "Boşanma davasında nafaka, tarafların ekonomik durumu ve evlilik süresi \
             dikkate alınarak belirlenir.",
        ),
        record(
            3,
            "Kıdem tazminatı kimlere ödenir?",
            "En az bir yıl çalışmış işçi, kanunda sayılan hallerde kıdem tazminatı \
             almaya hak kazanır.",
        ),
        record(
            4,
            "Mirasçı mirası reddedebilir mi?",
            "Yasal ve atanmış mirasçılar, mirası üç ay içinde reddedebilir.",
        ),
    ]
}
