//! Data types for corpus records, chunks, index entries, and search results.

use serde::{Deserialize, Serialize};

/// A vector embedding produced for one chunk or one query.
pub type Embedding = Vec<f32>;

/// One question/answer row of the legal corpus.
///
/// The dataset ships Turkish column names, so `Soru`/`Cevap` are accepted
/// as aliases when deserializing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceRecord {
    /// Row identifier within the corpus.
    pub id: i64,
    /// The original question.
    #[serde(alias = "Soru", alias = "soru")]
    pub question: String,
    /// The answer text. This is what gets chunked and embedded.
    #[serde(alias = "Cevap", alias = "cevap")]
    pub answer: String,
}

/// A bounded slice of a [`SourceRecord`]'s answer text.
///
/// Chunks carry no embedding; the index builder pairs them with vectors
/// and consumes them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// The text content of the chunk.
    pub text: String,
    /// The `id` of the originating record.
    pub source_id: i64,
    /// The question of the originating record.
    pub source_question: String,
}

/// Provenance stored next to every index entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntryMetadata {
    /// The `id` of the originating record.
    pub source_id: i64,
    /// The question of the originating record, if it was known at build time.
    #[serde(rename = "question", default, skip_serializing_if = "Option::is_none")]
    pub source_question: Option<String>,
}

/// The persisted unit of a vector collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    /// Stable identifier derived from the chunk position (`doc_<i>`).
    pub id: String,
    /// The chunk embedding. Never empty in a stored entry.
    pub embedding: Embedding,
    /// The raw chunk text.
    #[serde(rename = "document")]
    pub text: String,
    /// Source provenance.
    pub metadata: EntryMetadata,
}

impl IndexEntry {
    /// Build the entry for the chunk at `position` with its embedding.
    pub fn from_chunk(position: usize, chunk: Chunk, embedding: Embedding) -> Self {
        Self {
            id: entry_id(position),
            embedding,
            text: chunk.text,
            metadata: EntryMetadata {
                source_id: chunk.source_id,
                source_question: Some(chunk.source_question).filter(|q| !q.is_empty()),
            },
        }
    }
}

/// The entry id for the chunk at `position`.
pub fn entry_id(position: usize) -> String {
    format!("doc_{position}")
}

/// A retrieved [`IndexEntry`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The retrieved entry.
    pub entry: IndexEntry,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}
