//! Recursive character splitting of corpus answers into chunks.
//!
//! [`RecursiveChunker`] tries paragraph breaks first, then line breaks, then
//! single characters, and merges the resulting pieces back into chunks of at
//! most `chunk_size` characters. Consecutive chunks carry up to
//! `chunk_overlap` characters of shared context; when a document falls back
//! to character splitting the overlap is exact.
//!
//! Lengths are counted in `char`s, not bytes, so Turkish letters such as
//! `ş` or `ğ` count once.

use std::collections::VecDeque;

use crate::config::RagConfig;
use crate::document::{Chunk, SourceRecord};

/// Paragraph, line, then character boundaries.
pub const DEFAULT_SEPARATORS: [&str; 3] = ["\n\n", "\n", ""];

/// A strategy for splitting corpus records into chunks.
pub trait Chunker: Send + Sync {
    /// Split one record's answer. Returns an empty `Vec` for an empty answer.
    fn chunk(&self, record: &SourceRecord) -> Vec<Chunk>;

    /// Split every record, preserving record order.
    fn split(&self, records: &[SourceRecord]) -> Vec<Chunk> {
        records.iter().flat_map(|record| self.chunk(record)).collect()
    }
}

/// Splits text hierarchically: paragraphs → lines → characters.
///
/// # Example
///
/// ```rust,ignore
/// use hukuk_rag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(1000, 150);
/// let chunks = chunker.split(&records);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker` with the default separators.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk
    /// * `chunk_overlap`: number of overlapping characters between consecutive chunks
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Create a chunker with the sizes from `config`.
    pub fn from_config(config: &RagConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Replace the separator hierarchy. An empty string splits by character.
    pub fn with_separators<S: Into<String>>(
        mut self,
        separators: impl IntoIterator<Item = S>,
    ) -> Self {
        self.separators = separators.into_iter().map(Into::into).collect();
        self
    }

    /// Split raw text into chunk strings.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let separators: Vec<&str> = self.separators.iter().map(String::as_str).collect();
        self.split_recursive(text, &separators)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = separators.last().copied().unwrap_or("");
        let mut remaining: &[&str] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate) {
                separator = candidate;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting));
                fitting.clear();
            }
            if remaining.is_empty() {
                push_trimmed(&mut chunks, piece);
            } else {
                chunks.extend(self.split_recursive(piece, remaining));
            }
        }

        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting));
        }
        chunks
    }

    /// Merge small pieces into chunks, carrying trailing pieces forward as overlap.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                push_trimmed(&mut chunks, &window.iter().copied().collect::<String>());
                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }
            window.push_back(piece);
            total += len;
        }

        push_trimmed(&mut chunks, &window.iter().copied().collect::<String>());
        chunks
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, record: &SourceRecord) -> Vec<Chunk> {
        if record.answer.trim().is_empty() {
            return Vec::new();
        }

        self.split_text(&record.answer)
            .into_iter()
            .map(|text| Chunk {
                text,
                source_id: record.id,
                source_question: record.question.clone(),
            })
            .collect()
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn push_trimmed(chunks: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Split at `separator`, attaching each separator to the piece that follows it.
/// An empty separator splits into single characters.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text.char_indices().map(|(i, c)| &text[i..i + c.len_utf8()]).collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (pos, _) in text.match_indices(separator) {
        if pos > start {
            pieces.push(&text[start..pos]);
        }
        start = pos;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}
