//! Loading the question/answer corpus from local files.
//!
//! Two layouts are accepted: a single JSON array of rows, or JSON lines
//! with one row per line. Rows may use the dataset's Turkish column names
//! (`Soru`, `Cevap`). A row without an `id` takes its position in the file.
//! Rows whose answer is blank are skipped with a warning, since there is
//! nothing to chunk.

use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::document::SourceRecord;
use crate::error::{RagError, Result};

#[derive(Deserialize)]
struct RawRecord {
    id: Option<i64>,
    #[serde(default, alias = "Soru", alias = "soru")]
    question: String,
    #[serde(default, alias = "Cevap", alias = "cevap")]
    answer: String,
}

/// Read the corpus at `path`.
///
/// # Errors
///
/// Returns [`RagError::CorpusError`] if the file cannot be read or a row
/// fails to parse.
pub fn load_corpus(path: impl AsRef<Path>) -> Result<Vec<SourceRecord>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .map_err(|e| RagError::CorpusError(format!("failed to read '{}': {e}", path.display())))?;
    let records = parse_corpus(&raw)?;
    info!(path = %path.display(), records = records.len(), "loaded corpus");
    Ok(records)
}

/// Parse corpus text in either accepted layout.
///
/// # Errors
///
/// Returns [`RagError::CorpusError`] on malformed JSON.
pub fn parse_corpus(raw: &str) -> Result<Vec<SourceRecord>> {
    let rows: Vec<RawRecord> = if raw.trim_start().starts_with('[') {
        serde_json::from_str(raw)
            .map_err(|e| RagError::CorpusError(format!("invalid JSON array: {e}")))?
    } else {
        raw.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str(line)
                    .map_err(|e| RagError::CorpusError(format!("line {}: {e}", n + 1)))
            })
            .collect::<Result<_>>()?
    };

    let mut records = Vec::with_capacity(rows.len());
    for (position, row) in rows.into_iter().enumerate() {
        let id = row.id.unwrap_or(position as i64);
        if row.answer.trim().is_empty() {
            warn!(id, "skipping corpus row with empty answer");
            continue;
        }
        records.push(SourceRecord { id, question: row.question, answer: row.answer });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_turkish_columns_from_array() {
        let raw = r#"[
            {"Soru": "Anayasa nedir?", "Cevap": "Devletin temel kanunudur."},
            {"id": 7, "question": "Q", "answer": "A"}
        ]"#;
        let records = parse_corpus(raw).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, 0);
        assert_eq!(records[0].question, "Anayasa nedir?");
        assert_eq!(records[1].id, 7);
    }

    #[test]
    fn reads_json_lines_and_skips_blank_answers() {
        let raw = concat!(
            r#"{"soru": "a", "cevap": "x"}"#,
            "\n\n",
            r#"{"soru": "b", "cevap": "  "}"#,
            "\n",
            r#"{"soru": "c", "cevap": "z"}"#,
            "\n",
        );
        let records = parse_corpus(raw).unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0, 2]);
    }

    #[test]
    fn malformed_line_reports_its_number() {
        let err = parse_corpus("{\"answer\": \"ok\"}\n{oops").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
