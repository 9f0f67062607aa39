//! Query-time lookup against a built collection.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::RagConfig;
use crate::document::SearchResult;
use crate::embedding::EmbeddingClient;
use crate::error::{RagError, Result};
use crate::manifest::BuildManifest;
use crate::vectorstore::VectorStore;

/// One retrieved chunk with its provenance label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    /// The original question, or `ID: <source_id>` when it is unknown.
    pub source: String,
    pub source_id: i64,
    pub score: f32,
}

impl From<SearchResult> for Passage {
    fn from(result: SearchResult) -> Self {
        let metadata = result.entry.metadata;
        let source = metadata
            .source_question
            .filter(|q| !q.trim().is_empty())
            .unwrap_or_else(|| format!("ID: {}", metadata.source_id));
        Self {
            text: result.entry.text,
            source,
            source_id: metadata.source_id,
            score: result.score,
        }
    }
}

/// Ranked passages for one query, best first.
///
/// A degraded lookup (embedding or search failure) yields no passages and a
/// diagnostic explaining why.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub passages: Vec<Passage>,
    pub diagnostic: Option<String>,
}

impl RetrievalResult {
    fn degraded(diagnostic: String) -> Self {
        Self { passages: Vec::new(), diagnostic: Some(diagnostic) }
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Passages formatted for the prompt, separated by blank lines.
    pub fn context(&self) -> String {
        self.passages
            .iter()
            .map(|p| format!("Metin: {}", p.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Source labels in rank order, without duplicates.
    pub fn sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = Vec::new();
        for passage in &self.passages {
            if !sources.contains(&passage.source) {
                sources.push(passage.source.clone());
            }
        }
        sources
    }

    /// The deduplicated sources as a bullet list.
    pub fn source_block(&self) -> String {
        self.sources().iter().map(|s| format!("- {s}")).collect::<Vec<_>>().join("\n")
    }
}

/// Embeds questions and looks them up in a built collection.
///
/// Open one per process with [`Retriever::open`] and share it; lookups take
/// `&self`.
pub struct Retriever {
    store: Arc<dyn VectorStore>,
    client: EmbeddingClient,
    collection: String,
    top_k: usize,
    manifest: BuildManifest,
}

impl Retriever {
    /// Open the configured collection for querying.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::CollectionNotReady`] if the collection has no
    /// manifest, holds no entries, or was built with a different embedding
    /// model than `config.embedding_model`.
    pub async fn open(
        store: Arc<dyn VectorStore>,
        config: &RagConfig,
        client: EmbeddingClient,
    ) -> Result<Self> {
        let collection = config.collection_name.clone();
        let not_ready = |reason: String| RagError::CollectionNotReady {
            collection: collection.clone(),
            reason,
        };

        let manifest = store
            .read_manifest(&collection)
            .await?
            .ok_or_else(|| not_ready("no build manifest found; run the index build".into()))?;
        manifest.ensure_compatible(config)?;

        let count = store
            .count(&collection)
            .await
            .map_err(|e| not_ready(format!("collection cannot be read: {e}")))?;
        if count == 0 {
            return Err(not_ready("collection has no entries".into()));
        }

        info!(
            collection = %collection,
            entries = count,
            model = %manifest.embedding_model,
            "collection opened"
        );
        Ok(Self { store, client, collection, top_k: config.top_k, manifest })
    }

    /// The manifest the collection was opened with.
    pub fn manifest(&self) -> &BuildManifest {
        &self.manifest
    }

    /// The default number of passages per query.
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Retrieve the `k` passages most similar to `query`.
    ///
    /// Never fails; problems are reported in [`RetrievalResult::diagnostic`].
    pub async fn retrieve(&self, query: &str, k: usize) -> RetrievalResult {
        let embedding = match self.client.embed_query(query).await {
            Ok(embedding) => embedding,
            Err(e) => {
                error!(error = %e, "query embedding failed");
                return RetrievalResult::degraded(format!("query embedding failed: {e}"));
            }
        };

        match self.store.search(&self.collection, &embedding, k).await {
            Ok(results) => {
                debug!(
                    collection = %self.collection,
                    k,
                    hits = results.len(),
                    "retrieved passages"
                );
                RetrievalResult {
                    passages: results.into_iter().map(Passage::from).collect(),
                    diagnostic: None,
                }
            }
            Err(e) => {
                error!(collection = %self.collection, error = %e, "vector search failed");
                RetrievalResult::degraded(format!("vector search failed: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{EntryMetadata, IndexEntry};

    fn passage(text: &str, question: Option<&str>, source_id: i64) -> Passage {
        SearchResult {
            entry: IndexEntry {
                id: "doc_0".into(),
                embedding: vec![1.0],
                text: text.into(),
                metadata: EntryMetadata {
                    source_id,
                    source_question: question.map(str::to_string),
                },
            },
            score: 0.9,
        }
        .into()
    }

    #[test]
    fn missing_question_falls_back_to_id_label() {
        assert_eq!(passage("t", None, 42).source, "ID: 42");
        assert_eq!(passage("t", Some(" "), 7).source, "ID: 7");
        assert_eq!(passage("t", Some("Anayasa nedir?"), 1).source, "Anayasa nedir?");
    }

    #[test]
    fn context_and_sources_are_formatted() {
        let result = RetrievalResult {
            passages: vec![
                passage("birinci", Some("S1"), 1),
                passage("ikinci", Some("S1"), 1),
                passage("üçüncü", None, 9),
            ],
            diagnostic: None,
        };
        assert_eq!(result.context(), "Metin: birinci\n\nMetin: ikinci\n\nMetin: üçüncü");
        assert_eq!(result.sources(), vec!["S1".to_string(), "ID: 9".to_string()]);
        assert_eq!(result.source_block(), "- S1\n- ID: 9");
    }
}
