//! Property tests for in-memory vector store search ordering.

use std::collections::HashMap;

use hukuk_rag::document::{EntryMetadata, IndexEntry, entry_id};
use hukuk_rag::inmemory::InMemoryVectorStore;
use hukuk_rag::vectorstore::VectorStore;
use proptest::prelude::*;

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-8 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

fn entry(position: usize, text: String, embedding: Vec<f32>) -> IndexEntry {
    IndexEntry {
        id: entry_id(position),
        embedding,
        text,
        metadata: EntryMetadata { source_id: position as i64, source_question: None },
    }
}

fn position(id: &str) -> usize {
    id.trim_start_matches("doc_").parse().unwrap()
}

/// Searching returns at most `top_k` results in descending score order,
/// and equal scores keep chunk order.
mod prop_inmemory_search_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_descending_and_bounded_by_top_k(
            items in proptest::collection::vec(
                ("[a-z ]{5,30}", arb_normalized_embedding(DIM)),
                1..20,
            ),
            query in arb_normalized_embedding(DIM),
            top_k in 1usize..25,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let entries: Vec<IndexEntry> = items
                .into_iter()
                .enumerate()
                .map(|(i, (text, embedding))| entry(i, text, embedding))
                .collect();
            let stored = entries.len();

            let results = rt.block_on(async {
                let store = InMemoryVectorStore::new();
                store.create_collection("test").await.unwrap();
                store.upsert("test", &entries).await.unwrap();
                store.search("test", &query, top_k).await.unwrap()
            });

            prop_assert!(results.len() <= top_k);
            prop_assert_eq!(results.len(), top_k.min(stored));

            for window in results.windows(2) {
                prop_assert!(
                    window[0].score >= window[1].score,
                    "results not in descending order: {} < {}",
                    window[0].score,
                    window[1].score,
                );
                if window[0].score == window[1].score {
                    prop_assert!(position(&window[0].entry.id) < position(&window[1].entry.id));
                }
            }
        }

        #[test]
        fn duplicate_vectors_rank_by_position(
            embedding in arb_normalized_embedding(DIM),
            copies in 2usize..15,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let entries: Vec<IndexEntry> =
                (0..copies).map(|i| entry(i, format!("copy {i}"), embedding.clone())).collect();

            let results = rt.block_on(async {
                let store = InMemoryVectorStore::new();
                store.create_collection("test").await.unwrap();
                store.upsert("test", &entries).await.unwrap();
                store.search("test", &embedding, copies).await.unwrap()
            });

            let ids: Vec<usize> = results.iter().map(|r| position(&r.entry.id)).collect();
            prop_assert_eq!(ids, (0..copies).collect::<Vec<_>>());
        }
    }
}

#[tokio::test]
async fn upsert_replaces_entries_with_the_same_id() {
    let store = InMemoryVectorStore::new();
    store.create_collection("test").await.unwrap();
    store.upsert("test", &[entry(0, "old".into(), vec![1.0, 0.0])]).await.unwrap();
    store.upsert("test", &[entry(0, "new".into(), vec![0.0, 1.0])]).await.unwrap();

    assert_eq!(store.count("test").await.unwrap(), 1);
    let results = store.search("test", &[0.0, 1.0], 1).await.unwrap();
    assert_eq!(results[0].entry.text, "new");
}

#[tokio::test]
async fn mismatched_dimensions_are_rejected() {
    let store = InMemoryVectorStore::new();
    store.create_collection("test").await.unwrap();
    store.upsert("test", &[entry(0, "a".into(), vec![1.0, 0.0])]).await.unwrap();

    assert!(store.upsert("test", &[entry(1, "b".into(), vec![1.0])]).await.is_err());
    assert!(store.search("test", &[1.0, 0.0, 0.0], 1).await.is_err());
    assert!(store.upsert("test", &[entry(2, "c".into(), Vec::new())]).await.is_err());
}

#[tokio::test]
async fn missing_collection_is_an_error() {
    let store = InMemoryVectorStore::new();
    assert!(store.search("nope", &[1.0], 1).await.is_err());
    assert!(store.count("nope").await.is_err());
    assert!(store.read_manifest("nope").await.unwrap().is_none());

    store.create_collection("test").await.unwrap();
    store.delete_collection("test").await.unwrap();
    assert!(store.count("test").await.is_err());
}

#[test]
fn entry_serializes_with_document_and_question_keys() {
    let mut e = entry(3, "metin".into(), vec![0.5]);
    e.metadata.source_question = Some("Soru?".into());
    let json = serde_json::to_value(&e).unwrap();
    assert_eq!(json["id"], "doc_3");
    assert_eq!(json["document"], "metin");
    assert_eq!(json["metadata"]["question"], "Soru?");

    let map: HashMap<String, serde_json::Value> = serde_json::from_value(json).unwrap();
    assert!(map.contains_key("embedding"));
}
