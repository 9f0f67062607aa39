//! Retriever and synthesizer tests over a small legal corpus.

mod common;

use std::sync::Arc;

use hukuk_rag::error::RagError;
use hukuk_rag::mock::{MockEmbeddingProvider, MockGenerator};
use hukuk_rag::synthesizer::{
    BLOCKED_ANSWER, CITATION_HEADING, GENERIC_ERROR_ANSWER, NO_CONTEXT, RESPONSE_ERROR_ANSWER,
};
use hukuk_rag::{
    AnswerSynthesizer, Chunker, EmbeddingClient, EmbeddingProvider, GenerationResponse,
    IndexBuilder, InMemoryVectorStore, Passage, RagConfig, RecursiveChunker, RetrievalResult,
    Retriever, RetryPolicy, VectorStore,
};

use common::{KeywordEmbedder, fast_config, legal_corpus};

async fn built_store(
    config: &RagConfig,
    provider: Arc<dyn EmbeddingProvider>,
) -> Arc<InMemoryVectorStore> {
    let store = Arc::new(InMemoryVectorStore::new());
    let chunks = RecursiveChunker::from_config(config).split(&legal_corpus());
    let client = EmbeddingClient::new(provider, config.ingest_retry);
    IndexBuilder::new(config.clone(), client, store.clone()).build(chunks).await.unwrap();
    store
}

async fn open(config: &RagConfig, provider: Arc<dyn EmbeddingProvider>) -> Retriever {
    let store = built_store(config, provider.clone()).await;
    Retriever::open(store, config, EmbeddingClient::new(provider, config.query_retry))
        .await
        .unwrap()
}

#[tokio::test]
async fn exact_chunk_text_ranks_its_chunk_first() {
    let config = fast_config();
    let provider = Arc::new(MockEmbeddingProvider::new(32));
    let retriever = open(&config, provider).await;

    for record in legal_corpus() {
        let result = retriever.retrieve(&record.answer, 3).await;
        assert_eq!(result.passages[0].text, record.answer);
        assert!((result.passages[0].score - 1.0).abs() < 1e-5);
        assert_eq!(result.passages[0].source, record.question);
    }
}

#[tokio::test]
async fn results_are_bounded_and_descending() {
    let config = fast_config();
    let retriever = open(&config, Arc::new(KeywordEmbedder::legal())).await;

    let result = retriever.retrieve("kira ve nafaka", 2).await;
    assert_eq!(result.passages.len(), 2);
    assert!(result.passages[0].score >= result.passages[1].score);
    assert!(result.diagnostic.is_none());
}

#[tokio::test]
async fn anayasa_question_is_answered_with_its_source() {
    let config = fast_config();
    let retriever = open(&config, Arc::new(KeywordEmbedder::legal())).await;
    let generator = Arc::new(MockGenerator::replying(
        "Anayasa, devletin temel yapısını düzenleyen en üstün kanundur.",
    ));
    let synthesizer = AnswerSynthesizer::from_config(generator.clone(), &config);

    let answer = synthesizer.answer("Anayasa nedir?", &retriever).await;

    assert!(!answer.blocked);
    assert_eq!(answer.sources[0], "Anayasa nedir?");
    assert!(answer.text.contains(CITATION_HEADING));
    assert!(answer.text.contains("- Anayasa nedir?"));

    let prompt = generator.last_prompt().unwrap();
    assert!(prompt.contains("Metin: Anayasa, devletin temel yapısını"));
    assert!(prompt.contains("Soru:\nAnayasa nedir?"));
    assert_eq!(generator.requests()[0].settings.temperature, 0.3);
}

#[tokio::test]
async fn query_embedding_failure_degrades_to_no_context() {
    let config = fast_config();
    let provider = Arc::new(MockEmbeddingProvider::new(16).null_for("Anayasa nedir?x"));
    let store = built_store(&config, provider.clone()).await;
    let retriever = Retriever::open(
        store,
        &config,
        EmbeddingClient::new(provider.clone(), RetryPolicy::immediate(3)),
    )
    .await
    .unwrap();

    let retrieval = retriever.retrieve("Anayasa nedir?x", 3).await;
    assert!(retrieval.is_empty());
    assert!(retrieval.diagnostic.as_deref().unwrap().contains("query embedding failed"));

    let generator = Arc::new(MockGenerator::replying(
        "Sağlanan bağlamda bu soruya ilişkin bilgi bulunamadı.",
    ));
    let synthesizer = AnswerSynthesizer::from_config(generator.clone(), &config);
    let answer = synthesizer.answer("Anayasa nedir?x", &retriever).await;

    assert!(generator.last_prompt().unwrap().contains(NO_CONTEXT));
    assert!(!answer.text.contains(CITATION_HEADING));
    assert_eq!(answer.diagnostics.len(), 1);
}

#[tokio::test]
async fn open_rejects_unbuilt_or_foreign_collections() {
    let config = fast_config();
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(MockEmbeddingProvider::new(8));
    let client = EmbeddingClient::new(provider.clone(), config.query_retry);

    let empty = Arc::new(InMemoryVectorStore::new());
    empty.create_collection(&config.collection_name).await.unwrap();
    let err = Retriever::open(empty, &config, client.clone()).await.err().unwrap();
    assert!(matches!(err, RagError::CollectionNotReady { .. }));

    let store = built_store(&config, provider).await;
    let other_model =
        RagConfig { embedding_model: "models/embedding-001".into(), ..config.clone() };
    let err = Retriever::open(store, &other_model, client).await.err().unwrap();
    assert!(err.to_string().contains("models/embedding-001"));
}

fn retrieval(passages: &[(&str, &str)]) -> RetrievalResult {
    RetrievalResult {
        passages: passages
            .iter()
            .enumerate()
            .map(|(i, (text, source))| Passage {
                text: text.to_string(),
                source: source.to_string(),
                source_id: i as i64,
                score: 0.5,
            })
            .collect(),
        diagnostic: None,
    }
}

#[tokio::test]
async fn safety_block_returns_the_apology() {
    let generator =
        Arc::new(MockGenerator::replying("unused").then(Ok(GenerationResponse::blocked("SAFETY"))));
    let synthesizer = AnswerSynthesizer::new(generator, 0.3);

    let answer = synthesizer.answer_with("soru", retrieval(&[("metin", "Kaynak")])).await;

    assert!(answer.blocked);
    assert_eq!(answer.text, BLOCKED_ANSWER);
    assert!(answer.diagnostics[0].contains("SAFETY"));
}

#[tokio::test]
async fn citations_are_deduplicated_in_rank_order() {
    let generator = Arc::new(MockGenerator::replying("Cevap metni."));
    let synthesizer = AnswerSynthesizer::new(generator, 0.3);

    let answer = synthesizer
        .answer_with("soru", retrieval(&[("a", "S2"), ("b", "S1"), ("c", "S2")]))
        .await;

    assert_eq!(answer.sources, vec!["S2".to_string(), "S1".to_string()]);
    assert_eq!(answer.text, format!("Cevap metni.{CITATION_HEADING}- S2\n- S1"));
}

#[tokio::test]
async fn not_found_answers_get_no_citations() {
    let generator = Arc::new(MockGenerator::replying("İlgili bilgi bulunamadı."));
    let synthesizer = AnswerSynthesizer::new(generator, 0.3);

    let answer = synthesizer.answer_with("soru", retrieval(&[("a", "S1")])).await;
    assert_eq!(answer.text, "İlgili bilgi bulunamadı.");
}

#[tokio::test]
async fn generator_error_becomes_generic_apology() {
    let generator = Arc::new(MockGenerator::replying("unused").then(Err(
        RagError::GenerationError { provider: "Mock".into(), message: "boom".into() },
    )));
    let synthesizer = AnswerSynthesizer::new(generator, 0.3);

    let answer = synthesizer.answer_with("soru", retrieval(&[("a", "S1")])).await;

    assert_eq!(answer.text, GENERIC_ERROR_ANSWER);
    assert!(!answer.blocked);
    assert!(answer.diagnostics[0].contains("boom"));
}

#[tokio::test]
async fn empty_unblocked_response_is_a_response_error() {
    let generator =
        Arc::new(MockGenerator::replying("unused").then(Ok(GenerationResponse::text(""))));
    let synthesizer = AnswerSynthesizer::new(generator, 0.3);

    let answer = synthesizer.answer_with("soru", retrieval(&[("a", "S1")])).await;
    assert_eq!(answer.text, RESPONSE_ERROR_ANSWER);
    assert!(!answer.blocked);
}
