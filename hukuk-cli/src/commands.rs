//! Subcommand implementations.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use hukuk_rag::gemini::DEFAULT_BASE_URL;
use hukuk_rag::{
    GeminiClient, GeminiEmbeddingProvider, GeminiGenerator, RagConfig, RagPipeline,
    SledVectorStore, SynthesizedAnswer, VectorStore, load_corpus,
};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{info, warn};

use crate::cli::GlobalArgs;

const GREETING: &str = "Merhaba! Türk hukuku hakkında ne öğrenmek istersiniz?";
const PROMPT: &str = "Soru> ";

fn gemini_client(args: &GlobalArgs) -> Result<GeminiClient> {
    let api_key = args
        .api_key
        .clone()
        .context("no API key: set GEMINI_API_KEY or pass --api-key")?;
    Ok(GeminiClient::with_options(
        api_key,
        DEFAULT_BASE_URL,
        Duration::from_secs(args.timeout_secs),
    )?)
}

fn serving_pipeline(args: &GlobalArgs, config: RagConfig) -> Result<RagPipeline> {
    let client = gemini_client(args)?;
    let store = SledVectorStore::open_existing(&config.collection_path)?;
    let pipeline = RagPipeline::builder()
        .embedding_provider(Arc::new(GeminiEmbeddingProvider::new(
            client.clone(),
            &config.embedding_model,
        )))
        .generator(Arc::new(GeminiGenerator::new(client, &config.generation_model)))
        .vector_store(Arc::new(store))
        .config(config)
        .build()?;
    Ok(pipeline)
}

fn print_answer(answer: &SynthesizedAnswer) {
    for diagnostic in &answer.diagnostics {
        warn!(%diagnostic, blocked = answer.blocked, "answer degraded");
    }
    println!("{}", answer.text);
}

pub async fn build(args: &GlobalArgs, config: RagConfig, corpus: &Path) -> Result<()> {
    let records = load_corpus(corpus)?;
    let client = gemini_client(args)?;
    let store = SledVectorStore::recreate(&config.collection_path)?;
    let pipeline = RagPipeline::builder()
        .embedding_provider(Arc::new(GeminiEmbeddingProvider::new(client, &config.embedding_model)))
        .vector_store(Arc::new(store))
        .config(config)
        .build()?;

    let report = pipeline
        .ingest(&records)
        .await
        .with_context(|| format!("building index from '{}'", corpus.display()))?;
    info!(
        collection = %report.collection,
        entries = report.entry_count,
        dropped = report.dropped_chunks,
        failed_embed_batches = report.failed_embed_batches,
        failed_persist_batches = report.failed_persist_batches,
        "index ready"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub async fn ask(args: &GlobalArgs, config: RagConfig, question: &str) -> Result<()> {
    let pipeline = serving_pipeline(args, config)?;
    let answer = pipeline.ask(question).await?;
    print_answer(&answer);
    Ok(())
}

pub async fn chat(args: &GlobalArgs, config: RagConfig) -> Result<()> {
    let pipeline = serving_pipeline(args, config)?;
    // Open eagerly so a missing collection is reported before the first prompt.
    pipeline.retriever().await?;

    let mut editor = DefaultEditor::new()?;
    println!("{GREETING}");
    loop {
        let line = match editor.readline(PROMPT) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question == "/exit" {
            break;
        }
        editor.add_history_entry(line.as_str())?;

        let answer = pipeline.ask(question).await?;
        print_answer(&answer);
        println!();
    }
    Ok(())
}

pub async fn inspect(config: RagConfig) -> Result<()> {
    let store = SledVectorStore::open_existing(&config.collection_path)?;
    let collection = config.collection_name.as_str();
    let count = store
        .count(collection)
        .await
        .with_context(|| format!("reading collection '{collection}'"))?;

    println!("path:       {}", store.path().display());
    println!("collection: {collection}");
    println!("entries:    {count}");
    match store.read_manifest(collection).await? {
        Some(manifest) => {
            println!("manifest:\n{}", serde_json::to_string_pretty(&manifest)?);
            if let Err(e) = manifest.ensure_compatible(&config) {
                println!("warning:    {e}");
            }
        }
        None => println!("manifest:   none (build did not complete)"),
    }
    Ok(())
}
