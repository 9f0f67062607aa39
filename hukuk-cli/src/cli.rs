//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use hukuk_rag::RagConfig;

#[derive(Parser, Debug)]
#[command(
    name = "hukuk",
    version,
    about = "Turkish-law question answering over a local vector index"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// JSON config file. Values from HUKUK_* variables and flags override it.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory of the persisted collection.
    #[arg(long, global = true)]
    pub collection_path: Option<PathBuf>,

    /// Collection name inside the store.
    #[arg(long, global = true)]
    pub collection_name: Option<String>,

    /// Embedding model id.
    #[arg(long, global = true)]
    pub embedding_model: Option<String>,

    /// Generative model id.
    #[arg(long, global = true)]
    pub generation_model: Option<String>,

    /// Passages retrieved per question.
    #[arg(long, global = true)]
    pub top_k: Option<usize>,

    /// Gemini API key.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Timeout for each Gemini request, in seconds.
    #[arg(long, env = "HUKUK_TIMEOUT_SECS", default_value_t = 60, global = true)]
    pub timeout_secs: u64,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Chunk a corpus file and build the collection from scratch.
    Build {
        /// Corpus as a JSON array or JSON lines with question/answer (Soru/Cevap) fields.
        #[arg(long)]
        corpus: PathBuf,

        /// Maximum chunk size in characters.
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Overlap between consecutive chunks in characters.
        #[arg(long)]
        chunk_overlap: Option<usize>,
    },
    /// Answer a single question and exit.
    Ask {
        /// The question, in Turkish.
        question: String,
    },
    /// Interactive question answering. Type /exit to quit.
    Chat,
    /// Print the build manifest and entry count of the collection.
    Inspect,
}

impl GlobalArgs {
    /// Resolve the config: defaults, then the file, then the environment,
    /// then flags.
    pub fn resolve_config(&self, command: &Command) -> hukuk_rag::Result<RagConfig> {
        let base = match &self.config {
            Some(path) => RagConfig::from_file(path)?,
            None => RagConfig::default(),
        };
        let mut builder = base.apply_env()?.into_builder();

        if let Some(path) = &self.collection_path {
            builder = builder.collection_path(path);
        }
        if let Some(name) = &self.collection_name {
            builder = builder.collection_name(name);
        }
        if let Some(model) = &self.embedding_model {
            builder = builder.embedding_model(model);
        }
        if let Some(model) = &self.generation_model {
            builder = builder.generation_model(model);
        }
        if let Some(k) = self.top_k {
            builder = builder.top_k(k);
        }
        if let Command::Build { chunk_size, chunk_overlap, .. } = command {
            if let Some(size) = chunk_size {
                builder = builder.chunk_size(*size);
            }
            if let Some(overlap) = chunk_overlap {
                builder = builder.chunk_overlap(*overlap);
            }
        }
        builder.build()
    }
}
