//! `hukuk`: build and query the Turkish-law RAG index.

mod cli;
mod commands;
mod logging;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.global.log_json);

    let config = cli.global.resolve_config(&cli.command)?;
    match &cli.command {
        Command::Build { corpus, .. } => commands::build(&cli.global, config, corpus).await,
        Command::Ask { question } => commands::ask(&cli.global, config, question).await,
        Command::Chat => commands::chat(&cli.global, config).await,
        Command::Inspect => commands::inspect(config).await,
    }
}
