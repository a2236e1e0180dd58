//! SiteCorpus CLI — crawl a website into a structured Markdown corpus.
//!
//! Pages are fetched over plain HTTP and escalated to a headless browser
//! when the static response has no usable content.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
