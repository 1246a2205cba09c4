//! Command-line interface for the Eventline TDT pipeline.
//!
//! Two tools are provided:
//! - consume: replay an event corpus and build a timeline of detected
//!   topics
//! - idf: build a TF-IDF scheme from a corpus, for use as the consume
//!   tool's weighting scheme
//!
//! Logging is configured through `RUST_LOG`; the default level is `info`.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{consume::ConsumeArgs, idf::IdfArgs};

/// Eventline: topic detection and tracking over streaming posts.
#[derive(Parser)]
#[command(name = "eventline")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Consume an event corpus into a timeline of detected topics
    Consume(ConsumeArgs),

    /// Build a TF-IDF scheme from a corpus
    Idf(IdfArgs),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Consume(args) => commands::consume::execute(args).await,
        Commands::Idf(args) => commands::idf::execute(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
