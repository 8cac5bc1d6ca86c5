use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use factlab::genai::GenAiClient;
use factlab::pipeline;
use factlab::server::{run_server, Engine};
use factlab::types::{AnalysisInput, MediaAttachment};

#[derive(Parser)]
#[command(name = "factlab", version)]
struct Cli {
    /// API key for the generation provider
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: String,
    #[arg(long, default_value = "gemini-2.0-flash")]
    model: String,
    /// Outbound requests per second, shared across all stages
    #[arg(long, default_value_t = 4)]
    qps: u32,
    /// Per-call timeout; expiry is treated like any other remote failure
    #[arg(long, default_value_t = 30_000)]
    timeout_ms: u64,
    #[arg(long, default_value_t = 4)]
    search_concurrency: usize,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run the HTTP server (/chat and /analyze)
    Serve {
        #[arg(long, default_value = "0.0.0.0:5000")]
        addr: String,
    },
    /// Fact-check a single claim and/or image from the command line
    Check {
        #[arg(long)]
        claim: Option<String>,
        #[arg(long)]
        image: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let client = GenAiClient::new(cli.api_key, cli.model, cli.qps, cli.timeout_ms)?;

    match cli.cmd {
        Cmd::Serve { addr } => {
            let engine = Engine {
                genai: Arc::new(client),
                search_concurrency: cli.search_concurrency,
            };
            run_server(engine, &addr).await
        }
        Cmd::Check { claim, image } => {
            let image = match image {
                Some(path) => Some(MediaAttachment::from_bytes(tokio::fs::read(&path).await?)?),
                None => None,
            };
            let input = AnalysisInput { claim, image };
            let record = pipeline::run(&client, &input, cli.search_concurrency).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
    }
}
