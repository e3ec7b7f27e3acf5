//! UFD CLI - terminal download accelerator
//!
//! Downloads one file over several parallel connections and resumes
//! automatically when run again with the same URL and destination.

mod output;
mod progress;

use anyhow::Result;
use clap::Parser;
use progress::DownloadProgress;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use ufd_core::DownloadEngine;

/// UFD - segmented, resumable downloader
#[derive(Parser)]
#[command(name = "ufd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// URL to download (prompted for when omitted)
    url: Option<String>,

    /// Number of parallel connections
    #[arg(short = 'n', long, default_value_t = 8, env = "UFD_CONNECTIONS")]
    connections: u32,

    /// Output file or directory
    #[arg(short, long, env = "UFD_OUTPUT")]
    output: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let url = match cli.url {
        Some(url) => url,
        None => dialoguer::Input::<String>::new()
            .with_prompt("Enter the URL to download")
            .interact_text()?,
    };
    let url = url.trim().to_string();
    tracing::debug!("Downloading {} with {} connections", url, cli.connections);

    let mut engine = DownloadEngine::new(&url, cli.connections, cli.output.as_deref()).await?;

    let events = engine.subscribe();
    let renderer = tokio::spawn(DownloadProgress::new().run(events));

    // Ctrl-C stops the workers; state stays on disk for the next run
    let token = engine.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let result = async {
        engine.init().await?;
        engine.start().await
    }
    .await;

    // Dropping the engine closes the event channel and ends the renderer
    drop(engine);
    let _ = renderer.await;

    result?;
    Ok(())
}
