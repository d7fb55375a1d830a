//! CLI entry point for the relay.

use std::io::{self, IsTerminal, Read};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info};
use ttrelay_core::{Destination, RelayConfig, RelayPipeline, RelaySummary};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > debug flag > default (info)
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(args.default_log_level()));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let config = RelayConfig::load(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;
    config
        .ensure_data_dir()
        .context("Failed to prepare data directory")?;

    let pipeline =
        RelayPipeline::from_config(&config, args.debug).context("Failed to set up relay")?;

    let mut destination = Destination::chat(args.chat_id);
    if let Some(reply_to) = args.reply_to {
        destination = destination.replying_to(reply_to);
    }

    info!(chat_id = args.chat_id, debug = args.debug, "ttrelay starting");

    let outcome = if let Some(file) = &args.file {
        pipeline
            .relay_local_file(&destination, file)
            .await
            .map(|report| RelaySummary {
                links: vec![report],
            })
            .with_context(|| format!("Failed to relay {}", file.display()))
    } else {
        let Some(text) = read_input_text(&args)? else {
            info!("No input provided. Pass text as arguments or pipe it via stdin.");
            info!("Example: ttrelay --chat-id 42 https://vm.tiktok.com/ZMabc/");
            return Ok(());
        };
        pipeline
            .relay_text(&destination, &text)
            .await
            .context("Failed to relay message")
    };

    match &outcome {
        Ok(summary) => {
            for notice in summary.notices() {
                info!(%notice, "Delivered with notice");
            }
            info!(delivered = summary.delivered(), "Relay complete");
        }
        Err(err) => error!(error = %format!("{err:#}"), "Relay failed"),
    }

    // Scheduled deletions are detached tasks; let them finish before the runtime goes away.
    let pending = pipeline.cleanup().pending_count();
    if pending > 0 {
        info!(
            pending,
            grace_secs = pipeline.cleanup().grace().as_secs(),
            "Waiting for scheduled scratch file cleanup before exiting (--debug keeps files and skips this)"
        );
        pipeline.cleanup().wait_idle().await;
    }

    outcome.map(|_| ())
}

/// Reads input from positional arguments, or stdin when it is not a terminal.
fn read_input_text(args: &Args) -> Result<Option<String>> {
    if !args.text.is_empty() {
        return Ok(Some(args.text.join(" ")));
    }
    if io::stdin().is_terminal() {
        return Ok(None);
    }
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read stdin")?;
    if buffer.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(buffer))
}
