//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use ttrelay_core::config::DEFAULT_CONFIG_PATH;

/// Relay short-form videos into a chat.
///
/// Finds video links (or a bare numeric video id) in the given text, fetches
/// each video, makes it playable everywhere and uploads it to the chat.
#[derive(Parser, Debug)]
#[command(name = "ttrelay")]
#[command(author, version, about)]
pub struct Args {
    /// Text containing video links or a numeric video id (read from stdin if omitted)
    #[arg(conflicts_with = "file")]
    pub text: Vec<String>,

    /// Path to the config file (useful to run several relays side by side)
    #[arg(long = "cfg", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Keep scratch files and log at debug level
    ///
    /// Without this flag, scratch files are deleted after a grace period and
    /// the process stays alive until those deletions have run.
    #[arg(long)]
    pub debug: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Chat to deliver to
    #[arg(long, allow_negative_numbers = true)]
    pub chat_id: i64,

    /// Message id to reply to
    #[arg(long, allow_negative_numbers = true)]
    pub reply_to: Option<i64>,

    /// Relay a local video file instead of links
    #[arg(long)]
    pub file: Option<PathBuf>,
}

impl Args {
    /// Log filter used when `RUST_LOG` is not set.
    ///
    /// Priority: quiet flag > verbose flag > debug flag > default (info).
    #[must_use]
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 if self.debug => "debug",
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
