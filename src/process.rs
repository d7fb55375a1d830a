//! External process runner shared by the fetch and media modules.
//!
//! Every subprocess (yt-dlp, ffprobe, ffmpeg, convert) goes through
//! [`ProcessRunner`], which captures output, maps failures into
//! [`ProcessError`] and optionally enforces a per-call timeout. A timed-out
//! child is killed when its future is dropped.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

/// Maximum number of bytes of stderr/stdout kept in error messages.
const MAX_OUTPUT_EXCERPT: usize = 2000;

/// Errors from running an external program.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The program could not be started (not installed, not executable, ...).
    #[error("failed to start {program}: {source}")]
    Spawn {
        /// Program name or path.
        program: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The program ran but exited unsuccessfully.
    #[error("{program} exited with {status}\n{output}")]
    Failed {
        /// Program name or path.
        program: String,
        /// Exit status description.
        status: String,
        /// Excerpt of stderr (or stdout when stderr is empty).
        output: String,
    },

    /// The program did not finish within the configured timeout.
    #[error("{program} timed out after {}s", .timeout.as_secs())]
    TimedOut {
        /// Program name or path.
        program: String,
        /// The timeout that elapsed.
        timeout: Duration,
    },
}

/// Captured output of a successful process run.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Raw stdout bytes.
    pub stdout: Vec<u8>,
    /// Raw stderr bytes.
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    /// Returns stdout decoded lossily as UTF-8.
    #[must_use]
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Runs external programs with an optional timeout.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    /// Creates a runner without a timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a runner that kills programs running longer than `timeout`.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }

    /// Creates a runner from an optional timeout.
    #[must_use]
    pub fn from_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    /// Returns the configured timeout, if any.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Runs `program` with `args`, optionally inside `working_dir`.
    ///
    /// # Errors
    ///
    /// - [`ProcessError::Spawn`] if the program cannot be started
    /// - [`ProcessError::Failed`] if it exits with a non-zero status
    /// - [`ProcessError::TimedOut`] if the timeout elapses first
    #[instrument(level = "debug", skip_all, fields(program = %program.as_ref().display()))]
    pub async fn run<I, S>(
        &self,
        program: impl AsRef<Path>,
        args: I,
        working_dir: Option<&Path>,
    ) -> Result<ProcessOutput, ProcessError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let program_path: PathBuf = program.as_ref().to_path_buf();
        let program_name = program_path.display().to_string();

        let mut command = Command::new(&program_path);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = working_dir {
            command.current_dir(dir);
        }

        debug!(command = ?command.as_std(), "running external program");

        let output_future = command.output();
        let output = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, output_future).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(program = %program_name, timeout_secs = timeout.as_secs(), "external program timed out, killing");
                    return Err(ProcessError::TimedOut {
                        program: program_name,
                        timeout,
                    });
                }
            },
            None => output_future.await,
        }
        .map_err(|source| ProcessError::Spawn {
            program: program_name.clone(),
            source,
        })?;

        if !output.status.success() {
            let detail = if output.stderr.is_empty() {
                excerpt(&output.stdout)
            } else {
                excerpt(&output.stderr)
            };
            return Err(ProcessError::Failed {
                program: program_name,
                status: output.status.to_string(),
                output: detail,
            });
        }

        Ok(ProcessOutput {
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Returns the tail of `bytes` as lossy UTF-8, capped at `MAX_OUTPUT_EXCERPT`.
fn excerpt(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim();
    if trimmed.len() <= MAX_OUTPUT_EXCERPT {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - MAX_OUTPUT_EXCERPT;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &trimmed[start..])
}
