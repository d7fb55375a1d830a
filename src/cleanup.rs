//! Deferred deletion of scratch files.
//!
//! [`CleanupScheduler::schedule`] spawns a detached task that sleeps for the
//! given delay and removes the file. Failures are logged, never retried and
//! never reported to the caller. In debug mode nothing is scheduled, so
//! scratch files stay around for inspection.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Default grace period before a scratch file is deleted (5 minutes).
pub const DEFAULT_CLEANUP_GRACE: Duration = Duration::from_secs(300);

/// Identifier of a scheduled deletion, unique per scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CleanupTaskId(u64);

impl fmt::Display for CleanupTaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cleanup-{}", self.0)
    }
}

struct Shared {
    next_id: AtomicU64,
    pending: DashMap<CleanupTaskId, PathBuf>,
    idle: Notify,
}

/// Schedules detached, delayed file deletions.
///
/// Cloning is cheap; clones share the pending registry.
#[derive(Clone)]
pub struct CleanupScheduler {
    enabled: bool,
    grace: Duration,
    shared: Arc<Shared>,
}

impl CleanupScheduler {
    /// Creates a scheduler that deletes files `grace` after [`schedule_default`](Self::schedule_default).
    #[must_use]
    pub fn new(grace: Duration) -> Self {
        Self::build(true, grace)
    }

    /// Creates a scheduler that never deletes anything (debug mode).
    #[must_use]
    pub fn disabled() -> Self {
        Self::build(false, DEFAULT_CLEANUP_GRACE)
    }

    /// Creates a scheduler honouring the debug flag.
    #[must_use]
    pub fn for_mode(debug_mode: bool, grace: Duration) -> Self {
        Self::build(!debug_mode, grace)
    }

    fn build(enabled: bool, grace: Duration) -> Self {
        Self {
            enabled,
            grace,
            shared: Arc::new(Shared {
                next_id: AtomicU64::new(1),
                pending: DashMap::new(),
                idle: Notify::new(),
            }),
        }
    }

    /// Whether deletions are actually scheduled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The configured grace period.
    #[must_use]
    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Schedules deletion of `path` after the configured grace period.
    pub fn schedule_default(&self, path: impl Into<PathBuf>) -> Option<CleanupTaskId> {
        self.schedule(path, self.grace)
    }

    /// Schedules deletion of `path` after `delay` and returns immediately.
    ///
    /// Returns `None` in debug mode. Must be called from within a Tokio runtime.
    pub fn schedule(&self, path: impl Into<PathBuf>, delay: Duration) -> Option<CleanupTaskId> {
        let path = path.into();
        if !self.enabled {
            debug!(path = %path.display(), "Debug mode, keeping scratch file");
            return None;
        }

        let id = CleanupTaskId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        self.shared.pending.insert(id, path.clone());
        debug!(%id, path = %path.display(), delay_secs = delay.as_secs_f64(), "Scheduled scratch file deletion");

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            remove_scratch_file(&path).await;
            shared.pending.remove(&id);
            shared.idle.notify_waiters();
        });

        Some(id)
    }

    /// Returns the deletions that have not finished yet.
    #[must_use]
    pub fn pending(&self) -> Vec<(CleanupTaskId, PathBuf)> {
        let mut pending: Vec<_> = self
            .shared
            .pending
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        pending.sort_by_key(|(id, _)| *id);
        pending
    }

    /// Number of deletions that have not finished yet.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.shared.pending.len()
    }

    /// Whether the deletion `id` is still waiting or running.
    #[must_use]
    pub fn is_pending(&self, id: CleanupTaskId) -> bool {
        self.shared.pending.contains_key(&id)
    }

    /// Whether some pending deletion targets `path`.
    #[must_use]
    pub fn is_path_pending(&self, path: &Path) -> bool {
        self.shared.pending.iter().any(|entry| entry.value() == path)
    }

    /// Waits until every scheduled deletion has run.
    ///
    /// Used by short-lived processes so the runtime is not torn down with
    /// deletions still sleeping.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            if self.shared.pending.is_empty() {
                return;
            }
            notified.await;
        }
    }
}

async fn remove_scratch_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Deleted scratch file"),
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to delete scratch file"),
    }
}

impl fmt::Debug for CleanupScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleanupScheduler")
            .field("enabled", &self.enabled)
            .field("grace", &self.grace)
            .field("pending", &self.shared.pending.len())
            .finish()
    }
}

impl Default for CleanupScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_CLEANUP_GRACE)
    }
}
