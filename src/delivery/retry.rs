//! Bounded retry for delivery attempts.
//!
//! Only one failure is worth retrying: the transport connection being reset
//! mid-upload. Every other error is final. Retries are immediate, with no
//! backoff between attempts.
//!
//! # Example
//!
//! ```
//! use ttrelay_core::delivery::{DeliveryRetryPolicy, FailureType, RetryDecision, classify_message};
//!
//! let policy = DeliveryRetryPolicy::default();
//! let failure = classify_message("write tcp: connection reset by peer");
//! assert_eq!(failure, FailureType::Transient);
//! assert_eq!(policy.should_retry(failure, 1), RetryDecision::Retry { next_attempt: 2 });
//! assert!(matches!(policy.should_retry(failure, 4), RetryDecision::DoNotRetry { .. }));
//! ```

use tracing::{debug, instrument};

/// Default maximum number of delivery attempts, the first one included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

/// The only error text that makes a delivery attempt retryable.
pub const TRANSIENT_SIGNATURE: &str = "connection reset by peer";

/// Classification of a failed delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// The connection was reset; another attempt may succeed.
    Transient,
    /// Anything else; retrying will not help.
    Fatal,
}

/// Classifies a transport error message.
///
/// Matching ignores ASCII case: the OS renders the reset as
/// `Connection reset by peer (os error 104)`.
#[must_use]
pub fn classify_message(message: &str) -> FailureType {
    if message.to_ascii_lowercase().contains(TRANSIENT_SIGNATURE) {
        FailureType::Transient
    } else {
        FailureType::Fatal
    }
}

/// Decision after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Send again right away.
    Retry {
        /// Number of the attempt about to be made (1-indexed).
        next_attempt: u32,
    },
    /// Give up.
    DoNotRetry {
        /// Human-readable reason.
        reason: String,
    },
}

/// How a single attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The attachment was accepted.
    Delivered,
    /// Failed with the transient signature.
    Transient(String),
    /// Failed with any other error.
    Fatal(String),
}

/// One entry of the attempt history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryAttempt {
    /// Attempt number, starting at 1.
    pub number: u32,
    /// What happened.
    pub outcome: AttemptOutcome,
}

/// Attempt cap for delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryRetryPolicy {
    max_attempts: u32,
}

impl Default for DeliveryRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl DeliveryRetryPolicy {
    /// Creates a policy with a custom cap (at least 1).
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Returns the attempt cap.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decides what to do after attempt `attempt` (1-indexed) failed.
    #[instrument(level = "debug", skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::Fatal {
            debug!("Not retrying fatal delivery error");
            return RetryDecision::DoNotRetry {
                reason: "error is not a connection reset".to_string(),
            };
        }

        if attempt >= self.max_attempts {
            debug!(attempt, "Delivery attempts exhausted");
            return RetryDecision::DoNotRetry {
                reason: format!("gave up after {attempt} attempts"),
            };
        }

        RetryDecision::Retry {
            next_attempt: attempt + 1,
        }
    }
}
