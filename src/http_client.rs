//! Shared HTTP client construction for providers and the delivery transport.

use std::error::Error as StdError;
use std::time::Duration;

use reqwest::Client;

use crate::user_agent;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes, uploads and downloads of whole videos).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Builds an HTTP client with the project User-Agent and the given timeouts.
///
/// # Errors
///
/// Returns the reqwest error if the client cannot be constructed (e.g. TLS
/// backend initialisation failure).
pub fn build_http_client(
    connect_timeout_secs: u64,
    read_timeout_secs: u64,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .timeout(Duration::from_secs(read_timeout_secs))
        .gzip(true)
        .user_agent(user_agent::default_user_agent())
        .build()
}

/// Renders an error together with its whole source chain.
///
/// reqwest's top-level message ("error sending request") hides the OS-level
/// cause such as `connection reset by peer`; retry classification needs it.
#[must_use]
pub fn error_chain_message(error: &dyn StdError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

/// Whether any error in the chain is an IO error of kind `ConnectionReset`.
#[must_use]
pub fn is_connection_reset(error: &(dyn StdError + 'static)) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(error);
    while let Some(err) = current {
        if let Some(io) = err.downcast_ref::<std::io::Error>()
            && io.kind() == std::io::ErrorKind::ConnectionReset
        {
            return true;
        }
        current = err.source();
    }
    false
}
