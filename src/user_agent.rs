//! Shared User-Agent string for provider and delivery HTTP clients.

/// Product token sent with every outbound request.
const PRODUCT: &str = "ttrelay";

/// Default User-Agent for outbound HTTP requests (identifies the tool).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("{PRODUCT}/{version}")
}
