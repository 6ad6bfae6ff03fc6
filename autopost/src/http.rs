//! Shared HTTP plumbing for the API clients.

use std::time::Duration;

const USER_AGENT: &str = concat!("autopost/", env!("CARGO_PKG_VERSION"));

/// One client for every service, with the configured per-call timeout.
pub fn build_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}

/// First `max` characters of a response body, for log lines.
pub fn snippet(body: &str, max: usize) -> &str {
    match body.char_indices().nth(max) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
