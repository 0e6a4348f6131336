//! Shared HTTP client construction.

use std::time::Duration;

use anyhow::Context;

/// Default timeout for short requests such as gateway reads.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for uploads, which carry the whole staged directory.
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// Create an HTTP client with the given request timeout.
pub fn create_client(timeout: Duration) -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("dshop-publish/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to create HTTP client")
}
