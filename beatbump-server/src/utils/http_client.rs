//! Shared HTTP client construction.

use std::time::Duration;

/// Build the process-wide `reqwest::Client` used for companion calls, range
/// fetches, and metadata-enrichment lookups.
///
/// A single client is shared so connection pooling is effective across the
/// scheduler's dispatched song workers.
pub fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(16)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_else(|error| {
            tracing::warn!(error = %error, "failed to build configured HTTP client; falling back to defaults");
            reqwest::Client::new()
        })
}
