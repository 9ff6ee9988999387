//! Shared HTTP client construction for consistent timeout configuration.

use std::time::Duration;

/// Create the HTTP client used for every inference request.
///
/// Config: 10s connect timeout, `request_timeout` for the whole request,
/// `gitask/{version}` user-agent.
///
/// # Panics
///
/// Panics if the client cannot be built, which only happens when the TLS
/// backend fails to initialise.
#[must_use]
pub fn default_client(request_timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(request_timeout)
        .user_agent(concat!("gitask/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("default HTTP client construction must not fail")
}
