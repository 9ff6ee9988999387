use std::future::Future;
use std::time::Duration;

use crate::error::GenerationError;

const BASE_BACKOFF_MILLIS: u64 = 500;

pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(BASE_BACKOFF_MILLIS.saturating_mul(1u64 << attempt.min(16)))
}

/// Whether a transport failure is worth another attempt.
///
/// Only connection and timeout failures qualify. A response with any HTTP
/// status never reaches this point as an error.
pub(crate) fn is_transient(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}

/// Send an HTTP request, retrying up to `max_retries` times on transient
/// transport failures.
///
/// Returns the response whatever its status; status handling is the caller's.
///
/// # Errors
///
/// Returns the last `reqwest::Error` wrapped as `GenerationError::Http`.
pub(crate) async fn send_with_retry<F, Fut>(
    endpoint: &str,
    max_retries: u32,
    mut f: F,
) -> Result<reqwest::Response, GenerationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(response) => return Ok(response),
            Err(e) if attempt < max_retries && is_transient(&e) => {
                let delay = backoff_delay(attempt);
                tracing::warn!(
                    endpoint,
                    attempt = attempt + 1,
                    max_retries,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "transient failure talking to inference server: {e}"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(GenerationError::Http(e)),
        }
    }
}
