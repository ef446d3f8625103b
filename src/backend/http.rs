//! Shared HTTP plumbing for the backends.

use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::AgentError;

/// User agent sent to every backend.
const USER_AGENT: &str = concat!("ngni-agent/", env!("CARGO_PKG_VERSION"));

/// Builds the HTTP client shared by all backends.
pub fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Sends a request and decodes a JSON body, mapping transport failures,
/// non-2xx statuses and decode errors to [`AgentError::Backend`].
///
/// Google APIs put the reason in `error.message`; that text is surfaced
/// instead of the raw body when present.
pub async fn send_json<T: DeserializeOwned>(
    backend: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<T, AgentError> {
    let response = request.send().await.map_err(|e| {
        warn!(backend, error = %e, "backend request failed");
        AgentError::backend(backend, format!("request failed: {e}"))
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = google_error_message(&body).unwrap_or(body);
        warn!(backend, %status, "backend returned error status");
        return Err(AgentError::backend(
            backend,
            format!("HTTP {}: {message}", status.as_u16()),
        ));
    }

    response.json::<T>().await.map_err(|e| {
        warn!(backend, error = %e, "failed to decode backend response");
        AgentError::backend(backend, format!("invalid response body: {e}"))
    })
}

fn google_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value["error"]["message"].as_str().map(str::to_string)
}
