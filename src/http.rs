//! Shared JSON POST with optional retry for the OpenAI-compatible services.
//!
//! Retry strategy when `max_retries > 0`:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors and timeouts → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! With the default `max_retries = 0` every failure is returned on the
//! first attempt.

use std::time::Duration;

use anyhow::Result;

use crate::credential::Credential;
use crate::error::{QaError, Service};

pub fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

pub async fn post_json(
    client: &reqwest::Client,
    url: &str,
    credential: &Credential,
    body: &serde_json::Value,
    max_retries: u32,
    service: Service,
) -> Result<serde_json::Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::debug!(%service, attempt, ?delay, "retrying request");
            tokio::time::sleep(delay).await;
        }

        let resp = client
            .post(url)
            .header("Authorization", credential.bearer())
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await;

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response
                        .json::<serde_json::Value>()
                        .await
                        .map_err(|e| QaError::service(service, format!("invalid JSON: {}", e)).into());
                }

                let body_text = response.text().await.unwrap_or_default();
                let err = QaError::service(service, format!("HTTP {}: {}", status, body_text));

                if status.as_u16() == 429 || status.is_server_error() {
                    tracing::warn!(%service, %status, "transient service error");
                    last_err = Some(err);
                    continue;
                }

                return Err(err.into());
            }
            Err(e) => {
                let message = if e.is_timeout() {
                    format!("request timed out: {}", e)
                } else {
                    e.to_string()
                };
                tracing::warn!(%service, error = %message, "request failed");
                last_err = Some(QaError::service(service, message));
                continue;
            }
        }
    }

    Err(last_err
        .unwrap_or_else(|| QaError::service(service, "request failed after retries"))
        .into())
}
