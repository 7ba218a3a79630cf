use crate::core::source::{FetchError, FetchResult};
use serde::de::DeserializeOwned;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error};

pub const USER_AGENT: &str = concat!("daybrief/", env!("CARGO_PKG_VERSION"));

/// Retries an async operation with a fixed delay between attempts
///
/// # Parameters
/// - `operation`: Closure returning a future
/// - `attempts`: Total number of runs, at least one
/// - `delay`: Pause between consecutive attempts
///
/// # Returns
/// Either the successful result or the error of the last attempt
pub async fn with_retry<F, Fut, T, E>(mut operation: F, attempts: usize, delay: Duration) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) => {
                if attempt >= attempts {
                    return Err(err);
                }
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt, attempts, err
                );
                attempt += 1;
                tokio::time::sleep(delay).await;
            }
        }
    }
}

pub fn http_client(timeout: Duration) -> FetchResult<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()?)
}

pub fn build_url(base: &str, path: &str, params: &[(&str, String)]) -> FetchResult<reqwest::Url> {
    let raw = format!("{}{}", base.trim_end_matches('/'), path);
    let parsed = if params.is_empty() {
        reqwest::Url::parse(&raw)
    } else {
        reqwest::Url::parse_with_params(&raw, params)
    };
    parsed.map_err(|e| FetchError::InvalidRequest(format!("{raw}: {e}")))
}

/// Checks the status of a finished request and decodes its JSON body.
pub async fn decode_json<T: DeserializeOwned>(response: reqwest::Response) -> FetchResult<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status));
    }

    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| {
        error!(error = ?e, response = %text, "Failed to parse upstream response");
        FetchError::from(e)
    })
}
