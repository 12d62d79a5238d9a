//! Shared blocking HTTP plumbing for the source adapters.

use super::provider::FetchError;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use std::time::Duration;

pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

pub fn build_client(timeout: Duration) -> Result<Client, FetchError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| FetchError::Network(format!("failed to build HTTP client: {e}")))
}

/// GET `url` and return the body, mapping HTTP status codes onto fetch errors.
pub fn get_text(client: &Client, url: &str, ticker: &str) -> Result<String, FetchError> {
    let resp = client.get(url).send().map_err(classify)?;
    let status = resp.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = resp
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        return Err(FetchError::RateLimited {
            retry_after_secs: retry_after,
        });
    }
    if status == StatusCode::NOT_FOUND {
        return Err(FetchError::not_found(ticker));
    }
    if !status.is_success() {
        return Err(FetchError::Network(format!("HTTP {status} for {ticker}")));
    }

    resp.text()
        .map_err(|e| FetchError::Network(format!("failed to read body for {ticker}: {e}")))
}

fn classify(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Network(format!("timed out: {e}"))
    } else if e.is_connect() {
        FetchError::Network(format!("connection failed: {e}"))
    } else {
        FetchError::Network(e.to_string())
    }
}
