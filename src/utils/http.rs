// src/utils/http.rs
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;
use std::time::Duration;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Shared client for all sources. Some of the government sites reject
/// requests without a browser user agent.
pub fn build_client(timeout: Duration, verify_tls: bool) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));

    Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .danger_accept_invalid_certs(!verify_tls)
        .build()
        .context("Failed to build HTTP client")
}

/// GET `url` and return the body as text, failing on non-success status.
pub async fn fetch_text(client: &Client, url: &str) -> Result<String> {
    client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Request to {} failed", url))?
        .error_for_status()
        .with_context(|| format!("{} returned an error status", url))?
        .text()
        .await
        .with_context(|| format!("Failed to read body from {}", url))
}
