//! Quote API Client
//!
//! Fetches the current quote for one identifier via `POST {base}/quote` with
//! body `{"isin": "<identifier>"}`, authenticated by an `x-api-key` header.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info};

use super::QuoteSource;
use crate::error::PipelineError;
use crate::models::RawQuote;

/// Default request budget
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(25);

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Serialize)]
struct QuoteRequest<'a> {
    isin: &'a str,
}

/// HTTP client for the quote API
pub struct QuoteApiClient {
    client: Client,
    base_url: String,
    api_key: String,
    symbol: String,
    timeout: Duration,
}

impl QuoteApiClient {
    /// Create a client for `symbol`.
    ///
    /// Empty URL, key or identifier is a configuration fault.
    pub fn new(
        base_url: &str,
        api_key: &str,
        symbol: &str,
        timeout: Duration,
    ) -> Result<Self, PipelineError> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(PipelineError::Configuration("quote API URL is empty".into()));
        }
        if api_key.trim().is_empty() {
            return Err(PipelineError::Configuration("quote API key is empty".into()));
        }
        if symbol.trim().is_empty() {
            return Err(PipelineError::Configuration("tracked identifier is empty".into()));
        }

        let mut key_value = HeaderValue::from_str(api_key.trim()).map_err(|_| {
            PipelineError::Configuration("quote API key is not a valid header value".into())
        })?;
        key_value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, key_value);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .user_agent("quotestream/1.0")
            .build()
            .map_err(|e| {
                PipelineError::Configuration(format!("failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            api_key: api_key.trim().to_string(),
            symbol: symbol.trim().to_string(),
            timeout,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/quote", self.base_url)
    }

    fn classify(&self, err: reqwest::Error) -> PipelineError {
        if err.is_timeout() {
            PipelineError::UpstreamTimeout(self.timeout)
        } else {
            PipelineError::UpstreamTransport(err.to_string())
        }
    }
}

impl std::fmt::Debug for QuoteApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuoteApiClient")
            .field("base_url", &self.base_url)
            .field(
                "api_key",
                &format!("{}***", self.api_key.chars().take(4).collect::<String>()),
            )
            .field("symbol", &self.symbol)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[async_trait]
impl QuoteSource for QuoteApiClient {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    async fn fetch_quote(&self) -> Result<RawQuote, PipelineError> {
        let url = self.endpoint();
        info!(url = %url, symbol = %self.symbol, "Fetching quote");

        let response = self
            .client
            .post(&url)
            .json(&QuoteRequest { isin: &self.symbol })
            .send()
            .await
            .map_err(|e| {
                let err = self.classify(e);
                error!("Request to quote API failed: {}", err);
                err
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, "Quote API returned error status");
            return Err(PipelineError::UpstreamTransport(format!(
                "HTTP {} - {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let body = response.text().await.map_err(|e| self.classify(e))?;
        let value: serde_json::Value = serde_json::from_str(&body).map_err(|e| {
            error!("Failed to parse quote API response: {}", e);
            PipelineError::UpstreamDecode(e.to_string())
        })?;

        let quote = RawQuote::from_value(value).ok_or_else(|| {
            PipelineError::UpstreamDecode("expected a JSON object".to_string())
        })?;

        debug!(fields = quote.len(), "Fetched quote");
        Ok(quote)
    }
}
