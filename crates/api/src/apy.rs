//! Rodeo API client for strategy APY and TVL figures.

use anyhow::{bail, Result};
use serde::Deserialize;
use tracing::{debug, instrument};

/// APY/TVL pair as served by `/api/apy/{source}`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ApyQuote {
    pub apy: f64,
    pub tvl: f64,
}

#[derive(Debug, Clone)]
pub struct ApyClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApyClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn quote_url(&self, source: &str, id: &str) -> String {
        format!("{}/api/apy/{}?id={}", self.base_url, source, id)
    }

    /// Fetch the current quote for a strategy.
    ///
    /// `source` names the upstream (`defillama`, `plutus`, ...), `id` the pool
    /// within it. Non-2xx responses are errors carrying the response body.
    #[instrument(skip(self))]
    pub async fn fetch(&self, source: &str, id: &str) -> Result<ApyQuote> {
        let response = self
            .client
            .get(self.quote_url(source, id))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("apy api returned {status}: {body}");
        }

        let quote: ApyQuote = response.json().await?;
        debug!(apy = quote.apy, tvl = quote.tvl, "Fetched apy");
        Ok(quote)
    }
}
