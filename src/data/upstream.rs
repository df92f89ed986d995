//! HTTP client for the upstream market-data API.
//!
//! # Endpoints
//! - `GET /v1/universe?exchange=&min_market_cap=` - tradable tickers
//!   with metadata for one exchange
//! - `GET /v1/bars?symbols=&days=&page_token=` - daily closes keyed by
//!   symbol, paginated via `next_page_token`
//!
//! Requests carry a bearer token. History is pulled in symbol batches
//! with a bounded number of batches in flight.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::provider::{MarketDataProvider, ProviderError, UniverseEntry};
use super::PricePoint;

/// Batches of symbols in flight at once.
const MAX_CONCURRENT_BATCHES: usize = 4;

// ============================================================================
// Config
// ============================================================================

/// Connection settings for the upstream API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer token
    #[serde(default)]
    pub token: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Symbols per bars request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_base_url() -> String {
    "http://127.0.0.1:9100".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_batch_size() -> usize {
    100
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: String::new(),
            timeout_secs: default_timeout_secs(),
            batch_size: default_batch_size(),
        }
    }
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct UniverseResponse {
    tickers: Vec<UniverseEntry>,
}

#[derive(Debug, Deserialize)]
struct BarsResponse {
    bars: HashMap<String, Vec<BarRow>>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BarRow {
    date: NaiveDate,
    close: f64,
}

// ============================================================================
// Client
// ============================================================================

/// Upstream API adapter.
pub struct UpstreamClient {
    config: UpstreamConfig,
    client: reqwest::Client,
}

impl UpstreamClient {
    /// Build the client. Fails rather than falling back to a client
    /// without the configured request timeout; every upstream call
    /// must stay bounded.
    pub fn new(config: UpstreamConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.token)
            .query(query)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        match response.status() {
            s if s.is_success() => response
                .json::<T>()
                .await
                .map_err(|e| ProviderError::Internal(format!("Failed to parse response: {e}"))),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(ProviderError::Auth(format!("HTTP {}", response.status())))
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after_secs = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok());
                Err(ProviderError::RateLimited { retry_after_secs })
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(ProviderError::Internal(format!("HTTP {status}: {body}")))
            }
        }
    }

    /// One paginated bars request for a batch of symbols.
    async fn fetch_batch(
        &self,
        symbols: &[String],
        days: u32,
    ) -> Result<HashMap<String, Vec<PricePoint>>, ProviderError> {
        let symbol_list = symbols.join(",");
        let mut merged: HashMap<String, Vec<PricePoint>> = HashMap::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("symbols", symbol_list.clone()),
                ("days", days.to_string()),
            ];
            if let Some(token) = &page_token {
                query.push(("page_token", token.clone()));
            }

            let response: BarsResponse = self.get_json("/v1/bars", &query).await?;
            for (ticker, rows) in response.bars {
                let series = merged.entry(ticker.to_uppercase()).or_default();
                series.extend(rows.into_iter().map(|r| PricePoint {
                    date: r.date,
                    close: r.close,
                }));
            }

            match response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        // Oldest first regardless of vendor ordering.
        for series in merged.values_mut() {
            series.sort_by_key(|p| p.date);
        }

        Ok(merged)
    }
}

#[async_trait]
impl MarketDataProvider for UpstreamClient {
    fn name(&self) -> &'static str {
        "upstream"
    }

    async fn list_universe(
        &self,
        exchange: &str,
        min_market_cap: f64,
    ) -> Result<Vec<UniverseEntry>, ProviderError> {
        let query = [
            ("exchange", exchange.to_string()),
            ("min_market_cap", format!("{min_market_cap:.0}")),
        ];
        let response: UniverseResponse = self.get_json("/v1/universe", &query).await?;

        let mut entries = response.tickers;
        for entry in &mut entries {
            entry.ticker = entry.ticker.to_uppercase();
        }
        debug!(
            exchange,
            count = entries.len(),
            "Universe listing fetched"
        );
        Ok(entries)
    }

    async fn daily_closes(
        &self,
        tickers: &[String],
        days: u32,
    ) -> Result<HashMap<String, Vec<PricePoint>>, ProviderError> {
        if tickers.is_empty() {
            return Ok(HashMap::new());
        }

        let batch_futures: Vec<_> = tickers
            .chunks(self.config.batch_size.max(1))
            .map(|batch| self.fetch_batch(batch, days))
            .collect();
        let mut in_flight =
            stream::iter(batch_futures).buffer_unordered(MAX_CONCURRENT_BATCHES);

        let mut merged = HashMap::new();
        while let Some(batch) = in_flight.next().await {
            merged.extend(batch?);
        }

        debug!(
            requested = tickers.len(),
            returned = merged.len(),
            "Daily close history fetched"
        );
        Ok(merged)
    }
}
