//! Market data provider abstraction.
//!
//! Defines the `MarketDataProvider` trait the refresh pipeline pulls
//! from, keeping the HTTP vendor behind a seam so tests can substitute
//! a deterministic in-memory source.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::PricePoint;
use crate::error::ScannerError;

// ============================================================================
// Universe Entry
// ============================================================================

/// One ticker from the upstream universe listing, before any price
/// history has been attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniverseEntry {
    /// Ticker symbol (upper-case)
    pub ticker: String,
    /// Listing exchange
    pub exchange: String,
    /// Market capitalization in dollars
    pub market_cap: f64,
    /// Latest quoted price
    pub latest_price: f64,
}

// ============================================================================
// Provider Error
// ============================================================================

/// Errors specific to data providers.
#[derive(Debug, Clone)]
pub enum ProviderError {
    /// Network error (connection failed, timeout)
    Network(String),
    /// Authentication error (invalid token, expired)
    Auth(String),
    /// Rate limit exceeded
    RateLimited { retry_after_secs: Option<u64> },
    /// Data not available for the requested symbols
    DataNotAvailable(String),
    /// Invalid request parameters
    InvalidRequest(String),
    /// Internal provider error
    Internal(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "Network error: {}", msg),
            Self::Auth(msg) => write!(f, "Authentication error: {}", msg),
            Self::RateLimited { retry_after_secs } => {
                write!(f, "Rate limited")?;
                if let Some(secs) = retry_after_secs {
                    write!(f, ", retry after {} seconds", secs)?;
                }
                Ok(())
            }
            Self::DataNotAvailable(msg) => write!(f, "Data not available: {}", msg),
            Self::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            Self::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    /// Check if the error is recoverable (worth retrying).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RateLimited { .. })
    }
}

impl From<ProviderError> for ScannerError {
    fn from(err: ProviderError) -> Self {
        ScannerError::UpstreamFetch(err.to_string())
    }
}

// ============================================================================
// Market Data Provider Trait
// ============================================================================

/// Trait for upstream market data sources.
///
/// A refresh lists the universe per configured exchange, then pulls
/// daily close history for the listed tickers in batches.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Provider name for logging (e.g. "upstream", "mock").
    fn name(&self) -> &'static str;

    /// List tradable tickers on one exchange with a market cap at or
    /// above the floor.
    async fn list_universe(
        &self,
        exchange: &str,
        min_market_cap: f64,
    ) -> Result<Vec<UniverseEntry>, ProviderError>;

    /// Daily closes for a batch of tickers, oldest first, covering at
    /// least `days` calendar days back from today. Tickers the vendor
    /// has no data for are simply absent from the map.
    async fn daily_closes(
        &self,
        tickers: &[String],
        days: u32,
    ) -> Result<HashMap<String, Vec<PricePoint>>, ProviderError>;
}
