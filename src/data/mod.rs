//! Market data module for the momentum scanner.
//!
//! Provides the upstream provider seam, the local SQLite snapshot
//! cache, and the shared data types that flow between them.
//!
//! # Data Flow
//! - **provider**: trait over the upstream market-data API (universe
//!   listing + daily close history)
//! - **upstream**: reqwest-based HTTP implementation of the trait
//! - **store**: rusqlite cache holding the last refreshed universe,
//!   refresh metadata, and scan history

mod provider;
mod upstream;
pub mod store;

pub use provider::{MarketDataProvider, ProviderError, UniverseEntry};
pub use store::{ScanRecord, ScoreHistoryPoint, SnapshotStore, StoreConfig};
pub use upstream::{UpstreamClient, UpstreamConfig};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Core Data Types
// ============================================================================

/// A single daily close observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Trading date
    pub date: NaiveDate,
    /// Closing price
    pub close: f64,
}

/// One ticker's cached state from the most recent refresh.
///
/// Immutable once fetched for a given refresh cycle; the scan pipeline
/// reads it, never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockSnapshot {
    /// Ticker symbol (upper-case)
    pub ticker: String,
    /// Listing exchange (e.g. "NYSE", "NASDAQ")
    pub exchange: String,
    /// Market capitalization in dollars
    pub market_cap: f64,
    /// Latest quoted price, used for share allocation
    pub latest_price: f64,
    /// Daily closes, oldest first
    pub price_history: Vec<PricePoint>,
}

impl StockSnapshot {
    /// Most recent close in the history, if any.
    pub fn last_close(&self) -> Option<f64> {
        self.price_history.last().map(|p| p.close)
    }

    /// Number of daily closes on record.
    pub fn history_len(&self) -> usize {
        self.price_history.len()
    }
}

/// Freshness summary of the local cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataStatus {
    /// Whether at least one snapshot is cached
    pub has_data: bool,
    /// Number of cached tickers
    pub stock_count: usize,
    /// Hours since the last successful refresh, None if never refreshed
    pub data_age_hours: Option<f64>,
    /// Timestamp of the last successful refresh
    pub last_refresh: Option<DateTime<Utc>>,
}
