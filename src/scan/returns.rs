//! Return and SMA-distance computation from a daily close series.
//!
//! Pure functions over one ticker's price history. All four horizon
//! returns must be computable for the ticker to be scored at all;
//! a short series excludes it from the scan (not a job failure).

use serde::{Deserialize, Serialize};

use crate::data::StockSnapshot;
use crate::error::ScannerError;

/// Number of closes in the simple-moving-average window.
const SMA_WINDOW: usize = 10;

// ============================================================================
// Horizon
// ============================================================================

/// Lookback horizon, in trading-day approximations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Horizon {
    /// 1 month (21 trading days)
    OneMonth,
    /// 3 months (63 trading days)
    ThreeMonths,
    /// 6 months (126 trading days)
    SixMonths,
    /// 1 year (252 trading days)
    OneYear,
}

impl Horizon {
    /// All horizons, shortest first.
    pub const ALL: [Horizon; 4] = [
        Horizon::OneMonth,
        Horizon::ThreeMonths,
        Horizon::SixMonths,
        Horizon::OneYear,
    ];

    /// Lookback window in trading days.
    pub const fn trading_days(&self) -> usize {
        match self {
            Self::OneMonth => 21,
            Self::ThreeMonths => 63,
            Self::SixMonths => 126,
            Self::OneYear => 252,
        }
    }

    /// Short label used in field names and messages.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::OneMonth => "1m",
            Self::ThreeMonths => "3m",
            Self::SixMonths => "6m",
            Self::OneYear => "1y",
        }
    }
}

impl std::fmt::Display for Horizon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ============================================================================
// Return Profile
// ============================================================================

/// Per-ticker simple returns and SMA distance, derived fresh for every
/// scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnProfile {
    /// 1-month simple return (0.05 = +5%)
    pub return_1m: f64,
    /// 3-month simple return
    pub return_3m: f64,
    /// 6-month simple return
    pub return_6m: f64,
    /// 1-year simple return
    pub return_1y: f64,
    /// Percent distance of the latest close from the 10-day SMA,
    /// None when fewer than 10 closes exist
    pub sma10_distance: Option<f64>,
}

impl ReturnProfile {
    /// Return for the given horizon.
    pub fn horizon_return(&self, horizon: Horizon) -> f64 {
        match horizon {
            Horizon::OneMonth => self.return_1m,
            Horizon::ThreeMonths => self.return_3m,
            Horizon::SixMonths => self.return_6m,
            Horizon::OneYear => self.return_1y,
        }
    }
}

// ============================================================================
// Computation
// ============================================================================

/// Compute a full return profile from a snapshot's price history.
///
/// Fails with `InsufficientHistory` if any horizon cannot be computed;
/// partial profiles are never produced. The SMA distance is optional
/// and does not affect eligibility.
pub fn compute_profile(snapshot: &StockSnapshot) -> Result<ReturnProfile, ScannerError> {
    let closes: Vec<f64> = snapshot.price_history.iter().map(|p| p.close).collect();

    Ok(ReturnProfile {
        return_1m: horizon_return(&closes, Horizon::OneMonth, &snapshot.ticker)?,
        return_3m: horizon_return(&closes, Horizon::ThreeMonths, &snapshot.ticker)?,
        return_6m: horizon_return(&closes, Horizon::SixMonths, &snapshot.ticker)?,
        return_1y: horizon_return(&closes, Horizon::OneYear, &snapshot.ticker)?,
        sma10_distance: sma10_distance(&closes),
    })
}

/// Simple return over one horizon: `latest / close N trading days ago - 1`.
fn horizon_return(closes: &[f64], horizon: Horizon, ticker: &str) -> Result<f64, ScannerError> {
    let lookback = horizon.trading_days();
    let needed = lookback + 1;
    if closes.len() < needed {
        return Err(ScannerError::InsufficientHistory {
            ticker: ticker.to_string(),
            horizon: horizon.label(),
            needed,
            have: closes.len(),
        });
    }

    let now = closes[closes.len() - 1];
    let then = closes[closes.len() - 1 - lookback];

    // Non-positive closes make the series unusable for this horizon.
    if now <= 0.0 || then <= 0.0 {
        return Err(ScannerError::InsufficientHistory {
            ticker: ticker.to_string(),
            horizon: horizon.label(),
            needed,
            have: closes.len(),
        });
    }

    Ok(now / then - 1.0)
}

/// Percent distance of the latest close from the 10-day SMA.
fn sma10_distance(closes: &[f64]) -> Option<f64> {
    if closes.len() < SMA_WINDOW {
        return None;
    }

    let window = &closes[closes.len() - SMA_WINDOW..];
    let sma = window.iter().sum::<f64>() / SMA_WINDOW as f64;
    if sma <= 0.0 {
        return None;
    }

    let now = closes[closes.len() - 1];
    Some((now / sma - 1.0) * 100.0)
}
