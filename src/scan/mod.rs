//! High-Quality Momentum scan pipeline.
//!
//! The scoring funnel, stage by stage:
//!
//! ```text
//! snapshots ──▶ returns ──▶ percentiles ──▶ composite score
//!                                               │
//!                    quality filter (all horizons >= 25th pct)
//!                                               │
//!                    optional SMA10 entry filter
//!                                               │
//!                    sort (score desc, ticker asc)
//!                                               │
//!                    equal-weight allocation ──▶ ScanResult
//! ```
//!
//! Every stage is a pure function; `ScanEngine` wires them together
//! and records per-stage elimination counts.

pub mod allocate;
pub mod engine;
pub mod percentile;
pub mod report;
pub mod returns;
pub mod score;

pub use allocate::{allocate, AllocatedPosition, Allocation};
pub use engine::{ScanEngine, ScanResult};
pub use percentile::percentile_ranks;
pub use report::ScanReport;
pub use returns::{compute_profile, Horizon, ReturnProfile};
pub use score::{
    composite_score, filter_and_sort, rank_candidates, CandidateInput, FilterResult, FilterStage,
    RankedCandidate, QUALITY_FLOOR,
};

use serde::{Deserialize, Serialize};

use crate::error::ScannerError;

/// Smallest budget a scan will accept.
pub const MIN_PORTFOLIO_SIZE: f64 = 1_000.0;

/// Largest number of positions a scan will allocate.
pub const MAX_POSITIONS: usize = 50;

// ============================================================================
// Scan Parameters
// ============================================================================

/// Caller-supplied scan parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanParams {
    /// Total budget to allocate
    #[serde(default = "default_portfolio_size")]
    pub portfolio_size: f64,
    /// Number of equal-weight positions
    #[serde(default = "default_num_positions")]
    pub num_positions: usize,
    /// SMA10 distance ceiling (%); None disables the entry filter
    #[serde(default)]
    pub max_sma10_distance: Option<f64>,
}

fn default_portfolio_size() -> f64 {
    100_000.0
}

fn default_num_positions() -> usize {
    20
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            portfolio_size: default_portfolio_size(),
            num_positions: default_num_positions(),
            max_sma10_distance: None,
        }
    }
}

impl ScanParams {
    /// Validate static bounds. Runs synchronously before a scan job is
    /// admitted; a rejection here never touches job state.
    pub fn validate(&self) -> Result<(), ScannerError> {
        if !self.portfolio_size.is_finite() || self.portfolio_size < MIN_PORTFOLIO_SIZE {
            return Err(ScannerError::InvalidParameters(format!(
                "portfolio_size must be at least {MIN_PORTFOLIO_SIZE}"
            )));
        }
        if self.num_positions < 1 || self.num_positions > MAX_POSITIONS {
            return Err(ScannerError::InvalidParameters(format!(
                "num_positions must be between 1 and {MAX_POSITIONS}"
            )));
        }
        if let Some(d) = self.max_sma10_distance {
            if !d.is_finite() || d < 0.0 {
                return Err(ScannerError::InvalidParameters(
                    "max_sma10_distance must be non-negative".to_string(),
                ));
            }
        }
        Ok(())
    }
}
