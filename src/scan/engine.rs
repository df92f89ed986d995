//! Scan engine.
//!
//! Orchestrates one full scan over the cached universe: return
//! profiles, cross-sectional percentiles, composite scores, filters,
//! and the final share allocation. Pure computation over the
//! snapshots it is given; loading the cache and job bookkeeping
//! happen a layer up.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::allocate::{allocate, AllocatedPosition};
use super::returns::compute_profile;
use super::score::{filter_and_sort, rank_candidates, CandidateInput, FilterResult, FilterStage};
use super::ScanParams;
use crate::data::StockSnapshot;
use crate::error::ScannerError;

// ============================================================================
// Scan Result
// ============================================================================

/// Result of a completed scan. Immutable; a later scan supersedes it
/// rather than mutating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    /// When the scan finished
    pub generated_at: DateTime<Utc>,
    /// Tickers in the cached universe, including excluded ones
    pub total_scanned: usize,
    /// Tickers surviving the quality filter
    pub after_quality_filter: usize,
    /// Tickers surviving the SMA10 filter, None when it was disabled
    pub after_sma_filter: Option<usize>,
    /// Allocated positions, hqm_score descending (ticker ascending on ties)
    pub positions: Vec<AllocatedPosition>,
    /// Sum of all position values
    pub total_invested: f64,
    /// Budget left uninvested
    pub cash_remaining: f64,
    /// Budget the scan was asked to allocate
    pub portfolio_size: f64,
    /// Number of positions requested
    pub num_positions: usize,
    /// Per-stage elimination counts (history, quality, sma10)
    pub filter_stages: Vec<FilterResult>,
    /// Wall-clock duration of the scan
    pub duration_secs: f64,
}

impl ScanResult {
    /// Summary string for logging.
    pub fn summary(&self) -> String {
        format!(
            "Scanned {} tickers in {:.2}s: {} passed quality, {} positions, {:.0} invested, {:.0} cash",
            self.total_scanned,
            self.duration_secs,
            self.after_quality_filter,
            self.positions.len(),
            self.total_invested,
            self.cash_remaining
        )
    }
}

// ============================================================================
// Scan Engine
// ============================================================================

/// Runs the scoring funnel for one set of parameters.
pub struct ScanEngine {
    params: ScanParams,
}

impl ScanEngine {
    pub fn new(params: ScanParams) -> Self {
        Self { params }
    }

    /// Run a full scan over the given universe.
    ///
    /// Tickers with incomplete history are excluded from scoring but
    /// still counted in `total_scanned`. Fails with
    /// `InvalidParameters` when fewer tickers qualify than positions
    /// requested.
    pub fn run(&self, snapshots: &[StockSnapshot]) -> Result<ScanResult, ScannerError> {
        let started_at = Utc::now();
        let total_scanned = snapshots.len();

        info!(
            universe = total_scanned,
            portfolio_size = self.params.portfolio_size,
            num_positions = self.params.num_positions,
            sma_filter = self.params.max_sma10_distance.is_some(),
            "Starting momentum scan"
        );

        // Phase 1: return profiles; incomplete history excludes the ticker.
        let mut inputs = Vec::with_capacity(total_scanned);
        for snapshot in snapshots {
            match compute_profile(snapshot) {
                Ok(profile) => inputs.push(CandidateInput {
                    ticker: snapshot.ticker.clone(),
                    exchange: snapshot.exchange.clone(),
                    price: snapshot.latest_price,
                    profile,
                }),
                Err(err) if err.is_exclusion() => {
                    debug!(ticker = %snapshot.ticker, %err, "Excluded from scoring");
                }
                Err(err) => return Err(err),
            }
        }

        let mut stages = vec![FilterResult::new(
            FilterStage::History,
            total_scanned,
            inputs.len(),
        )];
        info!(
            eligible = inputs.len(),
            excluded = total_scanned - inputs.len(),
            "Phase 1 (history eligibility) complete"
        );

        // Phase 2: cross-sectional ranking and composite scores.
        let candidates = rank_candidates(inputs);

        // Phase 3: quality + optional SMA filter, deterministic ordering.
        let (survivors, filter_stages) =
            filter_and_sort(candidates, self.params.max_sma10_distance);

        let after_quality_filter = filter_stages
            .iter()
            .find(|s| s.stage == FilterStage::Quality)
            .map(|s| s.passed)
            .unwrap_or(0);
        let after_sma_filter = filter_stages
            .iter()
            .find(|s| s.stage == FilterStage::Sma10)
            .map(|s| s.passed);
        stages.extend(filter_stages);

        info!(
            after_quality = after_quality_filter,
            after_sma = ?after_sma_filter,
            "Phase 2 (filters) complete"
        );

        // Phase 4: equal-weight allocation over the top candidates.
        let allocation = allocate(
            &survivors,
            self.params.portfolio_size,
            self.params.num_positions,
        )?;

        let completed_at = Utc::now();
        let result = ScanResult {
            generated_at: completed_at,
            total_scanned,
            after_quality_filter,
            after_sma_filter,
            positions: allocation.positions,
            total_invested: allocation.total_invested,
            cash_remaining: allocation.cash_remaining,
            portfolio_size: self.params.portfolio_size,
            num_positions: self.params.num_positions,
            filter_stages: stages,
            duration_secs: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
        };

        info!("{}", result.summary());
        Ok(result)
    }
}
