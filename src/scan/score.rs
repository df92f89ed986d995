//! Composite HQM scoring and the quality/SMA filters.
//!
//! Implements the scoring funnel:
//! 1. Percentile-rank each horizon's returns across the eligible universe
//! 2. Composite score: rounded mean of the four percentiles
//! 3. Quality filter: every horizon must reach the 25th percentile
//! 4. Optional SMA10 entry filter on distance from the 10-day average
//! 5. Deterministic ordering: score descending, ticker ascending on ties

use serde::{Deserialize, Serialize};

use super::percentile::percentile_ranks;
use super::returns::{Horizon, ReturnProfile};

/// Minimum per-horizon percentile a candidate must reach, inclusive.
///
/// This is the rule that separates consistent momentum from a
/// single-period spike: one weak horizon disqualifies the ticker no
/// matter how strong the others are.
pub const QUALITY_FLOOR: f64 = 25.0;

// ============================================================================
// Filter Stage
// ============================================================================

/// Filter stage identifier for tracking where tickers are eliminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStage {
    /// History eligibility (all four horizons computable)
    History,
    /// Quality filter (min percentile >= 25 across horizons)
    Quality,
    /// SMA10 distance filter (entry timing)
    Sma10,
}

impl std::fmt::Display for FilterStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::History => write!(f, "history"),
            Self::Quality => write!(f, "quality"),
            Self::Sma10 => write!(f, "sma10"),
        }
    }
}

/// Result of a filtering stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterResult {
    /// Stage name
    pub stage: FilterStage,
    /// Number of tickers entering this stage
    pub input: usize,
    /// Number of tickers that passed this stage
    pub passed: usize,
    /// Number of tickers eliminated at this stage
    pub eliminated: usize,
    /// Elimination rate (%)
    pub elimination_rate: f64,
}

impl FilterResult {
    pub fn new(stage: FilterStage, input: usize, passed: usize) -> Self {
        let eliminated = input.saturating_sub(passed);
        let elimination_rate = if input > 0 {
            (eliminated as f64 / input as f64) * 100.0
        } else {
            0.0
        };

        Self {
            stage,
            input,
            passed,
            eliminated,
            elimination_rate,
        }
    }
}

// ============================================================================
// Ranked Candidate
// ============================================================================

/// One ticker entering the ranking stage: metadata plus its computed
/// return profile.
#[derive(Debug, Clone)]
pub struct CandidateInput {
    pub ticker: String,
    pub exchange: String,
    pub price: f64,
    pub profile: ReturnProfile,
}

/// A ticker with cross-sectional percentiles and composite score
/// assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    /// Ticker symbol
    pub ticker: String,
    /// Listing exchange
    pub exchange: String,
    /// Latest quoted price
    pub price: f64,
    /// Raw returns and SMA distance
    pub returns: ReturnProfile,
    /// Percentile rank of the 1-month return
    pub percentile_1m: f64,
    /// Percentile rank of the 3-month return
    pub percentile_3m: f64,
    /// Percentile rank of the 6-month return
    pub percentile_6m: f64,
    /// Percentile rank of the 1-year return
    pub percentile_1y: f64,
    /// Composite momentum score (rounded mean of the four percentiles)
    pub hqm_score: f64,
}

impl RankedCandidate {
    /// Weakest horizon percentile.
    pub fn min_percentile(&self) -> f64 {
        self.percentile_1m
            .min(self.percentile_3m)
            .min(self.percentile_6m)
            .min(self.percentile_1y)
    }

    /// Quality rule: no horizon below the floor.
    pub fn passes_quality(&self) -> bool {
        self.min_percentile() >= QUALITY_FLOOR
    }

    /// SMA10 entry rule: a known distance at or under the threshold.
    /// An unknown distance fails when the filter is enabled.
    pub fn passes_sma10(&self, max_distance: f64) -> bool {
        matches!(self.returns.sma10_distance, Some(d) if d <= max_distance)
    }
}

// ============================================================================
// Scoring
// ============================================================================

/// Composite score: mean of the four percentiles, rounded half away
/// from zero. (25, 50, 75, 100) scores exactly 63.
pub fn composite_score(percentiles: [f64; 4]) -> f64 {
    (percentiles.iter().sum::<f64>() / 4.0).round()
}

/// Assign per-horizon percentiles and composite scores across the
/// eligible universe.
///
/// Each horizon is ranked independently over the same universe so the
/// four percentiles are comparable.
pub fn rank_candidates(inputs: Vec<CandidateInput>) -> Vec<RankedCandidate> {
    let per_horizon: Vec<Vec<f64>> = Horizon::ALL
        .iter()
        .map(|h| {
            let returns: Vec<f64> = inputs
                .iter()
                .map(|c| c.profile.horizon_return(*h))
                .collect();
            percentile_ranks(&returns)
        })
        .collect();

    inputs
        .into_iter()
        .enumerate()
        .map(|(i, c)| {
            let percentiles = [
                per_horizon[0][i],
                per_horizon[1][i],
                per_horizon[2][i],
                per_horizon[3][i],
            ];
            RankedCandidate {
                ticker: c.ticker,
                exchange: c.exchange,
                price: c.price,
                returns: c.profile,
                percentile_1m: percentiles[0],
                percentile_3m: percentiles[1],
                percentile_6m: percentiles[2],
                percentile_1y: percentiles[3],
                hqm_score: composite_score(percentiles),
            }
        })
        .collect()
}

/// Apply the quality filter, the optional SMA10 filter, and the
/// deterministic output ordering. Returns the survivors plus per-stage
/// elimination counts.
pub fn filter_and_sort(
    candidates: Vec<RankedCandidate>,
    max_sma10_distance: Option<f64>,
) -> (Vec<RankedCandidate>, Vec<FilterResult>) {
    let input = candidates.len();

    let quality: Vec<RankedCandidate> = candidates
        .into_iter()
        .filter(RankedCandidate::passes_quality)
        .collect();
    let mut stages = vec![FilterResult::new(FilterStage::Quality, input, quality.len())];

    let mut survivors = match max_sma10_distance {
        Some(max) => {
            let before = quality.len();
            let kept: Vec<RankedCandidate> = quality
                .into_iter()
                .filter(|c| c.passes_sma10(max))
                .collect();
            stages.push(FilterResult::new(FilterStage::Sma10, before, kept.len()));
            kept
        }
        None => quality,
    };

    survivors.sort_by(|a, b| {
        b.hqm_score
            .partial_cmp(&a.hqm_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.ticker.cmp(&b.ticker))
    });

    (survivors, stages)
}
