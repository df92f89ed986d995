//! Equal-weight share allocation under a cash budget.
//!
//! Splits the portfolio budget evenly across the requested number of
//! positions and rounds down to whole shares. A candidate whose price
//! exceeds the per-position budget stays in the output with zero
//! shares; the shortfall shows up in `total_invested` and
//! `cash_remaining` rather than being hidden.

use serde::{Deserialize, Serialize};

use super::score::RankedCandidate;
use crate::error::ScannerError;

// ============================================================================
// Allocated Position
// ============================================================================

/// A ranked candidate with its share allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocatedPosition {
    /// Ranking fields (ticker, percentiles, score, ...)
    #[serde(flatten)]
    pub candidate: RankedCandidate,
    /// Whole shares to buy (0 when unfillable)
    pub shares: u64,
    /// Position value, `shares * price`
    pub value: f64,
    /// Share of invested capital (%), 0 when nothing was invested
    pub weight: f64,
}

impl AllocatedPosition {
    /// Whether the per-position budget could not buy a single share.
    pub fn is_unfillable(&self) -> bool {
        self.shares == 0
    }
}

/// Outcome of allocating a budget across the top candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    /// Positions in ranked order
    pub positions: Vec<AllocatedPosition>,
    /// Equal-weight budget per position
    pub target_per_position: f64,
    /// Sum of all position values
    pub total_invested: f64,
    /// Budget left uninvested
    pub cash_remaining: f64,
}

// ============================================================================
// Allocation
// ============================================================================

/// Allocate `portfolio_size` across the top `num_positions` candidates.
///
/// The candidate list must already be filtered and sorted; the top
/// `num_positions` entries are taken here. Fails with
/// `InvalidParameters` when fewer candidates qualify than positions
/// requested, rather than silently shorting the portfolio.
pub fn allocate(
    candidates: &[RankedCandidate],
    portfolio_size: f64,
    num_positions: usize,
) -> Result<Allocation, ScannerError> {
    if num_positions > candidates.len() {
        return Err(ScannerError::InvalidParameters(format!(
            "requested {} positions but only {} stocks passed the filters",
            num_positions,
            candidates.len()
        )));
    }

    let target_per_position = portfolio_size / num_positions as f64;

    let mut positions: Vec<AllocatedPosition> = candidates
        .iter()
        .take(num_positions)
        .map(|candidate| {
            let shares = if candidate.price > 0.0 && candidate.price <= target_per_position {
                (target_per_position / candidate.price).floor() as u64
            } else {
                0
            };
            let value = shares as f64 * candidate.price;

            AllocatedPosition {
                candidate: candidate.clone(),
                shares,
                value,
                weight: 0.0,
            }
        })
        .collect();

    let total_invested: f64 = positions.iter().map(|p| p.value).sum();
    if total_invested > 0.0 {
        for position in &mut positions {
            position.weight = position.value / total_invested * 100.0;
        }
    }

    Ok(Allocation {
        positions,
        target_per_position,
        total_invested,
        cash_remaining: portfolio_size - total_invested,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::returns::ReturnProfile;

    fn make_candidate(ticker: &str, price: f64) -> RankedCandidate {
        RankedCandidate {
            ticker: ticker.to_string(),
            exchange: "NYSE".to_string(),
            price,
            returns: ReturnProfile {
                return_1m: 0.02,
                return_3m: 0.05,
                return_6m: 0.11,
                return_1y: 0.25,
                sma10_distance: Some(1.5),
            },
            percentile_1m: 80.0,
            percentile_3m: 80.0,
            percentile_6m: 80.0,
            percentile_1y: 80.0,
            hqm_score: 80.0,
        }
    }

    #[test]
    fn test_equal_weight_exact_fill() {
        let candidates: Vec<RankedCandidate> = (0..8)
            .map(|i| make_candidate(&format!("TK{i}"), 50.0))
            .collect();

        let allocation = allocate(&candidates, 10_000.0, 8).unwrap();
        assert_eq!(allocation.target_per_position, 1250.0);
        assert_eq!(allocation.positions.len(), 8);

        for position in &allocation.positions {
            assert_eq!(position.shares, 25);
            assert_eq!(position.value, 1250.0);
            assert!((position.weight - 12.5).abs() < 1e-12);
        }

        assert_eq!(allocation.total_invested, 10_000.0);
        assert_eq!(allocation.cash_remaining, 0.0);
    }

    #[test]
    fn test_rounding_leaves_cash() {
        let candidates = vec![make_candidate("AAA", 333.0), make_candidate("BBB", 333.0)];

        let allocation = allocate(&candidates, 2_000.0, 2).unwrap();
        // target 1000, 3 shares of 333 = 999 per position
        for position in &allocation.positions {
            assert_eq!(position.shares, 3);
            assert_eq!(position.value, 999.0);
        }
        assert_eq!(allocation.total_invested, 1_998.0);
        assert_eq!(allocation.cash_remaining, 2.0);
        assert!(allocation.total_invested <= 2_000.0);
    }

    #[test]
    fn test_unfillable_position_is_reported() {
        let candidates = vec![
            make_candidate("CHEAP", 100.0),
            make_candidate("PRICEY", 5_000.0),
        ];

        let allocation = allocate(&candidates, 2_000.0, 2).unwrap();
        let pricey = allocation
            .positions
            .iter()
            .find(|p| p.candidate.ticker == "PRICEY")
            .unwrap();

        assert!(pricey.is_unfillable());
        assert_eq!(pricey.shares, 0);
        assert_eq!(pricey.value, 0.0);
        assert_eq!(pricey.weight, 0.0);

        let cheap = allocation
            .positions
            .iter()
            .find(|p| p.candidate.ticker == "CHEAP")
            .unwrap();
        assert_eq!(cheap.shares, 10);
        assert!((cheap.weight - 100.0).abs() < 1e-12);

        assert_eq!(allocation.total_invested, 1_000.0);
        assert_eq!(allocation.cash_remaining, 1_000.0);
    }

    #[test]
    fn test_all_unfillable_guards_zero_division() {
        let candidates = vec![
            make_candidate("AAA", 9_000.0),
            make_candidate("BBB", 8_000.0),
        ];

        let allocation = allocate(&candidates, 2_000.0, 2).unwrap();
        assert_eq!(allocation.total_invested, 0.0);
        assert_eq!(allocation.cash_remaining, 2_000.0);
        for position in &allocation.positions {
            assert_eq!(position.weight, 0.0);
        }
    }

    #[test]
    fn test_insufficient_candidates_rejected() {
        let candidates: Vec<RankedCandidate> = (0..5)
            .map(|i| make_candidate(&format!("TK{i}"), 50.0))
            .collect();

        let err = allocate(&candidates, 10_000.0, 10).unwrap_err();
        match err {
            ScannerError::InvalidParameters(msg) => {
                assert!(msg.contains("10"));
                assert!(msg.contains('5'));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_takes_only_top_positions() {
        let candidates: Vec<RankedCandidate> = (0..6)
            .map(|i| make_candidate(&format!("TK{i}"), 10.0))
            .collect();

        let allocation = allocate(&candidates, 3_000.0, 3).unwrap();
        assert_eq!(allocation.positions.len(), 3);
        assert_eq!(allocation.positions[0].candidate.ticker, "TK0");
    }

    #[test]
    fn test_invested_never_exceeds_budget() {
        let prices = [13.0, 77.0, 211.0, 499.0, 1.5];
        let candidates: Vec<RankedCandidate> = prices
            .iter()
            .enumerate()
            .map(|(i, p)| make_candidate(&format!("TK{i}"), *p))
            .collect();

        let allocation = allocate(&candidates, 5_000.0, 5).unwrap();
        assert!(allocation.total_invested <= 5_000.0);
        assert!(allocation.cash_remaining >= 0.0);
        let sum: f64 = allocation.positions.iter().map(|p| p.value).sum();
        assert!((sum - allocation.total_invested).abs() < 1e-9);
    }
}
