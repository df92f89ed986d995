//! End-to-end pipeline tests over generated universes: the scoring
//! funnel's stated properties, allocation arithmetic, and the wire
//! round-trip.

mod common;

use chrono::NaiveDate;

use hqm_scanner::data::{PricePoint, StockSnapshot};
use hqm_scanner::error::ScannerError;
use hqm_scanner::scan::{ScanEngine, ScanParams, ScanReport, ScanResult};

use common::linear_series;

fn snapshot(ticker: &str, series: Vec<PricePoint>) -> StockSnapshot {
    let latest = series.last().map(|p| p.close).unwrap_or(0.0);
    StockSnapshot {
        ticker: ticker.to_string(),
        exchange: "NYSE".to_string(),
        market_cap: 10_000_000_000.0,
        latest_price: latest,
        price_history: series,
    }
}

/// A series that is flat for a year then jumps in the final month:
/// strong 1m return, weak everywhere else.
fn spiky_series(len: usize) -> Vec<PricePoint> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    (0..len)
        .map(|t| PricePoint {
            date: start + chrono::Duration::days(t as i64),
            close: if t + 15 >= len { 180.0 } else { 100.0 },
        })
        .collect()
}

fn trending_universe(count: usize) -> Vec<StockSnapshot> {
    (0..count)
        .map(|i| {
            snapshot(
                &format!("TK{i}"),
                linear_series(260, 100.0, (i + 1) as f64),
            )
        })
        .collect()
}

fn params(portfolio_size: f64, num_positions: usize) -> ScanParams {
    ScanParams {
        portfolio_size,
        num_positions,
        max_sma10_distance: None,
    }
}

#[test]
fn percentiles_stay_in_range_and_leader_scores_100() {
    let universe = trending_universe(20);
    let result = ScanEngine::new(params(100_000.0, 10)).run(&universe).unwrap();

    let leader = &result.positions[0].candidate;
    assert_eq!(leader.ticker, "TK19");
    assert_eq!(leader.percentile_1m, 100.0);
    assert_eq!(leader.percentile_3m, 100.0);
    assert_eq!(leader.percentile_6m, 100.0);
    assert_eq!(leader.percentile_1y, 100.0);
    assert_eq!(leader.hqm_score, 100.0);

    for position in &result.positions {
        let c = &position.candidate;
        for pct in [c.percentile_1m, c.percentile_3m, c.percentile_6m, c.percentile_1y] {
            assert!(pct > 0.0 && pct <= 100.0, "percentile {pct} out of range");
        }
        assert!(c.hqm_score >= 0.0 && c.hqm_score <= 100.0);
    }
}

#[test]
fn single_period_spike_is_filtered_out() {
    // Nine steady trenders plus one ticker that only moved last month.
    let mut universe = trending_universe(9);
    universe.push(snapshot("SPIKE", spiky_series(260)));

    let result = ScanEngine::new(params(100_000.0, 5)).run(&universe).unwrap();

    assert_eq!(result.total_scanned, 10);
    // The spike leads the 1m horizon yet fails the floor elsewhere.
    assert!(result
        .positions
        .iter()
        .all(|p| p.candidate.ticker != "SPIKE"));
    assert!(result.after_quality_filter < 10);
}

#[test]
fn allocation_matches_equal_weight_arithmetic() {
    // Force every price to 50 so the arithmetic is exact:
    // 10_000 / 8 = 1_250 per slot -> 25 shares of 50.
    let mut universe = trending_universe(12);
    for snapshot in &mut universe {
        snapshot.latest_price = 50.0;
    }

    let result = ScanEngine::new(params(10_000.0, 8)).run(&universe).unwrap();

    assert_eq!(result.positions.len(), 8);
    for position in &result.positions {
        assert_eq!(position.shares, 25);
        assert_eq!(position.value, 1_250.0);
    }
    assert_eq!(result.total_invested, 10_000.0);
    assert_eq!(result.cash_remaining, 0.0);
}

#[test]
fn oversized_position_count_is_an_error() {
    let universe = trending_universe(6);
    let err = ScanEngine::new(params(100_000.0, 10))
        .run(&universe)
        .unwrap_err();

    match err {
        ScannerError::InvalidParameters(msg) => assert!(msg.contains("10")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn sma_filter_tightens_the_funnel() {
    let universe = trending_universe(12);

    let open = ScanEngine::new(params(100_000.0, 4)).run(&universe).unwrap();
    assert!(open.after_sma_filter.is_none());

    // Linear trends sit a few percent above their 10-day average; a
    // 0% ceiling eliminates everything.
    let mut strict = params(100_000.0, 4);
    strict.max_sma10_distance = Some(0.0);
    let err = ScanEngine::new(strict).run(&universe).unwrap_err();
    assert!(matches!(err, ScannerError::InvalidParameters(_)));

    let mut loose = params(100_000.0, 4);
    loose.max_sma10_distance = Some(50.0);
    let kept = ScanEngine::new(loose).run(&universe).unwrap();
    assert_eq!(kept.after_sma_filter, kept.after_quality_filter.into());
}

#[test]
fn result_round_trips_through_json() {
    let universe = trending_universe(10);
    let result = ScanEngine::new(params(75_000.0, 5)).run(&universe).unwrap();

    let json = serde_json::to_string(&result).unwrap();
    let back: ScanResult = serde_json::from_str(&json).unwrap();
    assert_eq!(result, back);
}

#[test]
fn csv_projects_every_position() {
    let universe = trending_universe(10);
    let result = ScanEngine::new(params(75_000.0, 5)).run(&universe).unwrap();

    let csv = ScanReport::new(&result).to_csv();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), result.positions.len() + 1);
    assert!(lines[1].starts_with("TK9,NYSE,"));
}
