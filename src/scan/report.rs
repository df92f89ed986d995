//! CSV projection of scan results.
//!
//! A straight projection of `ScanResult` fields, no computation:
//! percentages carry two decimals, position values round to whole
//! currency units, an unknown SMA distance becomes an empty cell.

use std::fmt::Write as _;

use super::engine::ScanResult;

const CSV_HEADER: &str = "ticker,exchange,price,return_1m_pct,percentile_1m,return_3m_pct,percentile_3m,return_6m_pct,percentile_6m,return_1y_pct,percentile_1y,hqm_score,sma10_distance_pct,shares,value,weight_pct";

/// CSV renderer for one scan result.
pub struct ScanReport<'a> {
    result: &'a ScanResult,
}

impl<'a> ScanReport<'a> {
    pub fn new(result: &'a ScanResult) -> Self {
        Self { result }
    }

    /// Render the positions as CSV, one row per position in ranked
    /// order, header first.
    pub fn to_csv(&self) -> String {
        let mut out = String::with_capacity(128 + self.result.positions.len() * 160);
        out.push_str(CSV_HEADER);
        out.push('\n');

        for position in &self.result.positions {
            let c = &position.candidate;
            let sma = c
                .returns
                .sma10_distance
                .map(|d| format!("{d:.2}"))
                .unwrap_or_default();

            let _ = writeln!(
                out,
                "{},{},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{:.0},{},{},{:.0},{:.2}",
                c.ticker,
                c.exchange,
                c.price,
                c.returns.return_1m * 100.0,
                c.percentile_1m,
                c.returns.return_3m * 100.0,
                c.percentile_3m,
                c.returns.return_6m * 100.0,
                c.percentile_6m,
                c.returns.return_1y * 100.0,
                c.percentile_1y,
                c.hqm_score,
                sma,
                position.shares,
                position.value,
                position.weight,
            );
        }

        out
    }
}
