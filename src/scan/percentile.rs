//! Cross-sectional percentile ranking.
//!
//! Rank-based percentiles with rank-average tie handling: the
//! cross-section is sorted ascending, 1-based ordinal ranks are
//! assigned, tied values share the mean rank of their group, and
//! `percentile = mean_rank / n * 100`. The unique maximum always
//! scores exactly 100; a singleton universe scores 100; every output
//! lies in (0, 100].

/// Percentile rank of every value within the slice, position-aligned
/// with the input.
pub fn percentile_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        values[a]
            .partial_cmp(&values[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        // Extend the group over exact ties.
        let mut j = i;
        while j + 1 < n && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }

        // Positions i..=j hold 1-based ranks i+1..=j+1.
        let mean_rank = (i + j) as f64 / 2.0 + 1.0;
        let percentile = mean_rank / n as f64 * 100.0;
        for &idx in &order[i..=j] {
            ranks[idx] = percentile;
        }

        i = j + 1;
    }

    ranks
}
