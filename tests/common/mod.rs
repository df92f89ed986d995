//! Shared fixtures for integration tests: a deterministic in-memory
//! market-data provider and universe generators. No network, no
//! wall-clock dependence beyond the injected dates.

// Each test binary uses a subset of these helpers.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use hqm_scanner::config::Config;
use hqm_scanner::data::{
    MarketDataProvider, PricePoint, ProviderError, SnapshotStore, UniverseEntry,
};
use hqm_scanner::job::{JobController, JobSnapshot, JobStatus};
use hqm_scanner::ScannerState;

/// Daily closes with linear slope `slope`, oldest first.
pub fn linear_series(len: usize, base: f64, slope: f64) -> Vec<PricePoint> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    (0..len)
        .map(|t| PricePoint {
            date: start + chrono::Duration::days(t as i64),
            close: base + slope * t as f64,
        })
        .collect()
}

/// Deterministic provider serving a fixed universe.
///
/// Ticker `TK{i}` rises with slope `i + 1`, so every horizon ranks the
/// tickers in the same order and `TK{count-1}` leads.
pub struct MockProvider {
    universe: Vec<UniverseEntry>,
    history: HashMap<String, Vec<PricePoint>>,
    /// Artificial latency per call, keeps jobs observable mid-flight
    delay: Option<Duration>,
    /// When set, daily_closes fails with a network error
    fail_bars: bool,
    pub list_calls: AtomicUsize,
    pub bars_calls: AtomicUsize,
}

impl MockProvider {
    pub fn trending(count: usize, history_len: usize) -> Self {
        let mut universe = Vec::with_capacity(count);
        let mut history = HashMap::new();

        for i in 0..count {
            let series = linear_series(history_len, 100.0, (i + 1) as f64);
            let latest = series.last().map(|p| p.close).unwrap_or(0.0);
            let ticker = format!("TK{i}");

            universe.push(UniverseEntry {
                ticker: ticker.clone(),
                exchange: "NYSE".to_string(),
                market_cap: 5_000_000_000.0 + i as f64 * 1_000_000_000.0,
                latest_price: latest,
            });
            history.insert(ticker, series);
        }

        Self {
            universe,
            history,
            delay: None,
            fail_bars: false,
            list_calls: AtomicUsize::new(0),
            bars_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing_bars(mut self) -> Self {
        self.fail_bars = true;
        self
    }
}

#[async_trait]
impl MarketDataProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn list_universe(
        &self,
        _exchange: &str,
        min_market_cap: f64,
    ) -> Result<Vec<UniverseEntry>, ProviderError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        Ok(self
            .universe
            .iter()
            .filter(|e| e.market_cap >= min_market_cap)
            .cloned()
            .collect())
    }

    async fn daily_closes(
        &self,
        tickers: &[String],
        _days: u32,
    ) -> Result<HashMap<String, Vec<PricePoint>>, ProviderError> {
        self.bars_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_bars {
            return Err(ProviderError::Network("connection reset by peer".into()));
        }

        Ok(tickers
            .iter()
            .filter_map(|t| self.history.get(t).map(|s| (t.clone(), s.clone())))
            .collect())
    }
}

/// State over an in-memory store and the given provider. One exchange
/// so the mock's universe is listed exactly once per refresh.
pub fn make_state(provider: MockProvider) -> Arc<ScannerState> {
    let mut config = Config::default();
    config.universe.exchanges = vec!["NYSE".to_string()];
    config.universe.min_market_cap = 0.0;

    let store = SnapshotStore::in_memory().expect("in-memory store");
    Arc::new(ScannerState::with_parts(config, store, Arc::new(provider)))
}

/// Poll until the job slot leaves `running`, with a hard timeout so a
/// wedged job fails the test instead of hanging it.
pub async fn wait_for_terminal(jobs: &JobController) -> JobSnapshot {
    for _ in 0..500 {
        let snapshot = jobs.status().await;
        if snapshot.status != JobStatus::Running {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job did not reach a terminal state in time");
}
