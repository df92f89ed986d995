//! HQM Scanner Library
//!
//! Screens a universe of equities for high-quality momentum: stocks
//! that outperform consistently across four lookback horizons (1M, 3M,
//! 6M, 1Y) rather than spiking in a single period.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  hqm-scanner (Rust Service)                 │
//! │                          :4490                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────┐  │
//! │  │  Upstream    │  │  Snapshot    │  │  Scan Pipeline   │  │
//! │  │  Provider    │─▶│  Store       │─▶│  (returns →      │  │
//! │  │  (reqwest)   │  │  (SQLite)    │  │   percentiles →  │  │
//! │  └──────────────┘  └──────────────┘  │   score → alloc) │  │
//! │                                      └──────────────────┘  │
//! │                 ┌────────────────────────┐                 │
//! │                 │  JobController          │                │
//! │                 │  (single-flight jobs)   │                │
//! │                 └────────────────────────┘                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Refresh and scan run as background jobs, one at a time; callers
//! poll `/api/v1/jobs/status` and fetch the cached result of the last
//! successful scan. The scoring funnel itself is pure and synchronous.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod data;
pub mod error;
pub mod job;
pub mod logging;
pub mod routes;
pub mod scan;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::data::{
    MarketDataProvider, PricePoint, SnapshotStore, StockSnapshot, UpstreamClient,
};
use crate::error::ScannerError;
use crate::job::{JobController, JobKind, JobSnapshot, JobTicket};
use crate::scan::{ScanEngine, ScanParams};

/// Tickers per upstream history request issued by a refresh; also the
/// progress-reporting granularity.
const REFRESH_FETCH_CHUNK: usize = 500;

// ============================================================================
// Scanner State
// ============================================================================

/// Shared service state: configuration, the snapshot cache, the
/// upstream provider, and the job slot.
pub struct ScannerState {
    /// Configuration
    pub config: Config,
    /// Local snapshot cache
    pub store: Arc<SnapshotStore>,
    /// Upstream market-data source
    pub provider: Arc<dyn MarketDataProvider>,
    /// Single-flight background job controller
    pub jobs: JobController,
}

impl ScannerState {
    /// Build state from configuration, opening the on-disk store and
    /// the HTTP upstream client.
    pub fn new(config: Config) -> Result<Self, ScannerError> {
        let store = Arc::new(SnapshotStore::open(&config.store)?);
        let provider: Arc<dyn MarketDataProvider> =
            Arc::new(UpstreamClient::new(config.upstream.clone())?);

        Ok(Self {
            config,
            store,
            provider,
            jobs: JobController::new(),
        })
    }

    /// Build state from pre-constructed parts. Used by tests to wire
    /// an in-memory store and a mock provider.
    pub fn with_parts(
        config: Config,
        store: SnapshotStore,
        provider: Arc<dyn MarketDataProvider>,
    ) -> Self {
        Self {
            config,
            store: Arc::new(store),
            provider,
            jobs: JobController::new(),
        }
    }

    /// Kick off a background refresh of the snapshot cache.
    ///
    /// Fails with `AlreadyRunning` if another job holds the slot. The
    /// returned snapshot reflects the freshly started job.
    pub async fn start_refresh(self: &Arc<Self>) -> Result<JobSnapshot, ScannerError> {
        let ticket = self
            .jobs
            .start(JobKind::Refresh, "Connecting to upstream")
            .await?;

        let state = Arc::clone(self);
        tokio::spawn(async move {
            match run_refresh(&state, &ticket).await {
                Ok(count) => {
                    ticket
                        .complete_refresh(format!("Refreshed {count} tickers"))
                        .await;
                }
                Err(err) => ticket.fail(err.to_string()).await,
            }
        });

        Ok(self.jobs.status().await)
    }

    /// Kick off a background scan over the cached universe.
    ///
    /// Parameter validation and the empty-cache check happen here,
    /// synchronously, before the job slot is touched; a rejection
    /// leaves the controller exactly as it was.
    pub async fn start_scan(
        self: &Arc<Self>,
        params: ScanParams,
    ) -> Result<JobSnapshot, ScannerError> {
        params.validate()?;
        if self.store.stock_count().await? == 0 {
            return Err(ScannerError::NoDataAvailable);
        }

        let ticket = self.jobs.start(JobKind::Scan, "Starting scan").await?;

        let state = Arc::clone(self);
        tokio::spawn(async move {
            match run_scan(&state, &ticket, params).await {
                Ok(result) => ticket.complete_scan(result).await,
                Err(err) => ticket.fail(err.to_string()).await,
            }
        });

        Ok(self.jobs.status().await)
    }
}

// ============================================================================
// Job Bodies
// ============================================================================

/// Refresh: list the configured universe, pull daily close history in
/// chunks, and replace the snapshot cache in one transaction.
async fn run_refresh(
    state: &Arc<ScannerState>,
    ticket: &JobTicket,
) -> Result<usize, ScannerError> {
    let universe = &state.config.universe;

    ticket.progress(5, "Listing universe").await;
    let mut entries = Vec::new();
    for exchange in &universe.exchanges {
        let listed = state
            .provider
            .list_universe(exchange, universe.min_market_cap)
            .await?;
        info!(exchange = %exchange, count = listed.len(), "Universe listed");
        entries.extend(listed);
    }

    entries.sort_by(|a, b| a.ticker.cmp(&b.ticker));
    entries.dedup_by(|a, b| a.ticker == b.ticker);
    if entries.is_empty() {
        return Err(ScannerError::UpstreamFetch(
            "universe listing returned no tickers".to_string(),
        ));
    }

    let tickers: Vec<String> = entries.iter().map(|e| e.ticker.clone()).collect();
    let total = tickers.len();

    let mut history: HashMap<String, Vec<PricePoint>> = HashMap::new();
    let mut fetched = 0usize;
    for batch in tickers.chunks(REFRESH_FETCH_CHUNK) {
        let closes = state
            .provider
            .daily_closes(batch, universe.history_days)
            .await?;
        history.extend(closes);

        fetched += batch.len();
        let percent = 10 + (fetched * 80 / total) as u8;
        ticket
            .progress(percent, format!("Fetched history for {fetched}/{total} tickers"))
            .await;
    }

    let mut snapshots = Vec::with_capacity(entries.len());
    for entry in entries {
        match history.remove(&entry.ticker) {
            Some(series) if !series.is_empty() => snapshots.push(StockSnapshot {
                ticker: entry.ticker,
                exchange: entry.exchange,
                market_cap: entry.market_cap,
                latest_price: entry.latest_price,
                price_history: series,
            }),
            _ => debug!(ticker = %entry.ticker, "No history from upstream, skipping"),
        }
    }

    ticket.progress(95, "Writing snapshot cache").await;
    state.store.replace_snapshots(&snapshots).await
}

/// Scan: load the cached universe and run the scoring funnel. History
/// recording is best-effort; its failure does not fail the scan.
async fn run_scan(
    state: &Arc<ScannerState>,
    ticket: &JobTicket,
    params: ScanParams,
) -> Result<scan::ScanResult, ScannerError> {
    ticket.progress(10, "Loading cached universe").await;
    let snapshots = state.store.load_snapshots().await?;

    ticket
        .progress(35, format!("Scoring {} tickers", snapshots.len()))
        .await;
    let result = ScanEngine::new(params).run(&snapshots)?;

    ticket.progress(90, "Recording scan history").await;
    if let Err(err) = state.store.record_scan(&result).await {
        warn!(error = %err, "Failed to record scan history");
    }

    Ok(result)
}

/// Hourly staleness check driving the optional auto-refresh worker.
async fn run_auto_refresh(state: Arc<ScannerState>, max_age_hours: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(3600));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let status = match state.store.data_status().await {
            Ok(status) => status,
            Err(err) => {
                warn!(error = %err, "Auto-refresh staleness check failed");
                continue;
            }
        };

        let stale = match status.data_age_hours {
            None => true,
            Some(age) => age > max_age_hours as f64,
        };
        if !stale {
            continue;
        }

        match state.start_refresh().await {
            Ok(snapshot) => {
                info!(job_id = ?snapshot.job_id, "Auto-refresh triggered");
            }
            Err(ScannerError::AlreadyRunning) => {
                debug!("Job slot busy, auto-refresh retries next tick");
            }
            Err(err) => warn!(error = %err, "Auto-refresh failed to start"),
        }
    }
}

// ============================================================================
// Scanner Service
// ============================================================================

/// Build the HTTP router over shared state. Exposed separately from
/// the service so tests can drive it with `tower::ServiceExt`.
pub fn router(state: Arc<ScannerState>) -> Router {
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);
    let max_body = state.config.server.max_body_bytes;

    Router::new()
        .route("/health", get(routes::health))
        .route("/api/v1/data/status", get(routes::data_status))
        .route("/api/v1/refresh", post(routes::start_refresh))
        .route("/api/v1/scan", post(routes::start_scan))
        .route("/api/v1/jobs/status", get(routes::job_status))
        .route("/api/v1/scan/result", get(routes::scan_result))
        .route("/api/v1/scan/result.csv", get(routes::scan_result_csv))
        .route("/api/v1/scans", get(routes::scan_history))
        .route("/api/v1/history/:ticker", get(routes::score_history))
        .layer(RequestBodyLimitLayer::new(max_body))
        .layer(TimeoutLayer::new(timeout))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Main scanner service.
pub struct ScannerService {
    state: Arc<ScannerState>,
}

impl ScannerService {
    /// Create a new scanner service.
    pub fn new(config: Config) -> Result<Self, ScannerError> {
        let state = Arc::new(ScannerState::new(config)?);
        Ok(Self { state })
    }

    /// Start the scanner service and serve until shutdown.
    pub async fn start(self) -> Result<()> {
        if let Some(hours) = self.state.config.auto_refresh_hours {
            let state = self.state.clone();
            tokio::spawn(async move {
                run_auto_refresh(state, hours).await;
            });
            info!(max_age_hours = hours, "Auto-refresh worker started");
        }

        let addr: SocketAddr = format!(
            "{}:{}",
            self.state.config.server.host, self.state.config.server.port
        )
        .parse()?;

        let app = router(self.state.clone());

        info!(address = %addr, "Starting HTTP server");
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
