//! Local snapshot cache using SQLite.
//!
//! Holds the universe from the most recent refresh (ticker metadata
//! plus daily close history), the refresh timestamp, and the scan
//! history used for charting per-ticker score trajectories.
//!
//! Replacement is transactional: a refresh that dies mid-write leaves
//! the previous snapshot untouched.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{DataStatus, PricePoint, StockSnapshot};
use crate::error::Result;
use crate::scan::ScanResult;

// ============================================================================
// Database Schema
// ============================================================================

const CREATE_TABLES_SQL: &str = r#"
-- Cached universe from the most recent refresh
CREATE TABLE IF NOT EXISTS stocks (
    ticker TEXT PRIMARY KEY,
    exchange TEXT NOT NULL,
    market_cap REAL NOT NULL,
    latest_price REAL NOT NULL,
    updated_at TEXT NOT NULL
);

-- Daily closes per cached ticker
CREATE TABLE IF NOT EXISTS price_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ticker TEXT NOT NULL,
    date TEXT NOT NULL,
    close REAL NOT NULL,
    UNIQUE(ticker, date)
);

CREATE INDEX IF NOT EXISTS idx_price_history_ticker_date
ON price_history(ticker, date);

-- Key/value metadata (last_refresh timestamp)
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Log of completed scans
CREATE TABLE IF NOT EXISTS scans (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    scan_date TEXT NOT NULL,
    portfolio_size REAL NOT NULL,
    num_positions INTEGER NOT NULL,
    total_invested REAL NOT NULL,
    cash_remaining REAL NOT NULL
);

-- Positions selected in each scan
CREATE TABLE IF NOT EXISTS scan_positions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    scan_id INTEGER NOT NULL,
    rank INTEGER NOT NULL,
    ticker TEXT NOT NULL,
    hqm_score REAL NOT NULL,
    shares INTEGER NOT NULL,
    value REAL NOT NULL,
    weight REAL NOT NULL,
    FOREIGN KEY (scan_id) REFERENCES scans(id)
);

-- Score trajectory per ticker, one row per calendar day
CREATE TABLE IF NOT EXISTS hqm_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ticker TEXT NOT NULL,
    date TEXT NOT NULL,
    hqm_score REAL NOT NULL,
    pct_1m REAL NOT NULL,
    pct_3m REAL NOT NULL,
    pct_6m REAL NOT NULL,
    pct_1y REAL NOT NULL,
    price REAL NOT NULL,
    UNIQUE(ticker, date)
);

CREATE INDEX IF NOT EXISTS idx_hqm_history_ticker_date
ON hqm_history(ticker, date DESC);
"#;

const LAST_REFRESH_KEY: &str = "last_refresh";

// ============================================================================
// Config & Record Types
// ============================================================================

/// Store location settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file path
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hqm-scanner")
        .join("hqm.db")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// One row of the scan log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub id: i64,
    pub scan_date: DateTime<Utc>,
    pub portfolio_size: f64,
    pub num_positions: usize,
    pub total_invested: f64,
    pub cash_remaining: f64,
}

/// One day of a ticker's score trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreHistoryPoint {
    pub date: NaiveDate,
    pub hqm_score: f64,
    pub pct_1m: f64,
    pub pct_3m: f64,
    pub pct_6m: f64,
    pub pct_1y: f64,
    pub price: f64,
}

// ============================================================================
// Snapshot Store
// ============================================================================

/// SQLite-backed snapshot cache.
pub struct SnapshotStore {
    /// SQLite connection wrapped in Mutex for thread safety.
    /// rusqlite::Connection is Send but not Sync; Mutex<T> is Sync
    /// when T: Send.
    db: Arc<Mutex<Connection>>,
}

impl SnapshotStore {
    /// Open (creating if needed) the store at the configured path.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&config.db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.execute_batch(CREATE_TABLES_SQL)?;

        info!(db_path = %config.db_path.display(), "Snapshot store opened");

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory store for tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(CREATE_TABLES_SQL)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    /// Replace the entire cached universe in one transaction and stamp
    /// the refresh time. Nothing changes if any insert fails.
    pub async fn replace_snapshots(&self, snapshots: &[StockSnapshot]) -> Result<usize> {
        let mut db = self.db.lock().await;
        let tx = db.transaction()?;

        tx.execute("DELETE FROM price_history", [])?;
        tx.execute("DELETE FROM stocks", [])?;

        let updated_at = Utc::now().to_rfc3339();
        {
            let mut stock_stmt = tx.prepare(
                "INSERT INTO stocks (ticker, exchange, market_cap, latest_price, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            let mut price_stmt = tx.prepare(
                "INSERT OR REPLACE INTO price_history (ticker, date, close)
                 VALUES (?1, ?2, ?3)",
            )?;

            for snapshot in snapshots {
                stock_stmt.execute(params![
                    snapshot.ticker,
                    snapshot.exchange,
                    snapshot.market_cap,
                    snapshot.latest_price,
                    updated_at,
                ])?;
                for point in &snapshot.price_history {
                    price_stmt.execute(params![
                        snapshot.ticker,
                        point.date.to_string(),
                        point.close,
                    ])?;
                }
            }
        }

        tx.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![LAST_REFRESH_KEY, updated_at],
        )?;
        tx.commit()?;

        info!(count = snapshots.len(), "Snapshot cache replaced");
        Ok(snapshots.len())
    }

    /// Load the full cached universe, tickers ascending, closes oldest
    /// first.
    pub async fn load_snapshots(&self) -> Result<Vec<StockSnapshot>> {
        let db = self.db.lock().await;

        let mut history: HashMap<String, Vec<PricePoint>> = HashMap::new();
        {
            let mut stmt =
                db.prepare("SELECT ticker, date, close FROM price_history ORDER BY ticker, date")?;
            let rows = stmt.query_map([], |row| {
                let ticker: String = row.get(0)?;
                let date: String = row.get(1)?;
                let close: f64 = row.get(2)?;
                Ok((ticker, date, close))
            })?;

            for row in rows {
                let (ticker, date, close) = row?;
                let date = parse_date(&date, 1)?;
                history
                    .entry(ticker)
                    .or_default()
                    .push(PricePoint { date, close });
            }
        }

        let mut stmt = db.prepare(
            "SELECT ticker, exchange, market_cap, latest_price FROM stocks ORDER BY ticker",
        )?;
        let snapshots = stmt
            .query_map([], |row| {
                let ticker: String = row.get(0)?;
                Ok(StockSnapshot {
                    price_history: Vec::new(),
                    exchange: row.get(1)?,
                    market_cap: row.get(2)?,
                    latest_price: row.get(3)?,
                    ticker,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut result = snapshots;
        for snapshot in &mut result {
            if let Some(series) = history.remove(&snapshot.ticker) {
                snapshot.price_history = series;
            }
        }

        debug!(count = result.len(), "Loaded snapshot cache");
        Ok(result)
    }

    /// Number of cached tickers.
    pub async fn stock_count(&self) -> Result<usize> {
        let db = self.db.lock().await;
        let count: i64 = db.query_row("SELECT COUNT(*) FROM stocks", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Timestamp of the last successful refresh.
    pub async fn last_refresh(&self) -> Result<Option<DateTime<Utc>>> {
        let db = self.db.lock().await;
        let value: Option<String> = db
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                params![LAST_REFRESH_KEY],
                |row| row.get(0),
            )
            .optional()?;

        match value {
            Some(raw) => {
                let parsed = DateTime::parse_from_rfc3339(&raw).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        0,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                Ok(Some(parsed.with_timezone(&Utc)))
            }
            None => Ok(None),
        }
    }

    /// Freshness summary for the data-status endpoint.
    pub async fn data_status(&self) -> Result<DataStatus> {
        let stock_count = self.stock_count().await?;
        let last_refresh = self.last_refresh().await?;
        let data_age_hours = last_refresh
            .map(|ts| (Utc::now() - ts).num_milliseconds() as f64 / 3_600_000.0);

        Ok(DataStatus {
            has_data: stock_count > 0,
            stock_count,
            data_age_hours,
            last_refresh,
        })
    }

    // ========================================================================
    // Scan History
    // ========================================================================

    /// Append a completed scan to the log and upsert each position's
    /// daily score-history row. Returns the scan id.
    pub async fn record_scan(&self, result: &ScanResult) -> Result<i64> {
        let mut db = self.db.lock().await;
        let tx = db.transaction()?;

        tx.execute(
            "INSERT INTO scans (scan_date, portfolio_size, num_positions, total_invested, cash_remaining)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                result.generated_at.to_rfc3339(),
                result.portfolio_size,
                result.num_positions as i64,
                result.total_invested,
                result.cash_remaining,
            ],
        )?;
        let scan_id = tx.last_insert_rowid();

        let scan_day = result.generated_at.date_naive().to_string();
        {
            let mut position_stmt = tx.prepare(
                "INSERT INTO scan_positions (scan_id, rank, ticker, hqm_score, shares, value, weight)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            let mut history_stmt = tx.prepare(
                "INSERT OR REPLACE INTO hqm_history
                 (ticker, date, hqm_score, pct_1m, pct_3m, pct_6m, pct_1y, price)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;

            for (rank, position) in result.positions.iter().enumerate() {
                let c = &position.candidate;
                position_stmt.execute(params![
                    scan_id,
                    (rank + 1) as i64,
                    c.ticker,
                    c.hqm_score,
                    position.shares as i64,
                    position.value,
                    position.weight,
                ])?;
                history_stmt.execute(params![
                    c.ticker,
                    scan_day,
                    c.hqm_score,
                    c.percentile_1m,
                    c.percentile_3m,
                    c.percentile_6m,
                    c.percentile_1y,
                    c.price,
                ])?;
            }
        }

        tx.commit()?;
        debug!(scan_id, positions = result.positions.len(), "Scan recorded");
        Ok(scan_id)
    }

    /// Most recent scans, newest first.
    pub async fn scan_history(&self, limit: usize) -> Result<Vec<ScanRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, scan_date, portfolio_size, num_positions, total_invested, cash_remaining
             FROM scans ORDER BY scan_date DESC LIMIT ?1",
        )?;

        let records = stmt
            .query_map(params![limit as i64], |row| {
                let raw_date: String = row.get(1)?;
                let scan_date = DateTime::parse_from_rfc3339(&raw_date)
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            1,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?
                    .with_timezone(&Utc);
                let num_positions: i64 = row.get(3)?;

                Ok(ScanRecord {
                    id: row.get(0)?,
                    scan_date,
                    portfolio_size: row.get(2)?,
                    num_positions: num_positions as usize,
                    total_invested: row.get(4)?,
                    cash_remaining: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }

    /// Score trajectory for one ticker, newest first, at most `days`
    /// rows.
    pub async fn score_history(&self, ticker: &str, days: usize) -> Result<Vec<ScoreHistoryPoint>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT date, hqm_score, pct_1m, pct_3m, pct_6m, pct_1y, price
             FROM hqm_history WHERE ticker = ?1 ORDER BY date DESC LIMIT ?2",
        )?;

        let points = stmt
            .query_map(params![ticker, days as i64], |row| {
                let raw_date: String = row.get(0)?;
                Ok(ScoreHistoryPoint {
                    date: parse_date(&raw_date, 0)?,
                    hqm_score: row.get(1)?,
                    pct_1m: row.get(2)?,
                    pct_3m: row.get(3)?,
                    pct_6m: row.get(4)?,
                    pct_1y: row.get(5)?,
                    price: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(points)
    }
}

fn parse_date(raw: &str, column: usize) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::allocate::AllocatedPosition;
    use crate::scan::returns::ReturnProfile;
    use crate::scan::score::RankedCandidate;

    fn make_snapshot(ticker: &str, closes: &[f64]) -> StockSnapshot {
        let start = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        StockSnapshot {
            ticker: ticker.to_string(),
            exchange: "NYSE".to_string(),
            market_cap: 4_000_000_000.0,
            latest_price: *closes.last().unwrap_or(&0.0),
            price_history: closes
                .iter()
                .enumerate()
                .map(|(i, &close)| PricePoint {
                    date: start + chrono::Duration::days(i as i64),
                    close,
                })
                .collect(),
        }
    }

    fn make_scan_result(tickers: &[&str]) -> ScanResult {
        let positions: Vec<AllocatedPosition> = tickers
            .iter()
            .map(|t| AllocatedPosition {
                candidate: RankedCandidate {
                    ticker: t.to_string(),
                    exchange: "NYSE".to_string(),
                    price: 42.0,
                    returns: ReturnProfile {
                        return_1m: 0.1,
                        return_3m: 0.2,
                        return_6m: 0.3,
                        return_1y: 0.4,
                        sma10_distance: Some(2.0),
                    },
                    percentile_1m: 90.0,
                    percentile_3m: 85.0,
                    percentile_6m: 80.0,
                    percentile_1y: 75.0,
                    hqm_score: 83.0,
                },
                shares: 10,
                value: 420.0,
                weight: 50.0,
            })
            .collect();

        let total_invested: f64 = positions.iter().map(|p| p.value).sum();
        ScanResult {
            generated_at: Utc::now(),
            total_scanned: 100,
            after_quality_filter: 30,
            after_sma_filter: None,
            positions,
            total_invested,
            cash_remaining: 10_000.0 - total_invested,
            portfolio_size: 10_000.0,
            num_positions: tickers.len(),
            filter_stages: Vec::new(),
            duration_secs: 1.0,
        }
    }

    #[tokio::test]
    async fn test_empty_store_status() {
        let store = SnapshotStore::in_memory().unwrap();
        assert_eq!(store.stock_count().await.unwrap(), 0);

        let status = store.data_status().await.unwrap();
        assert!(!status.has_data);
        assert_eq!(status.stock_count, 0);
        assert!(status.data_age_hours.is_none());
        assert!(status.last_refresh.is_none());
    }

    #[tokio::test]
    async fn test_replace_and_load_round_trip() {
        let store = SnapshotStore::in_memory().unwrap();
        let snapshots = vec![
            make_snapshot("AAPL", &[100.0, 101.0, 102.0]),
            make_snapshot("MSFT", &[200.0, 199.0]),
        ];

        store.replace_snapshots(&snapshots).await.unwrap();
        let loaded = store.load_snapshots().await.unwrap();

        assert_eq!(loaded, snapshots);
        assert_eq!(store.stock_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_replace_overwrites_previous_universe() {
        let store = SnapshotStore::in_memory().unwrap();
        store
            .replace_snapshots(&[make_snapshot("OLD", &[1.0, 2.0])])
            .await
            .unwrap();
        store
            .replace_snapshots(&[
                make_snapshot("NEW1", &[3.0]),
                make_snapshot("NEW2", &[4.0]),
            ])
            .await
            .unwrap();

        let loaded = store.load_snapshots().await.unwrap();
        let tickers: Vec<&str> = loaded.iter().map(|s| s.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["NEW1", "NEW2"]);
    }

    #[tokio::test]
    async fn test_refresh_stamps_data_age() {
        let store = SnapshotStore::in_memory().unwrap();
        store
            .replace_snapshots(&[make_snapshot("AAPL", &[1.0])])
            .await
            .unwrap();

        let status = store.data_status().await.unwrap();
        assert!(status.has_data);
        assert!(status.last_refresh.is_some());
        let age = status.data_age_hours.unwrap();
        assert!(age >= 0.0 && age < 1.0);
    }

    #[tokio::test]
    async fn test_scan_history_newest_first() {
        let store = SnapshotStore::in_memory().unwrap();
        let mut first = make_scan_result(&["AAPL"]);
        first.generated_at = Utc::now() - chrono::Duration::hours(2);
        let second = make_scan_result(&["MSFT", "NVDA"]);

        store.record_scan(&first).await.unwrap();
        store.record_scan(&second).await.unwrap();

        let history = store.scan_history(10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].scan_date > history[1].scan_date);
        assert_eq!(history[0].num_positions, 2);

        let limited = store.scan_history(1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_score_history_per_ticker() {
        let store = SnapshotStore::in_memory().unwrap();
        store.record_scan(&make_scan_result(&["AAPL", "MSFT"])).await.unwrap();

        let history = store.score_history("AAPL", 30).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].hqm_score, 83.0);
        assert_eq!(history[0].pct_1y, 75.0);

        assert!(store.score_history("NVDA", 30).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_same_day_scan_upserts_score_history() {
        let store = SnapshotStore::in_memory().unwrap();
        let result = make_scan_result(&["AAPL"]);
        store.record_scan(&result).await.unwrap();
        store.record_scan(&result).await.unwrap();

        // Two scans logged, one history row per ticker per day.
        assert_eq!(store.scan_history(10).await.unwrap().len(), 2);
        assert_eq!(store.score_history("AAPL", 30).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_on_disk_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            db_path: dir.path().join("cache").join("hqm.db"),
        };

        {
            let store = SnapshotStore::open(&config).unwrap();
            store
                .replace_snapshots(&[make_snapshot("AAPL", &[10.0, 11.0])])
                .await
                .unwrap();
        }

        let reopened = SnapshotStore::open(&config).unwrap();
        assert_eq!(reopened.stock_count().await.unwrap(), 1);
        let loaded = reopened.load_snapshots().await.unwrap();
        assert_eq!(loaded[0].price_history.len(), 2);
    }
}
