//! HQM Scanner - high-quality momentum screener service.
//!
//! Screens equities for momentum that is consistent across 1M/3M/6M/1Y
//! horizons and allocates an equal-weight portfolio over the leaders.

use anyhow::Result;
use hqm_scanner::config::Config;
use hqm_scanner::logging::init_logging;
use hqm_scanner::ScannerService;

#[tokio::main]
async fn main() -> Result<()> {
    let startup_start = std::time::Instant::now();

    let config = Config::load_with_env()?;

    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::info!("HQM Scanner v{}", env!("CARGO_PKG_VERSION"));

    let service = ScannerService::new(config)?;

    let startup_duration = startup_start.elapsed();
    tracing::info!(
        duration_ms = startup_duration.as_millis() as u64,
        "Service initialized in {:?}",
        startup_duration
    );

    service.start().await
}
