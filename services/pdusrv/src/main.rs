//! PDU Service (`pdusrv`)
//!
//! Keeps one console session to a rack PDU, polls it in the background
//! and integrates per-outlet energy from the power readings.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info, warn};

use pdusrv::core::console::ConsolePdu;
use pdusrv::core::energy::integrate_energy;
use pdusrv::{AppConfig, CachedPdu, Pdu, PolledPdu, Status, StatusCallback};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "pdusrv",
    version = env!("CARGO_PKG_VERSION"),
    about = "Rack PDU console client and poller",
    long_about = None
)]
struct Args {
    /// Configuration file (YAML)
    #[arg(short = 'c', long, env = "PDUSRV_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short = 'l', long)]
    log_level: Option<String>,

    /// Validation mode - only validate configuration without starting service
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = AppConfig::load(args.config.as_deref()).context("Invalid configuration")?;

    let mut log_config = config.log_config();
    if let Some(level) = &args.log_level {
        log_config.level = level.clone();
    }
    common::logging::init_with_config(log_config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    if args.validate {
        let mut effective = config.clone();
        effective.pdu.password = "********".to_string();
        let effective =
            serde_yaml::to_string(&effective).context("Failed to render configuration")?;
        println!("{effective}");
        info!("Validation completed successfully");
        return Ok(());
    }

    let acl = config.access_control()?;
    info!(entries = acl.len(), "Access control list loaded");

    info!("Connecting to PDU at {}", config.pdu.address);
    let driver = ConsolePdu::connect(
        &config.pdu.address,
        &config.transport_options(),
        config.session_options(),
        &config.console,
    )
    .await
    .with_context(|| format!("Failed to connect to {}", config.pdu.address))?;
    let console = Arc::new(driver);
    let driver: Arc<dyn Pdu> = console.clone();

    let pdu: Box<dyn Pdu> = if config.polling.enabled {
        info!("Polling every {} ms", config.polling.interval_ms);
        Box::new(PolledPdu::start(
            driver,
            config.poll_options(),
            Some(status_callback()),
        ))
    } else {
        if let Some(login) = driver.as_login() {
            login
                .login(&config.pdu.username, &config.pdu.password)
                .await
                .context("Console login failed")?;
        }
        let cached = CachedPdu::new(driver, config.cache_ttl());
        match cached.status(false).await {
            Ok(status) => log_status(&status),
            Err(e) => warn!("Initial status fetch failed: {}", e),
        }
        Box::new(cached)
    };

    common::wait_for_shutdown().await;

    info!("Shutting down");
    if let Err(e) = pdu.close().await {
        error!("Error while closing PDU: {}", e);
    }
    let stats = console.transport_stats().await;
    info!(
        bytes_sent = stats.bytes_sent,
        bytes_received = stats.bytes_received,
        idle_reads = stats.idle_reads,
        "Console transport totals"
    );
    info!("pdusrv stopped");
    Ok(())
}

/// Integrate energy against the previous snapshot and log the result
fn status_callback() -> StatusCallback {
    Box::new(|previous: Option<&Status>, status: &mut Status| {
        if let Some(previous) = previous {
            integrate_energy(previous, status);
        }
        log_status(status);
    })
}

fn log_status(status: &Status) {
    info!(
        temperature = status.temperature,
        total_energy = status.total_energy,
        breakers = status.breakers.len(),
        groups = status.groups.len(),
        outlets = status.outlets.len(),
        "PDU status"
    );
    match serde_json::to_string(status) {
        Ok(json) => debug!(snapshot = %json, "PDU status snapshot"),
        Err(e) => warn!("Failed to serialize status: {}", e),
    }
}
