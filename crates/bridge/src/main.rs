//! Viking Bio Bridge - Main Entry Point

use anyhow::Context;
use bridge::cli::Args;
use bridge::{init_logging, run_pipeline, serial, BridgeConfig, UdpReportSink};
use clap::Parser;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = Args::parse().config;
    let config = BridgeConfig::load(path.as_deref()).context("loading configuration")?;
    init_logging(&config.log_level)?;

    info!("=== Viking Bio Bridge v{} ===", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &path {
        info!(path = %path.display(), "configuration file loaded");
    }
    if config.report.targets.is_empty() {
        warn!("no report targets configured, attribute reports will not be sent");
    }

    let source = serial::open(&config.serial).context("opening serial input")?;
    let sink = UdpReportSink::bind(&config.report.bind).context("binding report socket")?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    let summary = run_pipeline(&config, source, sink, shutdown).await?;
    info!(
        readings = summary.channel.readings_processed,
        messages = summary.channel.messages_processed,
        dropped = summary.channel.readings_dropped,
        reports = summary.core.reports_sent,
        faults = summary.core.burner_faults,
        "bridge stopped"
    );
    Ok(())
}
