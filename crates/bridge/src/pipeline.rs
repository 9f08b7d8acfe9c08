//! Pipeline wiring

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::io_core::{read_serial, IoCore};
use crate::protocol_core::{CoreSettings, CoreSummary, ProtocolCore};
use crate::transport::ReportSink;
use attribute_store::AttributeStore;
use cross_core::ChannelStats;
use ring_buffer::IngressBuffer;
use std::future::Future;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio::sync::{watch, Notify};
use tracing::{error, info};

/// Counters reported when the pipeline stops
#[derive(Debug, Clone, Copy)]
pub struct PipelineSummary {
    pub bytes_read: u64,
    pub ingress_dropped: u32,
    pub channel: ChannelStats,
    pub core: CoreSummary,
}

/// Run the bridge until `source` reaches end of input or `shutdown`
/// resolves.
pub async fn run_pipeline<R, S, F>(
    config: &BridgeConfig,
    source: R,
    sink: S,
    shutdown: F,
) -> Result<PipelineSummary, BridgeError>
where
    R: AsyncRead + Unpin + Send + 'static,
    S: ReportSink + 'static,
    F: Future<Output = ()>,
{
    let ingress = Arc::new(IngressBuffer::new());
    let (sender, receiver) = cross_core::channel();
    let stats = sender.stats_handle();

    let mut store = AttributeStore::new();
    for target in &config.report.targets {
        store.add_report_target(&target.address, target.port)?;
    }
    let core = ProtocolCore::new(receiver, store, sink, CoreSettings::from(config)).spawn()?;

    let data_ready = Arc::new(Notify::new());
    let (stop_tx, stop_rx) = watch::channel(false);
    let parse_task = tokio::spawn(
        IoCore::new(Arc::clone(&ingress), sender).run(Arc::clone(&data_ready), stop_rx),
    );
    let mut reader_task = tokio::spawn(read_serial(
        source,
        Arc::clone(&ingress),
        Arc::clone(&data_ready),
    ));

    let mut failure = None;
    let mut bytes_read = 0;
    tokio::select! {
        joined = &mut reader_task => match joined {
            Ok(Ok(n)) => {
                info!(bytes = n, "serial input ended");
                bytes_read = n;
            }
            Ok(Err(e)) => {
                error!(error = %e, "serial input failed");
                failure = Some(e);
            }
            Err(_) => failure = Some(BridgeError::TaskFailed("serial reader")),
        },
        _ = shutdown => {
            info!("shutdown requested");
            reader_task.abort();
        }
    }

    // Stop order follows the data: parser first, then the protocol core
    let _ = stop_tx.send(true);
    parse_task
        .await
        .map_err(|_| BridgeError::TaskFailed("I/O core"))?;
    let core_summary = tokio::task::spawn_blocking(move || core.stop())
        .await
        .map_err(|_| BridgeError::TaskFailed("protocol core"))??;

    if let Some(e) = failure {
        return Err(e);
    }

    let summary = PipelineSummary {
        bytes_read,
        ingress_dropped: ingress.dropped(),
        channel: stats.stats(),
        core: core_summary,
    };
    info!(?summary, "pipeline stopped");
    Ok(summary)
}
