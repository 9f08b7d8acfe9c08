//! Protocol core
//!
//! Dedicated thread that owns the attribute store. Each pass drains the
//! cross-core queue, applies readings in arrival order, runs the stale
//! rule and sends reports to targets that are due. When there is nothing
//! to do it parks until signaled or the idle poll elapses.

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::transport::ReportSink;
use attribute_store::{encode_report, AttributeSnapshot, AttributeStore, ReportTarget};
use cross_core::ReadingReceiver;
use metrics::counter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tlv_codec::TlvWriter;
use tracing::{debug, info, warn};
use viking_protocol::SensorReading;

/// Largest encoded report; three attributes need well under half
pub const REPORT_BUFFER_LEN: usize = 256;

/// Loop timing and reporting policy
#[derive(Debug, Clone, Copy)]
pub struct CoreSettings {
    pub idle_poll: Duration,
    pub stale_timeout_ms: u64,
    pub report_interval_ms: u64,
}

impl From<&BridgeConfig> for CoreSettings {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            idle_poll: Duration::from_micros(config.idle_poll_us),
            stale_timeout_ms: config.stale_timeout_ms,
            report_interval_ms: config.report.interval_ms,
        }
    }
}

/// What the core did before it stopped
#[derive(Debug, Clone, Copy, Default)]
pub struct CoreSummary {
    pub readings_applied: u64,
    pub reports_sent: u64,
    pub report_failures: u64,
    /// Readings that carried a burner error code
    pub burner_faults: u64,
    pub final_snapshot: AttributeSnapshot,
}

pub struct ProtocolCore<S> {
    receiver: ReadingReceiver,
    store: AttributeStore,
    sink: S,
    settings: CoreSettings,
    report_buf: [u8; REPORT_BUFFER_LEN],
    summary: CoreSummary,
    last_error_code: u8,
}

impl<S: ReportSink + 'static> ProtocolCore<S> {
    pub fn new(
        receiver: ReadingReceiver,
        store: AttributeStore,
        sink: S,
        settings: CoreSettings,
    ) -> Self {
        Self {
            receiver,
            store,
            sink,
            settings,
            report_buf: [0; REPORT_BUFFER_LEN],
            summary: CoreSummary::default(),
            last_error_code: 0,
        }
    }

    /// Start the loop on its own thread
    pub fn spawn(self) -> Result<CoreHandle, BridgeError> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name("protocol-core".into())
            .spawn(move || self.run(&flag))?;
        Ok(CoreHandle { stop, thread })
    }

    fn run(mut self, stop: &AtomicBool) -> CoreSummary {
        self.receiver.bind_current_thread();
        info!(settings = ?self.settings, "protocol core started");

        while !stop.load(Ordering::Acquire) {
            if self.poll_once() == 0 {
                self.receiver.wait(self.settings.idle_poll);
            }
        }
        // Readings sent before the stop request
        self.poll_once();

        self.summary.final_snapshot = self.store.snapshot();
        info!(
            applied = self.summary.readings_applied,
            reports = self.summary.reports_sent,
            "protocol core stopped"
        );
        self.summary
    }

    /// One pass of the loop; returns the number of readings applied
    pub fn poll_once(&mut self) -> usize {
        let mut applied = 0;
        while let Some(reading) = self.receiver.try_receive() {
            self.note_fault(&reading);
            match self.store.apply(&reading) {
                Ok(changes) => {
                    applied += 1;
                    if !changes.is_empty() {
                        debug!(?changes, "attributes changed");
                    }
                }
                Err(e) => debug!(error = %e, "reading not applied"),
            }
        }
        self.summary.readings_applied += applied as u64;

        self.store.expire_if_stale(self.settings.stale_timeout_ms);
        self.deliver_reports();
        applied
    }

    /// Burner error codes are not attributes; they are logged on change
    fn note_fault(&mut self, reading: &SensorReading) {
        if !reading.valid {
            return;
        }
        if reading.has_error() {
            self.summary.burner_faults += 1;
            counter!("bridge_burner_faults").increment(1);
            if reading.error_code != self.last_error_code {
                warn!(code = reading.error_code, "burner reports fault");
            }
        } else if self.last_error_code != 0 {
            info!(previous = self.last_error_code, "burner fault cleared");
        }
        self.last_error_code = reading.error_code;
    }

    fn deliver_reports(&mut self) {
        let now = self.store.now_ms();
        let due: Vec<ReportTarget> = self
            .store
            .targets()
            .due_targets(now, self.settings.report_interval_ms)
            .collect();
        if due.is_empty() {
            return;
        }

        let snapshot = self.store.snapshot();
        for target in due {
            let mut writer = TlvWriter::new(&mut self.report_buf);
            let payload = match encode_report(&snapshot, target.pending, &mut writer)
                .and_then(|()| writer.finish())
            {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(error = %e, "failed to encode attribute report");
                    self.summary.report_failures += 1;
                    continue;
                }
            };

            match self.sink.send_report(target.addr, payload) {
                Ok(()) => {
                    self.store.targets_mut().mark_reported(target.handle, now);
                    self.receiver.record_messages(1);
                    self.summary.reports_sent += 1;
                    counter!("bridge_reports_sent").increment(1);
                }
                Err(e) => {
                    // Changes stay pending and go out on the next pass
                    warn!(target = %target.addr, error = %e, "report delivery failed");
                    self.summary.report_failures += 1;
                    counter!("bridge_report_failures").increment(1);
                }
            }
        }
    }

    pub fn store(&self) -> &AttributeStore {
        &self.store
    }
}

/// Running protocol core
pub struct CoreHandle {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<CoreSummary>,
}

impl CoreHandle {
    /// Ask the loop to finish its last pass and wait for it
    pub fn stop(self) -> Result<CoreSummary, BridgeError> {
        self.stop.store(true, Ordering::Release);
        self.thread.thread().unpark();
        self.thread
            .join()
            .map_err(|_| BridgeError::TaskFailed("protocol core"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemorySink;
    use attribute_store::{decode_report, ManualClock, ReportedValue};

    fn settings() -> CoreSettings {
        CoreSettings {
            idle_poll: Duration::from_micros(100),
            stale_timeout_ms: 30_000,
            report_interval_ms: 0,
        }
    }

    fn reading(flame: bool, fan: u8, temp: i16) -> SensorReading {
        SensorReading {
            flame_detected: flame,
            fan_speed: fan,
            temperature: temp,
            error_code: 0,
            valid: true,
        }
    }

    #[test]
    fn test_poll_applies_and_reports() {
        let (mut tx, rx) = cross_core::channel();
        let mut store = AttributeStore::with_clock(ManualClock::new(0));
        store.add_report_target("127.0.0.1", 5540).unwrap();
        let sink = MemorySink::new();
        let mut core = ProtocolCore::new(rx, store, sink.clone(), settings());

        tx.send(reading(true, 80, 75)).unwrap();
        tx.send(reading(true, 90, 75)).unwrap();
        assert_eq!(core.poll_once(), 2);

        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(core.receiver.stats().messages_processed, 1);
        let entries = decode_report(&reports[0].payload).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].value, ReportedValue::Level(90));

        // Same values again: nothing to report
        tx.send(reading(true, 90, 75)).unwrap();
        core.poll_once();
        assert_eq!(sink.reports().len(), 1);
    }

    #[test]
    fn test_stale_rule_reports_cleared_values() {
        let clock = Arc::new(ManualClock::new(0));
        let (mut tx, rx) = cross_core::channel();
        let mut store = AttributeStore::with_clock(Arc::clone(&clock));
        store.add_report_target("127.0.0.1", 5540).unwrap();
        let sink = MemorySink::new();
        let mut core = ProtocolCore::new(rx, store, sink.clone(), settings());

        tx.send(reading(true, 50, 120)).unwrap();
        core.poll_once();
        clock.advance(30_000);
        core.poll_once();

        assert!(core.store().is_stale());
        let reports = sink.reports();
        assert_eq!(reports.len(), 2);
        let entries = decode_report(&reports[1].payload).unwrap();
        assert_eq!(entries[0].value, ReportedValue::OnOff(false));
        assert_eq!(entries[1].value, ReportedValue::Level(0));
        assert_eq!(entries[2].value, ReportedValue::Centidegrees(0));
    }

    #[test]
    fn test_burner_faults_counted() {
        let (mut tx, rx) = cross_core::channel();
        let mut core = ProtocolCore::new(rx, AttributeStore::new(), MemorySink::new(), settings());

        tx.send(SensorReading {
            error_code: 5,
            ..reading(true, 40, 90)
        })
        .unwrap();
        tx.send(SensorReading {
            error_code: 5,
            ..reading(true, 40, 90)
        })
        .unwrap();
        tx.send(reading(true, 40, 90)).unwrap();
        core.poll_once();

        assert_eq!(core.summary.burner_faults, 2);
        assert_eq!(core.last_error_code, 0);
        // Faults do not block attribute updates
        assert_eq!(core.store().snapshot().fan_speed_pct, 40);
    }

    #[test]
    fn test_thread_drains_before_exit() {
        let (mut tx, rx) = cross_core::channel();
        let core = ProtocolCore::new(rx, AttributeStore::new(), MemorySink::new(), settings());
        let handle = core.spawn().unwrap();

        tx.send(reading(true, 42, 99)).unwrap();
        tx.signal_consumer();

        let summary = handle.stop().unwrap();
        assert_eq!(summary.readings_applied, 1);
        assert_eq!(summary.final_snapshot.fan_speed_pct, 42);
    }
}
