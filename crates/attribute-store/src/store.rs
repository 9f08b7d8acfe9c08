//! Attribute Store Implementation

use crate::error::{AttributeError, RegistryError};
use crate::snapshot::{AttributeChanges, AttributeSnapshot};
use crate::targets::{ReportTargets, TargetHandle};
use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use viking_protocol::SensorReading;

/// Millisecond monotonic time source
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Milliseconds since construction
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Hand-driven clock for tests and simulations
#[derive(Debug, Default)]
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self(AtomicU64::new(start_ms))
    }

    pub fn set(&self, ms: u64) {
        self.0.store(ms, Ordering::Relaxed);
    }

    pub fn advance(&self, ms: u64) {
        self.0.fetch_add(ms, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// Attribute state owned by the protocol core.
///
/// Readers do not synchronize with `apply`. A reader racing an apply gets
/// either the old or the new snapshot, never a blend, but may lag the
/// writer by one update. Reporting tolerates that lag and in exchange
/// neither side ever waits on the other.
pub struct AttributeStore {
    current: Arc<ArcSwap<AttributeSnapshot>>,
    targets: ReportTargets,
    clock: Box<dyn Clock>,
    /// Set once the stale rule cleared the attributes
    stale: bool,
}

impl AttributeStore {
    /// Store using the process monotonic clock
    pub fn new() -> Self {
        Self::with_clock(MonotonicClock::new())
    }

    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        let initial = AttributeSnapshot {
            last_update_time_ms: clock.now_ms(),
            ..AttributeSnapshot::default()
        };
        Self {
            current: Arc::new(ArcSwap::from_pointee(initial)),
            targets: ReportTargets::new(),
            clock: Box::new(clock),
            stale: false,
        }
    }

    /// Overwrite all attributes from `reading` and stamp the update time.
    ///
    /// Invalid readings are refused and leave the snapshot untouched.
    pub fn apply(&mut self, reading: &SensorReading) -> Result<AttributeChanges, AttributeError> {
        if !reading.valid {
            return Err(AttributeError::InvalidReading);
        }
        if self.stale {
            info!("burner data resumed");
            self.stale = false;
        }
        Ok(self.store(reading))
    }

    /// Clear attributes once when no reading arrived for `timeout_ms`.
    ///
    /// Returns the resulting changes the first time the timeout is
    /// crossed and `None` otherwise.
    pub fn expire_if_stale(&mut self, timeout_ms: u64) -> Option<AttributeChanges> {
        if self.stale {
            return None;
        }
        let age = self
            .clock
            .now_ms()
            .saturating_sub(self.current.load().last_update_time_ms);
        if age < timeout_ms {
            return None;
        }

        warn!(age_ms = age, "no burner data, clearing attributes");
        self.stale = true;
        Some(self.store(&SensorReading::cleared()))
    }

    /// Whether the stale rule is in effect
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    fn store(&mut self, reading: &SensorReading) -> AttributeChanges {
        let previous = **self.current.load();
        let mut next =
            AttributeSnapshot::promote(reading, self.clock.now_ms(), previous.data_version);
        let changes = next.changes_since(&previous);
        if !changes.is_empty() {
            next.data_version = previous.data_version.wrapping_add(1);
            debug!(
                flame = next.flame_state,
                fan = next.fan_speed_pct,
                temp = next.temperature_c,
                version = next.data_version,
                "attributes updated"
            );
        }
        self.current.store(Arc::new(next));
        self.targets.note_changes(changes);
        changes
    }

    /// Copy of the current attributes
    pub fn snapshot(&self) -> AttributeSnapshot {
        **self.current.load()
    }

    /// Cloneable snapshot handle for other threads
    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader {
            current: Arc::clone(&self.current),
        }
    }

    /// Register a destination for attribute reports
    pub fn add_report_target(
        &mut self,
        address: &str,
        port: u16,
    ) -> Result<TargetHandle, RegistryError> {
        self.targets.add(address, port)
    }

    pub fn remove_report_target(&mut self, handle: TargetHandle) -> bool {
        self.targets.remove(handle)
    }

    pub fn targets(&self) -> &ReportTargets {
        &self.targets
    }

    pub fn targets_mut(&mut self) -> &mut ReportTargets {
        &mut self.targets
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }
}

impl Default for AttributeStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Read side of the store
#[derive(Clone)]
pub struct SnapshotReader {
    current: Arc<ArcSwap<AttributeSnapshot>>,
}

impl SnapshotReader {
    pub fn snapshot(&self) -> AttributeSnapshot {
        **self.current.load()
    }
}
