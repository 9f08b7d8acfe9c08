//! Report Target Registry
//!
//! Fixed-size table of controllers that receive attribute reports. Each
//! target accumulates the attributes that changed since it was last
//! reported to, so throttled targets still get every change eventually.

use crate::error::RegistryError;
use crate::snapshot::AttributeChanges;
use heapless::Vec;
use std::net::{Ipv4Addr, SocketAddrV4};
use tracing::{debug, info};

/// Registry capacity
pub const MAX_REPORT_TARGETS: usize = 4;

/// Opaque id returned on registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetHandle(u32);

/// A registered report destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportTarget {
    pub handle: TargetHandle,
    pub addr: SocketAddrV4,
    /// When the last report went out
    pub last_report_ms: Option<u64>,
    /// Attributes changed since the last report
    pub pending: AttributeChanges,
}

impl ReportTarget {
    fn is_due(&self, now_ms: u64, interval_ms: u64) -> bool {
        if self.pending.is_empty() {
            return false;
        }
        match self.last_report_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= interval_ms,
        }
    }
}

#[derive(Debug, Default)]
pub struct ReportTargets {
    targets: Vec<ReportTarget, MAX_REPORT_TARGETS>,
    next_id: u32,
}

impl ReportTargets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `address:port`. Re-registering a known destination returns
    /// its existing handle.
    pub fn add(&mut self, address: &str, port: u16) -> Result<TargetHandle, RegistryError> {
        if port == 0 {
            return Err(RegistryError::InvalidPort);
        }
        let ip: Ipv4Addr = address
            .trim()
            .parse()
            .map_err(|_| RegistryError::InvalidAddress(address.to_string()))?;
        let addr = SocketAddrV4::new(ip, port);

        if let Some(existing) = self.targets.iter().find(|t| t.addr == addr) {
            debug!(%addr, "report target already registered");
            return Ok(existing.handle);
        }

        let handle = TargetHandle(self.next_id);
        self.targets
            .push(ReportTarget {
                handle,
                addr,
                last_report_ms: None,
                pending: AttributeChanges::NONE,
            })
            .map_err(|_| RegistryError::Full {
                max: MAX_REPORT_TARGETS,
            })?;
        self.next_id = self.next_id.wrapping_add(1);

        info!(%addr, "report target registered");
        Ok(handle)
    }

    /// Unregister; returns whether the handle was known
    pub fn remove(&mut self, handle: TargetHandle) -> bool {
        match self.targets.iter().position(|t| t.handle == handle) {
            Some(index) => {
                let target = self.targets.swap_remove(index);
                info!(addr = %target.addr, "report target removed");
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReportTarget> {
        self.targets.iter()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Record `changes` against every target
    pub fn note_changes(&mut self, changes: AttributeChanges) {
        if changes.is_empty() {
            return;
        }
        for target in self.targets.iter_mut() {
            target.pending = target.pending.merge(changes);
        }
    }

    /// Targets with pending changes whose interval has elapsed
    pub fn due_targets(
        &self,
        now_ms: u64,
        interval_ms: u64,
    ) -> impl Iterator<Item = ReportTarget> + '_ {
        self.targets
            .iter()
            .filter(move |t| t.is_due(now_ms, interval_ms))
            .copied()
    }

    /// Clear pending changes after a successful report
    pub fn mark_reported(&mut self, handle: TargetHandle, now_ms: u64) {
        if let Some(target) = self.targets.iter_mut().find(|t| t.handle == handle) {
            target.last_report_ms = Some(now_ms);
            target.pending = AttributeChanges::NONE;
        }
    }
}
