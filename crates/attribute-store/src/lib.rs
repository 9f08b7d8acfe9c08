//! Burner Attribute Store
//!
//! Holds the smart-home view of the burner: flame on/off, fan level and
//! temperature. The protocol core applies each dequeued reading; any
//! thread can take a snapshot. Report targets and the TLV attribute report
//! live here too since both are driven by attribute changes.

mod error;
mod report;
mod snapshot;
mod store;
mod targets;

pub use error::{AttributeError, RegistryError};
pub use report::{
    cluster, decode_report, encode_report, ReportedAttribute, ReportedValue, ATTRIBUTE_ID,
    ENDPOINT,
};
pub use snapshot::{AttributeChanges, AttributeSnapshot, FAN_PCT_MAX, TEMP_C_MAX};
pub use store::{AttributeStore, Clock, ManualClock, MonotonicClock, SnapshotReader};
pub use targets::{ReportTarget, ReportTargets, TargetHandle, MAX_REPORT_TARGETS};
