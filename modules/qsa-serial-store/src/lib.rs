#![doc = include_str!("../README.md")]
#![deny(missing_docs)]

mod call;
mod query;
#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use qsa_db::EngraveDb;
use qsa_interface::{SerialInteger, SerialStatus};
use serde::{Deserialize, Serialize};

/// Default remaining-capacity level that raises the warning flag.
pub const DEFAULT_WARNING_THRESHOLD: u32 = 10_000;
/// Default remaining-capacity level that raises the critical flag.
pub const DEFAULT_CRITICAL_THRESHOLD: u32 = 1_000;

/// Remaining-capacity levels at which telemetry raises its flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityThresholds {
    /// Remaining serials at or below which `warning` is set.
    pub warning: u32,
    /// Remaining serials at or below which `critical` is set.
    pub critical: u32,
}

impl Default for CapacityThresholds {
    fn default() -> Self {
        Self {
            warning: DEFAULT_WARNING_THRESHOLD,
            critical: DEFAULT_CRITICAL_THRESHOLD,
        }
    }
}

/// Capacity telemetry for the 20-bit code space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capacity {
    /// Highest serial integer ever assigned (0 before first reservation).
    pub highest_assigned: u32,
    /// Serials left before exhaustion.
    pub remaining: u32,
    /// Configured warning threshold.
    pub warning_threshold: u32,
    /// Configured critical threshold.
    pub critical_threshold: u32,
    /// Remaining is at or below the warning threshold.
    pub warning: bool,
    /// Remaining is at or below the critical threshold.
    pub critical: bool,
}

/// One module slot a reservation covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSlot {
    /// The module's SKU string.
    pub module_sku: String,
    /// Slot within the carrier, 1-8.
    pub array_position: u8,
}

/// A serial handed out by [`SerialStore::reserve`], still uncommitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservedSerial {
    /// The allocated serial.
    pub serial: SerialInteger,
    /// The slot it was allocated for.
    pub slot: ModuleSlot,
}

/// Full traceability record for one serial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialRecord {
    /// The serial itself.
    pub serial: SerialInteger,
    /// Engraving batch the serial belongs to.
    pub batch_id: i64,
    /// Module SKU engraved alongside it.
    pub module_sku: String,
    /// Logical carrier row it was reserved for.
    pub qsa_sequence: u32,
    /// Carrier slot, 1-8.
    pub array_position: u8,
    /// Lifecycle state.
    pub status: SerialStatus,
    /// Operator that reserved it.
    pub created_by: String,
    /// Reservation time.
    pub created_at: DateTime<Utc>,
    /// Commit time, if engraved.
    pub engraved_at: Option<DateTime<Utc>>,
    /// Void time, if voided.
    pub voided_at: Option<DateTime<Utc>>,
}

/// The serial allocation engine (sole writer of the serials relation).
#[derive(Debug, Clone)]
pub struct SerialStore {
    db: EngraveDb,
    thresholds: CapacityThresholds,
}

impl SerialStore {
    /// Creates a store over `db` with the given telemetry thresholds.
    pub fn new(db: EngraveDb, thresholds: CapacityThresholds) -> Self {
        Self { db, thresholds }
    }
}
