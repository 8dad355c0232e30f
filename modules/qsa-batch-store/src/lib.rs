#![doc = include_str!("../README.md")]
#![deny(missing_docs)]

mod call;
mod query;
mod redistribute;

use chrono::{DateTime, Utc};
use qsa_db::EngraveDb;
use qsa_interface::{BatchStatus, RowStatus, SerialInteger};
use serde::{Deserialize, Serialize};

pub use call::{LinkedSerial, NewModule};
pub use redistribute::{CarrierAssignment, RedistributionResult};

/// One engraving batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRecord {
    /// Primary key.
    pub id: i64,
    /// Operator-facing name.
    pub name: String,
    /// Total modules across all rows.
    pub module_count: u32,
    /// Physical carriers in the batch.
    pub row_count: u32,
    /// Batch lifecycle state.
    pub status: BatchStatus,
    /// Operator that created the batch.
    pub created_by: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Completion time, while completed.
    pub completed_at: Option<DateTime<Utc>>,
}

/// One physical module inside a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    /// Primary key.
    pub id: i64,
    /// Owning batch.
    pub batch_id: i64,
    /// Source production batch in the host catalog.
    pub production_batch_id: i64,
    /// Module SKU string.
    pub module_sku: String,
    /// Host order the module belongs to.
    pub order_id: i64,
    /// Serial linked at reservation time, if any.
    pub serial_number: Option<SerialInteger>,
    /// Current physical carrier sequence.
    pub qsa_sequence: u32,
    /// Logical row the module belongs to; never rewritten.
    pub original_qsa_sequence: u32,
    /// Slot on the current carrier, 1-8.
    pub array_position: u8,
    /// Row lifecycle state, shared across the logical row.
    pub row_status: RowStatus,
    /// LED component codes captured from the host catalog at creation.
    pub led_codes: Vec<String>,
    /// Engraving time, once done.
    pub engraved_at: Option<DateTime<Utc>>,
}

/// Queue summary of one logical row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSummary {
    /// Logical row identifier.
    pub original_qsa_sequence: u32,
    /// Shared row status.
    pub row_status: RowStatus,
    /// Modules in the row.
    pub module_count: usize,
    /// Physical carriers currently holding the row, ascending.
    pub carrier_sequences: Vec<u32>,
}

/// The batch/module store (sole writer of the batches and batch_modules
/// relations).
#[derive(Debug, Clone)]
pub struct BatchStore {
    db: EngraveDb,
}

impl BatchStore {
    /// Creates a store over `db`.
    pub fn new(db: EngraveDb) -> Self {
        Self { db }
    }
}
