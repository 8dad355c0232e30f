use std::net::IpAddr;

use chrono::{DateTime, Utc};
use qsa_interface::{SerialInteger, SerialStatus, WorkflowError, WorkflowResult};
use serde::{Deserialize, Serialize};

use crate::{Caller, Workflow};

/// What the public landing page may show about a serial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialSummary {
    /// The serial's wire form.
    pub serial: String,
    /// Lifecycle state.
    pub status: SerialStatus,
    /// SKU of the module it was engraved onto.
    pub module_sku: String,
    /// Engraving time, once committed.
    pub engraved_at: Option<DateTime<Utc>>,
}

/// The full traceability record for staff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialDetails {
    /// The public summary.
    pub summary: SerialSummary,
    /// Engraving batch the serial belongs to.
    pub batch_id: i64,
    /// Logical carrier row.
    pub qsa_sequence: u32,
    /// Slot on the carrier.
    pub array_position: u8,
    /// Operator that reserved it.
    pub created_by: String,
    /// Reservation time.
    pub created_at: DateTime<Utc>,
    /// Void time, if voided.
    pub voided_at: Option<DateTime<Utc>>,
    /// The row's QSA identifier, if one was issued.
    pub qsa_id: Option<String>,
    /// Host order of the engraved module, if the serial is linked.
    pub order_id: Option<i64>,
    /// Source production batch of the module, if linked.
    pub production_batch_id: Option<i64>,
}

impl Workflow {
    /// Public serial lookup, rate-limited per source address. Returns
    /// `None` for unknown serials (the landing page shows a generic
    /// not-found).
    pub fn serial_lookup(
        &self,
        source: IpAddr,
        serial: &str,
    ) -> WorkflowResult<Option<SerialSummary>> {
        self.lookup_limiter.check(source)?;
        let serial: SerialInteger = serial.parse()?;
        let record = match self.serials.find(serial)? {
            Some(record) => record,
            None => return Ok(None),
        };
        Ok(Some(SerialSummary {
            serial: record.serial.padded(),
            status: record.status,
            module_sku: record.module_sku,
            engraved_at: record.engraved_at,
        }))
    }

    /// Full traceability record, staff only.
    pub fn serial_details(
        &self,
        caller: &Caller,
        serial: &str,
    ) -> WorkflowResult<SerialDetails> {
        caller.require_staff()?;
        let serial: SerialInteger = serial.parse()?;
        let record = self
            .serials
            .find(serial)?
            .ok_or_else(|| WorkflowError::not_found(format!("serial {} does not exist", serial)))?;

        let module = self.batches.module_by_serial(serial)?;
        let qsa_id = self
            .identifiers
            .find(record.batch_id, record.qsa_sequence)?
            .map(|id| id.to_string());

        Ok(SerialDetails {
            summary: SerialSummary {
                serial: record.serial.padded(),
                status: record.status,
                module_sku: record.module_sku.clone(),
                engraved_at: record.engraved_at,
            },
            batch_id: record.batch_id,
            qsa_sequence: record.qsa_sequence,
            array_position: record.array_position,
            created_by: record.created_by,
            created_at: record.created_at,
            voided_at: record.voided_at,
            qsa_id,
            order_id: module.as_ref().map(|m| m.order_id),
            production_batch_id: module.as_ref().map(|m| m.production_batch_id),
        })
    }
}
