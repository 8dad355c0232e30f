use qsa_db::SqlResultExt;
use qsa_interface::{
    ErrorCode, SerialInteger, SerialStatus, WorkflowError, WorkflowResult, SERIAL_MAX,
};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};

use crate::{Capacity, SerialRecord, SerialStore};

impl SerialStore {
    /// The next serial a reservation would hand out, without reserving.
    pub fn next_free(&self) -> WorkflowResult<SerialInteger> {
        let highest = self.highest_assigned()?;
        if highest >= SERIAL_MAX {
            return Err(WorkflowError::new(
                ErrorCode::SerialExhausted,
                "the 20-bit serial space is exhausted",
            ));
        }
        SerialInteger::new(highest + 1)
    }

    /// Highest serial integer ever assigned; 0 before the first one.
    pub fn highest_assigned(&self) -> WorkflowResult<u32> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT COALESCE(MAX(serial_integer), 0) FROM serials",
                [],
                |row| row.get(0),
            )
            .storage(ErrorCode::TransactionFailed)
        })
    }

    /// Reserved serials of (batch, row) that a commit would affect.
    pub fn count_committable(&self, batch_id: i64, qsa_sequence: u32) -> WorkflowResult<usize> {
        self.count_with_status(batch_id, qsa_sequence, SerialStatus::Reserved)
    }

    /// Serials of (batch, row) already in the engraved state.
    pub fn count_engraved(&self, batch_id: i64, qsa_sequence: u32) -> WorkflowResult<usize> {
        self.count_with_status(batch_id, qsa_sequence, SerialStatus::Engraved)
    }

    fn count_with_status(
        &self,
        batch_id: i64,
        qsa_sequence: u32,
        status: SerialStatus,
    ) -> WorkflowResult<usize> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM serials
                 WHERE batch_id = ?1 AND qsa_sequence = ?2 AND status = ?3",
                params![batch_id, qsa_sequence, status.as_str()],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| n as usize)
            .storage(ErrorCode::TransactionFailed)
        })
    }

    /// Capacity telemetry for the queue UI.
    pub fn capacity(&self) -> WorkflowResult<Capacity> {
        let highest = self.highest_assigned()?;
        let remaining = SERIAL_MAX - highest;
        Ok(Capacity {
            highest_assigned: highest,
            remaining,
            warning_threshold: self.thresholds.warning,
            critical_threshold: self.thresholds.critical,
            warning: remaining <= self.thresholds.warning,
            critical: remaining <= self.thresholds.critical,
        })
    }

    /// Looks up the full traceability record for one serial.
    pub fn find(&self, serial: SerialInteger) -> WorkflowResult<Option<SerialRecord>> {
        self.db.with_conn(|conn| {
            conn.query_row(
                &format!("{} WHERE serial_integer = ?1", SELECT_RECORD),
                params![serial.get()],
                record_from_row,
            )
            .optional()
            .storage(ErrorCode::TransactionFailed)
        })
    }

    /// The reserved serials of (batch, row), ordered by slot.
    pub fn reserved_for_row(
        &self,
        batch_id: i64,
        qsa_sequence: u32,
    ) -> WorkflowResult<Vec<SerialRecord>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "{} WHERE batch_id = ?1 AND qsa_sequence = ?2 AND status = 'reserved'
                     ORDER BY array_position",
                    SELECT_RECORD
                ))
                .storage(ErrorCode::TransactionFailed)?;
            let rows = stmt
                .query_map(params![batch_id, qsa_sequence], record_from_row)
                .storage(ErrorCode::TransactionFailed)?;
            rows.collect::<Result<Vec<_>, _>>()
                .storage(ErrorCode::TransactionFailed)
        })
    }
}

const SELECT_RECORD: &str = "SELECT serial_integer, batch_id, module_sku, qsa_sequence,
            array_position, status, created_by, created_at, engraved_at, voided_at
     FROM serials";

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<SerialRecord> {
    let serial = SerialInteger::new(row.get(0)?)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(e)))?;
    let status = row
        .get::<_, String>(5)?
        .parse::<SerialStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;
    Ok(SerialRecord {
        serial,
        batch_id: row.get(1)?,
        module_sku: row.get(2)?,
        qsa_sequence: row.get(3)?,
        array_position: row.get(4)?,
        status,
        created_by: row.get(6)?,
        created_at: row.get(7)?,
        engraved_at: row.get(8)?,
        voided_at: row.get(9)?,
    })
}
