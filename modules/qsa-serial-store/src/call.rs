use chrono::Utc;
use qsa_db::SqlResultExt;
use qsa_interface::{ErrorCode, SerialInteger, WorkflowError, WorkflowResult, SERIAL_MAX};
use rusqlite::params;

use crate::{ModuleSlot, ReservedSerial, SerialStore};

impl SerialStore {
    /// Reserves one serial per module of (batch, row), all-or-nothing.
    ///
    /// Runs inside one immediate transaction: the write lock is taken
    /// before `max(serial_integer)` is read, so concurrent reservers
    /// serialize and each caller's allocation stays contiguous.
    pub fn reserve(
        &self,
        batch_id: i64,
        qsa_sequence: u32,
        modules: &[ModuleSlot],
        created_by: &str,
    ) -> WorkflowResult<Vec<ReservedSerial>> {
        if modules.is_empty() {
            return Err(WorkflowError::validation(
                ErrorCode::NoModules,
                "a reservation must cover at least one module",
            ));
        }
        let count = modules.len() as u32;

        self.db.with_tx(|tx| {
            let highest: u32 = tx
                .query_row(
                    "SELECT COALESCE(MAX(serial_integer), 0) FROM serials",
                    [],
                    |row| row.get(0),
                )
                .storage(ErrorCode::TransactionFailed)?;

            let start = highest + 1;
            if start > SERIAL_MAX {
                return Err(WorkflowError::new(
                    ErrorCode::SerialExhausted,
                    "the 20-bit serial space is exhausted",
                ));
            }
            if start + count - 1 > SERIAL_MAX {
                return Err(WorkflowError::new(
                    ErrorCode::InsufficientCapacity,
                    format!(
                        "{} serials requested but only {} remain",
                        count,
                        SERIAL_MAX - highest
                    ),
                ));
            }

            let now = Utc::now();
            let mut stmt = tx
                .prepare(
                    "INSERT INTO serials
                         (serial_integer, batch_id, module_sku, qsa_sequence,
                          array_position, status, created_by, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, 'reserved', ?6, ?7)",
                )
                .storage(ErrorCode::InsertFailed)?;

            let mut reserved = Vec::with_capacity(modules.len());
            for (offset, slot) in modules.iter().enumerate() {
                let serial = SerialInteger::new(start + offset as u32)?;
                stmt.execute(params![
                    serial.get(),
                    batch_id,
                    slot.module_sku,
                    qsa_sequence,
                    slot.array_position,
                    created_by,
                    now,
                ])
                .storage(ErrorCode::InsertFailed)?;
                reserved.push(ReservedSerial {
                    serial,
                    slot: slot.clone(),
                });
            }

            tracing::info!(
                batch_id,
                qsa_sequence,
                first = start,
                count,
                "reserved serial range"
            );
            Ok(reserved)
        })
    }

    /// Commits every reserved serial of (batch, row) to its terminal
    /// engraved state. Returns the number of rows affected; rows already
    /// terminal are untouched.
    pub fn commit(&self, batch_id: i64, qsa_sequence: u32) -> WorkflowResult<usize> {
        let affected = self.db.with_tx(|tx| {
            tx.execute(
                "UPDATE serials SET status = 'engraved', engraved_at = ?1
                 WHERE batch_id = ?2 AND qsa_sequence = ?3 AND status = 'reserved'",
                params![Utc::now(), batch_id, qsa_sequence],
            )
            .storage(ErrorCode::UpdateFailed)
        })?;
        tracing::info!(batch_id, qsa_sequence, affected, "committed serials");
        Ok(affected)
    }

    /// Voids every reserved serial of (batch, row). Terminal; the
    /// integers are burned and never reissued.
    pub fn void(&self, batch_id: i64, qsa_sequence: u32) -> WorkflowResult<usize> {
        let affected = self.db.with_tx(|tx| {
            tx.execute(
                "UPDATE serials SET status = 'voided', voided_at = ?1
                 WHERE batch_id = ?2 AND qsa_sequence = ?3 AND status = 'reserved'",
                params![Utc::now(), batch_id, qsa_sequence],
            )
            .storage(ErrorCode::UpdateFailed)
        })?;
        tracing::info!(batch_id, qsa_sequence, affected, "voided serials");
        Ok(affected)
    }
}
