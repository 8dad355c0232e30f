use chrono::Utc;
use qsa_db::SqlResultExt;
use qsa_interface::{
    BatchStatus, ErrorCode, RowStatus, SerialInteger, WorkflowError, WorkflowResult,
};
use rusqlite::{params, Transaction};

use crate::BatchStore;

/// Inputs for one module insert at batch creation.
#[derive(Debug, Clone)]
pub struct NewModule {
    /// Source production batch in the host catalog.
    pub production_batch_id: i64,
    /// Module SKU string.
    pub module_sku: String,
    /// Host order the module belongs to.
    pub order_id: i64,
    /// Physical carrier the module starts on.
    pub qsa_sequence: u32,
    /// Logical row the module belongs to.
    pub original_qsa_sequence: u32,
    /// Slot on the carrier, 1-8.
    pub array_position: u8,
    /// LED component codes from the host catalog.
    pub led_codes: Vec<String>,
}

/// One serial-to-slot link produced by a reservation.
#[derive(Debug, Clone, Copy)]
pub struct LinkedSerial {
    /// Physical carrier the target module sits on.
    pub qsa_sequence: u32,
    /// Slot on that carrier.
    pub array_position: u8,
    /// The serial to write onto the module.
    pub serial: SerialInteger,
}

impl BatchStore {
    /// Creates an empty batch and returns its id.
    pub fn create_batch(&self, name: Option<String>, created_by: &str) -> WorkflowResult<i64> {
        let now = Utc::now();
        let name =
            name.unwrap_or_else(|| format!("Engraving {}", now.format("%Y-%m-%d %H:%M")));
        self.db.with_tx(|tx| {
            tx.execute(
                "INSERT INTO batches (name, status, created_by, created_at)
                 VALUES (?1, 'in_progress', ?2, ?3)",
                params![name, created_by, now],
            )
            .storage(ErrorCode::InsertFailed)?;
            Ok(tx.last_insert_rowid())
        })
    }

    /// Adds one module to a batch. Counts are refreshed separately once
    /// the whole selection is inserted.
    pub fn add_module(&self, batch_id: i64, module: &NewModule) -> WorkflowResult<i64> {
        if module.array_position == 0 || module.array_position > 8 {
            return Err(WorkflowError::validation(
                ErrorCode::InvalidPosition,
                format!("array position {} outside [1, 8]", module.array_position),
            ));
        }
        let led_codes = serde_json::to_string(&module.led_codes)
            .map_err(|e| WorkflowError::internal(format!("led codes encode: {}", e)))?;
        self.db.with_tx(|tx| {
            tx.execute(
                "INSERT INTO batch_modules
                     (batch_id, production_batch_id, module_sku, order_id,
                      qsa_sequence, original_qsa_sequence, array_position, row_status, led_codes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', ?8)",
                params![
                    batch_id,
                    module.production_batch_id,
                    module.module_sku,
                    module.order_id,
                    module.qsa_sequence,
                    module.original_qsa_sequence,
                    module.array_position,
                    led_codes,
                ],
            )
            .storage(ErrorCode::InsertFailed)?;
            Ok(tx.last_insert_rowid())
        })
    }

    /// Recomputes a batch's module and carrier counts from its modules.
    pub fn refresh_counts(&self, batch_id: i64) -> WorkflowResult<()> {
        self.db.with_tx(|tx| {
            tx.execute(
                "UPDATE batches SET
                     module_count = (SELECT COUNT(*) FROM batch_modules WHERE batch_id = ?1),
                     row_count = (SELECT COUNT(DISTINCT qsa_sequence)
                                  FROM batch_modules WHERE batch_id = ?1)
                 WHERE id = ?1",
                params![batch_id],
            )
            .storage(ErrorCode::UpdateFailed)?;
            Ok(())
        })
    }

    /// Transitions every module of a logical row to `new_status`,
    /// enforcing the row state machine.
    pub fn update_row_status(
        &self,
        batch_id: i64,
        qsa_sequence: u32,
        new_status: RowStatus,
    ) -> WorkflowResult<usize> {
        self.db.with_tx(|tx| {
            let current = row_status_tx(tx, batch_id, qsa_sequence)?;
            if !current.can_transition_to(new_status) {
                return Err(WorkflowError::new(
                    ErrorCode::InvalidRowStatus,
                    format!(
                        "row {} of batch {} is {}, cannot become {}",
                        qsa_sequence, batch_id, current, new_status
                    ),
                ));
            }
            let affected = tx
                .execute(
                    "UPDATE batch_modules SET row_status = ?1
                     WHERE batch_id = ?2 AND original_qsa_sequence = ?3",
                    params![new_status.as_str(), batch_id, qsa_sequence],
                )
                .storage(ErrorCode::UpdateFailed)?;
            tracing::info!(batch_id, qsa_sequence, from = %current, to = %new_status, "row transition");
            Ok(affected)
        })
    }

    /// Completes a row: in_progress → done, stamping `engraved_at`.
    pub fn mark_row_done(&self, batch_id: i64, qsa_sequence: u32) -> WorkflowResult<usize> {
        self.db.with_tx(|tx| {
            let current = row_status_tx(tx, batch_id, qsa_sequence)?;
            if current != RowStatus::InProgress {
                return Err(WorkflowError::new(
                    ErrorCode::InvalidRowStatus,
                    format!(
                        "row {} of batch {} is {}, only in_progress rows complete",
                        qsa_sequence, batch_id, current
                    ),
                ));
            }
            tx.execute(
                "UPDATE batch_modules SET row_status = 'done', engraved_at = ?1
                 WHERE batch_id = ?2 AND original_qsa_sequence = ?3",
                params![Utc::now(), batch_id, qsa_sequence],
            )
            .storage(ErrorCode::UpdateFailed)
        })
    }

    /// Sends a row back to pending (retry and rerun paths), clearing the
    /// linked serials and the engraving stamp.
    pub fn reset_row_status(&self, batch_id: i64, qsa_sequence: u32) -> WorkflowResult<usize> {
        self.db.with_tx(|tx| {
            let current = row_status_tx(tx, batch_id, qsa_sequence)?;
            if !current.can_transition_to(RowStatus::Pending) {
                return Err(WorkflowError::new(
                    ErrorCode::InvalidRowStatus,
                    format!(
                        "row {} of batch {} is {}, cannot reset",
                        qsa_sequence, batch_id, current
                    ),
                ));
            }
            tx.execute(
                "UPDATE batch_modules
                 SET row_status = 'pending', serial_number = NULL, engraved_at = NULL
                 WHERE batch_id = ?1 AND original_qsa_sequence = ?2",
                params![batch_id, qsa_sequence],
            )
            .storage(ErrorCode::UpdateFailed)
        })
    }

    /// Writes reserved serials onto the row's modules, matched by
    /// (carrier, slot). Fails if any link misses its module.
    pub fn link_serials_to_modules(
        &self,
        batch_id: i64,
        qsa_sequence: u32,
        serials: &[LinkedSerial],
    ) -> WorkflowResult<()> {
        self.db.with_tx(|tx| {
            for link in serials {
                let affected = tx
                    .execute(
                        "UPDATE batch_modules SET serial_number = ?1
                         WHERE batch_id = ?2 AND original_qsa_sequence = ?3
                           AND qsa_sequence = ?4 AND array_position = ?5",
                        params![
                            link.serial.padded(),
                            batch_id,
                            qsa_sequence,
                            link.qsa_sequence,
                            link.array_position,
                        ],
                    )
                    .storage(ErrorCode::UpdateFailed)?;
                if affected != 1 {
                    return Err(WorkflowError::new(
                        ErrorCode::UpdateFailed,
                        format!(
                            "no module at carrier {} slot {} of row {} to link serial {}",
                            link.qsa_sequence, link.array_position, qsa_sequence, link.serial
                        ),
                    ));
                }
            }
            Ok(())
        })
    }

    /// Marks a batch completed once every module row is done.
    pub fn complete_batch(&self, batch_id: i64) -> WorkflowResult<()> {
        self.db.with_tx(|tx| {
            let open: i64 = tx
                .query_row(
                    "SELECT COUNT(*) FROM batch_modules
                     WHERE batch_id = ?1 AND row_status != 'done'",
                    params![batch_id],
                    |row| row.get(0),
                )
                .storage(ErrorCode::TransactionFailed)?;
            if open > 0 {
                return Err(WorkflowError::new(
                    ErrorCode::BatchNotCompleted,
                    format!("batch {} still has {} unfinished modules", batch_id, open),
                ));
            }
            let affected = tx
                .execute(
                    "UPDATE batches SET status = 'completed', completed_at = ?1
                     WHERE id = ?2 AND status = ?3",
                    params![Utc::now(), batch_id, BatchStatus::InProgress.as_str()],
                )
                .storage(ErrorCode::UpdateFailed)?;
            if affected == 1 {
                tracing::info!(batch_id, "batch completed");
            }
            Ok(())
        })
    }

    /// Reverts a completed batch to in_progress (the rerun path).
    pub fn reopen_batch(&self, batch_id: i64) -> WorkflowResult<()> {
        self.db.with_tx(|tx| {
            let affected = tx
                .execute(
                    "UPDATE batches SET status = 'in_progress', completed_at = NULL
                     WHERE id = ?1 AND status = 'completed'",
                    params![batch_id],
                )
                .storage(ErrorCode::UpdateFailed)?;
            if affected == 0 {
                return Err(WorkflowError::new(
                    ErrorCode::BatchNotCompleted,
                    format!("batch {} is not completed", batch_id),
                ));
            }
            tracing::info!(batch_id, "batch reopened");
            Ok(())
        })
    }
}

/// Reads a row's shared status inside a transaction, insisting the row
/// exists and its modules agree.
pub(crate) fn row_status_tx(
    tx: &Transaction<'_>,
    batch_id: i64,
    qsa_sequence: u32,
) -> WorkflowResult<RowStatus> {
    let mut stmt = tx
        .prepare(
            "SELECT DISTINCT row_status FROM batch_modules
             WHERE batch_id = ?1 AND original_qsa_sequence = ?2",
        )
        .storage(ErrorCode::TransactionFailed)?;
    let statuses: Vec<String> = stmt
        .query_map(params![batch_id, qsa_sequence], |row| row.get(0))
        .storage(ErrorCode::TransactionFailed)?
        .collect::<Result<_, _>>()
        .storage(ErrorCode::TransactionFailed)?;

    match statuses.as_slice() {
        [] => Err(WorkflowError::new(
            ErrorCode::NoModules,
            format!("batch {} has no row {}", batch_id, qsa_sequence),
        )),
        [status] => status.parse(),
        _ => Err(WorkflowError::internal(format!(
            "row {} of batch {} has mixed statuses: {:?}",
            qsa_sequence, batch_id, statuses
        ))),
    }
}
