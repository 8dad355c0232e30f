use qsa_db::SqlResultExt;
use qsa_interface::{
    BatchStatus, ErrorCode, RowStatus, SerialInteger, WorkflowError, WorkflowResult,
};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};

use crate::{BatchRecord, BatchStore, ModuleRecord, RowSummary};

impl BatchStore {
    /// Fetches one batch.
    pub fn get_batch(&self, batch_id: i64) -> WorkflowResult<BatchRecord> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, module_count, row_count, status,
                        created_by, created_at, completed_at
                 FROM batches WHERE id = ?1",
                params![batch_id],
                batch_from_row,
            )
            .optional()
            .storage(ErrorCode::TransactionFailed)?
            .ok_or_else(|| WorkflowError::not_found(format!("batch {} does not exist", batch_id)))
        })
    }

    /// All batches, newest first, optionally filtered by status.
    pub fn list_batches(&self, status: Option<BatchStatus>) -> WorkflowResult<Vec<BatchRecord>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, name, module_count, row_count, status,
                            created_by, created_at, completed_at
                     FROM batches
                     WHERE (?1 IS NULL OR status = ?1)
                     ORDER BY id DESC",
                )
                .storage(ErrorCode::TransactionFailed)?;
            let rows = stmt
                .query_map(params![status.map(|s| s.as_str())], batch_from_row)
                .storage(ErrorCode::TransactionFailed)?;
            rows.collect::<Result<Vec<_>, _>>()
                .storage(ErrorCode::TransactionFailed)
        })
    }

    /// In-progress batches other than `batch_id`; the queue header shows
    /// this so operators notice parallel sessions.
    pub fn other_active_batches(&self, batch_id: i64) -> WorkflowResult<usize> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM batches WHERE status = 'in_progress' AND id != ?1",
                params![batch_id],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| n as usize)
            .storage(ErrorCode::TransactionFailed)
        })
    }

    /// Modules of a batch, optionally filtered by row status, in carrier
    /// order.
    pub fn modules_for_batch(
        &self,
        batch_id: i64,
        row_status: Option<RowStatus>,
    ) -> WorkflowResult<Vec<ModuleRecord>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "{} WHERE batch_id = ?1 AND (?2 IS NULL OR row_status = ?2)
                     ORDER BY original_qsa_sequence, qsa_sequence, array_position",
                    SELECT_MODULE
                ))
                .storage(ErrorCode::TransactionFailed)?;
            let rows = stmt
                .query_map(
                    params![batch_id, row_status.map(|s| s.as_str())],
                    module_from_row,
                )
                .storage(ErrorCode::TransactionFailed)?;
            rows.collect::<Result<Vec<_>, _>>()
                .storage(ErrorCode::TransactionFailed)
        })
    }

    /// Modules of one logical row, in carrier order.
    pub fn modules_for_row(
        &self,
        batch_id: i64,
        qsa_sequence: u32,
    ) -> WorkflowResult<Vec<ModuleRecord>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "{} WHERE batch_id = ?1 AND original_qsa_sequence = ?2
                     ORDER BY qsa_sequence, array_position",
                    SELECT_MODULE
                ))
                .storage(ErrorCode::TransactionFailed)?;
            let rows = stmt
                .query_map(params![batch_id, qsa_sequence], module_from_row)
                .storage(ErrorCode::TransactionFailed)?;
            rows.collect::<Result<Vec<_>, _>>()
                .storage(ErrorCode::TransactionFailed)
        })
    }

    /// Modules on one physical carrier, in slot order.
    pub fn modules_for_carrier(
        &self,
        batch_id: i64,
        carrier_sequence: u32,
    ) -> WorkflowResult<Vec<ModuleRecord>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "{} WHERE batch_id = ?1 AND qsa_sequence = ?2 ORDER BY array_position",
                    SELECT_MODULE
                ))
                .storage(ErrorCode::TransactionFailed)?;
            let rows = stmt
                .query_map(params![batch_id, carrier_sequence], module_from_row)
                .storage(ErrorCode::TransactionFailed)?;
            rows.collect::<Result<Vec<_>, _>>()
                .storage(ErrorCode::TransactionFailed)
        })
    }

    /// The shared status of one logical row.
    pub fn row_status(&self, batch_id: i64, qsa_sequence: u32) -> WorkflowResult<RowStatus> {
        let modules = self.modules_for_row(batch_id, qsa_sequence)?;
        let first = modules.first().ok_or_else(|| {
            WorkflowError::new(
                ErrorCode::NoModules,
                format!("batch {} has no row {}", batch_id, qsa_sequence),
            )
        })?;
        Ok(first.row_status)
    }

    /// Queue summaries of every logical row in the batch.
    pub fn row_summaries(&self, batch_id: i64) -> WorkflowResult<Vec<RowSummary>> {
        let modules = self.modules_for_batch(batch_id, None)?;
        let mut summaries: Vec<RowSummary> = Vec::new();
        for module in modules {
            match summaries
                .iter_mut()
                .find(|s| s.original_qsa_sequence == module.original_qsa_sequence)
            {
                Some(summary) => {
                    summary.module_count += 1;
                    if !summary.carrier_sequences.contains(&module.qsa_sequence) {
                        summary.carrier_sequences.push(module.qsa_sequence);
                    }
                }
                None => summaries.push(RowSummary {
                    original_qsa_sequence: module.original_qsa_sequence,
                    row_status: module.row_status,
                    module_count: 1,
                    carrier_sequences: vec![module.qsa_sequence],
                }),
            }
        }
        Ok(summaries)
    }

    /// The module a committed serial was engraved onto, for traceability
    /// lookups.
    pub fn module_by_serial(&self, serial: SerialInteger) -> WorkflowResult<Option<ModuleRecord>> {
        self.db.with_conn(|conn| {
            conn.query_row(
                &format!("{} WHERE serial_number = ?1", SELECT_MODULE),
                params![serial.padded()],
                module_from_row,
            )
            .optional()
            .storage(ErrorCode::TransactionFailed)
        })
    }

    /// True once every module of a non-empty batch is done.
    pub fn is_batch_complete(&self, batch_id: i64) -> WorkflowResult<bool> {
        self.db.with_conn(|conn| {
            let (total, done): (i64, i64) = conn
                .query_row(
                    "SELECT COUNT(*),
                            COUNT(CASE WHEN row_status = 'done' THEN 1 END)
                     FROM batch_modules WHERE batch_id = ?1",
                    params![batch_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .storage(ErrorCode::TransactionFailed)?;
            Ok(total > 0 && total == done)
        })
    }
}

const SELECT_MODULE: &str = "SELECT id, batch_id, production_batch_id, module_sku, order_id,
            serial_number, qsa_sequence, original_qsa_sequence, array_position,
            row_status, led_codes, engraved_at
     FROM batch_modules";

fn batch_from_row(row: &Row<'_>) -> rusqlite::Result<BatchRecord> {
    let status = row
        .get::<_, String>(4)?
        .parse::<BatchStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;
    Ok(BatchRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        module_count: row.get(2)?,
        row_count: row.get(3)?,
        status,
        created_by: row.get(5)?,
        created_at: row.get(6)?,
        completed_at: row.get(7)?,
    })
}

fn module_from_row(row: &Row<'_>) -> rusqlite::Result<ModuleRecord> {
    let serial_number = row
        .get::<_, Option<String>>(5)?
        .map(|s| s.parse::<SerialInteger>())
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;
    let row_status = row
        .get::<_, String>(9)?
        .parse::<RowStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(9, Type::Text, Box::new(e)))?;
    let led_codes: Vec<String> = serde_json::from_str(&row.get::<_, String>(10)?)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(10, Type::Text, Box::new(e)))?;
    Ok(ModuleRecord {
        id: row.get(0)?,
        batch_id: row.get(1)?,
        production_batch_id: row.get(2)?,
        module_sku: row.get(3)?,
        order_id: row.get(4)?,
        serial_number,
        qsa_sequence: row.get(6)?,
        original_qsa_sequence: row.get(7)?,
        array_position: row.get(8)?,
        row_status,
        led_codes,
        engraved_at: row.get(11)?,
    })
}
