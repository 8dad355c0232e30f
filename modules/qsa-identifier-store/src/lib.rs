#![doc = include_str!("../README.md")]
#![deny(missing_docs)]


use chrono::{DateTime, Utc};
use qsa_db::{EngraveDb, SqlResultExt};
use qsa_interface::{
    Design, ErrorCode, QsaId, WorkflowError, WorkflowResult, QSA_SEQUENCE_MAX,
};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

/// A persisted identifier with its row binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierRecord {
    /// The identifier itself.
    pub qsa_id: QsaId,
    /// Engraving batch it was issued for.
    pub batch_id: i64,
    /// Logical carrier row within the batch.
    pub qsa_sequence: u32,
    /// Issue time.
    pub created_at: DateTime<Utc>,
}

/// The QSA identifier allocator (sole writer of the identifiers and
/// design_sequences relations).
#[derive(Debug, Clone)]
pub struct IdentifierStore {
    db: EngraveDb,
}

impl IdentifierStore {
    /// Creates a store over `db`.
    pub fn new(db: EngraveDb) -> Self {
        Self { db }
    }

    /// Returns the QSA ID for (batch, row), allocating the design's next
    /// sequence number on first use.
    ///
    /// Re-requests for the same (batch, row) return the original ID
    /// unchanged, whatever design is passed; the counter only moves when
    /// a new identifier is actually inserted, so rollback on any failure
    /// leaves no gap behind.
    pub fn get_or_create(
        &self,
        batch_id: i64,
        qsa_sequence: u32,
        design: &Design,
    ) -> WorkflowResult<QsaId> {
        self.db.with_tx(|tx| {
            let existing: Option<String> = tx
                .query_row(
                    "SELECT qsa_id FROM identifiers
                     WHERE batch_id = ?1 AND qsa_sequence = ?2",
                    params![batch_id, qsa_sequence],
                    |row| row.get(0),
                )
                .optional()
                .storage(ErrorCode::TransactionFailed)?;
            if let Some(id) = existing {
                return id.parse();
            }

            let sequence: u32 = tx
                .query_row(
                    "INSERT INTO design_sequences (design, current_sequence)
                     VALUES (?1, 1)
                     ON CONFLICT (design) DO UPDATE
                         SET current_sequence = current_sequence + 1
                     RETURNING current_sequence",
                    params![design.as_str()],
                    |row| row.get(0),
                )
                .storage(ErrorCode::InsertFailed)?;
            if sequence > QSA_SEQUENCE_MAX {
                return Err(WorkflowError::new(
                    ErrorCode::SequenceExhausted,
                    format!("design {} has exhausted its sequence space", design),
                ));
            }

            let qsa_id = QsaId::new(design.clone(), sequence)?;
            tx.execute(
                "INSERT INTO identifiers
                     (qsa_id, design, sequence_number, batch_id, qsa_sequence, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    qsa_id.to_string(),
                    design.as_str(),
                    sequence,
                    batch_id,
                    qsa_sequence,
                    Utc::now(),
                ],
            )
            .storage(ErrorCode::InsertFailed)?;

            tracing::info!(batch_id, qsa_sequence, %qsa_id, "issued QSA identifier");
            Ok(qsa_id)
        })
    }

    /// The identifier already issued for (batch, row), if any.
    pub fn find(&self, batch_id: i64, qsa_sequence: u32) -> WorkflowResult<Option<QsaId>> {
        self.db.with_conn(|conn| {
            let id: Option<String> = conn
                .query_row(
                    "SELECT qsa_id FROM identifiers
                     WHERE batch_id = ?1 AND qsa_sequence = ?2",
                    params![batch_id, qsa_sequence],
                    |row| row.get(0),
                )
                .optional()
                .storage(ErrorCode::TransactionFailed)?;
            id.map(|s| s.parse()).transpose()
        })
    }

    /// Resolves a QSA ID back to the (batch, row) it names.
    pub fn find_by_id(&self, qsa_id: &QsaId) -> WorkflowResult<Option<IdentifierRecord>> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT batch_id, qsa_sequence, created_at FROM identifiers
                 WHERE qsa_id = ?1",
                params![qsa_id.to_string()],
                |row| {
                    Ok(IdentifierRecord {
                        qsa_id: qsa_id.clone(),
                        batch_id: row.get(0)?,
                        qsa_sequence: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()
            .storage(ErrorCode::TransactionFailed)
        })
    }

    /// The current counter value for a design; 0 before first use.
    pub fn current_sequence(&self, design: &Design) -> WorkflowResult<u32> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT current_sequence FROM design_sequences WHERE design = ?1",
                params![design.as_str()],
                |row| row.get(0),
            )
            .optional()
            .storage(ErrorCode::TransactionFailed)
            .map(|v| v.unwrap_or(0))
        })
    }
}
