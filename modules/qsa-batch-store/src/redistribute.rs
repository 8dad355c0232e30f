use qsa_db::SqlResultExt;
use qsa_interface::{
    carrier_layout, slot_assignments, ErrorCode, RowStatus, WorkflowError, WorkflowResult,
};
use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::call::row_status_tx;
use crate::BatchStore;

/// One physical carrier in a redistribution result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierAssignment {
    /// The carrier's (possibly new) sequence number.
    pub qsa_sequence: u32,
    /// First occupied slot on the carrier.
    pub start_slot: u8,
    /// Modules placed on the carrier.
    pub module_count: usize,
}

/// Outcome of a redistribution, for refreshing batch counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedistributionResult {
    /// The new carrier layout in order.
    pub arrays: Vec<CarrierAssignment>,
    /// Distinct carriers the modules occupied before.
    pub old_count: usize,
    /// Distinct carriers they occupy now.
    pub new_count: usize,
}

impl BatchStore {
    /// Moves a row's starting slot, relaying its modules out across
    /// carriers. Only the redistribution path exists; a bare reposition
    /// is just a redistribution of one row.
    pub fn update_start_position(
        &self,
        batch_id: i64,
        qsa_sequence: u32,
        start_position: u8,
    ) -> WorkflowResult<RedistributionResult> {
        self.redistribute_row_modules(batch_id, &[qsa_sequence], start_position)
    }

    /// Re-lays the modules of the given logical rows across physical
    /// carriers starting at `start_position`.
    ///
    /// Modules keep their original ordering and their
    /// original_qsa_sequence; only (qsa_sequence, array_position) is
    /// rewritten. Existing carrier sequences are reused in ascending
    /// order and fresh ones are taken past the batch's current maximum
    /// when the new layout needs more. Refused unless every affected row
    /// is pending.
    pub fn redistribute_row_modules(
        &self,
        batch_id: i64,
        original_sequences: &[u32],
        start_position: u8,
    ) -> WorkflowResult<RedistributionResult> {
        if original_sequences.is_empty() {
            return Err(WorkflowError::validation(
                ErrorCode::InvalidParams,
                "no rows to redistribute",
            ));
        }

        self.db.with_tx(|tx| {
            for &sequence in original_sequences {
                let status = row_status_tx(tx, batch_id, sequence)?;
                if status != RowStatus::Pending {
                    return Err(WorkflowError::new(
                        ErrorCode::InvalidRowStatus,
                        format!(
                            "row {} of batch {} is {}, only pending rows redistribute",
                            sequence, batch_id, status
                        ),
                    ));
                }
            }

            // Module ids in original ordering, plus the carrier sequences
            // they currently occupy.
            let placeholders = vec!["?"; original_sequences.len()].join(", ");
            let mut params_vec: Vec<i64> = vec![batch_id];
            params_vec.extend(original_sequences.iter().map(|&s| s as i64));

            let mut stmt = tx
                .prepare(&format!(
                    "SELECT id, qsa_sequence FROM batch_modules
                     WHERE batch_id = ? AND original_qsa_sequence IN ({})
                     ORDER BY original_qsa_sequence, qsa_sequence, array_position, id",
                    placeholders
                ))
                .storage(ErrorCode::TransactionFailed)?;
            let modules: Vec<(i64, u32)> = stmt
                .query_map(rusqlite::params_from_iter(params_vec.iter()), |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })
                .storage(ErrorCode::TransactionFailed)?
                .collect::<Result<_, _>>()
                .storage(ErrorCode::TransactionFailed)?;
            drop(stmt);

            if modules.is_empty() {
                return Err(WorkflowError::new(
                    ErrorCode::NoModules,
                    format!("rows {:?} of batch {} hold no modules", original_sequences, batch_id),
                ));
            }

            let mut existing: Vec<u32> = modules.iter().map(|&(_, seq)| seq).collect();
            existing.sort_unstable();
            existing.dedup();

            let spans = carrier_layout(modules.len(), start_position)?;
            let batch_max: u32 = tx
                .query_row(
                    "SELECT COALESCE(MAX(qsa_sequence), 0) FROM batch_modules
                     WHERE batch_id = ?1",
                    params![batch_id],
                    |row| row.get(0),
                )
                .storage(ErrorCode::TransactionFailed)?;

            let mut sequences: Vec<u32> = existing.iter().copied().take(spans.len()).collect();
            let mut next_fresh = batch_max + 1;
            while sequences.len() < spans.len() {
                sequences.push(next_fresh);
                next_fresh += 1;
            }

            let assignments = slot_assignments(&spans);
            debug_assert_eq!(assignments.len(), modules.len());
            for ((module_id, _), assignment) in modules.iter().zip(&assignments) {
                tx.execute(
                    "UPDATE batch_modules SET qsa_sequence = ?1, array_position = ?2
                     WHERE id = ?3",
                    params![
                        sequences[assignment.carrier_index],
                        assignment.array_position,
                        module_id,
                    ],
                )
                .storage(ErrorCode::UpdateFailed)?;
            }

            let arrays = spans
                .iter()
                .enumerate()
                .map(|(index, span)| CarrierAssignment {
                    qsa_sequence: sequences[index],
                    start_slot: span.start_slot,
                    module_count: span.count,
                })
                .collect();

            let result = RedistributionResult {
                arrays,
                old_count: existing.len(),
                new_count: spans.len(),
            };
            tracing::info!(
                batch_id,
                rows = ?original_sequences,
                start_position,
                old_count = result.old_count,
                new_count = result.new_count,
                "redistributed row modules"
            );
            Ok(result)
        })
    }
}
