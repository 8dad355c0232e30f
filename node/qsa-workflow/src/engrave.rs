use qsa_batch_store::{LinkedSerial, ModuleRecord, RedistributionResult};
use qsa_interface::{ErrorCode, RowStatus, WorkflowError, WorkflowResult};
use qsa_serial_store::{ModuleSlot, ReservedSerial};
use serde::{Deserialize, Serialize};

use crate::{Caller, Workflow};

/// What a row action did, echoed back to the queue UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowActionOutcome {
    /// The logical row acted on.
    pub qsa_sequence: u32,
    /// The row's status after the action.
    pub row_status: RowStatus,
    /// Serials now linked to the row's modules, in carrier order.
    pub serials: Vec<String>,
    /// True when this action completed the whole batch.
    pub batch_completed: bool,
}

impl Workflow {
    /// Starts a row: reserves serials, links them to modules, moves the
    /// row to in_progress. A failed status update voids the reservation
    /// it just made.
    pub fn start_row(
        &self,
        caller: &Caller,
        batch_id: i64,
        qsa_sequence: u32,
    ) -> WorkflowResult<RowActionOutcome> {
        caller.require_engrave()?;

        let modules = self.pending_row(batch_id, qsa_sequence)?;
        if self.serials.count_committable(batch_id, qsa_sequence)? > 0 {
            return Err(WorkflowError::new(
                ErrorCode::SerialsAlreadyReserved,
                format!(
                    "row {} of batch {} already has reserved serials",
                    qsa_sequence, batch_id
                ),
            ));
        }

        let reserved = self.reserve_and_link(caller, batch_id, qsa_sequence, &modules)?;

        if let Err(status_err) =
            self.batches
                .update_row_status(batch_id, qsa_sequence, RowStatus::InProgress)
        {
            // Compensate: the reservation must not outlive the failed
            // transition.
            if let Err(void_err) = self.serials.void(batch_id, qsa_sequence) {
                tracing::error!(
                    batch_id,
                    qsa_sequence,
                    error = %void_err,
                    "compensating void failed after status update failure"
                );
            }
            return Err(WorkflowError::new(
                ErrorCode::UpdateFailed,
                format!("status update failed, reservation voided: {}", status_err),
            ));
        }

        Ok(RowActionOutcome {
            qsa_sequence,
            row_status: RowStatus::InProgress,
            serials: reserved.iter().map(|r| r.serial.padded()).collect(),
            batch_completed: false,
        })
    }

    /// Completes a row: commits its serials and marks it done, guarding
    /// against racing completers via the engraved count.
    pub fn complete_row(
        &self,
        caller: &Caller,
        batch_id: i64,
        qsa_sequence: u32,
    ) -> WorkflowResult<RowActionOutcome> {
        caller.require_engrave()?;

        let modules = self.row_in_status(batch_id, qsa_sequence, RowStatus::InProgress)?;
        let expected = modules.len();

        let committable = self.serials.count_committable(batch_id, qsa_sequence)?;
        let committed = if committable == 0 {
            0
        } else {
            self.serials.commit(batch_id, qsa_sequence)?
        };

        if committed == 0 {
            // Nothing transitioned: either another completer won the
            // race, or the row is in a state no commit should ever
            // produce. The engraved tally tells the two apart.
            let engraved = self.serials.count_engraved(batch_id, qsa_sequence)?;
            if engraved == expected {
                tracing::info!(batch_id, qsa_sequence, "commit race, already engraved");
            } else if engraved > 0 {
                tracing::error!(
                    batch_id,
                    qsa_sequence,
                    engraved,
                    expected,
                    "partial commit detected"
                );
                return Err(WorkflowError::new(
                    ErrorCode::PartialCommit,
                    format!(
                        "row {} of batch {} has {} of {} serials engraved",
                        qsa_sequence, batch_id, engraved, expected
                    ),
                ));
            } else if committable == 0 {
                return Err(WorkflowError::new(
                    ErrorCode::NoReservedSerials,
                    format!(
                        "row {} of batch {} has no reserved serials",
                        qsa_sequence, batch_id
                    ),
                ));
            } else {
                return Err(WorkflowError::new(
                    ErrorCode::ZeroSerialsCommitted,
                    format!(
                        "commit affected no serials for row {} of batch {}",
                        qsa_sequence, batch_id
                    ),
                ));
            }
        }

        self.batches.mark_row_done(batch_id, qsa_sequence)?;

        let batch_completed = self.batches.is_batch_complete(batch_id)?;
        if batch_completed {
            self.batches.complete_batch(batch_id)?;
            self.files.cleanup_batch(batch_id);
        }

        Ok(RowActionOutcome {
            qsa_sequence,
            row_status: RowStatus::Done,
            serials: modules
                .iter()
                .filter_map(|m| m.serial_number.map(|s| s.padded()))
                .collect(),
            batch_completed,
        })
    }

    /// Retries a row that is already in progress: voids the current
    /// reservation and reserves afresh. The row stays in_progress.
    pub fn retry_row(
        &self,
        caller: &Caller,
        batch_id: i64,
        qsa_sequence: u32,
    ) -> WorkflowResult<RowActionOutcome> {
        caller.require_engrave()?;

        let modules = self.row_in_status(batch_id, qsa_sequence, RowStatus::InProgress)?;
        self.serials.void(batch_id, qsa_sequence)?;
        let reserved = self.reserve_and_link(caller, batch_id, qsa_sequence, &modules)?;

        Ok(RowActionOutcome {
            qsa_sequence,
            row_status: RowStatus::InProgress,
            serials: reserved.iter().map(|r| r.serial.padded()).collect(),
            batch_completed: false,
        })
    }

    /// Sends an in-progress row back to pending, voiding its
    /// reservation.
    pub fn back_row(
        &self,
        caller: &Caller,
        batch_id: i64,
        qsa_sequence: u32,
    ) -> WorkflowResult<RowActionOutcome> {
        caller.require_engrave()?;

        self.row_in_status(batch_id, qsa_sequence, RowStatus::InProgress)?;
        self.serials.void(batch_id, qsa_sequence)?;
        self.batches.reset_row_status(batch_id, qsa_sequence)?;

        Ok(RowActionOutcome {
            qsa_sequence,
            row_status: RowStatus::Pending,
            serials: Vec::new(),
            batch_completed: false,
        })
    }

    /// Reruns a finished row: back to pending, reopening the batch when
    /// it had already completed.
    pub fn rerun_row(
        &self,
        caller: &Caller,
        batch_id: i64,
        qsa_sequence: u32,
    ) -> WorkflowResult<RowActionOutcome> {
        caller.require_engrave()?;

        self.row_in_status(batch_id, qsa_sequence, RowStatus::Done)?;
        let batch = self.batches.get_batch(batch_id)?;
        if batch.status == qsa_interface::BatchStatus::Completed {
            self.batches.reopen_batch(batch_id)?;
        }
        self.batches.reset_row_status(batch_id, qsa_sequence)?;

        Ok(RowActionOutcome {
            qsa_sequence,
            row_status: RowStatus::Pending,
            serials: Vec::new(),
            batch_completed: false,
        })
    }

    /// Moves a pending row's carrier start position via redistribution
    /// and refreshes the batch's carrier count.
    pub fn update_start_position(
        &self,
        caller: &Caller,
        batch_id: i64,
        qsa_sequence: u32,
        start_position: u8,
    ) -> WorkflowResult<RedistributionResult> {
        caller.require_engrave()?;
        let result = self
            .batches
            .update_start_position(batch_id, qsa_sequence, start_position)?;
        self.batches.refresh_counts(batch_id)?;
        Ok(result)
    }

    /// Loads a row and insists it is pending.
    fn pending_row(&self, batch_id: i64, qsa_sequence: u32) -> WorkflowResult<Vec<ModuleRecord>> {
        self.row_in_status(batch_id, qsa_sequence, RowStatus::Pending)
    }

    fn row_in_status(
        &self,
        batch_id: i64,
        qsa_sequence: u32,
        wanted: RowStatus,
    ) -> WorkflowResult<Vec<ModuleRecord>> {
        let modules = self.batches.modules_for_row(batch_id, qsa_sequence)?;
        let first = modules.first().ok_or_else(|| {
            WorkflowError::new(
                ErrorCode::NoModules,
                format!("batch {} has no row {}", batch_id, qsa_sequence),
            )
        })?;
        if first.row_status != wanted {
            return Err(WorkflowError::new(
                ErrorCode::InvalidRowStatus,
                format!(
                    "row {} of batch {} is {}, expected {}",
                    qsa_sequence, batch_id, first.row_status, wanted
                ),
            ));
        }
        Ok(modules)
    }

    /// Reserves serials for the row's modules (in carrier order) and
    /// links them back by (carrier, slot).
    fn reserve_and_link(
        &self,
        caller: &Caller,
        batch_id: i64,
        qsa_sequence: u32,
        modules: &[ModuleRecord],
    ) -> WorkflowResult<Vec<ReservedSerial>> {
        let slots: Vec<ModuleSlot> = modules
            .iter()
            .map(|m| ModuleSlot {
                module_sku: m.module_sku.clone(),
                array_position: m.array_position,
            })
            .collect();
        let reserved = self
            .serials
            .reserve(batch_id, qsa_sequence, &slots, &caller.name)?;

        let links: Vec<LinkedSerial> = modules
            .iter()
            .zip(&reserved)
            .map(|(module, reservation)| LinkedSerial {
                qsa_sequence: module.qsa_sequence,
                array_position: module.array_position,
                serial: reservation.serial,
            })
            .collect();
        if let Err(link_err) = self
            .batches
            .link_serials_to_modules(batch_id, qsa_sequence, &links)
        {
            if let Err(void_err) = self.serials.void(batch_id, qsa_sequence) {
                tracing::error!(
                    batch_id,
                    qsa_sequence,
                    error = %void_err,
                    "compensating void failed after link failure"
                );
            }
            return Err(link_err);
        }
        Ok(reserved)
    }
}
