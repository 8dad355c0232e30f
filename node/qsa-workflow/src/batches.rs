use qsa_batch_store::{BatchRecord, NewModule};
use qsa_batch_sorter::{ModuleInstance, PlacedModule, Selection};
use qsa_interface::{BatchStatus, ErrorCode, RowStatus, WorkflowError, WorkflowResult};
use qsa_serial_store::Capacity;
use serde::{Deserialize, Serialize};

use crate::{AwaitingGroup, Caller, Workflow};

/// One provisional carrier in a batch preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierPreview {
    /// Carrier sequence the batch would use.
    pub qsa_sequence: u32,
    /// Logical row the carrier belongs to.
    pub original_qsa_sequence: u32,
    /// Canonical design engraved on the carrier.
    pub design: String,
    /// Modules with their slots.
    pub modules: Vec<PlacedModule>,
}

/// The sorter's view of a selection before anything is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPreview {
    /// Total modules selected.
    pub module_count: usize,
    /// Physical carriers the selection needs.
    pub carriers: Vec<CarrierPreview>,
    /// LED-code transitions in the sorted order.
    pub transition_count: usize,
    /// Distinct LED codes across the selection.
    pub distinct_led_codes: Vec<String>,
}

/// One logical row in the queue view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueRow {
    /// Logical row identifier.
    pub qsa_sequence: u32,
    /// Shared row status.
    pub row_status: RowStatus,
    /// Modules in the row.
    pub module_count: usize,
    /// Physical carriers currently holding the row.
    pub carrier_sequences: Vec<u32>,
    /// Canonical design of the row.
    pub design: String,
    /// QSA identifier, once artwork was generated.
    pub qsa_id: Option<String>,
    /// Linked serial numbers in carrier order.
    pub serials: Vec<String>,
}

/// The queue screen's payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueView {
    /// The batch itself.
    pub batch: BatchRecord,
    /// Its rows in order.
    pub rows: Vec<QueueRow>,
    /// Serial capacity telemetry.
    pub capacity: Capacity,
    /// Other batches currently in progress.
    pub other_active_batches: usize,
}

impl Workflow {
    /// Modules the host catalog reports as awaiting engraving, filtered
    /// to QSA-compatible SKUs and grouped by (design, order).
    pub fn modules_awaiting(&self, caller: &Caller) -> WorkflowResult<Vec<AwaitingGroup>> {
        caller.require_engrave()?;
        let mut groups: Vec<AwaitingGroup> = Vec::new();
        for line in self.catalog.modules_awaiting()? {
            let resolved = match self.resolver.resolve(&line.sku)? {
                Some(resolved) => resolved,
                // Not QSA-compatible and no legacy mapping: not engraveable.
                None => continue,
            };
            let design = resolved.design.as_str().to_string();
            match groups
                .iter_mut()
                .find(|g| g.design == design && g.order_id == line.order_id)
            {
                Some(group) => {
                    group.total_quantity += line.quantity;
                    group.has_legacy |= resolved.is_legacy;
                    group.lines.push(line);
                }
                None => groups.push(AwaitingGroup {
                    design,
                    order_id: line.order_id,
                    total_quantity: line.quantity,
                    has_legacy: resolved.is_legacy,
                    lines: vec![line],
                }),
            }
        }
        Ok(groups)
    }

    /// Expands, sorts and slices a selection without persisting
    /// anything.
    pub fn preview_batch(
        &self,
        caller: &Caller,
        selections: &[Selection],
        start_position: u8,
    ) -> WorkflowResult<BatchPreview> {
        caller.require_engrave()?;
        let rows = self.plan_rows(selections, start_position)?;

        let all_sorted: Vec<ModuleInstance> = rows
            .iter()
            .flat_map(|row| row.instances.iter().cloned())
            .collect();
        let carriers = rows
            .iter()
            .flat_map(|row| row.carriers.iter().cloned())
            .collect::<Vec<_>>();

        Ok(BatchPreview {
            module_count: all_sorted.len(),
            transition_count: qsa_batch_sorter::count_transitions(&all_sorted),
            distinct_led_codes: qsa_batch_sorter::distinct_led_codes(&all_sorted),
            carriers,
        })
    }

    /// Persists a selection as a new batch.
    pub fn create_batch(
        &self,
        caller: &Caller,
        selections: &[Selection],
        start_position: u8,
        name: Option<String>,
    ) -> WorkflowResult<i64> {
        caller.require_engrave()?;
        let rows = self.plan_rows(selections, start_position)?;

        let batch_id = self.batches.create_batch(name, &caller.name)?;
        for row in &rows {
            for carrier in &row.carriers {
                for placed in &carrier.modules {
                    self.batches.add_module(
                        batch_id,
                        &NewModule {
                            production_batch_id: placed.module.production_batch_id,
                            module_sku: placed.module.module_sku.clone(),
                            order_id: placed.module.order_id,
                            qsa_sequence: carrier.qsa_sequence,
                            original_qsa_sequence: carrier.original_qsa_sequence,
                            array_position: placed.array_position,
                            led_codes: placed.module.led_codes.clone(),
                        },
                    )?;
                }
            }
        }
        self.batches.refresh_counts(batch_id)?;
        tracing::info!(batch_id, rows = rows.len(), "created engraving batch");
        Ok(batch_id)
    }

    /// The queue screen for one batch.
    pub fn get_queue(&self, caller: &Caller, batch_id: i64) -> WorkflowResult<QueueView> {
        caller.require_engrave()?;
        let batch = self.batches.get_batch(batch_id)?;
        let summaries = self.batches.row_summaries(batch_id)?;

        let mut rows = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let modules = self
                .batches
                .modules_for_row(batch_id, summary.original_qsa_sequence)?;
            let design = self
                .resolver
                .resolve(&modules[0].module_sku)?
                .map(|r| r.design.as_str().to_string())
                .unwrap_or_default();
            let qsa_id = self
                .identifiers
                .find(batch_id, summary.original_qsa_sequence)?
                .map(|id| id.to_string());
            rows.push(QueueRow {
                qsa_sequence: summary.original_qsa_sequence,
                row_status: summary.row_status,
                module_count: summary.module_count,
                carrier_sequences: summary.carrier_sequences,
                design,
                qsa_id,
                serials: modules
                    .iter()
                    .filter_map(|m| m.serial_number.map(|s| s.padded()))
                    .collect(),
            });
        }

        Ok(QueueView {
            rows,
            capacity: self.serials.capacity()?,
            other_active_batches: self.batches.other_active_batches(batch_id)?,
            batch,
        })
    }

    /// All batches, optionally by status.
    pub fn list_batches(
        &self,
        caller: &Caller,
        status: Option<BatchStatus>,
    ) -> WorkflowResult<Vec<BatchRecord>> {
        caller.require_engrave()?;
        self.batches.list_batches(status)
    }

    /// Plans logical rows for a selection: instances sorted within their
    /// (design, order) group, each group sliced into its own carriers.
    /// The start position applies to the first row only; carriers never
    /// mix designs.
    fn plan_rows(
        &self,
        selections: &[Selection],
        start_position: u8,
    ) -> WorkflowResult<Vec<PlannedRow>> {
        if selections.is_empty() {
            return Err(WorkflowError::new(
                ErrorCode::NoModules,
                "selection is empty",
            ));
        }
        for selection in selections {
            if selection.quantity == 0 {
                return Err(WorkflowError::validation(
                    ErrorCode::InvalidParams,
                    format!("selection for {} has zero quantity", selection.sku),
                ));
            }
            if selection.led_codes.is_empty() {
                return Err(WorkflowError::new(
                    ErrorCode::NoLedCodes,
                    format!("selection for {} carries no LED codes", selection.sku),
                ));
            }
        }

        // Group selections by (design, order); each group is one row.
        let mut groups: Vec<(String, i64, Vec<Selection>)> = Vec::new();
        for selection in selections {
            let design = self
                .resolver
                .resolve(&selection.sku)?
                .ok_or_else(|| {
                    WorkflowError::new(
                        ErrorCode::InvalidSkuFormat,
                        format!("SKU {} is not QSA-compatible", selection.sku),
                    )
                })?
                .design
                .as_str()
                .to_string();
            match groups
                .iter_mut()
                .find(|(d, order, _)| *d == design && *order == selection.order_id)
            {
                Some((_, _, group)) => group.push(selection.clone()),
                None => groups.push((design, selection.order_id, vec![selection.clone()])),
            }
        }

        let mut rows = Vec::new();
        let mut next_carrier: u32 = 1;
        for (index, (design, _, group)) in groups.iter().enumerate() {
            let row_sequence = index as u32 + 1;
            let start = if index == 0 { start_position } else { 1 };
            let instances = qsa_batch_sorter::sort(qsa_batch_sorter::expand(group));
            let carriers = qsa_batch_sorter::assign_to_carriers(&instances, start)?;

            let mut previews = Vec::with_capacity(carriers.len());
            for placed in carriers {
                previews.push(CarrierPreview {
                    qsa_sequence: next_carrier,
                    original_qsa_sequence: row_sequence,
                    design: design.clone(),
                    modules: placed,
                });
                next_carrier += 1;
            }
            rows.push(PlannedRow {
                instances,
                carriers: previews,
            });
        }
        Ok(rows)
    }
}

struct PlannedRow {
    instances: Vec<ModuleInstance>,
    carriers: Vec<CarrierPreview>,
}
