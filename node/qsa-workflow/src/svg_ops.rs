use std::time::Duration;

use qsa_batch_store::ModuleRecord;
use qsa_config_store::DesignConfig;
use qsa_device_coupler::carrier_file_name;
use qsa_interface::{Design, ErrorCode, QsaId, Revision, WorkflowError, WorkflowResult};
use qsa_svg_composer::{compose, CarrierArt, ModuleArt};
use serde::{Deserialize, Serialize};

use crate::{Caller, Workflow};

/// Result of composing a row's artwork.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedSvg {
    /// The row's QSA identifier.
    pub qsa_id: String,
    /// Written files, one per physical carrier, in carrier order.
    pub files: Vec<String>,
    /// Whether the first carrier was shipped to the workstation.
    pub loaded: bool,
}

impl Workflow {
    /// Composes and writes the SVG documents for every carrier of a row,
    /// assigning the row's QSA ID on first use. With `auto_load` (or the
    /// configured default) the first carrier is shipped to the
    /// workstation.
    pub fn generate_svg(
        &self,
        caller: &Caller,
        batch_id: i64,
        qsa_sequence: u32,
        auto_load: Option<bool>,
    ) -> WorkflowResult<GeneratedSvg> {
        caller.require_engrave()?;

        let modules = self.batches.modules_for_row(batch_id, qsa_sequence)?;
        if modules.is_empty() {
            return Err(WorkflowError::new(
                ErrorCode::NoModules,
                format!("batch {} has no row {}", batch_id, qsa_sequence),
            ));
        }
        if modules.iter().any(|m| m.serial_number.is_none()) {
            return Err(WorkflowError::new(
                ErrorCode::NoReservedSerials,
                format!(
                    "row {} of batch {} has unlinked modules, start the row first",
                    qsa_sequence, batch_id
                ),
            ));
        }

        let (design, revision) = self.row_design(&modules)?;
        let qsa_id = self
            .identifiers
            .get_or_create(batch_id, qsa_sequence, &design)?;
        let config = self.configs.get_config(&design, revision)?;

        let files = self.write_carriers(batch_id, qsa_sequence, &qsa_id, &modules, &config)?;

        let should_load = auto_load.unwrap_or(self.auto_load) && self.coupler.enabled();
        if should_load {
            self.coupler.load_file(&files[0])?;
        }

        Ok(GeneratedSvg {
            qsa_id: qsa_id.to_string(),
            files,
            loaded: should_load,
        })
    }

    /// Reloads a row's already-generated artwork in the workstation
    /// without recomposing it.
    pub fn load_svg(
        &self,
        caller: &Caller,
        batch_id: i64,
        qsa_sequence: u32,
    ) -> WorkflowResult<String> {
        caller.require_engrave()?;
        let file_name = carrier_file_name(batch_id, qsa_sequence, 0);
        if !self.files.exists(&file_name) {
            return Err(WorkflowError::new(
                ErrorCode::NotFound,
                format!("no generated artwork for row {} of batch {}", qsa_sequence, batch_id),
            ));
        }
        let path = self.files.path_of(&file_name);
        self.coupler.load_file(&path.to_string_lossy())
    }

    /// UDP connectivity probe to the workstation.
    pub fn test_device(&self, caller: &Caller) -> WorkflowResult<Duration> {
        caller.require_engrave()?;
        self.coupler.probe()
    }

    /// The canonical design and revision of a row, from its modules'
    /// SKUs. All modules of a row must share one design.
    fn row_design(
        &self,
        modules: &[ModuleRecord],
    ) -> WorkflowResult<(Design, Option<Revision>)> {
        let mut resolved: Option<(Design, Option<Revision>)> = None;
        for module in modules {
            let this = self
                .resolver
                .resolve(&module.module_sku)?
                .ok_or_else(|| {
                    WorkflowError::new(
                        ErrorCode::MissingModuleData,
                        format!("SKU {} no longer resolves to a design", module.module_sku),
                    )
                })?;
            match &resolved {
                None => resolved = Some((this.design, this.revision)),
                Some((design, _)) if *design != this.design => {
                    return Err(WorkflowError::new(
                        ErrorCode::MissingModuleData,
                        format!(
                            "row mixes designs {} and {}",
                            design.as_str(),
                            this.design.as_str()
                        ),
                    ));
                }
                Some(_) => {}
            }
        }
        resolved.ok_or_else(|| WorkflowError::new(ErrorCode::NoModules, "row has no modules"))
    }

    /// Composes one document per physical carrier and writes them all.
    fn write_carriers(
        &self,
        batch_id: i64,
        qsa_sequence: u32,
        qsa_id: &QsaId,
        modules: &[ModuleRecord],
        config: &DesignConfig,
    ) -> WorkflowResult<Vec<String>> {
        let mut carriers: Vec<u32> = modules.iter().map(|m| m.qsa_sequence).collect();
        carriers.sort_unstable();
        carriers.dedup();

        let mut files = Vec::with_capacity(carriers.len());
        for (index, &carrier) in carriers.iter().enumerate() {
            let art = CarrierArt {
                qsa_id: qsa_id.clone(),
                modules: modules
                    .iter()
                    .filter(|m| m.qsa_sequence == carrier)
                    .map(|m| {
                        let serial = m.serial_number.ok_or_else(|| {
                            WorkflowError::new(
                                ErrorCode::NoReservedSerials,
                                format!("module at slot {} lost its serial", m.array_position),
                            )
                        })?;
                        Ok(ModuleArt {
                            array_position: m.array_position,
                            module_sku: m.module_sku.clone(),
                            serial,
                            led_codes: m.led_codes.clone(),
                        })
                    })
                    .collect::<WorkflowResult<Vec<_>>>()?,
            };
            let svg = compose(&art, config, &self.settings)?;
            let path = self
                .files
                .write(&carrier_file_name(batch_id, qsa_sequence, index), &svg)?;
            files.push(path.to_string_lossy().into_owned());
        }
        Ok(files)
    }
}
