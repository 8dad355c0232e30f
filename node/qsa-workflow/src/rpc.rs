//! The JSON-RPC surface. Every method returns the uniform
//! `{ok, data|message, code}` envelope; transport-level errors are
//! reserved for malformed requests.

use std::net::IpAddr;

use jsonrpsee::types::ErrorObjectOwned;
use jsonrpsee::RpcModule;
use qsa_batch_sorter::Selection;
use qsa_config_store::{ElementType, ElementUpsert};
use qsa_interface::{BatchStatus, Design, Envelope, Revision, WorkflowResult};
use qsa_sku_resolver::{MappingUpsert, MatchType};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{Caller, Workflow};

/// Builds the [`RpcModule`] exposing the whole workflow surface.
pub fn rpc_module(workflow: Workflow) -> anyhow::Result<RpcModule<Workflow>> {
    let mut rpc = RpcModule::new(workflow);

    // Selection and batch creation.
    rpc.register_method("engrave_modulesAwaiting", |params, workflow| {
        let p: TokenParams = parse(params)?;
        envelope(workflow.with_caller(p.token, |w, caller| w.modules_awaiting(caller)))
    })?;
    rpc.register_method("engrave_previewBatch", |params, workflow| {
        let p: SelectionParams = parse(params)?;
        envelope(workflow.with_caller(p.token, |w, caller| {
            w.preview_batch(caller, &p.selections, p.start_position)
        }))
    })?;
    rpc.register_method("engrave_createBatch", |params, workflow| {
        let p: SelectionParams = parse(params)?;
        envelope(workflow.with_caller(p.token, |w, caller| {
            w.create_batch(caller, &p.selections, p.start_position, p.name.clone())
        }))
    })?;
    rpc.register_method("engrave_getQueue", |params, workflow| {
        let p: BatchParams = parse(params)?;
        envelope(workflow.with_caller(p.token, |w, caller| w.get_queue(caller, p.batch_id)))
    })?;
    rpc.register_method("engrave_listBatches", |params, workflow| {
        let p: ListBatchesParams = parse(params)?;
        envelope(workflow.with_caller(p.token, |w, caller| w.list_batches(caller, p.status)))
    })?;

    // Row lifecycle.
    rpc.register_method("engrave_startRow", |params, workflow| {
        let p: RowParams = parse(params)?;
        envelope(workflow.with_caller(p.token, |w, caller| {
            w.start_row(caller, p.batch_id, p.qsa_sequence)
        }))
    })?;
    rpc.register_method("engrave_completeRow", |params, workflow| {
        let p: RowParams = parse(params)?;
        envelope(workflow.with_caller(p.token, |w, caller| {
            w.complete_row(caller, p.batch_id, p.qsa_sequence)
        }))
    })?;
    rpc.register_method("engrave_retryRow", |params, workflow| {
        let p: RowParams = parse(params)?;
        envelope(workflow.with_caller(p.token, |w, caller| {
            w.retry_row(caller, p.batch_id, p.qsa_sequence)
        }))
    })?;
    rpc.register_method("engrave_backRow", |params, workflow| {
        let p: RowParams = parse(params)?;
        envelope(workflow.with_caller(p.token, |w, caller| {
            w.back_row(caller, p.batch_id, p.qsa_sequence)
        }))
    })?;
    rpc.register_method("engrave_rerunRow", |params, workflow| {
        let p: RowParams = parse(params)?;
        envelope(workflow.with_caller(p.token, |w, caller| {
            w.rerun_row(caller, p.batch_id, p.qsa_sequence)
        }))
    })?;
    rpc.register_method("engrave_updateStartPosition", |params, workflow| {
        let p: StartPositionParams = parse(params)?;
        envelope(workflow.with_caller(p.token, |w, caller| {
            w.update_start_position(caller, p.batch_id, p.qsa_sequence, p.start_position)
        }))
    })?;

    // Artwork and the device.
    rpc.register_method("engrave_generateSvg", |params, workflow| {
        let p: GenerateParams = parse(params)?;
        envelope(workflow.with_caller(p.token, |w, caller| {
            w.generate_svg(caller, p.batch_id, p.qsa_sequence, p.auto_load)
        }))
    })?;
    rpc.register_method("engrave_loadSvg", |params, workflow| {
        let p: RowParams = parse(params)?;
        envelope(workflow.with_caller(p.token, |w, caller| {
            w.load_svg(caller, p.batch_id, p.qsa_sequence)
        }))
    })?;
    rpc.register_method("engrave_resendSvg", |params, workflow| {
        let p: RowParams = parse(params)?;
        envelope(workflow.with_caller(p.token, |w, caller| {
            w.load_svg(caller, p.batch_id, p.qsa_sequence)
        }))
    })?;
    rpc.register_method("device_test", |params, workflow| {
        let p: TokenParams = parse(params)?;
        envelope(
            workflow
                .with_caller(p.token, |w, caller| w.test_device(caller))
                .map(|elapsed| elapsed.as_millis() as u64),
        )
    })?;

    // Serial telemetry and lookups.
    rpc.register_method("serial_capacity", |params, workflow| {
        let p: TokenParams = parse(params)?;
        envelope(workflow.with_caller(p.token, |w, _| w.serials().capacity()))
    })?;
    rpc.register_method("serial_lookup", |params, workflow| {
        let p: LookupParams = parse(params)?;
        envelope(workflow.serial_lookup(p.source_ip, &p.serial))
    })?;
    rpc.register_method("serial_details", |params, workflow| {
        let p: DetailsParams = parse(params)?;
        envelope(workflow.with_caller(p.token, |w, caller| w.serial_details(caller, &p.serial)))
    })?;

    // Element configuration administration.
    rpc.register_method("config_designs", |params, workflow| {
        let p: TokenParams = parse(params)?;
        envelope(workflow.with_caller(p.token, |w, _| w.configs().designs()))
    })?;
    rpc.register_method("config_revisions", |params, workflow| {
        let p: DesignParams = parse(params)?;
        envelope(workflow.with_caller(p.token, |w, _| {
            w.configs().revisions(&Design::try_new(&p.design)?)
        }))
    })?;
    rpc.register_method("config_get", |params, workflow| {
        let p: DesignParams = parse(params)?;
        envelope(workflow.with_caller(p.token, |w, _| {
            let design = Design::try_new(&p.design)?;
            w.configs().get_config(&design, parse_revision(&p.revision)?)
        }))
    })?;
    rpc.register_method("config_validate", |params, workflow| {
        let p: DesignParams = parse(params)?;
        envelope(workflow.with_caller(p.token, |w, _| {
            let design = Design::try_new(&p.design)?;
            w.configs()
                .validate_config(&design, parse_revision(&p.revision)?, 8)
        }))
    })?;
    rpc.register_method("config_setElement", |params, workflow| {
        let p: SetElementParams = parse(params)?;
        envelope(workflow.with_staff(p.token, |w, _| {
            let design = Design::try_new(&p.design)?;
            w.configs().set_element(
                &design,
                parse_revision(&p.revision)?,
                ElementUpsert {
                    position: p.position,
                    element_type: p.element_type,
                    origin_x: p.origin_x,
                    origin_y: p.origin_y,
                    rotation: p.rotation,
                    text_height: p.text_height,
                    element_size: p.element_size,
                },
            )
        }))
    })?;
    rpc.register_method("config_importPreview", |params, workflow| {
        let p: CsvParams = parse(params)?;
        envelope(workflow.with_staff(p.token, |w, _| w.configs().preview_import(&p.csv)))
    })?;
    rpc.register_method("config_importApply", |params, workflow| {
        let p: CsvParams = parse(params)?;
        envelope(workflow.with_staff(p.token, |w, _| {
            let delta = w.configs().preview_import(&p.csv)?;
            w.configs().apply_import(&delta)?;
            Ok(delta)
        }))
    })?;
    rpc.register_method("config_export", |params, workflow| {
        let p: DesignParams = parse(params)?;
        envelope(workflow.with_caller(p.token, |w, _| {
            let design = Design::try_new(&p.design)?;
            w.configs().export_csv(&design, parse_revision(&p.revision)?)
        }))
    })?;

    // SKU mapping administration.
    rpc.register_method("sku_resolve", |params, workflow| {
        let p: SkuParams = parse(params)?;
        envelope(workflow.with_caller(p.token, |w, _| w.resolver().resolve(&p.sku)))
    })?;
    rpc.register_method("sku_listMappings", |params, workflow| {
        let p: TokenParams = parse(params)?;
        envelope(workflow.with_caller(p.token, |w, _| w.resolver().list_mappings()))
    })?;
    rpc.register_method("sku_createMapping", |params, workflow| {
        let p: MappingParams = parse(params)?;
        envelope(workflow.with_staff(p.token, |w, _| w.resolver().create_mapping(&p.mapping)))
    })?;
    rpc.register_method("sku_updateMapping", |params, workflow| {
        let p: MappingUpdateParams = parse(params)?;
        envelope(workflow.with_staff(p.token, |w, _| w.resolver().update_mapping(p.id, &p.mapping)))
    })?;
    rpc.register_method("sku_deleteMapping", |params, workflow| {
        let p: MappingDeleteParams = parse(params)?;
        envelope(workflow.with_staff(p.token, |w, _| w.resolver().delete_mapping(p.id)))
    })?;
    rpc.register_method("sku_testPattern", |params, workflow| {
        let p: TestPatternParams = parse(params)?;
        envelope(workflow.with_staff(p.token, |w, _| {
            w.resolver().test_pattern(&p.pattern, p.match_type, &p.sample)
        }))
    })?;

    Ok(rpc)
}

impl Workflow {
    /// Resolves the token and runs `f` with the caller.
    fn with_caller<T>(
        &self,
        token: Option<String>,
        f: impl FnOnce(&Workflow, &Caller) -> WorkflowResult<T>,
    ) -> WorkflowResult<T> {
        let caller = self.callers().resolve(token.as_deref())?;
        f(self, &caller)
    }

    /// Like [`Workflow::with_caller`], additionally requiring staff.
    fn with_staff<T>(
        &self,
        token: Option<String>,
        f: impl FnOnce(&Workflow, &Caller) -> WorkflowResult<T>,
    ) -> WorkflowResult<T> {
        let caller = self.callers().resolve(token.as_deref())?;
        caller.require_staff()?;
        f(self, &caller)
    }
}

fn parse<T: DeserializeOwned>(params: jsonrpsee::types::Params<'_>) -> Result<T, ErrorObjectOwned> {
    params.parse()
}

fn envelope<T: Serialize>(result: WorkflowResult<T>) -> Result<serde_json::Value, ErrorObjectOwned> {
    if let Err(error) = &result {
        tracing::debug!(code = error.code.as_str(), message = %error.message, "request failed");
    }
    serde_json::to_value(Envelope::from(result)).map_err(|e| {
        ErrorObjectOwned::owned(-32603, "serialization_failed", Some(e.to_string()))
    })
}

fn parse_revision(revision: &Option<String>) -> WorkflowResult<Option<Revision>> {
    match revision {
        None => Ok(None),
        Some(s) => Revision::parse_opt(s),
    }
}

#[derive(Debug, Deserialize)]
struct TokenParams {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BatchParams {
    token: Option<String>,
    batch_id: i64,
}

#[derive(Debug, Deserialize)]
struct ListBatchesParams {
    token: Option<String>,
    #[serde(default)]
    status: Option<BatchStatus>,
}

#[derive(Debug, Deserialize)]
struct RowParams {
    token: Option<String>,
    batch_id: i64,
    qsa_sequence: u32,
}

#[derive(Debug, Deserialize)]
struct StartPositionParams {
    token: Option<String>,
    batch_id: i64,
    qsa_sequence: u32,
    start_position: u8,
}

#[derive(Debug, Deserialize)]
struct SelectionParams {
    token: Option<String>,
    selections: Vec<Selection>,
    #[serde(default = "default_start_position")]
    start_position: u8,
    #[serde(default)]
    name: Option<String>,
}

fn default_start_position() -> u8 {
    1
}

#[derive(Debug, Deserialize)]
struct GenerateParams {
    token: Option<String>,
    batch_id: i64,
    qsa_sequence: u32,
    #[serde(default)]
    auto_load: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct LookupParams {
    serial: String,
    source_ip: IpAddr,
}

#[derive(Debug, Deserialize)]
struct DetailsParams {
    token: Option<String>,
    serial: String,
}

#[derive(Debug, Deserialize)]
struct DesignParams {
    token: Option<String>,
    design: String,
    #[serde(default)]
    revision: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SetElementParams {
    token: Option<String>,
    design: String,
    #[serde(default)]
    revision: Option<String>,
    position: u8,
    element_type: ElementType,
    origin_x: f64,
    origin_y: f64,
    #[serde(default)]
    rotation: f64,
    #[serde(default)]
    text_height: Option<f64>,
    #[serde(default)]
    element_size: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CsvParams {
    token: Option<String>,
    csv: String,
}

#[derive(Debug, Deserialize)]
struct SkuParams {
    token: Option<String>,
    sku: String,
}

#[derive(Debug, Deserialize)]
struct MappingParams {
    token: Option<String>,
    mapping: MappingUpsert,
}

#[derive(Debug, Deserialize)]
struct MappingUpdateParams {
    token: Option<String>,
    id: i64,
    mapping: MappingUpsert,
}

#[derive(Debug, Deserialize)]
struct MappingDeleteParams {
    token: Option<String>,
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TestPatternParams {
    token: Option<String>,
    pattern: String,
    match_type: MatchType,
    sample: String,
}
