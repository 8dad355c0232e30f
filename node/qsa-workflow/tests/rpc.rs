//! Envelope-level tests through the JSON-RPC module.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use jsonrpsee::core::params::ObjectParams;
use qsa_batch_store::BatchStore;
use qsa_config_store::ConfigStore;
use qsa_db::EngraveDb;
use qsa_device_coupler::{DeviceConfig, DeviceCoupler, PathTranslator};
use qsa_identifier_store::IdentifierStore;
use qsa_interface::WorkflowResult;
use qsa_serial_store::{CapacityThresholds, SerialStore};
use qsa_sku_resolver::SkuResolver;
use qsa_svg_composer::ComposerSettings;
use qsa_workflow::rpc::rpc_module;
use qsa_workflow::{
    AwaitingModule, Caller, ModuleCatalog, RateLimiter, StaticTokenResolver, SvgFileManager,
    Workflow, WorkflowParts,
};

struct EmptyCatalog;

impl ModuleCatalog for EmptyCatalog {
    fn modules_awaiting(&self) -> WorkflowResult<Vec<AwaitingModule>> {
        Ok(Vec::new())
    }
}

fn workflow(output: &tempfile::TempDir) -> Workflow {
    let db = EngraveDb::in_memory().unwrap();
    let mut tokens = HashMap::new();
    tokens.insert(
        "op".to_string(),
        Caller {
            name: "jane".into(),
            can_engrave: true,
            staff: true,
        },
    );

    Workflow::new(WorkflowParts {
        serials: SerialStore::new(db.clone(), CapacityThresholds::default()),
        identifiers: IdentifierStore::new(db.clone()),
        configs: ConfigStore::new(db.clone()),
        batches: BatchStore::new(db.clone()),
        resolver: SkuResolver::new(db.clone()),
        coupler: DeviceCoupler::new(
            DeviceConfig {
                enabled: false,
                host: IpAddr::V4(Ipv4Addr::LOCALHOST),
                send_port: 19840,
                recv_port: 19841,
                timeout_secs: 1,
            },
            PathTranslator::default(),
        )
        .unwrap(),
        files: SvgFileManager::new(output.path(), false).unwrap(),
        settings: ComposerSettings::default(),
        catalog: Arc::new(EmptyCatalog),
        callers: Arc::new(StaticTokenResolver::new(tokens)),
        lookup_limiter: Arc::new(RateLimiter::new(Duration::from_secs(60), 5)),
        auto_load: false,
    })
}

#[tokio::test]
async fn create_batch_returns_an_ok_envelope() {
    let output = tempfile::tempdir().unwrap();
    let rpc = rpc_module(workflow(&output)).unwrap();

    let mut params = ObjectParams::new();
    params.insert("token", "op").unwrap();
    params
        .insert(
            "selections",
            serde_json::json!([{
                "sku": "CUBE-00001",
                "order_id": 9001,
                "quantity": 2,
                "production_batch_id": 500,
                "led_codes": ["W2A"],
            }]),
        )
        .unwrap();

    let response: serde_json::Value = rpc.call("engrave_createBatch", params).await.unwrap();
    assert_eq!(response["ok"], serde_json::json!(true));
    assert_eq!(response["data"], serde_json::json!(1));
}

#[tokio::test]
async fn domain_failures_are_envelopes_not_transport_errors() {
    let output = tempfile::tempdir().unwrap();
    let rpc = rpc_module(workflow(&output)).unwrap();

    let mut params = ObjectParams::new();
    params.insert("token", "nope").unwrap();
    params.insert("batch_id", 1).unwrap();
    params.insert("qsa_sequence", 1).unwrap();

    let response: serde_json::Value = rpc.call("engrave_startRow", params).await.unwrap();
    assert_eq!(response["ok"], serde_json::json!(false));
    assert_eq!(response["code"], serde_json::json!("invalid_nonce"));
    assert!(response["message"].is_string());
    assert!(response.get("data").is_none());
}

#[tokio::test]
async fn missing_token_reports_not_logged_in() {
    let output = tempfile::tempdir().unwrap();
    let rpc = rpc_module(workflow(&output)).unwrap();

    let mut params = ObjectParams::new();
    params.insert("batch_id", 1).unwrap();
    params.insert("qsa_sequence", 1).unwrap();

    let response: serde_json::Value = rpc.call("engrave_startRow", params).await.unwrap();
    assert_eq!(response["code"], serde_json::json!("not_logged_in"));
}

#[tokio::test]
async fn public_lookup_needs_no_token() {
    let output = tempfile::tempdir().unwrap();
    let rpc = rpc_module(workflow(&output)).unwrap();

    let mut params = ObjectParams::new();
    params.insert("serial", "00000001").unwrap();
    params.insert("source_ip", "203.0.113.7").unwrap();

    let response: serde_json::Value = rpc.call("serial_lookup", params).await.unwrap();
    assert_eq!(response["ok"], serde_json::json!(true));
    // Unknown serial: ok with a null payload.
    assert_eq!(response["data"], serde_json::Value::Null);
}

#[tokio::test]
async fn capacity_is_exposed_over_rpc() {
    let output = tempfile::tempdir().unwrap();
    let rpc = rpc_module(workflow(&output)).unwrap();

    let mut params = ObjectParams::new();
    params.insert("token", "op").unwrap();

    let response: serde_json::Value = rpc.call("serial_capacity", params).await.unwrap();
    assert_eq!(response["ok"], serde_json::json!(true));
    assert_eq!(response["data"]["highest_assigned"], serde_json::json!(0));
    assert_eq!(response["data"]["remaining"], serde_json::json!(1_048_575));
}
