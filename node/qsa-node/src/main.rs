mod catalog;
mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use qsa_batch_store::BatchStore;
use qsa_config_store::ConfigStore;
use qsa_db::EngraveDb;
use qsa_device_coupler::{DeviceConfig, DeviceCoupler};
use qsa_identifier_store::IdentifierStore;
use qsa_serial_store::SerialStore;
use qsa_sku_resolver::SkuResolver;
use qsa_workflow::rpc::rpc_module;
use qsa_workflow::{RateLimiter, StaticTokenResolver, SvgFileManager, Workflow, WorkflowParts};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::catalog::FileCatalog;
use crate::config::NodeConfig;

#[derive(Debug, Parser)]
#[command(name = "qsa-node", about = "QSA engraving backend server")]
struct Args {
    /// Path of the TOML configuration file.
    #[arg(long, default_value = "qsa_node.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = config::from_toml_path(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    let workflow = build_workflow(&config).context("assembling the workflow")?;
    let rpc = rpc_module(workflow).context("registering rpc methods")?;

    let address = SocketAddr::new(
        config
            .rpc
            .bind_host
            .parse()
            .with_context(|| format!("'{}' is not a bind address", config.rpc.bind_host))?,
        config.rpc.bind_port,
    );
    let server = jsonrpsee::server::ServerBuilder::default()
        .build(address)
        .await
        .with_context(|| format!("binding rpc server on {}", address))?;
    info!(%address, "engraving backend listening");
    let handle = server.start(rpc);

    // The server runs until the process is stopped.
    handle.stopped().await;
    Ok(())
}

fn build_workflow(config: &NodeConfig) -> anyhow::Result<Workflow> {
    let db = EngraveDb::open(&config.storage.db_path).with_context(|| {
        format!("opening database {}", config.storage.db_path.display())
    })?;

    let coupler = DeviceCoupler::new(
        DeviceConfig {
            enabled: config.device.enabled,
            host: config.device_host()?,
            send_port: config.device.send_port,
            recv_port: config.device.recv_port,
            timeout_secs: config.device.udp_timeout_seconds,
        },
        config.path_translator(),
    )?;

    let files = SvgFileManager::new(&config.svg.output_dir, config.svg.keep_svg_files)?;

    Ok(Workflow::new(WorkflowParts {
        serials: SerialStore::new(db.clone(), config.capacity_thresholds()),
        identifiers: IdentifierStore::new(db.clone()),
        configs: ConfigStore::new(db.clone()),
        batches: BatchStore::new(db.clone()),
        resolver: SkuResolver::new(db),
        coupler,
        files,
        settings: config.composer_settings()?,
        catalog: Arc::new(FileCatalog::new(config.catalog_file.clone())),
        callers: Arc::new(StaticTokenResolver::new(config.token_table())),
        lookup_limiter: Arc::new(RateLimiter::new(
            Duration::from_secs(config.lookup.window_seconds),
            config.lookup.max_requests,
        )),
        auto_load: config.svg.auto_load,
    }))
}
