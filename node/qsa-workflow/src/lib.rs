#![doc = include_str!("../README.md")]
#![deny(missing_docs)]

mod auth;
mod batches;
mod catalog;
mod engrave;
mod files;
mod lookup;
mod rate_limit;
pub mod rpc;
mod svg_ops;

use std::sync::Arc;

use qsa_batch_store::BatchStore;
use qsa_config_store::ConfigStore;
use qsa_device_coupler::DeviceCoupler;
use qsa_identifier_store::IdentifierStore;
use qsa_serial_store::SerialStore;
use qsa_sku_resolver::SkuResolver;
use qsa_svg_composer::ComposerSettings;

pub use auth::{Caller, CallerResolver, StaticTokenResolver};
pub use batches::{BatchPreview, CarrierPreview, QueueRow, QueueView};
pub use catalog::{AwaitingGroup, AwaitingModule, ModuleCatalog};
pub use engrave::RowActionOutcome;
pub use files::SvgFileManager;
pub use lookup::{SerialDetails, SerialSummary};
pub use rate_limit::{RateLimiter, DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_SECS};
pub use svg_ops::GeneratedSvg;

/// The workflow orchestrator. Cheap to clone; all state lives in the
/// stores it composes.
#[derive(Clone)]
pub struct Workflow {
    serials: SerialStore,
    identifiers: IdentifierStore,
    configs: ConfigStore,
    batches: BatchStore,
    resolver: SkuResolver,
    coupler: DeviceCoupler,
    files: SvgFileManager,
    settings: ComposerSettings,
    catalog: Arc<dyn ModuleCatalog>,
    callers: Arc<dyn CallerResolver>,
    lookup_limiter: Arc<RateLimiter>,
    auto_load: bool,
}

/// Everything needed to assemble a [`Workflow`].
pub struct WorkflowParts {
    /// Serial allocation engine.
    pub serials: SerialStore,
    /// QSA identifier allocator.
    pub identifiers: IdentifierStore,
    /// Element coordinate store.
    pub configs: ConfigStore,
    /// Batch/module store.
    pub batches: BatchStore,
    /// SKU resolver.
    pub resolver: SkuResolver,
    /// Workstation coupler.
    pub coupler: DeviceCoupler,
    /// SVG output directory manager.
    pub files: SvgFileManager,
    /// Composition settings.
    pub settings: ComposerSettings,
    /// Host product catalog.
    pub catalog: Arc<dyn ModuleCatalog>,
    /// Host capability check.
    pub callers: Arc<dyn CallerResolver>,
    /// Public-lookup rate limiter.
    pub lookup_limiter: Arc<RateLimiter>,
    /// Ship freshly generated artwork to the workstation automatically.
    pub auto_load: bool,
}

impl Workflow {
    /// Assembles the orchestrator.
    pub fn new(parts: WorkflowParts) -> Self {
        Self {
            serials: parts.serials,
            identifiers: parts.identifiers,
            configs: parts.configs,
            batches: parts.batches,
            resolver: parts.resolver,
            coupler: parts.coupler,
            files: parts.files,
            settings: parts.settings,
            catalog: parts.catalog,
            callers: parts.callers,
            lookup_limiter: parts.lookup_limiter,
            auto_load: parts.auto_load,
        }
    }

    /// The serial store, for capacity telemetry passthrough.
    pub fn serials(&self) -> &SerialStore {
        &self.serials
    }

    /// The config store, for administration passthrough.
    pub fn configs(&self) -> &ConfigStore {
        &self.configs
    }

    /// The SKU resolver, for mapping administration passthrough.
    pub fn resolver(&self) -> &SkuResolver {
        &self.resolver
    }

    /// The caller resolver, used by the RPC layer.
    pub(crate) fn callers(&self) -> &dyn CallerResolver {
        self.callers.as_ref()
    }
}
