use qsa_interface::WorkflowResult;
use serde::{Deserialize, Serialize};

/// One module line the host catalog reports as awaiting engraving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwaitingModule {
    /// Module SKU.
    pub sku: String,
    /// Host order id.
    pub order_id: i64,
    /// Source production batch.
    pub production_batch_id: i64,
    /// Modules of this line still to engrave.
    pub quantity: u32,
    /// LED component codes fitted on the module.
    pub led_codes: Vec<String>,
}

/// The product catalog/order database is an external collaborator; the
/// host hands the backend an implementation of this trait.
pub trait ModuleCatalog: Send + Sync {
    /// Every module line currently awaiting engraving.
    fn modules_awaiting(&self) -> WorkflowResult<Vec<AwaitingModule>>;
}

/// Awaiting modules grouped for the selection UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwaitingGroup {
    /// Canonical design code the group resolves to.
    pub design: String,
    /// Host order id.
    pub order_id: i64,
    /// Total modules across the group's lines.
    pub total_quantity: u32,
    /// Whether any line resolved through a legacy mapping.
    pub has_legacy: bool,
    /// The lines themselves.
    pub lines: Vec<AwaitingModule>,
}
