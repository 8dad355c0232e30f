#![doc = include_str!("../README.md")]
#![deny(missing_docs)]

mod envelope;
mod error;
mod layout;
mod qsa_id;
mod serial;
mod status;

pub use envelope::Envelope;
pub use error::{ErrorCode, WorkflowError, WorkflowResult};
pub use layout::{carrier_layout, slot_assignments, CarrierSpan, SlotAssignment, CARRIER_SLOTS};
pub use qsa_id::{Design, QsaId, Revision, QSA_SEQUENCE_MAX};
pub use serial::{SerialInteger, SerialStatus, SERIAL_MAX};
pub use status::{BatchStatus, RowStatus};
