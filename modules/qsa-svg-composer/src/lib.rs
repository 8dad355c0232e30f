#![doc = include_str!("../README.md")]
#![deny(missing_docs)]

mod document;
mod fmt;
mod font;
mod micro_id;
mod qr;
mod settings;
mod text;

pub use document::{compose, CarrierArt, ModuleArt};
pub use micro_id::{micro_id_bits, MICRO_ID_DOT_DIAMETER_MM, MICRO_ID_DOT_PITCH_MM};
pub use qr::QrCode;
pub use settings::{ComposerSettings, Rotation};

/// Carrier width in millimeters.
pub const CANVAS_WIDTH_MM: f64 = 148.0;
/// Carrier height in millimeters.
pub const CANVAS_HEIGHT_MM: f64 = 113.7;

/// Default text height for the module SKU, millimeters.
pub const MODULE_ID_HEIGHT_MM: f64 = 1.5;
/// Default text height for the serial URL, millimeters.
pub const SERIAL_URL_HEIGHT_MM: f64 = 1.2;
/// Default text height for LED codes, millimeters.
pub const LED_CODE_HEIGHT_MM: f64 = 1.0;
/// Default edge length of the carrier QR code, millimeters.
pub const QR_SIZE_MM: f64 = 3.0;
