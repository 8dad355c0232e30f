use std::fmt;
use std::str::FromStr;

use qsa_interface::{ErrorCode, WorkflowError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The kinds of element a carrier layout can place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ElementType {
    /// The 5x5 Micro-ID dot grid carrying the serial.
    MicroId,
    /// The carrier-level 2-D code carrying the QSA ID. Position 0 only.
    QrCode,
    /// The module SKU text.
    ModuleId,
    /// The `quadi.ca/{serial}` text.
    SerialUrl,
    /// An LED component code text, index 1-9.
    LedCode(u8),
}

impl ElementType {
    /// Database/wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::MicroId => "micro_id",
            ElementType::QrCode => "qr_code",
            ElementType::ModuleId => "module_id",
            ElementType::SerialUrl => "serial_url",
            ElementType::LedCode(1) => "led_code_1",
            ElementType::LedCode(2) => "led_code_2",
            ElementType::LedCode(3) => "led_code_3",
            ElementType::LedCode(4) => "led_code_4",
            ElementType::LedCode(5) => "led_code_5",
            ElementType::LedCode(6) => "led_code_6",
            ElementType::LedCode(7) => "led_code_7",
            ElementType::LedCode(8) => "led_code_8",
            ElementType::LedCode(9) => "led_code_9",
            ElementType::LedCode(_) => unreachable!("led code index is validated on construction"),
        }
    }

    /// Whether this element lives at the design level (position 0).
    pub fn is_design_level(&self) -> bool {
        matches!(self, ElementType::QrCode)
    }

    /// All element types in declaration order.
    pub fn all() -> impl Iterator<Item = ElementType> {
        [
            ElementType::MicroId,
            ElementType::QrCode,
            ElementType::ModuleId,
            ElementType::SerialUrl,
        ]
        .into_iter()
        .chain((1..=9).map(ElementType::LedCode))
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementType {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "micro_id" => Ok(ElementType::MicroId),
            "qr_code" => Ok(ElementType::QrCode),
            "module_id" => Ok(ElementType::ModuleId),
            "serial_url" => Ok(ElementType::SerialUrl),
            _ => {
                if let Some(index) = s.strip_prefix("led_code_") {
                    if let Ok(n @ 1..=9) = index.parse::<u8>() {
                        return Ok(ElementType::LedCode(n));
                    }
                }
                Err(WorkflowError::validation(
                    ErrorCode::InvalidElementType,
                    format!("unknown element type '{}'", s),
                ))
            }
        }
    }
}

impl Serialize for ElementType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ElementType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
