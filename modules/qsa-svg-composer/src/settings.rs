use std::fmt;
use std::str::FromStr;

use qsa_interface::{ErrorCode, WorkflowError, WorkflowResult};
use serde::{Deserialize, Serialize};

/// Whole-document rotation, quarter turns only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    /// No rotation.
    #[default]
    #[serde(rename = "0")]
    R0,
    /// 90 degrees clockwise.
    #[serde(rename = "90")]
    R90,
    /// Upside down.
    #[serde(rename = "180")]
    R180,
    /// 270 degrees clockwise.
    #[serde(rename = "270")]
    R270,
}

impl Rotation {
    /// The angle in degrees.
    pub fn degrees(&self) -> u16 {
        match self {
            Rotation::R0 => 0,
            Rotation::R90 => 90,
            Rotation::R180 => 180,
            Rotation::R270 => 270,
        }
    }

    /// Parses a degree value, refusing anything but a quarter turn.
    pub fn from_degrees(degrees: u16) -> WorkflowResult<Self> {
        match degrees {
            0 => Ok(Rotation::R0),
            90 => Ok(Rotation::R90),
            180 => Ok(Rotation::R180),
            270 => Ok(Rotation::R270),
            other => Err(WorkflowError::validation(
                ErrorCode::InvalidRotation,
                format!("rotation {} is not one of 0/90/180/270", other),
            )),
        }
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.degrees())
    }
}

impl FromStr for Rotation {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let degrees: u16 = s.parse().map_err(|_| {
            WorkflowError::validation(
                ErrorCode::InvalidRotation,
                format!("'{}' is not a rotation", s),
            )
        })?;
        Self::from_degrees(degrees)
    }
}

/// Operator-tunable composition settings, validated and quantized on
/// construction so the composer itself never sees an out-of-range value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComposerSettings {
    /// Whole-document rotation.
    pub rotation: Rotation,
    /// Vertical nudge in millimeters, −5…+5, 0.02 steps.
    pub top_offset_mm: f64,
    /// LED-code inter-character advance multiplier, 0.5…3.0, 0.05 steps.
    pub led_tracking: f64,
}

impl Default for ComposerSettings {
    fn default() -> Self {
        Self {
            rotation: Rotation::R0,
            top_offset_mm: 0.0,
            led_tracking: 1.0,
        }
    }
}

impl ComposerSettings {
    /// Builds settings, quantizing to the configured steps and rejecting
    /// out-of-range values.
    pub fn new(rotation: Rotation, top_offset_mm: f64, led_tracking: f64) -> WorkflowResult<Self> {
        if !(-5.0..=5.0).contains(&top_offset_mm) {
            return Err(WorkflowError::validation(
                ErrorCode::InvalidParams,
                format!("top offset {} outside [-5, 5] mm", top_offset_mm),
            ));
        }
        if !(0.5..=3.0).contains(&led_tracking) {
            return Err(WorkflowError::validation(
                ErrorCode::InvalidParams,
                format!("LED tracking {} outside [0.5, 3.0]", led_tracking),
            ));
        }
        Ok(Self {
            rotation,
            top_offset_mm: quantize(top_offset_mm, 0.02),
            led_tracking: quantize(led_tracking, 0.05),
        })
    }
}

fn quantize(value: f64, step: f64) -> f64 {
    (value / step).round() * step
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantizes_to_steps() {
        let settings = ComposerSettings::new(Rotation::R0, 1.013, 1.52).unwrap();
        assert!((settings.top_offset_mm - 1.02).abs() < 1e-9);
        assert!((settings.led_tracking - 1.5).abs() < 1e-9);
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(ComposerSettings::new(Rotation::R0, 5.1, 1.0).is_err());
        assert!(ComposerSettings::new(Rotation::R0, 0.0, 0.4).is_err());
        assert!(ComposerSettings::new(Rotation::R0, 0.0, 3.2).is_err());
    }

    #[test]
    fn rotation_parses_quarter_turns_only() {
        assert_eq!(Rotation::from_degrees(180).unwrap(), Rotation::R180);
        assert!(Rotation::from_degrees(45).is_err());
        assert_eq!("270".parse::<Rotation>().unwrap(), Rotation::R270);
        assert!("ninety".parse::<Rotation>().is_err());
    }
}
