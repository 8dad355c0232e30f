use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ErrorCode, WorkflowError};

/// Highest serial the 20-bit code space can carry.
pub const SERIAL_MAX: u32 = (1 << 20) - 1;

/// A 20-bit engraving serial.
///
/// Serials are globally unique, never recycled, and allocated strictly
/// monotonically. The wire form is the 8-digit zero-padded decimal string
/// (`00000076`), which is what gets engraved below the Micro-ID dots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SerialInteger(u32);

impl SerialInteger {
    /// Wraps a raw integer, refusing values outside `[1, SERIAL_MAX]`.
    pub fn new(value: u32) -> Result<Self, WorkflowError> {
        if value == 0 || value > SERIAL_MAX {
            return Err(WorkflowError::validation(
                ErrorCode::InvalidSerial,
                format!("serial {} outside the 20-bit range", value),
            ));
        }
        Ok(Self(value))
    }

    /// The raw integer value.
    pub fn get(&self) -> u32 {
        self.0
    }

    /// The 8-digit zero-padded wire form.
    pub fn padded(&self) -> String {
        format!("{:08}", self.0)
    }

    /// The 20 data bits engraved into the Micro-ID grid, LSB first.
    pub fn data_bits(&self) -> [bool; 20] {
        let mut bits = [false; 20];
        for (i, bit) in bits.iter_mut().enumerate() {
            *bit = (self.0 >> i) & 1 == 1;
        }
        bits
    }
}

impl fmt::Display for SerialInteger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08}", self.0)
    }
}

impl FromStr for SerialInteger {
    type Err = WorkflowError;

    /// Parses the 8-digit wire form. Anything that is not exactly eight
    /// ASCII digits in range is rejected, including unpadded integers.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(WorkflowError::validation(
                ErrorCode::InvalidSerial,
                format!("'{}' is not an 8-digit serial number", s),
            ));
        }
        let value: u32 = s.parse().map_err(|_| {
            WorkflowError::validation(ErrorCode::InvalidSerial, format!("'{}' overflows", s))
        })?;
        Self::new(value)
    }
}

/// Lifecycle state of one allocated serial.
///
/// `Reserved` is the only non-terminal state; `Engraved` and `Voided` are
/// terminal and no transition ever leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerialStatus {
    /// Allocated inside a reservation transaction, not yet engraved.
    Reserved,
    /// Committed after the laser pass. Terminal.
    Engraved,
    /// Abandoned reservation. Terminal; the integer is never reissued.
    Voided,
}

impl SerialStatus {
    /// Database/wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SerialStatus::Reserved => "reserved",
            SerialStatus::Engraved => "engraved",
            SerialStatus::Voided => "voided",
        }
    }

    /// Whether a transition from `self` to `next` is allowed.
    pub fn can_transition_to(&self, next: SerialStatus) -> bool {
        matches!(
            (self, next),
            (SerialStatus::Reserved, SerialStatus::Engraved)
                | (SerialStatus::Reserved, SerialStatus::Voided)
        )
    }
}

impl FromStr for SerialStatus {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reserved" => Ok(SerialStatus::Reserved),
            "engraved" => Ok(SerialStatus::Engraved),
            "voided" => Ok(SerialStatus::Voided),
            other => Err(WorkflowError::internal(format!(
                "unknown serial status '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for SerialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padded_form_round_trips() {
        let serial = SerialInteger::new(76).unwrap();
        assert_eq!(serial.padded(), "00000076");
        assert_eq!("00000076".parse::<SerialInteger>().unwrap(), serial);
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(SerialInteger::new(0).is_err());
        assert!(SerialInteger::new(SERIAL_MAX).is_ok());
        assert!(SerialInteger::new(SERIAL_MAX + 1).is_err());
    }

    #[test]
    fn rejects_unpadded_and_garbage_strings() {
        assert!("76".parse::<SerialInteger>().is_err());
        assert!("0000007a".parse::<SerialInteger>().is_err());
        assert!("000000760".parse::<SerialInteger>().is_err());
        // 8 digits but above the 20-bit ceiling
        assert!("99999999".parse::<SerialInteger>().is_err());
    }

    #[test]
    fn data_bits_are_lsb_first() {
        let bits = SerialInteger::new(0b101).unwrap().data_bits();
        assert!(bits[0]);
        assert!(!bits[1]);
        assert!(bits[2]);
        assert!(bits[3..].iter().all(|b| !b));
    }

    #[test]
    fn only_reserved_transitions_out() {
        use SerialStatus::*;
        assert!(Reserved.can_transition_to(Engraved));
        assert!(Reserved.can_transition_to(Voided));
        assert!(!Engraved.can_transition_to(Voided));
        assert!(!Engraved.can_transition_to(Reserved));
        assert!(!Voided.can_transition_to(Engraved));
        assert!(!Voided.can_transition_to(Reserved));
    }
}
