use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ErrorCode, WorkflowError};

/// Highest sequence number a QSA ID can carry (five decimal digits).
pub const QSA_SEQUENCE_MAX: u32 = 99_999;

/// A design code: 1-10 uppercase alphanumerics identifying a module
/// family's geometric layout (`CUBE`, `STAR`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Design(String);

impl Design {
    /// Normalizes to uppercase and validates against `^[A-Z0-9]{1,10}$`.
    pub fn try_new(raw: &str) -> Result<Self, WorkflowError> {
        let normalized = raw.trim().to_ascii_uppercase();
        let valid = !normalized.is_empty()
            && normalized.len() <= 10
            && normalized
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());
        if !valid {
            return Err(WorkflowError::validation(
                ErrorCode::InvalidParams,
                format!("'{}' is not a valid design code", raw),
            ));
        }
        Ok(Self(normalized))
    }

    /// The normalized code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Design {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Design {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_new(s)
    }
}

/// A design revision: a single lowercase letter suffix on native SKUs
/// (`STARa-34924`), or absent for the default revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(char);

impl Revision {
    /// Accepts a single ASCII lowercase letter.
    pub fn try_new(c: char) -> Result<Self, WorkflowError> {
        if !c.is_ascii_lowercase() {
            return Err(WorkflowError::validation(
                ErrorCode::InvalidParams,
                format!("'{}' is not a valid revision letter", c),
            ));
        }
        Ok(Self(c))
    }

    /// Parses an optional revision from a string that is either empty or a
    /// single lowercase letter. The empty string maps to `None`.
    pub fn parse_opt(s: &str) -> Result<Option<Self>, WorkflowError> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (None, _) => Ok(None),
            (Some(c), None) => Self::try_new(c).map(Some),
            _ => Err(WorkflowError::validation(
                ErrorCode::InvalidParams,
                format!("'{}' is not a valid revision", s),
            )),
        }
    }

    /// The revision letter.
    pub fn letter(&self) -> char {
        self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A QSA identifier: design code plus 5-digit zero-padded sequence,
/// e.g. `CUBE00076`. One QSA ID names one logical carrier row and is the
/// payload of the carrier's QR code (`quadi.ca/CUBE00076`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QsaId {
    design: Design,
    sequence: u32,
}

impl QsaId {
    /// Builds an ID from parts, refusing sequences outside `[1, 99999]`.
    pub fn new(design: Design, sequence: u32) -> Result<Self, WorkflowError> {
        if sequence == 0 || sequence > QSA_SEQUENCE_MAX {
            return Err(WorkflowError::validation(
                ErrorCode::InvalidParams,
                format!("QSA sequence {} outside [1, {}]", sequence, QSA_SEQUENCE_MAX),
            ));
        }
        Ok(Self { design, sequence })
    }

    /// The design component.
    pub fn design(&self) -> &Design {
        &self.design
    }

    /// The sequence component.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }
}

impl fmt::Display for QsaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:05}", self.design, self.sequence)
    }
}

impl FromStr for QsaId {
    type Err = WorkflowError;

    /// Parses the concatenated form: everything up to the trailing five
    /// digits is the design, the trailing five digits are the sequence.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            WorkflowError::validation(
                ErrorCode::InvalidParams,
                format!("'{}' is not a valid QSA ID", s),
            )
        };
        if s.len() < 6 {
            return Err(invalid());
        }
        let (design_part, seq_part) = s.split_at(s.len() - 5);
        if !seq_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let sequence: u32 = seq_part.parse().map_err(|_| invalid())?;
        let design = Design::try_new(design_part)?;
        // Round-trip guard: a design ending in digits must not swallow
        // sequence digits, so the normalized form has to reproduce `s`.
        let id = Self::new(design, sequence)?;
        if id.to_string() != s.to_ascii_uppercase() {
            return Err(invalid());
        }
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn formats_with_zero_padding() {
        let id = QsaId::new(Design::try_new("CUBE").unwrap(), 76).unwrap();
        assert_eq!(id.to_string(), "CUBE00076");
    }

    #[test]
    fn parse_inverts_format() {
        let id: QsaId = "STAR00001".parse().unwrap();
        assert_eq!(id.design().as_str(), "STAR");
        assert_eq!(id.sequence(), 1);
    }

    #[test]
    fn rejects_bad_ids() {
        assert!("CUBE".parse::<QsaId>().is_err());
        assert!("CUBE0007".parse::<QsaId>().is_err());
        assert!("CUBE00000".parse::<QsaId>().is_err());
        assert!("cu!e00001".parse::<QsaId>().is_err());
        assert!("TOOLONGDESIGN00001".parse::<QsaId>().is_err());
    }

    #[test]
    fn design_normalizes_case() {
        assert_eq!(Design::try_new("cube").unwrap().as_str(), "CUBE");
        assert!(Design::try_new("").is_err());
        assert!(Design::try_new("CU-BE").is_err());
    }

    #[test]
    fn revision_accepts_single_lowercase() {
        assert_eq!(Revision::parse_opt("a").unwrap().unwrap().letter(), 'a');
        assert_eq!(Revision::parse_opt("").unwrap(), None);
        assert!(Revision::parse_opt("A").is_err());
        assert!(Revision::parse_opt("ab").is_err());
    }

    proptest! {
        #[test]
        fn format_then_parse_is_identity(
            design in "[A-Z0-9]{1,10}",
            sequence in 1u32..=QSA_SEQUENCE_MAX,
        ) {
            let id = QsaId::new(Design::try_new(&design).unwrap(), sequence).unwrap();
            let parsed: QsaId = id.to_string().parse().unwrap();
            prop_assert_eq!(parsed, id);
        }
    }
}
