use serde::{Deserialize, Serialize};

/// Stable machine codes for every failure the backend can report.
///
/// The UI keys localization and retry behavior off these, so variants are
/// append-only and the snake_case wire form never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Validation
    /// Malformed or missing request parameters.
    InvalidParams,
    /// SKU does not match any accepted shape.
    InvalidSkuFormat,
    /// Serial string is not an 8-digit number in range.
    InvalidSerial,
    /// Unknown config element type.
    InvalidElementType,
    /// Carrier position outside its allowed range.
    InvalidPosition,
    /// Rotation not one of 0/90/180/270.
    InvalidRotation,
    /// Host address is not a valid IPv4/IPv6 literal.
    InvalidIp,
    /// Port outside [1, 65535].
    InvalidPort,
    /// Path missing, not absolute, or otherwise unusable.
    InvalidPath,
    /// Mapping pattern exceeds the stored length limit.
    PatternTooLong,
    /// Mapping pattern is not a compilable regular expression.
    InvalidRegex,
    /// Config set lacks a position-0 qr_code element.
    MissingQrCode,
    /// Config set lacks a module_id element on positions 1-8.
    MissingModuleId,

    // Auth
    /// Capability nonce rejected by the host.
    InvalidNonce,
    /// Caller lacks the engraving capability.
    InsufficientPermissions,
    /// No authenticated caller.
    NotLoggedIn,
    /// Source address exceeded the lookup rate limit.
    RateLimited,

    // State machine
    /// Row is not in the status the operation requires.
    InvalidRowStatus,
    /// Reserved serials already exist for this row.
    SerialsAlreadyReserved,
    /// No reserved serials exist for this row.
    NoReservedSerials,
    /// Commit affected zero rows and none are engraved.
    ZeroSerialsCommitted,
    /// Commit affected zero rows while only part of the row is engraved.
    PartialCommit,
    /// Batch is not in the completed state.
    BatchNotCompleted,
    /// Operation requires modules and found none.
    NoModules,

    // Capacity
    /// The 20-bit serial space is exhausted.
    SerialExhausted,
    /// Not enough serial space left for this reservation.
    InsufficientCapacity,
    /// A design's 5-digit sequence space is exhausted.
    SequenceExhausted,

    // Resolution
    /// One or more modules had missing or invalid LED codes.
    LedResolutionFailed,
    /// Selection carries no LED codes at all.
    NoLedCodes,
    /// Module record is missing data the composer needs.
    MissingModuleData,
    /// No element configuration for the requested (design, revision).
    ConfigNotFound,

    // Storage
    /// Insert statement affected no rows.
    InsertFailed,
    /// Update statement affected no rows.
    UpdateFailed,
    /// Delete statement affected no rows.
    DeleteFailed,
    /// Mapping with the same pattern and match type already exists.
    DuplicatePattern,
    /// Requested record does not exist.
    NotFound,
    /// Transaction failed to commit.
    TransactionFailed,

    // Device
    /// UDP socket could not be created or bound.
    ConnectionFailed,
    /// Workstation did not accept the file command.
    LoadFailed,
    /// Device coupling is disabled by configuration.
    DeviceDisabled,
}

impl ErrorCode {
    /// The stable snake_case wire form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidParams => "invalid_params",
            ErrorCode::InvalidSkuFormat => "invalid_sku_format",
            ErrorCode::InvalidSerial => "invalid_serial",
            ErrorCode::InvalidElementType => "invalid_element_type",
            ErrorCode::InvalidPosition => "invalid_position",
            ErrorCode::InvalidRotation => "invalid_rotation",
            ErrorCode::InvalidIp => "invalid_ip",
            ErrorCode::InvalidPort => "invalid_port",
            ErrorCode::InvalidPath => "invalid_path",
            ErrorCode::PatternTooLong => "pattern_too_long",
            ErrorCode::InvalidRegex => "invalid_regex",
            ErrorCode::MissingQrCode => "missing_qr_code",
            ErrorCode::MissingModuleId => "missing_module_id",
            ErrorCode::InvalidNonce => "invalid_nonce",
            ErrorCode::InsufficientPermissions => "insufficient_permissions",
            ErrorCode::NotLoggedIn => "not_logged_in",
            ErrorCode::RateLimited => "rate_limited",
            ErrorCode::InvalidRowStatus => "invalid_row_status",
            ErrorCode::SerialsAlreadyReserved => "serials_already_reserved",
            ErrorCode::NoReservedSerials => "no_reserved_serials",
            ErrorCode::ZeroSerialsCommitted => "zero_serials_committed",
            ErrorCode::PartialCommit => "partial_commit",
            ErrorCode::BatchNotCompleted => "batch_not_completed",
            ErrorCode::NoModules => "no_modules",
            ErrorCode::SerialExhausted => "serial_exhausted",
            ErrorCode::InsufficientCapacity => "insufficient_capacity",
            ErrorCode::SequenceExhausted => "sequence_exhausted",
            ErrorCode::LedResolutionFailed => "led_resolution_failed",
            ErrorCode::NoLedCodes => "no_led_codes",
            ErrorCode::MissingModuleData => "missing_module_data",
            ErrorCode::ConfigNotFound => "config_not_found",
            ErrorCode::InsertFailed => "insert_failed",
            ErrorCode::UpdateFailed => "update_failed",
            ErrorCode::DeleteFailed => "delete_failed",
            ErrorCode::DuplicatePattern => "duplicate_pattern",
            ErrorCode::NotFound => "not_found",
            ErrorCode::TransactionFailed => "transaction_failed",
            ErrorCode::ConnectionFailed => "connection_failed",
            ErrorCode::LoadFailed => "load_failed",
            ErrorCode::DeviceDisabled => "device_disabled",
        }
    }
}

/// The domain error carried through every fallible path in the backend.
///
/// Storage-level errors are wrapped into one of the storage codes before
/// they cross a component boundary; raw driver errors never escape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct WorkflowError {
    /// Stable machine code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Whether the caller may retry the same request unchanged.
    pub retryable: bool,
}

impl WorkflowError {
    /// A non-retryable error with the given code.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retryable: false,
        }
    }

    /// A validation failure (4xx-class, no side effects).
    pub fn validation(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code, message)
    }

    /// A retryable failure, e.g. a row-lock timeout.
    pub fn retryable(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retryable: true,
        }
    }

    /// A missing-record failure.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// An unexpected internal failure, reported as a transaction error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TransactionFailed, message)
    }
}

/// Convenience alias used across all components.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_serialize_to_snake_case() {
        let json = serde_json::to_string(&ErrorCode::SerialsAlreadyReserved).unwrap();
        assert_eq!(json, "\"serials_already_reserved\"");
        assert_eq!(
            serde_json::from_str::<ErrorCode>("\"partial_commit\"").unwrap(),
            ErrorCode::PartialCommit
        );
    }

    #[test]
    fn as_str_matches_serde_form() {
        for code in [
            ErrorCode::InvalidParams,
            ErrorCode::RateLimited,
            ErrorCode::SequenceExhausted,
            ErrorCode::DeviceDisabled,
        ] {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code.as_str()));
        }
    }

    #[test]
    fn display_is_the_message() {
        let err = WorkflowError::validation(ErrorCode::InvalidSerial, "bad serial");
        assert_eq!(err.to_string(), "bad serial");
        assert!(!err.retryable);
    }
}
