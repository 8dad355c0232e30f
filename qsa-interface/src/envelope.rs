use serde::{Deserialize, Serialize};

use crate::{ErrorCode, WorkflowError, WorkflowResult};

/// The uniform response shape returned by every request handler.
///
/// Success carries `data`; failure carries `message` and the stable
/// machine `code`. Domain failures are envelopes, not transport errors, so
/// the UI can always deserialize one shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Whether the operation succeeded.
    pub ok: bool,
    /// Payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Human-readable failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Stable machine code on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

impl<T> Envelope<T> {
    /// A success envelope.
    pub fn ok(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            message: None,
            code: None,
        }
    }

    /// A failure envelope from a domain error.
    pub fn err(error: &WorkflowError) -> Self {
        Self {
            ok: false,
            data: None,
            message: Some(error.message.clone()),
            code: Some(error.code),
        }
    }
}

impl<T> From<WorkflowResult<T>> for Envelope<T> {
    fn from(result: WorkflowResult<T>) -> Self {
        match result {
            Ok(data) => Envelope::ok(data),
            Err(e) => Envelope::err(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_omits_error_fields() {
        let json = serde_json::to_string(&Envelope::ok(42u32)).unwrap();
        assert_eq!(json, r#"{"ok":true,"data":42}"#);
    }

    #[test]
    fn failure_carries_code_and_message() {
        let err = WorkflowError::new(ErrorCode::NoModules, "row has no modules");
        let envelope: Envelope<()> = Envelope::err(&err);
        let json = serde_json::to_string(&envelope).unwrap();
        assert_eq!(
            json,
            r#"{"ok":false,"message":"row has no modules","code":"no_modules"}"#
        );
    }
}
