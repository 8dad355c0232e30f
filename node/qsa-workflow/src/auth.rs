use std::collections::HashMap;

use qsa_interface::{ErrorCode, WorkflowError, WorkflowResult};
use serde::{Deserialize, Serialize};

/// An authenticated caller as the host application sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// Operator name recorded on reservations and batches.
    pub name: String,
    /// May drive the engraving workflow.
    pub can_engrave: bool,
    /// May read full traceability records.
    pub staff: bool,
}

impl Caller {
    /// Fails unless the caller holds the engraving capability.
    pub fn require_engrave(&self) -> WorkflowResult<()> {
        if !self.can_engrave {
            return Err(WorkflowError::new(
                ErrorCode::InsufficientPermissions,
                format!("{} lacks the engraving capability", self.name),
            ));
        }
        Ok(())
    }

    /// Fails unless the caller is staff.
    pub fn require_staff(&self) -> WorkflowResult<()> {
        if !self.staff {
            return Err(WorkflowError::new(
                ErrorCode::InsufficientPermissions,
                format!("{} is not staff", self.name),
            ));
        }
        Ok(())
    }
}

/// Capability checking is delegated to the host application; the backend
/// only needs tokens resolved into callers.
pub trait CallerResolver: Send + Sync {
    /// Resolves an auth token. `None` means an unauthenticated request.
    fn resolve(&self, token: Option<&str>) -> WorkflowResult<Caller>;
}

/// Token table resolver, the standalone-node implementation: tokens and
/// their callers come straight from the TOML config.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenResolver {
    tokens: HashMap<String, Caller>,
}

impl StaticTokenResolver {
    /// Builds the table.
    pub fn new(tokens: HashMap<String, Caller>) -> Self {
        Self { tokens }
    }
}

impl CallerResolver for StaticTokenResolver {
    fn resolve(&self, token: Option<&str>) -> WorkflowResult<Caller> {
        let token = token.ok_or_else(|| {
            WorkflowError::new(ErrorCode::NotLoggedIn, "request carries no auth token")
        })?;
        self.tokens.get(token).cloned().ok_or_else(|| {
            WorkflowError::new(ErrorCode::InvalidNonce, "auth token is not recognized")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> StaticTokenResolver {
        let mut tokens = HashMap::new();
        tokens.insert(
            "op-token".to_string(),
            Caller {
                name: "jane".into(),
                can_engrave: true,
                staff: false,
            },
        );
        StaticTokenResolver::new(tokens)
    }

    #[test]
    fn resolves_known_tokens() {
        let caller = resolver().resolve(Some("op-token")).unwrap();
        assert_eq!(caller.name, "jane");
        caller.require_engrave().unwrap();
        assert_eq!(
            caller.require_staff().unwrap_err().code,
            ErrorCode::InsufficientPermissions
        );
    }

    #[test]
    fn missing_and_unknown_tokens_have_distinct_codes() {
        assert_eq!(
            resolver().resolve(None).unwrap_err().code,
            ErrorCode::NotLoggedIn
        );
        assert_eq!(
            resolver().resolve(Some("wrong")).unwrap_err().code,
            ErrorCode::InvalidNonce
        );
    }
}
