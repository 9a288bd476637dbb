//! The denial taxonomy.
//!
//! Every authorization failure in CEPS resolves to one of these variants.
//! Absence of proof is denial; nothing here is retried internally. The
//! surrounding application chooses presentation (redirect vs. status
//! code) but must not alter the verdict.

use thiserror::Error;

use crate::ids::{AppName, GroupName, TableId, UserId};

/// A terminal authorization verdict.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DenialError {
    /// No or invalid credential presented.
    #[error("unauthenticated")]
    Unauthenticated,

    /// Credential app scope does not match the declared target app.
    #[error("app mismatch: credential scoped to {credential_app}, operation targets {expected_app}")]
    AppMismatch {
        credential_app: AppName,
        expected_app: AppName,
    },

    /// Authenticated session user differs from the credential's requestor.
    #[error("session mismatch: session user {session_user} is not credential requestor {requestor}")]
    SessionMismatch {
        session_user: UserId,
        requestor: UserId,
    },

    /// Credential outside its time window. Distinguished so callers can
    /// re-authenticate instead of failing hard.
    #[error("credential expired")]
    Expired,

    /// Credential valid but no applicable capability.
    #[error("forbidden: no applicable capability for {table_id}")]
    Forbidden { table_id: TableId },

    /// Caller omitted a required identifier. An integration bug, never a
    /// user-facing retry case.
    #[error("missing parameters: {0}")]
    MissingParameters(&'static str),

    /// Validation token field mismatch.
    #[error("validation state mismatch")]
    StateMismatch,

    /// Validation token absent or already consumed.
    #[error("no validation state found")]
    NoStateFound,

    /// Validation token outside its time window.
    #[error("validation state expired")]
    StateExpired,

    /// A named grantee group does not exist for the owner.
    #[error("no group named {0}")]
    GroupsNotFound(GroupName),

    /// More than one group shares the name: a data-integrity error, not a
    /// pick-the-first situation.
    #[error("multiple groups named {0}")]
    AmbiguousGroup(GroupName),
}

impl DenialError {
    /// Whether this verdict should raise an audit event.
    ///
    /// Time-window expiry is routine; everything else may indicate
    /// probing or misconfiguration.
    pub fn requires_audit(&self) -> bool {
        !matches!(self, DenialError::Expired | DenialError::StateExpired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_is_not_audit_worthy() {
        assert!(!DenialError::Expired.requires_audit());
        assert!(!DenialError::StateExpired.requires_audit());
    }

    #[test]
    fn test_other_denials_are_audit_worthy() {
        assert!(DenialError::Unauthenticated.requires_audit());
        assert!(DenialError::StateMismatch.requires_audit());
        assert!(DenialError::Forbidden {
            table_id: TableId::new("app.notes")
        }
        .requires_audit());
        assert!(DenialError::MissingParameters("owner_id").requires_audit());
    }
}
