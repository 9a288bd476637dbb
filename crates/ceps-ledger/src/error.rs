//! Error types for the token ledger.

use thiserror::Error;

use ceps_core::DenialError;
use ceps_store::StoreError;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Authorization verdict: the credential was rejected.
    #[error(transparent)]
    Denied(#[from] DenialError),

    /// Credential store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// Build a denial, emitting an audit event when the verdict warrants
    /// one.
    pub(crate) fn deny(denial: DenialError) -> Self {
        if denial.requires_audit() {
            tracing::warn!(denial = %denial, "credential denied");
        }
        LedgerError::Denied(denial)
    }
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
