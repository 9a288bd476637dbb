//! Error types for federation operations.

use thiserror::Error;

use ceps_core::DenialError;
use ceps_ledger::LedgerError;
use ceps_rights::RightsError;
use ceps_store::StoreError;

/// Errors that can occur during federation operations.
#[derive(Debug, Error)]
pub enum FederationError {
    /// Authorization verdict.
    #[error(transparent)]
    Denied(#[from] DenialError),

    /// Backing store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Wire message encode/decode failure.
    #[error("codec error: {0}")]
    Codec(String),

    /// The peer host could not be reached or refused the call.
    #[error("transport error: {0}")]
    Transport(String),

    /// The peer answered with something the protocol does not allow
    /// here.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl FederationError {
    pub(crate) fn deny(denial: DenialError) -> Self {
        if denial.requires_audit() {
            tracing::warn!(denial = %denial, "federation denied");
        }
        FederationError::Denied(denial)
    }
}

impl From<LedgerError> for FederationError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Denied(d) => FederationError::Denied(d),
            LedgerError::Store(s) => FederationError::Store(s),
        }
    }
}

impl From<RightsError> for FederationError {
    fn from(e: RightsError) -> Self {
        match e {
            RightsError::Denied(d) => FederationError::Denied(d),
            RightsError::Store(s) => FederationError::Store(s),
        }
    }
}

/// Result type for federation operations.
pub type Result<T> = std::result::Result<T, FederationError>;
