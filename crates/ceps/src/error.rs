//! Error types for the CEPS facade.

use thiserror::Error;

use ceps_core::DenialError;
use ceps_federation::FederationError;
use ceps_ledger::LedgerError;
use ceps_rights::RightsError;
use ceps_store::StoreError;

/// Errors surfaced to the surrounding application.
///
/// The denial taxonomy is preserved through every layer: a caller can
/// always tell an authorization verdict from an infrastructure failure.
#[derive(Debug, Error)]
pub enum CepsError {
    /// Authorization verdict.
    #[error(transparent)]
    Denied(#[from] DenialError),

    /// Backing store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Wire message encode/decode failure.
    #[error("codec error: {0}")]
    Codec(String),

    /// A peer host could not be reached.
    #[error("transport error: {0}")]
    Transport(String),

    /// A peer host answered out of protocol.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<LedgerError> for CepsError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Denied(d) => CepsError::Denied(d),
            LedgerError::Store(s) => CepsError::Store(s),
        }
    }
}

impl From<RightsError> for CepsError {
    fn from(e: RightsError) -> Self {
        match e {
            RightsError::Denied(d) => CepsError::Denied(d),
            RightsError::Store(s) => CepsError::Store(s),
        }
    }
}

impl From<FederationError> for CepsError {
    fn from(e: FederationError) -> Self {
        match e {
            FederationError::Denied(d) => CepsError::Denied(d),
            FederationError::Store(s) => CepsError::Store(s),
            FederationError::Codec(m) => CepsError::Codec(m),
            FederationError::Transport(m) => CepsError::Transport(m),
            FederationError::Protocol(m) => CepsError::Protocol(m),
        }
    }
}

impl CepsError {
    /// The denial verdict, if this error is one.
    pub fn denial(&self) -> Option<&DenialError> {
        match self {
            CepsError::Denied(d) => Some(d),
            _ => None,
        }
    }
}

/// Result type for facade operations.
pub type Result<T> = std::result::Result<T, CepsError>;
