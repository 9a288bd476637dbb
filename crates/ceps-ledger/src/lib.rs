//! Token ledger for CEPS.
//!
//! Issues, renews, and validates scoped credentials against a credential
//! store, with an in-process bounded-staleness cache. Absence of proof
//! is denial: every failure path resolves to a `DenialError` verdict.

pub mod cache;
pub mod error;
pub mod ledger;

pub use cache::TokenCache;
pub use error::{LedgerError, Result};
pub use ledger::{cookie_name, LedgerConfig, TokenLedger, TokenSource};
