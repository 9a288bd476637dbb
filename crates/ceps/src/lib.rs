//! # CEPS
//!
//! The authorization and federation core of a multi-tenant personal-data
//! host: credential issuance and validation, capability resolution,
//! one-shot cross-host trust bootstrap, record sharing, and message
//! relay.
//!
//! ## Key concepts
//!
//! - **Credential**: a scoped, time-bounded bearer token, minted on
//!   login (account scope) or per installed app. Valid while
//!   `now < expiry`; absence of proof is denial.
//! - **Capability set**: the rights resolver's verdict for one actor
//!   over one table. A decision table, not a boolean: `write_own` still
//!   needs a per-record ownership check at the call site.
//! - **Validation token**: a short-lived, effectively-once token that
//!   lets a foreign host prove one specific sharing action was
//!   authorized, and nothing else.
//! - **Message relay**: permissioned payloads move outbox to inbox,
//!   locally or across hosts, always through the validation exchange.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ceps::{CepsConfig, CepsNode};
//! use ceps::store::SqliteStore;
//! use ceps::federation::MemoryNetwork;
//! use ceps::core::{HostId, UserId};
//!
//! async fn example() {
//!     let store = SqliteStore::open("ceps.db").unwrap();
//!     let network = MemoryNetwork::new();
//!     let node = CepsNode::new(
//!         store,
//!         network,
//!         CepsConfig::for_host(HostId::new("a.example.org")),
//!     );
//!
//!     let credential = node.login(&UserId::new("alice"), true).await.unwrap();
//!     println!("expires at {}", credential.expiry);
//! }
//! ```

pub mod error;
pub mod node;

// Re-export component crates
pub use ceps_core as core;
pub use ceps_federation as federation;
pub use ceps_ledger as ledger;
pub use ceps_rights as rights;
pub use ceps_store as store;

// Re-export main types for convenience
pub use error::{CepsError, Result};
pub use node::{CepsConfig, CepsNode};

// Re-export commonly used types
pub use ceps_core::{
    AppName, Credential, DenialError, GrantType, Grantee, HostId, Message, MessageBox,
    PermissionGrant, PermissionName, RecordId, TableId, TokenValue, UserId, ValidationClaims,
    ValidationToken,
};
pub use ceps_federation::{
    MemoryNetwork, MessageDraft, ShareAction, ShareRequest, ValidationScope,
};
pub use ceps_ledger::TokenSource;
pub use ceps_rights::{CapabilitySet, RightsRequest};
