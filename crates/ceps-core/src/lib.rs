//! # CEPS Core
//!
//! Core primitives for the Cross-Entity Permission System: the protocol
//! by which apps, owners and hosts negotiate access to per-user record
//! tables.
//!
//! ## Key Concepts
//!
//! - **Credential**: an issued, scoped, time-bounded proof of identity
//!   (account- or app-level), looked up by its opaque token value.
//! - **Grant**: a persisted record authorizing a specific app to exercise
//!   a specific capability over a specific table, for specific grantees.
//! - **Validation Token**: a short-lived, narrowly-scoped token used to
//!   bootstrap cross-host trust for one sharing or messaging action.
//! - **Message**: a permissioned payload relayed between accounts.
//!
//! Everything here is pure data plus checks; issuance, resolution and
//! federation live in the component crates layered on top.

pub mod credential;
pub mod error;
pub mod grant;
pub mod ids;
pub mod message;
pub mod record;
pub mod time;
pub mod validation;

pub use credential::{Credential, CredentialKind};
pub use error::DenialError;
pub use grant::{GrantStatus, GrantType, Grantee, PermissionGrant};
pub use ids::{
    AppName, GroupName, HostId, PermissionName, RecordId, TableId, TokenValue, UserId,
    ACCOUNT_APP, PUBLIC_GRANTEE, PUBLIC_USER,
};
pub use message::{Message, MessageBox, MessageType};
pub use record::{RecordMeta, Stored};
pub use time::now_millis;
pub use validation::{ValidationClaims, ValidationToken, VALIDATION_TOKEN_TTL_MS};
