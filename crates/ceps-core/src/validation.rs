//! Validation tokens: short-lived, single-purpose cross-host trust
//! bootstrap.
//!
//! A validation token proves "user A granted permission P over record R
//! to user B at host H" without a standing trust relationship between
//! hosts. It is minted by `set`, checked by `verify` (same host), and
//! consumed by `validate` (remote redemption). Expired tokens are
//! rejected, never resurrected.

use serde::{Deserialize, Serialize};

use crate::ids::{AppName, HostId, PermissionName, RecordId, TableId, TokenValue, UserId};

/// Default validation token lifetime: minutes, not days.
pub const VALIDATION_TOKEN_TTL_MS: i64 = 5 * 60 * 1000;

/// A stored validation token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationToken {
    /// Opaque, unique token value.
    pub validation_token: TokenValue,

    /// The user whose data the token authorizes access to.
    pub data_owner_user: UserId,

    /// The owner's host. Blank means this server.
    pub data_owner_host: HostId,

    /// The user being granted access.
    pub requestor_user: UserId,

    /// The requestor's host.
    pub requestor_host: HostId,

    /// The table the permission covers.
    pub table_id: TableId,

    /// The grant name under which access is authorized.
    pub permission: PermissionName,

    /// The app exercising the permission.
    pub app_id: AppName,

    /// A single record, or `None` to authorize the whole table.
    pub record_id: Option<RecordId>,

    /// Expiry, Unix epoch milliseconds.
    pub expiry: i64,
}

/// The fields a redeemer presents to `validate`.
///
/// Every presented field must match the stored token exactly; any
/// difference is a `StateMismatch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationClaims {
    pub data_owner_user: UserId,
    pub table_id: TableId,
    pub permission: PermissionName,
    pub requestor_user: UserId,
    /// Optional: when present it must match the stored requestor host.
    pub requestor_host: Option<HostId>,
}

impl ValidationToken {
    /// A token is redeemable only while `now < expiry`.
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expiry
    }

    /// Check the presented claims against the stored fields.
    pub fn matches(&self, claims: &ValidationClaims) -> bool {
        if self.data_owner_user != claims.data_owner_user
            || self.table_id != claims.table_id
            || self.permission != claims.permission
            || self.requestor_user != claims.requestor_user
        {
            return false;
        }
        match &claims.requestor_host {
            Some(host) => &self.requestor_host == host,
            None => true,
        }
    }
}
