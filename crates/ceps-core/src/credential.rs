//! Issued credentials: scoped, time-bounded proofs of identity.
//!
//! A credential is minted on login (account scope) or app-token issuance
//! (app scope), refreshed on reuse before expiry, and never otherwise
//! mutated. Validity is purely `now < expiry` plus scope checks done by
//! the ledger.

use serde::{Deserialize, Serialize};

use crate::ids::{AppName, TokenValue, UserId};

/// The scope level of a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    /// Minted on login, scoped to the reserved account app.
    Account,
    /// Minted for a single installed app.
    App,
}

/// A scoped, time-bounded credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Opaque random value; the primary lookup key.
    pub token_value: TokenValue,

    /// Account or app scope.
    pub kind: CredentialKind,

    /// The user this credential acts for.
    pub requestor_id: UserId,

    /// The app this credential is scoped to. Account credentials use the
    /// reserved account app name.
    pub app_name: AppName,

    /// The data owner this credential currently addresses. Defaults to
    /// the requestor; differs only for system apps acting on a target
    /// user's data.
    pub owner_id: UserId,

    /// Whether this credential was minted from an active session rather
    /// than a password-exchange flow.
    pub logged_in: bool,

    /// Expiry, Unix epoch milliseconds. Valid only while `now < expiry`.
    pub expiry: i64,
}

impl Credential {
    /// Mint an account-scoped credential for `user_id`.
    pub fn account(user_id: UserId, logged_in: bool, expiry: i64) -> Self {
        Self {
            token_value: TokenValue::mint(),
            kind: CredentialKind::Account,
            requestor_id: user_id.clone(),
            app_name: AppName::account(),
            owner_id: user_id,
            logged_in,
            expiry,
        }
    }

    /// Mint an app-scoped credential for `user_id` acting through
    /// `app_name`.
    pub fn app(user_id: UserId, app_name: AppName, logged_in: bool, expiry: i64) -> Self {
        Self {
            token_value: TokenValue::mint(),
            kind: CredentialKind::App,
            requestor_id: user_id.clone(),
            app_name,
            owner_id: user_id,
            logged_in,
            expiry,
        }
    }

    /// Re-address the credential at a different data owner.
    pub fn addressing(mut self, owner_id: UserId) -> Self {
        self.owner_id = owner_id;
        self
    }

    /// A credential is valid only while `now < expiry`.
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expiry
    }

    /// Whether this credential carries account scope.
    pub fn is_account(&self) -> bool {
        self.kind == CredentialKind::Account
    }
}
