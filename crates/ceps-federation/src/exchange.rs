//! The validation token exchange: one-shot cross-host trust bootstrap.
//!
//! `set` mints a short-lived token scoping exactly one sharing action.
//! `verify` confirms a token on the host that minted it. `validate`
//! consumes the token and, when every presented claim matches, mints the
//! access credential a foreign host uses against local data. This is
//! the only path by which a remote host obtains a usable credential.

use std::sync::Arc;

use ceps_core::{
    AppName, Credential, DenialError, HostId, PermissionName, RecordId, TableId, TokenValue,
    UserId, ValidationClaims, ValidationToken, VALIDATION_TOKEN_TTL_MS,
};
use ceps_ledger::TokenLedger;
use ceps_store::{CredentialStore, ValidationTokenStore};

use crate::error::{FederationError, Result};

/// Exchange tuning knobs.
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    /// Validation token lifetime. Minutes, not days.
    pub token_ttl_ms: i64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            token_ttl_ms: VALIDATION_TOKEN_TTL_MS,
        }
    }
}

/// The scope a new validation token covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationScope {
    pub data_owner_user: UserId,
    pub data_owner_host: HostId,
    pub requestor_user: UserId,
    pub requestor_host: HostId,
    pub table_id: TableId,
    pub permission: PermissionName,
    pub app_id: AppName,
    /// One record, or `None` to scope the whole table.
    pub record_id: Option<RecordId>,
}

/// Issues and redeems validation tokens.
pub struct ValidationExchange<S> {
    store: Arc<S>,
    ledger: Arc<TokenLedger<S>>,
    config: ExchangeConfig,
}

impl<S: ValidationTokenStore + CredentialStore> ValidationExchange<S> {
    pub fn new(store: Arc<S>, ledger: Arc<TokenLedger<S>>, config: ExchangeConfig) -> Self {
        Self {
            store,
            ledger,
            config,
        }
    }

    /// Mint and store a validation token for `scope`.
    pub async fn set(&self, scope: ValidationScope, now: i64) -> Result<ValidationToken> {
        let token = ValidationToken {
            validation_token: TokenValue::mint(),
            data_owner_user: scope.data_owner_user,
            data_owner_host: scope.data_owner_host,
            requestor_user: scope.requestor_user,
            requestor_host: scope.requestor_host,
            table_id: scope.table_id,
            permission: scope.permission,
            app_id: scope.app_id,
            record_id: scope.record_id,
            expiry: now + self.config.token_ttl_ms,
        };
        self.store.put_validation_token(&token).await?;
        tracing::debug!(
            owner = %token.data_owner_user,
            requestor = %token.requestor_user,
            table = %token.table_id,
            "validation token set"
        );
        Ok(token)
    }

    /// Same-host confirmation: the token exists, is unexpired, and was
    /// minted for an exchange whose both ends are this host. Never
    /// consumes the token and never errors on a miss.
    pub async fn verify(&self, value: &TokenValue, local_host: &HostId, now: i64) -> Result<bool> {
        let token = match self.store.get_validation_token(value).await? {
            Some(token) => token,
            None => return Ok(false),
        };
        if token.is_expired(now) {
            return Ok(false);
        }
        Ok(token.data_owner_host.is_local_to(local_host)
            && token.requestor_host.is_local_to(local_host))
    }

    /// Cross-host redemption. Consumes the token atomically, checks every
    /// presented claim against the stored fields, and on success mints
    /// the access credential the redeeming host will use.
    ///
    /// All failures are terminal: the token is gone either way, and the
    /// caller must restart from `set`.
    pub async fn validate(&self, value: &TokenValue, claims: &ValidationClaims, now: i64) -> Result<Credential> {
        let token = match self.store.take_validation_token(value).await? {
            Some(token) => token,
            None => return Err(FederationError::deny(DenialError::NoStateFound)),
        };

        if token.is_expired(now) {
            return Err(FederationError::deny(DenialError::StateExpired));
        }

        if !token.matches(claims) {
            return Err(FederationError::deny(DenialError::StateMismatch));
        }

        let credential = self
            .ledger
            .issue_access_token(
                token.requestor_user.clone(),
                token.app_id.clone(),
                token.data_owner_user.clone(),
                now,
            )
            .await?;
        tracing::info!(
            owner = %token.data_owner_user,
            requestor = %token.requestor_user,
            table = %token.table_id,
            "validation token redeemed"
        );
        Ok(credential)
    }
}
