//! The token ledger: issuance, renewal, and validation of credentials.
//!
//! All credential state lives in the credential store; the ledger adds
//! the issuance rules, the scope checks, and a bounded-staleness cache
//! in front of the store.

use std::sync::Arc;

use ceps_core::{AppName, Credential, DenialError, TokenValue, UserId};
use ceps_store::CredentialStore;

use crate::cache::TokenCache;
use crate::error::{LedgerError, Result};

/// Which flow a validation request arrived through.
///
/// Page-flow callers hold a browser session: validation slides the
/// credential's expiry window, and an expired credential tears the
/// session down. API-flow callers get read-only validation; nothing is
/// minted or extended on their behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Page,
    Api,
}

/// Ledger tuning knobs.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Lifetime of account and app credentials, Unix ms.
    pub credential_ttl_ms: i64,

    /// Lifetime of access credentials minted by validation-token
    /// redemption. Much shorter than a session credential.
    pub access_token_ttl_ms: i64,

    /// Staleness bound of the in-process token cache.
    pub cache_ttl_ms: i64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            credential_ttl_ms: 24 * 60 * 60 * 1000,
            access_token_ttl_ms: 10 * 60 * 1000,
            cache_ttl_ms: 30 * 1000,
        }
    }
}

/// The cookie a page-flow caller presents its app token in.
pub fn cookie_name(user: &UserId) -> String {
    format!("app_token_{user}")
}

/// Issues, renews, and validates credentials against a credential store.
pub struct TokenLedger<C> {
    store: Arc<C>,
    cache: TokenCache,
    config: LedgerConfig,
}

impl<C: CredentialStore> TokenLedger<C> {
    pub fn new(store: Arc<C>, config: LedgerConfig) -> Self {
        let cache = TokenCache::new(config.cache_ttl_ms);
        Self {
            store,
            cache,
            config,
        }
    }

    /// Mint or refresh the account-scoped credential for `user` on login.
    pub async fn issue_account_token(
        &self,
        user: &UserId,
        logged_in: bool,
        now: i64,
    ) -> Result<Credential> {
        self.issue(user, &AppName::account(), logged_in, now).await
    }

    /// Mint or refresh an app-scoped credential.
    ///
    /// Page-flow callers may regenerate a missing or expired credential;
    /// API-flow callers only ever read back an existing one and are
    /// rejected as `Unauthenticated` when none is live.
    pub async fn issue_app_token(
        &self,
        user: &UserId,
        app: &AppName,
        source: TokenSource,
        now: i64,
    ) -> Result<Credential> {
        match source {
            TokenSource::Page => self.issue(user, app, true, now).await,
            TokenSource::Api => {
                let existing = self.store.find_credential(user, app).await?;
                match existing {
                    Some(cred) if !cred.is_expired(now) => {
                        self.cache.put(cred.clone(), now);
                        Ok(cred)
                    }
                    Some(cred) => {
                        self.forget(&cred.token_value).await?;
                        Err(LedgerError::deny(DenialError::Unauthenticated))
                    }
                    None => Err(LedgerError::deny(DenialError::Unauthenticated)),
                }
            }
        }
    }

    async fn issue(
        &self,
        user: &UserId,
        app: &AppName,
        logged_in: bool,
        now: i64,
    ) -> Result<Credential> {
        let expiry = now + self.config.credential_ttl_ms;

        if let Some(mut cred) = self.store.find_credential(user, app).await? {
            if !cred.is_expired(now) {
                self.store
                    .update_credential_expiry(&cred.token_value, expiry)
                    .await?;
                cred.expiry = expiry;
                self.cache.put(cred.clone(), now);
                tracing::debug!(user = %user, app = %app, "credential refreshed");
                return Ok(cred);
            }
            // Expired leftover; collect it before minting anew.
            self.forget(&cred.token_value).await?;
        }

        let cred = if app.is_account() {
            Credential::account(user.clone(), logged_in, expiry)
        } else {
            Credential::app(user.clone(), app.clone(), logged_in, expiry)
        };
        self.store.insert_credential(&cred).await?;
        self.cache.put(cred.clone(), now);
        tracing::info!(user = %user, app = %app, "credential minted");
        Ok(cred)
    }

    /// Validate a presented token value.
    ///
    /// Lookup is cache-first. An app-scoped credential must match
    /// `expected_app` when one is declared; the reserved account app is
    /// allowed broader reach. A declared `session_user` must match the
    /// credential's requestor. Page-flow success slides the expiry
    /// window; page-flow expiry tears the credential down.
    pub async fn validate(
        &self,
        token: &TokenValue,
        expected_app: Option<&AppName>,
        session_user: Option<&UserId>,
        source: TokenSource,
        now: i64,
    ) -> Result<Credential> {
        let mut cred = match self.lookup(token, now).await? {
            Some(cred) => cred,
            None => return Err(LedgerError::deny(DenialError::Unauthenticated)),
        };

        if cred.is_expired(now) {
            self.cache.invalidate(token);
            if source == TokenSource::Page {
                // Session invalidation: a stale page credential is gone
                // for good, the user logs in again.
                self.store.delete_credential(token).await?;
            }
            return Err(LedgerError::deny(DenialError::Expired));
        }

        if let Some(expected) = expected_app {
            if &cred.app_name != expected && !cred.app_name.is_account() {
                return Err(LedgerError::deny(DenialError::AppMismatch {
                    credential_app: cred.app_name.clone(),
                    expected_app: expected.clone(),
                }));
            }
        }

        if let Some(session_user) = session_user {
            if session_user != &cred.requestor_id {
                return Err(LedgerError::deny(DenialError::SessionMismatch {
                    session_user: session_user.clone(),
                    requestor: cred.requestor_id.clone(),
                }));
            }
        }

        if source == TokenSource::Page {
            let expiry = now + self.config.credential_ttl_ms;
            self.store.update_credential_expiry(token, expiry).await?;
            cred.expiry = expiry;
            self.cache.put(cred.clone(), now);
        }

        Ok(cred)
    }

    /// Mint the short-lived access credential handed out by a successful
    /// cross-host validation-token redemption. Scoped to `app`, acting
    /// for `requestor` against `owner`'s data.
    pub async fn issue_access_token(
        &self,
        requestor: UserId,
        app: AppName,
        owner: UserId,
        now: i64,
    ) -> Result<Credential> {
        let expiry = now + self.config.access_token_ttl_ms;
        let cred = Credential::app(requestor, app, false, expiry).addressing(owner);
        self.store.insert_credential(&cred).await?;
        self.cache.put(cred.clone(), now);
        tracing::info!(
            requestor = %cred.requestor_id,
            owner = %cred.owner_id,
            app = %cred.app_name,
            "access credential minted"
        );
        Ok(cred)
    }

    /// Drop a credential on explicit logout. Returns false if it was
    /// already gone.
    pub async fn logout(&self, token: &TokenValue) -> Result<bool> {
        self.forget(token).await
    }

    /// Drop every credential issued to `user`, store and cache both.
    pub async fn invalidate_user(&self, user: &UserId) -> Result<u64> {
        self.cache.invalidate_user(user);
        Ok(self.store.delete_credentials_for(user).await?)
    }

    async fn lookup(&self, token: &TokenValue, now: i64) -> Result<Option<Credential>> {
        if let Some(cred) = self.cache.get(token, now) {
            return Ok(Some(cred));
        }
        let cred = self.store.get_credential(token).await?;
        if let Some(ref cred) = cred {
            self.cache.put(cred.clone(), now);
        }
        Ok(cred)
    }

    async fn forget(&self, token: &TokenValue) -> Result<bool> {
        self.cache.invalidate(token);
        Ok(self.store.delete_credential(token).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ceps_store::MemoryStore;

    fn ledger() -> TokenLedger<MemoryStore> {
        TokenLedger::new(Arc::new(MemoryStore::new()), LedgerConfig::default())
    }

    fn alice() -> UserId {
        UserId::new("alice")
    }

    #[tokio::test]
    async fn test_account_issue_then_validate() {
        let ledger = ledger();
        let cred = ledger.issue_account_token(&alice(), true, 0).await.unwrap();
        assert!(cred.is_account());

        let validated = ledger
            .validate(&cred.token_value, None, None, TokenSource::Api, 10)
            .await
            .unwrap();
        assert_eq!(validated.requestor_id, alice());
    }

    #[tokio::test]
    async fn test_reissue_refreshes_instead_of_minting() {
        let ledger = ledger();
        let first = ledger.issue_account_token(&alice(), true, 0).await.unwrap();
        let second = ledger
            .issue_account_token(&alice(), true, 100)
            .await
            .unwrap();
        assert_eq!(first.token_value, second.token_value);
        assert!(second.expiry > first.expiry);
    }

    #[tokio::test]
    async fn test_api_issue_never_mints() {
        let ledger = ledger();
        let err = ledger
            .issue_app_token(&alice(), &AppName::new("app"), TokenSource::Api, 0)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Denied(DenialError::Unauthenticated)
        ));

        // After a page-flow mint the API flow reads the same credential.
        let minted = ledger
            .issue_app_token(&alice(), &AppName::new("app"), TokenSource::Page, 0)
            .await
            .unwrap();
        let read = ledger
            .issue_app_token(&alice(), &AppName::new("app"), TokenSource::Api, 10)
            .await
            .unwrap();
        assert_eq!(minted.token_value, read.token_value);
    }

    #[tokio::test]
    async fn test_unknown_token_is_unauthenticated() {
        let ledger = ledger();
        let err = ledger
            .validate(&TokenValue::mint(), None, None, TokenSource::Api, 0)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Denied(DenialError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_app_mismatch_except_account() {
        let ledger = ledger();
        let cred = ledger
            .issue_app_token(&alice(), &AppName::new("app"), TokenSource::Page, 0)
            .await
            .unwrap();

        let err = ledger
            .validate(
                &cred.token_value,
                Some(&AppName::new("other")),
                None,
                TokenSource::Api,
                10,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Denied(DenialError::AppMismatch { .. })
        ));

        // Account credentials pass the app check for any target app.
        let account = ledger.issue_account_token(&alice(), true, 0).await.unwrap();
        ledger
            .validate(
                &account.token_value,
                Some(&AppName::new("other")),
                None,
                TokenSource::Api,
                10,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_session_mismatch() {
        let ledger = ledger();
        let cred = ledger.issue_account_token(&alice(), true, 0).await.unwrap();
        let err = ledger
            .validate(
                &cred.token_value,
                None,
                Some(&UserId::new("mallory")),
                TokenSource::Api,
                10,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Denied(DenialError::SessionMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_page_validation_slides_expiry() {
        let ledger = ledger();
        let cred = ledger.issue_account_token(&alice(), true, 0).await.unwrap();
        let slid = ledger
            .validate(&cred.token_value, None, None, TokenSource::Page, 1000)
            .await
            .unwrap();
        assert_eq!(slid.expiry, 1000 + LedgerConfig::default().credential_ttl_ms);

        // API-flow validation leaves the window alone.
        let read = ledger
            .validate(&cred.token_value, None, None, TokenSource::Api, 2000)
            .await
            .unwrap();
        assert_eq!(read.expiry, slid.expiry);
    }

    #[tokio::test]
    async fn test_expired_page_validation_tears_down() {
        let store = Arc::new(MemoryStore::new());
        let ledger = TokenLedger::new(Arc::clone(&store), LedgerConfig::default());
        let cred = ledger.issue_account_token(&alice(), true, 0).await.unwrap();

        let late = cred.expiry + 1;
        let err = ledger
            .validate(&cred.token_value, None, None, TokenSource::Page, late)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Denied(DenialError::Expired)));

        // The credential itself is gone, not just rejected.
        use ceps_store::CredentialStore;
        assert!(store.get_credential(&cred.token_value).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_api_validation_keeps_row() {
        let store = Arc::new(MemoryStore::new());
        let ledger = TokenLedger::new(Arc::clone(&store), LedgerConfig::default());
        let cred = ledger.issue_account_token(&alice(), true, 0).await.unwrap();

        let late = cred.expiry + 1;
        let err = ledger
            .validate(&cred.token_value, None, None, TokenSource::Api, late)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Denied(DenialError::Expired)));

        use ceps_store::CredentialStore;
        assert!(store.get_credential(&cred.token_value).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_logout_invalidates() {
        let ledger = ledger();
        let cred = ledger.issue_account_token(&alice(), true, 0).await.unwrap();
        assert!(ledger.logout(&cred.token_value).await.unwrap());

        let err = ledger
            .validate(&cred.token_value, None, None, TokenSource::Api, 10)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Denied(DenialError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_access_token_is_short_lived_and_addressed() {
        let ledger = ledger();
        let cred = ledger
            .issue_access_token(
                UserId::new("bob"),
                AppName::new("app"),
                alice(),
                0,
            )
            .await
            .unwrap();
        assert_eq!(cred.owner_id, alice());
        assert_eq!(cred.requestor_id, UserId::new("bob"));
        assert!(!cred.logged_in);
        assert_eq!(cred.expiry, LedgerConfig::default().access_token_ttl_ms);
    }

    #[test]
    fn test_cookie_name_convention() {
        assert_eq!(cookie_name(&alice()), "app_token_alice");
    }
}
