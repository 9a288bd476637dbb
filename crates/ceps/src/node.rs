//! The CEPS node: unified API for the authorization and federation
//! core.
//!
//! A node wires the token ledger, rights resolver, validation exchange,
//! sharing service, and message relay over one store and one transport,
//! and serves inbound federation calls from peer hosts.

use std::sync::Arc;

use async_trait::async_trait;

use ceps_core::{
    now_millis, AppName, Credential, HostId, Message, MessageBox, PermissionGrant, RecordId,
    Stored, TokenValue, UserId, ValidationClaims, ValidationToken,
};
use ceps_federation::{
    ExchangeConfig, FederationError, FederationErrorCode, FederationMessage, HostEndpoint,
    HostTransport, MessageDraft, MessageRelay, ShareRequest, SharingService, ValidationExchange,
    ValidationScope, PROTOCOL_VERSION,
};
use ceps_ledger::{LedgerConfig, TokenLedger, TokenSource};
use ceps_rights::{CapabilitySet, RightsRequest, RightsResolver};
use ceps_store::CepsStore;

use crate::error::Result;

/// Configuration for a CEPS node.
#[derive(Debug, Clone)]
pub struct CepsConfig {
    /// This host's public name. Blank for a standalone deployment that
    /// never federates.
    pub host: HostId,

    /// Token ledger tuning.
    pub ledger: LedgerConfig,

    /// Validation exchange tuning.
    pub exchange: ExchangeConfig,
}

impl Default for CepsConfig {
    fn default() -> Self {
        Self {
            host: HostId::local(),
            ledger: LedgerConfig::default(),
            exchange: ExchangeConfig::default(),
        }
    }
}

impl CepsConfig {
    /// Configuration for a federating host with the given public name.
    pub fn for_host(host: HostId) -> Self {
        Self {
            host,
            ..Self::default()
        }
    }
}

/// The main node struct.
pub struct CepsNode<S, T> {
    store: Arc<S>,
    ledger: Arc<TokenLedger<S>>,
    rights: Arc<RightsResolver<S>>,
    exchange: Arc<ValidationExchange<S>>,
    sharing: SharingService<S>,
    relay: MessageRelay<S, T>,
    host: HostId,
}

impl<S: CepsStore, T: HostTransport> CepsNode<S, T> {
    /// Create a node over a store and a transport.
    pub fn new(store: S, transport: Arc<T>, config: CepsConfig) -> Self {
        let store = Arc::new(store);
        let ledger = Arc::new(TokenLedger::new(Arc::clone(&store), config.ledger));
        let rights = Arc::new(RightsResolver::new(Arc::clone(&store)));
        let exchange = Arc::new(ValidationExchange::new(
            Arc::clone(&store),
            Arc::clone(&ledger),
            config.exchange,
        ));
        let sharing = SharingService::new(Arc::clone(&store));
        let relay = MessageRelay::new(
            Arc::clone(&store),
            Arc::clone(&rights),
            Arc::clone(&exchange),
            transport,
            config.host.clone(),
        );
        Self {
            store,
            ledger,
            rights,
            exchange,
            sharing,
            relay,
            host: config.host,
        }
    }

    /// This host's public name.
    pub fn host(&self) -> &HostId {
        &self.host
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    // ─────────────────────────────────────────────────────────────────────
    // Credentials
    // ─────────────────────────────────────────────────────────────────────

    /// Mint or refresh the account credential for `user` on login.
    pub async fn login(&self, user: &UserId, logged_in: bool) -> Result<Credential> {
        Ok(self
            .ledger
            .issue_account_token(user, logged_in, now_millis())
            .await?)
    }

    /// Mint or read back an app-scoped credential.
    pub async fn issue_app_token(
        &self,
        user: &UserId,
        app: &AppName,
        source: TokenSource,
    ) -> Result<Credential> {
        Ok(self
            .ledger
            .issue_app_token(user, app, source, now_millis())
            .await?)
    }

    /// Validate a presented token value against the declared operation
    /// context.
    pub async fn validate_credential(
        &self,
        token: &TokenValue,
        expected_app: Option<&AppName>,
        session_user: Option<&UserId>,
        source: TokenSource,
    ) -> Result<Credential> {
        Ok(self
            .ledger
            .validate(token, expected_app, session_user, source, now_millis())
            .await?)
    }

    /// Drop a credential on explicit logout.
    pub async fn logout(&self, token: &TokenValue) -> Result<bool> {
        Ok(self.ledger.logout(token).await?)
    }

    /// Drop every credential issued to `user`.
    pub async fn invalidate_user(&self, user: &UserId) -> Result<u64> {
        Ok(self.ledger.invalidate_user(user).await?)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Rights
    // ─────────────────────────────────────────────────────────────────────

    /// Resolve an actor's capability set over a table.
    pub async fn resolve_rights(&self, req: &RightsRequest) -> Result<CapabilitySet> {
        Ok(self.rights.resolve(req, now_millis()).await?)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Validation exchange
    // ─────────────────────────────────────────────────────────────────────

    /// Mint a validation token covering one sharing action.
    pub async fn issue_validation_token(&self, scope: ValidationScope) -> Result<ValidationToken> {
        Ok(self.exchange.set(scope, now_millis()).await?)
    }

    /// Consume a validation token and mint the access credential it
    /// authorizes. The cross-host redemption path.
    pub async fn redeem_validation_token(
        &self,
        token: &TokenValue,
        claims: &ValidationClaims,
    ) -> Result<Credential> {
        Ok(self.exchange.validate(token, claims, now_millis()).await?)
    }

    /// Same-host confirmation that a validation token is live.
    pub async fn verify_validation_token(&self, token: &TokenValue) -> Result<bool> {
        Ok(self.exchange.verify(token, &self.host, now_millis()).await?)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Sharing and relay
    // ─────────────────────────────────────────────────────────────────────

    /// Apply a sharing request on behalf of `actor`.
    ///
    /// The actor must hold share capability over the table: ownership,
    /// or an exercisable `share_records` grant.
    pub async fn share_records(
        &self,
        actor: &UserId,
        req: &ShareRequest,
    ) -> Result<Vec<Stored<PermissionGrant>>> {
        let now = now_millis();
        let caps = self
            .rights
            .resolve(
                &RightsRequest::new(
                    req.owner_id.clone(),
                    req.requestor_app.clone(),
                    actor.clone(),
                    req.table_id.clone(),
                ),
                now,
            )
            .await?;
        caps.require_share(&req.table_id)?;
        Ok(self.sharing.share_records(req, now).await?)
    }

    /// Relay a message from `sender` to its recipient, local or remote.
    pub async fn relay_message(
        &self,
        sender: &UserId,
        draft: MessageDraft,
    ) -> Result<Stored<Message>> {
        Ok(self.relay.initiate(sender, draft, now_millis()).await?)
    }

    /// Accept an inbound message after redeeming its validation
    /// reference. Normally reached through the host endpoint.
    pub async fn receive_message(
        &self,
        validation_token: &TokenValue,
        message: &Message,
    ) -> Result<Stored<Message>> {
        Ok(self
            .relay
            .receive_message(validation_token, message, now_millis())
            .await?)
    }

    /// List one of `owner`'s message boxes, oldest first.
    pub async fn messages(&self, owner: &UserId, mbox: MessageBox) -> Result<Vec<Stored<Message>>> {
        Ok(self.store.list_messages(owner, mbox).await?)
    }

    /// Idempotent check that a message reached `owner`'s inbox.
    pub async fn verify_delivery(&self, owner: &UserId, message_id: &RecordId) -> Result<bool> {
        Ok(self.relay.verify_delivery(owner, message_id).await?)
    }

    /// Flip the read flag on one of `owner`'s inbox messages.
    pub async fn mark_read(&self, owner: &UserId, message_id: &RecordId) -> Result<bool> {
        Ok(self.relay.mark_read(owner, message_id, now_millis()).await?)
    }
}

#[async_trait]
impl<S, T> HostEndpoint for CepsNode<S, T>
where
    S: CepsStore + 'static,
    T: HostTransport + 'static,
{
    async fn handle(&self, request: FederationMessage) -> FederationMessage {
        if let Some(version) = request.protocol_version() {
            if version != PROTOCOL_VERSION {
                return FederationMessage::Error {
                    code: FederationErrorCode::VersionMismatch,
                    message: format!("speaking version {PROTOCOL_VERSION}, got {version}"),
                };
            }
        }

        let now = now_millis();
        match request {
            FederationMessage::Validate {
                validation_token,
                claims,
                ..
            } => match self.exchange.validate(&validation_token, &claims, now).await {
                Ok(cred) => FederationMessage::Validated {
                    validated: true,
                    access_token: Some(cred.token_value),
                    expiry: Some(cred.expiry),
                },
                Err(FederationError::Denied(_)) => FederationMessage::Validated {
                    validated: false,
                    access_token: None,
                    expiry: None,
                },
                Err(e) => internal_error(e),
            },

            FederationMessage::Transmit {
                validation_token,
                message,
                ..
            } => match self.relay.receive_message(&validation_token, &message, now).await {
                Ok(stored) => FederationMessage::Delivered {
                    delivered: true,
                    message_id: Some(stored.meta.id),
                },
                Err(FederationError::Denied(d)) => FederationMessage::denial(&d),
                Err(e) => internal_error(e),
            },

            FederationMessage::Verify {
                validation_token, ..
            } => match self.exchange.verify(&validation_token, &self.host, now).await {
                Ok(verified) => FederationMessage::Verified { verified },
                Err(e) => internal_error(e),
            },

            other => FederationMessage::Error {
                code: FederationErrorCode::InvalidMessage,
                message: format!("not a request: {other:?}"),
            },
        }
    }
}

fn internal_error(e: FederationError) -> FederationMessage {
    tracing::error!(error = %e, "federation request failed");
    FederationMessage::Error {
        code: FederationErrorCode::InternalError,
        message: e.to_string(),
    }
}
