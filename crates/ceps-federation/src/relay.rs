//! The message relay: moving permissioned payloads between accounts.
//!
//! A message always lands in the sender's outbox first. Delivery to the
//! recipient's inbox goes through the validation exchange: locally via
//! `verify`, across hosts via `Transmit` plus a `Validate` callback
//! from the recipient's host to the sender's.

use std::sync::Arc;

use ceps_core::{
    AppName, DenialError, HostId, Message, MessageBox, MessageType, PermissionName, RecordId,
    Stored, TableId, TokenValue, UserId,
};
use ceps_rights::{RightsRequest, RightsResolver};
use ceps_store::CepsStore;

use crate::error::{FederationError, Result};
use crate::exchange::{ValidationExchange, ValidationScope};
use crate::messages::{FederationMessage, PROTOCOL_VERSION};
use crate::transport::HostTransport;

/// A message as the sending app hands it to the relay.
#[derive(Debug, Clone)]
pub struct MessageDraft {
    pub recipient_id: UserId,
    pub recipient_host: HostId,
    pub messaging_permission: PermissionName,
    pub contact_permission: PermissionName,
    pub table_id: TableId,
    pub record_id: RecordId,
    /// CBOR snapshot of the record at send time.
    pub record: Vec<u8>,
    pub app_id: AppName,
}

/// Relays messages locally or across hosts.
pub struct MessageRelay<S, T> {
    store: Arc<S>,
    rights: Arc<RightsResolver<S>>,
    exchange: Arc<ValidationExchange<S>>,
    transport: Arc<T>,
    local_host: HostId,
}

impl<S: CepsStore, T: HostTransport> MessageRelay<S, T> {
    pub fn new(
        store: Arc<S>,
        rights: Arc<RightsResolver<S>>,
        exchange: Arc<ValidationExchange<S>>,
        transport: Arc<T>,
        local_host: HostId,
    ) -> Self {
        Self {
            store,
            rights,
            exchange,
            transport,
            local_host,
        }
    }

    /// Sender-side entry point.
    ///
    /// Requires the sender to hold `share_records` or an explicit
    /// messaging grant under the declared permission name, and the
    /// recipient to be among the sender's contacts. Writes the outbox
    /// copy, then delivers: locally through `verify`, remotely through
    /// `Transmit`.
    pub async fn initiate(
        &self,
        sender: &UserId,
        draft: MessageDraft,
        now: i64,
    ) -> Result<Stored<Message>> {
        // Unhinted scan: share capability may come from a grant whose
        // name differs from the declared messaging permission. Only the
        // messaging grant itself is looked up by name.
        let caps = self
            .rights
            .resolve(
                &RightsRequest::new(
                    sender.clone(),
                    draft.app_id.clone(),
                    sender.clone(),
                    draft.table_id.clone(),
                ),
                now,
            )
            .await?;
        if !caps.allows_share() && caps.message_grant(&draft.messaging_permission).is_none() {
            return Err(FederationError::deny(DenialError::Forbidden {
                table_id: draft.table_id,
            }));
        }

        if !self
            .store
            .is_contact(sender, &draft.recipient_id, &draft.recipient_host)
            .await?
        {
            return Err(FederationError::deny(DenialError::Forbidden {
                table_id: TableId::contacts(),
            }));
        }

        let message = Message {
            sender_id: sender.clone(),
            sender_host: self.local_host.clone(),
            recipient_id: draft.recipient_id,
            recipient_host: draft.recipient_host,
            message_type: MessageType::MessageRecords,
            messaging_permission: draft.messaging_permission,
            contact_permission: draft.contact_permission,
            table_id: draft.table_id,
            record_id: draft.record_id,
            record: draft.record,
            app_id: draft.app_id,
            read: false,
        };

        let sent = self
            .store
            .append_message(sender, MessageBox::Sent, &message, now)
            .await?;

        let token = self
            .exchange
            .set(
                ValidationScope {
                    data_owner_user: message.sender_id.clone(),
                    data_owner_host: self.local_host.clone(),
                    requestor_user: message.recipient_id.clone(),
                    requestor_host: message.recipient_host.clone(),
                    table_id: message.table_id.clone(),
                    permission: message.messaging_permission.clone(),
                    app_id: message.app_id.clone(),
                    record_id: Some(message.record_id.clone()),
                },
                now,
            )
            .await?;

        if message.is_local_to(&self.local_host) {
            self.deliver_local(&token.validation_token, &message, now).await?;
        } else {
            self.deliver_remote(&token.validation_token, &message).await?;
        }

        tracing::info!(
            sender = %message.sender_id,
            recipient = %message.recipient_id,
            host = %message.recipient_host,
            "message relayed"
        );
        Ok(sent)
    }

    /// Local fast path: no wire hop, but the delivery still passes the
    /// validation exchange.
    async fn deliver_local(
        &self,
        token: &TokenValue,
        message: &Message,
        now: i64,
    ) -> Result<()> {
        if !self.exchange.verify(token, &self.local_host, now).await? {
            return Err(FederationError::deny(DenialError::NoStateFound));
        }
        self.store
            .append_message(&message.recipient_id, MessageBox::Got, message, now)
            .await?;
        Ok(())
    }

    async fn deliver_remote(&self, token: &TokenValue, message: &Message) -> Result<()> {
        let response = self
            .transport
            .call(
                &message.recipient_host,
                FederationMessage::Transmit {
                    protocol_version: PROTOCOL_VERSION,
                    validation_token: token.clone(),
                    message: message.clone(),
                },
            )
            .await?;
        match response {
            FederationMessage::Delivered { delivered: true, .. } => Ok(()),
            FederationMessage::Delivered { delivered: false, .. } => Err(
                FederationError::Protocol("peer refused delivery".into()),
            ),
            FederationMessage::Error { code, message } => Err(FederationError::Protocol(
                format!("peer answered {code:?}: {message}"),
            )),
            other => Err(FederationError::Protocol(format!(
                "unexpected answer to Transmit: {other:?}"
            ))),
        }
    }

    /// Recipient-side entry point, reached from the host endpoint.
    ///
    /// Redeems the accompanying validation reference before accepting
    /// the payload: a local `verify` when the sender lives here, a
    /// `Validate` callback to the sender's host otherwise.
    pub async fn receive_message(
        &self,
        validation_token: &TokenValue,
        message: &Message,
        now: i64,
    ) -> Result<Stored<Message>> {
        if message.sender_host.is_local_to(&self.local_host) {
            if !self
                .exchange
                .verify(validation_token, &self.local_host, now)
                .await?
            {
                return Err(FederationError::deny(DenialError::NoStateFound));
            }
        } else {
            self.validate_with_sender(validation_token, message).await?;
        }

        let mut inbound = message.clone();
        inbound.read = false;
        let stored = self
            .store
            .append_message(&message.recipient_id, MessageBox::Got, &inbound, now)
            .await?;
        tracing::info!(
            sender = %message.sender_id,
            recipient = %message.recipient_id,
            "message accepted"
        );
        Ok(stored)
    }

    async fn validate_with_sender(
        &self,
        validation_token: &TokenValue,
        message: &Message,
    ) -> Result<()> {
        let response = self
            .transport
            .call(
                &message.sender_host,
                FederationMessage::Validate {
                    protocol_version: PROTOCOL_VERSION,
                    validation_token: validation_token.clone(),
                    claims: ceps_core::ValidationClaims {
                        data_owner_user: message.sender_id.clone(),
                        table_id: message.table_id.clone(),
                        permission: message.messaging_permission.clone(),
                        requestor_user: message.recipient_id.clone(),
                        requestor_host: Some(self.local_host.clone()),
                    },
                    app_id: message.app_id.clone(),
                },
            )
            .await?;
        match response {
            FederationMessage::Validated { validated: true, .. } => Ok(()),
            FederationMessage::Validated { validated: false, .. }
            | FederationMessage::Error { .. } => {
                Err(FederationError::deny(DenialError::NoStateFound))
            }
            other => Err(FederationError::Protocol(format!(
                "unexpected answer to Validate: {other:?}"
            ))),
        }
    }

    /// Idempotent check that a message reached `owner`'s inbox.
    pub async fn verify_delivery(&self, owner: &UserId, message_id: &RecordId) -> Result<bool> {
        Ok(self
            .store
            .find_message(owner, MessageBox::Got, message_id)
            .await?
            .is_some())
    }

    /// Flip the read flag on an inbox message. The caller must be the
    /// inbox owner; no further authorization applies.
    pub async fn mark_read(&self, owner: &UserId, message_id: &RecordId, now: i64) -> Result<bool> {
        Ok(self.store.mark_message_read(owner, message_id, now).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::ExchangeConfig;
    use crate::transport::memory::MemoryNetwork;
    use ceps_core::{GrantType, Grantee, PermissionGrant};
    use ceps_ledger::{LedgerConfig, TokenLedger};
    use ceps_store::{GrantStore, MemoryStore, MessageStore};

    fn alice() -> UserId {
        UserId::new("alice")
    }

    fn bob() -> UserId {
        UserId::new("bob")
    }

    fn here() -> HostId {
        HostId::new("a.example.org")
    }

    async fn relay_with_store() -> (MessageRelay<MemoryStore, MemoryNetwork>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(TokenLedger::new(Arc::clone(&store), LedgerConfig::default()));
        let exchange = Arc::new(ValidationExchange::new(
            Arc::clone(&store),
            ledger,
            ExchangeConfig::default(),
        ));
        let rights = Arc::new(RightsResolver::new(Arc::clone(&store)));
        let relay = MessageRelay::new(
            Arc::clone(&store),
            rights,
            exchange,
            MemoryNetwork::new(),
            here(),
        );
        (relay, store)
    }

    // A table outside the sending app's namespace, so authorization
    // must come from a grant rather than the self-ownership rule.
    fn shared_table() -> TableId {
        TableId::new("journal.entries")
    }

    fn draft() -> MessageDraft {
        MessageDraft {
            recipient_id: bob(),
            recipient_host: here(),
            messaging_permission: PermissionName::new("link"),
            contact_permission: PermissionName::new("friends"),
            table_id: shared_table(),
            record_id: RecordId::new("r1"),
            record: vec![0x01],
            app_id: AppName::new("app"),
        }
    }

    async fn seed_messaging_grant(store: &MemoryStore) {
        let grant = PermissionGrant::new(
            shared_table(),
            AppName::new("app"),
            PermissionName::new("link"),
            GrantType::MessageRecords,
        )
        .with_grantees(vec![Grantee::User(bob())])
        .accepted();
        store.upsert_grant(&alice(), &grant, 0).await.unwrap();
    }

    #[tokio::test]
    async fn test_local_relay_lands_in_both_boxes() {
        let (relay, store) = relay_with_store().await;
        seed_messaging_grant(&store).await;
        store.add_contact(&alice(), bob(), here());

        let sent = relay.initiate(&alice(), draft(), 100).await.unwrap();
        assert_eq!(sent.record.sender_id, alice());

        let inbox = store.list_messages(&bob(), MessageBox::Got).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].record.record_id, RecordId::new("r1"));
        assert!(!inbox[0].record.read);

        assert!(relay.verify_delivery(&bob(), &inbox[0].meta.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_initiate_without_grant_is_forbidden() {
        let (relay, store) = relay_with_store().await;
        store.add_contact(&alice(), bob(), here());

        let err = relay.initiate(&alice(), draft(), 100).await.unwrap_err();
        assert!(matches!(
            err,
            FederationError::Denied(DenialError::Forbidden { .. })
        ));

        // Nothing hit the outbox.
        let outbox = store.list_messages(&alice(), MessageBox::Sent).await.unwrap();
        assert!(outbox.is_empty());
    }

    #[tokio::test]
    async fn test_initiate_to_non_contact_is_forbidden() {
        let (relay, store) = relay_with_store().await;
        seed_messaging_grant(&store).await;

        let err = relay.initiate(&alice(), draft(), 100).await.unwrap_err();
        assert!(matches!(
            err,
            FederationError::Denied(DenialError::Forbidden { table_id })
                if table_id == TableId::contacts()
        ));
    }

    #[tokio::test]
    async fn test_share_capability_also_authorizes() {
        let (relay, store) = relay_with_store().await;
        store.add_contact(&alice(), bob(), here());
        // The share grant's name need not match the declared messaging
        // permission; share capability is table-wide.
        let grant = PermissionGrant::new(
            shared_table(),
            AppName::new("app"),
            PermissionName::new("broadcast"),
            GrantType::ShareRecords,
        )
        .accepted();
        store.upsert_grant(&alice(), &grant, 0).await.unwrap();

        relay.initiate(&alice(), draft(), 100).await.unwrap();
    }

    #[tokio::test]
    async fn test_mark_read_only_touches_inbox() {
        let (relay, store) = relay_with_store().await;
        seed_messaging_grant(&store).await;
        store.add_contact(&alice(), bob(), here());
        relay.initiate(&alice(), draft(), 100).await.unwrap();

        let inbox = store.list_messages(&bob(), MessageBox::Got).await.unwrap();
        assert!(relay.mark_read(&bob(), &inbox[0].meta.id, 200).await.unwrap());

        // The outbox copy keeps its read flag.
        let outbox = store.list_messages(&alice(), MessageBox::Sent).await.unwrap();
        assert!(!outbox[0].record.read);

        // Unknown id flips nothing.
        assert!(!relay.mark_read(&bob(), &RecordId::new("nope"), 200).await.unwrap());
    }
}
