//! In-memory implementation of the store traits.
//!
//! Primarily for testing. Same semantics as SQLite but nothing survives
//! the process. Thread-safe via RwLock.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use ceps_core::{
    AppName, Credential, GrantStatus, GroupName, HostId, Message, MessageBox, PermissionGrant,
    PermissionName, RecordId, Stored, TableId, TokenValue, UserId, ValidationToken,
};

use crate::error::Result;
use crate::traits::{
    ContactDirectory, CredentialStore, GrantFilter, GrantStore, Group, GroupDirectory,
    MessageStore, ValidationTokenStore,
};

/// In-memory store implementing the full collaborator bundle.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Credentials indexed by token value.
    credentials: HashMap<TokenValue, Credential>,

    /// Grant collections, one per owner.
    grants: HashMap<UserId, Vec<Stored<PermissionGrant>>>,

    /// Live validation tokens. Consumed tokens are removed.
    validation_tokens: HashMap<TokenValue, ValidationToken>,

    /// Message boxes keyed by (owner, box).
    messages: HashMap<(UserId, MessageBox), Vec<Stored<Message>>>,

    /// Group tables, one per owner.
    groups: HashMap<UserId, Vec<Stored<Group>>>,

    /// Contact lists, one per owner.
    contacts: HashMap<UserId, Vec<(UserId, HostId)>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    /// Seed a group into an owner's group table.
    pub fn add_group(&self, owner: &UserId, group: Group, now: i64) {
        let mut inner = self.inner.write().unwrap();
        inner
            .groups
            .entry(owner.clone())
            .or_default()
            .push(Stored::create(group, now));
    }

    /// Seed a contact into an owner's contact list.
    pub fn add_contact(&self, owner: &UserId, user: UserId, host: HostId) {
        let mut inner = self.inner.write().unwrap();
        inner
            .contacts
            .entry(owner.clone())
            .or_default()
            .push((user, host));
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn insert_credential(&self, credential: &Credential) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner
            .credentials
            .insert(credential.token_value.clone(), credential.clone());
        Ok(())
    }

    async fn get_credential(&self, token: &TokenValue) -> Result<Option<Credential>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.credentials.get(token).cloned())
    }

    async fn find_credential(&self, user: &UserId, app: &AppName) -> Result<Option<Credential>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .credentials
            .values()
            .find(|c| &c.requestor_id == user && &c.app_name == app)
            .cloned())
    }

    async fn update_credential_expiry(&self, token: &TokenValue, expiry: i64) -> Result<bool> {
        let mut inner = self.inner.write().unwrap();
        match inner.credentials.get_mut(token) {
            Some(cred) => {
                cred.expiry = expiry;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_credential(&self, token: &TokenValue) -> Result<bool> {
        let mut inner = self.inner.write().unwrap();
        Ok(inner.credentials.remove(token).is_some())
    }

    async fn delete_credentials_for(&self, user: &UserId) -> Result<u64> {
        let mut inner = self.inner.write().unwrap();
        let before = inner.credentials.len();
        inner.credentials.retain(|_, c| &c.requestor_id != user);
        Ok((before - inner.credentials.len()) as u64)
    }
}

#[async_trait]
impl GrantStore for MemoryStore {
    async fn upsert_grant(
        &self,
        owner: &UserId,
        grant: &PermissionGrant,
        now: i64,
    ) -> Result<Stored<PermissionGrant>> {
        let mut inner = self.inner.write().unwrap();
        let rows = inner.grants.entry(owner.clone()).or_default();

        if let Some(existing) = rows.iter_mut().find(|s| {
            s.record.table_id == grant.table_id
                && s.record.requestor_app == grant.requestor_app
                && s.record.name == grant.name
        }) {
            existing.record = grant.clone();
            existing.meta.touch(now);
            return Ok(existing.clone());
        }

        let stored = Stored::create(grant.clone(), now);
        rows.push(stored.clone());
        Ok(stored)
    }

    async fn find_grants(
        &self,
        owner: &UserId,
        filter: &GrantFilter,
    ) -> Result<Vec<Stored<PermissionGrant>>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .grants
            .get(owner)
            .map(|rows| {
                rows.iter()
                    .filter(|s| filter.matches(&s.record))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn set_granted(
        &self,
        owner: &UserId,
        table_id: &TableId,
        requestor_app: &AppName,
        name: &PermissionName,
        granted: bool,
        now: i64,
    ) -> Result<Option<Stored<PermissionGrant>>> {
        let mut inner = self.inner.write().unwrap();
        let Some(rows) = inner.grants.get_mut(owner) else {
            return Ok(None);
        };
        match rows.iter_mut().find(|s| {
            &s.record.table_id == table_id
                && &s.record.requestor_app == requestor_app
                && &s.record.name == name
        }) {
            Some(row) => {
                row.record.granted = granted;
                row.meta.touch(now);
                Ok(Some(row.clone()))
            }
            None => Ok(None),
        }
    }

    async fn set_grant_status(
        &self,
        owner: &UserId,
        table_id: &TableId,
        requestor_app: &AppName,
        name: &PermissionName,
        status: GrantStatus,
        now: i64,
    ) -> Result<Option<Stored<PermissionGrant>>> {
        let mut inner = self.inner.write().unwrap();
        let Some(rows) = inner.grants.get_mut(owner) else {
            return Ok(None);
        };
        match rows.iter_mut().find(|s| {
            &s.record.table_id == table_id
                && &s.record.requestor_app == requestor_app
                && &s.record.name == name
        }) {
            Some(row) => {
                row.record.status = status;
                row.meta.touch(now);
                Ok(Some(row.clone()))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ValidationTokenStore for MemoryStore {
    async fn put_validation_token(&self, token: &ValidationToken) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner
            .validation_tokens
            .insert(token.validation_token.clone(), token.clone());
        Ok(())
    }

    async fn get_validation_token(&self, value: &TokenValue) -> Result<Option<ValidationToken>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.validation_tokens.get(value).cloned())
    }

    async fn take_validation_token(&self, value: &TokenValue) -> Result<Option<ValidationToken>> {
        // Remove under a single write lock: the second of two racing
        // redeemers sees None.
        let mut inner = self.inner.write().unwrap();
        Ok(inner.validation_tokens.remove(value))
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append_message(
        &self,
        owner: &UserId,
        mbox: MessageBox,
        message: &Message,
        now: i64,
    ) -> Result<Stored<Message>> {
        let mut inner = self.inner.write().unwrap();
        let stored = Stored::create(message.clone(), now);
        inner
            .messages
            .entry((owner.clone(), mbox))
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }

    async fn list_messages(&self, owner: &UserId, mbox: MessageBox) -> Result<Vec<Stored<Message>>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .messages
            .get(&(owner.clone(), mbox))
            .cloned()
            .unwrap_or_default())
    }

    async fn find_message(
        &self,
        owner: &UserId,
        mbox: MessageBox,
        id: &RecordId,
    ) -> Result<Option<Stored<Message>>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .messages
            .get(&(owner.clone(), mbox))
            .and_then(|rows| rows.iter().find(|s| &s.meta.id == id))
            .cloned())
    }

    async fn mark_message_read(&self, owner: &UserId, id: &RecordId, now: i64) -> Result<bool> {
        let mut inner = self.inner.write().unwrap();
        let Some(rows) = inner.messages.get_mut(&(owner.clone(), MessageBox::Got)) else {
            return Ok(false);
        };
        match rows.iter_mut().find(|s| &s.meta.id == id) {
            Some(row) => {
                row.record.read = true;
                row.meta.touch(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl GroupDirectory for MemoryStore {
    async fn groups_named(&self, owner: &UserId, name: &GroupName) -> Result<Vec<Stored<Group>>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .groups
            .get(owner)
            .map(|rows| {
                rows.iter()
                    .filter(|s| &s.record.name == name)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl ContactDirectory for MemoryStore {
    async fn is_contact(&self, owner: &UserId, user: &UserId, host: &HostId) -> Result<bool> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .contacts
            .get(owner)
            .map(|rows| rows.iter().any(|(u, h)| u == user && h == host))
            .unwrap_or(false))
    }
}
