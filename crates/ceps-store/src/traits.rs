//! Store traits: the abstract interfaces for the external collaborators
//! CEPS consumes.
//!
//! The credential store, permission-grant store, validation-token store,
//! message store and the group/contact directories are all generic keyed
//! collections in the surrounding application. These traits pin down
//! exactly the operations the core needs; implementations include SQLite
//! (primary) and in-memory (for tests).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use ceps_core::{
    AppName, Credential, GrantStatus, GroupName, HostId, Message, MessageBox, PermissionGrant,
    PermissionName, RecordId, Stored, TableId, TokenValue, UserId, ValidationToken,
};

use crate::error::Result;

/// Filter for querying an owner's grant collection.
///
/// `None` fields match anything. `matches` gives the reference semantics
/// every backend must agree with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantFilter {
    pub table_id: Option<TableId>,
    pub requestor_app: Option<AppName>,
    pub name: Option<PermissionName>,
    pub granted: Option<bool>,
    pub status: Option<GrantStatus>,
}

impl GrantFilter {
    /// Filter for exercisable grants of `requestor_app` on `table_id`:
    /// granted and still active.
    pub fn exercisable(table_id: TableId, requestor_app: AppName) -> Self {
        Self {
            table_id: Some(table_id),
            requestor_app: Some(requestor_app),
            name: None,
            granted: Some(true),
            status: Some(GrantStatus::Active),
        }
    }

    /// Narrow the filter to a specific grant name.
    pub fn named(mut self, name: PermissionName) -> Self {
        self.name = Some(name);
        self
    }

    /// Reference matching semantics.
    pub fn matches(&self, grant: &PermissionGrant) -> bool {
        if let Some(ref t) = self.table_id {
            if &grant.table_id != t {
                return false;
            }
        }
        if let Some(ref a) = self.requestor_app {
            if &grant.requestor_app != a {
                return false;
            }
        }
        if let Some(ref n) = self.name {
            if &grant.name != n {
                return false;
            }
        }
        if let Some(g) = self.granted {
            if grant.granted != g {
                return false;
            }
        }
        if let Some(s) = self.status {
            if grant.status != s {
                return false;
            }
        }
        true
    }
}

/// A named group of users from an owner's group table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: GroupName,
    pub members: Vec<UserId>,
}

/// Keyed collection of issued credentials, queryable by token value.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Persist a freshly minted credential.
    async fn insert_credential(&self, credential: &Credential) -> Result<()>;

    /// Look up a credential by its token value.
    async fn get_credential(&self, token: &TokenValue) -> Result<Option<Credential>>;

    /// Find the stored credential for `(user, app)`, if any.
    ///
    /// Used at issuance time to refresh an existing credential instead of
    /// minting a second one for the same scope.
    async fn find_credential(&self, user: &UserId, app: &AppName) -> Result<Option<Credential>>;

    /// Extend a credential's expiry (sliding window). Returns false if
    /// the credential no longer exists.
    async fn update_credential_expiry(&self, token: &TokenValue, expiry: i64) -> Result<bool>;

    /// Remove a credential (logout, or lazy garbage collection on an
    /// expired lookup). Returns false if it was already gone.
    async fn delete_credential(&self, token: &TokenValue) -> Result<bool>;

    /// Remove every credential issued to `user`. Returns the count.
    async fn delete_credentials_for(&self, user: &UserId) -> Result<u64>;
}

/// Per-owner collection of permission grants.
///
/// `(table_id, requestor_app, name)` is unique per owner; upsert keys on
/// that triple. Grants are never hard-deleted.
#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Insert or replace the grant for its `(table, app, name)` key.
    /// Creation stamps `_date_created == _date_modified`; replacement
    /// keeps the creation date and touches the modification date.
    async fn upsert_grant(
        &self,
        owner: &UserId,
        grant: &PermissionGrant,
        now: i64,
    ) -> Result<Stored<PermissionGrant>>;

    /// Query the owner's grants.
    async fn find_grants(
        &self,
        owner: &UserId,
        filter: &GrantFilter,
    ) -> Result<Vec<Stored<PermissionGrant>>>;

    /// Flip the `granted` flag. Returns the updated record, or None if
    /// no such grant exists.
    async fn set_granted(
        &self,
        owner: &UserId,
        table_id: &TableId,
        requestor_app: &AppName,
        name: &PermissionName,
        granted: bool,
        now: i64,
    ) -> Result<Option<Stored<PermissionGrant>>>;

    /// Flip the status (revoke keeps the row as audit trail).
    async fn set_grant_status(
        &self,
        owner: &UserId,
        table_id: &TableId,
        requestor_app: &AppName,
        name: &PermissionName,
        status: GrantStatus,
        now: i64,
    ) -> Result<Option<Stored<PermissionGrant>>>;
}

/// Store of live validation tokens.
#[async_trait]
pub trait ValidationTokenStore: Send + Sync {
    /// Store a freshly minted validation token.
    async fn put_validation_token(&self, token: &ValidationToken) -> Result<()>;

    /// Non-consuming lookup, used by the same-host `verify` action.
    async fn get_validation_token(&self, value: &TokenValue) -> Result<Option<ValidationToken>>;

    /// Atomically take an unconsumed token.
    ///
    /// At most one caller ever receives `Some` for a given value: this is
    /// the conditional update that makes `validate` effectively-once under
    /// concurrent redemption.
    async fn take_validation_token(&self, value: &TokenValue) -> Result<Option<ValidationToken>>;
}

/// Per-user sent/got message boxes.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append a message to one of `owner`'s boxes.
    async fn append_message(
        &self,
        owner: &UserId,
        mbox: MessageBox,
        message: &Message,
        now: i64,
    ) -> Result<Stored<Message>>;

    /// List a box, oldest first.
    async fn list_messages(&self, owner: &UserId, mbox: MessageBox) -> Result<Vec<Stored<Message>>>;

    /// Find a message by its store id.
    async fn find_message(
        &self,
        owner: &UserId,
        mbox: MessageBox,
        id: &RecordId,
    ) -> Result<Option<Stored<Message>>>;

    /// Flip the read flag on an inbox message. Returns false if no such
    /// message exists in the owner's `got` box.
    async fn mark_message_read(&self, owner: &UserId, id: &RecordId, now: i64) -> Result<bool>;
}

/// Lookup of an owner's named groups.
#[async_trait]
pub trait GroupDirectory: Send + Sync {
    /// All groups with the given name. Names should be unique; more than
    /// one result is a data-integrity problem the caller must surface.
    async fn groups_named(&self, owner: &UserId, name: &GroupName) -> Result<Vec<Stored<Group>>>;
}

/// Lookup of an owner's contacts.
#[async_trait]
pub trait ContactDirectory: Send + Sync {
    /// Whether `(user, host)` is among `owner`'s contacts.
    async fn is_contact(&self, owner: &UserId, user: &UserId, host: &HostId) -> Result<bool>;
}

/// The full collaborator bundle a CEPS node runs against.
pub trait CepsStore:
    CredentialStore + GrantStore + ValidationTokenStore + MessageStore + GroupDirectory + ContactDirectory
{
}

impl<T> CepsStore for T where
    T: CredentialStore
        + GrantStore
        + ValidationTokenStore
        + MessageStore
        + GroupDirectory
        + ContactDirectory
{
}

#[cfg(test)]
mod tests {
    use super::*;
    use ceps_core::GrantType;

    fn grant() -> PermissionGrant {
        PermissionGrant::new(
            TableId::new("app.notes"),
            AppName::new("app"),
            PermissionName::new("link"),
            GrantType::ReadAll,
        )
        .accepted()
    }

    #[test]
    fn test_exercisable_filter() {
        let f = GrantFilter::exercisable(TableId::new("app.notes"), AppName::new("app"));
        assert!(f.matches(&grant()));

        let mut pending = grant();
        pending.granted = false;
        assert!(!f.matches(&pending));

        let mut removed = grant();
        removed.status = GrantStatus::Removed;
        assert!(!f.matches(&removed));
    }

    #[test]
    fn test_named_filter() {
        let f = GrantFilter::exercisable(TableId::new("app.notes"), AppName::new("app"))
            .named(PermissionName::new("other"));
        assert!(!f.matches(&grant()));
    }

    #[test]
    fn test_default_filter_matches_all() {
        assert!(GrantFilter::default().matches(&grant()));
    }
}
