//! Permission grants: persisted records authorizing an app to exercise a
//! capability over a table.
//!
//! A grant is created when an app first requests a capability (ungranted),
//! flipped to `granted = true` by the owning user's explicit accept, and
//! flipped to `status = removed` on revoke. Grants are never hard-deleted;
//! the record is the audit trail.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{AppName, GroupName, PermissionName, TableId, UserId, PUBLIC_GRANTEE};

/// The closed set of capability types a grant can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// Write any record in the table.
    WriteAll,
    /// Write only records whose stored owner field matches the requestor.
    /// The per-record ownership check happens at the call site, not here.
    WriteOwn,
    /// Read any record in the table.
    ReadAll,
    /// Share records from the table with further grantees.
    ShareRecords,
    /// Send permissioned record payloads to other accounts.
    MessageRecords,
}

/// The target of a grant: a user, everyone, or a named group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grantee {
    User(UserId),
    Public,
    Group(GroupName),
}

impl Grantee {
    /// Parse a grantee from its request-literal form.
    ///
    /// `_public` is the reserved everyone literal, `group:<name>` names a
    /// group, and anything else passes through as a user id.
    pub fn parse(literal: &str) -> Self {
        if literal == PUBLIC_GRANTEE {
            Grantee::Public
        } else if let Some(name) = literal.strip_prefix("group:") {
            Grantee::Group(GroupName::new(name))
        } else {
            Grantee::User(UserId::new(literal))
        }
    }

    /// Check whether this grantee covers `user`.
    pub fn covers(&self, user: &UserId) -> bool {
        match self {
            Grantee::User(id) => id == user,
            Grantee::Public => true,
            // Groups are expanded to users before a grant is written;
            // an unexpanded group covers nobody.
            Grantee::Group(_) => false,
        }
    }
}

impl fmt::Display for Grantee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grantee::User(id) => write!(f, "{}", id),
            Grantee::Public => write!(f, "{}", PUBLIC_GRANTEE),
            Grantee::Group(name) => write!(f, "group:{}", name),
        }
    }
}

/// Whether a grant record is live or has been revoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantStatus {
    Active,
    Removed,
}

/// A persisted permission grant.
///
/// `(table_id, requestor_app, name)` is unique within an owner's grant
/// collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    /// The app-qualified table this grant covers.
    pub table_id: TableId,

    /// The app allowed to exercise the grant.
    pub requestor_app: AppName,

    /// Grant name, unique per table × app.
    pub name: PermissionName,

    /// The capability type.
    #[serde(rename = "type")]
    pub grant_type: GrantType,

    /// Who may exercise the grant. Groups are expanded to users when the
    /// sharing service writes the record.
    pub grantees: Vec<Grantee>,

    /// Whether the owning user has accepted the grant. A recorded but
    /// ungranted row is a pending request, not an authorization.
    pub granted: bool,

    /// Active or revoked. Revoked rows stay on disk as audit trail.
    pub status: GrantStatus,
}

impl PermissionGrant {
    /// Create a new, not-yet-granted request row.
    pub fn new(
        table_id: TableId,
        requestor_app: AppName,
        name: PermissionName,
        grant_type: GrantType,
    ) -> Self {
        Self {
            table_id,
            requestor_app,
            name,
            grant_type,
            grantees: Vec::new(),
            granted: false,
            status: GrantStatus::Active,
        }
    }

    /// Set the grantee list.
    pub fn with_grantees(mut self, grantees: Vec<Grantee>) -> Self {
        self.grantees = grantees;
        self
    }

    /// Mark the grant as accepted by the owner.
    pub fn accepted(mut self) -> Self {
        self.granted = true;
        self
    }

    /// An exercisable grant is accepted and not revoked.
    pub fn is_exercisable(&self) -> bool {
        self.granted && self.status == GrantStatus::Active
    }

    /// Check whether any grantee covers `user`.
    pub fn covers(&self, user: &UserId) -> bool {
        self.grantees.iter().any(|g| g.covers(user))
    }

    /// Check whether the grant reaches everyone.
    pub fn is_public(&self) -> bool {
        self.grantees.iter().any(|g| matches!(g, Grantee::Public))
    }
}
