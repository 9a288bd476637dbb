//! The capability set: the resolver's verdict for one (actor, table)
//! pair.
//!
//! This is a decision table, not a single boolean. In particular
//! `write_own` authorizes nothing by itself: the caller must still prove
//! the specific record belongs to the requestor before writing.

use ceps_core::{
    DenialError, GrantType, PermissionGrant, PermissionName, Stored, TableId, UserId,
};

/// The computed capabilities of an actor over one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    /// The actor owns the table outright (self-ownership rule). Implies
    /// full read/write/share access.
    pub own_record: bool,

    /// May read any record in the table.
    pub can_read: bool,

    /// May write any record in the table.
    pub can_write: bool,

    /// May write records the actor itself owns. The per-record half of
    /// the check happens at the call site via `authorize_write`.
    pub write_own: bool,

    /// May share records from the table with further grantees.
    pub share_records: bool,

    /// Every grant that contributed to this verdict, verbatim, so the
    /// caller can pick a grant name when more than one applies.
    pub granted: Vec<Stored<PermissionGrant>>,
}

impl CapabilitySet {
    /// The empty verdict: nothing is allowed.
    pub fn none() -> Self {
        Self::default()
    }

    /// Full access through the self-ownership rule.
    pub fn owner() -> Self {
        Self {
            own_record: true,
            ..Self::default()
        }
    }

    /// Read-only access through a fixed system rule.
    pub fn read_only() -> Self {
        Self {
            can_read: true,
            ..Self::default()
        }
    }

    /// Read/write access through a fixed system rule.
    pub fn read_write() -> Self {
        Self {
            can_read: true,
            can_write: true,
            ..Self::default()
        }
    }

    /// Whether any capability at all was granted.
    pub fn is_empty(&self) -> bool {
        !self.own_record
            && !self.can_read
            && !self.can_write
            && !self.write_own
            && !self.share_records
    }

    /// Whether reading the table is allowed.
    pub fn allows_read(&self) -> bool {
        self.own_record || self.can_read
    }

    /// Whether writing an arbitrary record is allowed.
    pub fn allows_write(&self) -> bool {
        self.own_record || self.can_write
    }

    /// Whether sharing records from the table is allowed.
    pub fn allows_share(&self) -> bool {
        self.own_record || self.share_records
    }

    /// The record-level half of the `write_own` split: writing a specific
    /// record is allowed when the table-level verdict permits any write,
    /// or when `write_own` holds and the record's stored owner is the
    /// requestor.
    pub fn authorize_write(&self, requestor: &UserId, record_owner: &UserId) -> bool {
        if self.allows_write() {
            return true;
        }
        self.write_own && record_owner == requestor
    }

    /// The messaging grant with the given name, if one contributed to
    /// this verdict.
    pub fn message_grant(&self, name: &PermissionName) -> Option<&Stored<PermissionGrant>> {
        self.granted.iter().find(|g| {
            g.record.grant_type == GrantType::MessageRecords && &g.record.name == name
        })
    }

    /// Reject with `Forbidden` unless reading is allowed.
    pub fn require_read(&self, table_id: &TableId) -> Result<(), DenialError> {
        if self.allows_read() {
            Ok(())
        } else {
            Err(DenialError::Forbidden {
                table_id: table_id.clone(),
            })
        }
    }

    /// Reject with `Forbidden` unless an arbitrary write is allowed.
    pub fn require_write(&self, table_id: &TableId) -> Result<(), DenialError> {
        if self.allows_write() {
            Ok(())
        } else {
            Err(DenialError::Forbidden {
                table_id: table_id.clone(),
            })
        }
    }

    /// Reject with `Forbidden` unless sharing is allowed.
    pub fn require_share(&self, table_id: &TableId) -> Result<(), DenialError> {
        if self.allows_share() {
            Ok(())
        } else {
            Err(DenialError::Forbidden {
                table_id: table_id.clone(),
            })
        }
    }
}
