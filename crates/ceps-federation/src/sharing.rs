//! The sharing service: turning a grantee list into permission-grant
//! records.
//!
//! Grantees arrive as request literals (user ids, the `_public`
//! literal, `group:<name>`). Named groups are expanded to their member
//! users before anything is written, so stored grants only ever cover
//! concrete users and the public pseudo-grantee.

use std::sync::Arc;

use ceps_core::{
    DenialError, GrantType, Grantee, PermissionGrant, Stored, UserId,
};
use ceps_store::{GrantFilter, GrantStore, GroupDirectory};

use crate::error::{FederationError, Result};

/// Grant or withdraw access for the resolved grantees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareAction {
    Grant,
    Deny,
}

/// One sharing request against an owner's grant collection.
#[derive(Debug, Clone)]
pub struct ShareRequest {
    pub owner_id: UserId,
    pub requestor_app: ceps_core::AppName,
    pub table_id: ceps_core::TableId,
    pub name: ceps_core::PermissionName,
    pub grant_type: GrantType,
    pub action: ShareAction,

    /// Request-literal grantees: user ids, `_public`, `group:<name>`.
    pub grantees: Vec<String>,

    /// Suppress public listing of a `_public` share.
    pub do_not_list: bool,
}

impl ShareRequest {
    fn validate(&self) -> std::result::Result<(), DenialError> {
        if self.owner_id.is_empty() {
            return Err(DenialError::MissingParameters("owner_id"));
        }
        if self.requestor_app.is_empty() {
            return Err(DenialError::MissingParameters("requestor_app"));
        }
        if self.table_id.is_empty() {
            return Err(DenialError::MissingParameters("table_id"));
        }
        if self.name.is_empty() {
            return Err(DenialError::MissingParameters("name"));
        }
        if self.action == ShareAction::Grant && self.grantees.is_empty() {
            return Err(DenialError::MissingParameters("grantees"));
        }
        Ok(())
    }
}

/// Resolves grantees and writes grant records.
pub struct SharingService<S> {
    store: Arc<S>,
}

impl<S: GrantStore + GroupDirectory> SharingService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Apply a sharing request. Returns the grant records whose grant
    /// set changed; an empty list means the request was already
    /// satisfied.
    pub async fn share_records(
        &self,
        req: &ShareRequest,
        now: i64,
    ) -> Result<Vec<Stored<PermissionGrant>>> {
        req.validate().map_err(FederationError::deny)?;

        match req.action {
            ShareAction::Grant => self.grant(req, now).await,
            ShareAction::Deny => self.deny(req, now).await,
        }
    }

    async fn grant(&self, req: &ShareRequest, now: i64) -> Result<Vec<Stored<PermissionGrant>>> {
        let resolved = self.resolve_grantees(&req.owner_id, &req.grantees).await?;

        let filter = GrantFilter {
            table_id: Some(req.table_id.clone()),
            requestor_app: Some(req.requestor_app.clone()),
            name: Some(req.name.clone()),
            granted: None,
            status: None,
        };
        let existing = self
            .store
            .find_grants(&req.owner_id, &filter)
            .await?
            .into_iter()
            .next();

        let mut grantees = existing
            .as_ref()
            .map(|g| g.record.grantees.clone())
            .unwrap_or_default();
        let mut grew = false;
        for grantee in resolved {
            if !grantees.contains(&grantee) {
                grantees.push(grantee);
                grew = true;
            }
        }

        if let Some(ref existing) = existing {
            if existing.record.is_exercisable() && !grew {
                // Already satisfied; nothing changed.
                return Ok(Vec::new());
            }
        }

        let grant = PermissionGrant {
            table_id: req.table_id.clone(),
            requestor_app: req.requestor_app.clone(),
            name: req.name.clone(),
            grant_type: existing
                .as_ref()
                .map(|g| g.record.grant_type)
                .unwrap_or(req.grant_type),
            grantees,
            granted: true,
            status: ceps_core::GrantStatus::Active,
        };

        if grant.is_public() && !req.do_not_list {
            tracing::info!(
                owner = %req.owner_id,
                table = %req.table_id,
                "public share, eligible for listing"
            );
        }

        let stored = self.store.upsert_grant(&req.owner_id, &grant, now).await?;
        Ok(vec![stored])
    }

    async fn deny(&self, req: &ShareRequest, now: i64) -> Result<Vec<Stored<PermissionGrant>>> {
        // Flip, never remove: the row stays as audit trail.
        let flipped = self
            .store
            .set_granted(
                &req.owner_id,
                &req.table_id,
                &req.requestor_app,
                &req.name,
                false,
                now,
            )
            .await?;
        Ok(flipped.into_iter().collect())
    }

    /// Resolve request literals to concrete grantees.
    ///
    /// A group name resolving to zero groups fails closed; resolving to
    /// more than one is a data-integrity error, not a pick-the-first
    /// situation.
    async fn resolve_grantees(
        &self,
        owner: &UserId,
        literals: &[String],
    ) -> Result<Vec<Grantee>> {
        let mut resolved = Vec::new();
        for literal in literals {
            match Grantee::parse(literal) {
                Grantee::Group(name) => {
                    let groups = self.store.groups_named(owner, &name).await?;
                    match groups.len() {
                        0 => {
                            return Err(FederationError::deny(DenialError::GroupsNotFound(name)))
                        }
                        1 => {
                            for member in &groups[0].record.members {
                                let grantee = Grantee::User(member.clone());
                                if !resolved.contains(&grantee) {
                                    resolved.push(grantee);
                                }
                            }
                        }
                        _ => {
                            return Err(FederationError::deny(DenialError::AmbiguousGroup(name)))
                        }
                    }
                }
                grantee => {
                    if !resolved.contains(&grantee) {
                        resolved.push(grantee);
                    }
                }
            }
        }
        Ok(resolved)
    }
}
