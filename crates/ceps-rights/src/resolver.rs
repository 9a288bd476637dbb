//! The rights resolver: turns (actor, owner, table, grants) into a
//! capability set.

use std::sync::Arc;

use ceps_core::{AppName, DenialError, GrantType, PermissionName, TableId, UserId};
use ceps_store::{GrantFilter, GrantStore};

use crate::capability::CapabilitySet;
use crate::error::{Result, RightsError};
use crate::rules;

/// One rights question: may `requestor_user`, acting through
/// `requestor_app`, touch `owner_id`'s `table_id`?
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RightsRequest {
    pub owner_id: UserId,
    pub requestor_app: AppName,
    pub requestor_user: UserId,
    pub table_id: TableId,

    /// Narrow grant scanning to a single grant name.
    pub permission_hint: Option<PermissionName>,
}

impl RightsRequest {
    pub fn new(
        owner_id: UserId,
        requestor_app: AppName,
        requestor_user: UserId,
        table_id: TableId,
    ) -> Self {
        Self {
            owner_id,
            requestor_app,
            requestor_user,
            table_id,
            permission_hint: None,
        }
    }

    pub fn named(mut self, permission: PermissionName) -> Self {
        self.permission_hint = Some(permission);
        self
    }

    /// All four identifiers are mandatory; a blank one fails closed
    /// before any rule runs.
    pub fn validate(&self) -> std::result::Result<(), DenialError> {
        if self.owner_id.is_empty() {
            return Err(DenialError::MissingParameters("owner_id"));
        }
        if self.requestor_app.is_empty() {
            return Err(DenialError::MissingParameters("requestor_app"));
        }
        if self.requestor_user.is_empty() {
            return Err(DenialError::MissingParameters("requestor_user"));
        }
        if self.table_id.is_empty() {
            return Err(DenialError::MissingParameters("table_id"));
        }
        Ok(())
    }
}

/// Computes capability sets from the system rules and the grant store.
pub struct RightsResolver<G> {
    grants: Arc<G>,
}

impl<G: GrantStore> RightsResolver<G> {
    pub fn new(grants: Arc<G>) -> Self {
        Self { grants }
    }

    /// Resolve a request to its capability set.
    ///
    /// The system rules run first; the first matching rule short
    /// circuits. Otherwise every exercisable grant of the requestor app
    /// on the table contributes its capability flag, and all matching
    /// grants are retained verbatim in the verdict.
    pub async fn resolve(&self, req: &RightsRequest, now: i64) -> Result<CapabilitySet> {
        req.validate().map_err(RightsError::deny)?;

        if let Some(caps) = rules::system_rule(req, now) {
            tracing::debug!(
                owner = %req.owner_id,
                requestor = %req.requestor_user,
                table = %req.table_id,
                "system rule matched"
            );
            return Ok(caps);
        }

        let mut filter =
            GrantFilter::exercisable(req.table_id.clone(), req.requestor_app.clone());
        if let Some(ref name) = req.permission_hint {
            filter = filter.named(name.clone());
        }

        let mut caps = CapabilitySet::none();
        for grant in self.grants.find_grants(&req.owner_id, &filter).await? {
            match grant.record.grant_type {
                GrantType::WriteAll => caps.can_write = true,
                GrantType::WriteOwn => caps.write_own = true,
                GrantType::ReadAll => caps.can_read = true,
                GrantType::ShareRecords => caps.share_records = true,
                GrantType::MessageRecords => {}
            }
            caps.granted.push(grant);
        }

        Ok(caps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ceps_core::{Grantee, PermissionGrant};
    use ceps_store::MemoryStore;

    fn resolver(store: Arc<MemoryStore>) -> RightsResolver<MemoryStore> {
        RightsResolver::new(store)
    }

    fn req(owner: &str, app: &str, user: &str, table: &str) -> RightsRequest {
        RightsRequest::new(
            UserId::new(owner),
            AppName::new(app),
            UserId::new(user),
            TableId::new(table),
        )
    }

    async fn seed(
        store: &MemoryStore,
        owner: &str,
        name: &str,
        grant_type: GrantType,
        granted: bool,
    ) {
        let mut grant = PermissionGrant::new(
            TableId::new("app.notes"),
            AppName::new("app"),
            PermissionName::new(name),
            grant_type,
        )
        .with_grantees(vec![Grantee::User(UserId::new("bob"))]);
        grant.granted = granted;
        store
            .upsert_grant(&UserId::new(owner), &grant, 0)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_blank_identifier_fails_closed() {
        let r = resolver(Arc::new(MemoryStore::new()));
        let err = r.resolve(&req("", "app", "bob", "app.notes"), 0).await.unwrap_err();
        assert!(matches!(
            err,
            RightsError::Denied(DenialError::MissingParameters("owner_id"))
        ));
    }

    #[tokio::test]
    async fn test_no_grants_means_empty_verdict() {
        let r = resolver(Arc::new(MemoryStore::new()));
        let caps = r.resolve(&req("alice", "app", "bob", "app.notes"), 0).await.unwrap();
        assert!(caps.is_empty());
    }

    #[tokio::test]
    async fn test_grants_are_additive() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, "alice", "read", GrantType::ReadAll, true).await;
        seed(&store, "alice", "write", GrantType::WriteOwn, true).await;

        let caps = resolver(store)
            .resolve(&req("alice", "app", "bob", "app.notes"), 0)
            .await
            .unwrap();
        assert!(caps.can_read);
        assert!(caps.write_own);
        assert!(!caps.can_write);
        assert_eq!(caps.granted.len(), 2);
    }

    #[tokio::test]
    async fn test_ungranted_request_rows_contribute_nothing() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, "alice", "read", GrantType::ReadAll, false).await;

        let caps = resolver(store)
            .resolve(&req("alice", "app", "bob", "app.notes"), 0)
            .await
            .unwrap();
        assert!(caps.is_empty());
        assert!(caps.granted.is_empty());
    }

    #[tokio::test]
    async fn test_permission_hint_narrows_scan() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, "alice", "read", GrantType::ReadAll, true).await;
        seed(&store, "alice", "msg", GrantType::MessageRecords, true).await;

        let caps = resolver(store)
            .resolve(
                &req("alice", "app", "bob", "app.notes").named(PermissionName::new("msg")),
                0,
            )
            .await
            .unwrap();
        assert!(!caps.can_read);
        assert_eq!(caps.granted.len(), 1);
        assert!(caps.message_grant(&PermissionName::new("msg")).is_some());
    }

    #[tokio::test]
    async fn test_system_rule_precedes_grants() {
        let store = Arc::new(MemoryStore::new());
        let caps = resolver(store)
            .resolve(&req("alice", "app", "alice", "app.notes"), 0)
            .await
            .unwrap();
        assert!(caps.own_record);
        assert!(caps.granted.is_empty());
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn ident() -> impl Strategy<Value = String> {
            "[a-z][a-z0-9_.]{0,12}"
        }

        proptest! {
            // A blank identifier anywhere fails closed, whatever the
            // other fields hold.
            #[test]
            fn blank_field_always_denied(
                owner in ident(),
                app in ident(),
                user in ident(),
                table in ident(),
                blank in 0usize..4,
            ) {
                let mut req = RightsRequest::new(
                    UserId::new(owner),
                    AppName::new(app),
                    UserId::new(user),
                    TableId::new(table),
                );
                match blank {
                    0 => req.owner_id = UserId::new(""),
                    1 => req.requestor_app = AppName::new(""),
                    2 => req.requestor_user = UserId::new(""),
                    _ => req.table_id = TableId::new(""),
                }
                prop_assert!(matches!(
                    req.validate(),
                    Err(DenialError::MissingParameters(_))
                ));
            }

            // Self-ownership holds for every app-namespaced table.
            #[test]
            fn self_ownership_over_own_namespace(
                user in ident(),
                app in ident(),
                suffix in "[a-z0-9_]{1,8}",
            ) {
                let req = RightsRequest::new(
                    UserId::new(user.clone()),
                    AppName::new(app.clone()),
                    UserId::new(user),
                    TableId::new(format!("{app}.{suffix}")),
                );
                let caps = crate::rules::system_rule(&req, 0).expect("rule must match");
                prop_assert!(caps.own_record);
            }

            // No system rule ever fires for a foreign owner's ordinary
            // table.
            #[test]
            fn foreign_tables_fall_through(
                user in ident(),
                table_suffix in "[a-z0-9_]{1,8}",
            ) {
                let req = RightsRequest::new(
                    UserId::new("owner"),
                    AppName::new("app"),
                    UserId::new(format!("other_{user}")),
                    TableId::new(format!("app.{table_suffix}")),
                );
                prop_assert!(crate::rules::system_rule(&req, 0).is_none());
            }
        }
    }
}
