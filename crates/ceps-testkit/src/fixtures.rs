//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: in-memory hosts joined to a
//! shared network, with seeding shortcuts for contacts, groups, and
//! grants.

use std::sync::Arc;

use ceps::{CepsConfig, CepsNode, MemoryNetwork};
use ceps_core::{
    now_millis, AppName, GrantType, Grantee, GroupName, HostId, PermissionGrant, PermissionName,
    TableId, UserId,
};
use ceps_federation::HostEndpoint;
use ceps_store::{Group, GrantStore, MemoryStore};

/// One in-memory host on a shared test network.
pub struct TestHost {
    pub host: HostId,
    pub node: Arc<CepsNode<MemoryStore, MemoryNetwork>>,
}

impl TestHost {
    /// Create a host named `name` and register it on `network`.
    pub async fn join(network: &Arc<MemoryNetwork>, name: &str) -> Self {
        let host = HostId::new(name);
        let node = Arc::new(CepsNode::new(
            MemoryStore::new(),
            Arc::clone(network),
            CepsConfig::for_host(host.clone()),
        ));
        let endpoint: Arc<dyn HostEndpoint> = Arc::clone(&node) as _;
        network.register(host.clone(), endpoint).await;
        Self { host, node }
    }

    /// Seed `(user, host)` into `owner`'s contact list.
    pub fn befriend(&self, owner: &UserId, user: UserId, host: HostId) {
        self.node.store().add_contact(owner, user, host);
    }

    /// Seed a named group into `owner`'s group table.
    pub fn add_group(&self, owner: &UserId, name: &str, members: Vec<UserId>) {
        self.node.store().add_group(
            owner,
            Group {
                name: GroupName::new(name),
                members,
            },
            now_millis(),
        );
    }

    /// Seed a grant into `owner`'s grant collection.
    pub async fn seed_grant(&self, owner: &UserId, grant: PermissionGrant) {
        self.node
            .store()
            .upsert_grant(owner, &grant, now_millis())
            .await
            .expect("seeding a grant into the memory store cannot fail");
    }
}

/// A standalone two-host rig: hosts `a.test` and `b.test` on one
/// network.
pub async fn two_hosts() -> (Arc<MemoryNetwork>, TestHost, TestHost) {
    let network = MemoryNetwork::new();
    let a = TestHost::join(&network, "a.test").await;
    let b = TestHost::join(&network, "b.test").await;
    (network, a, b)
}

/// An accepted messaging grant for `user` over `table` through `app`.
pub fn messaging_grant(
    table: &str,
    app: &str,
    permission: &str,
    grantee: UserId,
) -> PermissionGrant {
    PermissionGrant::new(
        TableId::new(table),
        AppName::new(app),
        PermissionName::new(permission),
        GrantType::MessageRecords,
    )
    .with_grantees(vec![Grantee::User(grantee)])
    .accepted()
}

/// Install a test tracing subscriber. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
