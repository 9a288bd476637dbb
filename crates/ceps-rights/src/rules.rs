//! The fixed system rules, evaluated in order before any grant is
//! consulted. First match wins; no match falls through to grant
//! scanning.

use ceps_core::{
    AppName, GrantType, PermissionGrant, PermissionName, Stored, TableId, UserId,
};

use crate::capability::CapabilitySet;
use crate::resolver::RightsRequest;

/// The fixed app that owns the private-feed code table.
pub const FEEDS_APP: &str = "system.feeds";

/// The fixed app that owns the public-record index.
pub const PUBLIC_INDEX_APP: &str = "system.public";

/// The name carried by synthetic platform grants attached by rule, not
/// stored anywhere.
pub const PLATFORM_GRANT_NAME: &str = "platform";

/// The rule table, in evaluation order. A new system table is added by
/// appending a rule, not by editing control flow.
const SYSTEM_RULES: &[fn(&RightsRequest, i64) -> Option<CapabilitySet>] = &[
    self_ownership,
    message_box_self_query,
    account_system_tables,
    platform_tables,
];

/// Evaluate the ordered system rules. Returns the short-circuit verdict
/// of the first matching rule, or `None` to fall through to grant
/// scanning.
pub fn system_rule(req: &RightsRequest, now: i64) -> Option<CapabilitySet> {
    SYSTEM_RULES.iter().find_map(|rule| rule(req, now))
}

/// An app never needs a grant to touch its own tables for its own
/// owning user. The reserved account app reaches every table of its own
/// user.
fn self_ownership(req: &RightsRequest, _now: i64) -> Option<CapabilitySet> {
    if req.requestor_user == req.owner_id
        && (req.table_id.is_namespaced_under(&req.requestor_app)
            || req.requestor_app.is_account())
    {
        return Some(CapabilitySet::owner());
    }
    None
}

/// A user's message boxes are readable by any app querying on behalf of
/// that same user; the store layer scopes the query to the app's own
/// messages.
fn message_box_self_query(req: &RightsRequest, _now: i64) -> Option<CapabilitySet> {
    if req.table_id.is_message_box() && req.requestor_user == req.owner_id {
        return Some(CapabilitySet::read_only());
    }
    None
}

/// The account app manages its own user's contacts, groups, and message
/// boxes.
fn account_system_tables(req: &RightsRequest, _now: i64) -> Option<CapabilitySet> {
    if !req.requestor_app.is_account() || req.requestor_user != req.owner_id {
        return None;
    }
    if req.table_id == TableId::contacts()
        || req.table_id == TableId::groups()
        || req.table_id.is_message_box()
    {
        return Some(CapabilitySet::read_write());
    }
    None
}

/// Platform tables owned by the `public` pseudo-user, reachable through
/// their fixed app regardless of any stored grant. The verdict carries a
/// synthetic `write_own` grant so callers see why access was given.
fn platform_tables(req: &RightsRequest, now: i64) -> Option<CapabilitySet> {
    if !req.owner_id.is_public() {
        return None;
    }

    let fixed_app = if req.table_id == TableId::feed_codes() {
        AppName::new(FEEDS_APP)
    } else if req.table_id == TableId::public_index() {
        AppName::new(PUBLIC_INDEX_APP)
    } else {
        return None;
    };

    if req.requestor_app != fixed_app {
        return None;
    }

    let grant = PermissionGrant::new(
        req.table_id.clone(),
        fixed_app,
        PermissionName::new(PLATFORM_GRANT_NAME),
        GrantType::WriteOwn,
    )
    .with_grantees(vec![ceps_core::Grantee::User(req.requestor_user.clone())])
    .accepted();

    Some(CapabilitySet {
        write_own: true,
        can_read: true,
        granted: vec![Stored::create(grant, now)],
        ..CapabilitySet::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(owner: &str, app: &str, user: &str, table: &str) -> RightsRequest {
        RightsRequest {
            owner_id: UserId::new(owner),
            requestor_app: AppName::new(app),
            requestor_user: UserId::new(user),
            table_id: TableId::new(table),
            permission_hint: None,
        }
    }

    #[test]
    fn test_self_ownership_requires_namespace() {
        let caps = system_rule(&req("alice", "app", "alice", "app.notes"), 0).unwrap();
        assert!(caps.own_record);

        // Someone else's data: no rule matches.
        assert!(system_rule(&req("bob", "app", "alice", "app.notes"), 0).is_none());

        // Own user but a foreign app's table: no rule matches.
        assert!(system_rule(&req("alice", "app", "alice", "other.notes"), 0).is_none());
    }

    #[test]
    fn test_account_app_reaches_any_own_table() {
        let caps = system_rule(
            &req("alice", "system.account", "alice", "other.notes"),
            0,
        )
        .unwrap();
        assert!(caps.own_record);
    }

    #[test]
    fn test_message_box_self_query_is_read_only() {
        let caps = system_rule(&req("alice", "app", "alice", "system.messages_got"), 0).unwrap();
        assert!(caps.can_read);
        assert!(!caps.can_write);
        assert!(!caps.own_record);

        // Another user's box is out of reach.
        assert!(system_rule(&req("bob", "app", "alice", "system.messages_got"), 0).is_none());
    }

    #[test]
    fn test_platform_tables_need_the_fixed_app() {
        let caps = system_rule(
            &req("public", FEEDS_APP, "alice", "system.feed_codes"),
            42,
        )
        .unwrap();
        assert!(caps.write_own);
        assert!(!caps.can_write);
        assert_eq!(caps.granted.len(), 1);
        assert_eq!(
            caps.granted[0].record.name,
            PermissionName::new(PLATFORM_GRANT_NAME)
        );

        // The wrong app gets nothing, even against the public owner.
        assert!(system_rule(&req("public", "app", "alice", "system.feed_codes"), 0).is_none());

        // The right app against a normal owner gets nothing.
        assert!(system_rule(&req("alice", FEEDS_APP, "alice", "system.feed_codes"), 0).is_none());
    }
}
