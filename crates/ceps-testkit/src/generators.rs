//! Proptest strategies for CEPS types.

use proptest::prelude::*;

use ceps_core::{
    AppName, GrantType, Grantee, GroupName, PermissionGrant, PermissionName, TableId, UserId,
};

/// A plausible user id.
pub fn user_id() -> impl Strategy<Value = UserId> {
    "[a-z][a-z0-9_]{2,15}".prop_map(UserId::new)
}

/// A plausible app name.
pub fn app_name() -> impl Strategy<Value = AppName> {
    "[a-z][a-z0-9]{2,11}".prop_map(AppName::new)
}

/// A table id in the given app's namespace.
pub fn table_under(app: AppName) -> impl Strategy<Value = TableId> {
    "[a-z][a-z0-9_]{1,11}".prop_map(move |suffix| TableId::new(format!("{app}.{suffix}")))
}

/// A grant name.
pub fn permission_name() -> impl Strategy<Value = PermissionName> {
    "[a-z][a-z0-9_]{1,11}".prop_map(PermissionName::new)
}

/// Any capability type.
pub fn grant_type() -> impl Strategy<Value = GrantType> {
    prop_oneof![
        Just(GrantType::WriteAll),
        Just(GrantType::WriteOwn),
        Just(GrantType::ReadAll),
        Just(GrantType::ShareRecords),
        Just(GrantType::MessageRecords),
    ]
}

/// Any grantee.
pub fn grantee() -> impl Strategy<Value = Grantee> {
    prop_oneof![
        user_id().prop_map(Grantee::User),
        Just(Grantee::Public),
        "[a-z][a-z0-9_]{1,11}".prop_map(|n| Grantee::Group(GroupName::new(n))),
    ]
}

/// An accepted grant with up to four grantees.
pub fn permission_grant() -> impl Strategy<Value = PermissionGrant> {
    (
        app_name(),
        permission_name(),
        grant_type(),
        proptest::collection::vec(grantee(), 0..4),
        "[a-z][a-z0-9_]{1,11}",
    )
        .prop_map(|(app, name, grant_type, grantees, table_suffix)| {
            let table = TableId::new(format!("{app}.{table_suffix}"));
            PermissionGrant::new(table, app, name, grant_type)
                .with_grantees(grantees)
                .accepted()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        // The request-literal form of a grantee always parses back to
        // itself.
        #[test]
        fn grantee_literal_roundtrip(grantee in grantee()) {
            let literal = grantee.to_string();
            prop_assert_eq!(Grantee::parse(&literal), grantee);
        }

        // Adding a grantee never removes anyone's coverage.
        #[test]
        fn coverage_grows_monotonically(
            grant in permission_grant(),
            extra in grantee(),
            probe in user_id(),
        ) {
            let before = grant.covers(&probe);
            let mut grantees = grant.grantees.clone();
            grantees.push(extra);
            let extended = grant.clone().with_grantees(grantees);
            prop_assert!(!before || extended.covers(&probe));
        }
    }
}
