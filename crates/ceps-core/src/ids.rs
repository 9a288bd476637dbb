//! Strong identifier types for CEPS.
//!
//! All identifiers are string newtypes to prevent misuse at compile time.
//! A `UserId` can never be passed where an `AppName` is expected, even
//! though both are strings on the wire.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The reserved app name for account-level credentials and account pages.
pub const ACCOUNT_APP: &str = "system.account";

/// The pseudo-user that owns platform-level system tables.
pub const PUBLIC_USER: &str = "public";

/// The reserved grantee literal for "everyone".
pub const PUBLIC_GRANTEE: &str = "_public";

/// A user identifier, unique per host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Create a new user id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The pseudo-user that owns platform system tables.
    pub fn public() -> Self {
        Self(PUBLIC_USER.to_string())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An empty user id never identifies anyone; requests carrying one
    /// must fail closed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check whether this is the public pseudo-user.
    pub fn is_public(&self) -> bool {
        self.0 == PUBLIC_USER
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A host (server) identifier.
///
/// The empty host is "this server": records created locally leave the
/// host blank, and federation fills it in when a record crosses a host
/// boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostId(String);

impl HostId {
    /// Create a new host id.
    pub fn new(host: impl Into<String>) -> Self {
        Self(host.into())
    }

    /// The blank host, meaning "same server".
    pub fn local() -> Self {
        Self(String::new())
    }

    /// Get the host as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A blank host means the record never left this server.
    pub fn is_local(&self) -> bool {
        self.0.is_empty()
    }

    /// Check whether this host names `other` or is blank (same server).
    pub fn is_local_to(&self, other: &HostId) -> bool {
        self.is_local() || self == other
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "<local>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<&str> for HostId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// An installed app's name, which namespaces its tables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppName(String);

impl AppName {
    /// Create a new app name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The reserved account app.
    pub fn account() -> Self {
        Self(ACCOUNT_APP.to_string())
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The account app is allowed broader reach for its own account
    /// operations than any installed app.
    pub fn is_account(&self) -> bool {
        self.0 == ACCOUNT_APP
    }
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AppName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// An app-qualified resource (table) name, e.g. `app.notes`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableId(String);

impl TableId {
    /// Create a new table id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check whether this table lives in `app`'s namespace.
    ///
    /// A table is namespaced under an app when its id equals the app name
    /// or starts with the app name followed by a dot.
    pub fn is_namespaced_under(&self, app: &AppName) -> bool {
        self.0 == app.as_str()
            || (self.0.len() > app.as_str().len()
                && self.0.starts_with(app.as_str())
                && self.0.as_bytes()[app.as_str().len()] == b'.')
    }

    // Fixed system tables. See the rights resolver's rule table for who
    // may touch each of these.

    /// The per-user outbox of relayed messages.
    pub fn messages_sent() -> Self {
        Self("system.messages_sent".to_string())
    }

    /// The per-user inbox of relayed messages.
    pub fn messages_got() -> Self {
        Self("system.messages_got".to_string())
    }

    /// The account app's contact list table.
    pub fn contacts() -> Self {
        Self("system.contacts".to_string())
    }

    /// The account app's group table.
    pub fn groups() -> Self {
        Self("system.groups".to_string())
    }

    /// Private-feed codes, owned by the public pseudo-user.
    pub fn feed_codes() -> Self {
        Self("system.feed_codes".to_string())
    }

    /// The public-record index, owned by the public pseudo-user.
    pub fn public_index() -> Self {
        Self("system.public_index".to_string())
    }

    /// Check whether this is one of the per-user message boxes.
    pub fn is_message_box(&self) -> bool {
        *self == Self::messages_sent() || *self == Self::messages_got()
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TableId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The name of a permission grant, unique per (table, requestor app).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionName(String);

impl PermissionName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PermissionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PermissionName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A named group of users in an owner's group table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupName(String);

impl GroupName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for GroupName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A record identifier within a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh random record id.
    pub fn mint() -> Self {
        use rand::Rng;
        let bytes: [u8; 16] = rand::thread_rng().gen();
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// An opaque credential or validation-token value.
///
/// The value is the primary lookup key in the credential and validation
/// token stores. Debug output is truncated so full tokens never land in
/// logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenValue(String);

impl TokenValue {
    /// Wrap an existing token value (e.g. one presented by a caller).
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Mint a fresh 256-bit random token.
    pub fn mint() -> Self {
        use rand::Rng;
        let bytes: [u8; 32] = rand::thread_rng().gen();
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TokenValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Wrapped values come off the wire, so the cut must land on a
        // char boundary.
        let mut shown = self.0.len().min(8);
        while !self.0.is_char_boundary(shown) {
            shown -= 1;
        }
        write!(f, "TokenValue({}…)", &self.0[..shown])
    }
}

impl From<&str> for TokenValue {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_namespacing() {
        let app = AppName::new("app");
        assert!(TableId::new("app.notes").is_namespaced_under(&app));
        assert!(TableId::new("app").is_namespaced_under(&app));
        assert!(!TableId::new("appx.notes").is_namespaced_under(&app));
        assert!(!TableId::new("other.notes").is_namespaced_under(&app));
    }

    #[test]
    fn test_account_app_is_reserved() {
        assert!(AppName::account().is_account());
        assert!(!AppName::new("app").is_account());
    }

    #[test]
    fn test_host_locality() {
        let here = HostId::new("a.example.org");
        assert!(HostId::local().is_local());
        assert!(HostId::local().is_local_to(&here));
        assert!(here.clone().is_local_to(&here));
        assert!(!HostId::new("b.example.org").is_local_to(&here));
    }

    #[test]
    fn test_token_mint_is_unique() {
        let a = TokenValue::mint();
        let b = TokenValue::mint();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_token_debug_truncates() {
        let token = TokenValue::mint();
        let debug = format!("{:?}", token);
        assert!(!debug.contains(token.as_str()));
    }

    #[test]
    fn test_token_debug_respects_char_boundaries() {
        // A wire value may put a multi-byte char across the cut point.
        let debug = format!("{:?}", TokenValue::new("aaaaaaaé-rest-of-token"));
        assert_eq!(debug, "TokenValue(aaaaaaa…)");

        let debug = format!("{:?}", TokenValue::new("héhéhéhé"));
        assert_eq!(debug, "TokenValue(héhéh…)");
    }
}
