//! SQLite implementation of the store traits.
//!
//! The primary backend. Uses rusqlite with bundled SQLite behind a
//! mutex, wrapped in async via `tokio::task::spawn_blocking`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use ceps_core::{
    AppName, Credential, CredentialKind, GrantStatus, GrantType, Grantee, GroupName, HostId,
    Message, MessageBox, MessageType, PermissionGrant, PermissionName, RecordId, RecordMeta,
    Stored, TableId, TokenValue, UserId, ValidationToken,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{
    ContactDirectory, CredentialStore, GrantFilter, GrantStore, Group, GroupDirectory,
    MessageStore, ValidationTokenStore,
};

/// SQLite-backed store implementing the full collaborator bundle.
///
/// Thread-safe via an internal mutex; all operations run on the blocking
/// pool so the async runtime is never stalled on disk I/O.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a database at the given path, creating and migrating as
    /// needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        tracing::debug!("sqlite store opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database. Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking closure against the connection on the blocking
    /// pool.
    async fn exec<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Runtime(format!("connection mutex poisoned: {e}")))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Runtime(format!("blocking task failed: {e}")))?
    }

    /// Seed a group into an owner's group table.
    pub async fn add_group(&self, owner: &UserId, group: Group, now: i64) -> Result<()> {
        let owner = owner.clone();
        let members = to_cbor(&group.members)?;
        self.exec(move |conn| {
            conn.execute(
                "INSERT INTO groups (owner_id, name, members, id, date_created, date_modified)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![
                    owner.as_str(),
                    group.name.as_str(),
                    members,
                    RecordId::mint().as_str(),
                    now,
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Seed a contact into an owner's contact list.
    pub async fn add_contact(&self, owner: &UserId, user: UserId, host: HostId) -> Result<()> {
        let owner = owner.clone();
        self.exec(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO contacts (owner_id, user_id, host) VALUES (?1, ?2, ?3)",
                params![owner.as_str(), user.as_str(), host.as_str()],
            )?;
            Ok(())
        })
        .await
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Column encoding helpers
// ─────────────────────────────────────────────────────────────────────────

fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::from_reader(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn kind_to_str(kind: CredentialKind) -> &'static str {
    match kind {
        CredentialKind::Account => "account",
        CredentialKind::App => "app",
    }
}

fn kind_from_str(s: &str) -> Result<CredentialKind> {
    match s {
        "account" => Ok(CredentialKind::Account),
        "app" => Ok(CredentialKind::App),
        other => Err(StoreError::InvalidData(format!(
            "unknown credential kind: {other}"
        ))),
    }
}

fn grant_type_to_str(t: GrantType) -> &'static str {
    match t {
        GrantType::WriteAll => "write_all",
        GrantType::WriteOwn => "write_own",
        GrantType::ReadAll => "read_all",
        GrantType::ShareRecords => "share_records",
        GrantType::MessageRecords => "message_records",
    }
}

fn grant_type_from_str(s: &str) -> Result<GrantType> {
    match s {
        "write_all" => Ok(GrantType::WriteAll),
        "write_own" => Ok(GrantType::WriteOwn),
        "read_all" => Ok(GrantType::ReadAll),
        "share_records" => Ok(GrantType::ShareRecords),
        "message_records" => Ok(GrantType::MessageRecords),
        other => Err(StoreError::InvalidData(format!(
            "unknown grant type: {other}"
        ))),
    }
}

fn status_to_str(s: GrantStatus) -> &'static str {
    match s {
        GrantStatus::Active => "active",
        GrantStatus::Removed => "removed",
    }
}

fn status_from_str(s: &str) -> Result<GrantStatus> {
    match s {
        "active" => Ok(GrantStatus::Active),
        "removed" => Ok(GrantStatus::Removed),
        other => Err(StoreError::InvalidData(format!(
            "unknown grant status: {other}"
        ))),
    }
}

fn mbox_to_str(mbox: MessageBox) -> &'static str {
    match mbox {
        MessageBox::Sent => "sent",
        MessageBox::Got => "got",
    }
}

fn message_type_to_str(t: MessageType) -> &'static str {
    match t {
        MessageType::MessageRecords => "message_records",
    }
}

fn message_type_from_str(s: &str) -> Result<MessageType> {
    match s {
        "message_records" => Ok(MessageType::MessageRecords),
        other => Err(StoreError::InvalidData(format!(
            "unknown message type: {other}"
        ))),
    }
}

/// Raw grant row as pulled from SQLite, before enum decoding.
type GrantRow = (
    String,         // table_id
    String,         // requestor_app
    String,         // name
    String,         // grant_type
    Vec<u8>,        // grantees CBOR
    bool,           // granted
    String,         // status
    String,         // id
    i64,            // date_created
    i64,            // date_modified
);

fn grant_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<GrantRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
    ))
}

fn decode_grant(raw: GrantRow) -> Result<Stored<PermissionGrant>> {
    let (table_id, app, name, grant_type, grantees, granted, status, id, created, modified) = raw;
    let grantees: Vec<Grantee> = from_cbor(&grantees)?;
    Ok(Stored {
        meta: RecordMeta {
            id: RecordId::new(id),
            date_created: created,
            date_modified: modified,
        },
        record: PermissionGrant {
            table_id: TableId::new(table_id),
            requestor_app: AppName::new(app),
            name: PermissionName::new(name),
            grant_type: grant_type_from_str(&grant_type)?,
            grantees,
            granted,
            status: status_from_str(&status)?,
        },
    })
}

const GRANT_COLS: &str =
    "table_id, requestor_app, name, grant_type, grantees, granted, status, id, \
     date_created, date_modified";

/// Raw message row.
type MessageRow = (
    String,         // id
    i64,            // date_created
    i64,            // date_modified
    String,         // sender_id
    String,         // sender_host
    String,         // recipient_id
    String,         // recipient_host
    String,         // message_type
    String,         // messaging_permission
    String,         // contact_permission
    String,         // table_id
    String,         // record_id
    Vec<u8>,        // record
    String,         // app_id
    bool,           // read
);

fn message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
        row.get(12)?,
        row.get(13)?,
        row.get(14)?,
    ))
}

fn decode_message(raw: MessageRow) -> Result<Stored<Message>> {
    let (
        id,
        created,
        modified,
        sender_id,
        sender_host,
        recipient_id,
        recipient_host,
        message_type,
        messaging_permission,
        contact_permission,
        table_id,
        record_id,
        record,
        app_id,
        read,
    ) = raw;
    Ok(Stored {
        meta: RecordMeta {
            id: RecordId::new(id),
            date_created: created,
            date_modified: modified,
        },
        record: Message {
            sender_id: UserId::new(sender_id),
            sender_host: HostId::new(sender_host),
            recipient_id: UserId::new(recipient_id),
            recipient_host: HostId::new(recipient_host),
            message_type: message_type_from_str(&message_type)?,
            messaging_permission: PermissionName::new(messaging_permission),
            contact_permission: PermissionName::new(contact_permission),
            table_id: TableId::new(table_id),
            record_id: RecordId::new(record_id),
            record,
            app_id: AppName::new(app_id),
            read,
        },
    })
}

const MESSAGE_COLS: &str =
    "id, date_created, date_modified, sender_id, sender_host, recipient_id, recipient_host, \
     message_type, messaging_permission, contact_permission, table_id, record_id, record, \
     app_id, read";

fn credential_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, String, String, String, bool, i64)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn decode_credential(
    raw: (String, String, String, String, String, bool, i64),
) -> Result<Credential> {
    let (token_value, kind, requestor_id, app_name, owner_id, logged_in, expiry) = raw;
    Ok(Credential {
        token_value: TokenValue::new(token_value),
        kind: kind_from_str(&kind)?,
        requestor_id: UserId::new(requestor_id),
        app_name: AppName::new(app_name),
        owner_id: UserId::new(owner_id),
        logged_in,
        expiry,
    })
}

const CREDENTIAL_COLS: &str =
    "token_value, kind, requestor_id, app_name, owner_id, logged_in, expiry";

// ─────────────────────────────────────────────────────────────────────────
// Trait implementations
// ─────────────────────────────────────────────────────────────────────────

#[async_trait]
impl CredentialStore for SqliteStore {
    async fn insert_credential(&self, credential: &Credential) -> Result<()> {
        let c = credential.clone();
        self.exec(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO credentials
                 (token_value, kind, requestor_id, app_name, owner_id, logged_in, expiry)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    c.token_value.as_str(),
                    kind_to_str(c.kind),
                    c.requestor_id.as_str(),
                    c.app_name.as_str(),
                    c.owner_id.as_str(),
                    c.logged_in,
                    c.expiry,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_credential(&self, token: &TokenValue) -> Result<Option<Credential>> {
        let token = token.clone();
        self.exec(move |conn| {
            let raw = conn
                .query_row(
                    &format!("SELECT {CREDENTIAL_COLS} FROM credentials WHERE token_value = ?1"),
                    params![token.as_str()],
                    credential_row,
                )
                .optional()?;
            raw.map(decode_credential).transpose()
        })
        .await
    }

    async fn find_credential(&self, user: &UserId, app: &AppName) -> Result<Option<Credential>> {
        let user = user.clone();
        let app = app.clone();
        self.exec(move |conn| {
            let raw = conn
                .query_row(
                    &format!(
                        "SELECT {CREDENTIAL_COLS} FROM credentials
                         WHERE requestor_id = ?1 AND app_name = ?2"
                    ),
                    params![user.as_str(), app.as_str()],
                    credential_row,
                )
                .optional()?;
            raw.map(decode_credential).transpose()
        })
        .await
    }

    async fn update_credential_expiry(&self, token: &TokenValue, expiry: i64) -> Result<bool> {
        let token = token.clone();
        self.exec(move |conn| {
            let changed = conn.execute(
                "UPDATE credentials SET expiry = ?2 WHERE token_value = ?1",
                params![token.as_str(), expiry],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn delete_credential(&self, token: &TokenValue) -> Result<bool> {
        let token = token.clone();
        self.exec(move |conn| {
            let changed = conn.execute(
                "DELETE FROM credentials WHERE token_value = ?1",
                params![token.as_str()],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn delete_credentials_for(&self, user: &UserId) -> Result<u64> {
        let user = user.clone();
        self.exec(move |conn| {
            let changed = conn.execute(
                "DELETE FROM credentials WHERE requestor_id = ?1",
                params![user.as_str()],
            )?;
            Ok(changed as u64)
        })
        .await
    }
}

#[async_trait]
impl GrantStore for SqliteStore {
    async fn upsert_grant(
        &self,
        owner: &UserId,
        grant: &PermissionGrant,
        now: i64,
    ) -> Result<Stored<PermissionGrant>> {
        let owner = owner.clone();
        let grant = grant.clone();
        self.exec(move |conn| {
            let grantees = to_cbor(&grant.grantees)?;
            conn.execute(
                "INSERT INTO grants
                 (owner_id, table_id, requestor_app, name, grant_type, grantees, granted,
                  status, id, date_created, date_modified)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
                 ON CONFLICT(owner_id, table_id, requestor_app, name) DO UPDATE SET
                     grant_type = excluded.grant_type,
                     grantees = excluded.grantees,
                     granted = excluded.granted,
                     status = excluded.status,
                     date_modified = excluded.date_modified",
                params![
                    owner.as_str(),
                    grant.table_id.as_str(),
                    grant.requestor_app.as_str(),
                    grant.name.as_str(),
                    grant_type_to_str(grant.grant_type),
                    grantees,
                    grant.granted,
                    status_to_str(grant.status),
                    RecordId::mint().as_str(),
                    now,
                ],
            )?;

            let raw = conn.query_row(
                &format!(
                    "SELECT {GRANT_COLS} FROM grants
                     WHERE owner_id = ?1 AND table_id = ?2 AND requestor_app = ?3 AND name = ?4"
                ),
                params![
                    owner.as_str(),
                    grant.table_id.as_str(),
                    grant.requestor_app.as_str(),
                    grant.name.as_str(),
                ],
                grant_row,
            )?;
            decode_grant(raw)
        })
        .await
    }

    async fn find_grants(
        &self,
        owner: &UserId,
        filter: &GrantFilter,
    ) -> Result<Vec<Stored<PermissionGrant>>> {
        let owner = owner.clone();
        let filter = filter.clone();
        self.exec(move |conn| {
            // Pull the owner's rows and apply the reference filter in
            // process; grant collections are small.
            let mut stmt = conn.prepare(&format!(
                "SELECT {GRANT_COLS} FROM grants WHERE owner_id = ?1"
            ))?;
            let raws = stmt
                .query_map(params![owner.as_str()], grant_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut out = Vec::new();
            for raw in raws {
                let stored = decode_grant(raw)?;
                if filter.matches(&stored.record) {
                    out.push(stored);
                }
            }
            Ok(out)
        })
        .await
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
        let (owner, table_id, app, name) = (
            owner.clone(),
            table_id.clone(),
            requestor_app.clone(),
            name.clone(),
        );
        self.exec(move |conn| {
            let changed = conn.execute(
                "UPDATE grants SET granted = ?5, date_modified = ?6
                 WHERE owner_id = ?1 AND table_id = ?2 AND requestor_app = ?3 AND name = ?4",
                params![
                    owner.as_str(),
                    table_id.as_str(),
                    app.as_str(),
                    name.as_str(),
                    granted,
                    now,
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            let raw = conn.query_row(
                &format!(
                    "SELECT {GRANT_COLS} FROM grants
                     WHERE owner_id = ?1 AND table_id = ?2 AND requestor_app = ?3 AND name = ?4"
                ),
                params![owner.as_str(), table_id.as_str(), app.as_str(), name.as_str()],
                grant_row,
            )?;
            decode_grant(raw).map(Some)
        })
        .await
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
        let (owner, table_id, app, name) = (
            owner.clone(),
            table_id.clone(),
            requestor_app.clone(),
            name.clone(),
        );
        self.exec(move |conn| {
            let changed = conn.execute(
                "UPDATE grants SET status = ?5, date_modified = ?6
                 WHERE owner_id = ?1 AND table_id = ?2 AND requestor_app = ?3 AND name = ?4",
                params![
                    owner.as_str(),
                    table_id.as_str(),
                    app.as_str(),
                    name.as_str(),
                    status_to_str(status),
                    now,
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            let raw = conn.query_row(
                &format!(
                    "SELECT {GRANT_COLS} FROM grants
                     WHERE owner_id = ?1 AND table_id = ?2 AND requestor_app = ?3 AND name = ?4"
                ),
                params![owner.as_str(), table_id.as_str(), app.as_str(), name.as_str()],
                grant_row,
            )?;
            decode_grant(raw).map(Some)
        })
        .await
    }
}

#[async_trait]
impl ValidationTokenStore for SqliteStore {
    async fn put_validation_token(&self, token: &ValidationToken) -> Result<()> {
        let t = token.clone();
        self.exec(move |conn| {
            conn.execute(
                "INSERT INTO validation_tokens
                 (token, data_owner_user, data_owner_host, requestor_user, requestor_host,
                  table_id, permission, app_id, record_id, expiry, consumed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0)",
                params![
                    t.validation_token.as_str(),
                    t.data_owner_user.as_str(),
                    t.data_owner_host.as_str(),
                    t.requestor_user.as_str(),
                    t.requestor_host.as_str(),
                    t.table_id.as_str(),
                    t.permission.as_str(),
                    t.app_id.as_str(),
                    t.record_id.as_ref().map(|r| r.as_str().to_string()),
                    t.expiry,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_validation_token(&self, value: &TokenValue) -> Result<Option<ValidationToken>> {
        let value = value.clone();
        self.exec(move |conn| query_validation_token(conn, &value, false)).await
    }

    async fn take_validation_token(&self, value: &TokenValue) -> Result<Option<ValidationToken>> {
        let value = value.clone();
        self.exec(move |conn| {
            // Conditional update first: of two racing redeemers only one
            // flips consumed 0 -> 1 and wins the row.
            let won = conn.execute(
                "UPDATE validation_tokens SET consumed = 1 WHERE token = ?1 AND consumed = 0",
                params![value.as_str()],
            )?;
            if won == 0 {
                return Ok(None);
            }
            query_validation_token(conn, &value, true)
        })
        .await
    }
}

fn query_validation_token(
    conn: &Connection,
    value: &TokenValue,
    include_consumed: bool,
) -> Result<Option<ValidationToken>> {
    let sql = if include_consumed {
        "SELECT token, data_owner_user, data_owner_host, requestor_user, requestor_host,
                table_id, permission, app_id, record_id, expiry
         FROM validation_tokens WHERE token = ?1"
    } else {
        "SELECT token, data_owner_user, data_owner_host, requestor_user, requestor_host,
                table_id, permission, app_id, record_id, expiry
         FROM validation_tokens WHERE token = ?1 AND consumed = 0"
    };

    let raw: Option<(
        String,
        String,
        String,
        String,
        String,
        String,
        String,
        String,
        Option<String>,
        i64,
    )> = conn
        .query_row(sql, params![value.as_str()], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
                row.get(8)?,
                row.get(9)?,
            ))
        })
        .optional()?;

    Ok(raw.map(
        |(token, owner, owner_host, requestor, requestor_host, table, perm, app, record, expiry)| {
            ValidationToken {
                validation_token: TokenValue::new(token),
                data_owner_user: UserId::new(owner),
                data_owner_host: HostId::new(owner_host),
                requestor_user: UserId::new(requestor),
                requestor_host: HostId::new(requestor_host),
                table_id: TableId::new(table),
                permission: PermissionName::new(perm),
                app_id: AppName::new(app),
                record_id: record.map(RecordId::new),
                expiry,
            }
        },
    ))
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn append_message(
        &self,
        owner: &UserId,
        mbox: MessageBox,
        message: &Message,
        now: i64,
    ) -> Result<Stored<Message>> {
        let owner = owner.clone();
        let m = message.clone();
        self.exec(move |conn| {
            let id = RecordId::mint();
            conn.execute(
                "INSERT INTO messages
                 (owner_id, mbox, id, date_created, date_modified, sender_id, sender_host,
                  recipient_id, recipient_host, message_type, messaging_permission,
                  contact_permission, table_id, record_id, record, app_id, read)
                 VALUES (?1, ?2, ?3, ?4, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                params![
                    owner.as_str(),
                    mbox_to_str(mbox),
                    id.as_str(),
                    now,
                    m.sender_id.as_str(),
                    m.sender_host.as_str(),
                    m.recipient_id.as_str(),
                    m.recipient_host.as_str(),
                    message_type_to_str(m.message_type),
                    m.messaging_permission.as_str(),
                    m.contact_permission.as_str(),
                    m.table_id.as_str(),
                    m.record_id.as_str(),
                    m.record,
                    m.app_id.as_str(),
                    m.read,
                ],
            )?;
            Ok(Stored {
                meta: RecordMeta::new(id, now),
                record: m,
            })
        })
        .await
    }

    async fn list_messages(&self, owner: &UserId, mbox: MessageBox) -> Result<Vec<Stored<Message>>> {
        let owner = owner.clone();
        self.exec(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLS} FROM messages
                 WHERE owner_id = ?1 AND mbox = ?2 ORDER BY date_created"
            ))?;
            let raws = stmt
                .query_map(params![owner.as_str(), mbox_to_str(mbox)], message_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            raws.into_iter().map(decode_message).collect()
        })
        .await
    }

    async fn find_message(
        &self,
        owner: &UserId,
        mbox: MessageBox,
        id: &RecordId,
    ) -> Result<Option<Stored<Message>>> {
        let owner = owner.clone();
        let id = id.clone();
        self.exec(move |conn| {
            let raw = conn
                .query_row(
                    &format!(
                        "SELECT {MESSAGE_COLS} FROM messages
                         WHERE owner_id = ?1 AND mbox = ?2 AND id = ?3"
                    ),
                    params![owner.as_str(), mbox_to_str(mbox), id.as_str()],
                    message_row,
                )
                .optional()?;
            raw.map(decode_message).transpose()
        })
        .await
    }

    async fn mark_message_read(&self, owner: &UserId, id: &RecordId, now: i64) -> Result<bool> {
        let owner = owner.clone();
        let id = id.clone();
        self.exec(move |conn| {
            let changed = conn.execute(
                "UPDATE messages SET read = 1, date_modified = ?3
                 WHERE owner_id = ?1 AND mbox = 'got' AND id = ?2",
                params![owner.as_str(), id.as_str(), now],
            )?;
            Ok(changed > 0)
        })
        .await
    }
}

#[async_trait]
impl GroupDirectory for SqliteStore {
    async fn groups_named(&self, owner: &UserId, name: &GroupName) -> Result<Vec<Stored<Group>>> {
        let owner = owner.clone();
        let name = name.clone();
        self.exec(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT name, members, id, date_created, date_modified
                 FROM groups WHERE owner_id = ?1 AND name = ?2",
            )?;
            let raws = stmt
                .query_map(params![owner.as_str(), name.as_str()], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Vec<u8>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut out = Vec::new();
            for (name, members, id, created, modified) in raws {
                let members: Vec<UserId> = from_cbor(&members)?;
                out.push(Stored {
                    meta: RecordMeta {
                        id: RecordId::new(id),
                        date_created: created,
                        date_modified: modified,
                    },
                    record: Group {
                        name: GroupName::new(name),
                        members,
                    },
                });
            }
            Ok(out)
        })
        .await
    }
}

#[async_trait]
impl ContactDirectory for SqliteStore {
    async fn is_contact(&self, owner: &UserId, user: &UserId, host: &HostId) -> Result<bool> {
        let (owner, user, host) = (owner.clone(), user.clone(), host.clone());
        self.exec(move |conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(
                    SELECT 1 FROM contacts WHERE owner_id = ?1 AND user_id = ?2 AND host = ?3
                 )",
                params![owner.as_str(), user.as_str(), host.as_str()],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
        .await
    }
}
