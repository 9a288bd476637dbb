//! Database schema migrations for SQLite.
//!
//! A simple versioned migration system: each migration transforms the
//! schema from version N to N+1.

use rusqlite::Connection;

use ceps_core::now_millis;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema. Idempotent.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;
            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Issued credentials, looked up by opaque token value
        CREATE TABLE credentials (
            token_value TEXT PRIMARY KEY,
            kind TEXT NOT NULL,               -- 'account' | 'app'
            requestor_id TEXT NOT NULL,
            app_name TEXT NOT NULL,
            owner_id TEXT NOT NULL,
            logged_in INTEGER NOT NULL,
            expiry INTEGER NOT NULL           -- Unix ms
        );

        CREATE INDEX idx_credentials_scope ON credentials (requestor_id, app_name);

        -- Permission grants: one row per owner x table x app x name,
        -- never hard-deleted
        CREATE TABLE grants (
            owner_id TEXT NOT NULL,
            table_id TEXT NOT NULL,
            requestor_app TEXT NOT NULL,
            name TEXT NOT NULL,
            grant_type TEXT NOT NULL,         -- closed set, see GrantType
            grantees BLOB NOT NULL,           -- CBOR array of grantees
            granted INTEGER NOT NULL,
            status TEXT NOT NULL,             -- 'active' | 'removed'
            id TEXT NOT NULL,                 -- record store _id
            date_created INTEGER NOT NULL,
            date_modified INTEGER NOT NULL,

            PRIMARY KEY (owner_id, table_id, requestor_app, name)
        );

        -- Validation tokens; consumed rows stay for the expiry window
        CREATE TABLE validation_tokens (
            token TEXT PRIMARY KEY,
            data_owner_user TEXT NOT NULL,
            data_owner_host TEXT NOT NULL,
            requestor_user TEXT NOT NULL,
            requestor_host TEXT NOT NULL,
            table_id TEXT NOT NULL,
            permission TEXT NOT NULL,
            app_id TEXT NOT NULL,
            record_id TEXT,
            expiry INTEGER NOT NULL,
            consumed INTEGER NOT NULL DEFAULT 0
        );

        -- Per-user sent/got message boxes
        CREATE TABLE messages (
            owner_id TEXT NOT NULL,
            mbox TEXT NOT NULL,               -- 'sent' | 'got'
            id TEXT NOT NULL,                 -- record store _id
            date_created INTEGER NOT NULL,
            date_modified INTEGER NOT NULL,
            sender_id TEXT NOT NULL,
            sender_host TEXT NOT NULL,
            recipient_id TEXT NOT NULL,
            recipient_host TEXT NOT NULL,
            message_type TEXT NOT NULL,
            messaging_permission TEXT NOT NULL,
            contact_permission TEXT NOT NULL,
            table_id TEXT NOT NULL,
            record_id TEXT NOT NULL,
            record BLOB NOT NULL,             -- CBOR snapshot
            app_id TEXT NOT NULL,
            read INTEGER NOT NULL DEFAULT 0,

            PRIMARY KEY (owner_id, mbox, id)
        );

        -- Owner group tables (external collaborator, read by sharing)
        CREATE TABLE groups (
            owner_id TEXT NOT NULL,
            name TEXT NOT NULL,
            members BLOB NOT NULL,            -- CBOR array of user ids
            id TEXT NOT NULL,
            date_created INTEGER NOT NULL,
            date_modified INTEGER NOT NULL
        );

        CREATE INDEX idx_groups_name ON groups (owner_id, name);

        -- Owner contact lists (external collaborator, read by relay)
        CREATE TABLE contacts (
            owner_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            host TEXT NOT NULL,

            PRIMARY KEY (owner_id, user_id, host)
        );
        "#,
    )?;

    Ok(())
}
