//! In-process credential cache.
//!
//! A bounded-staleness read-through cache keyed by token value. Entries
//! are trusted for a short TTL; after that the ledger falls through to
//! the credential store. Upserts are idempotent and keyed by token
//! value, so two workers refreshing the same entry race harmlessly.

use std::collections::HashMap;
use std::sync::RwLock;

use ceps_core::{Credential, TokenValue, UserId};

struct CacheEntry {
    credential: Credential,
    cached_at: i64,
}

/// TTL-bounded token-value cache.
pub struct TokenCache {
    ttl_ms: i64,
    entries: RwLock<HashMap<TokenValue, CacheEntry>>,
}

impl TokenCache {
    pub fn new(ttl_ms: i64) -> Self {
        Self {
            ttl_ms,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Look up a credential if its cache entry is still fresh.
    pub fn get(&self, token: &TokenValue, now: i64) -> Option<Credential> {
        let entries = self.entries.read().ok()?;
        let entry = entries.get(token)?;
        if now - entry.cached_at >= self.ttl_ms {
            return None;
        }
        Some(entry.credential.clone())
    }

    /// Insert or refresh an entry.
    pub fn put(&self, credential: Credential, now: i64) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(
                credential.token_value.clone(),
                CacheEntry {
                    credential,
                    cached_at: now,
                },
            );
        }
    }

    /// Drop a single entry (logout, expired lookup).
    pub fn invalidate(&self, token: &TokenValue) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(token);
        }
    }

    /// Drop every entry belonging to `user`.
    pub fn invalidate_user(&self, user: &UserId) {
        if let Ok(mut entries) = self.entries.write() {
            entries.retain(|_, e| &e.credential.requestor_id != user);
        }
    }
}
