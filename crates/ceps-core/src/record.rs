//! Record metadata carried by every persisted entity.
//!
//! The record store treats `_id`, `_date_created` and `_date_modified`
//! as mandatory fields. Any record returned to a caller outside the core
//! carries all three, and `_date_created == _date_modified` exactly on
//! first creation.

use serde::{Deserialize, Serialize};

use crate::ids::RecordId;

/// The three mandatory store fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    #[serde(rename = "_id")]
    pub id: RecordId,

    /// Unix epoch milliseconds.
    #[serde(rename = "_date_created")]
    pub date_created: i64,

    /// Unix epoch milliseconds; equals `_date_created` on first creation.
    #[serde(rename = "_date_modified")]
    pub date_modified: i64,
}

impl RecordMeta {
    /// Metadata for a freshly created record.
    pub fn new(id: RecordId, now: i64) -> Self {
        Self {
            id,
            date_created: now,
            date_modified: now,
        }
    }

    /// Record a modification.
    pub fn touch(&mut self, now: i64) {
        self.date_modified = now;
    }
}

/// A persisted record together with its store metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stored<T> {
    #[serde(flatten)]
    pub meta: RecordMeta,

    #[serde(flatten)]
    pub record: T,
}

impl<T> Stored<T> {
    /// Wrap a freshly created record.
    pub fn create(record: T, now: i64) -> Self {
        Self {
            meta: RecordMeta::new(RecordId::mint(), now),
            record,
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_created_equals_modified_on_creation() {
        let meta = RecordMeta::new(RecordId::new("r1"), 42);
        assert_eq!(meta.date_created, meta.date_modified);
    }

    #[test]
    fn test_touch_moves_modified_only() {
        let mut meta = RecordMeta::new(RecordId::new("r1"), 42);
        meta.touch(100);
        assert_eq!(meta.date_created, 42);
        assert_eq!(meta.date_modified, 100);
    }

    #[test]
    fn test_meta_serde_field_names() {
        let meta = RecordMeta::new(RecordId::new("r1"), 42);
        let json = serde_json::to_value(&meta).unwrap();
        assert!(json.get("_id").is_some());
        assert!(json.get("_date_created").is_some());
        assert!(json.get("_date_modified").is_some());
    }
}
