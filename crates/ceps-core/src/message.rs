//! Relayed messages: permissioned payloads moved between accounts.
//!
//! A message is written to the sender's `sent` box and, after successful
//! relay, to the recipient's `got` box. Delivered messages are immutable
//! except for the read flag.

use serde::{Deserialize, Serialize};

use crate::ids::{AppName, HostId, PermissionName, RecordId, TableId, UserId};

/// The closed set of message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// A shared record payload, authorized by a messaging grant.
    MessageRecords,
}

/// Which per-user message box a message sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageBox {
    /// The sender-side outbox.
    Sent,
    /// The recipient-side inbox.
    Got,
}

/// A permissioned payload relayed between accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender_id: UserId,
    pub sender_host: HostId,
    pub recipient_id: UserId,
    pub recipient_host: HostId,

    #[serde(rename = "type")]
    pub message_type: MessageType,

    /// The grant name authorizing the messaging action itself.
    pub messaging_permission: PermissionName,

    /// The grant name under which the recipient is a contact.
    pub contact_permission: PermissionName,

    /// The table the relayed record belongs to.
    pub table_id: TableId,

    /// The relayed record's id.
    pub record_id: RecordId,

    /// CBOR-encoded snapshot of the record at send time.
    pub record: Vec<u8>,

    /// The app under which the message was sent.
    pub app_id: AppName,

    /// Read flag; the only mutable field after delivery.
    pub read: bool,
}

impl Message {
    /// A message is local when sender and recipient live on the same
    /// server as seen from `host`.
    pub fn is_local_to(&self, host: &HostId) -> bool {
        self.recipient_host.is_local_to(host)
    }
}
