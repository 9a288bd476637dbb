//! Federation wire messages.
//!
//! Request/response pairs exchanged between hosts, CBOR-encoded. There
//! is no connection state: every exchange is one request and one
//! response.

use serde::{Deserialize, Serialize};

use ceps_core::{AppName, DenialError, Message, RecordId, TokenValue, ValidationClaims};

use crate::error::{FederationError, Result};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 0;

/// Error codes carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FederationErrorCode {
    /// Unknown/unspecified error.
    Unknown,
    /// Protocol version mismatch.
    VersionMismatch,
    /// Malformed or out-of-place message.
    InvalidMessage,
    /// The peer's authorization verdict was a denial.
    Denied,
    /// Internal error on the peer.
    InternalError,
}

/// Messages exchanged between hosts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FederationMessage {
    /// Cross-host redemption of a validation token. Sent by the host
    /// holding the token's scope claims to the host that minted it.
    Validate {
        protocol_version: u8,
        validation_token: TokenValue,
        claims: ValidationClaims,
        app_id: AppName,
    },

    /// Answer to `Validate`. On success carries the freshly minted
    /// access credential.
    Validated {
        validated: bool,
        access_token: Option<TokenValue>,
        expiry: Option<i64>,
    },

    /// Deliver a relayed message to the recipient's host. The token
    /// references a validation the recipient host redeems before
    /// accepting.
    Transmit {
        protocol_version: u8,
        validation_token: TokenValue,
        message: Message,
    },

    /// Answer to `Transmit`.
    Delivered {
        delivered: bool,
        message_id: Option<RecordId>,
    },

    /// Same-host confirmation that a validation token exists and is
    /// live. Does not consume the token or mint anything.
    Verify {
        protocol_version: u8,
        validation_token: TokenValue,
    },

    /// Answer to `Verify`.
    Verified { verified: bool },

    /// Terminal error answer to any request.
    Error {
        code: FederationErrorCode,
        message: String,
    },
}

impl FederationMessage {
    /// CBOR-encode for the wire.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| FederationError::Codec(e.to_string()))?;
        Ok(buf)
    }

    /// Decode a wire message.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| FederationError::Codec(e.to_string()))
    }

    /// The version a request message declares, if it is a request.
    pub fn protocol_version(&self) -> Option<u8> {
        match self {
            FederationMessage::Validate {
                protocol_version, ..
            }
            | FederationMessage::Transmit {
                protocol_version, ..
            }
            | FederationMessage::Verify {
                protocol_version, ..
            } => Some(*protocol_version),
            _ => None,
        }
    }

    /// The error answer for a denial verdict.
    pub fn denial(denial: &DenialError) -> Self {
        FederationMessage::Error {
            code: FederationErrorCode::Denied,
            message: denial.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ceps_core::{HostId, PermissionName, TableId, UserId};

    #[test]
    fn test_validate_roundtrip() {
        let msg = FederationMessage::Validate {
            protocol_version: PROTOCOL_VERSION,
            validation_token: TokenValue::mint(),
            claims: ValidationClaims {
                data_owner_user: UserId::new("alice"),
                table_id: TableId::new("app.notes"),
                permission: PermissionName::new("link"),
                requestor_user: UserId::new("bob"),
                requestor_host: Some(HostId::new("b.example.org")),
            },
            app_id: AppName::new("app"),
        };

        let decoded = FederationMessage::decode(&msg.encode().unwrap()).unwrap();
        match decoded {
            FederationMessage::Validate {
                protocol_version,
                claims,
                ..
            } => {
                assert_eq!(protocol_version, PROTOCOL_VERSION);
                assert_eq!(claims.requestor_user, UserId::new("bob"));
            }
            other => panic!("expected Validate, got {other:?}"),
        }
    }

    #[test]
    fn test_only_requests_declare_versions() {
        let req = FederationMessage::Verify {
            protocol_version: PROTOCOL_VERSION,
            validation_token: TokenValue::mint(),
        };
        assert_eq!(req.protocol_version(), Some(PROTOCOL_VERSION));

        let resp = FederationMessage::Verified { verified: true };
        assert_eq!(resp.protocol_version(), None);
    }

    #[test]
    fn test_garbage_fails_to_decode() {
        assert!(FederationMessage::decode(&[0xff, 0x00, 0x13]).is_err());
    }
}
