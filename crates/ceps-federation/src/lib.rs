//! Federation layer for CEPS.
//!
//! Covers everything that crosses an account or host boundary: the
//! validation token exchange (one-shot trust bootstrap), the sharing
//! service (grantee resolution and grant records), the message relay,
//! and the CBOR wire protocol with its transport abstraction.

pub mod error;
pub mod exchange;
pub mod messages;
pub mod relay;
pub mod sharing;
pub mod transport;

pub use error::{FederationError, Result};
pub use exchange::{ExchangeConfig, ValidationExchange, ValidationScope};
pub use messages::{FederationErrorCode, FederationMessage, PROTOCOL_VERSION};
pub use relay::{MessageDraft, MessageRelay};
pub use sharing::{ShareAction, ShareRequest, SharingService};
pub use transport::{memory::MemoryNetwork, HostEndpoint, HostTransport};
