//! Host transport abstraction.
//!
//! The transport carries one CBOR request to a named host and returns
//! its response. Implementations may use HTTPS or any other carrier;
//! an in-memory network is provided for tests and single-process
//! deployments.

use async_trait::async_trait;

use ceps_core::HostId;

use crate::error::{FederationError, Result};
use crate::messages::FederationMessage;

/// Sends one federation request to a peer host and awaits its answer.
#[async_trait]
pub trait HostTransport: Send + Sync {
    async fn call(&self, host: &HostId, request: FederationMessage) -> Result<FederationMessage>;
}

/// The inbound half: a host's handler for federation requests.
///
/// A response is always produced; denials travel as
/// `FederationMessage::Error`, never as a transport failure.
#[async_trait]
pub trait HostEndpoint: Send + Sync {
    async fn handle(&self, request: FederationMessage) -> FederationMessage;
}

/// In-memory host network for tests.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    /// A registry of host endpoints reachable by name.
    ///
    /// Calls still pass through the CBOR codec in both directions, so a
    /// test exercising the memory network exercises the wire format
    /// too.
    pub struct MemoryNetwork {
        endpoints: RwLock<HashMap<HostId, Arc<dyn HostEndpoint>>>,
    }

    impl MemoryNetwork {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                endpoints: RwLock::new(HashMap::new()),
            })
        }

        /// Register a host's endpoint under its name.
        pub async fn register(&self, host: HostId, endpoint: Arc<dyn HostEndpoint>) {
            self.endpoints.write().await.insert(host, endpoint);
        }
    }

    #[async_trait]
    impl HostTransport for MemoryNetwork {
        async fn call(
            &self,
            host: &HostId,
            request: FederationMessage,
        ) -> Result<FederationMessage> {
            let endpoint = {
                let endpoints = self.endpoints.read().await;
                endpoints.get(host).cloned()
            };
            let endpoint = endpoint.ok_or_else(|| {
                FederationError::Transport(format!("unknown host: {host}"))
            })?;

            let wire = request.encode()?;
            let request = FederationMessage::decode(&wire)?;
            let response = endpoint.handle(request).await;
            let wire = response.encode()?;
            FederationMessage::decode(&wire)
        }
    }
}
