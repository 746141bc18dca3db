//! Host transport: how a proxy reaches the host that owns an actor.
//!
//! The transport moves [`ActorMessage`]s to a host lifetime and brings back
//! its [`ActorResponse`]. Envelopes are serde types, so any RPC layer can
//! carry them; [`InProcessNetwork`] delivers them by direct call between
//! hosts of one process and can simulate partitions.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use super::types::{ActorMessage, ActorResponse, HostAddress, HostId};
use crate::error::TransportError;

/// Client side of the transport.
#[async_trait]
pub trait HostTransport: fmt::Debug + Send + Sync {
    /// Deliver `message` to the host lifetime `to` and wait for its answer.
    async fn send(&self, to: &HostId, message: ActorMessage)
        -> Result<ActorResponse, TransportError>;

    /// Whether `to` currently accepts connections.
    async fn probe(&self, to: &HostId) -> bool;
}

/// Server side of the transport: what a host exposes to the network.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle one incoming call.
    async fn handle(&self, message: ActorMessage) -> ActorResponse;
}

struct Endpoint {
    host: HostId,
    handler: Arc<dyn MessageHandler>,
}

/// Transport connecting hosts that live in the same process.
///
/// An endpoint only answers for the exact lifetime that attached it: a
/// message addressed to an older generation at the same address is
/// unreachable.
#[derive(Default)]
pub struct InProcessNetwork {
    endpoints: RwLock<HashMap<HostAddress, Endpoint>>,
    disconnected: RwLock<HashSet<HostAddress>>,
}

impl fmt::Debug for InProcessNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let attached: Vec<HostId> = self
            .endpoints
            .read()
            .values()
            .map(|e| e.host.clone())
            .collect();
        f.debug_struct("InProcessNetwork")
            .field("attached", &attached)
            .field("disconnected", &*self.disconnected.read())
            .finish()
    }
}

impl InProcessNetwork {
    /// Create an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `handler` as the endpoint for `host`.
    ///
    /// Fails if a different live lifetime is attached at the same address.
    pub fn attach(
        &self,
        host: HostId,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<(), TransportError> {
        let mut endpoints = self.endpoints.write();
        if endpoints.contains_key(&host.address) {
            return Err(TransportError::AddressInUse(host.address));
        }
        debug!(host = %host, "endpoint attached");
        endpoints.insert(host.address.clone(), Endpoint { host, handler });
        Ok(())
    }

    /// Whether some lifetime is attached at `address`.
    pub fn is_attached(&self, address: &HostAddress) -> bool {
        self.endpoints.read().contains_key(address)
    }

    /// Detach the endpoint for `host`, if that lifetime is attached.
    pub fn detach(&self, host: &HostId) {
        let mut endpoints = self.endpoints.write();
        if endpoints
            .get(&host.address)
            .is_some_and(|e| e.host == *host)
        {
            endpoints.remove(&host.address);
            debug!(host = %host, "endpoint detached");
        }
    }

    /// Make `address` unreachable without detaching it.
    pub fn disconnect(&self, address: &HostAddress) {
        self.disconnected.write().insert(address.clone());
    }

    /// Undo [`disconnect`](Self::disconnect).
    pub fn reconnect(&self, address: &HostAddress) {
        self.disconnected.write().remove(address);
    }

    fn handler_for(&self, to: &HostId) -> Option<Arc<dyn MessageHandler>> {
        if self.disconnected.read().contains(&to.address) {
            return None;
        }
        self.endpoints
            .read()
            .get(&to.address)
            .filter(|e| e.host == *to)
            .map(|e| e.handler.clone())
    }
}

#[async_trait]
impl HostTransport for InProcessNetwork {
    async fn send(
        &self,
        to: &HostId,
        message: ActorMessage,
    ) -> Result<ActorResponse, TransportError> {
        let handler = self
            .handler_for(to)
            .ok_or_else(|| TransportError::Unreachable(to.clone()))?;
        Ok(handler.handle(message).await)
    }

    async fn probe(&self, to: &HostId) -> bool {
        self.handler_for(to).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::{ActorId, ActorType};

    struct Echo {
        host: HostId,
    }

    #[async_trait]
    impl MessageHandler for Echo {
        async fn handle(&self, message: ActorMessage) -> ActorResponse {
            ActorResponse {
                body: Ok(message.body),
                responder: self.host.clone(),
            }
        }
    }

    fn message() -> ActorMessage {
        ActorMessage {
            target: ActorId::new(ActorType::new("Echo"), "e"),
            body: b"ping".to_vec(),
        }
    }

    fn attach_echo(network: &InProcessNetwork, host: &HostId) {
        network
            .attach(host.clone(), Arc::new(Echo { host: host.clone() }))
            .expect("attach");
    }

    #[tokio::test]
    async fn test_send_reaches_attached_host() {
        let network = InProcessNetwork::new();
        let host = HostId::new("127.0.0.1:1", 1);
        attach_echo(&network, &host);

        assert!(network.probe(&host).await);
        let response = network.send(&host, message()).await.expect("send");
        assert_eq!(response.body, Ok(b"ping".to_vec()));
        assert_eq!(response.responder, host);
    }

    #[tokio::test]
    async fn test_old_generation_is_unreachable() {
        let network = InProcessNetwork::new();
        let current = HostId::new("127.0.0.1:1", 2);
        attach_echo(&network, &current);

        let old = HostId::new("127.0.0.1:1", 1);
        assert!(!network.probe(&old).await);
        assert!(matches!(
            network.send(&old, message()).await,
            Err(TransportError::Unreachable(_))
        ));
    }

    #[tokio::test]
    async fn test_disconnect_and_reconnect() {
        let network = InProcessNetwork::new();
        let host = HostId::new("127.0.0.1:1", 1);
        attach_echo(&network, &host);

        network.disconnect(&host.address);
        assert!(!network.probe(&host).await);
        assert!(network.send(&host, message()).await.is_err());

        network.reconnect(&host.address);
        assert!(network.probe(&host).await);
    }

    #[tokio::test]
    async fn test_attach_twice_fails_until_detached() {
        let network = InProcessNetwork::new();
        let first = HostId::new("127.0.0.1:1", 1);
        let second = HostId::new("127.0.0.1:1", 2);
        assert!(!network.is_attached(&first.address));
        attach_echo(&network, &first);
        assert!(network.is_attached(&second.address));

        let result = network.attach(second.clone(), Arc::new(Echo { host: second.clone() }));
        assert!(matches!(result, Err(TransportError::AddressInUse(_))));

        // Detaching a lifetime that is not attached is a no-op.
        network.detach(&second);
        assert!(network.probe(&first).await);

        network.detach(&first);
        attach_echo(&network, &second);
        assert!(network.probe(&second).await);
    }
}
