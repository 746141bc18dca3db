//! Cluster client: calls actors without hosting any.

use std::sync::Arc;
use std::time::Duration;

use super::cluster::ClusterConfig;
use super::handler::{ActorHandler, ActorRef};
use super::placement::{HashPlacement, PlacementStrategy};
use super::proxy::ActorProxy;
use super::router::KeyRouter;

/// Caller-only view of a cluster.
#[derive(Debug, Clone)]
pub struct ClusterClient {
    router: Arc<KeyRouter>,
    call_timeout: Option<Duration>,
}

impl ClusterClient {
    /// Client placing new actors with [`HashPlacement`].
    pub fn new(cluster: &ClusterConfig) -> Self {
        Self::with_placement(cluster, Arc::new(HashPlacement))
    }

    /// Client placing new actors with `placement`.
    pub fn with_placement(cluster: &ClusterConfig, placement: Arc<dyn PlacementStrategy>) -> Self {
        let router = KeyRouter::new(
            cluster.directory().clone(),
            cluster.membership().clone(),
            placement,
            cluster.transport(),
        );
        Self {
            router: Arc::new(router),
            call_timeout: None,
        }
    }

    /// Apply `timeout` to every proxy this client hands out.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// The client's router.
    pub fn router(&self) -> &Arc<KeyRouter> {
        &self.router
    }

    /// Proxy to the actor of type `H` with the given key.
    pub fn proxy<H: ActorHandler>(&self, key: impl Into<String>) -> ActorProxy<H> {
        let proxy = ActorProxy::new(key, self.router.clone());
        match self.call_timeout {
            Some(timeout) => proxy.with_call_timeout(timeout),
            None => proxy,
        }
    }

    /// Typed reference to an actor.
    pub fn actor_ref<R: ActorRef>(&self, key: impl Into<String>) -> R {
        R::from_proxy(self.proxy::<R::Handler>(key))
    }
}
