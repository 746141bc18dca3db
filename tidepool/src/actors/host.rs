//! Actor host: one process lifetime serving virtual actors.
//!
//! A host joins membership, attaches to the network, and routes every
//! incoming [`ActorMessage`] to the activation manager registered for the
//! target's actor type.
//!
//! # Example
//!
//! ```rust,ignore
//! let cluster = ClusterConfig::in_memory();
//! let host = ActorHost::new(cluster.clone(), HostConfig::new("127.0.0.1:11111"))
//!     .register::<Counter>()
//!     .start()
//!     .await?;
//!
//! let counter: CounterRef = host.actor_ref("counter");
//! counter.increment(1).await?;
//!
//! host.shutdown().await?;
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::activation::{ActivationManager, HostStats};
use super::cluster::ClusterConfig;
use super::directory::PlacementDirectory;
use super::handler::{ActorHandler, ActorRef};
use super::host_config::{ActivationConfig, HostConfig};
use super::lifecycle::{ActivationState, DeactivationReason};
use super::membership::{HostStatus, MembershipProvider};
use super::placement::HashPlacement;
use super::proxy::ActorProxy;
use super::router::KeyRouter;
use super::state::StateStore;
use super::transport::MessageHandler;
use super::types::{ActorId, ActorMessage, ActorResponse, ActorType, HostId, RemoteError};
use crate::error::{HostError, TransportError};

/// Snapshot of a host's activation counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostStatsSnapshot {
    /// Activations started.
    pub activations: u64,
    /// Activations that completed deactivation.
    pub deactivations: u64,
    /// Activations currently resident.
    pub live: usize,
}

/// Type-erased view of one actor type's activation manager.
#[async_trait]
trait ActorDispatcher: Send + Sync {
    async fn dispatch(&self, message: ActorMessage) -> Result<Vec<u8>, RemoteError>;
    async fn deactivate(&self, id: &ActorId, reason: DeactivationReason) -> bool;
    async fn shutdown(&self);
    fn abort(&self);
    fn live_count(&self) -> usize;
    fn state_of(&self, id: &ActorId) -> ActivationState;
}

#[async_trait]
impl<H: ActorHandler> ActorDispatcher for ActivationManager<H> {
    async fn dispatch(&self, message: ActorMessage) -> Result<Vec<u8>, RemoteError> {
        let request: H::Request = serde_json::from_slice(&message.body)
            .map_err(|e| RemoteError::Codec(e.to_string()))?;
        let response = self.call(&message.target, request).await?;
        serde_json::to_vec(&response).map_err(|e| RemoteError::Codec(e.to_string()))
    }

    async fn deactivate(&self, id: &ActorId, reason: DeactivationReason) -> bool {
        ActivationManager::deactivate(self, id, reason).await
    }

    async fn shutdown(&self) {
        ActivationManager::shutdown(self).await
    }

    fn abort(&self) {
        ActivationManager::abort(self)
    }

    fn live_count(&self) -> usize {
        ActivationManager::live_count(self)
    }

    fn state_of(&self, id: &ActorId) -> ActivationState {
        ActivationManager::state_of(self, id)
    }
}

/// Everything a registration needs to build its activation manager.
struct HostParts {
    host: HostId,
    activation: ActivationConfig,
    store: Arc<dyn StateStore>,
    directory: Arc<dyn PlacementDirectory>,
    stats: Arc<HostStats>,
}

type Registration = fn(&HostParts) -> Arc<dyn ActorDispatcher>;

fn build_dispatcher<H: ActorHandler>(parts: &HostParts) -> Arc<dyn ActorDispatcher> {
    Arc::new(ActivationManager::<H>::new(
        parts.host.clone(),
        parts.activation.clone(),
        parts.store.clone(),
        parts.directory.clone(),
        parts.stats.clone(),
    ))
}

/// The network-facing side of a host.
struct HostCore {
    id: HostId,
    dispatchers: HashMap<ActorType, Arc<dyn ActorDispatcher>>,
    accepting: AtomicBool,
}

#[async_trait]
impl MessageHandler for HostCore {
    async fn handle(&self, message: ActorMessage) -> ActorResponse {
        let body = if !self.accepting.load(Ordering::SeqCst) {
            Err(RemoteError::HostShuttingDown {
                host: self.id.clone(),
            })
        } else {
            let dispatcher = self.dispatchers.get(&message.target.actor_type).cloned();
            match dispatcher {
                Some(dispatcher) => dispatcher.dispatch(message).await,
                None => Err(RemoteError::UnknownActorType(
                    message.target.actor_type.clone(),
                )),
            }
        };
        ActorResponse {
            body,
            responder: self.id.clone(),
        }
    }
}

/// A running host.
pub struct ActorHost {
    core: Arc<HostCore>,
    cluster: ClusterConfig,
    router: Arc<KeyRouter>,
    stats: Arc<HostStats>,
}

impl std::fmt::Debug for ActorHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorHost")
            .field("id", &self.core.id)
            .field("actor_types", &self.core.dispatchers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ActorHost {
    /// Start building a host for `cluster`.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(cluster: ClusterConfig, config: HostConfig) -> ActorHostBuilder {
        ActorHostBuilder {
            cluster,
            config,
            registrations: Vec::new(),
        }
    }

    /// This host's lifetime.
    pub fn id(&self) -> &HostId {
        &self.core.id
    }

    /// Router used by proxies created on this host.
    pub fn router(&self) -> &Arc<KeyRouter> {
        &self.router
    }

    /// Untyped proxy to the actor of type `H` with the given key.
    pub fn proxy<H: ActorHandler>(&self, key: impl Into<String>) -> ActorProxy<H> {
        ActorProxy::new(key, self.router.clone())
    }

    /// Typed reference to an actor.
    ///
    /// ```rust,ignore
    /// let counter: CounterRef = host.actor_ref("counter");
    /// ```
    pub fn actor_ref<R: ActorRef>(&self, key: impl Into<String>) -> R {
        R::from_proxy(self.proxy::<R::Handler>(key))
    }

    /// Activation counters.
    pub fn stats(&self) -> HostStatsSnapshot {
        HostStatsSnapshot {
            activations: self.stats.activations(),
            deactivations: self.stats.deactivations(),
            live: self.core.dispatchers.values().map(|d| d.live_count()).sum(),
        }
    }

    /// State of the local activation of `H` with `key`.
    pub fn activation_state<H: ActorHandler>(&self, key: &str) -> ActivationState {
        let id = ActorId::new(H::actor_type(), key);
        self.core
            .dispatchers
            .get(&id.actor_type)
            .map(|d| d.state_of(&id))
            .unwrap_or(ActivationState::Unloaded)
    }

    /// Deactivate the local activation of `H` with `key`, flushing its
    /// state. Returns `false` if it was not live here.
    pub async fn deactivate<H: ActorHandler>(&self, key: &str) -> bool {
        let id = ActorId::new(H::actor_type(), key);
        match self.core.dispatchers.get(&id.actor_type) {
            Some(d) => {
                d.deactivate(&id, DeactivationReason::ExplicitRequest)
                    .await
            }
            None => false,
        }
    }

    /// Graceful shutdown.
    ///
    /// Marks the host `ShuttingDown`, deactivates every live activation
    /// (draining queued calls and flushing state), detaches from the network
    /// and marks the host `Dead`.
    pub async fn shutdown(self) -> Result<(), HostError> {
        let id = self.core.id.clone();
        let membership = self.cluster.membership().clone();
        info!(host = %id, "host shutting down");

        membership
            .update_status(&id, HostStatus::ShuttingDown)
            .await?;
        self.core.accepting.store(false, Ordering::SeqCst);
        for dispatcher in self.core.dispatchers.values() {
            dispatcher.shutdown().await;
        }
        self.cluster.network().detach(&id);
        membership.update_status(&id, HostStatus::Dead).await?;

        info!(host = %id, stats = ?self.stats(), "host stopped");
        Ok(())
    }

    /// Simulate abrupt host loss: activations are dropped without flushing
    /// and the host stops answering. Membership is left untouched, as a
    /// crashed process cannot report its own death.
    pub fn crash(self) {
        let id = self.core.id.clone();
        warn!(host = %id, "host crashed");
        self.core.accepting.store(false, Ordering::SeqCst);
        self.cluster.network().detach(&id);
        for dispatcher in self.core.dispatchers.values() {
            dispatcher.abort();
        }
    }
}

/// Builder returned by [`ActorHost::new`].
pub struct ActorHostBuilder {
    cluster: ClusterConfig,
    config: HostConfig,
    registrations: Vec<(ActorType, Registration)>,
}

impl ActorHostBuilder {
    /// Serve actors of type `H` on this host.
    pub fn register<H: ActorHandler>(mut self) -> Self {
        self.registrations
            .push((H::actor_type(), build_dispatcher::<H> as Registration));
        self
    }

    /// Join the cluster and start serving.
    ///
    /// # Errors
    ///
    /// Fails if an actor type was registered twice, if membership refuses
    /// the join, or if another host is attached at the same address.
    pub async fn start(self) -> Result<ActorHost, HostError> {
        let mut seen = Vec::with_capacity(self.registrations.len());
        for (actor_type, _) in &self.registrations {
            if seen.contains(actor_type) {
                return Err(HostError::DuplicateActorType(actor_type.clone()));
            }
            seen.push(actor_type.clone());
        }

        let cluster = self.cluster;
        let address = self.config.address();
        // A failed start must leave the running host's membership entry alone.
        if cluster.network().is_attached(address) {
            return Err(TransportError::AddressInUse(address.clone()).into());
        }
        let membership = cluster.membership().clone();
        let host = membership.join(address.clone()).await?;

        let stats = Arc::new(HostStats::default());
        let parts = HostParts {
            host: host.clone(),
            activation: self.config.activation().clone(),
            store: self
                .config
                .state_store()
                .cloned()
                .unwrap_or_else(|| cluster.state_store().clone()),
            directory: cluster.directory().clone(),
            stats: stats.clone(),
        };
        let dispatchers = self
            .registrations
            .iter()
            .map(|(actor_type, build)| (actor_type.clone(), build(&parts)))
            .collect();

        let core = Arc::new(HostCore {
            id: host.clone(),
            dispatchers,
            accepting: AtomicBool::new(true),
        });
        if let Err(e) = cluster.network().attach(host.clone(), core.clone()) {
            let _ = membership.update_status(&host, HostStatus::Dead).await;
            return Err(e.into());
        }
        membership.update_status(&host, HostStatus::Active).await?;

        let placement = self
            .config
            .placement()
            .cloned()
            .unwrap_or_else(|| Arc::new(HashPlacement));
        let router = Arc::new(
            KeyRouter::new(
                cluster.directory().clone(),
                membership,
                placement,
                cluster.transport(),
            )
            .with_local_host(host.clone()),
        );

        info!(host = %host, cluster = ?cluster.name(), actor_types = ?seen, "host started");
        Ok(ActorHost {
            core,
            cluster,
            router,
            stats,
        })
    }
}
