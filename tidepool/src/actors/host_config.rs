//! Per-host configuration for [`ActorHost`](super::ActorHost).
//!
//! Separates host-level settings (address, placement, state store,
//! activation tuning) from cluster-level settings
//! ([`ClusterConfig`](super::ClusterConfig)).

use std::sync::Arc;
use std::time::Duration;

use super::placement::PlacementStrategy;
use super::state::StateStore;
use super::types::HostAddress;

/// Default idle window before an activation is evicted.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Default per-activation inbox capacity.
pub const DEFAULT_INBOX_CAPACITY: usize = 128;

/// Tuning for activations hosted by one [`ActorHost`](super::ActorHost).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationConfig {
    /// Evict an activation after this long without calls.
    pub idle_timeout: Duration,
    /// Bounded inbox size; senders wait when full.
    pub inbox_capacity: usize,
    /// Write-through save attempts per mutating call (at least 1).
    pub save_attempts: u32,
    /// Pause between write-through save attempts.
    pub save_backoff: Duration,
    /// How often a dirty activation retries its flush while idle.
    pub flush_retry_interval: Duration,
    /// Host-side bound on how long a call may wait for its reply.
    pub call_timeout: Option<Duration>,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
            save_attempts: 3,
            save_backoff: Duration::from_millis(50),
            flush_retry_interval: Duration::from_secs(1),
            call_timeout: None,
        }
    }
}

impl ActivationConfig {
    /// Override the idle timeout.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Override the host-side call timeout.
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = Some(call_timeout);
        self
    }
}

/// Per-host configuration for an [`ActorHost`](super::ActorHost).
///
/// Settings left unset fall back to the cluster's state store,
/// [`HashPlacement`](super::HashPlacement), and
/// [`ActivationConfig::default`].
///
/// # Example
///
/// ```rust,ignore
/// let config = HostConfig::new("127.0.0.1:11111");
///
/// let config = HostConfig::builder("127.0.0.1:11112")
///     .placement(Arc::new(PreferLocalPlacement))
///     .activation(ActivationConfig::default().with_idle_timeout(Duration::from_secs(30)))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct HostConfig {
    address: HostAddress,
    placement: Option<Arc<dyn PlacementStrategy>>,
    state_store: Option<Arc<dyn StateStore>>,
    activation: ActivationConfig,
}

impl HostConfig {
    /// Config with only the address set.
    pub fn new(address: impl Into<HostAddress>) -> Self {
        Self {
            address: address.into(),
            placement: None,
            state_store: None,
            activation: ActivationConfig::default(),
        }
    }

    /// Start building a host configuration.
    pub fn builder(address: impl Into<HostAddress>) -> HostConfigBuilder {
        HostConfigBuilder {
            config: Self::new(address),
        }
    }

    /// The address this host attaches at.
    pub fn address(&self) -> &HostAddress {
        &self.address
    }

    /// The placement strategy, if explicitly set.
    pub fn placement(&self) -> Option<&Arc<dyn PlacementStrategy>> {
        self.placement.as_ref()
    }

    /// The state store, if explicitly set.
    pub fn state_store(&self) -> Option<&Arc<dyn StateStore>> {
        self.state_store.as_ref()
    }

    /// Activation tuning.
    pub fn activation(&self) -> &ActivationConfig {
        &self.activation
    }
}

/// Builder for [`HostConfig`].
#[derive(Debug, Clone)]
pub struct HostConfigBuilder {
    config: HostConfig,
}

impl HostConfigBuilder {
    /// Set the placement strategy.
    pub fn placement(mut self, placement: Arc<dyn PlacementStrategy>) -> Self {
        self.config.placement = Some(placement);
        self
    }

    /// Set the state store, overriding the cluster default.
    pub fn state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.config.state_store = Some(store);
        self
    }

    /// Set activation tuning.
    pub fn activation(mut self, activation: ActivationConfig) -> Self {
        self.config.activation = activation;
        self
    }

    /// Build the host configuration (infallible).
    pub fn build(self) -> HostConfig {
        self.config
    }
}
