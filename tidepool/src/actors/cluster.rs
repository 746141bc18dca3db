//! Cluster configuration: shared state for all hosts in a cluster.
//!
//! [`ClusterConfig`] bundles the membership view, placement directory,
//! network and default state store that hosts and clients share. All hosts
//! of an in-process cluster hold clones of the same `ClusterConfig`.
//!
//! # Example
//!
//! ```rust,ignore
//! let cluster = ClusterConfig::builder()
//!     .name("counters")
//!     .membership(Arc::new(SharedMembership::new()))
//!     .state_store(Arc::new(FileStateStore::open("./data").await?))
//!     .build()?;
//! ```

use std::sync::Arc;

use super::directory::{InMemoryPlacementDirectory, PlacementDirectory};
use super::membership::{MembershipProvider, SharedMembership};
use super::state::{InMemoryStateStore, StateStore};
use super::transport::{HostTransport, InProcessNetwork};

/// Shared cluster configuration.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    name: Option<String>,
    membership: Arc<dyn MembershipProvider>,
    directory: Arc<dyn PlacementDirectory>,
    network: Arc<InProcessNetwork>,
    state_store: Arc<dyn StateStore>,
}

impl ClusterConfig {
    /// Start building a cluster configuration.
    pub fn builder() -> ClusterConfigBuilder {
        ClusterConfigBuilder {
            name: None,
            membership: None,
            directory: None,
            network: None,
            state_store: None,
        }
    }

    /// A fully in-memory cluster: shared membership, directory, network and
    /// state store.
    pub fn in_memory() -> Self {
        Self {
            name: None,
            membership: Arc::new(SharedMembership::new()),
            directory: Arc::new(InMemoryPlacementDirectory::new()),
            network: Arc::new(InProcessNetwork::new()),
            state_store: Arc::new(InMemoryStateStore::new()),
        }
    }

    /// Optional cluster name (for logging).
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The shared membership provider.
    pub fn membership(&self) -> &Arc<dyn MembershipProvider> {
        &self.membership
    }

    /// The shared placement directory.
    pub fn directory(&self) -> &Arc<dyn PlacementDirectory> {
        &self.directory
    }

    /// The in-process network hosts attach to.
    pub fn network(&self) -> &Arc<InProcessNetwork> {
        &self.network
    }

    /// The network as a client-side transport.
    pub fn transport(&self) -> Arc<dyn HostTransport> {
        self.network.clone()
    }

    /// State store used by hosts that do not configure their own.
    pub fn state_store(&self) -> &Arc<dyn StateStore> {
        &self.state_store
    }
}

/// Builder for [`ClusterConfig`].
pub struct ClusterConfigBuilder {
    name: Option<String>,
    membership: Option<Arc<dyn MembershipProvider>>,
    directory: Option<Arc<dyn PlacementDirectory>>,
    network: Option<Arc<InProcessNetwork>>,
    state_store: Option<Arc<dyn StateStore>>,
}

impl ClusterConfigBuilder {
    /// Set the cluster name (for logging).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the membership provider.
    pub fn membership(mut self, membership: Arc<dyn MembershipProvider>) -> Self {
        self.membership = Some(membership);
        self
    }

    /// Set the placement directory.
    ///
    /// If not set, defaults to [`InMemoryPlacementDirectory`].
    pub fn directory(mut self, directory: Arc<dyn PlacementDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Set the network.
    ///
    /// If not set, a fresh [`InProcessNetwork`] is created.
    pub fn network(mut self, network: Arc<InProcessNetwork>) -> Self {
        self.network = Some(network);
        self
    }

    /// Set the default state store.
    ///
    /// If not set, defaults to [`InMemoryStateStore`].
    pub fn state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.state_store = Some(store);
        self
    }

    /// Build the cluster configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if no membership provider was set.
    pub fn build(self) -> Result<ClusterConfig, ClusterConfigError> {
        let membership = self
            .membership
            .ok_or(ClusterConfigError::MissingMembership)?;
        Ok(ClusterConfig {
            name: self.name,
            membership,
            directory: self
                .directory
                .unwrap_or_else(|| Arc::new(InMemoryPlacementDirectory::new())),
            network: self
                .network
                .unwrap_or_else(|| Arc::new(InProcessNetwork::new())),
            state_store: self
                .state_store
                .unwrap_or_else(|| Arc::new(InMemoryStateStore::new())),
        })
    }
}

/// Errors from building a [`ClusterConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ClusterConfigError {
    /// No membership provider was provided to the builder.
    #[error("cluster config requires a membership provider")]
    MissingMembership,
}
