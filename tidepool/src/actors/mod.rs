//! Virtual actor runtime.
//!
//! Callers address actors by `(ActorType, key)`. The router finds (or
//! chooses) the owning host lifetime, the transport carries the serialized
//! request there, and the host's activation manager runs it inside the
//! single live activation for that identity.
//!
//! ```text
//! ActorProxy ──resolve──▶ KeyRouter ──▶ PlacementDirectory
//!     │                       └──────▶ PlacementStrategy (live hosts)
//!     └──send──▶ HostTransport ──▶ ActorHost ──▶ ActivationManager<H>
//!                                                  └─▶ StateStore
//! ```
//!
//! # Turn-based execution
//!
//! One call at a time per activation, in arrival order. A mutating call's
//! reply is sent only after its new state is saved.

// --- Core types ---
mod lifecycle;
mod types;

pub use lifecycle::{ActivationState, DeactivationReason};
pub use types::{
    ActivationId, ActorId, ActorMessage, ActorResponse, ActorType, HostAddress, HostId, HostInfo,
    PlacementRecord, RemoteError,
};

// --- Cluster infrastructure ---
mod cluster;
mod directory;
mod membership;
mod placement;
mod transport;

pub use cluster::{ClusterConfig, ClusterConfigBuilder, ClusterConfigError};
pub use directory::{InMemoryPlacementDirectory, PlacementDirectory};
pub use membership::{
    ClusterMember, HostStatus, MembershipProvider, MembershipSnapshot, MembershipVersion,
    SharedMembership,
};
pub use placement::{
    fnv1a, rendezvous_order, rendezvous_score, HashPlacement, PlacementStrategy,
    PreferLocalPlacement, RandomPlacement,
};
pub use transport::{HostTransport, InProcessNetwork, MessageHandler};

// --- State persistence ---
mod persistent_state;
mod state;

pub use persistent_state::PersistentState;
pub use state::{FileStateStore, InMemoryStateStore, StateStore};

// --- Runtime ---
mod activation;
mod client;
mod handler;
mod host;
mod host_config;
mod proxy;
mod router;

pub use activation::HostStats;
pub use client::ClusterClient;
pub use handler::{ActorContext, ActorHandler, ActorRef};
pub use host::{ActorHost, ActorHostBuilder, HostStatsSnapshot};
pub use host_config::{
    ActivationConfig, HostConfig, HostConfigBuilder, DEFAULT_IDLE_TIMEOUT, DEFAULT_INBOX_CAPACITY,
};
pub use proxy::ActorProxy;
pub use router::{KeyRouter, Resolution};
