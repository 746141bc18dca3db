//! Core virtual actor types.
//!
//! These types form the contract between callers, routers and hosts. The
//! transport treats `ActorMessage` and `ActorResponse` as opaque payloads; only
//! the activation manager on the owning host decodes the body.
//!
//! # Design
//!
//! - `ActorType` is the registered name of a handler (e.g. `"Counter"`).
//! - `ActorId` is `ActorType` + a case-sensitive string key.
//! - `HostId` is a host address plus the generation handed out by membership
//!   when that process joined. A restarted host keeps its address but gets a
//!   strictly greater generation.
//! - `PlacementRecord` maps an `ActorId` to the `HostId` that owns it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies an actor TYPE: the registered name of its handler.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize, Debug)]
pub struct ActorType(pub String);

impl ActorType {
    /// Create an actor type from its name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The type name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Full virtual actor address = type + string key.
///
/// Keys are opaque and case-sensitive. The empty key is a valid key.
///
/// # Examples
///
/// ```rust
/// use tidepool::actors::{ActorId, ActorType};
///
/// let id = ActorId::new(ActorType::new("Counter"), "counter");
/// assert_eq!(id.to_string(), "Counter/counter");
/// ```
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize, Debug)]
pub struct ActorId {
    /// The type of actor (identifies the handler).
    pub actor_type: ActorType,
    /// The specific instance key (e.g. "counter", "player-42").
    pub key: String,
}

impl ActorId {
    /// Create a new actor ID.
    pub fn new(actor_type: ActorType, key: impl Into<String>) -> Self {
        Self {
            actor_type,
            key: key.into(),
        }
    }

    /// Key under which the state store keeps this actor's snapshot.
    pub fn storage_key(&self) -> String {
        format!("{}/{}", self.actor_type, self.key)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.actor_type, self.key)
    }
}

/// Opaque host address (e.g. `127.0.0.1:11111`).
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize, Debug)]
pub struct HostAddress(pub String);

impl HostAddress {
    /// Create an address from its string form.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// The address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HostAddress {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for HostAddress {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One process lifetime of a host: address + generation.
///
/// Two `HostId`s with the same address but different generations are
/// different hosts as far as placement is concerned.
#[derive(Clone, Hash, Eq, PartialEq, Serialize, Deserialize, Debug)]
pub struct HostId {
    /// Where the host listens.
    pub address: HostAddress,
    /// Monotonic generation assigned at join.
    pub generation: u64,
}

impl HostId {
    /// Create a host ID.
    pub fn new(address: impl Into<HostAddress>, generation: u64) -> Self {
        Self {
            address: address.into(),
            generation,
        }
    }

    /// Last-writer-wins ordering between two placement owners.
    ///
    /// The higher generation wins; equal generations fall back to address
    /// ordering so that every router reaches the same verdict.
    pub fn supersedes(&self, other: &HostId) -> bool {
        (self.generation, &self.address) > (other.generation, &other.address)
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.address, self.generation)
    }
}

/// Unique identifier for a specific activation of an actor on a host.
///
/// A re-activation of the same `ActorId` always gets a fresh value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivationId(pub u64);

impl ActivationId {
    /// Create a new activation ID from a raw value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ActivationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "act-{:016x}", self.0)
    }
}

/// Directory entry: which host owns an actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRecord {
    /// The placed actor.
    pub actor_id: ActorId,
    /// The owning host lifetime.
    pub host: HostId,
}

impl PlacementRecord {
    /// Create a placement record.
    pub fn new(actor_id: ActorId, host: HostId) -> Self {
        Self { actor_id, host }
    }
}

/// Request envelope for a virtual actor call.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct ActorMessage {
    /// The target actor instance.
    pub target: ActorId,
    /// Serialized handler request.
    pub body: Vec<u8>,
}

/// Response envelope for a virtual actor call.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct ActorResponse {
    /// Serialized handler response, or the reason the call failed on the host.
    pub body: Result<Vec<u8>, RemoteError>,
    /// The host that answered.
    pub responder: HostId,
}

/// Failure reported by the host that received an `ActorMessage`.
///
/// Carried over the wire, so it only holds plain data; the proxy turns it
/// into an [`ActorError`](crate::ActorError) for the caller.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum RemoteError {
    /// The receiving host does not own the actor.
    PlacementStale {
        /// Current owner according to the directory.
        owner: HostId,
    },
    /// Loading or saving state failed.
    PersistenceUnavailable {
        /// Whether the handler ran before the failure.
        executed: bool,
        /// Store error message.
        reason: String,
    },
    /// The call waited longer than the host's call timeout.
    ActivationTimeout {
        /// Timeout in milliseconds.
        after_ms: u64,
    },
    /// The activation went away before answering.
    ActivationLost,
    /// The host is shutting down and no longer accepts calls.
    HostShuttingDown {
        /// The refusing host.
        host: HostId,
    },
    /// No handler registered for the target actor type.
    UnknownActorType(ActorType),
    /// Request or response body could not be (de)serialized.
    Codec(String),
    /// The placement directory failed.
    Directory(String),
}

/// Where an activation lives, as reported by the actor itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    /// The actor answering.
    pub actor_id: ActorId,
    /// Address of the host running the activation.
    pub host_address: HostAddress,
    /// Generation of that host.
    pub host_generation: u64,
    /// The activation answering.
    pub activation_id: ActivationId,
}

impl fmt::Display for HostInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Actor: {}, Address: {}, HostGeneration: {}",
            self.actor_id, self.host_address, self.host_generation
        )
    }
}
