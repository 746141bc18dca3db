//! Error types for the tidepool actor system.

use std::time::Duration;

use thiserror::Error;

use crate::actors::{ActorId, ActorType, HostAddress, HostId, RemoteError};

/// Whether a failed call ran its handler.
///
/// Lets callers decide between blind retry (`NotExecuted`), reconciliation
/// (`Executed`), and a read-before-retry (`Unknown`). Increment carries no
/// deduplication token, so retrying an `Unknown` increment may apply it twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    /// The handler never ran.
    NotExecuted,
    /// The handler ran and its effect is in memory on the owning activation.
    Executed,
    /// The caller cannot tell.
    Unknown,
}

/// Errors surfaced to callers of virtual actors.
#[derive(Debug, Error)]
pub enum ActorError {
    /// The contacted host does not own the actor.
    #[error("placement of {id} is stale, current owner is {owner}")]
    PlacementStale {
        /// Target actor.
        id: ActorId,
        /// Owner named by the directory.
        owner: HostId,
    },

    /// State could not be loaded or saved.
    #[error("persistence unavailable for {id} (executed: {executed}): {reason}")]
    PersistenceUnavailable {
        /// Target actor.
        id: ActorId,
        /// `false` for load failures, `true` for write-through failures.
        executed: bool,
        /// Store error message.
        reason: String,
    },

    /// The caller stopped waiting.
    #[error("call to {id} timed out after {after:?}")]
    ActivationTimeout {
        /// Target actor.
        id: ActorId,
        /// Elapsed bound.
        after: Duration,
    },

    /// The activation disappeared before replying (e.g. its host crashed).
    #[error("activation of {id} was lost before replying")]
    ActivationLost {
        /// Target actor.
        id: ActorId,
    },

    /// The routed host could not be reached.
    #[error("host {host} is unreachable")]
    HostUnreachable {
        /// The host that did not answer.
        host: HostId,
    },

    /// Every host is down or unreachable.
    #[error("no live reachable host for {id}")]
    NoLiveHosts {
        /// Target actor.
        id: ActorId,
    },

    /// The host refused the call because it is shutting down.
    #[error("host {host} is shutting down")]
    HostShuttingDown {
        /// The refusing host.
        host: HostId,
    },

    /// The host has no handler for this actor type.
    #[error("unknown actor type: {0}")]
    UnknownActorType(ActorType),

    /// A request or response body could not be (de)serialized.
    #[error("codec error: {0}")]
    Codec(String),

    /// Directory error.
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// Membership error.
    #[error("membership error: {0}")]
    Membership(#[from] MembershipError),
}

impl ActorError {
    /// Rebuild a caller-side error from what the host reported.
    pub fn from_remote(id: &ActorId, remote: RemoteError) -> Self {
        match remote {
            RemoteError::PlacementStale { owner } => ActorError::PlacementStale {
                id: id.clone(),
                owner,
            },
            RemoteError::PersistenceUnavailable { executed, reason } => {
                ActorError::PersistenceUnavailable {
                    id: id.clone(),
                    executed,
                    reason,
                }
            }
            RemoteError::ActivationTimeout { after_ms } => ActorError::ActivationTimeout {
                id: id.clone(),
                after: Duration::from_millis(after_ms),
            },
            RemoteError::ActivationLost => ActorError::ActivationLost { id: id.clone() },
            RemoteError::HostShuttingDown { host } => ActorError::HostShuttingDown { host },
            RemoteError::UnknownActorType(actor_type) => ActorError::UnknownActorType(actor_type),
            RemoteError::Codec(message) => ActorError::Codec(message),
            RemoteError::Directory(message) => {
                ActorError::Directory(DirectoryError::Unavailable(message))
            }
        }
    }

    /// Whether the handler ran.
    pub fn execution(&self) -> Execution {
        match self {
            ActorError::PersistenceUnavailable { executed: true, .. } => Execution::Executed,
            ActorError::ActivationTimeout { .. } | ActorError::ActivationLost { .. } => {
                Execution::Unknown
            }
            _ => Execution::NotExecuted,
        }
    }

    /// Whether retrying the same call later can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ActorError::PlacementStale { .. }
                | ActorError::PersistenceUnavailable { .. }
                | ActorError::ActivationTimeout { .. }
                | ActorError::ActivationLost { .. }
                | ActorError::HostUnreachable { .. }
                | ActorError::HostShuttingDown { .. }
                | ActorError::Directory(_)
        )
    }

    /// Errors the proxy answers with a single re-resolve and retry.
    pub(crate) fn requires_reresolve(&self) -> bool {
        matches!(
            self,
            ActorError::PlacementStale { .. }
                | ActorError::HostUnreachable { .. }
                | ActorError::HostShuttingDown { .. }
        )
    }
}

impl From<serde_json::Error> for ActorError {
    fn from(err: serde_json::Error) -> Self {
        ActorError::Codec(err.to_string())
    }
}

/// Errors from a [`StateStore`](crate::actors::StateStore).
#[derive(Debug, Error)]
pub enum StateStoreError {
    /// The backend refused or could not serve the request.
    #[error("state store unavailable: {0}")]
    Unavailable(String),

    /// Filesystem I/O failed.
    #[error("state store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A snapshot could not be (de)serialized.
    #[error("state serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from a [`PlacementDirectory`](crate::actors::PlacementDirectory).
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The directory backend could not be reached.
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Errors from a [`MembershipProvider`](crate::actors::MembershipProvider).
#[derive(Debug, Error)]
pub enum MembershipError {
    /// The host lifetime is not (or no longer) a member.
    #[error("unknown host: {0}")]
    UnknownHost(HostId),
}

/// Errors from a [`HostTransport`](crate::actors::HostTransport).
#[derive(Debug, Error)]
pub enum TransportError {
    /// Nothing answers for that host lifetime.
    #[error("host {0} is unreachable")]
    Unreachable(HostId),

    /// Another live host is already attached at this address.
    #[error("address already in use: {0}")]
    AddressInUse(HostAddress),
}

/// Errors from starting an [`ActorHost`](crate::actors::ActorHost).
#[derive(Debug, Error)]
pub enum HostError {
    /// Joining or updating membership failed.
    #[error("membership error: {0}")]
    Membership(#[from] MembershipError),

    /// Attaching to the network failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Two handlers registered under the same actor type.
    #[error("actor type registered twice: {0}")]
    DuplicateActorType(ActorType),
}
