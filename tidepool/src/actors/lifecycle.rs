//! Activation state machine and deactivation reasons.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Per-identity activation state machine.
///
/// # State Transitions
///
/// ```text
/// Unloaded → Activating → Active → Deactivating → Unloaded
///                 ↓
///              Unloaded (state load failed)
/// ```
///
/// # Invariants
///
/// - Calls are only executed while `Active` (or while draining the inbox
///   during `Deactivating`).
/// - An identity re-enters `Activating` only after reaching `Unloaded`, so a
///   new activation always loads what the previous one flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivationState {
    /// No instance resident on this host.
    Unloaded,

    /// State load in progress; calls queue.
    Activating,

    /// Processing calls one at a time.
    Active,

    /// Draining queued calls and flushing state.
    Deactivating,
}

impl ActivationState {
    /// Check if transition to next state is valid.
    ///
    /// # Valid Transitions
    ///
    /// - Unloaded → Activating
    /// - Activating → Active (load succeeded)
    /// - Activating → Unloaded (load failed)
    /// - Active → Deactivating
    /// - Deactivating → Unloaded
    pub fn can_transition_to(&self, next: ActivationState) -> bool {
        use ActivationState::*;
        matches!(
            (self, next),
            (Unloaded, Activating)
                | (Activating, Active)
                | (Activating, Unloaded)
                | (Active, Deactivating)
                | (Deactivating, Unloaded)
        )
    }
}

impl fmt::Display for ActivationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActivationState::Unloaded => "unloaded",
            ActivationState::Activating => "activating",
            ActivationState::Active => "active",
            ActivationState::Deactivating => "deactivating",
        };
        f.write_str(name)
    }
}

/// Reason why an activation is being torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeactivationReason {
    /// No call arrived within the idle timeout (default: 10 minutes).
    IdleTimeout,

    /// Explicit deactivation request (e.g. via `ActorHost::deactivate`).
    ExplicitRequest,

    /// The host is shutting down.
    HostShutdown,

    /// The directory names another host as owner.
    PlacementLost,

    /// State could not be loaded while activating.
    LoadFailed,
}

impl DeactivationReason {
    /// Whether the activation ended because something went wrong rather
    /// than by policy or request.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            DeactivationReason::PlacementLost | DeactivationReason::LoadFailed
        )
    }

    /// Whether dirty state is flushed before the activation is dropped.
    ///
    /// A host that lost placement must not overwrite what the new owner
    /// writes.
    pub fn flushes_state(&self) -> bool {
        !matches!(
            self,
            DeactivationReason::PlacementLost | DeactivationReason::LoadFailed
        )
    }
}

impl fmt::Display for DeactivationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeactivationReason::IdleTimeout => "idle-timeout",
            DeactivationReason::ExplicitRequest => "explicit-request",
            DeactivationReason::HostShutdown => "host-shutdown",
            DeactivationReason::PlacementLost => "placement-lost",
            DeactivationReason::LoadFailed => "load-failed",
        };
        f.write_str(name)
    }
}
