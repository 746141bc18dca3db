//! Membership provider: tracks which hosts are in the cluster.
//!
//! The [`MembershipProvider`] trait gives routers the current set of live
//! host lifetimes and hands out host generations. Failure detection and
//! gossip are out of scope: whoever drives the provider (a host shutting
//! down, a test, an external detector) reports status transitions.
//!
//! # Design
//!
//! - Every `join` returns a [`HostId`] whose generation is strictly greater
//!   than any generation handed out before, so a host restarted at the same
//!   address never aliases its previous lifetime.
//! - [`SharedMembership`] is an in-process implementation where all hosts
//!   share one view behind an `Arc`.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::types::{HostAddress, HostId};
use crate::error::MembershipError;

/// Monotonically increasing membership version.
///
/// Every membership change (join, status transition) bumps the version.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct MembershipVersion(pub u64);

impl MembershipVersion {
    /// Create version 0 (initial).
    pub fn new() -> Self {
        Self(0)
    }

    /// Return the next version.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for MembershipVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Status of a host lifetime in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HostStatus {
    /// Announced but not yet serving.
    Joining,
    /// Serving calls; eligible for placement.
    Active,
    /// Draining activations; no longer eligible for placement.
    ShuttingDown,
    /// Gone (crashed or completed shutdown).
    Dead,
}

impl fmt::Display for HostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Joining => write!(f, "Joining"),
            Self::Active => write!(f, "Active"),
            Self::ShuttingDown => write!(f, "ShuttingDown"),
            Self::Dead => write!(f, "Dead"),
        }
    }
}

/// A single member of the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMember {
    /// Host lifetime.
    pub host: HostId,
    /// Current lifecycle status.
    pub status: HostStatus,
}

impl ClusterMember {
    /// Create a new cluster member.
    pub fn new(host: HostId, status: HostStatus) -> Self {
        Self { host, status }
    }

    /// Check if this member can own activations.
    pub fn is_live(&self) -> bool {
        self.status == HostStatus::Active
    }
}

/// Immutable snapshot of cluster membership at a specific version.
///
/// Holds the latest lifetime known for each address.
#[derive(Debug, Clone, Default)]
pub struct MembershipSnapshot {
    /// Latest known lifetime per address.
    pub members: HashMap<HostAddress, ClusterMember>,
    /// Version of this snapshot.
    pub version: MembershipVersion,
}

impl MembershipSnapshot {
    /// Live host lifetimes, sorted by address for deterministic iteration.
    pub fn live_hosts(&self) -> Vec<HostId> {
        let mut hosts: Vec<HostId> = self
            .members
            .values()
            .filter(|m| m.is_live())
            .map(|m| m.host.clone())
            .collect();
        hosts.sort_by(|a, b| a.address.cmp(&b.address));
        hosts
    }

    /// Status of an exact host lifetime, or `None` if unknown or superseded.
    pub fn status_of(&self, host: &HostId) -> Option<HostStatus> {
        self.members
            .get(&host.address)
            .filter(|m| m.host.generation == host.generation)
            .map(|m| m.status)
    }
}

/// Provides the current cluster membership view and host generations.
#[async_trait]
pub trait MembershipProvider: fmt::Debug + Send + Sync {
    /// Join the cluster at `address`, returning a fresh lifetime in
    /// `Joining` status.
    ///
    /// A previous lifetime at the same address is replaced (and thereby no
    /// longer live).
    async fn join(&self, address: HostAddress) -> Result<HostId, MembershipError>;

    /// Move a lifetime to a new status.
    ///
    /// Fails with [`MembershipError::UnknownHost`] if `host` is not the
    /// current lifetime at its address.
    async fn update_status(
        &self,
        host: &HostId,
        status: HostStatus,
    ) -> Result<MembershipVersion, MembershipError>;

    /// Full membership snapshot.
    async fn snapshot(&self) -> MembershipSnapshot;

    /// Host lifetimes currently eligible for placement.
    async fn live_hosts(&self) -> Vec<HostId> {
        self.snapshot().await.live_hosts()
    }
}

/// Shared in-memory membership.
///
/// All hosts of an in-process cluster share the same `Arc<SharedMembership>`
/// and see every change immediately.
///
/// # Example
///
/// ```rust,ignore
/// let membership = SharedMembership::new();
/// let a = membership.join("127.0.0.1:11111".into()).await?;
/// membership.update_status(&a, HostStatus::Active).await?;
/// assert_eq!(membership.live_hosts().await, vec![a]);
/// ```
#[derive(Debug, Default)]
pub struct SharedMembership {
    inner: RwLock<SharedMembershipInner>,
}

#[derive(Debug, Default)]
struct SharedMembershipInner {
    members: HashMap<HostAddress, ClusterMember>,
    version: MembershipVersion,
    last_generation: u64,
}

impl SharedMembership {
    /// Create a new empty shared membership.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MembershipProvider for SharedMembership {
    async fn join(&self, address: HostAddress) -> Result<HostId, MembershipError> {
        let mut inner = self.inner.write();
        inner.last_generation += 1;
        let host = HostId::new(address.clone(), inner.last_generation);
        inner.version = inner.version.next();
        inner
            .members
            .insert(address, ClusterMember::new(host.clone(), HostStatus::Joining));
        Ok(host)
    }

    async fn update_status(
        &self,
        host: &HostId,
        status: HostStatus,
    ) -> Result<MembershipVersion, MembershipError> {
        let mut inner = self.inner.write();
        match inner.members.get_mut(&host.address) {
            Some(member) if member.host.generation == host.generation => {
                member.status = status;
                inner.version = inner.version.next();
                Ok(inner.version)
            }
            _ => Err(MembershipError::UnknownHost(host.clone())),
        }
    }

    async fn snapshot(&self) -> MembershipSnapshot {
        let inner = self.inner.read();
        MembershipSnapshot {
            members: inner.members.clone(),
            version: inner.version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn join_active(m: &SharedMembership, address: &str) -> HostId {
        let host = m.join(address.into()).await.expect("join");
        m.update_status(&host, HostStatus::Active)
            .await
            .expect("activate");
        host
    }

    #[test]
    fn test_membership_version_ordering() {
        let v0 = MembershipVersion::new();
        let v1 = v0.next();
        assert!(v0 < v1);
        assert_eq!(format!("{v1}"), "v1");
    }

    #[test]
    fn test_host_status_display() {
        assert_eq!(format!("{}", HostStatus::Joining), "Joining");
        assert_eq!(format!("{}", HostStatus::ShuttingDown), "ShuttingDown");
    }

    #[tokio::test]
    async fn test_join_assigns_increasing_generations() {
        let m = SharedMembership::new();
        let a = m.join("127.0.0.1:11111".into()).await.expect("join");
        let b = m.join("127.0.0.1:11112".into()).await.expect("join");
        let a2 = m.join("127.0.0.1:11111".into()).await.expect("rejoin");

        assert!(b.generation > a.generation);
        assert!(a2.generation > b.generation);
        assert_eq!(a2.address, a.address);
    }

    #[tokio::test]
    async fn test_joining_hosts_are_not_live() {
        let m = SharedMembership::new();
        let a = m.join("127.0.0.1:11111".into()).await.expect("join");
        assert!(m.live_hosts().await.is_empty());

        m.update_status(&a, HostStatus::Active).await.expect("update");
        assert_eq!(m.live_hosts().await, vec![a]);
    }

    #[tokio::test]
    async fn test_live_hosts_excludes_shutting_down_and_dead() {
        let m = SharedMembership::new();
        let a = join_active(&m, "127.0.0.1:11111").await;
        let b = join_active(&m, "127.0.0.1:11112").await;
        let c = join_active(&m, "127.0.0.1:11113").await;

        m.update_status(&b, HostStatus::ShuttingDown)
            .await
            .expect("update");
        m.update_status(&c, HostStatus::Dead).await.expect("update");

        assert_eq!(m.live_hosts().await, vec![a]);
        let snapshot = m.snapshot().await;
        assert_eq!(snapshot.status_of(&c), Some(HostStatus::Dead));
    }

    #[tokio::test]
    async fn test_rejoin_supersedes_previous_lifetime() {
        let m = SharedMembership::new();
        let old = join_active(&m, "127.0.0.1:11111").await;
        let new = join_active(&m, "127.0.0.1:11111").await;

        assert_eq!(m.live_hosts().await, vec![new.clone()]);
        assert_eq!(m.snapshot().await.status_of(&old), None);

        let result = m.update_status(&old, HostStatus::Dead).await;
        assert!(matches!(result, Err(MembershipError::UnknownHost(_))));
    }

    #[tokio::test]
    async fn test_version_increments() {
        let m = SharedMembership::new();
        let a = m.join("127.0.0.1:11111".into()).await.expect("join");
        let v = m.update_status(&a, HostStatus::Active).await.expect("update");
        assert_eq!(v, MembershipVersion(2));
        assert_eq!(m.snapshot().await.version, MembershipVersion(2));
    }
}
