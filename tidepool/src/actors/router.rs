//! Key router: caller-side resolution of an actor to its owning host.
//!
//! # Flow
//!
//! 1. Local cache, then the shared [`PlacementDirectory`]. A record is used
//!    only if its exact host lifetime is live in membership and reachable.
//! 2. Otherwise the [`PlacementStrategy`] ranks the live hosts and the first
//!    reachable one is proposed as owner.
//! 3. The proposal is written with `register` (no record yet) or `replace`
//!    (stale record). The directory returns the winner, which may be another
//!    router's proposal.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::directory::PlacementDirectory;
use super::membership::MembershipProvider;
use super::placement::PlacementStrategy;
use super::transport::HostTransport;
use super::types::{ActorId, HostId, PlacementRecord};
use crate::error::ActorError;

/// Outcome of [`KeyRouter::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Host lifetime that owns the actor.
    pub host: HostId,
    /// Whether this resolution wrote the placement record, so the owner
    /// activates the actor on the first call it receives.
    pub is_new_activation: bool,
}

/// Maps actor identities to the host lifetime that owns them.
#[derive(Debug)]
pub struct KeyRouter {
    directory: Arc<dyn PlacementDirectory>,
    membership: Arc<dyn MembershipProvider>,
    placement: Arc<dyn PlacementStrategy>,
    transport: Arc<dyn HostTransport>,
    local: Option<HostId>,
    cache: Mutex<HashMap<ActorId, PlacementRecord>>,
}

impl KeyRouter {
    /// Create a router.
    pub fn new(
        directory: Arc<dyn PlacementDirectory>,
        membership: Arc<dyn MembershipProvider>,
        placement: Arc<dyn PlacementStrategy>,
        transport: Arc<dyn HostTransport>,
    ) -> Self {
        Self {
            directory,
            membership,
            placement,
            transport,
            local: None,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Tell the placement strategy which host this router runs on.
    pub fn with_local_host(mut self, host: HostId) -> Self {
        self.local = Some(host);
        self
    }

    /// The transport calls are sent through.
    pub fn transport(&self) -> &Arc<dyn HostTransport> {
        &self.transport
    }

    /// Resolve `id` to its owning host lifetime, placing it if needed.
    pub async fn resolve(&self, id: &ActorId) -> Result<Resolution, ActorError> {
        let live = self.membership.live_hosts().await;
        if live.is_empty() {
            return Err(ActorError::NoLiveHosts { id: id.clone() });
        }

        let cached = self.cache.lock().get(id).cloned();
        if let Some(record) = cached {
            if self.is_usable(&record.host, &live).await {
                return Ok(Resolution {
                    host: record.host,
                    is_new_activation: false,
                });
            }
            self.invalidate(id);
        }

        let existing = self.directory.lookup(id).await?;
        if let Some(record) = &existing {
            if self.is_usable(&record.host, &live).await {
                debug!(actor = %id, host = %record.host, "resolved from directory");
                self.cache.lock().insert(id.clone(), record.clone());
                return Ok(Resolution {
                    host: record.host.clone(),
                    is_new_activation: false,
                });
            }
            debug!(actor = %id, host = %record.host, "placement record is stale");
        }

        let mut chosen = None;
        for host in self.placement.rank(id, &live, self.local.as_ref()) {
            if self.transport.probe(&host).await {
                chosen = Some(host);
                break;
            }
            warn!(actor = %id, host = %host, "skipping unreachable host");
        }
        let Some(host) = chosen else {
            return Err(ActorError::NoLiveHosts { id: id.clone() });
        };

        let proposed = PlacementRecord::new(id.clone(), host);
        let winner = match existing {
            None => self.directory.register(proposed.clone()).await?,
            Some(stale) => self.directory.replace(&stale, proposed.clone()).await?,
        };
        let is_new_activation = winner == proposed;
        if is_new_activation {
            info!(actor = %id, host = %winner.host, "placed actor");
        } else {
            debug!(actor = %id, host = %winner.host, "lost placement race");
        }

        self.cache.lock().insert(id.clone(), winner.clone());
        Ok(Resolution {
            host: winner.host,
            is_new_activation,
        })
    }

    /// Forget the cached placement of `id`.
    pub fn invalidate(&self, id: &ActorId) {
        self.cache.lock().remove(id);
    }

    async fn is_usable(&self, host: &HostId, live: &[HostId]) -> bool {
        live.contains(host) && self.transport.probe(host).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use async_trait::async_trait;

    use super::*;
    use crate::actors::{
        ActorMessage, ActorResponse, ActorType, HashPlacement, HostStatus,
        InMemoryPlacementDirectory, PreferLocalPlacement, SharedMembership,
    };
    use crate::error::TransportError;

    #[derive(Debug, Default)]
    struct StubTransport {
        down: Mutex<HashSet<HostId>>,
    }

    impl StubTransport {
        fn set_down(&self, host: &HostId, down: bool) {
            let mut set = self.down.lock();
            if down {
                set.insert(host.clone());
            } else {
                set.remove(host);
            }
        }
    }

    #[async_trait]
    impl HostTransport for StubTransport {
        async fn send(
            &self,
            to: &HostId,
            _message: ActorMessage,
        ) -> Result<ActorResponse, TransportError> {
            Err(TransportError::Unreachable(to.clone()))
        }

        async fn probe(&self, to: &HostId) -> bool {
            !self.down.lock().contains(to)
        }
    }

    struct Cluster {
        membership: Arc<SharedMembership>,
        directory: Arc<InMemoryPlacementDirectory>,
        transport: Arc<StubTransport>,
        hosts: Vec<HostId>,
    }

    async fn cluster(size: u16) -> Cluster {
        let membership = Arc::new(SharedMembership::new());
        let mut hosts = Vec::new();
        for port in 0..size {
            let host = membership
                .join(format!("127.0.0.1:{}", 11111 + port).into())
                .await
                .unwrap();
            membership
                .update_status(&host, HostStatus::Active)
                .await
                .unwrap();
            hosts.push(host);
        }
        Cluster {
            membership,
            directory: Arc::new(InMemoryPlacementDirectory::new()),
            transport: Arc::new(StubTransport::default()),
            hosts,
        }
    }

    fn router(c: &Cluster) -> KeyRouter {
        KeyRouter::new(
            c.directory.clone(),
            c.membership.clone(),
            Arc::new(HashPlacement),
            c.transport.clone(),
        )
    }

    fn counter(key: &str) -> ActorId {
        ActorId::new(ActorType::new("Counter"), key)
    }

    #[tokio::test]
    async fn test_first_resolve_places_then_reuses() {
        let c = cluster(3).await;
        let r = router(&c);
        let id = counter("counter");

        let first = r.resolve(&id).await.unwrap();
        assert!(first.is_new_activation);
        assert!(c.hosts.contains(&first.host));

        let second = r.resolve(&id).await.unwrap();
        assert_eq!(second.host, first.host);
        assert!(!second.is_new_activation);

        let record = c.directory.lookup(&id).await.unwrap().unwrap();
        assert_eq!(record.host, first.host);
    }

    #[tokio::test]
    async fn test_routers_agree_through_directory() {
        let c = cluster(3).await;
        let a = router(&c);
        let b = KeyRouter::new(
            c.directory.clone(),
            c.membership.clone(),
            Arc::new(PreferLocalPlacement),
            c.transport.clone(),
        )
        .with_local_host(c.hosts[2].clone());

        for i in 0..20 {
            let id = counter(&format!("k{i}"));
            let from_a = a.resolve(&id).await.unwrap();
            let from_b = b.resolve(&id).await.unwrap();
            assert_eq!(from_a.host, from_b.host);
            assert!(!from_b.is_new_activation);
        }
    }

    #[tokio::test]
    async fn test_unreachable_preferred_host_falls_back_in_rank_order() {
        let c = cluster(3).await;
        let id = counter("counter");
        let ranking = HashPlacement.rank(&id, &c.hosts, None);
        c.transport.set_down(&ranking[0], true);

        let resolved = router(&c).resolve(&id).await.unwrap();
        assert_eq!(resolved.host, ranking[1]);
    }

    #[tokio::test]
    async fn test_dead_owner_is_replaced() {
        let c = cluster(3).await;
        let r = router(&c);
        let id = counter("counter");
        let first = r.resolve(&id).await.unwrap();

        c.membership
            .update_status(&first.host, HostStatus::Dead)
            .await
            .unwrap();

        let second = r.resolve(&id).await.unwrap();
        assert_ne!(second.host, first.host);
        assert!(second.is_new_activation);
        let record = c.directory.lookup(&id).await.unwrap().unwrap();
        assert_eq!(record.host, second.host);
    }

    #[tokio::test]
    async fn test_restarted_owner_needs_new_record() {
        let c = cluster(1).await;
        let r = router(&c);
        let id = counter("counter");
        let old = r.resolve(&id).await.unwrap().host;

        let new = c.membership.join(old.address.clone()).await.unwrap();
        c.membership
            .update_status(&new, HostStatus::Active)
            .await
            .unwrap();

        let resolved = r.resolve(&id).await.unwrap();
        assert_eq!(resolved.host, new);
        assert!(resolved.is_new_activation);
    }

    #[tokio::test]
    async fn test_all_hosts_down_is_fatal() {
        let c = cluster(2).await;
        for host in &c.hosts {
            c.transport.set_down(host, true);
        }
        let err = router(&c).resolve(&counter("counter")).await.unwrap_err();
        assert!(matches!(err, ActorError::NoLiveHosts { .. }));
    }

    #[tokio::test]
    async fn test_no_members_is_fatal() {
        let c = cluster(0).await;
        let err = router(&c).resolve(&counter("counter")).await.unwrap_err();
        assert!(matches!(err, ActorError::NoLiveHosts { .. }));
    }

    #[tokio::test]
    async fn test_invalidate_rereads_directory() {
        let c = cluster(3).await;
        let r = router(&c);
        let id = counter("counter");
        let first = r.resolve(&id).await.unwrap();

        // Another router moved the actor; the cache still points at the old owner.
        let other = c.hosts.iter().find(|h| **h != first.host).unwrap().clone();
        let current = c.directory.lookup(&id).await.unwrap().unwrap();
        c.directory
            .replace(&current, PlacementRecord::new(id.clone(), other.clone()))
            .await
            .unwrap();
        assert_eq!(r.resolve(&id).await.unwrap().host, first.host);

        r.invalidate(&id);
        let resolved = r.resolve(&id).await.unwrap();
        assert_eq!(resolved.host, other);
        assert!(!resolved.is_new_activation);
    }
}
