//! Placement: choosing which live host should own an actor.
//!
//! A [`PlacementStrategy`] ranks the live hosts for an identity. The router
//! probes that ranking in order and places the actor on the first reachable
//! host, so the ranking doubles as the fallback ("ring") order when the
//! preferred host is down.
//!
//! [`HashPlacement`] uses rendezvous (highest-random-weight) hashing: every
//! host gets a score derived from `(actor id, host address)` and hosts are
//! ranked by score. Adding a host only moves the keys for which the new host
//! scores highest; removing a host only moves the keys it owned.

use std::fmt;

use rand::Rng;

use super::types::{ActorId, HostId};

/// Pluggable placement policy, selected at host configuration time.
pub trait PlacementStrategy: fmt::Debug + Send + Sync {
    /// Rank `live` hosts for `id`, most preferred first.
    ///
    /// `local` is the host the router runs on, if any. The result is a
    /// permutation of `live`; an empty `live` yields an empty ranking.
    fn rank(&self, id: &ActorId, live: &[HostId], local: Option<&HostId>) -> Vec<HostId>;
}

/// FNV-1a over a byte slice.
pub fn fnv1a(data: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &byte in data {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Final avalanche step (splitmix64) so that nearby inputs spread evenly.
fn mix(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

/// Rendezvous score of `host` for `id`.
///
/// Only the address participates: a host restarted at the same address keeps
/// its keys.
pub fn rendezvous_score(id: &ActorId, host: &HostId) -> u64 {
    let mut bytes = Vec::with_capacity(
        id.actor_type.as_str().len() + id.key.len() + host.address.as_str().len() + 2,
    );
    bytes.extend_from_slice(id.actor_type.as_str().as_bytes());
    bytes.push(0);
    bytes.extend_from_slice(id.key.as_bytes());
    bytes.push(0);
    bytes.extend_from_slice(host.address.as_str().as_bytes());
    mix(fnv1a(&bytes))
}

/// Live hosts in descending rendezvous score for `id`.
///
/// Ties (practically impossible) fall back to address order so every router
/// computes the same ranking.
pub fn rendezvous_order(id: &ActorId, live: &[HostId]) -> Vec<HostId> {
    let mut scored: Vec<(u64, &HostId)> = live
        .iter()
        .map(|host| (rendezvous_score(id, host), host))
        .collect();
    scored.sort_by(|(sa, ha), (sb, hb)| sb.cmp(sa).then_with(|| ha.address.cmp(&hb.address)));
    scored.into_iter().map(|(_, host)| host.clone()).collect()
}

/// Rendezvous hashing over the live host set. The default.
#[derive(Debug, Default, Clone, Copy)]
pub struct HashPlacement;

impl PlacementStrategy for HashPlacement {
    fn rank(&self, id: &ActorId, live: &[HostId], _local: Option<&HostId>) -> Vec<HostId> {
        rendezvous_order(id, live)
    }
}

/// A uniformly random live host first, then the rest in hash order.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomPlacement;

impl PlacementStrategy for RandomPlacement {
    fn rank(&self, id: &ActorId, live: &[HostId], _local: Option<&HostId>) -> Vec<HostId> {
        if live.is_empty() {
            return Vec::new();
        }
        let first = live[rand::thread_rng().gen_range(0..live.len())].clone();
        let mut ranked = vec![first.clone()];
        ranked.extend(rendezvous_order(id, live).into_iter().filter(|h| *h != first));
        ranked
    }
}

/// The caller's own host first when it is live, then hash order.
#[derive(Debug, Default, Clone, Copy)]
pub struct PreferLocalPlacement;

impl PlacementStrategy for PreferLocalPlacement {
    fn rank(&self, id: &ActorId, live: &[HostId], local: Option<&HostId>) -> Vec<HostId> {
        let mut ranked = rendezvous_order(id, live);
        if let Some(local) = local {
            if let Some(pos) = ranked.iter().position(|h| h == local) {
                let host = ranked.remove(pos);
                ranked.insert(0, host);
            }
        }
        ranked
    }
}
