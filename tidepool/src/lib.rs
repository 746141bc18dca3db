//! # Tidepool
//!
//! Virtual actors with on-demand activation, key-based placement and
//! write-through persistence.
//!
//! A virtual actor is addressed by a logical key and always "exists": the
//! first call for a key activates exactly one instance somewhere in the
//! cluster, loads its state from a pluggable store, and serializes every
//! subsequent call into that instance until it is evicted or its host goes
//! away. The next call then re-activates it, possibly on another host, from
//! the last committed state.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  CounterRef / ActorProxy<H>                                   │
//! │    resolve → send → (PlacementStale | unreachable) → retry 1x │
//! ├──────────────────────────────────────────────────────────────┤
//! │  KeyRouter                                                    │
//! │    cache → PlacementDirectory → PlacementStrategy (HRW)       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  HostTransport (InProcessNetwork)                             │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ActorHost → ActivationManager<H>                             │
//! │    one task + FIFO inbox per live ActorId                     │
//! │    PersistentState<T> → StateStore (memory | file)            │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use tidepool::actors::{ActorHost, ClusterConfig, HostConfig};
//! use tidepool::counter::{Counter, CounterRef};
//!
//! let cluster = ClusterConfig::in_memory();
//! let host = ActorHost::new(cluster.clone(), HostConfig::new("127.0.0.1:11111"))
//!     .register::<Counter>()
//!     .start()
//!     .await?;
//!
//! let counter: CounterRef = host.actor_ref("counter");
//! assert_eq!(counter.increment(5).await?, 5);
//! ```

#![deny(missing_docs)]

pub mod actors;
pub mod counter;
pub mod error;

pub use error::ActorError;
