//! # Grainpool
//!
//! Virtual actor (grain) placement and lifecycle atop a cluster actor
//! runtime. Callers request an actor by a stable logical identifier; the
//! layer transparently places, creates, finds, and evicts the backing
//! instance across a dynamic node set, Orleans-style, without callers
//! tracking physical location or creation state.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ VirtualActorsPlugin                                      │
//! │   get_actor / mark_as_active / clean_actor / resign      │
//! ├──────────────────────────────────────────────────────────┤
//! │ VirtualNodeRouter (cluster singleton)                    │
//! │   HashRing · single-flight dedup · reverse directory     │
//! ├────────────────────────────┬─────────────────────────────┤
//! │ VirtualNode (per node)     │  NodeDiscovery (external)   │
//! │   actor store · idle sweep │  join/termination events    │
//! └────────────────────────────┴─────────────────────────────┘
//! ```
//!
//! Membership/gossip, message transport, and the singleton-hosting
//! facility that guarantees exactly one live router are external
//! collaborators; this crate specifies their shapes ([`NodeDiscovery`],
//! [`NodeClient`]) and ships in-memory implementations for tests and
//! single-process deployments.
//!
//! ## Execution model
//!
//! Single-threaded cooperative: shared state is `Rc`/`RefCell`, async
//! traits are `?Send`, and background work (the discovery listener, the
//! per-node idle sweep) runs on `tokio::task::spawn_local`. Run the
//! layer inside a current-thread runtime with a
//! [`LocalSet`](tokio::task::LocalSet). Operations interleave only at
//! suspension points, so mutation between them is atomic and no critical
//! section spans an `.await`.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use grainpool::prelude::*;
//!
//! let cluster = InMemoryCluster::new();
//! cluster.spawn_node(NodeAddress::tcp("127.0.0.1", 4500));
//!
//! let plugin: VirtualActorsPlugin<VirtualNode> = VirtualActorsPlugin::new();
//! plugin.start(&cluster).await;
//!
//! let account: VirtualActorRef<BankAccount> = plugin
//!     .get_actor(&VirtualActorId::new("alice"), SpawnDependency::none())
//!     .await?;
//! ```

#![deny(missing_docs)]

pub mod actor;
pub mod cluster;
pub mod error;
pub mod node;
pub mod plugin;
pub mod ring;
pub mod router;

pub mod prelude;

pub use actor::{
    ActorHandle, ActorTag, PhysicalActorId, SpawnDependency, VirtualActor, VirtualActorId,
    VirtualActorRef,
};
pub use cluster::{InMemoryCluster, NodeAddress, NodeDiscovery, NodeEvent, Routable};
pub use error::VirtualActorError;
pub use node::{IdleTimeoutSettings, NodeClient, VirtualNode};
pub use plugin::{PluginBuilder, VirtualActorsPlugin};
pub use ring::{HashRing, RingKey, DEFAULT_REPLICATION_FACTOR};
pub use router::VirtualNodeRouter;
