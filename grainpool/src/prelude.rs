//! Common imports for the virtual actor layer.

pub use crate::actor::{
    PhysicalActorId, SpawnDependency, VirtualActor, VirtualActorId, VirtualActorRef,
};
pub use crate::cluster::{InMemoryCluster, NodeAddress, NodeDiscovery, NodeEvent, Routable};
pub use crate::error::VirtualActorError;
pub use crate::node::{IdleTimeoutSettings, NodeClient, VirtualNode};
pub use crate::plugin::VirtualActorsPlugin;
pub use crate::ring::{HashRing, RingKey};

// Re-export commonly used external types
pub use async_trait::async_trait;
pub use std::rc::Rc;
pub use std::time::Duration;

/// Result type for virtual actor operations.
pub type Result<T> = std::result::Result<T, VirtualActorError>;
