//! Cluster collaborator shapes: node identity, discovery, and events.
//!
//! The placement core does not own membership. It consumes a
//! [`NodeDiscovery`] implementation that can enumerate current nodes and
//! stream join/termination events. Production implementations sit on a
//! gossip protocol or service registry; [`InMemoryCluster`] is the
//! `Rc`-shared implementation for tests and single-process deployments.
//!
//! # Design
//!
//! - [`NodeAddress`] is logical endpoint identity (protocol, host, port).
//!   Ring coordinates derive only from it, never from ephemeral
//!   per-process ids, so independent processes agree on a node's ring
//!   position.
//! - [`NodeDiscovery`] is a trait so implementations can range from a
//!   static in-memory list to a receptionist-style registry.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::node::VirtualNode;
use crate::ring::RingKey;

/// Logical endpoint identity of a cluster node.
///
/// Stable for the node's lifetime and identical across every process
/// that refers to the node, which makes it the only valid ring input.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeAddress {
    protocol: String,
    host: String,
    port: u16,
}

impl NodeAddress {
    /// Create an address from its endpoint parts.
    pub fn new(protocol: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            protocol: protocol.into(),
            host: host.into(),
            port,
        }
    }

    /// Convenience constructor for `tcp` endpoints.
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::new("tcp", host, port)
    }

    /// The endpoint protocol (e.g. `tcp`).
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// The endpoint host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The endpoint port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// This node's base ring coordinate.
    ///
    /// Derived from the rendered endpoint only, so every member computes
    /// the same position for the same node.
    pub fn ring_key(&self) -> RingKey {
        RingKey::digest(self.to_string().as_bytes())
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.protocol, self.host, self.port)
    }
}

/// Anything that can occupy a position on the ring.
pub trait Routable {
    /// The stable endpoint identity used for ring placement.
    fn address(&self) -> &NodeAddress;
}

/// Membership change observed through discovery.
#[derive(Debug, Clone)]
pub enum NodeEvent<N> {
    /// A node registered itself and is ready to host actors.
    Joined(N),
    /// A node departed; keyed by identity since the instance is gone.
    Terminated(NodeAddress),
}

/// Discovery of virtual nodes: enumerate current registrants and
/// subscribe to membership changes.
///
/// The subscription is a long-lived stream; the receiver suspends
/// between arrival events and ends when the discovery source goes away.
#[async_trait::async_trait(?Send)]
pub trait NodeDiscovery<N> {
    /// All nodes currently registered.
    async fn current_nodes(&self) -> Vec<N>;

    /// Subscribe to join/termination events from this point on.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<NodeEvent<N>>;
}

/// Shared in-memory cluster registry.
///
/// All parties in a single process share the same `InMemoryCluster`
/// clone, giving them one consistent membership view with immediate
/// event fan-out. This is the test/simulation stand-in for a real
/// receptionist; the exactly-one-router guarantee stays with the
/// deployment's singleton facility either way.
#[derive(Debug)]
pub struct InMemoryCluster<N> {
    inner: Rc<RefCell<ClusterInner<N>>>,
}

#[derive(Debug)]
struct ClusterInner<N> {
    nodes: HashMap<NodeAddress, N>,
    subscribers: Vec<mpsc::UnboundedSender<NodeEvent<N>>>,
}

impl<N> Clone for InMemoryCluster<N> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<N> Default for InMemoryCluster<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> InMemoryCluster<N> {
    /// Create an empty cluster registry.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ClusterInner {
                nodes: HashMap::new(),
                subscribers: Vec::new(),
            })),
        }
    }

    /// Number of registered nodes.
    pub fn node_count(&self) -> usize {
        self.inner.borrow().nodes.len()
    }
}

impl<N: Routable + Clone> InMemoryCluster<N> {
    /// Register a node and notify subscribers.
    ///
    /// Re-registering an address replaces the previous instance, which
    /// is what a restarted node looks like to discovery.
    pub fn register_node(&self, node: N) {
        let mut inner = self.inner.borrow_mut();
        tracing::debug!(node = %node.address(), "node registered");
        inner.nodes.insert(node.address().clone(), node.clone());
        inner
            .subscribers
            .retain(|tx| tx.send(NodeEvent::Joined(node.clone())).is_ok());
    }

    /// Remove a node and notify subscribers of its termination.
    ///
    /// Returns `false` when the address was not registered.
    pub fn terminate_node(&self, address: &NodeAddress) -> bool {
        let mut inner = self.inner.borrow_mut();
        if inner.nodes.remove(address).is_none() {
            return false;
        }
        tracing::debug!(node = %address, "node terminated");
        inner
            .subscribers
            .retain(|tx| tx.send(NodeEvent::Terminated(address.clone())).is_ok());
        true
    }
}

impl InMemoryCluster<VirtualNode> {
    /// Start a virtual node at `address` and register it.
    ///
    /// Small helper mirroring how a host runtime would bring a node up
    /// and check it in with discovery in one step.
    pub fn spawn_node(&self, address: NodeAddress) -> VirtualNode {
        let node = VirtualNode::new(address);
        self.register_node(node.clone());
        node
    }
}

#[async_trait::async_trait(?Send)]
impl<N: Routable + Clone> NodeDiscovery<N> for InMemoryCluster<N> {
    async fn current_nodes(&self) -> Vec<N> {
        self.inner.borrow().nodes.values().cloned().collect()
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<NodeEvent<N>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.borrow_mut().subscribers.push(tx);
        rx
    }
}
