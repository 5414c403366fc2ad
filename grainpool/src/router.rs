//! VirtualNodeRouter: the cluster-singleton placement core.
//!
//! Exactly one live router exists cluster-wide, guaranteed by the
//! deployment's singleton-hosting facility. That guarantee removes any
//! need for cross-instance locking: the router only sequences its own
//! state between suspension points. Ring and directory mutation is
//! synchronous; no critical section spans an `.await`.
//!
//! # Single-flight creation
//!
//! Without deduplication, N concurrent first-callers for one id would
//! race to spawn N instances on the owning node, and each overwrite
//! would silently discard the previous one, leaking N-1 instances. The
//! router therefore keeps one shared creation future per logical id:
//! the first caller installs it, every concurrent caller awaits the same
//! future, and the entry clears itself on completion. Failures resolve
//! the shared future and reach every waiter; nothing is retried
//! internally.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use futures::future::{LocalBoxFuture, Shared};
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::actor::{
    ActorHandle, ActorTag, PhysicalActorId, SpawnDependency, VirtualActor, VirtualActorId,
    VirtualActorRef,
};
use crate::cluster::{NodeAddress, NodeDiscovery, NodeEvent, Routable};
use crate::error::VirtualActorError;
use crate::node::{IdleTimeoutSettings, NodeClient};
use crate::ring::HashRing;

/// One in-flight creation, shared by every concurrent caller of the id.
type InFlight = Shared<LocalBoxFuture<'static, Result<ActorHandle, VirtualActorError>>>;

/// Cluster-wide router owning the ring, the reverse directory, and the
/// in-flight creation table.
///
/// Cheaply cloneable handle; clones share the same state. Dropping the
/// last handle aborts the discovery listener.
#[derive(Debug)]
pub struct VirtualNodeRouter<N: NodeClient> {
    inner: Rc<RouterInner<N>>,
}

impl<N: NodeClient> Clone for VirtualNodeRouter<N> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct RouterInner<N: NodeClient> {
    ring: RefCell<HashRing<N>>,
    directory: RefCell<HashMap<PhysicalActorId, VirtualActorId>>,
    in_flight: RefCell<HashMap<VirtualActorId, InFlight>>,
    settings: IdleTimeoutSettings,
    listener: RefCell<Option<JoinHandle<()>>>,
}

impl<N: NodeClient> std::fmt::Debug for RouterInner<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterInner")
            .field("nodes", &self.ring.borrow().len())
            .field("directory", &self.directory.borrow().len())
            .field("in_flight", &self.in_flight.borrow().len())
            .field("settings", &self.settings)
            .finish()
    }
}

impl<N: NodeClient> VirtualNodeRouter<N> {
    /// Build the router and bring it up to date with discovery.
    ///
    /// Enumerates current nodes, adds each to the ring (pushing the
    /// idle-timeout policy to it), then starts the long-lived listener
    /// consuming join/termination events.
    pub async fn start(
        replication_factor: usize,
        settings: IdleTimeoutSettings,
        discovery: &impl NodeDiscovery<N>,
    ) -> Self {
        let router = Self {
            inner: Rc::new(RouterInner {
                ring: RefCell::new(HashRing::new(replication_factor)),
                directory: RefCell::new(HashMap::new()),
                in_flight: RefCell::new(HashMap::new()),
                settings,
                listener: RefCell::new(None),
            }),
        };

        for node in discovery.current_nodes().await {
            router.add_node(node).await;
        }

        let events = discovery.subscribe();
        let task = tokio::task::spawn_local(listen(Rc::downgrade(&router.inner), events));
        *router.inner.listener.borrow_mut() = Some(task);

        router
    }

    /// Stop the discovery listener. Ring and directory stay queryable.
    pub fn shutdown(&self) {
        if let Some(task) = self.inner.listener.borrow_mut().take() {
            task.abort();
        }
    }

    /// Number of nodes on the ring.
    pub fn node_count(&self) -> usize {
        self.inner.ring.borrow().len()
    }

    /// The idle-timeout policy this router propagates.
    pub fn settings(&self) -> IdleTimeoutSettings {
        self.inner.settings
    }

    async fn add_node(&self, node: N) {
        let added = {
            let mut ring = self.inner.ring.borrow_mut();
            if ring.contains(node.address()) {
                false
            } else {
                ring.add_node(node.clone());
                true
            }
        };
        if added {
            tracing::info!(node = %node.address(), "node joined the ring");
        }

        // Settings go to every (re)discovered node, even when the ring
        // entry already exists; the node instance may be a restart.
        if let Err(error) = node.update_idle_timeout(self.inner.settings).await {
            tracing::warn!(
                node = %node.address(),
                %error,
                "failed to push idle-timeout settings"
            );
        }
    }

    fn remove_node(&self, address: &NodeAddress) {
        if self.inner.ring.borrow_mut().remove_address(address).is_some() {
            tracing::info!(node = %address, "node left the ring");
        }
    }

    /// Get or create the actor for `id`, serialized per id.
    ///
    /// Returns either a correctly typed live reference or one taxonomy
    /// error; `ActorMissing` never escapes (it drives the spawn path).
    /// At most one remote round trip and at most one spawn happen per
    /// id, no matter how many callers arrive simultaneously.
    pub async fn get_actor<A: VirtualActor>(
        &self,
        id: &VirtualActorId,
        dependency: SpawnDependency,
    ) -> Result<VirtualActorRef<A>, VirtualActorError> {
        let node = self
            .inner
            .ring
            .borrow()
            .get_node(id.ring_key())
            .cloned()
            .ok_or(VirtualActorError::NoNodesAvailable)?;

        let handle = self.join_or_create::<A>(id, node, dependency).await?;

        // The reverse directory only serves keep-alive and cleanup, both
        // of which exist only under an idle-timeout policy.
        if self.inner.settings.is_enabled() {
            self.inner
                .directory
                .borrow_mut()
                .insert(handle.physical_id(), id.clone());
        }

        let instance = handle.downcast::<A>()?;
        Ok(VirtualActorRef::new(
            instance,
            id.clone(),
            handle.physical_id(),
        ))
    }

    /// Join the in-flight creation for `id`, or install a new one.
    fn join_or_create<A: VirtualActor>(
        &self,
        id: &VirtualActorId,
        node: N,
        dependency: SpawnDependency,
    ) -> InFlight {
        let mut in_flight = self.inner.in_flight.borrow_mut();
        if let Some(existing) = in_flight.get(id) {
            tracing::debug!(actor = %id, "joining in-flight creation");
            return existing.clone();
        }

        let weak = Rc::downgrade(&self.inner);
        let id = id.clone();
        let key = id.clone();
        let future = async move {
            let result = find_or_spawn::<A, N>(&node, &id, dependency).await;
            if let Some(inner) = weak.upgrade() {
                inner.in_flight.borrow_mut().remove(&id);
            }
            result
        }
        .boxed_local()
        .shared();

        in_flight.insert(key, future.clone());
        future
    }

    /// Forward a keep-alive to the node owning this instantiation.
    ///
    /// Best effort: a missed keep-alive risks only slightly early
    /// eviction, so failures are logged and swallowed.
    pub async fn mark_as_active(&self, physical_id: PhysicalActorId) {
        if !self.inner.settings.is_enabled() {
            return;
        }
        let Some(id) = self.inner.directory.borrow().get(&physical_id).cloned() else {
            return;
        };
        let Some(node) = self
            .inner
            .ring
            .borrow()
            .get_node(id.ring_key())
            .cloned()
        else {
            return;
        };
        if let Err(error) = node.mark_active(&id).await {
            tracing::debug!(actor = %id, %error, "keep-alive failed");
        }
    }

    /// Translate a termination notification into directory and node
    /// cleanup.
    ///
    /// Idempotent: a physical id with no mapping is a no-op, which
    /// happens when best-effort notifications race with ordinary
    /// eviction. The mapping is removed before the remote call, so a
    /// concurrent duplicate finds nothing to do.
    pub async fn clean_actor(
        &self,
        physical_id: PhysicalActorId,
    ) -> Result<(), VirtualActorError> {
        let Some(id) = self.inner.directory.borrow_mut().remove(&physical_id) else {
            return Ok(());
        };
        tracing::debug!(physical = %physical_id, actor = %id, "cleaning actor");

        // A mapping only exists while an idle-timeout policy is active,
        // so removal is always forwarded here.
        let Some(node) = self
            .inner
            .ring
            .borrow()
            .get_node(id.ring_key())
            .cloned()
        else {
            return Ok(());
        };
        node.remove_actor(&id).await
    }

    /// Remove every ring entry for a departed node.
    pub fn node_terminated(&self, address: &NodeAddress) {
        self.remove_node(address);
    }
}

impl<N: NodeClient> Drop for RouterInner<N> {
    fn drop(&mut self) {
        if let Some(task) = self.listener.borrow_mut().take() {
            task.abort();
        }
    }
}

/// Ask the owning node for the actor; spawn it there if missing.
async fn find_or_spawn<A: VirtualActor, N: NodeClient>(
    node: &N,
    id: &VirtualActorId,
    dependency: SpawnDependency,
) -> Result<ActorHandle, VirtualActorError> {
    tracing::debug!(actor = %id, node = %node.address(), "getting actor");
    match node.find_actor(id, ActorTag::of::<A>()).await {
        Ok(handle) => Ok(handle),
        Err(VirtualActorError::ActorMissing) => {
            tracing::debug!(actor = %id, node = %node.address(), "actor missing, spawning");
            node.spawn_actor::<A>(id, dependency).await
        }
        Err(other) => Err(other),
    }
}

/// Long-lived discovery listener; suspends between arrival events.
async fn listen<N: NodeClient>(
    inner: Weak<RouterInner<N>>,
    mut events: mpsc::UnboundedReceiver<NodeEvent<N>>,
) {
    while let Some(event) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let router = VirtualNodeRouter { inner };
        match event {
            NodeEvent::Joined(node) => router.add_node(node).await,
            NodeEvent::Terminated(address) => router.node_terminated(&address),
        }
    }
}
