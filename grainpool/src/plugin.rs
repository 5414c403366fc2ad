//! Lifecycle glue: installing the router and exposing the caller surface.
//!
//! [`VirtualActorsPlugin`] is what the host runtime installs. It carries
//! construction-time configuration (replication factor, idle-timeout
//! policy), builds the router at `start`, and forwards the caller-facing
//! operations. The guarantee that exactly one router instance is live
//! cluster-wide comes from the deployment's singleton-hosting facility
//! (restarted elsewhere on failure); this type holds whichever instance
//! that facility placed in this process.
//!
//! # Usage
//!
//! ```rust,ignore
//! let cluster = InMemoryCluster::new();
//! cluster.spawn_node(NodeAddress::tcp("127.0.0.1", 4500));
//!
//! let plugin: VirtualActorsPlugin<VirtualNode> = VirtualActorsPlugin::builder()
//!     .replication_factor(150)
//!     .idle_timeout(IdleTimeoutSettings::new(
//!         Duration::from_secs(60),
//!         Duration::from_secs(600),
//!     ))
//!     .build();
//! plugin.start(&cluster).await;
//!
//! let player: VirtualActorRef<Player> = plugin
//!     .get_actor(&VirtualActorId::new("player-42"), SpawnDependency::none())
//!     .await?;
//! ```

use std::cell::RefCell;
use std::marker::PhantomData;

use crate::actor::{
    PhysicalActorId, SpawnDependency, VirtualActor, VirtualActorId, VirtualActorRef,
};
use crate::cluster::NodeDiscovery;
use crate::error::VirtualActorError;
use crate::node::{IdleTimeoutSettings, NodeClient};
use crate::ring::DEFAULT_REPLICATION_FACTOR;
use crate::router::VirtualNodeRouter;

/// Entry point to the virtual actor layer.
///
/// Configured at construction, started once discovery is available.
/// Every operation before `start` fails `RouterNotStarted`, except
/// keep-alives, which are best-effort and simply do nothing.
#[derive(Debug)]
pub struct VirtualActorsPlugin<N: NodeClient> {
    replication_factor: usize,
    idle_timeout: IdleTimeoutSettings,
    router: RefCell<Option<VirtualNodeRouter<N>>>,
}

impl<N: NodeClient> VirtualActorsPlugin<N> {
    /// Plugin with default configuration: 100 virtual replicas per node,
    /// idle timeout disabled.
    pub fn new() -> Self {
        PluginBuilder::default().build()
    }

    /// Start building a configured plugin.
    pub fn builder() -> PluginBuilder<N> {
        PluginBuilder::default()
    }

    /// The configured virtual replicas per node.
    pub fn replication_factor(&self) -> usize {
        self.replication_factor
    }

    /// The configured idle-timeout policy.
    pub fn idle_timeout(&self) -> IdleTimeoutSettings {
        self.idle_timeout
    }

    /// Whether `start` has installed the router.
    pub fn is_started(&self) -> bool {
        self.router.borrow().is_some()
    }

    /// Build the router and synchronize it with discovery.
    ///
    /// Call this from the singleton-hosting facility so exactly one
    /// router runs cluster-wide. Starting an already started plugin is
    /// a no-op.
    pub async fn start(&self, discovery: &impl NodeDiscovery<N>) {
        if self.is_started() {
            tracing::warn!("virtual actor router already started");
            return;
        }
        let router =
            VirtualNodeRouter::start(self.replication_factor, self.idle_timeout, discovery).await;
        *self.router.borrow_mut() = Some(router);
        tracing::info!("virtual actor router started");
    }

    /// Tear the router down, stopping its discovery listener.
    pub fn stop(&self) {
        if let Some(router) = self.router.borrow_mut().take() {
            router.shutdown();
            tracing::info!("virtual actor router stopped");
        }
    }

    /// Get an actor by logical id, creating it if needed.
    ///
    /// The dependency is only consumed when this call ends up spawning;
    /// concurrent callers for the same id share one creation and one
    /// result.
    pub async fn get_actor<A: VirtualActor>(
        &self,
        id: &VirtualActorId,
        dependency: SpawnDependency,
    ) -> Result<VirtualActorRef<A>, VirtualActorError> {
        let router = self.router()?;
        router.get_actor(id, dependency).await
    }

    /// Keep-alive for a live reference, deferring idle eviction.
    ///
    /// Best effort and a no-op unless an idle-timeout policy is active.
    pub async fn mark_as_active<A>(&self, actor: &VirtualActorRef<A>) {
        let Ok(router) = self.router() else {
            return;
        };
        router.mark_as_active(actor.physical_id()).await;
    }

    /// Translate a termination notification for one instantiation into
    /// cleanup. Safe to call for unknown ids.
    pub async fn clean_actor(
        &self,
        physical_id: PhysicalActorId,
    ) -> Result<(), VirtualActorError> {
        let router = self.router()?;
        router.clean_actor(physical_id).await
    }

    /// Explicit self-cleanup of a live actor.
    pub async fn resign<A>(
        &self,
        actor: &VirtualActorRef<A>,
    ) -> Result<(), VirtualActorError> {
        self.clean_actor(actor.physical_id()).await
    }

    fn router(&self) -> Result<VirtualNodeRouter<N>, VirtualActorError> {
        self.router
            .borrow()
            .clone()
            .ok_or(VirtualActorError::RouterNotStarted)
    }
}

impl<N: NodeClient> Default for VirtualActorsPlugin<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`VirtualActorsPlugin`].
#[derive(Debug, Clone)]
pub struct PluginBuilder<N: NodeClient> {
    replication_factor: usize,
    idle_timeout: IdleTimeoutSettings,
    _node: PhantomData<N>,
}

impl<N: NodeClient> Default for PluginBuilder<N> {
    fn default() -> Self {
        Self {
            replication_factor: DEFAULT_REPLICATION_FACTOR,
            idle_timeout: IdleTimeoutSettings::disabled(),
            _node: PhantomData,
        }
    }
}

impl<N: NodeClient> PluginBuilder<N> {
    /// Set the number of virtual replicas per node.
    pub fn replication_factor(mut self, factor: usize) -> Self {
        self.replication_factor = factor;
        self
    }

    /// Set the idle-timeout policy pushed to every node.
    pub fn idle_timeout(mut self, settings: IdleTimeoutSettings) -> Self {
        self.idle_timeout = settings;
        self
    }

    /// Build the plugin.
    pub fn build(self) -> VirtualActorsPlugin<N> {
        VirtualActorsPlugin {
            replication_factor: self.replication_factor,
            idle_timeout: self.idle_timeout,
            router: RefCell::new(None),
        }
    }
}
