//! VirtualNode: the per-node live actor store.
//!
//! Every node hosts one [`VirtualNode`], which owns the actors placed on
//! it: a map from logical id to instance plus a last-access timestamp,
//! and an optional background sweep that evicts instances idle past a
//! timeout. The store resolves races one layer up; `spawn` here simply
//! overwrites.
//!
//! # Design
//!
//! - [`NodeClient`] is the remote contract the router speaks. In a real
//!   deployment its calls cross node boundaries; [`VirtualNode`]
//!   implements it in-process and the error set is the same either way.
//! - The sweep is a single cancellable task per node, replaced
//!   atomically when settings change and aborted on drop. Eviction is
//!   silent: the router is never notified per actor, only of node-wide
//!   disappearance through termination events.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::actor::{ActorHandle, ActorTag, SpawnDependency, VirtualActor, VirtualActorId};
use crate::cluster::{NodeAddress, Routable};
use crate::error::VirtualActorError;

/// Default interval between idle sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Default idle timeout after which an untouched actor is evicted.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Idle-timeout policy pushed by the router to every node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdleTimeoutSettings {
    enabled: bool,
    sweep_interval: Duration,
    timeout: Duration,
}

impl IdleTimeoutSettings {
    /// Enabled settings with the given sweep interval and idle timeout.
    pub fn new(sweep_interval: Duration, timeout: Duration) -> Self {
        Self {
            enabled: true,
            sweep_interval,
            timeout,
        }
    }

    /// Disabled settings (the default): actors live until removed.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// Whether idle eviction is active.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Interval between sweep ticks.
    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    /// Inactivity span after which an actor is evicted.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for IdleTimeoutSettings {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Remote contract of a virtual node, as seen by the router.
///
/// Every call can fail with a member of the closed error set; transient
/// transport failures of a real deployment surface through the same
/// `Result`s.
#[async_trait::async_trait(?Send)]
pub trait NodeClient: Routable + Clone + 'static {
    /// Look up a live actor, refreshing its last-access time.
    ///
    /// Fails `ActorMissing` when absent and `TypeMismatch` when the
    /// stored instance is not of the expected type.
    async fn find_actor(
        &self,
        id: &VirtualActorId,
        expected: ActorTag,
    ) -> Result<ActorHandle, VirtualActorError>;

    /// Construct and store an instance for `id`.
    ///
    /// Unconditionally overwrites any existing record; concurrent
    /// creation is serialized by the router, not here.
    async fn spawn_actor<A: VirtualActor>(
        &self,
        id: &VirtualActorId,
        dependency: SpawnDependency,
    ) -> Result<ActorHandle, VirtualActorError>;

    /// Delete the record for `id`. No-op when absent.
    async fn remove_actor(&self, id: &VirtualActorId) -> Result<(), VirtualActorError>;

    /// Refresh `id`'s last-access time without a full lookup.
    async fn mark_active(&self, id: &VirtualActorId) -> Result<(), VirtualActorError>;

    /// Reconfigure or disable the idle sweep. Idempotent.
    async fn update_idle_timeout(
        &self,
        settings: IdleTimeoutSettings,
    ) -> Result<(), VirtualActorError>;
}

/// One record per hosted actor.
#[derive(Debug)]
struct ActorRecord {
    handle: ActorHandle,
    last_accessed: Cell<Instant>,
}

impl ActorRecord {
    fn new(handle: ActorHandle) -> Self {
        Self {
            handle,
            last_accessed: Cell::new(Instant::now()),
        }
    }

    fn touch(&self) {
        self.last_accessed.set(Instant::now());
    }
}

/// The node-local actor map. At most one record per logical id.
#[derive(Debug, Default)]
struct ActorStorage {
    records: RefCell<HashMap<VirtualActorId, ActorRecord>>,
}

impl ActorStorage {
    fn find(
        &self,
        id: &VirtualActorId,
        expected: ActorTag,
    ) -> Result<ActorHandle, VirtualActorError> {
        let records = self.records.borrow();
        let record = records.get(id).ok_or(VirtualActorError::ActorMissing)?;
        if record.handle.tag() != expected {
            return Err(VirtualActorError::TypeMismatch {
                expected: expected.name().to_string(),
                found: record.handle.tag().name().to_string(),
            });
        }
        record.touch();
        Ok(record.handle.clone())
    }

    fn insert(&self, id: VirtualActorId, handle: ActorHandle) {
        self.records
            .borrow_mut()
            .insert(id, ActorRecord::new(handle));
    }

    fn remove(&self, id: &VirtualActorId) -> bool {
        self.records.borrow_mut().remove(id).is_some()
    }

    fn touch(&self, id: &VirtualActorId) -> bool {
        match self.records.borrow().get(id) {
            Some(record) => {
                record.touch();
                true
            }
            None => false,
        }
    }

    fn len(&self) -> usize {
        self.records.borrow().len()
    }

    fn clear(&self) {
        self.records.borrow_mut().clear();
    }

    /// Remove and return the ids of every record idle for `timeout`.
    fn evict_idle(&self, timeout: Duration) -> Vec<VirtualActorId> {
        let now = Instant::now();
        let mut records = self.records.borrow_mut();
        let expired: Vec<VirtualActorId> = records
            .iter()
            .filter(|(_, record)| now.duration_since(record.last_accessed.get()) >= timeout)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            records.remove(id);
        }
        expired
    }
}

/// A node's live-actor store with idle eviction.
///
/// Cheaply cloneable handle; clones share the same store. The ring holds
/// clones of the node, one per virtual replica.
#[derive(Debug, Clone)]
pub struct VirtualNode {
    inner: Rc<NodeInner>,
}

#[derive(Debug)]
struct NodeInner {
    address: NodeAddress,
    storage: ActorStorage,
    settings: Cell<IdleTimeoutSettings>,
    sweep: RefCell<Option<JoinHandle<()>>>,
}

impl VirtualNode {
    /// Create a node store for the given endpoint identity.
    pub fn new(address: NodeAddress) -> Self {
        Self {
            inner: Rc::new(NodeInner {
                address,
                storage: ActorStorage::default(),
                settings: Cell::new(IdleTimeoutSettings::disabled()),
                sweep: RefCell::new(None),
            }),
        }
    }

    /// Number of live actors hosted here.
    pub fn actor_count(&self) -> usize {
        self.inner.storage.len()
    }

    /// The idle-timeout policy this node currently runs.
    pub fn idle_timeout(&self) -> IdleTimeoutSettings {
        self.inner.settings.get()
    }

    /// Shut the node down: cancel the sweep and drop every hosted actor.
    pub fn shutdown(&self) {
        if let Some(task) = self.inner.sweep.borrow_mut().take() {
            task.abort();
        }
        let dropped = self.inner.storage.len();
        self.inner.storage.clear();
        if dropped > 0 {
            tracing::info!(node = %self.inner.address, count = dropped, "node shut down");
        }
    }

    fn apply_settings(&self, settings: IdleTimeoutSettings) {
        if self.inner.settings.get() == settings {
            return;
        }
        self.inner.settings.set(settings);

        // Replace or cancel the sweep atomically: abort first so two
        // sweeps never run at once.
        if let Some(task) = self.inner.sweep.borrow_mut().take() {
            task.abort();
        }
        if !settings.is_enabled() {
            tracing::debug!(node = %self.inner.address, "idle sweep disabled");
            return;
        }
        if settings.sweep_interval().is_zero() {
            tracing::warn!(
                node = %self.inner.address,
                "zero sweep interval, treating idle sweep as disabled"
            );
            return;
        }

        let weak = Rc::downgrade(&self.inner);
        let task = tokio::task::spawn_local(sweep_loop(weak, settings));
        *self.inner.sweep.borrow_mut() = Some(task);
        tracing::debug!(
            node = %self.inner.address,
            interval = ?settings.sweep_interval(),
            timeout = ?settings.timeout(),
            "idle sweep started"
        );
    }
}

/// Periodic eviction of idle actors. Holds only a weak reference so a
/// dropped node tears the loop down even if abort loses the race.
async fn sweep_loop(inner: Weak<NodeInner>, settings: IdleTimeoutSettings) {
    let mut ticker = tokio::time::interval(settings.sweep_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // interval() fires immediately; consume that tick so the first
    // sweep happens one full interval after enabling.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let evicted = inner.storage.evict_idle(settings.timeout());
        if !evicted.is_empty() {
            tracing::info!(
                node = %inner.address,
                count = evicted.len(),
                "found inactive actors, evicting"
            );
            for id in &evicted {
                tracing::debug!(node = %inner.address, actor = %id, "evicted idle actor");
            }
        }
    }
}

impl Drop for NodeInner {
    fn drop(&mut self) {
        if let Some(task) = self.sweep.borrow_mut().take() {
            task.abort();
        }
    }
}

impl Routable for VirtualNode {
    fn address(&self) -> &NodeAddress {
        &self.inner.address
    }
}

#[async_trait::async_trait(?Send)]
impl NodeClient for VirtualNode {
    async fn find_actor(
        &self,
        id: &VirtualActorId,
        expected: ActorTag,
    ) -> Result<ActorHandle, VirtualActorError> {
        self.inner.storage.find(id, expected)
    }

    async fn spawn_actor<A: VirtualActor>(
        &self,
        id: &VirtualActorId,
        dependency: SpawnDependency,
    ) -> Result<ActorHandle, VirtualActorError> {
        let instance = A::spawn(id, dependency).await?;
        let handle = ActorHandle::new(Rc::new(instance));
        self.inner.storage.insert(id.clone(), handle.clone());
        tracing::debug!(
            node = %self.inner.address,
            actor = %id,
            physical = %handle.physical_id(),
            "spawned actor"
        );
        Ok(handle)
    }

    async fn remove_actor(&self, id: &VirtualActorId) -> Result<(), VirtualActorError> {
        if self.inner.storage.remove(id) {
            tracing::debug!(node = %self.inner.address, actor = %id, "removed actor");
        }
        Ok(())
    }

    async fn mark_active(&self, id: &VirtualActorId) -> Result<(), VirtualActorError> {
        // A keep-alive for an already evicted actor is not an error;
        // the caller risks only slightly early eviction.
        self.inner.storage.touch(id);
        Ok(())
    }

    async fn update_idle_timeout(
        &self,
        settings: IdleTimeoutSettings,
    ) -> Result<(), VirtualActorError> {
        self.apply_settings(settings);
        Ok(())
    }
}
