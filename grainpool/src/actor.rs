//! Virtual actor identity and typing.
//!
//! A virtual actor has two identifiers with different lifetimes:
//!
//! - [`VirtualActorId`]: the caller-chosen logical identity. Stable and
//!   cluster-wide; the ring key and directory key.
//! - [`PhysicalActorId`]: assigned at each instantiation. An actor that
//!   is evicted and later re-created (possibly elsewhere) gets a new one.
//!   Termination notifications carry this id.
//!
//! Actors of heterogeneous types share one store, so instances travel as
//! [`ActorHandle`]s: a boxed value plus an explicit [`ActorTag`], with a
//! checked cast at the retrieval boundary. The cast never panics; a
//! disagreement is reported as `TypeMismatch`.

use std::any::{Any, TypeId};
use std::cell::Cell;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::VirtualActorError;
use crate::ring::RingKey;

/// Caller-chosen stable logical identity of a virtual actor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VirtualActorId(String);

impl VirtualActorId {
    /// Create a logical id from its raw value.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw id value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The ring coordinate this id resolves through.
    pub fn ring_key(&self) -> RingKey {
        RingKey::digest(self.0.as_bytes())
    }
}

impl From<&str> for VirtualActorId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for VirtualActorId {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl fmt::Display for VirtualActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Runtime-assigned identifier of one actor instantiation.
///
/// Unique per spawn; a re-created actor gets a fresh one. Used by the
/// router's reverse directory to translate termination notifications
/// back into logical ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhysicalActorId(u64);

thread_local! {
    static NEXT_PHYSICAL_ID: Cell<u64> = Cell::new(1);
}

impl PhysicalActorId {
    /// Allocate the next instantiation id.
    pub(crate) fn allocate() -> Self {
        NEXT_PHYSICAL_ID.with(|next| {
            let id = next.get();
            next.set(id + 1);
            Self(id)
        })
    }

    /// The raw id value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PhysicalActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Explicit type tag stored next to every boxed actor instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorTag {
    type_id: TypeId,
    type_name: &'static str,
}

impl ActorTag {
    /// The tag for actor type `A`.
    pub fn of<A: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<A>(),
            type_name: std::any::type_name::<A>(),
        }
    }

    /// Human-readable type name, for error reporting.
    pub fn name(&self) -> &'static str {
        self.type_name
    }
}

/// Type-erased handle to a live actor instance.
///
/// Carries the boxed instance, its tag, and the physical id assigned at
/// spawn. Cloning is cheap (an `Rc` bump); every caller deduplicated
/// into one creation receives a clone of the same handle.
#[derive(Clone)]
pub struct ActorHandle {
    instance: Rc<dyn Any>,
    tag: ActorTag,
    physical_id: PhysicalActorId,
}

impl fmt::Debug for ActorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorHandle")
            .field("tag", &self.tag.name())
            .field("physical_id", &self.physical_id)
            .finish()
    }
}

impl ActorHandle {
    /// Wrap a freshly spawned instance, assigning its physical id.
    pub fn new<A: VirtualActor>(instance: Rc<A>) -> Self {
        Self {
            instance,
            tag: ActorTag::of::<A>(),
            physical_id: PhysicalActorId::allocate(),
        }
    }

    /// The tag of the stored instance.
    pub fn tag(&self) -> ActorTag {
        self.tag
    }

    /// The physical id assigned at spawn.
    pub fn physical_id(&self) -> PhysicalActorId {
        self.physical_id
    }

    /// Checked cast back to the concrete actor type.
    pub fn downcast<A: VirtualActor>(&self) -> Result<Rc<A>, VirtualActorError> {
        self.instance
            .clone()
            .downcast::<A>()
            .map_err(|_| VirtualActorError::TypeMismatch {
                expected: ActorTag::of::<A>().name().to_string(),
                found: self.tag.name().to_string(),
            })
    }
}

/// Opaque spawn argument handed through the router to the actor factory.
///
/// Creation is deduplicated across callers of unknown concrete types, so
/// the dependency crosses the layer type-erased and the factory claims
/// it back with a checked cast.
pub struct SpawnDependency {
    value: Box<dyn Any>,
    type_name: &'static str,
}

impl fmt::Debug for SpawnDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpawnDependency")
            .field("type_name", &self.type_name)
            .finish()
    }
}

impl SpawnDependency {
    /// Wrap a dependency value.
    pub fn new<D: 'static>(value: D) -> Self {
        Self {
            value: Box::new(value),
            type_name: std::any::type_name::<D>(),
        }
    }

    /// A dependency for actors that need none.
    pub fn none() -> Self {
        Self::new(())
    }

    /// Claim the dependency as type `D`.
    ///
    /// Fails with `SpawnDependencyMismatch` when the caller supplied a
    /// different type than the actor expects.
    pub fn take<D: 'static>(self) -> Result<D, VirtualActorError> {
        let found = self.type_name;
        self.value
            .downcast::<D>()
            .map(|boxed| *boxed)
            .map_err(|_| VirtualActorError::SpawnDependencyMismatch {
                expected: std::any::type_name::<D>().to_string(),
                found: found.to_string(),
            })
    }
}

/// A logically always-available actor whose instances are created on
/// demand and may vanish when idle.
///
/// Implementors supply the factory; everything else (placement, dedup,
/// eviction) is the layer's job. The factory must not assume it runs on
/// any particular node.
#[async_trait::async_trait(?Send)]
pub trait VirtualActor: 'static {
    /// Construct an instance for `id` using the caller-supplied
    /// dependency.
    async fn spawn(
        id: &VirtualActorId,
        dependency: SpawnDependency,
    ) -> Result<Self, VirtualActorError>
    where
        Self: Sized;
}

/// Typed reference to a live virtual actor, as returned by `get_actor`.
///
/// Dereferences to the actor itself and keeps the identifiers needed for
/// keep-alive and cleanup calls. Remains usable after eviction for calls
/// already in progress; only a new lookup observes the eviction.
#[derive(Debug, Clone)]
pub struct VirtualActorRef<A> {
    instance: Rc<A>,
    id: VirtualActorId,
    physical_id: PhysicalActorId,
}

impl<A> VirtualActorRef<A> {
    pub(crate) fn new(instance: Rc<A>, id: VirtualActorId, physical_id: PhysicalActorId) -> Self {
        Self {
            instance,
            id,
            physical_id,
        }
    }

    /// The logical id this reference resolved.
    pub fn id(&self) -> &VirtualActorId {
        &self.id
    }

    /// The physical id of the underlying instantiation.
    pub fn physical_id(&self) -> PhysicalActorId {
        self.physical_id
    }

    /// The shared instance.
    pub fn instance(&self) -> &Rc<A> {
        &self.instance
    }
}

impl<A> Deref for VirtualActorRef<A> {
    type Target = A;

    fn deref(&self) -> &A {
        &self.instance
    }
}
