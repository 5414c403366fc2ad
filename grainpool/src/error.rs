//! Error taxonomy for the virtual actor layer.
//!
//! One closed set shared by nodes, the router, and the plugin surface.
//! Every variant can cross a node boundary in a real deployment, so the
//! enum is serializable, and results fan out through shared single-flight
//! futures, so it is `Clone`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by virtual actor operations.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum VirtualActorError {
    /// The node has no live instance for the requested id.
    ///
    /// Internal signal driving the find-then-spawn path; `get_actor`
    /// never returns it to callers.
    #[error("actor is missing")]
    ActorMissing,

    /// The stored instance's type disagrees with the caller's expectation.
    ///
    /// Caller error; surfaced, never retried.
    #[error("actor type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Type the caller asked for.
        expected: String,
        /// Type actually stored for the id.
        found: String,
    },

    /// The ring is empty; there is nowhere to place an actor.
    #[error("no nodes available")]
    NoNodesAvailable,

    /// No actor instances are available to serve the request.
    #[error("no actors available")]
    NoActorsAvailable,

    /// The plugin was used before `start` installed the router.
    #[error("virtual actor router is not started")]
    RouterNotStarted,

    /// The spawn dependency's type disagrees with what the actor expects.
    ///
    /// Caller error; surfaced, never retried.
    #[error("spawn dependency type mismatch: expected {expected}, found {found}")]
    SpawnDependencyMismatch {
        /// Dependency type the actor asked for.
        expected: String,
        /// Dependency type the caller supplied.
        found: String,
    },

    /// The actor's factory failed during spawn.
    ///
    /// Propagates to every waiter that joined the in-flight creation;
    /// callers retry `get_actor` themselves.
    #[error("actor spawn failed: {0}")]
    SpawnFailed(String),
}
