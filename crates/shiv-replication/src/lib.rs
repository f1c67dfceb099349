//! Replicated state primitives: permissioned variables and collections with
//! synchronous change notification.
//!
//! Every piece of session state that must stay consistent between the
//! authority and its observers lives in a [`ReplicatedVar`],
//! [`ReplicatedMap`], or [`ReplicatedList`]. Writes are checked against a
//! [`VarPermission`] (who may originate the change) and every accepted write
//! notifies subscribers exactly once, in subscription order.

pub mod collection;
pub mod permission;
pub mod var;

pub use collection::{EntryChange, ListEvent, MapEvent, ReplicatedList, ReplicatedMap};
pub use permission::{ParticipantId, Principal, ReadScope, VarPermission, WriteScope};
pub use var::{ReplicatedVar, SubscriptionId};

/// Errors produced by replicated-state mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReplicationError {
    /// The principal does not satisfy the container's write permission.
    /// Illegitimate writes are inert; callers drop them without surfacing
    /// a user-visible failure.
    #[error("write rejected: principal lacks write permission")]
    PermissionDenied,

    /// An `add` named a key that already exists.
    #[error("duplicate key")]
    DuplicateKey,

    /// A `set`/`remove` named a key that does not exist.
    #[error("key not found")]
    NotFound,
}
