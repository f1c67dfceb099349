//! Session wiring: the authority that owns all state-mutating decisions,
//! and the observer each participant runs locally.
//!
//! Data flow: participant input → [`ObserverSession`] builds a sequenced
//! request → the authority validates it against the replicated state →
//! accepted changes mutate replicated variables/collections → change
//! notifications fan out as broadcasts → every observer (the authority's
//! own local view included) re-renders from the new state.

pub mod authority;
pub mod observer;

pub use authority::{AuthoritySession, SlotKey};
pub use observer::{IconSlot, ObservedPlayer, ObserverSession};
