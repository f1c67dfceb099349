//! Remote-call plumbing between participants and the authority.
//!
//! Three call shapes exist: requests (participant → authority, with the
//! caller's identity bound by the channel), broadcasts (authority → every
//! participant, the authority's own local view included), and targeted
//! calls (authority → one participant). All calls are asynchronous
//! fire-and-forget; there is no return-value channel. Per-sender request
//! order is preserved on top of the assumed reliable transport; nothing is
//! guaranteed across senders.

pub mod channel;
pub mod messages;
pub mod ordering;

pub use channel::{InboundRequest, OutboundMessage, RpcChannel, SendScope};
pub use messages::{
    ClientRequest, MessageError, PROTOCOL_VERSION, PlayerFlag, PlayerSnapshot, ProjectileId,
    RequestEnvelope, ScoreEntryWire, ServerBroadcast, ServerPayload, SoundCategory, TargetedCall,
    deserialize_payload, deserialize_request, serialize_payload, serialize_request,
};
pub use ordering::SequenceTracker;
