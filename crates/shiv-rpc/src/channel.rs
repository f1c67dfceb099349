//! The channel the authority session speaks through.
//!
//! Inbound: wire bytes (or already-decoded envelopes) from each sender are
//! sequenced per sender and surface as [`InboundRequest`]s with the caller's
//! identity attached; handlers never trust identity fields inside payloads.
//! Outbound: broadcasts and targeted calls queue as [`OutboundMessage`]s the
//! transport drains each tick; `All`-scoped messages are also delivered to
//! the authority's own local observer by the hosting transport.

use std::collections::{HashMap, VecDeque};

use shiv_replication::ParticipantId;

use crate::messages::{
    MessageError, RequestEnvelope, ServerBroadcast, ServerPayload, TargetedCall,
    deserialize_request,
};
use crate::ordering::SequenceTracker;

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

/// A request ready for the authority, with the sender identity the channel
/// bound to it.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundRequest {
    /// Who sent it (bound by the channel from the connection, never taken
    /// from the payload).
    pub sender: ParticipantId,
    /// The call.
    pub request: crate::messages::ClientRequest,
}

/// Delivery scope of an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendScope {
    /// Every connected participant (the authority's local view included).
    All,
    /// Exactly one participant. If they disconnected mid-flight the
    /// transport drops the message silently.
    One(ParticipantId),
}

/// An authority-side send waiting for the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    /// Who receives it.
    pub scope: SendScope,
    /// What they receive.
    pub payload: ServerPayload,
}

// ---------------------------------------------------------------------------
// RpcChannel
// ---------------------------------------------------------------------------

/// Authority-side call dispatch: per-sender ordered inbound queue plus the
/// outbound send queue.
#[derive(Default)]
pub struct RpcChannel {
    ordering: HashMap<ParticipantId, SequenceTracker>,
    ready: VecDeque<InboundRequest>,
    outbound: VecDeque<OutboundMessage>,
}

impl RpcChannel {
    /// Creates an empty channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops a departed sender's ordering state. Requests from them still in
    /// flight will re-register a fresh tracker and be ignored downstream by
    /// the session's participant lookup.
    pub fn forget_sender(&mut self, sender: ParticipantId) {
        self.ordering.remove(&sender);
    }

    /// Accepts raw wire bytes from `sender`. Malformed payloads are
    /// reported to the transport and change nothing.
    pub fn submit_wire(&mut self, sender: ParticipantId, data: &[u8]) -> Result<(), MessageError> {
        let envelope = deserialize_request(data)?;
        self.submit(sender, envelope);
        Ok(())
    }

    /// Accepts a decoded envelope from `sender`, sequencing it into the
    /// ready queue.
    pub fn submit(&mut self, sender: ParticipantId, envelope: RequestEnvelope) {
        let tracker = self.ordering.entry(sender).or_default();
        for request in tracker.accept(envelope.seq, envelope.request) {
            self.ready.push_back(InboundRequest { sender, request });
        }
    }

    /// Pops the next in-order request, if any. The session drains this
    /// every tick.
    pub fn next_request(&mut self) -> Option<InboundRequest> {
        self.ready.pop_front()
    }

    /// Queues a broadcast to every participant.
    pub fn broadcast(&mut self, broadcast: ServerBroadcast) {
        self.outbound.push_back(OutboundMessage {
            scope: SendScope::All,
            payload: ServerPayload::Broadcast(broadcast),
        });
    }

    /// Queues a call to one participant.
    pub fn send_to(&mut self, recipient: ParticipantId, call: TargetedCall) {
        self.outbound.push_back(OutboundMessage {
            scope: SendScope::One(recipient),
            payload: ServerPayload::Targeted(call),
        });
    }

    /// Takes everything queued for the transport, in send order.
    pub fn drain_outbound(&mut self) -> Vec<OutboundMessage> {
        self.outbound.drain(..).collect()
    }

    /// Number of queued outbound messages.
    pub fn outbound_len(&self) -> usize {
        self.outbound.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{ClientRequest, serialize_request};

    fn envelope(seq: u64, request: ClientRequest) -> RequestEnvelope {
        RequestEnvelope { seq, request }
    }

    #[test]
    fn test_sender_identity_is_bound_by_the_channel() {
        let mut channel = RpcChannel::new();
        let alice = ParticipantId(1);
        channel.submit(alice, envelope(1, ClientRequest::Attack));

        let inbound = channel.next_request().unwrap();
        assert_eq!(inbound.sender, alice);
        assert_eq!(inbound.request, ClientRequest::Attack);
        assert!(channel.next_request().is_none());
    }

    #[test]
    fn test_per_sender_order_across_interleaved_senders() {
        let mut channel = RpcChannel::new();
        let alice = ParticipantId(1);
        let bob = ParticipantId(2);

        // Bob's stream arrives with a gap; Alice's flows through unaffected.
        channel.submit(bob, envelope(2, ClientRequest::Dash));
        channel.submit(alice, envelope(1, ClientRequest::Attack));
        channel.submit(bob, envelope(1, ClientRequest::Suicide));

        let order: Vec<_> = std::iter::from_fn(|| channel.next_request())
            .map(|r| (r.sender, r.request))
            .collect();
        assert_eq!(
            order,
            vec![
                (alice, ClientRequest::Attack),
                (bob, ClientRequest::Suicide),
                (bob, ClientRequest::Dash),
            ]
        );
    }

    #[test]
    fn test_wire_submission_and_malformed_rejection() {
        let mut channel = RpcChannel::new();
        let sender = ParticipantId(9);
        let bytes = serialize_request(&envelope(1, ClientRequest::Dash)).unwrap();

        channel.submit_wire(sender, &bytes).unwrap();
        assert!(channel.submit_wire(sender, &[]).is_err());
        assert_eq!(channel.next_request().unwrap().request, ClientRequest::Dash);
        assert!(channel.next_request().is_none());
    }

    #[test]
    fn test_outbound_drain_preserves_send_order() {
        let mut channel = RpcChannel::new();
        channel.broadcast(ServerBroadcast::LeaderChanged { leader: None });
        channel.send_to(
            ParticipantId(4),
            TargetedCall::HitNotify {
                attacker: ParticipantId(2),
                lethal: false,
            },
        );

        let out = channel.drain_outbound();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].scope, SendScope::All);
        assert_eq!(out[1].scope, SendScope::One(ParticipantId(4)));
        assert_eq!(channel.outbound_len(), 0);
    }
}
