//! Per-sender request ordering.
//!
//! The transport is reliable and ordered per connection, but retransmission
//! for at-least-once delivery can still surface duplicates, and a relaying
//! transport may deliver ahead of a gap. [`SequenceTracker`] restores a
//! strict in-order, exactly-once request stream per sender: duplicates are
//! dropped, gaps are buffered until they fill.

use std::collections::BTreeMap;

use crate::messages::ClientRequest;

/// Orders one sender's requests by their envelope sequence number.
#[derive(Debug)]
pub struct SequenceTracker {
    /// The next sequence number expected (sequences start at 1).
    next: u64,
    /// Out-of-order arrivals waiting for the gap to fill.
    buffered: BTreeMap<u64, ClientRequest>,
}

impl Default for SequenceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceTracker {
    /// Creates a tracker expecting sequence 1 first.
    pub fn new() -> Self {
        Self {
            next: 1,
            buffered: BTreeMap::new(),
        }
    }

    /// Accepts one arrival and returns every request that is now ready, in
    /// sequence order. Duplicates (sequence already delivered) return
    /// nothing.
    pub fn accept(&mut self, seq: u64, request: ClientRequest) -> Vec<ClientRequest> {
        if seq < self.next {
            tracing::debug!(seq, expected = self.next, "dropping duplicate request");
            return Vec::new();
        }
        if seq > self.next {
            // Ahead of a gap: park it. A retransmit of a parked sequence
            // just overwrites the identical payload.
            self.buffered.insert(seq, request);
            return Vec::new();
        }

        let mut ready = vec![request];
        self.next += 1;
        while let Some(request) = self.buffered.remove(&self.next) {
            ready.push(request);
            self.next += 1;
        }
        ready
    }

    /// Number of requests parked behind a gap.
    pub fn buffered_len(&self) -> usize {
        self.buffered.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(text: &str) -> ClientRequest {
        ClientRequest::Chat { text: text.into() }
    }

    #[test]
    fn test_in_order_stream_passes_through() {
        let mut tracker = SequenceTracker::new();
        assert_eq!(tracker.accept(1, chat("a")), vec![chat("a")]);
        assert_eq!(tracker.accept(2, chat("b")), vec![chat("b")]);
        assert_eq!(tracker.accept(3, chat("c")), vec![chat("c")]);
    }

    #[test]
    fn test_duplicates_are_dropped() {
        let mut tracker = SequenceTracker::new();
        assert_eq!(tracker.accept(1, chat("a")).len(), 1);
        // Retransmission of an already-delivered request.
        assert!(tracker.accept(1, chat("a")).is_empty());
        assert_eq!(tracker.accept(2, chat("b")).len(), 1);
    }

    #[test]
    fn test_gap_buffers_until_filled() {
        let mut tracker = SequenceTracker::new();
        assert!(tracker.accept(3, chat("c")).is_empty());
        assert!(tracker.accept(2, chat("b")).is_empty());
        assert_eq!(tracker.buffered_len(), 2);

        // Sequence 1 arrives and releases the whole run, in order.
        assert_eq!(
            tracker.accept(1, chat("a")),
            vec![chat("a"), chat("b"), chat("c")]
        );
        assert_eq!(tracker.buffered_len(), 0);
    }
}
