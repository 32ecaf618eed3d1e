// (c) Copyright 2022 Christian Saide
// SPDX-License-Identifier: GPL-3.0

use std::time::Instant;

use bytes::Bytes;

/// An immutable message envelope moving between the bus indexes. The
/// payload is reference shared with consumers and never mutated after
/// the message is put.
#[derive(Debug, Clone)]
pub struct Message {
    /// The bus assigned identifier, strictly monotonic per bus instance.
    pub id: u64,
    /// The shared read-only payload.
    pub payload: Bytes,
    /// The earliest instant this message may be delivered. Set iff the
    /// message was put with a non-zero delay, and only meaningful while
    /// the message resides in the delayed index.
    pub deliver_at: Option<Instant>,
}

impl Message {
    /// Create a new envelope ready for immediate delivery.
    pub fn new(id: u64, payload: Bytes) -> Self {
        Self {
            id,
            payload,
            deliver_at: None,
        }
    }

    /// Create a new envelope held back until the supplied instant.
    pub fn delayed(id: u64, payload: Bytes, deliver_at: Instant) -> Self {
        Self {
            id,
            payload,
            deliver_at: Some(deliver_at),
        }
    }
}

#[cfg(test)]
#[cfg(not(tarpaulin_include))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_message() {
        let immediate = Message::new(1, Bytes::from_static(&[0x01]));
        assert_eq!(immediate.id, 1);
        assert!(immediate.deliver_at.is_none());

        let at = Instant::now() + Duration::from_millis(100);
        let delayed = Message::delayed(2, Bytes::from_static(&[0x02]), at);
        assert_eq!(delayed.deliver_at, Some(at));

        let copy = delayed.clone();
        assert_eq!(copy.id, delayed.id);
        assert_eq!(copy.payload, delayed.payload);
    }
}
