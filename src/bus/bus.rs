// (c) Copyright 2022 Christian Saide
// SPDX-License-Identifier: GPL-3.0

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;

use super::{metrics, state::State, Error, Message, Result};

/// The default lease duration before an unacked message is re-enqueued.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(60);
/// The default sleep interval of the background promoter thread.
pub const DEFAULT_TICK_DURATION: Duration = Duration::from_secs(1);

/// The bus builder enables simple setting of various configuration options
/// on a [Bus] instance.
#[derive(Default)]
pub struct BusBuilder {
    ack_timeout: Option<Duration>,
    auto_ack: Option<bool>,
    tick_duration: Option<Duration>,
    logger: Option<slog::Logger>,
}

impl BusBuilder {
    /// Set the lease duration granted to consumers before an unacked
    /// message is re-enqueued for delivery.
    pub fn with_ack_timeout(mut self, ack_timeout: Duration) -> Self {
        self.ack_timeout = Some(ack_timeout);
        self
    }

    /// Consider delivered messages acked immediately, disabling leases,
    /// redelivery, and the ack/nack/reject operations.
    pub fn with_auto_ack(mut self, auto_ack: bool) -> Self {
        self.auto_ack = Some(auto_ack);
        self
    }

    /// Set the sleep interval of the background promoter thread.
    pub fn with_tick_duration(mut self, tick_duration: Duration) -> Self {
        self.tick_duration = Some(tick_duration);
        self
    }

    /// Set the logger to emit bus lifecycle events against.
    pub fn with_logger(mut self, logger: slog::Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Build the resulting [Bus].
    pub fn build(self) -> Bus {
        let logger = self
            .logger
            .unwrap_or_else(|| slog::Logger::root(slog::Discard, o!()));
        Bus {
            state: State::new(
                self.ack_timeout.unwrap_or(DEFAULT_ACK_TIMEOUT),
                self.auto_ack.unwrap_or(false),
                self.tick_duration.unwrap_or(DEFAULT_TICK_DURATION),
                logger,
            ),
        }
    }
}

/// A cheaply cloneable handle to an in-process message bus partitioned by
/// kind, delivering payloads at-least-once with timed redelivery on ack
/// timeout and scheduled delivery for delayed puts.
///
/// # Example
/// ```
/// use std::time::Duration;
///
/// use bytes::Bytes;
///
/// let bus = librelay::bus::Bus::new();
/// let id = bus
///     .put("example", Bytes::from_static(b"hello"), Duration::ZERO)
///     .unwrap();
///
/// let batch = bus.next("example", 1, Duration::from_millis(10)).unwrap();
/// assert_eq!(batch[0].0, id);
/// bus.ack("example", id);
/// bus.stop();
/// ```
#[derive(Clone)]
pub struct Bus {
    state: Arc<State>,
}

impl Bus {
    /// Create a new builder to define the various options for the bus
    /// instance.
    pub fn builder() -> BusBuilder {
        BusBuilder::default()
    }

    /// Create a new bus with a 1 minute ack timeout, auto-ack disabled,
    /// and a 1 second tick.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Put a payload onto the bus for the given kind, returning the
    /// assigned message id. A non-zero `after` holds the message in the
    /// delayed index until `now + after`; otherwise it is immediately
    /// available for delivery. Never blocks beyond acquiring the bus lock,
    /// and is permitted after [Bus::stop], though such messages will never
    /// be delivered.
    pub fn put(&self, kind: &str, payload: Bytes, after: Duration) -> Result<u64> {
        if kind.is_empty() {
            return Err(Error::EmptyKind);
        }

        let mut indexes = self.state.indexes.lock().unwrap();
        let id = indexes.next_id();
        let now = Instant::now();

        if !after.is_zero() {
            let deliver_at = now + after;
            indexes
                .delayed
                .entry(kind.to_string())
                .or_default()
                .entry(deliver_at)
                .or_insert_with(Vec::new)
                .push(Message::delayed(id, payload, deliver_at));
            metrics::MESSAGES_DELAYED.inc();
        } else {
            indexes
                .enqueued
                .entry(kind.to_string())
                .or_default()
                .push_back(Message::new(id, payload));
            metrics::MESSAGES_PENDING.inc();
        }
        metrics::TOTAL_MESSAGES_RECEIVED.inc();

        self.state.cv.notify_one();
        Ok(id)
    }

    /// Retrieve at most `count` messages for the given kind, blocking
    /// while the kind has nothing deliverable. A zero `timeout` waits
    /// indefinitely; a non-zero `timeout` bounds the wait and yields an
    /// empty batch once it elapses. Returns [None] iff the bus is
    /// stopping, which is terminal. Before waiting, due delayed and
    /// lease-expired messages are promoted so callers arriving between
    /// ticks observe them without delay.
    pub fn next(&self, kind: &str, count: usize, timeout: Duration) -> Option<Vec<(u64, Bytes)>> {
        let state = &self.state;
        let mut indexes = state.indexes.lock().unwrap();

        indexes.promote_due(kind, Instant::now());

        if count == 0 {
            return Some(Vec::new());
        }

        let mut elapsed = false;
        if timeout.is_zero() {
            indexes = state
                .cv
                .wait_while(indexes, |indexes| {
                    !indexes.stopping
                        && indexes.enqueued.get(kind).map_or(true, |queue| queue.is_empty())
                })
                .unwrap();
        } else {
            let (guard, result) = state
                .cv
                .wait_timeout_while(indexes, timeout, |indexes| {
                    !indexes.stopping
                        && indexes.enqueued.get(kind).map_or(true, |queue| queue.is_empty())
                })
                .unwrap();
            indexes = guard;
            elapsed = result.timed_out();
        }

        if indexes.stopping {
            return None;
        }
        if elapsed {
            return Some(Vec::new());
        }

        let now = Instant::now();
        Some(indexes.deliver(kind, count, now, state.ack_timeout, state.auto_ack))
    }

    /// Ack the given message id, discharging its lease. Unknown ids are
    /// ignored, making ack idempotent. A no-op under auto-ack.
    pub fn ack(&self, kind: &str, id: u64) {
        if self.state.auto_ack {
            return;
        }

        let mut indexes = self.state.indexes.lock().unwrap();
        if indexes.discharge(kind, id).is_some() {
            metrics::MESSAGE_RESULTS
                .with_label_values(&[metrics::ACK_VALUE])
                .inc();
            metrics::MESSAGES_OUTSTANDING.dec();
        }
    }

    /// Reject the given message id, dropping it without redelivery. This
    /// is observationally equal to [Bus::ack].
    pub fn reject(&self, kind: &str, id: u64) {
        self.ack(kind, id)
    }

    /// Nack the given message id, returning it to the tail of the
    /// enqueued index for redelivery. The message loses its original FIFO
    /// position. Unknown ids are ignored. A no-op under auto-ack.
    pub fn nack(&self, kind: &str, id: u64) {
        if self.state.auto_ack {
            return;
        }

        let mut indexes = self.state.indexes.lock().unwrap();
        if let Some(msg) = indexes.discharge(kind, id) {
            indexes
                .enqueued
                .entry(kind.to_string())
                .or_default()
                .push_back(msg);
            metrics::MESSAGE_RESULTS
                .with_label_values(&[metrics::NACK_VALUE])
                .inc();
            metrics::MESSAGES_OUTSTANDING.dec();
            metrics::MESSAGES_PENDING.inc();
            self.state.cv.notify_one();
        }
    }

    /// Stop the bus. All blocked and subsequent [Bus::next] calls return
    /// [None]. Idempotent; in-flight payloads already handed to consumers
    /// are unaffected.
    pub fn stop(&self) {
        let mut indexes = self.state.indexes.lock().unwrap();
        if indexes.stopping {
            return;
        }
        indexes.stopping = true;
        info!(self.state.logger, "stopping message bus");
        self.state.cv.notify_all();
    }

    /// The number of messages ready for immediate delivery for the kind.
    pub fn enqueued_size(&self, kind: &str) -> usize {
        let indexes = self.state.indexes.lock().unwrap();
        indexes.enqueued.get(kind).map_or(0, |queue| queue.len())
    }

    /// The number of messages held back in the delayed index for the kind.
    pub fn delayed_size(&self, kind: &str) -> usize {
        let indexes = self.state.indexes.lock().unwrap();
        indexes
            .delayed
            .get(kind)
            .map_or(0, |map| map.values().map(Vec::len).sum())
    }

    /// The number of messages currently leased and awaiting ack for the
    /// kind.
    pub fn unacked_size(&self, kind: &str) -> usize {
        let indexes = self.state.indexes.lock().unwrap();
        indexes
            .unacked
            .get(kind)
            .map_or(0, |map| map.values().map(Vec::len).sum())
    }

    /// True iff the enqueued, delayed, and unacked indexes are empty
    /// across all kinds.
    pub fn empty(&self) -> bool {
        let indexes = self.state.indexes.lock().unwrap();
        indexes.empty()
    }
}

impl Default for Bus {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[cfg(not(tarpaulin_include))]
mod tests {
    use std::collections::BTreeSet;
    use std::thread;

    use super::*;

    fn payload(val: u8) -> Bytes {
        Bytes::from(vec![val])
    }

    #[test]
    fn test_empty_kind() {
        let bus = Bus::new();
        let res = bus.put("", payload(0x01), Duration::ZERO);
        assert!(res.is_err());
        bus.stop();
    }

    #[test]
    fn test_fifo_drain() {
        let bus = Bus::new();

        let mut ids = Vec::new();
        for val in [0x01u8, 0x02, 0x03] {
            ids.push(bus.put("k", payload(val), Duration::ZERO).unwrap());
        }
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));

        let batch = bus.next("k", 10, Duration::ZERO).unwrap();
        assert_eq!(batch.len(), 3);
        for (i, (id, data)) in batch.iter().enumerate() {
            assert_eq!(*id, ids[i]);
            assert_eq!(data.as_ref(), &[0x01 + i as u8]);
            bus.ack("k", *id);
        }

        assert!(bus.empty());
        bus.stop();
    }

    #[test]
    fn test_count_zero() {
        let bus = Bus::new();
        bus.put("k", payload(0x01), Duration::ZERO).unwrap();

        let batch = bus.next("k", 0, Duration::ZERO).unwrap();
        assert!(batch.is_empty());
        assert_eq!(bus.enqueued_size("k"), 1);
        bus.stop();
    }

    #[test]
    fn test_delayed_promotion() {
        let bus = Bus::new();
        bus.put("k", payload(0xAA), Duration::from_millis(200))
            .unwrap();
        assert_eq!(bus.delayed_size("k"), 1);
        assert_eq!(bus.enqueued_size("k"), 0);

        let batch = bus.next("k", 1, Duration::from_millis(50)).unwrap();
        assert!(batch.is_empty());

        thread::sleep(Duration::from_millis(500));

        let batch = bus.next("k", 1, Duration::ZERO).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].1.as_ref(), &[0xAA]);
        bus.ack("k", batch[0].0);
        assert!(bus.empty());
        bus.stop();
    }

    #[test]
    fn test_lease_expiry() {
        let bus = Bus::builder()
            .with_ack_timeout(Duration::from_millis(100))
            .with_tick_duration(Duration::from_millis(20))
            .build();

        bus.put("k", payload(0x00), Duration::ZERO).unwrap();

        let first = bus.next("k", 1, Duration::ZERO).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(bus.unacked_size("k"), 1);

        thread::sleep(Duration::from_millis(300));

        let second = bus.next("k", 1, Duration::ZERO).unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].0, first[0].0);
        assert_eq!(second[0].1, first[0].1);

        bus.ack("k", second[0].0);
        assert!(bus.empty());
        bus.stop();
    }

    #[test]
    fn test_nack_reenqueue() {
        let bus = Bus::new();
        let first = bus.put("k", payload(0x0A), Duration::ZERO).unwrap();
        let second = bus.put("k", payload(0x0B), Duration::ZERO).unwrap();

        let batch = bus.next("k", 2, Duration::ZERO).unwrap();
        assert_eq!(batch.len(), 2);

        bus.ack("k", first);
        bus.nack("k", second);
        assert_eq!(bus.enqueued_size("k"), 1);
        assert_eq!(bus.unacked_size("k"), 0);

        let batch = bus.next("k", 1, Duration::ZERO).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].0, second);
        assert_eq!(batch[0].1.as_ref(), &[0x0B]);

        bus.ack("k", second);
        assert!(bus.empty());
        bus.stop();
    }

    #[test]
    fn test_idempotent_ack_and_reject() {
        let bus = Bus::new();
        let first = bus.put("k", payload(0x01), Duration::ZERO).unwrap();
        let second = bus.put("k", payload(0x02), Duration::ZERO).unwrap();

        let batch = bus.next("k", 2, Duration::ZERO).unwrap();
        assert_eq!(batch.len(), 2);

        bus.ack("k", first);
        bus.ack("k", first);
        bus.reject("k", second);
        bus.reject("k", second);
        bus.nack("k", first);

        assert!(bus.empty());
        bus.stop();
    }

    #[test]
    fn test_auto_ack() {
        let bus = Bus::builder().with_auto_ack(true).build();
        let id = bus.put("k", payload(0x01), Duration::ZERO).unwrap();

        let batch = bus.next("k", 1, Duration::ZERO).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(bus.unacked_size("k"), 0);

        // All lease operations are no-ops in this mode.
        bus.ack("k", id);
        bus.nack("k", id);
        bus.reject("k", id);

        assert!(bus.empty());
        bus.stop();
    }

    #[test]
    fn test_stop_unblocks() {
        let bus = Bus::new();

        let consumer = bus.clone();
        let handle = thread::spawn(move || consumer.next("k", 1, Duration::ZERO));

        thread::sleep(Duration::from_millis(50));
        bus.stop();

        let res = handle.join().unwrap();
        assert!(res.is_none());

        // Stop is terminal for both blocking and bounded polls, while put
        // is still accepted.
        assert!(bus.next("k", 1, Duration::ZERO).is_none());
        assert!(bus.next("k", 1, Duration::from_millis(10)).is_none());
        assert!(bus.put("k", payload(0x01), Duration::ZERO).is_ok());
        bus.stop();
    }

    #[test]
    fn test_mixed_load() {
        let kind = "test_kind";
        let total_messages = 500usize;
        let ack_timeout = Duration::from_millis(200);
        let delay = Duration::from_secs(2);

        let bus = Bus::builder().with_ack_timeout(ack_timeout).build();

        let mut immediate_ids = BTreeSet::new();
        let mut delayed_ids = BTreeSet::new();
        let mut unacked_ids = BTreeSet::new();

        for i in 0..total_messages {
            let delayed = i % 10 == 0;
            let id = bus
                .put(
                    kind,
                    payload((i % 256) as u8),
                    if delayed { delay } else { Duration::ZERO },
                )
                .unwrap();
            if delayed {
                delayed_ids.insert(id);
            } else {
                immediate_ids.insert(id);
            }
        }
        assert_eq!(immediate_ids.len() + delayed_ids.len(), total_messages);

        // Drain a tenth, acking every other message.
        let mut final_count = 0usize;
        let batch = bus.next(kind, total_messages / 10, Duration::ZERO).unwrap();
        assert_eq!(batch.len(), total_messages / 10);
        for (i, (id, _)) in batch.iter().enumerate() {
            assert!(immediate_ids.contains(id));
            if i % 2 == 0 {
                bus.ack(kind, *id);
                final_count += 1;
            } else {
                unacked_ids.insert(*id);
            }
        }

        // The rest of the immediate messages drain in one call; the
        // delayed ones are still held back.
        let batch = bus.next(kind, total_messages, Duration::ZERO).unwrap();
        assert_eq!(batch.len(), total_messages * 8 / 10);
        for (id, _) in &batch {
            assert!(immediate_ids.contains(id));
            bus.ack(kind, *id);
            final_count += 1;
        }

        // Let the outstanding leases expire and collect the redeliveries.
        thread::sleep(ack_timeout * 2);
        let batch = bus.next(kind, total_messages / 10, Duration::ZERO).unwrap();
        assert_eq!(batch.len(), total_messages / 20);
        for (id, _) in &batch {
            assert!(unacked_ids.contains(id));
            bus.ack(kind, *id);
            final_count += 1;
        }

        // Wait out the delayed messages in a loop.
        while final_count < total_messages {
            let batch = match bus.next(kind, total_messages, Duration::ZERO) {
                Some(batch) => batch,
                None => break,
            };
            for (id, _) in &batch {
                assert!(delayed_ids.contains(id));
                bus.ack(kind, *id);
                final_count += 1;
            }
        }
        assert_eq!(final_count, total_messages);

        bus.stop();
        assert_eq!(bus.enqueued_size(kind), 0);
        assert_eq!(bus.delayed_size(kind), 0);
        assert_eq!(bus.unacked_size(kind), 0);
    }
}
