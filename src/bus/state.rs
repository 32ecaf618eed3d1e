// (c) Copyright 2022 Christian Saide
// SPDX-License-Identifier: GPL-3.0

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;

use super::{metrics, Message};

/// The four per-kind indexes plus the id counter and stopping flag. All
/// transitions between indexes happen under the single [super::Bus] mutex
/// wrapping this struct; do not split into finer locks.
#[derive(Debug)]
pub(super) struct Indexes {
    pub(super) stopping: bool,
    next_id: u64,
    pub(super) enqueued: HashMap<String, VecDeque<Message>>,
    pub(super) delayed: HashMap<String, BTreeMap<Instant, Vec<Message>>>,
    pub(super) unacked: HashMap<String, BTreeMap<Instant, Vec<Message>>>,
    pub(super) deadlines: HashMap<String, HashMap<u64, Instant>>,
}

impl Default for Indexes {
    fn default() -> Self {
        Self {
            stopping: false,
            next_id: 1,
            enqueued: HashMap::new(),
            delayed: HashMap::new(),
            unacked: HashMap::new(),
            deadlines: HashMap::new(),
        }
    }
}

impl Indexes {
    /// Hand out the next message identifier.
    pub(super) fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Move every delayed or lease-expired envelope for the given kind
    /// whose deadline is at or before `now` into the enqueued index,
    /// returning the number of envelopes promoted. Due keys are collected
    /// first and removed afterwards so the maps are never erased while
    /// being walked.
    pub(super) fn promote_due(&mut self, kind: &str, now: Instant) -> usize {
        let mut promoted = 0;

        if let Some(delayed) = self.delayed.get_mut(kind) {
            let due: Vec<Instant> = delayed.range(..=now).map(|(at, _)| *at).collect();
            if !due.is_empty() {
                let enqueued = self.enqueued.entry(kind.to_string()).or_default();
                for at in due {
                    for mut msg in delayed.remove(&at).unwrap_or_default() {
                        msg.deliver_at = None;
                        enqueued.push_back(msg);
                        promoted += 1;
                        metrics::MESSAGES_DELAYED.dec();
                        metrics::MESSAGES_PENDING.inc();
                    }
                }
            }
        }

        if let Some(unacked) = self.unacked.get_mut(kind) {
            let due: Vec<Instant> = unacked.range(..=now).map(|(at, _)| *at).collect();
            if !due.is_empty() {
                let enqueued = self.enqueued.entry(kind.to_string()).or_default();
                let deadlines = self.deadlines.entry(kind.to_string()).or_default();
                for at in due {
                    for msg in unacked.remove(&at).unwrap_or_default() {
                        deadlines.remove(&msg.id);
                        enqueued.push_back(msg);
                        promoted += 1;
                        metrics::MESSAGE_LEASE_EXPIRES.inc();
                        metrics::MESSAGES_OUTSTANDING.dec();
                        metrics::MESSAGES_PENDING.inc();
                    }
                }
            }
        }

        promoted
    }

    /// Drain up to `count` envelopes from the front of the enqueued index
    /// for the given kind. Without auto-ack each drained envelope is moved
    /// into the unacked index under a lease expiring at `now + ack_timeout`
    /// and its deadline recorded; with auto-ack the envelope is considered
    /// acked the moment it leaves the queue.
    pub(super) fn deliver(
        &mut self,
        kind: &str,
        count: usize,
        now: Instant,
        ack_timeout: Duration,
        auto_ack: bool,
    ) -> Vec<(u64, Bytes)> {
        let queue = match self.enqueued.get_mut(kind) {
            Some(queue) => queue,
            None => return Vec::new(),
        };

        let take = count.min(queue.len());
        let messages: Vec<Message> = queue.drain(..take).collect();
        metrics::MESSAGES_PENDING.sub(take as i64);

        let mut batch = Vec::with_capacity(take);
        if auto_ack {
            for msg in messages {
                batch.push((msg.id, msg.payload));
            }
            return batch;
        }

        let due = now + ack_timeout;
        let deadlines = self.deadlines.entry(kind.to_string()).or_default();
        let leased = self
            .unacked
            .entry(kind.to_string())
            .or_default()
            .entry(due)
            .or_insert_with(Vec::new);
        for msg in messages {
            deadlines.insert(msg.id, due);
            batch.push((msg.id, msg.payload.clone()));
            leased.push(msg);
            metrics::MESSAGES_OUTSTANDING.inc();
        }
        batch
    }

    /// Remove the envelope with the given id from the unacked index and
    /// erase its recorded deadline, returning the envelope if it was
    /// actually leased. Unknown ids yield [None] so that ack and nack stay
    /// idempotent.
    pub(super) fn discharge(&mut self, kind: &str, id: u64) -> Option<Message> {
        let due = self.deadlines.get_mut(kind)?.remove(&id)?;
        let unacked = self.unacked.get_mut(kind)?;
        let leased = unacked.get_mut(&due)?;
        let at = leased.iter().position(|msg| msg.id == id)?;
        let msg = leased.remove(at);
        if leased.is_empty() {
            unacked.remove(&due);
        }
        Some(msg)
    }

    /// True iff every index across every kind is empty.
    pub(super) fn empty(&self) -> bool {
        self.enqueued.values().all(|queue| queue.is_empty())
            && self.delayed.values().all(|map| map.is_empty())
            && self.unacked.values().all(|map| map.is_empty())
    }
}

/// The shared bus state: indexes behind the bus mutex, the condition
/// variable serving all waiters across all kinds, the configuration, and
/// the background tick thread handle.
pub(super) struct State {
    pub(super) indexes: Mutex<Indexes>,
    pub(super) cv: Condvar,
    pub(super) ack_timeout: Duration,
    pub(super) auto_ack: bool,
    pub(super) logger: slog::Logger,
    tick: Mutex<Option<thread::JoinHandle<()>>>,
}

impl State {
    /// Create the shared state and spawn the tick thread. The thread only
    /// holds a weak reference so the state is torn down as soon as the last
    /// bus handle goes away.
    pub(super) fn new(
        ack_timeout: Duration,
        auto_ack: bool,
        tick_duration: Duration,
        logger: slog::Logger,
    ) -> Arc<Self> {
        let state = Arc::new(Self {
            indexes: Mutex::new(Indexes::default()),
            cv: Condvar::new(),
            ack_timeout,
            auto_ack,
            logger,
            tick: Mutex::new(None),
        });

        let weak = Arc::downgrade(&state);
        let handle = thread::spawn(move || Self::tick_loop(weak, tick_duration));
        *state.tick.lock().unwrap() = Some(handle);
        state
    }

    /// The background promoter: every tick, walk the union of kinds known
    /// to the enqueued and delayed maps, promote due envelopes, and wake
    /// one waiter per promoted envelope. Payloads are never read here.
    fn tick_loop(state: Weak<State>, tick_duration: Duration) {
        loop {
            thread::sleep(tick_duration);

            let state = match state.upgrade() {
                Some(state) => state,
                None => return,
            };

            let mut indexes = state.indexes.lock().unwrap();
            if indexes.stopping {
                return;
            }

            let now = Instant::now();
            let kinds: BTreeSet<String> = indexes
                .enqueued
                .keys()
                .chain(indexes.delayed.keys())
                .cloned()
                .collect();

            let mut promoted = 0;
            for kind in &kinds {
                promoted += indexes.promote_due(kind, now);
            }
            if promoted > 0 {
                debug!(state.logger, "promoted due messages"; "count" => promoted);
                for _ in 0..promoted {
                    state.cv.notify_one();
                }
            }
        }
    }
}

impl Drop for State {
    fn drop(&mut self) {
        if let Ok(mut indexes) = self.indexes.lock() {
            indexes.stopping = true;
        }
        self.cv.notify_all();

        let handle = match self.tick.lock() {
            Ok(mut tick) => tick.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            // The final handle may be dropped from the tick thread itself;
            // joining there would deadlock.
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}
