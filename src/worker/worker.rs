// (c) Copyright 2022 Christian Saide
// SPDX-License-Identifier: GPL-3.0

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use bytes::Bytes;

use crate::bus::Bus;
use crate::task::{Kind, Task};

/// A delivered job: the message id plus its shared payload.
type Job = (u64, Bytes);

/// A per-kind executor group. Each of its `size` threads runs the consume
/// loop: fetch a job, deserialize, invoke the handler, then ack on success
/// or nack on failure. Jobs are fetched from a private slot buffer that
/// batches bus polls into one call per `size` deliveries.
pub(crate) struct Worker {
    shared: Arc<Shared>,
    threads: Vec<thread::JoinHandle<()>>,
}

struct Shared {
    bus: Bus,
    kind: Kind,
    polling_interval: Duration,
    size: usize,
    slots: Mutex<VecDeque<Job>>,
    poll: Mutex<()>,
    stopping: AtomicBool,
    logger: slog::Logger,
}

impl Worker {
    /// Create a new worker group for the task's kind, spawning `size`
    /// executor threads, each holding its own copy of the task value.
    pub(crate) fn new<T: Task>(
        bus: Bus,
        polling_interval: Duration,
        task: T,
        size: usize,
        logger: slog::Logger,
    ) -> Self {
        let shared = Arc::new(Shared {
            bus,
            kind: T::kind(),
            polling_interval,
            size,
            slots: Mutex::new(VecDeque::with_capacity(size)),
            poll: Mutex::new(()),
            stopping: AtomicBool::new(false),
            logger,
        });

        let mut threads = Vec::with_capacity(size);
        for _ in 0..size {
            let shared = shared.clone();
            let task = task.clone();
            threads.push(thread::spawn(move || Shared::run(shared, task)));
        }

        debug!(shared.logger, "started worker group";
            "kind" => shared.kind.as_str(), "size" => size);
        Self { shared, threads }
    }

    /// Flag the group stopping. Executor threads exit once their current
    /// job, if any, completes; they are joined on drop.
    pub(crate) fn stop(&self) {
        self.shared.stopping.store(true, Ordering::SeqCst);
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
        debug!(self.shared.logger, "worker group stopped";
            "kind" => self.shared.kind.as_str());
    }
}

impl Shared {
    /// The consume loop run by every executor thread. A fetched job is
    /// always executed and acked or nacked, even when the group is flagged
    /// stopping between the fetch and the invocation. Handler panics are
    /// caught and treated as failures, so a misbehaving task nacks its
    /// message instead of killing the executor.
    fn run<T: Task>(shared: Arc<Shared>, task: T) {
        while let Some((id, payload)) = shared.next() {
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| task.execute(T::deserialize(&payload))));
            match outcome {
                Ok(Ok(())) => shared.bus.ack(&shared.kind, id),
                Ok(Err(err)) => {
                    warn!(shared.logger, "task handler failed";
                        "kind" => shared.kind.as_str(), "id" => id, "error" => err.to_string());
                    shared.bus.nack(&shared.kind, id);
                }
                Err(_) => {
                    warn!(shared.logger, "task handler panicked";
                        "kind" => shared.kind.as_str(), "id" => id);
                    shared.bus.nack(&shared.kind, id);
                }
            }
        }
    }

    /// Fetch the next job: drain the slot buffer first, otherwise poll the
    /// bus for up to `size` jobs at once. A terminal bus ([None]) flags the
    /// group stopping; an empty batch means the poll timed out with the
    /// bus live and is retried. The slot mutex is never held across the
    /// bus call; a separate poll token serializes pollers instead, and a
    /// parked poller re-checks the slots it may have been raced to.
    fn next(&self) -> Option<Job> {
        loop {
            if self.size == 0 || self.stopping.load(Ordering::SeqCst) {
                return None;
            }

            if let Some(job) = self.slots.lock().unwrap().pop_front() {
                return Some(job);
            }

            let _poll = self.poll.lock().unwrap();
            if self.stopping.load(Ordering::SeqCst) {
                return None;
            }
            if let Some(job) = self.slots.lock().unwrap().pop_front() {
                return Some(job);
            }

            match self.bus.next(&self.kind, self.size, self.polling_interval) {
                None => {
                    self.stopping.store(true, Ordering::SeqCst);
                    return None;
                }
                Some(batch) => {
                    let mut slots = self.slots.lock().unwrap();
                    slots.extend(batch);
                    if let Some(job) = slots.pop_front() {
                        return Some(job);
                    }
                }
            }
        }
    }
}
