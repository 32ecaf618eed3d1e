// (c) Copyright 2022 Christian Saide
// SPDX-License-Identifier: GPL-3.0

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use super::Worker;
use crate::bus::Bus;
use crate::task::{Kind, Task};

/// The default interval a worker poll waits for new jobs before retrying.
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_millis(100);

/// The worker pool builder enables simple setting of various configuration
/// options on a [WorkerPool] instance.
#[derive(Default)]
pub struct WorkerPoolBuilder {
    polling_interval: Option<Duration>,
    logger: Option<slog::Logger>,
}

impl WorkerPoolBuilder {
    /// Set the polling interval shared by all worker groups. Must be
    /// non-zero, a zero interval turns every idle poll into an unbounded
    /// wait and stalls shutdown until the bus itself stops.
    pub fn with_polling_interval(mut self, polling_interval: Duration) -> Self {
        self.polling_interval = Some(polling_interval);
        self
    }

    /// Set the logger handed to every worker group.
    pub fn with_logger(mut self, logger: slog::Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Build the resulting [WorkerPool] polling the supplied bus.
    pub fn build(self, bus: Bus) -> WorkerPool {
        WorkerPool {
            bus,
            polling_interval: self.polling_interval.unwrap_or(DEFAULT_POLLING_INTERVAL),
            logger: self
                .logger
                .unwrap_or_else(|| slog::Logger::root(slog::Discard, o!())),
            workers: Mutex::new(HashMap::new()),
        }
    }
}

/// A registry of worker groups keyed by kind, owning their lifecycle. The
/// pool cannot be cloned; dropping it stops every group and joins all
/// executor threads.
pub struct WorkerPool {
    bus: Bus,
    polling_interval: Duration,
    logger: slog::Logger,
    workers: Mutex<HashMap<Kind, Worker>>,
}

impl WorkerPool {
    /// Create a new builder to define the various options for the worker
    /// pool instance.
    pub fn builder() -> WorkerPoolBuilder {
        WorkerPoolBuilder::default()
    }

    /// Create a new pool polling the supplied bus every 100ms.
    pub fn new(bus: Bus) -> Self {
        Self::builder().build(bus)
    }

    /// Register a worker group of `pool_size` executors handling the
    /// task's kind. A kind that already has a group registered is left
    /// untouched; group sizes are fixed at creation.
    pub fn work_on<T: Task>(&self, task: T, pool_size: usize) {
        let kind = T::kind();
        let mut workers = self.workers.lock().unwrap();
        if workers.contains_key(&kind) {
            return;
        }

        let worker = Worker::new(
            self.bus.clone(),
            self.polling_interval,
            task,
            pool_size,
            self.logger.clone(),
        );
        workers.insert(kind, worker);
    }

    /// Flag every worker group stopping. Executors finish their in-flight
    /// handler invocations; the threads are joined when the pool drops.
    pub fn stop(&self) {
        let workers = self.workers.lock().unwrap();
        for worker in workers.values() {
            worker.stop();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop();
    }
}
