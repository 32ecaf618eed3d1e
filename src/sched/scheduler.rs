// (c) Copyright 2022 Christian Saide
// SPDX-License-Identifier: GPL-3.0

use std::time::{Duration, Instant};

use crate::bus::{Bus, Result};
use crate::task::Task;

/// A thin typed façade over [Bus::put]: serializes task arguments and
/// submits them under the task's kind. Stateless beyond its bus handle
/// and performs no synchronization of its own.
#[derive(Clone)]
pub struct Scheduler {
    bus: Bus,
}

impl Scheduler {
    /// Create a new scheduler submitting onto the supplied bus.
    pub fn new(bus: Bus) -> Self {
        Self { bus }
    }

    /// Serialize the arguments and put them onto the bus, delaying
    /// delivery by `after`. Returns the assigned message id.
    pub fn try_schedule<T: Task>(&self, args: &T::Args, after: Duration) -> Result<u64> {
        self.bus.put(&T::kind(), T::serialize(args), after)
    }

    /// Serialize the arguments and put them onto the bus, delaying
    /// delivery until `at`. An `at` at or before the current instant is
    /// treated as no delay.
    pub fn try_schedule_at<T: Task>(&self, args: &T::Args, at: Instant) -> Result<u64> {
        self.try_schedule::<T>(args, at.saturating_duration_since(Instant::now()))
    }

    /// Like [Scheduler::try_schedule], treating submission failure as
    /// fatal.
    ///
    /// # Panics
    /// Panics if the underlying put is rejected.
    pub fn schedule<T: Task>(&self, args: &T::Args, after: Duration) -> u64 {
        match self.try_schedule::<T>(args, after) {
            Ok(id) => id,
            Err(err) => panic!("failed to schedule task: {}", err),
        }
    }

    /// Like [Scheduler::try_schedule_at], treating submission failure as
    /// fatal.
    ///
    /// # Panics
    /// Panics if the underlying put is rejected.
    pub fn schedule_at<T: Task>(&self, args: &T::Args, at: Instant) -> u64 {
        match self.try_schedule_at::<T>(args, at) {
            Ok(id) => id,
            Err(err) => panic!("failed to schedule task: {}", err),
        }
    }
}
