// (c) Copyright 2022 Christian Saide
// SPDX-License-Identifier: GPL-3.0

#![warn(missing_docs)]

//! Librelay encapsulates all logic for the relaymq in-process deferred
//! task execution subsystem: a kind-partitioned message bus with
//! at-least-once delivery, a typed task scheduler, and a worker pool.

// macro usings
#[macro_use]
extern crate slog;

/// The core message bus: envelopes, indexes, and delivery semantics.
pub mod bus;
/// General log related functionality, based ontop of the [slog] ecosystem.
pub mod log;
/// The typed task submission façade ontop of the bus.
pub mod sched;
/// The typed task contract shared by the scheduler and worker pool.
pub mod task;
/// Per-kind worker groups handling task execution and acknowledgement.
pub mod worker;
