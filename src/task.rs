// (c) Copyright 2022 Christian Saide
// SPDX-License-Identifier: GPL-3.0

use std::result;

use bytes::Bytes;
use thiserror::Error;

/// An opaque non-empty identifier naming a message class. All bus indexes
/// are partitioned by kind; no inter-kind ordering exists.
pub type Kind = String;

/// Custom Result wrapper to simplify usage.
pub type Result<T> = result::Result<T, Error>;

/// Represents task handler failures reported back to the worker pool. Any
/// error returned from [Task::execute] results in a nack, making the
/// message re-deliverable once its lease expires.
#[derive(Error, Debug)]
pub enum Error {
    /// An error which occurs when a handler cannot make sense of its
    /// deserialized arguments.
    #[error("the task arguments are invalid: {reason}")]
    InvalidArgs {
        /// A human readable description of the rejected arguments.
        reason: String,
    },
    /// An error which occurs when a handler accepted its arguments but
    /// failed to complete its work.
    #[error("the task failed to complete: {reason}")]
    Failed {
        /// A human readable description of the failure.
        reason: String,
    },
}

/// The typed-task contract a collaborator must satisfy to be usable with
/// the [crate::sched::Scheduler] and [crate::worker::WorkerPool].
///
/// Implementations must uphold: [Task::kind] returns a stable non-empty
/// identifier; [Task::serialize] is pure and round-trips through
/// [Task::deserialize] to arguments equal to the original; and
/// [Task::deserialize] is total on any payload [Task::serialize] produced.
/// Task values are cloned into each executor thread of a worker group.
pub trait Task: Clone + Send + 'static {
    /// The argument type carried by messages of this task's kind.
    type Args;

    /// The stable identifier partitioning this task's messages on the bus.
    fn kind() -> Kind;

    /// Serialize the arguments into a payload to put onto the bus.
    fn serialize(args: &Self::Args) -> Bytes;

    /// Reconstruct the arguments from a payload produced by
    /// [Task::serialize].
    fn deserialize(payload: &[u8]) -> Self::Args;

    /// Run the handler. [Ok] acks the message; an [Error] nacks it.
    fn execute(&self, args: Self::Args) -> Result<()>;
}
