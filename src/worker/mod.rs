// (c) Copyright 2022 Christian Saide
// SPDX-License-Identifier: GPL-3.0

mod pool;
mod worker;

pub use pool::{WorkerPool, WorkerPoolBuilder, DEFAULT_POLLING_INTERVAL};
pub(crate) use worker::Worker;
