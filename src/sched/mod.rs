// (c) Copyright 2022 Christian Saide
// SPDX-License-Identifier: GPL-3.0

mod scheduler;

pub use scheduler::Scheduler;
