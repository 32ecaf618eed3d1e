// (c) Copyright 2022 Christian Saide
// SPDX-License-Identifier: GPL-3.0

mod bus;
mod error;
mod message;
mod metrics;
mod state;

pub use bus::{Bus, BusBuilder, DEFAULT_ACK_TIMEOUT, DEFAULT_TICK_DURATION};
pub use error::{Error, Result};
pub use message::Message;
