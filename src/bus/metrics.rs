// (c) Copyright 2022 Christian Saide
// SPDX-License-Identifier: GPL-3.0

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter, IntCounterVec,
    IntGauge,
};

pub const ACK_VALUE: &str = "ack";
pub const NACK_VALUE: &str = "nack";

lazy_static! {
    pub static ref TOTAL_MESSAGES_RECEIVED: IntCounter = register_int_counter!(
        "relay_bus_received_messages",
        "The total number of messages put onto the bus."
    )
    .unwrap();
    pub static ref MESSAGE_RESULTS: IntCounterVec = register_int_counter_vec!(
        "relay_bus_message_results",
        "The number of handled messages by result type across all kinds.",
        &["result"],
    )
    .unwrap();
    pub static ref MESSAGE_LEASE_EXPIRES: IntCounter = register_int_counter!(
        "relay_bus_message_lease_expires",
        "The number of message leases that have expired and been re-enqueued."
    )
    .unwrap();
    pub static ref MESSAGES_OUTSTANDING: IntGauge = register_int_gauge!(
        "relay_bus_outstanding_messages",
        "The total number of messages currently leased and awaiting ack."
    )
    .unwrap();
    pub static ref MESSAGES_PENDING: IntGauge = register_int_gauge!(
        "relay_bus_pending_messages",
        "The total number of messages currently enqueued for delivery."
    )
    .unwrap();
    pub static ref MESSAGES_DELAYED: IntGauge = register_int_gauge!(
        "relay_bus_delayed_messages",
        "The total number of messages currently held in the delayed index."
    )
    .unwrap();
}
