// SPDX-License-Identifier: MIT OR Apache-2.0
//! Broker connection supervisor and per-request publishing worker for the
//! grid accounting record collector.
//!
//! [`BrokerClient`] owns the one process-scoped connection to the AMQP
//! broker, redialing forever on loss. Each inbound request obtains its own
//! [`PublishingWorker`], backed by a fresh channel in publisher-confirm
//! mode, publishes its bundle's records through it, and waits for every
//! publish to be acknowledged before the request responds.
#![deny(unsafe_code)]

mod connection;
mod traits;
mod worker;

pub use connection::BrokerClient;
pub use traits::{Broker, Worker};
pub use worker::PublishingWorker;
