// SPDX-License-Identifier: MIT OR Apache-2.0
//! Trait seams separating the dispatcher (C6) from the concrete AMQP
//! transport, so the dispatcher's §8 testable properties — confirm
//! gating, return demotion, multiupdate, unknown-record demotion — can be
//! exercised against an in-memory double instead of a live broker.

use std::time::Duration;

use async_trait::async_trait;

use gracc_error::GraccError;
use gracc_record::RecordRef;

/// Hands out a fresh, request-scoped [`Worker`] backed by whatever
/// transport implements this trait — a real [`crate::BrokerClient`] in
/// production, an in-memory fake in tests.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Open a new worker ready to publish `expected_count` records.
    async fn new_worker(&self, expected_count: usize) -> Result<Box<dyn Worker>, GraccError>;
}

/// A request-scoped publishing session: publish records, then wait for
/// every one to be confirmed, then close.
#[async_trait]
pub trait Worker: Send {
    /// Publish one record, per §4.5.
    async fn publish_record(&mut self, record: RecordRef<'_>) -> Result<(), GraccError>;

    /// Wait for every publish made through [`Self::publish_record`] to be
    /// acknowledged, or fail per §4.5/§4.6's confirmation-accounting rules.
    async fn wait(&mut self, timeout: Duration) -> Result<(), GraccError>;

    /// Close the worker. Implementations should not propagate close
    /// failures — the request outcome was already decided by
    /// [`Self::wait`].
    async fn close(self: Box<Self>);
}
