// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection supervisor: owns the one process-scoped broker connection,
//! redials on loss, and hands out a fresh channel-backed [`PublishingWorker`]
//! per request.
//!
//! State machine: `Dialing -> Ready -> Dialing` (on connection loss) for the
//! life of the process; there is no externally-triggered `Closed` state
//! short of process shutdown, at which point the supervisor task is simply
//! dropped along with the runtime.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lapin::{Connection, ConnectionProperties};
use tokio::sync::{Notify, RwLock};

use gracc_config::AmqpConfig;
use gracc_error::{ErrorCode, GraccError};

use crate::traits::{Broker, Worker};
use crate::worker::PublishingWorker;

/// Supervisor state, as observed by a caller asking for a worker.
#[derive(Clone)]
enum SupervisorState {
    /// Currently attempting to dial, or waiting out the retry delay.
    Dialing,
    /// Holding a live connection.
    Ready(Connection),
}

/// Owns the collector's single logical connection to the broker.
///
/// Cloning a `BrokerClient` is cheap and shares the same supervised
/// connection; every clone sees the same state transitions.
#[derive(Clone)]
pub struct BrokerClient {
    state: Arc<RwLock<SupervisorState>>,
    config: AmqpConfig,
}

impl BrokerClient {
    /// Start the connection supervisor in the background and return a
    /// handle to it. The first dial attempt happens on the spawned task,
    /// not before this function returns.
    pub fn spawn(config: AmqpConfig) -> Self {
        let state = Arc::new(RwLock::new(SupervisorState::Dialing));
        tokio::spawn(supervise(state.clone(), config.clone()));
        Self { state, config }
    }

    async fn ready_connection(&self) -> Result<Connection, GraccError> {
        match &*self.state.read().await {
            SupervisorState::Ready(conn)
                if conn.status().state() == lapin::ConnectionState::Connected =>
            {
                Ok(conn.clone())
            }
            _ => Err(GraccError::new(
                ErrorCode::BrokerUnavailable,
                "broker connection is not ready",
            )),
        }
    }
}

#[async_trait]
impl Broker for BrokerClient {
    /// Open a fresh channel on the current connection, setting it up per
    /// §4.5's sequence, ready to publish `expected_count` records.
    ///
    /// Fails fast with [`ErrorCode::BrokerUnavailable`] if the connection is
    /// not currently `Ready`, rather than blocking the caller indefinitely
    /// — the dispatcher's own per-request deadline governs how long a
    /// probe waits, and a fast, explicit failure lets it retry the whole
    /// bundle sooner.
    async fn new_worker(&self, expected_count: usize) -> Result<Box<dyn Worker>, GraccError> {
        let connection = self.ready_connection().await?;
        let worker = PublishingWorker::open(&connection, &self.config, expected_count).await?;
        Ok(Box::new(worker))
    }
}

async fn supervise(state: Arc<RwLock<SupervisorState>>, config: AmqpConfig) {
    loop {
        *state.write().await = SupervisorState::Dialing;

        let props = ConnectionProperties::default()
            .with_executor(tokio_executor_trait::Tokio::current())
            .with_reactor(tokio_reactor_trait::Tokio);

        match Connection::connect(&config.uri(), props).await {
            Ok(connection) => {
                tracing::info!(
                    host = %config.host,
                    port = %config.port,
                    vhost = %config.vhost,
                    "connected to broker"
                );

                let lost = Arc::new(Notify::new());
                {
                    let lost = lost.clone();
                    connection.on_error(move |err| {
                        tracing::warn!(error = %err, "broker connection lost");
                        lost.notify_one();
                    });
                }

                let watched = connection.clone();
                *state.write().await = SupervisorState::Ready(connection);
                watch_blocked_state(&watched, lost.notified()).await;
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    retry_in_s = config.retry.as_secs(),
                    "broker dial failed, retrying"
                );
                tokio::time::sleep(config.retry).await;
            }
        }
    }
}

/// Poll `connection`'s status for flow-control blocked/unblocked
/// transitions, logging each one, until `lost` resolves (the connection's
/// `on_error` callback fired). lapin does not expose a blocked/unblocked
/// callback, only the `blocked()` flag on [`lapin::ConnectionStatus`], so
/// this is the only way to surface §4.4's relay.
async fn watch_blocked_state(connection: &Connection, lost: impl std::future::Future<Output = ()>) {
    const POLL_INTERVAL: Duration = Duration::from_millis(200);

    tokio::pin!(lost);
    let mut interval = tokio::time::interval(POLL_INTERVAL);
    let mut blocked = connection.status().blocked();

    loop {
        tokio::select! {
            _ = &mut lost => break,
            _ = interval.tick() => {
                let now_blocked = connection.status().blocked();
                if now_blocked && !blocked {
                    tracing::warn!("broker signalled connection blocked (flow control)");
                } else if !now_blocked && blocked {
                    tracing::info!("broker signalled connection unblocked");
                }
                blocked = now_blocked;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn new_worker_fails_fast_before_any_dial_succeeds() {
        let mut config = AmqpConfig::default();
        config.host = "127.0.0.1".to_string();
        config.port = "1".to_string(); // nothing listens on port 1
        config.retry = std::time::Duration::from_secs(3600);

        let client = BrokerClient::spawn(config);
        // Give the supervisor a moment to flip into Dialing and attempt
        // (and fail) its first connect.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let err = client.new_worker(1).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::BrokerUnavailable);
    }
}
