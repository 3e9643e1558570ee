// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-request publishing worker: one channel, confirm mode, every
//! published record either acknowledged or surfaced as a failure before
//! the request responds.

use std::time::Duration;

use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, ConfirmSelectOptions, ExchangeDeclareOptions};
use lapin::publisher_confirm::{Confirmation, PublisherConfirm};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ExchangeKind};

use gracc_config::{AmqpConfig, RecordFormat};
use gracc_error::{ErrorCode, GraccError};
use gracc_record::RecordRef;

use crate::traits::Worker;

fn exchange_kind(name: &str) -> ExchangeKind {
    match name {
        "direct" => ExchangeKind::Direct,
        "fanout" => ExchangeKind::Fanout,
        "topic" => ExchangeKind::Topic,
        "headers" => ExchangeKind::Headers,
        other => ExchangeKind::Custom(other.to_string()),
    }
}

/// Serialize a record per the configured publish format, returning the
/// body and the `content-type` to publish it with.
fn serialize(record: RecordRef<'_>, format: RecordFormat) -> (Vec<u8>, &'static str) {
    match format {
        RecordFormat::Raw => (record.raw().to_vec(), "application/xml"),
        RecordFormat::Xml => (record.to_xml().into_bytes(), "application/xml"),
        RecordFormat::Json => (
            serde_json::to_vec(&record.to_json()).unwrap_or_default(),
            "application/json",
        ),
    }
}

/// A request-scoped publishing channel, already set up for confirm-mode
/// publishing against the configured exchange.
pub struct PublishingWorker {
    channel: Channel,
    exchange: String,
    routing_key: String,
    format: RecordFormat,
    max_wait: Duration,
    pending: Vec<PublisherConfirm>,
}

impl PublishingWorker {
    /// Run the §4.5 setup sequence: open a channel, enter confirm mode,
    /// declare the exchange. Returns are handled where confirms are awaited
    /// (see [`wait_all`]), rather than through a separate listener. Any step
    /// failing surfaces as [`ErrorCode::BrokerSetupFailed`].
    pub async fn open(
        connection: &Connection,
        config: &AmqpConfig,
        expected_count: usize,
    ) -> Result<Self, GraccError> {
        let channel = connection.create_channel().await.map_err(|e| {
            GraccError::new(ErrorCode::BrokerSetupFailed, "failed to open channel").with_source(e)
        })?;

        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| {
                GraccError::new(ErrorCode::BrokerSetupFailed, "failed to enter confirm mode")
                    .with_source(e)
            })?;

        // Returns are not registered as a separate listener here: lapin
        // surfaces an unroutable mandatory publish as `Confirmation::
        // Ack(Some(BasicReturnMessage))` on the same confirm this worker
        // already awaits in `wait_all` below, which is where the §4.5 step 3
        // return-demotion is implemented.

        channel
            .exchange_declare(
                &config.exchange,
                exchange_kind(&config.exchange_type),
                ExchangeDeclareOptions {
                    passive: false,
                    durable: config.durable,
                    auto_delete: config.auto_delete,
                    internal: config.internal,
                    nowait: false,
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                GraccError::new(ErrorCode::BrokerSetupFailed, "failed to declare exchange")
                    .with_source(e)
                    .with_context("exchange", config.exchange.clone())
            })?;

        Ok(Self {
            channel,
            exchange: config.exchange.clone(),
            routing_key: config.routing_key.clone(),
            format: config.format,
            max_wait: config.max_retry,
            pending: Vec::with_capacity(expected_count),
        })
    }
}

#[async_trait]
impl Worker for PublishingWorker {
    /// Publish one record, mandatory and persistent, per the configured
    /// format. Does not wait for its confirmation — that happens in
    /// [`Self::wait`], so multiple publishes on this channel pipeline.
    async fn publish_record(&mut self, record: RecordRef<'_>) -> Result<(), GraccError> {
        let (payload, content_type) = serialize(record, self.format);
        let properties = BasicProperties::default()
            .with_delivery_mode(2) // persistent
            .with_content_type(content_type.into());

        let confirm = self
            .channel
            .basic_publish(
                &self.exchange,
                &self.routing_key,
                BasicPublishOptions {
                    mandatory: true,
                    immediate: false,
                },
                &payload,
                properties,
            )
            .await
            .map_err(|e| {
                GraccError::new(ErrorCode::PublishFailed, "basic.publish failed")
                    .with_source(e)
                    .with_context("record_id", record.id())
            })?;

        self.pending.push(confirm);
        Ok(())
    }

    /// Wait for every publish made on this worker to be acknowledged, or
    /// fail as soon as any is nacked or returned, or once `timeout`
    /// elapses — whichever happens first.
    ///
    /// A message that is both acked and returned (AMQP permits both for
    /// the same publish) is treated as a failure: the routing guarantee
    /// was not met, and that overrides the ack.
    async fn wait(&mut self, timeout: Duration) -> Result<(), GraccError> {
        let deadline = timeout.min(self.max_wait);
        let pending = std::mem::take(&mut self.pending);
        match tokio::time::timeout(deadline, wait_all(pending)).await {
            Ok(result) => result,
            Err(_) => Err(GraccError::new(
                ErrorCode::ConfirmTimeout,
                "timed out waiting for broker confirmations",
            )),
        }
    }

    /// Close the channel. Errors are logged, not propagated — the request
    /// outcome was already decided by [`Self::wait`].
    async fn close(self: Box<Self>) {
        if let Err(err) = self.channel.close(200, "ok").await {
            tracing::warn!(error = %err, "failed to close publishing channel cleanly");
        }
    }
}

async fn wait_all(pending: Vec<PublisherConfirm>) -> Result<(), GraccError> {
    for confirm in pending {
        match confirm.await {
            Ok(Confirmation::Ack(None)) => {}
            Ok(Confirmation::Ack(Some(_))) => {
                return Err(GraccError::new(
                    ErrorCode::MessageReturned,
                    "message was acked but also returned as unroutable",
                ));
            }
            Ok(Confirmation::Nack(_)) => {
                return Err(GraccError::new(
                    ErrorCode::MessageNacked,
                    "broker nacked a published record",
                ));
            }
            Ok(Confirmation::NotRequested) => {
                return Err(GraccError::new(
                    ErrorCode::Internal,
                    "received a confirmation on a channel not in confirm mode",
                ));
            }
            Err(err) => {
                return Err(
                    GraccError::new(ErrorCode::PublishFailed, "error awaiting confirmation")
                        .with_source(err),
                );
            }
        }
    }
    Ok(())
}
