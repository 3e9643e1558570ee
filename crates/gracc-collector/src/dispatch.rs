// SPDX-License-Identifier: MIT OR Apache-2.0
//! The `update`/`multiupdate` state machine from §4.6: classify the
//! command, parse the bundle, hand it to a fresh publishing worker, and
//! map the outcome to an HTTP response.

use std::sync::Arc;

use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use gracc_broker::{Broker, Worker};
use gracc_error::{ErrorCategory, ErrorCode, GraccError};
use gracc_record::{parse_envelope, parse_record, Bundle};

use crate::AppState;

/// The four form fields the probe submits, per §4.6 and §6.
#[derive(Debug, Deserialize)]
pub struct CollectForm {
    pub command: Option<String>,
    pub arg1: Option<String>,
    pub from: Option<String>,
    pub bundlesize: Option<String>,
}

/// `POST /<configured-path>` — the single HTTP ingress endpoint.
///
/// Enforces the end-to-end per-request deadline from §4.6/§5: the whole
/// dispatch — tokenizing, parsing, broker setup, and confirmation wait —
/// must complete within `config.timeout`, not just the confirmation wait
/// itself. On expiry the request surfaces as `AMQPError` (503) so the
/// probe retries the whole bundle.
pub async fn collect_handler(
    State(state): State<Arc<AppState>>,
    Form(form): Form<CollectForm>,
) -> Response {
    let timeout = state.config.timeout;
    let result = tokio::time::timeout(timeout, dispatch(&state, form)).await;
    match result {
        Ok(Ok(())) => (StatusCode::OK, "OK").into_response(),
        Ok(Err(err)) => error_response(&err),
        Err(_) => error_response(&GraccError::new(
            ErrorCode::ConfirmTimeout,
            "request did not complete within the configured deadline",
        )),
    }
}

fn error_response(err: &GraccError) -> Response {
    let status = match err.category() {
        ErrorCategory::Request | ErrorCategory::Record => StatusCode::BAD_REQUEST,
        ErrorCategory::Amqp => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.response_body()).into_response()
}

fn require(value: Option<String>, name: &str) -> Result<String, GraccError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(GraccError::new(
            ErrorCode::MissingField,
            format!("missing required field '{name}'"),
        )),
    }
}

async fn dispatch(state: &AppState, form: CollectForm) -> Result<(), GraccError> {
    let command = require(form.command, "command")?;
    match command.as_str() {
        "update" => handle_update(state, form).await,
        "multiupdate" => handle_multiupdate(state, form).await,
        other => Err(GraccError::new(
            ErrorCode::UnknownCommand,
            format!("unknown command '{other}'"),
        )),
    }
}

async fn handle_update(state: &AppState, form: CollectForm) -> Result<(), GraccError> {
    let arg1 = require(form.arg1, "arg1")?;
    require(form.from, "from")?;

    // Ping fast path: short-circuits before bundlesize is even parsed and
    // before any broker interaction.
    if arg1 == "xxx" {
        return Ok(());
    }

    let bundlesize = require(form.bundlesize, "bundlesize")?;
    let n: usize = bundlesize.parse().map_err(|_| {
        GraccError::new(
            ErrorCode::BadBundleSize,
            format!("bundlesize '{bundlesize}' is not an integer"),
        )
    })?;

    let groups = gracc_tokenizer::parse_bundle_payload(
        &arg1,
        state.config.start_buffer_size,
        state.config.max_buffer_size,
    )?;

    let mut bundle = Bundle::new();
    for group in &groups {
        bundle.add_record(parse_record(group.record_xml.as_bytes())?);
    }

    if bundle.record_count() != n {
        return Err(GraccError::new(
            ErrorCode::SizeMismatch,
            format!(
                "declared bundlesize {n} does not match parsed record count {}",
                bundle.record_count()
            ),
        )
        .with_context("declared", n)
        .with_context("parsed", bundle.record_count()));
    }

    publish_bundle(state, bundle).await
}

async fn handle_multiupdate(state: &AppState, form: CollectForm) -> Result<(), GraccError> {
    let arg1 = require(form.arg1, "arg1")?;
    require(form.from, "from")?;

    let bundle = parse_envelope(arg1.as_bytes())?;

    // `bundlesize` is optional for multiupdate; when present it must match.
    if let Some(raw) = form.bundlesize.filter(|s| !s.is_empty()) {
        let n: usize = raw.parse().map_err(|_| {
            GraccError::new(
                ErrorCode::BadBundleSize,
                format!("bundlesize '{raw}' is not an integer"),
            )
        })?;
        if bundle.record_count() != n {
            return Err(GraccError::new(
                ErrorCode::SizeMismatch,
                format!(
                    "declared bundlesize {n} does not match parsed record count {}",
                    bundle.record_count()
                ),
            )
            .with_context("declared", n)
            .with_context("parsed", bundle.record_count()));
        }
    }

    publish_bundle(state, bundle).await
}

/// `publishBundle` from §4.6: obtain a worker, stream every classifiable
/// record through it, wait for confirmations, and close the worker no
/// matter how the request ends — mirroring the source's `defer w.Close()`.
async fn publish_bundle(state: &AppState, bundle: Bundle) -> Result<(), GraccError> {
    let mut worker = state.broker.new_worker(bundle.record_count()).await?;

    let outcome: Result<(), GraccError> = async {
        for _ in &bundle.other_records {
            state.stats.record_seen();
            state.stats.record_error();
        }

        let mut published = 0usize;
        for record in bundle.records() {
            state.stats.record_seen();
            if let Err(err) = worker.publish_record(record).await {
                state.stats.record_error();
                return Err(err);
            }
            published += 1;
        }

        if published > 0 {
            worker.wait(state.config.timeout).await?;
        }
        Ok(())
    }
    .await;

    worker.close().await;
    outcome
}

/// `GET /stats`.
pub async fn stats_handler(
    State(state): State<Arc<AppState>>,
) -> axum::Json<gracc_stats::StatsSnapshot> {
    axum::Json(state.stats.snapshot())
}
