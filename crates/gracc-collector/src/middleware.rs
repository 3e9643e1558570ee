// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-request structured logging and stats accounting.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::{to_bytes, Body};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use crate::AppState;

/// Logs one structured record per request with the exact field set from
/// §7: `address, length, agent, url_path, response, response-code, error,
/// response-time`. Also drives the `Requests`/`RequestErrors` counters,
/// since both are a function of the same final status code this layer
/// already observes.
pub async fn request_logger(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let path = req.uri().path().to_owned();
    let agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let length = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);

    let resp = next.run(req).await;
    let status = resp.status();
    let response_time_ms = start.elapsed().as_millis() as u64;

    let (parts, body) = resp.into_parts();
    let bytes = to_bytes(body, usize::MAX).await.unwrap_or_default();
    let response_text = String::from_utf8_lossy(&bytes).into_owned();

    state.stats.request_seen();
    if status.is_success() {
        tracing::info!(
            address = %addr,
            length,
            agent = %agent,
            url_path = %path,
            response = %response_text,
            "response-code" = status.as_u16(),
            error = "",
            "response-time" = response_time_ms,
            "request completed"
        );
    } else {
        state.stats.request_error();
        tracing::warn!(
            address = %addr,
            length,
            agent = %agent,
            url_path = %path,
            response = %response_text,
            "response-code" = status.as_u16(),
            error = %response_text,
            "response-time" = response_time_ms,
            "request failed"
        );
    }

    Response::from_parts(parts, Body::from(bytes))
}
