// SPDX-License-Identifier: MIT OR Apache-2.0
//! HTTP ingress for the grid accounting record collector: the `update`/
//! `multiupdate` dispatcher (§4.6), the `/stats` endpoint (§4.7), and the
//! per-request structured logging layer (§7).

#![deny(unsafe_code)]

mod dispatch;
mod middleware;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use gracc_broker::Broker;
use gracc_config::CollectorConfig;
use gracc_stats::Stats;

pub use dispatch::CollectForm;

/// Historical ingress path the legacy probe replication protocol submits
/// to; not a `gracc-config` value since §6 does not list a configurable
/// path among the recognised config values.
pub const COLLECT_PATH: &str = "/gratia-servlets/rmi";

/// Shared state handed to every request handler.
///
/// `broker` is a trait object rather than the concrete `gracc_broker::
/// BrokerClient` so integration tests can substitute an in-memory double
/// and exercise the §8 confirm-gating/return-demotion/multiupdate
/// scenarios without a live AMQP broker.
pub struct AppState {
    pub broker: Arc<dyn Broker>,
    pub stats: Arc<Stats>,
    pub config: CollectorConfig,
}

/// Build the Axum router: the ingress POST route, the stats GET route, and
/// the request-logging layer wrapping both.
pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route(COLLECT_PATH, post(dispatch::collect_handler))
        .route("/stats", get(dispatch::stats_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::request_logger,
        ))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::{Request, StatusCode};
    use gracc_broker::BrokerClient;
    use gracc_config::AmqpConfig;
    use std::net::SocketAddr;
    use tower::ServiceExt;

    fn test_state() -> Arc<AppState> {
        let mut amqp = AmqpConfig::default();
        amqp.host = "127.0.0.1".to_string();
        amqp.port = "1".to_string();
        Arc::new(AppState {
            broker: Arc::new(BrokerClient::spawn(amqp)),
            stats: Arc::new(Stats::new()),
            config: CollectorConfig::default(),
        })
    }

    fn with_peer(mut req: Request<Body>) -> Request<Body> {
        let addr: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        req
    }

    #[tokio::test]
    async fn unknown_command_is_bad_request() {
        let app = build_app(test_state());
        let req = with_peer(
            Request::builder()
                .method("POST")
                .uri(COLLECT_PATH)
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from("command=bogus&arg1=x&from=probe&bundlesize=1"))
                .unwrap(),
        );
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn ping_fast_path_returns_ok_without_broker() {
        let app = build_app(test_state());
        let req = with_peer(
            Request::builder()
                .method("POST")
                .uri(COLLECT_PATH)
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from("command=update&arg1=xxx&from=probe&bundlesize=1"))
                .unwrap(),
        );
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_command_is_bad_request() {
        let app = build_app(test_state());
        let req = with_peer(
            Request::builder()
                .method("POST")
                .uri(COLLECT_PATH)
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from("arg1=x&from=probe"))
                .unwrap(),
        );
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn broker_unavailable_surfaces_as_service_unavailable() {
        let app = build_app(test_state());
        let req = with_peer(
            Request::builder()
                .method("POST")
                .uri(COLLECT_PATH)
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from(
                    "command=update&arg1=replication|<JobUsageRecord><RecordIdentity recordId=\"j-1\"/></JobUsageRecord>|raw|extra|&from=probe&bundlesize=1",
                ))
                .unwrap(),
        );
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn stats_endpoint_returns_json() {
        let app = build_app(test_state());
        let req = with_peer(
            Request::builder()
                .method("GET")
                .uri("/stats")
                .body(Body::empty())
                .unwrap(),
        );
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
