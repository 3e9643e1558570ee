// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end dispatcher scenarios exercised against an in-process
//! `axum::Router`, with the broker side faked by an in-memory double so
//! these run without a live AMQP connection.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use gracc_broker::{Broker, Worker};
use gracc_collector::{build_app, AppState, COLLECT_PATH};
use gracc_config::CollectorConfig;
use gracc_error::{ErrorCode, GraccError};
use gracc_record::RecordRef;
use gracc_stats::Stats;

/// Per-publish confirmation a [`FakeWorker`] should report back when
/// [`Worker::wait`] is called, in the order the publishes happened.
#[derive(Clone, Copy, Debug)]
enum Confirm {
    Ack,
    Nack,
    Returned,
}

/// A broker double handing out [`FakeWorker`]s, so a test can drive exactly
/// the confirm-gating and return-demotion paths without a live broker.
struct FakeBroker {
    confirms: Vec<Confirm>,
    unavailable: bool,
}

impl FakeBroker {
    fn acking() -> Self {
        Self { confirms: Vec::new(), unavailable: false }
    }

    fn with_confirms(confirms: Vec<Confirm>) -> Self {
        Self { confirms, unavailable: false }
    }

    fn unavailable() -> Self {
        Self { confirms: Vec::new(), unavailable: true }
    }
}

#[async_trait]
impl Broker for FakeBroker {
    async fn new_worker(&self, _expected_count: usize) -> Result<Box<dyn Worker>, GraccError> {
        if self.unavailable {
            return Err(GraccError::new(
                ErrorCode::BrokerUnavailable,
                "fake broker refused the request",
            ));
        }
        Ok(Box::new(FakeWorker { confirms: self.confirms.clone(), published: 0 }))
    }
}

struct FakeWorker {
    confirms: Vec<Confirm>,
    published: usize,
}

#[async_trait]
impl Worker for FakeWorker {
    async fn publish_record(&mut self, _record: RecordRef<'_>) -> Result<(), GraccError> {
        self.published += 1;
        Ok(())
    }

    async fn wait(&mut self, _timeout: Duration) -> Result<(), GraccError> {
        for confirm in self.confirms.iter().take(self.published) {
            match confirm {
                Confirm::Ack => {}
                Confirm::Nack => {
                    return Err(GraccError::new(
                        ErrorCode::MessageNacked,
                        "fake broker nacked a published record",
                    ));
                }
                Confirm::Returned => {
                    return Err(GraccError::new(
                        ErrorCode::MessageReturned,
                        "fake broker returned a published record as unroutable",
                    ));
                }
            }
        }
        Ok(())
    }

    async fn close(self: Box<Self>) {}
}

fn state_with(broker: FakeBroker) -> Arc<AppState> {
    Arc::new(AppState {
        broker: Arc::new(broker),
        stats: Arc::new(Stats::new()),
        config: CollectorConfig::default(),
    })
}

fn post(body: &'static str) -> Request<Body> {
    let mut req = Request::builder()
        .method("POST")
        .uri(COLLECT_PATH)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap();
    let addr: SocketAddr = "127.0.0.1:9999".parse().unwrap();
    req.extensions_mut().insert(ConnectInfo(addr));
    req
}

/// E1 — the `xxx` ping fast path returns 200 without ever touching the
/// broker; a broker configured to refuse every request still succeeds.
#[tokio::test]
async fn e1_ping_succeeds_without_contacting_broker() {
    let app = build_app(state_with(FakeBroker::unavailable()));
    let resp = app
        .oneshot(post("command=update&arg1=xxx&from=probe&bundlesize=1"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

/// E2 — a single-record `update` bundle whose declared bundlesize matches
/// the parsed record count, fully acked, succeeds end to end.
#[tokio::test]
async fn e2_single_record_update_succeeds() {
    let app = build_app(state_with(FakeBroker::acking()));
    let body = "command=update&arg1=replication|<JobUsageRecord><RecordIdentity recordId=\"j-1\"/></JobUsageRecord>|raw|extra|&from=probe&bundlesize=1";
    let resp = app.oneshot(post(body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

/// E3 — a declared bundlesize that disagrees with the parsed record count
/// is rejected before any broker interaction.
#[tokio::test]
async fn e3_size_mismatch_is_bad_request() {
    let app = build_app(state_with(FakeBroker::unavailable()));
    let body = "command=update&arg1=replication|<JobUsageRecord><RecordIdentity recordId=\"j-1\"/></JobUsageRecord>|raw|extra|&from=probe&bundlesize=2";
    let resp = app.oneshot(post(body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

/// E5 — a `multiupdate` envelope containing two known records, both
/// acked, succeeds; `bundlesize` is omitted since it is optional for
/// `multiupdate`.
#[tokio::test]
async fn e5_multiupdate_succeeds() {
    let app = build_app(state_with(FakeBroker::with_confirms(vec![Confirm::Ack, Confirm::Ack])));
    let body = "command=multiupdate&arg1=<RecordEnvelope>\
        <JobUsageRecord><RecordIdentity recordId=\"j-1\"/></JobUsageRecord>\
        <StorageElement><UniqueID>se-1</UniqueID></StorageElement>\
        </RecordEnvelope>&from=probe";
    let resp = app.oneshot(post(body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

/// E6 — an unrecognised record family inside a `multiupdate` envelope is
/// demoted to a counted-but-unpublished failure rather than aborting the
/// whole bundle; the one recognised record alongside it still publishes.
#[tokio::test]
async fn e6_unknown_record_is_demoted_not_fatal() {
    let app = build_app(state_with(FakeBroker::acking()));
    let body = "command=multiupdate&arg1=<RecordEnvelope>\
        <JobUsageRecord><RecordIdentity recordId=\"j-1\"/></JobUsageRecord>\
        <SomethingWeird/>\
        </RecordEnvelope>&from=probe";
    let resp = app.oneshot(post(body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

/// §8 confirm-gating property: if any publish in the bundle is nacked,
/// the whole request fails even though earlier publishes in the same
/// bundle were acked.
#[tokio::test]
async fn confirm_gating_one_nack_fails_whole_request() {
    let app = build_app(state_with(FakeBroker::with_confirms(vec![Confirm::Ack, Confirm::Nack])));
    let body = "command=multiupdate&arg1=<RecordEnvelope>\
        <JobUsageRecord><RecordIdentity recordId=\"j-1\"/></JobUsageRecord>\
        <JobUsageRecord><RecordIdentity recordId=\"j-2\"/></JobUsageRecord>\
        </RecordEnvelope>&from=probe";
    let resp = app.oneshot(post(body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

/// §8 return-demotion property: a message both acked and returned as
/// unroutable is treated as a failure, not a success.
#[tokio::test]
async fn return_demotion_overrides_ack() {
    let app = build_app(state_with(FakeBroker::with_confirms(vec![Confirm::Returned])));
    let body = "command=update&arg1=replication|<JobUsageRecord><RecordIdentity recordId=\"j-1\"/></JobUsageRecord>|raw|extra|&from=probe&bundlesize=1";
    let resp = app.oneshot(post(body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}
