// SPDX-License-Identifier: MIT OR Apache-2.0
//! Monotonic request/record counters exposed at `GET /stats`.
//!
//! Four `u64` counters track records seen, record-level errors, requests
//! served, and request-level errors. Updates use `Ordering::Relaxed` — the
//! counters are diagnostic, not used for any correctness decision, so no
//! cross-counter consistency is required between an increment and a
//! subsequent snapshot read.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for the collector process.
#[derive(Debug, Default)]
pub struct Stats {
    records: AtomicU64,
    record_errors: AtomicU64,
    requests: AtomicU64,
    request_errors: AtomicU64,
}

/// Point-in-time snapshot of [`Stats`], serialised at `GET /stats`.
///
/// Field names serialise in `PascalCase` (`Records`, `RecordErrors`, …) to
/// match the JSON shape expected at the stats endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatsSnapshot {
    /// Total records observed (including unclassified ones).
    pub records: u64,
    /// Records that failed to parse, classify, or publish.
    pub record_errors: u64,
    /// Total HTTP requests served.
    pub requests: u64,
    /// Requests that ended in a non-2xx response.
    pub request_errors: u64,
}

impl Stats {
    /// Construct a fresh, zeroed counter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the records counter by one.
    pub fn record_seen(&self) {
        self.records.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the record-errors counter by one.
    pub fn record_error(&self) {
        self.record_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the requests counter by one.
    pub fn request_seen(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the request-errors counter by one.
    pub fn request_error(&self) {
        self.request_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a consistent-enough point-in-time snapshot of all four counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            records: self.records.load(Ordering::Relaxed),
            record_errors: self.record_errors.load(Ordering::Relaxed),
            requests: self.requests.load(Ordering::Relaxed),
            request_errors: self.request_errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        let s = Stats::new();
        assert_eq!(
            s.snapshot(),
            StatsSnapshot {
                records: 0,
                record_errors: 0,
                requests: 0,
                request_errors: 0,
            }
        );
    }

    #[test]
    fn increments_independently() {
        let s = Stats::new();
        s.record_seen();
        s.record_seen();
        s.record_error();
        s.request_seen();
        s.request_error();
        let snap = s.snapshot();
        assert_eq!(snap.records, 2);
        assert_eq!(snap.record_errors, 1);
        assert_eq!(snap.requests, 1);
        assert_eq!(snap.request_errors, 1);
    }

    #[test]
    fn snapshot_serialises_with_pascal_case_keys() {
        let s = Stats::new();
        s.record_seen();
        s.request_error();
        let json = serde_json::to_value(s.snapshot()).unwrap();
        assert_eq!(json["Records"], serde_json::json!(1));
        assert_eq!(json["RecordErrors"], serde_json::json!(0));
        assert_eq!(json["Requests"], serde_json::json!(0));
        assert_eq!(json["RequestErrors"], serde_json::json!(1));
    }

    #[test]
    fn concurrent_increments_are_all_counted() {
        use std::sync::Arc;
        use std::thread;

        let stats = Arc::new(Stats::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let s = Arc::clone(&stats);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    s.record_seen();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(stats.snapshot().records, 8000);
    }
}
