//! Daemon metrics.
//!
//! # Metrics
//! - `yosai_requests_total` (counter): requests by target, method, status
//! - `yosai_request_duration_seconds` (histogram): dispatch latency
//! - `yosai_active_connections` (gauge): connections currently being served
//! - `yosai_key_resolutions_total` (counter): credential lookups by source
//! - `yosai_pool_free_addresses` (gauge): unassigned VPN addresses
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; with no recorder installed every
//!   call is a no-op
//! - Call sites use the helpers below rather than raw metric names

use std::time::Instant;

use metrics::{counter, gauge, histogram};

use crate::protocol::StatusCode;

pub const REQUESTS_TOTAL: &str = "yosai_requests_total";
pub const REQUEST_DURATION: &str = "yosai_request_duration_seconds";
pub const ACTIVE_CONNECTIONS: &str = "yosai_active_connections";
pub const KEY_RESOLUTIONS: &str = "yosai_key_resolutions_total";
pub const POOL_FREE: &str = "yosai_pool_free_addresses";

/// Record one dispatched request.
pub fn record_request(target: &str, method: &str, status: StatusCode, start: Instant) {
    let labels = [
        ("target", target.to_string()),
        ("method", method.to_string()),
        ("status", status.as_str().to_string()),
    ];
    counter!(REQUESTS_TOTAL, &labels).increment(1);
    histogram!(REQUEST_DURATION, &labels[..2]).record(start.elapsed().as_secs_f64());
}

pub fn record_active_connections(active: usize) {
    gauge!(ACTIVE_CONNECTIONS).set(active as f64);
}

/// `source` is `cache` or the label of the rung that resolved the key.
pub fn record_key_resolution(source: &str) {
    counter!(KEY_RESOLUTIONS, "source" => source.to_string()).increment(1);
}

pub fn record_pool_free(free: usize) {
    gauge!(POOL_FREE).set(free as f64);
}
