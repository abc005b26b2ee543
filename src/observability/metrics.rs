//! Metrics collection.
//!
//! # Metrics
//! - `requester_leases_total` (counter): lease outcomes by route, outcome
//! - `requester_pool_leased` / `_available` / `_pending` (gauges)
//! - `requester_connections_total` (counter): opened/closed by route
//! - `requester_exchange_duration_seconds` (histogram): by route, status
//! - `requester_failures_total` (counter): by kind
//! - `requester_events_dropped_total` (counter): channel listener overflow
//!
//! # Design Decisions
//! - Emitted through the `metrics` facade; installing an exporter is the host's job
//! - Route labels use the `scheme://host:port` form

use std::time::Instant;

use crate::pool::{PoolStats, Route};

pub fn record_lease(route: &Route, outcome: &'static str) {
    ::metrics::counter!(
        "requester_leases_total",
        "route" => route.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_pool_stats(stats: &PoolStats) {
    ::metrics::gauge!("requester_pool_leased").set(stats.leased as f64);
    ::metrics::gauge!("requester_pool_available").set(stats.available as f64);
    ::metrics::gauge!("requester_pool_pending").set(stats.pending as f64);
}

pub fn record_connection(route: &Route, event: &'static str) {
    ::metrics::counter!(
        "requester_connections_total",
        "route" => route.to_string(),
        "event" => event
    )
    .increment(1);
}

pub fn record_exchange(route: &Route, status: u16, start: Instant) {
    ::metrics::histogram!(
        "requester_exchange_duration_seconds",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_failure(kind: &'static str) {
    ::metrics::counter!("requester_failures_total", "kind" => kind).increment(1);
}

pub fn record_dropped_event() {
    ::metrics::counter!("requester_events_dropped_total").increment(1);
}
