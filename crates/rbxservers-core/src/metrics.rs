//! Metrics emitted by the page pipeline.
//!
//! Recorded through the `metrics` facade; they are no-ops until the host
//! process installs a recorder (the server installs a Prometheus one).

use metrics::{counter, gauge};

/// Metric names as constants for consistency.
pub mod names {
    // Page cache
    pub const PAGE_CACHE_HITS_TOTAL: &str = "page_cache_hits_total";
    pub const PAGE_CACHE_MISSES_TOTAL: &str = "page_cache_misses_total";
    pub const PAGE_CACHE_ENTRIES: &str = "page_cache_entries";

    // Coalescing
    pub const PAGE_FETCH_JOINED_TOTAL: &str = "page_fetch_joined_total";

    // Upstream
    pub const UPSTREAM_ATTEMPTS_TOTAL: &str = "upstream_attempts_total";
    pub const UPSTREAM_RETRIES_TOTAL: &str = "upstream_retries_total";

    // Warm loop
    pub const WARM_LOOP_TICKS_TOTAL: &str = "warm_loop_ticks_total";
}

fn page_label(first_page: bool) -> &'static str {
    if first_page { "first" } else { "cursor" }
}

pub fn record_cache_hit(first_page: bool) {
    counter!(names::PAGE_CACHE_HITS_TOTAL, "page" => page_label(first_page)).increment(1);
}

pub fn record_cache_miss(first_page: bool) {
    counter!(names::PAGE_CACHE_MISSES_TOTAL, "page" => page_label(first_page)).increment(1);
}

pub fn record_cache_entries(count: usize) {
    gauge!(names::PAGE_CACHE_ENTRIES).set(count as f64);
}

/// A caller attached to a fetch that was already in flight.
pub fn record_fetch_joined() {
    counter!(names::PAGE_FETCH_JOINED_TOTAL).increment(1);
}

/// Record one upstream attempt. `outcome` is `ok`, `transient` or `permanent`.
pub fn record_upstream_attempt(outcome: &'static str) {
    counter!(names::UPSTREAM_ATTEMPTS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_upstream_retry() {
    counter!(names::UPSTREAM_RETRIES_TOTAL).increment(1);
}

pub fn record_warm_tick(ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!(names::WARM_LOOP_TICKS_TOTAL, "outcome" => outcome).increment(1);
}
