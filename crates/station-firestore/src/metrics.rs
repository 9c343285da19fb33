//! Cycle store request metrics.

use metrics::{counter, histogram};

pub mod names {
    /// Requests by client call (`upsert_document`, `run_query`) and HTTP status.
    pub const REQUESTS_TOTAL: &str = "station_cycle_store_requests_total";

    /// Retries by repository operation (`save_cycle`, `list_cycles`).
    pub const RETRIES_TOTAL: &str = "station_cycle_store_retries_total";

    pub const LATENCY_SECONDS: &str = "station_cycle_store_latency_seconds";
}

pub fn record_request(operation: &str, status: u16, latency_secs: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(names::LATENCY_SECONDS, "operation" => operation.to_string()).record(latency_secs);
}

pub fn record_retry(operation: &str) {
    counter!(names::RETRIES_TOTAL, "operation" => operation.to_string()).increment(1);
}
