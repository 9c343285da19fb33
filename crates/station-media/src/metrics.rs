//! Encoder metrics.

use metrics::counter;

pub mod names {
    pub const FFMPEG_STARTS_TOTAL: &str = "station_ffmpeg_starts_total";
    pub const FFMPEG_EXITS_TOTAL: &str = "station_ffmpeg_exits_total";
    pub const FFMPEG_STDERR_ALERTS_TOTAL: &str = "station_ffmpeg_stderr_alerts_total";
    pub const FFMPEG_RESTARTS_TOTAL: &str = "station_ffmpeg_restarts_total";
}

pub fn record_encoder_start(slot: &str) {
    counter!(names::FFMPEG_STARTS_TOTAL, "slot" => slot.to_string()).increment(1);
}

pub fn record_encoder_exit(slot: &str, outcome: &'static str) {
    counter!(names::FFMPEG_EXITS_TOTAL, "slot" => slot.to_string(), "outcome" => outcome)
        .increment(1);
}

pub fn record_stderr_alert(slot: &str) {
    counter!(names::FFMPEG_STDERR_ALERTS_TOTAL, "slot" => slot.to_string()).increment(1);
}

pub fn record_restart(slot: &str) {
    counter!(names::FFMPEG_RESTARTS_TOTAL, "slot" => slot.to_string()).increment(1);
}
