//! Orchestrator metrics.

use metrics::counter;

pub mod names {
    pub const CYCLES_TOTAL: &str = "station_cycles_total";
    pub const CYCLE_PHASE_FAILURES_TOTAL: &str = "station_cycle_phase_failures_total";
    pub const GENERATION_FALLBACKS_TOTAL: &str = "station_generation_fallbacks_total";
    pub const CHANNEL_ROTATIONS_TOTAL: &str = "station_channel_rotations_total";
}

/// `outcome` is `finished` or `error`.
pub fn record_cycle(mode: &str, outcome: &'static str) {
    counter!(names::CYCLES_TOTAL, "mode" => mode.to_string(), "outcome" => outcome).increment(1);
}

pub fn record_phase_failure(phase: &'static str, kind: &'static str) {
    counter!(names::CYCLE_PHASE_FAILURES_TOTAL, "phase" => phase, "kind" => kind).increment(1);
}

pub fn record_fallback(mode: &str) {
    counter!(names::GENERATION_FALLBACKS_TOTAL, "mode" => mode.to_string()).increment(1);
}

pub fn record_rotation(slot: &str) {
    counter!(names::CHANNEL_ROTATIONS_TOTAL, "slot" => slot.to_string()).increment(1);
}
