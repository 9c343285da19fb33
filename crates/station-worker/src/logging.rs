//! Structured cycle logging.
//!
//! Every line emitted through [`CycleLogger`] carries the cycle id and the
//! run mode so one cycle can be followed through the pipeline.

use tracing::{error, info, warn, Span};

use station_models::CycleId;

#[derive(Debug, Clone)]
pub struct CycleLogger {
    cycle_id: String,
    mode: String,
}

impl CycleLogger {
    pub fn new(cycle_id: &CycleId, mode: &str) -> Self {
        Self {
            cycle_id: cycle_id.to_string(),
            mode: mode.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(cycle_id = %self.cycle_id, mode = %self.mode, "Cycle started: {}", message);
    }

    pub fn log_progress(&self, message: &str) {
        info!(cycle_id = %self.cycle_id, mode = %self.mode, "Cycle progress: {}", message);
    }

    pub fn log_warning(&self, message: &str) {
        warn!(cycle_id = %self.cycle_id, mode = %self.mode, "Cycle warning: {}", message);
    }

    /// Failure line with the taxonomy name as its own field.
    pub fn log_error(&self, kind: &str, message: &str) {
        error!(
            cycle_id = %self.cycle_id,
            mode = %self.mode,
            error_kind = kind,
            "Cycle error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(cycle_id = %self.cycle_id, mode = %self.mode, "Cycle completed: {}", message);
    }

    /// Span wrapping a whole cycle.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("cycle", cycle_id = %self.cycle_id, mode = %self.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_lines_do_not_panic_without_subscriber() {
        let logger = CycleLogger::new(&CycleId::from_string("c-1"), "live");
        let _guard = logger.create_span().entered();
        logger.log_start("begin");
        logger.log_progress("halfway");
        logger.log_warning("slow upstream");
        logger.log_error("PublishError", "503");
        logger.log_completion("done");
    }
}
