//! Countdown overlay.
//!
//! The encoder draws the remaining time itself through a `drawtext`
//! expression evaluated per frame; [`render_hms`] is the same function in
//! Rust and is what the expression must agree with.

use std::time::Duration;

/// Remaining seconds as `HH:MM:SS`. Hours grow past two digits when needed.
pub fn render_hms(remaining_secs: u64) -> String {
    let hours = remaining_secs / 3600;
    let minutes = (remaining_secs % 3600) / 60;
    let seconds = remaining_secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Remaining seconds as `M:SS`.
pub fn render_ms(remaining_secs: u64) -> String {
    format!("{}:{:02}", remaining_secs / 60, remaining_secs % 60)
}

/// Display format of the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountdownStyle {
    /// `HH:MM:SS`, used on multi-hour live streams.
    #[default]
    Hours,
    /// `M:SS`, used on shorts.
    Minutes,
}

/// A countdown over a fixed total duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    total_secs: u64,
    style: CountdownStyle,
}

impl Countdown {
    pub fn new(total: Duration) -> Self {
        Self {
            total_secs: total.as_secs(),
            style: CountdownStyle::Hours,
        }
    }

    pub fn with_style(mut self, style: CountdownStyle) -> Self {
        self.style = style;
        self
    }

    pub fn total_secs(&self) -> u64 {
        self.total_secs
    }

    pub fn style(&self) -> CountdownStyle {
        self.style
    }

    /// Seconds left after `elapsed`, floored at zero.
    pub fn remaining_at(&self, elapsed: Duration) -> u64 {
        self.total_secs.saturating_sub(elapsed.as_secs())
    }

    /// Text the overlay shows after `elapsed`.
    pub fn render_at(&self, elapsed: Duration) -> String {
        let remaining = self.remaining_at(elapsed);
        match self.style {
            CountdownStyle::Hours => render_hms(remaining),
            CountdownStyle::Minutes => render_ms(remaining),
        }
    }

    /// Per-frame `drawtext` text expression, already escaped for a filter graph.
    pub fn drawtext_expr(&self) -> String {
        let d = self.total_secs;
        match self.style {
            CountdownStyle::Hours => format!(
                "%{{eif\\:({d}-t)/3600\\:d\\:2}}\\:%{{eif\\:(mod({d}-t,3600))/60\\:d\\:2}}\\:%{{eif\\:mod({d}-t,60)\\:d\\:2}}"
            ),
            CountdownStyle::Minutes => format!(
                "%{{eif\\:({d}-t)/60\\:d\\:1}}\\:%{{eif\\:mod({d}-t,60)\\:d\\:2}}"
            ),
        }
    }
}
