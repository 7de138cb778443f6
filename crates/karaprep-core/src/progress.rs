//! Phase-scaled, monotonic job progress.
//!
//! A job runs through a fixed sequence of named phases, each owning a slice
//! of the global 0–100 range. The subordinate process only ever reports a
//! percentage local to its current unit of work; the tracker maps that onto
//! the active phase's slice and guarantees the absolute value never moves
//! backwards, even across phase boundaries.

use crate::status::{StatusEvent, StatusSink};
use std::sync::Mutex;

/// A named sub-interval of the overall job mapped onto `[start, end]` of the
/// global progress range.
#[derive(Debug, Clone)]
pub struct Phase {
    pub name: String,
    pub start_percent: f64,
    pub end_percent: f64,
}

impl Phase {
    /// Caller contract: `0 <= start <= end <= 100`. Fails fast in debug
    /// builds; release builds clamp the bounds into range.
    pub fn new(name: impl Into<String>, start_percent: f64, end_percent: f64) -> Self {
        debug_assert!(
            (0.0..=100.0).contains(&start_percent)
                && (0.0..=100.0).contains(&end_percent)
                && start_percent <= end_percent,
            "malformed phase bounds: [{start_percent}, {end_percent}]"
        );
        let start_percent = start_percent.clamp(0.0, 100.0);
        let end_percent = end_percent.clamp(start_percent, 100.0);
        Self {
            name: name.into(),
            start_percent,
            end_percent,
        }
    }

    /// Multiplier from a local percent to the phase's share of the global range.
    fn scale(&self) -> f64 {
        (self.end_percent - self.start_percent) / 100.0
    }
}

struct ProgressState {
    current_percent: f64,
    phase: Phase,
}

/// Owner of the authoritative absolute progress value for one job.
///
/// `set_phase` is called by the job-driving thread, `report_local_percent`
/// by whichever thread scans the subordinate's output; one lock covers the
/// whole state so the offset/scale pair is always read as one snapshot and
/// at most one event is emitted per logical change.
pub struct PhaseTracker {
    state: Mutex<ProgressState>,
    sink: StatusSink,
}

impl PhaseTracker {
    /// New tracker at 0% with no phase active. Local reports before the first
    /// `set_phase` scale to nothing and are dropped.
    pub fn new(sink: StatusSink) -> Self {
        Self {
            state: Mutex::new(ProgressState {
                current_percent: 0.0,
                phase: Phase::new("", 0.0, 0.0),
            }),
            sink,
        }
    }

    /// Activate a phase. The absolute value is clamped upward to at least
    /// `start_percent` so a previous phase that under-reported can never make
    /// progress move backwards. Emits one `phase` event.
    pub fn set_phase(&self, name: &str, start_percent: f64, end_percent: f64) {
        let phase = Phase::new(name, start_percent, end_percent);
        let mut state = self.state.lock().unwrap();
        if state.current_percent < phase.start_percent {
            tracing::debug!(
                "phase {:?} clamps progress {:.1} -> {:.1}",
                name,
                state.current_percent,
                phase.start_percent
            );
            state.current_percent = phase.start_percent;
        }
        state.phase = phase;
        self.sink.emit(&StatusEvent::Phase {
            phase: name.to_string(),
            progress: state.current_percent as u32,
        });
    }

    /// Fold a subordinate-reported local percentage into the absolute value.
    /// Out-of-range input is clamped to `[0, 100]`. Emits one `progress`
    /// event if the absolute value advanced; non-increasing reports are
    /// silently dropped.
    pub fn report_local_percent(&self, percent: f64) {
        let percent = percent.clamp(0.0, 100.0);
        let mut state = self.state.lock().unwrap();
        let absolute = state.phase.start_percent + percent * state.phase.scale();
        if absolute > state.current_percent {
            state.current_percent = absolute;
            self.sink.emit(&StatusEvent::Progress {
                progress: absolute as u32,
            });
        }
    }

    /// Current absolute progress in `[0, 100]`.
    pub fn current_percent(&self) -> f64 {
        self.state.lock().unwrap().current_percent
    }
}
