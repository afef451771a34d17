//! Simulation run state machine.
//!
//! ```text
//! Idle ──start──▶ Connecting ──opened──▶ Running ──result──▶ Succeeded
//!   ▲                 │  │                  │  └──error───▶ Failed
//!   │                 │  └──────fail────────┼─────────────▶ Failed
//!   │                 └──────cancel─────────┴─────────────▶ Cancelled
//!   └─────────────────────────reset (from anywhere)
//! ```
//!
//! `start` is also accepted from the three terminal states.

use serde_json::Value;
use streaming::EventFrame;
use tracing::debug;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum RunStatus {
    #[default]
    Idle,
    Connecting,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl RunStatus {
    /// A run is in flight.
    pub fn is_active(&self) -> bool {
        matches!(self, RunStatus::Connecting | RunStatus::Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Succeeded | RunStatus::Failed | RunStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Idle => "idle",
            RunStatus::Connecting => "connecting",
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    /// `start` while a run is still in flight.
    AlreadyActive(RunStatus),
    /// The stream opened but no run was connecting.
    NotConnecting(RunStatus),
    /// `cancel`/`fail` without an active run.
    NotActive(RunStatus),
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionError::AlreadyActive(s) => write!(f, "cannot start: run is {s}"),
            TransitionError::NotConnecting(s) => {
                write!(f, "stream opened while run is {s}")
            }
            TransitionError::NotActive(s) => write!(f, "no active run (status {s})"),
        }
    }
}

impl std::error::Error for TransitionError {}

/// Effect of one frame on the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Progressed,
    /// Intermediate analysis stored.
    Analysed,
    /// Terminal result stored; the run is `Succeeded`.
    Succeeded,
    /// Backend error frame; the run is `Failed`.
    Failed,
    /// Counted, nothing else changed.
    Malformed,
    /// The run was not `Running`; the frame had no effect.
    Ignored,
}

impl Transition {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Transition::Succeeded | Transition::Failed)
    }
}

fn clamp_percent(raw: f64) -> f64 {
    if raw.is_nan() {
        return 0.0;
    }
    raw.clamp(0.0, 100.0)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationState {
    status: RunStatus,
    percent: f64,
    message: String,
    analysis: Option<Value>,
    result: Option<Value>,
    error: Option<String>,
    malformed: u64,
}

impl SimulationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn percent(&self) -> f64 {
        self.percent
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn analysis(&self) -> Option<&Value> {
        self.analysis.as_ref()
    }

    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Malformed frames seen during the current run.
    pub fn malformed(&self) -> u64 {
        self.malformed
    }

    fn clear_run_data(&mut self) {
        self.percent = 0.0;
        self.message.clear();
        self.analysis = None;
        self.result = None;
        self.error = None;
        self.malformed = 0;
    }

    pub fn start(&mut self) -> Result<(), TransitionError> {
        if self.status.is_active() {
            return Err(TransitionError::AlreadyActive(self.status));
        }
        self.clear_run_data();
        self.status = RunStatus::Connecting;
        Ok(())
    }

    pub fn stream_opened(&mut self) -> Result<(), TransitionError> {
        if self.status != RunStatus::Connecting {
            return Err(TransitionError::NotConnecting(self.status));
        }
        self.status = RunStatus::Running;
        Ok(())
    }

    /// Transport failure, or any other reason the run cannot finish.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        if !self.status.is_active() {
            return Err(TransitionError::NotActive(self.status));
        }
        self.status = RunStatus::Failed;
        self.error = Some(error.into());
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), TransitionError> {
        if !self.status.is_active() {
            return Err(TransitionError::NotActive(self.status));
        }
        self.status = RunStatus::Cancelled;
        Ok(())
    }

    /// Back to `Idle` with nothing stored.
    pub fn reset(&mut self) {
        self.clear_run_data();
        self.status = RunStatus::Idle;
    }

    pub fn apply(&mut self, frame: &EventFrame) -> Transition {
        if self.status != RunStatus::Running {
            debug!(status = %self.status, kind = frame.kind(), "frame outside a running run");
            return Transition::Ignored;
        }
        match frame {
            EventFrame::Progress(p) => {
                self.percent = clamp_percent(p.percent);
                self.message.clone_from(&p.message);
                Transition::Progressed
            }
            EventFrame::Analysis(a) => {
                if let Some(percent) = a.percent {
                    self.percent = clamp_percent(percent);
                }
                if let Some(message) = &a.message {
                    self.message.clone_from(message);
                }
                self.analysis = Some(a.payload.clone());
                Transition::Analysed
            }
            EventFrame::Result(r) => {
                self.status = RunStatus::Succeeded;
                self.percent = 100.0;
                self.result = Some(r.payload.clone());
                Transition::Succeeded
            }
            EventFrame::Error(e) => {
                self.status = RunStatus::Failed;
                self.error = Some(e.message.clone());
                Transition::Failed
            }
            EventFrame::Malformed(_) => {
                self.malformed += 1;
                Transition::Malformed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RunStatus, SimulationState, Transition, TransitionError};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use streaming::{
        AnalysisFrame, ErrorFrame, EventFrame, MalformedFrame, ProgressFrame, ResultFrame,
    };

    fn progress(percent: f64, message: &str) -> EventFrame {
        EventFrame::Progress(ProgressFrame {
            percent,
            message: message.to_string(),
        })
    }

    fn running() -> SimulationState {
        let mut s = SimulationState::new();
        s.start().expect("start");
        s.stream_opened().expect("open");
        s
    }

    #[test]
    fn percent_is_clamped() {
        let mut s = running();
        assert_eq!(s.apply(&progress(150.0, "over")), Transition::Progressed);
        assert_eq!(s.percent(), 100.0);
        s.apply(&progress(-5.0, "under"));
        assert_eq!(s.percent(), 0.0);
        assert_eq!(s.message(), "under");
        s.apply(&progress(f64::NAN, "nan"));
        assert_eq!(s.percent(), 0.0);
    }

    #[test]
    fn progress_may_regress_within_a_run() {
        let mut s = running();
        s.apply(&progress(60.0, "a"));
        s.apply(&progress(40.0, "b"));
        assert_eq!(s.percent(), 40.0);
    }

    #[test]
    fn result_forces_full_progress() {
        let mut s = running();
        s.apply(&progress(40.0, "x"));
        let t = s.apply(&EventFrame::Result(ResultFrame { payload: json!({}) }));
        assert_eq!(t, Transition::Succeeded);
        assert_eq!(s.status(), RunStatus::Succeeded);
        assert_eq!(s.percent(), 100.0);
        assert_eq!(s.result(), Some(&json!({})));
    }

    #[test]
    fn error_frame_fails_the_run() {
        let mut s = running();
        let t = s.apply(&EventFrame::Error(ErrorFrame {
            message: "model offline".to_string(),
        }));
        assert!(t.is_terminal());
        assert_eq!(s.status(), RunStatus::Failed);
        assert_eq!(s.error(), Some("model offline"));
    }

    #[test]
    fn malformed_frames_only_count() {
        let mut s = running();
        s.apply(&progress(30.0, "x"));
        let t = s.apply(&EventFrame::Malformed(MalformedFrame {
            raw_text: "{oops".to_string(),
            reason: "eof".to_string(),
        }));
        assert_eq!(t, Transition::Malformed);
        assert_eq!(s.status(), RunStatus::Running);
        assert_eq!(s.percent(), 30.0);
        assert_eq!(s.malformed(), 1);
    }

    #[test]
    fn analysis_updates_optional_fields() {
        let mut s = running();
        s.apply(&progress(20.0, "before"));
        s.apply(&EventFrame::Analysis(AnalysisFrame {
            percent: None,
            message: Some("analysing".to_string()),
            payload: json!({"mechanism": "cloud seeding"}),
        }));
        assert_eq!(s.percent(), 20.0);
        assert_eq!(s.message(), "analysing");
        assert_eq!(s.analysis(), Some(&json!({"mechanism": "cloud seeding"})));
        assert_eq!(s.status(), RunStatus::Running);
    }

    #[test]
    fn cancelled_run_ignores_frames() {
        let mut s = running();
        s.apply(&progress(10.0, "x"));
        s.cancel().expect("cancel");
        assert_eq!(s.apply(&progress(90.0, "late")), Transition::Ignored);
        assert_eq!(s.status(), RunStatus::Cancelled);
        assert_eq!(s.percent(), 10.0);
    }

    #[test]
    fn start_clears_previous_run() {
        let mut s = running();
        s.apply(&EventFrame::Error(ErrorFrame {
            message: "boom".to_string(),
        }));
        s.start().expect("restart");
        assert_eq!(s.status(), RunStatus::Connecting);
        assert_eq!(s.error(), None);
        assert_eq!(s.percent(), 0.0);
    }

    #[test]
    fn illegal_transitions_are_refused() {
        let mut s = SimulationState::new();
        assert_eq!(s.cancel(), Err(TransitionError::NotActive(RunStatus::Idle)));
        assert_eq!(
            s.stream_opened(),
            Err(TransitionError::NotConnecting(RunStatus::Idle))
        );
        s.start().expect("start");
        assert_eq!(
            s.start(),
            Err(TransitionError::AlreadyActive(RunStatus::Connecting))
        );
        s.fail("refused").expect("fail while connecting");
        assert_eq!(s.status(), RunStatus::Failed);
        assert!(s.fail("again").is_err());
    }

    #[test]
    fn reset_returns_to_idle() {
        let mut s = running();
        s.apply(&EventFrame::Result(ResultFrame { payload: json!({"a": 1}) }));
        s.reset();
        assert_eq!(s, SimulationState::new());
    }
}
