use layers::Emphasis;
use runtime::Generation;
use serde_json::Value;
use uuid::Uuid;

use crate::state::RunStatus;

/// Identifier of one run, created by `run()`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Immutable view of the controller state, republished after every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    /// `None` until the first run, and again after a reset.
    pub session_id: Option<SessionId>,
    pub generation: Generation,
    pub status: RunStatus,
    pub percent: f64,
    pub message: String,
    pub analysis: Option<Value>,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub malformed_frames: u64,
    pub baseline_entities: Option<usize>,
    pub mitigation_entities: Option<usize>,
    pub baseline_emphasis: Emphasis,
}

impl SessionSnapshot {
    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}
