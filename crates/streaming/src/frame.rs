//! Decoded event frames.
//!
//! Frames are plain data: the decoder builds them once and nobody mutates them
//! afterwards. Behaviour lives in the session state machine.

use serde_json::Value;

use crate::protocol::WireFrame;

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressFrame {
    /// Raw percent as reported; clamping is the consumer's job.
    pub percent: f64,
    pub message: String,
}

/// Intermediate analysis published before the terminal result.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisFrame {
    pub percent: Option<f64>,
    pub message: Option<String>,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultFrame {
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorFrame {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MalformedFrame {
    pub raw_text: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventFrame {
    Progress(ProgressFrame),
    Analysis(AnalysisFrame),
    Result(ResultFrame),
    Error(ErrorFrame),
    Malformed(MalformedFrame),
}

impl EventFrame {
    /// Parses one complete line (without its line break).
    ///
    /// Returns `None` for blank lines. Lines that are not a known frame come
    /// back as [`EventFrame::Malformed`].
    pub fn parse_line(line: &str) -> Option<EventFrame> {
        let text = line.trim();
        if text.is_empty() {
            return None;
        }
        let value: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(err) => return Some(Self::malformed(line, err.to_string())),
        };
        // Internally tagged enums also accept sequences; frames must be objects.
        if !value.is_object() {
            return Some(Self::malformed(line, "frame is not a JSON object"));
        }
        let frame = match serde_json::from_value::<WireFrame>(value) {
            Ok(wire) => wire.into(),
            Err(err) => Self::malformed(line, err.to_string()),
        };
        Some(frame)
    }

    fn malformed(line: &str, reason: impl Into<String>) -> EventFrame {
        EventFrame::Malformed(MalformedFrame {
            raw_text: line.to_string(),
            reason: reason.into(),
        })
    }

    /// Result and error frames end a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventFrame::Result(_) | EventFrame::Error(_))
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, EventFrame::Malformed(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EventFrame::Progress(_) => "progress",
            EventFrame::Analysis(_) => "analysis",
            EventFrame::Result(_) => "result",
            EventFrame::Error(_) => "error",
            EventFrame::Malformed(_) => "malformed",
        }
    }
}
