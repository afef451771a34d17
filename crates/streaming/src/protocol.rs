//! Wire format of the simulation stream.
//!
//! The request is a single JSON object. The response body is newline-delimited
//! JSON: one object per line, discriminated by its `status` member. Anything
//! beyond the discriminator and the handful of fields the client reads is
//! passed through as opaque JSON.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::frame::{AnalysisFrame, ErrorFrame, EventFrame, ProgressFrame, ResultFrame};

/// Body of the outbound request that starts one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRequest {
    /// Free-text intervention strategy.
    pub user_input: String,
    /// Budget allocated to the strategy, in the backend's currency unit.
    pub investment: f64,
}

impl SimulationRequest {
    pub fn new(user_input: impl Into<String>, investment: f64) -> Self {
        Self {
            user_input: user_input.into(),
            investment,
        }
    }
}

/// One line of the response body as the backend writes it.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub(crate) enum WireFrame {
    Progress {
        #[serde(default)]
        progress: f64,
        #[serde(default)]
        message: String,
    },
    OracleAnalysis {
        data: Value,
        #[serde(default)]
        progress: Option<f64>,
        #[serde(default)]
        message: Option<String>,
    },
    #[serde(alias = "success", alias = "analysis")]
    Complete(Map<String, Value>),
    Error {
        #[serde(default = "default_error_message", alias = "detail")]
        message: String,
    },
}

fn default_error_message() -> String {
    "simulation failed".to_string()
}

impl From<WireFrame> for EventFrame {
    fn from(wire: WireFrame) -> Self {
        match wire {
            WireFrame::Progress { progress, message } => EventFrame::Progress(ProgressFrame {
                percent: progress,
                message,
            }),
            WireFrame::OracleAnalysis {
                data,
                progress,
                message,
            } => EventFrame::Analysis(AnalysisFrame {
                percent: progress,
                message,
                payload: data,
            }),
            WireFrame::Complete(mut body) => {
                // Backends either nest the result or put it at the top level.
                let payload = body.remove("result").unwrap_or(Value::Object(body));
                EventFrame::Result(ResultFrame { payload })
            }
            WireFrame::Error { message } => EventFrame::Error(ErrorFrame { message }),
        }
    }
}
