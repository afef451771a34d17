use std::path::Path;

use layers::Symbology;
use scene::CameraPolicy;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const ENV_ENDPOINT: &str = "ORACLE_ENDPOINT";
pub const ENV_BASELINE: &str = "ORACLE_BASELINE";
pub const ENV_INTENSITY_PROPERTY: &str = "ORACLE_INTENSITY_PROPERTY";
pub const ENV_DIM_ALPHA: &str = "ORACLE_DIM_ALPHA";
pub const ENV_FLY_SECONDS: &str = "ORACLE_FLY_SECONDS";

/// Camera framing for committed layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub altitude_factor: f64,
    pub min_altitude_m: f64,
    pub max_altitude_m: f64,
    pub fly_seconds: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        let policy = CameraPolicy::default();
        Self {
            altitude_factor: policy.altitude_factor,
            min_altitude_m: policy.min_altitude_m,
            max_altitude_m: policy.max_altitude_m,
            fly_seconds: policy.duration_s,
        }
    }
}

impl CameraConfig {
    pub fn policy(&self) -> CameraPolicy {
        CameraPolicy {
            altitude_factor: self.altitude_factor,
            min_altitude_m: self.min_altitude_m,
            max_altitude_m: self.max_altitude_m.max(self.min_altitude_m),
            duration_s: self.fly_seconds.max(0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Streaming simulation endpoint (POST).
    pub endpoint: String,
    /// Baseline geometry document, URL or path.
    pub baseline: Option<String>,
    pub symbology: Symbology,
    pub camera: CameraConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8001/api/simulate/stream".to_string(),
            baseline: None,
            symbology: Symbology::default(),
            camera: CameraConfig::default(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io { path: String, message: String },
    Json { path: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io { path, message } => write!(f, "read config {path}: {message}"),
            ConfigError::Json { path, message } => write!(f, "parse config {path}: {message}"),
        }
    }
}

impl std::error::Error for ConfigError {}

fn parsed<T: std::str::FromStr>(key: &str, raw: Option<String>) -> Option<T> {
    let raw = raw?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable setting");
            None
        }
    }
}

impl SessionConfig {
    /// Defaults, overlaid by the optional JSON file, overlaid by the
    /// environment.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match file {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| ConfigError::Json {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Applies `ORACLE_*` overrides read through `lookup`. Unparsable numbers
    /// are logged and skipped.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            self.endpoint = endpoint;
        }
        if let Some(baseline) = lookup(ENV_BASELINE) {
            self.baseline = (!baseline.trim().is_empty()).then_some(baseline);
        }
        if let Some(property) = lookup(ENV_INTENSITY_PROPERTY) {
            self.symbology.intensity_property = property;
        }
        if let Some(alpha) = parsed::<f32>(ENV_DIM_ALPHA, lookup(ENV_DIM_ALPHA)) {
            self.symbology.dim_alpha = alpha.clamp(0.0, 1.0);
        }
        if let Some(seconds) = parsed::<f64>(ENV_FLY_SECONDS, lookup(ENV_FLY_SECONDS)) {
            self.camera.fly_seconds = seconds;
        }
    }
}
