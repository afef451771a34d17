use scene::TrackStyle;
use serde::{Deserialize, Serialize};

/// One intensity class: every value at or above `min` (up to the next band)
/// is drawn with this color and width.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntensityBand {
    pub min: f64,
    pub color: [f32; 4],
    pub width_px: f32,
}

impl IntensityBand {
    pub const fn new(min: f64, color: [f32; 4], width_px: f32) -> Self {
        Self {
            min,
            color,
            width_px,
        }
    }

    pub fn style(&self) -> TrackStyle {
        TrackStyle::new(self.color, self.width_px)
    }
}

/// Intensity classes plus the style used below the lowest band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntensityThresholds {
    pub bands: Vec<IntensityBand>,
    pub fallback_color: [f32; 4],
    pub fallback_width_px: f32,
}

impl Default for IntensityThresholds {
    /// Saffir–Simpson wind scale, knots.
    fn default() -> Self {
        Self {
            bands: vec![
                IntensityBand::new(34.0, [0.36, 0.80, 0.95, 1.0], 2.0),
                IntensityBand::new(64.0, [1.00, 0.93, 0.40, 1.0], 2.5),
                IntensityBand::new(83.0, [1.00, 0.73, 0.25, 1.0], 3.0),
                IntensityBand::new(96.0, [1.00, 0.45, 0.20, 1.0], 3.5),
                IntensityBand::new(113.0, [0.92, 0.16, 0.20, 1.0], 4.0),
                IntensityBand::new(137.0, [0.75, 0.25, 0.85, 1.0], 5.0),
            ],
            fallback_color: [0.55, 0.62, 0.75, 1.0],
            fallback_width_px: 1.5,
        }
    }
}

impl IntensityThresholds {
    pub fn fallback(&self) -> TrackStyle {
        TrackStyle::new(self.fallback_color, self.fallback_width_px)
    }

    /// Highest band whose `min` does not exceed `intensity`. Band order in
    /// `bands` does not matter.
    pub fn style_for(&self, intensity: f64) -> TrackStyle {
        if !intensity.is_finite() {
            return self.fallback();
        }
        self.bands
            .iter()
            .filter(|b| b.min <= intensity)
            .max_by(|a, b| a.min.total_cmp(&b.min))
            .map(IntensityBand::style)
            .unwrap_or_else(|| self.fallback())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Emphasis {
    #[default]
    Opaque,
    Dimmed,
}

impl Emphasis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Emphasis::Opaque => "opaque",
            Emphasis::Dimmed => "dimmed",
        }
    }
}

const DIMMED_WIDTH_FACTOR: f32 = 0.75;

/// Everything needed to turn track features into styled entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Symbology {
    /// Feature property holding the intensity value.
    pub intensity_property: String,
    pub thresholds: IntensityThresholds,
    /// Alpha multiplier for a dimmed layer.
    pub dim_alpha: f32,
}

impl Default for Symbology {
    fn default() -> Self {
        Self {
            intensity_property: "wind".to_string(),
            thresholds: IntensityThresholds::default(),
            dim_alpha: 0.35,
        }
    }
}

impl Symbology {
    pub fn style_for(&self, intensity: f64) -> TrackStyle {
        self.thresholds.style_for(intensity)
    }

    pub fn emphasized(&self, style: TrackStyle, emphasis: Emphasis) -> TrackStyle {
        match emphasis {
            Emphasis::Opaque => style,
            Emphasis::Dimmed => style.receded(self.dim_alpha, DIMMED_WIDTH_FACTOR),
        }
    }
}
