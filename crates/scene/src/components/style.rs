#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TrackStyle {
    /// Linear RGBA.
    pub color: [f32; 4],
    pub width_px: f32,
}

impl TrackStyle {
    pub const fn new(color: [f32; 4], width_px: f32) -> Self {
        Self { color, width_px }
    }

    /// Same hue with alpha and width scaled down.
    pub fn receded(self, alpha_factor: f32, width_factor: f32) -> Self {
        let [r, g, b, a] = self.color;
        Self {
            color: [r, g, b, (a * alpha_factor).clamp(0.0, 1.0)],
            width_px: (self.width_px * width_factor).max(0.5),
        }
    }
}

impl Default for TrackStyle {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0, 1.0],
            width_px: 1.0,
        }
    }
}
