use foundation::{GeoExtent, GeoPoint};

/// Bounds for camera moves derived from data extents.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CameraPolicy {
    /// Altitude per meter of extent diagonal.
    pub altitude_factor: f64,
    pub min_altitude_m: f64,
    pub max_altitude_m: f64,
    pub duration_s: f64,
}

impl Default for CameraPolicy {
    fn default() -> Self {
        Self {
            altitude_factor: 1.6,
            min_altitude_m: 150_000.0,
            max_altitude_m: 20_000_000.0,
            duration_s: 2.0,
        }
    }
}

/// Destination of a "fly to extent" camera command.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CameraTarget {
    pub center: GeoPoint,
    pub altitude_m: f64,
    pub duration_s: f64,
}

impl CameraTarget {
    pub fn framing(extent: &GeoExtent, policy: &CameraPolicy) -> Self {
        let altitude = (extent.diagonal_m() * policy.altitude_factor)
            .clamp(policy.min_altitude_m, policy.max_altitude_m);
        Self {
            center: extent.center(),
            altitude_m: altitude,
            duration_s: policy.duration_s,
        }
    }
}
