//! Sensor normalizer
//!
//! Turns raw samples from the acquisition layer into the [`Environment`]
//! snapshot. Only two values are derived: motion intensity and the
//! brightness-cluster presence estimate. Everything else is copied through.

use andro_core::Environment;
use serde::{Deserialize, Serialize};

/// Pixels brighter than this count toward the presence cluster.
pub const BRIGHT_LUMA: u8 = 200;
/// More than this many bright pixels means someone is there.
pub const PRESENCE_MIN_PIXELS: usize = 30;

/// A downsampled single-channel luminance frame, row-major.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LumaFrame {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

impl LumaFrame {
    pub fn new(width: usize, height: usize, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Uniform frame, handy for tests and traces.
    pub fn filled(width: usize, height: usize, luma: u8) -> Self {
        Self::new(width, height, vec![luma; width * height])
    }
}

/// One raw sample as handed over by the acquisition layer. Missing readings
/// stay `None`/default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawSample {
    /// Linear acceleration without gravity, m/s², when the device offers it
    pub acceleration: Option<[f32; 3]>,
    /// Acceleration including gravity, used when linear acceleration is absent
    pub gravity: Option<[f32; 3]>,
    pub tilt_x: f32,
    pub tilt_y: f32,
    pub rotation: f32,
    pub loudness: f32,
    pub frame: Option<LumaFrame>,
    pub online: bool,
    pub power_level: Option<f32>,
}

impl Default for RawSample {
    fn default() -> Self {
        Self {
            acceleration: None,
            gravity: None,
            tilt_x: 0.0,
            tilt_y: 0.0,
            rotation: 0.0,
            loudness: 0.0,
            frame: None,
            online: true,
            power_level: None,
        }
    }
}

/// Result of scanning a luminance frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresenceEstimate {
    pub presence: bool,
    /// 0 (left) to 1 (right); 0.5 when nobody is seen
    pub position: f32,
    /// Mean luminance scaled to 0 - 1
    pub brightness: f32,
}

impl Default for PresenceEstimate {
    fn default() -> Self {
        Self {
            presence: false,
            position: 0.5,
            brightness: 0.0,
        }
    }
}

/// Brightness-cluster heuristic over a luminance grid.
pub fn estimate_presence(frame: &LumaFrame) -> PresenceEstimate {
    let expected = frame.width * frame.height;
    if expected == 0 || frame.pixels.len() < expected {
        tracing::debug!(
            "Skipping malformed frame {}x{} with {} pixels",
            frame.width,
            frame.height,
            frame.pixels.len()
        );
        return PresenceEstimate::default();
    }

    let mut total: u64 = 0;
    let mut bright = 0usize;
    let mut weighted_col = 0.0f64;
    let mut weight = 0.0f64;

    for (i, &luma) in frame.pixels[..expected].iter().enumerate() {
        total += luma as u64;
        if luma > BRIGHT_LUMA {
            bright += 1;
            let col = (i % frame.width) as f64;
            weighted_col += col * luma as f64;
            weight += luma as f64;
        }
    }

    let brightness = (total as f64 / expected as f64 / 255.0) as f32;

    if bright <= PRESENCE_MIN_PIXELS || weight <= 0.0 {
        return PresenceEstimate {
            brightness,
            ..PresenceEstimate::default()
        };
    }

    let span = (frame.width.saturating_sub(1)).max(1) as f64;
    let position = ((weighted_col / weight) / span).clamp(0.0, 1.0) as f32;

    PresenceEstimate {
        presence: true,
        position,
        brightness,
    }
}

/// Stateful normalizer; remembers the previous gravity reading.
#[derive(Debug, Clone, Default)]
pub struct SensorNormalizer {
    last_gravity: Option<[f32; 3]>,
}

impl SensorNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Motion intensity for this sample.
    pub fn motion_intensity(&mut self, sample: &RawSample) -> f32 {
        if let Some([x, y, z]) = sample.acceleration {
            let magnitude = (x * x + y * y + z * z).sqrt();
            if magnitude.is_finite() {
                return magnitude;
            }
        }

        match sample.gravity {
            Some(current) => {
                let delta = match self.last_gravity {
                    Some(prev) => current
                        .iter()
                        .zip(prev.iter())
                        .map(|(a, b)| (a - b).abs())
                        .sum::<f32>(),
                    None => 0.0,
                };
                self.last_gravity = Some(current);
                if delta.is_finite() {
                    delta
                } else {
                    0.0
                }
            }
            None => 0.0,
        }
    }

    /// Build the snapshot for one sample.
    pub fn normalize(&mut self, sample: &RawSample) -> Environment {
        let motion = self.motion_intensity(sample);
        let estimate = sample
            .frame
            .as_ref()
            .map(estimate_presence)
            .unwrap_or_default();

        Environment {
            motion,
            tilt_x: finite_or_zero(sample.tilt_x),
            tilt_y: finite_or_zero(sample.tilt_y),
            rotation: finite_or_zero(sample.rotation),
            loudness: finite_or_zero(sample.loudness).max(0.0),
            brightness: estimate.brightness,
            presence: estimate.presence,
            presence_x: estimate.position,
            online: sample.online,
            power_level: sample
                .power_level
                .filter(|p| p.is_finite())
                .map(|p| p.clamp(0.0, 1.0)),
        }
    }
}

fn finite_or_zero(v: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_blob(cols: std::ops::Range<usize>) -> LumaFrame {
        let (w, h) = (32, 24);
        let mut pixels = vec![40u8; w * h];
        for row in 0..h {
            for col in cols.clone() {
                pixels[row * w + col] = 240;
            }
        }
        LumaFrame::new(w, h, pixels)
    }

    #[test]
    fn test_linear_acceleration_magnitude() {
        let mut n = SensorNormalizer::new();
        let sample = RawSample {
            acceleration: Some([3.0, 4.0, 0.0]),
            ..Default::default()
        };
        assert!((n.motion_intensity(&sample) - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_gravity_delta_first_reading_is_zero() {
        let mut n = SensorNormalizer::new();
        let first = RawSample {
            gravity: Some([0.0, 9.8, 0.0]),
            ..Default::default()
        };
        assert_eq!(n.motion_intensity(&first), 0.0);

        let second = RawSample {
            gravity: Some([1.0, 8.8, -0.5]),
            ..Default::default()
        };
        assert!((n.motion_intensity(&second) - 2.5).abs() < 1e-4);
    }

    #[test]
    fn test_dark_frame_has_no_presence() {
        let est = estimate_presence(&LumaFrame::filled(32, 24, 30));
        assert!(!est.presence);
        assert_eq!(est.position, 0.5);
        assert!((est.brightness - 30.0 / 255.0).abs() < 1e-4);
    }

    #[test]
    fn test_bright_blob_on_the_right() {
        let est = estimate_presence(&frame_with_blob(28..32));
        assert!(est.presence);
        // Mean column 29.5 of 31
        assert!((est.position - 29.5 / 31.0).abs() < 1e-4);
    }

    #[test]
    fn test_too_few_bright_pixels() {
        let (w, h) = (32, 24);
        let mut pixels = vec![0u8; w * h];
        for p in pixels.iter_mut().take(30) {
            *p = 255;
        }
        let est = estimate_presence(&LumaFrame::new(w, h, pixels));
        assert!(!est.presence);
    }

    #[test]
    fn test_pixels_at_threshold_are_not_bright() {
        let est = estimate_presence(&LumaFrame::filled(32, 24, BRIGHT_LUMA));
        assert!(!est.presence);
    }

    #[test]
    fn test_malformed_frame() {
        let est = estimate_presence(&LumaFrame::new(32, 24, vec![255; 10]));
        assert_eq!(est, PresenceEstimate::default());
    }

    #[test]
    fn test_normalize_copies_through() {
        let mut n = SensorNormalizer::new();
        let env = n.normalize(&RawSample {
            tilt_x: 12.0,
            rotation: 300.0,
            loudness: 55.0,
            online: false,
            power_level: Some(1.4),
            frame: Some(frame_with_blob(0..4)),
            ..Default::default()
        });
        assert_eq!(env.tilt_x, 12.0);
        assert_eq!(env.rotation, 300.0);
        assert_eq!(env.loudness, 55.0);
        assert!(!env.online);
        assert_eq!(env.power_level, Some(1.0));
        assert!(env.presence);
        assert!(env.presence_x < 0.1);
    }

    #[test]
    fn test_sample_from_partial_json() {
        let sample: RawSample = serde_json::from_str(r#"{"loudness": 80}"#).unwrap();
        assert_eq!(sample.loudness, 80.0);
        assert!(sample.online);
        assert!(sample.frame.is_none());
    }
}
