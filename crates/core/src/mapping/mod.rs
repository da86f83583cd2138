use serde::{Deserialize, Serialize};

/// Routes the sampled audio amplitude to the ground formation's pulse and
/// material. The outputs are intentionally left unclamped; loud passages push
/// size and opacity past their resting range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroundResponse {
    pub pulse_gain: f64,
    pub size_base: f32,
    pub size_gain: f32,
    pub opacity_base: f32,
    pub opacity_gain: f32,
}

impl Default for GroundResponse {
    fn default() -> Self {
        Self {
            pulse_gain: 0.4,
            size_base: 0.12,
            size_gain: 0.18,
            opacity_base: 0.6,
            opacity_gain: 0.4,
        }
    }
}

impl GroundResponse {
    pub fn pulse_scale(&self, amplitude: f64) -> f64 {
        1.0 + amplitude * self.pulse_gain
    }

    pub fn material(&self, amplitude: f64) -> GroundMaterial {
        let amplitude = amplitude as f32;
        GroundMaterial {
            size: self.size_base + amplitude * self.size_gain,
            opacity: self.opacity_base + amplitude * self.opacity_gain,
        }
    }
}

/// Per-frame point size and opacity of the ground formation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroundMaterial {
    pub size: f32,
    pub opacity: f32,
}
