use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::config::ClockConfig;

/// Frame clock of a fixed-length, fixed-rate composition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SceneClock {
    pub fps: u32,
    pub total_frames: u32,
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f32,
}

impl SceneClock {
    pub fn from_config(config: &ClockConfig) -> Self {
        Self {
            fps: config.fps,
            total_frames: config.total_frames,
            width: config.width,
            height: config.height,
            pixel_ratio: config.pixel_ratio,
        }
    }

    pub fn seconds_at(&self, frame: u32) -> f64 {
        f64::from(frame) / f64::from(self.fps)
    }

    pub fn duration_seconds(&self) -> f64 {
        self.seconds_at(self.total_frames)
    }

    pub fn contains(&self, frame: u32) -> bool {
        frame < self.total_frames
    }

    /// Frames of the final output, in increasing order.
    pub fn frames(&self) -> Range<u32> {
        0..self.total_frames
    }

    /// Backing-store size after applying the pixel density.
    pub fn render_size(&self) -> (u32, u32) {
        (
            ((self.width as f32) * self.pixel_ratio).round() as u32,
            ((self.height as f32) * self.pixel_ratio).round() as u32,
        )
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

impl Default for SceneClock {
    fn default() -> Self {
        Self::from_config(&ClockConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_clock_runs_fifteen_and_a_half_seconds() {
        let clock = SceneClock::default();
        assert_eq!(clock.total_frames, 930);
        assert_eq!(clock.duration_seconds(), 15.5);
        assert_eq!(clock.frames().len(), 930);
        assert!(clock.contains(929));
        assert!(!clock.contains(930));
    }

    #[test]
    fn render_size_applies_pixel_density() {
        let clock = SceneClock::default();
        assert_eq!(clock.render_size(), (3840, 2160));
        assert!((clock.aspect() - 16.0 / 9.0).abs() < 1e-6);
    }
}
