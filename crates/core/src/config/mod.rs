use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{mapping::GroundResponse, Result, SceneError};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub clock: ClockConfig,
    pub tree: TreeConfig,
    pub ground: GroundConfig,
    pub starfield: StarfieldConfig,
    pub camera: CameraConfig,
    pub audio: AudioConfig,
    pub render: RenderConfig,
}

impl AppConfig {
    /// Reads a JSON configuration file. Omitted fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.clock.fps == 0 {
            return Err(SceneError::config("fps must be positive"));
        }
        if self.clock.total_frames == 0 {
            return Err(SceneError::config("total frame count must be positive"));
        }
        if self.clock.width == 0 || self.clock.height == 0 {
            return Err(SceneError::config("output resolution must be non-zero"));
        }
        if self.clock.pixel_ratio <= 0.0 {
            return Err(SceneError::config("pixel ratio must be positive"));
        }
        if self.tree.height <= 0.0 || self.tree.max_radius <= 0.0 {
            return Err(SceneError::config("tree dimensions must be positive"));
        }
        if self.ground.count == 0 {
            return Err(SceneError::config("ground formation needs at least one point"));
        }
        if self.audio.sample_window == 0 {
            return Err(SceneError::config("audio sample window must be non-zero"));
        }
        if self.audio.block_size < 2 {
            return Err(SceneError::config(
                "analysis block size must hold at least two samples",
            ));
        }
        if self.audio.sample_rate == 0 {
            return Err(SceneError::config("analysis sample rate must be positive"));
        }
        Ok(())
    }
}

/// Output timing and resolution handed to the frame clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    pub fps: u32,
    pub total_frames: u32,
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            fps: 60,
            total_frames: (15.5 * 60.0) as u32,
            width: 1920,
            height: 1080,
            pixel_ratio: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    pub height: f64,
    pub max_radius: f64,
    /// Upper bound of the outward radius jitter, as a fraction of the radius.
    pub jitter: f64,
    /// Radians per frame of the whole tree group about the vertical axis.
    pub rotation_per_frame: f64,
    pub layers: Vec<TreeLayerConfig>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            height: 15.0,
            max_radius: 7.0,
            jitter: 0.2,
            rotation_per_frame: 0.01,
            layers: vec![
                TreeLayerConfig::new(5000, 0.1, false),
                TreeLayerConfig::new(200, 0.3, true),
                TreeLayerConfig::new(50, 0.6, true),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeLayerConfig {
    pub count: usize,
    pub point_size: f32,
    pub decorative: bool,
}

impl TreeLayerConfig {
    pub fn new(count: usize, point_size: f32, decorative: bool) -> Self {
        Self {
            count,
            point_size,
            decorative,
        }
    }
}

/// The star-shaped formation floating above the tree top.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroundConfig {
    pub count: usize,
    pub radius: f64,
    pub point_size: f32,
    pub opacity: f32,
    pub color: [f32; 3],
    pub rotation_per_frame: f64,
    pub response: GroundResponse,
}

impl Default for GroundConfig {
    fn default() -> Self {
        Self {
            count: 200,
            radius: 0.5,
            point_size: 0.1,
            opacity: 0.6,
            color: [1.0, 0.9, 0.2],
            rotation_per_frame: 0.02,
            response: GroundResponse::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StarfieldConfig {
    pub count: usize,
    pub radius: f64,
    pub point_size: f32,
    pub seeding: StarfieldSeeding,
}

impl Default for StarfieldConfig {
    fn default() -> Self {
        Self {
            count: 1000,
            radius: 50.0,
            point_size: 0.02,
            seeding: StarfieldSeeding::default(),
        }
    }
}

/// Source of the polar angle of each background star.
///
/// The azimuth always comes from the index RNG. By default the polar angle is
/// drawn from an unseeded generator, so the starfield differs between runs
/// while staying fixed for the lifetime of one scene.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum StarfieldSeeding {
    #[default]
    Unseeded,
    Seeded { seed: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub start_radius: f64,
    pub end_radius: f64,
    pub start_height: f64,
    pub end_height: f64,
    /// Fraction of a full orbit covered over the whole sequence.
    pub rotations: f64,
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            start_radius: 30.0,
            end_radius: 20.0,
            start_height: 14.0,
            end_height: 4.0,
            rotations: 0.2,
            fov_degrees: 50.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

/// Configuration specific to the audio subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Rate the audio is decoded at before analysis.
    pub sample_rate: u32,
    /// FFT block length in samples.
    pub block_size: usize,
    /// Number of frequency bins kept per envelope frame.
    pub sample_window: usize,
    pub gain: f64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            block_size: 2048,
            sample_window: 32,
            gain: 2.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Linear RGB clear color.
    pub background: [f32; 3],
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            background: [28.0 / 255.0, 28.0 / 255.0, 28.0 / 255.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_scene_constants() {
        let config = AppConfig::default();
        assert_eq!(config.clock.fps, 60);
        assert_eq!(config.clock.total_frames, 930);
        assert_eq!(config.tree.height, 15.0);
        assert_eq!(config.tree.max_radius, 7.0);
        let counts: Vec<usize> = config.tree.layers.iter().map(|l| l.count).collect();
        assert_eq!(counts, vec![5000, 200, 50]);
        assert_eq!(config.ground.count, 200);
        assert_eq!(config.starfield.count, 1000);
        assert_eq!(config.audio.gain, 2.5);
        assert_eq!(config.audio.sample_window, 32);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "clock": { "total_frames": 120 } }"#).unwrap();
        assert_eq!(config.clock.total_frames, 120);
        assert_eq!(config.clock.fps, 60);
        assert_eq!(config.tree, TreeConfig::default());
    }

    #[test]
    fn seeding_round_trips_through_json() {
        let config: StarfieldConfig =
            serde_json::from_str(r#"{ "seeding": { "mode": "seeded", "seed": 7 } }"#).unwrap();
        assert_eq!(config.seeding, StarfieldSeeding::Seeded { seed: 7 });
    }

    #[test]
    fn rejects_zero_fps() {
        let mut config = AppConfig::default();
        config.clock.fps = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("fps"));
    }
}
