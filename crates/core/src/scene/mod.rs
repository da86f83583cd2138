//! Immutable scene description and the pure per-frame state computation.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::{
    analysis::{AmplitudeSampler, AudioEnvelope},
    camera::{self, CameraState},
    config::AppConfig,
    geometry::{self, GroundFormation, ParticleSystem},
    mapping::GroundMaterial,
    timeline::SceneClock,
    Result,
};

/// Configuration plus every generated particle set. Built once; never
/// mutated afterwards.
#[derive(Debug, Clone)]
pub struct SceneState {
    config: AppConfig,
    clock: SceneClock,
    sampler: AmplitudeSampler,
    tree: Vec<ParticleSystem>,
    ground: GroundFormation,
    stars: ParticleSystem,
}

impl SceneState {
    pub fn build(config: AppConfig) -> Result<Self> {
        config.validate()?;

        let clock = SceneClock::from_config(&config.clock);
        let sampler = AmplitudeSampler::new(clock.fps, &config.audio);
        let tree = geometry::generate_tree(&config.tree);
        let ground = geometry::generate_ground_formation(&config.tree, &config.ground);
        let stars = geometry::generate_background_stars(&config.starfield);

        tracing::info!(
            tree_layers = tree.len(),
            tree_particles = tree.iter().map(ParticleSystem::len).sum::<usize>(),
            ground_particles = ground.len(),
            stars = stars.len(),
            "generated scene geometry"
        );

        Ok(Self {
            config,
            clock,
            sampler,
            tree,
            ground,
            stars,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn clock(&self) -> &SceneClock {
        &self.clock
    }

    pub fn tree_layers(&self) -> &[ParticleSystem] {
        &self.tree
    }

    pub fn ground(&self) -> &GroundFormation {
        &self.ground
    }

    pub fn stars(&self) -> &ParticleSystem {
        &self.stars
    }

    pub fn tree_rotation(&self, frame: u32) -> f64 {
        f64::from(frame) * self.config.tree.rotation_per_frame
    }

    pub fn ground_rotation(&self, frame: u32) -> f64 {
        f64::from(frame) * self.config.ground.rotation_per_frame
    }

    pub fn audio_amplitude(&self, envelope: &AudioEnvelope, frame: u32) -> f64 {
        self.sampler.sample(envelope, frame)
    }

    /// Computes everything that changes on `frame`.
    ///
    /// Reads only the immutable geometry, the configuration and the envelope,
    /// so any sequence of calls (repeats and backward seeks included) yields
    /// the same state for the same frame.
    pub fn frame(&self, frame: u32, envelope: &AudioEnvelope) -> FrameState {
        let camera = camera::camera_at(frame, self.clock.total_frames, &self.config.camera);
        let tree_rotation = self.tree_rotation(frame);
        let audio_amplitude = self.audio_amplitude(envelope, frame);

        let response = &self.config.ground.response;
        let ground_rotation = self.ground_rotation(frame);
        let pulse_scale = response.pulse_scale(audio_amplitude);
        let (sin, cos) = ground_rotation.sin_cos();
        let center_y = self.ground.center_y;
        let ground_positions = self
            .ground
            .base
            .positions()
            .map(|base| pulse_ground_point(base, sin, cos, center_y, pulse_scale))
            .collect();

        FrameState {
            frame,
            camera,
            tree_rotation,
            ground_rotation,
            audio_amplitude,
            pulse_scale,
            ground_positions,
            ground_material: response.material(audio_amplitude),
        }
    }
}

/// Rotates a base point about the vertical axis, then scales it about
/// `(0, center_y, 0)`. The order matters: scaling first would move the pivot.
pub fn pulse_ground_point(base: Vec3, sin: f64, cos: f64, center_y: f64, pulse_scale: f64) -> Vec3 {
    let x = f64::from(base.x);
    let y = f64::from(base.y);
    let z = f64::from(base.z);

    let rotated_x = x * cos - z * sin;
    let rotated_z = x * sin + z * cos;

    Vec3::new(
        (rotated_x * pulse_scale) as f32,
        (center_y + (y - center_y) * pulse_scale) as f32,
        (rotated_z * pulse_scale) as f32,
    )
}

/// Transient output of one update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameState {
    pub frame: u32,
    pub camera: CameraState,
    /// Absolute rotation of the tree group about the vertical axis.
    pub tree_rotation: f64,
    pub ground_rotation: f64,
    pub audio_amplitude: f64,
    pub pulse_scale: f64,
    /// Live ground positions, in the tree group's local space.
    pub ground_positions: Vec<Vec3>,
    pub ground_material: GroundMaterial,
}
