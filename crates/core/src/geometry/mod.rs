//! Procedural particle sets: tree layers, the ground formation and the
//! background starfield.
//!
//! Generation runs in double precision and narrows to single precision when a
//! particle is stored, the same precision the vertex buffers carry.

use std::f64::consts::{PI, TAU};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::{
    config::{GroundConfig, StarfieldConfig, TreeConfig, TreeLayerConfig},
    rng::{self, FreeSource},
};

const HEIGHT_SEED: u32 = 10;
const ANGLE_SEED: u32 = 20;
const JITTER_SEED: u32 = 30;
const ORNAMENT_SEED: u32 = 40;
const STAR_BRIGHTNESS_SEED: u32 = 50;
const STAR_AZIMUTH_SEED: u32 = 60;

const FOLIAGE_OPACITY: f32 = 0.8;
const ORNAMENT_OPACITY: f32 = 1.0;
const GOLD: Vec3 = Vec3::new(1.0, 0.8, 0.0);
const RED: Vec3 = Vec3::new(1.0, 0.0, 0.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticleKind {
    Foliage,
    Ornament,
    Ground,
    Star,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Blending {
    Normal,
    Additive,
}

/// Shared point-sprite parameters of one particle system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointMaterial {
    pub size: f32,
    pub opacity: f32,
    pub blending: Blending,
    pub depth_write: bool,
    pub size_attenuation: bool,
}

impl PointMaterial {
    fn new(size: f32, opacity: f32) -> Self {
        Self {
            size,
            opacity,
            blending: Blending::Normal,
            depth_write: true,
            size_attenuation: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub position: Vec3,
    pub color: Vec3,
    pub size: f32,
    pub opacity: f32,
}

/// Ordered set of independently drawn points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleSystem {
    pub kind: ParticleKind,
    pub material: PointMaterial,
    pub particles: Vec<Particle>,
}

impl ParticleSystem {
    fn with_capacity(kind: ParticleKind, material: PointMaterial, capacity: usize) -> Self {
        Self {
            kind,
            material,
            particles: Vec::with_capacity(capacity),
        }
    }

    fn push(&mut self, position: Vec3, color: Vec3) {
        self.particles.push(Particle {
            position,
            color,
            size: self.material.size,
            opacity: self.material.opacity,
        });
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.particles.iter().map(|p| p.position)
    }

    /// Flat `xyz` buffer in particle order.
    pub fn position_buffer(&self) -> Vec<f32> {
        self.positions().flat_map(|p| p.to_array()).collect()
    }

    /// Flat `rgb` buffer in particle order.
    pub fn color_buffer(&self) -> Vec<f32> {
        self.particles
            .iter()
            .flat_map(|p| p.color.to_array())
            .collect()
    }
}

/// Builds one conical layer of the tree.
///
/// Height fraction, azimuth, outward jitter and ornament color each read the
/// index RNG at their own offset so the four values of a particle are
/// uncorrelated.
pub fn generate_tree_layer(
    tree: &TreeConfig,
    count: usize,
    point_size: f32,
    decorative: bool,
) -> ParticleSystem {
    let (kind, material) = if decorative {
        let mut material = PointMaterial::new(point_size, ORNAMENT_OPACITY);
        material.depth_write = false;
        (ParticleKind::Ornament, material)
    } else {
        (
            ParticleKind::Foliage,
            PointMaterial::new(point_size, FOLIAGE_OPACITY),
        )
    };
    let mut system = ParticleSystem::with_capacity(kind, material, count);

    for i in 0..count as u32 {
        let height_fraction = rng::sample(i + HEIGHT_SEED);
        let y = height_fraction * tree.height - tree.height / 2.0;
        let radius = tree.max_radius * (1.0 - height_fraction);
        let angle = rng::sample(i + ANGLE_SEED) * TAU;
        let jitter = rng::sample(i + JITTER_SEED) * tree.jitter;

        let position = Vec3::new(
            (angle.cos() * radius * (1.0 + jitter)) as f32,
            y as f32,
            (angle.sin() * radius * (1.0 + jitter)) as f32,
        );

        let color = if decorative {
            if rng::sample(i + ORNAMENT_SEED) < 0.5 {
                GOLD
            } else {
                RED
            }
        } else {
            Vec3::new(0.1, (0.4 + height_fraction * 0.3) as f32, 0.1)
        };

        system.push(position, color);
    }

    system
}

/// Builds every configured tree layer in order.
pub fn generate_tree(tree: &TreeConfig) -> Vec<ParticleSystem> {
    tree.layers
        .iter()
        .map(|TreeLayerConfig { count, point_size, decorative }| {
            generate_tree_layer(tree, *count, *point_size, *decorative)
        })
        .collect()
}

/// Canonical shape of the ground formation.
///
/// `base` never changes after construction; per-frame positions are derived
/// from it by [`crate::scene::SceneState::frame`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundFormation {
    pub base: ParticleSystem,
    /// Height of the formation's vertical center, the pivot of the pulse.
    pub center_y: f64,
}

impl GroundFormation {
    pub fn len(&self) -> usize {
        self.base.len()
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }
}

/// Spherical Fibonacci placement of the ground formation above the tree top.
pub fn generate_ground_formation(tree: &TreeConfig, ground: &GroundConfig) -> GroundFormation {
    let mut material = PointMaterial::new(ground.point_size, ground.opacity);
    material.blending = Blending::Additive;
    material.depth_write = false;

    let count = ground.count;
    let center_y = tree.height / 2.0 + 1.0;
    let color = Vec3::from_array(ground.color);
    let spiral = (count as f64 * PI).sqrt();
    let mut base = ParticleSystem::with_capacity(ParticleKind::Ground, material, count);

    for i in 0..count {
        let phi = (-1.0 + (2.0 * i as f64) / count as f64).acos();
        let theta = spiral * phi;

        let x = ground.radius * theta.cos() * phi.sin();
        let y = center_y + ground.radius * theta.sin() * phi.sin();
        let z = ground.radius * phi.cos();

        base.push(Vec3::new(x as f32, y as f32, z as f32), color);
    }

    GroundFormation { base, center_y }
}

/// Background stars on a sphere around the scene.
///
/// The azimuth and brightness are index-deterministic; the polar angle comes
/// from the configured [`crate::config::StarfieldSeeding`].
pub fn generate_background_stars(stars: &StarfieldConfig) -> ParticleSystem {
    let material = PointMaterial::new(stars.point_size, 1.0);
    let mut system = ParticleSystem::with_capacity(ParticleKind::Star, material, stars.count);
    let mut polar = FreeSource::new(stars.seeding);

    for i in 0..stars.count as u32 {
        let theta = rng::sample(i + STAR_AZIMUTH_SEED) * TAU;
        let phi = (polar.next_unit() * 2.0 - 1.0).acos();

        let position = Vec3::new(
            (stars.radius * phi.sin() * theta.cos()) as f32,
            (stars.radius * phi.sin() * theta.sin()) as f32,
            (stars.radius * phi.cos()) as f32,
        );
        let brightness = (0.5 + rng::sample(i + STAR_BRIGHTNESS_SEED) * 0.5) as f32;

        system.push(position, Vec3::splat(brightness));
    }

    system
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StarfieldSeeding;

    #[test]
    fn fine_layer_fills_the_cone() {
        let tree = TreeConfig::default();
        let layer = generate_tree_layer(&tree, 5000, 0.1, false);

        assert_eq!(layer.len(), 5000);
        assert_eq!(layer.kind, ParticleKind::Foliage);
        for p in layer.positions() {
            assert!((-7.5..=7.5).contains(&p.y), "height {} out of range", p.y);
            let radius = (p.x * p.x + p.z * p.z).sqrt();
            assert!(radius <= 7.0 * 1.2 + 1e-4, "radius {radius} too wide");
        }
    }

    #[test]
    fn foliage_color_follows_height() {
        let tree = TreeConfig::default();
        let layer = generate_tree_layer(&tree, 64, 0.1, false);
        for p in &layer.particles {
            let height_fraction = (p.position.y + 7.5) / 15.0;
            assert_eq!(p.color.x, 0.1);
            assert_eq!(p.color.z, 0.1);
            assert!((p.color.y - (0.4 + 0.3 * height_fraction)).abs() < 1e-5);
            assert_eq!(p.opacity, 0.8);
        }
    }

    #[test]
    fn ornaments_are_gold_or_red() {
        let tree = TreeConfig::default();
        let layer = generate_tree_layer(&tree, 200, 0.3, true);
        assert_eq!(layer.kind, ParticleKind::Ornament);
        assert!(!layer.material.depth_write);
        assert!(layer.particles.iter().all(|p| p.color == GOLD || p.color == RED));
        assert!(layer.particles.iter().any(|p| p.color == GOLD));
        assert!(layer.particles.iter().any(|p| p.color == RED));
    }

    #[test]
    fn regeneration_is_bit_identical() {
        let tree = TreeConfig::default();
        let a = generate_tree(&tree);
        let b = generate_tree(&tree);
        assert_eq!(a, b);
    }

    #[test]
    fn ground_formation_sits_above_the_tree() {
        let tree = TreeConfig::default();
        let ground = generate_ground_formation(&tree, &GroundConfig::default());

        assert_eq!(ground.len(), 200);
        assert_eq!(ground.center_y, 8.5);
        assert_eq!(ground.base.material.blending, Blending::Additive);
        for p in ground.base.positions() {
            let offset = Vec3::new(p.x, p.y - 8.5, p.z);
            assert!(offset.length() <= 0.5 + 1e-5);
        }
        let first = ground.base.particles[0].position;
        assert!((first.z + 0.5).abs() < 1e-6);
    }

    #[test]
    fn stars_lie_on_the_sphere() {
        let config = StarfieldConfig::default();
        let stars = generate_background_stars(&config);

        assert_eq!(stars.len(), 1000);
        for p in &stars.particles {
            assert!((p.position.length() - 50.0).abs() < 1e-3);
            assert!((0.5..=1.0).contains(&p.color.x));
            assert_eq!(p.color.x, p.color.y);
        }
    }

    #[test]
    fn seeded_starfield_is_reproducible() {
        let config = StarfieldConfig {
            seeding: StarfieldSeeding::Seeded { seed: 9 },
            ..StarfieldConfig::default()
        };
        assert_eq!(
            generate_background_stars(&config),
            generate_background_stars(&config)
        );
    }

    fn assert_close(actual: Vec3, expected: [f32; 3]) {
        assert!(
            actual.abs_diff_eq(Vec3::from_array(expected), 1e-5),
            "{actual:?} != {expected:?}"
        );
    }

    #[test]
    fn tree_layer_matches_reference_positions() {
        let layer = generate_tree_layer(&TreeConfig::default(), 5000, 0.1, false);
        assert_close(
            layer.particles[0].position,
            [-1.233_159_6, -5.454_104, -6.874_709],
        );
    }

    #[test]
    fn ground_follows_the_fibonacci_sphere() {
        let ground = generate_ground_formation(&TreeConfig::default(), &GroundConfig::default());
        let base = &ground.base.particles;

        assert_close(base[1].position, [0.069_155, 8.486_122, -0.495]);
        assert_close(base[57].position, [0.437_344_85, 8.611_823, -0.215]);
        assert_close(base[133].position, [0.420_430_1, 8.285_492, 0.165]);
    }

    #[test]
    fn star_azimuth_and_brightness_use_their_own_seeds() {
        let config = StarfieldConfig {
            seeding: StarfieldSeeding::Seeded { seed: 3 },
            ..StarfieldConfig::default()
        };
        let stars = generate_background_stars(&config);
        let first = &stars.particles[0];

        let azimuth = f64::from(first.position.y)
            .atan2(f64::from(first.position.x))
            .rem_euclid(TAU);
        assert!((azimuth - 5.581_254_609).abs() < 1e-4, "azimuth {azimuth}");
        assert!((first.color.x - 0.510_335_82).abs() < 1e-6);
    }

    #[test]
    fn buffers_are_flattened_in_order() {
        let tree = TreeConfig::default();
        let layer = generate_tree_layer(&tree, 3, 0.1, false);
        let positions = layer.position_buffer();
        assert_eq!(positions.len(), 9);
        assert_eq!(positions[3], layer.particles[1].position.x);
        assert_eq!(layer.color_buffer().len(), 9);
    }
}
