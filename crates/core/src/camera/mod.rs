use std::f64::consts::TAU;

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::config::CameraConfig;

/// Camera pose for one frame. Carries nothing over from earlier frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    pub position: Vec3,
    pub target: Vec3,
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl CameraState {
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_degrees.to_radians(), aspect, self.near, self.far)
    }

    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }
}

pub fn ease_out_cubic(t: f64) -> f64 {
    1.0 - (1.0 - t).powi(3)
}

pub fn lerp(from: f64, to: f64, t: f64) -> f64 {
    from - (from - to) * t
}

/// Eased orbit toward the tree, a pure function of the frame index.
///
/// Radius and height decelerate with an ease-out cubic while the azimuth
/// advances linearly; the camera always looks at the world origin.
pub fn camera_at(frame: u32, total_frames: u32, config: &CameraConfig) -> CameraState {
    let progress = if total_frames == 0 {
        1.0
    } else {
        (f64::from(frame) / f64::from(total_frames)).clamp(0.0, 1.0)
    };
    let ease = ease_out_cubic(progress);

    let radius = lerp(config.start_radius, config.end_radius, ease);
    let height = lerp(config.start_height, config.end_height, ease);
    let angle = progress * TAU * config.rotations;

    CameraState {
        position: Vec3::new(
            (angle.cos() * radius) as f32,
            height as f32,
            (angle.sin() * radius) as f32,
        ),
        target: Vec3::ZERO,
        fov_degrees: config.fov_degrees,
        near: config.near,
        far: config.far,
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use super::*;

    #[test]
    fn starts_far_and_high() {
        let camera = camera_at(0, 930, &CameraConfig::default());
        assert_eq!(camera.position, Vec3::new(30.0, 14.0, 0.0));
        assert_eq!(camera.target, Vec3::ZERO);
    }

    #[test]
    fn ends_after_a_fifth_of_an_orbit() {
        let camera = camera_at(930, 930, &CameraConfig::default());
        let expected = Vec3::new(20.0 * (0.4 * PI).cos(), 4.0, 20.0 * (0.4 * PI).sin());
        assert!(camera.position.abs_diff_eq(expected, 1e-4), "{:?}", camera.position);
    }

    #[test]
    fn clamps_past_the_end() {
        let config = CameraConfig::default();
        assert_eq!(camera_at(5000, 930, &config), camera_at(930, 930, &config));
    }

    #[test]
    fn is_independent_of_call_order() {
        let config = CameraConfig::default();
        let first = camera_at(465, 930, &config);
        let _ = camera_at(12, 930, &config);
        let _ = camera_at(900, 930, &config);
        assert_eq!(camera_at(465, 930, &config), first);
    }

    #[test]
    fn easing_decelerates() {
        assert_eq!(ease_out_cubic(0.0), 0.0);
        assert_eq!(ease_out_cubic(1.0), 1.0);
        assert!(ease_out_cubic(0.5) > 0.5);
        assert_eq!(lerp(30.0, 20.0, 0.5), 25.0);
    }

    #[test]
    fn view_projection_keeps_the_origin_in_front() {
        let camera = camera_at(300, 930, &CameraConfig::default());
        let clip = camera.view_projection(16.0 / 9.0) * glam::Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(clip.w > 0.0);
        assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4);
    }
}
