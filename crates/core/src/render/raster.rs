use glam::{Vec3, Vec4Swizzles};
use image::RgbaImage;

use super::{ParticleHandle, RenderBackend, SceneBuffers, SceneGroup};
use crate::{
    camera::CameraState,
    geometry::{Blending, ParticleSystem},
    record::Recorder,
    Result, SceneError,
};

/// Largest backing store the CPU rasterizer agrees to allocate.
const MAX_PIXELS: u64 = 8192 * 8192;

/// Linear RGB color buffer with a depth buffer alongside.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    color: Vec<Vec3>,
    depth: Vec<f32>,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let pixels = u64::from(width) * u64::from(height);
        if pixels == 0 || pixels > MAX_PIXELS {
            return Err(SceneError::initialization(format!(
                "cannot create a {width}x{height} render target"
            )));
        }
        let pixels = pixels as usize;
        Ok(Self {
            width,
            height,
            color: vec![Vec3::ZERO; pixels],
            depth: vec![f32::INFINITY; pixels],
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn clear(&mut self, background: Vec3) {
        self.color.fill(background);
        self.depth.fill(f32::INFINITY);
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Vec3> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.color.get((y * self.width + x) as usize).copied()
    }

    /// Square point sprite of side `sprite.size` pixels centred on its
    /// screen position.
    fn splat(&mut self, sprite: Sprite) {
        let half = sprite.size.max(1.0) * 0.5;
        let x0 = (sprite.x - half).round().max(0.0) as u32;
        let y0 = (sprite.y - half).round().max(0.0) as u32;
        let x1 = ((sprite.x + half).round().max(0.0) as u32).min(self.width);
        let y1 = ((sprite.y + half).round().max(0.0) as u32).min(self.height);
        // Sub-pixel sprites still cover the pixel they fall in.
        let (x1, y1) = (x1.max((x0 + 1).min(self.width)), y1.max((y0 + 1).min(self.height)));

        for y in y0..y1 {
            for x in x0..x1 {
                let index = (y * self.width + x) as usize;
                if sprite.depth > self.depth[index] {
                    continue;
                }
                let dst = self.color[index];
                self.color[index] = match sprite.blending {
                    Blending::Normal => sprite.color * sprite.opacity + dst * (1.0 - sprite.opacity),
                    Blending::Additive => dst + sprite.color * sprite.opacity,
                };
                if sprite.depth_write {
                    self.depth[index] = sprite.depth;
                }
            }
        }
    }

    /// Converts to 8-bit RGBA, saturating each channel.
    pub fn to_rgba8(&self) -> RgbaImage {
        let mut image = RgbaImage::new(self.width, self.height);
        for (pixel, color) in image.pixels_mut().zip(&self.color) {
            let [r, g, b] = color.clamp(Vec3::ZERO, Vec3::ONE).to_array();
            pixel.0 = [
                (r * 255.0).round() as u8,
                (g * 255.0).round() as u8,
                (b * 255.0).round() as u8,
                255,
            ];
        }
        image
    }
}

#[derive(Debug, Clone, Copy)]
struct Sprite {
    x: f32,
    y: f32,
    size: f32,
    depth: f32,
    color: Vec3,
    opacity: f32,
    blending: Blending,
    depth_write: bool,
}

/// CPU point-sprite rasterizer.
///
/// Systems are drawn in registration order with a shared depth buffer.
/// Attenuated sprites span `size * (height / 2) / depth` pixels; opacity is
/// clamped to `[0, 1]` when blending.
#[derive(Debug)]
pub struct RasterBackend {
    buffers: SceneBuffers,
    target: FrameBuffer,
    background: Vec3,
    pixel_ratio: f32,
    recorder: Option<Recorder>,
    frames_drawn: usize,
}

impl RasterBackend {
    pub fn new(width: u32, height: u32, pixel_ratio: f32, background: [f32; 3]) -> Result<Self> {
        Ok(Self {
            buffers: SceneBuffers::default(),
            target: FrameBuffer::new(width, height)?,
            background: Vec3::from_array(background),
            pixel_ratio,
            recorder: None,
            frames_drawn: 0,
        })
    }

    /// Hands every drawn frame to `recorder`.
    pub fn with_recorder(mut self, recorder: Recorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn buffers(&self) -> &SceneBuffers {
        &self.buffers
    }

    pub fn frame(&self) -> &FrameBuffer {
        &self.target
    }

    pub fn frames_drawn(&self) -> usize {
        self.frames_drawn
    }

    pub fn recorder(&self) -> Option<&Recorder> {
        self.recorder.as_ref()
    }

    fn rasterize(&mut self) -> Result<()> {
        let camera = self
            .buffers
            .camera()
            .copied()
            .ok_or_else(|| SceneError::backend("draw requested before a camera was set"))?;

        let width = self.target.width() as f32;
        let height = self.target.height() as f32;
        let view = camera.view_matrix();
        let projection = camera.projection_matrix(width / height);
        let scale = height * 0.5;

        self.target.clear(self.background);

        for entry in self.buffers.live_entries() {
            let model_view = view * self.buffers.model_matrix(entry.group);
            let material = entry.material;
            let opacity = material.opacity.clamp(0.0, 1.0);

            for (position, color) in entry.positions.iter().zip(&entry.colors) {
                let eye = model_view * position.extend(1.0);
                let depth = -eye.z;
                if depth <= camera.near || depth >= camera.far {
                    continue;
                }
                let clip = projection * eye;
                let ndc = clip.xyz() / clip.w;

                let size = if material.size_attenuation {
                    material.size * scale / depth
                } else {
                    material.size * self.pixel_ratio
                };
                let sx = (ndc.x * 0.5 + 0.5) * width;
                let sy = (0.5 - ndc.y * 0.5) * height;
                let reach = size.max(1.0);
                if sx < -reach || sx > width + reach || sy < -reach || sy > height + reach {
                    continue;
                }

                self.target.splat(Sprite {
                    x: sx,
                    y: sy,
                    size,
                    depth: ndc.z,
                    color: *color,
                    opacity,
                    blending: material.blending,
                    depth_write: material.depth_write,
                });
            }
        }
        Ok(())
    }
}

impl RenderBackend for RasterBackend {
    fn register(&mut self, system: &ParticleSystem, group: SceneGroup) -> Result<ParticleHandle> {
        Ok(self.buffers.register(system, group))
    }

    fn update_positions(&mut self, handle: ParticleHandle, positions: &[Vec3]) -> Result<()> {
        self.buffers.update_positions(handle, positions)
    }

    fn update_material(&mut self, handle: ParticleHandle, size: f32, opacity: f32) -> Result<()> {
        self.buffers.update_material(handle, size, opacity)
    }

    fn set_camera(&mut self, camera: &CameraState) -> Result<()> {
        self.buffers.set_camera(camera);
        Ok(())
    }

    fn set_group_rotation(&mut self, group: SceneGroup, angle: f64) -> Result<()> {
        self.buffers.set_group_rotation(group, angle);
        Ok(())
    }

    fn draw(&mut self, frame: u32) -> Result<()> {
        self.rasterize()?;
        self.frames_drawn += 1;
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.write_frame(frame, &self.target)?;
        }
        Ok(())
    }

    fn release(&mut self, handle: ParticleHandle) -> Result<()> {
        self.buffers.release(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        camera,
        config::{CameraConfig, TreeConfig},
        geometry,
    };

    const BACKGROUND: [f32; 3] = [0.1, 0.1, 0.1];

    fn backend() -> RasterBackend {
        RasterBackend::new(64, 36, 1.0, BACKGROUND).unwrap()
    }

    #[test]
    fn refuses_empty_targets() {
        let err = RasterBackend::new(0, 10, 1.0, BACKGROUND).unwrap_err();
        assert!(err.is_initialization());
    }

    #[test]
    fn draw_without_camera_fails() {
        let mut raster = backend();
        assert!(raster.draw(0).is_err());
    }

    #[test]
    fn empty_scene_clears_to_background() {
        let mut raster = backend();
        raster
            .set_camera(&camera::camera_at(0, 930, &CameraConfig::default()))
            .unwrap();
        raster.draw(0).unwrap();

        let pixel = raster.frame().pixel(10, 10).unwrap();
        assert_eq!(pixel, Vec3::from_array(BACKGROUND));
        assert_eq!(raster.frames_drawn(), 1);
    }

    #[test]
    fn tree_particles_reach_the_frame() {
        let mut raster = backend();
        let layer = geometry::generate_tree_layer(&TreeConfig::default(), 500, 0.6, true);
        raster.register(&layer, SceneGroup::Tree).unwrap();
        raster
            .set_camera(&camera::camera_at(0, 930, &CameraConfig::default()))
            .unwrap();
        raster.draw(0).unwrap();

        let image = raster.frame().to_rgba8();
        let lit = image
            .pixels()
            .filter(|p| p.0[0] > 200 && p.0[2] < 50)
            .count();
        assert!(lit > 0, "expected ornaments on screen");
    }

    #[test]
    fn additive_blending_brightens() {
        let mut target = FrameBuffer::new(4, 4).unwrap();
        target.clear(Vec3::splat(0.2));
        target.splat(Sprite {
            x: 2.0,
            y: 2.0,
            size: 1.0,
            depth: 0.5,
            color: Vec3::splat(0.5),
            opacity: 1.0,
            blending: Blending::Additive,
            depth_write: false,
        });
        let pixel = target.pixel(2, 2).unwrap();
        assert!((pixel.x - 0.7).abs() < 1e-6);
    }
}
