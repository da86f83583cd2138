//! Rendering backend seam and the buffers every backend keeps.

mod raster;

pub use raster::{FrameBuffer, RasterBackend};

use glam::{Mat4, Vec3};

use crate::{
    camera::CameraState,
    geometry::{ParticleKind, ParticleSystem, PointMaterial},
    Result, SceneError,
};

/// Opaque reference to a particle system registered with a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParticleHandle(usize);

/// Transform group a particle system is parented to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneGroup {
    /// Tree layers and the ground formation; rotated every frame.
    Tree,
    /// The static starfield.
    Background,
}

/// Operations the scene needs from a rendering backend.
///
/// Once a system is registered the backend owns its buffers until
/// [`RenderBackend::release`] is called for the handle.
pub trait RenderBackend {
    fn register(&mut self, system: &ParticleSystem, group: SceneGroup) -> Result<ParticleHandle>;
    fn update_positions(&mut self, handle: ParticleHandle, positions: &[Vec3]) -> Result<()>;
    fn update_material(&mut self, handle: ParticleHandle, size: f32, opacity: f32) -> Result<()>;
    fn set_camera(&mut self, camera: &CameraState) -> Result<()>;
    /// Sets the absolute rotation of `group` about the vertical axis.
    fn set_group_rotation(&mut self, group: SceneGroup, angle: f64) -> Result<()>;
    fn draw(&mut self, frame: u32) -> Result<()>;
    fn release(&mut self, handle: ParticleHandle) -> Result<()>;
}

/// GPU-side copy of one registered particle system.
#[derive(Debug, Clone)]
pub struct BufferEntry {
    pub kind: ParticleKind,
    pub group: SceneGroup,
    pub material: PointMaterial,
    pub positions: Vec<Vec3>,
    pub colors: Vec<Vec3>,
}

/// Registered buffers, camera and group transforms shared by the backends.
#[derive(Debug, Default)]
pub struct SceneBuffers {
    entries: Vec<Option<BufferEntry>>,
    camera: Option<CameraState>,
    tree_rotation: f64,
    background_rotation: f64,
}

impl SceneBuffers {
    pub fn register(&mut self, system: &ParticleSystem, group: SceneGroup) -> ParticleHandle {
        self.entries.push(Some(BufferEntry {
            kind: system.kind,
            group,
            material: system.material,
            positions: system.positions().collect(),
            colors: system.particles.iter().map(|p| p.color).collect(),
        }));
        ParticleHandle(self.entries.len() - 1)
    }

    pub fn entry(&self, handle: ParticleHandle) -> Option<&BufferEntry> {
        self.entries.get(handle.0).and_then(Option::as_ref)
    }

    fn entry_mut(&mut self, handle: ParticleHandle) -> Result<&mut BufferEntry> {
        self.entries
            .get_mut(handle.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| SceneError::backend(format!("unknown particle handle {handle:?}")))
    }

    pub fn update_positions(&mut self, handle: ParticleHandle, positions: &[Vec3]) -> Result<()> {
        let entry = self.entry_mut(handle)?;
        if entry.positions.len() != positions.len() {
            return Err(SceneError::backend(format!(
                "position buffer holds {} points, got {}",
                entry.positions.len(),
                positions.len()
            )));
        }
        entry.positions.copy_from_slice(positions);
        Ok(())
    }

    pub fn update_material(&mut self, handle: ParticleHandle, size: f32, opacity: f32) -> Result<()> {
        let entry = self.entry_mut(handle)?;
        entry.material.size = size;
        entry.material.opacity = opacity;
        Ok(())
    }

    pub fn set_camera(&mut self, camera: &CameraState) {
        self.camera = Some(*camera);
    }

    pub fn camera(&self) -> Option<&CameraState> {
        self.camera.as_ref()
    }

    pub fn set_group_rotation(&mut self, group: SceneGroup, angle: f64) {
        match group {
            SceneGroup::Tree => self.tree_rotation = angle,
            SceneGroup::Background => self.background_rotation = angle,
        }
    }

    pub fn group_rotation(&self, group: SceneGroup) -> f64 {
        match group {
            SceneGroup::Tree => self.tree_rotation,
            SceneGroup::Background => self.background_rotation,
        }
    }

    pub fn model_matrix(&self, group: SceneGroup) -> Mat4 {
        Mat4::from_rotation_y(self.group_rotation(group) as f32)
    }

    pub fn release(&mut self, handle: ParticleHandle) -> Result<()> {
        match self.entries.get_mut(handle.0) {
            Some(slot) if slot.is_some() => {
                *slot = None;
                Ok(())
            }
            _ => Err(SceneError::backend(format!(
                "particle handle {handle:?} is not registered"
            ))),
        }
    }

    /// Live entries in registration order.
    pub fn live_entries(&self) -> impl Iterator<Item = &BufferEntry> + '_ {
        self.entries.iter().flatten()
    }

    pub fn live_count(&self) -> usize {
        self.live_entries().count()
    }
}

/// Headless backend that keeps the submitted scene and a log of draws.
/// Useful for previews and for checking what a frame submits without
/// rasterizing it.
#[derive(Debug, Default)]
pub struct RenderGraph {
    buffers: SceneBuffers,
    draws: Vec<u32>,
    released: usize,
}

impl RenderGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffers(&self) -> &SceneBuffers {
        &self.buffers
    }

    /// Frames drawn so far, in call order.
    pub fn draws(&self) -> &[u32] {
        &self.draws
    }

    /// Number of successful `release` calls.
    pub fn released(&self) -> usize {
        self.released
    }
}

impl RenderBackend for RenderGraph {
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
        self.draws.push(frame);
        Ok(())
    }

    fn release(&mut self, handle: ParticleHandle) -> Result<()> {
        self.buffers.release(handle)?;
        self.released += 1;
        Ok(())
    }
}
