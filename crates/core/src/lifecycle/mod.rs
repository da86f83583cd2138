//! Explicit `init → begin_audio → ready → update* → dispose` driver around
//! an immutable [`SceneState`] and a rendering backend.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    analysis::AudioEnvelope,
    assets::AudioLocator,
    audio::{AnalysisProvider, EnvelopeTask},
    config::AppConfig,
    render::{ParticleHandle, RenderBackend, SceneGroup},
    scene::{FrameState, SceneState},
    Result, SceneError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Geometry is built and registered; no audio requested yet.
    Uninitialized,
    AudioLoading,
    Ready,
    Failed,
    Disposed,
}

#[derive(Debug)]
struct Handles {
    stars: ParticleHandle,
    tree: Vec<ParticleHandle>,
    ground: ParticleHandle,
}

impl Handles {
    fn all(&self) -> impl Iterator<Item = ParticleHandle> + '_ {
        std::iter::once(self.stars)
            .chain(self.tree.iter().copied())
            .chain(std::iter::once(self.ground))
    }
}

/// Owns the backend resources of one scene and gates frame updates behind
/// the audio envelope.
#[derive(Debug)]
pub struct SceneRuntime<B: RenderBackend> {
    scene: SceneState,
    backend: B,
    handles: Option<Handles>,
    state: LifecycleState,
    task: Option<EnvelopeTask>,
    envelope: Option<AudioEnvelope>,
}

impl<B: RenderBackend> SceneRuntime<B> {
    /// Generates the scene geometry and hands every particle system to the
    /// backend. Any failure here is an initialization error.
    pub fn init(config: AppConfig, mut backend: B) -> Result<Self> {
        let scene = SceneState::build(config)
            .map_err(|err| SceneError::initialization(format!("invalid scene: {err}")))?;
        let handles = register_scene(&scene, &mut backend)?;
        tracing::info!("scene initialized");

        Ok(Self {
            scene,
            backend,
            handles: Some(handles),
            state: LifecycleState::Uninitialized,
            task: None,
            envelope: None,
        })
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn scene(&self) -> &SceneState {
        &self.scene
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn envelope(&self) -> Option<&AudioEnvelope> {
        self.envelope.as_ref()
    }

    /// Starts computing the audio envelope on a background thread.
    pub fn begin_audio<P: AnalysisProvider>(
        &mut self,
        provider: P,
        locator: AudioLocator,
    ) -> Result<()> {
        self.check_usable()?;
        if self.state != LifecycleState::Uninitialized {
            return Err(SceneError::msg(format!(
                "audio was already requested (state: {:?})",
                self.state
            )));
        }

        tracing::info!(%locator, "loading audio envelope");
        match EnvelopeTask::spawn(Arc::new(provider), locator) {
            Ok(task) => {
                self.task = Some(task);
                self.state = LifecycleState::AudioLoading;
                Ok(())
            }
            Err(err) => {
                self.state = LifecycleState::Failed;
                Err(SceneError::initialization(format!(
                    "could not start audio analysis: {err}"
                )))
            }
        }
    }

    /// Non-blocking readiness check. Completes the transition if the
    /// envelope job has finished.
    pub fn poll(&mut self) -> Result<LifecycleState> {
        if self.state == LifecycleState::AudioLoading
            && self.task.as_ref().is_some_and(EnvelopeTask::is_finished)
        {
            self.finish_loading()?;
        }
        Ok(self.state)
    }

    /// Blocks until the envelope is available. Returns the initialization
    /// error if the analysis failed.
    pub fn ready(&mut self) -> Result<()> {
        match self.state {
            LifecycleState::Ready => Ok(()),
            LifecycleState::AudioLoading => self.finish_loading(),
            LifecycleState::Uninitialized => Err(SceneError::NotReady { state: self.state }),
            LifecycleState::Failed => Err(SceneError::Failed),
            LifecycleState::Disposed => Err(SceneError::Disposed),
        }
    }

    fn finish_loading(&mut self) -> Result<()> {
        let Some(task) = self.task.take() else {
            self.state = LifecycleState::Failed;
            return Err(SceneError::initialization("audio loading has no running job"));
        };
        let locator = task.locator().clone();

        match task.join() {
            Ok(envelope) => {
                tracing::info!(
                    %locator,
                    frames = envelope.frame_count(),
                    seconds = envelope.duration_seconds(),
                    "scene ready"
                );
                self.envelope = Some(envelope);
                self.state = LifecycleState::Ready;
                Ok(())
            }
            Err(err) => {
                tracing::error!(%locator, error = %err, "audio analysis failed");
                self.state = LifecycleState::Failed;
                Err(SceneError::initialization(format!(
                    "audio analysis of {locator} failed: {err}"
                )))
            }
        }
    }

    /// Computes frame `frame` and submits it to the backend.
    ///
    /// The result depends only on `frame`, so frames may be requested in any
    /// order and repeated freely.
    pub fn update(&mut self, frame: u32) -> Result<FrameState> {
        self.check_usable()?;
        let (Some(envelope), Some(handles)) = (self.envelope.as_ref(), self.handles.as_ref())
        else {
            return Err(SceneError::NotReady { state: self.state });
        };
        if !self.scene.clock().contains(frame) {
            tracing::debug!(frame, "frame lies outside the composition");
        }

        let state = self.scene.frame(frame, envelope);

        self.backend.set_camera(&state.camera)?;
        self.backend
            .set_group_rotation(SceneGroup::Tree, state.tree_rotation)?;
        self.backend
            .update_positions(handles.ground, &state.ground_positions)?;
        self.backend.update_material(
            handles.ground,
            state.ground_material.size,
            state.ground_material.opacity,
        )?;
        self.backend.draw(frame)?;

        tracing::trace!(
            frame,
            amplitude = state.audio_amplitude,
            pulse = state.pulse_scale,
            "frame updated"
        );
        Ok(state)
    }

    /// Releases every backend resource. Callable from any state; later calls
    /// do nothing.
    ///
    /// An analysis job that is still running (including an `ffmpeg` decode)
    /// is not interrupted. Its result is discarded, and dropping the runtime
    /// waits for the job to finish.
    pub fn dispose(&mut self) {
        if self.state == LifecycleState::Disposed {
            return;
        }
        self.envelope = None;

        if let Some(handles) = self.handles.take() {
            for handle in handles.all() {
                if let Err(err) = self.backend.release(handle) {
                    tracing::warn!(?handle, error = %err, "failed to release particle buffers");
                }
            }
        }

        tracing::info!(from = ?self.state, "scene disposed");
        self.state = LifecycleState::Disposed;
    }

    fn check_usable(&self) -> Result<()> {
        match self.state {
            LifecycleState::Failed => Err(SceneError::Failed),
            LifecycleState::Disposed => Err(SceneError::Disposed),
            _ => Ok(()),
        }
    }
}

impl<B: RenderBackend> Drop for SceneRuntime<B> {
    fn drop(&mut self) {
        self.dispose();
        if let Some(task) = self.task.take() {
            let locator = task.locator().clone();
            if let Err(err) = task.join() {
                tracing::debug!(%locator, error = %err, "discarded analysis job failed");
            }
        }
    }
}

fn register_scene<B: RenderBackend>(scene: &SceneState, backend: &mut B) -> Result<Handles> {
    let mut registered = Vec::new();
    match register_all(scene, backend, &mut registered) {
        Ok(handles) => Ok(handles),
        Err(err) => {
            for handle in registered {
                backend.release(handle).ok();
            }
            Err(SceneError::initialization(format!(
                "render backend rejected the scene: {err}"
            )))
        }
    }
}

/// Stars first so they sit behind everything drawn in registration order.
fn register_all<B: RenderBackend>(
    scene: &SceneState,
    backend: &mut B,
    registered: &mut Vec<ParticleHandle>,
) -> Result<Handles> {
    let stars = backend.register(scene.stars(), SceneGroup::Background)?;
    registered.push(stars);

    let mut tree = Vec::with_capacity(scene.tree_layers().len());
    for layer in scene.tree_layers() {
        let handle = backend.register(layer, SceneGroup::Tree)?;
        registered.push(handle);
        tree.push(handle);
    }

    let ground = backend.register(&scene.ground().base, SceneGroup::Tree)?;
    registered.push(ground);

    Ok(Handles {
        stars,
        tree,
        ground,
    })
}
