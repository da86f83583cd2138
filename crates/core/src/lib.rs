//! Core library for the Particle Tree scene.
//!
//! The scene is an audio-reactive particle tree whose visual state is a pure
//! function of a frame index and a precomputed amplitude envelope, so frames
//! can be rendered offline in any order. Each module owns one subsystem:
//! geometry generation, audio analysis, the camera path, the per-frame state
//! update, the rendering backend seam and the lifecycle that ties them
//! together.

pub mod analysis;
pub mod assets;
pub mod audio;
pub mod camera;
pub mod config;
pub mod error;
pub mod geometry;
pub mod lifecycle;
pub mod mapping;
pub mod record;
pub mod render;
pub mod rng;
pub mod scene;
pub mod timeline;

pub use analysis::{AmplitudeSampler, AudioEnvelope, EnvelopeAnalyzer};
pub use assets::{AssetStore, AudioLocator};
pub use audio::{AnalysisProvider, CachedProvider, EnvelopeTask, FfmpegProvider, PcmProvider};
pub use camera::{camera_at, CameraState};
pub use config::{AppConfig, AudioConfig, StarfieldSeeding};
pub use error::{Result, SceneError};
pub use geometry::{GroundFormation, ParticleKind, ParticleSystem, PointMaterial};
pub use lifecycle::{LifecycleState, SceneRuntime};
pub use mapping::{GroundMaterial, GroundResponse};
pub use record::{Recorder, RecordingSettings};
pub use render::{RasterBackend, RenderBackend, RenderGraph, SceneGroup};
pub use scene::{FrameState, SceneState};
pub use timeline::SceneClock;
