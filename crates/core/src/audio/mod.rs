//! Audio analysis providers and the background job that turns an audio
//! resource into an [`AudioEnvelope`].

use std::{
    path::{Path, PathBuf},
    process::Command,
    sync::Arc,
    thread::{self, JoinHandle},
};

use crate::{
    analysis::{AudioEnvelope, EnvelopeAnalyzer},
    assets::AudioLocator,
    config::AudioConfig,
    Result, SceneError,
};

/// Produces the amplitude envelope of an audio resource.
///
/// Implementations run on the background loading thread, so they must be
/// shareable across threads.
pub trait AnalysisProvider: Send + Sync + 'static {
    fn analyse(&self, locator: &AudioLocator) -> Result<AudioEnvelope>;
}

impl<F> AnalysisProvider for F
where
    F: Fn(&AudioLocator) -> Result<AudioEnvelope> + Send + Sync + 'static,
{
    fn analyse(&self, locator: &AudioLocator) -> Result<AudioEnvelope> {
        self(locator)
    }
}

/// Decodes audio through an external `ffmpeg` binary and analyses it.
#[derive(Debug, Clone)]
pub struct FfmpegProvider {
    program: PathBuf,
    audio: AudioConfig,
    fps: u32,
}

impl FfmpegProvider {
    pub fn new(audio: AudioConfig, fps: u32) -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            audio,
            fps,
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }
}

impl AnalysisProvider for FfmpegProvider {
    fn analyse(&self, locator: &AudioLocator) -> Result<AudioEnvelope> {
        let samples = decode_mono_f32(&self.program, locator.path(), self.audio.sample_rate)?;
        tracing::debug!(%locator, samples = samples.len(), "decoded audio");
        EnvelopeAnalyzer::from_config(&self.audio).analyse(&samples, self.fps)
    }
}

/// Loads an envelope previously written by [`AudioEnvelope::save`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CachedProvider;

impl AnalysisProvider for CachedProvider {
    fn analyse(&self, locator: &AudioLocator) -> Result<AudioEnvelope> {
        AudioEnvelope::load(locator.path()).map_err(|err| {
            SceneError::audio(format!("failed to load envelope cache {locator}: {err}"))
        })
    }
}

/// Analyses samples that are already in memory; the locator is ignored.
#[derive(Debug, Clone)]
pub struct PcmProvider {
    samples: Arc<Vec<f32>>,
    audio: AudioConfig,
    fps: u32,
}

impl PcmProvider {
    pub fn new(samples: Vec<f32>, audio: AudioConfig, fps: u32) -> Self {
        Self {
            samples: Arc::new(samples),
            audio,
            fps,
        }
    }
}

impl AnalysisProvider for PcmProvider {
    fn analyse(&self, _locator: &AudioLocator) -> Result<AudioEnvelope> {
        EnvelopeAnalyzer::from_config(&self.audio).analyse(&self.samples, self.fps)
    }
}

/// Runs `ffmpeg` and collects mono little-endian `f32` PCM from its stdout.
pub fn decode_mono_f32(program: &Path, path: &Path, sample_rate: u32) -> Result<Vec<f32>> {
    if !path.is_file() {
        return Err(SceneError::audio(format!(
            "audio resource {} does not exist",
            path.display()
        )));
    }

    let out = Command::new(program)
        .args(["-v", "error", "-i"])
        .arg(path)
        .args([
            "-vn",
            "-f",
            "f32le",
            "-acodec",
            "pcm_f32le",
            "-ac",
            "1",
            "-ar",
            &sample_rate.to_string(),
            "pipe:1",
        ])
        .output()
        .map_err(|e| SceneError::audio(format!("failed to run ffmpeg for audio decode: {e}")))?;

    if !out.status.success() {
        let msg = String::from_utf8_lossy(&out.stderr);
        return Err(SceneError::audio(format!(
            "ffmpeg audio decode failed for '{}': {}",
            path.display(),
            msg.trim()
        )));
    }

    pcm_from_le_bytes(&out.stdout)
}

fn pcm_from_le_bytes(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(SceneError::audio(
            "decoded audio byte length is not aligned to f32 samples",
        ));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Envelope computation running on a background thread.
#[derive(Debug)]
pub struct EnvelopeTask {
    locator: AudioLocator,
    handle: JoinHandle<Result<AudioEnvelope>>,
}

impl EnvelopeTask {
    pub fn spawn(provider: Arc<dyn AnalysisProvider>, locator: AudioLocator) -> Result<Self> {
        let job_locator = locator.clone();
        let handle = thread::Builder::new()
            .name("envelope-analysis".to_string())
            .spawn(move || provider.analyse(&job_locator))?;
        Ok(Self { locator, handle })
    }

    pub fn locator(&self) -> &AudioLocator {
        &self.locator
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Blocks until the analysis completes.
    pub fn join(self) -> Result<AudioEnvelope> {
        self.handle
            .join()
            .map_err(|_| SceneError::audio(format!("analysis of {} panicked", self.locator)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_act_as_providers() {
        let provider = |_: &AudioLocator| AudioEnvelope::silent(60.0, 32, 4);
        let envelope = provider.analyse(&AudioLocator::new("unused")).unwrap();
        assert_eq!(envelope.frame_count(), 4);
    }

    #[test]
    fn background_task_yields_the_envelope() {
        let provider: Arc<dyn AnalysisProvider> =
            Arc::new(PcmProvider::new(vec![0.0; 48_000], AudioConfig::default(), 60));
        let task = EnvelopeTask::spawn(provider, AudioLocator::new("memory")).unwrap();
        let envelope = task.join().unwrap();
        assert_eq!(envelope.frame_count(), 60);
        assert_eq!(envelope.bins_per_frame(), 32);
    }

    #[test]
    fn provider_errors_surface_through_join() {
        let provider: Arc<dyn AnalysisProvider> =
            Arc::new(|_: &AudioLocator| -> Result<AudioEnvelope> {
                Err(SceneError::audio("decode error"))
            });
        let task = EnvelopeTask::spawn(provider, AudioLocator::new("broken.mp3")).unwrap();
        let err = task.join().unwrap_err();
        assert!(err.to_string().contains("decode error"));
    }

    #[test]
    fn missing_files_fail_before_decoding() {
        let err = decode_mono_f32(
            Path::new("ffmpeg"),
            Path::new("/definitely/not/here.mp3"),
            48_000,
        )
        .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn pcm_bytes_must_align() {
        assert!(pcm_from_le_bytes(&[0, 0, 0]).is_err());
        let samples = pcm_from_le_bytes(&1.5_f32.to_le_bytes()).unwrap();
        assert_eq!(samples, vec![1.5]);
    }
}
