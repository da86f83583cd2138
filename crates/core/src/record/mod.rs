use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{render::FrameBuffer, Result};

/// Configuration options for the recording subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingSettings {
    pub output_dir: PathBuf,
    /// File name prefix; frames are written as `<prefix><frame:05>.png`.
    pub prefix: String,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("frames"),
            prefix: "frame-".to_string(),
        }
    }
}

/// Writes rasterized frames as a numbered PNG sequence for an external
/// muxer. Frames may arrive in any order; a repeated frame overwrites its
/// earlier file.
#[derive(Debug)]
pub struct Recorder {
    settings: RecordingSettings,
    written: usize,
}

impl Recorder {
    pub fn create(settings: RecordingSettings) -> Result<Self> {
        std::fs::create_dir_all(&settings.output_dir)?;
        tracing::debug!(dir = %settings.output_dir.display(), "recording frames");
        Ok(Self {
            settings,
            written: 0,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.settings.output_dir
    }

    pub fn frame_path(&self, frame: u32) -> PathBuf {
        self.settings
            .output_dir
            .join(format!("{}{frame:05}.png", self.settings.prefix))
    }

    pub fn write_frame(&mut self, frame: u32, buffer: &FrameBuffer) -> Result<()> {
        let path = self.frame_path(frame);
        buffer.to_rgba8().save(&path)?;
        self.written += 1;
        tracing::trace!(frame, path = %path.display(), "wrote frame");
        Ok(())
    }

    pub fn frames_written(&self) -> usize {
        self.written
    }
}
