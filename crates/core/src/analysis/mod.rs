//! Offline spectral analysis of decoded audio into a per-frame amplitude
//! envelope, and the sampler that reduces one envelope row to the scalar
//! driving the ground formation.

use std::{f32::consts::PI, fmt, path::Path, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};

use crate::{config::AudioConfig, Result, SceneError};

/// Time-indexed table of per-bin amplitudes, lowest frequencies first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioEnvelope {
    frames_per_second: f64,
    bins_per_frame: usize,
    values: Vec<f32>,
}

impl AudioEnvelope {
    pub fn new(frames_per_second: f64, bins_per_frame: usize, values: Vec<f32>) -> Result<Self> {
        if !(frames_per_second > 0.0) {
            return Err(SceneError::audio("envelope rate must be positive"));
        }
        if bins_per_frame == 0 {
            return Err(SceneError::audio("envelope needs at least one bin per frame"));
        }
        if values.len() % bins_per_frame != 0 {
            return Err(SceneError::audio(format!(
                "envelope holds {} values, not a multiple of {bins_per_frame} bins",
                values.len()
            )));
        }
        Ok(Self {
            frames_per_second,
            bins_per_frame,
            values,
        })
    }

    /// Envelope of the given length in which every bin is zero.
    pub fn silent(frames_per_second: f64, bins_per_frame: usize, frames: usize) -> Result<Self> {
        Self::new(
            frames_per_second,
            bins_per_frame,
            vec![0.0; frames * bins_per_frame],
        )
    }

    pub fn frames_per_second(&self) -> f64 {
        self.frames_per_second
    }

    pub fn bins_per_frame(&self) -> usize {
        self.bins_per_frame
    }

    pub fn frame_count(&self) -> usize {
        self.values.len() / self.bins_per_frame
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frame_count() as f64 / self.frames_per_second
    }

    pub fn row(&self, index: usize) -> Option<&[f32]> {
        let start = index.checked_mul(self.bins_per_frame)?;
        self.values.get(start..start + self.bins_per_frame)
    }

    /// Row covering `seconds`, or `None` outside the analysed range.
    pub fn row_at(&self, seconds: f64) -> Option<&[f32]> {
        if !(seconds >= 0.0) {
            return None;
        }
        // Tolerate rounding so frame-aligned timestamps land on their own row.
        self.row((seconds * self.frames_per_second + 1e-9).floor() as usize)
    }

    pub fn peak(&self) -> f32 {
        self.values.iter().copied().fold(0.0, f32::max)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_vec(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read(path)?;
        let parsed: Self = serde_json::from_slice(&raw)?;
        // Re-validate the shape; the file may have been edited by hand.
        Self::new(parsed.frames_per_second, parsed.bins_per_frame, parsed.values)
    }
}

/// Reduces an envelope row to the scalar that drives the ground formation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmplitudeSampler {
    pub fps: u32,
    pub window: usize,
    pub gain: f64,
}

impl AmplitudeSampler {
    pub fn new(fps: u32, audio: &AudioConfig) -> Self {
        Self {
            fps,
            window: audio.sample_window,
            gain: audio.gain,
        }
    }

    /// Loudest bin among the first `window` bins of the row under `frame`,
    /// scaled by the gain. Frames past the analysed audio read as silence.
    pub fn sample(&self, envelope: &AudioEnvelope, frame: u32) -> f64 {
        let seconds = f64::from(frame) / f64::from(self.fps);
        let peak = envelope
            .row_at(seconds)
            .map(|row| {
                row.iter()
                    .take(self.window)
                    .copied()
                    .fold(0.0_f32, f32::max)
            })
            .unwrap_or(0.0);
        f64::from(peak) * self.gain
    }
}

/// Computes [`AudioEnvelope`]s from mono PCM with a windowed real FFT.
///
/// One envelope row is produced per output frame. Each row analyses
/// `block_size` samples starting at the frame's timestamp (zero padded past
/// the end of the audio); the positive half of the spectrum is split into
/// `bins` equal-width bands and each band keeps its peak magnitude,
/// normalised so that a full-scale sine reads close to 1.0.
pub struct EnvelopeAnalyzer {
    sample_rate: u32,
    block_size: usize,
    bins: usize,
    planner: RealFftPlanner<f32>,
    fft: Option<FftResources>,
}

impl EnvelopeAnalyzer {
    pub fn new(sample_rate: u32, block_size: usize, bins: usize) -> Self {
        Self {
            sample_rate,
            block_size,
            bins,
            planner: RealFftPlanner::new(),
            fft: None,
        }
    }

    pub fn from_config(audio: &AudioConfig) -> Self {
        Self::new(audio.sample_rate, audio.block_size, audio.sample_window)
    }

    /// Analyses the whole signal at `frames_per_second` rows per second.
    pub fn analyse(&mut self, samples: &[f32], frames_per_second: u32) -> Result<AudioEnvelope> {
        if self.block_size < 2 {
            return Err(SceneError::audio(
                "analysis requires blocks with at least two samples",
            ));
        }
        if self.bins == 0 || self.bins > self.block_size / 2 {
            return Err(SceneError::audio(format!(
                "cannot split a {}-sample block into {} bins",
                self.block_size, self.bins
            )));
        }
        if frames_per_second == 0 || self.sample_rate == 0 {
            return Err(SceneError::audio("analysis rates must be positive"));
        }

        let rate = f64::from(frames_per_second);
        let duration = samples.len() as f64 / f64::from(self.sample_rate);
        let frames = (duration * rate).ceil() as usize;
        let mut values = Vec::with_capacity(frames * self.bins);

        for frame in 0..frames {
            let start = ((frame as f64 / rate) * f64::from(self.sample_rate)).floor() as usize;
            let row = self.analyse_block(samples, start)?;
            values.extend_from_slice(&row);
        }

        tracing::debug!(
            frames,
            bins = self.bins,
            duration_seconds = duration,
            "analysed audio envelope"
        );
        AudioEnvelope::new(rate, self.bins, values)
    }

    fn analyse_block(&mut self, samples: &[f32], start: usize) -> Result<Vec<f32>> {
        let len = self.block_size;
        let bins = self.bins;
        let fft = self.prepare_fft(len);

        for (index, slot) in fft.input.iter_mut().enumerate() {
            let sample = samples.get(start + index).copied().unwrap_or(0.0);
            *slot = sample * hann_value(index, len);
        }

        fft.plan
            .process_with_scratch(&mut fft.input, &mut fft.spectrum, &mut fft.scratch)
            .map_err(|err| SceneError::audio(format!("fft failed: {err}")))?;

        // A Hann-windowed sine of amplitude A peaks at A * N / 4.
        let norm = 4.0 / len as f32;
        let usable = len / 2;
        let band_width = usable / bins;
        let row = (0..bins)
            .map(|band| {
                fft.spectrum[band * band_width..(band + 1) * band_width]
                    .iter()
                    .map(|bin| bin.norm() * norm)
                    .fold(0.0_f32, f32::max)
            })
            .collect();
        Ok(row)
    }

    fn prepare_fft(&mut self, size: usize) -> &mut FftResources {
        let planner = &mut self.planner;
        let fft = self.fft.get_or_insert_with(|| FftResources::plan(planner, size));
        if fft.size != size {
            *fft = FftResources::plan(planner, size);
        }
        fft
    }
}

struct FftResources {
    size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl FftResources {
    fn plan(planner: &mut RealFftPlanner<f32>, size: usize) -> Self {
        let plan = planner.plan_fft_forward(size);
        Self {
            size,
            scratch: plan.make_scratch_vec(),
            spectrum: plan.make_output_vec(),
            input: plan.make_input_vec(),
            plan,
        }
    }
}

impl fmt::Debug for EnvelopeAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvelopeAnalyzer")
            .field("sample_rate", &self.sample_rate)
            .field("block_size", &self.block_size)
            .field("bins", &self.bins)
            .finish()
    }
}

fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }

    0.5 - 0.5 * ((2.0 * PI * index as f32) / (len as f32 - 1.0)).cos()
}
