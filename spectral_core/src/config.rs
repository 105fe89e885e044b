//! Codec configuration.
//!
//! One `CodecConfig` drives every stage of the codec: the segment length, the
//! STFT geometry, the mel projection, the dB clip and the reconstruction
//! budget. Defaults reproduce the reference preprocessing setup.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CodecError, Result};

/// What to do with the trailing samples that do not fill a whole segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialSegmentPolicy {
    /// Discard the remainder. A file of `L` samples yields `L / segment_size` segments.
    #[default]
    Drop,
    /// Emit the remainder as a final segment, zero-padded to `segment_size`.
    ZeroPad,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Segment length in samples (power of two)
    pub segment_size: usize,
    /// Target sample rate in Hz; audio is resampled to this before segmenting
    pub sample_rate: u32,
    /// Number of mel bands (image height)
    pub n_mels: usize,
    /// Number of STFT frames per segment (image width)
    pub n_frames: usize,
    /// FFT window size
    pub n_fft: usize,
    /// Lowest mel filter edge in Hz
    pub fmin: f32,
    /// Highest mel filter edge in Hz (defaults to Nyquist)
    pub fmax: Option<f32>,
    /// Dynamic range below the segment peak kept after dB compression
    pub top_db: f32,
    /// Fixed Griffin-Lim iteration count
    pub griffin_lim_iterations: usize,
    /// Griffin-Lim momentum (0 disables acceleration)
    pub griffin_lim_momentum: f32,
    /// Non-negative refinement steps for the mel pseudo-inverse
    pub mel_inversion_iterations: usize,
    /// Handling of the trailing partial segment
    pub partial_segment: PartialSegmentPolicy,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            segment_size: 1 << 19,
            sample_rate: 22050,
            n_mels: 256,
            n_frames: 513,
            n_fft: 2048,
            fmin: 0.0,
            fmax: None,
            top_db: 80.0,
            griffin_lim_iterations: 32,
            griffin_lim_momentum: 0.99,
            mel_inversion_iterations: 8,
            partial_segment: PartialSegmentPolicy::Drop,
        }
    }
}

impl CodecConfig {
    /// Load and validate a config from a JSON file. Missing fields take
    /// their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let config = Self::read_json_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON config without validating it, for callers that still
    /// apply overrides before calling [`Self::validate`].
    pub fn read_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config: {}", path.display()))
    }

    /// Hop between consecutive STFT frames.
    ///
    /// Centered framing yields `segment_size / hop + 1` frames, so the hop is
    /// picked to land exactly on `n_frames`.
    pub fn hop_length(&self) -> usize {
        self.segment_size / self.n_frames.saturating_sub(1).max(1)
    }

    /// Number of linear frequency bins per STFT frame.
    pub fn n_freqs(&self) -> usize {
        self.n_fft / 2 + 1
    }

    pub fn fmax_or_nyquist(&self) -> f32 {
        self.fmax.unwrap_or(self.sample_rate as f32 / 2.0)
    }

    /// Shape `(n_mels, n_frames)` of every spectrogram this config produces.
    pub fn spectrogram_shape(&self) -> (usize, usize) {
        (self.n_mels, self.n_frames)
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(CodecError::InvalidConfig(msg));

        if self.segment_size == 0 || !self.segment_size.is_power_of_two() {
            return fail(format!(
                "segment_size must be a power of two, got {}",
                self.segment_size
            ));
        }
        if self.n_frames < 2 {
            return fail(format!("n_frames must be at least 2, got {}", self.n_frames));
        }
        if self.segment_size % (self.n_frames - 1) != 0 {
            return fail(format!(
                "segment_size {} is not divisible by n_frames - 1 = {}",
                self.segment_size,
                self.n_frames - 1
            ));
        }
        if self.n_fft < 2 {
            return fail(format!("n_fft must be at least 2, got {}", self.n_fft));
        }
        if self.hop_length() > self.n_fft {
            return fail(format!(
                "hop length {} exceeds n_fft {}; frames would not overlap",
                self.hop_length(),
                self.n_fft
            ));
        }
        if self.n_fft / 2 >= self.segment_size {
            return fail(format!(
                "n_fft {} is too large for segment_size {}",
                self.n_fft, self.segment_size
            ));
        }
        if self.n_mels == 0 {
            return fail("n_mels must be positive".to_string());
        }
        if self.sample_rate == 0 {
            return fail("sample_rate must be positive".to_string());
        }
        if !(self.top_db.is_finite() && self.top_db > 0.0) {
            return fail(format!("top_db must be finite and positive, got {}", self.top_db));
        }
        let fmax = self.fmax_or_nyquist();
        if !(self.fmin >= 0.0 && self.fmin < fmax && fmax <= self.sample_rate as f32 / 2.0) {
            return fail(format!(
                "mel range [{}, {}] must satisfy 0 <= fmin < fmax <= nyquist",
                self.fmin, fmax
            ));
        }
        if !(0.0..1.0).contains(&self.griffin_lim_momentum) {
            return fail(format!(
                "griffin_lim_momentum must be in [0, 1), got {}",
                self.griffin_lim_momentum
            ));
        }
        Ok(())
    }
}
