//! Audio collaborators of the codec: decoding, resampling and WAV output.

pub mod decoder;
mod wav;

pub use decoder::{decode_mono, load_audio, resample_mono};
pub use wav::{load_wav, save_wav};

use std::path::Path;

use crate::error::Result;

/// Mono waveform at a known sample rate.
///
/// Samples are normalized PCM in roughly \[-1.0, 1.0\].
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Duration in seconds
    pub fn duration(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Save as 16-bit mono WAV
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_wav(path, &self.samples, self.sample_rate)
    }
}
