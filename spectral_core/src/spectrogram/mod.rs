//! Log-mel spectrogram transform and its approximate inverse.
//!
//! Forward: centered STFT -> power spectrum -> Slaney mel projection ->
//! dB relative to the segment peak, floored at `-top_db`.
//!
//! Inverse: dB -> power -> non-negative mel pseudo-inverse -> magnitude ->
//! Griffin-Lim phase estimation -> exactly `segment_size` samples.

mod filterbank;
mod griffin_lim;
mod stft;

pub use filterbank::{MelFilterbank, hz_to_mel, mel_to_hz};
pub use griffin_lim::griffin_lim;
pub use stft::{Stft, hann_window};

use ndarray::{Array2, Axis};

use crate::config::CodecConfig;
use crate::error::{CodecError, Result};

/// Smallest power treated as non-silent before taking the logarithm.
pub const AMIN: f32 = 1e-10;

/// Log-mel spectrogram in dB relative to its segment's peak.
///
/// Shape is `(n_mels, n_frames)`: one row per mel band, one column per frame.
/// Values lie in `[-top_db, 0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogMelSpectrogram {
    values: Array2<f32>,
    top_db: f32,
}

impl LogMelSpectrogram {
    pub fn new(values: Array2<f32>, top_db: f32) -> Self {
        Self { values, top_db }
    }

    pub fn values(&self) -> &Array2<f32> {
        &self.values
    }

    /// Dynamic range the values were clipped to.
    pub fn top_db(&self) -> f32 {
        self.top_db
    }

    /// `(n_mels, n_frames)`
    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn n_mels(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_frames(&self) -> usize {
        self.values.ncols()
    }

    pub fn min(&self) -> f32 {
        self.values.iter().copied().fold(f32::INFINITY, f32::min)
    }

    pub fn max(&self) -> f32 {
        self.values.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }
}

/// Stateless forward/inverse spectrogram transform for one configuration.
///
/// Holds only precomputed tables (window, filterbank), so a single instance
/// can be shared across threads.
#[derive(Debug, Clone)]
pub struct SpectrogramTransform {
    config: CodecConfig,
    stft: Stft,
    filterbank: MelFilterbank,
}

impl SpectrogramTransform {
    pub fn new(config: CodecConfig) -> Result<Self> {
        config.validate()?;
        let stft = Stft::new(config.n_fft, config.hop_length());
        let filterbank = MelFilterbank::new(
            config.sample_rate,
            config.n_fft,
            config.n_mels,
            config.fmin,
            config.fmax_or_nyquist(),
        );
        Ok(Self {
            config,
            stft,
            filterbank,
        })
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Audio segment -> log-mel spectrogram of shape `(n_mels, n_frames)`.
    pub fn to_log_mel(&self, segment: &[f32]) -> Result<LogMelSpectrogram> {
        self.check_segment(segment)?;

        let spectrum = self.stft.forward(segment);
        let n_frames = spectrum.nrows();
        let mut mel = Array2::<f32>::zeros((self.config.n_mels, n_frames));
        let mut power = vec![0.0f32; self.stft.n_freqs()];
        let mut bands = vec![0.0f32; self.config.n_mels];

        for (t, frame) in spectrum.outer_iter().enumerate() {
            for (p, c) in power.iter_mut().zip(frame.iter()) {
                *p = c.norm_sqr();
            }
            self.filterbank.project(&power, &mut bands);
            mel.column_mut(t)
                .iter_mut()
                .zip(&bands)
                .for_each(|(dst, &v)| *dst = v);
        }

        Ok(LogMelSpectrogram::new(
            power_to_db(mel, self.config.top_db),
            self.config.top_db,
        ))
    }

    /// Log-mel spectrogram -> audio segment of exactly `segment_size` samples.
    pub fn from_log_mel(&self, spec: &LogMelSpectrogram) -> Result<Vec<f32>> {
        let expected = self.config.spectrogram_shape();
        if spec.shape() != expected {
            return Err(CodecError::ShapeMismatch {
                expected,
                actual: spec.shape(),
            });
        }

        let mel_power = db_to_power(spec.values());
        let n_freqs = self.stft.n_freqs();
        let mut magnitude = Array2::<f32>::zeros((spec.n_frames(), n_freqs));
        let mut bands = vec![0.0f32; spec.n_mels()];
        let mut linear = vec![0.0f32; n_freqs];

        for (t, mut row) in magnitude.outer_iter_mut().enumerate() {
            bands
                .iter_mut()
                .zip(mel_power.column(t))
                .for_each(|(dst, &v)| *dst = v);
            self.filterbank
                .invert(&bands, self.config.mel_inversion_iterations, &mut linear);
            row.iter_mut()
                .zip(&linear)
                .for_each(|(dst, &p)| *dst = p.max(0.0).sqrt());
        }

        let audio = griffin_lim(
            &self.stft,
            &magnitude,
            self.config.griffin_lim_iterations,
            self.config.griffin_lim_momentum,
            self.config.segment_size,
        );
        tracing::debug!(
            "reconstructed {} samples with {} Griffin-Lim iterations",
            audio.len(),
            self.config.griffin_lim_iterations
        );
        Ok(audio)
    }

    fn check_segment(&self, segment: &[f32]) -> Result<()> {
        if segment.len() != self.config.segment_size {
            return Err(CodecError::SegmentLength {
                expected: self.config.segment_size,
                actual: segment.len(),
            });
        }
        if let Some((index, &value)) = segment.iter().enumerate().find(|(_, s)| !s.is_finite()) {
            return Err(CodecError::NonFiniteSample { index, value });
        }
        Ok(())
    }
}

/// Power -> dB relative to the maximum, floored at `-top_db`.
///
/// An all-silent input (peak at or below [`AMIN`]) maps to `-top_db`
/// everywhere instead of the degenerate all-zero result.
pub fn power_to_db(mut power: Array2<f32>, top_db: f32) -> Array2<f32> {
    let peak = power.iter().copied().fold(0.0f32, f32::max);
    if peak <= AMIN {
        tracing::debug!("silent segment, filling spectrogram with -{} dB", top_db);
        power.fill(-top_db);
        return power;
    }
    let reference = 10.0 * peak.log10();
    power.mapv_inplace(|p| (10.0 * p.max(AMIN).log10() - reference).max(-top_db));
    power
}

/// dB (relative to a unit reference) -> power.
pub fn db_to_power(db: &Array2<f32>) -> Array2<f32> {
    db.mapv(|v| 10.0f32.powf(v / 10.0))
}

/// Mean level of each mel band across all frames.
pub fn band_means(spec: &LogMelSpectrogram) -> Vec<f32> {
    spec.values()
        .mean_axis(Axis(1))
        .map(|m| m.to_vec())
        .unwrap_or_default()
}
