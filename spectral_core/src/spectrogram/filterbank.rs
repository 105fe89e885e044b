//! Slaney-scale triangular mel filterbank.
//!
//! Filters are area-normalized the way `librosa.filters.mel(norm="slaney")`
//! does, and stored sparsely: each triangle only touches a few dozen FFT bins.

/// Guards divisions in the multiplicative inverse updates.
const EPS: f32 = 1e-12;

#[derive(Debug, Clone)]
struct MelFilter {
    /// First FFT bin with a non-zero weight
    start: usize,
    weights: Vec<f32>,
}

impl MelFilter {
    fn apply(&self, spectrum: &[f32]) -> f32 {
        self.weights
            .iter()
            .zip(&spectrum[self.start..])
            .map(|(w, s)| w * s)
            .sum()
    }
}

#[derive(Debug, Clone)]
pub struct MelFilterbank {
    filters: Vec<MelFilter>,
    n_freqs: usize,
    /// Sum of each filter's weights
    filter_area: Vec<f32>,
    /// Sum over filters of the weights touching each FFT bin
    bin_coverage: Vec<f32>,
}

impl MelFilterbank {
    pub fn new(sample_rate: u32, n_fft: usize, n_mels: usize, fmin: f32, fmax: f32) -> Self {
        let n_freqs = n_fft / 2 + 1;

        let mel_min = hz_to_mel(fmin);
        let mel_max = hz_to_mel(fmax);
        let hz_points: Vec<f32> = (0..n_mels + 2)
            .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f32 / (n_mels + 1) as f32))
            .collect();

        let fft_freqs: Vec<f32> = (0..n_freqs)
            .map(|k| k as f32 * sample_rate as f32 / n_fft as f32)
            .collect();

        let mut filters = Vec::with_capacity(n_mels);
        let mut empty = 0usize;
        for m in 0..n_mels {
            let (lower, center, upper) = (hz_points[m], hz_points[m + 1], hz_points[m + 2]);
            let enorm = 2.0 / (upper - lower);

            let dense: Vec<f32> = fft_freqs
                .iter()
                .map(|&f| {
                    let rising = (f - lower) / (center - lower);
                    let falling = (upper - f) / (upper - center);
                    rising.min(falling).max(0.0) * enorm
                })
                .collect();

            let first = dense.iter().position(|&w| w > 0.0);
            let last = dense.iter().rposition(|&w| w > 0.0);
            let filter = match (first, last) {
                (Some(first), Some(last)) => MelFilter {
                    start: first,
                    weights: dense[first..=last].to_vec(),
                },
                _ => {
                    empty += 1;
                    MelFilter {
                        start: 0,
                        weights: Vec::new(),
                    }
                }
            };
            filters.push(filter);
        }

        if empty > 0 {
            tracing::debug!(
                "{} of {} mel filters cover no FFT bin (n_fft={} too small for n_mels)",
                empty,
                n_mels,
                n_fft
            );
        }

        let filter_area = filters.iter().map(|f| f.weights.iter().sum()).collect();
        let mut bin_coverage = vec![0.0f32; n_freqs];
        for filter in &filters {
            for (k, w) in filter.weights.iter().enumerate() {
                bin_coverage[filter.start + k] += w;
            }
        }

        Self {
            filters,
            n_freqs,
            filter_area,
            bin_coverage,
        }
    }

    pub fn n_mels(&self) -> usize {
        self.filters.len()
    }

    pub fn n_freqs(&self) -> usize {
        self.n_freqs
    }

    /// Project one linear-frequency frame onto the mel bands.
    pub fn project(&self, spectrum: &[f32], out: &mut [f32]) {
        for (dst, filter) in out.iter_mut().zip(&self.filters) {
            *dst = filter.apply(spectrum);
        }
    }

    fn transpose_apply(&self, mel: &[f32], out: &mut [f32]) {
        out.fill(0.0);
        for (filter, &value) in self.filters.iter().zip(mel) {
            for (k, w) in filter.weights.iter().enumerate() {
                out[filter.start + k] += w * value;
            }
        }
    }

    /// Approximate non-negative inverse of [`Self::project`] for one frame.
    ///
    /// Starts from a coverage-weighted spread of each band's mean level over
    /// its bins, then runs `iterations` multiplicative least-squares updates
    /// (`s <- s * Mᵀy / MᵀMs`). Bins no filter covers come back as zero.
    pub fn invert(&self, mel: &[f32], iterations: usize, out: &mut [f32]) {
        let n_mels = self.filters.len();

        let band_level: Vec<f32> = mel
            .iter()
            .zip(&self.filter_area)
            .map(|(&v, &area)| if area > 0.0 { v.max(0.0) / area } else { 0.0 })
            .collect();
        self.transpose_apply(&band_level, out);
        for (s, &coverage) in out.iter_mut().zip(&self.bin_coverage) {
            *s = if coverage > 0.0 { *s / coverage } else { 0.0 };
        }

        if iterations == 0 {
            return;
        }

        let target: Vec<f32> = mel.iter().map(|v| v.max(0.0)).collect();
        let mut numerator = vec![0.0f32; self.n_freqs];
        self.transpose_apply(&target, &mut numerator);

        let mut projected = vec![0.0f32; n_mels];
        let mut denominator = vec![0.0f32; self.n_freqs];
        for _ in 0..iterations {
            self.project(out, &mut projected);
            self.transpose_apply(&projected, &mut denominator);
            for ((s, &num), &den) in out.iter_mut().zip(&numerator).zip(&denominator) {
                *s *= num / (den + EPS);
            }
        }
    }
}

/// Hz to mel, Slaney scale: linear below 1 kHz, logarithmic above.
pub fn hz_to_mel(f: f32) -> f32 {
    const F_SP: f32 = 200.0 / 3.0;
    const MIN_LOG_HZ: f32 = 1000.0;
    const MIN_LOG_MEL: f32 = MIN_LOG_HZ / F_SP;
    const LOGSTEP: f32 = 0.068_751_74; // ln(6.4) / 27

    if f < MIN_LOG_HZ {
        f / F_SP
    } else {
        MIN_LOG_MEL + (f / MIN_LOG_HZ).ln() / LOGSTEP
    }
}

pub fn mel_to_hz(m: f32) -> f32 {
    const F_SP: f32 = 200.0 / 3.0;
    const MIN_LOG_HZ: f32 = 1000.0;
    const MIN_LOG_MEL: f32 = MIN_LOG_HZ / F_SP;
    const LOGSTEP: f32 = 0.068_751_74;

    if m < MIN_LOG_MEL {
        m * F_SP
    } else {
        MIN_LOG_HZ * ((m - MIN_LOG_MEL) * LOGSTEP).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank() -> MelFilterbank {
        MelFilterbank::new(22050, 2048, 128, 0.0, 11025.0)
    }

    #[test]
    fn test_mel_scale_round_trip() {
        for hz in [0.0, 250.0, 999.0, 1000.0, 4000.0, 11025.0] {
            let back = mel_to_hz(hz_to_mel(hz));
            assert!((back - hz).abs() < 0.05 * hz.max(1.0), "{hz} -> {back}");
        }
        assert!((hz_to_mel(1000.0) - 15.0).abs() < 1e-4);
    }

    #[test]
    fn test_filterbank_shape_and_sign() {
        let fb = bank();
        assert_eq!(fb.n_mels(), 128);
        assert_eq!(fb.n_freqs(), 1025);
        for filter in &fb.filters {
            assert!(filter.weights.iter().all(|&w| w >= 0.0));
            assert!(filter.start + filter.weights.len() <= fb.n_freqs());
        }
    }

    #[test]
    fn test_filter_centers_increase() {
        let fb = bank();
        let peaks: Vec<f32> = fb
            .filters
            .iter()
            .filter(|f| !f.weights.is_empty())
            .map(|f| {
                let (k, _) = f
                    .weights
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1.total_cmp(b.1))
                    .unwrap();
                (f.start + k) as f32
            })
            .collect();
        assert!(peaks.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_project_flat_spectrum() {
        let fb = bank();
        let flat = vec![1.0f32; fb.n_freqs()];
        let mut mel = vec![0.0f32; fb.n_mels()];
        fb.project(&flat, &mut mel);
        for (value, area) in mel.iter().zip(&fb.filter_area) {
            assert!((value - area).abs() < 1e-4);
        }
    }

    #[test]
    fn test_invert_flat_spectrum() {
        let fb = bank();
        let flat = vec![2.0f32; fb.n_freqs()];
        let mut mel = vec![0.0f32; fb.n_mels()];
        fb.project(&flat, &mut mel);

        let mut recovered = vec![0.0f32; fb.n_freqs()];
        fb.invert(&mel, 8, &mut recovered);
        // Interior bins are well covered by overlapping filters
        for &value in &recovered[50..1000] {
            assert!((value - 2.0).abs() < 0.2, "recovered {value}");
        }
        assert!(recovered.iter().all(|v| v.is_finite() && *v >= 0.0));
    }

    #[test]
    fn test_invert_reduces_projection_error() {
        let fb = bank();
        let spectrum: Vec<f32> = (0..fb.n_freqs())
            .map(|k| 1.0 + (k as f32 / 40.0).sin().abs() * 4.0)
            .collect();
        let mut mel = vec![0.0f32; fb.n_mels()];
        fb.project(&spectrum, &mut mel);

        let error = |iterations: usize| {
            let mut recovered = vec![0.0f32; fb.n_freqs()];
            fb.invert(&mel, iterations, &mut recovered);
            let mut reprojected = vec![0.0f32; fb.n_mels()];
            fb.project(&recovered, &mut reprojected);
            mel.iter()
                .zip(&reprojected)
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f32>()
        };
        assert!(error(16) <= error(0));
    }

    #[test]
    fn test_invert_silence() {
        let fb = bank();
        let mel = vec![0.0f32; fb.n_mels()];
        let mut recovered = vec![1.0f32; fb.n_freqs()];
        fb.invert(&mel, 4, &mut recovered);
        assert!(recovered.iter().all(|&v| v == 0.0));
    }
}
