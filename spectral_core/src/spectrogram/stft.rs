//! Centered short-time Fourier transform and its overlap-add inverse.

use ndarray::{Array2, ArrayView1};
use num_complex::Complex;
use rustfft::FftPlanner;
use std::f32::consts::PI;

/// Below this the summed window envelope is treated as zero during iSTFT.
const ENVELOPE_FLOOR: f32 = 1e-8;

/// STFT geometry shared by the forward and inverse passes.
///
/// Frames are centered: the signal is reflect-padded by `n_fft / 2` on both
/// sides, so a signal of `len` samples yields `len / hop + 1` frames.
#[derive(Debug, Clone)]
pub struct Stft {
    n_fft: usize,
    hop_length: usize,
    window: Vec<f32>,
}

impl Stft {
    pub fn new(n_fft: usize, hop_length: usize) -> Self {
        Self {
            n_fft,
            hop_length,
            window: hann_window(n_fft),
        }
    }

    pub fn n_freqs(&self) -> usize {
        self.n_fft / 2 + 1
    }

    pub fn n_frames(&self, signal_len: usize) -> usize {
        signal_len / self.hop_length + 1
    }

    /// Forward transform. Returns the one-sided spectrum, shape `(n_frames, n_fft/2 + 1)`.
    pub fn forward(&self, samples: &[f32]) -> Array2<Complex<f32>> {
        let n_fft = self.n_fft;
        let n_freqs = self.n_freqs();
        let padded = reflect_pad(samples, n_fft / 2);
        let n_frames = self.n_frames(samples.len());

        let fft = FftPlanner::<f32>::new().plan_fft_forward(n_fft);
        let mut scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        let mut buffer = vec![Complex::new(0.0f32, 0.0); n_fft];
        let mut spectrum = Array2::<Complex<f32>>::zeros((n_frames, n_freqs));

        for (t, mut row) in spectrum.outer_iter_mut().enumerate() {
            let start = t * self.hop_length;
            for (j, slot) in buffer.iter_mut().enumerate() {
                let sample = padded.get(start + j).copied().unwrap_or(0.0);
                *slot = Complex::new(sample * self.window[j], 0.0);
            }
            fft.process_with_scratch(&mut buffer, &mut scratch);
            for (dst, src) in row.iter_mut().zip(buffer.iter()) {
                *dst = *src;
            }
        }

        spectrum
    }

    /// Inverse transform by windowed overlap-add.
    ///
    /// The output is normalized by the summed squared window, stripped of the
    /// centering pad and cut or zero-extended to exactly `length` samples.
    pub fn inverse(&self, spectrum: &Array2<Complex<f32>>, length: usize) -> Vec<f32> {
        let n_fft = self.n_fft;
        let n_frames = spectrum.nrows();
        let pad = n_fft / 2;
        let total = n_fft + self.hop_length * n_frames.saturating_sub(1);

        let ifft = FftPlanner::<f32>::new().plan_fft_inverse(n_fft);
        let mut scratch = vec![Complex::new(0.0, 0.0); ifft.get_inplace_scratch_len()];
        let mut buffer = vec![Complex::new(0.0f32, 0.0); n_fft];
        let mut signal = vec![0.0f32; total];
        let mut envelope = vec![0.0f32; total];
        let scale = 1.0 / n_fft as f32;

        for (t, row) in spectrum.outer_iter().enumerate() {
            hermitian_fill(row, &mut buffer);
            ifft.process_with_scratch(&mut buffer, &mut scratch);

            let start = t * self.hop_length;
            for (j, value) in buffer.iter().enumerate() {
                let w = self.window[j];
                signal[start + j] += value.re * scale * w;
                envelope[start + j] += w * w;
            }
        }

        for (s, &e) in signal.iter_mut().zip(envelope.iter()) {
            if e > ENVELOPE_FLOOR {
                *s /= e;
            }
        }

        let mut out: Vec<f32> = signal.into_iter().skip(pad).take(length).collect();
        out.resize(length, 0.0);
        out
    }
}

/// Expand a one-sided spectrum into a full conjugate-symmetric FFT buffer.
fn hermitian_fill(half: ArrayView1<'_, Complex<f32>>, full: &mut [Complex<f32>]) {
    let n = full.len();
    let n_half = n / 2;
    for k in 0..=n_half {
        full[k] = half[k];
    }
    full[0].im = 0.0;
    if n % 2 == 0 {
        full[n_half].im = 0.0;
    }
    for k in 1..n - n_half {
        full[n - k] = half[k].conj();
    }
}

/// Reflect-pad (mirror without repeating the edge sample) by `pad` on both sides.
fn reflect_pad(samples: &[f32], pad: usize) -> Vec<f32> {
    let len = samples.len();
    let mut padded = Vec::with_capacity(len + 2 * pad);
    if len < 2 {
        padded.resize(pad, samples.first().copied().unwrap_or(0.0));
        padded.extend_from_slice(samples);
        padded.resize(len + 2 * pad, samples.last().copied().unwrap_or(0.0));
        return padded;
    }

    for i in (1..=pad).rev() {
        padded.push(samples[reflect_index(i as isize, len)]);
    }
    padded.extend_from_slice(samples);
    for i in 0..pad {
        padded.push(samples[reflect_index(len as isize + i as isize, len)]);
    }
    padded
}

fn reflect_index(i: isize, len: usize) -> usize {
    let period = 2 * (len as isize - 1);
    let mut k = i.rem_euclid(period);
    if k >= len as isize {
        k = period - k;
    }
    k as usize
}

/// Periodic Hann window.
pub fn hann_window(length: usize) -> Vec<f32> {
    (0..length)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / length as f32).cos()))
        .collect()
}
