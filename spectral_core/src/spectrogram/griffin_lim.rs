use ndarray::{Array2, Zip};
use num_complex::Complex;

use super::stft::Stft;

const PHASE_EPS: f32 = 1e-16;

/// Fast Griffin-Lim phase estimation with a fixed iteration budget.
///
/// `magnitude` has the forward STFT layout `(n_frames, n_freqs)`. Phase
/// starts at zero for every bin, so the result is deterministic.
pub fn griffin_lim(
    stft: &Stft,
    magnitude: &Array2<f32>,
    iterations: usize,
    momentum: f32,
    length: usize,
) -> Vec<f32> {
    let mut angles = magnitude.mapv(|_| Complex::new(1.0f32, 0.0));
    let mut previous: Option<Array2<Complex<f32>>> = None;
    let mut spectrum = Array2::<Complex<f32>>::zeros(magnitude.raw_dim());
    let accel = momentum / (1.0 + momentum);

    for _ in 0..iterations {
        Zip::from(&mut spectrum)
            .and(magnitude)
            .and(&angles)
            .for_each(|s, &m, &a| *s = a * m);
        let estimate = stft.inverse(&spectrum, length);
        let rebuilt = stft.forward(&estimate);

        match &previous {
            Some(prev) => Zip::from(&mut angles)
                .and(&rebuilt)
                .and(prev)
                .for_each(|a, &r, &p| *a = unit(r - p * accel)),
            None => Zip::from(&mut angles)
                .and(&rebuilt)
                .for_each(|a, &r| *a = unit(r)),
        }
        previous = Some(rebuilt);
    }

    Zip::from(&mut spectrum)
        .and(magnitude)
        .and(&angles)
        .for_each(|s, &m, &a| *s = a * m);
    stft.inverse(&spectrum, length)
}

fn unit(c: Complex<f32>) -> Complex<f32> {
    c / (c.norm() + PHASE_EPS)
}
