//! 8-bit quantization of log-mel spectrograms.
//!
//! Rows are mel bands (row 0 = lowest band), columns are frames. Encode and
//! decode share one [`QuantRange`], so the affine map cannot drift between
//! the two directions.

use ndarray::Array2;

use crate::error::{CodecError, Result};
use crate::spectrogram::LogMelSpectrogram;

const LEVELS: f32 = 255.0;

/// Affine map between `[low, high]` dB and pixel values `[0, 255]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantRange {
    pub low: f32,
    pub high: f32,
}

impl QuantRange {
    /// `[-top_db, 0]`, the range every log-mel spectrogram lives in.
    pub fn for_top_db(top_db: f32) -> Self {
        Self {
            low: -top_db,
            high: 0.0,
        }
    }

    pub fn span(&self) -> f32 {
        self.high - self.low
    }

    /// Largest decode(encode(x)) error for an in-range `x`, `span / 255`.
    pub fn tolerance(&self) -> f32 {
        self.span() / LEVELS
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.low && value <= self.high
    }

    pub fn to_pixel(&self, value: f32) -> u8 {
        if !value.is_finite() {
            return 0;
        }
        let scaled = ((value - self.low) * LEVELS / self.span()).clamp(0.0, LEVELS);
        (scaled + 0.5).floor() as u8
    }

    pub fn to_value(&self, pixel: u8) -> f32 {
        self.low + pixel as f32 * self.span() / LEVELS
    }
}

/// Grayscale raster: `height = n_mels` rows, `width = n_frames` columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantizedImage {
    pixels: Array2<u8>,
}

impl QuantizedImage {
    pub fn new(pixels: Array2<u8>) -> Self {
        Self { pixels }
    }

    /// Build from row-major pixel bytes.
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Result<Self> {
        let actual = data.len();
        let pixels =
            Array2::from_shape_vec((height, width), data).map_err(|_| CodecError::ShapeMismatch {
                expected: (height, width),
                actual: (actual / width.max(1), width),
            })?;
        Ok(Self { pixels })
    }

    pub fn width(&self) -> usize {
        self.pixels.ncols()
    }

    pub fn height(&self) -> usize {
        self.pixels.nrows()
    }

    pub fn pixels(&self) -> &Array2<u8> {
        &self.pixels
    }

    /// Row-major pixel bytes, top row first.
    pub fn to_raw(&self) -> Vec<u8> {
        self.pixels.iter().copied().collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ImageCodec {
    range: QuantRange,
}

impl ImageCodec {
    pub fn new(range: QuantRange) -> Self {
        Self { range }
    }

    pub fn for_top_db(top_db: f32) -> Self {
        Self::new(QuantRange::for_top_db(top_db))
    }

    pub fn range(&self) -> QuantRange {
        self.range
    }

    /// Quantize to pixels, clamping anything outside the range.
    pub fn encode(&self, spec: &LogMelSpectrogram) -> QuantizedImage {
        if spec.top_db() != self.range.span() {
            tracing::debug!(
                "spectrogram clipped at {} dB, codec spans {} dB",
                spec.top_db(),
                self.range.span()
            );
        }
        let out_of_range = spec
            .values()
            .iter()
            .filter(|&&v| !self.range.contains(v))
            .count();
        if out_of_range > 0 {
            tracing::debug!(
                "clamped {} of {} values outside [{}, {}] dB",
                out_of_range,
                spec.values().len(),
                self.range.low,
                self.range.high
            );
        }
        QuantizedImage::new(spec.values().mapv(|v| self.range.to_pixel(v)))
    }

    /// Back to dB. The result carries the codec's span as its `top_db`.
    pub fn decode(&self, image: &QuantizedImage) -> LogMelSpectrogram {
        LogMelSpectrogram::new(
            image.pixels().mapv(|p| self.range.to_value(p)),
            self.range.span(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_spec(top_db: f32) -> LogMelSpectrogram {
        LogMelSpectrogram::new(
            Array2::from_shape_fn((16, 40), |(m, t)| {
                -top_db * ((m * 40 + t) as f32 / 639.0)
            }),
            top_db,
        )
    }

    #[test]
    fn test_range_endpoints() {
        let range = QuantRange::for_top_db(80.0);
        assert_eq!(range.to_pixel(-80.0), 0);
        assert_eq!(range.to_pixel(0.0), 255);
        assert_eq!(range.to_value(0), -80.0);
        assert_eq!(range.to_value(255), 0.0);
    }

    #[test]
    fn test_clamps_out_of_range() {
        let range = QuantRange::for_top_db(80.0);
        assert_eq!(range.to_pixel(-200.0), 0);
        assert_eq!(range.to_pixel(12.0), 255);
        assert_eq!(range.to_pixel(f32::NAN), 0);
        assert_eq!(range.to_pixel(f32::NEG_INFINITY), 0);
    }

    #[test]
    fn test_round_trip_within_tolerance() {
        for top_db in [40.0, 80.0, 120.0] {
            let codec = ImageCodec::for_top_db(top_db);
            let spec = ramp_spec(top_db);
            let decoded = codec.decode(&codec.encode(&spec));
            assert_eq!(decoded.shape(), spec.shape());
            assert_eq!(decoded.top_db(), top_db);
            let max_err = spec
                .values()
                .iter()
                .zip(decoded.values().iter())
                .map(|(a, b)| (a - b).abs())
                .fold(0.0f32, f32::max);
            assert!(max_err <= codec.range().tolerance(), "top_db={top_db}: {max_err}");
        }
    }

    #[test]
    fn test_orientation() {
        let codec = ImageCodec::for_top_db(80.0);
        let mut values = Array2::from_elem((4, 7), -80.0f32);
        values[[0, 6]] = 0.0;
        let image = codec.encode(&LogMelSpectrogram::new(values, 80.0));
        assert_eq!(image.height(), 4);
        assert_eq!(image.width(), 7);
        assert_eq!(image.pixels()[[0, 6]], 255);
        assert_eq!(image.to_raw()[6], 255);
    }

    #[test]
    fn test_pixels_survive_decode_encode() {
        let codec = ImageCodec::for_top_db(80.0);
        let raw: Vec<u8> = (0..=255u8).collect();
        let image = QuantizedImage::from_raw(32, 8, raw).unwrap();
        let again = codec.encode(&codec.decode(&image));
        assert_eq!(again, image);
    }

    #[test]
    fn test_from_raw_rejects_bad_length() {
        assert!(QuantizedImage::from_raw(10, 10, vec![0; 99]).is_err());
    }
}
