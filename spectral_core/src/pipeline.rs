use crate::audio::AudioBuffer;
use crate::config::CodecConfig;
use crate::error::{CodecError, Result};
use crate::image::{ImageCodec, QuantizedImage};
use crate::segment::{Segments, segment_with_policy};
use crate::spectrogram::{LogMelSpectrogram, SpectrogramTransform};

/// End-to-end audio <-> image codec for one configuration.
///
/// Cheap to share by reference: every call is independent and touches no
/// shared mutable state.
#[derive(Debug, Clone)]
pub struct Pipeline {
    transform: SpectrogramTransform,
    codec: ImageCodec,
}

impl Pipeline {
    pub fn new(config: CodecConfig) -> Result<Self> {
        let codec = ImageCodec::for_top_db(config.top_db);
        let transform = SpectrogramTransform::new(config)?;
        Ok(Self { transform, codec })
    }

    pub fn config(&self) -> &CodecConfig {
        self.transform.config()
    }

    pub fn transform(&self) -> &SpectrogramTransform {
        &self.transform
    }

    pub fn codec(&self) -> &ImageCodec {
        &self.codec
    }

    /// Segments of `audio` under the configured size and tail policy.
    pub fn segments<'a>(&self, audio: &'a AudioBuffer) -> Result<Segments<'a>> {
        let config = self.config();
        if audio.sample_rate != config.sample_rate {
            return Err(CodecError::InvalidConfig(format!(
                "audio is {} Hz but the codec expects {} Hz",
                audio.sample_rate, config.sample_rate
            )));
        }
        segment_with_policy(&audio.samples, config.segment_size, config.partial_segment)
    }

    pub fn to_log_mel(&self, segment: &[f32]) -> Result<LogMelSpectrogram> {
        self.transform.to_log_mel(segment)
    }

    pub fn audio_to_image(&self, segment: &[f32]) -> Result<QuantizedImage> {
        let spec = self.transform.to_log_mel(segment)?;
        Ok(self.codec.encode(&spec))
    }

    pub fn image_to_audio(&self, image: &QuantizedImage) -> Result<Vec<f32>> {
        self.transform.from_log_mel(&self.codec.decode(image))
    }

    /// Reconstruct straight from a spectrogram, skipping quantization.
    pub fn log_mel_to_audio(&self, spec: &LogMelSpectrogram) -> Result<Vec<f32>> {
        self.transform.from_log_mel(spec)
    }

    /// Convert every segment of a buffer, in order.
    ///
    /// Stops at the first failing segment; callers that want per-segment
    /// isolation should drive [`Self::segments`] themselves.
    pub fn convert_audio(&self, audio: &AudioBuffer) -> Result<Vec<QuantizedImage>> {
        let segments = self.segments(audio)?;
        tracing::debug!(
            "{} samples -> {} segments of {}",
            audio.len(),
            segments.len(),
            segments.segment_size()
        );
        segments
            .iter()
            .map(|segment| self.audio_to_image(&segment))
            .collect()
    }
}
