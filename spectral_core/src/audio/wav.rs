use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;

use super::AudioBuffer;
use crate::error::{CodecError, Result};

/// Write mono samples as 16-bit PCM. Samples outside \[-1, 1\] are clipped.
pub fn save_wav<P: AsRef<Path>>(path: P, samples: &[f32], sample_rate: u32) -> Result<()> {
    let path = path.as_ref();
    let wav_err = |source| CodecError::Wav {
        path: path.to_path_buf(),
        source,
    };

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec).map_err(wav_err)?;
    for &sample in samples {
        let scaled = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer.write_sample(scaled).map_err(wav_err)?;
    }
    writer.finalize().map_err(wav_err)?;
    Ok(())
}

/// Read a WAV file, averaging channels down to mono.
///
/// Only used for checking reconstructions; general input decoding goes
/// through [`super::decoder::load_audio`].
pub fn load_wav<P: AsRef<Path>>(path: P) -> Result<AudioBuffer> {
    let path = path.as_ref();
    let wav_err = |source| CodecError::Wav {
        path: path.to_path_buf(),
        source,
    };

    let reader = WavReader::open(path).map_err(wav_err)?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(wav_err)?,
        SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(wav_err)?
        }
    };

    let mono = super::decoder::downmix(samples, channels);
    Ok(AudioBuffer::new(mono, spec.sample_rate))
}
