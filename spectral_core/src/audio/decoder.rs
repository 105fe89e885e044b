use anyhow::{Context, Result, anyhow};
use std::path::Path;

use symphonia::core::{
    audio::SampleBuffer,
    codecs::{CODEC_TYPE_NULL, DecoderOptions},
    errors::Error as SymphoniaError,
    formats::FormatOptions,
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
};

use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{Fft, FixedSync, Resampler};

use super::AudioBuffer;

/// Decode an audio file to mono and resample it to `target_rate`.
///
/// Any container/codec symphonia was built with is accepted (mp3, wav, flac,
/// vorbis). Errors here mean the file should be skipped, not that the batch
/// is broken.
pub fn load_audio<P: AsRef<Path>>(path: P, target_rate: u32) -> Result<AudioBuffer> {
    let decoded = decode_mono(path.as_ref())?;
    resample_mono(&decoded, target_rate)
}

/// Decode an audio file with symphonia and downmix to mono, keeping the
/// file's own sample rate.
pub fn decode_mono(path: &Path) -> Result<AudioBuffer> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open audio file: {}", path.display()))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .with_context(|| format!("unsupported format: {}", path.display()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| anyhow!("no supported audio tracks in {}", path.display()))?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|c| c.count());

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("failed to create decoder for selected track")?;

    let mut interleaved: Vec<f32> = Vec::new();
    let mut skipped_packets = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(_)) => break,
            Err(SymphoniaError::ResetRequired) => {
                return Err(anyhow!("chained streams are not supported"));
            }
            Err(e) => return Err(e).context("error reading next packet"),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::IoError(_)) | Err(SymphoniaError::DecodeError(_)) => {
                skipped_packets += 1;
                continue;
            }
            Err(SymphoniaError::ResetRequired) => {
                return Err(anyhow!("decoder reset required mid-stream"));
            }
            Err(e) => return Err(e).context("unrecoverable decode error"),
        };

        sample_rate.get_or_insert(decoded.spec().rate);
        channels.get_or_insert(decoded.spec().channels.count());

        let mut sbuf = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        sbuf.copy_interleaved_ref(decoded);
        interleaved.extend_from_slice(sbuf.samples());
    }

    if skipped_packets > 0 {
        tracing::warn!(
            "{}: skipped {} undecodable packets",
            path.display(),
            skipped_packets
        );
    }

    let sample_rate = sample_rate.ok_or_else(|| anyhow!("could not determine sample rate"))?;
    let channels = channels.ok_or_else(|| anyhow!("could not determine channel count"))?;

    if interleaved.is_empty() {
        return Err(anyhow!("decoded audio was empty: {}", path.display()));
    }

    Ok(AudioBuffer::new(downmix(interleaved, channels), sample_rate))
}

/// Average interleaved channels into a single mono channel.
pub fn downmix(interleaved: Vec<f32>, channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved;
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Resample a mono buffer with rubato's synchronous FFT resampler.
pub fn resample_mono(audio: &AudioBuffer, target_rate: u32) -> Result<AudioBuffer> {
    if audio.sample_rate == target_rate {
        return Ok(audio.clone());
    }
    if audio.is_empty() {
        return Ok(AudioBuffer::new(Vec::new(), target_rate));
    }

    let chunk_size: usize = 1024;
    let sub_chunks: usize = 1;

    let mut resampler = Fft::<f32>::new(
        audio.sample_rate as usize,
        target_rate as usize,
        chunk_size,
        sub_chunks,
        1,
        FixedSync::Input,
    )
    .context("failed to construct FFT resampler")?;

    let input_len = audio.len();
    let output_len = resampler.process_all_needed_output_len(input_len);
    let mut out = vec![0.0f32; output_len];

    let input_adapter =
        InterleavedSlice::new(&audio.samples, 1, input_len).context("bad input adapter")?;
    let mut output_adapter =
        InterleavedSlice::new_mut(&mut out, 1, output_len).context("bad output adapter")?;

    let (_frames_read, frames_written) = resampler.process_all_into_buffer(
        &input_adapter,
        &mut output_adapter,
        input_len,
        None,
    )?;

    out.truncate(frames_written);
    tracing::debug!(
        "resampled {} -> {} Hz: {} -> {} samples",
        audio.sample_rate,
        target_rate,
        input_len,
        out.len()
    );
    Ok(AudioBuffer::new(out, target_rate))
}
