//! File-level scenarios: decode, resample, segment, encode, store, reload,
//! reconstruct.

use std::f32::consts::PI;

use spectral_core::audio::{load_audio, load_wav, save_wav};
use spectral_core::storage::{load_png, save_png, slice_file_name};
use spectral_core::{CodecConfig, Pipeline};

fn tone(len: usize, sample_rate: u32) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            0.3 * (2.0 * PI * 330.0 * t).sin() + 0.1 * (2.0 * PI * 2200.0 * t).sin()
        })
        .collect()
}

#[test]
fn test_48k_file_to_images_and_back() {
    let segment_size = 1 << 14;
    let config = CodecConfig {
        segment_size,
        sample_rate: 22050,
        n_mels: 256,
        n_frames: 513,
        griffin_lim_iterations: 2,
        ..Default::default()
    };
    let pipeline = Pipeline::new(config).unwrap();

    // Enough 48 kHz material for a little over two 22.05 kHz segments
    let source_len = (2.1 * segment_size as f64 * 48000.0 / 22050.0) as usize;
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("crecy.wav");
    save_wav(&source, &tone(source_len, 48000), 48000).unwrap();

    let audio = load_audio(&source, 22050).unwrap();
    assert_eq!(audio.sample_rate, 22050);

    let segments = pipeline.segments(&audio).unwrap();
    assert_eq!(segments.len(), 2);

    for (index, segment) in segments.iter().enumerate() {
        assert_eq!(segment.len(), segment_size);

        let image = pipeline.audio_to_image(&segment).unwrap();
        assert_eq!((image.width(), image.height()), (513, 256));

        let png_path = dir.path().join(slice_file_name(index, "crecy", "png"));
        save_png(&image, &png_path).unwrap();
        let reloaded = load_png(&png_path).unwrap();
        assert_eq!(reloaded, image);

        let wav_path = dir.path().join(slice_file_name(index, "crecy", "wav"));
        let rebuilt = pipeline.image_to_audio(&reloaded).unwrap();
        save_wav(&wav_path, &rebuilt, 22050).unwrap();

        let written = load_wav(&wav_path).unwrap();
        assert_eq!(written.sample_rate, 22050);
        assert_eq!(written.len(), segment_size);
    }
}

#[test]
fn test_reference_configuration_round_trip() {
    let config = CodecConfig {
        segment_size: 1 << 18,
        sample_rate: 48000,
        n_mels: 256,
        top_db: 80.0,
        griffin_lim_iterations: 1,
        ..Default::default()
    };
    let pipeline = Pipeline::new(config).unwrap();
    let segment = tone(1 << 18, 48000);

    let spec = pipeline.to_log_mel(&segment).unwrap();
    assert_eq!(spec.shape(), (256, 513));
    assert!(spec.max() <= 0.0 && spec.min() >= -80.0);

    let image = pipeline.codec().encode(&spec);
    assert_eq!((image.width(), image.height()), (513, 256));

    let decoded = pipeline.codec().decode(&image);
    let max_err = spec
        .values()
        .iter()
        .zip(decoded.values().iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0f32, f32::max);
    assert!(max_err <= 80.0 / 255.0);

    assert_eq!(pipeline.log_mel_to_audio(&spec).unwrap().len(), 1 << 18);
    assert_eq!(pipeline.image_to_audio(&image).unwrap().len(), 1 << 18);
}

#[test]
fn test_silence_never_fails() {
    let config = CodecConfig {
        segment_size: 1 << 12,
        sample_rate: 8000,
        n_mels: 32,
        n_frames: 33,
        n_fft: 512,
        griffin_lim_iterations: 2,
        ..Default::default()
    };
    let pipeline = Pipeline::new(config).unwrap();
    let silence = vec![0.0f32; 1 << 12];

    let spec = pipeline.to_log_mel(&silence).unwrap();
    assert!(spec.values().iter().all(|&v| v == -80.0));

    let image = pipeline.audio_to_image(&silence).unwrap();
    assert!(image.pixels().iter().all(|&p| p == 0));

    let audio = pipeline.image_to_audio(&image).unwrap();
    assert_eq!(audio.len(), 1 << 12);
    assert!(audio.iter().all(|s| s.is_finite()));
}
