use anyhow::Result;
use clap::Parser;
use spectral_core::{CodecConfig, PartialSegmentPolicy};
use std::path::PathBuf;

/// Convert a directory of audio files into log-mel spectrogram slices.
///
/// Every mp3/wav file under the input directory is decoded, resampled,
/// cut into fixed-length segments, and each segment is written as an 8-bit
/// grayscale PNG named `{slice}_{file stem}.png`. Files that already have
/// slices in the output directory are skipped.
#[derive(Parser, Debug)]
#[command(name = "spectral")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory scanned (recursively) for .mp3 and .wav files
    #[arg(long)]
    pub input_dir: PathBuf,

    /// Directory receiving the PNG slices (and WAV reconstructions)
    #[arg(long)]
    pub output_dir: PathBuf,

    /// Target sample rate in Hz [default: 22050]
    #[arg(long)]
    pub sample_rate: Option<u32>,

    /// Segment length in samples, a power of two [default: 524288]
    #[arg(long)]
    pub segment_size: Option<usize>,

    /// Number of mel bands, i.e. image height [default: 256]
    #[arg(long)]
    pub n_mels: Option<usize>,

    /// Dynamic range kept below each segment's peak, in dB [default: 80]
    #[arg(long)]
    pub top_db: Option<f32>,

    /// Griffin-Lim iterations for --save-audio reconstructions [default: 32]
    #[arg(long)]
    pub griffin_lim_iterations: Option<usize>,

    /// Zero-pad and keep the trailing partial segment instead of dropping it
    #[arg(long, default_value_t = false)]
    pub keep_partial: bool,

    /// Also write a WAV reconstructed from each stored PNG
    #[arg(long, default_value_t = false)]
    pub save_audio: bool,

    /// Worker threads [default: available cores - 2, at least 1]
    #[arg(long)]
    pub workers: Option<usize>,

    /// JSON codec config; command-line flags override its fields
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write a JSONL manifest of all slices in the output directory
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Cli {
    /// Resolve the codec config: file (or defaults), then flag overrides.
    pub fn codec_config(&self) -> Result<CodecConfig> {
        let mut config = match &self.config {
            Some(path) => CodecConfig::read_json_file(path)?,
            None => CodecConfig::default(),
        };

        if let Some(sample_rate) = self.sample_rate {
            config.sample_rate = sample_rate;
        }
        if let Some(segment_size) = self.segment_size {
            config.segment_size = segment_size;
        }
        if let Some(n_mels) = self.n_mels {
            config.n_mels = n_mels;
        }
        if let Some(top_db) = self.top_db {
            config.top_db = top_db;
        }
        if let Some(iterations) = self.griffin_lim_iterations {
            config.griffin_lim_iterations = iterations;
        }
        if self.keep_partial {
            config.partial_segment = PartialSegmentPolicy::ZeroPad;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_args_use_defaults() {
        let cli = Cli::try_parse_from(["spectral", "--input-dir", "in", "--output-dir", "out"])
            .unwrap();
        assert_eq!(cli.input_dir, PathBuf::from("in"));
        assert!(!cli.save_audio);
        assert_eq!(cli.codec_config().unwrap(), CodecConfig::default());
    }

    #[test]
    fn test_flag_overrides() {
        let cli = Cli::try_parse_from([
            "spectral",
            "--input-dir",
            "in",
            "--output-dir",
            "out",
            "--sample-rate",
            "48000",
            "--segment-size",
            "262144",
            "--keep-partial",
            "--save-audio",
        ])
        .unwrap();
        let config = cli.codec_config().unwrap();
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.segment_size, 1 << 18);
        assert_eq!(config.partial_segment, PartialSegmentPolicy::ZeroPad);
        assert!(cli.save_audio);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let cli = Cli::try_parse_from([
            "spectral",
            "--input-dir",
            "in",
            "--output-dir",
            "out",
            "--segment-size",
            "1000",
        ])
        .unwrap();
        assert!(cli.codec_config().is_err());
    }

    #[test]
    fn test_config_file_then_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codec.json");
        std::fs::write(&path, r#"{ "n_mels": 128, "top_db": 60.0 }"#).unwrap();

        let cli = Cli::try_parse_from([
            "spectral",
            "--input-dir",
            "in",
            "--output-dir",
            "out",
            "--config",
            path.to_str().unwrap(),
            "--top-db",
            "90",
        ])
        .unwrap();
        let config = cli.codec_config().unwrap();
        assert_eq!(config.n_mels, 128);
        assert_eq!(config.top_db, 90.0);
    }

    #[test]
    fn test_flag_repairs_invalid_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codec.json");
        std::fs::write(&path, r#"{ "segment_size": 1000, "n_mels": 128 }"#).unwrap();

        let args = |extra: &[&str]| {
            let mut argv = vec![
                "spectral",
                "--input-dir",
                "in",
                "--output-dir",
                "out",
                "--config",
                path.to_str().unwrap(),
            ];
            argv.extend_from_slice(extra);
            Cli::try_parse_from(argv).unwrap()
        };

        assert!(args(&[]).codec_config().is_err());
        let config = args(&["--segment-size", "262144"]).codec_config().unwrap();
        assert_eq!(config.segment_size, 1 << 18);
        assert_eq!(config.n_mels, 128);
    }

    #[test]
    fn test_requires_dirs() {
        assert!(Cli::try_parse_from(["spectral", "--input-dir", "in"]).is_err());
    }
}
