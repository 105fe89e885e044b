//! Audio <-> log-mel spectrogram image codec.
//!
//! Turns raw recordings into fixed-size 8-bit spectrogram images for model
//! training, and turns those images back into (approximate) audio so a
//! dataset can be spot-checked by ear.
//!
//! ```text
//! audio -> segments -> log-mel (n_mels x n_frames, dB in [-top_db, 0]) -> u8 image
//! image -> log-mel -> mel pseudo-inverse -> Griffin-Lim -> audio
//! ```
//!
//! - [`segment`]: fixed-length, index-addressable windows
//! - [`spectrogram`]: forward transform and its inverse
//! - [`image`]: quantization to and from pixels
//! - [`pipeline`]: the composed entry points
//! - [`audio`], [`storage`]: decoding/resampling, WAV and PNG files

pub mod audio;
pub mod config;
pub mod error;
pub mod image;
pub mod pipeline;
pub mod segment;
pub mod spectrogram;
pub mod storage;

pub use audio::AudioBuffer;
pub use config::{CodecConfig, PartialSegmentPolicy};
pub use error::{CodecError, Result};
pub use image::{ImageCodec, QuantRange, QuantizedImage};
pub use pipeline::Pipeline;
pub use segment::{Segments, segment, segment_with_policy};
pub use spectrogram::{LogMelSpectrogram, SpectrogramTransform};
