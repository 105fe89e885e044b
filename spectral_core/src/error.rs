use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CodecError>;

/// Failures of a single codec call.
///
/// Every variant is local to the segment or file being processed; callers are
/// expected to log it and move on to the next unit of work.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid codec config: {0}")]
    InvalidConfig(String),

    #[error("segment size must be positive")]
    SegmentSize,

    #[error("segment has {actual} samples, expected {expected}")]
    SegmentLength { expected: usize, actual: usize },

    #[error("non-finite sample {value} at index {index}")]
    NonFiniteSample { index: usize, value: f32 },

    #[error("spectrogram shape {actual:?} does not match configured {expected:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("image {path}: {message}")]
    Image { path: PathBuf, message: String },

    #[error("png encoding failed for {path}")]
    PngEncode {
        path: PathBuf,
        #[source]
        source: png::EncodingError,
    },

    #[error("png decoding failed for {path}")]
    PngDecode {
        path: PathBuf,
        #[source]
        source: png::DecodingError,
    },

    #[error("wav i/o failed for {path}")]
    Wav {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("i/o failed for {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
