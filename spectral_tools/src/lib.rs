//! Dataset tooling around a directory of spectrogram slices.

pub mod manifest;

pub use manifest::{ManifestLine, ManifestStats, build_manifest};
