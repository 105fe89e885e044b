//! Batch conversion of a directory tree of audio files.
//!
//! Every file is an isolated unit of work: decode errors, bad segments or
//! write failures are logged and counted, and the batch moves on.

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use spectral_core::audio::load_audio;
use spectral_core::storage::{load_png, parse_slice_file_name, save_png, slice_file_name};
use spectral_core::{AudioBuffer, Pipeline};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use walkdir::WalkDir;

const AUDIO_EXTENSIONS: [&str; 2] = ["mp3", "wav"];

/// Outcome of converting one source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileReport {
    pub source: PathBuf,
    pub images: usize,
    pub audio: usize,
    pub failed_segments: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub converted: usize,
    pub skipped_existing: usize,
    pub failed: usize,
    pub images: usize,
    pub failed_segments: usize,
}

impl BatchSummary {
    fn record(&mut self, result: &Result<FileReport>) {
        match result {
            Ok(report) => {
                self.converted += 1;
                self.images += report.images;
                self.failed_segments += report.failed_segments;
            }
            Err(_) => self.failed += 1,
        }
    }

    fn merge(&mut self, other: BatchSummary) {
        self.converted += other.converted;
        self.skipped_existing += other.skipped_existing;
        self.failed += other.failed;
        self.images += other.images;
        self.failed_segments += other.failed_segments;
    }
}

/// Leave two cores for the rest of the machine, as long as one remains.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(2).max(1))
        .unwrap_or(1)
}

/// All mp3/wav files below `input_dir`, sorted then reversed.
///
/// Symlinks are not followed, so a link cycle cannot list a file twice.
/// Entries that cannot be read are logged and skipped.
pub fn discover_inputs(input_dir: &Path) -> Result<Vec<PathBuf>> {
    if !input_dir.is_dir() {
        anyhow::bail!("input dir does not exist: {}", input_dir.display());
    }

    let mut found = Vec::new();
    for entry in WalkDir::new(input_dir).into_iter() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("skipping unreadable entry: {}", e);
                continue;
            }
        };
        if entry.file_type().is_file() && has_audio_extension(entry.path()) {
            found.push(entry.into_path());
        }
    }

    found.sort();
    found.reverse();
    Ok(found)
}

fn has_audio_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| AUDIO_EXTENSIONS.iter().any(|a| e.eq_ignore_ascii_case(a)))
}

/// Source stems that already have at least one PNG slice in `output_dir`.
pub fn already_converted(output_dir: &Path) -> Result<HashSet<String>> {
    let mut stems = HashSet::new();
    if !output_dir.exists() {
        return Ok(stems);
    }
    let entries = std::fs::read_dir(output_dir)
        .with_context(|| format!("failed to read output dir: {}", output_dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        let is_png = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("png"));
        if !is_png {
            continue;
        }
        if let Some((_, stem)) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_slice_file_name)
        {
            stems.insert(stem);
        }
    }
    Ok(stems)
}

/// Drop inputs whose stem is in `converted`. Returns the rest and the skip count.
///
/// Slices are named by stem alone, so only the first input with a given stem
/// is kept; later ones would write the same files from another worker.
pub fn pending_inputs(
    inputs: Vec<PathBuf>,
    converted: &HashSet<String>,
) -> (Vec<PathBuf>, usize) {
    let before = inputs.len();
    let mut claimed = HashSet::new();
    let mut pending = Vec::with_capacity(before);
    for path in inputs {
        let stem = source_stem(&path);
        if converted.contains(&stem) {
            continue;
        }
        if !claimed.insert(stem.clone()) {
            tracing::warn!(
                "skipping {}: another input already maps to stem '{}'",
                path.display(),
                stem
            );
            continue;
        }
        pending.push(path);
    }
    let skipped = before - pending.len();
    (pending, skipped)
}

fn source_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Decode one file and write a PNG per segment.
///
/// With `save_audio`, each PNG is read back from disk and reconstructed to
/// `{slice}_{stem}.wav`, so the WAV reflects exactly what was stored.
pub fn convert_file(
    pipeline: &Pipeline,
    path: &Path,
    output_dir: &Path,
    save_audio: bool,
) -> Result<FileReport> {
    let audio = load_audio(path, pipeline.config().sample_rate)
        .with_context(|| format!("failed to load {}", path.display()))?;
    let stem = source_stem(path);
    let segments = pipeline.segments(&audio)?;

    let mut report = FileReport {
        source: path.to_path_buf(),
        ..Default::default()
    };

    for (index, segment) in segments.iter().enumerate() {
        let png_path = output_dir.join(slice_file_name(index, &stem, "png"));
        let stored = pipeline
            .audio_to_image(&segment)
            .map_err(anyhow::Error::from)
            .and_then(|image| Ok(save_png(&image, &png_path)?));
        if let Err(e) = stored {
            tracing::warn!("{} slice {}: {:#}", path.display(), index, e);
            report.failed_segments += 1;
            continue;
        }
        report.images += 1;

        if save_audio {
            let wav_path = output_dir.join(slice_file_name(index, &stem, "wav"));
            match reconstruct(pipeline, &png_path, &wav_path) {
                Ok(()) => report.audio += 1,
                Err(e) => tracing::warn!("{} slice {} audio: {:#}", path.display(), index, e),
            }
        }
    }

    tracing::debug!(
        "{}: {} images, {} reconstructions from {} segments",
        path.display(),
        report.images,
        report.audio,
        segments.len()
    );
    Ok(report)
}

fn reconstruct(pipeline: &Pipeline, png_path: &Path, wav_path: &Path) -> Result<()> {
    let image = load_png(png_path)?;
    let samples = pipeline.image_to_audio(&image)?;
    AudioBuffer::new(samples, pipeline.config().sample_rate).save(wav_path)?;
    Ok(())
}

/// Convert `inputs` on `workers` threads. Never fails as a whole.
pub fn run_batch(
    pipeline: &Pipeline,
    inputs: &[PathBuf],
    output_dir: &Path,
    save_audio: bool,
    workers: usize,
    progress: &ProgressBar,
) -> BatchSummary {
    let next = AtomicUsize::new(0);
    let next = &next;
    let workers = workers.clamp(1, inputs.len().max(1));

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                scope.spawn(move || {
                    let mut summary = BatchSummary::default();
                    loop {
                        let index = next.fetch_add(1, Ordering::Relaxed);
                        let Some(path) = inputs.get(index) else {
                            break;
                        };
                        let result = convert_file(pipeline, path, output_dir, save_audio);
                        if let Err(e) = &result {
                            tracing::warn!("skipping {}: {:#}", path.display(), e);
                        }
                        summary.record(&result);
                        progress.inc(1);
                    }
                    summary
                })
            })
            .collect();

        let mut total = BatchSummary::default();
        for handle in handles {
            match handle.join() {
                Ok(summary) => total.merge(summary),
                Err(_) => tracing::error!("a conversion worker panicked"),
            }
        }
        total
    })
}
