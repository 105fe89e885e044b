use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use spectral_core::storage::{load_png, parse_slice_file_name};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

/// One training example: a spectrogram slice and where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestLine {
    pub image_path: String,
    pub source: String,
    pub slice_index: usize,
    pub width: usize,
    pub height: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManifestStats {
    pub kept: usize,
    pub skipped: usize,
}

/// Write a JSONL manifest of every `{index}_{stem}.png` slice in `image_dir`.
///
/// Lines are ordered by source then slice index. Files that do not follow
/// the naming convention, or cannot be read as slices, are skipped.
pub fn build_manifest(image_dir: &Path, out_path: &Path) -> Result<ManifestStats> {
    let mut stats = ManifestStats::default();
    let mut lines = Vec::new();

    let entries = std::fs::read_dir(image_dir)
        .with_context(|| format!("failed to read image dir: {}", image_dir.display()))?;

    for entry in entries {
        let path = entry
            .with_context(|| format!("failed to list {}", image_dir.display()))?
            .path();
        if !is_png(&path) {
            continue;
        }

        let Some((slice_index, source)) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_slice_file_name)
        else {
            tracing::debug!("not a slice name, skipping {}", path.display());
            stats.skipped += 1;
            continue;
        };

        let image = match load_png(&path) {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!("skipping {}: {}", path.display(), e);
                stats.skipped += 1;
                continue;
            }
        };

        lines.push(ManifestLine {
            image_path: path.to_string_lossy().to_string(),
            source,
            slice_index,
            width: image.width(),
            height: image.height(),
        });
    }

    lines.sort_by(|a, b| {
        a.source
            .cmp(&b.source)
            .then(a.slice_index.cmp(&b.slice_index))
    });

    if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let out_file = File::create(out_path)
        .with_context(|| format!("failed to create manifest: {}", out_path.display()))?;
    let mut writer = BufWriter::new(out_file);

    for line in &lines {
        serde_json::to_writer(&mut writer, line)?;
        writer.write_all(b"\n")?;
        stats.kept += 1;
    }
    writer.flush()?;

    tracing::info!(
        "wrote {} ({} kept, {} skipped)",
        out_path.display(),
        stats.kept,
        stats.skipped
    );
    Ok(stats)
}

fn is_png(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("png"))
}
