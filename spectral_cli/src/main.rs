mod args;
mod batch;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use spectral_core::Pipeline;
use std::time::Instant;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use args::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = cli.codec_config()?;
    info!(
        "codec: {} Hz, {} samples/segment, {}x{} images, top_db {}",
        config.sample_rate, config.segment_size, config.n_frames, config.n_mels, config.top_db
    );
    let pipeline = Pipeline::new(config)?;

    std::fs::create_dir_all(&cli.output_dir)
        .with_context(|| format!("failed to create {}", cli.output_dir.display()))?;

    let inputs = batch::discover_inputs(&cli.input_dir)?;
    let converted = batch::already_converted(&cli.output_dir)?;
    let (pending, skipped_existing) = batch::pending_inputs(inputs, &converted);
    info!(
        "{} files to convert, {} skipped (already converted or duplicate stem)",
        pending.len(),
        skipped_existing
    );

    let workers = cli.workers.unwrap_or_else(batch::default_workers);
    let progress = create_progress_bar(pending.len() as u64);
    let start = Instant::now();

    let mut summary = batch::run_batch(
        &pipeline,
        &pending,
        &cli.output_dir,
        cli.save_audio,
        workers,
        &progress,
    );
    summary.skipped_existing = skipped_existing;
    progress.finish_and_clear();

    info!(
        "converted {} files ({} images) in {:.1}s; {} failed, {} failed segments, {} skipped",
        summary.converted,
        summary.images,
        start.elapsed().as_secs_f32(),
        summary.failed,
        summary.failed_segments,
        summary.skipped_existing
    );

    if let Some(manifest) = &cli.manifest {
        spectral_tools::build_manifest(&cli.output_dir, manifest)?;
    }

    Ok(())
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("tracing subscriber was already set");
    }
}

fn create_progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{bar:40.cyan/blue} {pos}/{len} files [{elapsed}]")
    {
        pb.set_style(style);
    }
    pb
}
