//! tcpack - Test-case archiver for judge problem folders

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tcpack_core::{
    archive_file_name, detect, encode, materialize, scan, EncodeOptions, EngineError,
    MaterializeOptions, ProgressSink, ScanOptions, Settings, ThrottledSink,
};

mod cli;
use cli::{Cli, Commands};

/// Progress bar backed sink; log lines are printed above the bar.
struct BarSink {
    pb: ProgressBar,
}

impl BarSink {
    fn new() -> Result<Self> {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );
        Ok(Self { pb })
    }
}

impl ProgressSink for BarSink {
    fn log(&mut self, text: &str) {
        self.pb.println(text);
    }

    fn report_progress(&mut self, done: u64, total: u64) {
        self.pb.set_length(total);
        self.pb.set_position(done);
    }

    fn set_total(&mut self, total: u64) {
        self.pb.set_length(total);
        self.pb.set_position(0);
    }
}

fn progress_sink(settings: &Settings) -> Result<ThrottledSink<BarSink>> {
    Ok(ThrottledSink::new(BarSink::new()?, settings.progress_interval()))
}

fn finish(sink: ThrottledSink<BarSink>) {
    sink.finish().pb.finish_and_clear();
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let base = match &cli.config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::default(),
    };
    Ok(cli.overrides.apply(base))
}

fn check(path: &Path, settings: &Settings) -> Result<()> {
    let mut sink = progress_sink(settings)?;

    if path.is_dir() {
        let result = scan(path, &ScanOptions::from_settings(settings), &mut sink);
        finish(sink);
        let scanned = result?;

        println!();
        println!("Archive name: {}", archive_file_name(&scanned.problem_name, &Local::now()));
        println!("Recommended compression: {}", scanned.recommended_compression.name());
    } else {
        let result = detect(path, &mut sink);
        finish(sink);
        let detection = result?;

        println!();
        println!("Tests:");
        for (test_id, entries) in &detection.tests {
            let describe = |entry: Option<&tcpack_core::ArchiveEntry>| match entry {
                Some(e) => format!("{} ({} bytes)", e.name, e.size),
                None => "-".to_string(),
            };
            println!(
                "  {}: input {}, output {}",
                test_id,
                describe(entries.input.as_ref()),
                describe(entries.output.as_ref())
            );
        }
    }
    Ok(())
}

fn pack(
    input: &Path,
    output: Option<&Path>,
    level: Option<tcpack_core::CompressionLevel>,
    settings: &Settings,
) -> Result<()> {
    println!("tcpack - Packing tests: {}", input.display());
    println!();

    let mut sink = progress_sink(settings)?;
    let scanned = match scan(input, &ScanOptions::from_settings(settings), &mut sink) {
        Ok(scanned) => scanned,
        Err(err) => {
            finish(sink);
            return Err(err.into());
        }
    };

    let archive_path = match output {
        Some(path) => path.to_path_buf(),
        None => settings
            .output_dir
            .join(archive_file_name(&scanned.problem_name, &Local::now())),
    };
    let opts = EncodeOptions {
        problem_name: scanned.problem_name.clone(),
        include_input: settings.include_input,
        include_output: settings.include_output,
        compression: level.unwrap_or(scanned.recommended_compression),
    };

    let result = encode(&scanned, &opts, &archive_path, &mut sink);
    finish(sink);
    let summary = result.with_context(|| format!("Failed to write {}", archive_path.display()))?;

    println!();
    println!("Archive creation complete!");
    println!("  Problem: {}", summary.comment.problem_name);
    println!("  Tests: {}", summary.comment.test_count);
    println!("  Entries: {} input, {} output", summary.input_count, summary.output_count);
    println!("  Compression: {}", opts.compression.name());
    println!("  Payload: {} bytes", summary.payload_bytes);
    println!("  Archive size: {} bytes", summary.archive_size);
    println!();
    println!("Output: {}", summary.archive_path.display());
    Ok(())
}

fn unpack(archive: &Path, settings: &Settings) -> Result<()> {
    println!("tcpack - Unpacking archive: {}", archive.display());
    println!();

    let mut sink = progress_sink(settings)?;
    let detection = match detect(archive, &mut sink) {
        Ok(detection) => detection,
        Err(err) => {
            finish(sink);
            return Err(err.into());
        }
    };

    let result = materialize(
        archive,
        &detection,
        &settings.output_dir,
        &MaterializeOptions::from_settings(settings),
        &mut sink,
    );
    finish(sink);
    let summary = result?;

    println!();
    println!("Extraction complete!");
    println!("  Format: {}", detection.metadata.schema_version().label());
    println!("  Tests: {}", summary.test_count);
    println!("  Files: {} input, {} output", summary.inputs_written, summary.outputs_written);
    println!();
    println!("Output: {}", summary.problem_dir.display());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;

    let outcome = match &cli.command {
        Commands::Check { path } => check(path, &settings),
        Commands::Pack { input, output, level } => pack(input, output.as_deref(), *level, &settings),
        Commands::Unpack { archive } => unpack(archive, &settings),
    };

    if let Err(err) = &outcome {
        if let Some(hint) = err.downcast_ref::<EngineError>().and_then(EngineError::hint) {
            eprintln!("Hint: {}", hint);
        }
    }
    outcome
}
