// cropkit/src/main.rs
use anyhow::{bail, Context};
use clap::Parser;
use cropkit::core::{CropPlan, CropperConfig, ExportReport, Quality, WorkflowController};
use cropkit::processors::{AspectRatio, MetadataProcessor, RatioPreset, UploadedFile};
use cropkit::utils::{
    calculate_aspect_ratio, collect_image_paths, format_file_size, get_image_info,
    sanitize_filename,
};
use cropkit::{run_session, Cli, Commands};
use log::LevelFilter;
use std::path::{Path, PathBuf};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .init();

    match cli.command {
        Commands::Crop {
            inputs,
            ratio,
            plan,
            output,
            archive_name,
            flip,
            threads,
            max_size_mb,
            quality,
            recursive,
        } => {
            let config = CropperConfig {
                max_file_size: max_size_mb.saturating_mul(1024 * 1024),
                quality: Quality::new(quality),
                archive_name: sanitize_filename(&archive_name),
                threads,
                show_progress: true,
                ..Default::default()
            };
            process_crop(&inputs, &ratio, plan.as_deref(), &output, flip, recursive, config)?;
        }
        Commands::Ratios => process_ratios(),
        Commands::Info { input } => process_info(&input)?,
    }

    Ok(())
}

fn process_crop(
    inputs: &[PathBuf],
    ratio: &str,
    plan: Option<&Path>,
    output: &Path,
    flip: bool,
    recursive: bool,
    config: CropperConfig,
) -> anyhow::Result<()> {
    let ratio: AspectRatio = ratio.parse()?;

    let paths = collect_image_paths(inputs, recursive)?;
    if paths.is_empty() {
        bail!("No images found in the given inputs");
    }

    let files = paths
        .iter()
        .map(|path| {
            UploadedFile::from_path(path)
                .with_context(|| format!("Failed to read {}", path.display()))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut plan = match plan {
        Some(path) => CropPlan::from_path(path)
            .with_context(|| format!("Failed to load crop plan {}", path.display()))?,
        None => CropPlan::new(),
    }
    .with_flip(flip);

    let mut controller = WorkflowController::new(config)?;
    log::info!("Cropping {} files to {}", files.len(), ratio);

    let loaded = run_session(&mut controller, files, ratio, &mut plan)?.is_some();
    if !loaded {
        for error in controller.ingest_errors() {
            eprintln!("  {}", error);
        }
        bail!("None of the files could be loaded");
    }

    let report = controller
        .report()
        .context("Export finished without a report")?;

    print_report(report);

    if let Some(archive) = &report.archive {
        std::fs::create_dir_all(output)
            .with_context(|| format!("Failed to create {}", output.display()))?;
        let archive_path = output.join(&archive.name);
        std::fs::write(&archive_path, &archive.bytes)
            .with_context(|| format!("Failed to write {}", archive_path.display()))?;
        println!(
            "Archive saved to: {} ({})",
            archive_path.display(),
            format_file_size(archive.bytes.len() as u64)
        );
    }

    Ok(())
}

fn print_report(report: &ExportReport) {
    println!("=== {} ===", report.title());
    println!("{}", report.summary());

    if report.has_errors() {
        println!("\nErrors:");
        for error in report.errors() {
            println!("  {}", error);
        }
    }
}

fn process_ratios() {
    println!("=== Aspect Ratios ===");
    for preset in RatioPreset::ALL {
        println!("{:<20} {}", preset.label(), preset.ratio());
    }
}

fn process_info(input: &Path) -> anyhow::Result<()> {
    if !input.exists() {
        bail!("File does not exist: {}", input.display());
    }

    let file_size = std::fs::metadata(input)?.len();
    let (width, height, format) = get_image_info(input)?;
    let aspect_ratio = calculate_aspect_ratio(width, height);

    let data = std::fs::read(input)?;
    let metadata_processor = MetadataProcessor::new();
    let exif = metadata_processor.read_exif(&data).unwrap_or_else(|e| {
        log::warn!("Could not read EXIF data: {}", e);
        None
    });

    println!("=== Image Information ===");
    println!("File: {}", input.display());
    println!("Size: {}", format_file_size(file_size));
    println!("Dimensions: {} x {} pixels", width, height);
    println!("Aspect Ratio: {:.2}:1", aspect_ratio);
    println!("Format: {}", format);
    println!("Has EXIF metadata: {}", exif.is_some());

    if let Some(exif) = exif {
        println!("\n=== EXIF Metadata ===");
        for (label, value) in metadata_processor.extract_common_metadata(&exif) {
            println!("{}: {}", label, value);
        }
    }

    Ok(())
}
