// cropkit/src/cli.rs
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cropkit")]
#[command(about = "Crop a batch of images to one aspect ratio and pack them into a zip")]
#[command(version)]
pub struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Crop every input and write the archive
    Crop {
        /// Image files or directories
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Aspect ratio: a preset name (square, widescreen, vertical, 4x6, 8x10) or W:H
        #[arg(short, long, default_value = "1:1")]
        ratio: String,

        /// JSON file mapping file names to {x, y, width, height} percentages
        #[arg(short, long)]
        plan: Option<PathBuf>,

        /// Directory the archive is written to
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Archive file name
        #[arg(long, default_value = crate::processors::DEFAULT_ARCHIVE_NAME)]
        archive_name: String,

        /// Swap the ratio's orientation before cropping
        #[arg(long)]
        flip: bool,

        /// Worker threads (0 = one per core)
        #[arg(short, long, default_value_t = 0)]
        threads: usize,

        /// Per-file size limit in megabytes
        #[arg(long, default_value_t = 25)]
        max_size_mb: u64,

        /// JPEG quality for the cropped output (1-100)
        #[arg(short, long, default_value_t = 90)]
        quality: u8,

        /// Walk directories recursively
        #[arg(short = 'R', long)]
        recursive: bool,
    },

    /// List the aspect ratio presets
    Ratios,

    /// Show dimensions, format and EXIF fields of an image
    Info {
        /// Image file
        input: PathBuf,
    },
}
