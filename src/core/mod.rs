// cropkit/src/core/mod.rs
pub mod session;
pub mod workflow;

use thiserror::Error;

pub use session::{run_session, CropDecision, CropPlan, CropSource};
pub use workflow::{ExportReport, WorkflowController, WorkflowError, WorkflowState};

/// Hard per-file ceiling applied before any decoding.
pub const MAX_FILE_SIZE: u64 = 25 * 1024 * 1024;

/// Quality setting for lossy JPEG encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u8);

impl Quality {
    pub fn new(value: u8) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

#[derive(Debug, Clone)]
pub struct CropperConfig {
    pub max_file_size: u64,
    pub max_dimensions: (u32, u32),
    pub quality: Quality,
    pub transcode_quality: Quality,
    /// Share of the limiting axis covered by a freshly generated crop rectangle.
    pub default_crop_percent: f64,
    pub archive_name: String,
    pub threads: usize,
    pub show_progress: bool,
}

impl Default for CropperConfig {
    fn default() -> Self {
        Self {
            max_file_size: MAX_FILE_SIZE,
            max_dimensions: (100_000, 100_000),
            quality: Quality::default(),
            transcode_quality: Quality::default(),
            default_crop_percent: 90.0,
            archive_name: crate::processors::DEFAULT_ARCHIVE_NAME.to_string(),
            threads: 0,
            show_progress: false,
        }
    }
}

impl CropperConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_file_size == 0 {
            return Err(CropError::InvalidParameter(
                "Maximum file size must be greater than zero".to_string(),
            ));
        }

        let (max_w, max_h) = self.max_dimensions;
        if max_w == 0 || max_h == 0 || max_w > 100_000 || max_h > 100_000 {
            return Err(CropError::InvalidParameter(
                "Maximum dimensions must be between 1 and 100,000 pixels".to_string(),
            ));
        }

        if !(self.default_crop_percent > 0.0 && self.default_crop_percent <= 100.0) {
            return Err(CropError::InvalidParameter(format!(
                "Default crop percentage must be in (0, 100], got {}",
                self.default_crop_percent
            )));
        }

        if self.archive_name.trim().is_empty() {
            return Err(CropError::InvalidParameter(
                "Archive name cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// A per-file failure surfaced to the user, at ingestion or at export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileError {
    pub file_name: String,
    pub message: String,
}

impl FileError {
    pub fn new(file_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.file_name, self.message)
    }
}

#[derive(Error, Debug)]
pub enum CropError {
    #[error("File is too large ({}). Max size is {}.", megabytes(.size), whole_megabytes(.limit))]
    TooLarge { size: u64, limit: u64 },

    #[error("{0}")]
    CorruptOrUnsupported(String),

    #[error("Failed during final crop: {0}")]
    CropRenderFailed(String),

    #[error("Failed to create downloadable zip file: {0}")]
    ArchiveFailed(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

pub type Result<T> = std::result::Result<T, CropError>;

fn megabytes(bytes: &u64) -> String {
    format!("{:.1}MB", *bytes as f64 / (1024.0 * 1024.0))
}

fn whole_megabytes(bytes: &u64) -> String {
    format!("{}MB", *bytes / (1024 * 1024))
}

pub fn validate_config(config: &CropperConfig) -> Result<()> {
    config.validate()
}
