// cropkit/src/lib.rs
mod cli;
pub mod core;
pub mod processors;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use crate::cli::{Cli, Commands};
pub use crate::core::{
    run_session, validate_config, CropDecision, CropError, CropPlan, CropSource, CropperConfig,
    ExportReport, FileError, Quality, Result, WorkflowController, WorkflowError, WorkflowState,
};
pub use crate::processors::{
    map_to_pixels, AspectRatio, CropSelection, NormalizedImage, PercentRect, RatioPreset,
    UploadedFile,
};
pub use crate::utils::{
    calculate_aspect_ratio, collect_image_paths, format_file_size, get_image_info,
    is_supported_format,
};

pub mod prelude {
    pub use crate::{
        run_session, AspectRatio, CropPlan, CropSource, CropperConfig, PercentRect,
        UploadedFile, WorkflowController,
    };
}
