// cropkit/src/processors/mod.rs
mod archive;
mod batch;
mod cropper;
mod handle;
mod metadata;
mod normalizer;
mod renderer;
mod transcoder;

pub use archive::{
    output_entry_name, Archive, ArchiveBuilder, ArchiveEntry, ArchiveError, ArchiveWriter,
    ZipArchiveWriter, ARCHIVE_ERROR_NAME, DEFAULT_ARCHIVE_NAME, OUTPUT_EXTENSION,
};
pub use batch::{BatchProcessor, IngestOutcome, RenderOutcome, RENDER_FAILED_MESSAGE};
pub use cropper::{
    default_crop, map_to_pixels, AspectRatio, CropSelection, CropperError, PercentRect,
    RatioPreset,
};
pub use handle::{DisplayHandle, HandleLedger};
pub use metadata::{MetadataError, MetadataProcessor, PreservedMetadata};
pub use normalizer::{NormalizedImage, Normalizer, UploadedFile};
pub use renderer::{scale_selection, Renderer};
pub use transcoder::{needs_transcoding, HeifTranscoder, TranscodeError, Transcoder};

pub mod prelude {
    pub use super::{
        ArchiveBuilder, BatchProcessor, CropSelection, MetadataProcessor, NormalizedImage,
        Normalizer, Renderer, UploadedFile,
    };
}
