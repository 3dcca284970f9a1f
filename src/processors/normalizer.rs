// cropkit/src/processors/normalizer.rs
use super::handle::{DisplayHandle, HandleLedger};
use super::metadata::{MetadataProcessor, PreservedMetadata};
use super::transcoder::{needs_transcoding, HeifTranscoder, Transcoder};
use crate::core::{CropError, CropperConfig, Quality, Result};
use crate::utils::{is_jpeg_signature, media_type_for_path};
use image::GenericImageView;
use std::path::Path;
use std::sync::Arc;
use std::time::UNIX_EPOCH;

const CORRUPT_MESSAGE: &str = "The file appears to be a corrupted or invalid image.";

/// A raw upload: bytes plus what the user agent declared about them.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
    /// Milliseconds since the Unix epoch.
    pub last_modified: u64,
}

impl UploadedFile {
    pub fn new(
        name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: Vec<u8>,
        last_modified: u64,
    ) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes,
            last_modified,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                CropError::InvalidParameter(format!("Invalid file name: {}", path.display()))
            })?;

        let last_modified = std::fs::metadata(path)?
            .modified()
            .ok()
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let bytes = std::fs::read(path)?;
        Ok(Self::new(name, media_type_for_path(path), bytes, last_modified))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn is_jpeg_family(&self) -> bool {
        matches!(self.media_type.as_str(), "image/jpeg" | "image/jpg")
            || is_jpeg_signature(&self.bytes)
    }
}

/// An accepted upload, ready for display and cropping. Immutable once built.
#[derive(Debug)]
pub struct NormalizedImage {
    id: String,
    name: String,
    handle: DisplayHandle,
    metadata: Option<PreservedMetadata>,
    width: u32,
    height: u32,
}

impl NormalizedImage {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> &DisplayHandle {
        &self.handle
    }

    pub fn metadata(&self) -> Option<&PreservedMetadata> {
        self.metadata.as_ref()
    }

    /// Natural dimensions recorded at normalization time.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub(crate) fn with_id(mut self, id: String) -> Self {
        self.id = id;
        self
    }

    #[cfg(test)]
    pub(crate) fn with_metadata(mut self, metadata: Option<PreservedMetadata>) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Clone)]
pub struct Normalizer {
    max_file_size: u64,
    max_dimensions: (u32, u32),
    transcode_quality: Quality,
    transcoder: Arc<dyn Transcoder>,
    ledger: HandleLedger,
    metadata: MetadataProcessor,
}

impl Normalizer {
    pub fn new(config: &CropperConfig) -> Self {
        Self {
            max_file_size: config.max_file_size,
            max_dimensions: config.max_dimensions,
            transcode_quality: config.transcode_quality,
            transcoder: Arc::new(HeifTranscoder::new()),
            ledger: HandleLedger::new(),
            metadata: MetadataProcessor::new(),
        }
    }

    pub fn with_transcoder(mut self, transcoder: Arc<dyn Transcoder>) -> Self {
        self.transcoder = transcoder;
        self
    }

    pub fn with_ledger(mut self, ledger: HandleLedger) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn ledger(&self) -> &HandleLedger {
        &self.ledger
    }

    pub fn normalize(&self, file: UploadedFile) -> Result<NormalizedImage> {
        log::debug!(
            "Normalizing {} ({} bytes, declared {})",
            file.name,
            file.size(),
            file.media_type
        );

        if file.size() > self.max_file_size {
            return Err(CropError::TooLarge {
                size: file.size(),
                limit: self.max_file_size,
            });
        }

        if file.bytes.is_empty() {
            return Err(CropError::CorruptOrUnsupported("The file is empty.".to_string()));
        }

        let metadata = if file.is_jpeg_family() {
            self.extract_metadata(&file)
        } else {
            None
        };

        let UploadedFile {
            name,
            media_type,
            bytes,
            last_modified,
        } = file;

        let (bytes, media_type) = if needs_transcoding(&name) {
            let jpeg = self
                .transcoder
                .transcode(&bytes, self.transcode_quality)
                .map_err(|e| {
                    log::error!("Failed to transcode {}: {}", name, e);
                    CropError::CorruptOrUnsupported(format!("Could not convert image: {}", e))
                })?;
            (jpeg, "image/jpeg".to_string())
        } else {
            (bytes, media_type)
        };

        // Dropping the handle on a decode failure releases it straight away.
        let handle = self.ledger.allocate(bytes, media_type);
        let (width, height) = self.decode_dimensions(&name, &handle)?;

        log::info!("Loaded {}: {}x{} pixels", name, width, height);

        Ok(NormalizedImage {
            id: format!("{}-{}", name, last_modified),
            name,
            handle,
            metadata,
            width,
            height,
        })
    }

    fn extract_metadata(&self, file: &UploadedFile) -> Option<PreservedMetadata> {
        match self.metadata.extract(&file.bytes) {
            Ok(Some(metadata)) => {
                log::debug!("Found {} bytes of EXIF in {}", metadata.len(), file.name);
                Some(metadata)
            }
            Ok(None) => {
                log::debug!("No EXIF data found in {}", file.name);
                None
            }
            Err(e) => {
                log::warn!("Could not load EXIF data for {}: {}", file.name, e);
                None
            }
        }
    }

    fn decode_dimensions(&self, name: &str, handle: &DisplayHandle) -> Result<(u32, u32)> {
        let image = image::load_from_memory(handle.bytes()).map_err(|e| {
            log::debug!("Failed to decode {}: {}", name, e);
            CropError::CorruptOrUnsupported(CORRUPT_MESSAGE.to_string())
        })?;

        let (width, height) = image.dimensions();
        let (max_w, max_h) = self.max_dimensions;
        if width > max_w || height > max_h {
            return Err(CropError::CorruptOrUnsupported(format!(
                "Image dimensions {}x{} exceed maximum {}x{}",
                width, height, max_w, max_h
            )));
        }

        Ok((width, height))
    }
}
