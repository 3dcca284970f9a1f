// cropkit/src/processors/archive.rs
//! Zip packaging of rendered crops.
use std::io::{Cursor, Write};
use std::sync::Arc;
use thiserror::Error;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::core::{CropError, Result};

pub const DEFAULT_ARCHIVE_NAME: &str = "cropped-images.zip";
/// File name used when reporting an archive-level failure.
pub const ARCHIVE_ERROR_NAME: &str = "ZIP Archive";
pub const OUTPUT_EXTENSION: &str = "jpg";

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// The downloadable artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Serializes named buffers into a single archive buffer.
pub trait ArchiveWriter: Send + Sync {
    fn write(&self, entries: &[ArchiveEntry]) -> std::result::Result<Vec<u8>, ArchiveError>;
}

#[derive(Debug, Clone, Copy)]
pub struct ZipArchiveWriter {
    compression: CompressionMethod,
}

impl ZipArchiveWriter {
    pub fn new() -> Self {
        // JPEG payloads do not shrink further; store them as-is.
        Self {
            compression: CompressionMethod::Stored,
        }
    }

    pub fn with_compression(mut self, compression: CompressionMethod) -> Self {
        self.compression = compression;
        self
    }
}

impl Default for ZipArchiveWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveWriter for ZipArchiveWriter {
    fn write(&self, entries: &[ArchiveEntry]) -> std::result::Result<Vec<u8>, ArchiveError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(self.compression);

        for entry in entries {
            zip.start_file(entry.name.as_str(), options)?;
            zip.write_all(&entry.bytes)?;
        }

        Ok(zip.finish()?.into_inner())
    }
}

/// Replace the last extension with `.jpg`, keeping the base name.
pub fn output_entry_name(name: &str) -> String {
    let stem = match name.rfind('.') {
        Some(pos) if pos > 0 => &name[..pos],
        _ => name,
    };
    format!("{}.{}", stem, OUTPUT_EXTENSION)
}

#[derive(Clone)]
pub struct ArchiveBuilder {
    writer: Arc<dyn ArchiveWriter>,
    name: String,
}

impl ArchiveBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            writer: Arc::new(ZipArchiveWriter::new()),
            name: name.into(),
        }
    }

    pub fn with_writer(mut self, writer: Arc<dyn ArchiveWriter>) -> Self {
        self.writer = writer;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Package `(original name, encoded bytes)` pairs in order.
    pub fn build(&self, rendered: Vec<(String, Vec<u8>)>) -> Result<Archive> {
        let entries: Vec<ArchiveEntry> = rendered
            .into_iter()
            .map(|(name, bytes)| ArchiveEntry {
                name: output_entry_name(&name),
                bytes,
            })
            .collect();

        let bytes = self.writer.write(&entries).map_err(|e| {
            log::error!("Failed to create zip file: {}", e);
            CropError::ArchiveFailed(e.to_string())
        })?;

        log::info!(
            "Packed {} entries into {} ({} bytes)",
            entries.len(),
            self.name,
            bytes.len()
        );

        Ok(Archive {
            name: self.name.clone(),
            bytes,
        })
    }
}
