// cropkit/src/processors/transcoder.rs
//! Camera-native HEIC/HEIF → baseline JPEG.
//!
//! Decoding goes through libheif, which is a system library; it is only
//! compiled in with the `heif` cargo feature. Without it every transcode
//! fails and the upload is reported as unsupported.

use crate::core::Quality;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("HEIC support not compiled - enable the heif feature")]
    Unavailable,

    #[error("HEIC decode failed: {0}")]
    Decode(String),

    #[error("JPEG encode failed: {0}")]
    Encode(#[from] image::ImageError),
}

pub trait Transcoder: Send + Sync {
    fn transcode(&self, data: &[u8], quality: Quality) -> Result<Vec<u8>, TranscodeError>;
}

/// Whether a file name points at a container browsers and `image` cannot decode.
pub fn needs_transcoding(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    lower.ends_with(".heic") || lower.ends_with(".heif")
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HeifTranscoder;

impl HeifTranscoder {
    pub fn new() -> Self {
        Self
    }

    pub fn is_available() -> bool {
        cfg!(feature = "heif")
    }
}

#[cfg(feature = "heif")]
impl Transcoder for HeifTranscoder {
    fn transcode(&self, data: &[u8], quality: Quality) -> Result<Vec<u8>, TranscodeError> {
        use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

        let lib_heif = LibHeif::new();
        let context =
            HeifContext::read_from_bytes(data).map_err(|e| TranscodeError::Decode(e.to_string()))?;
        let handle = context
            .primary_image_handle()
            .map_err(|e| TranscodeError::Decode(e.to_string()))?;
        let decoded = lib_heif
            .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
            .map_err(|e| TranscodeError::Decode(e.to_string()))?;

        let planes = decoded.planes();
        let plane = planes
            .interleaved
            .ok_or_else(|| TranscodeError::Decode("missing interleaved RGB plane".to_string()))?;

        let (width, height, stride) = (plane.width, plane.height, plane.stride);
        let row_len = width as usize * 3;
        let mut pixels = Vec::with_capacity(row_len * height as usize);
        for row in plane.data.chunks(stride).take(height as usize) {
            pixels.extend_from_slice(&row[..row_len]);
        }

        let rgb = image::RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| TranscodeError::Decode("plane smaller than image".to_string()))?;

        log::debug!("Transcoded HEIC {}x{} to JPEG", width, height);
        Ok(super::renderer::encode_jpeg(
            &image::DynamicImage::ImageRgb8(rgb),
            quality,
        )?)
    }
}

#[cfg(not(feature = "heif"))]
impl Transcoder for HeifTranscoder {
    fn transcode(&self, _data: &[u8], _quality: Quality) -> Result<Vec<u8>, TranscodeError> {
        Err(TranscodeError::Unavailable)
    }
}
