// cropkit/src/processors/renderer.rs
use super::cropper::CropSelection;
use super::metadata::MetadataProcessor;
use super::normalizer::NormalizedImage;
use crate::core::{CropError, Quality, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType, GenericImageView, ImageEncoder};

/// Re-renders a crop from the full-resolution source and encodes it as JPEG.
#[derive(Debug, Clone)]
pub struct Renderer {
    quality: Quality,
    metadata: MetadataProcessor,
}

impl Renderer {
    pub fn new(quality: Quality) -> Self {
        Self {
            quality,
            metadata: MetadataProcessor::new(),
        }
    }

    pub fn render(&self, image: &NormalizedImage, selection: &CropSelection) -> Result<Vec<u8>> {
        let source = image::load_from_memory(image.handle().bytes()).map_err(|e| {
            CropError::CropRenderFailed(format!("could not decode {}: {}", image.name(), e))
        })?;

        let region = scale_selection(selection, image.dimensions(), source.dimensions())?;
        log::debug!(
            "Cropping {} to {} (requested {}), JPEG quality {}",
            image.name(),
            region,
            selection,
            self.quality.value()
        );

        let cropped = source.crop_imm(region.x, region.y, region.width, region.height);
        let encoded = encode_jpeg(&cropped, self.quality).map_err(|e| {
            CropError::CropRenderFailed(format!("could not encode {}: {}", image.name(), e))
        })?;

        let output = self.attach_metadata(image, encoded);
        log::info!(
            "Rendered {}: {}x{} ({} bytes)",
            image.name(),
            region.width,
            region.height,
            output.len()
        );
        Ok(output)
    }

    fn attach_metadata(&self, image: &NormalizedImage, encoded: Vec<u8>) -> Vec<u8> {
        let Some(metadata) = image.metadata().filter(|m| !m.is_empty()) else {
            return encoded;
        };

        match self.metadata.inject(&encoded, metadata) {
            Ok(tagged) => tagged,
            Err(e) => {
                log::warn!("Failed to insert EXIF data for {}: {}", image.name(), e);
                encoded
            }
        }
    }
}

/// Rescale a selection recorded against `recorded` dimensions onto the
/// dimensions the source actually decoded to. Normally the factors are 1.0.
pub fn scale_selection(
    selection: &CropSelection,
    recorded: (u32, u32),
    decoded: (u32, u32),
) -> Result<CropSelection> {
    if recorded.0 == 0 || recorded.1 == 0 {
        return Err(CropError::CropRenderFailed(
            "image has no recorded dimensions".to_string(),
        ));
    }

    let scale_x = decoded.0 as f64 / recorded.0 as f64;
    let scale_y = decoded.1 as f64 / recorded.1 as f64;

    let x = ((selection.x as f64 * scale_x).floor() as u32).min(decoded.0);
    let y = ((selection.y as f64 * scale_y).floor() as u32).min(decoded.1);
    let width = ((selection.width as f64 * scale_x).floor() as u32).min(decoded.0 - x);
    let height = ((selection.height as f64 * scale_y).floor() as u32).min(decoded.1 - y);

    if width == 0 || height == 0 {
        return Err(CropError::CropRenderFailed(format!(
            "crop {} is empty after scaling to {}x{}",
            selection, decoded.0, decoded.1
        )));
    }

    Ok(CropSelection {
        x,
        y,
        width,
        height,
    })
}

pub(crate) fn encode_jpeg(image: &DynamicImage, quality: Quality) -> image::ImageResult<Vec<u8>> {
    let rgb = image.to_rgb8();
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality.value()).write_image(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(buffer)
}
