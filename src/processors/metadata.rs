// cropkit/src/processors/metadata.rs
use exif::{Exif, Reader, Tag};
use std::io::Cursor;
use thiserror::Error;

const SOI: [u8; 2] = [0xFF, 0xD8];
const APP0: u8 = 0xE0;
const APP1: u8 = 0xE1;
const EXIF_HEADER: &[u8] = b"Exif\0\0";

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("EXIF error: {0}")]
    Exif(#[from] exif::Error),

    #[error("Encoded output is not a JPEG stream")]
    NotJpeg,

    #[error("EXIF payload of {0} bytes does not fit in a single APP1 segment")]
    TooLarge(usize),
}

/// EXIF payload carried from the source upload to the cropped output.
///
/// Holds the TIFF-structured bytes of an `Exif\0\0` APP1 segment. The
/// pipeline never looks inside; it only re-attaches it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreservedMetadata(Vec<u8>);

impl PreservedMetadata {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataProcessor;

impl MetadataProcessor {
    pub fn new() -> Self {
        Self
    }

    pub fn read_exif(&self, data: &[u8]) -> Result<Option<Exif>, MetadataError> {
        match Reader::new().read_from_container(&mut Cursor::new(data)) {
            Ok(exif) => Ok(Some(exif)),
            Err(exif::Error::NotFound(_)) => Ok(None),
            Err(e) => Err(MetadataError::Exif(e)),
        }
    }

    /// Pull the EXIF payload out of a JPEG-family container.
    pub fn extract(&self, data: &[u8]) -> Result<Option<PreservedMetadata>, MetadataError> {
        let exif = self.read_exif(data)?;
        Ok(exif
            .map(|exif| PreservedMetadata::new(exif.buf().to_vec()))
            .filter(|metadata| !metadata.is_empty()))
    }

    /// Insert `metadata` as an APP1 segment right after SOI (and after a
    /// leading JFIF APP0 segment, if the encoder wrote one).
    pub fn inject(
        &self,
        jpeg: &[u8],
        metadata: &PreservedMetadata,
    ) -> Result<Vec<u8>, MetadataError> {
        if jpeg.len() < 4 || jpeg[..2] != SOI {
            return Err(MetadataError::NotJpeg);
        }

        // Re-serialize check: the payload must still parse as EXIF.
        Reader::new().read_raw(metadata.as_bytes().to_vec())?;

        let segment = build_app1_segment(metadata.as_bytes())?;
        let insert_at = after_leading_app0(jpeg);

        let mut output = Vec::with_capacity(jpeg.len() + segment.len());
        output.extend_from_slice(&jpeg[..insert_at]);
        output.extend_from_slice(&segment);
        output.extend_from_slice(&jpeg[insert_at..]);

        log::debug!(
            "Injected {} bytes of EXIF at offset {}",
            metadata.len(),
            insert_at
        );
        Ok(output)
    }

    /// Label/value pairs for the fields people usually care about.
    pub fn extract_common_metadata(&self, exif: &Exif) -> Vec<(String, String)> {
        const COMMON_FIELDS: [(Tag, &str); 16] = [
            (Tag::ImageDescription, "Description"),
            (Tag::Make, "Camera Make"),
            (Tag::Model, "Camera Model"),
            (Tag::DateTime, "Date/Time"),
            (Tag::DateTimeOriginal, "Original Date/Time"),
            (Tag::ExposureTime, "Exposure Time"),
            (Tag::FNumber, "Aperture"),
            (Tag::FocalLength, "Focal Length"),
            (Tag::PhotographicSensitivity, "ISO"),
            (Tag::Flash, "Flash"),
            (Tag::Orientation, "Orientation"),
            (Tag::Software, "Software"),
            (Tag::Artist, "Artist"),
            (Tag::Copyright, "Copyright"),
            (Tag::GPSLatitude, "GPS Latitude"),
            (Tag::GPSLongitude, "GPS Longitude"),
        ];

        exif.fields()
            .filter_map(|field| {
                COMMON_FIELDS
                    .iter()
                    .find(|(tag, _)| field.tag == *tag)
                    .map(|(_, label)| {
                        let value = field.display_value().with_unit(exif).to_string();
                        (label.to_string(), value)
                    })
            })
            .collect()
    }
}

fn build_app1_segment(tiff: &[u8]) -> Result<Vec<u8>, MetadataError> {
    // Segment length counts itself (2 bytes) plus the payload.
    let total_len = 2 + EXIF_HEADER.len() + tiff.len();
    if total_len > u16::MAX as usize {
        return Err(MetadataError::TooLarge(tiff.len()));
    }

    let mut segment = Vec::with_capacity(total_len + 2);
    segment.extend_from_slice(&[0xFF, APP1]);
    segment.extend_from_slice(&(total_len as u16).to_be_bytes());
    segment.extend_from_slice(EXIF_HEADER);
    segment.extend_from_slice(tiff);
    Ok(segment)
}

fn after_leading_app0(jpeg: &[u8]) -> usize {
    let pos = SOI.len();
    if jpeg.len() >= pos + 4 && jpeg[pos] == 0xFF && jpeg[pos + 1] == APP0 {
        let len = u16::from_be_bytes([jpeg[pos + 2], jpeg[pos + 3]]) as usize;
        let end = pos + 2 + len;
        if end <= jpeg.len() {
            return end;
        }
    }
    pos
}
