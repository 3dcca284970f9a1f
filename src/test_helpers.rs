//! Shared fixtures for unit tests. Every image is generated in memory.

use exif::experimental::Writer;
use exif::{Field, In, Tag, Value};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

use crate::processors::{MetadataProcessor, PreservedMetadata, UploadedFile};

/// A gradient so crops of different regions encode differently.
pub fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    })
}

pub fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(gradient(width, height))
        .write_to(&mut buffer, format)
        .unwrap();
    buffer.into_inner()
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Jpeg)
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Png)
}

/// TIFF-structured EXIF payload with a single Make tag.
pub fn exif_blob(make: &str) -> Vec<u8> {
    let field = Field {
        tag: Tag::Make,
        ifd_num: In::PRIMARY,
        value: Value::Ascii(vec![make.as_bytes().to_vec()]),
    };
    let mut writer = Writer::new();
    writer.push_field(&field);

    let mut buffer = Cursor::new(Vec::new());
    writer.write(&mut buffer, false).unwrap();
    buffer.into_inner()
}

pub fn jpeg_with_exif(width: u32, height: u32, make: &str) -> Vec<u8> {
    MetadataProcessor::new()
        .inject(
            &jpeg_bytes(width, height),
            &PreservedMetadata::new(exif_blob(make)),
        )
        .unwrap()
}

pub fn upload(name: &str, media_type: &str, bytes: Vec<u8>) -> UploadedFile {
    UploadedFile::new(name, media_type, bytes, 1_700_000_000_000)
}
