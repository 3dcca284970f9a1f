// cropkit/src/utils/mod.rs
use crate::core::{CropError, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const SUPPORTED_EXTENSIONS: [&str; 10] = [
    "jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp", "heic", "heif",
];

pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let base = 1024_f64;
    let bytes_f64 = bytes as f64;
    let exponent = ((bytes_f64.log10() / base.log10()).floor() as usize).min(UNITS.len() - 1);
    let size = bytes_f64 / base.powi(exponent as i32);

    format!("{:.2} {}", size, UNITS[exponent])
}

pub fn calculate_aspect_ratio(width: u32, height: u32) -> f32 {
    if height == 0 {
        0.0
    } else {
        width as f32 / height as f32
    }
}

pub fn get_file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
}

pub fn is_supported_format(path: &Path) -> bool {
    get_file_extension(path)
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Media type a browser would declare for a file with this extension.
pub fn media_type_for_path(path: &Path) -> String {
    let media_type = match get_file_extension(path).as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("tiff") | Some("tif") => "image/tiff",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        Some("heif") => "image/heif",
        _ => "application/octet-stream",
    };
    media_type.to_string()
}

/// JPEG streams open with `FF D8 FF` (JFIF, EXIF and raw variants alike).
pub fn is_jpeg_signature(data: &[u8]) -> bool {
    data.len() >= 3 && data[0] == 0xFF && data[1] == 0xD8 && data[2] == 0xFF
}

pub fn image_format_to_string(format: image::ImageFormat) -> String {
    match format {
        image::ImageFormat::Jpeg => "JPEG",
        image::ImageFormat::Png => "PNG",
        image::ImageFormat::Gif => "GIF",
        image::ImageFormat::WebP => "WebP",
        image::ImageFormat::Tiff => "TIFF",
        image::ImageFormat::Bmp => "BMP",
        image::ImageFormat::Avif => "AVIF",
        _ => "Unknown",
    }
    .to_string()
}

pub fn get_image_info(path: &Path) -> Result<(u32, u32, String)> {
    let reader = image::ImageReader::open(path)?.with_guessed_format()?;

    let format = reader
        .format()
        .map(image_format_to_string)
        .unwrap_or_else(|| "Unknown".to_string());

    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| CropError::CorruptOrUnsupported(e.to_string()))?;

    Ok((width, height, format))
}

/// Expand the given inputs into image files. Directories are walked (one
/// level unless `recursive`), files are taken as-is so that unsupported
/// ones are reported by ingestion instead of silently dropped.
pub fn collect_image_paths(inputs: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    for input in inputs {
        if input.is_file() {
            paths.push(input.clone());
            continue;
        }

        if !input.is_dir() {
            return Err(CropError::InvalidParameter(format!(
                "Input does not exist: {}",
                input.display()
            )));
        }

        let walker = if recursive {
            WalkDir::new(input)
        } else {
            WalkDir::new(input).max_depth(1)
        };

        paths.extend(
            walker
                .sort_by_file_name()
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .filter(|entry| is_supported_format(entry.path()))
                .map(|entry| entry.into_path()),
        );
    }

    Ok(paths)
}

pub fn sanitize_filename(filename: &str) -> String {
    let invalid_chars = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];
    filename
        .chars()
        .map(|c| if invalid_chars.contains(&c) { '_' } else { c })
        .collect()
}
