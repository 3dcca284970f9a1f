// cropkit/src/processors/cropper.rs
//! Crop rectangle math. Everything here is pure and testable without images.
//!
//! The interactive widget reports a [`PercentRect`] relative to whatever size
//! it displayed the image at. Percentages are resolution independent, so
//! they scale straight onto the natural dimensions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CropperError {
    #[error("Crop rectangle resolves to {width}x{height} pixels")]
    Degenerate { width: u32, height: u32 },

    #[error("Crop rectangle contains a non-finite value")]
    NotFinite,

    #[error("Invalid aspect ratio: {0}")]
    InvalidRatio(String),
}

/// Rectangle in percent (0-100) of the displayed image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PercentRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn full() -> Self {
        Self::new(0.0, 0.0, 100.0, 100.0)
    }

    fn is_finite(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Crop region in natural pixels of one specific image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropSelection {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropSelection {
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x.checked_add(self.width).is_some_and(|right| right <= width)
            && self.y.checked_add(self.height).is_some_and(|bottom| bottom <= height)
    }
}

impl fmt::Display for CropSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Map a percentage rectangle onto natural dimensions.
///
/// Values are clamped to `[0, 100]`, floored, then trimmed so the result
/// never leaves the image. A rectangle that floors to zero pixels on either
/// axis is rejected rather than forwarded to export.
pub fn map_to_pixels(
    rect: &PercentRect,
    width: u32,
    height: u32,
) -> Result<CropSelection, CropperError> {
    if !rect.is_finite() {
        return Err(CropperError::NotFinite);
    }

    let x = scale_percent(rect.x, width);
    let y = scale_percent(rect.y, height);
    let crop_w = scale_percent(rect.width, width).min(width - x);
    let crop_h = scale_percent(rect.height, height).min(height - y);

    if crop_w == 0 || crop_h == 0 {
        return Err(CropperError::Degenerate {
            width: crop_w,
            height: crop_h,
        });
    }

    Ok(CropSelection {
        x,
        y,
        width: crop_w,
        height: crop_h,
    })
}

fn scale_percent(percent: f64, extent: u32) -> u32 {
    let clamped = percent.clamp(0.0, 100.0);
    // Absorb float noise like 539.9999999 before flooring.
    ((clamped / 100.0 * extent as f64 + 1e-9).floor() as u32).min(extent)
}

/// The largest rectangle of `aspect` that fits the image, scaled to
/// `percent` of that size and centered.
pub fn default_crop(aspect: AspectRatio, width: u32, height: u32, percent: f64) -> PercentRect {
    if width == 0 || height == 0 {
        return PercentRect::full();
    }

    let (w, h) = (width as f64, height as f64);
    let ratio = aspect.value();
    let scale = percent.clamp(0.0, 100.0) / 100.0;

    let (fit_w, fit_h) = if w / h > ratio {
        // Image is wider than the target: height limits.
        (h * ratio, h)
    } else {
        (w, w / ratio)
    };

    // Never less than one whole pixel, or tiny images map to nothing.
    let crop_w = (fit_w * scale).max(1.0);
    let crop_h = (fit_h * scale).max(1.0);

    PercentRect {
        x: (w - crop_w) / 2.0 / w * 100.0,
        y: (h - crop_h) / 2.0 / h * 100.0,
        width: crop_w / w * 100.0,
        height: crop_h / h * 100.0,
    }
}

/// A width:height ratio kept as a reduced fraction so flipping is exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AspectRatio {
    width: u32,
    height: u32,
}

impl AspectRatio {
    pub const SQUARE: AspectRatio = AspectRatio {
        width: 1,
        height: 1,
    };

    pub fn new(width: u32, height: u32) -> Result<Self, CropperError> {
        if width == 0 || height == 0 {
            return Err(CropperError::InvalidRatio(format!("{}:{}", width, height)));
        }
        let divisor = gcd(width, height);
        Ok(Self {
            width: width / divisor,
            height: height / divisor,
        })
    }

    pub fn width(self) -> u32 {
        self.width
    }

    pub fn height(self) -> u32 {
        self.height
    }

    pub fn value(self) -> f64 {
        self.width as f64 / self.height as f64
    }

    pub fn is_square(self) -> bool {
        self.width == self.height
    }

    /// Swap width and height. Square ratios are left alone.
    pub fn flip(self) -> Self {
        if self.is_square() {
            return self;
        }
        Self {
            width: self.height,
            height: self.width,
        }
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self::SQUARE
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl FromStr for AspectRatio {
    type Err = CropperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(preset) = RatioPreset::from_name(trimmed) {
            return Ok(preset.ratio());
        }

        let (w, h) = trimmed
            .split_once(':')
            .or_else(|| trimmed.split_once('x'))
            .ok_or_else(|| CropperError::InvalidRatio(s.to_string()))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<u32>()
                .map_err(|_| CropperError::InvalidRatio(s.to_string()))
        };
        AspectRatio::new(parse(w)?, parse(h)?)
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

/// The fixed set of ratios offered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatioPreset {
    Portrait2x3,
    Landscape3x2,
    Portrait4x5,
    Landscape5x4,
    Square,
    Widescreen,
    Vertical,
}

impl RatioPreset {
    pub const ALL: [RatioPreset; 7] = [
        RatioPreset::Portrait2x3,
        RatioPreset::Landscape3x2,
        RatioPreset::Portrait4x5,
        RatioPreset::Landscape5x4,
        RatioPreset::Square,
        RatioPreset::Widescreen,
        RatioPreset::Vertical,
    ];

    pub fn label(self) -> &'static str {
        match self {
            RatioPreset::Portrait2x3 => "2:3 (4x6)",
            RatioPreset::Landscape3x2 => "3:2",
            RatioPreset::Portrait4x5 => "4:5 (8x10)",
            RatioPreset::Landscape5x4 => "5:4",
            RatioPreset::Square => "1:1 (Square)",
            RatioPreset::Widescreen => "16:9 (Widescreen)",
            RatioPreset::Vertical => "9:16 (Vertical)",
        }
    }

    pub fn ratio(self) -> AspectRatio {
        let (width, height) = match self {
            RatioPreset::Portrait2x3 => (2, 3),
            RatioPreset::Landscape3x2 => (3, 2),
            RatioPreset::Portrait4x5 => (4, 5),
            RatioPreset::Landscape5x4 => (5, 4),
            RatioPreset::Square => (1, 1),
            RatioPreset::Widescreen => (16, 9),
            RatioPreset::Vertical => (9, 16),
        };
        AspectRatio { width, height }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "square" => Some(RatioPreset::Square),
            "widescreen" => Some(RatioPreset::Widescreen),
            "vertical" => Some(RatioPreset::Vertical),
            "4x6" => Some(RatioPreset::Portrait2x3),
            "8x10" => Some(RatioPreset::Portrait4x5),
            _ => None,
        }
    }
}
