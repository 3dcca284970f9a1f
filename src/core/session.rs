// cropkit/src/core/session.rs
use super::workflow::{ExportReport, WorkflowController, WorkflowError};
use super::{CropError, Result};
use crate::processors::{AspectRatio, NormalizedImage, PercentRect, UploadedFile};
use std::collections::HashMap;
use std::path::Path;

/// What the crop widget decided for the image on screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CropDecision {
    Complete(PercentRect),
    Back,
    Flip,
}

/// Anything that can play the part of the interactive crop widget.
pub trait CropSource {
    /// `position` is `(1-based index, total)`. `suggested` is the centered
    /// default rectangle for `aspect`.
    fn decide(
        &mut self,
        image: &NormalizedImage,
        aspect: AspectRatio,
        position: (usize, usize),
        suggested: PercentRect,
    ) -> CropDecision;
}

/// Non-interactive crop source: per-file rectangles read from JSON, keyed by
/// file name. Files without an entry take the suggested default.
#[derive(Debug, Clone, Default)]
pub struct CropPlan {
    rects: HashMap<String, PercentRect>,
    flip: bool,
    flipped: bool,
}

impl CropPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let rects: HashMap<String, PercentRect> = serde_json::from_str(json)
            .map_err(|e| CropError::InvalidParameter(format!("Invalid crop plan: {}", e)))?;
        Ok(Self {
            rects,
            ..Default::default()
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        log::debug!("Loaded crop plan from {}", path.display());
        Self::from_json(&json)
    }

    /// Flip the ratio once, before the first crop.
    pub fn with_flip(mut self, flip: bool) -> Self {
        self.flip = flip;
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, rect: PercentRect) {
        self.rects.insert(name.into(), rect);
    }

    pub fn get(&self, name: &str) -> Option<&PercentRect> {
        self.rects.get(name)
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }
}

impl CropSource for CropPlan {
    fn decide(
        &mut self,
        image: &NormalizedImage,
        _aspect: AspectRatio,
        _position: (usize, usize),
        suggested: PercentRect,
    ) -> CropDecision {
        if self.flip && !self.flipped {
            self.flipped = true;
            return CropDecision::Flip;
        }

        match self.rects.get(image.name()) {
            Some(rect) => CropDecision::Complete(*rect),
            None => {
                log::debug!("No planned crop for {}; using default", image.name());
                CropDecision::Complete(suggested)
            }
        }
    }
}

/// Drive a whole session: upload, pick `ratio`, crop every image with
/// `source`, export. Returns `None` when no file could be loaded.
///
/// A rectangle the controller rejects is replaced by the suggested default
/// so one bad decision cannot stall the batch.
pub fn run_session<'a>(
    controller: &'a mut WorkflowController,
    files: Vec<UploadedFile>,
    ratio: AspectRatio,
    source: &mut dyn CropSource,
) -> Result<Option<&'a ExportReport>> {
    if controller.upload(files)? == 0 {
        return Ok(None);
    }
    controller.select_ratio(ratio)?;

    while let Some(position) = controller.progress() {
        let (Some(image), Some(suggested)) = (
            controller.current_image(),
            controller.default_crop_for_current(),
        ) else {
            break;
        };

        match source.decide(image, controller.ratio(), position, suggested) {
            CropDecision::Complete(rect) => {
                if let Err(e) = controller.complete_percent_crop(rect) {
                    log::warn!("Rejected crop ({}); using default", e);
                    if let Err(e) = controller.complete_percent_crop(suggested) {
                        log::warn!("Rejected default crop ({}); using whole image", e);
                        controller.complete_percent_crop(PercentRect::full())?;
                    }
                }
            }
            CropDecision::Back => match controller.back() {
                Err(CropError::Workflow(WorkflowError::AtFirstImage)) => {
                    log::warn!("Already at the first image");
                }
                other => other?,
            },
            CropDecision::Flip => {
                controller.flip_ratio()?;
            }
        }
    }

    Ok(controller.report())
}
