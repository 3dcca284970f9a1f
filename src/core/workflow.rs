// cropkit/src/core/workflow.rs
//! The upload → ratio → crop → export state machine.
//!
//! The controller owns the current batch of [`NormalizedImage`]s, so the
//! display handles they hold live exactly as long as the batch does.

use super::{CropError, CropperConfig, FileError, Quality, Result};
use crate::processors::{
    default_crop, map_to_pixels, Archive, ArchiveBuilder, ArchiveWriter, AspectRatio,
    BatchProcessor, CropSelection, HandleLedger, NormalizedImage, Normalizer, PercentRect,
    Renderer, Transcoder, UploadedFile, ARCHIVE_ERROR_NAME,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowState {
    Uploading,
    RatioSelection,
    Cropping { index: usize },
    Exporting,
    Done {
        exported: usize,
        errors: Vec<FileError>,
    },
}

impl WorkflowState {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowState::Uploading => "Uploading",
            WorkflowState::RatioSelection => "RatioSelection",
            WorkflowState::Cropping { .. } => "Cropping",
            WorkflowState::Exporting => "Exporting",
            WorkflowState::Done { .. } => "Done",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowState::Cropping { index } => write!(f, "Cropping (image {})", index + 1),
            other => f.write_str(other.name()),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Cannot {action} while in {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    #[error("Already at the first image")]
    AtFirstImage,

    #[error("No files were provided")]
    NoFiles,
}

/// Outcome of one export run, kept until the user starts over.
#[derive(Debug, Clone)]
pub struct ExportReport {
    /// Images in the batch at export time.
    pub total: usize,
    /// Images that produced an encoded buffer.
    pub rendered: usize,
    /// Entries delivered in the archive. Zero when packaging failed.
    pub exported: usize,
    pub ingest_errors: Vec<FileError>,
    pub export_errors: Vec<FileError>,
    pub archive: Option<Archive>,
}

impl ExportReport {
    /// Ingest errors first, then export errors.
    pub fn errors(&self) -> impl Iterator<Item = &FileError> {
        self.ingest_errors.iter().chain(self.export_errors.iter())
    }

    pub fn has_errors(&self) -> bool {
        !self.ingest_errors.is_empty() || !self.export_errors.is_empty()
    }

    pub fn title(&self) -> &'static str {
        if !self.has_errors() {
            "All Done!"
        } else if self.exported > 0 {
            "Finished with some issues"
        } else {
            "Export Failed"
        }
    }

    pub fn summary(&self) -> String {
        if self.exported > 0 {
            format!(
                "Successfully exported {} of {} image(s).",
                self.exported, self.total
            )
        } else if self.has_errors() {
            "Could not export any images. Please see the errors below.".to_string()
        } else {
            "Nothing to export.".to_string()
        }
    }
}

pub struct WorkflowController {
    config: CropperConfig,
    normalizer: Normalizer,
    renderer: Renderer,
    archiver: ArchiveBuilder,
    batch: BatchProcessor,
    state: WorkflowState,
    images: Vec<NormalizedImage>,
    crops: HashMap<String, CropSelection>,
    ratio: AspectRatio,
    ingest_errors: Vec<FileError>,
    report: Option<ExportReport>,
}

impl WorkflowController {
    pub fn new(config: CropperConfig) -> Result<Self> {
        config.validate()?;

        let batch = BatchProcessor::new(config.threads)?.with_progress(config.show_progress);

        Ok(Self {
            normalizer: Normalizer::new(&config),
            renderer: Renderer::new(config.quality),
            archiver: ArchiveBuilder::new(config.archive_name.clone()),
            batch,
            config,
            state: WorkflowState::Uploading,
            images: Vec::new(),
            crops: HashMap::new(),
            ratio: AspectRatio::default(),
            ingest_errors: Vec::new(),
            report: None,
        })
    }

    pub fn with_transcoder(mut self, transcoder: Arc<dyn Transcoder>) -> Self {
        self.normalizer = self.normalizer.with_transcoder(transcoder);
        self
    }

    pub fn with_archive_writer(mut self, writer: Arc<dyn ArchiveWriter>) -> Self {
        self.archiver = self.archiver.with_writer(writer);
        self
    }

    pub fn with_ledger(mut self, ledger: HandleLedger) -> Self {
        self.normalizer = self.normalizer.with_ledger(ledger);
        self
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.config.quality = quality;
        self.renderer = Renderer::new(quality);
        self
    }

    pub fn config(&self) -> &CropperConfig {
        &self.config
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn images(&self) -> &[NormalizedImage] {
        &self.images
    }

    pub fn ratio(&self) -> AspectRatio {
        self.ratio
    }

    pub fn ingest_errors(&self) -> &[FileError] {
        &self.ingest_errors
    }

    pub fn crops(&self) -> &HashMap<String, CropSelection> {
        &self.crops
    }

    pub fn report(&self) -> Option<&ExportReport> {
        self.report.as_ref()
    }

    pub fn ledger(&self) -> &HandleLedger {
        self.normalizer.ledger()
    }

    pub fn current_image(&self) -> Option<&NormalizedImage> {
        match self.state {
            WorkflowState::Cropping { index } => self.images.get(index),
            _ => None,
        }
    }

    /// `(position, total)` with a 1-based position, while cropping.
    pub fn progress(&self) -> Option<(usize, usize)> {
        match self.state {
            WorkflowState::Cropping { index } => Some((index + 1, self.images.len())),
            _ => None,
        }
    }

    /// The centered starting rectangle for the image being cropped.
    pub fn default_crop_for_current(&self) -> Option<PercentRect> {
        self.current_image().map(|image| {
            default_crop(
                self.ratio,
                image.width(),
                image.height(),
                self.config.default_crop_percent,
            )
        })
    }

    /// Normalize a new batch, replacing whatever was loaded before.
    ///
    /// Returns the number of accepted images. With none accepted the
    /// controller stays in `Uploading` and the errors stay visible.
    pub fn upload(&mut self, files: Vec<UploadedFile>) -> Result<usize> {
        self.expect_state("upload", |s| matches!(s, WorkflowState::Uploading))?;

        if files.is_empty() {
            return Err(WorkflowError::NoFiles.into());
        }

        let outcome = self.batch.ingest(&self.normalizer, files);

        // Dropping the previous batch releases its handles.
        self.images = outcome.images;
        self.ingest_errors = outcome.errors;
        self.crops.clear();

        if self.images.is_empty() {
            log::warn!(
                "None of the uploaded files could be loaded ({} errors)",
                self.ingest_errors.len()
            );
            return Ok(0);
        }

        log::info!(
            "Accepted {} images, rejected {}",
            self.images.len(),
            self.ingest_errors.len()
        );
        self.state = WorkflowState::RatioSelection;
        Ok(self.images.len())
    }

    pub fn select_ratio(&mut self, ratio: AspectRatio) -> Result<()> {
        self.expect_state("select a ratio", |s| {
            matches!(s, WorkflowState::RatioSelection)
        })?;

        log::debug!("Selected aspect ratio {}", ratio);
        self.ratio = ratio;
        self.state = WorkflowState::Cropping { index: 0 };
        Ok(())
    }

    /// Swap the working ratio's orientation. The flip sticks for the
    /// remaining images until flipped back.
    pub fn flip_ratio(&mut self) -> Result<AspectRatio> {
        self.expect_state("flip the ratio", |s| {
            matches!(s, WorkflowState::Cropping { .. })
        })?;

        self.ratio = self.ratio.flip();
        log::debug!("Aspect ratio flipped to {}", self.ratio);
        Ok(self.ratio)
    }

    pub fn back(&mut self) -> Result<()> {
        let index = self.cropping_index("go back")?;
        if index == 0 {
            return Err(WorkflowError::AtFirstImage.into());
        }

        self.state = WorkflowState::Cropping { index: index - 1 };
        Ok(())
    }

    /// Record the crop for the current image and advance. Completing the
    /// last image runs the export and lands in `Done`.
    pub fn complete_crop(&mut self, selection: CropSelection) -> Result<()> {
        let index = self.cropping_index("complete a crop")?;
        let image = &self.images[index];

        if !selection.fits_within(image.width(), image.height()) {
            return Err(CropError::InvalidParameter(format!(
                "Crop {} does not fit {} ({}x{})",
                selection,
                image.name(),
                image.width(),
                image.height()
            )));
        }

        log::debug!("Crop for {}: {}", image.name(), selection);
        self.crops.insert(image.id().to_string(), selection);

        if index + 1 < self.images.len() {
            self.state = WorkflowState::Cropping { index: index + 1 };
        } else {
            self.state = WorkflowState::Exporting;
            self.export();
        }
        Ok(())
    }

    /// Same as [`complete_crop`](Self::complete_crop) for a rectangle in
    /// display percentages.
    pub fn complete_percent_crop(&mut self, rect: PercentRect) -> Result<()> {
        let image = self.current_image().ok_or(WorkflowError::InvalidTransition {
            action: "complete a crop",
            state: self.state.name(),
        })?;

        let selection = map_to_pixels(&rect, image.width(), image.height())
            .map_err(|e| CropError::InvalidParameter(format!("{}: {}", image.name(), e)))?;
        self.complete_crop(selection)
    }

    /// Back to an empty `Uploading` state. Every handle of the old batch is
    /// released here.
    pub fn start_over(&mut self) -> Result<()> {
        self.expect_state("start over", |s| matches!(s, WorkflowState::Done { .. }))?;

        self.images.clear();
        self.crops.clear();
        self.ingest_errors.clear();
        self.report = None;
        self.ratio = AspectRatio::default();
        self.state = WorkflowState::Uploading;
        log::debug!("Session reset");
        Ok(())
    }

    fn export(&mut self) {
        let total = self.images.len();
        log::info!("Exporting {} images", total);

        let outcome = self.batch.render(&self.renderer, &self.images, &self.crops);
        let rendered = outcome.rendered.len();
        let mut export_errors = outcome.errors;

        let mut archive = None;
        let mut exported = 0;
        if rendered > 0 {
            match self.archiver.build(outcome.rendered) {
                Ok(built) => {
                    exported = rendered;
                    archive = Some(built);
                }
                Err(e) => export_errors.push(FileError::new(ARCHIVE_ERROR_NAME, e.to_string())),
            }
        } else {
            log::warn!("No images were rendered; skipping archive");
        }

        log::info!(
            "Export finished: {} of {} exported, {} errors",
            exported,
            total,
            export_errors.len()
        );

        self.state = WorkflowState::Done {
            exported,
            errors: export_errors.clone(),
        };
        self.report = Some(ExportReport {
            total,
            rendered,
            exported,
            ingest_errors: self.ingest_errors.clone(),
            export_errors,
            archive,
        });
    }

    fn cropping_index(&self, action: &'static str) -> Result<usize> {
        match self.state {
            WorkflowState::Cropping { index } => Ok(index),
            ref other => Err(WorkflowError::InvalidTransition {
                action,
                state: other.name(),
            }
            .into()),
        }
    }

    fn expect_state(
        &self,
        action: &'static str,
        allowed: impl Fn(&WorkflowState) -> bool,
    ) -> Result<()> {
        if allowed(&self.state) {
            Ok(())
        } else {
            Err(WorkflowError::InvalidTransition {
                action,
                state: self.state.name(),
            }
            .into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::{ArchiveEntry, ArchiveError, RatioPreset, RENDER_FAILED_MESSAGE};
    use crate::test_helpers::{png_bytes, upload};

    struct FailingWriter;

    impl ArchiveWriter for FailingWriter {
        fn write(&self, _entries: &[ArchiveEntry]) -> std::result::Result<Vec<u8>, ArchiveError> {
            Err(ArchiveError::Other("quota exceeded".to_string()))
        }
    }

    fn controller() -> WorkflowController {
        WorkflowController::new(CropperConfig::default()).unwrap()
    }

    fn pngs(names: &[&str]) -> Vec<UploadedFile> {
        names
            .iter()
            .map(|name| upload(name, "image/png", png_bytes(40, 20)))
            .collect()
    }

    fn full() -> CropSelection {
        CropSelection {
            x: 0,
            y: 0,
            width: 40,
            height: 20,
        }
    }

    fn workflow_error(result: Result<()>) -> WorkflowError {
        match result {
            Err(CropError::Workflow(e)) => e,
            other => panic!("expected workflow error, got {other:?}"),
        }
    }

    #[test]
    fn happy_path_reaches_done() {
        let mut wf = controller();
        assert_eq!(wf.upload(pngs(&["a.png", "b.png"])).unwrap(), 2);
        assert_eq!(wf.state(), &WorkflowState::RatioSelection);

        wf.select_ratio(AspectRatio::SQUARE).unwrap();
        assert_eq!(wf.progress(), Some((1, 2)));
        assert_eq!(wf.current_image().unwrap().name(), "a.png");

        wf.complete_crop(full()).unwrap();
        assert_eq!(wf.state(), &WorkflowState::Cropping { index: 1 });

        wf.complete_crop(full()).unwrap();
        assert_eq!(
            wf.state(),
            &WorkflowState::Done {
                exported: 2,
                errors: vec![]
            }
        );

        let report = wf.report().unwrap();
        assert_eq!(report.title(), "All Done!");
        assert_eq!(report.summary(), "Successfully exported 2 of 2 image(s).");
        assert_eq!(report.archive.as_ref().unwrap().name, "cropped-images.zip");
    }

    #[test]
    fn back_navigation() {
        let mut wf = controller();
        wf.upload(pngs(&["a.png", "b.png", "c.png"])).unwrap();
        wf.select_ratio(AspectRatio::SQUARE).unwrap();

        assert_eq!(workflow_error(wf.back()), WorkflowError::AtFirstImage);
        assert_eq!(wf.state(), &WorkflowState::Cropping { index: 0 });

        wf.complete_crop(full()).unwrap();
        wf.complete_crop(full()).unwrap();
        assert_eq!(wf.state(), &WorkflowState::Cropping { index: 2 });

        wf.back().unwrap();
        assert_eq!(wf.state(), &WorkflowState::Cropping { index: 1 });

        // Re-cropping overwrites the earlier selection for the same image.
        let narrow = CropSelection {
            x: 5,
            y: 5,
            width: 10,
            height: 10,
        };
        wf.complete_crop(narrow).unwrap();
        let id = wf.images()[1].id().to_string();
        assert_eq!(wf.crops()[&id], narrow);
    }

    #[test]
    fn single_image_goes_straight_to_done() {
        let mut wf = controller();
        wf.upload(pngs(&["only.png"])).unwrap();
        wf.select_ratio(AspectRatio::SQUARE).unwrap();
        wf.complete_crop(full()).unwrap();

        assert!(matches!(wf.state(), WorkflowState::Done { exported: 1, .. }));
    }

    #[test]
    fn illegal_events_leave_state_untouched() {
        let mut wf = controller();

        assert_eq!(
            workflow_error(wf.select_ratio(AspectRatio::SQUARE)),
            WorkflowError::InvalidTransition {
                action: "select a ratio",
                state: "Uploading"
            }
        );
        assert!(wf.complete_crop(full()).is_err());
        assert!(wf.start_over().is_err());
        assert_eq!(wf.state(), &WorkflowState::Uploading);

        wf.upload(pngs(&["a.png"])).unwrap();
        assert!(wf.upload(pngs(&["b.png"])).is_err());
        assert!(wf.back().is_err());
        assert_eq!(wf.state(), &WorkflowState::RatioSelection);
    }

    #[test]
    fn all_failed_upload_stays_in_uploading() {
        let mut wf = controller();
        let accepted = wf
            .upload(vec![upload("bad.jpg", "image/jpeg", vec![1, 2, 3])])
            .unwrap();

        assert_eq!(accepted, 0);
        assert_eq!(wf.state(), &WorkflowState::Uploading);
        assert_eq!(wf.ingest_errors().len(), 1);
        assert_eq!(wf.ingest_errors()[0].file_name, "bad.jpg");

        // A retry is allowed and clears the old errors.
        wf.upload(pngs(&["good.png"])).unwrap();
        assert!(wf.ingest_errors().is_empty());
    }

    #[test]
    fn empty_upload_is_rejected() {
        let mut wf = controller();
        match wf.upload(Vec::new()) {
            Err(CropError::Workflow(WorkflowError::NoFiles)) => {}
            other => panic!("expected NoFiles, got {other:?}"),
        }
    }

    #[test]
    fn out_of_bounds_selection_is_rejected() {
        let mut wf = controller();
        wf.upload(pngs(&["a.png"])).unwrap();
        wf.select_ratio(AspectRatio::SQUARE).unwrap();

        let result = wf.complete_crop(CropSelection {
            x: 30,
            y: 0,
            width: 20,
            height: 10,
        });
        assert!(matches!(result, Err(CropError::InvalidParameter(_))));
        assert_eq!(wf.state(), &WorkflowState::Cropping { index: 0 });
    }

    #[test]
    fn percent_crop_maps_onto_pixels() {
        let mut wf = controller();
        wf.upload(pngs(&["a.png", "b.png"])).unwrap();
        wf.select_ratio(AspectRatio::SQUARE).unwrap();
        wf.complete_percent_crop(PercentRect::new(10.0, 10.0, 50.0, 50.0))
            .unwrap();

        let id = wf.images()[0].id().to_string();
        assert_eq!(
            wf.crops()[&id],
            CropSelection {
                x: 4,
                y: 2,
                width: 20,
                height: 10
            }
        );

        let degenerate = wf.complete_percent_crop(PercentRect::new(0.0, 0.0, 0.0, 50.0));
        assert!(matches!(degenerate, Err(CropError::InvalidParameter(_))));
        assert_eq!(wf.state(), &WorkflowState::Cropping { index: 1 });
    }

    #[test]
    fn flip_persists_across_images() {
        let mut wf = controller();
        wf.upload(pngs(&["a.png", "b.png"])).unwrap();
        wf.select_ratio(RatioPreset::Landscape3x2.ratio()).unwrap();

        assert_eq!(wf.flip_ratio().unwrap(), RatioPreset::Portrait2x3.ratio());
        wf.complete_crop(full()).unwrap();
        assert_eq!(wf.ratio(), RatioPreset::Portrait2x3.ratio());

        let rect = wf.default_crop_for_current().unwrap();
        assert!(rect.height > rect.width);
    }

    #[test]
    fn archive_failure_is_reported_once() {
        let mut wf = controller().with_archive_writer(Arc::new(FailingWriter));
        wf.upload(pngs(&["a.png", "b.png"])).unwrap();
        wf.select_ratio(AspectRatio::SQUARE).unwrap();
        wf.complete_crop(full()).unwrap();
        wf.complete_crop(full()).unwrap();

        let report = wf.report().unwrap();
        assert_eq!(report.rendered, 2);
        assert_eq!(report.exported, 0);
        assert!(report.archive.is_none());
        assert_eq!(report.export_errors.len(), 1);
        assert_eq!(report.export_errors[0].file_name, "ZIP Archive");
        assert_eq!(
            report.export_errors[0].message,
            "Failed to create downloadable zip file: quota exceeded"
        );
        assert_eq!(report.title(), "Export Failed");
    }

    #[test]
    fn render_failure_is_per_image() {
        let mut wf = controller();
        wf.upload(pngs(&["a.png", "b.png"])).unwrap();
        wf.select_ratio(AspectRatio::SQUARE).unwrap();
        wf.complete_crop(full()).unwrap();

        // Drop the first crop behind the controller's back: its render fails.
        let first = wf.images()[0].id().to_string();
        wf.crops.remove(&first);
        wf.complete_crop(full()).unwrap();

        let report = wf.report().unwrap();
        assert_eq!(report.exported, 1);
        assert_eq!(
            report.export_errors,
            [FileError::new("a.png", RENDER_FAILED_MESSAGE)]
        );
        assert_eq!(report.title(), "Finished with some issues");
    }

    #[test]
    fn ingest_errors_are_redisplayed_in_report() {
        let mut wf = controller();
        let mut files = pngs(&["a.png"]);
        files.push(upload("broken.png", "image/png", vec![0; 8]));
        wf.upload(files).unwrap();
        wf.select_ratio(AspectRatio::SQUARE).unwrap();
        wf.complete_crop(full()).unwrap();

        let report = wf.report().unwrap();
        assert_eq!(report.exported, 1);
        assert!(report.export_errors.is_empty());
        let names: Vec<&str> = report.errors().map(|e| e.file_name.as_str()).collect();
        assert_eq!(names, ["broken.png"]);
        assert_eq!(report.title(), "Finished with some issues");
    }

    #[test]
    fn handles_released_on_start_over_and_drop() {
        let ledger = HandleLedger::new();
        let mut wf = controller().with_ledger(ledger.clone());

        wf.upload(pngs(&["a.png", "b.png"])).unwrap();
        assert_eq!(ledger.live(), 2);

        wf.select_ratio(AspectRatio::SQUARE).unwrap();
        wf.complete_crop(full()).unwrap();
        wf.complete_crop(full()).unwrap();
        assert_eq!(ledger.live(), 2);

        wf.start_over().unwrap();
        assert_eq!(ledger.live(), 0);
        assert_eq!(wf.state(), &WorkflowState::Uploading);
        assert!(wf.report().is_none());

        wf.upload(pngs(&["c.png"])).unwrap();
        assert_eq!(ledger.allocated(), 3);
        assert_eq!(ledger.live(), 1);

        drop(wf);
        assert_eq!(ledger.live(), 0);
        assert_eq!(ledger.released(), 3);
    }

    #[test]
    fn failed_retry_releases_nothing_twice() {
        let ledger = HandleLedger::new();
        let mut wf = controller().with_ledger(ledger.clone());

        wf.upload(vec![upload("bad.png", "image/png", vec![0; 8])])
            .unwrap();
        assert_eq!(ledger.allocated(), 1);
        assert_eq!(ledger.released(), 1);
        assert_eq!(ledger.live(), 0);
    }
}
