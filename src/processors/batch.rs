// cropkit/src/processors/batch.rs
use crate::core::{CropError, FileError, Result};
use crate::processors::prelude::*;
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};

/// Message recorded for an image whose final render failed.
pub const RENDER_FAILED_MESSAGE: &str = "Failed during final crop.";

#[derive(Debug, Default)]
pub struct IngestOutcome {
    pub images: Vec<NormalizedImage>,
    pub errors: Vec<FileError>,
}

#[derive(Debug, Default)]
pub struct RenderOutcome {
    /// `(original file name, encoded bytes)` in batch order.
    pub rendered: Vec<(String, Vec<u8>)>,
    pub errors: Vec<FileError>,
}

/// Runs per-file work across a rayon pool. Results always come back in
/// input order, whatever order the workers finish in.
pub struct BatchProcessor {
    thread_pool: Option<rayon::ThreadPool>,
    show_progress: bool,
}

impl BatchProcessor {
    pub fn new(max_threads: usize) -> Result<Self> {
        let mut processor = Self {
            thread_pool: None,
            show_progress: false,
        };

        if max_threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(max_threads)
                .build()
                .map_err(|e| {
                    CropError::InvalidParameter(format!("Failed to create thread pool: {}", e))
                })?;
            processor.thread_pool = Some(pool);
        }

        Ok(processor)
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn ingest(&self, normalizer: &Normalizer, files: Vec<UploadedFile>) -> IngestOutcome {
        if files.is_empty() {
            log::warn!("No files to ingest");
            return IngestOutcome::default();
        }

        log::info!("Normalizing {} files", files.len());
        let pb = self.create_progress_bar(files.len(), "Loading");

        let results: Vec<(String, Result<NormalizedImage>)> = self.run(|| {
            files
                .into_par_iter()
                .progress_with(pb.clone())
                .map(|file| {
                    let name = file.name.clone();
                    (name, normalizer.normalize(file))
                })
                .collect()
        });

        let mut outcome = IngestOutcome::default();
        for (name, result) in results {
            match result {
                Ok(image) => outcome.images.push(image),
                Err(e) => {
                    log::error!("Failed to load {}: {}", name, e);
                    outcome.errors.push(FileError::new(name, e.to_string()));
                }
            }
        }
        outcome.images = disambiguate_ids(outcome.images);

        pb.finish_with_message(format!(
            "Loaded {} of {} files",
            outcome.images.len(),
            outcome.images.len() + outcome.errors.len()
        ));
        outcome
    }

    pub fn render(
        &self,
        renderer: &Renderer,
        images: &[NormalizedImage],
        crops: &HashMap<String, CropSelection>,
    ) -> RenderOutcome {
        let pb = self.create_progress_bar(images.len(), "Cropping");

        let results: Vec<Result<Vec<u8>>> = self.run(|| {
            images
                .par_iter()
                .progress_with(pb.clone())
                .map(|image| match crops.get(image.id()) {
                    Some(selection) => renderer.render(image, selection),
                    None => Err(CropError::CropRenderFailed(format!(
                        "no crop selection for {}",
                        image.name()
                    ))),
                })
                .collect()
        });

        let mut outcome = RenderOutcome::default();
        for (image, result) in images.iter().zip(results) {
            match result {
                Ok(bytes) => outcome.rendered.push((image.name().to_string(), bytes)),
                Err(e) => {
                    log::error!("Failed to crop {}: {}", image.name(), e);
                    outcome
                        .errors
                        .push(FileError::new(image.name(), RENDER_FAILED_MESSAGE));
                }
            }
        }

        pb.finish_with_message(format!(
            "Cropped {} of {} images",
            outcome.rendered.len(),
            images.len()
        ));
        outcome
    }

    fn run<T, F>(&self, job: F) -> T
    where
        F: FnOnce() -> T + Send,
        T: Send,
    {
        match &self.thread_pool {
            Some(pool) => pool.install(job),
            None => job(),
        }
    }

    fn create_progress_bar(&self, total: usize, prefix: &'static str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(total as u64).with_prefix(prefix);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{prefix} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}

/// Give every image a distinct id. A repeated `name-timestamp` key gets a
/// `~2`, `~3`, ... suffix in input order so crop selections never collide.
fn disambiguate_ids(images: Vec<NormalizedImage>) -> Vec<NormalizedImage> {
    let mut taken: HashSet<String> = images.iter().map(|i| i.id().to_string()).collect();
    let mut seen: HashSet<String> = HashSet::new();

    images
        .into_iter()
        .map(|image| {
            if seen.insert(image.id().to_string()) {
                return image;
            }

            let base = image.id().to_string();
            let mut counter = 2;
            let mut candidate = format!("{}~{}", base, counter);
            while taken.contains(&candidate) {
                counter += 1;
                candidate = format!("{}~{}", base, counter);
            }

            log::warn!("Duplicate image id {}; using {}", base, candidate);
            taken.insert(candidate.clone());
            seen.insert(candidate.clone());
            image.with_id(candidate)
        })
        .collect()
}
