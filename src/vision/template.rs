//! Template matcher: locate reference images inside a frame.

use super::base::{self, Recognizer};
use super::types::{MatchResult, OrderBy, Rect, RecoResult};
use image::{DynamicImage, GrayImage, RgbImage};
use imageproc::template_matching::{MatchTemplateMethod, match_template};
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;
use thiserror::Error;

pub const ALGORITHM: &str = "TemplateMatch";

/// Threshold used when the caller supplies none.
const DEFAULT_THRESHOLD: f64 = 0.7;

/// The error type for template resource loading.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template directory not found: {path}")]
    DirectoryNotFound { path: String },

    #[error("failed to read template directory {path}: {source}")]
    DirectoryRead {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to load template image {path}: {source}")]
    ImageLoad {
        path: String,
        source: image::ImageError,
    },
}

/// Reference images, stored grayscale and addressed by identifier.
///
/// Matching runs on luminance; color templates are converted on insert.
#[derive(Debug, Clone, Default)]
pub struct TemplateLibrary {
    images: HashMap<String, GrayImage>,
}

impl TemplateLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an in-memory color template under `name`.
    pub fn insert(&mut self, name: impl Into<String>, image: &RgbImage) {
        let gray = DynamicImage::ImageRgb8(image.clone()).to_luma8();
        self.images.insert(name.into(), gray);
    }

    /// Register an already-grayscale template under `name`.
    pub fn insert_gray(&mut self, name: impl Into<String>, image: GrayImage) {
        self.images.insert(name.into(), image);
    }

    /// Scan a directory for `*.png` files and load each under its file stem.
    /// Returns the number of templates loaded.
    pub fn load_from_directory(&mut self, directory: impl AsRef<Path>) -> Result<usize, TemplateError> {
        let dir_path = directory.as_ref();
        if !dir_path.exists() {
            return Err(TemplateError::DirectoryNotFound {
                path: dir_path.display().to_string(),
            });
        }

        let entries = std::fs::read_dir(dir_path).map_err(|source| TemplateError::DirectoryRead {
            path: dir_path.display().to_string(),
            source,
        })?;

        let mut loaded = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let is_png = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("png"));
            if !is_png || !path.is_file() {
                continue;
            }

            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("unknown")
                .to_string();

            let image = image::open(&path).map_err(|source| TemplateError::ImageLoad {
                path: path.display().to_string(),
                source,
            })?;
            self.images.insert(name, image.to_luma8());
            loaded += 1;
        }

        log::info!(
            "loaded {loaded} templates from {}",
            dir_path.display()
        );
        Ok(loaded)
    }

    pub fn get(&self, name: &str) -> Option<&GrayImage> {
        self.images.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.images.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.images.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Per-call template matching configuration.
#[derive(Debug, Clone)]
pub struct TemplateMatcherParam {
    /// Identifiers of the reference images to search for.
    pub templates: Vec<String>,
    /// Acceptance thresholds parallel to `templates`; when shorter, the
    /// last value repeats; when empty, 0.7 applies. Values outside `[0, 1]`
    /// are clamped into range.
    pub thresholds: Vec<f64>,
    pub order_by: OrderBy,
    /// Logical index into the ordered filtered results, negative counts
    /// from the end.
    pub result_index: i64,
}

impl Default for TemplateMatcherParam {
    fn default() -> Self {
        Self {
            templates: Vec::new(),
            thresholds: Vec::new(),
            order_by: OrderBy::default(),
            result_index: 0,
        }
    }
}

impl TemplateMatcherParam {
    fn threshold_for(&self, index: usize) -> f64 {
        self.thresholds
            .get(index)
            .or_else(|| self.thresholds.last())
            .copied()
            .unwrap_or(DEFAULT_THRESHOLD)
            .clamp(0.0, 1.0)
    }
}

/// Finds occurrences of reference images inside a frame via normalized
/// cross-correlation. Produces one candidate per reference image, at the
/// best-correlated position.
pub struct TemplateMatcher<'a> {
    library: &'a TemplateLibrary,
    param: TemplateMatcherParam,
}

impl<'a> TemplateMatcher<'a> {
    pub fn new(library: &'a TemplateLibrary, param: TemplateMatcherParam) -> Self {
        Self { library, param }
    }
}

impl Recognizer for TemplateMatcher<'_> {
    fn analyze(&self, frame: &RgbImage, roi: Option<Rect>) -> RecoResult {
        let start = Instant::now();
        let mut result = RecoResult::new(ALGORITHM);

        let roi = base::resolve_roi(frame, roi);
        if !roi.is_valid() || self.param.templates.is_empty() {
            result.cost_ms = start.elapsed().as_secs_f64() * 1000.0;
            return result;
        }

        let search = base::crop_to_roi(frame, roi);
        let search_gray = DynamicImage::ImageRgb8(search).to_luma8();

        let mut all = Vec::new();
        let mut filtered = Vec::new();

        for (index, name) in self.param.templates.iter().enumerate() {
            let Some(template) = self.library.get(name) else {
                let mut failed =
                    RecoResult::failed(ALGORITHM, format!("template not loaded: {name}"));
                failed.cost_ms = start.elapsed().as_secs_f64() * 1000.0;
                return failed;
            };

            if template.width() > search_gray.width() || template.height() > search_gray.height() {
                log::warn!(
                    "template '{name}' ({}x{}) larger than search region ({}x{}), skipped",
                    template.width(),
                    template.height(),
                    search_gray.width(),
                    search_gray.height()
                );
                continue;
            }

            let scores = match_template(
                &search_gray,
                template,
                MatchTemplateMethod::CrossCorrelationNormalized,
            );

            let mut best_score = f32::MIN;
            let mut best_pos = (0u32, 0u32);
            for (x, y, pixel) in scores.enumerate_pixels() {
                if pixel[0] > best_score {
                    best_score = pixel[0];
                    best_pos = (x, y);
                }
            }

            let score = f64::from(best_score).clamp(0.0, 1.0);
            let box_ = Rect::new(
                roi.x + best_pos.0 as i32,
                roi.y + best_pos.1 as i32,
                template.width() as i32,
                template.height() as i32,
            );
            log::debug!(
                "template '{name}' best score {score:.4} at ({}, {})",
                box_.x,
                box_.y
            );

            let hit = MatchResult::new(box_, score);
            if score >= self.param.threshold_for(index) {
                filtered.push(hit.clone());
            }
            all.push(hit);
        }

        result.all_results = base::sort_results(all, self.param.order_by);
        result.filtered_results = base::sort_results(filtered, self.param.order_by);
        result.best_result =
            base::select_result(&result.filtered_results, self.param.result_index);
        result.cost_ms = start.elapsed().as_secs_f64() * 1000.0;
        result
    }
}
