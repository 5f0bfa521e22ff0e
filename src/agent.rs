//! High-level driver tying a frame source, an input sink and a template
//! library into one-call recognition and interaction helpers.

use crate::pipeline::{FrameSource, InputSink, Pipeline, PipelineResult, RunReport};
use crate::vision::base::Recognizer;
use crate::vision::color::{ColorMatcher, ColorMatcherParam, ColorSpace};
use crate::vision::template::{TemplateLibrary, TemplateMatcher, TemplateMatcherParam};
use crate::vision::types::{Point, Rect, RecoResult};
use serde_json::Value;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

/// Outcome of a [`VisualAgent::wait_for_template`] poll.
#[derive(Debug, Clone)]
pub struct WaitOutcome {
    pub found: bool,
    pub elapsed_ms: u64,
    /// The final recognition attempt, successful or not.
    pub result: RecoResult,
}

/// Convenience facade over the vision matchers and the pipeline engine.
///
/// Owns the capabilities and the template library; every operation
/// captures a fresh frame. Recognition finding nothing is a normal
/// outcome; only capture and input faults surface as errors.
pub struct VisualAgent<F, I> {
    frames: F,
    input: I,
    library: TemplateLibrary,
}

impl<F: FrameSource, I: InputSink> VisualAgent<F, I> {
    pub fn new(frames: F, input: I) -> Self {
        Self {
            frames,
            input,
            library: TemplateLibrary::new(),
        }
    }

    pub fn with_library(mut self, library: TemplateLibrary) -> Self {
        self.library = library;
        self
    }

    pub fn library_mut(&mut self) -> &mut TemplateLibrary {
        &mut self.library
    }

    /// Capture a frame and look for the named template.
    pub fn find_template(
        &mut self,
        name: &str,
        threshold: f64,
        roi: Option<Rect>,
    ) -> PipelineResult<RecoResult> {
        let frame = self.frames.capture()?;
        let param = TemplateMatcherParam {
            templates: vec![name.to_string()],
            thresholds: vec![threshold],
            ..Default::default()
        };
        Ok(TemplateMatcher::new(&self.library, param).analyze(&frame, roi))
    }

    /// Capture a frame and look for regions inside the channel range.
    pub fn find_color(
        &mut self,
        lower: [u8; 3],
        upper: [u8; 3],
        roi: Option<Rect>,
        color_space: ColorSpace,
        min_count: u32,
    ) -> PipelineResult<RecoResult> {
        let frame = self.frames.capture()?;
        let param = ColorMatcherParam {
            ranges: vec![(lower, upper)],
            color_space,
            count: min_count,
            connected: true,
            ..Default::default()
        };
        Ok(ColorMatcher::new(param).analyze(&frame, roi))
    }

    /// Find the named template and click its center, shifted by `offset`.
    /// Returns the recognition; no click is dispatched when it fails.
    pub fn click_template(
        &mut self,
        name: &str,
        threshold: f64,
        roi: Option<Rect>,
        offset: Option<Point>,
    ) -> PipelineResult<RecoResult> {
        let result = self.find_template(name, threshold, roi)?;
        if let Some(box_) = result.best_box() {
            let shift = offset.unwrap_or_default();
            let point = box_.center();
            let (x, y) = (point.x + shift.x, point.y + shift.y);
            log::debug!("click_template '{name}': click at ({x}, {y})");
            self.input.click(x, y)?;
        } else {
            log::debug!("click_template '{name}': not found, no click");
        }
        Ok(result)
    }

    /// Poll for the named template until found or `timeout` elapses,
    /// sleeping `interval` between attempts. Always attempts at least once.
    pub fn wait_for_template(
        &mut self,
        name: &str,
        threshold: f64,
        timeout: Duration,
        interval: Duration,
        roi: Option<Rect>,
    ) -> PipelineResult<WaitOutcome> {
        let start = Instant::now();
        loop {
            let result = self.find_template(name, threshold, roi)?;
            let elapsed = start.elapsed();
            if result.success() {
                return Ok(WaitOutcome {
                    found: true,
                    elapsed_ms: elapsed.as_millis() as u64,
                    result,
                });
            }
            if elapsed >= timeout {
                log::debug!("wait_for_template '{name}': timed out after {elapsed:?}");
                return Ok(WaitOutcome {
                    found: false,
                    elapsed_ms: elapsed.as_millis() as u64,
                    result,
                });
            }
            thread::sleep(interval);
        }
    }

    /// Run a pipeline definition with this agent's capabilities and
    /// template library.
    pub fn run_pipeline(&mut self, definition: &Value, entry: &str) -> PipelineResult<RunReport> {
        let mut pipeline = Pipeline::new(&mut self.frames, &mut self.input)
            .with_library(self.library.clone());
        pipeline.load_from_value(definition)?;
        pipeline.run(entry)
    }

    /// Run a pipeline loaded from a JSON file.
    pub fn run_pipeline_from_file(
        &mut self,
        path: impl AsRef<Path>,
        entry: &str,
    ) -> PipelineResult<RunReport> {
        let mut pipeline = Pipeline::new(&mut self.frames, &mut self.input)
            .with_library(self.library.clone());
        pipeline.load_from_file(path)?;
        pipeline.run(entry)
    }
}
