//! Graph-shaped execution engine: recognize, act, transition.
//!
//! The only state during a run is the current node. Entering a node means:
//! capture a fresh frame, resolve the node's ROI from its target, run the
//! configured recognizer. On success the node's action fires, then the
//! successor list is evaluated in order against newly captured frames; the
//! first successor whose recognition succeeds becomes current. An empty
//! successor list after a successful action terminates the run as
//! succeeded; a dead end terminates it as failed. A failed recognition is
//! a reported outcome, not a fault.

use super::config;
use super::error::{PipelineError, PipelineResult};
use super::io::{FrameSource, InputSink};
use super::node::{Action, PipelineNode, Recognition};
use crate::vision::base::{self, Recognizer};
use crate::vision::color::ColorMatcher;
use crate::vision::template::{TemplateLibrary, TemplateMatcher};
use crate::vision::types::{MatchResult, Rect, RecoResult, Target, TargetRef};
use image::RgbImage;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

/// Transitions allowed before a run is aborted as cyclic.
const DEFAULT_STEP_LIMIT: usize = 100;

/// One executed step of a run.
#[derive(Debug, Clone, Serialize)]
pub struct TraceStep {
    pub node: String,
    pub recognition: RecoResult,
    pub action_ok: bool,
}

/// Ordered trace of a pipeline run plus the overall outcome.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub success: bool,
    pub entry: String,
    pub trace: Vec<TraceStep>,
}

impl RunReport {
    /// Mapping-of-primitives export, mirroring `RecoResult::to_value`.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Name of the last node the run reached, if any step executed.
    pub fn last_node(&self) -> Option<&str> {
        self.trace.last().map(|step| step.node.as_str())
    }
}

/// Executes a named-node automation graph against a live frame source.
///
/// The node map is read-only during a run; re-running after a failure is
/// always safe.
pub struct Pipeline<F, I> {
    nodes: HashMap<String, PipelineNode>,
    library: TemplateLibrary,
    frames: F,
    input: I,
    step_limit: usize,
}

impl<F: FrameSource, I: InputSink> Pipeline<F, I> {
    pub fn new(frames: F, input: I) -> Self {
        Self {
            nodes: HashMap::new(),
            library: TemplateLibrary::new(),
            frames,
            input,
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.step_limit = limit;
        self
    }

    pub fn with_library(mut self, library: TemplateLibrary) -> Self {
        self.library = library;
        self
    }

    pub fn library_mut(&mut self) -> &mut TemplateLibrary {
        &mut self.library
    }

    /// Load template resources referenced by the node definitions.
    pub fn load_resources(&mut self, directory: impl AsRef<Path>) -> PipelineResult<usize> {
        Ok(self.library.load_from_directory(directory)?)
    }

    /// Load and validate a pipeline definition from its JSON form.
    pub fn load_from_value(&mut self, value: &Value) -> PipelineResult<()> {
        self.nodes = config::parse_pipeline(value)?;
        log::info!("pipeline loaded: {} nodes", self.nodes.len());
        Ok(())
    }

    /// Load and validate a pipeline definition from a JSON file.
    pub fn load_from_file(&mut self, path: impl AsRef<Path>) -> PipelineResult<()> {
        let value = config::load_value_from_file(path)?;
        self.load_from_value(&value)
    }

    pub fn node_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.nodes.keys().cloned().collect();
        names.sort();
        names
    }

    /// Run the graph starting at `entry` until a terminal state is reached.
    pub fn run(&mut self, entry: &str) -> PipelineResult<RunReport> {
        if !self.nodes.contains_key(entry) {
            return Err(PipelineError::UnknownEntry {
                entry: entry.to_string(),
            });
        }

        let mut report = RunReport {
            entry: entry.to_string(),
            ..Default::default()
        };
        // Matched boxes of completed steps, for PreTask targets.
        let mut history: HashMap<String, Rect> = HashMap::new();

        let mut current = entry.to_string();
        let mut reco = self.recognize_node(&current, None, &history)?;
        if !reco.success() {
            log::info!("entry node '{current}' not recognized, run failed");
            report.trace.push(TraceStep {
                node: current,
                recognition: reco,
                action_ok: false,
            });
            return Ok(report);
        }

        let mut steps = 0;
        loop {
            steps += 1;
            if steps > self.step_limit {
                return Err(PipelineError::StepLimitExceeded {
                    limit: self.step_limit,
                });
            }

            let node = self
                .nodes
                .get(&current)
                .cloned()
                .ok_or_else(|| PipelineError::UnknownEntry {
                    entry: current.clone(),
                })?;

            let current_box = reco.best_box();
            if let Some(box_) = current_box {
                history.insert(current.clone(), box_);
            }

            let action_ok = self.perform_action(&node, &reco, &history)?;
            log::debug!(
                "node '{current}': recognized at {:?}, action_ok={action_ok}",
                current_box.map(|b| b.to_list())
            );
            report.trace.push(TraceStep {
                node: current.clone(),
                recognition: reco.clone(),
                action_ok,
            });

            if node.next.is_empty() {
                log::info!("node '{current}' is terminal, run succeeded");
                report.success = true;
                return Ok(report);
            }

            // First successor whose own recognition succeeds wins.
            let mut advanced = false;
            for next_name in &node.next {
                let candidate = self.recognize_node(next_name, current_box, &history)?;
                if candidate.success() {
                    log::debug!("transition '{current}' -> '{next_name}'");
                    current = next_name.clone();
                    reco = candidate;
                    advanced = true;
                    break;
                }
                log::debug!("successor '{next_name}' not recognized, trying next");
            }

            if !advanced {
                log::info!("node '{current}': no successor recognized, run failed");
                return Ok(report);
            }
        }
    }

    /// Capture a fresh frame and run `name`'s recognition against its
    /// resolved ROI. `prev_box` is the matched area of the step being
    /// transitioned from.
    fn recognize_node(
        &mut self,
        name: &str,
        prev_box: Option<Rect>,
        history: &HashMap<String, Rect>,
    ) -> PipelineResult<RecoResult> {
        let node = self
            .nodes
            .get(name)
            .cloned()
            .ok_or_else(|| PipelineError::UnknownEntry {
                entry: name.to_string(),
            })?;

        let frame = self.frames.capture()?;
        let roi = resolve_target(&node.name, &node.target, &frame, prev_box, history)?;

        let result = match &node.recognition {
            Recognition::DirectHit => direct_hit(roi),
            Recognition::TemplateMatch(param) => {
                TemplateMatcher::new(&self.library, param.clone()).analyze(&frame, Some(roi))
            }
            Recognition::ColorMatch(param) => {
                ColorMatcher::new(param.clone()).analyze(&frame, Some(roi))
            }
        };
        if let Some(message) = &result.error {
            log::warn!("node '{name}' recognition error: {message}");
        }
        Ok(result)
    }

    /// Perform the node's action. `reco` succeeded when this is called.
    fn perform_action(
        &mut self,
        node: &PipelineNode,
        reco: &RecoResult,
        history: &HashMap<String, Rect>,
    ) -> PipelineResult<bool> {
        match &node.action {
            Action::DoNothing => Ok(true),
            Action::Click { target } => {
                let base_rect = match &target.base {
                    TargetRef::SelfArea => match reco.best_box() {
                        Some(box_) => box_,
                        None => {
                            log::warn!("node '{}': click target has no match box", node.name);
                            return Ok(false);
                        }
                    },
                    TargetRef::Region(rect) => *rect,
                    TargetRef::PreTask(task) => match history.get(task) {
                        Some(box_) => *box_,
                        None => {
                            return Err(PipelineError::PreTaskNotRun {
                                node: node.name.clone(),
                                task: task.clone(),
                            });
                        }
                    },
                };
                let point = base_rect.offset_by(target.offset).center();
                log::debug!("node '{}': click at ({}, {})", node.name, point.x, point.y);
                self.input.click(point.x, point.y)?;
                Ok(true)
            }
        }
    }
}

/// Resolve a node's target to a concrete ROI rectangle, clipped to the
/// frame.
fn resolve_target(
    node: &str,
    target: &Target,
    frame: &RgbImage,
    prev_box: Option<Rect>,
    history: &HashMap<String, Rect>,
) -> PipelineResult<Rect> {
    let full = Rect::new(0, 0, frame.width() as i32, frame.height() as i32);
    let base_rect = match &target.base {
        TargetRef::SelfArea => prev_box.unwrap_or(full),
        TargetRef::Region(rect) => *rect,
        TargetRef::PreTask(task) => {
            history
                .get(task)
                .copied()
                .ok_or_else(|| PipelineError::PreTaskNotRun {
                    node: node.to_string(),
                    task: task.clone(),
                })?
        }
    };
    Ok(base::resolve_roi(
        frame,
        Some(base_rect.offset_by(target.offset)),
    ))
}

/// Recognition that succeeds over the whole resolved ROI, for action-only
/// nodes. A zero-dimension ROI (target clipped away by the frame) is no
/// match, same as in the matchers.
fn direct_hit(roi: Rect) -> RecoResult {
    let start = Instant::now();
    let mut result = RecoResult::new("DirectHit");
    if !roi.is_valid() {
        result.cost_ms = start.elapsed().as_secs_f64() * 1000.0;
        return result;
    }
    let hit = MatchResult::new(roi, 1.0);
    result.all_results = vec![hit.clone()];
    result.filtered_results = vec![hit.clone()];
    result.best_result = Some(hit);
    result.cost_ms = start.elapsed().as_secs_f64() * 1000.0;
    result
}
