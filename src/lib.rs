//! Screen recognition and declarative automation pipelines.
//!
//! The [`vision`] module locates things on a captured frame: template
//! matching by normalized cross-correlation and color-range matching by
//! connected regions or contours, both behind the [`vision::base::Recognizer`]
//! trait. The [`pipeline`] module runs JSON-defined graphs of
//! recognize-act-transition nodes over injected capture/input capabilities,
//! and [`agent::VisualAgent`] wraps both behind one-call helpers.

pub mod agent;
pub mod pipeline;
pub mod vision;

pub use agent::{VisualAgent, WaitOutcome};
pub use pipeline::{
    FrameFn, FrameSource, InputSink, IoError, NullInput, Pipeline, PipelineError, PipelineResult,
    RunReport,
};
pub use vision::base::Recognizer;
pub use vision::color::{ColorMatcher, ColorMatcherParam, ColorSpace};
pub use vision::template::{TemplateLibrary, TemplateMatcher, TemplateMatcherParam};
pub use vision::types::{MatchResult, OrderBy, Point, RecoResult, Rect, Target, TargetRef};
