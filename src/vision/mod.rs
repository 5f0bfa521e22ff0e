//! Screen-vision recognition engine
//!
//! Recognition answers "does a named visual pattern currently appear on
//! screen, and where?" against a pixel frame:
//!
//! - [`TemplateMatcher`]: finds reference images via normalized
//!   cross-correlation, each with its own acceptance threshold.
//! - [`ColorMatcher`]: finds regions whose pixels fall inside color-channel
//!   ranges, merged into connected components or split per contour.
//!
//! All matchers share ROI handling, result ordering and NMS from [`base`],
//! and exchange the value types in [`types`]. "Not found" is a normal
//! result (`success = false`), never an error.

pub mod base;
pub mod color;
pub mod template;
pub mod types;


pub use base::{Recognizer, iou, nms, pythonic_index, sort_results};
pub use color::{ColorMatcher, ColorMatcherParam, ColorSpace};
pub use template::{TemplateError, TemplateLibrary, TemplateMatcher, TemplateMatcherParam};
pub use types::{MatchResult, OrderBy, Point, RecoResult, Rect, Target, TargetRef};
