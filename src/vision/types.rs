//! Shared value types for screen recognition
//!
//! Every matcher produces the same result shapes so that the pipeline engine
//! can consume them without caring which algorithm ran.

use image::RgbImage;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A point in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Rectangle as `[x, y, width, height]`.
///
/// Dimensions are never negative; a rectangle with a zero dimension is
/// invalid and stands for "no match" wherever it appears as a result box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width: width.max(0),
            height: height.max(0),
        }
    }

    /// Parse from a `[x, y, width, height]` list as used by the wire format.
    pub fn from_list(values: &[i32]) -> Option<Self> {
        match values {
            [x, y, width, height] => Some(Self::new(*x, *y, *width, *height)),
            _ => None,
        }
    }

    pub fn to_list(&self) -> [i32; 4] {
        [self.x, self.y, self.width, self.height]
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    /// Point containment with half-open semantics: `x + width` is outside.
    pub fn contains(&self, point: Point) -> bool {
        self.x <= point.x
            && point.x < self.x + self.width
            && self.y <= point.y
            && point.y < self.y + self.height
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Overlapping area with `other`, `None` when they do not strictly overlap.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Rect::new(x1, y1, x2 - x1, y2 - y1))
    }

    /// Apply a rectangular offset: origin shifts by the offset origin, the
    /// dimensions grow by the offset dimensions. Used for `Target` offsets.
    pub fn offset_by(&self, offset: Rect) -> Rect {
        Rect::new(
            self.x + offset.x,
            self.y + offset.y,
            self.width + offset.width,
            self.height + offset.height,
        )
    }

    /// Clip to a `width` x `height` frame. May produce an invalid rectangle
    /// when there is no overlap with the frame.
    pub fn clipped_to(&self, frame_width: u32, frame_height: u32) -> Rect {
        let x1 = self.x.max(0);
        let y1 = self.y.max(0);
        let x2 = (self.x + self.width).min(frame_width as i32);
        let y2 = (self.y + self.height).min(frame_height as i32);
        Rect::new(x1, y1, (x2 - x1).max(0), (y2 - y1).max(0))
    }
}

/// One candidate hit produced by a matcher.
///
/// `score` is a correlation in `[0, 1]` for template matches and a raw
/// pixel/area count for color matches. `text` and `label` are reserved for
/// future recognizers and stay empty for template/color results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    #[serde(rename = "box")]
    pub box_: Rect,
    pub score: f64,
    pub text: Option<String>,
    pub label: Option<String>,
}

impl MatchResult {
    pub fn new(box_: Rect, score: f64) -> Self {
        Self {
            box_,
            score,
            text: None,
            label: None,
        }
    }

    pub fn center(&self) -> Point {
        self.box_.center()
    }
}

/// Outcome of one recognition call.
///
/// `all_results` holds every candidate the matcher produced, unfiltered.
/// `filtered_results` holds the candidates passing the acceptance criteria.
/// `best_result` is the selected candidate an action is driven from; the
/// call succeeded exactly when it is present. Constructed fresh per call,
/// never mutated after return.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecoResult {
    pub all_results: Vec<MatchResult>,
    pub filtered_results: Vec<MatchResult>,
    pub best_result: Option<MatchResult>,
    /// Name of the algorithm that ran.
    pub algorithm: String,
    /// Elapsed wall-clock time in milliseconds, recorded on every path.
    pub cost_ms: f64,
    /// Diagnostic message when a resource problem stopped the recognition.
    pub error: Option<String>,
    /// Debug overlay, exempt from serialization.
    #[serde(skip)]
    pub debug_image: Option<RgbImage>,
}

impl RecoResult {
    pub fn new(algorithm: &str) -> Self {
        Self {
            algorithm: algorithm.to_string(),
            ..Default::default()
        }
    }

    /// A failed result carrying a diagnostic message, for resource errors
    /// that must not propagate past the recognizer boundary.
    pub fn failed(algorithm: &str, message: impl Into<String>) -> Self {
        let mut result = Self::new(algorithm);
        result.error = Some(message.into());
        result
    }

    pub fn success(&self) -> bool {
        self.best_result.is_some()
    }

    pub fn best_box(&self) -> Option<Rect> {
        self.best_result.as_ref().map(|r| r.box_)
    }

    pub fn best_score(&self) -> f64 {
        self.best_result.as_ref().map(|r| r.score).unwrap_or(0.0)
    }

    /// Lossless mapping-of-primitives export for cross-boundary reporting.
    /// Adds the derived `success` flag; the debug overlay is dropped.
    pub fn to_value(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut value {
            map.insert("success".to_string(), Value::Bool(self.success()));
        }
        value
    }
}

/// Base area a target resolves against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TargetRef {
    /// The area the previous step already matched (whole frame for the
    /// entry step).
    SelfArea,
    /// A caller-specified fixed rectangle.
    Region(Rect),
    /// The area a named earlier pipeline step matched.
    PreTask(String),
}

/// Where to look (or act): a base area plus a rectangular offset.
///
/// Only the pipeline resolves targets; matchers consume a resolved `Rect`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub base: TargetRef,
    pub offset: Rect,
}

impl Default for Target {
    fn default() -> Self {
        Self {
            base: TargetRef::SelfArea,
            offset: Rect::default(),
        }
    }
}

impl Target {
    pub fn self_area() -> Self {
        Self::default()
    }

    pub fn region(rect: Rect) -> Self {
        Self {
            base: TargetRef::Region(rect),
            offset: Rect::default(),
        }
    }

    pub fn pre_task(name: impl Into<String>) -> Self {
        Self {
            base: TargetRef::PreTask(name.into()),
            offset: Rect::default(),
        }
    }

    pub fn with_offset(mut self, offset: Rect) -> Self {
        self.offset = offset;
        self
    }
}

/// Ranking strategy applied to matcher results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OrderBy {
    /// x ascending, ties broken by y.
    #[default]
    Horizontal,
    /// y ascending, ties broken by x.
    Vertical,
    /// Score descending.
    Score,
    /// Box area descending.
    Area,
    Random,
}
