//! Strongly-typed pipeline node definitions, produced from the wire format
//! by [`super::config`] before execution begins.

use crate::vision::color::ColorMatcherParam;
use crate::vision::template::TemplateMatcherParam;
use crate::vision::types::Target;

/// Recognition bound to a node. A closed set selected by configuration
/// tag; the engine dispatches over it exhaustively.
#[derive(Debug, Clone)]
pub enum Recognition {
    /// Always succeeds, matching the whole resolved ROI. For action-only
    /// steps.
    DirectHit,
    TemplateMatch(TemplateMatcherParam),
    ColorMatch(ColorMatcherParam),
}

impl Recognition {
    pub fn tag(&self) -> &'static str {
        match self {
            Recognition::DirectHit => "DirectHit",
            Recognition::TemplateMatch(_) => "TemplateMatch",
            Recognition::ColorMatch(_) => "ColorMatch",
        }
    }
}

/// Action performed after a node's recognition succeeds.
#[derive(Debug, Clone)]
pub enum Action {
    DoNothing,
    /// Click the center of the resolved target area (offset applied).
    Click { target: Target },
}

/// One step of the automation graph: a recognition check, an action, and
/// the ordered candidate successors.
#[derive(Debug, Clone)]
pub struct PipelineNode {
    pub name: String,
    pub recognition: Recognition,
    /// Where the recognition ROI is resolved from.
    pub target: Target,
    pub action: Action,
    /// Empty list = terminal node.
    pub next: Vec<String>,
}
