//! Pipeline wire format: a JSON mapping from node name to node object.
//!
//! Externally authored automation scripts are validated here and converted
//! into strongly-typed [`PipelineNode`]s before execution begins. Unknown
//! fields, unknown tags and dangling references fail fast at load time.

use super::error::{PipelineError, PipelineResult};
use super::node::{Action, PipelineNode, Recognition};
use crate::vision::color::{ColorMatcherParam, ColorSpace};
use crate::vision::template::TemplateMatcherParam;
use crate::vision::types::{OrderBy, Rect, Target, TargetRef};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Wire form of a target: `true` for the node's own match area, a node
/// name for an earlier step's area, or `[x, y, w, h]` for a fixed region.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TargetConfig {
    SelfFlag(bool),
    Task(String),
    Region([i32; 4]),
}

impl TargetConfig {
    fn into_target_ref(self) -> TargetRef {
        match self {
            TargetConfig::SelfFlag(_) => TargetRef::SelfArea,
            TargetConfig::Task(name) => TargetRef::PreTask(name),
            TargetConfig::Region([x, y, w, h]) => TargetRef::Region(Rect::new(x, y, w, h)),
        }
    }
}

/// Color channel bounds: a single `[a, b, c]` triple or a list of triples.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ChannelBounds {
    One([u8; 3]),
    Many(Vec<[u8; 3]>),
}

impl ChannelBounds {
    fn into_vec(self) -> Vec<[u8; 3]> {
        match self {
            ChannelBounds::One(bounds) => vec![bounds],
            ChannelBounds::Many(list) => list,
        }
    }
}

fn default_count() -> u32 {
    1
}

/// Raw node object as authored in JSON. Strict: unknown keys are rejected.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    #[serde(default)]
    pub recognition: Option<String>,

    // TemplateMatch fields
    #[serde(default)]
    pub template: Vec<String>,
    #[serde(default)]
    pub threshold: Vec<f64>,

    // ColorMatch fields
    #[serde(default)]
    pub lower: Option<ChannelBounds>,
    #[serde(default)]
    pub upper: Option<ChannelBounds>,
    #[serde(default)]
    pub color_space: ColorSpace,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default)]
    pub connected: bool,

    // Result selection
    #[serde(default)]
    pub order_by: OrderBy,
    #[serde(default)]
    pub index: i64,

    // ROI target
    #[serde(default)]
    pub roi: Option<[i32; 4]>,
    #[serde(default)]
    pub target: Option<TargetConfig>,
    #[serde(default)]
    pub target_offset: Option<[i32; 4]>,

    // Action
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub action_target: Option<TargetConfig>,
    #[serde(default)]
    pub action_offset: Option<[i32; 4]>,

    #[serde(default)]
    pub next: Vec<String>,
}

impl NodeConfig {
    fn invalid(node: &str, message: impl Into<String>) -> PipelineError {
        PipelineError::InvalidNode {
            node: node.to_string(),
            message: message.into(),
        }
    }

    fn into_node(self, name: &str) -> PipelineResult<PipelineNode> {
        let recognition = self.build_recognition(name)?;
        let target = self.build_target(name)?;
        let action = self.build_action(name)?;

        Ok(PipelineNode {
            name: name.to_string(),
            recognition,
            target,
            action,
            next: self.next,
        })
    }

    fn build_recognition(&self, name: &str) -> PipelineResult<Recognition> {
        match self.recognition.as_deref().unwrap_or("DirectHit") {
            "DirectHit" => Ok(Recognition::DirectHit),
            "TemplateMatch" => {
                if self.template.is_empty() {
                    return Err(Self::invalid(
                        name,
                        "TemplateMatch requires at least one entry in 'template'",
                    ));
                }
                if self.threshold.len() > self.template.len() {
                    return Err(Self::invalid(
                        name,
                        format!(
                            "{} thresholds for {} templates",
                            self.threshold.len(),
                            self.template.len()
                        ),
                    ));
                }
                Ok(Recognition::TemplateMatch(TemplateMatcherParam {
                    templates: self.template.clone(),
                    thresholds: self.threshold.clone(),
                    order_by: self.order_by,
                    result_index: self.index,
                }))
            }
            "ColorMatch" => {
                let lower = self
                    .lower
                    .clone()
                    .ok_or_else(|| Self::invalid(name, "ColorMatch requires 'lower'"))?
                    .into_vec();
                let upper = self
                    .upper
                    .clone()
                    .ok_or_else(|| Self::invalid(name, "ColorMatch requires 'upper'"))?
                    .into_vec();
                if lower.is_empty() || lower.len() != upper.len() {
                    return Err(Self::invalid(
                        name,
                        format!(
                            "'lower' and 'upper' must pair up ({} vs {} ranges)",
                            lower.len(),
                            upper.len()
                        ),
                    ));
                }
                Ok(Recognition::ColorMatch(ColorMatcherParam {
                    ranges: lower.into_iter().zip(upper).collect(),
                    color_space: self.color_space,
                    count: self.count,
                    connected: self.connected,
                    order_by: self.order_by,
                    result_index: self.index,
                }))
            }
            other => Err(Self::invalid(
                name,
                format!("unknown recognition tag '{other}'"),
            )),
        }
    }

    fn build_target(&self, name: &str) -> PipelineResult<Target> {
        let base = match (&self.target, &self.roi) {
            (Some(_), Some(_)) => {
                return Err(Self::invalid(
                    name,
                    "'roi' and 'target' are mutually exclusive",
                ));
            }
            (Some(target), None) => target.clone().into_target_ref(),
            (None, Some([x, y, w, h])) => TargetRef::Region(Rect::new(*x, *y, *w, *h)),
            (None, None) => TargetRef::SelfArea,
        };
        let offset = self
            .target_offset
            .map(|[x, y, w, h]| Rect::new(x, y, w, h))
            .unwrap_or_default();
        Ok(Target { base, offset })
    }

    fn build_action(&self, name: &str) -> PipelineResult<Action> {
        match self.action.as_deref().unwrap_or("DoNothing") {
            "DoNothing" => Ok(Action::DoNothing),
            "Click" => {
                let base = self
                    .action_target
                    .clone()
                    .map(TargetConfig::into_target_ref)
                    .unwrap_or(TargetRef::SelfArea);
                let offset = self
                    .action_offset
                    .map(|[x, y, w, h]| Rect::new(x, y, w, h))
                    .unwrap_or_default();
                Ok(Action::Click {
                    target: Target { base, offset },
                })
            }
            other => Err(Self::invalid(name, format!("unknown action tag '{other}'"))),
        }
    }
}

/// Parse and validate a full pipeline definition from its JSON form.
pub fn parse_pipeline(value: &Value) -> PipelineResult<HashMap<String, PipelineNode>> {
    if !value.is_object() {
        return Err(PipelineError::ConfigNotObject);
    }
    let raw: HashMap<String, NodeConfig> = serde_json::from_value(value.clone())?;

    let mut nodes = HashMap::new();
    for (name, config) in raw {
        let node = config.into_node(&name)?;
        nodes.insert(name, node);
    }

    // Referential integrity: successors and pre-task targets must exist.
    for node in nodes.values() {
        for next in &node.next {
            if !nodes.contains_key(next) {
                return Err(PipelineError::UnknownSuccessor {
                    node: node.name.clone(),
                    next: next.clone(),
                });
            }
        }
        let mut check_pre_task = |target: &Target| -> PipelineResult<()> {
            if let TargetRef::PreTask(task) = &target.base
                && !nodes.contains_key(task)
            {
                return Err(PipelineError::UnknownPreTask {
                    node: node.name.clone(),
                    task: task.clone(),
                });
            }
            Ok(())
        };
        check_pre_task(&node.target)?;
        if let Action::Click { target } = &node.action {
            check_pre_task(target)?;
        }
    }

    Ok(nodes)
}

/// Load a pipeline definition's JSON form from a file.
pub fn load_value_from_file(path: impl AsRef<Path>) -> PipelineResult<Value> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(PipelineError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let text = std::fs::read_to_string(path).map_err(|source| PipelineError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&text)?)
}
