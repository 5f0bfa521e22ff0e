//! Declarative automation pipelines over the vision recognizers.
//!
//! A pipeline is a set of named nodes loaded from JSON. Each node pairs a
//! recognition check with an action and an ordered list of candidate
//! successors; [`Pipeline::run`] walks the graph from an entry node,
//! re-capturing the screen at every step, until it reaches a terminal node
//! (success) or a dead end (failure).

pub mod config;
pub mod engine;
pub mod error;
pub mod io;
pub mod node;

#[cfg(test)]
mod tests;

pub use config::{ChannelBounds, NodeConfig, TargetConfig};
pub use engine::{Pipeline, RunReport, TraceStep};
pub use error::{IoError, PipelineError, PipelineResult};
pub use io::{FrameFn, FrameSource, InputSink, NullInput};
pub use node::{Action, PipelineNode, Recognition};
