use crate::vision::template::TemplateError;
use std::path::PathBuf;
use thiserror::Error;

/// A specialized `Result` type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// The error type for pipeline loading and execution.
///
/// Recognition finding nothing is never an error; these cover malformed
/// configuration, missing resources and failing injected capabilities.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline configuration must be a JSON object mapping node names to definitions")]
    ConfigNotObject,

    #[error("node '{node}': {message}")]
    InvalidNode { node: String, message: String },

    #[error("node '{node}' lists unknown successor '{next}'")]
    UnknownSuccessor { node: String, next: String },

    #[error("node '{node}' references unknown pre-task '{task}'")]
    UnknownPreTask { node: String, task: String },

    #[error("pre-task '{task}' referenced by node '{node}' has not run yet")]
    PreTaskNotRun { node: String, task: String },

    #[error("entry node '{entry}' is not defined")]
    UnknownEntry { entry: String },

    #[error("pipeline file not found: {path:?}")]
    FileNotFound { path: PathBuf },

    #[error("failed to read pipeline file {path:?}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse pipeline JSON: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("failed to load template resources: {source}")]
    Resource {
        #[from]
        source: TemplateError,
    },

    #[error(transparent)]
    Io(#[from] IoError),

    #[error("run exceeded the step limit of {limit} transitions (cycle in the node graph?)")]
    StepLimitExceeded { limit: usize },
}

/// Failures of the injected frame-capture and input-dispatch capabilities.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("frame capture failed: {description}")]
    Capture { description: String },

    #[error("input dispatch failed: {description}")]
    Input { description: String },
}

impl IoError {
    pub fn capture(description: impl Into<String>) -> Self {
        IoError::Capture {
            description: description.into(),
        }
    }

    pub fn input(description: impl Into<String>) -> Self {
        IoError::Input {
            description: description.into(),
        }
    }
}
