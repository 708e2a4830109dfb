//! Error kinds, one per pipeline stage.

use crate::path::{AttributePath, PathStep};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid format for import ID [{id}]: expected <apiVersion>#<Kind>#[<namespace>#]<name>, got {segments} segment(s)")]
    InvalidFormat { id: String, segments: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    #[error("resource type {gvk} is not served by the API server")]
    UnknownType { gvk: String },
    #[error("type registry unreachable: {cause}")]
    Unreachable { cause: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("{resource} not found")]
    NotFound { resource: String },
    #[error("failed to get {resource}: {cause}")]
    Transport { resource: String, cause: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("no schema definition for {gvk}")]
    NotFound { gvk: String },
    #[error("schema registry unavailable: {cause}")]
    Unavailable { cause: String },
}

/// Raw data that cannot be shaped into the schema at `path`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot convert {found} at {path} into {expected}")]
pub struct ConversionError {
    pub path: AttributePath,
    pub expected: String,
    pub found: String,
}

impl ConversionError {
    pub fn new(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self { path: AttributePath::root(), expected: expected.into(), found: found.into() }
    }

    /// Tag the error with the step the caller took to reach the failing node.
    pub fn within(mut self, step: PathStep) -> Self {
        self.path.prepend(step);
        self
    }
}

/// The final state could not be packaged. Only reachable through a bug upstream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("imported state invariant violated at {path}: {reason}")]
pub struct AssemblyError {
    pub path: AttributePath,
    pub reason: String,
}
