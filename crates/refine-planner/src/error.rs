//! Error types for refinement planning

use refine_artifact::{ArtifactStage, PathError, SchemaPath, UnknownStage};

/// Planning failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanError {
    /// Edited field is not part of the graph
    #[error("target node not found: {artifact}:{path}")]
    TargetNotFound {
        /// Artifact named by the caller
        artifact: ArtifactStage,
        /// Path named by the caller
        path: SchemaPath,
    },

    /// Artifact key names no pipeline stage
    #[error(transparent)]
    UnknownArtifact(#[from] UnknownStage),

    /// Path text is malformed
    #[error("invalid target path: {0}")]
    InvalidPath(#[from] PathError),
}

/// Result type for planning
pub type PlanResult<T> = Result<T, PlanError>;
