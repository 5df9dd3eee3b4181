//! Error types for the knowledge graph

/// Graph assembly and serialization errors
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Imported edge names a node that is not part of the import
    #[error("edge {from} -> {to} references unknown node")]
    DanglingEdge {
        /// Upstream id
        from: String,
        /// Downstream id
        to: String,
    },

    /// Imported node id appears more than once
    #[error("duplicate node id: {0}")]
    DuplicateNode(String),

    /// Export could not be (de)serialized
    #[error("graph serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for graph operations
pub type GraphResult<T> = Result<T, GraphError>;
