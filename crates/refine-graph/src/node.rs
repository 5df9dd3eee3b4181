//! Schema nodes and edges
//!
//! A [`SchemaNode`] is one addressable value inside one artifact. A
//! [`SchemaEdge`] records that a downstream node semantically references an
//! upstream one.

use refine_artifact::{ArtifactStage, SchemaPath};
use serde::{Deserialize, Serialize};

/// Deterministic node id: `<artifact key>:<path>`
#[must_use]
pub fn node_id(stage: ArtifactStage, path: &SchemaPath) -> String {
    format!("{}:{path}", stage.key())
}

/// Shape of the value a node addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueKind {
    /// Leaf value, or a reference to an already visited composite
    Scalar,
    /// Map or sequence
    Object,
    /// Element of a sequence, whatever its own shape
    ArrayItem,
}

/// Optional labels attached to a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetadata {
    /// Position inside the parent sequence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_index: Option<usize>,
    /// Human-meaningful label taken from `id`, `name` or `title`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
}

/// One addressable value of one artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaNode {
    /// Unique id, see [`node_id`]
    pub id: String,
    /// Artifact the value lives in
    pub artifact_type: ArtifactStage,
    /// Location inside the artifact
    pub schema_path: SchemaPath,
    /// Value shape
    pub value_kind: ValueKind,
    /// Index and identifier labels
    #[serde(default)]
    pub metadata: NodeMetadata,
    /// Short text rendering of the value
    pub raw_value_summary: String,
}

impl SchemaNode {
    /// Label for prompts and instructions: identifier when known, else the path
    #[must_use]
    pub fn display_name(&self) -> String {
        match &self.metadata.identifier {
            Some(identifier) => format!("{} ({identifier})", self.schema_path),
            None => self.schema_path.to_string(),
        }
    }
}

/// Directed dependency from an upstream node to a downstream node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaEdge {
    /// Upstream node id
    pub from: String,
    /// Downstream node id
    pub to: String,
    /// Oracle confidence in `[0, 1]`
    pub confidence: f64,
}

impl SchemaEdge {
    /// Create edge, clamping confidence to `[0, 1]`
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>, confidence: f64) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}
