//! Refinement plan model
//!
//! The plan is the only thing handed to the instruction executor. Wire names
//! are camelCase.

use crate::intent::IntentAnalysis;
use indexmap::IndexMap;
use refine_artifact::{ArtifactStage, SchemaPath};
use refine_graph::SchemaNode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Urgency of one update
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// The edited artifact itself
    Critical,
    /// Directly references the edited field
    High,
    /// Two steps away
    Medium,
    /// Three or more steps away
    Low,
}

impl Priority {
    /// Priority of a dependent first reached at `depth`
    #[inline]
    #[must_use]
    pub fn from_depth(depth: usize) -> Self {
        match depth {
            0 => Self::Critical,
            1 => Self::High,
            2 => Self::Medium,
            _ => Self::Low,
        }
    }
}

/// Why an update exists and what it should refer to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContext {
    /// The edit that started the plan
    pub upstream_change: String,
    /// How this artifact is connected to the edit
    pub reason: String,
    /// Concrete values for the executor (`newValue` at least)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_values: Option<IndexMap<String, Value>>,
}

/// One artifact's worth of refinement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurgicalUpdate {
    /// Artifact to rewrite
    pub artifact_type: ArtifactStage,
    /// Fields to rewrite; never empty in a valid plan
    pub target_paths: Vec<SchemaPath>,
    /// Natural-language instruction for the executor
    pub instruction: String,
    /// Supporting context
    pub context: UpdateContext,
    /// Urgency
    pub priority: Priority,
    /// Artifacts whose updates must be applied first
    #[serde(default)]
    pub depends_on: Vec<ArtifactStage>,
}

/// Ordered cross-artifact updates for one edit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefinementPlan {
    /// Request text as given
    pub original_intent: String,
    /// Classification of the request
    pub intent: IntentAnalysis,
    /// Edited node
    #[serde(default)]
    pub target_node: Option<SchemaNode>,
    /// Proposed value
    pub new_value: Value,
    /// Target update first, then pipeline order
    pub updates: Vec<SurgicalUpdate>,
    /// Artifacts of the graph no update touches
    pub unaffected_artifacts: Vec<ArtifactStage>,
    /// Expected reach of the edit in `[0, 1]`
    pub impact_score: f64,
}

impl RefinementPlan {
    /// Update for one artifact
    #[must_use]
    pub fn update_for(&self, stage: ArtifactStage) -> Option<&SurgicalUpdate> {
        self.updates.iter().find(|update| update.artifact_type == stage)
    }

    /// Artifacts touched by the plan, in plan order
    #[must_use]
    pub fn affected_artifacts(&self) -> Vec<ArtifactStage> {
        self.updates.iter().map(|update| update.artifact_type).collect()
    }
}
