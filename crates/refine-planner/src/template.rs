//! Instruction wording
//!
//! One template per intent type for the edited artifact and one per pipeline
//! stage for dependent artifacts. Both are exhaustive matches, so a new stage
//! or intent type cannot silently fall back to generic wording.

use crate::intent::IntentType;
use refine_artifact::{ArtifactStage, SchemaPath};
use serde_json::Value;

/// Render a proposed value for an instruction
pub(crate) fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{s}\""),
        other => other.to_string(),
    }
}

fn render_paths(paths: &[SchemaPath]) -> String {
    paths
        .iter()
        .map(|path| format!("`{path}`"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Instruction for the edited artifact
pub(crate) fn target_instruction(
    intent: IntentType,
    stage: ArtifactStage,
    path: &SchemaPath,
    new_value: &Value,
) -> String {
    let label = stage.label();
    let value = render_value(new_value);
    match intent {
        IntentType::Modify => {
            format!("Change `{path}` in the {label} artifact to {value}.")
        }
        IntentType::Add => {
            format!("Add {value} at `{path}` in the {label} artifact.")
        }
        IntentType::Remove => {
            format!("Remove the current content of `{path}` from the {label} artifact, leaving {value}.")
        }
        IntentType::Restructure => {
            format!("Restructure `{path}` in the {label} artifact into {value}, keeping its meaning.")
        }
    }
}

/// Instruction for an artifact that depends on the edited field
pub(crate) fn dependent_instruction(
    stage: ArtifactStage,
    paths: &[SchemaPath],
    source: &str,
    new_value: &Value,
) -> String {
    let fields = render_paths(paths);
    let value = render_value(new_value);
    match stage {
        ArtifactStage::Implementation => format!(
            "Update the implementation steps at {fields} so the affected APIs and code follow \
             the change of {source} to {value}."
        ),
        ArtifactStage::Verification => format!(
            "Revise the test cases at {fields} so they verify the behavior after {source} \
             changed to {value}."
        ),
        ArtifactStage::Requirements
        | ArtifactStage::Architecture
        | ArtifactStage::Security
        | ArtifactStage::Infrastructure
        | ArtifactStage::UiDesign => format!(
            "Update {fields} in the {} artifact to stay consistent with the upstream field \
             {source}, now {value}.",
            stage.label()
        ),
    }
}
