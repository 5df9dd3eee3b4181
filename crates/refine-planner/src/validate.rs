//! Plan validation
//!
//! Reports every structural defect at once instead of stopping at the first.
//! The `dependsOn` relation is checked as a directed graph over artifacts.

use crate::plan::RefinementPlan;
use petgraph::algo::{is_cyclic_directed, tarjan_scc};
use petgraph::graphmap::DiGraphMap;
use refine_artifact::ArtifactStage;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Outcome of [`validate_plan`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanValidation {
    /// No errors found
    pub valid: bool,
    /// Every problem, in discovery order
    pub errors: Vec<String>,
}

/// Check that `plan` can be applied update by update in list order
#[must_use]
pub fn validate_plan(plan: &RefinementPlan) -> PlanValidation {
    let mut errors = Vec::new();

    if plan.target_node.is_none() {
        errors.push("Plan has no target node".to_string());
    }

    let mut position: HashMap<ArtifactStage, usize> = HashMap::new();
    for (i, update) in plan.updates.iter().enumerate() {
        if update.target_paths.is_empty() {
            errors.push(format!("Update for {} has no target paths", update.artifact_type));
        }
        if position.insert(update.artifact_type, i).is_some() {
            errors.push(format!("Plan has more than one update for {}", update.artifact_type));
        }
    }

    let mut dependencies: DiGraphMap<ArtifactStage, ()> = DiGraphMap::new();
    for (i, update) in plan.updates.iter().enumerate() {
        dependencies.add_node(update.artifact_type);
        for dependency in &update.depends_on {
            match position.get(dependency) {
                None => errors.push(format!(
                    "Update for {} depends on {dependency}, which has no update in the plan",
                    update.artifact_type
                )),
                Some(&at) => {
                    dependencies.add_edge(update.artifact_type, *dependency, ());
                    if at > i {
                        errors.push(format!(
                            "Update for {} is listed before its dependency {dependency}",
                            update.artifact_type
                        ));
                    }
                }
            }
        }
    }

    if is_cyclic_directed(&dependencies) {
        let involved: BTreeSet<ArtifactStage> = tarjan_scc(&dependencies)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|&stage| dependencies.contains_edge(stage, stage))
            })
            .flatten()
            .collect();
        let names: Vec<&str> = involved.iter().map(|stage| stage.key()).collect();
        errors.push(format!(
            "Plan contains circular dependencies between artifacts: {}",
            names.join(", ")
        ));
    }

    PlanValidation {
        valid: errors.is_empty(),
        errors,
    }
}
