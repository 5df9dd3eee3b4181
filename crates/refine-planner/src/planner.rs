//! Refinement planner
//!
//! Turns one proposed edit into ordered per-artifact updates. The planner
//! holds only a shared, read-only graph, so any number of planners may run
//! over the same graph concurrently.

use crate::error::{PlanError, PlanResult};
use crate::intent::{analyze_intent, IntentAnalysis};
use crate::plan::{Priority, RefinementPlan, SurgicalUpdate, UpdateContext};
use crate::template::{dependent_instruction, render_value, target_instruction};
use crate::validate::{validate_plan, PlanValidation};
use indexmap::IndexMap;
use refine_artifact::{ArtifactStage, SchemaPath};
use refine_graph::{Dependent, KnowledgeGraph, SchemaNode};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

const BASE_IMPACT: f64 = 0.2;
const PER_ARTIFACT_IMPACT: f64 = 0.15;
const PER_DEPENDENT_IMPACT: f64 = 0.01;
const DEPENDENT_CAP: usize = 20;
const PER_RANK_IMPACT: f64 = 0.025;

/// Expected reach of an edit in `[0, 1]`
///
/// `0.2 + 0.15 * artifacts + 0.01 * min(dependents, 20) + 0.025 * ranks_downstream`,
/// capped at 1. Earlier pipeline stages score higher for the same local reach.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn impact_score(dependent_artifacts: usize, dependents: usize, target: ArtifactStage) -> f64 {
    let score = BASE_IMPACT
        + PER_ARTIFACT_IMPACT * dependent_artifacts as f64
        + PER_DEPENDENT_IMPACT * dependents.min(DEPENDENT_CAP) as f64
        + PER_RANK_IMPACT * f64::from(target.ranks_downstream());
    score.min(1.0)
}

/// Plans refinements over one knowledge graph
#[derive(Debug, Clone)]
pub struct RefinementPlanner {
    graph: Arc<KnowledgeGraph>,
}

impl RefinementPlanner {
    /// Create planner over a shared graph
    #[inline]
    #[must_use]
    pub fn new(graph: Arc<KnowledgeGraph>) -> Self {
        Self { graph }
    }

    /// Graph the planner reads
    #[inline]
    #[must_use]
    pub fn graph(&self) -> &Arc<KnowledgeGraph> {
        &self.graph
    }

    /// Classify a refinement request
    #[must_use]
    pub fn analyze_intent(&self, text: &str) -> IntentAnalysis {
        analyze_intent(text)
    }

    /// Check a plan's structure
    #[must_use]
    pub fn validate_plan(&self, plan: &RefinementPlan) -> PlanValidation {
        validate_plan(plan)
    }

    /// Plan the edit of `path` in `stage` to `new_value`
    ///
    /// # Errors
    /// Returns [`PlanError::TargetNotFound`] if the graph has no node there
    #[tracing::instrument(skip_all, fields(artifact = %stage, path = %path))]
    pub fn create_plan(
        &self,
        intent: &str,
        stage: ArtifactStage,
        path: &SchemaPath,
        new_value: impl Into<Value>,
    ) -> PlanResult<RefinementPlan> {
        let new_value = new_value.into();
        let Some(target) = self.graph.node_at(stage, path) else {
            tracing::warn!("Refinement target {}:{} not in graph", stage, path);
            return Err(PlanError::TargetNotFound {
                artifact: stage,
                path: path.clone(),
            });
        };

        let analysis = analyze_intent(intent);
        let dependents = self.graph.dependents(stage, path);
        let reference_values = self.reference_values(target, &new_value);
        let upstream_change = format!(
            "{}:{} changes from \"{}\" to {}",
            stage,
            path,
            target.raw_value_summary,
            render_value(&new_value)
        );

        let mut target_paths = vec![path.clone()];
        let mut by_artifact: BTreeMap<ArtifactStage, Vec<&Dependent>> = BTreeMap::new();
        for dependent in dependents.iter() {
            if dependent.node.artifact_type == stage {
                if !target_paths.contains(&dependent.node.schema_path) {
                    target_paths.push(dependent.node.schema_path.clone());
                }
            } else {
                by_artifact
                    .entry(dependent.node.artifact_type)
                    .or_default()
                    .push(dependent);
            }
        }

        let mut reasons = vec!["Edited field".to_string()];
        if target_paths.len() > 1 {
            reasons.push(format!(
                "{} other field(s) of this artifact depend on it",
                target_paths.len() - 1
            ));
        }
        let sources: Vec<&str> = self
            .graph
            .upstream_of(&target.id)
            .into_iter()
            .map(|edge| edge.from.as_str())
            .collect();
        if !sources.is_empty() {
            reasons.push(format!("it references {}", sources.join(", ")));
        }
        let mut updates = vec![SurgicalUpdate {
            artifact_type: stage,
            instruction: target_instruction(analysis.intent_type, stage, path, &new_value),
            target_paths,
            context: UpdateContext {
                upstream_change: upstream_change.clone(),
                reason: reasons.join("; "),
                reference_values: Some(reference_values.clone()),
            },
            priority: Priority::Critical,
            depends_on: Vec::new(),
        }];

        let source = format!("`{path}` of the {} artifact", stage.label());
        // BTreeMap iteration is pipeline order
        for (artifact, members) in &by_artifact {
            updates.push(self.dependent_update(
                stage,
                *artifact,
                members,
                &source,
                &new_value,
                &upstream_change,
                &reference_values,
            ));
        }

        let touched: BTreeSet<ArtifactStage> = updates.iter().map(|u| u.artifact_type).collect();
        let unaffected_artifacts = self
            .graph
            .artifacts()
            .into_iter()
            .filter(|artifact| !touched.contains(artifact))
            .collect();
        let impact = impact_score(by_artifact.len(), dependents.len(), stage);

        tracing::info!(
            "Refinement plan for {}:{}: {} updates, impact {:.2}",
            stage,
            path,
            updates.len(),
            impact
        );

        Ok(RefinementPlan {
            original_intent: intent.to_string(),
            intent: analysis,
            target_node: Some(target.clone()),
            new_value,
            updates,
            unaffected_artifacts,
            impact_score: impact,
        })
    }

    /// [`create_plan`] with the artifact and path given as text
    ///
    /// # Errors
    /// Returns error on an unknown artifact key, a malformed path or a missing target
    ///
    /// [`create_plan`]: RefinementPlanner::create_plan
    pub fn create_plan_at(
        &self,
        intent: &str,
        artifact_key: &str,
        path: &str,
        new_value: impl Into<Value>,
    ) -> PlanResult<RefinementPlan> {
        let stage: ArtifactStage = artifact_key.parse()?;
        let path: SchemaPath = path.parse()?;
        self.create_plan(intent, stage, &path, new_value)
    }

    #[allow(clippy::too_many_arguments)]
    fn dependent_update(
        &self,
        target_stage: ArtifactStage,
        artifact: ArtifactStage,
        members: &[&Dependent],
        source: &str,
        new_value: &Value,
        upstream_change: &str,
        reference_values: &IndexMap<String, Value>,
    ) -> SurgicalUpdate {
        let mut paths: Vec<SchemaPath> = Vec::new();
        for dependent in members {
            if !paths.contains(&dependent.node.schema_path) {
                paths.push(dependent.node.schema_path.clone());
            }
        }
        let min_depth = members.iter().map(|d| d.depth).min().unwrap_or(1);

        let depends_on: Vec<ArtifactStage> = members
            .iter()
            .filter_map(|dependent| self.graph.node(&dependent.via))
            .map(|via| via.artifact_type)
            .filter(|via| *via == target_stage || via.rank() < artifact.rank())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let reason = format!(
            "{} field(s) reference the edited field (nearest {} step(s) away)",
            paths.len(),
            min_depth
        );

        SurgicalUpdate {
            artifact_type: artifact,
            instruction: dependent_instruction(artifact, &paths, source, new_value),
            target_paths: paths,
            context: UpdateContext {
                upstream_change: upstream_change.to_string(),
                reason,
                reference_values: Some(reference_values.clone()),
            },
            priority: Priority::from_depth(min_depth),
            depends_on,
        }
    }

    fn reference_values(&self, target: &SchemaNode, new_value: &Value) -> IndexMap<String, Value> {
        let mut values = IndexMap::new();
        values.insert("newValue".to_string(), new_value.clone());
        values.insert(
            "previousValue".to_string(),
            Value::String(target.raw_value_summary.clone()),
        );
        values.insert(
            "targetPath".to_string(),
            Value::String(target.schema_path.to_string()),
        );
        if let Some(identifier) = self.identifier_of(target) {
            values.insert("targetIdentifier".to_string(), Value::String(identifier));
        }
        values
    }

    /// Identifier of the node or of its nearest labelled ancestor
    fn identifier_of(&self, node: &SchemaNode) -> Option<String> {
        if let Some(identifier) = &node.metadata.identifier {
            return Some(identifier.clone());
        }
        let mut path = node.schema_path.parent();
        while let Some(current) = path {
            if current.is_empty() {
                break;
            }
            if let Some(identifier) = self
                .graph
                .node_at(node.artifact_type, &current)
                .and_then(|ancestor| ancestor.metadata.identifier.clone())
            {
                return Some(identifier);
            }
            path = current.parent();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use refine_graph::{node_id, GraphExport, KnowledgeGraphConfig, NodeMetadata, SchemaEdge, ValueKind};
    use serde_json::json;

    fn node(stage: ArtifactStage, path: &str, summary: &str, identifier: Option<&str>) -> SchemaNode {
        let schema_path: SchemaPath = path.parse().unwrap();
        SchemaNode {
            id: node_id(stage, &schema_path),
            artifact_type: stage,
            value_kind: if identifier.is_some() { ValueKind::ArrayItem } else { ValueKind::Scalar },
            metadata: NodeMetadata {
                array_index: schema_path.array_index(),
                identifier: identifier.map(str::to_string),
            },
            schema_path,
            raw_value_summary: summary.to_string(),
        }
    }

    fn planner() -> RefinementPlanner {
        use ArtifactStage::*;
        let export = GraphExport {
            nodes: vec![
                node(Requirements, "user_stories[0]", "US-1 {2 keys}", Some("US-1")),
                node(Requirements, "user_stories[0].id", "US-1", None),
                node(Requirements, "user_stories[0].title", "Login", None),
                node(Architecture, "apis[0].story", "US-1", None),
                node(Implementation, "tasks[0].summary", "Build login", None),
                node(Verification, "cases[0].title", "Login works", None),
                node(UiDesign, "screens[0].name", "Home", None),
            ],
            edges: vec![
                SchemaEdge::new("arch_design:apis[0].story", "impl_plan:tasks[0].summary", 0.8),
                SchemaEdge::new("impl_plan:tasks[0].summary", "qa_plan:cases[0].title", 0.8),
                SchemaEdge::new("pm_spec:user_stories[0].id", "arch_design:apis[0].story", 0.9),
                SchemaEdge::new("pm_spec:user_stories[0].id", "pm_spec:user_stories[0].title", 0.75),
            ],
        };
        let graph = KnowledgeGraph::import(export, KnowledgeGraphConfig::default()).unwrap();
        RefinementPlanner::new(Arc::new(graph))
    }

    fn story_id() -> SchemaPath {
        "user_stories[0].id".parse().unwrap()
    }

    #[test]
    fn plan_follows_the_chain() {
        let plan = planner()
            .create_plan("Rename the story id", ArtifactStage::Requirements, &story_id(), "US-1b")
            .unwrap();

        assert_eq!(
            plan.affected_artifacts(),
            vec![
                ArtifactStage::Requirements,
                ArtifactStage::Architecture,
                ArtifactStage::Implementation,
                ArtifactStage::Verification,
            ]
        );
        let priorities: Vec<Priority> = plan.updates.iter().map(|u| u.priority).collect();
        assert_eq!(
            priorities,
            vec![Priority::Critical, Priority::High, Priority::Medium, Priority::Low]
        );
        assert_eq!(plan.unaffected_artifacts, vec![ArtifactStage::UiDesign]);
        assert_eq!(plan.new_value, json!("US-1b"));
        assert!((plan.impact_score - 0.79).abs() < 1e-9);
    }

    #[test]
    fn same_artifact_dependents_join_the_target_update() {
        let plan = planner()
            .create_plan("Rename", ArtifactStage::Requirements, &story_id(), "US-1b")
            .unwrap();
        let target = &plan.updates[0];

        assert_eq!(target.artifact_type, ArtifactStage::Requirements);
        assert_eq!(
            target.target_paths,
            vec![story_id(), "user_stories[0].title".parse().unwrap()]
        );
        assert!(target.depends_on.is_empty());
        assert_eq!(plan.updates.iter().filter(|u| u.artifact_type == ArtifactStage::Requirements).count(), 1);
    }

    #[test]
    fn dependencies_point_upstream() {
        let plan = planner()
            .create_plan("Rename", ArtifactStage::Requirements, &story_id(), "US-1b")
            .unwrap();

        let depends = |stage| plan.update_for(stage).map(|u| u.depends_on.clone()).unwrap();
        assert_eq!(depends(ArtifactStage::Architecture), vec![ArtifactStage::Requirements]);
        assert_eq!(depends(ArtifactStage::Implementation), vec![ArtifactStage::Architecture]);
        assert_eq!(depends(ArtifactStage::Verification), vec![ArtifactStage::Implementation]);
        assert!(planner().validate_plan(&plan).valid);
    }

    #[test]
    fn context_carries_reference_values() {
        let plan = planner()
            .create_plan("Rename", ArtifactStage::Requirements, &story_id(), "US-1b")
            .unwrap();
        let context = &plan.update_for(ArtifactStage::Architecture).unwrap().context;
        let values = context.reference_values.as_ref().unwrap();

        assert_eq!(values["newValue"], json!("US-1b"));
        assert_eq!(values["previousValue"], json!("US-1"));
        assert_eq!(values["targetPath"], json!("user_stories[0].id"));
        assert_eq!(values["targetIdentifier"], json!("US-1"));
        assert!(context.upstream_change.contains("pm_spec:user_stories[0].id"));
        assert!(context.upstream_change.contains("\"US-1b\""));
    }

    #[test]
    fn target_reason_names_sources() {
        let plan = planner()
            .create_plan("Change", ArtifactStage::Architecture, &"apis[0].story".parse().unwrap(), "US-2")
            .unwrap();
        assert_eq!(
            plan.updates[0].context.reason,
            "Edited field; it references pm_spec:user_stories[0].id"
        );
    }

    #[test]
    fn leaf_edit_touches_one_artifact() {
        let plan = planner()
            .create_plan("Fix typo", ArtifactStage::Verification, &"cases[0].title".parse().unwrap(), "Login ok")
            .unwrap();

        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.updates[0].priority, Priority::Critical);
        assert!((plan.impact_score - 0.2).abs() < 1e-9);
    }

    #[test]
    fn missing_target_is_an_error() {
        let err = planner()
            .create_plan("Change", ArtifactStage::Security, &"policies[0]".parse().unwrap(), 1)
            .unwrap_err();
        assert_eq!(err.to_string(), "target node not found: security_spec:policies[0]");
    }

    #[test]
    fn textual_entry_point() {
        let planner = planner();
        let plan = planner
            .create_plan_at("Change", "pm_spec", "user_stories[0].id", "US-2")
            .unwrap();
        assert_eq!(plan.target_node.map(|n| n.id), Some("pm_spec:user_stories[0].id".to_string()));

        assert!(matches!(
            planner.create_plan_at("Change", "marketing", "x", 1),
            Err(PlanError::UnknownArtifact(_))
        ));
        assert!(matches!(
            planner.create_plan_at("Change", "pm_spec", "a[", 1),
            Err(PlanError::InvalidPath(_))
        ));
    }

    #[test]
    fn impact_formula() {
        let score = impact_score(1, 1, ArtifactStage::Requirements);
        assert!((score - (0.2 + 0.15 + 0.01 + 0.1)).abs() < 1e-9);
        assert!((impact_score(0, 0, ArtifactStage::Verification) - 0.2).abs() < 1e-9);
        assert!((impact_score(7, 500, ArtifactStage::Requirements) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn earlier_stages_score_higher() {
        for pair in ArtifactStage::ALL.windows(2) {
            assert!(impact_score(2, 3, pair[0]) >= impact_score(2, 3, pair[1]));
        }
    }

    proptest! {
        #[test]
        fn impact_monotone_and_bounded(
            artifacts in 0usize..10,
            dependents in 0usize..100,
            stage in prop::sample::select(ArtifactStage::ALL.to_vec()),
        ) {
            let score = impact_score(artifacts, dependents, stage);
            prop_assert!((0.0..=1.0).contains(&score));
            prop_assert!(impact_score(artifacts + 1, dependents, stage) >= score);
            prop_assert!(impact_score(artifacts, dependents + 1, stage) >= score);
        }
    }
}
