//! Planning over graphs built from scripted snapshots

use pretty_assertions::assert_eq;
use refine_artifact::{ArtifactStage, SchemaPath};
use refine_graph::{KnowledgeGraph, KnowledgeGraphConfig};
use refine_planner::{IntentType, PlanError, Priority, RefinementPlanner};
use refine_test_utils::{init_test_tracing, login_snapshot, pipeline_snapshot, AlwaysReferences, SubstringOracle};
use serde_json::json;
use std::sync::Arc;

fn path(text: &str) -> SchemaPath {
    text.parse().unwrap()
}

async fn login_planner() -> RefinementPlanner {
    let (graph, _) = KnowledgeGraph::build(
        KnowledgeGraphConfig::default(),
        &login_snapshot(),
        AlwaysReferences::new(0.9),
    )
    .await;
    RefinementPlanner::new(Arc::new(graph))
}

async fn pipeline_planner() -> RefinementPlanner {
    let (graph, result) =
        KnowledgeGraph::build(KnowledgeGraphConfig::default(), &pipeline_snapshot(), SubstringOracle).await;
    assert_eq!(result.failed_batches, 0);
    RefinementPlanner::new(Arc::new(graph))
}

#[tokio::test]
async fn login_story_rename() {
    init_test_tracing();
    let planner = login_planner().await;
    let plan = planner
        .create_plan(
            "Rename story US-1",
            ArtifactStage::Requirements,
            &path("user_stories[0].id"),
            "US-1b",
        )
        .unwrap();

    assert_eq!(plan.intent.intent_type, IntentType::Modify);
    assert_eq!(plan.updates.len(), 2);

    let target = &plan.updates[0];
    assert_eq!(target.artifact_type, ArtifactStage::Requirements);
    assert_eq!(target.priority, Priority::Critical);
    assert_eq!(target.target_paths, vec![path("user_stories[0].id")]);

    let api = &plan.updates[1];
    assert_eq!(api.artifact_type, ArtifactStage::Architecture);
    assert_eq!(api.priority, Priority::High);
    assert_eq!(api.target_paths, vec![path("apis[0].path")]);
    assert_eq!(api.depends_on, vec![ArtifactStage::Requirements]);

    assert!(plan.unaffected_artifacts.is_empty());
    assert!((plan.impact_score - 0.46).abs() < 1e-9);
    assert!(planner.validate_plan(&plan).valid);
}

#[tokio::test]
async fn unknown_target_fails() {
    let planner = login_planner().await;
    let err = planner
        .create_plan("Change", ArtifactStage::Requirements, &path("user_stories[5].id"), "x")
        .unwrap_err();
    assert!(matches!(err, PlanError::TargetNotFound { artifact: ArtifactStage::Requirements, .. }));
    assert_eq!(err.to_string(), "target node not found: pm_spec:user_stories[5].id");
}

#[tokio::test]
async fn api_path_change_fans_out() {
    let planner = pipeline_planner().await;
    let plan = planner
        .create_plan_at("Change the login route", "arch_design", "apis[0].path", "/api/signin")
        .unwrap();

    assert_eq!(
        plan.affected_artifacts(),
        vec![
            ArtifactStage::Architecture,
            ArtifactStage::Security,
            ArtifactStage::Infrastructure,
            ArtifactStage::UiDesign,
            ArtifactStage::Implementation,
            ArtifactStage::Verification,
        ]
    );
    assert_eq!(plan.unaffected_artifacts, vec![ArtifactStage::Requirements]);
    assert!(plan.updates[1..].iter().all(|u| u.priority == Priority::High));
    assert!(plan.updates[1..]
        .iter()
        .all(|u| u.depends_on == vec![ArtifactStage::Architecture]));
    assert_eq!(
        plan.update_for(ArtifactStage::Infrastructure).map(|u| u.target_paths.clone()),
        Some(vec![path("services[0].routes[0]")])
    );
    assert!(plan
        .update_for(ArtifactStage::Implementation)
        .is_some_and(|u| u.instruction.contains("implementation")));
    assert!(plan
        .update_for(ArtifactStage::Verification)
        .is_some_and(|u| u.instruction.contains("test cases")));
    assert!((plan.impact_score - 1.0).abs() < 1e-9);
    assert!(planner.validate_plan(&plan).valid);
}

#[tokio::test]
async fn updates_follow_pipeline_order() {
    let planner = pipeline_planner().await;
    let plan = planner
        .create_plan("Change", ArtifactStage::Architecture, &path("apis[0].path"), "/api/signin")
        .unwrap();

    assert_eq!(plan.updates[0].priority, Priority::Critical);
    let stages = plan.affected_artifacts();
    assert!(stages[1..].windows(2).all(|pair| pair[0] < pair[1]));

    for (i, update) in plan.updates.iter().enumerate() {
        for dependency in &update.depends_on {
            let at = stages.iter().position(|s| s == dependency).unwrap();
            assert!(at < i, "{} listed before {}", update.artifact_type, dependency);
        }
    }
}

#[tokio::test]
async fn earlier_edits_reach_further() {
    let planner = pipeline_planner().await;
    let upstream = planner
        .create_plan("Change", ArtifactStage::Architecture, &path("apis[0].path"), "/api/signin")
        .unwrap();
    let downstream = planner
        .create_plan(
            "Change",
            ArtifactStage::Implementation,
            &path("tasks[0].summary"),
            "Implement /api/signin handler",
        )
        .unwrap();

    assert!(upstream.impact_score > downstream.impact_score);
    assert_eq!(downstream.affected_artifacts(), vec![ArtifactStage::Implementation, ArtifactStage::Verification]);
}

#[tokio::test]
async fn validation_catches_tampered_plans() {
    let planner = login_planner().await;
    let plan = planner
        .create_plan("Rename", ArtifactStage::Requirements, &path("user_stories[0].id"), "US-1b")
        .unwrap();

    let mut emptied = plan.clone();
    emptied.updates[1].target_paths.clear();
    let result = planner.validate_plan(&emptied);
    assert!(!result.valid);
    assert_eq!(result.errors, vec!["Update for arch_design has no target paths".to_string()]);

    let mut circular = plan;
    circular.updates[0].depends_on.push(ArtifactStage::Architecture);
    let result = planner.validate_plan(&circular);
    assert!(!result.valid);
    assert!(result
        .errors
        .iter()
        .any(|e| e == "Plan contains circular dependencies between artifacts: pm_spec, arch_design"));
}

#[tokio::test]
async fn plan_wire_format() {
    let planner = login_planner().await;
    let plan = planner
        .create_plan("Rename", ArtifactStage::Requirements, &path("user_stories[0].id"), "US-1b")
        .unwrap();
    let value = serde_json::to_value(&plan).unwrap();

    assert_eq!(value["originalIntent"], "Rename");
    assert_eq!(value["intent"]["type"], "modify");
    assert_eq!(value["targetNode"]["id"], "pm_spec:user_stories[0].id");
    assert_eq!(value["newValue"], json!("US-1b"));
    assert_eq!(value["updates"][0]["priority"], "critical");
    assert_eq!(value["updates"][1]["context"]["referenceValues"]["newValue"], "US-1b");
    assert!(value["impactScore"].is_f64());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn planners_share_one_graph() {
    let planner = pipeline_planner().await;
    let graph = Arc::clone(planner.graph());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let graph = Arc::clone(&graph);
            tokio::task::spawn_blocking(move || {
                RefinementPlanner::new(graph)
                    .create_plan("Change", ArtifactStage::Architecture, &path("apis[0].path"), format!("/api/v{i}"))
                    .map(|plan| plan.updates.len())
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), 6);
    }
}
