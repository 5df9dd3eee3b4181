//! Knowledge graph construction
//!
//! Two phases. Node generation walks every artifact synchronously and
//! finalizes the node set. Edge inference then fans candidate batches out to
//! the oracle with bounded concurrency; a single consumer merges the results.
//! Oracle trouble of any kind costs edges, never the build.

use crate::candidates::{plan_batches, CandidateBatch};
use crate::config::KnowledgeGraphConfig;
use crate::graph::KnowledgeGraph;
use crate::node::SchemaEdge;
use crate::oracle::{parse_matches, OracleCandidate, OracleError, OracleRequest, ReferenceOracle, TimeoutOracle};
use crate::walker::{truncate, walk};
use futures::stream::{self, StreamExt};
use refine_artifact::{ArtifactSnapshot, ArtifactStage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Report of one build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResult {
    /// Nodes in the graph
    pub node_count: usize,
    /// Edges in the graph
    pub edge_count: usize,
    /// Artifacts whose content was walked, pipeline order
    pub artifacts_processed: Vec<ArtifactStage>,
    /// Absorbed problems, in the order they occurred
    pub warnings: Vec<String>,
    /// Oracle calls issued
    pub oracle_calls: usize,
    /// Oracle calls that produced no usable answer
    pub failed_batches: usize,
}

/// Edges accepted from one oracle call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeBatch {
    /// Upstream node the batch was asked about
    pub source: String,
    /// Accepted edges
    pub edges: Vec<SchemaEdge>,
}

impl KnowledgeGraph {
    /// Build a graph over every artifact of `snapshot`
    ///
    /// Never fails: missing content, unknown artifact keys and oracle failures
    /// are reported in [`BuildResult::warnings`]. Each oracle call is bounded
    /// by [`KnowledgeGraphConfig::oracle_timeout`].
    #[tracing::instrument(skip_all, fields(artifacts = snapshot.len()))]
    pub async fn build<O: ReferenceOracle>(
        config: KnowledgeGraphConfig,
        snapshot: &ArtifactSnapshot,
        oracle: O,
    ) -> (Self, BuildResult) {
        let mut result = BuildResult::default();

        for key in snapshot.unknown_keys() {
            tracing::warn!("Skipping unknown artifact type {}", key);
            result.warnings.push(format!("Unknown artifact type {key}"));
        }
        for key in snapshot.duplicate_keys() {
            tracing::warn!("Skipping duplicate artifact type {}", key);
            result.warnings.push(format!("Duplicate artifact type {key}"));
        }
        if snapshot.is_empty() {
            tracing::warn!("No artifacts to process");
            result.warnings.push("No artifacts to process".to_string());
            return (Self::empty(config), result);
        }

        tracing::info!("Building knowledge graph from {} artifacts", snapshot.len());

        let mut walked = Vec::new();
        for (stage, record) in snapshot.iter() {
            let Some(content) = &record.content else {
                tracing::warn!("Artifact {} has no content", stage);
                result.warnings.push(format!("Artifact {stage} has no content"));
                continue;
            };
            walked.extend(walk(stage, content, &config));
            result.artifacts_processed.push(stage);
        }

        let batches = plan_batches(&walked, &config);
        tracing::debug!("Walked {} nodes, {} candidate batches", walked.len(), batches.len());

        let oracle = TimeoutOracle::new(oracle, config.oracle_timeout());
        let min_confidence = config.min_confidence;
        let mut outcomes = stream::iter(batches.into_iter().map(|batch| {
            let oracle = &oracle;
            async move {
                let outcome = infer_batch(oracle, &batch, min_confidence).await;
                (batch, outcome)
            }
        }))
        .buffer_unordered(config.max_concurrent_batches.max(1));

        let mut merged: HashMap<(String, String), f64> = HashMap::new();
        while let Some((batch, outcome)) = outcomes.next().await {
            result.oracle_calls += 1;
            match outcome {
                Ok(accepted) => {
                    tracing::debug!(
                        "Batch for {} accepted {} of {} candidates",
                        accepted.source,
                        accepted.edges.len(),
                        batch.candidates.len()
                    );
                    for edge in accepted.edges {
                        let best = merged.entry((edge.from, edge.to)).or_insert(edge.confidence);
                        *best = best.max(edge.confidence);
                    }
                }
                Err(err) => {
                    result.failed_batches += 1;
                    tracing::warn!("Edge inference failed for {}: {}", batch.source_id, err);
                    result
                        .warnings
                        .push(format!("Edge inference failed for {}: {err}", batch.source_id));
                }
            }
        }

        let mut edges: Vec<SchemaEdge> = merged
            .into_iter()
            .map(|((from, to), confidence)| SchemaEdge::new(from, to, confidence))
            .collect();
        edges.sort_by(|a, b| (&a.from, &a.to).cmp(&(&b.from, &b.to)));

        let graph = Self::assemble(config, walked.into_iter().map(|w| w.node).collect(), edges);
        result.node_count = graph.node_count();
        result.edge_count = graph.edge_count();

        tracing::info!(
            "Knowledge graph built: {} nodes, {} edges, {} warnings",
            result.node_count,
            result.edge_count,
            result.warnings.len()
        );
        (graph, result)
    }
}

/// Ask the oracle about one batch and keep confident references
pub(crate) async fn infer_batch<O: ReferenceOracle + ?Sized>(
    oracle: &O,
    batch: &CandidateBatch,
    min_confidence: f64,
) -> Result<EdgeBatch, OracleError> {
    let request = OracleRequest {
        source_description: batch.source_description.clone(),
        candidates: batch
            .candidates
            .iter()
            .enumerate()
            .map(|(index, candidate)| OracleCandidate {
                index,
                text: candidate.text.clone(),
            })
            .collect(),
    };

    let reply = oracle.classify(&request).await?;
    let matches = parse_matches(&reply)
        .ok_or_else(|| OracleError::InvalidResponse(truncate(reply.trim(), 80)))?;

    let edges = matches
        .into_iter()
        .filter(|m| m.references)
        .filter_map(|m| {
            let candidate = batch.candidates.get(m.index)?;
            let confidence = m.confidence.clamp(0.0, 1.0);
            (confidence >= min_confidence)
                .then(|| SchemaEdge::new(batch.source_id.clone(), candidate.node_id.clone(), confidence))
        })
        .collect();

    Ok(EdgeBatch {
        source: batch.source_id.clone(),
        edges,
    })
}
