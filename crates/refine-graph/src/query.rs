//! Dependent lookup
//!
//! Breadth-first traversal over outgoing edges. Breadth-first order means the
//! first time a node is reached is along a shortest path, so every reported
//! dependent carries its minimum depth.

use crate::graph::KnowledgeGraph;
use crate::node::{node_id, SchemaNode};
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use refine_artifact::{ArtifactStage, SchemaPath};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet, VecDeque};

/// One node reached from the queried node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependent {
    /// Reached node
    pub node: SchemaNode,
    /// Minimum number of edges from the queried node
    pub depth: usize,
    /// Upstream node it was first reached from
    pub via: String,
    /// Confidence of the edge it was first reached over
    pub confidence: f64,
}

/// Result of [`KnowledgeGraph::dependents`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependentsResult {
    /// Depth 1
    #[serde(rename = "directDependents")]
    pub direct: Vec<Dependent>,
    /// Depth 2 up to the configured maximum
    #[serde(rename = "transitiveDependents")]
    pub transitive: Vec<Dependent>,
    /// Every dependent keyed by the artifact holding it
    pub grouped_by_artifact: BTreeMap<ArtifactStage, Vec<Dependent>>,
}

impl DependentsResult {
    /// Whether nothing depends on the queried node
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.direct.is_empty() && self.transitive.is_empty()
    }

    /// Number of dependents
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.direct.len() + self.transitive.len()
    }

    /// Direct then transitive dependents
    pub fn iter(&self) -> impl Iterator<Item = &Dependent> {
        self.direct.iter().chain(&self.transitive)
    }
}

impl KnowledgeGraph {
    /// Dependents of the node at `path` in `stage`
    ///
    /// An unknown location yields an empty result. For a map or sequence the
    /// search starts from the node and all of its descendants; those starting
    /// nodes are never reported.
    #[must_use]
    pub fn dependents(&self, stage: ArtifactStage, path: &SchemaPath) -> DependentsResult {
        self.dependents_of(&node_id(stage, path))
    }

    /// Dependents of the node with `id`
    #[must_use]
    pub fn dependents_of(&self, id: &str) -> DependentsResult {
        let Some(root) = self.node(id) else {
            tracing::debug!("Dependents requested for unknown node {}", id);
            return DependentsResult::default();
        };

        let seeds: Vec<usize> = self
            .nodes()
            .enumerate()
            .filter(|(_, node)| {
                node.id == root.id
                    || (node.artifact_type == root.artifact_type
                        && root.schema_path.is_ancestor_of(&node.schema_path))
            })
            .map(|(position, _)| position)
            .collect();

        let graph = self.petgraph();
        let max_depth = self.config().max_depth;
        let mut visited: HashSet<usize> = seeds.iter().copied().collect();
        let mut queue: VecDeque<(usize, usize)> = seeds.iter().map(|&s| (s, 0)).collect();
        let mut result = DependentsResult::default();

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            let Some(current_node) = self.node_by_position(current) else {
                continue;
            };

            let mut next: Vec<(usize, f64)> = graph
                .edges_directed(NodeIndex::new(current), Direction::Outgoing)
                .map(|edge| (graph[edge.target()], *edge.weight()))
                .collect();
            // petgraph yields newest edges first; walk order keeps results stable
            next.sort_by_key(|(position, _)| *position);

            for (target, confidence) in next {
                if !visited.insert(target) {
                    continue;
                }
                let Some(node) = self.node_by_position(target) else {
                    continue;
                };
                let dependent = Dependent {
                    node: node.clone(),
                    depth: depth + 1,
                    via: current_node.id.clone(),
                    confidence,
                };
                result
                    .grouped_by_artifact
                    .entry(node.artifact_type)
                    .or_default()
                    .push(dependent.clone());
                if depth == 0 {
                    result.direct.push(dependent);
                } else {
                    result.transitive.push(dependent);
                }
                queue.push_back((target, depth + 1));
            }
        }

        tracing::debug!(
            "Dependents of {}: {} direct, {} transitive",
            id,
            result.direct.len(),
            result.transitive.len()
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KnowledgeGraphConfig;
    use crate::node::{NodeMetadata, SchemaEdge, ValueKind};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn node(stage: ArtifactStage, path: &str) -> SchemaNode {
        let schema_path: SchemaPath = path.parse().unwrap();
        SchemaNode {
            id: node_id(stage, &schema_path),
            artifact_type: stage,
            schema_path,
            value_kind: ValueKind::Scalar,
            metadata: NodeMetadata::default(),
            raw_value_summary: path.to_string(),
        }
    }

    fn chain(config: KnowledgeGraphConfig) -> KnowledgeGraph {
        use ArtifactStage::*;
        KnowledgeGraph::assemble(
            config,
            vec![
                node(Requirements, "stories"),
                node(Requirements, "stories[0]"),
                node(Requirements, "stories[0].id"),
                node(Architecture, "api"),
                node(Security, "policy"),
                node(Implementation, "task"),
                node(Verification, "case"),
            ],
            vec![
                SchemaEdge::new("pm_spec:stories[0].id", "arch_design:api", 0.9),
                SchemaEdge::new("arch_design:api", "security_spec:policy", 0.8),
                SchemaEdge::new("arch_design:api", "impl_plan:task", 0.85),
                SchemaEdge::new("impl_plan:task", "qa_plan:case", 0.75),
                SchemaEdge::new("pm_spec:stories[0].id", "impl_plan:task", 0.7),
            ],
        )
    }

    fn ids(dependents: &[Dependent]) -> Vec<&str> {
        dependents.iter().map(|d| d.node.id.as_str()).collect()
    }

    #[test]
    fn direct_and_transitive() {
        let graph = chain(KnowledgeGraphConfig::default());
        let result = graph.dependents(ArtifactStage::Requirements, &"stories[0].id".parse().unwrap());

        assert_eq!(ids(&result.direct), vec!["arch_design:api", "impl_plan:task"]);
        assert_eq!(ids(&result.transitive), vec!["security_spec:policy", "qa_plan:case"]);
        assert_eq!(result.transitive[1].depth, 2);
        assert_eq!(result.transitive[1].via, "impl_plan:task");
        assert_eq!(result.len(), 4);
        assert_eq!(
            result.grouped_by_artifact.keys().copied().collect::<Vec<_>>(),
            vec![
                ArtifactStage::Architecture,
                ArtifactStage::Security,
                ArtifactStage::Implementation,
                ArtifactStage::Verification,
            ]
        );
    }

    #[test]
    fn composite_seeds_include_descendants() {
        let graph = chain(KnowledgeGraphConfig::default());
        let result = graph.dependents(ArtifactStage::Requirements, &"stories".parse().unwrap());

        assert_eq!(ids(&result.direct), vec!["arch_design:api", "impl_plan:task"]);
        assert!(result.iter().all(|d| d.node.artifact_type != ArtifactStage::Requirements));
    }

    #[test]
    fn max_depth_limits_traversal() {
        let graph = chain(KnowledgeGraphConfig::default().with_max_depth(1));
        let result = graph.dependents(ArtifactStage::Requirements, &"stories[0].id".parse().unwrap());
        assert_eq!(result.direct.len(), 2);
        assert!(result.transitive.is_empty());
    }

    #[test]
    fn unknown_node_is_empty() {
        let graph = chain(KnowledgeGraphConfig::default());
        let result = graph.dependents(ArtifactStage::UiDesign, &"nothing".parse().unwrap());
        assert!(result.is_empty());
        assert!(result.grouped_by_artifact.is_empty());
    }

    #[test]
    fn cycles_terminate() {
        use ArtifactStage::*;
        let graph = KnowledgeGraph::assemble(
            KnowledgeGraphConfig::default().with_max_depth(10),
            vec![node(Security, "a"), node(Infrastructure, "b")],
            vec![
                SchemaEdge::new("security_spec:a", "infra_design:b", 0.9),
                SchemaEdge::new("infra_design:b", "security_spec:a", 0.9),
            ],
        );
        let result = graph.dependents(Security, &"a".parse().unwrap());
        assert_eq!(ids(&result.direct), vec!["infra_design:b"]);
        assert!(result.transitive.is_empty());
    }

    #[test]
    fn wire_names() {
        let graph = chain(KnowledgeGraphConfig::default());
        let value = serde_json::to_value(graph.dependents_of("impl_plan:task")).unwrap();
        assert!(value.get("directDependents").is_some());
        assert!(value.get("transitiveDependents").is_some());
        assert!(value["groupedByArtifact"].get("qa_plan").is_some());
    }

    const STAGES: [ArtifactStage; 4] = [
        ArtifactStage::Requirements,
        ArtifactStage::Architecture,
        ArtifactStage::Security,
        ArtifactStage::Infrastructure,
    ];

    proptest! {
        #[test]
        fn traversal_terminates_on_random_edges(
            edges in prop::collection::vec((0usize..12, 0usize..12), 0..60),
            max_depth in 1usize..8,
        ) {
            let nodes: Vec<SchemaNode> = (0..12)
                .map(|i| node(STAGES[i % STAGES.len()], &format!("f{i}")))
                .collect();
            let edges: Vec<SchemaEdge> = edges
                .into_iter()
                .filter(|(a, b)| a != b)
                .map(|(a, b)| SchemaEdge::new(nodes[a].id.clone(), nodes[b].id.clone(), 0.9))
                .collect();
            let graph = KnowledgeGraph::assemble(
                KnowledgeGraphConfig::default().with_max_depth(max_depth),
                nodes.clone(),
                edges,
            );

            for n in &nodes {
                let result = graph.dependents_of(&n.id);
                prop_assert!(result.direct.iter().all(|d| d.node.id != n.id));
                prop_assert!(result.iter().all(|d| d.node.id != n.id));
                prop_assert!(result.iter().all(|d| d.depth >= 1 && d.depth <= max_depth));

                let unique: HashSet<_> = result.iter().map(|d| d.node.id.clone()).collect();
                prop_assert_eq!(unique.len(), result.len());
            }
        }
    }
}
