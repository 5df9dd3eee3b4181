//! Knowledge graph storage
//!
//! Nodes are kept in walk order in an [`IndexMap`]; the petgraph node index of
//! a node equals its position in that map. The graph is immutable once built
//! and is shared between planners behind an `Arc`.

use crate::config::KnowledgeGraphConfig;
use crate::error::{GraphError, GraphResult};
use crate::node::{node_id, SchemaEdge, SchemaNode};
use indexmap::IndexMap;
use petgraph::graph::{DiGraph, NodeIndex};
use refine_artifact::{ArtifactStage, SchemaPath};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Aggregate counts of a graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    /// Number of nodes
    pub nodes: usize,
    /// Number of edges
    pub edges: usize,
    /// Artifacts holding at least one node, pipeline order
    pub artifacts: Vec<ArtifactStage>,
}

/// Serializable form of a graph's nodes and edges
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphExport {
    /// Every node, walk order
    pub nodes: Vec<SchemaNode>,
    /// Every edge, sorted by `(from, to)`
    pub edges: Vec<SchemaEdge>,
}

/// Dependency graph over the fields of all artifacts
#[derive(Debug, Clone)]
pub struct KnowledgeGraph {
    config: KnowledgeGraphConfig,
    nodes: IndexMap<String, SchemaNode>,
    edges: Vec<SchemaEdge>,
    graph: DiGraph<usize, f64>,
}

impl KnowledgeGraph {
    /// Graph without nodes
    #[must_use]
    pub fn empty(config: KnowledgeGraphConfig) -> Self {
        Self::assemble(config, Vec::new(), Vec::new())
    }

    /// Build the indexed graph; node ids must be unique
    ///
    /// Edges whose endpoints are unknown are left out.
    pub(crate) fn assemble(
        config: KnowledgeGraphConfig,
        nodes: Vec<SchemaNode>,
        edges: Vec<SchemaEdge>,
    ) -> Self {
        let nodes: IndexMap<String, SchemaNode> =
            nodes.into_iter().map(|node| (node.id.clone(), node)).collect();

        let mut graph = DiGraph::with_capacity(nodes.len(), edges.len());
        for position in 0..nodes.len() {
            graph.add_node(position);
        }

        let mut kept = Vec::with_capacity(edges.len());
        for edge in edges {
            let (Some(from), Some(to)) = (nodes.get_index_of(&edge.from), nodes.get_index_of(&edge.to))
            else {
                continue;
            };
            graph.add_edge(NodeIndex::new(from), NodeIndex::new(to), edge.confidence);
            kept.push(edge);
        }

        Self {
            config,
            nodes,
            edges: kept,
            graph,
        }
    }

    /// Configuration the graph was built with
    #[inline]
    #[must_use]
    pub fn config(&self) -> &KnowledgeGraphConfig {
        &self.config
    }

    /// Number of nodes
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges
    #[inline]
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// All nodes in walk order
    pub fn nodes(&self) -> impl Iterator<Item = &SchemaNode> {
        self.nodes.values()
    }

    /// All edges, sorted by `(from, to)`
    #[must_use]
    pub fn edges(&self) -> &[SchemaEdge] {
        &self.edges
    }

    /// Node by id
    #[inline]
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&SchemaNode> {
        self.nodes.get(id)
    }

    /// Node by artifact and path
    #[must_use]
    pub fn node_at(&self, stage: ArtifactStage, path: &SchemaPath) -> Option<&SchemaNode> {
        self.nodes.get(&node_id(stage, path))
    }

    /// Nodes of one artifact in walk order
    #[must_use]
    pub fn nodes_for_artifact(&self, stage: ArtifactStage) -> Vec<&SchemaNode> {
        self.nodes
            .values()
            .filter(|node| node.artifact_type == stage)
            .collect()
    }

    /// Nodes of the artifact named by `key`; empty for unknown keys
    #[must_use]
    pub fn nodes_for_artifact_key(&self, key: &str) -> Vec<&SchemaNode> {
        key.parse::<ArtifactStage>()
            .map(|stage| self.nodes_for_artifact(stage))
            .unwrap_or_default()
    }

    /// Edges pointing at `id`, i.e. the nodes it depends on
    #[must_use]
    pub fn upstream_of(&self, id: &str) -> Vec<&SchemaEdge> {
        self.edges.iter().filter(|edge| edge.to == id).collect()
    }

    /// Artifacts holding at least one node, pipeline order
    #[must_use]
    pub fn artifacts(&self) -> Vec<ArtifactStage> {
        self.nodes
            .values()
            .map(|node| node.artifact_type)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Aggregate counts
    #[must_use]
    pub fn stats(&self) -> GraphStats {
        GraphStats {
            nodes: self.node_count(),
            edges: self.edge_count(),
            artifacts: self.artifacts(),
        }
    }

    /// Copy out nodes and edges
    #[must_use]
    pub fn export(&self) -> GraphExport {
        GraphExport {
            nodes: self.nodes.values().cloned().collect(),
            edges: self.edges.clone(),
        }
    }

    /// Rebuild a graph from an export
    ///
    /// # Errors
    /// Returns error on duplicate node ids or edges naming unknown nodes
    pub fn import(export: GraphExport, config: KnowledgeGraphConfig) -> GraphResult<Self> {
        let mut ids = BTreeSet::new();
        for node in &export.nodes {
            if !ids.insert(node.id.as_str()) {
                return Err(GraphError::DuplicateNode(node.id.clone()));
            }
        }
        if let Some(edge) = export
            .edges
            .iter()
            .find(|edge| !ids.contains(edge.from.as_str()) || !ids.contains(edge.to.as_str()))
        {
            return Err(GraphError::DanglingEdge {
                from: edge.from.clone(),
                to: edge.to.clone(),
            });
        }

        Ok(Self::assemble(config, export.nodes, export.edges))
    }

    /// Export as JSON text
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_json(&self) -> GraphResult<String> {
        Ok(serde_json::to_string(&self.export())?)
    }

    /// Import from JSON text
    ///
    /// # Errors
    /// Returns error on malformed JSON or an inconsistent export
    pub fn from_json(text: &str, config: KnowledgeGraphConfig) -> GraphResult<Self> {
        let export: GraphExport = serde_json::from_str(text)?;
        Self::import(export, config)
    }

    pub(crate) fn position(&self, id: &str) -> Option<usize> {
        self.nodes.get_index_of(id)
    }

    pub(crate) fn node_by_position(&self, position: usize) -> Option<&SchemaNode> {
        self.nodes.get_index(position).map(|(_, node)| node)
    }

    pub(crate) fn petgraph(&self) -> &DiGraph<usize, f64> {
        &self.graph
    }
}
