//! Refine Schema Knowledge Graph
//!
//! Dependency graph over the fields of every generated artifact.
//!
//! # Core Concepts
//!
//! - [`SchemaNode`]: One addressable value (`arch_design:apis[0].path`)
//! - [`SchemaEdge`]: Confidence-scored upstream → downstream dependency
//! - [`KnowledgeGraph::build`]: Walks a snapshot and infers edges through a [`ReferenceOracle`]
//! - [`KnowledgeGraph::dependents`]: Direct and transitive dependents of one field
//! - [`GraphExport`]: Serializable `{ nodes, edges }` form
//!
//! # Example
//!
//! ```rust,ignore
//! use refine_graph::{KnowledgeGraph, KnowledgeGraphConfig};
//!
//! let (graph, report) = KnowledgeGraph::build(KnowledgeGraphConfig::default(), &snapshot, &oracle).await;
//! println!("{} nodes, {} edges", report.node_count, report.edge_count);
//!
//! let dependents = graph.dependents(ArtifactStage::Requirements, &"user_stories[0].id".parse()?);
//! ```

#![warn(unreachable_pub)]

mod builder;
mod candidates;
mod config;
mod error;
mod graph;
mod node;
mod oracle;
mod query;
mod walker;

pub use builder::{BuildResult, EdgeBatch};
pub use config::{ConfigError, KnowledgeGraphConfig};
pub use error::{GraphError, GraphResult};
pub use graph::{GraphExport, GraphStats, KnowledgeGraph};
pub use node::{node_id, NodeMetadata, SchemaEdge, SchemaNode, ValueKind};
pub use oracle::{
    parse_matches, CachingOracle, OracleCandidate, OracleError, OracleMatch, OracleRequest,
    ReferenceOracle, TimeoutOracle,
};
pub use query::{Dependent, DependentsResult};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
