//! Refine Artifact Model
//!
//! Typed view of the artifacts produced by the generation pipeline.
//!
//! # Core Concepts
//!
//! - [`ArtifactStage`]: Fixed pipeline-stage enumeration with canonical keys and ranks
//! - [`SchemaPath`]: Stable address of one value inside an artifact (`apis[0].path`)
//! - [`ContentTree`]: Arena of structured values (`Scalar | Object | Array`)
//! - [`ArtifactSnapshot`]: Every artifact of one project, as read from the store
//!
//! # Example
//!
//! ```rust,ignore
//! use refine_artifact::{ArtifactSnapshot, ArtifactStage, SchemaPath};
//!
//! let snapshot = ArtifactSnapshot::from_json_str(r#"{"pm_spec": {"content": {"user_stories": []}}}"#)?;
//! let path: SchemaPath = "user_stories[0].id".parse()?;
//! assert_eq!(path.array_index(), None);
//! ```

#![warn(unreachable_pub)]

mod content;
mod path;
mod snapshot;
mod stage;

pub use content::{ContentError, ContentNode, ContentTree, Scalar, ValueId};
pub use path::{PathError, PathSegment, SchemaPath};
pub use snapshot::{ArtifactRecord, ArtifactSnapshot, SnapshotError};
pub use stage::{ArtifactStage, UnknownStage};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
