//! Refine Planner
//!
//! Turns one proposed field edit into an ordered, prioritized set of
//! per-artifact updates, using the dependencies recorded in a
//! [`refine_graph::KnowledgeGraph`].
//!
//! # Core Concepts
//!
//! - [`analyze_intent`]: Keyword classification of the request text
//! - [`RefinementPlanner::create_plan`]: Edited field + new value → [`RefinementPlan`]
//! - [`SurgicalUpdate`]: Paths, instruction and priority for one artifact
//! - [`validate_plan`]: Structural check of a plan before execution
//!
//! # Example
//!
//! ```rust,ignore
//! use refine_planner::RefinementPlanner;
//!
//! let planner = RefinementPlanner::new(Arc::new(graph));
//! let plan = planner.create_plan_at("Rename the story", "pm_spec", "user_stories[0].id", "US-1b")?;
//! for update in &plan.updates {
//!     println!("{:?} {}: {}", update.priority, update.artifact_type, update.instruction);
//! }
//! ```

#![warn(unreachable_pub)]

mod error;
mod intent;
mod plan;
mod planner;
mod template;
mod validate;

pub use error::{PlanError, PlanResult};
pub use intent::{analyze_intent, IntentAnalysis, IntentType};
pub use plan::{Priority, RefinementPlan, SurgicalUpdate, UpdateContext};
pub use planner::{impact_score, RefinementPlanner};
pub use validate::{validate_plan, PlanValidation};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
