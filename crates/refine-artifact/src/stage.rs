//! Artifact Stages
//!
//! Defines the fixed pipeline-stage enumeration of generated artifacts.
//! The pipeline order decides which direction a dependency may point:
//!
//! ```text
//! requirements → architecture → {security, infrastructure, ui-design} → implementation → verification
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Pipeline stage of a generated artifact
///
/// Declaration order is pipeline order, so the derived `Ord` sorts stages the
/// way the generation pipeline produces them. Stages of equal [`rank`] are
/// produced in parallel.
///
/// [`rank`]: ArtifactStage::rank
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum ArtifactStage {
    /// Product requirements (user stories, features)
    Requirements,
    /// Architecture design (components, APIs, data model)
    Architecture,
    /// Security specification
    Security,
    /// Infrastructure design
    Infrastructure,
    /// UI design
    UiDesign,
    /// Implementation plan
    Implementation,
    /// QA / verification plan
    Verification,
}

impl ArtifactStage {
    /// Every stage in pipeline order
    pub const ALL: [ArtifactStage; 7] = [
        Self::Requirements,
        Self::Architecture,
        Self::Security,
        Self::Infrastructure,
        Self::UiDesign,
        Self::Implementation,
        Self::Verification,
    ];

    /// Highest rank in the pipeline
    pub const MAX_RANK: u8 = 4;

    /// Canonical key used by the artifact store
    #[inline]
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Requirements => "pm_spec",
            Self::Architecture => "arch_design",
            Self::Security => "security_spec",
            Self::Infrastructure => "infra_design",
            Self::UiDesign => "ui_design",
            Self::Implementation => "impl_plan",
            Self::Verification => "qa_plan",
        }
    }

    /// Human readable name
    #[inline]
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Requirements => "requirements",
            Self::Architecture => "architecture",
            Self::Security => "security",
            Self::Infrastructure => "infrastructure",
            Self::UiDesign => "ui-design",
            Self::Implementation => "implementation",
            Self::Verification => "verification",
        }
    }

    /// Position in the pipeline; parallel stages share a rank
    #[inline]
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Requirements => 0,
            Self::Architecture => 1,
            Self::Security | Self::Infrastructure | Self::UiDesign => 2,
            Self::Implementation => 3,
            Self::Verification => 4,
        }
    }

    /// Whether an edge from `self` to `other` respects pipeline direction
    ///
    /// Edges never stay inside one artifact and never point backward.
    #[inline]
    #[must_use]
    pub fn can_feed(self, other: Self) -> bool {
        self != other && self.rank() <= other.rank()
    }

    /// Number of pipeline ranks after this stage
    #[inline]
    #[must_use]
    pub fn ranks_downstream(self) -> u8 {
        Self::MAX_RANK - self.rank()
    }
}

impl Display for ArtifactStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ArtifactStage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pm_spec" | "requirements" => Ok(Self::Requirements),
            "arch_design" | "architecture" => Ok(Self::Architecture),
            "security_spec" | "security" => Ok(Self::Security),
            "infra_design" | "infrastructure" | "infra" => Ok(Self::Infrastructure),
            "ui_design" | "ui-design" | "ui" => Ok(Self::UiDesign),
            "impl_plan" | "implementation" => Ok(Self::Implementation),
            "qa_plan" | "verification" | "qa" => Ok(Self::Verification),
            other => Err(UnknownStage(other.to_string())),
        }
    }
}

impl TryFrom<String> for ArtifactStage {
    type Error = UnknownStage;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ArtifactStage> for &'static str {
    fn from(stage: ArtifactStage) -> Self {
        stage.key()
    }
}

/// Artifact key that names no pipeline stage
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown artifact type: {0}")]
pub struct UnknownStage(pub String);
