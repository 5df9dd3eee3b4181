//! Graph configuration
//!
//! One [`KnowledgeGraphConfig`] is threaded through the builder into the graph
//! it produces, so graphs with different policies can coexist.

use refine_artifact::SchemaPath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Policy for building and traversing one knowledge graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeGraphConfig {
    /// Minimum oracle confidence for an edge to be kept
    pub min_confidence: f64,
    /// Deepest traversal level reported by dependent queries
    pub max_depth: usize,
    /// Field names excluded from edge search (still kept as nodes)
    pub ignored_fields: BTreeSet<String>,
    /// Maximum candidates per oracle call
    pub batch_size: usize,
    /// Oracle calls in flight at once
    pub max_concurrent_batches: usize,
    /// Candidates kept per upstream node after pre-filtering
    pub max_candidates_per_node: usize,
    /// Minimum shared tokens for a candidate pair to reach the oracle
    pub min_token_overlap: usize,
    /// Maximum characters of a node's value summary
    pub summary_max_len: usize,
    /// Per-call oracle timeout in milliseconds
    pub oracle_timeout_ms: u64,
}

impl KnowledgeGraphConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With minimum edge confidence
    #[inline]
    #[must_use]
    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    /// With maximum traversal depth
    #[inline]
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// With an additional ignored field name
    #[inline]
    #[must_use]
    pub fn with_ignored_field(mut self, field: impl Into<String>) -> Self {
        self.ignored_fields.insert(field.into());
        self
    }

    /// With oracle batch size
    #[inline]
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// With oracle fan-out
    #[inline]
    #[must_use]
    pub fn with_max_concurrent_batches(mut self, max: usize) -> Self {
        self.max_concurrent_batches = max;
        self
    }

    /// With pre-filter cap per upstream node
    #[inline]
    #[must_use]
    pub fn with_max_candidates_per_node(mut self, max: usize) -> Self {
        self.max_candidates_per_node = max;
        self
    }

    /// With pre-filter token threshold
    #[inline]
    #[must_use]
    pub fn with_min_token_overlap(mut self, min: usize) -> Self {
        self.min_token_overlap = min;
        self
    }

    /// With summary length limit
    #[inline]
    #[must_use]
    pub fn with_summary_max_len(mut self, len: usize) -> Self {
        self.summary_max_len = len;
        self
    }

    /// With oracle timeout
    #[inline]
    #[must_use]
    pub fn with_oracle_timeout(mut self, timeout: Duration) -> Self {
        self.oracle_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Oracle timeout as a [`Duration`]
    #[inline]
    #[must_use]
    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_millis(self.oracle_timeout_ms)
    }

    /// Whether `path` passes through an ignored field and is excluded from edge search
    #[must_use]
    pub fn is_ignored(&self, path: &SchemaPath) -> bool {
        self.ignored_fields.iter().any(|field| path.contains_field(field))
    }

    /// Parse configuration from TOML; unset keys take their defaults
    ///
    /// # Errors
    /// Returns error on malformed TOML or values that fail [`validate`]
    ///
    /// [`validate`]: KnowledgeGraphConfig::validate
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns the first out-of-range field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ConfigError::invalid(
                "min_confidence",
                format!("{} is outside [0, 1]", self.min_confidence),
            ));
        }
        let positive = [
            ("max_depth", self.max_depth),
            ("batch_size", self.batch_size),
            ("max_concurrent_batches", self.max_concurrent_batches),
            ("max_candidates_per_node", self.max_candidates_per_node),
            ("summary_max_len", self.summary_max_len),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::invalid(field, "must be at least 1"));
            }
        }
        Ok(())
    }
}

impl Default for KnowledgeGraphConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.7,
            max_depth: 3,
            ignored_fields: BTreeSet::new(),
            batch_size: 20,
            max_concurrent_batches: 4,
            max_candidates_per_node: 100,
            min_token_overlap: 0,
            summary_max_len: 200,
            oracle_timeout_ms: 30_000,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Value out of range
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// TOML could not be parsed
    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
