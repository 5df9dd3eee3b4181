//! Artifact Snapshot
//!
//! Read-only view of every artifact the store currently holds, keyed by stage.
//! The wire form is `{ "<artifactType>": { "content": <value>? } }`.

use crate::content::ContentTree;
use crate::stage::ArtifactStage;
use serde_json::Value;
use std::collections::BTreeMap;

/// One artifact as delivered by the store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtifactRecord {
    /// Structured content, absent when the stage has not produced anything yet
    pub content: Option<ContentTree>,
}

impl ArtifactRecord {
    /// Record with content
    #[inline]
    #[must_use]
    pub fn with_content(content: ContentTree) -> Self {
        Self {
            content: Some(content),
        }
    }

    /// Record without content
    #[inline]
    #[must_use]
    pub fn missing() -> Self {
        Self { content: None }
    }
}

/// Every artifact of one project, in pipeline order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtifactSnapshot {
    records: BTreeMap<ArtifactStage, ArtifactRecord>,
    unknown_keys: Vec<String>,
    duplicate_keys: Vec<String>,
}

impl ArtifactSnapshot {
    /// Empty snapshot
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace one record
    pub fn insert(&mut self, stage: ArtifactStage, record: ArtifactRecord) {
        self.records.insert(stage, record);
    }

    /// Add an artifact holding `content`
    #[inline]
    #[must_use]
    pub fn with_content(mut self, stage: ArtifactStage, content: impl Into<ContentTree>) -> Self {
        self.insert(stage, ArtifactRecord::with_content(content.into()));
        self
    }

    /// Add an artifact without content
    #[inline]
    #[must_use]
    pub fn with_missing(mut self, stage: ArtifactStage) -> Self {
        self.insert(stage, ArtifactRecord::missing());
        self
    }

    /// Parse the store's JSON form
    ///
    /// Keys that name no pipeline stage are kept aside in [`unknown_keys`].
    /// When two keys name the same stage (`pm_spec` and `requirements`), the
    /// first one in document order wins and the later key is kept aside in
    /// [`duplicate_keys`]. A record that is not a map, or whose `content` is
    /// absent or null, becomes a record without content.
    ///
    /// # Errors
    /// Returns error if the top-level value is not a map
    ///
    /// [`unknown_keys`]: ArtifactSnapshot::unknown_keys
    /// [`duplicate_keys`]: ArtifactSnapshot::duplicate_keys
    pub fn from_json(value: &Value) -> Result<Self, SnapshotError> {
        let Value::Object(map) = value else {
            return Err(SnapshotError::NotAnObject);
        };

        let mut snapshot = Self::new();
        for (key, record) in map {
            let Ok(stage) = key.parse::<ArtifactStage>() else {
                snapshot.unknown_keys.push(key.clone());
                continue;
            };
            if snapshot.records.contains_key(&stage) {
                snapshot.duplicate_keys.push(key.clone());
                continue;
            }
            let content = record
                .get("content")
                .filter(|content| !content.is_null())
                .map(ContentTree::from_json);
            snapshot.insert(stage, ArtifactRecord { content });
        }
        Ok(snapshot)
    }

    /// Parse JSON text
    ///
    /// # Errors
    /// Returns error on malformed JSON or a non-map top level
    pub fn from_json_str(text: &str) -> Result<Self, SnapshotError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_json(&value)
    }

    /// Records in pipeline order
    pub fn iter(&self) -> impl Iterator<Item = (ArtifactStage, &ArtifactRecord)> {
        self.records.iter().map(|(stage, record)| (*stage, record))
    }

    /// Record for one stage
    #[must_use]
    pub fn get(&self, stage: ArtifactStage) -> Option<&ArtifactRecord> {
        self.records.get(&stage)
    }

    /// Number of known-stage records
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no known-stage record was supplied
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Input keys that named no pipeline stage
    #[must_use]
    pub fn unknown_keys(&self) -> &[String] {
        &self.unknown_keys
    }

    /// Input keys that repeated a stage an earlier key already supplied
    #[must_use]
    pub fn duplicate_keys(&self) -> &[String] {
        &self.duplicate_keys
    }
}

/// Snapshot parsing failures
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// Top-level value is not a map of artifact type to record
    #[error("artifact snapshot must be a map of artifact type to record")]
    NotAnObject,

    /// Text is not valid JSON
    #[error("invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),
}
