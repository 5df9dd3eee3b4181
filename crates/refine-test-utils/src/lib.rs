//! Testing utilities for the refine workspace
//!
//! Scripted oracles, snapshot fixtures and tracing setup shared by the
//! integration suites.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use refine_artifact::ArtifactSnapshot;
use refine_graph::{OracleError, OracleRequest, ReferenceOracle};
use serde_json::json;
use std::time::Duration;

/// Install a test subscriber honouring `RUST_LOG`; repeated calls are no-ops
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Answers "references" for every candidate with a fixed confidence
#[derive(Debug, Clone, Copy)]
pub struct AlwaysReferences {
    pub confidence: f64,
}

impl AlwaysReferences {
    pub fn new(confidence: f64) -> Self {
        Self { confidence }
    }
}

impl Default for AlwaysReferences {
    fn default() -> Self {
        Self::new(0.9)
    }
}

#[async_trait]
impl ReferenceOracle for AlwaysReferences {
    async fn classify(&self, request: &OracleRequest) -> Result<String, OracleError> {
        let matches: Vec<_> = request
            .candidates
            .iter()
            .map(|c| json!({"index": c.index, "references": true, "confidence": self.confidence}))
            .collect();
        Ok(serde_json::Value::Array(matches).to_string())
    }
}

/// Fails every call
#[derive(Debug, Clone, Default)]
pub struct FailingOracle;

#[async_trait]
impl ReferenceOracle for FailingOracle {
    async fn classify(&self, _request: &OracleRequest) -> Result<String, OracleError> {
        Err(OracleError::Unavailable("scripted outage".to_string()))
    }
}

/// Replies with the same text to every call
#[derive(Debug, Clone)]
pub struct FixedReplyOracle(pub String);

impl FixedReplyOracle {
    pub fn new(reply: impl Into<String>) -> Self {
        Self(reply.into())
    }
}

#[async_trait]
impl ReferenceOracle for FixedReplyOracle {
    async fn classify(&self, _request: &OracleRequest) -> Result<String, OracleError> {
        Ok(self.0.clone())
    }
}

/// References only candidates whose text contains a token of the source description
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringOracle;

#[async_trait]
impl ReferenceOracle for SubstringOracle {
    async fn classify(&self, request: &OracleRequest) -> Result<String, OracleError> {
        // The quoted value is the last quoted span of the description
        let value = request
            .source_description
            .rsplit('"')
            .nth(1)
            .unwrap_or_default()
            .to_lowercase();
        let matches: Vec<_> = request
            .candidates
            .iter()
            .map(|c| {
                let hit = !value.is_empty() && c.text.to_lowercase().contains(&value);
                json!({"index": c.index, "references": hit, "confidence": if hit { 0.95 } else { 0.1 }})
            })
            .collect();
        Ok(serde_json::Value::Array(matches).to_string())
    }
}

/// Sleeps before answering like [`AlwaysReferences`]
#[derive(Debug, Clone, Copy)]
pub struct SlowOracle(pub Duration);

#[async_trait]
impl ReferenceOracle for SlowOracle {
    async fn classify(&self, request: &OracleRequest) -> Result<String, OracleError> {
        tokio::time::sleep(self.0).await;
        AlwaysReferences::default().classify(request).await
    }
}

/// Records every request before delegating
#[derive(Debug, Default)]
pub struct RecordingOracle<O> {
    inner: O,
    requests: Mutex<Vec<OracleRequest>>,
}

impl<O: ReferenceOracle> RecordingOracle<O> {
    pub fn new(inner: O) -> Self {
        Self {
            inner,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<OracleRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl<O: ReferenceOracle> ReferenceOracle for RecordingOracle<O> {
    async fn classify(&self, request: &OracleRequest) -> Result<String, OracleError> {
        self.requests.lock().push(request.clone());
        self.inner.classify(request).await
    }
}

/// Two user stories and one login API
pub fn login_snapshot() -> ArtifactSnapshot {
    ArtifactSnapshot::from_json(&json!({
        "pm_spec": {"content": {"user_stories": [{"id": "US-1"}, {"id": "US-2"}]}},
        "arch_design": {"content": {"apis": [{"path": "/api/login"}]}},
    }))
    .expect("fixture is a map")
}

/// One artifact per pipeline stage, cross-referencing by name
pub fn pipeline_snapshot() -> ArtifactSnapshot {
    ArtifactSnapshot::from_json(&json!({
        "pm_spec": {"content": {
            "product": "TaskFlow",
            "user_stories": [
                {"id": "US-1", "title": "User login", "description": "As a user I can log in with email"},
                {"id": "US-2", "title": "Create task", "description": "As a user I can create a task"}
            ]
        }},
        "arch_design": {"content": {
            "apis": [
                {"name": "login", "path": "/api/login", "story": "US-1"},
                {"name": "create_task", "path": "/api/tasks", "story": "US-2"}
            ],
            "database_schema": {"tables": [
                {"name": "users", "columns": ["id", "email"]},
                {"name": "tasks", "columns": ["id", "title", "owner"]}
            ]}
        }},
        "security_spec": {"content": {
            "controls": [{"id": "SEC-1", "target": "/api/login", "rule": "rate limit"}]
        }},
        "infra_design": {"content": {
            "services": [{"name": "api", "routes": ["/api/login", "/api/tasks"]}]
        }},
        "ui_design": {"content": {
            "screens": [{"name": "Login", "calls": "/api/login"}]
        }},
        "impl_plan": {"content": {
            "tasks": [{"id": "T-1", "summary": "Implement /api/login handler"}]
        }},
        "qa_plan": {"content": {
            "cases": [{"id": "QA-1", "covers": "Implement /api/login handler"}]
        }}
    }))
    .expect("fixture is a map")
}
