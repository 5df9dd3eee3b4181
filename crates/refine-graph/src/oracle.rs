//! Semantic reference oracle
//!
//! The oracle answers "does downstream text X reference upstream value Y".
//! It is an external text-classification service reached through the
//! [`ReferenceOracle`] trait. Its reply is free text expected to contain a
//! JSON list of matches; [`parse_matches`] extracts that list tolerantly.
//!
//! Adapters:
//! - [`TimeoutOracle`]: per-call deadline, a timeout is an ordinary failure
//! - [`CachingOracle`]: memoizes replies by a digest of the request

use async_trait::async_trait;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// One downstream snippet in a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleCandidate {
    /// Position within the request
    pub index: usize,
    /// Snippet text
    pub text: String,
}

/// One oracle call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleRequest {
    /// Natural-language description of the upstream value
    pub source_description: String,
    /// Snippets to classify, at most one batch
    pub candidates: Vec<OracleCandidate>,
}

impl OracleRequest {
    /// Stable digest of the request contents
    #[must_use]
    pub fn digest(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.source_description.as_bytes());
        for candidate in &self.candidates {
            hasher.update(&[0]);
            hasher.update(&(candidate.index as u64).to_le_bytes());
            hasher.update(candidate.text.as_bytes());
        }
        hasher.finalize()
    }
}

/// Verdict for one candidate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OracleMatch {
    /// Candidate position within the request
    pub index: usize,
    /// Whether the candidate references the source
    pub references: bool,
    /// Confidence of the verdict
    pub confidence: f64,
}

/// Oracle failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OracleError {
    /// Service unreachable or failed
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    /// No reply before the deadline
    #[error("oracle timed out after {duration_ms}ms")]
    Timeout {
        /// Deadline that elapsed
        duration_ms: u64,
    },

    /// Service refused the request
    #[error("oracle rejected request: {0}")]
    Rejected(String),

    /// Reply did not contain a match list
    #[error("invalid oracle response: {0}")]
    InvalidResponse(String),
}

impl OracleError {
    /// Whether repeating the call may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout { .. })
    }
}

/// External classifier deciding whether snippets reference a source value
#[async_trait]
pub trait ReferenceOracle: Send + Sync {
    /// Classify every candidate of `request`, returning the raw reply text
    async fn classify(&self, request: &OracleRequest) -> Result<String, OracleError>;
}

#[async_trait]
impl<'a, T: ReferenceOracle + ?Sized> ReferenceOracle for &'a T {
    async fn classify(&self, request: &OracleRequest) -> Result<String, OracleError> {
        (**self).classify(request).await
    }
}

#[async_trait]
impl<T: ReferenceOracle + ?Sized> ReferenceOracle for Arc<T> {
    async fn classify(&self, request: &OracleRequest) -> Result<String, OracleError> {
        (**self).classify(request).await
    }
}

#[async_trait]
impl<T: ReferenceOracle + ?Sized> ReferenceOracle for Box<T> {
    async fn classify(&self, request: &OracleRequest) -> Result<String, OracleError> {
        (**self).classify(request).await
    }
}

/// Extract the match list from an oracle reply
///
/// Accepts a bare JSON array, an object with a `matches` or `results` array,
/// a single match object, and any of those wrapped in prose or a fenced code
/// block. Blank replies are an empty list. Entries without a usable `index`
/// are skipped; a missing `references` reads as `false` and a missing
/// `confidence` as `0`.
///
/// Returns `None` when no match list can be found.
#[must_use]
pub fn parse_matches(reply: &str) -> Option<Vec<OracleMatch>> {
    let reply = reply.trim();
    if reply.is_empty() {
        return Some(Vec::new());
    }

    if let Ok(value) = serde_json::from_str::<Value>(reply) {
        return matches_from_value(&value);
    }
    if let Some(fenced) = fenced_block(reply) {
        if let Some(matches) = serde_json::from_str::<Value>(fenced)
            .ok()
            .and_then(|value| matches_from_value(&value))
        {
            return Some(matches);
        }
    }
    embedded_json(reply).and_then(|value| matches_from_value(&value))
}

fn matches_from_value(value: &Value) -> Option<Vec<OracleMatch>> {
    match value {
        Value::Array(items) => Some(items.iter().filter_map(match_from_item).collect()),
        Value::Object(map) => {
            if let Some(Value::Array(items)) = map.get("matches").or_else(|| map.get("results")) {
                Some(items.iter().filter_map(match_from_item).collect())
            } else if map.contains_key("index") {
                Some(match_from_item(value).into_iter().collect())
            } else {
                None
            }
        }
        _ => None,
    }
}

fn match_from_item(item: &Value) -> Option<OracleMatch> {
    let index = match item.get("index")? {
        Value::Number(n) => usize::try_from(n.as_u64()?).ok()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    let references = match item.get("references") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    };
    let confidence = item
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);

    Some(OracleMatch {
        index,
        references,
        confidence,
    })
}

/// Body of the first ``` fenced block, language tag stripped
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")? + 3;
    let rest = &text[start..];
    let body_start = rest.find('\n').map_or(0, |i| i + 1);
    let body = &rest[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

/// Outermost JSON array or object embedded in prose
fn embedded_json(text: &str) -> Option<Value> {
    let spans = [('[', ']'), ('{', '}')];
    let mut candidates: Vec<(usize, &str)> = spans
        .iter()
        .filter_map(|(open, close)| {
            let start = text.find(*open)?;
            let end = text.rfind(*close)?;
            (end > start).then(|| (start, &text[start..=end]))
        })
        .collect();
    candidates.sort_by_key(|(start, _)| *start);
    candidates
        .into_iter()
        .find_map(|(_, slice)| serde_json::from_str(slice).ok())
}

/// Adapter enforcing a per-call deadline
#[derive(Debug, Clone)]
pub struct TimeoutOracle<O> {
    inner: O,
    timeout: Duration,
}

impl<O: ReferenceOracle> TimeoutOracle<O> {
    /// Wrap `inner` with `timeout`
    #[inline]
    #[must_use]
    pub fn new(inner: O, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<O: ReferenceOracle> ReferenceOracle for TimeoutOracle<O> {
    async fn classify(&self, request: &OracleRequest) -> Result<String, OracleError> {
        match tokio::time::timeout(self.timeout, self.inner.classify(request)).await {
            Ok(reply) => reply,
            Err(_) => Err(OracleError::Timeout {
                duration_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}

/// Adapter memoizing successful replies
///
/// Keyed by [`OracleRequest::digest`], so rebuilding an unchanged snapshot
/// repeats no calls. Failures are not cached.
#[derive(Debug, Clone)]
pub struct CachingOracle<O> {
    inner: O,
    cache: Cache<blake3::Hash, Arc<str>>,
}

impl<O: ReferenceOracle> CachingOracle<O> {
    /// Wrap `inner` with a cache of at most `max_capacity` replies
    #[inline]
    #[must_use]
    pub fn new(inner: O, max_capacity: u64) -> Self {
        Self {
            inner,
            cache: Cache::new(max_capacity),
        }
    }

    /// Wrap `inner` with a cache whose entries expire after `ttl`
    #[inline]
    #[must_use]
    pub fn with_ttl(inner: O, max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Drop every cached reply
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }

    /// Number of cached replies
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Flush pending cache bookkeeping, making counts exact
    pub async fn sync(&self) {
        self.cache.run_pending_tasks().await;
    }
}

#[async_trait]
impl<O: ReferenceOracle> ReferenceOracle for CachingOracle<O> {
    async fn classify(&self, request: &OracleRequest) -> Result<String, OracleError> {
        let key = request.digest();
        if let Some(cached) = self.cache.get(&key).await {
            tracing::debug!("Oracle cache hit");
            return Ok(cached.to_string());
        }

        let reply = self.inner.classify(request).await?;
        self.cache.insert(key, Arc::from(reply.as_str())).await;
        Ok(reply)
    }
}
