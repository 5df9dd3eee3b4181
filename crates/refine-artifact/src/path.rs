//! Schema paths for addressing within artifact content
//!
//! Provides [`SchemaPath`] for addressing one value inside one artifact tree
//! with dotted field names and bracketed array indices.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::iter::Peekable;
use std::str::{Chars, FromStr};

/// One step of a [`SchemaPath`]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathSegment {
    /// Named field of an object
    Field(String),
    /// Position inside a sequence
    Index(usize),
}

impl PathSegment {
    /// Field name, if this is a field segment
    #[inline]
    #[must_use]
    pub fn as_field(&self) -> Option<&str> {
        match self {
            Self::Field(name) => Some(name),
            Self::Index(_) => None,
        }
    }

    /// Array index, if this is an index segment
    #[inline]
    #[must_use]
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Field(_) => None,
            Self::Index(i) => Some(*i),
        }
    }
}

/// Path within an artifact content tree
///
/// Rendered as `apis[0].path` or `database_schema.tables[1].columns`.
/// Field names that are empty or contain `.`, `[`, `]`, `"` or `\\` are
/// written as quoted brackets with `"` and `\\` backslash-escaped, so
/// `{"v1.2": {"": 1}}` addresses its leaf as `["v1.2"][""]`. Rendering and
/// parsing round-trip for every path. The empty path addresses the content root.
///
/// Paths are stable for the lifetime of one graph build. Reordering an array
/// in the source content changes the paths of its items.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SchemaPath(Vec<PathSegment>);

impl SchemaPath {
    /// Create new path from segments
    #[inline]
    #[must_use]
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }

    /// Empty path (content root)
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Path made of a single field
    #[inline]
    #[must_use]
    pub fn field(name: impl Into<String>) -> Self {
        Self(vec![PathSegment::Field(name.into())])
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Get number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if path is empty (root)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get parent path (if not root)
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Get last segment (if not root)
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&PathSegment> {
        self.0.last()
    }

    /// Index of the last segment when it addresses an array item
    #[inline]
    #[must_use]
    pub fn array_index(&self) -> Option<usize> {
        self.0.last().and_then(PathSegment::as_index)
    }

    /// Iterator over the field names of this path, root to leaf
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().filter_map(PathSegment::as_field)
    }

    /// Whether any field segment of this path is named `name`
    #[must_use]
    pub fn contains_field(&self, name: &str) -> bool {
        self.field_names().any(|f| f == name)
    }

    /// Append a field segment, returning new path
    #[inline]
    #[must_use]
    pub fn child_field(&self, name: impl Into<String>) -> Self {
        let mut new = self.clone();
        new.0.push(PathSegment::Field(name.into()));
        new
    }

    /// Append an index segment, returning new path
    #[inline]
    #[must_use]
    pub fn child_index(&self, index: usize) -> Self {
        let mut new = self.clone();
        new.0.push(PathSegment::Index(index));
        new
    }

    /// Check if this path is a prefix of another
    ///
    /// # Examples
    /// - `apis` is prefix of `apis[0].path`
    /// - `apis[0]` is NOT prefix of `apis[1]`
    #[inline]
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        if self.0.len() > other.0.len() {
            return false;
        }
        self.0 == other.0[..self.0.len()]
    }

    /// Check if this path is an ancestor of another (strict prefix)
    #[inline]
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        self.0.len() < other.0.len() && self.is_prefix_of(other)
    }

    /// Iterator over segments from root to leaf
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &PathSegment> {
        self.0.iter()
    }
}

impl Display for SchemaPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Field(name) if !is_plain(name) => write!(f, "[\"{}\"]", escape(name))?,
                PathSegment::Field(name) if i == 0 => write!(f, "{name}")?,
                PathSegment::Field(name) => write!(f, ".{name}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// Whether a field name can be written bare after a `.`
fn is_plain(name: &str) -> bool {
    !name.is_empty() && !name.contains(|c| matches!(c, '.' | '[' | ']' | '"' | '\\'))
}

fn escape(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        if matches!(c, '"' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Rest of a `["..."]` segment, after the opening quote
fn quoted_field(chars: &mut Peekable<Chars<'_>>, path: &str) -> Result<String, PathError> {
    let mut name = String::new();
    loop {
        match chars.next() {
            Some('\\') => match chars.next() {
                Some(c) => name.push(c),
                None => return Err(PathError::UnterminatedQuote(path.to_string())),
            },
            Some('"') => break,
            Some(c) => name.push(c),
            None => return Err(PathError::UnterminatedQuote(path.to_string())),
        }
    }
    match chars.next() {
        Some(']') => Ok(name),
        _ => Err(PathError::InvalidSegment(path.to_string())),
    }
}

impl FromStr for SchemaPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut segments = Vec::new();
        let mut current = String::new();
        // Set right after a '.', when a field name must follow
        let mut needs_name = false;
        let mut chars = s.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    if !current.is_empty() {
                        segments.push(PathSegment::Field(std::mem::take(&mut current)));
                    } else if needs_name || segments.is_empty() {
                        return Err(PathError::EmptySegment);
                    }
                    needs_name = true;
                }
                '[' => {
                    if !current.is_empty() {
                        segments.push(PathSegment::Field(std::mem::take(&mut current)));
                    } else if needs_name {
                        return Err(PathError::EmptySegment);
                    }
                    needs_name = false;

                    if chars.next_if_eq(&'"').is_some() {
                        segments.push(PathSegment::Field(quoted_field(&mut chars, s)?));
                        continue;
                    }
                    let mut digits = String::new();
                    loop {
                        match chars.next() {
                            Some(']') => break,
                            Some(d) => digits.push(d),
                            None => return Err(PathError::UnterminatedIndex(s.to_string())),
                        }
                    }
                    let index = digits
                        .parse::<usize>()
                        .map_err(|_| PathError::InvalidIndex(digits.clone()))?;
                    segments.push(PathSegment::Index(index));
                }
                ']' | '"' | '\\' => return Err(PathError::InvalidSegment(s.to_string())),
                c => {
                    // `a[0]b` has no separator after the bracket
                    if current.is_empty() && !needs_name && !segments.is_empty() {
                        return Err(PathError::InvalidSegment(s.to_string()));
                    }
                    current.push(c);
                    needs_name = false;
                }
            }
        }

        if !current.is_empty() {
            segments.push(PathSegment::Field(current));
        } else if needs_name {
            return Err(PathError::EmptySegment);
        }

        Ok(Self(segments))
    }
}

impl TryFrom<String> for SchemaPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SchemaPath> for String {
    fn from(path: SchemaPath) -> Self {
        path.to_string()
    }
}

impl From<Vec<PathSegment>> for SchemaPath {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }
}

/// Errors related to schema paths
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Empty field name between separators
    #[error("path contains empty segment")]
    EmptySegment,

    /// Stray bracket or missing separator
    #[error("invalid path: {0}")]
    InvalidSegment(String),

    /// `[` without a closing `]`
    #[error("unterminated index in path: {0}")]
    UnterminatedIndex(String),

    /// Quoted field name without a closing quote
    #[error("unterminated quoted field in path: {0}")]
    UnterminatedQuote(String),

    /// Index that is not a non-negative integer
    #[error("invalid index: [{0}] (must be a non-negative integer)")]
    InvalidIndex(String),
}
