//! Structured artifact content
//!
//! Artifact content is an arbitrary nesting of maps, sequences and scalars.
//! [`ContentTree`] stores it as an arena of [`ContentNode`]s addressed by
//! [`ValueId`]. Children are referenced by id, so shared sub-values and
//! self-referential structures can be expressed; consumers that walk the tree
//! track visited ids to terminate.

use indexmap::IndexMap;
use serde_json::{Number, Value};
use std::borrow::Cow;

/// Address of a value inside one [`ContentTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValueId(usize);

impl ValueId {
    /// Raw arena index
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Leaf value
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// JSON null
    Null,
    /// Boolean
    Bool(bool),
    /// Number, kept in its JSON representation
    Number(Number),
    /// String
    String(String),
}

impl Scalar {
    /// Text rendering of the value
    #[must_use]
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            Self::Null => Cow::Borrowed("null"),
            Self::Bool(b) => Cow::Owned(b.to_string()),
            Self::Number(n) => Cow::Owned(n.to_string()),
            Self::String(s) => Cow::Borrowed(s),
        }
    }

    /// Whether the value carries text worth comparing (non-empty string or number)
    #[must_use]
    pub fn is_textual(&self) -> bool {
        match self {
            Self::String(s) => !s.trim().is_empty(),
            Self::Number(_) => true,
            Self::Null | Self::Bool(_) => false,
        }
    }

    /// Convert back to JSON
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => Value::Number(n.clone()),
            Self::String(s) => Value::String(s.clone()),
        }
    }
}

/// One value in the arena
#[derive(Debug, Clone, PartialEq)]
pub enum ContentNode {
    /// Leaf
    Scalar(Scalar),
    /// Map, keys in source order
    Object(IndexMap<String, ValueId>),
    /// Ordered sequence
    Array(Vec<ValueId>),
}

impl ContentNode {
    /// Whether this value has children
    #[inline]
    #[must_use]
    pub fn is_composite(&self) -> bool {
        !matches!(self, Self::Scalar(_))
    }
}

/// Arena holding one artifact's content
#[derive(Debug, Clone, PartialEq)]
pub struct ContentTree {
    nodes: Vec<ContentNode>,
    root: ValueId,
}

impl ContentTree {
    /// Tree holding a single value
    #[must_use]
    pub fn with_root(node: ContentNode) -> Self {
        Self {
            nodes: vec![node],
            root: ValueId(0),
        }
    }

    /// Build a tree from a JSON value
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            root: ValueId(0),
        };
        tree.root = tree.insert_json(value);
        tree
    }

    fn insert_json(&mut self, value: &Value) -> ValueId {
        match value {
            Value::Null => self.insert(ContentNode::Scalar(Scalar::Null)),
            Value::Bool(b) => self.insert(ContentNode::Scalar(Scalar::Bool(*b))),
            Value::Number(n) => self.insert(ContentNode::Scalar(Scalar::Number(n.clone()))),
            Value::String(s) => self.insert(ContentNode::Scalar(Scalar::String(s.clone()))),
            Value::Array(items) => {
                let ids = items.iter().map(|item| self.insert_json(item)).collect();
                self.insert(ContentNode::Array(ids))
            }
            Value::Object(map) => {
                let fields = map
                    .iter()
                    .map(|(key, item)| (key.clone(), self.insert_json(item)))
                    .collect();
                self.insert(ContentNode::Object(fields))
            }
        }
    }

    /// Root value
    #[inline]
    #[must_use]
    pub fn root(&self) -> ValueId {
        self.root
    }

    /// Look up a value
    #[inline]
    #[must_use]
    pub fn get(&self, id: ValueId) -> Option<&ContentNode> {
        self.nodes.get(id.0)
    }

    /// Number of values in the arena
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena holds no values at all
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a detached value, returning its id
    pub fn insert(&mut self, node: ContentNode) -> ValueId {
        self.nodes.push(node);
        ValueId(self.nodes.len() - 1)
    }

    /// Child of an object by key
    #[must_use]
    pub fn field(&self, object: ValueId, key: &str) -> Option<ValueId> {
        match self.get(object)? {
            ContentNode::Object(fields) => fields.get(key).copied(),
            _ => None,
        }
    }

    /// Point `key` of `object` at an existing value
    ///
    /// `value` may be an ancestor of `object`, which makes the content cyclic.
    ///
    /// # Errors
    /// Returns error if either id is unknown or `object` is not a map
    pub fn set_field(
        &mut self,
        object: ValueId,
        key: impl Into<String>,
        value: ValueId,
    ) -> Result<(), ContentError> {
        self.check(value)?;
        match self.nodes.get_mut(object.0) {
            Some(ContentNode::Object(fields)) => {
                fields.insert(key.into(), value);
                Ok(())
            }
            Some(_) => Err(ContentError::NotAnObject(object.0)),
            None => Err(ContentError::UnknownValue(object.0)),
        }
    }

    /// Append an existing value to `array`
    ///
    /// # Errors
    /// Returns error if either id is unknown or `array` is not a sequence
    pub fn push_item(&mut self, array: ValueId, value: ValueId) -> Result<(), ContentError> {
        self.check(value)?;
        match self.nodes.get_mut(array.0) {
            Some(ContentNode::Array(items)) => {
                items.push(value);
                Ok(())
            }
            Some(_) => Err(ContentError::NotAnArray(array.0)),
            None => Err(ContentError::UnknownValue(array.0)),
        }
    }

    fn check(&self, id: ValueId) -> Result<(), ContentError> {
        if id.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(ContentError::UnknownValue(id.0))
        }
    }
}

impl From<Value> for ContentTree {
    fn from(value: Value) -> Self {
        Self::from_json(&value)
    }
}

impl From<&Value> for ContentTree {
    fn from(value: &Value) -> Self {
        Self::from_json(value)
    }
}

/// Errors while editing a [`ContentTree`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentError {
    /// Id does not belong to this tree
    #[error("unknown value id: {0}")]
    UnknownValue(usize),

    /// Field insertion into a non-map value
    #[error("value {0} is not an object")]
    NotAnObject(usize),

    /// Item insertion into a non-sequence value
    #[error("value {0} is not an array")]
    NotAnArray(usize),
}
