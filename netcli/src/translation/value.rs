//! Tree-shaped values produced by readers and consumed by writers.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::Keys;

/// A scalar value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Leaf {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Str(String),
}

impl fmt::Display for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leaf::Bool(v) => write!(f, "{}", v),
            Leaf::Int(v) => write!(f, "{}", v),
            Leaf::UInt(v) => write!(f, "{}", v),
            Leaf::Str(v) => f.write_str(v),
        }
    }
}

/// A node of the device document.
///
/// Serializes as plain JSON: objects, arrays and scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeValue {
    Leaf(Leaf),
    List(Vec<TreeValue>),
    Object(IndexMap<String, TreeValue>),
}

impl Default for TreeValue {
    fn default() -> Self {
        TreeValue::empty()
    }
}

impl TreeValue {
    /// An object without children.
    pub fn empty() -> Self {
        TreeValue::Object(IndexMap::new())
    }

    /// Empty objects and lists carry no data; leaves always do.
    pub fn is_empty(&self) -> bool {
        match self {
            TreeValue::Object(map) => map.is_empty(),
            TreeValue::List(items) => items.is_empty(),
            TreeValue::Leaf(_) => false,
        }
    }

    /// Builder-style insert; turns a non-object into an object.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<TreeValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<TreeValue>) {
        if !matches!(self, TreeValue::Object(_)) {
            *self = TreeValue::empty();
        }
        if let TreeValue::Object(map) = self {
            map.insert(key.into(), value.into());
        }
    }

    pub fn get(&self, key: &str) -> Option<&TreeValue> {
        match self {
            TreeValue::Object(map) => map.get(key),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, TreeValue>> {
        match self {
            TreeValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[TreeValue]> {
        match self {
            TreeValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&Leaf> {
        match self {
            TreeValue::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TreeValue::Leaf(Leaf::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// Wrap this value as the only child `name` of a new object.
    pub fn wrap(self, name: impl Into<String>) -> TreeValue {
        TreeValue::empty().with(name, self)
    }

    /// Object holding one string leaf per key.
    pub fn from_keys(keys: &Keys) -> TreeValue {
        keys.iter()
            .fold(TreeValue::empty(), |value, (k, v)| value.with(k, v))
    }

    /// Merge `other` into `self`.
    ///
    /// Objects take the union of their keys, merging shared keys recursively;
    /// lists are concatenated. Anything else is replaced by `other`, unless
    /// `other` is empty.
    pub fn merge(&mut self, other: TreeValue) {
        if other.is_empty() {
            return;
        }
        match (self, other) {
            (TreeValue::Object(mine), TreeValue::Object(theirs)) => {
                for (key, value) in theirs {
                    match mine.get_mut(&key) {
                        Some(existing) => existing.merge(value),
                        None => {
                            mine.insert(key, value);
                        }
                    }
                }
            }
            (TreeValue::List(mine), TreeValue::List(theirs)) => mine.extend(theirs),
            (mine, other) => *mine = other,
        }
    }
}

impl From<Leaf> for TreeValue {
    fn from(leaf: Leaf) -> Self {
        TreeValue::Leaf(leaf)
    }
}

impl From<&str> for TreeValue {
    fn from(v: &str) -> Self {
        TreeValue::Leaf(Leaf::Str(v.to_string()))
    }
}

impl From<String> for TreeValue {
    fn from(v: String) -> Self {
        TreeValue::Leaf(Leaf::Str(v))
    }
}

impl From<bool> for TreeValue {
    fn from(v: bool) -> Self {
        TreeValue::Leaf(Leaf::Bool(v))
    }
}

impl From<i64> for TreeValue {
    fn from(v: i64) -> Self {
        TreeValue::Leaf(Leaf::Int(v))
    }
}

impl From<u64> for TreeValue {
    fn from(v: u64) -> Self {
        TreeValue::Leaf(Leaf::UInt(v))
    }
}

impl From<u32> for TreeValue {
    fn from(v: u32) -> Self {
        TreeValue::Leaf(Leaf::UInt(v.into()))
    }
}

impl From<Vec<TreeValue>> for TreeValue {
    fn from(items: Vec<TreeValue>) -> Self {
        TreeValue::List(items)
    }
}
