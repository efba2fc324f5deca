//! Structural sharing for JSON-shaped data
//!
//! [`Shared`] is an immutable value tree whose every node lives behind an
//! `Arc`. [`replace_equal_deep`] compares a freshly computed value with the
//! previous one and hands back the previous allocation for every subtree
//! that did not change, so subscribers can short-circuit with
//! [`Shared::ptr_eq`] instead of comparing deeply.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};

/// Immutable, reference-counted JSON value
#[derive(Clone, PartialEq)]
pub struct Shared(Arc<Node>);

/// One node of a [`Shared`] tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Shared>),
    Object(BTreeMap<String, Shared>),
}

impl Shared {
    pub fn new(node: Node) -> Self {
        Self(Arc::new(node))
    }

    pub fn null() -> Self {
        Self::new(Node::Null)
    }

    /// An empty object
    pub fn empty_object() -> Self {
        Self::new(Node::Object(BTreeMap::new()))
    }

    pub fn node(&self) -> &Node {
        &self.0
    }

    /// True when both handles point at the same allocation
    pub fn ptr_eq(&self, other: &Shared) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn is_null(&self) -> bool {
        matches!(self.node(), Node::Null)
    }

    /// Looks up an object key
    pub fn get(&self, key: &str) -> Option<&Shared> {
        match self.node() {
            Node::Object(map) => map.get(key),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.node() {
            Node::String(s) => Some(s),
            _ => None,
        }
    }

    /// Converts back into an owned `serde_json::Value`
    pub fn to_value(&self) -> Value {
        match self.node() {
            Node::Null => Value::Null,
            Node::Bool(b) => Value::Bool(*b),
            Node::Number(n) => Value::Number(n.clone()),
            Node::String(s) => Value::String(s.clone()),
            Node::Array(items) => Value::Array(items.iter().map(Shared::to_value).collect()),
            Node::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect::<Map<_, _>>(),
            ),
        }
    }
}

impl From<Value> for Shared {
    fn from(value: Value) -> Self {
        let node = match value {
            Value::Null => Node::Null,
            Value::Bool(b) => Node::Bool(b),
            Value::Number(n) => Node::Number(n),
            Value::String(s) => Node::String(s),
            Value::Array(items) => Node::Array(items.into_iter().map(Shared::from).collect()),
            Value::Object(map) => Node::Object(map.into_iter().map(|(k, v)| (k, Shared::from(v))).collect()),
        };
        Shared::new(node)
    }
}

impl Default for Shared {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

impl Serialize for Shared {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Shared {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Shared::from)
    }
}

/// Returns `prev` wherever `next` is deep-equal to it
///
/// When only part of the tree changed, the result is a new container that
/// reuses every unchanged child of `prev`.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use waypoint_router::sharing::{replace_equal_deep, Shared};
///
/// let prev = Shared::from(json!({"a": {"x": 1}, "b": [1, 2]}));
/// let next = Shared::from(json!({"a": {"x": 1}, "b": [1, 3]}));
///
/// let shared = replace_equal_deep(&prev, next);
/// assert!(!shared.ptr_eq(&prev));
/// assert!(shared.get("a").unwrap().ptr_eq(prev.get("a").unwrap()));
/// ```
pub fn replace_equal_deep(prev: &Shared, next: Shared) -> Shared {
    if prev.ptr_eq(&next) {
        return next;
    }

    match (prev.node(), next.node()) {
        (Node::Object(old), Node::Object(new)) => {
            let mut unchanged = old.len() == new.len();
            let merged: BTreeMap<String, Shared> = new
                .iter()
                .map(|(key, value)| {
                    let shared = match old.get(key) {
                        Some(previous) => {
                            let shared = replace_equal_deep(previous, value.clone());
                            unchanged &= shared.ptr_eq(previous);
                            shared
                        }
                        None => {
                            unchanged = false;
                            value.clone()
                        }
                    };
                    (key.clone(), shared)
                })
                .collect();

            if unchanged {
                prev.clone()
            } else {
                Shared::new(Node::Object(merged))
            }
        }
        (Node::Array(old), Node::Array(new)) => {
            let mut unchanged = old.len() == new.len();
            let merged: Vec<Shared> = new
                .iter()
                .enumerate()
                .map(|(i, value)| match old.get(i) {
                    Some(previous) => {
                        let shared = replace_equal_deep(previous, value.clone());
                        unchanged &= shared.ptr_eq(previous);
                        shared
                    }
                    None => {
                        unchanged = false;
                        value.clone()
                    }
                })
                .collect();

            if unchanged {
                prev.clone()
            } else {
                Shared::new(Node::Array(merged))
            }
        }
        (old, new) if old == new => prev.clone(),
        _ => next,
    }
}

/// Reuses `prev` when `next` compares equal
pub fn share_arc<T: PartialEq>(prev: &Arc<T>, next: T) -> Arc<T> {
    if **prev == next {
        Arc::clone(prev)
    } else {
        Arc::new(next)
    }
}
