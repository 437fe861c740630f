//! Purpose: Shared, in-place mutable JSON tree used behind dynamic views.
//! Exports: `Node`, `NodeRef`, `NodeKind`.
//! Role: Backing store for `DynamicJsonView`; converts to and from `serde_json::Value`.
//! Invariants: Object members keep insertion order.
//! Invariants: Children are `Rc` handles, so a child reached from two views is one node.
use indexmap::IndexMap;
use serde_json::{Map, Number, Value};
use std::cell::RefCell;
use std::rc::Rc;

pub type NodeRef = Rc<RefCell<Node>>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NodeKind {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

#[derive(Debug, PartialEq)]
pub enum Node {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<NodeRef>),
    Object(IndexMap<String, NodeRef>),
}

impl Node {
    pub fn into_ref(self) -> NodeRef {
        Rc::new(RefCell::new(self))
    }

    pub fn empty_object() -> Self {
        Node::Object(IndexMap::new())
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Null => NodeKind::Null,
            Node::Bool(_) => NodeKind::Bool,
            Node::Number(_) => NodeKind::Number,
            Node::String(_) => NodeKind::String,
            Node::Array(_) => NodeKind::Array,
            Node::Object(_) => NodeKind::Object,
        }
    }

    pub fn from_value(value: Value) -> NodeRef {
        let node = match value {
            Value::Null => Node::Null,
            Value::Bool(flag) => Node::Bool(flag),
            Value::Number(number) => Node::Number(number),
            Value::String(text) => Node::String(text),
            Value::Array(items) => Node::Array(items.into_iter().map(Node::from_value).collect()),
            Value::Object(map) => Node::Object(
                map.into_iter()
                    .map(|(key, value)| (key, Node::from_value(value)))
                    .collect(),
            ),
        };
        node.into_ref()
    }

    /// Deep snapshot; later writes to the tree do not affect the returned value.
    pub fn to_value(&self) -> Value {
        match self {
            Node::Null => Value::Null,
            Node::Bool(flag) => Value::Bool(*flag),
            Node::Number(number) => Value::Number(number.clone()),
            Node::String(text) => Value::String(text.clone()),
            Node::Array(items) => Value::Array(items.iter().map(|item| item.borrow().to_value()).collect()),
            Node::Object(members) => {
                let mut map = Map::with_capacity(members.len());
                for (key, value) in members {
                    map.insert(key.clone(), value.borrow().to_value());
                }
                Value::Object(map)
            }
        }
    }
}

/// True when `needle` is `haystack` or is reachable from it.
pub(crate) fn reaches(haystack: &NodeRef, needle: &NodeRef) -> bool {
    if Rc::ptr_eq(haystack, needle) {
        return true;
    }
    match &*haystack.borrow() {
        Node::Array(items) => items.iter().any(|item| reaches(item, needle)),
        Node::Object(members) => members.values().any(|value| reaches(value, needle)),
        _ => false,
    }
}
