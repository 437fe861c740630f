//! Purpose: Schema-free, mutable view over a parsed JSON tree.
//! Exports: `DynamicJsonView`, `DynValue`, `DynInput`, `Key`.
//! Role: Untyped access path for responses that have no entity type.
//! Invariants: Views are handles; clones and child views alias the same nodes.
//! Invariants: Reads never fail; missing members and out-of-range indices read as `Null`.
//! Invariants: Timestamps written through a view are stored as legacy date tokens.
use crate::core::legacy_date;
use crate::core::tree::{Node, NodeKind, NodeRef, reaches};
use serde_json::Value;
use std::fmt;
use std::rc::Rc;
use time::PrimitiveDateTime;
use tracing::trace;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Key {
    Name(String),
    Index(usize),
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

/// A read result.
///
/// Coercion is best-effort and lossy: integers that fit `i64` become
/// `Integer`, every other number becomes `Float`, and strings holding a
/// legacy date token are replaced by their ISO-8601 rendering. Exact decimal
/// text is not preserved.
#[derive(Clone, Debug)]
pub enum DynValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    View(DynamicJsonView),
}

impl DynValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DynValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DynValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DynValue::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DynValue::Integer(value) => Some(*value),
            DynValue::Float(value) if value.fract() == 0.0 && value.abs() < 9.0e15 => {
                Some(*value as i64)
            }
            DynValue::Text(text) => text.parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DynValue::Integer(value) => Some(*value as f64),
            DynValue::Float(value) => Some(*value),
            DynValue::Text(text) => text.parse().ok(),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<PrimitiveDateTime> {
        match self {
            DynValue::Text(text) => legacy_date::parse(text),
            _ => None,
        }
    }

    pub fn as_view(&self) -> Option<&DynamicJsonView> {
        match self {
            DynValue::View(view) => Some(view),
            _ => None,
        }
    }

    pub fn into_view(self) -> Option<DynamicJsonView> {
        match self {
            DynValue::View(view) => Some(view),
            _ => None,
        }
    }
}

/// Culture-invariant text form; views render as compact JSON.
impl fmt::Display for DynValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DynValue::Null => f.write_str("null"),
            DynValue::Bool(flag) => write!(f, "{flag}"),
            DynValue::Integer(value) => write!(f, "{value}"),
            DynValue::Float(value) => write!(f, "{value}"),
            DynValue::Text(text) => f.write_str(text),
            DynValue::View(view) => f.write_str(&view.to_text(false)),
        }
    }
}

/// A value accepted by `DynamicJsonView::set`.
#[derive(Debug)]
pub enum DynInput {
    Null,
    View(DynamicJsonView),
    Node(NodeRef),
    Value(Value),
    DateTime(PrimitiveDateTime),
}

impl DynInput {
    fn into_node(self) -> NodeRef {
        match self {
            DynInput::Null => Node::Null.into_ref(),
            DynInput::View(view) => view.node,
            DynInput::Node(node) => node,
            DynInput::Value(value) => Node::from_value(value),
            DynInput::DateTime(value) => {
                Node::String(legacy_date::encode_legacy(value)).into_ref()
            }
        }
    }
}

impl From<()> for DynInput {
    fn from(_: ()) -> Self {
        DynInput::Null
    }
}

impl<T: Into<DynInput>> From<Option<T>> for DynInput {
    fn from(value: Option<T>) -> Self {
        value.map_or(DynInput::Null, Into::into)
    }
}

impl From<DynamicJsonView> for DynInput {
    fn from(view: DynamicJsonView) -> Self {
        DynInput::View(view)
    }
}

impl From<&DynamicJsonView> for DynInput {
    fn from(view: &DynamicJsonView) -> Self {
        DynInput::View(view.clone())
    }
}

impl From<NodeRef> for DynInput {
    fn from(node: NodeRef) -> Self {
        DynInput::Node(node)
    }
}

impl From<Value> for DynInput {
    fn from(value: Value) -> Self {
        DynInput::Value(value)
    }
}

impl From<PrimitiveDateTime> for DynInput {
    fn from(value: PrimitiveDateTime) -> Self {
        DynInput::DateTime(value)
    }
}

macro_rules! dyn_input_from_primitive {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for DynInput {
                fn from(value: $ty) -> Self {
                    DynInput::Value(Value::from(value))
                }
            }
        )*
    };
}

dyn_input_from_primitive!(bool, i32, i64, u32, u64, f64, &str, String);

#[derive(Clone)]
pub struct DynamicJsonView {
    node: NodeRef,
}

impl DynamicJsonView {
    pub fn new(node: NodeRef) -> Self {
        Self { node }
    }

    pub fn from_value(value: Value) -> Self {
        Self::new(Node::from_value(value))
    }

    pub fn node(&self) -> &NodeRef {
        &self.node
    }

    pub fn kind(&self) -> NodeKind {
        self.node.borrow().kind()
    }

    /// True when both views wrap the same underlying node.
    pub fn same_node(&self, other: &DynamicJsonView) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }

    pub fn get(&self, key: impl Into<Key>) -> DynValue {
        let child = match (&*self.node.borrow(), key.into()) {
            (Node::Object(members), Key::Name(name)) => members.get(&name).cloned(),
            (Node::Array(items), Key::Index(index)) => items.get(index).cloned(),
            _ => None,
        };
        child.map_or(DynValue::Null, |child| wrap(&child))
    }

    /// Follows a path of names and indices; any miss reads as `Null`.
    pub fn get_path<K: Into<Key>>(&self, path: impl IntoIterator<Item = K>) -> DynValue {
        let mut current = DynValue::View(self.clone());
        for key in path {
            current = match current {
                DynValue::View(view) => view.get(key),
                _ => return DynValue::Null,
            };
        }
        current
    }

    /// Coerces the view's own node, as if it were a leaf.
    pub fn primitive(&self) -> DynValue {
        coerce(&self.node.borrow()).unwrap_or(DynValue::Null)
    }

    /// Writes a member or element.
    ///
    /// A name on a non-object view replaces the node with an empty object in
    /// place first. An index on an array pads with nulls up to the index.
    /// Returns `false`, without mutating, for an index on a non-array or for a
    /// value whose tree already contains this view's node.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<DynInput>) -> bool {
        let key = key.into();
        let value = value.into().into_node();
        if reaches(&value, &self.node) {
            trace!("refusing write that would make the tree cyclic");
            return false;
        }

        let mut node = self.node.borrow_mut();
        match key {
            Key::Name(name) => {
                if !matches!(&*node, Node::Object(_)) {
                    *node = Node::empty_object();
                }
                if let Node::Object(members) = &mut *node {
                    members.insert(name, value);
                }
                true
            }
            Key::Index(index) => match &mut *node {
                Node::Array(items) => {
                    while items.len() <= index {
                        items.push(Node::Null.into_ref());
                    }
                    items[index] = value;
                    true
                }
                _ => false,
            },
        }
    }

    /// Removes a member by name; returns whether it existed.
    pub fn remove(&self, name: &str) -> bool {
        match &mut *self.node.borrow_mut() {
            Node::Object(members) => members.shift_remove(name).is_some(),
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        match &*self.node.borrow() {
            Node::Array(items) => items.len(),
            Node::Object(members) => members.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<String> {
        match &*self.node.borrow() {
            Node::Object(members) => members.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Arrays yield `(None, value)`, objects `(Some(key), value)`, other kinds nothing.
    pub fn iter(&self) -> std::vec::IntoIter<(Option<String>, DynValue)> {
        let entries: Vec<_> = match &*self.node.borrow() {
            Node::Array(items) => items.iter().map(|item| (None, wrap(item))).collect(),
            Node::Object(members) => members
                .iter()
                .map(|(key, value)| (Some(key.clone()), wrap(value)))
                .collect(),
            _ => Vec::new(),
        };
        entries.into_iter()
    }

    pub fn to_value(&self) -> Value {
        self.node.borrow().to_value()
    }

    pub fn to_text(&self, indented: bool) -> String {
        let value = self.to_value();
        let encoded = if indented {
            serde_json::to_string_pretty(&value)
        } else {
            serde_json::to_string(&value)
        };
        encoded.unwrap_or_else(|_| "null".to_string())
    }
}

impl fmt::Display for DynamicJsonView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text(false))
    }
}

impl fmt::Debug for DynamicJsonView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DynamicJsonView")
            .field(&self.to_text(false))
            .finish()
    }
}

fn wrap(node: &NodeRef) -> DynValue {
    match coerce(&node.borrow()) {
        Some(value) => value,
        None => DynValue::View(DynamicJsonView::new(node.clone())),
    }
}

// `None` for containers.
fn coerce(node: &Node) -> Option<DynValue> {
    let value = match node {
        Node::Null => DynValue::Null,
        Node::Bool(flag) => DynValue::Bool(*flag),
        Node::Number(number) => match number.as_i64() {
            Some(value) => DynValue::Integer(value),
            None => DynValue::Float(number.as_f64().unwrap_or(f64::NAN)),
        },
        Node::String(text) => match legacy_date::parse_legacy(text) {
            Some(value) => DynValue::Text(legacy_date::encode_iso(value)),
            None => DynValue::Text(text.clone()),
        },
        Node::Array(_) | Node::Object(_) => return None,
    };
    Some(value)
}
