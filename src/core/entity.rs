//! Purpose: Static field tables and a reflective read surface for typed entities.
//! Exports: `FieldDescriptor`, `EntityType`, `FieldValue`, `Record`, `RecordBase`, `Entity`.
//! Role: Replaces runtime property reflection with one declared table per entity type.
//! Invariants: `EntityType::fields` is in declared order; output ordering follows it.
//! Invariants: A field is writable unless declared read-only.
//! Invariants: Tables are `static` values built once, never recomputed per call.
use serde::de::DeserializeOwned;
use std::any::Any;
use time::PrimitiveDateTime;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub wire_name: &'static str,
    pub read_only: bool,
    pub collection: bool,
    pub key: bool,
}

impl FieldDescriptor {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            wire_name: name,
            read_only: false,
            collection: false,
            key: false,
        }
    }

    pub const fn wire(mut self, wire_name: &'static str) -> Self {
        self.wire_name = wire_name;
        self
    }

    pub const fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Marks a field holding an ordered sequence of nested entities.
    pub const fn collection(mut self) -> Self {
        self.collection = true;
        self
    }

    /// Marks the entity key member used to correlate tracked snapshots.
    pub const fn key(mut self) -> Self {
        self.key = true;
        self
    }

    pub const fn is_writable(&self) -> bool {
        !self.read_only
    }
}

#[derive(Debug)]
pub struct EntityType {
    pub name: &'static str,
    pub fields: &'static [FieldDescriptor],
}

impl EntityType {
    pub const fn new(name: &'static str, fields: &'static [FieldDescriptor]) -> Self {
        Self { name, fields }
    }

    pub fn field(&self, name: &str) -> Option<&'static FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn writable_fields(&self) -> impl Iterator<Item = &'static FieldDescriptor> + use<> {
        self.fields.iter().filter(|field| field.is_writable())
    }

    pub fn key_field(&self) -> Option<&'static FieldDescriptor> {
        self.fields.iter().find(|field| field.key)
    }
}

/// A field read through `Record::field`.
///
/// `DateTime` is a calendar timestamp, written with the legacy date codec.
/// `Nested` is a collection of child entities, diffed item by item.
#[derive(Clone)]
pub enum FieldValue<'a> {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(&'a str),
    Guid(Uuid),
    DateTime(PrimitiveDateTime),
    Nested(Vec<&'a dyn Record>),
}

impl<'a> FieldValue<'a> {
    pub fn nested<E: Record>(items: &'a [E]) -> Self {
        FieldValue::Nested(items.iter().map(|item| item as &dyn Record).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// The nil-uuid sentinel marks an unset identifier.
    pub fn is_empty_identifier(&self) -> bool {
        matches!(self, FieldValue::Guid(id) if id.is_nil())
    }

    /// Stable text used to correlate entities by key; `None` for unset keys.
    pub fn key_text(&self) -> Option<String> {
        match self {
            FieldValue::Text(text) if !text.is_empty() => Some((*text).to_string()),
            FieldValue::Int(value) => Some(value.to_string()),
            FieldValue::Guid(id) if !id.is_nil() => Some(id.hyphenated().to_string()),
            _ => None,
        }
    }
}

impl PartialEq for FieldValue<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::Null, FieldValue::Null) => true,
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
            (FieldValue::Int(a), FieldValue::Int(b)) => a == b,
            (FieldValue::Float(a), FieldValue::Float(b)) => a == b,
            (FieldValue::Text(a), FieldValue::Text(b)) => a == b,
            (FieldValue::Guid(a), FieldValue::Guid(b)) => a == b,
            (FieldValue::DateTime(a), FieldValue::DateTime(b)) => a == b,
            (FieldValue::Nested(a), FieldValue::Nested(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|(x, y)| {
                        std::ptr::addr_eq(*x as *const dyn Record, *y as *const dyn Record)
                    })
            }
            _ => false,
        }
    }
}

impl std::fmt::Debug for FieldValue<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Null => f.write_str("Null"),
            FieldValue::Bool(value) => f.debug_tuple("Bool").field(value).finish(),
            FieldValue::Int(value) => f.debug_tuple("Int").field(value).finish(),
            FieldValue::Float(value) => f.debug_tuple("Float").field(value).finish(),
            FieldValue::Text(value) => f.debug_tuple("Text").field(value).finish(),
            FieldValue::Guid(value) => f.debug_tuple("Guid").field(value).finish(),
            FieldValue::DateTime(value) => f.debug_tuple("DateTime").field(value).finish(),
            FieldValue::Nested(items) => {
                let names: Vec<_> = items.iter().map(|item| item.entity_type().name).collect();
                f.debug_tuple("Nested").field(&names).finish()
            }
        }
    }
}

impl From<bool> for FieldValue<'_> {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i32> for FieldValue<'_> {
    fn from(value: i32) -> Self {
        FieldValue::Int(i64::from(value))
    }
}

impl From<i64> for FieldValue<'_> {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<f64> for FieldValue<'_> {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl<'a> From<&'a str> for FieldValue<'a> {
    fn from(value: &'a str) -> Self {
        FieldValue::Text(value)
    }
}

impl<'a> From<&'a String> for FieldValue<'a> {
    fn from(value: &'a String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<Uuid> for FieldValue<'_> {
    fn from(value: Uuid) -> Self {
        FieldValue::Guid(value)
    }
}

impl From<PrimitiveDateTime> for FieldValue<'_> {
    fn from(value: PrimitiveDateTime) -> Self {
        FieldValue::DateTime(value)
    }
}

impl<'a, T: Into<FieldValue<'a>>> From<Option<T>> for FieldValue<'a> {
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Null, Into::into)
    }
}

impl<'a, E: Record> From<&'a [E]> for FieldValue<'a> {
    fn from(items: &'a [E]) -> Self {
        FieldValue::nested(items)
    }
}

impl<'a, E: Record> From<&'a Vec<E>> for FieldValue<'a> {
    fn from(items: &'a Vec<E>) -> Self {
        FieldValue::nested(items)
    }
}

/// Object-safe plumbing every `Record` gets for free from `Default + 'static`.
pub trait RecordBase {
    /// A default instance of the same concrete type.
    fn blank(&self) -> Box<dyn Record>;
    fn as_any(&self) -> &dyn Any;
}

impl<T: Record + Default> RecordBase for T {
    fn blank(&self) -> Box<dyn Record> {
        Box::new(T::default())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Reflective read access to a typed entity.
///
/// `field` must answer for every descriptor in `entity_type().fields`;
/// unknown names read as `FieldValue::Null`.
pub trait Record: RecordBase + 'static {
    fn entity_type(&self) -> &'static EntityType;

    fn field(&self, name: &str) -> FieldValue<'_>;

    fn key(&self) -> Option<String> {
        let key = self.entity_type().key_field()?;
        self.field(key.name).key_text()
    }
}

/// Types that can travel both ways: decoded with serde, written via `Record`.
pub trait Entity: Record + Default + DeserializeOwned {}

impl<T: Record + Default + DeserializeOwned> Entity for T {}
