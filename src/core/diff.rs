//! Purpose: Write typed entities as JSON objects, in full or diff mode.
//! Exports: `DateStyle`, `DiffContext`, `write_record`, `changed_fields`.
//! Role: Field-level writer behind `encode` / `encode_diff`.
//! Invariants: Read-only fields and nil-uuid identifiers are never written.
//! Invariants: Members appear in declared field order; omitted fields produce no key.
//! Invariants: Nested items get a fresh context whose original is that item's own snapshot.
use crate::core::entity::{FieldDescriptor, FieldValue, Record};
use crate::core::legacy_date;
use crate::core::tracking::{NestedLookup, NoTracking};
use serde_json::{Map, Number, Value};
use tracing::trace;

static NO_TRACKING: NoTracking = NoTracking;

/// How calendar timestamps are written.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum DateStyle {
    /// `yyyy-MM-ddTHH:mm`, the form the remote API accepts on writes.
    #[default]
    EdmMinutes,
    /// `/Date(<ms>)/`.
    Legacy,
}

impl DateStyle {
    fn encode(self, value: time::PrimitiveDateTime) -> String {
        match self {
            DateStyle::EdmMinutes => legacy_date::encode_edm_minutes(value),
            DateStyle::Legacy => legacy_date::encode_legacy(value),
        }
    }
}

#[derive(Clone, Copy)]
pub struct DiffContext<'a> {
    original: Option<&'a dyn Record>,
    lookup: &'a dyn NestedLookup,
    date_style: DateStyle,
}

impl DiffContext<'static> {
    pub fn full() -> Self {
        Self {
            original: None,
            lookup: &NO_TRACKING,
            date_style: DateStyle::default(),
        }
    }
}

impl<'a> DiffContext<'a> {
    pub fn diff(original: &'a dyn Record, lookup: &'a dyn NestedLookup) -> Self {
        Self {
            original: Some(original),
            lookup,
            date_style: DateStyle::default(),
        }
    }

    pub fn with_date_style(mut self, date_style: DateStyle) -> Self {
        self.date_style = date_style;
        self
    }

    pub fn is_diff(&self) -> bool {
        self.original.is_some()
    }

    pub fn date_style(&self) -> DateStyle {
        self.date_style
    }

    fn for_item<'b>(&self, original: &'b dyn Record) -> DiffContext<'b>
    where
        'a: 'b,
    {
        DiffContext {
            original: Some(original),
            lookup: self.lookup,
            date_style: self.date_style,
        }
    }
}

/// Writes `record` under `ctx`.
///
/// `None` means the type has no eligible field at all (every field read-only
/// or an unset identifier); callers treat that as "nothing to write". In diff
/// mode an unchanged record yields an empty map.
pub fn write_record(record: &dyn Record, ctx: &DiffContext<'_>) -> Option<Map<String, Value>> {
    let entity_type = record.entity_type();
    let mut out = Map::new();
    let mut eligible = 0usize;

    for field in entity_type.writable_fields() {
        let current = record.field(field.name);
        if current.is_empty_identifier() {
            trace!(entity = entity_type.name, field = field.name, "skipping unset identifier");
            continue;
        }
        if field.collection && current.is_null() {
            // A cleared collection is written as null only when the snapshot had items.
            if let Some(original) = ctx.original {
                if has_items(&original.field(field.name)) {
                    eligible += 1;
                    out.insert(field.wire_name.to_string(), Value::Null);
                }
            }
            continue;
        }
        eligible += 1;

        if let Some(original) = ctx.original {
            if !is_updated_field(field, &current, original, ctx.lookup) {
                continue;
            }
        }

        match write_value(current, ctx) {
            Some(value) => {
                out.insert(field.wire_name.to_string(), value);
            }
            None => {
                trace!(
                    entity = entity_type.name,
                    field = field.name,
                    "nested collection produced no items; omitted"
                );
            }
        }
    }

    if eligible == 0 {
        return None;
    }
    Some(out)
}

/// Writable, non-collection fields whose values differ between the two records.
pub fn changed_fields(original: &dyn Record, current: &dyn Record) -> Vec<&'static str> {
    current
        .entity_type()
        .writable_fields()
        .filter(|field| !field.collection)
        .filter(|field| {
            let value = current.field(field.name);
            !matches!(value, FieldValue::Nested(_)) && value != original.field(field.name)
        })
        .map(|field| field.name)
        .collect()
}

fn has_items(value: &FieldValue<'_>) -> bool {
    matches!(value, FieldValue::Nested(items) if !items.is_empty())
}

fn is_updated_field(
    field: &FieldDescriptor,
    current: &FieldValue<'_>,
    original: &dyn Record,
    lookup: &dyn NestedLookup,
) -> bool {
    match current {
        FieldValue::Nested(items) => items.iter().any(|&item| match lookup.controller(item) {
            Some(controller) => controller.is_updated(item, lookup),
            None => true,
        }),
        _ => *current != original.field(field.name),
    }
}

fn write_value(value: FieldValue<'_>, ctx: &DiffContext<'_>) -> Option<Value> {
    let value = match value {
        FieldValue::Null => Value::Null,
        FieldValue::Bool(flag) => Value::Bool(flag),
        FieldValue::Int(number) => Value::from(number),
        FieldValue::Float(number) => Number::from_f64(number).map_or(Value::Null, Value::Number),
        FieldValue::Text(text) => Value::String(text.to_string()),
        FieldValue::Guid(id) => Value::String(id.hyphenated().to_string()),
        FieldValue::DateTime(timestamp) => Value::String(ctx.date_style.encode(timestamp)),
        FieldValue::Nested(items) => return write_nested(&items, ctx),
    };
    Some(value)
}

fn write_nested(items: &[&dyn Record], ctx: &DiffContext<'_>) -> Option<Value> {
    let mut written = Vec::with_capacity(items.len());
    for &item in items {
        let blank: Box<dyn Record>;
        let item_ctx = if ctx.is_diff() {
            match ctx.lookup.controller(item) {
                Some(controller) => ctx.for_item(controller.original()),
                None => {
                    blank = item.blank();
                    ctx.for_item(blank.as_ref())
                }
            }
        } else {
            *ctx
        };
        match write_record(item, &item_ctx) {
            Some(map) if !map.is_empty() => written.push(Value::Object(map)),
            _ => {}
        }
    }
    if written.is_empty() {
        return None;
    }
    Some(Value::Array(written))
}

#[cfg(test)]
mod tests {
    use super::{DateStyle, DiffContext, changed_fields, write_record};
    use crate::core::entity::{EntityType, FieldDescriptor, FieldValue, Record};
    use crate::core::tracking::NoTracking;
    use serde_json::{Value, json};
    use time::PrimitiveDateTime;
    use time::macros::datetime;
    use uuid::Uuid;

    static NOTE: EntityType = EntityType::new(
        "Note",
        &[
            FieldDescriptor::new("ID").key(),
            FieldDescriptor::new("Text"),
            FieldDescriptor::new("Due"),
            FieldDescriptor::new("Created").read_only(),
        ],
    );

    #[derive(Clone, Default)]
    struct Note {
        id: Uuid,
        text: Option<String>,
        due: Option<PrimitiveDateTime>,
        created: Option<PrimitiveDateTime>,
    }

    impl Record for Note {
        fn entity_type(&self) -> &'static EntityType {
            &NOTE
        }

        fn field(&self, name: &str) -> FieldValue<'_> {
            match name {
                "ID" => self.id.into(),
                "Text" => self.text.as_deref().into(),
                "Due" => self.due.into(),
                "Created" => self.created.into(),
                _ => FieldValue::Null,
            }
        }
    }

    fn to_value(map: Option<serde_json::Map<String, Value>>) -> Value {
        Value::Object(map.expect("written"))
    }

    #[test]
    fn full_mode_skips_read_only_and_nil_ids() {
        let note = Note {
            id: Uuid::nil(),
            text: Some("hi".to_string()),
            due: Some(datetime!(2024-05-06 07:08:09)),
            created: Some(datetime!(2024-01-01 00:00)),
        };
        let written = to_value(write_record(&note, &DiffContext::full()));
        assert_eq!(written, json!({"Text": "hi", "Due": "2024-05-06T07:08"}));
    }

    #[test]
    fn legacy_date_style_writes_tokens() {
        let note = Note {
            due: Some(datetime!(1970-01-01 00:00:01)),
            ..Note::default()
        };
        let ctx = DiffContext::full().with_date_style(DateStyle::Legacy);
        let written = to_value(write_record(&note, &ctx));
        assert_eq!(written["Due"], json!("/Date(1000)/"));
    }

    #[test]
    fn diff_mode_writes_only_changes() {
        let id = Uuid::from_u128(9);
        let original = Note {
            id,
            text: Some("a".to_string()),
            ..Note::default()
        };
        let mut current = original.clone();
        current.due = Some(datetime!(2024-02-03 04:05));

        let ctx = DiffContext::diff(&original, &NoTracking);
        let written = to_value(write_record(&current, &ctx));
        assert_eq!(written, json!({"Due": "2024-02-03T04:05"}));
        assert_eq!(changed_fields(&original, &current), ["Due"]);
    }

    #[test]
    fn null_to_value_and_back_is_a_change() {
        let original = Note {
            text: Some("a".to_string()),
            ..Note::default()
        };
        let current = Note::default();
        let ctx = DiffContext::diff(&original, &NoTracking);
        assert_eq!(to_value(write_record(&current, &ctx)), json!({"Text": null}));
    }

    #[test]
    fn unchanged_record_writes_empty_object() {
        let note = Note {
            text: Some("same".to_string()),
            ..Note::default()
        };
        let ctx = DiffContext::diff(&note, &NoTracking);
        assert_eq!(to_value(write_record(&note, &ctx)), json!({}));
    }

    static STAMP: EntityType = EntityType::new(
        "Stamp",
        &[
            FieldDescriptor::new("ID"),
            FieldDescriptor::new("Created").read_only(),
        ],
    );

    #[derive(Default)]
    struct Stamp;

    impl Record for Stamp {
        fn entity_type(&self) -> &'static EntityType {
            &STAMP
        }

        fn field(&self, name: &str) -> FieldValue<'_> {
            match name {
                "ID" => Uuid::nil().into(),
                _ => FieldValue::Null,
            }
        }
    }

    #[test]
    fn no_eligible_fields_writes_nothing() {
        assert!(write_record(&Stamp, &DiffContext::full()).is_none());
    }
}
