//! Purpose: Typed and dynamic conversions between envelope-free JSON text and entities.
//! Exports: `EncodeOptions`, `decode`, `decode_list`, `encode`, `encode_with`,
//! Exports: `encode_diff`, `encode_diff_with`, `wrap_dynamic`, `wrap_dynamic_list`, `dynamic_to_json`.
//! Role: Second stage after `core::envelope`; first stage before the transport on writes.
//! Invariants: `None` from an encode call means "nothing to write", never an error.
//! Invariants: Input text must already be envelope-free.
use crate::core::diff::{DateStyle, DiffContext, write_record};
use crate::core::dynamic::DynamicJsonView;
use crate::core::entity::Record;
use crate::core::error::{Error, ErrorKind};
use crate::core::tracking::NestedLookup;
use crate::json::parse;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct EncodeOptions {
    pub date_style: DateStyle,
}

impl EncodeOptions {
    pub fn with_date_style(mut self, date_style: DateStyle) -> Self {
        self.date_style = date_style;
        self
    }
}

pub fn decode<T: DeserializeOwned>(json: &str) -> Result<T, Error> {
    parse::from_str(json).map_err(|err| conversion(err, std::any::type_name::<T>()))
}

/// Empty, whitespace-only, or absent input decodes to an empty list.
pub fn decode_list<T: DeserializeOwned>(json: Option<&str>) -> Result<Vec<T>, Error> {
    match json {
        Some(text) if !text.trim().is_empty() => decode(text),
        _ => Ok(Vec::new()),
    }
}

pub fn encode<T: Record>(entity: &T) -> Option<String> {
    encode_with(entity, &EncodeOptions::default())
}

pub fn encode_with<T: Record>(entity: &T, options: &EncodeOptions) -> Option<String> {
    let ctx = DiffContext::full().with_date_style(options.date_style);
    render(entity, &ctx)
}

/// Writes only what changed between `original` and `current`.
///
/// An unchanged entity encodes as `{}`.
pub fn encode_diff<T: Record>(
    original: &T,
    current: &T,
    lookup: &dyn NestedLookup,
) -> Option<String> {
    encode_diff_with(original, current, lookup, &EncodeOptions::default())
}

pub fn encode_diff_with<T: Record>(
    original: &T,
    current: &T,
    lookup: &dyn NestedLookup,
    options: &EncodeOptions,
) -> Option<String> {
    let ctx = DiffContext::diff(original, lookup).with_date_style(options.date_style);
    render(current, &ctx)
}

pub fn wrap_dynamic(json: &str) -> Result<DynamicJsonView, Error> {
    let value: Value = parse::from_str(json).map_err(|err| conversion(err, "dynamic"))?;
    Ok(DynamicJsonView::from_value(value))
}

/// One independent view per non-null element of a top-level JSON array.
pub fn wrap_dynamic_list(json: &str) -> Result<Vec<DynamicJsonView>, Error> {
    match parse::from_str::<Value>(json) {
        Ok(Value::Array(items)) => Ok(items
            .into_iter()
            .filter(|item| !item.is_null())
            .map(DynamicJsonView::from_value)
            .collect()),
        Ok(_) => Err(Error::new(ErrorKind::Conversion)
            .with_message("expected a JSON array of dynamic objects")),
        Err(err) => Err(conversion(err, "dynamic list")),
    }
}

pub fn dynamic_to_json(view: &DynamicJsonView) -> String {
    view.to_text(false)
}

fn render(record: &dyn Record, ctx: &DiffContext<'_>) -> Option<String> {
    let written = write_record(record, ctx);
    if written.is_none() {
        debug!(
            entity = record.entity_type().name,
            "entity has no writable fields"
        );
    }
    written.map(|map| Value::Object(map).to_string())
}

fn conversion(err: serde_json::Error, target: &str) -> Error {
    Error::new(ErrorKind::Conversion)
        .with_message(format!("failed to decode {target}: {err}"))
        .with_hint(parse::hint_for_error(&err, target))
        .with_source(err)
}

#[cfg(test)]
mod tests {
    use super::{decode, decode_list, dynamic_to_json, wrap_dynamic, wrap_dynamic_list};
    use crate::core::error::ErrorKind;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Pair {
        a: i64,
    }

    #[test]
    fn decode_reports_conversion_errors() {
        let err = decode::<Pair>(r#"{"a":"x"}"#).expect_err("shape");
        assert_eq!(err.kind(), ErrorKind::Conversion);
        assert!(err.hint().is_some_and(|hint| hint.contains("shape")));
    }

    #[test]
    fn blank_lists_decode_empty() {
        for input in [None, Some(""), Some("  \n")] {
            assert!(decode_list::<Pair>(input).expect("empty").is_empty());
        }
        let pairs: Vec<Pair> = decode_list(Some(r#"[{"a":1},{"a":2}]"#)).expect("list");
        assert_eq!(pairs, [Pair { a: 1 }, Pair { a: 2 }]);
    }

    #[test]
    fn dynamic_list_requires_array() {
        let err = wrap_dynamic_list(r#"{"a":1}"#).expect_err("object");
        assert_eq!(err.kind(), ErrorKind::Conversion);
        let views = wrap_dynamic_list(r#"[{"a":1},{"a":2}]"#).expect("list");
        assert_eq!(views.len(), 2);
        assert_eq!(views[1].get("a").as_i64(), Some(2));
    }

    #[test]
    fn dynamic_list_skips_null_elements() {
        let views = wrap_dynamic_list(r#"[null,{"a":1},null,{"a":2}]"#).expect("list");
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].get("a").as_i64(), Some(1));
    }

    #[test]
    fn dynamic_round_trip_keeps_order() {
        let view = wrap_dynamic(r#"{"z":1,"a":[true,null]}"#).expect("view");
        assert_eq!(dynamic_to_json(&view), r#"{"z":1,"a":[true,null]}"#);
        assert_eq!(wrap_dynamic("{").expect_err("bad").kind(), ErrorKind::Conversion);
    }
}
