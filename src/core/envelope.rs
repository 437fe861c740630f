//! Purpose: Strip the `{"d": ...}` response envelope and flatten wrapped sub-collections.
//! Exports: `unwrap_object`, `unwrap_array`, `extract_continuation_token`, `flatten`.
//! Role: First stage for every response body before typed or dynamic decoding.
//! Invariants: One flattening rule, applied identically at every depth:
//! Invariants: an object of the form `{"results": [...]}` becomes the array itself.
//! Invariants: Non-object elements of a wrapped collection are dropped, not reported.
//! Invariants: Output is culture-invariant JSON text; serde_json never reads locale.
use crate::core::error::{Error, ErrorKind};
use crate::json::parse;
use serde_json::{Map, Value};
use tracing::{debug, trace};

pub const ROOT_KEY: &str = "d";
pub const RESULTS_KEY: &str = "results";
pub const NEXT_LINK_KEY: &str = "__next";
pub const SKIP_TOKEN_PARAM: &str = "$skiptoken=";

/// Returns the single entity inside `{"d": {...}}` as envelope-free JSON text.
pub fn unwrap_object(text: &str) -> Result<String, Error> {
    let root = parse_root(text, "envelope.object")?;
    let Some(Value::Object(payload)) = root.get(ROOT_KEY) else {
        return Err(Error::new(ErrorKind::MalformedEnvelope)
            .with_message("property 'd' is missing or not an object"));
    };
    let flattened = flatten_object(payload);
    trace!(members = flattened.len(), "unwrapped single-entity envelope");
    encode(&Value::Object(flattened))
}

/// Returns the entities inside `{"d": [...]}` or `{"d": {"results": [...]}}` as a JSON array.
pub fn unwrap_array(text: &str) -> Result<String, Error> {
    let root = parse_root(text, "envelope.array")?;
    let items = match root.get(ROOT_KEY) {
        Some(Value::Object(payload)) => match payload.get(RESULTS_KEY) {
            Some(Value::Array(items)) => items,
            _ => return Err(missing_results()),
        },
        Some(Value::Array(items)) => items,
        _ => return Err(missing_results()),
    };
    let flattened = flatten_collection(items);
    debug!(
        received = items.len(),
        kept = flattened.len(),
        "unwrapped collection envelope"
    );
    encode(&Value::Array(flattened))
}

/// Extracts the `$skiptoken` value from the `__next` link of an object-shaped envelope.
///
/// Only unparseable top-level JSON is an error; every other miss is `Ok(None)`.
pub fn extract_continuation_token(text: &str) -> Result<Option<String>, Error> {
    let root: Value = parse::from_str(text).map_err(|err| malformed(err, "envelope.next"))?;
    let Some(Value::Object(payload)) = root.get(ROOT_KEY) else {
        return Ok(None);
    };
    let next = match payload.get(NEXT_LINK_KEY) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(link)) => link.clone(),
        Some(other) => other.to_string(),
    };
    Ok(skip_token_from_link(&next))
}

/// Text after `$skiptoken=` up to the next `&`, `#`, or end of string.
pub fn skip_token_from_link(link: &str) -> Option<String> {
    let start = link.find(SKIP_TOKEN_PARAM)? + SKIP_TOKEN_PARAM.len();
    let rest = &link[start..];
    let end = rest.find(['&', '#']).unwrap_or(rest.len());
    Some(rest[..end].to_string())
}

/// Applies the sub-collection flattening rule to an arbitrary value.
pub fn flatten(value: &Value) -> Value {
    match value {
        Value::Object(object) => match wrapped_results(object) {
            Some(items) => Value::Array(flatten_collection(items)),
            None => Value::Object(flatten_object(object)),
        },
        Value::Array(items) => Value::Array(items.iter().map(flatten).collect()),
        leaf => leaf.clone(),
    }
}

fn flatten_object(object: &Map<String, Value>) -> Map<String, Value> {
    object
        .iter()
        .map(|(key, value)| (key.clone(), flatten(value)))
        .collect()
}

fn flatten_collection(items: &[Value]) -> Vec<Value> {
    items
        .iter()
        .filter_map(|item| match item {
            Value::Object(object) => Some(Value::Object(flatten_object(object))),
            _ => {
                trace!("dropping non-object collection element");
                None
            }
        })
        .collect()
}

fn wrapped_results(object: &Map<String, Value>) -> Option<&Vec<Value>> {
    match object.get(RESULTS_KEY) {
        Some(Value::Array(items)) => Some(items),
        _ => None,
    }
}

fn parse_root(text: &str, context: &str) -> Result<Map<String, Value>, Error> {
    match parse::from_str::<Value>(text) {
        Ok(Value::Object(root)) => Ok(root),
        Ok(_) => Err(Error::new(ErrorKind::MalformedEnvelope)
            .with_message("response root is not a JSON object")),
        Err(err) => Err(malformed(err, context)),
    }
}

fn malformed(err: serde_json::Error, context: &str) -> Error {
    Error::new(ErrorKind::MalformedEnvelope)
        .with_message(err.to_string())
        .with_hint(parse::hint_for_error(&err, context))
        .with_source(err)
}

fn missing_results() -> Error {
    Error::new(ErrorKind::MalformedEnvelope).with_message("no ['d']['results'] token found in response")
}

fn encode(value: &Value) -> Result<String, Error> {
    serde_json::to_string(value).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode unwrapped json")
            .with_source(err)
    })
}
