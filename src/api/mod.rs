//! Purpose: Define the public Rust API boundary for the verbose-OData layer.
//! Exports: Codecs, the dynamic view, entity tables, diff tracking, and the connection.
//! Role: Public, additive-only surface used by the CLI and client code.
//! Invariants: Callers reach core functionality through these re-exports.

mod connection;
mod serializer;

pub use crate::core::diff::DateStyle;
pub use crate::core::dynamic::{DynInput, DynValue, DynamicJsonView, Key};
pub use crate::core::entity::{Entity, EntityType, FieldDescriptor, FieldValue, Record};
pub use crate::core::envelope::{extract_continuation_token, unwrap_array, unwrap_object};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::legacy_date;
pub use crate::core::tracking::{
    EntityController, NestedLookup, NoTracking, TrackedEntities, TrackedEntity,
};
pub use connection::{
    ApiConnection, ConnectionConfig, HttpExecutor, HttpRequest, HttpResponse, Method,
    StaticToken, TokenProvider, UreqExecutor,
};
pub use serializer::{
    EncodeOptions, decode, decode_list, dynamic_to_json, encode, encode_diff, encode_diff_with,
    encode_with, wrap_dynamic, wrap_dynamic_list,
};
