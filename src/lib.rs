//! Purpose: JSON transformation layer for services speaking the OData verbose convention.
//! Exports: `core` (envelope, dates, dynamic view, entity diffing, errors) and `api`.
//! Role: Library backing the `vodata` CLI and any typed client built on top of it.
//! Invariants: Codecs are pure functions over text; only `api::connection` performs I/O.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
pub mod core;
mod json;
