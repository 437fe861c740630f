//! Purpose: Internal JSON parsing boundary shared by runtime callsites.
//! Exports: `parse` module with decode helpers used by codecs and the serializer.
//! Role: Single seam for parser implementation so callsites avoid ad hoc decode logic.
//! Invariants: Envelope and entity decoding go through this module.
//! Invariants: Helper APIs stay small and deterministic (no hidden global state).

pub(crate) mod parse;
