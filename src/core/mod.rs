// Core modules implementing envelope codecs, the dynamic view, and entity diffing.
pub mod diff;
pub mod dynamic;
pub mod entity;
pub mod envelope;
pub mod error;
pub mod legacy_date;
pub mod tracking;
pub mod tree;
