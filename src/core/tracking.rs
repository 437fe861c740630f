//! Purpose: Correlate nested entities with the snapshots captured when they were loaded.
//! Exports: `EntityController`, `NestedLookup`, `NoTracking`, `TrackedEntity`, `TrackedEntities`.
//! Role: Supplies the per-item original state the diff writer needs for nested collections.
//! Invariants: Correlation is by entity type name plus key text, never by structure.
//! Invariants: Entities without a key value are never tracked.
use crate::core::diff::{DiffContext, write_record};
use crate::core::entity::Record;
use std::collections::HashMap;
use tracing::debug;

/// Change state of one loaded entity.
pub trait EntityController {
    fn original(&self) -> &dyn Record;
    /// `lookup` resolves the snapshots of items nested below `current`.
    fn is_updated(&self, current: &dyn Record, lookup: &dyn NestedLookup) -> bool;
}

/// Maps a nested item to its controller, if it is tracked.
///
/// Items without a controller are written as if every field changed.
pub trait NestedLookup {
    fn controller(&self, item: &dyn Record) -> Option<&dyn EntityController>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoTracking;

impl NestedLookup for NoTracking {
    fn controller(&self, _item: &dyn Record) -> Option<&dyn EntityController> {
        None
    }
}

pub struct TrackedEntity {
    original: Box<dyn Record>,
}

impl TrackedEntity {
    pub fn new(original: Box<dyn Record>) -> Self {
        Self { original }
    }
}

impl EntityController for TrackedEntity {
    fn original(&self) -> &dyn Record {
        self.original.as_ref()
    }

    fn is_updated(&self, current: &dyn Record, lookup: &dyn NestedLookup) -> bool {
        let ctx = DiffContext::diff(self.original.as_ref(), lookup);
        write_record(current, &ctx).is_some_and(|written| !written.is_empty())
    }
}

#[derive(Default)]
pub struct TrackedEntities {
    entries: HashMap<(&'static str, String), TrackedEntity>,
}

impl TrackedEntities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captures a snapshot; returns `false` when the entity has no key value.
    pub fn track<E: Record + Clone>(&mut self, entity: &E) -> bool {
        let Some(key) = lookup_key(entity) else {
            debug!(
                entity = entity.entity_type().name,
                "entity has no key value; not tracked"
            );
            return false;
        };
        self.entries
            .insert(key, TrackedEntity::new(Box::new(entity.clone())));
        true
    }

    pub fn track_all<E: Record + Clone>(&mut self, entities: &[E]) -> usize {
        entities
            .iter()
            .filter(|entity| self.track(*entity))
            .count()
    }

    pub fn forget(&mut self, entity: &dyn Record) -> bool {
        lookup_key(entity)
            .and_then(|key| self.entries.remove(&key))
            .is_some()
    }

    pub fn original_of<E: Record>(&self, entity: &E) -> Option<&E> {
        let key = lookup_key(entity)?;
        self.entries
            .get(&key)?
            .original
            .as_any()
            .downcast_ref::<E>()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl NestedLookup for TrackedEntities {
    fn controller(&self, item: &dyn Record) -> Option<&dyn EntityController> {
        let key = lookup_key(item)?;
        self.entries
            .get(&key)
            .map(|entry| entry as &dyn EntityController)
    }
}

fn lookup_key(entity: &dyn Record) -> Option<(&'static str, String)> {
    Some((entity.entity_type().name, entity.key()?))
}
