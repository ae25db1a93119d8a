//! Per-entity component storage
//!
//! A [`ComponentPool`] keeps components densely in a [`SlotMap`] with an
//! entity index on the side. Iteration order is the slot order, which is
//! deterministic for a given sequence of insertions and removals.

use super::Entity;
use slotmap::{new_key_type, SlotMap};
use std::collections::HashMap;

new_key_type! {
    struct PoolKey;
}

/// Storage for at most one `T` per entity
#[derive(Debug)]
pub struct ComponentPool<T> {
    slots: SlotMap<PoolKey, (Entity, T)>,
    index: HashMap<Entity, PoolKey>,
}

impl<T> Default for ComponentPool<T> {
    fn default() -> Self {
        Self {
            slots: SlotMap::with_key(),
            index: HashMap::new(),
        }
    }
}

impl<T> ComponentPool<T> {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a component, replacing any existing one for the entity
    pub fn emplace(&mut self, entity: Entity, component: T) -> &mut T {
        if let Some(&key) = self.index.get(&entity) {
            let slot = &mut self.slots[key];
            slot.1 = component;
            return &mut slot.1;
        }
        let key = self.slots.insert((entity, component));
        self.index.insert(entity, key);
        &mut self.slots[key].1
    }

    /// Remove and return the entity's component
    pub fn remove(&mut self, entity: Entity) -> Option<T> {
        let key = self.index.remove(&entity)?;
        self.slots.remove(key).map(|(_, component)| component)
    }

    /// Component for the entity, if any
    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.index.get(&entity).map(|&key| &self.slots[key].1)
    }

    /// Mutable component for the entity, if any
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        let key = *self.index.get(&entity)?;
        Some(&mut self.slots[key].1)
    }

    /// Whether the entity has a component here
    pub fn contains(&self, entity: Entity) -> bool {
        self.index.contains_key(&entity)
    }

    /// Number of components
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the pool is empty
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterate over `(entity, component)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.slots.values().map(|(entity, component)| (*entity, component))
    }

    /// Iterate mutably over `(entity, component)` pairs
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut T)> {
        self.slots
            .values_mut()
            .map(|(entity, component)| (*entity, component))
    }
}
