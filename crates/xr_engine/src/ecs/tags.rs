//! Reference-counted entity tags
//!
//! Subsystems mark the entities they manage with a tag type. Several owners
//! may register the same tag on an entity; the tag stays set until every
//! registration has been released.

use super::Entity;
use std::any::TypeId;
use std::collections::HashMap;

/// Marker trait for tag types
pub trait Tag: 'static {}

/// Tag store keyed by `(entity, tag type)`
#[derive(Debug, Default)]
pub struct TagStore {
    counts: HashMap<(Entity, TypeId), u32>,
}

impl TagStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a registration of `T` on the entity, returning the new count
    pub fn register<T: Tag>(&mut self, entity: Entity) -> u32 {
        let count = self.counts.entry((entity, TypeId::of::<T>())).or_insert(0);
        *count += 1;
        *count
    }

    /// Drop one registration of `T`. Returns whether the tag is still set.
    pub fn release<T: Tag>(&mut self, entity: Entity) -> bool {
        let key = (entity, TypeId::of::<T>());
        match self.counts.get_mut(&key) {
            Some(count) if *count > 1 => {
                *count -= 1;
                true
            }
            Some(_) => {
                self.counts.remove(&key);
                false
            }
            None => false,
        }
    }

    /// Whether the entity carries `T`
    pub fn has<T: Tag>(&self, entity: Entity) -> bool {
        self.counts.contains_key(&(entity, TypeId::of::<T>()))
    }

    /// Number of outstanding registrations of `T` on the entity
    pub fn count<T: Tag>(&self, entity: Entity) -> u32 {
        self.counts
            .get(&(entity, TypeId::of::<T>()))
            .copied()
            .unwrap_or(0)
    }

    /// All entities carrying `T`, in id order
    pub fn entities_with<T: Tag>(&self) -> Vec<Entity> {
        let tag = TypeId::of::<T>();
        let mut entities: Vec<Entity> = self
            .counts
            .keys()
            .filter(|(_, t)| *t == tag)
            .map(|(e, _)| *e)
            .collect();
        entities.sort_unstable();
        entities
    }

    /// Forget every tag on the entity
    pub fn remove_entity(&mut self, entity: Entity) {
        self.counts.retain(|(e, _), _| *e != entity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Renderable;
    impl Tag for Renderable {}

    struct Collidable;
    impl Tag for Collidable {}

    #[test]
    fn test_reference_counting() {
        let mut tags = TagStore::new();
        let e = Entity::from_raw(4);
        assert_eq!(tags.register::<Renderable>(e), 1);
        assert_eq!(tags.register::<Renderable>(e), 2);
        assert!(tags.release::<Renderable>(e));
        assert!(tags.has::<Renderable>(e));
        assert!(!tags.release::<Renderable>(e));
        assert!(!tags.has::<Renderable>(e));
        assert!(!tags.release::<Renderable>(e));
    }

    #[test]
    fn test_tag_types_are_independent() {
        let mut tags = TagStore::new();
        let a = Entity::from_raw(2);
        let b = Entity::from_raw(1);
        tags.register::<Renderable>(a);
        tags.register::<Renderable>(b);
        tags.register::<Collidable>(a);
        assert_eq!(tags.entities_with::<Renderable>(), vec![b, a]);
        assert_eq!(tags.entities_with::<Collidable>(), vec![a]);

        tags.remove_entity(a);
        assert!(!tags.has::<Collidable>(a));
        assert_eq!(tags.count::<Renderable>(b), 1);
    }
}
