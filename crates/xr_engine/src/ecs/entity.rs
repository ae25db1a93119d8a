//! Entity implementation

use std::collections::HashSet;

/// Entity identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Entity {
    id: u32,
}

impl Entity {
    /// The null entity. Never handed out by [`World::create`].
    pub const NULL: Self = Self { id: 0 };

    /// Create an entity handle from a raw id
    pub const fn from_raw(id: u32) -> Self {
        Self { id }
    }

    /// Get the entity ID
    pub const fn id(self) -> u32 {
        self.id
    }

    /// Whether this is [`Entity::NULL`]
    pub const fn is_null(self) -> bool {
        self.id == 0
    }
}

/// Allocates entity ids and tracks which are alive
#[derive(Debug, Default)]
pub struct World {
    next_id: u32,
    alive: HashSet<Entity>,
}

impl World {
    /// Create an empty world
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new entity. Ids start at 1 and are never reused.
    pub fn create(&mut self) -> Entity {
        self.next_id += 1;
        let entity = Entity::from_raw(self.next_id);
        self.alive.insert(entity);
        log::trace!("Created entity {}", entity.id());
        entity
    }

    /// Mark an entity as destroyed. Returns false if it was not alive.
    pub fn destroy(&mut self, entity: Entity) -> bool {
        self.alive.remove(&entity)
    }

    /// Whether the entity exists
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.alive.contains(&entity)
    }

    /// Number of live entities
    pub fn len(&self) -> usize {
        self.alive.len()
    }

    /// Whether there are no live entities
    pub fn is_empty(&self) -> bool {
        self.alive.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_creation() {
        let mut world = World::new();
        let a = world.create();
        let b = world.create();
        assert_ne!(a, b);
        assert!(!a.is_null());
        assert_eq!(a.id(), 1);
        assert_eq!(world.len(), 2);
    }

    #[test]
    fn test_destroy() {
        let mut world = World::new();
        let a = world.create();
        assert!(world.destroy(a));
        assert!(!world.destroy(a));
        assert!(!world.is_alive(a));
        assert_ne!(world.create(), a);
    }
}
