//! Transform hierarchy
//!
//! [`TransformProvider`] is the read-only view of the entity tree that the
//! render and sort-order code consume. [`TransformHierarchy`] is the concrete
//! tree: every structural mutation returns the immediate events it caused so
//! the owner can forward them before anything else observes the new layout.

use crate::dfatal;
use crate::ecs::Entity;
use crate::events::Event;
use crate::foundation::math::{Mat4, Sqt};
use std::collections::HashMap;

/// Read access to a parent/child tree with world matrices
pub trait TransformProvider {
    /// Parent of the entity, `Entity::NULL` for roots and unknown entities
    fn parent(&self, entity: Entity) -> Entity;

    /// Ordered children of the entity
    fn children(&self, entity: Entity) -> &[Entity];

    /// Position of the entity among its siblings. Roots are indexed among
    /// the other roots.
    fn sibling_index(&self, entity: Entity) -> usize;

    /// Call `f` on the entity and then on every descendant, in pre-order
    fn for_all_descendants(&self, entity: Entity, f: &mut dyn FnMut(Entity));

    /// World matrix of the entity, `None` if it has no transform
    fn world_from_entity(&self, entity: Entity) -> Option<&Mat4>;

    /// Whether the entity and all of its ancestors are enabled
    fn is_enabled(&self, entity: Entity) -> bool;

    /// Number of ancestors above the entity
    fn depth(&self, entity: Entity) -> usize {
        let mut depth = 0;
        let mut current = self.parent(entity);
        while !current.is_null() {
            depth += 1;
            current = self.parent(current);
        }
        depth
    }
}

#[derive(Debug, Clone)]
struct Node {
    parent: Entity,
    children: Vec<Entity>,
    local: Sqt,
    world: Mat4,
    enabled: bool,
}

/// Concrete entity tree with eagerly maintained world matrices
#[derive(Debug, Default)]
pub struct TransformHierarchy {
    nodes: HashMap<Entity, Node>,
    roots: Vec<Entity>,
}

impl TransformHierarchy {
    /// Create an empty hierarchy
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity as the last root
    pub fn create(&mut self, entity: Entity, local: Sqt) {
        if entity.is_null() || self.nodes.contains_key(&entity) {
            log::warn!("Transform for entity {} already exists", entity.id());
            return;
        }
        self.nodes.insert(
            entity,
            Node {
                parent: Entity::NULL,
                children: Vec::new(),
                local,
                world: local.to_matrix(),
                enabled: true,
            },
        );
        self.roots.push(entity);
    }

    /// Whether the entity has a transform
    pub fn contains(&self, entity: Entity) -> bool {
        self.nodes.contains_key(&entity)
    }

    /// Root entities in order
    pub fn roots(&self) -> &[Entity] {
        &self.roots
    }

    /// Local transform of the entity
    pub fn local_sqt(&self, entity: Entity) -> Option<&Sqt> {
        self.nodes.get(&entity).map(|node| &node.local)
    }

    /// Replace the local transform and refresh the subtree's world matrices
    pub fn set_local_sqt(&mut self, entity: Entity, local: Sqt) {
        let Some(node) = self.nodes.get_mut(&entity) else {
            return;
        };
        node.local = local;
        self.update_world(entity);
    }

    /// Enable or disable the entity (and so its subtree)
    pub fn set_enabled(&mut self, entity: Entity, enabled: bool) {
        if let Some(node) = self.nodes.get_mut(&entity) {
            node.enabled = enabled;
        }
    }

    /// Append `child` to `parent`'s children
    pub fn add_child(&mut self, parent: Entity, child: Entity) -> Vec<Event> {
        self.set_parent(child, parent)
    }

    /// Attach `child` to `parent` at `index` among its siblings
    pub fn insert_child(&mut self, parent: Entity, child: Entity, index: usize) -> Vec<Event> {
        let mut events = self.set_parent(child, parent);
        if self.parent(child) == parent {
            events.extend(self.move_to_index(child, index));
        }
        events
    }

    /// Move `child` under `parent`, or to the root list when `parent` is null.
    ///
    /// Attaching an entity below itself is a contract violation and leaves
    /// the tree unchanged.
    pub fn set_parent(&mut self, child: Entity, parent: Entity) -> Vec<Event> {
        if !self.nodes.contains_key(&child) || (!parent.is_null() && !self.nodes.contains_key(&parent)) {
            log::warn!("set_parent on entity without a transform");
            return Vec::new();
        }
        if self.is_self_or_ancestor(child, parent) {
            dfatal!("Cannot parent entity {} below itself", child.id());
            return Vec::new();
        }
        let old_parent = self.parent(child);
        if old_parent == parent {
            return Vec::new();
        }

        let mut events = self.detach(child);
        self.siblings_mut(parent).push(child);
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = parent;
        }
        self.update_world(child);

        events.push(Event::ParentChangedImmediate {
            target: child,
            old_parent,
            new_parent: parent,
        });
        events
    }

    /// Move the entity to `index` within its sibling list, clamped to the end
    pub fn move_to_index(&mut self, entity: Entity, index: usize) -> Vec<Event> {
        if !self.nodes.contains_key(&entity) {
            return Vec::new();
        }
        let parent = self.parent(entity);
        let siblings = self.siblings_mut(parent);
        let Some(old) = siblings.iter().position(|e| *e == entity) else {
            return Vec::new();
        };
        let new = index.min(siblings.len() - 1);
        if old == new {
            return Vec::new();
        }
        let before = siblings.clone();
        let moved = siblings.remove(old);
        siblings.insert(new, moved);

        let after = siblings.clone();
        index_changes(parent, &before, &after)
    }

    /// Remove the entity and its whole subtree. Returns the removed entities
    /// (pre-order) and the sibling index changes the removal caused.
    pub fn destroy(&mut self, entity: Entity) -> (Vec<Entity>, Vec<Event>) {
        if !self.nodes.contains_key(&entity) {
            return (Vec::new(), Vec::new());
        }
        let events = self.detach(entity);
        let mut removed = Vec::new();
        self.for_all_descendants(entity, &mut |e| removed.push(e));
        for e in &removed {
            self.nodes.remove(e);
        }
        (removed, events)
    }

    fn is_self_or_ancestor(&self, entity: Entity, mut candidate: Entity) -> bool {
        while !candidate.is_null() {
            if candidate == entity {
                return true;
            }
            candidate = self.parent(candidate);
        }
        false
    }

    fn siblings_mut(&mut self, parent: Entity) -> &mut Vec<Entity> {
        if parent.is_null() {
            return &mut self.roots;
        }
        match self.nodes.get_mut(&parent) {
            Some(node) => &mut node.children,
            None => &mut self.roots,
        }
    }

    /// Unlink from the current sibling list, reporting compacted indices.
    fn detach(&mut self, entity: Entity) -> Vec<Event> {
        let parent = self.parent(entity);
        let siblings = self.siblings_mut(parent);
        let Some(pos) = siblings.iter().position(|e| *e == entity) else {
            return Vec::new();
        };
        siblings.remove(pos);
        siblings[pos..]
            .iter()
            .enumerate()
            .map(|(offset, &target)| Event::ChildIndexChangedImmediate {
                target,
                parent,
                old_index: pos + offset + 1,
                new_index: pos + offset,
            })
            .collect()
    }

    fn update_world(&mut self, entity: Entity) {
        let parent_world = self
            .nodes
            .get(&self.parent(entity))
            .map_or_else(Mat4::identity, |node| node.world);
        let mut stack = vec![(entity, parent_world)];
        while let Some((current, parent_world)) = stack.pop() {
            let Some(node) = self.nodes.get_mut(&current) else {
                continue;
            };
            node.world = parent_world * node.local.to_matrix();
            let world = node.world;
            stack.extend(node.children.iter().map(|&child| (child, world)));
        }
    }
}

fn index_changes(parent: Entity, before: &[Entity], after: &[Entity]) -> Vec<Event> {
    after
        .iter()
        .enumerate()
        .filter_map(|(new_index, target)| {
            let old_index = before.iter().position(|e| e == target)?;
            (old_index != new_index).then_some(Event::ChildIndexChangedImmediate {
                target: *target,
                parent,
                old_index,
                new_index,
            })
        })
        .collect()
}

impl TransformProvider for TransformHierarchy {
    fn parent(&self, entity: Entity) -> Entity {
        self.nodes.get(&entity).map_or(Entity::NULL, |node| node.parent)
    }

    fn children(&self, entity: Entity) -> &[Entity] {
        self.nodes
            .get(&entity)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    fn sibling_index(&self, entity: Entity) -> usize {
        let parent = self.parent(entity);
        let siblings = if parent.is_null() {
            self.roots.as_slice()
        } else {
            self.children(parent)
        };
        siblings.iter().position(|e| *e == entity).unwrap_or(0)
    }

    fn for_all_descendants(&self, entity: Entity, f: &mut dyn FnMut(Entity)) {
        if !self.nodes.contains_key(&entity) {
            return;
        }
        let mut stack = vec![entity];
        while let Some(current) = stack.pop() {
            f(current);
            stack.extend(self.children(current).iter().rev());
        }
    }

    fn world_from_entity(&self, entity: Entity) -> Option<&Mat4> {
        self.nodes.get(&entity).map(|node| &node.world)
    }

    fn is_enabled(&self, entity: Entity) -> bool {
        let mut current = entity;
        while let Some(node) = self.nodes.get(&current) {
            if !node.enabled {
                return false;
            }
            current = node.parent;
        }
        self.nodes.contains_key(&entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{translation_of, Vec3};
    use approx::assert_relative_eq;

    fn hierarchy_with(count: u32) -> (TransformHierarchy, Vec<Entity>) {
        let mut hierarchy = TransformHierarchy::new();
        let entities: Vec<Entity> = (1..=count).map(Entity::from_raw).collect();
        for &e in &entities {
            hierarchy.create(e, Sqt::default());
        }
        (hierarchy, entities)
    }

    #[test]
    fn test_roots_are_indexed_in_creation_order() {
        let (hierarchy, e) = hierarchy_with(3);
        assert_eq!(hierarchy.roots(), &e[..]);
        assert_eq!(hierarchy.sibling_index(e[2]), 2);
        assert!(hierarchy.parent(e[0]).is_null());
    }

    #[test]
    fn test_add_child_events_and_compaction() {
        let (mut hierarchy, e) = hierarchy_with(3);
        let events = hierarchy.add_child(e[0], e[1]);
        assert_eq!(
            events,
            vec![
                Event::ChildIndexChangedImmediate {
                    target: e[2],
                    parent: Entity::NULL,
                    old_index: 2,
                    new_index: 1,
                },
                Event::ParentChangedImmediate {
                    target: e[1],
                    old_parent: Entity::NULL,
                    new_parent: e[0],
                },
            ]
        );
        assert_eq!(hierarchy.children(e[0]), &[e[1]]);
        assert_eq!(hierarchy.sibling_index(e[2]), 1);
        assert_eq!(hierarchy.depth(e[1]), 1);
    }

    #[test]
    fn test_move_to_index() {
        let (mut hierarchy, e) = hierarchy_with(4);
        for &child in &e[1..] {
            hierarchy.add_child(e[0], child);
        }
        let events = hierarchy.move_to_index(e[3], 0);
        assert_eq!(hierarchy.children(e[0]), &[e[3], e[1], e[2]]);
        assert_eq!(events.len(), 3);
        assert!(hierarchy.move_to_index(e[3], 0).is_empty());
    }

    #[test]
    fn test_insert_child() {
        let (mut hierarchy, e) = hierarchy_with(3);
        hierarchy.add_child(e[0], e[1]);
        hierarchy.insert_child(e[0], e[2], 0);
        assert_eq!(hierarchy.children(e[0]), &[e[2], e[1]]);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "below itself"))]
    fn test_cycles_are_rejected() {
        let (mut hierarchy, e) = hierarchy_with(2);
        hierarchy.add_child(e[0], e[1]);
        let events = hierarchy.add_child(e[1], e[0]);
        assert!(events.is_empty());
        assert!(hierarchy.parent(e[0]).is_null());
    }

    #[test]
    fn test_world_matrices_follow_parent() {
        let (mut hierarchy, e) = hierarchy_with(2);
        hierarchy.set_local_sqt(e[1], Sqt::from_translation(Vec3::new(0.0, 1.0, 0.0)));
        hierarchy.add_child(e[0], e[1]);
        hierarchy.set_local_sqt(e[0], Sqt::from_translation(Vec3::new(2.0, 0.0, 0.0)));
        let world = hierarchy.world_from_entity(e[1]).copied().unwrap();
        assert_relative_eq!(translation_of(&world), Vec3::new(2.0, 1.0, 0.0));
    }

    #[test]
    fn test_enabled_is_inherited() {
        let (mut hierarchy, e) = hierarchy_with(2);
        hierarchy.add_child(e[0], e[1]);
        hierarchy.set_enabled(e[0], false);
        assert!(!hierarchy.is_enabled(e[1]));
        hierarchy.set_enabled(e[0], true);
        assert!(hierarchy.is_enabled(e[1]));
        assert!(!hierarchy.is_enabled(Entity::from_raw(99)));
    }

    #[test]
    fn test_destroy_removes_subtree() {
        let (mut hierarchy, e) = hierarchy_with(4);
        hierarchy.add_child(e[0], e[1]);
        hierarchy.add_child(e[1], e[2]);
        let (removed, events) = hierarchy.destroy(e[0]);
        assert_eq!(removed, vec![e[0], e[1], e[2]]);
        assert_eq!(events.len(), 1);
        assert_eq!(hierarchy.roots(), &[e[3]]);
        assert!(!hierarchy.contains(e[2]));
    }
}
