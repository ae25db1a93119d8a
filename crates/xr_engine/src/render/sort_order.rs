//! Hierarchical draw-order keys
//!
//! A [`RenderSortOrder`] packs the path from a root to an entity into a
//! 128-bit integer, one nibble per level with the root level in the top
//! nibble. Comparing two keys therefore matches a pre-order walk of the
//! transform tree. Each level stores the entity's offset: the explicit one
//! set through [`SortOrderManager::set_offset`] or, by default, its sibling
//! index folded into `1..=15`. Explicit offsets are signed and are added
//! into the key, so a negative offset borrows from the parent's level.

use crate::dfatal;
use crate::ecs::Entity;
use crate::scene::transform::TransformProvider;
use std::collections::HashMap;
use std::fmt;

/// Draw-order key of an entity within a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RenderSortOrder(pub u128);

impl RenderSortOrder {
    /// Bits used by one hierarchy level
    pub const BITS_PER_LEVEL: u32 = 4;
    /// Deepest level that still fits in the key
    pub const MAX_DEPTH: usize = (u128::BITS / Self::BITS_PER_LEVEL) as usize;

    const ROOT_SHIFT: u32 = u128::BITS - Self::BITS_PER_LEVEL;
    const DEFAULT_OFFSET_RANGE: usize = (1 << Self::BITS_PER_LEVEL) - 1;

    /// Add `offset` at hierarchy level `depth`
    fn with_offset(self, depth: usize, offset: i32) -> Self {
        let shift = Self::ROOT_SHIFT - Self::BITS_PER_LEVEL * depth as u32;
        let delta = (i128::from(offset) as u128) << shift;
        Self(self.0.wrapping_add(delta))
    }

    /// Zero-padded hexadecimal rendering, useful in logs
    pub fn to_hex_string(self) -> String {
        format!("0x{:032X}", self.0)
    }
}

impl fmt::Display for RenderSortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex_string())
    }
}

/// Storage that holds a sort order per entity
///
/// This decouples the manager from the concrete pool that owns an entity's
/// render component.
pub trait SortOrderLookup {
    /// Mutable access to the entity's sort order, `None` if it has none here
    fn sort_order_mut(&mut self, entity: Entity) -> Option<&mut RenderSortOrder>;
}

impl SortOrderLookup for HashMap<Entity, RenderSortOrder> {
    fn sort_order_mut(&mut self, entity: Entity) -> Option<&mut RenderSortOrder> {
        self.get_mut(&entity)
    }
}

/// Per-pass sort order offsets and key computation
#[derive(Debug, Default, Clone)]
pub struct SortOrderManager {
    offsets: HashMap<Entity, i32>,
}

impl SortOrderManager {
    /// Create a manager with no explicit offsets
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an explicit offset for the entity
    ///
    /// This does not update any stored keys; call
    /// [`update_sort_order`](Self::update_sort_order) afterwards.
    pub fn set_offset(&mut self, entity: Entity, offset: i32) {
        self.offsets.insert(entity, offset);
    }

    /// Return the entity to its default sibling-index offset
    pub fn clear_offset(&mut self, entity: Entity) {
        self.offsets.remove(&entity);
    }

    /// Explicit offset of the entity, `None` when it uses the default
    pub fn get_offset(&self, entity: Entity) -> Option<i32> {
        self.offsets.get(&entity).copied()
    }

    /// Forget everything about the entity
    pub fn destroy(&mut self, entity: Entity) {
        self.offsets.remove(&entity);
    }

    fn offset_at(&self, entity: Entity, transforms: &dyn TransformProvider) -> i32 {
        match self.offsets.get(&entity) {
            Some(&offset) => offset,
            None => {
                let index = transforms.sibling_index(entity) % RenderSortOrder::DEFAULT_OFFSET_RANGE;
                // Fits in a nibble.
                (index + 1) as i32
            }
        }
    }

    /// Compute the entity's key from its ancestor chain
    pub fn calculate_sort_order(
        &self,
        entity: Entity,
        transforms: &dyn TransformProvider,
    ) -> RenderSortOrder {
        let mut chain = vec![entity];
        let mut parent = transforms.parent(entity);
        while !parent.is_null() {
            chain.push(parent);
            parent = transforms.parent(parent);
        }
        chain.reverse();

        if chain.len() > RenderSortOrder::MAX_DEPTH {
            dfatal!(
                "Cannot exceed max depth {} for entity {}",
                RenderSortOrder::MAX_DEPTH,
                entity.id()
            );
            chain.truncate(RenderSortOrder::MAX_DEPTH);
        }

        chain
            .iter()
            .enumerate()
            .fold(RenderSortOrder::default(), |order, (depth, &link)| {
                order.with_offset(depth, self.offset_at(link, transforms))
            })
    }

    /// Recompute the keys of the entity and all of its descendants
    ///
    /// Entities missing from `lookup` are skipped but their children are still
    /// visited.
    pub fn update_sort_order(
        &self,
        entity: Entity,
        transforms: &dyn TransformProvider,
        lookup: &mut dyn SortOrderLookup,
    ) {
        let root_order = self.calculate_sort_order(entity, transforms);
        let root_depth = transforms.depth(entity).min(RenderSortOrder::MAX_DEPTH - 1);

        let mut stack = vec![(entity, root_order, root_depth)];
        while let Some((current, order, depth)) = stack.pop() {
            if let Some(slot) = lookup.sort_order_mut(current) {
                *slot = order;
            }
            let child_depth = depth + 1;
            for &child in transforms.children(current).iter().rev() {
                let child_order = if child_depth < RenderSortOrder::MAX_DEPTH {
                    order.with_offset(child_depth, self.offset_at(child, transforms))
                } else {
                    dfatal!(
                        "Cannot exceed max depth {} for entity {}",
                        RenderSortOrder::MAX_DEPTH,
                        child.id()
                    );
                    order
                };
                stack.push((child, child_order, child_depth.min(RenderSortOrder::MAX_DEPTH - 1)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Sqt;
    use crate::scene::transform::TransformHierarchy;

    /// Key whose upper 64 bits are `bits`
    fn key(bits: u64) -> RenderSortOrder {
        RenderSortOrder(u128::from(bits) << 64)
    }

    fn hierarchy_with(count: u32) -> TransformHierarchy {
        let mut hierarchy = TransformHierarchy::new();
        for id in 1..=count {
            hierarchy.create(Entity::from_raw(id), Sqt::default());
        }
        hierarchy
    }

    fn e(id: u32) -> Entity {
        Entity::from_raw(id)
    }

    //   1
    // 2    3
    //    4    5
    //       6 7 8
    fn sample_tree() -> TransformHierarchy {
        let mut hierarchy = hierarchy_with(8);
        for (parent, child) in [(1, 2), (1, 3), (3, 4), (3, 5), (5, 6), (5, 7), (5, 8)] {
            hierarchy.add_child(e(parent), e(child));
        }
        hierarchy
    }

    #[test]
    fn test_offsets_are_stored() {
        let mut manager = SortOrderManager::new();
        assert_eq!(manager.get_offset(e(1)), None);

        manager.set_offset(e(1), 2);
        manager.set_offset(e(2), -5);
        assert_eq!(manager.get_offset(e(1)), Some(2));
        assert_eq!(manager.get_offset(e(2)), Some(-5));

        manager.destroy(e(1));
        assert_eq!(manager.get_offset(e(1)), None);
        manager.clear_offset(e(2));
        assert_eq!(manager.get_offset(e(2)), None);
    }

    #[test]
    fn test_default_root_offsets_cycle() {
        let manager = SortOrderManager::new();
        let hierarchy = hierarchy_with(17);

        for id in 1..=15u32 {
            let expected = RenderSortOrder(u128::from(id) << 124);
            assert_eq!(manager.calculate_sort_order(e(id), &hierarchy), expected);
        }
        assert_eq!(manager.calculate_sort_order(e(16), &hierarchy), key(0x1000_0000_0000_0000));
        assert_eq!(manager.calculate_sort_order(e(17), &hierarchy), key(0x2000_0000_0000_0000));
    }

    #[test]
    fn test_default_offsets_not_visible() {
        let manager = SortOrderManager::new();
        let hierarchy = sample_tree();
        for id in 1..=8 {
            let _ = manager.calculate_sort_order(e(id), &hierarchy);
            assert_eq!(manager.get_offset(e(id)), None);
        }
    }

    #[test]
    fn test_sibling_order() {
        let manager = SortOrderManager::new();
        let hierarchy = sample_tree();
        let expected = [
            0x1000_0000_0000_0000u64,
            0x1100_0000_0000_0000,
            0x1200_0000_0000_0000,
            0x1210_0000_0000_0000,
            0x1220_0000_0000_0000,
            0x1221_0000_0000_0000,
            0x1222_0000_0000_0000,
            0x1223_0000_0000_0000,
        ];
        for (id, bits) in (1..=8).zip(expected) {
            assert_eq!(manager.calculate_sort_order(e(id), &hierarchy), key(bits), "entity {id}");
        }
    }

    #[test]
    fn test_explicit_offsets() {
        let mut manager = SortOrderManager::new();
        let hierarchy = sample_tree();
        for (id, offset) in [(1, 1), (2, 1), (3, -1), (4, 1), (5, 2), (6, 3), (7, 4), (8, -5)] {
            manager.set_offset(e(id), offset);
        }
        let expected = [
            0x1000_0000_0000_0000u64,
            0x1100_0000_0000_0000,
            0x0F00_0000_0000_0000,
            0x0F10_0000_0000_0000,
            0x0F20_0000_0000_0000,
            0x0F23_0000_0000_0000,
            0x0F24_0000_0000_0000,
            0x0F1B_0000_0000_0000,
        ];
        for (id, bits) in (1..=8).zip(expected) {
            assert_eq!(manager.calculate_sort_order(e(id), &hierarchy), key(bits), "entity {id}");
        }
    }

    #[test]
    fn test_negative_offset_inverts_siblings() {
        let mut manager = SortOrderManager::new();
        let hierarchy = sample_tree();
        let a = manager.calculate_sort_order(e(2), &hierarchy);
        let b = manager.calculate_sort_order(e(3), &hierarchy);
        assert!(a < b);

        manager.set_offset(e(3), -3);
        let b = manager.calculate_sort_order(e(3), &hierarchy);
        assert!(b < a);
    }

    #[test]
    fn test_update_sort_order_touches_only_subtree() {
        let manager = SortOrderManager::new();
        let mut hierarchy = hierarchy_with(5);
        for id in 1..4 {
            hierarchy.add_child(e(id), e(id + 1));
        }
        let mut orders: HashMap<Entity, RenderSortOrder> =
            (1..=5).map(|id| (e(id), RenderSortOrder::default())).collect();

        manager.update_sort_order(e(2), &hierarchy, &mut orders);

        assert_eq!(orders[&e(2)], key(0x1100_0000_0000_0000));
        assert_eq!(orders[&e(3)], key(0x1110_0000_0000_0000));
        assert_eq!(orders[&e(4)], key(0x1111_0000_0000_0000));
        assert_eq!(orders[&e(1)], RenderSortOrder::default());
        assert_eq!(orders[&e(5)], RenderSortOrder::default());
    }

    #[test]
    fn test_update_skips_entities_without_keys() {
        let manager = SortOrderManager::new();
        let mut hierarchy = hierarchy_with(3);
        hierarchy.add_child(e(1), e(2));
        hierarchy.add_child(e(2), e(3));
        let mut orders: HashMap<Entity, RenderSortOrder> =
            [(e(1), RenderSortOrder::default()), (e(3), RenderSortOrder::default())].into();

        manager.update_sort_order(e(1), &hierarchy, &mut orders);

        assert_eq!(orders[&e(3)], key(0x1110_0000_0000_0000));
        assert!(!orders.contains_key(&e(2)));
    }

    #[test]
    fn test_reparent_updates_grandchildren() {
        let manager = SortOrderManager::new();
        let mut hierarchy = hierarchy_with(5);
        // 1 -> 2 -> 3, plus roots 4 and 5
        hierarchy.add_child(e(1), e(2));
        hierarchy.add_child(e(2), e(3));
        let mut orders: HashMap<Entity, RenderSortOrder> =
            (1..=5).map(|id| (e(id), RenderSortOrder::default())).collect();
        for &root in hierarchy.roots() {
            manager.update_sort_order(root, &hierarchy, &mut orders);
        }
        let before = orders[&e(3)];

        hierarchy.set_parent(e(2), e(5));
        manager.update_sort_order(e(2), &hierarchy, &mut orders);

        assert_ne!(orders[&e(3)], before);
        assert_eq!(orders[&e(3)], manager.calculate_sort_order(e(3), &hierarchy));
        assert!(orders[&e(3)] > orders[&e(5)]);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "Cannot exceed max depth"))]
    fn test_max_depth() {
        let manager = SortOrderManager::new();
        let count = RenderSortOrder::MAX_DEPTH as u32 + 1;
        let mut hierarchy = hierarchy_with(count);
        for id in 1..count {
            hierarchy.add_child(e(id), e(id + 1));
        }

        let deepest = manager.calculate_sort_order(e(count), &hierarchy);
        let parent = manager.calculate_sort_order(e(count - 1), &hierarchy);
        assert_eq!(deepest, parent);
    }

    #[test]
    fn test_hex_string() {
        assert_eq!(
            key(0x0F1B_0000_0000_0000).to_hex_string(),
            "0x0F1B0000000000000000000000000000"
        );
    }
}
