//! # Hierarchy
//!
//! Parent and child links are slot indices: each instance points at its
//! parent, its first child and its next sibling. Every live instance also
//! sits in exactly one level array, `levels[depth]`, at `level_index`. The
//! transform pass walks the levels in order, so a parent is always resolved
//! before its children without recursion.
//!
//! Any structural change keeps `levels[depth][level_index] == slot` by pairing
//! an erase-swap in the old level with a push in the new one.

use crate::config::MAX_HIERARCHICAL_DEPTH;
use crate::error::{GameObjectError, GameObjectResult};

use super::collection::Collection;
use super::instance::{InstanceId, INVALID_INDEX};

impl Collection {
    /// Pushes `slot` onto the level array for `depth`.
    pub(crate) fn insert_into_level(&mut self, slot: u32, depth: u16) {
        let max = self.config.max_instances as usize;
        let level = &mut self.levels[usize::from(depth)];
        if level.len() == level.capacity() {
            let grow = (level.len() / 2).max(10);
            let headroom = max.saturating_sub(level.len()).max(1);
            level.reserve(grow.min(headroom));
        }
        let level_index = level.len() as u32;
        level.push(slot);

        let inst = &mut self.instances[slot as usize];
        inst.depth = depth;
        inst.level_index = level_index;
    }

    /// Erase-swaps `slot` out of its level and repairs the moved entry.
    pub(crate) fn erase_from_level(&mut self, slot: u32) {
        let inst = &self.instances[slot as usize];
        let (depth, level_index) = (usize::from(inst.depth), inst.level_index as usize);
        let level = &mut self.levels[depth];
        debug_assert_eq!(level.get(level_index), Some(&slot), "level bookkeeping out of sync");

        level.swap_remove(level_index);
        if let Some(&moved) = level.get(level_index) {
            self.instances[moved as usize].level_index = level_index as u32;
        }
        self.instances[slot as usize].level_index = INVALID_INDEX;
    }

    /// Removes `slot` from its parent's child list.
    pub(crate) fn unlink(&mut self, slot: u32) {
        let parent = self.instances[slot as usize].parent;
        if parent == INVALID_INDEX {
            return;
        }
        let next = self.instances[slot as usize].sibling;
        let mut prev = INVALID_INDEX;
        let mut cursor = self.instances[parent as usize].first_child;
        while cursor != INVALID_INDEX {
            if cursor == slot {
                if prev == INVALID_INDEX {
                    self.instances[parent as usize].first_child = next;
                } else {
                    self.instances[prev as usize].sibling = next;
                }
                break;
            }
            prev = cursor;
            cursor = self.instances[cursor as usize].sibling;
        }
        let inst = &mut self.instances[slot as usize];
        inst.parent = INVALID_INDEX;
        inst.sibling = INVALID_INDEX;
    }

    /// Deepest depth found in the subtree rooted at `slot`.
    fn subtree_max_depth(&self, slot: u32) -> u16 {
        let mut deepest = self.instances[slot as usize].depth;
        let mut stack = vec![self.instances[slot as usize].first_child];
        while let Some(mut cursor) = stack.pop() {
            while cursor != INVALID_INDEX {
                let inst = &self.instances[cursor as usize];
                deepest = deepest.max(inst.depth);
                if inst.first_child != INVALID_INDEX {
                    stack.push(inst.first_child);
                }
                cursor = inst.sibling;
            }
        }
        deepest
    }

    /// Moves the subtree rooted at `slot` so that `slot` ends up at `depth`.
    pub(crate) fn move_subtree(&mut self, slot: u32, depth: u16) {
        let mut stack = vec![(slot, depth)];
        while let Some((current, depth)) = stack.pop() {
            self.erase_from_level(current);
            self.insert_into_level(current, depth);
            let mut child = self.instances[current as usize].first_child;
            while child != INVALID_INDEX {
                stack.push((child, depth + 1));
                child = self.instances[child as usize].sibling;
            }
        }
    }

    /// Hands the children of `slot` to its parent, or makes them roots.
    ///
    /// Children are appended after the parent's existing children and their
    /// subtrees move one level up.
    pub(crate) fn reparent_children_up(&mut self, slot: u32) {
        let first = self.instances[slot as usize].first_child;
        if first == INVALID_INDEX {
            return;
        }
        let grandparent = self.instances[slot as usize].parent;
        let new_depth = self.instances[slot as usize].depth;

        let mut children = Vec::new();
        let mut cursor = first;
        while cursor != INVALID_INDEX {
            children.push(cursor);
            cursor = self.instances[cursor as usize].sibling;
        }
        self.instances[slot as usize].first_child = INVALID_INDEX;

        if grandparent == INVALID_INDEX {
            for &child in &children {
                let inst = &mut self.instances[child as usize];
                inst.parent = INVALID_INDEX;
                inst.sibling = INVALID_INDEX;
            }
        } else {
            for &child in &children {
                self.instances[child as usize].parent = grandparent;
            }
            let mut tail = self.instances[grandparent as usize].first_child;
            if tail == INVALID_INDEX {
                self.instances[grandparent as usize].first_child = first;
            } else {
                while self.instances[tail as usize].sibling != INVALID_INDEX {
                    tail = self.instances[tail as usize].sibling;
                }
                self.instances[tail as usize].sibling = first;
            }
        }
        for child in children {
            self.move_subtree(child, new_depth);
        }
    }

    /// Reparents `child` under `parent`, or makes it a root for `None`.
    ///
    /// Descendants move with the child and keep their local transforms.
    ///
    /// # Errors
    ///
    /// - [`GameObjectError::InstanceNotFound`] for stale handles
    /// - [`GameObjectError::InvalidOperation`] when `parent` is `child` or one
    ///   of its descendants
    /// - [`GameObjectError::MaximumHierarchicalDepth`] when the subtree would
    ///   not fit below `parent`
    ///
    /// The hierarchy is left unchanged on error.
    pub fn set_parent(&mut self, child: InstanceId, parent: Option<InstanceId>) -> GameObjectResult<()> {
        let child_slot = self.require(child)?;
        let parent_slot = parent.map(|p| self.require(p)).transpose()?;

        let new_depth = match parent_slot {
            None => 0,
            Some(p) if p == child_slot => {
                return Err(GameObjectError::InvalidOperation("instance cannot be its own parent"));
            }
            Some(p) => {
                let parent_depth = self.instances[p as usize].depth;
                if parent_depth >= MAX_HIERARCHICAL_DEPTH - 1 {
                    return Err(GameObjectError::MaximumHierarchicalDepth(MAX_HIERARCHICAL_DEPTH));
                }
                let mut ancestor = p;
                while ancestor != INVALID_INDEX {
                    if ancestor == child_slot {
                        return Err(GameObjectError::InvalidOperation("reparenting would create a cycle"));
                    }
                    ancestor = self.instances[ancestor as usize].parent;
                }
                let child_depth = self.instances[child_slot as usize].depth;
                let span = self.subtree_max_depth(child_slot) - child_depth;
                if u32::from(parent_depth) + 1 + u32::from(span) >= u32::from(MAX_HIERARCHICAL_DEPTH) {
                    return Err(GameObjectError::MaximumHierarchicalDepth(MAX_HIERARCHICAL_DEPTH));
                }
                parent_depth + 1
            }
        };

        let new_parent = parent_slot.unwrap_or(INVALID_INDEX);
        if self.instances[child_slot as usize].parent == new_parent {
            return Ok(());
        }

        self.unlink(child_slot);
        if let Some(p) = parent_slot {
            let sibling = self.instances[p as usize].first_child;
            let inst = &mut self.instances[child_slot as usize];
            inst.parent = p;
            inst.sibling = sibling;
            self.instances[p as usize].first_child = child_slot;
        }
        if self.instances[child_slot as usize].depth != new_depth {
            self.move_subtree(child_slot, new_depth);
        }
        self.dirty_transforms = true;
        Ok(())
    }

    /// Parent of an instance; `None` for roots and stale handles.
    #[must_use]
    pub fn parent(&self, instance: InstanceId) -> Option<InstanceId> {
        let slot = self.resolve(instance)?;
        let parent = self.instances[slot as usize].parent;
        (parent != INVALID_INDEX).then(|| self.id_of(parent))
    }

    /// Hierarchy depth, zero for roots.
    #[must_use]
    pub fn depth(&self, instance: InstanceId) -> Option<u16> {
        self.resolve(instance).map(|slot| self.instances[slot as usize].depth)
    }

    /// Position of the instance in its level array.
    #[must_use]
    pub fn level_index(&self, instance: InstanceId) -> Option<u32> {
        self.resolve(instance).map(|slot| self.instances[slot as usize].level_index)
    }

    /// Instances at `depth`, in level order.
    pub fn level(&self, depth: u16) -> impl Iterator<Item = InstanceId> + '_ {
        self.levels
            .get(usize::from(depth))
            .into_iter()
            .flatten()
            .map(|&slot| self.id_of(slot))
    }

    /// Number of direct children.
    #[must_use]
    pub fn child_count(&self, instance: InstanceId) -> u32 {
        self.children(instance).count() as u32
    }

    /// Whether `child` is a direct child of `parent`.
    #[must_use]
    pub fn is_child_of(&self, child: InstanceId, parent: InstanceId) -> bool {
        match (self.resolve(child), self.resolve(parent)) {
            (Some(c), Some(p)) => self.instances[c as usize].parent == p,
            _ => false,
        }
    }

    /// Direct children, most recently attached first.
    pub fn children(&self, instance: InstanceId) -> Children<'_> {
        let cursor = self
            .resolve(instance)
            .map_or(INVALID_INDEX, |slot| self.instances[slot as usize].first_child);
        Children { collection: self, cursor }
    }
}

/// Iterator over the direct children of an instance.
pub struct Children<'a> {
    collection: &'a Collection,
    cursor: u32,
}

impl Iterator for Children<'_> {
    type Item = InstanceId;

    fn next(&mut self) -> Option<InstanceId> {
        if self.cursor == INVALID_INDEX {
            return None;
        }
        let slot = self.cursor;
        self.cursor = self.collection.instances[slot as usize].sibling;
        Some(self.collection.id_of(slot))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::CollectionConfig;
    use crate::gameobject::registry::Registry;

    fn collection() -> Collection {
        Collection::new("test", Arc::new(Registry::new()), CollectionConfig::with_max_instances(300)).unwrap()
    }

    fn assert_levels_consistent(collection: &Collection) {
        for (slot, inst) in collection.instances.iter().enumerate() {
            if inst.alive {
                let level = &collection.levels[usize::from(inst.depth)];
                assert_eq!(level[inst.level_index as usize], slot as u32);
            }
        }
    }

    #[test]
    fn test_reparent_moves_subtree() {
        let mut c = collection();
        let a = c.new_instance(None).unwrap();
        let b = c.new_instance(None).unwrap();
        let d = c.new_instance(None).unwrap();
        c.set_parent(d, Some(b)).unwrap();
        c.set_parent(b, Some(a)).unwrap();

        assert_eq!(c.depth(a), Some(0));
        assert_eq!(c.depth(b), Some(1));
        assert_eq!(c.depth(d), Some(2));
        assert!(c.is_child_of(d, b));
        assert_eq!(c.parent(b), Some(a));
        assert_levels_consistent(&c);

        c.set_parent(b, None).unwrap();
        assert_eq!(c.depth(d), Some(1));
        assert_eq!(c.child_count(a), 0);
        assert_levels_consistent(&c);
    }

    #[test]
    fn test_rejects_cycles() {
        let mut c = collection();
        let a = c.new_instance(None).unwrap();
        let b = c.new_instance(None).unwrap();
        c.set_parent(b, Some(a)).unwrap();

        assert!(matches!(c.set_parent(a, Some(b)), Err(GameObjectError::InvalidOperation(_))));
        assert!(matches!(c.set_parent(a, Some(a)), Err(GameObjectError::InvalidOperation(_))));
        assert_eq!(c.parent(a), None);
        assert_eq!(c.depth(b), Some(1));
    }

    #[test]
    fn test_depth_limit_leaves_state_unchanged() {
        let mut c = collection();
        let mut chain = vec![c.new_instance(None).unwrap()];
        for _ in 1..MAX_HIERARCHICAL_DEPTH {
            let next = c.new_instance(None).unwrap();
            c.set_parent(next, chain.last().copied()).unwrap();
            chain.push(next);
        }
        let deepest = *chain.last().unwrap();
        assert_eq!(c.depth(deepest), Some(MAX_HIERARCHICAL_DEPTH - 1));

        let extra = c.new_instance(None).unwrap();
        let err = c.set_parent(extra, Some(deepest)).unwrap_err();
        assert_eq!(err, GameObjectError::MaximumHierarchicalDepth(MAX_HIERARCHICAL_DEPTH));
        assert_eq!(c.depth(extra), Some(0));
        assert_eq!(c.child_count(deepest), 0);
        assert_levels_consistent(&c);
    }

    #[test]
    fn test_children_order() {
        let mut c = collection();
        let p = c.new_instance(None).unwrap();
        let a = c.new_instance(None).unwrap();
        let b = c.new_instance(None).unwrap();
        c.set_parent(a, Some(p)).unwrap();
        c.set_parent(b, Some(p)).unwrap();
        assert_eq!(c.children(p).collect::<Vec<_>>(), vec![b, a]);
    }
}
