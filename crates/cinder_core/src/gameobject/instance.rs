//! # Instances
//!
//! An instance is a slot in a collection's dense array. External code holds
//! an [`InstanceId`], which pairs the slot with a generation so a handle to a
//! destroyed instance never resolves to whatever reuses the slot.

use std::sync::Arc;

use cinder_shared::{NameHash, Transform, Vec3};

use super::prototype::Prototype;

/// Sentinel for "no slot" in hierarchy and queue links.
pub(crate) const INVALID_INDEX: u32 = u32::MAX;

/// Handle to an instance.
///
/// - Lower 32 bits: slot index
/// - Upper 32 bits: generation of the slot when the instance was created
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Creates an id from slot index and generation.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Slot generation.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Raw 64-bit value.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    /// Rebuilds an id from [`InstanceId::to_bits`].
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Null/invalid id.
    pub const NULL: Self = Self(u64::MAX);

    /// Checks if this id is null.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u64::MAX
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::NULL
    }
}

/// Per-slot instance record.
///
/// Hierarchy and queue links are slot indices into the owning collection.
#[derive(Clone, Debug)]
pub(crate) struct Instance {
    pub(crate) alive: bool,
    pub(crate) prototype: Arc<Prototype>,
    /// Name hash, or the unnamed sentinel.
    pub(crate) identifier: NameHash,
    /// Identifier-pool index backing a generated `/instanceN` name.
    pub(crate) identifier_index: u32,
    pub(crate) transform: Transform,
    pub(crate) euler: Vec3,
    pub(crate) prev_euler: Vec3,
    pub(crate) parent: u32,
    pub(crate) first_child: u32,
    pub(crate) sibling: u32,
    pub(crate) depth: u16,
    pub(crate) level_index: u32,
    pub(crate) next_to_add: u32,
    pub(crate) next_to_delete: u32,
    /// One slot per component whose type keeps instance user data.
    pub(crate) user_data: Box<[usize]>,
    pub(crate) initialized: bool,
    pub(crate) to_be_added: bool,
    pub(crate) to_be_deleted: bool,
    pub(crate) scale_along_z: bool,
}

impl Instance {
    /// A live instance at the root with identity transform.
    pub(crate) fn new(
        prototype: Arc<Prototype>,
        identifier: NameHash,
        user_data_slots: usize,
        scale_along_z: bool,
    ) -> Self {
        Self {
            alive: true,
            prototype,
            identifier,
            identifier_index: INVALID_INDEX,
            transform: Transform::IDENTITY,
            euler: Vec3::ZERO,
            prev_euler: Vec3::ZERO,
            parent: INVALID_INDEX,
            first_child: INVALID_INDEX,
            sibling: INVALID_INDEX,
            depth: 0,
            level_index: INVALID_INDEX,
            next_to_add: INVALID_INDEX,
            next_to_delete: INVALID_INDEX,
            user_data: vec![0; user_data_slots].into_boxed_slice(),
            initialized: false,
            to_be_added: false,
            to_be_deleted: false,
            scale_along_z,
        }
    }

    /// A zeroed hole.
    pub(crate) fn dead(prototype: Arc<Prototype>, identifier: NameHash) -> Self {
        Self {
            alive: false,
            ..Self::new(prototype, identifier, 0, false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_id_packing() {
        let id = InstanceId::new(7, 3);
        assert_eq!(id.index(), 7);
        assert_eq!(id.generation(), 3);
        assert_eq!(InstanceId::from_bits(id.to_bits()), id);
        assert!(!id.is_null());
        assert!(InstanceId::default().is_null());
    }
}
