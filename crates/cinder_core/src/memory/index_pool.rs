//! # Index Pool
//!
//! Fixed-capacity free list of small integer handles.

/// A pool of reusable indices in `0..capacity`.
///
/// Indices come out lowest-first on a fresh pool and are reused LIFO after
/// being pushed back. Pushing an index that is not in use is a programmer
/// error and trips a debug assertion.
///
/// # Example
///
/// ```rust
/// use cinder_core::IndexPool;
///
/// let mut pool = IndexPool::new(4);
/// let a = pool.pop().unwrap();
/// assert_eq!(a, 0);
/// pool.push(a);
/// assert_eq!(pool.remaining(), 4);
/// ```
#[derive(Clone, Debug)]
pub struct IndexPool {
    /// Free indices, popped from the back.
    free_list: Vec<u32>,
    /// Whether each index is handed out.
    in_use: Box<[bool]>,
}

impl IndexPool {
    /// Creates a pool with every index free.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of indices
    #[must_use]
    pub fn new(capacity: u32) -> Self {
        Self {
            free_list: (0..capacity).rev().collect(),
            in_use: vec![false; capacity as usize].into_boxed_slice(),
        }
    }

    /// Total number of indices.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.in_use.len() as u32
    }

    /// Number of free indices.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.free_list.len() as u32
    }

    /// Number of indices handed out.
    #[inline]
    #[must_use]
    pub fn in_use_count(&self) -> u32 {
        self.capacity() - self.remaining()
    }

    /// Takes a free index, or `None` when exhausted.
    pub fn pop(&mut self) -> Option<u32> {
        let index = self.free_list.pop()?;
        self.in_use[index as usize] = true;
        Some(index)
    }

    /// Returns an index to the pool.
    pub fn push(&mut self, index: u32) {
        let slot = &mut self.in_use[index as usize];
        debug_assert!(*slot, "index {index} returned to the pool twice");
        if *slot {
            *slot = false;
            self.free_list.push(index);
        }
    }

    /// Whether `index` is currently handed out.
    #[inline]
    #[must_use]
    pub fn is_used(&self, index: u32) -> bool {
        self.in_use.get(index as usize).copied().unwrap_or(false)
    }

    /// Frees every index.
    pub fn clear(&mut self) {
        self.in_use.fill(false);
        self.free_list.clear();
        self.free_list.extend((0..self.capacity()).rev());
    }
}
