//! # Memory Management
//!
//! Slot allocation for the dense arrays used by collections and the
//! animation pool. Slots are plain integers; nothing hands out references.

mod index_pool;

pub use index_pool::IndexPool;
