//! Resource collaborator seam.
//!
//! The core never loads files. Prototypes and component resources come from a
//! [`ResourceFactory`], and dynamically acquired resources are handed back to
//! it when their collection goes away.

use std::sync::Arc;

use cinder_shared::NameHash;

use super::component::Resource;
use super::prototype::Prototype;
use crate::error::{GameObjectError, GameObjectResult};

/// Loads and releases resources on behalf of a collection.
pub trait ResourceFactory: Send + Sync {
    /// Looks up a prototype by name.
    ///
    /// # Errors
    ///
    /// [`GameObjectError::ResourceNotFound`] when the name is unknown.
    fn get_prototype(&self, name: &str) -> GameObjectResult<Arc<Prototype>>;

    /// Looks up a component resource by name.
    ///
    /// # Errors
    ///
    /// [`GameObjectError::ResourceNotFound`] when the name is unknown.
    fn get(&self, name: &str) -> GameObjectResult<Resource> {
        Err(GameObjectError::ResourceNotFound(name.to_string()))
    }

    /// Drops one reference to a resource.
    fn release(&self, resource_hash: NameHash) {
        let _ = resource_hash;
    }
}
