//! # Component Types
//!
//! A component type is a behaviour kind: sprites, scripts, the animation
//! pool. Each registered type supplies a [`ComponentType`] object whose hooks
//! the collection calls at fixed points of the frame.
//!
//! Hooks are opt-in. Every method has a no-op default, and the collection only
//! calls the ones named in the type's [`Hooks`](super::registry::Hooks) mask.
//! `new_world`, `delete_world`, `create` and `destroy` are always called.
//!
//! ## Worlds
//!
//! Each collection owns one world per component type, created by
//! [`ComponentType::new_world`]. While a hook runs, the world is lent to it
//! through the params struct and the collection itself is passed as
//! `&mut Collection`, so a hook can both touch its pooled storage and call
//! back into the collection (spawn, delete, post, set properties).

use std::any::Any;
use std::sync::Arc;

use cinder_shared::{NameHash, Quat, Vec3};

use super::collection::Collection;
use super::input::{InputAction, InputResult};
use super::instance::InstanceId;
use super::message::Message;
use super::property::{PropertyDesc, PropertyVar};
use super::update::UpdateContext;
use crate::error::{HookError, HookResult, PropertyError, PropertyResult};

/// Opaque resource handle owned by the resource collaborator.
pub type Resource = Arc<dyn Any + Send + Sync>;

/// Per-collection component world.
pub type ComponentWorld = Box<dyn Any + Send>;

/// Arguments for [`ComponentType::new_world`].
#[derive(Clone, Copy, Debug)]
pub struct NewWorldParams {
    /// Registration index of the type.
    pub component_index: u32,
    /// Instance capacity of the collection.
    pub max_instances: u32,
}

/// Arguments for per-component hooks.
pub struct ComponentParams<'a> {
    /// Owning collection.
    pub collection: &'a mut Collection,
    /// Instance the component belongs to.
    pub instance: InstanceId,
    /// Position of the component in the instance's manifest.
    pub component_index: u16,
    /// The type's world, if it has one and it is not already lent out.
    pub world: Option<&'a mut (dyn Any + Send)>,
    /// Persistent per-component slot. Scratch when the type keeps no user data.
    pub user_data: &'a mut usize,
}

impl ComponentParams<'_> {
    /// Downcasts the world.
    pub fn world_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.world.as_deref_mut()?.downcast_mut::<T>()
    }
}

/// Arguments for per-type hooks that run without an instance.
pub struct WorldParams<'a> {
    /// Owning collection.
    pub collection: &'a mut Collection,
    /// The type's world.
    pub world: Option<&'a mut (dyn Any + Send)>,
}

impl WorldParams<'_> {
    /// Downcasts the world.
    pub fn world_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.world.as_deref_mut()?.downcast_mut::<T>()
    }
}

/// Arguments for the bulk update hooks.
pub struct UpdateParams<'a> {
    /// Owning collection.
    pub collection: &'a mut Collection,
    /// The type's world.
    pub world: Option<&'a mut (dyn Any + Send)>,
    /// Frame timing.
    pub context: &'a UpdateContext,
}

impl UpdateParams<'_> {
    /// Downcasts the world.
    pub fn world_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.world.as_deref_mut()?.downcast_mut::<T>()
    }
}

/// Output of the bulk update hooks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateResult {
    /// Set when the hook moved instances, forcing a transform pass.
    pub transforms_updated: bool,
}

/// Creation data for one component.
#[derive(Clone, Copy)]
pub struct CreateDesc<'a> {
    /// Local position of the component.
    pub position: Vec3,
    /// Local rotation of the component.
    pub rotation: Quat,
    /// Resource from the manifest.
    pub resource: Option<&'a Resource>,
    /// Property overrides from the manifest.
    pub properties: &'a [(NameHash, PropertyVar)],
}

/// Behaviour of a registered component type.
#[allow(unused_variables)]
pub trait ComponentType: Send + Sync {
    /// Creates the per-collection world.
    ///
    /// # Errors
    ///
    /// A failure aborts collection creation.
    fn new_world(&self, params: &NewWorldParams) -> Result<Option<ComponentWorld>, HookError> {
        Ok(None)
    }

    /// Destroys the per-collection world.
    ///
    /// # Errors
    ///
    /// Reported and ignored during teardown.
    fn delete_world(&self, world: ComponentWorld) -> HookResult {
        drop(world);
        Ok(())
    }

    /// Creates the component for a new instance.
    ///
    /// # Errors
    ///
    /// A failure rolls back the whole instance.
    fn create(&self, params: &mut ComponentParams<'_>, desc: &CreateDesc<'_>) -> HookResult {
        Ok(())
    }

    /// Destroys the component.
    ///
    /// # Errors
    ///
    /// Counted as a failed frame; destruction continues.
    fn destroy(&self, params: &mut ComponentParams<'_>) -> HookResult {
        Ok(())
    }

    /// Runs once before the first update of the instance.
    ///
    /// # Errors
    ///
    /// A failed init deletes a freshly spawned instance.
    fn init(&self, params: &mut ComponentParams<'_>) -> HookResult {
        Ok(())
    }

    /// Runs once before destruction if the instance was initialized.
    ///
    /// # Errors
    ///
    /// Counted as a failed frame.
    fn finalize(&self, params: &mut ComponentParams<'_>) -> HookResult {
        Ok(())
    }

    /// Opts the component into the update set.
    ///
    /// # Errors
    ///
    /// Counted as a failed frame.
    fn add_to_update(&self, params: &mut ComponentParams<'_>) -> HookResult {
        Ok(())
    }

    /// Bulk update of every component of this type in the collection.
    ///
    /// # Errors
    ///
    /// Counted as a failed frame.
    fn update(&self, params: &mut UpdateParams<'_>, result: &mut UpdateResult) -> HookResult {
        Ok(())
    }

    /// Bulk update with the fixed time step.
    ///
    /// # Errors
    ///
    /// Counted as a failed frame.
    fn fixed_update(&self, params: &mut UpdateParams<'_>, result: &mut UpdateResult) -> HookResult {
        Ok(())
    }

    /// Runs at the start of post-update.
    ///
    /// # Errors
    ///
    /// Counted as a failed frame.
    fn post_update(&self, params: &mut WorldParams<'_>) -> HookResult {
        Ok(())
    }

    /// Receives a message addressed to the component or broadcast to its
    /// instance.
    ///
    /// # Errors
    ///
    /// Counted as a failed dispatch.
    fn on_message(&self, params: &mut ComponentParams<'_>, message: &Message) -> HookResult {
        Ok(())
    }

    /// Receives an input action while the instance holds input focus.
    ///
    /// # Errors
    ///
    /// Aborts input dispatch for the remaining stack.
    fn on_input(
        &self,
        params: &mut ComponentParams<'_>,
        action: &InputAction,
    ) -> Result<InputResult, HookError> {
        Ok(InputResult::Ignored)
    }

    /// The component's resource was reloaded.
    fn on_reload(&self, params: &mut ComponentParams<'_>, resource: &Resource) {}

    /// Reads a component-owned property.
    ///
    /// # Errors
    ///
    /// [`PropertyError::NotFound`] for unknown ids.
    fn get_property(
        &self,
        params: &mut ComponentParams<'_>,
        property_id: NameHash,
    ) -> PropertyResult<PropertyDesc> {
        Err(PropertyError::NotFound)
    }

    /// Writes a component-owned property.
    ///
    /// # Errors
    ///
    /// [`PropertyError::NotFound`] for unknown ids,
    /// [`PropertyError::TypeMismatch`] for wrong value types.
    fn set_property(
        &self,
        params: &mut ComponentParams<'_>,
        property_id: NameHash,
        value: &PropertyVar,
    ) -> PropertyResult<()> {
        Err(PropertyError::NotFound)
    }
}
