//! # Component Type Registry
//!
//! Append-only table of component types, built once at startup and shared by
//! every collection through an `Arc`. The registry also owns the dispatch
//! order: types run by ascending update priority, ties in registration order.

use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;

use cinder_shared::{hash_str, NameHash};
use tracing::{debug, warn};

use super::component::ComponentType;
use crate::error::{GameObjectError, GameObjectResult};

/// Maximum number of registered component types.
pub const MAX_COMPONENT_TYPES: usize = 128;

/// Resource type tag: the hash of the resource extension (`"spritec"`).
pub type ResourceType = NameHash;

/// Hashes a resource extension into a [`ResourceType`].
#[must_use]
pub fn resource_type(extension: &str) -> ResourceType {
    hash_str(extension)
}

/// Set of optional hooks a component type implements.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Hooks(u16);

impl Hooks {
    /// No optional hooks.
    pub const NONE: Self = Self(0);
    /// [`ComponentType::init`]
    pub const INIT: Self = Self(1 << 0);
    /// [`ComponentType::finalize`]
    pub const FINAL: Self = Self(1 << 1);
    /// [`ComponentType::add_to_update`]
    pub const ADD_TO_UPDATE: Self = Self(1 << 2);
    /// [`ComponentType::update`]
    pub const UPDATE: Self = Self(1 << 3);
    /// [`ComponentType::fixed_update`]
    pub const FIXED_UPDATE: Self = Self(1 << 4);
    /// [`ComponentType::post_update`]
    pub const POST_UPDATE: Self = Self(1 << 5);
    /// [`ComponentType::on_message`]
    pub const ON_MESSAGE: Self = Self(1 << 6);
    /// [`ComponentType::on_input`]
    pub const ON_INPUT: Self = Self(1 << 7);
    /// [`ComponentType::on_reload`]
    pub const ON_RELOAD: Self = Self(1 << 8);
    /// [`ComponentType::get_property`]
    pub const GET_PROPERTY: Self = Self(1 << 9);
    /// [`ComponentType::set_property`]
    pub const SET_PROPERTY: Self = Self(1 << 10);

    /// Whether every hook in `other` is present.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Union of two sets.
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl BitOr for Hooks {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// Registration record of a component type.
#[derive(Clone)]
pub struct ComponentTypeDesc {
    /// Display name, also the resource extension.
    pub name: String,
    /// Tag resolved by prototypes.
    pub resource_type: ResourceType,
    /// Optional hooks the behaviour implements.
    pub hooks: Hooks,
    /// Dispatch priority, lower runs first.
    pub update_order_prio: u16,
    /// Whether instances keep a persistent user-data slot for this type.
    pub instance_has_user_data: bool,
    /// Whether the update hook reads world transforms.
    pub reads_transforms: bool,
    /// Hook implementation.
    pub behaviour: Arc<dyn ComponentType>,
}

impl ComponentTypeDesc {
    /// Creates a record keyed by `name` with no optional hooks.
    pub fn new(name: &str, behaviour: Arc<dyn ComponentType>) -> Self {
        Self {
            name: name.to_string(),
            resource_type: resource_type(name),
            hooks: Hooks::NONE,
            update_order_prio: 0,
            instance_has_user_data: false,
            reads_transforms: true,
            behaviour,
        }
    }

    /// Declares the implemented hooks.
    #[must_use]
    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Sets the dispatch priority.
    #[must_use]
    pub fn with_update_prio(mut self, prio: u16) -> Self {
        self.update_order_prio = prio;
        self
    }

    /// Gives each component a persistent user-data slot.
    #[must_use]
    pub fn with_user_data(mut self) -> Self {
        self.instance_has_user_data = true;
        self
    }

    /// Sets whether update needs fresh world transforms.
    #[must_use]
    pub fn with_reads_transforms(mut self, reads: bool) -> Self {
        self.reads_transforms = reads;
        self
    }

    /// Whether the type implements `hooks`.
    #[inline]
    #[must_use]
    pub fn has(&self, hooks: Hooks) -> bool {
        self.hooks.contains(hooks)
    }
}

impl fmt::Debug for ComponentTypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentTypeDesc")
            .field("name", &self.name)
            .field("hooks", &self.hooks)
            .field("update_order_prio", &self.update_order_prio)
            .field("instance_has_user_data", &self.instance_has_user_data)
            .finish_non_exhaustive()
    }
}

/// The component type table.
#[derive(Debug)]
pub struct Registry {
    types: Vec<ComponentTypeDesc>,
    /// Registration indices in dispatch order.
    order: Vec<u32>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            types: Vec::with_capacity(MAX_COMPONENT_TYPES),
            order: Vec::with_capacity(MAX_COMPONENT_TYPES),
        }
    }

    /// Number of registered types.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether no type is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Appends a component type and returns its registration index.
    ///
    /// # Errors
    ///
    /// - [`GameObjectError::OutOfResources`] when the table is full
    /// - [`GameObjectError::AlreadyRegistered`] for a duplicate resource type
    /// - [`GameObjectError::InvalidOperation`] when an update hook is declared
    ///   without `ADD_TO_UPDATE`
    pub fn register_component_type(&mut self, desc: ComponentTypeDesc) -> GameObjectResult<u32> {
        if self.types.len() >= MAX_COMPONENT_TYPES {
            warn!(name = %desc.name, "component type table full");
            return Err(GameObjectError::OutOfResources("component types"));
        }
        if self.find_component_type(desc.resource_type).is_some() {
            return Err(GameObjectError::AlreadyRegistered(desc.resource_type));
        }
        let updates = desc.has(Hooks::UPDATE) || desc.has(Hooks::FIXED_UPDATE);
        if updates && !desc.has(Hooks::ADD_TO_UPDATE) {
            warn!(name = %desc.name, "update hook declared without add_to_update");
            return Err(GameObjectError::InvalidOperation("update hook requires add_to_update"));
        }

        let index = self.types.len() as u32;
        debug!(name = %desc.name, index, prio = desc.update_order_prio, "registered component type");
        self.types.push(desc);
        self.order.push(index);
        self.sort_component_types();
        Ok(index)
    }

    /// Resolves a resource type to its registration index and record.
    #[must_use]
    pub fn find_component_type(&self, resource_type: ResourceType) -> Option<(u32, &ComponentTypeDesc)> {
        self.types
            .iter()
            .enumerate()
            .find(|(_, desc)| desc.resource_type == resource_type)
            .map(|(i, desc)| (i as u32, desc))
    }

    /// Record by registration index.
    #[inline]
    #[must_use]
    pub fn component_type(&self, index: u32) -> Option<&ComponentTypeDesc> {
        self.types.get(index as usize)
    }

    /// All records in registration order.
    pub fn iter(&self) -> std::slice::Iter<'_, ComponentTypeDesc> {
        self.types.iter()
    }

    /// Changes the dispatch priority of a type and re-sorts.
    ///
    /// # Errors
    ///
    /// [`GameObjectError::ResourceTypeNotFound`] for unknown types.
    pub fn set_update_order_prio(&mut self, resource_type: ResourceType, prio: u16) -> GameObjectResult<()> {
        let desc = self
            .types
            .iter_mut()
            .find(|desc| desc.resource_type == resource_type)
            .ok_or(GameObjectError::ResourceTypeNotFound(resource_type))?;
        desc.update_order_prio = prio;
        self.sort_component_types();
        Ok(())
    }

    /// Orders dispatch by ascending priority, ties in registration order.
    pub fn sort_component_types(&mut self) {
        let types = &self.types;
        self.order.sort_by_key(|&i| (types[i as usize].update_order_prio, i));
    }

    /// Registration indices in dispatch order.
    #[inline]
    #[must_use]
    pub fn update_order(&self) -> &[u32] {
        &self.order
    }
}
