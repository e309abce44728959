//! # Prototypes
//!
//! A prototype is the in-memory component manifest an instance is created
//! from. Loading one from disk belongs to the resource layer; the core only
//! reads the manifest.

use std::fmt;

use cinder_shared::{hash_str, NameHash, Quat, Vec3};

use super::component::Resource;
use super::property::PropertyVar;
use super::registry::{Registry, ResourceType};
use crate::error::{GameObjectError, GameObjectResult};

/// One component entry of a manifest.
#[derive(Clone)]
pub struct PrototypeComponent {
    /// Component id, unique within the prototype.
    pub id: NameHash,
    /// Registration index of the component type.
    pub type_index: u32,
    /// Resource handed to `create`.
    pub resource: Option<Resource>,
    /// Hash of the resource name, matched on reload.
    pub resource_hash: NameHash,
    /// Local offset of the component.
    pub position: Vec3,
    /// Local rotation of the component.
    pub rotation: Quat,
    /// Property overrides handed to `create`.
    pub properties: Vec<(NameHash, PropertyVar)>,
}

impl PrototypeComponent {
    /// Attaches a resource.
    #[must_use]
    pub fn with_resource(mut self, name: &str, resource: Resource) -> Self {
        self.resource_hash = hash_str(name);
        self.resource = Some(resource);
        self
    }

    /// Sets the local offset.
    #[must_use]
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Sets the local rotation.
    #[must_use]
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Adds a property override.
    #[must_use]
    pub fn with_property(mut self, id: &str, value: PropertyVar) -> Self {
        self.properties.push((hash_str(id), value));
        self
    }
}

impl fmt::Debug for PrototypeComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrototypeComponent")
            .field("id", &self.id)
            .field("type_index", &self.type_index)
            .field("resource_hash", &self.resource_hash)
            .field("properties", &self.properties.len())
            .finish_non_exhaustive()
    }
}

/// Component manifest.
#[derive(Clone, Debug, Default)]
pub struct Prototype {
    name: String,
    components: Vec<PrototypeComponent>,
}

impl Prototype {
    /// Empty manifest.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), components: Vec::new() }
    }

    /// Name the prototype was loaded under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Components in manifest order.
    #[must_use]
    pub fn components(&self) -> &[PrototypeComponent] {
        &self.components
    }

    /// Appends a component of the type registered for `resource_type`.
    ///
    /// # Errors
    ///
    /// - [`GameObjectError::ResourceTypeNotFound`] for unregistered types
    /// - [`GameObjectError::AlreadyRegistered`] for a duplicate component id
    pub fn add_component(
        &mut self,
        registry: &Registry,
        id: &str,
        resource_type: ResourceType,
    ) -> GameObjectResult<&mut PrototypeComponent> {
        self.push(registry, id, resource_type, |c| c)
    }

    /// Builder form of [`Prototype::add_component`].
    ///
    /// # Errors
    ///
    /// As [`Prototype::add_component`].
    pub fn with_component(
        mut self,
        registry: &Registry,
        id: &str,
        resource_type: ResourceType,
        configure: impl FnOnce(PrototypeComponent) -> PrototypeComponent,
    ) -> GameObjectResult<Self> {
        self.push(registry, id, resource_type, configure)?;
        Ok(self)
    }

    fn push(
        &mut self,
        registry: &Registry,
        id: &str,
        resource_type: ResourceType,
        configure: impl FnOnce(PrototypeComponent) -> PrototypeComponent,
    ) -> GameObjectResult<&mut PrototypeComponent> {
        let (type_index, _) = registry
            .find_component_type(resource_type)
            .ok_or(GameObjectError::ResourceTypeNotFound(resource_type))?;
        let id = hash_str(id);
        if self.components.iter().any(|c| c.id == id) {
            return Err(GameObjectError::AlreadyRegistered(id));
        }
        let component = configure(PrototypeComponent {
            id,
            type_index,
            resource: None,
            resource_hash: 0,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            properties: Vec::new(),
        });
        let index = self.components.len();
        self.components.push(component);
        Ok(&mut self.components[index])
    }

    /// Number of user-data slots an instance of this prototype needs.
    #[must_use]
    pub fn user_data_slots(&self, registry: &Registry) -> usize {
        self.components
            .iter()
            .filter(|c| registry.component_type(c.type_index).is_some_and(|d| d.instance_has_user_data))
            .count()
    }
}
