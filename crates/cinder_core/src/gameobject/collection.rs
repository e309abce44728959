//! # Collection
//!
//! Owner of a set of instances: the dense instance array, the free-slot pool,
//! the per-depth level arrays, the identifier table, the deferred add and
//! delete queues and one world per registered component type.
//!
//! ## Memory Layout
//!
//! ```text
//! instances:        [inst0][inst1][hole][inst3]...   (slot index, stable)
//! world_transforms: [  w0 ][  w1 ][ -- ][  w3 ]...   (parallel to instances)
//! levels[0]:        [0, 3]                           (roots)
//! levels[1]:        [1]                              (children of roots)
//! ```
//!
//! Holes are kept, not compacted, so a slot stays valid until its instance is
//! destroyed. Handles carry a generation so a reused slot does not resolve for
//! a stale [`InstanceId`].
//!
//! ## Threading
//!
//! One thread drives a collection. The identifier pool, spawn counter and
//! dynamic resource list sit behind a [`SharedState`] mutex so resource
//! callbacks on other threads may touch them.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use cinder_shared::{hash_concat, hash_str, NameHash, Transform};
use parking_lot::{const_mutex, Mutex};
use tracing::{debug, error};

use super::component::{ComponentParams, ComponentWorld, NewWorldParams, WorldParams};
use super::instance::{Instance, InstanceId, INVALID_INDEX};
use super::message::Socket;
use super::prototype::Prototype;
use super::registry::{ComponentTypeDesc, Registry};
use super::resource::ResourceFactory;
use crate::config::{CollectionConfig, MAX_HIERARCHICAL_DEPTH};
use crate::error::{GameObjectError, GameObjectResult};
use crate::memory::IndexPool;

/// Identifier of an instance that has none.
pub const UNNAMED_IDENTIFIER: NameHash = 0;

static COLLECTION_COUNTER: Mutex<u32> = const_mutex(0);

/// Returns a process-unique `collection<N>` name.
#[must_use]
pub fn unique_collection_name() -> String {
    let mut counter = COLLECTION_COUNTER.lock();
    let name = format!("collection{}", *counter);
    *counter = counter.wrapping_add(1);
    name
}

/// Hash of the generated identifier `/instance<index>`.
#[must_use]
pub fn construct_instance_id(index: u32) -> NameHash {
    hash_str(&format!("/instance{index}"))
}

/// Bookkeeping that may be touched off the simulation thread.
#[derive(Debug)]
pub struct SharedState {
    identifier_pool: IndexPool,
    spawn_counter: u32,
    dynamic_resources: Vec<NameHash>,
}

/// Cloneable handle to a collection's [`SharedState`].
#[derive(Clone, Debug)]
pub struct SharedHandle(Arc<Mutex<SharedState>>);

impl SharedHandle {
    fn new(capacity: u32) -> Self {
        Self(Arc::new(Mutex::new(SharedState {
            identifier_pool: IndexPool::new(capacity),
            spawn_counter: 0,
            dynamic_resources: Vec::new(),
        })))
    }

    /// Reserves an identifier index for a generated `/instance<N>` name.
    #[must_use]
    pub fn acquire_instance_index(&self) -> Option<u32> {
        self.0.lock().identifier_pool.pop()
    }

    /// Returns an identifier index to the pool.
    pub fn release_instance_index(&self, index: u32) {
        let mut state = self.0.lock();
        if state.identifier_pool.is_used(index) {
            state.identifier_pool.push(index);
        }
    }

    /// Number of instances spawned so far.
    #[must_use]
    pub fn spawn_count(&self) -> u32 {
        self.0.lock().spawn_counter
    }

    pub(crate) fn bump_spawn_counter(&self) {
        let mut state = self.0.lock();
        state.spawn_counter = state.spawn_counter.wrapping_add(1);
    }

    /// Tracks a resource; returns `false` if it was already tracked.
    pub fn add_dynamic_resource(&self, resource_hash: NameHash) -> bool {
        let mut state = self.0.lock();
        if state.dynamic_resources.contains(&resource_hash) {
            return false;
        }
        state.dynamic_resources.push(resource_hash);
        true
    }

    /// Stops tracking a resource; returns `false` if it was not tracked.
    pub fn remove_dynamic_resource(&self, resource_hash: NameHash) -> bool {
        let mut state = self.0.lock();
        match state.dynamic_resources.iter().position(|&h| h == resource_hash) {
            Some(pos) => {
                state.dynamic_resources.swap_remove(pos);
                true
            }
            None => false,
        }
    }

    /// Whether a resource is tracked.
    #[must_use]
    pub fn has_dynamic_resource(&self, resource_hash: NameHash) -> bool {
        self.0.lock().dynamic_resources.contains(&resource_hash)
    }

    fn take_dynamic_resources(&self) -> Vec<NameHash> {
        std::mem::take(&mut self.0.lock().dynamic_resources)
    }
}

/// A set of instances and their component worlds.
pub struct Collection {
    pub(crate) name: String,
    pub(crate) name_hash: NameHash,
    /// Prefix for relative identifiers, ends with `/`.
    pub(crate) path: String,
    pub(crate) registry: Arc<Registry>,
    pub(crate) factory: Option<Arc<dyn ResourceFactory>>,
    pub(crate) config: CollectionConfig,
    pub(crate) empty_prototype: Arc<Prototype>,

    pub(crate) instances: Vec<Instance>,
    pub(crate) generations: Vec<u32>,
    pub(crate) world_transforms: Vec<Transform>,
    pub(crate) instance_indices: IndexPool,
    pub(crate) levels: Vec<Vec<u32>>,
    pub(crate) identifiers: HashMap<NameHash, u32>,
    pub(crate) component_worlds: Vec<Option<ComponentWorld>>,
    pub(crate) input_focus_stack: Vec<u32>,

    pub(crate) add_head: u32,
    pub(crate) add_tail: u32,
    pub(crate) delete_head: u32,
    pub(crate) delete_tail: u32,

    pub(crate) component_socket: Socket,
    pub(crate) frame_socket: Socket,
    pub(crate) shared: SharedHandle,

    pub(crate) fixed_accumulator: f32,
    pub(crate) in_update: bool,
    pub(crate) dirty_transforms: bool,
    pub(crate) to_be_deleted: bool,
    pub(crate) initialized: bool,
    pub(crate) scale_along_z: bool,
}

impl Collection {
    /// Creates a collection and one world per registered component type.
    ///
    /// # Errors
    ///
    /// - [`GameObjectError::InvalidOperation`] for an out-of-range config
    /// - [`GameObjectError::HookFailed`] when a world cannot be created; worlds
    ///   created before the failure are deleted again
    pub fn new(name: &str, registry: Arc<Registry>, config: CollectionConfig) -> GameObjectResult<Self> {
        if let Err(err) = config.validate() {
            error!(%err, collection = name, "invalid collection config");
            return Err(GameObjectError::InvalidOperation("invalid collection config"));
        }
        let capacity = config.max_instances;

        let mut component_worlds: Vec<Option<ComponentWorld>> = Vec::with_capacity(registry.len());
        for (index, desc) in registry.iter().enumerate() {
            let params = NewWorldParams { component_index: index as u32, max_instances: capacity };
            match desc.behaviour.new_world(&params) {
                Ok(world) => component_worlds.push(world),
                Err(err) => {
                    error!(%err, component = %desc.name, "failed to create component world");
                    for (created, desc) in component_worlds.into_iter().zip(registry.iter()).rev() {
                        if let Some(world) = created {
                            if let Err(err) = desc.behaviour.delete_world(world) {
                                error!(%err, component = %desc.name, "failed to delete component world");
                            }
                        }
                    }
                    return Err(err.into());
                }
            }
        }

        let empty_prototype = Arc::new(Prototype::new(""));
        let n = capacity as usize;
        let name_hash = hash_str(name);
        let collection = Self {
            name: name.to_string(),
            name_hash,
            path: "/".to_string(),
            registry,
            factory: None,
            config,
            instances: (0..n)
                .map(|_| Instance::dead(Arc::clone(&empty_prototype), UNNAMED_IDENTIFIER))
                .collect(),
            empty_prototype,
            generations: vec![0; n],
            world_transforms: vec![Transform::IDENTITY; n],
            instance_indices: IndexPool::new(capacity),
            levels: (0..MAX_HIERARCHICAL_DEPTH).map(|_| Vec::new()).collect(),
            identifiers: HashMap::with_capacity(n),
            component_worlds,
            input_focus_stack: Vec::new(),
            add_head: INVALID_INDEX,
            add_tail: INVALID_INDEX,
            delete_head: INVALID_INDEX,
            delete_tail: INVALID_INDEX,
            component_socket: Socket::new(name_hash),
            frame_socket: Socket::new(hash_concat(name, "_frame")),
            shared: SharedHandle::new(capacity),
            fixed_accumulator: 0.0,
            in_update: false,
            dirty_transforms: false,
            to_be_deleted: false,
            initialized: false,
            scale_along_z: false,
        };
        debug!(collection = name, capacity, "created collection");
        Ok(collection)
    }

    /// Attaches the resource factory used for named spawns and teardown.
    #[must_use]
    pub fn with_factory(mut self, factory: Arc<dyn ResourceFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Sets the default `scale_along_z` for new instances.
    #[must_use]
    pub fn with_scale_along_z(mut self, scale_along_z: bool) -> Self {
        self.scale_along_z = scale_along_z;
        self
    }

    /// Collection name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hash of the collection name.
    #[inline]
    #[must_use]
    pub fn name_hash(&self) -> NameHash {
        self.name_hash
    }

    /// Component type table.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Active limits.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    /// Handle to the cross-thread bookkeeping.
    #[must_use]
    pub fn shared(&self) -> SharedHandle {
        self.shared.clone()
    }

    /// Instance capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.config.max_instances
    }

    /// Number of live instances.
    #[inline]
    #[must_use]
    pub fn instance_count(&self) -> u32 {
        self.instance_indices.in_use_count()
    }

    /// Whether [`Collection::mark_for_teardown`] was called.
    #[inline]
    #[must_use]
    pub fn is_pending_teardown(&self) -> bool {
        self.to_be_deleted
    }

    /// Rejects further spawns and deletes. The collection is torn down when
    /// dropped.
    pub fn mark_for_teardown(&mut self) {
        self.to_be_deleted = true;
    }

    /// Live handles in slot order.
    pub fn instances(&self) -> impl Iterator<Item = InstanceId> + '_ {
        self.instances
            .iter()
            .enumerate()
            .filter(|(_, inst)| inst.alive)
            .map(|(slot, _)| self.id_of(slot as u32))
    }

    /// Whether the handle refers to a live instance.
    #[inline]
    #[must_use]
    pub fn contains(&self, instance: InstanceId) -> bool {
        self.resolve(instance).is_some()
    }

    /// Resolves a handle to its slot.
    #[inline]
    pub(crate) fn resolve(&self, instance: InstanceId) -> Option<u32> {
        let slot = instance.index();
        let inst = self.instances.get(slot as usize)?;
        (inst.alive && self.generations[slot as usize] == instance.generation()).then_some(slot)
    }

    #[inline]
    pub(crate) fn is_live(&self, slot: u32, instance: InstanceId) -> bool {
        self.resolve(instance) == Some(slot)
    }

    /// Handle of the instance currently in `slot`.
    #[inline]
    pub(crate) fn id_of(&self, slot: u32) -> InstanceId {
        InstanceId::new(slot, self.generations[slot as usize])
    }

    pub(crate) fn require(&self, instance: InstanceId) -> GameObjectResult<u32> {
        self.resolve(instance).ok_or(GameObjectError::InstanceNotFound)
    }

    /// Manifest position of the component with `component_id`.
    pub(crate) fn find_component_index(&self, slot: u32, component_id: NameHash) -> Option<usize> {
        self.instances[slot as usize]
            .prototype
            .components()
            .iter()
            .position(|c| c.id == component_id)
    }

    /// Manifest position of a component.
    ///
    /// # Errors
    ///
    /// [`GameObjectError::InstanceNotFound`] or
    /// [`GameObjectError::ComponentNotFound`].
    pub fn component_index(&self, instance: InstanceId, component_id: NameHash) -> GameObjectResult<u16> {
        let slot = self.require(instance)?;
        self.find_component_index(slot, component_id)
            .map(|i| i as u16)
            .ok_or(GameObjectError::ComponentNotFound(component_id))
    }

    /// Component id at a manifest position.
    ///
    /// # Errors
    ///
    /// [`GameObjectError::InstanceNotFound`] or
    /// [`GameObjectError::InvalidOperation`] for an index out of range.
    pub fn component_id(&self, instance: InstanceId, component_index: u16) -> GameObjectResult<NameHash> {
        let slot = self.require(instance)?;
        self.instances[slot as usize]
            .prototype
            .components()
            .get(usize::from(component_index))
            .map(|c| c.id)
            .ok_or(GameObjectError::InvalidOperation("component index out of range"))
    }

    /// The world of a component type, if it has one and it is not lent out.
    pub fn component_world<T: Any>(&mut self, type_index: u32) -> Option<&mut T> {
        self.component_worlds
            .get_mut(type_index as usize)?
            .as_deref_mut()?
            .downcast_mut::<T>()
    }

    pub(crate) fn take_world(&mut self, type_index: u32) -> Option<ComponentWorld> {
        self.component_worlds.get_mut(type_index as usize)?.take()
    }

    pub(crate) fn restore_world(&mut self, type_index: u32, world: Option<ComponentWorld>) {
        if let (Some(world), Some(entry)) = (world, self.component_worlds.get_mut(type_index as usize)) {
            *entry = Some(world);
        }
    }

    /// Position of a component's slot in the instance user-data array.
    fn user_data_slot(&self, prototype: &Prototype, component_index: usize) -> Option<usize> {
        let components = prototype.components();
        let has = |i: usize| {
            self.registry
                .component_type(components[i].type_index)
                .is_some_and(|d| d.instance_has_user_data)
        };
        if !has(component_index) {
            return None;
        }
        Some((0..component_index).filter(|&i| has(i)).count())
    }

    /// Runs `f` with the params of one component, lending it the type's world.
    ///
    /// User data is copied out before the call and written back afterwards
    /// if the instance is still alive. `None` when the component index or its
    /// type is unknown.
    pub(crate) fn with_component<R>(
        &mut self,
        slot: u32,
        component_index: usize,
        f: impl FnOnce(&ComponentTypeDesc, &mut ComponentParams<'_>) -> R,
    ) -> Option<R> {
        let prototype = Arc::clone(&self.instances[slot as usize].prototype);
        let type_index = prototype.components().get(component_index)?.type_index;
        let registry = Arc::clone(&self.registry);
        let desc = registry.component_type(type_index)?;

        let user_data_slot = self.user_data_slot(&prototype, component_index);
        let mut user_data = user_data_slot.map_or(0, |i| self.instances[slot as usize].user_data[i]);
        let instance = self.id_of(slot);
        let mut world = self.take_world(type_index);

        let result = {
            let mut params = ComponentParams {
                collection: self,
                instance,
                component_index: component_index as u16,
                world: world.as_deref_mut(),
                user_data: &mut user_data,
            };
            f(desc, &mut params)
        };

        self.restore_world(type_index, world);
        if let Some(i) = user_data_slot {
            if self.is_live(slot, instance) {
                self.instances[slot as usize].user_data[i] = user_data;
            }
        }
        Some(result)
    }

    /// Runs `f` with the params of a component type, lending it its world.
    pub(crate) fn with_world<R>(
        &mut self,
        type_index: u32,
        f: impl FnOnce(&ComponentTypeDesc, &mut WorldParams<'_>) -> R,
    ) -> Option<R> {
        let registry = Arc::clone(&self.registry);
        let desc = registry.component_type(type_index)?;
        let mut world = self.take_world(type_index);
        let result = {
            let mut params = WorldParams { collection: self, world: world.as_deref_mut() };
            f(desc, &mut params)
        };
        self.restore_world(type_index, world);
        Some(result)
    }
}

impl Drop for Collection {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("instances", &self.instance_count())
            .field("capacity", &self.capacity())
            .field("in_update", &self.in_update)
            .finish_non_exhaustive()
    }
}

impl Collection {
    /// Finalizes, destroys every instance, deletes the worlds and releases
    /// dynamic resources. Runs once, from `Drop`.
    fn teardown(&mut self) {
        self.to_be_deleted = true;
        self.finalize();

        let live: Vec<InstanceId> = self.instances().collect();
        for instance in live {
            if let Some(slot) = self.resolve(instance) {
                self.do_delete(slot);
            }
        }
        self.add_head = INVALID_INDEX;
        self.add_tail = INVALID_INDEX;
        self.delete_head = INVALID_INDEX;
        self.delete_tail = INVALID_INDEX;

        let registry = Arc::clone(&self.registry);
        for (index, desc) in registry.iter().enumerate().rev() {
            if let Some(world) = self.take_world(index as u32) {
                if let Err(err) = desc.behaviour.delete_world(world) {
                    error!(%err, component = %desc.name, "failed to delete component world");
                }
            }
        }

        let resources = self.shared.take_dynamic_resources();
        if let Some(factory) = &self.factory {
            for hash in resources {
                factory.release(hash);
            }
        }
        debug!(collection = %self.name, "collection torn down");
    }
}
