//! # Instance Lifecycle
//!
//! ```text
//! new_instance / spawn ──► create hooks ──► init ──► add-to-update queue
//!                                                          │ (next update)
//!                                                          ▼
//!                              delete ──► delete queue ──► post_update:
//!                                                          final, dispatch,
//!                                                          destroy, free slot
//! ```
//!
//! Structural changes never happen while the instance array is iterated.
//! Additions and deletions are threaded through the instances' queue links
//! and drained at fixed points of the frame.

use std::sync::Arc;

use cinder_shared::{hash_concat, hash_str, NameHash, Quat, Transform, Vec3};
use tracing::{debug, error, warn};

use super::collection::{construct_instance_id, Collection, UNNAMED_IDENTIFIER};
use super::component::{CreateDesc, Resource};
use super::instance::{Instance, InstanceId, INVALID_INDEX};
use super::property::PropertyVar;
use super::prototype::Prototype;
use super::registry::Hooks;
use crate::error::{GameObjectError, GameObjectResult, HookError, HookResult};

/// Property override applied to a freshly spawned instance before init.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnProperty {
    /// Component id; zero for the instance transform.
    pub component_id: NameHash,
    /// Property id.
    pub property_id: NameHash,
    /// Value to set.
    pub value: PropertyVar,
}

impl SpawnProperty {
    /// Creates an override from names.
    #[must_use]
    pub fn new(component: &str, property: &str, value: PropertyVar) -> Self {
        let component_id = if component.is_empty() { 0 } else { hash_str(component) };
        Self { component_id, property_id: hash_str(property), value }
    }
}

impl Collection {
    /// Sets the prefix used by [`Collection::absolute_identifier`].
    pub fn set_path(&mut self, path: &str) {
        self.path = if path.ends_with('/') { path.to_string() } else { format!("{path}/") };
    }

    /// Resolves a prototype through the resource factory.
    ///
    /// # Errors
    ///
    /// [`GameObjectError::ResourceNotFound`] without a factory or for unknown
    /// names.
    pub fn prototype(&self, name: &str) -> GameObjectResult<Arc<Prototype>> {
        match &self.factory {
            Some(factory) => factory.get_prototype(name),
            None => Err(GameObjectError::ResourceNotFound(name.to_string())),
        }
    }

    fn alloc_slot(&mut self, prototype: Arc<Prototype>) -> GameObjectResult<u32> {
        let Some(slot) = self.instance_indices.pop() else {
            warn!(
                collection = %self.name,
                capacity = self.config.max_instances,
                "unable to create instance, instance pool is full"
            );
            return Err(GameObjectError::OutOfResources("instances"));
        };
        let slots = prototype.user_data_slots(&self.registry);
        self.instances[slot as usize] = Instance::new(prototype, UNNAMED_IDENTIFIER, slots, self.scale_along_z);
        self.world_transforms[slot as usize] = Transform::IDENTITY;
        self.insert_into_level(slot, 0);
        Ok(slot)
    }

    fn free_slot(&mut self, slot: u32) {
        self.erase_from_level(slot);
        self.instances[slot as usize] = Instance::dead(Arc::clone(&self.empty_prototype), UNNAMED_IDENTIFIER);
        let generation = &mut self.generations[slot as usize];
        *generation = generation.wrapping_add(1);
        self.instance_indices.push(slot);
    }

    /// Runs the create hooks in manifest order. Rolls back in reverse on the
    /// first failure.
    fn create_components(&mut self, slot: u32) -> GameObjectResult<()> {
        let prototype = Arc::clone(&self.instances[slot as usize].prototype);
        for (index, component) in prototype.components().iter().enumerate() {
            let create = CreateDesc {
                position: component.position,
                rotation: component.rotation,
                resource: component.resource.as_ref(),
                properties: &component.properties,
            };
            let result = self
                .with_component(slot, index, |desc, params| desc.behaviour.create(params, &create))
                .unwrap_or_else(|| Err(HookError::new("unknown component type")));
            if let Err(err) = result {
                error!(%err, component = component.id, "failed to create component");
                self.destroy_components(slot, index);
                return Err(err.into());
            }
        }
        Ok(())
    }

    /// Destroys the first `count` components, last first.
    fn destroy_components(&mut self, slot: u32, count: usize) -> bool {
        let mut success = true;
        for index in (0..count).rev() {
            let result = self.with_component(slot, index, |desc, params| desc.behaviour.destroy(params));
            if let Some(Err(err)) = result {
                error!(%err, "failed to destroy component");
                success = false;
            }
        }
        success
    }

    /// Creates an unnamed instance at the root and runs its create hooks.
    ///
    /// `None` creates an instance without components. The instance is not
    /// initialized.
    ///
    /// # Errors
    ///
    /// - [`GameObjectError::OutOfResources`] when the pool is full
    /// - [`GameObjectError::HookFailed`] when a create hook fails; the
    ///   instance is rolled back
    pub fn new_instance(&mut self, prototype: Option<Arc<Prototype>>) -> GameObjectResult<InstanceId> {
        let prototype = prototype.unwrap_or_else(|| Arc::clone(&self.empty_prototype));
        let slot = self.alloc_slot(prototype)?;
        if let Err(err) = self.create_components(slot) {
            self.free_slot(slot);
            return Err(err);
        }
        self.dirty_transforms = true;
        Ok(self.id_of(slot))
    }

    /// Creates, identifies, configures and initializes an instance, then
    /// schedules it for update.
    ///
    /// # Errors
    ///
    /// - [`GameObjectError::InvalidOperation`] while the collection is pending
    ///   teardown or when a property override is rejected
    /// - [`GameObjectError::IdentifierInUse`] for a taken identifier
    /// - [`GameObjectError::OutOfResources`] when the pool is full
    /// - [`GameObjectError::HookFailed`] when a create or init hook fails
    pub fn spawn(
        &mut self,
        prototype: Arc<Prototype>,
        identifier: NameHash,
        properties: &[SpawnProperty],
        position: Vec3,
        rotation: Quat,
        scale: Vec3,
    ) -> GameObjectResult<InstanceId> {
        if self.to_be_deleted {
            warn!(collection = %self.name, "spawning is not allowed when the collection is being deleted");
            return Err(GameObjectError::InvalidOperation("collection pending teardown"));
        }
        if self.identifiers.contains_key(&identifier) {
            return Err(GameObjectError::IdentifierInUse(identifier));
        }

        let slot = self.alloc_slot(prototype)?;
        let transform = Transform::new(position, rotation, scale);
        self.instances[slot as usize].transform = transform;
        self.world_transforms[slot as usize] = transform;
        let instance = self.id_of(slot);

        if let Err(err) = self.set_identifier(instance, identifier) {
            self.free_slot(slot);
            return Err(err);
        }
        if let Err(err) = self.create_components(slot) {
            self.release_identifier(slot);
            self.free_slot(slot);
            return Err(err);
        }
        for prop in properties {
            if let Err(err) = self.set_property(instance, prop.component_id, prop.property_id, &prop.value) {
                warn!(%err, property = prop.property_id, "spawn property rejected");
                let count = self.instances[slot as usize].prototype.components().len();
                self.destroy_components(slot, count);
                self.release_identifier(slot);
                self.free_slot(slot);
                return Err(GameObjectError::InvalidOperation("spawn property rejected"));
            }
        }

        self.shared.bump_spawn_counter();
        self.dirty_transforms = true;

        if let Err(err) = self.init_slot(slot) {
            error!(%err, identifier, "could not initialize spawned instance");
            let _ = self.delete(instance, false);
            return Err(err.into());
        }
        self.add_to_update(instance)?;
        debug!(identifier, slot, "spawned instance");
        Ok(instance)
    }

    // Identifiers

    /// Hash of `id` made absolute against the collection path.
    #[must_use]
    pub fn absolute_identifier(&self, id: &str) -> NameHash {
        if id.starts_with('/') {
            hash_str(id)
        } else {
            hash_concat(&self.path, id)
        }
    }

    /// Names an instance.
    ///
    /// # Errors
    ///
    /// - [`GameObjectError::InstanceNotFound`] for stale handles
    /// - [`GameObjectError::IdentifierInUse`] when another instance owns it
    /// - [`GameObjectError::IdentifierAlreadySet`] when already named
    pub fn set_identifier(&mut self, instance: InstanceId, identifier: NameHash) -> GameObjectResult<()> {
        let slot = self.require(instance)?;
        if self.identifiers.contains_key(&identifier) {
            return Err(GameObjectError::IdentifierInUse(identifier));
        }
        let inst = &mut self.instances[slot as usize];
        if inst.identifier != UNNAMED_IDENTIFIER {
            return Err(GameObjectError::IdentifierAlreadySet);
        }
        inst.identifier = identifier;
        self.identifiers.insert(identifier, slot);
        Ok(())
    }

    /// Names an instance from a relative or absolute path.
    ///
    /// # Errors
    ///
    /// As [`Collection::set_identifier`].
    pub fn set_identifier_str(&mut self, instance: InstanceId, id: &str) -> GameObjectResult<()> {
        let identifier = self.absolute_identifier(id);
        self.set_identifier(instance, identifier)
    }

    /// Names an instance `/instance<N>` from the shared identifier pool.
    ///
    /// # Errors
    ///
    /// [`GameObjectError::OutOfResources`] when the pool is exhausted, or as
    /// [`Collection::set_identifier`].
    pub fn generate_identifier(&mut self, instance: InstanceId) -> GameObjectResult<NameHash> {
        let slot = self.require(instance)?;
        let index = self
            .shared
            .acquire_instance_index()
            .ok_or(GameObjectError::OutOfResources("instance identifiers"))?;
        let identifier = construct_instance_id(index);
        if let Err(err) = self.set_identifier(instance, identifier) {
            self.shared.release_instance_index(index);
            return Err(err);
        }
        self.instances[slot as usize].identifier_index = index;
        Ok(identifier)
    }

    /// Instance named `identifier`.
    #[must_use]
    pub fn instance_from_identifier(&self, identifier: NameHash) -> Option<InstanceId> {
        self.identifiers.get(&identifier).map(|&slot| self.id_of(slot))
    }

    /// Identifier of an instance; `Some(0)` when unnamed.
    #[must_use]
    pub fn identifier(&self, instance: InstanceId) -> Option<NameHash> {
        self.resolve(instance).map(|slot| self.instances[slot as usize].identifier)
    }

    fn release_identifier(&mut self, slot: u32) {
        let inst = &mut self.instances[slot as usize];
        if inst.identifier != UNNAMED_IDENTIFIER {
            self.identifiers.remove(&inst.identifier);
            inst.identifier = UNNAMED_IDENTIFIER;
        }
        if inst.identifier_index != INVALID_INDEX {
            self.shared.release_instance_index(inst.identifier_index);
            inst.identifier_index = INVALID_INDEX;
        }
    }

    // Init / final

    pub(crate) fn init_slot(&mut self, slot: u32) -> HookResult {
        if self.instances[slot as usize].initialized {
            warn!(identifier = self.instances[slot as usize].identifier, "instance initialized twice");
            return Err(HookError::new("instance already initialized"));
        }
        self.instances[slot as usize].initialized = true;
        let count = self.instances[slot as usize].prototype.components().len();
        for index in 0..count {
            let result = self.with_component(slot, index, |desc, params| {
                if desc.has(Hooks::INIT) {
                    desc.behaviour.init(params)
                } else {
                    Ok(())
                }
            });
            if let Some(Err(err)) = result {
                return Err(err);
            }
        }
        Ok(())
    }

    pub(crate) fn finalize_slot(&mut self, slot: u32) -> bool {
        if !self.instances[slot as usize].initialized {
            warn!(identifier = self.instances[slot as usize].identifier, "instance finalized without being initialized");
            return false;
        }
        self.instances[slot as usize].initialized = false;
        let instance = self.id_of(slot);
        let mut success = true;
        let count = self.instances[slot as usize].prototype.components().len();
        for index in 0..count {
            if !self.is_live(slot, instance) {
                break;
            }
            let result = self.with_component(slot, index, |desc, params| {
                if desc.has(Hooks::FINAL) {
                    desc.behaviour.finalize(params)
                } else {
                    Ok(())
                }
            });
            if let Some(Err(err)) = result {
                error!(%err, "failed to finalize component");
                success = false;
            }
        }
        success
    }

    /// Runs the init hooks of one instance.
    ///
    /// # Errors
    ///
    /// [`GameObjectError::InstanceNotFound`], or
    /// [`GameObjectError::HookFailed`] for double init and failing hooks.
    pub fn init_instance(&mut self, instance: InstanceId) -> GameObjectResult<()> {
        let slot = self.require(instance)?;
        self.init_slot(slot).map_err(Into::into)
    }

    /// Runs the final hooks of one instance.
    ///
    /// # Errors
    ///
    /// [`GameObjectError::InstanceNotFound`], or
    /// [`GameObjectError::InvalidOperation`] when not initialized or a hook
    /// failed.
    pub fn finalize_instance(&mut self, instance: InstanceId) -> GameObjectResult<()> {
        let slot = self.require(instance)?;
        if self.finalize_slot(slot) {
            Ok(())
        } else {
            Err(GameObjectError::InvalidOperation("finalize failed"))
        }
    }

    /// Initializes every instance created so far and adds it to update.
    pub fn init(&mut self) -> bool {
        self.update_transforms();
        let mut success = true;
        let pending: Vec<u32> = (0..self.instances.len() as u32)
            .filter(|&slot| {
                let inst = &self.instances[slot as usize];
                inst.alive && !inst.initialized
            })
            .collect();
        for &slot in &pending {
            if let Err(err) = self.init_slot(slot) {
                error!(%err, "failed to initialize instance");
                success = false;
            }
        }
        for slot in pending {
            let instance = self.id_of(slot);
            if self.instances[slot as usize].alive && !self.instances[slot as usize].to_be_added {
                success &= self.add_to_update(instance).is_ok();
            }
        }
        success &= self.do_add_to_update();
        self.initialized = true;
        success &= self.dispatch_messages();
        success
    }

    /// Runs the final hooks of every initialized instance.
    pub fn finalize(&mut self) -> bool {
        let mut success = true;
        for slot in 0..self.instances.len() as u32 {
            let inst = &self.instances[slot as usize];
            if inst.alive && inst.initialized {
                success &= self.finalize_slot(slot);
            }
        }
        self.initialized = false;
        success
    }

    // Add to update

    /// Schedules an instance to join the update set at the next update.
    ///
    /// # Errors
    ///
    /// [`GameObjectError::InstanceNotFound`], or
    /// [`GameObjectError::InvalidOperation`] when already scheduled.
    pub fn add_to_update(&mut self, instance: InstanceId) -> GameObjectResult<()> {
        let slot = self.require(instance)?;
        if self.instances[slot as usize].to_be_added {
            warn!(identifier = self.instances[slot as usize].identifier, "instance already scheduled for update");
            return Err(GameObjectError::InvalidOperation("instance already scheduled for update"));
        }
        self.instances[slot as usize].to_be_added = true;
        if self.add_tail == INVALID_INDEX {
            self.add_head = slot;
        } else {
            self.instances[self.add_tail as usize].next_to_add = slot;
        }
        self.add_tail = slot;
        Ok(())
    }

    fn remove_from_add_queue(&mut self, slot: u32) {
        let mut prev = INVALID_INDEX;
        let mut cursor = self.add_head;
        while cursor != INVALID_INDEX {
            let next = self.instances[cursor as usize].next_to_add;
            if cursor == slot {
                if prev == INVALID_INDEX {
                    self.add_head = next;
                } else {
                    self.instances[prev as usize].next_to_add = next;
                }
                if self.add_tail == slot {
                    self.add_tail = prev;
                }
                break;
            }
            prev = cursor;
            cursor = next;
        }
        let inst = &mut self.instances[slot as usize];
        inst.next_to_add = INVALID_INDEX;
        inst.to_be_added = false;
    }

    /// Drains the add queue, calling `add_to_update` hooks.
    pub(crate) fn do_add_to_update(&mut self) -> bool {
        if self.in_update {
            error!("instances can not be added to update during the update");
            return false;
        }
        let mut success = true;
        let mut cursor = self.add_head;
        self.add_head = INVALID_INDEX;
        self.add_tail = INVALID_INDEX;
        while cursor != INVALID_INDEX {
            let slot = cursor;
            let inst = &mut self.instances[slot as usize];
            cursor = inst.next_to_add;
            inst.next_to_add = INVALID_INDEX;
            inst.to_be_added = false;
            if inst.to_be_deleted {
                continue;
            }
            let instance = self.id_of(slot);
            let count = self.instances[slot as usize].prototype.components().len();
            for index in 0..count {
                if !self.is_live(slot, instance) {
                    break;
                }
                let result = self.with_component(slot, index, |desc, params| {
                    if desc.has(Hooks::ADD_TO_UPDATE) {
                        desc.behaviour.add_to_update(params)
                    } else {
                        Ok(())
                    }
                });
                if let Some(Err(err)) = result {
                    error!(%err, "add_to_update failed");
                    success = false;
                }
            }
        }
        success
    }

    // Delete

    fn queue_delete(&mut self, slot: u32) {
        let inst = &mut self.instances[slot as usize];
        if inst.to_be_deleted {
            return;
        }
        inst.to_be_deleted = true;
        inst.next_to_delete = INVALID_INDEX;
        if self.delete_tail == INVALID_INDEX {
            self.delete_head = slot;
        } else {
            self.instances[self.delete_tail as usize].next_to_delete = slot;
        }
        self.delete_tail = slot;
    }

    /// Queues an instance for destruction at the next post-update.
    ///
    /// A no-op for instances already pending deletion and while the
    /// collection is pending teardown. `recursive` queues the descendants
    /// first.
    ///
    /// # Errors
    ///
    /// [`GameObjectError::InstanceNotFound`] for stale handles.
    pub fn delete(&mut self, instance: InstanceId, recursive: bool) -> GameObjectResult<()> {
        if self.to_be_deleted {
            return Ok(());
        }
        let slot = self.require(instance)?;
        if self.instances[slot as usize].to_be_deleted {
            return Ok(());
        }
        if recursive {
            let mut order = Vec::new();
            let mut stack = vec![slot];
            while let Some(current) = stack.pop() {
                order.push(current);
                let mut child = self.instances[current as usize].first_child;
                while child != INVALID_INDEX {
                    stack.push(child);
                    child = self.instances[child as usize].sibling;
                }
            }
            for &descendant in order.iter().rev() {
                self.queue_delete(descendant);
            }
        } else {
            self.queue_delete(slot);
        }
        Ok(())
    }

    /// Queues every live instance for destruction.
    pub fn delete_all(&mut self) {
        if self.to_be_deleted {
            return;
        }
        for slot in 0..self.instances.len() as u32 {
            if self.instances[slot as usize].alive {
                self.queue_delete(slot);
            }
        }
    }

    /// Whether the instance is queued for destruction.
    #[must_use]
    pub fn is_pending_delete(&self, instance: InstanceId) -> bool {
        self.resolve(instance)
            .is_some_and(|slot| self.instances[slot as usize].to_be_deleted)
    }

    /// Destroys the instance in `slot` immediately.
    pub(crate) fn do_delete(&mut self, slot: u32) -> bool {
        let instance = self.id_of(slot);
        self.cancel_instance_animations(instance);

        if self.instances[slot as usize].to_be_added {
            self.remove_from_add_queue(slot);
        }
        let count = self.instances[slot as usize].prototype.components().len();
        let success = self.destroy_components(slot, count);

        self.release_identifier(slot);
        self.input_focus_stack.retain(|&s| s != slot);
        self.reparent_children_up(slot);
        self.unlink(slot);
        self.free_slot(slot);
        self.dirty_transforms = true;
        success
    }

    /// Runs post-update hooks and drains the delete queue.
    ///
    /// Residual messages are dispatched even when nothing is queued. Each pass
    /// finalizes the queued instances, dispatches what finalization posted and
    /// destroys them. Deletions queued during a pass are handled in
    /// the next pass; whatever is left after the pass limit waits for the next
    /// frame.
    pub fn post_update(&mut self) -> bool {
        let mut success = true;
        let registry = Arc::clone(&self.registry);
        for &type_index in registry.update_order() {
            let result = self.with_world(type_index, |desc, params| {
                if desc.has(Hooks::POST_UPDATE) {
                    desc.behaviour.post_update(params)
                } else {
                    Ok(())
                }
            });
            if let Some(Err(err)) = result {
                error!(%err, "post_update failed");
                success = false;
            }
        }

        if self.delete_head == INVALID_INDEX {
            success &= self.dispatch_messages();
        }

        let mut passes = 0;
        while self.delete_head != INVALID_INDEX && passes < self.config.max_delete_passes {
            let mut pending = Vec::new();
            let mut cursor = self.delete_head;
            self.delete_head = INVALID_INDEX;
            self.delete_tail = INVALID_INDEX;
            while cursor != INVALID_INDEX {
                pending.push(cursor);
                let inst = &mut self.instances[cursor as usize];
                cursor = inst.next_to_delete;
                inst.next_to_delete = INVALID_INDEX;
            }

            for &slot in &pending {
                if self.instances[slot as usize].initialized {
                    success &= self.finalize_slot(slot);
                }
            }
            success &= self.dispatch_messages();
            for slot in pending {
                success &= self.do_delete(slot);
            }
            passes += 1;
        }
        if self.delete_head != INVALID_INDEX {
            warn!(collection = %self.name, "creation/deletion cycles encountered, postponing to next frame");
        }
        success
    }

    // Resources

    /// Tracks a dynamically acquired resource, released on teardown.
    pub fn add_dynamic_resource(&self, resource_hash: NameHash) -> bool {
        self.shared.add_dynamic_resource(resource_hash)
    }

    /// Stops tracking a dynamic resource.
    pub fn remove_dynamic_resource(&self, resource_hash: NameHash) -> bool {
        self.shared.remove_dynamic_resource(resource_hash)
    }

    /// Whether a dynamic resource is tracked.
    #[must_use]
    pub fn has_dynamic_resource(&self, resource_hash: NameHash) -> bool {
        self.shared.has_dynamic_resource(resource_hash)
    }

    /// Calls `on_reload` on every component using the reloaded resource.
    pub fn on_resource_reloaded(&mut self, resource_hash: NameHash, resource: &Resource) {
        for slot in 0..self.instances.len() as u32 {
            if !self.instances[slot as usize].alive {
                continue;
            }
            let prototype = Arc::clone(&self.instances[slot as usize].prototype);
            for (index, component) in prototype.components().iter().enumerate() {
                if component.resource_hash != resource_hash {
                    continue;
                }
                self.with_component(slot, index, |desc, params| {
                    if desc.has(Hooks::ON_RELOAD) {
                        desc.behaviour.on_reload(params, resource);
                    }
                });
            }
        }
    }
}
