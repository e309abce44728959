//! # Transforms
//!
//! Local transforms live on the instance; world transforms live in a parallel
//! array on the collection and are recomputed level by level when dirty.
//!
//! World getters return the result of the last transform pass. Setters only
//! mark the collection dirty.

use cinder_shared::{Quat, Transform, Vec3};

use super::collection::Collection;
use super::instance::{InstanceId, INVALID_INDEX};
use crate::error::GameObjectResult;

impl Collection {
    fn local_mut(&mut self, instance: InstanceId) -> GameObjectResult<&mut Transform> {
        let slot = self.require(instance)?;
        self.dirty_transforms = true;
        Ok(&mut self.instances[slot as usize].transform)
    }

    fn local(&self, instance: InstanceId) -> Option<&Transform> {
        self.resolve(instance).map(|slot| &self.instances[slot as usize].transform)
    }

    fn world(&self, instance: InstanceId) -> Option<&Transform> {
        self.resolve(instance).map(|slot| &self.world_transforms[slot as usize])
    }

    /// Sets the local position.
    ///
    /// # Errors
    ///
    /// [`GameObjectError::InstanceNotFound`](crate::GameObjectError::InstanceNotFound)
    /// for stale handles. Same for the other setters.
    pub fn set_position(&mut self, instance: InstanceId, position: Vec3) -> GameObjectResult<()> {
        self.local_mut(instance)?.position = position;
        Ok(())
    }

    /// Sets the local rotation.
    #[allow(clippy::missing_errors_doc)]
    pub fn set_rotation(&mut self, instance: InstanceId, rotation: Quat) -> GameObjectResult<()> {
        self.local_mut(instance)?.rotation = rotation;
        Ok(())
    }

    /// Sets the local scale.
    #[allow(clippy::missing_errors_doc)]
    pub fn set_scale(&mut self, instance: InstanceId, scale: Vec3) -> GameObjectResult<()> {
        self.local_mut(instance)?.scale = scale;
        Ok(())
    }

    /// Sets the same local scale on all three axes.
    #[allow(clippy::missing_errors_doc)]
    pub fn set_uniform_scale(&mut self, instance: InstanceId, scale: f32) -> GameObjectResult<()> {
        self.local_mut(instance)?.scale = Vec3::splat(scale);
        Ok(())
    }

    /// Local position.
    #[must_use]
    pub fn position(&self, instance: InstanceId) -> Option<Vec3> {
        self.local(instance).map(|t| t.position)
    }

    /// Local rotation.
    #[must_use]
    pub fn rotation(&self, instance: InstanceId) -> Option<Quat> {
        self.local(instance).map(|t| t.rotation)
    }

    /// Local scale.
    #[must_use]
    pub fn scale(&self, instance: InstanceId) -> Option<Vec3> {
        self.local(instance).map(|t| t.scale)
    }

    /// Largest local scale lane.
    #[must_use]
    pub fn uniform_scale(&self, instance: InstanceId) -> Option<f32> {
        self.local(instance).map(Transform::uniform_scale)
    }

    /// World position from the last transform pass.
    #[must_use]
    pub fn world_position(&self, instance: InstanceId) -> Option<Vec3> {
        self.world(instance).map(|t| t.position)
    }

    /// World rotation from the last transform pass.
    #[must_use]
    pub fn world_rotation(&self, instance: InstanceId) -> Option<Quat> {
        self.world(instance).map(|t| t.rotation)
    }

    /// World scale from the last transform pass.
    #[must_use]
    pub fn world_scale(&self, instance: InstanceId) -> Option<Vec3> {
        self.world(instance).map(|t| t.scale)
    }

    /// Largest world scale lane.
    #[must_use]
    pub fn world_uniform_scale(&self, instance: InstanceId) -> Option<f32> {
        self.world(instance).map(Transform::uniform_scale)
    }

    /// World transform from the last transform pass.
    #[must_use]
    pub fn world_transform(&self, instance: InstanceId) -> Option<Transform> {
        self.world(instance).copied()
    }

    /// Whether the parent's Z scale applies to the instance's translation.
    #[allow(clippy::missing_errors_doc)]
    pub fn set_scale_along_z(&mut self, instance: InstanceId, scale_along_z: bool) -> GameObjectResult<()> {
        let slot = self.require(instance)?;
        self.instances[slot as usize].scale_along_z = scale_along_z;
        self.dirty_transforms = true;
        Ok(())
    }

    /// See [`Collection::set_scale_along_z`].
    #[must_use]
    pub fn scale_along_z(&self, instance: InstanceId) -> Option<bool> {
        self.resolve(instance).map(|slot| self.instances[slot as usize].scale_along_z)
    }

    /// Pushes a changed Euler cache into the rotation.
    pub(crate) fn check_euler(&mut self, slot: u32) {
        let inst = &mut self.instances[slot as usize];
        if inst.euler != inst.prev_euler {
            inst.transform.rotation = Quat::from_euler(inst.euler);
            inst.prev_euler = inst.euler;
        }
    }

    /// Recomputes every world transform, parents first.
    pub fn update_transforms(&mut self) {
        for depth in 0..self.levels.len() {
            if self.levels[depth].is_empty() {
                break;
            }
            for i in 0..self.levels[depth].len() {
                let slot = self.levels[depth][i];
                self.check_euler(slot);
                let inst = &self.instances[slot as usize];
                let world = if inst.parent == INVALID_INDEX {
                    inst.transform
                } else {
                    let parent = &self.world_transforms[inst.parent as usize];
                    if inst.scale_along_z {
                        parent.mul(&inst.transform)
                    } else {
                        parent.mul_no_scale_z(&inst.transform)
                    }
                };
                self.world_transforms[slot as usize] = world;
            }
        }
        self.dirty_transforms = false;
    }
}
