//! # Frame Update
//!
//! ```text
//! update:      drain add queue
//!              for each type (priority order): update hook, dispatch
//!              for each whole fixed step:      fixed_update hooks, dispatch
//!              transform pass if dirty
//! post_update: see lifecycle
//! ```

use std::sync::Arc;

use tracing::{error, trace};

use super::collection::Collection;
use super::component::{UpdateParams, UpdateResult};
use super::registry::{ComponentTypeDesc, Hooks};
use crate::error::HookResult;

/// Frame timing handed to the update hooks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UpdateContext {
    /// Frame delta in seconds.
    pub dt: f32,
    /// Multiplier applied to `dt`.
    pub time_scale: f32,
    /// Fixed steps per second; zero disables fixed update.
    pub fixed_update_frequency: u32,
}

impl Default for UpdateContext {
    fn default() -> Self {
        Self { dt: 0.0, time_scale: 1.0, fixed_update_frequency: 0 }
    }
}

impl UpdateContext {
    /// Context for a frame of `dt` seconds at normal speed.
    #[must_use]
    pub fn new(dt: f32) -> Self {
        Self { dt, ..Self::default() }
    }

    /// Sets the time scale.
    #[must_use]
    pub fn with_time_scale(mut self, time_scale: f32) -> Self {
        self.time_scale = time_scale;
        self
    }

    /// Enables fixed update at `frequency` steps per second.
    #[must_use]
    pub fn with_fixed_update_frequency(mut self, frequency: u32) -> Self {
        self.fixed_update_frequency = frequency;
        self
    }

    /// `dt * time_scale`.
    #[inline]
    #[must_use]
    pub fn scaled_dt(&self) -> f32 {
        self.dt * self.time_scale
    }

    /// Length of one fixed step, if fixed update is enabled.
    #[must_use]
    pub fn fixed_dt(&self) -> Option<f32> {
        (self.fixed_update_frequency > 0).then(|| 1.0 / self.fixed_update_frequency as f32)
    }
}

impl Collection {
    fn run_update_hook(
        &mut self,
        type_index: u32,
        context: &UpdateContext,
        hook: impl FnOnce(&ComponentTypeDesc, &mut UpdateParams<'_>, &mut UpdateResult) -> HookResult,
    ) -> bool {
        let registry = Arc::clone(&self.registry);
        let Some(desc) = registry.component_type(type_index) else {
            return false;
        };
        let mut world = self.take_world(type_index);
        let mut result = UpdateResult::default();
        let outcome = {
            let mut params = UpdateParams { collection: self, world: world.as_deref_mut(), context };
            hook(desc, &mut params, &mut result)
        };
        self.restore_world(type_index, world);
        if result.transforms_updated {
            self.dirty_transforms = true;
        }
        match outcome {
            Ok(()) => true,
            Err(err) => {
                error!(%err, component = %desc.name, "component update failed");
                false
            }
        }
    }

    fn update_pass(&mut self, context: &UpdateContext, hook: Hooks) -> bool {
        let mut success = true;
        let registry = Arc::clone(&self.registry);
        for &type_index in registry.update_order() {
            let Some(desc) = registry.component_type(type_index) else {
                continue;
            };
            if desc.has(hook) {
                if desc.reads_transforms && self.dirty_transforms {
                    self.update_transforms();
                }
                success &= if hook == Hooks::FIXED_UPDATE {
                    self.run_update_hook(type_index, context, |desc, params, result| {
                        desc.behaviour.fixed_update(params, result)
                    })
                } else {
                    self.run_update_hook(type_index, context, |desc, params, result| {
                        desc.behaviour.update(params, result)
                    })
                };
            }
            success &= self.dispatch_messages();
        }
        success
    }

    /// Runs one frame of updates.
    ///
    /// Instances scheduled for update join first. Each component type then
    /// updates in priority order, followed by message dispatch. Fixed update
    /// consumes whole steps from the accumulator and carries the remainder.
    pub fn update(&mut self, context: &UpdateContext) -> bool {
        let mut success = self.do_add_to_update();

        self.in_update = true;
        let frame = UpdateContext { dt: context.scaled_dt(), ..*context };
        success &= self.update_pass(&frame, Hooks::UPDATE);

        if let Some(fixed_dt) = context.fixed_dt() {
            self.fixed_accumulator += context.scaled_dt();
            let step = UpdateContext { dt: fixed_dt, ..*context };
            let mut steps = 0u32;
            while self.fixed_accumulator >= fixed_dt {
                self.fixed_accumulator -= fixed_dt;
                success &= self.update_pass(&step, Hooks::FIXED_UPDATE);
                steps += 1;
            }
            trace!(steps, remainder = self.fixed_accumulator, "fixed update");
        }
        self.in_update = false;

        if self.dirty_transforms {
            self.update_transforms();
        }
        success
    }

    /// Whether an update is running.
    #[inline]
    #[must_use]
    pub fn is_updating(&self) -> bool {
        self.in_update
    }
}
