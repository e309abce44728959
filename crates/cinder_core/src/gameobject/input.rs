//! Input focus stack.
//!
//! Instances that acquired focus receive input actions, most recent first. A
//! consumed action does not reach instances further down the stack.

use cinder_shared::NameHash;
use tracing::{error, warn};

use super::collection::Collection;
use super::instance::InstanceId;
use super::registry::Hooks;
use crate::error::{GameObjectError, GameObjectResult};

/// One input action, already mapped from device input.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct InputAction {
    /// Hash of the action name.
    pub action_id: NameHash,
    /// Analog value, 0..1 for buttons.
    pub value: f32,
    /// Went down this frame.
    pub pressed: bool,
    /// Went up this frame.
    pub released: bool,
    /// Auto-repeat tick.
    pub repeated: bool,
    /// Pointer x.
    pub x: f32,
    /// Pointer y.
    pub y: f32,
    /// Pointer delta x.
    pub dx: f32,
    /// Pointer delta y.
    pub dy: f32,
}

/// Outcome of an `on_input` hook.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InputResult {
    /// Keep propagating.
    #[default]
    Ignored,
    /// Stop propagation below this instance.
    Consumed,
}

impl Collection {
    /// Moves the instance to the top of the input stack.
    ///
    /// # Errors
    ///
    /// - [`GameObjectError::InstanceNotFound`] for stale handles
    /// - [`GameObjectError::OutOfResources`] when the stack is full
    pub fn acquire_input_focus(&mut self, instance: InstanceId) -> GameObjectResult<()> {
        let slot = self.require(instance)?;
        if let Some(pos) = self.input_focus_stack.iter().position(|&s| s == slot) {
            self.input_focus_stack.remove(pos);
        } else if self.input_focus_stack.len() >= self.config.max_input_stack_entries as usize {
            warn!(
                max = self.config.max_input_stack_entries,
                "input focus could not be acquired since the buffer is full"
            );
            return Err(GameObjectError::OutOfResources("input focus stack"));
        }
        self.input_focus_stack.push(slot);
        Ok(())
    }

    /// Removes the instance from the input stack. No-op when absent.
    pub fn release_input_focus(&mut self, instance: InstanceId) {
        if let Some(slot) = self.resolve(instance) {
            self.input_focus_stack.retain(|&s| s != slot);
        }
    }

    /// Input stack, top first.
    pub fn input_focus(&self) -> impl Iterator<Item = InstanceId> + '_ {
        self.input_focus_stack.iter().rev().map(|&slot| self.id_of(slot))
    }

    /// Delivers actions down the input stack.
    ///
    /// Every component of an instance sees the action; if any consumed it,
    /// instances below do not.
    ///
    /// # Errors
    ///
    /// [`GameObjectError::HookFailed`] from the first failing `on_input`; the
    /// remaining stack is skipped for that action.
    pub fn dispatch_input(&mut self, actions: &[InputAction]) -> GameObjectResult<()> {
        for action in actions {
            let stack: Vec<InstanceId> = self.input_focus().collect();
            for instance in stack {
                let Some(slot) = self.resolve(instance) else {
                    continue;
                };
                let count = self.instances[slot as usize].prototype.components().len();
                let mut consumed = false;
                for index in 0..count {
                    if !self.is_live(slot, instance) {
                        break;
                    }
                    let result = self.with_component(slot, index, |desc, params| {
                        if desc.has(Hooks::ON_INPUT) {
                            desc.behaviour.on_input(params, action)
                        } else {
                            Ok(InputResult::Ignored)
                        }
                    });
                    match result {
                        Some(Ok(InputResult::Consumed)) => consumed = true,
                        Some(Err(err)) => {
                            error!(%err, action = action.action_id, "error when dispatching input");
                            return Err(err.into());
                        }
                        _ => {}
                    }
                }
                if consumed {
                    break;
                }
            }
        }
        Ok(())
    }
}
