//! # Animation Pool
//!
//! Active animations live in one dense `Vec`, removed with `swap_remove`.
//! Links between animations (per-instance list, per-listener list) use stable
//! handles instead of array positions:
//!
//! ```text
//! handle ──anim_map──► position in `animations`
//!    ▲                        │
//!    └──── Animation::index ──┘
//! ```
//!
//! A `swap_remove` only has to repair `anim_map` for the moved animation.
//! Free handles are recycled through an [`IndexPool`].
//!
//! ## Update
//!
//! Three passes over the same array:
//!
//! 1. start: capture from-values of newly started animations and stop older
//!    animations on the same property
//! 2. advance: step delay and cursor, evaluate, write
//! 3. prune: call stop callbacks and remove stopped animations

use std::collections::HashMap;

use cinder_shared::NameHash;
use tracing::{error, trace};

use super::easing::Easing;
use super::{AnimationListener, AnimationStopped, Animator, Playback};
use crate::config::{AnimationConfig, MAX_ANIMATION_CAPACITY};
use crate::error::{PropertyError, PropertyResult};
use crate::gameobject::collection::Collection;
use crate::gameobject::instance::InstanceId;
use crate::gameobject::property::{PropertyVar, ValueRef};
use crate::memory::IndexPool;

pub(crate) const INVALID_ANIM: u16 = 0xffff;

#[derive(Clone, Debug)]
struct Animation {
    instance: InstanceId,
    component_id: NameHash,
    property_id: NameHash,
    playback: Playback,
    easing: Easing,
    value_ref: Option<ValueRef>,
    from: f32,
    to: f32,
    delay: f32,
    cursor: f32,
    duration: f32,
    inv_duration: f32,
    listener: Option<AnimationListener>,
    prev_listener: u16,
    next_listener: u16,
    /// Stable handle of this animation.
    index: u16,
    /// Next animation on the same instance.
    next: u16,
    playing: bool,
    finished: bool,
    composite: bool,
    backwards: bool,
    first_update: bool,
}

/// Arguments of a single play request.
pub(crate) struct Play {
    pub(crate) instance: InstanceId,
    pub(crate) component_id: NameHash,
    pub(crate) property_id: NameHash,
    pub(crate) playback: Playback,
    pub(crate) value_ref: Option<ValueRef>,
    pub(crate) from: f32,
    pub(crate) to: f32,
    pub(crate) easing: Easing,
    pub(crate) duration: f32,
    pub(crate) delay: f32,
    pub(crate) listener: Option<AnimationListener>,
    pub(crate) composite: bool,
}

/// Per-collection animation storage.
#[derive(Debug)]
pub struct AnimWorld {
    animations: Vec<Animation>,
    anim_map: Vec<u16>,
    index_pool: IndexPool,
    instance_heads: HashMap<InstanceId, u16>,
    listener_heads: HashMap<u64, u16>,
    /// Bound for both head maps.
    max_tracked: usize,
    min_growth: usize,
    max_capacity: usize,
    pub(crate) in_update: bool,
}

impl AnimWorld {
    /// Empty pool sized from `config`; the head maps hold up to
    /// `max_instances` entries.
    ///
    /// The ceiling is clamped to [`MAX_ANIMATION_CAPACITY`] so every handle
    /// stays below the `0xffff` sentinel.
    #[must_use]
    pub fn new(config: &AnimationConfig, max_instances: u32) -> Self {
        let max_capacity = config.max_capacity.min(MAX_ANIMATION_CAPACITY);
        Self {
            animations: Vec::with_capacity(config.initial_capacity.min(max_capacity) as usize),
            anim_map: vec![INVALID_ANIM; max_capacity as usize],
            index_pool: IndexPool::new(max_capacity),
            instance_heads: HashMap::new(),
            listener_heads: HashMap::new(),
            max_tracked: max_instances as usize,
            min_growth: config.min_capacity_growth as usize,
            max_capacity: max_capacity as usize,
            in_update: false,
        }
    }

    /// Number of stored animations, stopped ones included until pruned.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.animations.len()
    }

    /// Whether no animation is stored.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.animations.is_empty()
    }

    /// Allocated slots of the dense array.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.animations.capacity()
    }

    /// Whether any playing animation targets the instance.
    #[must_use]
    pub fn is_animating(&self, instance: InstanceId) -> bool {
        let mut index = self.instance_heads.get(&instance).copied().unwrap_or(INVALID_ANIM);
        while index != INVALID_ANIM {
            let anim = self.get(index);
            if anim.playing {
                return true;
            }
            index = anim.next;
        }
        false
    }

    #[inline]
    fn position(&self, index: u16) -> usize {
        usize::from(self.anim_map[usize::from(index)])
    }

    #[inline]
    fn get(&self, index: u16) -> &Animation {
        &self.animations[self.position(index)]
    }

    #[inline]
    fn get_mut(&mut self, index: u16) -> &mut Animation {
        let pos = self.position(index);
        &mut self.animations[pos]
    }

    /// Whether `count` more animations for `instance` and `listener` fit.
    pub(crate) fn can_play(&self, instance: InstanceId, count: usize, listener: Option<u64>) -> bool {
        if self.animations.len() + count > self.max_capacity {
            return false;
        }
        if !self.instance_heads.contains_key(&instance) && self.instance_heads.len() >= self.max_tracked {
            return false;
        }
        match listener {
            Some(id) => self.listener_heads.contains_key(&id) || self.listener_heads.len() < self.max_tracked,
            None => true,
        }
    }

    fn grow(&mut self) {
        let capacity = self.animations.capacity();
        let growth = self.min_growth.max(capacity / 2);
        let target = (capacity + growth).min(self.max_capacity);
        self.animations.reserve_exact(target.saturating_sub(self.animations.len()));
    }

    /// Stores a new animation and returns its handle.
    ///
    /// Nothing is changed on failure.
    pub(crate) fn play(&mut self, play: Play) -> PropertyResult<u16> {
        let listener_id = play.listener.as_ref().map(|l| l.listener);
        if self.animations.len() >= self.max_capacity {
            error!(max = self.max_capacity, "animation could not be stored since the buffer is full");
            return Err(PropertyError::BufferOverflow);
        }
        if !self.can_play(play.instance, 1, listener_id) {
            error!(max = self.max_tracked, "animation could not be stored since the instance buffer is full");
            return Err(PropertyError::BufferOverflow);
        }
        let Some(index) = self.index_pool.pop() else {
            error!("animation handles exhausted");
            return Err(PropertyError::BufferOverflow);
        };
        let index = index as u16;

        if self.animations.len() == self.animations.capacity() {
            self.grow();
        }
        let top = self.animations.len();
        self.anim_map[usize::from(index)] = top as u16;

        let duration = play.duration.max(0.0);
        let backwards = matches!(play.playback, Playback::OnceBackward | Playback::LoopBackward);
        self.animations.push(Animation {
            instance: play.instance,
            component_id: play.component_id,
            property_id: play.property_id,
            playback: play.playback,
            easing: play.easing,
            value_ref: play.value_ref,
            from: play.from,
            to: play.to,
            delay: play.delay.max(0.0),
            cursor: 0.0,
            duration,
            inv_duration: if duration > 0.0 { 1.0 / duration } else { 0.0 },
            listener: play.listener,
            prev_listener: INVALID_ANIM,
            next_listener: INVALID_ANIM,
            index,
            next: INVALID_ANIM,
            playing: true,
            finished: false,
            composite: play.composite,
            backwards,
            first_update: true,
        });

        // Append to the instance list.
        match self.instance_heads.get(&play.instance).copied() {
            None => {
                self.instance_heads.insert(play.instance, index);
            }
            Some(head) => {
                let mut last = head;
                while self.get(last).next != INVALID_ANIM {
                    last = self.get(last).next;
                }
                self.get_mut(last).next = index;
            }
        }

        // Push onto the listener list.
        if let Some(id) = listener_id {
            if let Some(&head) = self.listener_heads.get(&id) {
                self.get_mut(index).next_listener = head;
                self.get_mut(head).prev_listener = index;
            }
            self.listener_heads.insert(id, index);
        }
        Ok(index)
    }

    /// Removes an animation without calling its stop callback.
    pub(crate) fn discard(&mut self, index: u16) {
        self.remove_callback(index);
        self.remove_at(self.position(index));
    }

    /// Detaches the stop callback of one animation.
    fn remove_callback(&mut self, index: u16) -> Option<AnimationListener> {
        let anim = self.get_mut(index);
        let listener = anim.listener.take()?;
        let (prev, next) = (anim.prev_listener, anim.next_listener);
        anim.prev_listener = INVALID_ANIM;
        anim.next_listener = INVALID_ANIM;

        if prev != INVALID_ANIM {
            self.get_mut(prev).next_listener = next;
        }
        if next != INVALID_ANIM {
            self.get_mut(next).prev_listener = prev;
        }
        if prev == INVALID_ANIM {
            if next == INVALID_ANIM {
                self.listener_heads.remove(&listener.listener);
            } else {
                self.listener_heads.insert(listener.listener, next);
            }
        }
        Some(listener)
    }

    /// Unlinks the animation at `pos`, frees its handle and erase-swaps it.
    fn remove_at(&mut self, pos: usize) {
        let (instance, index, next) = {
            let anim = &self.animations[pos];
            (anim.instance, anim.index, anim.next)
        };

        if let Some(&head) = self.instance_heads.get(&instance) {
            if head == index {
                if next == INVALID_ANIM {
                    self.instance_heads.remove(&instance);
                } else {
                    self.instance_heads.insert(instance, next);
                }
            } else {
                let mut cursor = head;
                while cursor != INVALID_ANIM {
                    let following = self.get(cursor).next;
                    if following == index {
                        self.get_mut(cursor).next = next;
                        break;
                    }
                    cursor = following;
                }
            }
        }

        self.anim_map[usize::from(index)] = INVALID_ANIM;
        self.index_pool.push(u32::from(index));
        self.animations.swap_remove(pos);
        if let Some(moved) = self.animations.get(pos) {
            self.anim_map[usize::from(moved.index)] = pos as u16;
        }
    }

    /// Stops animations of `instance` on `(component_id, property_id)`.
    pub(crate) fn stop_property(&mut self, instance: InstanceId, component_id: NameHash, property_id: NameHash) {
        let mut index = self.instance_heads.get(&instance).copied().unwrap_or(INVALID_ANIM);
        while index != INVALID_ANIM {
            let anim = self.get_mut(index);
            if anim.component_id == component_id && anim.property_id == property_id {
                anim.playing = false;
                anim.finished = false;
            }
            index = anim.next;
        }
    }

    /// Stops every animation of `instance`.
    pub(crate) fn stop_all(&mut self, instance: InstanceId) {
        let mut index = self.instance_heads.get(&instance).copied().unwrap_or(INVALID_ANIM);
        while index != INVALID_ANIM {
            let anim = self.get_mut(index);
            anim.playing = false;
            anim.finished = false;
            index = anim.next;
        }
    }

    /// Detaches every stop callback registered for `listener`.
    pub(crate) fn cancel_callbacks(&mut self, listener: u64) {
        let Some(mut index) = self.listener_heads.remove(&listener) else {
            return;
        };
        while index != INVALID_ANIM {
            let anim = self.get_mut(index);
            index = anim.next_listener;
            anim.prev_listener = INVALID_ANIM;
            anim.next_listener = INVALID_ANIM;
            anim.listener = None;
        }
    }

    /// Runs the three update passes. Returns whether anything was animated.
    pub(crate) fn update(&mut self, collection: &mut Collection, dt: f32) -> bool {
        self.in_update = true;
        let size = self.animations.len();

        self.start_pass(collection, size, dt);
        self.advance_pass(collection, size, dt);
        self.prune(collection);

        self.in_update = false;
        size != 0
    }

    fn start_pass(&mut self, collection: &mut Collection, size: usize, dt: f32) {
        for i in 0..size {
            let anim = &self.animations[i];
            if !anim.playing || anim.delay > dt || !anim.first_update {
                continue;
            }
            let (instance, component_id, property_id) = (anim.instance, anim.component_id, anim.property_id);
            let from = if anim.composite {
                None
            } else if let Some(value_ref) = anim.value_ref {
                Some(collection.read_value_ref(instance, value_ref))
            } else {
                Some(
                    collection
                        .get_property(instance, component_id, property_id)
                        .ok()
                        .and_then(|desc| desc.variant.as_number())
                        .unwrap_or(0.0) as f32,
                )
            };
            let anim = &mut self.animations[i];
            anim.first_update = false;
            if let Some(from) = from {
                anim.from = from;
            }

            let mut index = self.instance_heads.get(&instance).copied().unwrap_or(INVALID_ANIM);
            while index != INVALID_ANIM {
                let pos = self.position(index);
                let other = &mut self.animations[pos];
                if pos != i
                    && !other.first_update
                    && other.component_id == component_id
                    && other.property_id == property_id
                    && other.delay <= 0.0
                {
                    other.playing = false;
                    other.finished = false;
                }
                index = other.next;
            }
        }
    }

    fn advance_pass(&mut self, collection: &mut Collection, size: usize, frame_dt: f32) {
        for anim in &mut self.animations[..size] {
            if !anim.playing {
                continue;
            }
            if anim.delay > frame_dt {
                anim.delay -= frame_dt;
                continue;
            }
            let dt = frame_dt - anim.delay;
            anim.delay = 0.0;
            if anim.playback != Playback::None {
                anim.cursor += dt;
            }

            let mut completed = false;
            match anim.playback {
                Playback::OnceForward | Playback::OnceBackward | Playback::OncePingPong => {
                    if anim.cursor >= anim.duration {
                        anim.cursor = anim.duration;
                        completed = true;
                    }
                }
                Playback::LoopForward | Playback::LoopBackward => {
                    if anim.duration > 0.0 {
                        while anim.cursor >= anim.duration {
                            anim.cursor -= anim.duration;
                        }
                    }
                }
                Playback::LoopPingPong => {
                    if anim.duration > 0.0 {
                        while anim.cursor >= anim.duration {
                            anim.cursor -= anim.duration;
                            anim.backwards = !anim.backwards;
                        }
                    }
                }
                Playback::None => {}
            }

            if !anim.composite {
                let value = anim.evaluate();
                match anim.value_ref {
                    Some(value_ref) => {
                        if !collection.write_value_ref(anim.instance, value_ref, value) {
                            trace!(property = anim.property_id, "animated instance is gone");
                        }
                    }
                    None => {
                        if let Err(err) = collection.set_property(
                            anim.instance,
                            anim.component_id,
                            anim.property_id,
                            &PropertyVar::Number(f64::from(value)),
                        ) {
                            trace!(%err, property = anim.property_id, "animated property write rejected");
                        }
                    }
                }
            }
            if completed {
                anim.playing = false;
                anim.finished = true;
            }
        }
    }

    /// Calls stop callbacks and removes every stopped animation.
    ///
    /// Callbacks run with `in_update` set, so cancels they issue only mark.
    /// The scan repeats until nothing stopped is left.
    pub(crate) fn prune(&mut self, collection: &mut Collection) {
        let was_updating = self.in_update;
        self.in_update = true;
        loop {
            let mut i = 0;
            while i < self.animations.len() {
                if self.animations[i].playing {
                    i += 1;
                    continue;
                }
                let index = self.animations[i].index;
                if let Some(listener) = self.remove_callback(index) {
                    let anim = self.get(index);
                    let event = AnimationStopped {
                        instance: anim.instance,
                        component_id: anim.component_id,
                        property_id: anim.property_id,
                        finished: anim.finished,
                        listener: listener.listener,
                        userdata: listener.userdata,
                    };
                    let mut animator = Animator { world: &mut *self, collection: &mut *collection };
                    (listener.callback)(&mut animator, &event);
                }
                let pos = self.position(index);
                self.remove_at(pos);
                if pos < i {
                    i = pos;
                }
            }
            if self.animations.iter().all(|a| a.playing) {
                break;
            }
        }
        self.in_update = was_updating;
    }
}

impl Animation {
    fn evaluate(&self) -> f32 {
        let mut t = if self.cursor < self.duration {
            (self.cursor * self.inv_duration).clamp(0.0, 1.0)
        } else {
            1.0
        };
        if self.backwards {
            t = 1.0 - t;
        }
        if matches!(self.playback, Playback::OncePingPong | Playback::LoopPingPong) {
            t *= 2.0;
            if t > 1.0 {
                t = 2.0 - t;
            }
        }
        let t = self.easing.apply(t);
        self.from + (self.to - self.from) * t
    }
}
