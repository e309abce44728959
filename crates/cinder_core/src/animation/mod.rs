//! # Property Animation
//!
//! Animations interpolate a numeric property of an instance over time. They
//! are stored in the world of the `animc` component type, so every collection
//! with that type registered owns one [`AnimWorld`].
//!
//! Vector properties are split into one animation per lane plus a composite
//! animation that carries the stop callback and is never evaluated.
//!
//! ```rust,ignore
//! collection.animate(
//!     hero,
//!     0,
//!     hash_str("position.x"),
//!     AnimateParams::new(PropertyVar::Number(10.0), 1.0).with_easing(Easing::Linear),
//! )?;
//! ```

mod easing;
mod world;

use std::fmt;
use std::sync::{Arc, OnceLock};

use cinder_shared::{NameHash, Vec3, Vec4};

pub use easing::{EaseFamily, EaseMode, Easing};
pub use world::AnimWorld;

use crate::config::AnimationConfig;
use crate::error::{GameObjectResult, HookError, HookResult, PropertyError, PropertyResult};
use crate::gameobject::collection::Collection;
use crate::gameobject::component::{ComponentType, ComponentWorld, NewWorldParams, UpdateParams, UpdateResult};
use crate::gameobject::instance::InstanceId;
use crate::gameobject::property::{PropertyVar, ValueRef};
use crate::gameobject::registry::{resource_type, ComponentTypeDesc, Hooks, Registry, ResourceType};
use world::Play;

/// Name the animation component type is registered under.
pub const ANIMATION_COMPONENT_NAME: &str = "animc";

fn animation_resource_type() -> ResourceType {
    static TYPE: OnceLock<ResourceType> = OnceLock::new();
    *TYPE.get_or_init(|| resource_type(ANIMATION_COMPONENT_NAME))
}

/// Cursor advance and wrap policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Playback {
    /// Cursor never moves; the property holds the from-value.
    None,
    /// From start to end, then stop.
    #[default]
    OnceForward,
    /// From end to start, then stop.
    OnceBackward,
    /// To the end and back within the duration, then stop.
    OncePingPong,
    /// Restart at the start after each cycle.
    LoopForward,
    /// Restart at the end after each cycle.
    LoopBackward,
    /// Alternate direction every cycle.
    LoopPingPong,
}

/// Passed to a stop callback.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnimationStopped {
    /// Animated instance.
    pub instance: InstanceId,
    /// Component id, zero for the transform.
    pub component_id: NameHash,
    /// Animated property.
    pub property_id: NameHash,
    /// `true` on natural completion, `false` when cancelled.
    pub finished: bool,
    /// Owner the callback was registered for.
    pub listener: u64,
    /// Opaque caller data.
    pub userdata: u64,
}

/// Stop callback.
pub type AnimationCallback = Arc<dyn Fn(&mut Animator<'_>, &AnimationStopped) + Send + Sync>;

/// Stop callback and its owner.
///
/// All callbacks of one `listener` can be detached at once with
/// [`Collection::cancel_animation_callbacks`].
#[derive(Clone)]
pub struct AnimationListener {
    /// Called exactly once when the animation stops, unless detached.
    pub callback: AnimationCallback,
    /// Owner id.
    pub listener: u64,
    /// Opaque caller data.
    pub userdata: u64,
}

impl AnimationListener {
    /// Creates a listener.
    pub fn new(
        listener: u64,
        userdata: u64,
        callback: impl Fn(&mut Animator<'_>, &AnimationStopped) + Send + Sync + 'static,
    ) -> Self {
        Self { callback: Arc::new(callback), listener, userdata }
    }
}

impl fmt::Debug for AnimationListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationListener")
            .field("listener", &self.listener)
            .field("userdata", &self.userdata)
            .finish_non_exhaustive()
    }
}

/// Request for [`Collection::animate`].
#[derive(Clone, Debug)]
pub struct AnimateParams {
    /// Target value. A number is broadcast to every lane of a vector property.
    pub to: PropertyVar,
    /// Cycle length in seconds.
    pub duration: f32,
    /// Seconds before the animation starts.
    pub delay: f32,
    /// Wrap policy.
    pub playback: Playback,
    /// Curve.
    pub easing: Easing,
    /// Stop callback.
    pub listener: Option<AnimationListener>,
}

impl AnimateParams {
    /// Linear, once forward, no delay, no callback.
    #[must_use]
    pub fn new(to: PropertyVar, duration: f32) -> Self {
        Self {
            to,
            duration,
            delay: 0.0,
            playback: Playback::OnceForward,
            easing: Easing::Linear,
            listener: None,
        }
    }

    /// Sets the playback mode.
    #[must_use]
    pub fn with_playback(mut self, playback: Playback) -> Self {
        self.playback = playback;
        self
    }

    /// Sets the curve.
    #[must_use]
    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    /// Sets the start delay.
    #[must_use]
    pub fn with_delay(mut self, delay: f32) -> Self {
        self.delay = delay;
        self
    }

    /// Attaches a stop callback.
    #[must_use]
    pub fn on_stopped(mut self, listener: AnimationListener) -> Self {
        self.listener = Some(listener);
        self
    }
}

/// Animation world paired with its collection.
///
/// Handed to stop callbacks so they can start or cancel animations while the
/// world is lent out.
pub struct Animator<'a> {
    pub(crate) world: &'a mut AnimWorld,
    pub(crate) collection: &'a mut Collection,
}

impl Animator<'_> {
    /// The collection.
    pub fn collection(&mut self) -> &mut Collection {
        self.collection
    }

    /// The animation world.
    #[must_use]
    pub fn world(&self) -> &AnimWorld {
        self.world
    }

    /// Starts animating a property. See [`Collection::animate`].
    ///
    /// # Errors
    ///
    /// As [`Collection::animate`].
    pub fn animate(
        &mut self,
        instance: InstanceId,
        component_id: NameHash,
        property_id: NameHash,
        params: AnimateParams,
    ) -> PropertyResult<()> {
        let desc = self.collection.get_property(instance, component_id, property_id)?;
        if desc.read_only {
            return Err(PropertyError::UnsupportedOperation);
        }
        let source = desc.variant;
        let to = match (params.to, source) {
            (to, source) if to.property_type() == source.property_type() => to,
            (PropertyVar::Number(n), PropertyVar::Vector3(_)) => {
                PropertyVar::Vector3(Vec3::splat(n as f32))
            }
            (PropertyVar::Number(n), PropertyVar::Vector4(_)) => {
                PropertyVar::Vector4(Vec4::splat(n as f32))
            }
            _ => return Err(PropertyError::TypeMismatch),
        };
        let element_count = source.element_count();
        if element_count == 0 {
            return Err(PropertyError::UnsupportedType);
        }

        let play = |property_id: NameHash,
                    value_ref: Option<ValueRef>,
                    from: f32,
                    to: f32,
                    listener: Option<AnimationListener>,
                    composite: bool| Play {
            instance,
            component_id,
            property_id,
            playback: params.playback,
            value_ref,
            from,
            to,
            easing: params.easing.clone(),
            duration: params.duration,
            delay: params.delay,
            listener,
            composite,
        };

        if element_count == 1 {
            let listener = params.listener.clone();
            self.world.play(play(property_id, desc.value_ref, source.element(0), to.element(0), listener, false))?;
            return Ok(());
        }

        let listener_id = params.listener.as_ref().map(|l| l.listener);
        if !self.world.can_play(instance, element_count + 1, listener_id) {
            return Err(PropertyError::BufferOverflow);
        }
        let mut created = Vec::with_capacity(element_count + 1);
        let composite = play(property_id, None, 0.0, 0.0, params.listener.clone(), true);
        let mut result = self.world.play(composite).map(|h| created.push(h));
        for i in 0..element_count {
            if result.is_err() {
                break;
            }
            let value_ref = desc.value_ref.map(|r| r.offset(i as u8));
            let element = play(desc.element_ids[i], value_ref, source.element(i), to.element(i), None, false);
            result = self.world.play(element).map(|h| created.push(h));
        }
        if let Err(err) = result {
            for handle in created.into_iter().rev() {
                self.world.discard(handle);
            }
            return Err(err);
        }
        Ok(())
    }

    /// Stops the animations of one property. See
    /// [`Collection::cancel_animations`].
    ///
    /// # Errors
    ///
    /// As [`Collection::cancel_animations`].
    pub fn cancel_animations(
        &mut self,
        instance: InstanceId,
        component_id: NameHash,
        property_id: NameHash,
    ) -> PropertyResult<()> {
        let desc = self.collection.get_property(instance, component_id, property_id)?;
        let element_count = desc.variant.element_count();
        if element_count == 0 {
            return Err(PropertyError::UnsupportedType);
        }
        self.world.stop_property(instance, component_id, property_id);
        if element_count > 1 {
            for &element_id in &desc.element_ids[..element_count] {
                self.world.stop_property(instance, component_id, element_id);
            }
        }
        self.prune_if_idle();
        Ok(())
    }

    /// Stops every animation of an instance.
    pub fn cancel_all_animations(&mut self, instance: InstanceId) {
        self.world.stop_all(instance);
        self.prune_if_idle();
    }

    /// Detaches the stop callbacks of `listener` without stopping anything.
    pub fn cancel_animation_callbacks(&mut self, listener: u64) {
        self.world.cancel_callbacks(listener);
    }

    fn prune_if_idle(&mut self) {
        if !self.world.in_update {
            self.world.prune(self.collection);
        }
    }
}

/// The `animc` component type.
#[derive(Clone, Debug, Default)]
pub struct AnimationComponent {
    config: AnimationConfig,
}

impl AnimationComponent {
    /// Component type whose worlds are sized from `config`.
    #[must_use]
    pub fn new(config: AnimationConfig) -> Self {
        Self { config }
    }
}

impl ComponentType for AnimationComponent {
    fn new_world(&self, params: &NewWorldParams) -> Result<Option<ComponentWorld>, HookError> {
        self.config.validate().map_err(|err| HookError::new(err.to_string()))?;
        Ok(Some(Box::new(AnimWorld::new(&self.config, params.max_instances))))
    }

    fn update(&self, params: &mut UpdateParams<'_>, result: &mut UpdateResult) -> HookResult {
        let dt = params.context.dt;
        let Some(world) = params.world.as_deref_mut().and_then(|w| w.downcast_mut::<AnimWorld>()) else {
            return Err(HookError::new("animation world unavailable"));
        };
        if world.update(params.collection, dt) {
            result.transforms_updated = true;
        }
        Ok(())
    }
}

/// Registers the `animc` component type.
///
/// # Errors
///
/// As [`Registry::register_component_type`].
pub fn register_animation_component(registry: &mut Registry, config: AnimationConfig) -> GameObjectResult<u32> {
    let desc = ComponentTypeDesc::new(ANIMATION_COMPONENT_NAME, Arc::new(AnimationComponent::new(config)))
        .with_hooks(Hooks::ADD_TO_UPDATE | Hooks::UPDATE)
        .with_reads_transforms(false);
    registry.register_component_type(desc)
}

impl Collection {
    /// Runs `f` with the animation world, if `animc` is registered and the
    /// world is not lent out.
    pub fn with_animator<R>(&mut self, f: impl FnOnce(&mut Animator<'_>) -> R) -> Option<R> {
        let (type_index, _) = self.registry.find_component_type(animation_resource_type())?;
        let mut world = self.take_world(type_index)?;
        let result = (*world)
            .downcast_mut::<AnimWorld>()
            .map(|world| f(&mut Animator { world, collection: &mut *self }));
        self.restore_world(type_index, Some(world));
        result
    }

    /// Starts animating a property.
    ///
    /// Newer animations on the same property win: when two start in the same
    /// frame, the one started last cancels the other.
    ///
    /// # Errors
    ///
    /// - property lookup errors from [`Collection::get_property`]
    /// - [`PropertyError::UnsupportedOperation`] for read-only properties or
    ///   when no animation world is available
    /// - [`PropertyError::TypeMismatch`] when `to` does not fit the property
    /// - [`PropertyError::UnsupportedType`] for non-numeric properties
    /// - [`PropertyError::BufferOverflow`] when the pool is full; nothing is
    ///   created in that case
    pub fn animate(
        &mut self,
        instance: InstanceId,
        component_id: NameHash,
        property_id: NameHash,
        params: AnimateParams,
    ) -> PropertyResult<()> {
        self.with_animator(|animator| animator.animate(instance, component_id, property_id, params))
            .unwrap_or(Err(PropertyError::UnsupportedOperation))
    }

    /// Stops the animations of one property, vector lanes included.
    ///
    /// Outside an update the stopped animations are removed at once and their
    /// callbacks run with `finished == false`.
    ///
    /// # Errors
    ///
    /// Property lookup errors, [`PropertyError::UnsupportedType`] for
    /// non-numeric properties, [`PropertyError::UnsupportedOperation`] without
    /// an animation world.
    pub fn cancel_animations(
        &mut self,
        instance: InstanceId,
        component_id: NameHash,
        property_id: NameHash,
    ) -> PropertyResult<()> {
        self.with_animator(|animator| animator.cancel_animations(instance, component_id, property_id))
            .unwrap_or(Err(PropertyError::UnsupportedOperation))
    }

    /// Stops every animation of an instance.
    pub fn cancel_all_animations(&mut self, instance: InstanceId) {
        self.with_animator(|animator| animator.cancel_all_animations(instance));
    }

    /// Detaches all stop callbacks registered for `listener`. The animations
    /// keep playing and no callback is called.
    pub fn cancel_animation_callbacks(&mut self, listener: u64) {
        self.with_animator(|animator| animator.cancel_animation_callbacks(listener));
    }

    /// Number of stored animations.
    #[must_use]
    pub fn animation_count(&mut self) -> usize {
        self.with_animator(|animator| animator.world().len()).unwrap_or(0)
    }

    /// Whether any playing animation targets the instance.
    #[must_use]
    pub fn is_animating(&mut self, instance: InstanceId) -> bool {
        self.with_animator(|animator| animator.world().is_animating(instance))
            .unwrap_or(false)
    }

    pub(crate) fn cancel_instance_animations(&mut self, instance: InstanceId) {
        self.cancel_all_animations(instance);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use cinder_shared::hash_str;

    use super::*;
    use crate::config::CollectionConfig;
    use crate::error::GameObjectError;
    use crate::gameobject::update::UpdateContext;

    fn collection() -> Collection {
        let mut registry = Registry::new();
        register_animation_component(&mut registry, AnimationConfig::default()).unwrap();
        Collection::new("anim", Arc::new(registry), CollectionConfig::with_max_instances(16)).unwrap()
    }

    fn x(c: &Collection, instance: InstanceId) -> f32 {
        c.position(instance).unwrap().x
    }

    #[test]
    fn test_animate_lane() {
        let mut c = collection();
        let hero = c.new_instance(None).unwrap();
        c.animate(hero, 0, hash_str("position.x"), AnimateParams::new(PropertyVar::Number(10.0), 1.0))
            .unwrap();
        assert!(c.is_animating(hero));

        for expected in [2.5, 5.0, 7.5, 10.0] {
            c.update(&UpdateContext::new(0.25));
            assert!((x(&c, hero) - expected).abs() < 1e-4);
        }
        assert_eq!(c.animation_count(), 0);
        assert!(!c.is_animating(hero));
    }

    #[test]
    fn test_number_broadcast_to_vector() {
        let mut c = collection();
        let hero = c.new_instance(None).unwrap();
        c.animate(hero, 0, hash_str("position"), AnimateParams::new(PropertyVar::Number(4.0), 1.0))
            .unwrap();
        assert_eq!(c.animation_count(), 4);

        c.update(&UpdateContext::new(1.0));
        let p = c.position(hero).unwrap();
        assert!((p.x - 4.0).abs() < 1e-4 && (p.y - 4.0).abs() < 1e-4 && (p.z - 4.0).abs() < 1e-4);
        assert_eq!(c.animation_count(), 0);
    }

    #[test]
    fn test_rejected_requests() {
        let mut c = collection();
        let hero = c.new_instance(None).unwrap();
        let err = c
            .animate(hero, 0, hash_str("position"), AnimateParams::new(PropertyVar::Boolean(true), 1.0))
            .unwrap_err();
        assert_eq!(err, PropertyError::TypeMismatch);
        let err = c
            .animate(hero, 0, hash_str("nope"), AnimateParams::new(PropertyVar::Number(1.0), 1.0))
            .unwrap_err();
        assert_eq!(err, PropertyError::NotFound);
        assert_eq!(c.animation_count(), 0);
    }

    #[test]
    fn test_requires_animation_component() {
        let mut c = Collection::new("plain", Arc::new(Registry::new()), CollectionConfig::with_max_instances(4)).unwrap();
        let hero = c.new_instance(None).unwrap();
        let err = c
            .animate(hero, 0, hash_str("position.x"), AnimateParams::new(PropertyVar::Number(1.0), 1.0))
            .unwrap_err();
        assert_eq!(err, PropertyError::UnsupportedOperation);
        assert_eq!(c.animation_count(), 0);
    }

    #[test]
    fn test_finished_callback() {
        let mut c = collection();
        let hero = c.new_instance(None).unwrap();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let listener = AnimationListener::new(7, 42, move |_, stopped| {
            sink.lock().unwrap().push(*stopped);
        });
        c.animate(
            hero,
            0,
            hash_str("position.x"),
            AnimateParams::new(PropertyVar::Number(1.0), 0.5).on_stopped(listener),
        )
        .unwrap();

        c.update(&UpdateContext::new(0.25));
        assert!(events.lock().unwrap().is_empty());
        c.update(&UpdateContext::new(0.25));

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].finished);
        assert_eq!(events[0].instance, hero);
        assert_eq!(events[0].property_id, hash_str("position.x"));
        assert_eq!((events[0].listener, events[0].userdata), (7, 42));
    }

    #[test]
    fn test_cancel_reports_unfinished() {
        let mut c = collection();
        let hero = c.new_instance(None).unwrap();
        let finished = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&finished);
        let listener = AnimationListener::new(1, 0, move |_, stopped| {
            *sink.lock().unwrap() = Some(stopped.finished);
        });
        c.animate(
            hero,
            0,
            hash_str("position.x"),
            AnimateParams::new(PropertyVar::Number(10.0), 1.0).on_stopped(listener),
        )
        .unwrap();
        c.update(&UpdateContext::new(0.25));

        c.cancel_animations(hero, 0, hash_str("position.x")).unwrap();
        assert_eq!(*finished.lock().unwrap(), Some(false));
        assert_eq!(c.animation_count(), 0);

        c.update(&UpdateContext::new(0.25));
        assert!((x(&c, hero) - 2.5).abs() < 1e-4);
    }

    #[test]
    fn test_cancel_vector_stops_lanes() {
        let mut c = collection();
        let hero = c.new_instance(None).unwrap();
        c.animate(hero, 0, hash_str("scale"), AnimateParams::new(PropertyVar::Number(2.0), 1.0))
            .unwrap();
        c.cancel_animations(hero, 0, hash_str("scale")).unwrap();
        assert_eq!(c.animation_count(), 0);

        let err = c.cancel_animations(hero, 0, hash_str("nope")).unwrap_err();
        assert_eq!(err, PropertyError::NotFound);
    }

    #[test]
    fn test_detached_callbacks_are_silent() {
        let mut c = collection();
        let hero = c.new_instance(None).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let listener = AnimationListener::new(3, 0, move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        c.animate(
            hero,
            0,
            hash_str("position.x"),
            AnimateParams::new(PropertyVar::Number(1.0), 0.5).on_stopped(listener),
        )
        .unwrap();
        c.cancel_animation_callbacks(3);

        c.update(&UpdateContext::new(1.0));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!((x(&c, hero) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_callback_chains_animation() {
        let mut c = collection();
        let hero = c.new_instance(None).unwrap();
        let listener = AnimationListener::new(0, 0, |animator, stopped| {
            animator
                .animate(
                    stopped.instance,
                    0,
                    hash_str("position.y"),
                    AnimateParams::new(PropertyVar::Number(3.0), 1.0),
                )
                .unwrap();
        });
        c.animate(
            hero,
            0,
            hash_str("position.x"),
            AnimateParams::new(PropertyVar::Number(1.0), 1.0).on_stopped(listener),
        )
        .unwrap();

        c.update(&UpdateContext::new(1.0));
        assert_eq!(c.animation_count(), 1);
        c.update(&UpdateContext::new(1.0));
        assert!((c.position(hero).unwrap().y - 3.0).abs() < 1e-4);
        assert_eq!(c.animation_count(), 0);
    }

    #[test]
    fn test_oversized_pool_rejected() {
        let mut registry = Registry::new();
        let config = AnimationConfig { max_capacity: 70_000, ..AnimationConfig::default() };
        register_animation_component(&mut registry, config).unwrap();
        let err = Collection::new("anim", Arc::new(registry), CollectionConfig::with_max_instances(4)).unwrap_err();
        assert!(matches!(err, GameObjectError::HookFailed(_)));
    }

    #[test]
    fn test_delete_cancels_animations() {
        let mut c = collection();
        let hero = c.new_instance(None).unwrap();
        c.animate(hero, 0, hash_str("position.x"), AnimateParams::new(PropertyVar::Number(1.0), 5.0))
            .unwrap();
        c.delete(hero, false).unwrap();
        c.post_update();
        assert_eq!(c.animation_count(), 0);
    }
}
