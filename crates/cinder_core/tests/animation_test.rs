//! Integration tests for property animation: playback modes, delays,
//! precedence between animations and pool limits.

use std::sync::Arc;

use cinder_core::{
    register_animation_component, AnimateParams, AnimationConfig, AnimationListener, Collection, CollectionConfig,
    EaseFamily, EaseMode, Easing, InstanceId, Playback, PropertyError, PropertyVar, Registry, UpdateContext,
};
use cinder_shared::hash_str;
use parking_lot::Mutex;

fn collection_with(config: AnimationConfig) -> Collection {
    let mut registry = Registry::new();
    register_animation_component(&mut registry, config).unwrap();
    Collection::new("anim", Arc::new(registry), CollectionConfig::with_max_instances(32)).unwrap()
}

fn collection() -> Collection {
    collection_with(AnimationConfig::default())
}

fn x(c: &Collection, instance: InstanceId) -> f32 {
    c.position(instance).unwrap().x
}

fn animate_x(c: &mut Collection, instance: InstanceId, params: AnimateParams) {
    c.animate(instance, 0, hash_str("position.x"), params).unwrap();
}

/// Runs `frames` updates of `dt` and returns `position.x` after each.
fn sample(c: &mut Collection, instance: InstanceId, dt: f32, frames: usize) -> Vec<f32> {
    (0..frames)
        .map(|_| {
            c.update(&UpdateContext::new(dt));
            x(c, instance)
        })
        .collect()
}

fn assert_values(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-4, "got {actual:?}, want {expected:?}");
    }
}

fn playback_values(playback: Playback, frames: usize) -> Vec<f32> {
    let mut c = collection();
    let hero = c.new_instance(None).unwrap();
    animate_x(&mut c, hero, AnimateParams::new(PropertyVar::Number(10.0), 1.0).with_playback(playback));
    sample(&mut c, hero, 0.25, frames)
}

#[test]
fn test_once_forward() {
    assert_values(&playback_values(Playback::OnceForward, 4), &[2.5, 5.0, 7.5, 10.0]);
}

#[test]
fn test_once_backward() {
    assert_values(&playback_values(Playback::OnceBackward, 4), &[7.5, 5.0, 2.5, 0.0]);
}

#[test]
fn test_once_pingpong() {
    assert_values(&playback_values(Playback::OncePingPong, 4), &[5.0, 10.0, 5.0, 0.0]);
}

#[test]
fn test_loop_forward() {
    assert_values(&playback_values(Playback::LoopForward, 5), &[2.5, 5.0, 7.5, 0.0, 2.5]);
}

#[test]
fn test_loop_backward() {
    assert_values(&playback_values(Playback::LoopBackward, 5), &[7.5, 5.0, 2.5, 10.0, 7.5]);
}

#[test]
fn test_loop_pingpong() {
    assert_values(
        &playback_values(Playback::LoopPingPong, 8),
        &[5.0, 10.0, 5.0, 0.0, 5.0, 10.0, 5.0, 0.0],
    );
}

#[test]
fn test_once_modes_complete_and_loops_keep_playing() {
    let mut c = collection();
    let once = c.new_instance(None).unwrap();
    let looping = c.new_instance(None).unwrap();
    animate_x(&mut c, once, AnimateParams::new(PropertyVar::Number(1.0), 1.0));
    animate_x(
        &mut c,
        looping,
        AnimateParams::new(PropertyVar::Number(1.0), 1.0).with_playback(Playback::LoopForward),
    );

    for _ in 0..8 {
        c.update(&UpdateContext::new(0.25));
    }
    assert!(!c.is_animating(once));
    assert!(c.is_animating(looping));
    assert_eq!(c.animation_count(), 1);
}

#[test]
fn test_delay_holds_start_value() {
    let mut c = collection();
    let hero = c.new_instance(None).unwrap();
    animate_x(&mut c, hero, AnimateParams::new(PropertyVar::Number(10.0), 1.0).with_delay(1.0));
    assert_values(&sample(&mut c, hero, 0.25, 4), &[0.0, 0.0, 0.0, 0.0]);
    assert_values(&sample(&mut c, hero, 0.25, 2), &[2.5, 5.0]);
}

#[test]
fn test_zero_duration_jumps_to_target() {
    let mut c = collection();
    let hero = c.new_instance(None).unwrap();
    animate_x(&mut c, hero, AnimateParams::new(PropertyVar::Number(3.0), 0.0));
    assert_values(&sample(&mut c, hero, 0.25, 1), &[3.0]);
    assert_eq!(c.animation_count(), 0);
}

#[test]
fn test_large_steps() {
    let mut c = collection();
    let hero = c.new_instance(None).unwrap();
    animate_x(&mut c, hero, AnimateParams::new(PropertyVar::Number(10.0), 2.0));
    assert_values(&sample(&mut c, hero, 1.0, 2), &[5.0, 10.0]);

    let looping = c.new_instance(None).unwrap();
    animate_x(
        &mut c,
        looping,
        AnimateParams::new(PropertyVar::Number(10.0), 2.0).with_playback(Playback::LoopForward),
    );
    assert_values(&sample(&mut c, looping, 2.5, 1), &[2.5]);
}

#[test]
fn test_starts_from_current_value() {
    let mut c = collection();
    let hero = c.new_instance(None).unwrap();
    c.set_property(hero, 0, hash_str("position.x"), &PropertyVar::Number(4.0)).unwrap();
    animate_x(&mut c, hero, AnimateParams::new(PropertyVar::Number(8.0), 1.0));
    assert_values(&sample(&mut c, hero, 0.5, 2), &[6.0, 8.0]);
}

#[test]
fn test_easing_applies() {
    let mut c = collection();
    let hero = c.new_instance(None).unwrap();
    animate_x(
        &mut c,
        hero,
        AnimateParams::new(PropertyVar::Number(1.0), 1.0).with_easing(Easing::ease(EaseFamily::Quad, EaseMode::In)),
    );
    assert_values(&sample(&mut c, hero, 0.5, 2), &[0.25, 1.0]);
}

#[test]
fn test_newer_animation_wins() {
    let mut c = collection();
    let hero = c.new_instance(None).unwrap();
    let stopped = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&stopped);
    let first = AnimationListener::new(1, 0, move |_, event| sink.lock().push((event.userdata, event.finished)));

    animate_x(&mut c, hero, AnimateParams::new(PropertyVar::Number(100.0), 1.0).on_stopped(first));
    animate_x(&mut c, hero, AnimateParams::new(PropertyVar::Number(20.0), 1.0));

    assert_values(&sample(&mut c, hero, 0.25, 1), &[5.0]);
    assert_eq!(*stopped.lock(), [(0, false)]);
    assert_eq!(c.animation_count(), 1);
}

#[test]
fn test_delayed_animation_does_not_stop_running_one() {
    let mut c = collection();
    let hero = c.new_instance(None).unwrap();
    animate_x(&mut c, hero, AnimateParams::new(PropertyVar::Number(10.0), 1.0));
    c.update(&UpdateContext::new(0.25));
    animate_x(&mut c, hero, AnimateParams::new(PropertyVar::Number(0.0), 1.0).with_delay(0.5));

    c.update(&UpdateContext::new(0.25));
    assert_eq!(c.animation_count(), 2);
    assert!((x(&c, hero) - 5.0).abs() < 1e-4);
}

#[test]
fn test_pool_ceiling() {
    let mut c = collection_with(AnimationConfig { initial_capacity: 2, min_capacity_growth: 2, max_capacity: 4 });
    let hero = c.new_instance(None).unwrap();
    for lane in ["position.x", "position.y", "position.z", "scale.x"] {
        c.animate(hero, 0, hash_str(lane), AnimateParams::new(PropertyVar::Number(1.0), 1.0))
            .unwrap();
    }
    let err = c
        .animate(hero, 0, hash_str("scale.y"), AnimateParams::new(PropertyVar::Number(1.0), 1.0))
        .unwrap_err();
    assert_eq!(err, PropertyError::BufferOverflow);
    assert_eq!(c.animation_count(), 4);
}

#[test]
fn test_vector_request_is_all_or_nothing() {
    let mut c = collection_with(AnimationConfig { initial_capacity: 4, min_capacity_growth: 4, max_capacity: 5 });
    let hero = c.new_instance(None).unwrap();
    c.animate(hero, 0, hash_str("scale.x"), AnimateParams::new(PropertyVar::Number(2.0), 1.0))
        .unwrap();
    c.animate(hero, 0, hash_str("scale.y"), AnimateParams::new(PropertyVar::Number(2.0), 1.0))
        .unwrap();

    let err = c
        .animate(hero, 0, hash_str("position"), AnimateParams::new(PropertyVar::Number(1.0), 1.0))
        .unwrap_err();
    assert_eq!(err, PropertyError::BufferOverflow);
    assert_eq!(c.animation_count(), 2);
}

#[test]
fn test_handles_survive_removals() {
    let mut c = collection();
    let instances: Vec<InstanceId> = (0..6).map(|_| c.new_instance(None).unwrap()).collect();
    for (i, &instance) in instances.iter().enumerate() {
        let duration = if i % 2 == 0 { 0.25 } else { 1.0 };
        animate_x(&mut c, instance, AnimateParams::new(PropertyVar::Number(4.0), duration));
    }

    c.update(&UpdateContext::new(0.25));
    assert_eq!(c.animation_count(), 3);
    for (i, &instance) in instances.iter().enumerate() {
        assert_eq!(c.is_animating(instance), i % 2 == 1);
    }

    c.cancel_all_animations(instances[3]);
    assert_eq!(c.animation_count(), 2);
    c.update(&UpdateContext::new(0.75));
    assert_eq!(c.animation_count(), 0);
    assert!((x(&c, instances[1]) - 4.0).abs() < 1e-4);
    assert!((x(&c, instances[3]) - 1.0).abs() < 1e-4);
}

#[test]
fn test_read_only_property_rejected() {
    struct Fixed;
    impl cinder_core::ComponentType for Fixed {
        fn get_property(
            &self,
            _params: &mut cinder_core::ComponentParams<'_>,
            _property_id: u64,
        ) -> cinder_core::PropertyResult<cinder_core::PropertyDesc> {
            Ok(cinder_core::PropertyDesc::new(PropertyVar::Number(1.0)).read_only())
        }
    }

    let mut registry = Registry::new();
    register_animation_component(&mut registry, AnimationConfig::default()).unwrap();
    registry
        .register_component_type(
            cinder_core::ComponentTypeDesc::new("fixedc", Arc::new(Fixed)).with_hooks(cinder_core::Hooks::GET_PROPERTY),
        )
        .unwrap();
    let proto = Arc::new(
        cinder_core::Prototype::new("/fixed.goc")
            .with_component(&registry, "fixed", cinder_core::resource_type("fixedc"), |c| c)
            .unwrap(),
    );
    let mut c = Collection::new("ro", Arc::new(registry), CollectionConfig::with_max_instances(4)).unwrap();
    let hero = c.new_instance(Some(proto)).unwrap();

    let err = c
        .animate(hero, hash_str("fixed"), hash_str("speed"), AnimateParams::new(PropertyVar::Number(2.0), 1.0))
        .unwrap_err();
    assert_eq!(err, PropertyError::UnsupportedOperation);
}

#[test]
fn test_rejected_writes_do_not_stall_animation() {
    struct Gauge;
    impl cinder_core::ComponentType for Gauge {
        fn get_property(
            &self,
            _params: &mut cinder_core::ComponentParams<'_>,
            _property_id: u64,
        ) -> cinder_core::PropertyResult<cinder_core::PropertyDesc> {
            Ok(cinder_core::PropertyDesc::new(PropertyVar::Number(0.0)))
        }
    }

    let mut registry = Registry::new();
    register_animation_component(&mut registry, AnimationConfig::default()).unwrap();
    registry
        .register_component_type(
            cinder_core::ComponentTypeDesc::new("gaugec", Arc::new(Gauge)).with_hooks(cinder_core::Hooks::GET_PROPERTY),
        )
        .unwrap();
    let proto = Arc::new(
        cinder_core::Prototype::new("/gauge.goc")
            .with_component(&registry, "gauge", cinder_core::resource_type("gaugec"), |c| c)
            .unwrap(),
    );
    let mut c = Collection::new("gauge", Arc::new(registry), CollectionConfig::with_max_instances(4)).unwrap();
    let hero = c.new_instance(Some(proto)).unwrap();

    let stopped = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&stopped);
    let listener = AnimationListener::new(1, 0, move |_, event| sink.lock().push(event.finished));
    c.animate(
        hero,
        hash_str("gauge"),
        hash_str("level"),
        AnimateParams::new(PropertyVar::Number(2.0), 0.5).on_stopped(listener),
    )
    .unwrap();

    c.update(&UpdateContext::new(0.25));
    c.update(&UpdateContext::new(0.25));
    assert_eq!(*stopped.lock(), [true]);
    assert_eq!(c.animation_count(), 0);
}
