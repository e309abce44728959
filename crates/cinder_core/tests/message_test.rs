//! Integration tests for message dispatch and input focus.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cinder_core::{
    resource_type, Collection, CollectionConfig, ComponentParams, ComponentType, ComponentTypeDesc, GameObjectError,
    HookError, HookResult, Hooks, InputAction, InputResult, InstanceId, Message, Prototype, Registry, Url,
};
use cinder_core::gameobject::{builtin_messages, TransformResponse};
use cinder_shared::{hash_str, Quat, Vec3};
use parking_lot::Mutex;

/// Posts every received message back to its own receiver.
struct Echo {
    deliveries: Arc<AtomicUsize>,
}

impl ComponentType for Echo {
    fn on_message(&self, params: &mut ComponentParams<'_>, message: &Message) -> HookResult {
        self.deliveries.fetch_add(1, Ordering::SeqCst);
        params
            .collection
            .post(message.clone())
            .map_err(|err| HookError::new(err.to_string()))
    }
}

/// Stores received messages.
struct Inbox {
    received: Arc<Mutex<Vec<Message>>>,
}

impl ComponentType for Inbox {
    fn on_message(&self, _params: &mut ComponentParams<'_>, message: &Message) -> HookResult {
        self.received.lock().push(message.clone());
        Ok(())
    }
}

/// Records input and optionally consumes it.
struct Listener {
    consume: bool,
    seen: Arc<Mutex<Vec<InstanceId>>>,
}

impl ComponentType for Listener {
    fn on_input(&self, params: &mut ComponentParams<'_>, _action: &InputAction) -> Result<InputResult, HookError> {
        self.seen.lock().push(params.instance);
        Ok(if self.consume { InputResult::Consumed } else { InputResult::Ignored })
    }
}

fn single_type_collection(name: &str, behaviour: Arc<dyn ComponentType>, hooks: Hooks) -> (Collection, Arc<Prototype>) {
    let mut registry = Registry::new();
    registry
        .register_component_type(ComponentTypeDesc::new(name, behaviour).with_hooks(hooks))
        .unwrap();
    let prototype = Arc::new(
        Prototype::new("/proto.goc")
            .with_component(&registry, "main", resource_type(name), |c| c)
            .unwrap(),
    );
    let collection = Collection::new("main", Arc::new(registry), CollectionConfig::with_max_instances(16)).unwrap();
    (collection, prototype)
}

fn spawn(c: &mut Collection, prototype: &Arc<Prototype>, id: &str) -> InstanceId {
    c.spawn(Arc::clone(prototype), hash_str(id), &[], Vec3::ZERO, Quat::IDENTITY, Vec3::ONE)
        .unwrap()
}

#[test]
fn test_dispatch_stops_after_iteration_cap() {
    let deliveries = Arc::new(AtomicUsize::new(0));
    let (mut c, proto) = single_type_collection(
        "echoc",
        Arc::new(Echo { deliveries: Arc::clone(&deliveries) }),
        Hooks::ON_MESSAGE,
    );
    spawn(&mut c, &proto, "/echo");

    let url = c.url(hash_str("/echo"), 0);
    c.post(Message::new(url, url, hash_str("ping"))).unwrap();
    c.dispatch_messages();
    assert_eq!(deliveries.load(Ordering::SeqCst), 10);

    c.dispatch_messages();
    assert_eq!(deliveries.load(Ordering::SeqCst), 20);
}

#[test]
fn test_component_fragment_and_broadcast() {
    let received = Arc::new(Mutex::new(Vec::new()));
    let (mut c, proto) = single_type_collection(
        "inboxc",
        Arc::new(Inbox { received: Arc::clone(&received) }),
        Hooks::ON_MESSAGE,
    );
    spawn(&mut c, &proto, "/box");

    let to_component = c.url(hash_str("/box"), hash_str("main"));
    let to_instance = c.url(hash_str("/box"), 0);
    c.post(Message::new(to_instance, to_component, hash_str("a")).with_payload(vec![1, 2, 3]))
        .unwrap();
    c.post(Message::new(to_component, to_instance, hash_str("b"))).unwrap();
    assert!(c.dispatch_messages());

    let received = received.lock();
    let ids: Vec<u64> = received.iter().map(|m| m.id).collect();
    assert_eq!(ids, [hash_str("a"), hash_str("b")]);
    assert_eq!(received[0].payload, [1, 2, 3]);
}

#[test]
fn test_unknown_receiver_fails_delivery() {
    let received = Arc::new(Mutex::new(Vec::new()));
    let (mut c, _) = single_type_collection("inboxc", Arc::new(Inbox { received }), Hooks::ON_MESSAGE);
    let url = c.url(hash_str("/nobody"), 0);
    c.post(Message::new(url, url, hash_str("lost"))).unwrap();
    assert!(!c.dispatch_messages());

    let foreign = Url::new(hash_str("elsewhere"), 0, 0);
    let err = c.post(Message::new(url, foreign, 1)).unwrap_err();
    assert_eq!(err, GameObjectError::SocketNotFound(hash_str("elsewhere")));
}

#[test]
fn test_frame_sender_across_threads() {
    let received = Arc::new(Mutex::new(Vec::new()));
    let (mut c, proto) =
        single_type_collection("inboxc", Arc::new(Inbox { received: Arc::clone(&received) }), Hooks::ON_MESSAGE);
    spawn(&mut c, &proto, "/box");
    let sender = c.frame_message_sender();
    assert_eq!(sender.socket(), c.frame_socket());

    let url = Url::new(c.frame_socket(), hash_str("/box"), 0);
    let poster = std::thread::spawn(move || sender.post(Message::new(url, url, hash_str("frame"))));
    poster.join().unwrap().unwrap();
    c.dispatch_messages();
    assert_eq!(received.lock().len(), 1);

    let late = c.message_sender();
    drop(c);
    assert!(matches!(late.post(Message::new(url, url, 0)), Err(GameObjectError::SocketNotFound(_))));
}

#[test]
fn test_set_parent_message_keeps_world_transform() {
    let received = Arc::new(Mutex::new(Vec::new()));
    let (mut c, proto) = single_type_collection("inboxc", Arc::new(Inbox { received }), Hooks::ON_MESSAGE);
    let parent = spawn(&mut c, &proto, "/parent");
    let child = spawn(&mut c, &proto, "/child");
    c.set_position(parent, Vec3::new(10.0, 0.0, 0.0)).unwrap();
    c.set_position(child, Vec3::new(1.0, 0.0, 0.0)).unwrap();

    let url = c.url(hash_str("/child"), 0);
    c.post(Message::set_parent(url, url, hash_str("/parent"), true)).unwrap();
    c.dispatch_messages();
    c.update_transforms();

    assert_eq!(c.parent(child), Some(parent));
    assert!((c.position(child).unwrap().x + 9.0).abs() < 1e-4);
    assert!((c.world_position(child).unwrap().x - 1.0).abs() < 1e-4);

    c.post(Message::set_parent(url, url, 0, false)).unwrap();
    c.dispatch_messages();
    assert_eq!(c.parent(child), None);
}

#[test]
fn test_request_transform_replies_to_sender() {
    let received = Arc::new(Mutex::new(Vec::new()));
    let (mut c, proto) =
        single_type_collection("inboxc", Arc::new(Inbox { received: Arc::clone(&received) }), Hooks::ON_MESSAGE);
    spawn(&mut c, &proto, "/asker");
    let target = spawn(&mut c, &proto, "/target");
    c.set_position(target, Vec3::new(0.0, 7.0, 0.0)).unwrap();

    let asker = c.url(hash_str("/asker"), 0);
    let target_url = c.url(hash_str("/target"), 0);
    c.post(Message::request_transform(asker, target_url)).unwrap();
    c.dispatch_messages();

    let received = received.lock();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].id, builtin_messages().transform_response);
    let response = received[0].payload_as::<TransformResponse>().unwrap();
    assert_eq!(response.world_position.y, 7.0);
}

struct InputFixture {
    collection: Collection,
    passive: Arc<Prototype>,
    greedy: Arc<Prototype>,
    seen: Arc<Mutex<Vec<InstanceId>>>,
}

fn input_fixture(stack: u32) -> InputFixture {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut registry = Registry::new();
    registry
        .register_component_type(
            ComponentTypeDesc::new("passc", Arc::new(Listener { consume: false, seen: Arc::clone(&seen) }))
                .with_hooks(Hooks::ON_INPUT),
        )
        .unwrap();
    registry
        .register_component_type(
            ComponentTypeDesc::new("greedyc", Arc::new(Listener { consume: true, seen: Arc::clone(&seen) }))
                .with_hooks(Hooks::ON_INPUT),
        )
        .unwrap();
    let passive = Arc::new(
        Prototype::new("/passive.goc")
            .with_component(&registry, "input", resource_type("passc"), |c| c)
            .unwrap(),
    );
    let greedy = Arc::new(
        Prototype::new("/greedy.goc")
            .with_component(&registry, "input", resource_type("greedyc"), |c| c)
            .unwrap(),
    );
    let config = CollectionConfig { max_input_stack_entries: stack, ..CollectionConfig::with_max_instances(16) };
    let collection = Collection::new("input", Arc::new(registry), config).unwrap();
    InputFixture { collection, passive, greedy, seen }
}

fn action() -> InputAction {
    InputAction { action_id: hash_str("jump"), value: 1.0, pressed: true, ..InputAction::default() }
}

#[test]
fn test_input_reaches_top_first_and_stops_when_consumed() {
    let mut fx = input_fixture(8);
    let c = &mut fx.collection;
    let bottom = spawn(c, &fx.passive, "/bottom");
    let middle = spawn(c, &fx.greedy, "/middle");
    let top = spawn(c, &fx.passive, "/top");
    for instance in [bottom, middle, top] {
        c.acquire_input_focus(instance).unwrap();
    }
    assert_eq!(c.input_focus().collect::<Vec<_>>(), vec![top, middle, bottom]);

    c.dispatch_input(&[action()]).unwrap();
    assert_eq!(*fx.seen.lock(), [top, middle]);

    fx.seen.lock().clear();
    c.release_input_focus(middle);
    c.dispatch_input(&[action()]).unwrap();
    assert_eq!(*fx.seen.lock(), [top, bottom]);
}

#[test]
fn test_reacquire_moves_to_top() {
    let mut fx = input_fixture(8);
    let c = &mut fx.collection;
    let a = spawn(c, &fx.passive, "/a");
    let b = spawn(c, &fx.passive, "/b");
    c.acquire_input_focus(a).unwrap();
    c.acquire_input_focus(b).unwrap();
    c.acquire_input_focus(a).unwrap();
    assert_eq!(c.input_focus().collect::<Vec<_>>(), vec![a, b]);
}

#[test]
fn test_input_stack_is_bounded() {
    let mut fx = input_fixture(2);
    let c = &mut fx.collection;
    let a = spawn(c, &fx.passive, "/a");
    let b = spawn(c, &fx.passive, "/b");
    let extra = spawn(c, &fx.passive, "/c");
    c.acquire_input_focus(a).unwrap();
    c.acquire_input_focus(b).unwrap();
    let err = c.acquire_input_focus(extra).unwrap_err();
    assert!(matches!(err, GameObjectError::OutOfResources(_)));
}

#[test]
fn test_focus_messages_and_delete() {
    let mut fx = input_fixture(8);
    let c = &mut fx.collection;
    let hero = spawn(c, &fx.passive, "/hero");
    let url = c.url(hash_str("/hero"), 0);

    c.post(Message::acquire_input_focus(url, url)).unwrap();
    c.dispatch_messages();
    assert_eq!(c.input_focus().collect::<Vec<_>>(), vec![hero]);

    c.post(Message::release_input_focus(url, url)).unwrap();
    c.dispatch_messages();
    assert_eq!(c.input_focus().count(), 0);

    c.acquire_input_focus(hero).unwrap();
    c.delete(hero, false).unwrap();
    c.post_update();
    assert_eq!(c.input_focus().count(), 0);
}

#[test]
fn test_post_update_drains_residual_messages() {
    let received = Arc::new(Mutex::new(Vec::new()));
    let (mut c, proto) =
        single_type_collection("inboxc", Arc::new(Inbox { received: Arc::clone(&received) }), Hooks::ON_MESSAGE);
    spawn(&mut c, &proto, "/hero");

    let url = c.url(hash_str("/hero"), 0);
    c.post(Message::new(url, url, hash_str("late"))).unwrap();
    assert!(c.post_update());
    assert_eq!(received.lock().len(), 1);
}

#[test]
fn test_rejected_set_parent_keeps_transforms() {
    let received = Arc::new(Mutex::new(Vec::new()));
    let (mut c, proto) = single_type_collection("inboxc", Arc::new(Inbox { received }), Hooks::ON_MESSAGE);
    let parent = spawn(&mut c, &proto, "/parent");
    let child = spawn(&mut c, &proto, "/child");
    c.set_parent(child, Some(parent)).unwrap();
    c.set_position(parent, Vec3::new(5.0, 0.0, 0.0)).unwrap();
    c.set_position(child, Vec3::new(1.0, 0.0, 0.0)).unwrap();
    c.update_transforms();

    // Parenting the parent under its own child is a cycle.
    let url = c.url(hash_str("/parent"), 0);
    c.post(Message::set_parent(url, url, hash_str("/child"), true)).unwrap();
    c.dispatch_messages();

    assert_eq!(c.parent(parent), None);
    assert_eq!(c.parent(child), Some(parent));
    assert!((c.position(parent).unwrap().x - 5.0).abs() < 1e-4);
    assert!((c.world_position(parent).unwrap().x - 5.0).abs() < 1e-4);
}
