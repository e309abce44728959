//! # Messages
//!
//! Every collection owns two sockets, the component socket and the frame
//! socket. Both are drained together after each component type updates and
//! whenever [`Collection::dispatch_messages`] runs. They are unbounded
//! crossbeam channels, so a [`MessageSender`] can be cloned out and used from
//! any thread.
//!
//! Delivery resolves the receiver path through the identifier table. A set
//! fragment targets one component; an empty fragment broadcasts to every
//! component with an `on_message` hook. Built-in messages (input focus,
//! reparenting, transform requests) are handled by the collection itself.

use std::sync::OnceLock;

use bytemuck::{Pod, Zeroable};
use cinder_shared::{hash_str, NameHash, Quat, Transform, Vec3};
use crossbeam_channel::{Receiver, Sender};
use tracing::{error, warn};

use super::collection::Collection;
use super::registry::Hooks;
use crate::error::{GameObjectError, GameObjectResult};

/// Message address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Url {
    /// Socket name hash.
    pub socket: NameHash,
    /// Instance identifier; zero addresses nobody.
    pub path: NameHash,
    /// Component id; zero broadcasts.
    pub fragment: NameHash,
}

impl Url {
    /// Creates an address.
    #[must_use]
    pub const fn new(socket: NameHash, path: NameHash, fragment: NameHash) -> Self {
        Self { socket, path, fragment }
    }
}

/// A message envelope.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    /// Who sent it.
    pub sender: Url,
    /// Who gets it.
    pub receiver: Url,
    /// Message id.
    pub id: NameHash,
    /// Payload schema, when the payload is typed.
    pub descriptor: Option<NameHash>,
    /// Opaque caller data.
    pub user_data: u64,
    /// Payload bytes.
    pub payload: Vec<u8>,
}

impl Message {
    /// Message without payload.
    #[must_use]
    pub fn new(sender: Url, receiver: Url, id: NameHash) -> Self {
        Self { sender, receiver, id, descriptor: None, user_data: 0, payload: Vec::new() }
    }

    /// Attaches raw payload bytes.
    #[must_use]
    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    /// Attaches a typed payload.
    #[must_use]
    pub fn with_pod<T: Pod>(mut self, descriptor: NameHash, payload: &T) -> Self {
        self.descriptor = Some(descriptor);
        self.payload = bytemuck::bytes_of(payload).to_vec();
        self
    }

    /// Decodes a typed payload. `None` on size mismatch.
    #[must_use]
    pub fn payload_as<T: Pod>(&self) -> Option<T> {
        bytemuck::try_pod_read_unaligned(&self.payload).ok()
    }

    /// Size of the payload in bytes.
    #[inline]
    #[must_use]
    pub fn payload_size(&self) -> usize {
        self.payload.len()
    }

    /// Asks the receiver to take input focus.
    #[must_use]
    pub fn acquire_input_focus(sender: Url, receiver: Url) -> Self {
        let id = builtin_messages().acquire_input_focus;
        let mut msg = Self::new(sender, receiver, id);
        msg.descriptor = Some(id);
        msg
    }

    /// Asks the receiver to give up input focus.
    #[must_use]
    pub fn release_input_focus(sender: Url, receiver: Url) -> Self {
        let id = builtin_messages().release_input_focus;
        let mut msg = Self::new(sender, receiver, id);
        msg.descriptor = Some(id);
        msg
    }

    /// Reparents the receiver; `parent_id == 0` detaches it.
    #[must_use]
    pub fn set_parent(sender: Url, receiver: Url, parent_id: NameHash, keep_world_transform: bool) -> Self {
        let id = builtin_messages().set_parent;
        let payload = SetParent {
            parent_id,
            keep_world_transform: u32::from(keep_world_transform),
            _pad: 0,
        };
        Self::new(sender, receiver, id).with_pod(id, &payload)
    }

    /// Asks the receiver to reply with a [`TransformResponse`].
    #[must_use]
    pub fn request_transform(sender: Url, receiver: Url) -> Self {
        let id = builtin_messages().request_transform;
        let mut msg = Self::new(sender, receiver, id);
        msg.descriptor = Some(id);
        msg
    }
}

/// Payload of the `set_parent` message.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct SetParent {
    /// Identifier of the new parent, zero for none.
    pub parent_id: u64,
    /// Non-zero keeps the world transform by rewriting the local one.
    pub keep_world_transform: u32,
    /// Padding.
    pub _pad: u32,
}

/// Payload of the `transform_response` message.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct TransformResponse {
    /// Local position.
    pub position: Vec3,
    /// Local rotation.
    pub rotation: Quat,
    /// Local scale.
    pub scale: Vec3,
    /// World position.
    pub world_position: Vec3,
    /// World rotation.
    pub world_rotation: Quat,
    /// World scale.
    pub world_scale: Vec3,
}

/// Ids of the messages the collection handles itself.
#[derive(Clone, Copy, Debug)]
pub struct BuiltinMessages {
    /// `acquire_input_focus`
    pub acquire_input_focus: NameHash,
    /// `release_input_focus`
    pub release_input_focus: NameHash,
    /// `set_parent`
    pub set_parent: NameHash,
    /// `request_transform`
    pub request_transform: NameHash,
    /// `transform_response`, sent back for `request_transform`
    pub transform_response: NameHash,
}

/// Built-in message ids.
pub fn builtin_messages() -> &'static BuiltinMessages {
    static IDS: OnceLock<BuiltinMessages> = OnceLock::new();
    IDS.get_or_init(|| BuiltinMessages {
        acquire_input_focus: hash_str("acquire_input_focus"),
        release_input_focus: hash_str("release_input_focus"),
        set_parent: hash_str("set_parent"),
        request_transform: hash_str("request_transform"),
        transform_response: hash_str("transform_response"),
    })
}

/// Cloneable posting handle for one socket.
#[derive(Clone, Debug)]
pub struct MessageSender {
    socket: NameHash,
    sender: Sender<Message>,
}

impl MessageSender {
    /// Socket this handle posts to.
    #[inline]
    #[must_use]
    pub fn socket(&self) -> NameHash {
        self.socket
    }

    /// Queues a message.
    ///
    /// # Errors
    ///
    /// [`GameObjectError::SocketNotFound`] once the collection is gone.
    pub fn post(&self, message: Message) -> GameObjectResult<()> {
        self.sender
            .send(message)
            .map_err(|_| GameObjectError::SocketNotFound(self.socket))
    }
}

pub(crate) struct Socket {
    pub(crate) name: NameHash,
    sender: Sender<Message>,
    receiver: Receiver<Message>,
}

impl Socket {
    pub(crate) fn new(name: NameHash) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self { name, sender, receiver }
    }

    pub(crate) fn handle(&self) -> MessageSender {
        MessageSender { socket: self.name, sender: self.sender.clone() }
    }

    pub(crate) fn has_messages(&self) -> bool {
        !self.receiver.is_empty()
    }

    /// Messages queued right now; later posts wait for the next round.
    pub(crate) fn take_pending(&self) -> Vec<Message> {
        let pending = self.receiver.len();
        self.receiver.try_iter().take(pending).collect()
    }
}

impl Collection {
    /// Address of a component of an instance on the component socket.
    #[must_use]
    pub fn url(&self, path: NameHash, fragment: NameHash) -> Url {
        Url::new(self.component_socket.name, path, fragment)
    }

    /// Posting handle for the component socket.
    #[must_use]
    pub fn message_sender(&self) -> MessageSender {
        self.component_socket.handle()
    }

    /// Posting handle for the frame socket.
    #[must_use]
    pub fn frame_message_sender(&self) -> MessageSender {
        self.frame_socket.handle()
    }

    /// Component socket name hash.
    #[inline]
    #[must_use]
    pub fn component_socket(&self) -> NameHash {
        self.component_socket.name
    }

    /// Frame socket name hash.
    #[inline]
    #[must_use]
    pub fn frame_socket(&self) -> NameHash {
        self.frame_socket.name
    }

    /// Queues a message on the socket named by `message.receiver.socket`.
    ///
    /// # Errors
    ///
    /// [`GameObjectError::SocketNotFound`] when the socket is not one of ours.
    pub fn post(&self, message: Message) -> GameObjectResult<()> {
        let socket = message.receiver.socket;
        if socket == self.component_socket.name {
            self.component_socket.handle().post(message)
        } else if socket == self.frame_socket.name {
            self.frame_socket.handle().post(message)
        } else {
            Err(GameObjectError::SocketNotFound(socket))
        }
    }

    /// Drains both sockets until quiet or the iteration cap is hit.
    ///
    /// Each round delivers only what was queued when the round began.
    /// Returns `false` if any delivery failed.
    pub fn dispatch_messages(&mut self) -> bool {
        let mut success = true;
        let mut iterate = true;
        let mut iteration = 0;
        while iterate && iteration < self.config.max_dispatch_iterations {
            iterate = false;
            for frame in [false, true] {
                if !self.socket(frame).has_messages() {
                    continue;
                }
                if self.dirty_transforms {
                    self.update_transforms();
                }
                let pending = self.socket(frame).take_pending();
                if !pending.is_empty() {
                    self.dirty_transforms = true;
                    iterate = true;
                }
                for message in &pending {
                    success &= self.deliver(message);
                }
            }
            iteration += 1;
        }
        success
    }

    fn socket(&self, frame: bool) -> &Socket {
        if frame {
            &self.frame_socket
        } else {
            &self.component_socket
        }
    }

    fn deliver(&mut self, message: &Message) -> bool {
        let Some(&slot) = self.identifiers.get(&message.receiver.path) else {
            error!(
                receiver = message.receiver.path,
                id = message.id,
                sender = message.sender.path,
                "instance could not be found when dispatching message"
            );
            return false;
        };
        let instance = self.id_of(slot);

        if message.descriptor.is_some() {
            let ids = builtin_messages();
            if message.id == ids.acquire_input_focus {
                return self.acquire_input_focus(instance).is_ok();
            }
            if message.id == ids.release_input_focus {
                self.release_input_focus(instance);
                return true;
            }
            if message.id == ids.request_transform {
                return self.reply_transform(slot, message);
            }
            if message.id == ids.set_parent {
                return self.apply_set_parent(slot, message);
            }
        }

        let prototype = std::sync::Arc::clone(&self.instances[slot as usize].prototype);
        if message.receiver.fragment != 0 {
            let Some(component_index) = self.find_component_index(slot, message.receiver.fragment) else {
                error!(
                    receiver = message.receiver.path,
                    fragment = message.receiver.fragment,
                    id = message.id,
                    "component could not be found when dispatching message"
                );
                return false;
            };
            return self
                .with_component(slot, component_index, |desc, params| {
                    if desc.has(Hooks::ON_MESSAGE) {
                        desc.behaviour.on_message(params, message).is_ok()
                    } else {
                        warn!(component = %desc.name, "component type is missing on_message");
                        true
                    }
                })
                .unwrap_or(false);
        }

        let mut success = true;
        for component_index in 0..prototype.components().len() {
            if !self.is_live(slot, instance) {
                break;
            }
            let delivered = self.with_component(slot, component_index, |desc, params| {
                !desc.has(Hooks::ON_MESSAGE) || desc.behaviour.on_message(params, message).is_ok()
            });
            success &= delivered.unwrap_or(false);
        }
        success
    }

    fn reply_transform(&mut self, slot: u32, message: &Message) -> bool {
        let local = self.instances[slot as usize].transform;
        let world = self.world_transforms[slot as usize];
        let response = TransformResponse {
            position: local.position,
            rotation: local.rotation,
            scale: local.scale,
            world_position: world.position,
            world_rotation: world.rotation,
            world_scale: world.scale,
        };
        let id = builtin_messages().transform_response;
        let reply = Message::new(message.receiver, message.sender, id).with_pod(id, &response);
        match self.post(Message { user_data: message.user_data, ..reply }) {
            Ok(()) => true,
            Err(err) => {
                error!(%err, "could not send transform_response to sender");
                false
            }
        }
    }

    fn apply_set_parent(&mut self, slot: u32, message: &Message) -> bool {
        let Some(payload) = message.payload_as::<SetParent>() else {
            error!(size = message.payload_size(), "malformed set_parent payload");
            return false;
        };
        let mut parent = None;
        if payload.parent_id != 0 {
            parent = self.identifiers.get(&payload.parent_id).copied();
            if parent.is_none() {
                warn!(parent = payload.parent_id, "could not find parent instance");
            }
        }
        let child = self.id_of(slot);
        let parent_id = parent.map(|p| self.id_of(p));
        if let Err(err) = self.set_parent(child, parent_id) {
            warn!(%err, child = self.instances[slot as usize].identifier, "error when setting parent");
            return true;
        }

        let parent_world = parent.map_or(Transform::IDENTITY, |p| self.world_transforms[p as usize]);
        let inst = &self.instances[slot as usize];
        if payload.keep_world_transform == 0 {
            let world = if inst.scale_along_z {
                parent_world.mul(&inst.transform)
            } else {
                parent_world.mul_no_scale_z(&inst.transform)
            };
            self.world_transforms[slot as usize] = world;
        } else {
            let world = self.world_transforms[slot as usize];
            self.instances[slot as usize].transform = parent_world.inverse().mul(&world);
        }
        true
    }
}
