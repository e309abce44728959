//! # Game Objects
//!
//! A [`Collection`] is a self-contained scene: a fixed pool of instance slots,
//! the hierarchy levels used for the transform pass, and one world per
//! registered component type.
//!
//! ## Design Philosophy
//!
//! - Slots are allocated up front; handles carry a generation
//! - Hooks get `&mut Collection`, structural changes are queued
//! - The hierarchy is stored as intrusive links and per-depth arrays

pub(crate) mod collection;
pub(crate) mod component;
pub(crate) mod hierarchy;
pub(crate) mod input;
pub(crate) mod instance;
pub(crate) mod lifecycle;
pub(crate) mod message;
pub(crate) mod property;
pub(crate) mod prototype;
pub(crate) mod registry;
pub(crate) mod resource;
pub(crate) mod transform;
pub(crate) mod update;

pub use collection::{construct_instance_id, unique_collection_name, Collection, SharedHandle, SharedState, UNNAMED_IDENTIFIER};
pub use component::{
    ComponentParams, ComponentType, ComponentWorld, CreateDesc, NewWorldParams, Resource, UpdateParams, UpdateResult,
    WorldParams,
};
pub use hierarchy::Children;
pub use input::{InputAction, InputResult};
pub use instance::InstanceId;
pub use lifecycle::SpawnProperty;
pub use message::{builtin_messages, BuiltinMessages, Message, MessageSender, SetParent, TransformResponse, Url};
pub use property::{PropertyDesc, PropertyType, PropertyVar, TransformChannel, ValueRef};
pub use prototype::{Prototype, PrototypeComponent};
pub use registry::{resource_type, ComponentTypeDesc, Hooks, Registry, ResourceType, MAX_COMPONENT_TYPES};
pub use resource::ResourceFactory;
pub use update::UpdateContext;
