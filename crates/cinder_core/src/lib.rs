//! # CINDER Core Runtime
//!
//! Scene graph and property animation for game worlds:
//! - Collections of instances with a bounded transform hierarchy
//! - Pluggable component types driven through hook tables
//! - A pooled animation system that tweens instance properties
//!
//! ## Architecture Rules
//!
//! 1. **Slots, not references** - instances and animations are addressed by
//!    generation-checked handles
//! 2. **Deferred structure** - adds and deletes queued during a frame land
//!    between passes
//! 3. **Hierarchy by depth** - transforms are resolved level by level, parents
//!    before children
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use cinder_core::{register_animation_component, AnimationConfig, Collection, CollectionConfig, Registry};
//!
//! let mut registry = Registry::new();
//! register_animation_component(&mut registry, AnimationConfig::default()).unwrap();
//!
//! let mut collection = Collection::new("main", Arc::new(registry), CollectionConfig::default()).unwrap();
//! let hero = collection.new_instance(None).unwrap();
//! assert!(collection.contains(hero));
//! ```

#![deny(unsafe_code)]
#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]

pub mod animation;
pub mod config;
pub mod error;
pub mod gameobject;
pub mod memory;

pub use animation::{
    register_animation_component, AnimWorld, AnimateParams, AnimationCallback, AnimationComponent,
    AnimationListener, AnimationStopped, Animator, EaseFamily, EaseMode, Easing, Playback,
    ANIMATION_COMPONENT_NAME,
};
pub use config::{AnimationConfig, CollectionConfig, EngineConfig};
pub use error::{ConfigError, GameObjectError, GameObjectResult, HookError, HookResult, PropertyError, PropertyResult};
pub use gameobject::{
    resource_type, Collection, ComponentParams, ComponentType, ComponentTypeDesc, CreateDesc, Hooks, InputAction,
    InputResult, InstanceId, Message, NewWorldParams, PropertyDesc, PropertyVar, Prototype, Registry, Resource,
    ResourceFactory, SpawnProperty, UpdateContext, UpdateParams, UpdateResult, Url, WorldParams,
};
pub use memory::IndexPool;
