//! # Error Types
//!
//! Every fallible entry point returns one of these. Nothing in the core
//! panics on a runtime condition.

use thiserror::Error;

use cinder_shared::NameHash;

/// Errors from collection, registry and lifecycle operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameObjectError {
    /// A fixed-capacity table is full.
    #[error("out of resources: {0}")]
    OutOfResources(&'static str),

    /// The resource type already has a component type.
    #[error("component type already registered: {0:#018x}")]
    AlreadyRegistered(NameHash),

    /// Another instance already owns the identifier.
    #[error("identifier in use: {0:#018x}")]
    IdentifierInUse(NameHash),

    /// The instance already has an identifier.
    #[error("identifier already set on instance")]
    IdentifierAlreadySet,

    /// No component with the given id on the instance.
    #[error("component not found: {0:#018x}")]
    ComponentNotFound(NameHash),

    /// Reparenting would exceed the hierarchy depth limit.
    #[error("maximum hierarchical depth of {0} exceeded")]
    MaximumHierarchicalDepth(u16),

    /// The operation is not allowed in the current state.
    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),

    /// No component type for the resource type.
    #[error("resource type not found: {0:#018x}")]
    ResourceTypeNotFound(NameHash),

    /// The handle refers to a destroyed instance.
    #[error("instance not found")]
    InstanceNotFound,

    /// The message receiver socket does not belong to this collection.
    #[error("socket not found: {0:#018x}")]
    SocketNotFound(NameHash),

    /// The resource factory could not provide a resource.
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    /// A component hook reported failure.
    #[error("component hook failed: {0}")]
    HookFailed(#[from] HookError),
}

/// Result type for collection operations.
pub type GameObjectResult<T> = Result<T, GameObjectError>;

/// Errors from property access and animation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyError {
    /// Unknown property id.
    #[error("property not found")]
    NotFound,
    /// Malformed property value.
    #[error("invalid property format")]
    InvalidFormat,
    /// The property type cannot be used here.
    #[error("unsupported property type")]
    UnsupportedType,
    /// The value type does not match the property type.
    #[error("property type mismatch")]
    TypeMismatch,
    /// No component with the given id.
    #[error("component not found")]
    ComponentNotFound,
    /// The instance handle is stale or null.
    #[error("invalid instance")]
    InvalidInstance,
    /// A fixed-capacity buffer is full.
    #[error("buffer overflow")]
    BufferOverflow,
    /// The value is out of range for the property.
    #[error("unsupported value")]
    UnsupportedValue,
    /// The property is read-only or the operation is unavailable.
    #[error("unsupported operation")]
    UnsupportedOperation,
}

/// Result type for property access.
pub type PropertyResult<T> = Result<T, PropertyError>;

/// Failure reported by a component hook.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct HookError(pub String);

impl HookError {
    /// Creates a hook error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Result type for component hooks.
pub type HookResult = Result<(), HookError>;

/// Errors while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// The config file is not valid TOML for the schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
