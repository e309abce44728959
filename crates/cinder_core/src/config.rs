//! # Runtime Configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so an empty
//! file is a valid config.
//!
//! ```toml
//! [collection]
//! max_instances = 2048
//!
//! [animation]
//! initial_capacity = 256
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default instance capacity of a collection.
pub const DEFAULT_MAX_INSTANCES: u32 = 1024;

/// Hard ceiling for instance capacity.
pub const MAX_INSTANCE_CAPACITY: u32 = 65_534;

/// Depth levels in a hierarchy. Roots live at depth 0.
pub const MAX_HIERARCHICAL_DEPTH: u16 = 128;

/// Ceiling for the animation pool; indices are 16 bit.
pub const MAX_ANIMATION_CAPACITY: u32 = 65_000;

/// Collection limits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Instance slots preallocated per collection.
    pub max_instances: u32,
    /// Entries in the input focus stack.
    pub max_input_stack_entries: u32,
    /// Rounds of socket draining per dispatch call.
    pub max_dispatch_iterations: u32,
    /// Delete-queue passes per post-update.
    pub max_delete_passes: u32,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            max_instances: DEFAULT_MAX_INSTANCES,
            max_input_stack_entries: 16,
            max_dispatch_iterations: 10,
            max_delete_passes: 10,
        }
    }
}

impl CollectionConfig {
    /// Config with a custom instance capacity.
    #[must_use]
    pub fn with_max_instances(max_instances: u32) -> Self {
        Self { max_instances, ..Self::default() }
    }

    /// Checks ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a limit is zero or above its ceiling.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_instances == 0 || self.max_instances > MAX_INSTANCE_CAPACITY {
            return Err(ConfigError::Invalid(format!(
                "max_instances must be in 1..={MAX_INSTANCE_CAPACITY}, got {}",
                self.max_instances
            )));
        }
        if self.max_dispatch_iterations == 0 || self.max_delete_passes == 0 {
            return Err(ConfigError::Invalid(
                "dispatch iterations and delete passes must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Animation pool sizing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Slots reserved when a world is created.
    pub initial_capacity: u32,
    /// Minimum number of slots added when the pool grows.
    pub min_capacity_growth: u32,
    /// Hard ceiling; play requests beyond it fail.
    pub max_capacity: u32,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 512,
            min_capacity_growth: 2048,
            max_capacity: MAX_ANIMATION_CAPACITY,
        }
    }
}

impl AnimationConfig {
    /// Checks ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the ceiling is zero or too large.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_capacity == 0 || self.max_capacity > MAX_ANIMATION_CAPACITY {
            return Err(ConfigError::Invalid(format!(
                "animation max_capacity must be in 1..={MAX_ANIMATION_CAPACITY}, got {}",
                self.max_capacity
            )));
        }
        Ok(())
    }
}

/// Top-level config file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// `[collection]` section.
    pub collection: CollectionConfig,
    /// `[animation]` section.
    pub animation: AnimationConfig,
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Parse failures and out-of-range values.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.collection.validate()?;
        config.animation.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// I/O failures, parse failures and out-of-range values.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }
}
