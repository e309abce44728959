//! # CINDER Shared
//!
//! Types used by every layer of the runtime.
//!
//! ## CRITICAL RULE
//!
//! This crate must NEVER depend on engine state. If a type needs a
//! `Collection`, it belongs in `cinder_core`.

#![deny(unsafe_code)]

pub mod hash;
pub mod math;

pub use hash::{hash_bytes, hash_concat, hash_str, NameHash};
pub use math::{Quat, Transform, Vec3, Vec4};
