//! # Properties
//!
//! Generic get/set of named values on an instance. Component id `0` addresses
//! the instance transform: `position`, `rotation`, `scale`, `euler` and their
//! per-lane variants (`position.x`, `rotation.w`, ...). Any other component id
//! is resolved against the instance manifest and delegated to the component
//! type's property hooks.
//!
//! Transform properties come back with a [`ValueRef`], a direct handle to the
//! lane inside the instance. The animation pool uses it to write values
//! without going through [`Collection::set_property`].

use std::collections::HashMap;
use std::sync::OnceLock;

use cinder_shared::{hash_str, NameHash, Quat, Vec3, Vec4};

use super::collection::Collection;
use super::instance::InstanceId;
use super::message::Url;
use super::registry::Hooks;
use crate::error::{PropertyError, PropertyResult};

/// Type tag of a [`PropertyVar`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PropertyType {
    /// Scalar
    Number,
    /// Name hash
    Hash,
    /// Message address
    Url,
    /// Three lanes
    Vector3,
    /// Four lanes
    Vector4,
    /// Rotation
    Quat,
    /// Flag
    Boolean,
}

/// A property value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PropertyVar {
    /// Scalar
    Number(f64),
    /// Name hash
    Hash(NameHash),
    /// Message address
    Url(Url),
    /// Three lanes
    Vector3(Vec3),
    /// Four lanes
    Vector4(Vec4),
    /// Rotation
    Quat(Quat),
    /// Flag
    Boolean(bool),
}

impl PropertyVar {
    /// Type tag.
    #[must_use]
    pub fn property_type(&self) -> PropertyType {
        match self {
            Self::Number(_) => PropertyType::Number,
            Self::Hash(_) => PropertyType::Hash,
            Self::Url(_) => PropertyType::Url,
            Self::Vector3(_) => PropertyType::Vector3,
            Self::Vector4(_) => PropertyType::Vector4,
            Self::Quat(_) => PropertyType::Quat,
            Self::Boolean(_) => PropertyType::Boolean,
        }
    }

    /// Number of animatable float lanes; zero for non-numeric types.
    #[must_use]
    pub fn element_count(&self) -> usize {
        match self {
            Self::Number(_) => 1,
            Self::Vector3(_) => 3,
            Self::Vector4(_) | Self::Quat(_) => 4,
            Self::Hash(_) | Self::Url(_) | Self::Boolean(_) => 0,
        }
    }

    /// Float lane `i`. Scalars expose lane 0 only.
    #[must_use]
    pub fn element(&self, i: usize) -> f32 {
        match self {
            Self::Number(n) if i == 0 => *n as f32,
            Self::Vector3(v) => v.element(i),
            Self::Vector4(v) => v.element(i),
            Self::Quat(q) => q.element(i),
            _ => 0.0,
        }
    }

    /// Scalar value, if this is a number.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// Transform lane group addressed by a [`ValueRef`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransformChannel {
    /// Local position
    Position,
    /// Local rotation
    Rotation,
    /// Local scale
    Scale,
    /// Euler angle cache, synced into rotation on the next transform pass
    Euler,
}

impl TransformChannel {
    fn lanes(self) -> usize {
        match self {
            Self::Rotation => 4,
            Self::Position | Self::Scale | Self::Euler => 3,
        }
    }
}

/// Direct handle to one float lane of an instance transform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ValueRef {
    /// Lane group.
    pub channel: TransformChannel,
    /// Lane within the group.
    pub element: u8,
}

impl ValueRef {
    /// The handle `offset` lanes further into the same group.
    #[must_use]
    pub fn offset(self, offset: u8) -> Self {
        Self { element: self.element + offset, ..self }
    }
}

/// Result of a property read.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PropertyDesc {
    /// Current value.
    pub variant: PropertyVar,
    /// Property ids of the lanes of a vector property; zero when absent.
    pub element_ids: [NameHash; 4],
    /// Direct lane handle, when the value lives in the instance transform.
    pub value_ref: Option<ValueRef>,
    /// Whether writes are rejected.
    pub read_only: bool,
}

impl PropertyDesc {
    /// Writable property without lane ids or direct handle.
    #[must_use]
    pub fn new(variant: PropertyVar) -> Self {
        Self { variant, element_ids: [0; 4], value_ref: None, read_only: false }
    }

    /// Sets the lane ids.
    #[must_use]
    pub fn with_element_ids(mut self, ids: [NameHash; 4]) -> Self {
        self.element_ids = ids;
        self
    }

    /// Marks the property read-only.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

#[derive(Clone, Copy)]
struct BuiltinProperty {
    channel: TransformChannel,
    lane: Option<u8>,
}

struct BuiltinTable {
    by_id: HashMap<NameHash, BuiltinProperty>,
    lanes: HashMap<TransformChannel, [NameHash; 4]>,
}

fn builtin_table() -> &'static BuiltinTable {
    static TABLE: OnceLock<BuiltinTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        const CHANNELS: [(&str, TransformChannel); 4] = [
            ("position", TransformChannel::Position),
            ("rotation", TransformChannel::Rotation),
            ("scale", TransformChannel::Scale),
            ("euler", TransformChannel::Euler),
        ];
        const LANES: [&str; 4] = ["x", "y", "z", "w"];

        let mut by_id = HashMap::new();
        let mut lanes = HashMap::new();
        for (name, channel) in CHANNELS {
            by_id.insert(hash_str(name), BuiltinProperty { channel, lane: None });
            let mut ids = [0; 4];
            for (i, lane) in LANES.iter().enumerate().take(channel.lanes()) {
                let id = hash_str(&format!("{name}.{lane}"));
                ids[i] = id;
                by_id.insert(id, BuiltinProperty { channel, lane: Some(i as u8) });
            }
            lanes.insert(channel, ids);
        }
        BuiltinTable { by_id, lanes }
    })
}

impl Collection {
    /// Reads a property.
    ///
    /// # Errors
    ///
    /// - [`PropertyError::InvalidInstance`] for stale handles
    /// - [`PropertyError::ComponentNotFound`] when no component has `component_id`
    /// - [`PropertyError::NotFound`] for unknown property ids
    pub fn get_property(
        &mut self,
        instance: InstanceId,
        component_id: NameHash,
        property_id: NameHash,
    ) -> PropertyResult<PropertyDesc> {
        let slot = self.resolve(instance).ok_or(PropertyError::InvalidInstance)?;
        if component_id != 0 {
            let component_index = self
                .find_component_index(slot, component_id)
                .ok_or(PropertyError::ComponentNotFound)?;
            return self
                .with_component(slot, component_index, |desc, params| {
                    if desc.has(Hooks::GET_PROPERTY) {
                        desc.behaviour.get_property(params, property_id)
                    } else {
                        Err(PropertyError::NotFound)
                    }
                })
                .unwrap_or(Err(PropertyError::ComponentNotFound));
        }

        let table = builtin_table();
        let prop = *table.by_id.get(&property_id).ok_or(PropertyError::NotFound)?;
        if prop.channel == TransformChannel::Euler {
            self.check_euler(slot);
            let inst = &mut self.instances[slot as usize];
            inst.euler = inst.transform.rotation.to_euler();
            inst.prev_euler = inst.euler;
        }

        let inst = &self.instances[slot as usize];
        let desc = match prop.lane {
            Some(lane) => PropertyDesc {
                variant: PropertyVar::Number(f64::from(read_lane(inst, prop.channel, lane))),
                element_ids: [0; 4],
                value_ref: Some(ValueRef { channel: prop.channel, element: lane }),
                read_only: false,
            },
            None => PropertyDesc {
                variant: match prop.channel {
                    TransformChannel::Position => PropertyVar::Vector3(inst.transform.position),
                    TransformChannel::Rotation => PropertyVar::Quat(inst.transform.rotation),
                    TransformChannel::Scale => PropertyVar::Vector3(inst.transform.scale),
                    TransformChannel::Euler => PropertyVar::Vector3(inst.euler),
                },
                element_ids: table.lanes[&prop.channel],
                value_ref: Some(ValueRef { channel: prop.channel, element: 0 }),
                read_only: false,
            },
        };
        Ok(desc)
    }

    /// Writes a property.
    ///
    /// `scale` accepts a number (uniform) or a vector; `rotation` needs a
    /// quaternion; lanes need numbers.
    ///
    /// # Errors
    ///
    /// As [`Collection::get_property`], plus [`PropertyError::TypeMismatch`].
    pub fn set_property(
        &mut self,
        instance: InstanceId,
        component_id: NameHash,
        property_id: NameHash,
        value: &PropertyVar,
    ) -> PropertyResult<()> {
        let slot = self.resolve(instance).ok_or(PropertyError::InvalidInstance)?;
        if component_id != 0 {
            let component_index = self
                .find_component_index(slot, component_id)
                .ok_or(PropertyError::ComponentNotFound)?;
            return self
                .with_component(slot, component_index, |desc, params| {
                    if desc.has(Hooks::SET_PROPERTY) {
                        desc.behaviour.set_property(params, property_id, value)
                    } else {
                        Err(PropertyError::NotFound)
                    }
                })
                .unwrap_or(Err(PropertyError::ComponentNotFound));
        }

        let prop = *builtin_table().by_id.get(&property_id).ok_or(PropertyError::NotFound)?;
        let inst = &mut self.instances[slot as usize];
        match (prop.channel, prop.lane, value) {
            (channel, Some(lane), PropertyVar::Number(n)) => write_lane(inst, channel, lane, *n as f32),
            (TransformChannel::Position, None, PropertyVar::Vector3(v)) => inst.transform.position = *v,
            (TransformChannel::Scale, None, PropertyVar::Vector3(v)) => inst.transform.scale = *v,
            (TransformChannel::Scale, None, PropertyVar::Number(n)) => inst.transform.scale = Vec3::splat(*n as f32),
            (TransformChannel::Rotation, None, PropertyVar::Quat(q)) => inst.transform.rotation = *q,
            (TransformChannel::Euler, None, PropertyVar::Vector3(v)) => inst.euler = *v,
            _ => return Err(PropertyError::TypeMismatch),
        }
        if prop.channel == TransformChannel::Euler {
            self.check_euler(slot);
        }
        self.dirty_transforms = true;
        Ok(())
    }

    /// Reads the lane behind a [`ValueRef`]. Stale handles read zero.
    #[must_use]
    pub fn read_value_ref(&self, instance: InstanceId, value_ref: ValueRef) -> f32 {
        self.resolve(instance)
            .map_or(0.0, |slot| read_lane(&self.instances[slot as usize], value_ref.channel, value_ref.element))
    }

    /// Writes the lane behind a [`ValueRef`]. Returns `false` for stale handles.
    pub fn write_value_ref(&mut self, instance: InstanceId, value_ref: ValueRef, value: f32) -> bool {
        let Some(slot) = self.resolve(instance) else {
            return false;
        };
        write_lane(&mut self.instances[slot as usize], value_ref.channel, value_ref.element, value);
        true
    }
}

fn read_lane(inst: &super::instance::Instance, channel: TransformChannel, lane: u8) -> f32 {
    let lane = usize::from(lane);
    match channel {
        TransformChannel::Position => inst.transform.position.element(lane),
        TransformChannel::Rotation => inst.transform.rotation.element(lane),
        TransformChannel::Scale => inst.transform.scale.element(lane),
        TransformChannel::Euler => inst.euler.element(lane),
    }
}

fn write_lane(inst: &mut super::instance::Instance, channel: TransformChannel, lane: u8, value: f32) {
    let lane = usize::from(lane);
    match channel {
        TransformChannel::Position => inst.transform.position.set_element(lane, value),
        TransformChannel::Rotation => inst.transform.rotation.set_element(lane, value),
        TransformChannel::Scale => inst.transform.scale.set_element(lane, value),
        TransformChannel::Euler => inst.euler.set_element(lane, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lane_ids() {
        let table = builtin_table();
        let ids = table.lanes[&TransformChannel::Rotation];
        assert_eq!(ids[3], hash_str("rotation.w"));
        assert_eq!(table.lanes[&TransformChannel::Position][3], 0);

        let prop = table.by_id[&hash_str("scale.y")];
        assert_eq!(prop.channel, TransformChannel::Scale);
        assert_eq!(prop.lane, Some(1));
    }

    #[test]
    fn test_element_counts() {
        assert_eq!(PropertyVar::Number(1.0).element_count(), 1);
        assert_eq!(PropertyVar::Vector3(Vec3::ONE).element_count(), 3);
        assert_eq!(PropertyVar::Quat(Quat::IDENTITY).element_count(), 4);
        assert_eq!(PropertyVar::Boolean(true).element_count(), 0);
        assert_eq!(PropertyVar::Number(2.5).element(0), 2.5);
    }
}
