//! Mathematical types for the scene graph.
//!
//! Transforms are position + rotation + non-uniform scale. Hierarchies are
//! composed with [`Transform::mul`], never with matrices.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

const DEG_TO_RAD: f32 = std::f32::consts::PI / 180.0;
const RAD_TO_DEG: f32 = 180.0 / std::f32::consts::PI;

/// 3D Vector - position, scale, euler angles
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
}

impl Vec3 {
    /// Creates a new Vec3
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Zero vector
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// All ones
    pub const ONE: Self = Self::new(1.0, 1.0, 1.0);

    /// Same value in every lane
    #[must_use]
    pub const fn splat(v: f32) -> Self {
        Self::new(v, v, v)
    }

    /// Converts to array
    #[must_use]
    pub const fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    /// Creates from array
    #[must_use]
    pub const fn from_array(arr: [f32; 3]) -> Self {
        Self::new(arr[0], arr[1], arr[2])
    }

    /// Reads lane `i` (0..3). Out of range lanes read as zero.
    #[must_use]
    pub fn element(self, i: usize) -> f32 {
        match i {
            0 => self.x,
            1 => self.y,
            2 => self.z,
            _ => 0.0,
        }
    }

    /// Writes lane `i` (0..3). Out of range lanes are ignored.
    pub fn set_element(&mut self, i: usize, v: f32) {
        match i {
            0 => self.x = v,
            1 => self.y = v,
            2 => self.z = v,
            _ => {}
        }
    }

    /// Dot product
    #[must_use]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product
    #[must_use]
    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Per-lane product
    #[must_use]
    pub fn mul_per_elem(self, other: Self) -> Self {
        Self::new(self.x * other.x, self.y * other.y, self.z * other.z)
    }

    /// Per-lane reciprocal
    #[must_use]
    pub fn recip(self) -> Self {
        Self::new(1.0 / self.x, 1.0 / self.y, 1.0 / self.z)
    }

    /// Largest lane
    #[must_use]
    pub fn max_element(self) -> f32 {
        self.x.max(self.y).max(self.z)
    }

    /// Length squared (avoids sqrt)
    #[must_use]
    pub fn length_squared(self) -> f32 {
        self.dot(self)
    }

    /// Length
    #[must_use]
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::ops::Mul<f32> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl std::ops::Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

/// 4D Vector - colors and generic four-lane properties
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Vec4 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
    /// W component
    pub w: f32,
}

impl Vec4 {
    /// Creates a new Vec4
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Zero vector
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    /// Same value in every lane
    #[must_use]
    pub const fn splat(v: f32) -> Self {
        Self::new(v, v, v, v)
    }

    /// Converts to array
    #[must_use]
    pub const fn to_array(self) -> [f32; 4] {
        [self.x, self.y, self.z, self.w]
    }

    /// Reads lane `i` (0..4). Out of range lanes read as zero.
    #[must_use]
    pub fn element(self, i: usize) -> f32 {
        match i {
            0 => self.x,
            1 => self.y,
            2 => self.z,
            3 => self.w,
            _ => 0.0,
        }
    }

    /// Writes lane `i` (0..4). Out of range lanes are ignored.
    pub fn set_element(&mut self, i: usize, v: f32) {
        match i {
            0 => self.x = v,
            1 => self.y = v,
            2 => self.z = v,
            3 => self.w = v,
            _ => {}
        }
    }
}

/// Quaternion for rotations
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Quat {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
    /// W component
    pub w: f32,
}

impl Quat {
    /// Creates a new quaternion
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Identity rotation
    pub const IDENTITY: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    /// Rotation of `degrees` around the Z axis
    #[must_use]
    pub fn from_rotation_z(degrees: f32) -> Self {
        let (s, c) = (degrees * DEG_TO_RAD * 0.5).sin_cos();
        Self::new(0.0, 0.0, s, c)
    }

    /// Builds a rotation from Euler angles in degrees.
    ///
    /// Angles are applied in Y, Z, X order.
    #[must_use]
    pub fn from_euler(euler: Vec3) -> Self {
        let (s1, c1) = (euler.y * DEG_TO_RAD * 0.5).sin_cos();
        let (s2, c2) = (euler.z * DEG_TO_RAD * 0.5).sin_cos();
        let (s3, c3) = (euler.x * DEG_TO_RAD * 0.5).sin_cos();
        Self::new(
            s1 * s2 * c3 + c1 * c2 * s3,
            s1 * c2 * c3 + c1 * s2 * s3,
            c1 * s2 * c3 - s1 * c2 * s3,
            c1 * c2 * c3 - s1 * s2 * s3,
        )
    }

    /// Converts to Euler angles in degrees, inverse of [`Quat::from_euler`].
    #[must_use]
    pub fn to_euler(self) -> Vec3 {
        let Self { x, y, z, w } = self;
        let test = x * y + z * w;
        let (bank, heading, attitude) = if test > 0.499 {
            (0.0, 2.0 * x.atan2(w), std::f32::consts::FRAC_PI_2)
        } else if test < -0.499 {
            (0.0, -2.0 * x.atan2(w), -std::f32::consts::FRAC_PI_2)
        } else {
            (
                (2.0 * x * w - 2.0 * y * z).atan2(1.0 - 2.0 * x * x - 2.0 * z * z),
                (2.0 * y * w - 2.0 * x * z).atan2(1.0 - 2.0 * y * y - 2.0 * z * z),
                (2.0 * test).asin(),
            )
        };
        Vec3::new(bank * RAD_TO_DEG, heading * RAD_TO_DEG, attitude * RAD_TO_DEG)
    }

    /// Converts to array
    #[must_use]
    pub const fn to_array(self) -> [f32; 4] {
        [self.x, self.y, self.z, self.w]
    }

    /// Reads lane `i` (0..4). Out of range lanes read as zero.
    #[must_use]
    pub fn element(self, i: usize) -> f32 {
        match i {
            0 => self.x,
            1 => self.y,
            2 => self.z,
            3 => self.w,
            _ => 0.0,
        }
    }

    /// Writes lane `i` (0..4). Out of range lanes are ignored.
    pub fn set_element(&mut self, i: usize, v: f32) {
        match i {
            0 => self.x = v,
            1 => self.y = v,
            2 => self.z = v,
            3 => self.w = v,
            _ => {}
        }
    }

    /// Conjugate (inverse for unit quaternions)
    #[must_use]
    pub fn conjugate(self) -> Self {
        Self::new(-self.x, -self.y, -self.z, self.w)
    }

    /// Normalized copy. A zero quaternion becomes identity.
    #[must_use]
    pub fn normalize(self) -> Self {
        let len = (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt();
        if len <= f32::EPSILON {
            return Self::IDENTITY;
        }
        let inv = 1.0 / len;
        Self::new(self.x * inv, self.y * inv, self.z * inv, self.w * inv)
    }

    /// Rotates a vector
    #[must_use]
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let q = Vec3::new(self.x, self.y, self.z);
        let t = q.cross(v) * 2.0;
        v + t * self.w + q.cross(t)
    }
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl std::ops::Mul for Quat {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
        )
    }
}

/// Transform - position + rotation + scale
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Transform {
    /// Position
    pub position: Vec3,
    /// Rotation
    pub rotation: Quat,
    /// Scale (per axis)
    pub scale: Vec3,
}

impl Transform {
    /// Creates a new transform
    #[must_use]
    pub const fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self { position, rotation, scale }
    }

    /// Identity transform
    pub const IDENTITY: Self = Self::new(Vec3::ZERO, Quat::IDENTITY, Vec3::ONE);

    /// Largest scale lane, used where a single scale factor is needed.
    #[must_use]
    pub fn uniform_scale(&self) -> f32 {
        self.scale.max_element()
    }

    /// Transforms a point from local into parent space.
    #[must_use]
    pub fn apply(&self, point: Vec3) -> Vec3 {
        self.position + self.rotation.rotate(self.scale.mul_per_elem(point))
    }

    /// Composes `parent * child`.
    #[must_use]
    pub fn mul(&self, child: &Self) -> Self {
        Self {
            position: self.apply(child.position),
            rotation: self.rotation * child.rotation,
            scale: self.scale.mul_per_elem(child.scale),
        }
    }

    /// Composes `parent * child` without applying the parent's Z scale to the
    /// child's translation.
    #[must_use]
    pub fn mul_no_scale_z(&self, child: &Self) -> Self {
        let flat = Vec3::new(self.scale.x, self.scale.y, 1.0);
        Self {
            position: self.position + self.rotation.rotate(flat.mul_per_elem(child.position)),
            rotation: self.rotation * child.rotation,
            scale: self.scale.mul_per_elem(child.scale),
        }
    }

    /// Inverse transform. Exact for uniform scale.
    #[must_use]
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.conjugate();
        let scale = self.scale.recip();
        let position = scale.mul_per_elem(rotation.rotate(-self.position));
        Self { position, rotation, scale }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    fn approx_v(a: Vec3, b: Vec3) -> bool {
        approx(a.x, b.x) && approx(a.y, b.y) && approx(a.z, b.z)
    }

    #[test]
    fn test_vec3_operations() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);

        let sum = a + b;
        assert_eq!(sum, Vec3::new(5.0, 7.0, 9.0));
        assert_eq!(a.dot(b), 32.0);
        assert_eq!(a.element(2), 3.0);
        assert_eq!(a.max_element(), 3.0);
    }

    #[test]
    fn test_quat_rotate_z() {
        let q = Quat::from_rotation_z(90.0);
        let v = q.rotate(Vec3::new(1.0, 0.0, 0.0));
        assert!(approx_v(v, Vec3::new(0.0, 1.0, 0.0)));
    }

    #[test]
    fn test_euler_axes() {
        let q = Quat::from_euler(Vec3::new(0.0, 0.0, 90.0));
        let expected = Quat::from_rotation_z(90.0);
        assert!(approx(q.z, expected.z) && approx(q.w, expected.w));

        let e = q.to_euler();
        assert!(approx_v(e, Vec3::new(0.0, 0.0, 90.0)));
    }

    #[test]
    fn test_euler_round_trip_general() {
        let euler = Vec3::new(30.0, 20.0, 10.0);
        let back = Quat::from_euler(euler).to_euler();
        assert!(approx_v(euler, back), "{back:?}");
    }

    #[test]
    fn test_transform_compose_and_inverse() {
        let parent = Transform::new(Vec3::new(1.0, 0.0, 0.0), Quat::from_rotation_z(90.0), Vec3::splat(2.0));
        let child = Transform::new(Vec3::new(1.0, 0.0, 0.0), Quat::IDENTITY, Vec3::ONE);

        let world = parent.mul(&child);
        assert!(approx_v(world.position, Vec3::new(1.0, 2.0, 0.0)));
        assert!(approx_v(world.scale, Vec3::splat(2.0)));

        let local = parent.inverse().mul(&world);
        assert!(approx_v(local.position, child.position));
        assert!(approx_v(local.scale, Vec3::ONE));
    }

    #[test]
    fn test_mul_no_scale_z() {
        let parent = Transform::new(Vec3::ZERO, Quat::IDENTITY, Vec3::new(1.0, 1.0, 4.0));
        let child = Transform::new(Vec3::new(0.0, 0.0, 1.0), Quat::IDENTITY, Vec3::ONE);
        assert_eq!(parent.mul(&child).position.z, 4.0);
        assert_eq!(parent.mul_no_scale_z(&child).position.z, 1.0);
    }
}
