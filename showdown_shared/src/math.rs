//! Math types.
//!
//! This module intentionally stays small. It covers what block placement,
//! camera focus and physics read-back need: vectors, rotations and rays.

use std::ops::{Add, Div, Mul, Sub};

use serde::{Deserialize, Serialize};

/// 3D vector. Y is up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, rhs: Self) -> f32 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    pub fn cross(self, rhs: Self) -> Self {
        Self::new(
            self.y * rhs.z - self.z * rhs.y,
            self.z * rhs.x - self.x * rhs.z,
            self.x * rhs.y - self.y * rhs.x,
        )
    }

    pub fn len_sq(self) -> f32 {
        self.dot(self)
    }

    pub fn len(self) -> f32 {
        self.len_sq().sqrt()
    }

    /// Returns the unit vector, or `None` for a (near) zero vector.
    pub fn normalized(self) -> Option<Self> {
        let len = self.len();
        if len <= f32::EPSILON {
            None
        } else {
            Some(self / len)
        }
    }

    /// Mean of a set of points, `None` when empty.
    pub fn centroid<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Vec3>,
    {
        let mut sum = Vec3::ZERO;
        let mut n = 0usize;
        for p in points {
            sum = sum + p;
            n += 1;
        }
        (n > 0).then(|| sum / n as f32)
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Self) -> Self::Output {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Self) -> Self::Output {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f32) -> Self::Output {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Div<f32> for Vec3 {
    type Output = Vec3;

    fn div(self, rhs: f32) -> Self::Output {
        Vec3::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

/// Unit quaternion (conceptually). Serialized as `{x, y, z, w}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quat {
    pub const IDENTITY: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    /// Inverse rotation of a unit quaternion.
    pub fn conjugate(self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
            z: -self.z,
            w: self.w,
        }
    }

    /// Rotates `v` by this unit quaternion.
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

/// Position and orientation of a simulated block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Transform {
    pub position: Vec3,
    pub quaternion: Quat,
}

impl Transform {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            quaternion: Quat::IDENTITY,
        }
    }
}

/// Half-line used for picking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit direction.
    pub dir: Vec3,
}

impl Ray {
    /// Builds a ray from `origin` through `target`. `None` if they coincide.
    pub fn through(origin: Vec3, target: Vec3) -> Option<Self> {
        (target - origin)
            .normalized()
            .map(|dir| Self { origin, dir })
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.dir * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centroid_of_points() {
        let c = Vec3::centroid([
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(2.0, 4.0, 6.0),
        ])
        .unwrap();
        assert_eq!(c, Vec3::new(1.0, 2.0, 3.0));
        assert!(Vec3::centroid(std::iter::empty()).is_none());
    }

    #[test]
    fn quarter_turn_about_y() {
        let h = std::f32::consts::FRAC_1_SQRT_2;
        let q = Quat { x: 0.0, y: h, z: 0.0, w: h };
        let v = q.rotate(Vec3::new(1.0, 0.0, 0.0));
        assert!((v - Vec3::new(0.0, 0.0, -1.0)).len() < 1e-5);
        let back = q.conjugate().rotate(v);
        assert!((back - Vec3::new(1.0, 0.0, 0.0)).len() < 1e-5);
    }

    #[test]
    fn ray_through_target_is_unit_length() {
        let ray = Ray::through(Vec3::new(0.0, 10.0, 10.0), Vec3::ZERO).unwrap();
        assert!((ray.dir.len() - 1.0).abs() < 1e-5);
        assert!(Ray::through(Vec3::ZERO, Vec3::ZERO).is_none());
    }
}
