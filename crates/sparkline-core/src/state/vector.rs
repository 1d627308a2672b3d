//! Vector and rotator types used by the game-state snapshot.
//!
//! These keep the `x`/`y`/`z` field names of the packet format so condition
//! expressions such as `packet.game_ball.physics.location.z` resolve. Convert
//! to [`glam::Vec3`] for arithmetic.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// A 3D vector in game units (uu).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vector3 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component (up)
    pub z: f32,
}

impl Vector3 {
    /// The zero vector.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Creates a vector from components.
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Converts to a `glam` vector.
    #[must_use]
    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    /// Euclidean length.
    #[must_use]
    pub fn length(self) -> f32 {
        self.to_vec3().length()
    }

    /// Distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        self.to_vec3().distance(other.to_vec3())
    }
}

impl From<Vec3> for Vector3 {
    fn from(v: Vec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl From<Vector3> for Vec3 {
    fn from(v: Vector3) -> Self {
        v.to_vec3()
    }
}

/// Orientation in radians.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rotator {
    /// Pitch
    pub pitch: f32,
    /// Yaw
    pub yaw: f32,
    /// Roll
    pub roll: f32,
}
