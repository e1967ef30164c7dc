//! Math type re-exports and small helpers shared by the readers.

pub use glam::{Vec2, Vec3, Vec4};

/// Logistic sigmoid, used to map FBX gloss/roughness channels into [0, 1].
#[inline]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Bit pattern of a float with `-0.0` folded into `0.0`, so that bitwise
/// hashing agrees with `==`.
#[inline]
pub fn canonical_bits(value: f32) -> u32 {
    if value == 0.0 {
        0
    } else {
        value.to_bits()
    }
}
