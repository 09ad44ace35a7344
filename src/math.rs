//! Small 2D math helpers that sit on top of [`vek`].
//!
//! Vector/bounding-box primitives themselves (dot, length, AABB intersect)
//! are [`vek`]'s job; this module only adds the handful of operations the
//! solver needs that `vek::Vec2` doesn't expose directly (2D cross/perp)
//! and the cached-rotation representation the data model calls for.

use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use vek::Vec2;

/// 2D vector operations `vek::Vec2` doesn't provide directly.
pub trait Vec2Ext {
    /// Perpendicular dot product: `x1*y2 - y1*x2`.
    fn cross(self, other: Self) -> f64;

    /// Rotate 90 degrees counter-clockwise.
    fn perp(self) -> Self;

    /// Normalize, falling back to a canonical axis for the zero vector
    /// instead of producing `NaN`.
    fn normalized_or(self, fallback: Self) -> Self;
}

impl Vec2Ext for Vec2<f64> {
    #[inline]
    fn cross(self, other: Self) -> f64 {
        self.x * other.y - self.y * other.x
    }

    #[inline]
    fn perp(self) -> Self {
        Vec2::new(-self.y, self.x)
    }

    #[inline]
    fn normalized_or(self, fallback: Self) -> Self {
        let len = self.magnitude();
        if len > f64::EPSILON {
            self / len
        } else {
            fallback
        }
    }
}

/// Cross product of a scalar (angular velocity) and a vector.
#[inline]
pub fn cross_scalar_vec(s: f64, v: Vec2<f64>) -> Vec2<f64> {
    Vec2::new(-s * v.y, s * v.x)
}

/// Rotation split into its sine and cosine parts, kept in sync with an
/// angle in radians rather than re-deriving trig functions every use.
///
/// This is the `rot = (cos a, sin a)` cache from the body data model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation {
    cos: f64,
    sin: f64,
}

impl Rotation {
    /// No rotation.
    pub fn identity() -> Self {
        Self { cos: 1.0, sin: 0.0 }
    }

    /// Construct from an angle in radians.
    pub fn from_radians(angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self { sin, cos }
    }

    /// Angle in radians.
    pub fn to_radians(self) -> f64 {
        self.sin.atan2(self.cos)
    }

    /// Rotate a vector by this rotation.
    #[inline]
    pub fn rotate(self, v: Vec2<f64>) -> Vec2<f64> {
        Vec2::new(
            v.x * self.cos - v.y * self.sin,
            v.x * self.sin + v.y * self.cos,
        )
    }

    /// Rotate a vector by the inverse (conjugate) of this rotation.
    #[inline]
    pub fn unrotate(self, v: Vec2<f64>) -> Vec2<f64> {
        Vec2::new(
            v.x * self.cos + v.y * self.sin,
            -v.x * self.sin + v.y * self.cos,
        )
    }

    /// Cosine part.
    pub fn cos(self) -> f64 {
        self.cos
    }

    /// Sine part.
    pub fn sin(self) -> f64 {
        self.sin
    }
}

impl Default for Rotation {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<f64> for Rotation {
    fn from(angle: f64) -> Self {
        Self::from_radians(angle)
    }
}

impl Add for Rotation {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            cos: self.cos * rhs.cos - self.sin * rhs.sin,
            sin: self.sin * rhs.cos + self.cos * rhs.sin,
        }
    }
}

impl AddAssign for Rotation {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Neg for Rotation {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self {
            cos: self.cos,
            sin: -self.sin,
        }
    }
}

impl Sub for Rotation {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        self + -rhs
    }
}

impl SubAssign for Rotation {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rotation_roundtrips_through_radians() {
        let r = Rotation::from_radians(1.2345);
        assert_relative_eq!(r.to_radians(), 1.2345, epsilon = 1e-9);
    }

    #[test]
    fn rotation_matches_cos_sin() {
        let r = Rotation::from_radians(0.7);
        assert_relative_eq!(r.cos(), 0.7f64.cos());
        assert_relative_eq!(r.sin(), 0.7f64.sin());
    }

    #[test]
    fn rotate_then_unrotate_is_identity() {
        let r = Rotation::from_radians(2.1);
        let v = Vec2::new(3.0, -4.0);
        let back = r.unrotate(r.rotate(v));
        assert_relative_eq!(back.x, v.x, epsilon = 1e-9);
        assert_relative_eq!(back.y, v.y, epsilon = 1e-9);
    }

    #[test]
    fn cross_and_perp() {
        let a = Vec2::new(1.0, 0.0);
        let b = Vec2::new(0.0, 1.0);
        assert_relative_eq!(a.cross(b), 1.0);
        assert_relative_eq!(a.perp(), b);
    }

    #[test]
    fn normalized_or_handles_zero_vector() {
        let zero = Vec2::new(0.0, 0.0);
        assert_eq!(zero.normalized_or(Vec2::unit_x()), Vec2::unit_x());
    }
}
