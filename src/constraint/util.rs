//! Shared effective-mass helpers used by several joint constraints,
//! mirroring Chipmunk2D's `constraints/util.h`.

use vek::Vec2;

use crate::body::Body;
use crate::math::Vec2Ext;

/// Effective mass along a single axis `n`, the same term
/// [`crate::arbiter`] uses for contacts.
pub fn k_scalar(a: &Body, b: &Body, r1: Vec2<f64>, r2: Vec2<f64>, n: Vec2<f64>) -> f64 {
    let rcn1 = r1.cross(n);
    let rcn2 = r2.cross(n);
    a.m_inv() + b.m_inv() + a.i_inv() * rcn1 * rcn1 + b.i_inv() * rcn2 * rcn2
}

/// 2x2 effective mass matrix for a point-to-point constraint, stored as
/// its two columns `k1`/`k2` the way Chipmunk's `k_tensor` does, so it
/// can be inverted once per step in [`mult_k`].
#[derive(Debug, Clone, Copy, Default)]
pub struct KTensor {
    pub k1: Vec2<f64>,
    pub k2: Vec2<f64>,
}

pub fn k_tensor(a: &Body, b: &Body, r1: Vec2<f64>, r2: Vec2<f64>) -> KTensor {
    let m_sum = a.m_inv() + b.m_inv();

    let k11 = m_sum + a.i_inv() * r1.y * r1.y + b.i_inv() * r2.y * r2.y;
    let k12 = -a.i_inv() * r1.x * r1.y - b.i_inv() * r2.x * r2.y;
    let k22 = m_sum + a.i_inv() * r1.x * r1.x + b.i_inv() * r2.x * r2.x;

    let det = k11 * k22 - k12 * k12;
    debug_assert!(det != 0.0, "degenerate effective mass matrix (both bodies static?)");
    let det_inv = 1.0 / det;

    KTensor {
        k1: Vec2::new(k22 * det_inv, -k12 * det_inv),
        k2: Vec2::new(-k12 * det_inv, k11 * det_inv),
    }
}

/// Solve `k * x = v` for the tensor built by [`k_tensor`].
pub fn mult_k(v: Vec2<f64>, k: KTensor) -> Vec2<f64> {
    Vec2::new(v.dot(k.k1), v.dot(k.k2))
}

pub fn relative_velocity(a: &Body, b: &Body, r1: Vec2<f64>, r2: Vec2<f64>) -> Vec2<f64> {
    b.velocity_at_offset(r2) - a.velocity_at_offset(r1)
}

pub fn apply_impulses(a: &mut Body, b: &mut Body, r1: Vec2<f64>, r2: Vec2<f64>, j: Vec2<f64>) {
    a.apply_impulse(-j, r1);
    b.apply_impulse(j, r2);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn k_tensor_solves_identity_for_two_unit_masses_at_origin() {
        let a = Body::new(1.0, 1.0);
        let b = Body::new(1.0, 1.0);
        let k = k_tensor(&a, &b, Vec2::zero(), Vec2::zero());
        let x = mult_k(Vec2::new(1.0, 0.0), k);
        assert_relative_eq!(x.x, 0.5, epsilon = 1e-9);
        assert_relative_eq!(x.y, 0.0, epsilon = 1e-9);
    }
}
