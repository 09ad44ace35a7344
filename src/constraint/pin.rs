//! Rigid rod between two anchor points: holds them at a fixed distance,
//! pushing or pulling as needed. Grounded on the `cpPinJoint` struct
//! layout (`anchr1`/`anchr2`/`dist`/`jnAcc`).

use vek::Vec2;

use crate::body::Body;
use crate::math::Vec2Ext;

use super::util::{apply_impulses, k_scalar, relative_velocity};

#[derive(Debug, Clone)]
pub struct PinJoint {
    pub anchor_a: Vec2<f64>,
    pub anchor_b: Vec2<f64>,
    /// Rest distance between the two anchors, fixed at construction.
    pub dist: f64,
    pub max_bias: f64,
    /// Upper bound on the accumulated normal impulse's magnitude per
    /// step, `max_force * dt`. `f64::INFINITY` (the default) means
    /// unbreakable.
    pub max_force: f64,

    r1: Vec2<f64>,
    r2: Vec2<f64>,
    n: Vec2<f64>,
    n_mass: f64,
    bias: f64,
    jn_acc: f64,
    jn_max: f64,
}

impl PinJoint {
    /// `a`/`b` are the bodies' current world-space anchor points; the
    /// distance between them at construction time becomes the rod's
    /// fixed length.
    pub fn new(a: &Body, anchor_a: Vec2<f64>, b: &Body, anchor_b: Vec2<f64>) -> Self {
        let world_a = a.local_to_world(anchor_a);
        let world_b = b.local_to_world(anchor_b);
        Self {
            anchor_a,
            anchor_b,
            dist: (world_b - world_a).magnitude(),
            max_bias: f64::INFINITY,
            max_force: f64::INFINITY,
            r1: Vec2::zero(),
            r2: Vec2::zero(),
            n: Vec2::zero(),
            n_mass: 0.0,
            bias: 0.0,
            jn_acc: 0.0,
            jn_max: f64::INFINITY,
        }
    }

    pub fn pre_step(&mut self, a: &mut Body, b: &mut Body, bias_coef: f64, dt_inv: f64) {
        self.r1 = a.rotation().rotate(self.anchor_a);
        self.r2 = b.rotation().rotate(self.anchor_b);

        let delta = (b.p + self.r2) - (a.p + self.r1);
        let current_dist = delta.magnitude();
        self.n = delta.normalized_or(Vec2::unit_x());
        self.n_mass = 1.0 / k_scalar(a, b, self.r1, self.r2, self.n);

        let error = current_dist - self.dist;
        self.bias = (-bias_coef * dt_inv * error).clamp(-self.max_bias, self.max_bias);
        let dt = if dt_inv > 0.0 { 1.0 / dt_inv } else { 0.0 };
        self.jn_max = self.max_force * dt;

        // Warm start: reapply last step's accumulated impulse before
        // the first solver iteration.
        apply_impulses(a, b, self.r1, self.r2, self.n * self.jn_acc);
    }

    pub fn apply_impulse(&mut self, a: &mut Body, b: &mut Body) {
        let vr = relative_velocity(a, b, self.r1, self.r2);
        let vrn = vr.dot(self.n);

        let jn = (self.bias - vrn) * self.n_mass;
        let jn_old = self.jn_acc;
        self.jn_acc = (jn_old + jn).clamp(-self.jn_max, self.jn_max);
        let jn = self.jn_acc - jn_old;

        apply_impulses(a, b, self.r1, self.r2, self.n * jn);
    }

    pub fn get_impulse(&self) -> f64 {
        self.jn_acc.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rest_distance_is_initial_separation() {
        let a = Body::new(1.0, 1.0);
        let mut b = Body::new(1.0, 1.0);
        b.p = Vec2::new(3.0, 0.0);
        let joint = PinJoint::new(&a, Vec2::zero(), &b, Vec2::zero());
        assert_relative_eq!(joint.dist, 3.0);
    }

    #[test]
    fn pulls_bodies_back_to_rest_distance() {
        let a = Body::new_static();
        let mut b = Body::new(1.0, 1.0);
        b.p = Vec2::new(3.0, 0.0);
        let mut joint = PinJoint::new(&a, Vec2::zero(), &b, Vec2::new(-1.0, 0.0));

        // Stretch it further than rest.
        b.p = Vec2::new(5.0, 0.0);
        let mut a = a;
        joint.pre_step(&mut a, &mut b, 0.1, 60.0);
        assert!(joint.bias < 0.0, "stretched beyond rest length should bias inward");
        joint.apply_impulse(&mut a, &mut b);
        assert!(b.v.x < 0.0, "should pull body b back toward body a");
    }

    #[test]
    fn max_force_clamps_accumulated_impulse() {
        let a = Body::new_static();
        let mut b = Body::new(1.0, 1.0);
        b.p = Vec2::new(3.0, 0.0);
        let mut joint = PinJoint::new(&a, Vec2::zero(), &b, Vec2::zero());
        joint.max_force = 1.0;

        b.p = Vec2::new(20.0, 0.0);
        let mut a = a;
        joint.pre_step(&mut a, &mut b, 0.2, 60.0);
        joint.apply_impulse(&mut a, &mut b);
        assert!(joint.get_impulse() <= 1.0 / 60.0 + 1e-9, "impulse should be capped at max_force * dt");
    }
}
