//! Like [`super::pin::PinJoint`] but only constrains the anchors when
//! their separation leaves a `[min, max]` range; inside the range the
//! joint is slack and applies no impulse. Grounded on the `cpSlideJoint`
//! struct layout (`anchr1`/`anchr2`/`min`/`max`/`jnAcc`).

use vek::Vec2;

use crate::body::Body;
use crate::math::Vec2Ext;

use super::util::{apply_impulses, k_scalar, relative_velocity};

#[derive(Debug, Clone)]
pub struct SlideJoint {
    pub anchor_a: Vec2<f64>,
    pub anchor_b: Vec2<f64>,
    pub min: f64,
    pub max: f64,
    /// Upper bound on the accumulated normal impulse's magnitude per
    /// step, `max_force * dt`. `f64::INFINITY` (the default) means
    /// unbreakable.
    pub max_force: f64,

    r1: Vec2<f64>,
    r2: Vec2<f64>,
    n: Vec2<f64>,
    n_mass: f64,
    bias: f64,
    /// `None` while the joint is slack (inside `[min, max]`).
    active: bool,
    jn_acc: f64,
    jn_max: f64,
}

impl SlideJoint {
    pub fn new(anchor_a: Vec2<f64>, anchor_b: Vec2<f64>, min: f64, max: f64) -> Self {
        debug_assert!(min <= max, "slide joint min must not exceed max");
        Self {
            anchor_a,
            anchor_b,
            min,
            max,
            max_force: f64::INFINITY,
            r1: Vec2::zero(),
            r2: Vec2::zero(),
            n: Vec2::zero(),
            n_mass: 0.0,
            bias: 0.0,
            active: false,
            jn_acc: 0.0,
            jn_max: f64::INFINITY,
        }
    }

    pub fn pre_step(&mut self, a: &mut Body, b: &mut Body, bias_coef: f64, dt_inv: f64) {
        self.r1 = a.rotation().rotate(self.anchor_a);
        self.r2 = b.rotation().rotate(self.anchor_b);

        let delta = (b.p + self.r2) - (a.p + self.r1);
        let dist = delta.magnitude();

        let error = if dist < self.min {
            dist - self.min
        } else if dist > self.max {
            dist - self.max
        } else {
            0.0
        };

        self.active = error != 0.0;
        if !self.active {
            self.jn_acc = 0.0;
            return;
        }

        self.n = delta.normalized_or(Vec2::unit_x());
        self.n_mass = 1.0 / k_scalar(a, b, self.r1, self.r2, self.n);
        self.bias = -bias_coef * dt_inv * error;
        let dt = if dt_inv > 0.0 { 1.0 / dt_inv } else { 0.0 };
        self.jn_max = self.max_force * dt;

        apply_impulses(a, b, self.r1, self.r2, self.n * self.jn_acc);
    }

    pub fn apply_impulse(&mut self, a: &mut Body, b: &mut Body) {
        if !self.active {
            return;
        }

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

    #[test]
    fn slack_within_range_applies_no_impulse() {
        let a = Body::new_static();
        let mut b = Body::new(1.0, 1.0);
        b.p = Vec2::new(5.0, 0.0);
        b.v = Vec2::new(1.0, 0.0);
        let mut joint = SlideJoint::new(Vec2::zero(), Vec2::zero(), 1.0, 10.0);
        let mut a = a;
        joint.pre_step(&mut a, &mut b, 0.1, 60.0);
        joint.apply_impulse(&mut a, &mut b);
        assert_eq!(b.v, Vec2::new(1.0, 0.0));
    }

    #[test]
    fn stretched_past_max_pulls_back() {
        let a = Body::new_static();
        let mut b = Body::new(1.0, 1.0);
        b.p = Vec2::new(20.0, 0.0);
        let mut joint = SlideJoint::new(Vec2::zero(), Vec2::zero(), 1.0, 10.0);
        let mut a = a;
        joint.pre_step(&mut a, &mut b, 0.1, 60.0);
        assert!(joint.bias < 0.0);
        joint.apply_impulse(&mut a, &mut b);
        assert!(b.v.x < 0.0);
    }

    #[test]
    fn max_force_clamps_accumulated_impulse() {
        let a = Body::new_static();
        let mut b = Body::new(1.0, 1.0);
        b.p = Vec2::new(20.0, 0.0);
        let mut joint = SlideJoint::new(Vec2::zero(), Vec2::zero(), 1.0, 10.0);
        joint.max_force = 1.0;
        let mut a = a;
        joint.pre_step(&mut a, &mut b, 0.2, 60.0);
        joint.apply_impulse(&mut a, &mut b);
        assert!(joint.get_impulse() <= 1.0 / 60.0 + 1e-9, "impulse should be capped at max_force * dt");
    }
}
