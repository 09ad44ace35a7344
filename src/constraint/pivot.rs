//! Pins a single point on body `a` to a single point on body `b`, free
//! to rotate. Grounded on the `cpPivotJoint` struct layout
//! (`anchr1`/`anchr2`/`k1`/`k2`/`jAcc`).

use vek::Vec2;

use crate::body::Body;

use super::util::{apply_impulses, k_tensor, mult_k, relative_velocity, KTensor};

#[derive(Debug, Clone)]
pub struct PivotJoint {
    pub anchor_a: Vec2<f64>,
    pub anchor_b: Vec2<f64>,
    pub max_bias: f64,
    /// Upper bound on the accumulated impulse's magnitude per step,
    /// `max_force * dt`. `f64::INFINITY` (the default) means unbreakable.
    pub max_force: f64,

    r1: Vec2<f64>,
    r2: Vec2<f64>,
    k: KTensor,
    bias: Vec2<f64>,
    j_acc: Vec2<f64>,
    j_max: f64,
}

impl PivotJoint {
    pub fn new(anchor_a: Vec2<f64>, anchor_b: Vec2<f64>) -> Self {
        Self {
            anchor_a,
            anchor_b,
            max_bias: f64::INFINITY,
            max_force: f64::INFINITY,
            r1: Vec2::zero(),
            r2: Vec2::zero(),
            k: KTensor::default(),
            bias: Vec2::zero(),
            j_acc: Vec2::zero(),
            j_max: f64::INFINITY,
        }
    }

    /// Convenience constructor from a single world-space pivot point,
    /// converting it to each body's local frame.
    pub fn from_world_pivot(a: &Body, b: &Body, pivot: Vec2<f64>) -> Self {
        Self::new(a.world_to_local(pivot), b.world_to_local(pivot))
    }

    pub fn pre_step(&mut self, a: &mut Body, b: &mut Body, bias_coef: f64, dt_inv: f64) {
        self.r1 = a.rotation().rotate(self.anchor_a);
        self.r2 = b.rotation().rotate(self.anchor_b);

        self.k = k_tensor(a, b, self.r1, self.r2);

        let delta = (b.p + self.r2) - (a.p + self.r1);
        let bias = delta * (-bias_coef * dt_inv);
        let mag = bias.magnitude();
        self.bias = if mag > self.max_bias && mag > 0.0 { bias * (self.max_bias / mag) } else { bias };
        let dt = if dt_inv > 0.0 { 1.0 / dt_inv } else { 0.0 };
        self.j_max = self.max_force * dt;

        apply_impulses(a, b, self.r1, self.r2, self.j_acc);
    }

    pub fn apply_impulse(&mut self, a: &mut Body, b: &mut Body) {
        let vr = relative_velocity(a, b, self.r1, self.r2);
        let j = mult_k(self.bias - vr, self.k);
        let j_acc_old = self.j_acc;
        let j_acc_new = j_acc_old + j;
        let mag = j_acc_new.magnitude();
        self.j_acc = if mag > self.j_max && mag > 0.0 { j_acc_new * (self.j_max / mag) } else { j_acc_new };
        let j = self.j_acc - j_acc_old;
        apply_impulses(a, b, self.r1, self.r2, j);
    }

    pub fn get_impulse(&self) -> f64 {
        self.j_acc.magnitude()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_two_bodies_at_the_same_world_point() {
        let a = Body::new_static();
        let mut b = Body::new(1.0, 1.0);
        b.p = Vec2::new(0.1, 0.0);
        let mut joint = PivotJoint::from_world_pivot(&a, &b, Vec2::zero());

        let mut a = a;
        joint.pre_step(&mut a, &mut b, 0.2, 60.0);
        assert!(joint.bias.x < 0.0);

        joint.apply_impulse(&mut a, &mut b);
        assert!(b.v.x < 0.0);
    }

    #[test]
    fn get_impulse_accumulates_magnitude() {
        let a = Body::new_static();
        let mut b = Body::new(1.0, 1.0);
        b.p = Vec2::new(0.5, 0.0);
        let mut joint = PivotJoint::from_world_pivot(&a, &b, Vec2::zero());
        let mut a = a;
        joint.pre_step(&mut a, &mut b, 0.2, 60.0);
        joint.apply_impulse(&mut a, &mut b);
        assert!(joint.get_impulse() > 0.0);
    }

    #[test]
    fn max_force_clamps_accumulated_impulse() {
        let a = Body::new_static();
        let mut b = Body::new(1.0, 1.0);
        b.p = Vec2::new(20.0, 0.0);
        let mut joint = PivotJoint::from_world_pivot(&a, &b, Vec2::zero());
        joint.max_force = 1.0;
        let mut a = a;
        joint.pre_step(&mut a, &mut b, 0.2, 60.0);
        joint.apply_impulse(&mut a, &mut b);
        assert!(joint.get_impulse() <= 1.0 / 60.0 + 1e-9, "impulse should be capped at max_force * dt");
    }
}
