//! Keeps two bodies' angular velocities at a fixed ratio, like a gear
//! train. Structurally similar to [`super::motor::SimpleMotor`] except
//! the target relative velocity is derived from the bodies' current
//! angles and a gear ratio instead of a constant rate, and a `phase`
//! offset gives the ratio a position-level bias term the way
//! `cpPinJoint`/`cpPivotJoint` bias their own distance/point error.

#[derive(Debug, Clone)]
pub struct GearJoint {
    pub phase: f64,
    pub ratio: f64,
    /// Upper bound on the accumulated impulse's magnitude per step,
    /// `max_force * dt`. `f64::INFINITY` (the default) means unbreakable.
    pub max_force: f64,
    ratio_inv: f64,

    i_sum: f64,
    bias: f64,
    j_acc: f64,
    j_max: f64,
}

use crate::body::Body;

impl GearJoint {
    pub fn new(phase: f64, ratio: f64) -> Self {
        debug_assert!(ratio != 0.0, "gear ratio must be nonzero");
        Self {
            phase,
            ratio,
            max_force: f64::INFINITY,
            ratio_inv: 1.0 / ratio,
            i_sum: 0.0,
            bias: 0.0,
            j_acc: 0.0,
            j_max: f64::INFINITY,
        }
    }

    pub fn pre_step(&mut self, a: &mut Body, b: &mut Body, bias_coef: f64, dt: f64) {
        self.i_sum = 1.0 / (a.i_inv() * self.ratio_inv + self.ratio * b.i_inv());

        // Position error in the same `ratio*b - a` sense as `wr` below,
        // so the bias drives exactly the velocity channel the impulse
        // solve already controls (mirrors `PinJoint`'s `error =
        // current_dist - dist; bias = -bias_coef * dt_inv * error`).
        let dt_inv = if dt > 0.0 { 1.0 / dt } else { 0.0 };
        let error = self.ratio * b.angle() - a.angle() - self.phase;
        self.bias = -bias_coef * dt_inv * error;
        self.j_max = self.max_force * dt;

        // Warm start: reapply last step's accumulated impulse before the
        // first solver iteration, like every other joint in this module.
        a.w -= self.j_acc * a.i_inv() * self.ratio_inv;
        b.w += self.j_acc * b.i_inv();
    }

    pub fn apply_impulse(&mut self, a: &mut Body, b: &mut Body) {
        let wr = b.w * self.ratio - a.w;
        let j = (self.bias - wr) * self.i_sum;
        let j_old = self.j_acc;
        self.j_acc = (j_old + j).clamp(-self.j_max, self.j_max);
        let j = self.j_acc - j_old;

        a.w -= j * a.i_inv() * self.ratio_inv;
        b.w += j * b.i_inv();
    }

    pub fn get_impulse(&self) -> f64 {
        self.j_acc.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn locks_angular_velocity_ratio() {
        let mut a = Body::new(1.0, 1.0);
        let mut b = Body::new(1.0, 1.0);
        a.w = 4.0;
        b.w = 0.0;
        let mut gear = GearJoint::new(0.0, 2.0);
        for _ in 0..20 {
            gear.pre_step(&mut a, &mut b, 0.1, 1.0 / 60.0);
            gear.apply_impulse(&mut a, &mut b);
        }
        assert_relative_eq!(b.w * gear.ratio, a.w, epsilon = 1e-6);
    }

    #[test]
    fn nonzero_phase_biases_the_bodies_toward_a_fixed_angular_offset() {
        // With phase=0 and bodies starting at equal angles there's no
        // correction torque needed; a nonzero phase should pull the
        // bodies' angles apart until `ratio*b.angle() - a.angle()`
        // settles at `phase`.
        let mut a = Body::new(1.0, 1.0);
        let mut b = Body::new(1.0, 1.0);
        let mut gear = GearJoint::new(1.0, 1.0);
        let dt = 1.0 / 60.0;
        for _ in 0..600 {
            gear.pre_step(&mut a, &mut b, 0.2, dt);
            gear.apply_impulse(&mut a, &mut b);
            a.update_position(dt);
            b.update_position(dt);
        }
        let error = gear.ratio * b.angle() - a.angle() - gear.phase;
        assert!(error.abs() < 0.05, "gear with nonzero phase should settle near its target angular offset, residual error {error}");
    }
}
