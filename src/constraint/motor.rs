//! Drives the relative angular velocity between two bodies towards a
//! constant `rate`, clamped by `max_torque * dt` so the motor can stall
//! under load instead of applying unbounded torque. Ported directly
//! from `cpSimpleMotor.c`'s `preStep`/`applyImpulse`/`getImpulse`.

use crate::body::Body;

#[derive(Debug, Clone)]
pub struct SimpleMotor {
    pub rate: f64,
    pub max_torque: f64,

    i_sum: f64,
    j_max: f64,
    j_acc: f64,
}

impl SimpleMotor {
    pub fn new(rate: f64, max_torque: f64) -> Self {
        Self { rate, max_torque, i_sum: 0.0, j_max: f64::INFINITY, j_acc: 0.0 }
    }

    pub fn pre_step(&mut self, a: &mut Body, b: &mut Body, dt: f64) {
        self.i_sum = 1.0 / (a.i_inv() + b.i_inv());
        self.j_max = self.max_torque * dt;

        a.w -= self.j_acc * a.i_inv();
        b.w += self.j_acc * b.i_inv();
    }

    pub fn apply_impulse(&mut self, a: &mut Body, b: &mut Body) {
        let wr = b.w - a.w + self.rate;

        let j = -wr * self.i_sum;
        let j_old = self.j_acc;
        self.j_acc = (j_old + j).clamp(-self.j_max, self.j_max);
        let j = self.j_acc - j_old;

        a.w -= j * a.i_inv();
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
    fn drives_relative_angular_velocity_to_rate() {
        let mut a = Body::new_static();
        let mut b = Body::new(1.0, 1.0);
        let mut motor = SimpleMotor::new(5.0, f64::INFINITY);
        for _ in 0..20 {
            motor.pre_step(&mut a, &mut b, 1.0 / 60.0);
            motor.apply_impulse(&mut a, &mut b);
        }
        assert_relative_eq!(b.w, -5.0, epsilon = 1e-6);
    }

    #[test]
    fn max_torque_clamps_accumulated_impulse() {
        let mut a = Body::new_static();
        let mut b = Body::new(1.0, 1.0);
        let mut motor = SimpleMotor::new(100.0, 1.0);
        motor.pre_step(&mut a, &mut b, 1.0 / 60.0);
        motor.apply_impulse(&mut a, &mut b);
        assert!(motor.get_impulse() <= 1.0 / 60.0 + 1e-9);
    }
}
