//! Damped linear and rotary springs: a spring force computed once in
//! `pre_step` (so it behaves like an explicit force, not an iterative
//! constraint) plus a damping term applied every solver iteration that
//! decays the relative velocity along the spring's axis, reusing the
//! same `damping.powf(dt)` idiom [`crate::body::Body::update_velocity`]
//! uses for whole-body damping.

use vek::Vec2;

use crate::body::Body;
use crate::math::Vec2Ext;

use super::util::{apply_impulses, k_scalar, relative_velocity};

#[derive(Debug, Clone)]
pub struct DampedSpring {
    pub anchor_a: Vec2<f64>,
    pub anchor_b: Vec2<f64>,
    pub rest_length: f64,
    pub stiffness: f64,
    pub damping: f64,

    r1: Vec2<f64>,
    r2: Vec2<f64>,
    n: Vec2<f64>,
    n_mass: f64,
    dt: f64,
}

impl DampedSpring {
    pub fn new(anchor_a: Vec2<f64>, anchor_b: Vec2<f64>, rest_length: f64, stiffness: f64, damping: f64) -> Self {
        debug_assert!((0.0..=1.0).contains(&damping), "damping must be in (0, 1]");
        Self {
            anchor_a,
            anchor_b,
            rest_length,
            stiffness,
            damping,
            r1: Vec2::zero(),
            r2: Vec2::zero(),
            n: Vec2::zero(),
            n_mass: 0.0,
            dt: 0.0,
        }
    }

    pub fn pre_step(&mut self, a: &mut Body, b: &mut Body, dt: f64) {
        self.r1 = a.rotation().rotate(self.anchor_a);
        self.r2 = b.rotation().rotate(self.anchor_b);
        self.dt = dt;

        let delta = (b.p + self.r2) - (a.p + self.r1);
        let dist = delta.magnitude();
        self.n = delta.normalized_or(Vec2::unit_x());
        self.n_mass = 1.0 / k_scalar(a, b, self.r1, self.r2, self.n);

        let f_spring = (dist - self.rest_length) * self.stiffness;
        apply_impulses(a, b, self.r1, self.r2, self.n * (f_spring * dt));
    }

    pub fn apply_impulse(&mut self, a: &mut Body, b: &mut Body) {
        let vrn = relative_velocity(a, b, self.r1, self.r2).dot(self.n);
        let decayed = vrn * self.damping.powf(self.dt);
        let j = (decayed - vrn) * self.n_mass;
        apply_impulses(a, b, self.r1, self.r2, self.n * j);
    }
}

#[derive(Debug, Clone)]
pub struct DampedRotarySpring {
    pub rest_angle: f64,
    pub stiffness: f64,
    pub damping: f64,

    i_sum: f64,
    dt: f64,
}

impl DampedRotarySpring {
    pub fn new(rest_angle: f64, stiffness: f64, damping: f64) -> Self {
        Self { rest_angle, stiffness, damping, i_sum: 0.0, dt: 0.0 }
    }

    pub fn pre_step(&mut self, a: &mut Body, b: &mut Body, dt: f64) {
        self.i_sum = 1.0 / (a.i_inv() + b.i_inv());
        self.dt = dt;

        let relative_angle = b.angle() - a.angle();
        let t_spring = -(relative_angle - self.rest_angle) * self.stiffness;
        let j_spring = t_spring * dt;

        a.w -= j_spring * a.i_inv();
        b.w += j_spring * b.i_inv();
    }

    pub fn apply_impulse(&mut self, a: &mut Body, b: &mut Body) {
        let wr = b.w - a.w;
        let decayed = wr * self.damping.powf(self.dt);
        let j = (decayed - wr) * self.i_sum;

        a.w -= j * a.i_inv();
        b.w += j * b.i_inv();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stretched_spring_pulls_bodies_together() {
        let mut a = Body::new_static();
        let mut b = Body::new(1.0, 1.0);
        b.p = Vec2::new(5.0, 0.0);
        let mut spring = DampedSpring::new(Vec2::zero(), Vec2::zero(), 1.0, 10.0, 0.5);
        spring.pre_step(&mut a, &mut b, 1.0 / 60.0);
        assert!(b.v.x < 0.0, "stretched spring should pull body b toward body a");
    }

    #[test]
    fn damping_decays_relative_velocity() {
        let mut a = Body::new_static();
        let mut b = Body::new(1.0, 1.0);
        b.p = Vec2::new(1.0, 0.0);
        b.v = Vec2::new(10.0, 0.0);
        let mut spring = DampedSpring::new(Vec2::zero(), Vec2::zero(), 1.0, 0.0, 0.5);
        spring.pre_step(&mut a, &mut b, 1.0 / 60.0);
        spring.apply_impulse(&mut a, &mut b);
        assert!(b.v.x < 10.0);
        assert!(b.v.x > 0.0);
    }

    #[test]
    fn rotary_spring_pulls_angle_back_to_rest() {
        let mut a = Body::new_static();
        let mut b = Body::new(1.0, 1.0);
        b.set_angle(1.0);
        let mut spring = DampedRotarySpring::new(0.0, 5.0, 0.5);
        spring.pre_step(&mut a, &mut b, 1.0 / 60.0);
        assert!(b.w < 0.0, "should torque body b back toward rest angle");
    }
}
