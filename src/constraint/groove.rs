//! Constrains an anchor point on body `b` to slide along a straight
//! groove defined by two local-space endpoints on body `a`, like a pin
//! in a slot. Otherwise the same point-constraint math as
//! [`super::pivot::PivotJoint`].

use vek::Vec2;

use crate::body::Body;
use crate::math::Vec2Ext;

use super::util::{apply_impulses, k_tensor, mult_k, relative_velocity, KTensor};

#[derive(Debug, Clone)]
pub struct GrooveJoint {
    /// Groove endpoints in body `a`'s local frame.
    pub groove_a: Vec2<f64>,
    pub groove_b: Vec2<f64>,
    /// Anchor point on body `b`'s local frame.
    pub anchor_b: Vec2<f64>,
    /// Upper bound on the accumulated impulse's magnitude per step,
    /// `max_force * dt`. `f64::INFINITY` (the default) means unbreakable.
    pub max_force: f64,

    groove_n: Vec2<f64>,
    r1: Vec2<f64>,
    r2: Vec2<f64>,
    k: KTensor,
    bias: Vec2<f64>,
    j_acc: Vec2<f64>,
    j_max: f64,
}

impl GrooveJoint {
    pub fn new(groove_a: Vec2<f64>, groove_b: Vec2<f64>, anchor_b: Vec2<f64>) -> Self {
        Self {
            groove_a,
            groove_b,
            anchor_b,
            max_force: f64::INFINITY,
            groove_n: Vec2::zero(),
            r1: Vec2::zero(),
            r2: Vec2::zero(),
            k: KTensor::default(),
            bias: Vec2::zero(),
            j_acc: Vec2::zero(),
            j_max: f64::INFINITY,
        }
    }

    pub fn pre_step(&mut self, a: &mut Body, b: &mut Body, bias_coef: f64, dt_inv: f64) {
        // Groove endpoints and normal in world space.
        let ga = a.local_to_world(self.groove_a);
        let gb = a.local_to_world(self.groove_b);
        let groove_dir = (gb - ga).normalized_or(Vec2::unit_x());
        self.groove_n = groove_dir.perp();

        let anchor_b_world = b.local_to_world(self.anchor_b);

        // Project the anchor onto the groove segment, clamped to its
        // endpoints, to get this step's pivot point on body `a`.
        let t = ((anchor_b_world - ga).dot(groove_dir) / (gb - ga).magnitude().max(f64::EPSILON)).clamp(0.0, 1.0);
        let clamped_point = ga + (gb - ga) * t;

        self.r1 = clamped_point - a.p;
        self.r2 = b.rotation().rotate(self.anchor_b);

        self.k = k_tensor(a, b, self.r1, self.r2);

        let delta = (b.p + self.r2) - (a.p + self.r1);
        self.bias = delta * (-bias_coef * dt_inv);
        let dt = if dt_inv > 0.0 { 1.0 / dt_inv } else { 0.0 };
        self.j_max = self.max_force * dt;

        apply_impulses(a, b, self.r1, self.r2, self.j_acc);
    }

    pub fn apply_impulse(&mut self, a: &mut Body, b: &mut Body) {
        let vr = relative_velocity(a, b, self.r1, self.r2);

        // Only the component perpendicular to the groove is corrected;
        // sliding along the groove itself is free.
        let delta_bias = self.bias - vr;
        let corrected = self.groove_n * delta_bias.dot(self.groove_n);

        let j = mult_k(corrected, self.k);
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
