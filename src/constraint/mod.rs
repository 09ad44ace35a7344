//! Two-body joint constraints, solved by the same sequential-impulse
//! loop that resolves contacts: `pre_step` once per step, then
//! `apply_impulse` once per solver iteration.

pub mod gear;
pub mod groove;
pub mod motor;
pub mod pin;
pub mod pivot;
pub mod slide;
pub mod spring;
mod util;

use crate::body::Body;
use crate::BodyKey;

/// Which concrete joint a [`Constraint`] wraps.
#[derive(Debug, Clone)]
pub enum Joint {
    Pin(pin::PinJoint),
    Slide(slide::SlideJoint),
    Pivot(pivot::PivotJoint),
    Groove(groove::GrooveJoint),
    DampedSpring(spring::DampedSpring),
    DampedRotarySpring(spring::DampedRotarySpring),
    Gear(gear::GearJoint),
    SimpleMotor(motor::SimpleMotor),
}

/// A constraint between two bodies, registered in a `Space`.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub a: BodyKey,
    pub b: BodyKey,
    pub joint: Joint,
}

impl Constraint {
    pub fn new(a: BodyKey, b: BodyKey, joint: Joint) -> Self {
        debug_assert!(a != b, "a constraint needs two distinct bodies");
        Self { a, b, joint }
    }

    /// Precompute this step's effective masses and bias/target values.
    /// `dt` is the step size; `bias_coef` only matters for the
    /// position-correcting joints (pin/slide/pivot/groove/gear).
    pub fn pre_step(&mut self, a: &mut Body, b: &mut Body, dt: f64, bias_coef: f64) {
        let dt_inv = if dt > 0.0 { 1.0 / dt } else { 0.0 };
        match &mut self.joint {
            Joint::Pin(j) => j.pre_step(a, b, bias_coef, dt_inv),
            Joint::Slide(j) => j.pre_step(a, b, bias_coef, dt_inv),
            Joint::Pivot(j) => j.pre_step(a, b, bias_coef, dt_inv),
            Joint::Groove(j) => j.pre_step(a, b, bias_coef, dt_inv),
            Joint::DampedSpring(j) => j.pre_step(a, b, dt),
            Joint::DampedRotarySpring(j) => j.pre_step(a, b, dt),
            Joint::Gear(j) => j.pre_step(a, b, bias_coef, dt),
            Joint::SimpleMotor(j) => j.pre_step(a, b, dt),
        }
    }

    /// One solver iteration for this constraint.
    pub fn apply_impulse(&mut self, a: &mut Body, b: &mut Body) {
        match &mut self.joint {
            Joint::Pin(j) => j.apply_impulse(a, b),
            Joint::Slide(j) => j.apply_impulse(a, b),
            Joint::Pivot(j) => j.apply_impulse(a, b),
            Joint::Groove(j) => j.apply_impulse(a, b),
            Joint::DampedSpring(j) => j.apply_impulse(a, b),
            Joint::DampedRotarySpring(j) => j.apply_impulse(a, b),
            Joint::Gear(j) => j.apply_impulse(a, b),
            Joint::SimpleMotor(j) => j.apply_impulse(a, b),
        }
    }

    /// Magnitude of the impulse this constraint applied last step, for
    /// callers that want to detect an overloaded/breaking joint. Always
    /// `0.0` for the spring variants, which apply an explicit force
    /// rather than an accumulated impulse.
    pub fn get_impulse(&self) -> f64 {
        match &self.joint {
            Joint::Pin(j) => j.get_impulse(),
            Joint::Slide(j) => j.get_impulse(),
            Joint::Pivot(j) => j.get_impulse(),
            Joint::Groove(j) => j.get_impulse(),
            Joint::DampedSpring(_) | Joint::DampedRotarySpring(_) => 0.0,
            Joint::Gear(j) => j.get_impulse(),
            Joint::SimpleMotor(j) => j.get_impulse(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;
    use vek::Vec2;

    #[test]
    fn dispatch_reaches_the_wrapped_joint() {
        let mut sm: SlotMap<BodyKey, ()> = SlotMap::with_key();
        let ka = sm.insert(());
        let kb = sm.insert(());

        let mut a = Body::new_static();
        let mut b = Body::new(1.0, 1.0);
        b.p = Vec2::new(2.0, 0.0);

        let mut constraint = Constraint::new(ka, kb, Joint::Pin(pin::PinJoint::new(&a, Vec2::zero(), &b, Vec2::zero())));
        b.p = Vec2::new(3.0, 0.0);
        constraint.pre_step(&mut a, &mut b, 1.0 / 60.0, 0.1);
        constraint.apply_impulse(&mut a, &mut b);
        assert!(constraint.get_impulse() > 0.0);
    }
}
