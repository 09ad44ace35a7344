//! Rigid body state: position, velocity, mass and moment, and the
//! bias-velocity side channel the solver uses to correct penetration
//! without polluting the "real" velocity bodies are integrated with.

use log::debug;
use vek::Vec2;

use crate::math::{cross_scalar_vec, Rotation};

/// A body with infinite mass along some axis reports `m_inv`/`i_inv` as
/// zero for that axis rather than `1.0 / 0.0`, which would poison every
/// computation that touches it.
pub const INFINITY: f64 = f64::INFINITY;

/// Per-step velocity integration strategy, the `cpBody::velocity_func`
/// slot: computes this step's linear/angular velocity from accumulated
/// force/torque, gravity and damping. Defaults to
/// [`default_update_velocity`]; a caller overrides it to intercept
/// gravity the way the original's `Planet` demo replaces a uniform
/// field with a radial one while still integrating through the default.
pub type VelocityFunc = fn(&mut Body, gravity: Vec2<f64>, damping: f64, dt: f64);

/// Per-step position integration strategy, the `cpBody::position_func`
/// slot. Defaults to [`default_update_position`].
pub type PositionFunc = fn(&mut Body, dt: f64);

/// The stock velocity integrator: gravity and accumulated force scaled
/// by `dt`, damping applied multiplicatively, bias velocity cleared. A
/// custom [`VelocityFunc`] that wants the usual integration with a
/// different `gravity` (or `damping`) calls through to this.
pub fn default_update_velocity(body: &mut Body, gravity: Vec2<f64>, damping: f64, dt: f64) {
    if body.is_static() {
        return;
    }
    let damping = damping.powf(dt);
    body.v = body.v * damping + (gravity + body.f * body.m_inv) * dt;
    body.w = body.w * damping + body.t * body.i_inv * dt;

    body.v_bias = Vec2::zero();
    body.w_bias = 0.0;
}

/// The stock position integrator: semi-implicit Euler using the real
/// plus bias velocity.
pub fn default_update_position(body: &mut Body, dt: f64) {
    if body.is_static() {
        return;
    }
    body.p += (body.v + body.v_bias) * dt;
    let angle = body.angle + (body.w + body.w_bias) * dt;
    body.set_angle(angle);
}

/// Rigid body.
///
/// Both dynamic and static bodies are represented by this type; a static
/// body is simply one with infinite mass and moment (see
/// [`Body::new_static`]) and is never touched by velocity/position
/// integration or the solver's impulse application.
#[derive(Debug, Clone)]
pub struct Body {
    /// Position of the center of gravity.
    pub p: Vec2<f64>,
    /// Linear velocity.
    pub v: Vec2<f64>,
    /// Force accumulator, cleared every step after integration.
    pub f: Vec2<f64>,

    /// Angle in radians.
    angle: f64,
    /// Cached `(cos, sin)` of `angle`, recomputed whenever `angle` changes.
    rot: Rotation,
    /// Angular velocity.
    pub w: f64,
    /// Torque accumulator, cleared every step after integration.
    pub t: f64,

    /// Bias (pseudo) velocity used only for Baumgarte position correction.
    /// Zeroed at the start of every step and never fed back into `v`.
    pub v_bias: Vec2<f64>,
    /// Bias angular velocity, the rotational counterpart of `v_bias`.
    pub w_bias: f64,

    mass: f64,
    m_inv: f64,
    moment: f64,
    i_inv: f64,

    /// Velocity integration strategy, called from [`Body::update_velocity`].
    pub velocity_func: VelocityFunc,
    /// Position integration strategy, called from [`Body::update_position`].
    pub position_func: PositionFunc,
}

impl Body {
    /// Construct a dynamic body with the given mass and moment of inertia.
    ///
    /// Both must be finite and positive; use [`Body::new_static`] for a
    /// body that should never move.
    pub fn new(mass: f64, moment: f64) -> Self {
        debug_assert!(mass > 0.0 && mass.is_finite(), "body mass must be finite and positive");
        debug_assert!(moment > 0.0 && moment.is_finite(), "body moment must be finite and positive");
        let mut body = Self {
            p: Vec2::zero(),
            v: Vec2::zero(),
            f: Vec2::zero(),
            angle: 0.0,
            rot: Rotation::identity(),
            w: 0.0,
            t: 0.0,
            v_bias: Vec2::zero(),
            w_bias: 0.0,
            mass: 0.0,
            m_inv: 0.0,
            moment: 0.0,
            i_inv: 0.0,
            velocity_func: default_update_velocity,
            position_func: default_update_position,
        };
        body.set_mass(mass);
        body.set_moment(moment);
        debug!("body constructed: mass={mass}, moment={moment}");
        body
    }

    /// Construct a static (infinite mass and moment) body at the origin.
    ///
    /// A `Space` keeps exactly one of these as the implicit "world" body
    /// that anchors shapes and constraints which shouldn't move.
    pub fn new_static() -> Self {
        let mut body = Self {
            p: Vec2::zero(),
            v: Vec2::zero(),
            f: Vec2::zero(),
            angle: 0.0,
            rot: Rotation::identity(),
            w: 0.0,
            t: 0.0,
            v_bias: Vec2::zero(),
            w_bias: 0.0,
            mass: INFINITY,
            m_inv: 0.0,
            moment: INFINITY,
            i_inv: 0.0,
            velocity_func: default_update_velocity,
            position_func: default_update_position,
        };
        body.mass = INFINITY;
        body.m_inv = 0.0;
        body.moment = INFINITY;
        body.i_inv = 0.0;
        body
    }

    /// Whether this body has infinite mass (static or kinematic).
    #[inline]
    pub fn is_static(&self) -> bool {
        self.m_inv == 0.0
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn m_inv(&self) -> f64 {
        self.m_inv
    }

    pub fn set_mass(&mut self, mass: f64) {
        debug_assert!(mass > 0.0, "mass must be positive");
        self.mass = mass;
        self.m_inv = 1.0 / mass;
    }

    pub fn moment(&self) -> f64 {
        self.moment
    }

    pub fn i_inv(&self) -> f64 {
        self.i_inv
    }

    pub fn set_moment(&mut self, moment: f64) {
        debug_assert!(moment > 0.0, "moment must be positive");
        self.moment = moment;
        self.i_inv = 1.0 / moment;
    }

    /// Current orientation in radians.
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Cached rotation, recomputed whenever the angle changes.
    pub fn rotation(&self) -> Rotation {
        self.rot
    }

    /// Set the orientation, updating the cached rotation in lockstep.
    pub fn set_angle(&mut self, angle: f64) {
        self.angle = angle;
        self.rot = Rotation::from_radians(angle);
    }

    /// World-space offset of a point given in the body's local frame.
    #[inline]
    pub fn local_to_world(&self, point: Vec2<f64>) -> Vec2<f64> {
        self.p + self.rot.rotate(point)
    }

    /// Local-space coordinates of a world-space point.
    #[inline]
    pub fn world_to_local(&self, point: Vec2<f64>) -> Vec2<f64> {
        self.rot.unrotate(point - self.p)
    }

    /// Velocity (real, not bias) of a point on the body given as a world
    /// offset from the center of gravity: `v + w x r`.
    #[inline]
    pub fn velocity_at_offset(&self, r: Vec2<f64>) -> Vec2<f64> {
        self.v + cross_scalar_vec(self.w, r)
    }

    /// Bias velocity of a point on the body given as a world offset from
    /// the center of gravity.
    #[inline]
    pub fn bias_velocity_at_offset(&self, r: Vec2<f64>) -> Vec2<f64> {
        self.v_bias + cross_scalar_vec(self.w_bias, r)
    }

    /// Apply an impulse at a world offset `r` from the center of gravity,
    /// updating the real velocity. No-op on a static body.
    #[inline]
    pub fn apply_impulse(&mut self, j: Vec2<f64>, r: Vec2<f64>) {
        if self.is_static() {
            return;
        }
        self.v += j * self.m_inv;
        self.w += self.i_inv * r.cross(j);
    }

    /// Apply a bias impulse at a world offset `r`, updating only the bias
    /// velocity channel. No-op on a static body.
    #[inline]
    pub fn apply_bias_impulse(&mut self, j: Vec2<f64>, r: Vec2<f64>) {
        if self.is_static() {
            return;
        }
        self.v_bias += j * self.m_inv;
        self.w_bias += self.i_inv * r.cross(j);
    }

    /// Integrate accumulated force/torque and gravity into velocity, then
    /// apply linear/angular damping, via [`Body::velocity_func`]. Called
    /// once per step before the solver runs.
    pub fn update_velocity(&mut self, gravity: Vec2<f64>, damping: f64, dt: f64) {
        (self.velocity_func)(self, gravity, damping, dt);
    }

    /// Integrate velocity (real plus bias) into position/angle, via
    /// [`Body::position_func`]. Called once per step after the solver runs.
    pub fn update_position(&mut self, dt: f64) {
        (self.position_func)(self, dt);
    }

    /// Clear the force and torque accumulators. Called once per step
    /// after integration.
    pub fn reset_forces(&mut self) {
        self.f = Vec2::zero();
        self.t = 0.0;
    }

    /// Accumulate a force applied at a world offset `r` from the center
    /// of gravity into this step's force/torque accumulators.
    pub fn apply_force(&mut self, force: Vec2<f64>, r: Vec2<f64>) {
        self.f += force;
        self.t += r.cross(force);
    }
}
