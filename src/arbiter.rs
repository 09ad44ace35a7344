//! Persistent contact manifolds between a pair of shapes.
//!
//! An arbiter owns the solver's per-contact accumulators (`jn_acc`,
//! `jt_acc`, `j_bias`) across steps so the sequential-impulse solver can
//! warm-start from the previous step's result instead of building up
//! impulses from zero every iteration. Matching "is this the same
//! contact as last step" is done by [`collide::feature_hash`], not by
//! position, so a contact survives small relative sliding.

use arrayvec::ArrayVec;
use vek::Vec2;

use crate::body::Body;
use crate::collide::{self, MAX_CONTACTS};
use crate::math::Vec2Ext;
use crate::shape::Shape;
use crate::ShapeKey;

/// One point of a persistent manifold, carrying the solver's
/// accumulated impulses alongside the narrow-phase geometry.
#[derive(Debug, Clone, Copy)]
pub struct ContactPoint {
    pub p: Vec2<f64>,
    pub n: Vec2<f64>,
    pub dist: f64,
    hash: u64,

    /// Offsets from each body's center of gravity to the contact point,
    /// recomputed every [`Arbiter::pre_step`].
    r1: Vec2<f64>,
    r2: Vec2<f64>,

    n_mass: f64,
    t_mass: f64,
    bias: f64,
    bounce: f64,

    /// Accumulated normal impulse.
    pub jn_acc: f64,
    /// Accumulated tangent (friction) impulse.
    pub jt_acc: f64,
    /// Accumulated bias (position-correction) impulse.
    pub j_bias: f64,
}

impl ContactPoint {
    fn from_contact(c: collide::Contact) -> Self {
        Self {
            p: c.p,
            n: c.n,
            dist: c.dist,
            hash: c.hash,
            r1: Vec2::zero(),
            r2: Vec2::zero(),
            n_mass: 0.0,
            t_mass: 0.0,
            bias: 0.0,
            bounce: 0.0,
            jn_acc: 0.0,
            jt_acc: 0.0,
            j_bias: 0.0,
        }
    }
}

/// Key identifying an arbiter by its unordered shape pair. Shapes are
/// stored in ascending `ShapeKey` order so `(a, b)` and `(b, a)` hash
/// and compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArbiterKey {
    pub a: ShapeKey,
    pub b: ShapeKey,
}

impl ArbiterKey {
    pub fn new(a: ShapeKey, b: ShapeKey) -> Self {
        use slotmap::Key;
        if a.data() <= b.data() {
            Self { a, b }
        } else {
            Self { a: b, b: a }
        }
    }
}

/// A persistent contact manifold between two shapes.
#[derive(Debug, Clone)]
pub struct Arbiter {
    pub a: ShapeKey,
    pub b: ShapeKey,
    pub contacts: ArrayVec<ContactPoint, MAX_CONTACTS>,

    /// Combined coefficient of restitution (`e_a * e_b`).
    pub e: f64,
    /// Combined coefficient of friction (`u_a * u_b`).
    pub u: f64,
    /// Relative surface velocity (`b.surface_velocity - a.surface_velocity`).
    pub target_v: Vec2<f64>,

    /// Simulation stamp this arbiter's contacts were last refreshed at;
    /// used by `Space::step` to evict manifolds the narrow phase hasn't
    /// touched in `tuning.contact_persistence` steps.
    pub stamp: u64,
}

impl Arbiter {
    /// Run the narrow phase for `shape_a`/`shape_b` (pre-ordered by kind
    /// by the caller) and build a fresh arbiter with zeroed accumulators.
    pub fn new(key_a: ShapeKey, shape_a: &Shape, key_b: ShapeKey, shape_b: &Shape, stamp: u64) -> Option<Self> {
        let contacts = collide::dispatch(shape_a, shape_b);
        if contacts.is_empty() {
            return None;
        }
        let contacts = contacts.into_iter().map(ContactPoint::from_contact).collect();
        Some(Self {
            a: key_a,
            b: key_b,
            contacts,
            e: 0.0,
            u: 0.0,
            target_v: Vec2::zero(),
            stamp,
        })
    }

    /// Replace this arbiter's contacts with a fresh narrow-phase result,
    /// carrying over accumulated impulses for any contact whose feature
    /// hash matches one from the previous step (warm starting).
    pub fn update(&mut self, new_contacts: ArrayVec<collide::Contact, MAX_CONTACTS>, stamp: u64) {
        let mut merged: ArrayVec<ContactPoint, MAX_CONTACTS> = ArrayVec::new();
        for new_c in new_contacts {
            let mut cp = ContactPoint::from_contact(new_c);
            if let Some(old) = self.contacts.iter().find(|old| old.hash == cp.hash) {
                cp.jn_acc = old.jn_acc;
                cp.jt_acc = old.jt_acc;
            }
            merged.push(cp);
        }
        self.contacts = merged;
        self.stamp = stamp;
    }

    /// Precompute per-contact effective masses and bias/bounce targets.
    /// Called once per step before any solver iterations.
    pub fn pre_step(&mut self, shape_a: &Shape, shape_b: &Shape, a: &Body, b: &Body, bias_coef: f64, collision_slop: f64, dt_inv: f64) {
        let e = shape_a.e * shape_b.e;
        self.e = e;
        self.u = shape_a.u * shape_b.u;
        self.target_v = shape_b.surface_velocity - shape_a.surface_velocity;

        for con in &mut self.contacts {
            con.r1 = con.p - a.p;
            con.r2 = con.p - b.p;

            con.n_mass = 1.0 / k_scalar(a, b, con.r1, con.r2, con.n);
            con.t_mass = 1.0 / k_scalar(a, b, con.r1, con.r2, con.n.perp());

            con.bias = -bias_coef * dt_inv * (con.dist + collision_slop).min(0.0);
            con.j_bias = 0.0;

            con.bounce = normal_relative_velocity(a, b, con.r1, con.r2, con.n) * e;
        }
    }

    /// Re-apply this step's (warm-started) accumulated impulses before
    /// the first solver iteration, so the first iteration starts from
    /// last step's solution instead of zero.
    pub fn apply_cached_impulse(&self, a: &mut Body, b: &mut Body) {
        for con in &self.contacts {
            let j = con.n.rotate_by(Vec2::new(con.jn_acc, con.jt_acc));
            apply_impulses(a, b, con.r1, con.r2, j);
        }
    }

    /// One sequential-impulse solver iteration: compute and clamp the
    /// bias, normal, and friction impulses for every contact, applying
    /// each as it's found. `e_coef` is `1.0` during the elastic
    /// iterations (bounce applies) and `0.0` during the remaining
    /// iterations (only settling penetration, not re-adding bounce).
    pub fn apply_impulse(&mut self, a: &mut Body, b: &mut Body, e_coef: f64) {
        for con in &mut self.contacts {
            let r1 = con.r1;
            let r2 = con.r2;
            let n = con.n;

            let vb1 = a.v_bias + r1.perp() * a.w_bias;
            let vb2 = b.v_bias + r2.perp() * b.w_bias;
            let vbn = (vb2 - vb1).dot(n);

            let jbn = (con.bias - vbn) * con.n_mass;
            let jbn_old = con.j_bias;
            con.j_bias = (jbn_old + jbn).max(0.0);
            let jbn = con.j_bias - jbn_old;
            apply_bias_impulses(a, b, r1, r2, n * jbn);

            let vr = relative_velocity(a, b, r1, r2);
            let vrn = vr.dot(n);

            let jn = -(con.bounce * e_coef + vrn) * con.n_mass;
            let jn_old = con.jn_acc;
            con.jn_acc = (jn_old + jn).max(0.0);
            let jn = con.jn_acc - jn_old;

            let vrt = (vr + self.target_v).dot(n.perp());

            let jt_max = self.u * con.jn_acc;
            let jt = -vrt * con.t_mass;
            let jt_old = con.jt_acc;
            con.jt_acc = (jt_old + jt).clamp(-jt_max, jt_max);
            let jt = con.jt_acc - jt_old;

            apply_impulses(a, b, r1, r2, n.rotate_by(Vec2::new(jn, jt)));
        }
    }

    /// Estimate how much of this manifold's summed contact impulse is
    /// being wasted fighting itself — high when a body is crushed
    /// between two others rather than resting or sliding. Not used by
    /// the solver itself; exposed for a host to build breakable-joint
    /// style features on.
    pub fn crushing_impulse(&self) -> f64 {
        let mut fsum = 0.0;
        let mut vsum = Vec2::zero();
        for con in &self.contacts {
            let j = con.n.rotate_by(Vec2::new(con.jn_acc, con.jt_acc));
            fsum += j.magnitude();
            vsum += j;
        }
        if fsum <= f64::EPSILON {
            return 0.0;
        }
        1.0 - vsum.magnitude() / fsum
    }
}

/// `cpvrotate`-style: rotate `v` by the complex number `(n.x, n.y)`.
/// Used with `n = (jn, jt)`-style pairs to compose a normal/tangent
/// impulse pair into one world-space vector without a separate tangent
/// basis.
trait RotateBy {
    fn rotate_by(self, v: Self) -> Self;
}

impl RotateBy for Vec2<f64> {
    fn rotate_by(self, v: Self) -> Self {
        Vec2::new(self.x * v.x - self.y * v.y, self.x * v.y + self.y * v.x)
    }
}

fn relative_velocity(a: &Body, b: &Body, r1: Vec2<f64>, r2: Vec2<f64>) -> Vec2<f64> {
    b.velocity_at_offset(r2) - a.velocity_at_offset(r1)
}

fn normal_relative_velocity(a: &Body, b: &Body, r1: Vec2<f64>, r2: Vec2<f64>, n: Vec2<f64>) -> f64 {
    relative_velocity(a, b, r1, r2).dot(n)
}

/// Effective mass term along axis `n`: `1/m_a + 1/m_b + (angular terms)`.
fn k_scalar(a: &Body, b: &Body, r1: Vec2<f64>, r2: Vec2<f64>, n: Vec2<f64>) -> f64 {
    let rcn1 = r1.cross(n);
    let rcn2 = r2.cross(n);
    a.m_inv() + b.m_inv() + a.i_inv() * rcn1 * rcn1 + b.i_inv() * rcn2 * rcn2
}

fn apply_impulses(a: &mut Body, b: &mut Body, r1: Vec2<f64>, r2: Vec2<f64>, j: Vec2<f64>) {
    a.apply_impulse(-j, r1);
    b.apply_impulse(j, r2);
}

fn apply_bias_impulses(a: &mut Body, b: &mut Body, r1: Vec2<f64>, r2: Vec2<f64>, j: Vec2<f64>) {
    a.apply_bias_impulse(-j, r1);
    b.apply_bias_impulse(j, r2);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{reset_shape_id_counter, Circle, Geometry};
    use approx::assert_relative_eq;
    use slotmap::SlotMap;

    fn shape_key(sm: &mut SlotMap<ShapeKey, ()>) -> ShapeKey {
        sm.insert(())
    }

    #[test]
    fn arbiter_key_is_order_independent() {
        let mut sm: SlotMap<ShapeKey, ()> = SlotMap::with_key();
        let a = shape_key(&mut sm);
        let b = shape_key(&mut sm);
        assert_eq!(ArbiterKey::new(a, b), ArbiterKey::new(b, a));
    }

    #[test]
    fn new_returns_none_when_shapes_dont_touch() {
        reset_shape_id_counter();
        let mut bodies: SlotMap<crate::BodyKey, ()> = SlotMap::with_key();
        let body_key = bodies.insert(());
        let mut sm: SlotMap<ShapeKey, ()> = SlotMap::with_key();
        let ka = shape_key(&mut sm);
        let kb = shape_key(&mut sm);

        let mut a = Shape::new(body_key, Geometry::Circle(Circle { c: Vec2::zero(), r: 1.0, tc: Vec2::zero() }));
        let mut b = Shape::new(body_key, Geometry::Circle(Circle { c: Vec2::zero(), r: 1.0, tc: Vec2::zero() }));
        a.cache_data(&Body::new(1.0, 1.0));
        let mut far = Body::new(1.0, 1.0);
        far.p = Vec2::new(100.0, 0.0);
        b.cache_data(&far);

        assert!(Arbiter::new(ka, &a, kb, &b, 0).is_none());
    }

    #[test]
    fn apply_impulse_stops_circle_falling_through_segment() {
        reset_shape_id_counter();
        let mut bodies: SlotMap<crate::BodyKey, ()> = SlotMap::with_key();
        let body_key = bodies.insert(());
        let mut sm: SlotMap<ShapeKey, ()> = SlotMap::with_key();
        let k_floor = shape_key(&mut sm);
        let k_ball = shape_key(&mut sm);

        let mut floor_shape = Shape::new(
            body_key,
            Geometry::Segment(crate::shape::Segment::new(Vec2::new(-10.0, 0.0), Vec2::new(10.0, 0.0), 0.0)),
        );
        let floor_body = Body::new_static();
        floor_shape.cache_data(&floor_body);

        let mut ball_shape = Shape::new(body_key, Geometry::Circle(Circle { c: Vec2::zero(), r: 1.0, tc: Vec2::zero() }));
        let mut ball_body = Body::new(1.0, 1.0);
        ball_body.p = Vec2::new(0.0, 0.95);
        ball_body.v = Vec2::new(0.0, -5.0);
        ball_shape.cache_data(&ball_body);

        let mut arb = Arbiter::new(k_ball, &ball_shape, k_floor, &floor_shape, 0).expect("expected contact");
        let dt = 1.0 / 60.0;
        arb.pre_step(&ball_shape, &floor_shape, &ball_body, &floor_body, 0.1, 0.1, 1.0 / dt);

        let mut floor_body = floor_body;
        for _ in 0..10 {
            arb.apply_impulse(&mut ball_body, &mut floor_body, 1.0);
        }

        assert!(ball_body.v.y > -5.0, "normal impulse should have slowed the ball's fall");
    }

    #[test]
    fn crushing_impulse_is_zero_with_no_contacts() {
        let arb = Arbiter {
            a: ShapeKey::default(),
            b: ShapeKey::default(),
            contacts: ArrayVec::new(),
            e: 0.0,
            u: 0.0,
            target_v: Vec2::zero(),
            stamp: 0,
        };
        assert_relative_eq!(arb.crushing_impulse(), 0.0);
    }
}
