//! The simulation world: owns every body, shape, constraint and arbiter,
//! and drives one step of the whole pipeline (integrate positions,
//! collide, integrate velocities, solve, integrate positions into the
//! bias channel) per [`Space::step`] call. Grounded on `cpSpaceStep`
//! (`original_source/src/cpSpace.c`) and, for the step-orchestration
//! idiom (nested profiling scopes per phase, a plain settings struct),
//! on `castle-game`'s own `physics::mod::Physics::step`.

use hashbrown::HashMap;
use log::{debug, trace, warn};
use slotmap::{Key, SlotMap};
use vek::{Aabr, Vec2};

use crate::arbiter::{Arbiter, ArbiterKey};
use crate::body::Body;
use crate::collide;
use crate::constraint::Constraint;
use crate::shape::{QueryFilter, SegmentQueryInfo, Shape};
use crate::tuning::Tuning;
use crate::{BodyKey, ConstraintKey, ShapeKey};

use crate::broadphase::SpatialHash;

/// Where a shape gets registered: the active hash (re-stamped every
/// step as its body moves) or the static hash (stamped once, since
/// static geometry never moves).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapePlacement {
    Active,
    Static,
}

/// A collision pair handed to a [`CollisionHandler`] callback.
///
/// `normal_coef` is `-1.0` when the handler was registered as
/// `(type_b, type_a)` relative to the arbiter's actual `(a, b)` shape
/// order, so a callback written against its own declared order can
/// flip `arbiter.contacts[..].n` instead of special-casing both orders.
pub struct CollisionContext<'a> {
    pub arbiter: &'a Arbiter,
    pub normal_coef: f64,
}

/// Per-collision-type-pair callbacks, consulted during narrow phase and
/// the solver. Mirrors Chipmunk's four-callback collision handler, with
/// bodies dropped from the signature (a callback only ever needs the
/// arbiter) to avoid reentering `Space` while it's mid-step.
#[derive(Default)]
pub struct CollisionHandler {
    /// Called the first time a new arbiter is formed for this pair.
    pub begin: Option<Box<dyn FnMut(&CollisionContext) -> bool>>,
    /// Called every step before the solver runs; returning `false`
    /// discards this step's contacts (the arbiter itself survives for
    /// persistence bookkeeping).
    pub pre_solve: Option<Box<dyn FnMut(&CollisionContext) -> bool>>,
    /// Called every step after the solver has applied its impulses.
    pub post_solve: Option<Box<dyn FnMut(&CollisionContext)>>,
    /// Called when an arbiter is evicted (the shapes stopped touching,
    /// or one of them was removed from the space).
    pub separate: Option<Box<dyn FnMut(&CollisionContext)>>,
}

/// The simulation world.
pub struct Space {
    bodies: SlotMap<BodyKey, Body>,
    /// The implicit static body every `Space` owns; excluded from
    /// `dynamic_bodies` so it's never integrated or iterated by
    /// [`Space::each_body`].
    static_body: BodyKey,
    dynamic_bodies: Vec<BodyKey>,

    active_shapes: SlotMap<ShapeKey, Shape>,
    static_shapes: SlotMap<ShapeKey, Shape>,
    active_hash: SpatialHash,
    static_hash: SpatialHash,

    constraints: SlotMap<ConstraintKey, Constraint>,

    arbiters: HashMap<ArbiterKey, Arbiter>,
    /// Arbiters the narrow phase touched this step, recomputed at the
    /// start of every [`Space::step`].
    step_arbiters: Vec<ArbiterKey>,

    callbacks: HashMap<(u32, u32), CollisionHandler>,
    /// Callbacks queued by [`Space::defer`], run once per step after the
    /// solver so they never mutate the space while it's mid-iteration.
    deferred: Vec<Box<dyn FnOnce(&mut Space)>>,

    pub tuning: Tuning,
    stamp: u64,
}

impl Space {
    pub fn new(tuning: Tuning) -> Self {
        let mut bodies: SlotMap<BodyKey, Body> = SlotMap::with_key();
        let static_body = bodies.insert(Body::new_static());
        let active_hash = SpatialHash::new(tuning.active_hash_cell_size);
        let static_hash = SpatialHash::new(tuning.static_hash_cell_size);
        debug!("space constructed: {tuning:?}");
        Self {
            bodies,
            static_body,
            dynamic_bodies: Vec::new(),
            active_shapes: SlotMap::with_key(),
            static_shapes: SlotMap::with_key(),
            active_hash,
            static_hash,
            constraints: SlotMap::with_key(),
            arbiters: HashMap::new(),
            step_arbiters: Vec::new(),
            callbacks: HashMap::new(),
            deferred: Vec::new(),
            tuning,
            stamp: 0,
        }
    }

    // -- registration --------------------------------------------------

    /// The body every shape/constraint anchored to the world uses.
    pub fn static_body(&self) -> BodyKey {
        self.static_body
    }

    pub fn add_body(&mut self, body: Body) -> BodyKey {
        debug_assert!(!body.is_static(), "register a static body's shapes on space.static_body() instead");
        let key = self.bodies.insert(body);
        self.dynamic_bodies.push(key);
        debug!("body {key:?} added");
        key
    }

    pub fn remove_body(&mut self, key: BodyKey) {
        assert!(key != self.static_body, "cannot remove a space's static body");
        let pos = self
            .dynamic_bodies
            .iter()
            .position(|&k| k == key)
            .expect("removing a body not registered with this space");
        self.dynamic_bodies.swap_remove(pos);
        self.bodies.remove(key);
        debug!("body {key:?} removed");
    }

    pub fn body(&self, key: BodyKey) -> &Body {
        &self.bodies[key]
    }

    pub fn body_mut(&mut self, key: BodyKey) -> &mut Body {
        &mut self.bodies[key]
    }

    /// Visit every dynamic body (the static body is never included).
    pub fn each_body(&self, mut f: impl FnMut(BodyKey, &Body)) {
        for &key in &self.dynamic_bodies {
            f(key, &self.bodies[key]);
        }
    }

    pub fn add_shape(&mut self, mut shape: Shape, placement: ShapePlacement) -> ShapeKey {
        assert!(self.bodies.contains_key(shape.body), "a shape's body must be registered before the shape");
        let bb = shape.cache_data(&self.bodies[shape.body]);
        let key = match placement {
            ShapePlacement::Active => {
                let key = self.active_shapes.insert(shape);
                self.active_hash.insert(key, bb);
                key
            }
            ShapePlacement::Static => {
                let key = self.static_shapes.insert(shape);
                self.static_hash.insert(key, bb);
                key
            }
        };
        debug!("shape {key:?} added ({placement:?})");
        key
    }

    pub fn remove_shape(&mut self, key: ShapeKey) {
        if self.active_shapes.remove(key).is_some() {
            self.active_hash.remove(key);
        } else if self.static_shapes.remove(key).is_some() {
            self.static_hash.remove(key);
        } else {
            panic!("removing a shape not registered with this space");
        }
        self.evict_arbiters_touching(key);
        debug!("shape {key:?} removed");
    }

    pub fn active_shape(&self, key: ShapeKey) -> Option<&Shape> {
        self.active_shapes.get(key)
    }

    pub fn static_shape(&self, key: ShapeKey) -> Option<&Shape> {
        self.static_shapes.get(key)
    }

    pub fn add_constraint(&mut self, constraint: Constraint) -> ConstraintKey {
        assert!(self.bodies.contains_key(constraint.a), "constraint body a must be registered");
        assert!(self.bodies.contains_key(constraint.b), "constraint body b must be registered");
        let key = self.constraints.insert(constraint);
        debug!("constraint {key:?} added");
        key
    }

    pub fn remove_constraint(&mut self, key: ConstraintKey) {
        assert!(self.constraints.remove(key).is_some(), "removing a constraint not registered with this space");
        debug!("constraint {key:?} removed");
    }

    pub fn constraint(&self, key: ConstraintKey) -> Option<&Constraint> {
        self.constraints.get(key)
    }

    /// Register a callback pair. Replacing an existing pair is allowed
    /// but logged, since it's almost always a bug (two systems both
    /// trying to own the same collision type pair).
    pub fn add_collision_handler(&mut self, type_a: u32, type_b: u32, handler: CollisionHandler) {
        if self.callbacks.insert((type_a, type_b), handler).is_some() {
            warn!("replacing an existing collision handler for ({type_a}, {type_b})");
        }
    }

    /// Queue `f` to run once, after this (or the current) step's solver
    /// has finished, with full mutable access to the space. Use this
    /// from inside a collision callback to remove bodies/shapes rather
    /// than mutating the space directly, since the solver is still
    /// walking its containers.
    pub fn defer(&mut self, f: impl FnOnce(&mut Space) + 'static) {
        self.deferred.push(Box::new(f));
    }

    fn run_deferred(&mut self) {
        let deferred = std::mem::take(&mut self.deferred);
        for f in deferred {
            f(self);
        }
    }

    // -- queries --------------------------------------------------------

    /// Call `f` for every shape (active or static) whose cached geometry
    /// contains the world-space point `p` and passes `filter`.
    pub fn point_query(&self, p: Vec2<f64>, filter: QueryFilter, mut f: impl FnMut(ShapeKey)) {
        let probe = Aabr { min: p, max: p };
        self.active_hash.query(probe, |key| {
            if let Some(shape) = self.active_shapes.get(key) {
                if shape.matches_filter(filter) && shape.point_query(p) {
                    f(key);
                }
            }
        });
        self.static_hash.query(probe, |key| {
            if let Some(shape) = self.static_shapes.get(key) {
                if shape.matches_filter(filter) && shape.point_query(p) {
                    f(key);
                }
            }
        });
    }

    pub fn point_query_first(&self, p: Vec2<f64>, filter: QueryFilter) -> Option<ShapeKey> {
        let mut found = None;
        self.point_query(p, filter, |key| {
            if found.is_none() {
                found = Some(key);
            }
        });
        found
    }

    /// Ray cast from `a` to `b`, returning the closest hit (by
    /// parametric `t`) among active and static shapes passing `filter`.
    pub fn segment_query_first(&self, a: Vec2<f64>, b: Vec2<f64>, filter: QueryFilter) -> Option<(ShapeKey, SegmentQueryInfo)> {
        let mut best: Option<(ShapeKey, SegmentQueryInfo)> = None;
        for (key, info) in self.segment_query_all(a, b, filter) {
            if best.as_ref().map_or(true, |(_, b): &(ShapeKey, SegmentQueryInfo)| info.t < b.t) {
                best = Some((key, info));
            }
        }
        best
    }

    /// Ray cast from `a` to `b`, returning every hit among active and
    /// static shapes passing `filter`, ordered by ascending parametric
    /// `t` (closest first), the "all hits" companion to
    /// [`Space::point_query`]'s callback form.
    pub fn segment_query_all(&self, a: Vec2<f64>, b: Vec2<f64>, filter: QueryFilter) -> Vec<(ShapeKey, SegmentQueryInfo)> {
        let mut hits = Vec::new();
        let mut consider = |key: ShapeKey, shape: &Shape| {
            if shape.matches_filter(filter) {
                if let Some(info) = shape.segment_query(a, b) {
                    hits.push((key, info));
                }
            }
        };
        self.active_hash.query_segment(a, b, |key| {
            if let Some(shape) = self.active_shapes.get(key) {
                consider(key, shape);
            }
        });
        self.static_hash.query_segment(a, b, |key| {
            if let Some(shape) = self.static_shapes.get(key) {
                consider(key, shape);
            }
        });
        hits.sort_by(|a, b| a.1.t.partial_cmp(&b.1.t).unwrap());
        hits
    }

    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    pub fn arbiter_count(&self) -> usize {
        self.arbiters.len()
    }

    // -- broad/narrow phase ----------------------------------------------

    /// Enumerate every active-vs-static and active-vs-active shape pair
    /// whose cached AABBs overlap in the broad phase. Active-vs-active
    /// pairs are deduplicated by comparing slotmap key data, so each
    /// unordered pair is reported exactly once regardless of which
    /// shape's cell the other was found through.
    fn candidate_pairs(&self) -> Vec<(ShapeKey, ShapeKey)> {
        let mut pairs = Vec::new();
        for (key, shape) in self.active_shapes.iter() {
            self.static_hash.query(shape.bb, |other| pairs.push((key, other)));
        }
        for (key, shape) in self.active_shapes.iter() {
            self.active_hash.query(shape.bb, |other| {
                if other.data() > key.data() {
                    pairs.push((key, other));
                }
            });
        }
        pairs
    }

    fn collide_all(&mut self) {
        for (k1, k2) in self.candidate_pairs() {
            self.try_collide_pair(k1, k2);
        }
    }

    fn try_collide_pair(&mut self, k1: ShapeKey, k2: ShapeKey) {
        let ordered = {
            let s1 = match shape_in(&self.active_shapes, &self.static_shapes, k1) {
                Some(s) => s,
                None => return,
            };
            let s2 = match shape_in(&self.active_shapes, &self.static_shapes, k2) {
                Some(s) => s,
                None => return,
            };
            if s1.body == s2.body || !Shape::filters_allow(s1, s2) || !aabrs_overlap(s1.bb, s2.bb) {
                return;
            }
            if s1.kind() <= s2.kind() {
                (k1, k2)
            } else {
                (k2, k1)
            }
        };
        let (ka, kb) = ordered;
        let arb_key = ArbiterKey::new(ka, kb);
        let stamp = self.stamp;
        let is_new = !self.arbiters.contains_key(&arb_key);

        let touched = if is_new {
            let shape_a = match shape_in(&self.active_shapes, &self.static_shapes, ka) {
                Some(s) => s,
                None => return,
            };
            let shape_b = match shape_in(&self.active_shapes, &self.static_shapes, kb) {
                Some(s) => s,
                None => return,
            };
            match Arbiter::new(ka, shape_a, kb, shape_b, stamp) {
                Some(arb) => {
                    self.arbiters.insert(arb_key, arb);
                    true
                }
                None => false,
            }
        } else {
            let shape_a = match shape_in(&self.active_shapes, &self.static_shapes, ka) {
                Some(s) => s,
                None => return,
            };
            let shape_b = match shape_in(&self.active_shapes, &self.static_shapes, kb) {
                Some(s) => s,
                None => return,
            };
            let new_contacts = collide::dispatch(shape_a, shape_b);
            if new_contacts.is_empty() {
                false
            } else if let Some(arb) = self.arbiters.get_mut(&arb_key) {
                arb.update(new_contacts, stamp);
                true
            } else {
                false
            }
        };

        if touched {
            if is_new {
                self.fire_begin(arb_key);
            }
            self.step_arbiters.push(arb_key);
        }
    }

    fn evict_stale_arbiters(&mut self) {
        let persistence = u64::from(self.tuning.contact_persistence);
        let stamp = self.stamp;
        let stale: Vec<ArbiterKey> = self
            .arbiters
            .iter()
            .filter(|(_, arb)| stamp.saturating_sub(arb.stamp) > persistence)
            .map(|(k, _)| *k)
            .collect();
        for key in stale {
            if let Some(arb) = self.arbiters.remove(&key) {
                self.fire_separate(&arb);
            }
        }
    }

    fn evict_arbiters_touching(&mut self, shape: ShapeKey) {
        let stale: Vec<ArbiterKey> = self
            .arbiters
            .iter()
            .filter(|(k, _)| k.a == shape || k.b == shape)
            .map(|(k, _)| *k)
            .collect();
        for key in stale {
            if let Some(arb) = self.arbiters.remove(&key) {
                self.fire_separate(&arb);
            }
        }
    }

    // -- collision callbacks ----------------------------------------------

    fn collision_types(&self, arb: &Arbiter) -> Option<(u32, u32)> {
        let sa = shape_in(&self.active_shapes, &self.static_shapes, arb.a)?;
        let sb = shape_in(&self.active_shapes, &self.static_shapes, arb.b)?;
        Some((sa.collision_type, sb.collision_type))
    }

    fn handler_key(&self, ta: u32, tb: u32) -> Option<((u32, u32), bool)> {
        if self.callbacks.contains_key(&(ta, tb)) {
            Some(((ta, tb), false))
        } else if self.callbacks.contains_key(&(tb, ta)) {
            Some(((tb, ta), true))
        } else {
            None
        }
    }

    fn fire_begin(&mut self, key: ArbiterKey) {
        let (ta, tb) = match self.arbiters.get(&key).and_then(|arb| self.collision_types(arb)) {
            Some(t) => t,
            None => return,
        };
        let (hk, flipped) = match self.handler_key(ta, tb) {
            Some(v) => v,
            None => return,
        };
        let normal_coef = if flipped { -1.0 } else { 1.0 };
        if let Some(arb) = self.arbiters.get(&key) {
            let ctx = CollisionContext { arbiter: arb, normal_coef };
            if let Some(handler) = self.callbacks.get_mut(&hk) {
                if let Some(cb) = handler.begin.as_mut() {
                    cb(&ctx);
                }
            }
        }
    }

    /// Returns `true` (default, no handler registered) or the handler's
    /// verdict: `false` discards this step's contacts for the arbiter.
    fn fire_pre_solve(&mut self, key: ArbiterKey) -> bool {
        let (ta, tb) = match self.arbiters.get(&key).and_then(|arb| self.collision_types(arb)) {
            Some(t) => t,
            None => return true,
        };
        let (hk, flipped) = match self.handler_key(ta, tb) {
            Some(v) => v,
            None => return true,
        };
        let normal_coef = if flipped { -1.0 } else { 1.0 };
        match self.arbiters.get(&key) {
            Some(arb) => {
                let ctx = CollisionContext { arbiter: arb, normal_coef };
                match self.callbacks.get_mut(&hk) {
                    Some(handler) => match handler.pre_solve.as_mut() {
                        Some(cb) => cb(&ctx),
                        None => true,
                    },
                    None => true,
                }
            }
            None => true,
        }
    }

    fn fire_post_solve(&mut self, key: ArbiterKey) {
        let (ta, tb) = match self.arbiters.get(&key).and_then(|arb| self.collision_types(arb)) {
            Some(t) => t,
            None => return,
        };
        let (hk, flipped) = match self.handler_key(ta, tb) {
            Some(v) => v,
            None => return,
        };
        let normal_coef = if flipped { -1.0 } else { 1.0 };
        if let Some(arb) = self.arbiters.get(&key) {
            let ctx = CollisionContext { arbiter: arb, normal_coef };
            if let Some(handler) = self.callbacks.get_mut(&hk) {
                if let Some(cb) = handler.post_solve.as_mut() {
                    cb(&ctx);
                }
            }
        }
    }

    fn fire_separate(&mut self, arb: &Arbiter) {
        let (ta, tb) = match self.collision_types(arb) {
            Some(t) => t,
            None => return,
        };
        let (hk, flipped) = match self.handler_key(ta, tb) {
            Some(v) => v,
            None => return,
        };
        let normal_coef = if flipped { -1.0 } else { 1.0 };
        let ctx = CollisionContext { arbiter: arb, normal_coef };
        if let Some(handler) = self.callbacks.get_mut(&hk) {
            if let Some(cb) = handler.separate.as_mut() {
                cb(&ctx);
            }
        }
    }

    // -- solver plumbing --------------------------------------------------

    fn pre_step_arbiter(&mut self, key: ArbiterKey, bias_coef: f64, collision_slop: f64, dt_inv: f64) {
        let (ka, kb) = match self.arbiters.get(&key) {
            Some(arb) => (arb.a, arb.b),
            None => return,
        };
        let shape_a = match shape_in(&self.active_shapes, &self.static_shapes, ka) {
            Some(s) => s,
            None => return,
        };
        let shape_b = match shape_in(&self.active_shapes, &self.static_shapes, kb) {
            Some(s) => s,
            None => return,
        };
        let body_a = match self.bodies.get(shape_a.body) {
            Some(b) => b,
            None => return,
        };
        let body_b = match self.bodies.get(shape_b.body) {
            Some(b) => b,
            None => return,
        };
        if let Some(arb) = self.arbiters.get_mut(&key) {
            arb.pre_step(shape_a, shape_b, body_a, body_b, bias_coef, collision_slop, dt_inv);
        }
    }

    fn body_keys_of_arbiter(&self, key: ArbiterKey) -> Option<(BodyKey, BodyKey)> {
        let arb = self.arbiters.get(&key)?;
        let sa = shape_in(&self.active_shapes, &self.static_shapes, arb.a)?;
        let sb = shape_in(&self.active_shapes, &self.static_shapes, arb.b)?;
        Some((sa.body, sb.body))
    }

    fn apply_cached_arbiter_impulse(&mut self, key: ArbiterKey) {
        let (body_a_key, body_b_key) = match self.body_keys_of_arbiter(key) {
            Some(k) => k,
            None => return,
        };
        if let Some([a, b]) = self.bodies.get_disjoint_mut([body_a_key, body_b_key]) {
            if let Some(arb) = self.arbiters.get(&key) {
                arb.apply_cached_impulse(a, b);
            }
        }
    }

    fn apply_arbiter_impulse(&mut self, key: ArbiterKey, e_coef: f64) {
        let (body_a_key, body_b_key) = match self.body_keys_of_arbiter(key) {
            Some(k) => k,
            None => return,
        };
        if let Some([a, b]) = self.bodies.get_disjoint_mut([body_a_key, body_b_key]) {
            if let Some(arb) = self.arbiters.get_mut(&key) {
                arb.apply_impulse(a, b, e_coef);
            }
        }
    }

    // -- step -------------------------------------------------------------

    /// Advance the simulation by `dt` seconds. A no-op if `dt` is zero.
    ///
    /// Leapfrog order, matching the upstream engine this one is
    /// descended from: positions integrate first using last step's
    /// velocities, broad/narrow phase then runs against those *new*
    /// positions, and only then do velocities (gravity, damping, the
    /// solver) integrate for this step.
    pub fn step(&mut self, dt: f64) {
        puffin::profile_scope!("Space::step");
        if dt == 0.0 {
            return;
        }
        let dt_inv = 1.0 / dt;
        let bias_coef = self.tuning.bias_coef;
        let collision_slop = self.tuning.collision_slop;
        let gravity = self.tuning.gravity;
        let damping = self.tuning.damping;

        {
            puffin::profile_scope!("Evict stale arbiters");
            self.evict_stale_arbiters();
        }
        self.step_arbiters.clear();

        {
            puffin::profile_scope!("Integrate positions");
            for &key in &self.dynamic_bodies {
                self.bodies[key].update_position(dt);
            }
        }

        {
            puffin::profile_scope!("Refresh shape AABBs");
            for (key, shape) in self.active_shapes.iter_mut() {
                let bb = shape.cache_data(&self.bodies[shape.body]);
                self.active_hash.insert(key, bb);
            }
        }

        {
            puffin::profile_scope!("Broad + narrow phase");
            self.collide_all();
        }
        trace!("narrow phase touched {} arbiters this step", self.step_arbiters.len());

        let active_arbiters: Vec<ArbiterKey> = {
            puffin::profile_scope!("Pre-solve callbacks");
            self.step_arbiters.iter().copied().filter(|&key| self.fire_pre_solve(key)).collect()
        };

        {
            puffin::profile_scope!("Pre-step arbiters and constraints");
            for &key in &active_arbiters {
                self.pre_step_arbiter(key, bias_coef, collision_slop, dt_inv);
            }
            for (_, constraint) in self.constraints.iter_mut() {
                if let Some([a, b]) = self.bodies.get_disjoint_mut([constraint.a, constraint.b]) {
                    constraint.pre_step(a, b, dt, bias_coef);
                }
            }
        }

        {
            puffin::profile_scope!("Elastic pre-pass");
            for _ in 0..self.tuning.elastic_iterations {
                for &key in &active_arbiters {
                    self.apply_arbiter_impulse(key, 1.0);
                }
                for (_, constraint) in self.constraints.iter_mut() {
                    if let Some([a, b]) = self.bodies.get_disjoint_mut([constraint.a, constraint.b]) {
                        constraint.apply_impulse(a, b);
                    }
                }
            }
        }

        {
            puffin::profile_scope!("Integrate velocities");
            for &key in &self.dynamic_bodies {
                let body = &mut self.bodies[key];
                body.update_velocity(gravity, damping, dt);
                body.reset_forces();
            }
        }

        {
            puffin::profile_scope!("Apply cached impulses");
            for &key in &active_arbiters {
                self.apply_cached_arbiter_impulse(key);
            }
        }

        let main_e_coef = if self.tuning.elastic_iterations > 0 { 0.0 } else { 1.0 };
        {
            puffin::profile_scope!("Main solver");
            for _ in 0..self.tuning.iterations {
                for &key in &active_arbiters {
                    self.apply_arbiter_impulse(key, main_e_coef);
                }
                for (_, constraint) in self.constraints.iter_mut() {
                    if let Some([a, b]) = self.bodies.get_disjoint_mut([constraint.a, constraint.b]) {
                        constraint.apply_impulse(a, b);
                    }
                }
            }
        }

        {
            puffin::profile_scope!("Post-solve callbacks");
            for &key in &active_arbiters {
                self.fire_post_solve(key);
            }
        }

        {
            puffin::profile_scope!("Deferred callbacks");
            self.run_deferred();
        }

        self.stamp += 1;
    }
}

/// Look a shape up across both the active and static arenas, taking
/// explicit field references so the borrow checker can see this only
/// touches those two fields (unlike a `&self` method, which would
/// borrow the whole `Space` for the lifetime of the returned reference
/// and block a later disjoint mutable borrow of `self.arbiters`).
fn shape_in<'a>(active: &'a SlotMap<ShapeKey, Shape>, statics: &'a SlotMap<ShapeKey, Shape>, key: ShapeKey) -> Option<&'a Shape> {
    active.get(key).or_else(|| statics.get(key))
}

fn aabrs_overlap(a: Aabr<f64>, b: Aabr<f64>) -> bool {
    a.min.x <= b.max.x && a.max.x >= b.min.x && a.min.y <= b.max.y && a.max.y >= b.min.y
}
