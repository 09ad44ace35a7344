//! Collision shapes attached to a body: circles, segments, and convex
//! polygons, each with cached world-space geometry refreshed once per
//! step by [`Shape::cache_data`].

use std::sync::atomic::{AtomicU32, Ordering};

use arrayvec::ArrayVec;
use vek::{Aabr, Vec2};

use crate::body::Body;
use crate::math::Vec2Ext;
use crate::BodyKey;

/// Maximum vertex count for a [`Shape::Polygon`]. Four is already enough
/// for every shape a 2D game actually needs (boxes, ramps); raising it
/// only costs more per-contact work in the narrow phase.
pub const MAX_POLYGON_VERTICES: usize = 8;

static SHAPE_ID_COUNTER: AtomicU32 = AtomicU32::new(0);

fn next_shape_id() -> u32 {
    SHAPE_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Reset the process-wide shape id counter back to zero.
///
/// Shape ids feed the contact hash that drives warm starting; tests that
/// want byte-identical arbiter hashes across runs call this before
/// constructing any shapes.
pub fn reset_shape_id_counter() {
    SHAPE_ID_COUNTER.store(0, Ordering::Relaxed);
}

/// Which concrete geometry a [`Shape`] holds. Kept as a cheap tag so
/// narrow-phase dispatch can order a pair by kind without matching on
/// the full shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ShapeKind {
    Circle,
    Segment,
    Polygon,
}

/// A circle shape, defined by a local-space center and a radius.
#[derive(Debug, Clone)]
pub struct Circle {
    pub c: Vec2<f64>,
    pub r: f64,
    /// World-space center, refreshed by [`Shape::cache_data`].
    pub tc: Vec2<f64>,
}

/// A segment shape, defined by two local-space endpoints and a radius
/// (the segment is effectively a capsule of that radius).
#[derive(Debug, Clone)]
pub struct Segment {
    pub a: Vec2<f64>,
    pub b: Vec2<f64>,
    pub r: f64,
    /// Local-space normal, perpendicular to `b - a`.
    pub n: Vec2<f64>,
    /// World-space endpoints/normal, refreshed by [`Shape::cache_data`].
    pub ta: Vec2<f64>,
    pub tb: Vec2<f64>,
    pub tn: Vec2<f64>,
}

impl Segment {
    pub fn new(a: Vec2<f64>, b: Vec2<f64>, r: f64) -> Self {
        let n = (b - a).normalized_or(Vec2::unit_x()).perp();
        Self { a, b, r, n, ta: a, tb: b, tn: n }
    }
}

/// A convex polygon shape, defined by local-space vertices in
/// counter-clockwise winding order plus their outward edge normals.
#[derive(Debug, Clone)]
pub struct Polygon {
    pub verts: ArrayVec<Vec2<f64>, MAX_POLYGON_VERTICES>,
    pub normals: ArrayVec<Vec2<f64>, MAX_POLYGON_VERTICES>,
    pub radius: f64,
    /// World-space vertices/normals, refreshed by [`Shape::cache_data`].
    pub t_verts: ArrayVec<Vec2<f64>, MAX_POLYGON_VERTICES>,
    pub t_normals: ArrayVec<Vec2<f64>, MAX_POLYGON_VERTICES>,
}

impl Polygon {
    /// Build from counter-clockwise vertices, deriving outward edge
    /// normals automatically.
    pub fn new(verts: impl IntoIterator<Item = Vec2<f64>>, radius: f64) -> Self {
        let verts: ArrayVec<Vec2<f64>, MAX_POLYGON_VERTICES> = verts.into_iter().collect();
        debug_assert!(verts.len() >= 3, "a polygon needs at least 3 vertices");
        let mut normals = ArrayVec::new();
        for i in 0..verts.len() {
            let a = verts[i];
            let b = verts[(i + 1) % verts.len()];
            normals.push((b - a).normalized_or(Vec2::unit_x()).neg_perp_fix());
        }
        let t_verts = verts.clone();
        let t_normals = normals.clone();
        Self { verts, normals, radius, t_verts, t_normals }
    }

    /// Axis-aligned box centered on the origin.
    pub fn new_box(half_extents: Vec2<f64>, radius: f64) -> Self {
        let hx = half_extents.x;
        let hy = half_extents.y;
        Self::new(
            [
                Vec2::new(-hx, -hy),
                Vec2::new(hx, -hy),
                Vec2::new(hx, hy),
                Vec2::new(-hx, hy),
            ],
            radius,
        )
    }
}

/// Internal helper: `perp()` (in [`crate::math`]) rotates a vector 90°
/// counter-clockwise, which for a counter-clockwise-wound edge points
/// inward. The outward normal of a CCW edge is the 90° clockwise
/// rotation instead, which this computes directly (not as `perp()`
/// undone, which would just return the edge vector itself).
trait NegPerpFix {
    fn neg_perp_fix(self) -> Self;
}

impl NegPerpFix for Vec2<f64> {
    fn neg_perp_fix(self) -> Self {
        Vec2::new(self.y, -self.x)
    }
}

/// Shape geometry, tagged by variant.
#[derive(Debug, Clone)]
pub enum Geometry {
    Circle(Circle),
    Segment(Segment),
    Polygon(Polygon),
}

impl Geometry {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Geometry::Circle(_) => ShapeKind::Circle,
            Geometry::Segment(_) => ShapeKind::Segment,
            Geometry::Polygon(_) => ShapeKind::Polygon,
        }
    }
}

/// A collision shape attached to a body.
#[derive(Debug, Clone)]
pub struct Shape {
    pub geometry: Geometry,

    /// Body this shape moves with.
    pub body: BodyKey,
    /// Process-wide unique id, assigned at construction; feeds contact
    /// hashing alongside the shape's generation in its slotmap key.
    pub id: u32,

    /// Coefficient of restitution (bounciness), combined multiplicatively
    /// with the other shape's on contact.
    pub e: f64,
    /// Coefficient of friction, combined multiplicatively with the other
    /// shape's on contact.
    pub u: f64,
    /// Surface velocity, for conveyor-belt style friction.
    pub surface_velocity: Vec2<f64>,

    /// Application-defined collision type, used to look up per-pair
    /// collision callbacks.
    pub collision_type: u32,
    /// Application-defined group; shapes sharing a nonzero group never
    /// collide with each other regardless of layer.
    pub group: u32,
    /// Bitmask; two shapes only collide if `a.layers & b.layers != 0`.
    pub layers: u32,

    /// Cached world-space bounding box, refreshed by [`Shape::cache_data`].
    pub bb: Aabr<f64>,
}

/// Group/layer filter for `Space`'s point and segment queries, using the
/// same rule [`Shape::filters_allow`] applies between two shapes. The
/// default allows everything (no group, every layer).
#[derive(Debug, Clone, Copy)]
pub struct QueryFilter {
    pub group: u32,
    pub layers: u32,
}

impl Default for QueryFilter {
    fn default() -> Self {
        Self { group: 0, layers: u32::MAX }
    }
}

impl Shape {
    pub fn new(body: BodyKey, geometry: Geometry) -> Self {
        Self {
            geometry,
            body,
            id: next_shape_id(),
            e: 0.0,
            u: 0.0,
            surface_velocity: Vec2::zero(),
            collision_type: 0,
            group: 0,
            layers: u32::MAX,
            bb: Aabr { min: Vec2::zero(), max: Vec2::zero() },
        }
    }

    pub fn kind(&self) -> ShapeKind {
        self.geometry.kind()
    }

    /// Whether two shapes are allowed to collide at all, ignoring
    /// geometry: same nonzero group excludes, disjoint layer masks
    /// exclude, a shape never collides with itself.
    pub fn filters_allow(a: &Shape, b: &Shape) -> bool {
        if a.group != 0 && a.group == b.group {
            return false;
        }
        (a.layers & b.layers) != 0
    }

    /// Same rule as [`Shape::filters_allow`], against a caller-supplied
    /// [`QueryFilter`] instead of a second shape; used by `Space`'s
    /// point/segment query API.
    pub fn matches_filter(&self, filter: QueryFilter) -> bool {
        if filter.group != 0 && filter.group == self.group {
            return false;
        }
        (filter.layers & self.layers) != 0
    }

    /// Recompute world-space geometry and the cached bounding box from
    /// the owning body's current position and rotation. Called once per
    /// step before broad/narrow phase.
    pub fn cache_data(&mut self, body: &Body) -> Aabr<f64> {
        let p = body.p;
        let rot = body.rotation();
        self.bb = match &mut self.geometry {
            Geometry::Circle(c) => {
                c.tc = p + rot.rotate(c.c);
                Aabr {
                    min: Vec2::new(c.tc.x - c.r, c.tc.y - c.r),
                    max: Vec2::new(c.tc.x + c.r, c.tc.y + c.r),
                }
            }
            Geometry::Segment(s) => {
                s.ta = p + rot.rotate(s.a);
                s.tb = p + rot.rotate(s.b);
                s.tn = rot.rotate(s.n);
                let (l, r) = if s.ta.x < s.tb.x { (s.ta.x, s.tb.x) } else { (s.tb.x, s.ta.x) };
                let (bo, t) = if s.ta.y < s.tb.y { (s.ta.y, s.tb.y) } else { (s.tb.y, s.ta.y) };
                Aabr {
                    min: Vec2::new(l - s.r, bo - s.r),
                    max: Vec2::new(r + s.r, t + s.r),
                }
            }
            Geometry::Polygon(poly) => {
                poly.t_verts.clear();
                poly.t_normals.clear();
                let mut min = Vec2::new(f64::INFINITY, f64::INFINITY);
                let mut max = Vec2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
                for v in &poly.verts {
                    let tv = p + rot.rotate(*v);
                    min = Vec2::new(min.x.min(tv.x), min.y.min(tv.y));
                    max = Vec2::new(max.x.max(tv.x), max.y.max(tv.y));
                    poly.t_verts.push(tv);
                }
                for n in &poly.normals {
                    poly.t_normals.push(rot.rotate(*n));
                }
                let rad = poly.radius;
                Aabr {
                    min: Vec2::new(min.x - rad, min.y - rad),
                    max: Vec2::new(max.x + rad, max.y + rad),
                }
            }
        };
        self.bb
    }

    /// Whether a world-space point lies inside (or within a capsule
    /// shape's radius of) this shape's cached geometry.
    pub fn point_query(&self, p: Vec2<f64>) -> bool {
        match &self.geometry {
            Geometry::Circle(c) => (c.tc - p).magnitude_squared() < c.r * c.r,
            Geometry::Segment(s) => segment_point_query(s, p),
            Geometry::Polygon(poly) => polygon_point_query(poly, p),
        }
    }
}

/// `cpSegmentShapePointQuery`'s decision tree: split into tangential
/// distance along the segment vs. normal distance from its line, so
/// the capsule rounds off at the endpoints instead of extending the
/// flat sides forever.
fn segment_point_query(s: &Segment, p: Vec2<f64>) -> bool {
    let dn = s.tn.dot(p) - s.tn.dot(s.ta);
    let dist = dn.abs() - s.r;
    if dist > 0.0 {
        return false;
    }

    let dt = -s.tn.cross(p);
    let dt_min = -s.tn.cross(s.ta);
    let dt_max = -s.tn.cross(s.tb);

    if dt <= dt_min {
        if dt < dt_min - s.r {
            false
        } else {
            (s.ta - p).magnitude_squared() < s.r * s.r
        }
    } else if dt < dt_max {
        true
    } else if dt < dt_max + s.r {
        (s.tb - p).magnitude_squared() < s.r * s.r
    } else {
        false
    }
}

fn polygon_point_query(poly: &Polygon, p: Vec2<f64>) -> bool {
    for (v, n) in poly.t_verts.iter().zip(poly.t_normals.iter()) {
        if n.dot(p - *v) > poly.radius {
            return false;
        }
    }
    true
}

/// Result of a ray cast against a single shape.
#[derive(Debug, Clone, Copy)]
pub struct SegmentQueryInfo {
    /// Parametric hit distance along the ray, in `[0, 1]`.
    pub t: f64,
    /// World-space hit point.
    pub point: Vec2<f64>,
    /// Surface normal at the hit point.
    pub n: Vec2<f64>,
}

impl Shape {
    /// Ray cast from `a` to `b` against this shape's cached geometry.
    /// Only implemented for circle and segment shapes.
    pub fn segment_query(&self, a: Vec2<f64>, b: Vec2<f64>) -> Option<SegmentQueryInfo> {
        match &self.geometry {
            Geometry::Circle(c) => circle_segment_query(c, a, b),
            Geometry::Segment(s) => segment_segment_query(s, a, b),
            Geometry::Polygon(p) => polygon_segment_query(p, a, b),
        }
    }
}

fn circle_segment_query(c: &Circle, a: Vec2<f64>, b: Vec2<f64>) -> Option<SegmentQueryInfo> {
    let a = a - c.tc;
    let b = b - c.tc;

    let qa = a.dot(a) - 2.0 * a.dot(b) + b.dot(b);
    let qb = -2.0 * a.dot(a) + 2.0 * a.dot(b);
    let qc = a.dot(a) - c.r * c.r;

    let det = qb * qb - 4.0 * qa * qc;
    if det < 0.0 {
        return None;
    }

    let t = (-qb - det.sqrt()) / (2.0 * qa);
    if (0.0..=1.0).contains(&t) {
        let point = c.tc + a + (b - a) * t;
        let n = (point - c.tc).normalized_or(Vec2::unit_x());
        Some(SegmentQueryInfo { t, point, n })
    } else {
        None
    }
}

/// Segment-vs-segment ray casting isn't implemented; two line capsules
/// crossing in a ray cast is a rare query this crate doesn't need yet.
fn segment_segment_query(_s: &Segment, _a: Vec2<f64>, _b: Vec2<f64>) -> Option<SegmentQueryInfo> {
    None
}

/// Slab test against each face plane, the `cpPolyShapeSegmentQuery`
/// approach: shrink the valid `t` range to where the ray is inside
/// every face's half-plane, tracking which entering face pinned the
/// lower bound. Each face plane is offset outward by the polygon's
/// corner radius, so a rounded polygon's flat sides are accounted for;
/// the rounded corners themselves aren't, the same gap
/// `segment_segment_query` has for capsule endpoints.
fn polygon_segment_query(poly: &Polygon, a: Vec2<f64>, b: Vec2<f64>) -> Option<SegmentQueryInfo> {
    let d = b - a;
    let mut t_enter = 0.0;
    let mut t_exit = 1.0;
    let mut enter_normal = Vec2::zero();

    for (v, n) in poly.t_verts.iter().zip(poly.t_normals.iter()) {
        let plane_d = n.dot(*v) + poly.radius;
        let denom = n.dot(d);
        let dist = n.dot(a) - plane_d;

        if denom.abs() < f64::EPSILON {
            if dist > 0.0 {
                return None;
            }
            continue;
        }

        let t = -dist / denom;
        if denom < 0.0 {
            if t > t_enter {
                t_enter = t;
                enter_normal = *n;
            }
        } else if t < t_exit {
            t_exit = t;
        }

        if t_enter > t_exit {
            return None;
        }
    }

    if t_enter > 0.0 && t_enter <= 1.0 {
        let point = a + d * t_enter;
        Some(SegmentQueryInfo { t: t_enter, point, n: enter_normal })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Body;
    use approx::assert_relative_eq;
    use slotmap::SlotMap;

    fn dummy_body_key() -> BodyKey {
        let mut sm: SlotMap<BodyKey, ()> = SlotMap::with_key();
        sm.insert(())
    }

    #[test]
    fn circle_cache_data_tracks_body_position() {
        let key = dummy_body_key();
        let mut shape = Shape::new(key, Geometry::Circle(Circle { c: Vec2::zero(), r: 1.0, tc: Vec2::zero() }));
        let mut body = Body::new(1.0, 1.0);
        body.p = Vec2::new(5.0, 5.0);
        shape.cache_data(&body);
        assert_eq!(shape.bb.min, Vec2::new(4.0, 4.0));
        assert_eq!(shape.bb.max, Vec2::new(6.0, 6.0));
    }

    #[test]
    fn circle_point_query() {
        let key = dummy_body_key();
        let mut shape = Shape::new(key, Geometry::Circle(Circle { c: Vec2::zero(), r: 2.0, tc: Vec2::zero() }));
        shape.cache_data(&Body::new(1.0, 1.0));
        assert!(shape.point_query(Vec2::new(1.0, 1.0)));
        assert!(!shape.point_query(Vec2::new(5.0, 5.0)));
    }

    #[test]
    fn segment_point_query_rounds_endpoints() {
        let seg = Segment::new(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0), 0.25);
        assert!(segment_point_query(&seg, Vec2::new(0.0, 0.1)));
        assert!(segment_point_query(&seg, Vec2::new(1.1, 0.1)));
        assert!(!segment_point_query(&seg, Vec2::new(2.0, 2.0)));
    }

    #[test]
    fn polygon_box_point_query() {
        let poly = Polygon::new_box(Vec2::new(1.0, 1.0), 0.0);
        assert!(polygon_point_query(&poly, Vec2::new(0.5, 0.5)));
        assert!(!polygon_point_query(&poly, Vec2::new(2.0, 0.0)));
    }

    #[test]
    fn filters_allow_rejects_shared_nonzero_group() {
        let key = dummy_body_key();
        let mut a = Shape::new(key, Geometry::Circle(Circle { c: Vec2::zero(), r: 1.0, tc: Vec2::zero() }));
        let mut b = Shape::new(key, Geometry::Circle(Circle { c: Vec2::zero(), r: 1.0, tc: Vec2::zero() }));
        a.group = 7;
        b.group = 7;
        assert!(!Shape::filters_allow(&a, &b));
        b.group = 0;
        assert!(Shape::filters_allow(&a, &b));
    }

    #[test]
    fn polygon_segment_query_hits_near_face_and_reports_its_normal() {
        let poly = Polygon::new_box(Vec2::new(1.0, 1.0), 0.0);
        let info = polygon_segment_query(&poly, Vec2::new(-5.0, 0.0), Vec2::new(5.0, 0.0)).unwrap();
        assert_relative_eq!(info.point.x, -1.0, epsilon = 1e-9);
        assert_relative_eq!(info.n, Vec2::new(-1.0, 0.0), epsilon = 1e-9);
    }

    #[test]
    fn polygon_segment_query_misses_a_ray_that_passes_by() {
        let poly = Polygon::new_box(Vec2::new(1.0, 1.0), 0.0);
        assert!(polygon_segment_query(&poly, Vec2::new(-5.0, 5.0), Vec2::new(5.0, 5.0)).is_none());
    }

    #[test]
    fn circle_segment_query_hits_front_face() {
        let mut c = Circle { c: Vec2::zero(), r: 1.0, tc: Vec2::zero() };
        c.tc = Vec2::new(5.0, 0.0);
        let info = circle_segment_query(&c, Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0)).unwrap();
        assert_relative_eq!(info.point.x, 4.0, epsilon = 1e-9);
    }

    #[test]
    fn shape_ids_are_unique_and_reset() {
        reset_shape_id_counter();
        let key = dummy_body_key();
        let a = Shape::new(key, Geometry::Circle(Circle { c: Vec2::zero(), r: 1.0, tc: Vec2::zero() }));
        let b = Shape::new(key, Geometry::Circle(Circle { c: Vec2::zero(), r: 1.0, tc: Vec2::zero() }));
        assert_ne!(a.id, b.id);
        reset_shape_id_counter();
        let c = Shape::new(key, Geometry::Circle(Circle { c: Vec2::zero(), r: 1.0, tc: Vec2::zero() }));
        assert_eq!(c.id, a.id);
    }
}
