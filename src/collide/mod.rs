//! Narrow-phase: per-pair collision routines producing up to four
//! contact points, dispatched by shape kind.
//!
//! Every routine in this module and its submodules assumes its two
//! shapes are already ordered `(a, b)` with `a.kind() <= b.kind()` and
//! returns contacts whose normal points from `a` towards `b`; callers
//! (the arbiter) never need to flip anything themselves.

pub mod circle;
pub mod polygon;

use arrayvec::ArrayVec;
use vek::Vec2;

use crate::shape::{Shape, ShapeKind};

/// Maximum simultaneous contact points between a single shape pair.
/// Circle pairs ever produce one; polygon clipping produces at most two
/// per colliding edge.
pub const MAX_CONTACTS: usize = 4;

/// A single contact point produced by the narrow phase, before an
/// arbiter attaches solver accumulators to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// World-space contact point.
    pub p: Vec2<f64>,
    /// Contact normal, pointing from shape `a` to shape `b`.
    pub n: Vec2<f64>,
    /// Separation; negative when penetrating.
    pub dist: f64,
    /// Identifies which feature pair produced this contact, so an
    /// arbiter can match it against a contact from the previous step
    /// and warm-start its accumulated impulses.
    pub hash: u64,
}

impl Contact {
    pub fn new(p: Vec2<f64>, n: Vec2<f64>, dist: f64, hash: u64) -> Self {
        Self { p, n, dist, hash }
    }
}

/// Dispatch a pair of shapes to the narrow-phase routine for their kind
/// combination. `a` and `b` must already be ordered by ascending
/// [`ShapeKind`]; [`crate::arbiter::Arbiter::new`] is responsible for
/// that ordering and for flipping contacts back if it had to swap the
/// caller's shapes to achieve it.
pub fn dispatch(a: &Shape, b: &Shape) -> ArrayVec<Contact, MAX_CONTACTS> {
    debug_assert!(a.kind() <= b.kind(), "dispatch expects shapes pre-ordered by kind");

    match (a.kind(), b.kind()) {
        (ShapeKind::Circle, ShapeKind::Circle) => circle::circle_to_circle(a, b),
        (ShapeKind::Circle, ShapeKind::Segment) => circle::circle_to_segment(a, b),
        (ShapeKind::Circle, ShapeKind::Polygon) => circle::circle_to_polygon(a, b),
        (ShapeKind::Segment, ShapeKind::Segment) => ArrayVec::new(),
        (ShapeKind::Segment, ShapeKind::Polygon) => polygon::segment_to_polygon(a, b),
        (ShapeKind::Polygon, ShapeKind::Polygon) => polygon::polygon_to_polygon(a, b),
        _ => unreachable!("shapes must be pre-ordered: a.kind() <= b.kind()"),
    }
}

/// Pack two shape ids and a small per-pair feature index into a single
/// hash, the same role `cpContact::hash` plays upstream: stable across
/// steps as long as the same feature of the same two shapes is involved,
/// so an arbiter can warm-start the matching contact.
pub(crate) fn feature_hash(id_a: u32, id_b: u32, feature: u32) -> u64 {
    ((id_a as u64) << 40) ^ ((id_b as u64) << 16) ^ feature as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Body;
    use crate::shape::{reset_shape_id_counter, Circle, Geometry, Polygon, Segment};
    use slotmap::SlotMap;

    fn key() -> crate::BodyKey {
        let mut sm: SlotMap<crate::BodyKey, ()> = SlotMap::with_key();
        sm.insert(())
    }

    #[test]
    fn dispatch_orders_normal_from_a_to_b_for_every_pair() {
        reset_shape_id_counter();
        let k = key();
        let body_a = Body::new(1.0, 1.0);
        let mut body_b = Body::new(1.0, 1.0);
        body_b.p = Vec2::new(1.5, 0.0);

        let mut circle_a = Shape::new(k, Geometry::Circle(Circle { c: Vec2::zero(), r: 1.0, tc: Vec2::zero() }));
        let mut circle_b = Shape::new(k, Geometry::Circle(Circle { c: Vec2::zero(), r: 1.0, tc: Vec2::zero() }));
        circle_a.cache_data(&body_a);
        circle_b.cache_data(&body_b);
        let contacts = dispatch(&circle_a, &circle_b);
        assert_eq!(contacts.len(), 1);
        assert!(contacts[0].n.x > 0.0, "normal must point from a toward b");

        let mut seg = Shape::new(k, Geometry::Segment(Segment::new(Vec2::new(-5.0, -0.5), Vec2::new(5.0, -0.5), 0.0)));
        seg.cache_data(&body_a);
        let mut circle_on_seg = Shape::new(k, Geometry::Circle(Circle { c: Vec2::zero(), r: 1.0, tc: Vec2::zero() }));
        let mut body_above = Body::new(1.0, 1.0);
        body_above.p = Vec2::new(0.0, 0.4);
        circle_on_seg.cache_data(&body_above);
        let contacts = dispatch(&circle_on_seg, &seg);
        if !contacts.is_empty() {
            assert!(contacts[0].n.y < 0.0, "circle above the segment should push down into it, from a to b");
        }

        let mut poly = Shape::new(k, Geometry::Polygon(Polygon::new_box(Vec2::new(1.0, 1.0), 0.0)));
        poly.cache_data(&body_a);
        let mut circle_on_poly = Shape::new(k, Geometry::Circle(Circle { c: Vec2::zero(), r: 0.5, tc: Vec2::zero() }));
        let mut body_touch = Body::new(1.0, 1.0);
        body_touch.p = Vec2::new(1.2, 0.0);
        circle_on_poly.cache_data(&body_touch);
        let contacts = dispatch(&circle_on_poly, &poly);
        if !contacts.is_empty() {
            assert!(contacts[0].n.x < 0.0, "circle to the right of the polygon should push left into it, from a to b");
        }
    }

    #[test]
    fn feature_hash_distinguishes_shapes_and_features() {
        assert_ne!(feature_hash(1, 2, 0), feature_hash(1, 2, 1));
        assert_ne!(feature_hash(1, 2, 0), feature_hash(1, 3, 0));
    }
}
