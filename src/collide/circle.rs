//! Collision routines for a circle shape against circles, segments, and
//! polygons. These all reduce to the same closest-point-then-compare-to-
//! the-sum-of-radii test.

use arrayvec::ArrayVec;

use crate::math::Vec2Ext;
use crate::shape::{Geometry, Shape};

use super::{feature_hash, Contact, MAX_CONTACTS};

pub fn circle_to_circle(a: &Shape, b: &Shape) -> ArrayVec<Contact, MAX_CONTACTS> {
    let mut out = ArrayVec::new();
    let (Geometry::Circle(ca), Geometry::Circle(cb)) = (&a.geometry, &b.geometry) else {
        return out;
    };

    let delta = cb.tc - ca.tc;
    let dist_sq = delta.magnitude_squared();
    let r_sum = ca.r + cb.r;
    if dist_sq >= r_sum * r_sum {
        return out;
    }

    let dist = dist_sq.sqrt();
    let n = if dist > f64::EPSILON { delta / dist } else { vek::Vec2::unit_x() };
    let p = ca.tc + n * ca.r;
    out.push(Contact::new(p, n, dist - r_sum, feature_hash(a.id, b.id, 0)));
    out
}

pub fn circle_to_segment(a: &Shape, b: &Shape) -> ArrayVec<Contact, MAX_CONTACTS> {
    let mut out = ArrayVec::new();
    let (Geometry::Circle(c), Geometry::Segment(s)) = (&a.geometry, &b.geometry) else {
        return out;
    };

    // Closest point on the segment (including its rounded endpoints) to
    // the circle center, found the same way `cpSegmentShapePointQuery`
    // picks a feature: normal distance from the line, then clamp along
    // the segment's length.
    let dn = s.tn.dot(c.tc) - s.tn.dot(s.ta);
    let edge_vec = s.tb - s.ta;
    let t = (c.tc - s.ta).dot(edge_vec) / edge_vec.magnitude_squared().max(f64::EPSILON);
    let t = t.clamp(0.0, 1.0);
    let closest = s.ta + edge_vec * t;

    let delta = c.tc - closest;
    let dist_sq = delta.magnitude_squared();
    let r_sum = c.r + s.r;
    if dist_sq >= r_sum * r_sum {
        return out;
    }

    let dist = dist_sq.sqrt();
    let n = if dist > f64::EPSILON {
        delta / dist
    } else if dn >= 0.0 {
        s.tn
    } else {
        -s.tn
    };
    // `n` above points from the segment's closest point toward the
    // circle center; the stored contact normal must point the other way
    // (from `a`, the circle, to `b`, the segment) to match the solver's
    // non-negative accumulated-impulse convention.
    let p = c.tc - n * c.r;
    out.push(Contact::new(p, -n, dist - r_sum, feature_hash(a.id, b.id, 0)));
    out
}

pub fn circle_to_polygon(a: &Shape, b: &Shape) -> ArrayVec<Contact, MAX_CONTACTS> {
    let mut out = ArrayVec::new();
    let (Geometry::Circle(c), Geometry::Polygon(poly)) = (&a.geometry, &b.geometry) else {
        return out;
    };

    // Find the edge the circle center is furthest outside of (or, if
    // inside every edge, the least-penetrating one).
    let mut best_dist = f64::NEG_INFINITY;
    let mut best_edge = 0usize;
    for (i, (v, n)) in poly.t_verts.iter().zip(poly.t_normals.iter()).enumerate() {
        let d = n.dot(c.tc - *v);
        if d > best_dist {
            best_dist = d;
            best_edge = i;
        }
    }

    let r_sum = c.r + poly.radius;
    if best_dist > r_sum {
        return out;
    }

    let v1 = poly.t_verts[best_edge];
    let v2 = poly.t_verts[(best_edge + 1) % poly.t_verts.len()];
    let n = poly.t_normals[best_edge];

    if best_dist < 0.0 {
        // Center is inside the polygon: push out along the best edge's
        // normal, there's no vertex-region case to worry about. The
        // contact point sits on the circle's boundary on the escaping
        // side, and the stored normal points from the circle (`a`) to
        // the polygon (`b`), opposite the edge's own outward normal.
        let p = c.tc + n * c.r;
        out.push(Contact::new(p, -n, best_dist - r_sum, feature_hash(a.id, b.id, best_edge as u32)));
        return out;
    }

    // Center is outside; decide whether it's closest to the edge face
    // or to one of its two vertices.
    let edge = v2 - v1;
    let t = (c.tc - v1).dot(edge) / edge.magnitude_squared().max(f64::EPSILON);

    let (closest, normal) = if t < 0.0 {
        (v1, (c.tc - v1).normalized_or(n))
    } else if t > 1.0 {
        (v2, (c.tc - v2).normalized_or(n))
    } else {
        (v1 + edge * t, n)
    };

    let delta = c.tc - closest;
    let dist = delta.magnitude();
    if dist >= r_sum {
        return out;
    }

    // `normal` here points from the polygon's (possibly rounded) surface
    // toward the circle; flip it to match the solver's `a`-to-`b` contract.
    let p = closest + normal * poly.radius;
    out.push(Contact::new(p, -normal, dist - r_sum, feature_hash(a.id, b.id, best_edge as u32)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Body;
    use crate::shape::{reset_shape_id_counter, Circle, Polygon, Segment};
    use approx::assert_relative_eq;
    use slotmap::SlotMap;
    use vek::Vec2;

    fn key() -> crate::BodyKey {
        let mut sm: SlotMap<crate::BodyKey, ()> = SlotMap::with_key();
        sm.insert(())
    }

    #[test]
    fn circles_just_touching_produce_zero_separation() {
        reset_shape_id_counter();
        let k = key();
        let mut a = Shape::new(k, Geometry::Circle(Circle { c: Vec2::zero(), r: 1.0, tc: Vec2::zero() }));
        let mut b = Shape::new(k, Geometry::Circle(Circle { c: Vec2::zero(), r: 1.0, tc: Vec2::zero() }));
        a.cache_data(&Body::new(1.0, 1.0));
        let mut body_b = Body::new(1.0, 1.0);
        body_b.p = Vec2::new(1.9, 0.0);
        b.cache_data(&body_b);

        let contacts = circle_to_circle(&a, &b);
        assert_eq!(contacts.len(), 1);
        assert_relative_eq!(contacts[0].n, Vec2::new(1.0, 0.0));
        assert!(contacts[0].dist < 0.0);
    }

    #[test]
    fn circles_far_apart_produce_no_contact() {
        reset_shape_id_counter();
        let k = key();
        let mut a = Shape::new(k, Geometry::Circle(Circle { c: Vec2::zero(), r: 1.0, tc: Vec2::zero() }));
        let mut b = Shape::new(k, Geometry::Circle(Circle { c: Vec2::zero(), r: 1.0, tc: Vec2::zero() }));
        a.cache_data(&Body::new(1.0, 1.0));
        let mut body_b = Body::new(1.0, 1.0);
        body_b.p = Vec2::new(10.0, 0.0);
        b.cache_data(&body_b);
        assert!(circle_to_circle(&a, &b).is_empty());
    }

    #[test]
    fn circle_resting_on_segment_normal_points_down_into_the_floor() {
        reset_shape_id_counter();
        let k = key();
        let mut floor = Shape::new(k, Geometry::Segment(Segment::new(Vec2::new(-10.0, 0.0), Vec2::new(10.0, 0.0), 0.0)));
        floor.cache_data(&Body::new(1.0, 1.0));
        let mut ball = Shape::new(k, Geometry::Circle(Circle { c: Vec2::zero(), r: 1.0, tc: Vec2::zero() }));
        let mut body = Body::new(1.0, 1.0);
        body.p = Vec2::new(0.0, 0.9);
        ball.cache_data(&body);

        let contacts = circle_to_segment(&ball, &floor);
        assert_eq!(contacts.len(), 1);
        assert_relative_eq!(contacts[0].n, Vec2::new(0.0, -1.0));
        assert_relative_eq!(contacts[0].dist, -0.1, epsilon = 1e-9);
    }

    #[test]
    fn circle_vs_box_face_contact() {
        reset_shape_id_counter();
        let k = key();
        let mut poly = Shape::new(k, Geometry::Polygon(Polygon::new_box(Vec2::new(1.0, 1.0), 0.0)));
        poly.cache_data(&Body::new(1.0, 1.0));
        let mut ball = Shape::new(k, Geometry::Circle(Circle { c: Vec2::zero(), r: 0.5, tc: Vec2::zero() }));
        let mut body = Body::new(1.0, 1.0);
        body.p = Vec2::new(1.2, 0.0);
        ball.cache_data(&body);

        let contacts = circle_to_polygon(&ball, &poly);
        assert_eq!(contacts.len(), 1);
        assert_relative_eq!(contacts[0].n, Vec2::new(-1.0, 0.0));
    }

    #[test]
    fn circle_vs_box_corner_contact() {
        reset_shape_id_counter();
        let k = key();
        let mut poly = Shape::new(k, Geometry::Polygon(Polygon::new_box(Vec2::new(1.0, 1.0), 0.0)));
        poly.cache_data(&Body::new(1.0, 1.0));
        let mut ball = Shape::new(k, Geometry::Circle(Circle { c: Vec2::zero(), r: 0.5, tc: Vec2::zero() }));
        let mut body = Body::new(1.0, 1.0);
        body.p = Vec2::new(1.3, 1.3);
        ball.cache_data(&body);

        let contacts = circle_to_polygon(&ball, &poly);
        assert_eq!(contacts.len(), 1);
        let expected = Vec2::new(-1.0, -1.0).normalized();
        assert_relative_eq!(contacts[0].n, expected, epsilon = 1e-9);
    }
}
