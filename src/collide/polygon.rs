//! Polygon-involving collision routines: separating-axis search for the
//! reference face, then Sutherland-Hodgman clipping of the other
//! shape's incident edge against that face's side planes. A segment is
//! treated as a degenerate two-sided, two-vertex polygon so the same
//! routine handles segment-vs-polygon.

use arrayvec::ArrayVec;
use vek::Vec2;

use crate::math::Vec2Ext;
use crate::shape::{Geometry, Shape};

use super::{feature_hash, Contact, MAX_CONTACTS};

/// Find the face of `(verts, norms)` with the greatest (least negative)
/// separation from every vertex of `other`. A positive return means the
/// shapes don't overlap along that axis and therefore don't collide.
fn max_separation(verts: &[Vec2<f64>], norms: &[Vec2<f64>], other: &[Vec2<f64>]) -> (f64, usize) {
    let mut best_sep = f64::NEG_INFINITY;
    let mut best_edge = 0;
    for i in 0..verts.len() {
        let n = norms[i];
        let v = verts[i];
        let min_dot = other.iter().map(|p| n.dot(*p - v)).fold(f64::INFINITY, f64::min);
        if min_dot > best_sep {
            best_sep = min_dot;
            best_edge = i;
        }
    }
    (best_sep, best_edge)
}

/// Pick the edge of `norms` whose normal is most anti-parallel to
/// `ref_normal` — the edge most likely to be penetrating it.
fn incident_edge(ref_normal: Vec2<f64>, norms: &[Vec2<f64>]) -> usize {
    norms
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| ref_normal.dot(**a).partial_cmp(&ref_normal.dot(**b)).unwrap())
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// A point carried through clipping, tagged with a feature id for
/// warm-start hashing.
#[derive(Clone, Copy)]
struct ClipPoint {
    p: Vec2<f64>,
    feature: u32,
}

/// Clip a two-point edge against the half-plane `dot(n, p) <= offset`,
/// inserting the edge/plane intersection where exactly one endpoint
/// falls outside.
fn clip_to_plane(points: [ClipPoint; 2], n: Vec2<f64>, offset: f64, clip_feature: u32) -> ArrayVec<ClipPoint, 2> {
    let mut out = ArrayVec::new();
    let d0 = n.dot(points[0].p) - offset;
    let d1 = n.dot(points[1].p) - offset;

    if d0 <= 0.0 {
        out.push(points[0]);
    }
    if d1 <= 0.0 {
        out.push(points[1]);
    }

    if d0 * d1 < 0.0 {
        let t = d0 / (d0 - d1);
        let p = points[0].p + (points[1].p - points[0].p) * t;
        out.push(ClipPoint { p, feature: clip_feature });
    }

    out
}

/// Core face-clip collision between two convex vertex loops with
/// matching per-edge outward normals (a real [`crate::shape::Polygon`]
/// or a segment treated as a 2-gon). Returns contacts with normal
/// pointing from shape `a` to shape `b`.
#[allow(clippy::too_many_arguments)]
fn clip_faces(
    id_a: u32,
    verts_a: &[Vec2<f64>],
    norms_a: &[Vec2<f64>],
    radius_a: f64,
    id_b: u32,
    verts_b: &[Vec2<f64>],
    norms_b: &[Vec2<f64>],
    radius_b: f64,
) -> ArrayVec<Contact, MAX_CONTACTS> {
    let mut out = ArrayVec::new();
    let radius_sum = radius_a + radius_b;

    let (sep_a, edge_a) = max_separation(verts_a, norms_a, verts_b);
    if sep_a > radius_sum {
        return out;
    }
    let (sep_b, edge_b) = max_separation(verts_b, norms_b, verts_a);
    if sep_b > radius_sum {
        return out;
    }

    // Favor `a` as the reference face unless `b`'s separation is
    // meaningfully larger; avoids the reference face flip-flopping
    // between nearly-tied axes from one step to the next.
    let flip = sep_b > sep_a + 0.001;

    struct Face<'a> {
        verts: &'a [Vec2<f64>],
        norms: &'a [Vec2<f64>],
        edge: usize,
        id: u32,
        radius: f64,
    }

    let (reference, incident) = if flip {
        (
            Face { verts: verts_b, norms: norms_b, edge: edge_b, id: id_b, radius: radius_b },
            Face { verts: verts_a, norms: norms_a, edge: edge_a, id: id_a, radius: radius_a },
        )
    } else {
        (
            Face { verts: verts_a, norms: norms_a, edge: edge_a, id: id_a, radius: radius_a },
            Face { verts: verts_b, norms: norms_b, edge: edge_b, id: id_b, radius: radius_b },
        )
    };

    let ref_n = reference.norms[reference.edge];
    let ref_v1 = reference.verts[reference.edge];
    let ref_v2 = reference.verts[(reference.edge + 1) % reference.verts.len()];
    let tangent = (ref_v2 - ref_v1).normalized_or(Vec2::unit_x());

    let inc_edge = incident_edge(ref_n, incident.norms);
    let inc_v1 = incident.verts[inc_edge];
    let inc_v2 = incident.verts[(inc_edge + 1) % incident.verts.len()];

    let mut points = [
        ClipPoint { p: inc_v1, feature: inc_edge as u32 * 2 },
        ClipPoint { p: inc_v2, feature: inc_edge as u32 * 2 + 1 },
    ];

    // Clip against the reference face's two side planes.
    let neg_side = -tangent.dot(ref_v1);
    let clipped = clip_to_plane(points, -tangent, neg_side, 100 + reference.edge as u32);
    if clipped.len() < 2 {
        return out;
    }
    points = [clipped[0], clipped[1]];

    let pos_side = tangent.dot(ref_v2);
    let clipped = clip_to_plane(points, tangent, pos_side, 200 + reference.edge as u32);
    if clipped.is_empty() {
        return out;
    }

    for cp in clipped {
        let separation = ref_n.dot(cp.p - ref_v1) - radius_sum;
        if separation > 0.0 {
            continue;
        }
        let contact_point = cp.p - ref_n * incident.radius;
        let normal = if flip { -ref_n } else { ref_n };
        let hash = feature_hash(id_a, id_b, reference.edge as u32 * 1000 + cp.feature);
        out.push(Contact::new(contact_point, normal, separation, hash));
    }

    out
}

pub fn polygon_to_polygon(a: &Shape, b: &Shape) -> ArrayVec<Contact, MAX_CONTACTS> {
    let (Geometry::Polygon(pa), Geometry::Polygon(pb)) = (&a.geometry, &b.geometry) else {
        return ArrayVec::new();
    };
    clip_faces(
        a.id, &pa.t_verts, &pa.t_normals, pa.radius,
        b.id, &pb.t_verts, &pb.t_normals, pb.radius,
    )
}

pub fn segment_to_polygon(a: &Shape, b: &Shape) -> ArrayVec<Contact, MAX_CONTACTS> {
    let (Geometry::Segment(s), Geometry::Polygon(poly)) = (&a.geometry, &b.geometry) else {
        return ArrayVec::new();
    };
    let seg_verts = [s.ta, s.tb];
    let seg_norms = [s.tn, -s.tn];
    clip_faces(
        a.id, &seg_verts, &seg_norms, s.r,
        b.id, &poly.t_verts, &poly.t_normals, poly.radius,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Body;
    use crate::shape::{reset_shape_id_counter, Polygon, Segment};
    use approx::assert_relative_eq;
    use slotmap::SlotMap;

    fn key() -> crate::BodyKey {
        let mut sm: SlotMap<crate::BodyKey, ()> = SlotMap::with_key();
        sm.insert(())
    }

    #[test]
    fn stacked_boxes_produce_two_contacts_on_shared_face() {
        reset_shape_id_counter();
        let k = key();
        let mut bottom = Shape::new(k, Geometry::Polygon(Polygon::new_box(Vec2::new(1.0, 1.0), 0.0)));
        bottom.cache_data(&Body::new(1.0, 1.0));

        let mut top = Shape::new(k, Geometry::Polygon(Polygon::new_box(Vec2::new(1.0, 1.0), 0.0)));
        let mut body_top = Body::new(1.0, 1.0);
        body_top.p = Vec2::new(0.0, 1.9);
        top.cache_data(&body_top);

        let contacts = polygon_to_polygon(&bottom, &top);
        assert_eq!(contacts.len(), 2);
        for c in &contacts {
            assert_relative_eq!(c.n, Vec2::new(0.0, 1.0));
            assert!(c.dist < 0.0);
        }
    }

    #[test]
    fn separated_boxes_produce_no_contact() {
        reset_shape_id_counter();
        let k = key();
        let mut a = Shape::new(k, Geometry::Polygon(Polygon::new_box(Vec2::new(1.0, 1.0), 0.0)));
        a.cache_data(&Body::new(1.0, 1.0));
        let mut b = Shape::new(k, Geometry::Polygon(Polygon::new_box(Vec2::new(1.0, 1.0), 0.0)));
        let mut body_b = Body::new(1.0, 1.0);
        body_b.p = Vec2::new(10.0, 0.0);
        b.cache_data(&body_b);
        assert!(polygon_to_polygon(&a, &b).is_empty());
    }

    #[test]
    fn box_resting_on_floor_segment_pushes_up() {
        reset_shape_id_counter();
        let k = key();
        let mut floor = Shape::new(k, Geometry::Segment(Segment::new(Vec2::new(-10.0, 0.0), Vec2::new(10.0, 0.0), 0.0)));
        floor.cache_data(&Body::new(1.0, 1.0));

        let mut box_ = Shape::new(k, Geometry::Polygon(Polygon::new_box(Vec2::new(1.0, 1.0), 0.0)));
        let mut body = Body::new(1.0, 1.0);
        body.p = Vec2::new(0.0, 0.9);
        box_.cache_data(&body);

        let contacts = segment_to_polygon(&floor, &box_);
        assert_eq!(contacts.len(), 2);
        for c in &contacts {
            assert_relative_eq!(c.n, Vec2::new(0.0, 1.0));
        }
    }
}
