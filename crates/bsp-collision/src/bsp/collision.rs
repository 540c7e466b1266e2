//! Line segment and swept sphere queries against a BSP tree.
//!
//! Both query families walk the tree by classifying the start and end of
//! the movement against each node plane. Children on the far side of a
//! plane are skipped when the movement cannot reach them; polygons at a
//! node are tested when the movement touches the plane band or the node
//! is a leaf.
//!
//! Positions along the movement are expressed as the parameter `t` of
//! `start + delta * t`.

use std::sync::atomic::{AtomicU64, Ordering};

use nalgebra::{Point3, Vector3};

use crate::intersect::{line_cylinder, line_plane, line_sphere};
use crate::{PolygonRef, PLANE_THICKNESS};

use super::node::NodeRef;

/// Edges shorter than this are skipped by the sphere edge test.
const MIN_EDGE_LENGTH: f32 = 1e-12;

static LINE_POLYGON_TESTS: AtomicU64 = AtomicU64::new(0);
static SPHERE_POLYGON_TESTS: AtomicU64 = AtomicU64::new(0);

/// Process-wide counters of polygon tests run by the queries.
///
/// Only meant for diagnostics; the counters are shared by every tree and
/// thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollisionStatistics {
    /// Number of segment vs. polygon tests.
    pub line_polygon_tests: u64,
    /// Number of swept sphere vs. polygon tests.
    pub moving_sphere_polygon_tests: u64,
}

/// Returns the current counter values.
pub fn statistics() -> CollisionStatistics {
    CollisionStatistics {
        line_polygon_tests: LINE_POLYGON_TESTS.load(Ordering::Relaxed),
        moving_sphere_polygon_tests: SPHERE_POLYGON_TESTS.load(Ordering::Relaxed),
    }
}

/// Sets both counters back to zero.
pub fn reset_statistics() {
    LINE_POLYGON_TESTS.store(0, Ordering::Relaxed);
    SPHERE_POLYGON_TESTS.store(0, Ordering::Relaxed);
}

/// A segment hit: the position along the segment and the polygon hit.
#[derive(Debug, Clone, Copy)]
pub struct LineHit<'a> {
    pub t: f32,
    pub polygon: PolygonRef<'a>,
}

/// A swept sphere contact.
#[derive(Debug, Clone, Copy)]
pub struct SphereHit<'a> {
    /// Position of the sphere center along the movement at first contact.
    pub t: f32,
    pub polygon: PolygonRef<'a>,
    /// Contact normal, pointing from the polygon towards the sphere center.
    pub normal: Vector3<f32>,
    /// Contact point on the polygon.
    pub point: Point3<f32>,
}

/// Which end of the segment the search optimizes for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HitOrder {
    First,
    Last,
}

impl HitOrder {
    #[inline]
    fn improves(self, u: f32, t: f32) -> bool {
        match self {
            Self::First => u < t,
            Self::Last => u > t,
        }
    }
}

struct LineQuery {
    start: Point3<f32>,
    end: Point3<f32>,
    delta: Vector3<f32>,
    collision_mask: u32,
    order: HitOrder,
}

struct LineSearch<'a> {
    t: f32,
    polygon: Option<PolygonRef<'a>>,
}

/// Finds the first polygon hit by the segment from `start` to `start + delta`.
///
/// Only polygons whose collision mask shares a bit with `collision_mask`
/// are considered. Returns the hit with the smallest `t < 1`.
pub fn find_line_intersection<'a>(
    root: NodeRef<'a>,
    start: Point3<f32>,
    delta: Vector3<f32>,
    collision_mask: u32,
) -> Option<LineHit<'a>> {
    find_line_hit(root, start, delta, collision_mask, HitOrder::First, 1.0)
        .filter(|hit| hit.t < 1.0)
}

/// Finds the last polygon hit by the segment from `start` to `start + delta`.
///
/// Returns the hit with the largest `t > 0`.
pub fn find_last_line_intersection<'a>(
    root: NodeRef<'a>,
    start: Point3<f32>,
    delta: Vector3<f32>,
    collision_mask: u32,
) -> Option<LineHit<'a>> {
    find_line_hit(root, start, delta, collision_mask, HitOrder::Last, 0.0)
        .filter(|hit| hit.t > 0.0)
}

fn find_line_hit<'a>(
    root: NodeRef<'a>,
    start: Point3<f32>,
    delta: Vector3<f32>,
    collision_mask: u32,
    order: HitOrder,
    initial_t: f32,
) -> Option<LineHit<'a>> {
    let query = LineQuery {
        start,
        end: start + delta,
        delta,
        collision_mask,
        order,
    };
    let mut search = LineSearch {
        t: initial_t,
        polygon: None,
    };

    line_recurse(Some(root), &query, &mut search);

    search.polygon.map(|polygon| LineHit {
        t: search.t,
        polygon,
    })
}

fn line_recurse<'a>(node: Option<NodeRef<'a>>, query: &LineQuery, search: &mut LineSearch<'a>) {
    let Some(node) = node else {
        return;
    };

    let plane = node.plane();
    let start_dist = plane.signed_distance(query.start);
    let end_dist = plane.signed_distance(query.end);

    match (start_dist > 0.0, end_dist > 0.0) {
        (true, true) => {
            line_recurse(node.positive(), query, search);
            if start_dist <= PLANE_THICKNESS || end_dist <= PLANE_THICKNESS || node.is_leaf() {
                line_polygons(node, query, search);
            }
        }
        (false, false) => {
            line_recurse(node.negative(), query, search);
            if -start_dist <= PLANE_THICKNESS || -end_dist <= PLANE_THICKNESS || node.is_leaf() {
                line_polygons(node, query, search);
            }
        }
        (start_positive, _) => {
            let (start_side, end_side) = if start_positive {
                (node.positive(), node.negative())
            } else {
                (node.negative(), node.positive())
            };
            let (near, far) = match query.order {
                HitOrder::First => (start_side, end_side),
                HitOrder::Last => (end_side, start_side),
            };

            let t0 = search.t;
            line_recurse(near, query, search);
            if search.t == t0 {
                line_polygons(node, query, search);
                line_recurse(far, query, search);
            }
        }
    }
}

/// Tests the segment against the polygons stored at `node`.
fn line_polygons<'a>(node: NodeRef<'a>, query: &LineQuery, search: &mut LineSearch<'a>) {
    for polygon in node.polygons() {
        if polygon.collision_mask() & query.collision_mask == 0 {
            continue;
        }
        LINE_POLYGON_TESTS.fetch_add(1, Ordering::Relaxed);

        let plane = polygon.plane();
        let start_dist = plane.signed_distance(query.start);
        let end_dist = plane.signed_distance(query.end);
        if start_dist <= -PLANE_THICKNESS || end_dist >= PLANE_THICKNESS {
            continue;
        }

        // Segments running along the plane are ignored.
        let delta_dist = start_dist - end_dist;
        if delta_dist <= f32::MIN_POSITIVE {
            continue;
        }

        let u = start_dist / delta_dist;
        if query.order.improves(u, search.t) && polygon.is_point_in_polygon(query.start + query.delta * u) {
            search.t = u;
            search.polygon = Some(polygon);
        }
    }
}

struct SphereQuery {
    start: Point3<f32>,
    end: Point3<f32>,
    delta: Vector3<f32>,
    radius: f32,
    collision_mask: u32,
    move_center: Point3<f32>,
    move_radius_sq: f32,
}

struct SphereSearch<'a> {
    t: f32,
    contact: Option<SphereHit<'a>>,
}

impl<'a> SphereSearch<'a> {
    /// Keeps the contact if it is earlier than the current one. Between two
    /// contacts at `t = 0` the one closer to the start wins.
    fn offer(
        &mut self,
        start: Point3<f32>,
        u: f32,
        polygon: PolygonRef<'a>,
        normal: Vector3<f32>,
        point: Point3<f32>,
    ) {
        let candidate = SphereHit {
            t: u,
            polygon,
            normal,
            point,
        };

        if u < self.t {
            self.t = u;
            self.contact = Some(candidate);
        } else if u == 0.0 {
            let closer = self.contact.as_ref().is_none_or(|current| {
                (point - start).norm_squared() < (current.point - start).norm_squared()
            });
            if closer {
                self.t = u;
                self.contact = Some(candidate);
            }
        }
    }
}

/// Finds the first contact of a sphere of `radius` moving from `start` to
/// `start + delta`.
///
/// The contact normal points from the polygon towards the sphere. A sphere
/// already touching a polygon at `start` reports `t = 0`.
pub fn find_moving_sphere_intersection<'a>(
    root: NodeRef<'a>,
    start: Point3<f32>,
    delta: Vector3<f32>,
    radius: f32,
    collision_mask: u32,
) -> Option<SphereHit<'a>> {
    let move_radius = delta.norm() + radius * 2.0;
    let query = SphereQuery {
        start,
        end: start + delta,
        delta,
        radius,
        collision_mask,
        move_center: start + delta * 0.5,
        move_radius_sq: move_radius * move_radius,
    };
    let mut search = SphereSearch {
        t: 1.0,
        contact: None,
    };

    sphere_recurse(Some(root), &query, &mut search);

    search.contact.filter(|hit| hit.t < 1.0)
}

fn sphere_recurse<'a>(node: Option<NodeRef<'a>>, query: &SphereQuery, search: &mut SphereSearch<'a>) {
    let Some(node) = node else {
        return;
    };

    let plane = node.plane();
    let start_dist = plane.signed_distance(query.start);
    let end_dist = plane.signed_distance(query.end);
    let r = query.radius;

    match (start_dist > 0.0, end_dist > 0.0) {
        (true, true) => {
            sphere_recurse(node.positive(), query, search);
            if start_dist - r <= PLANE_THICKNESS || end_dist - r <= PLANE_THICKNESS {
                sphere_polygons(node, query, search);
                sphere_recurse(node.negative(), query, search);
            } else if node.is_leaf() {
                sphere_polygons(node, query, search);
            }
        }
        (false, false) => {
            sphere_recurse(node.negative(), query, search);
            if -start_dist - r <= PLANE_THICKNESS || -end_dist - r <= PLANE_THICKNESS {
                sphere_polygons(node, query, search);
                sphere_recurse(node.positive(), query, search);
            } else if node.is_leaf() {
                sphere_polygons(node, query, search);
            }
        }
        (true, false) => {
            sphere_recurse(node.positive(), query, search);
            sphere_polygons(node, query, search);
            sphere_recurse(node.negative(), query, search);
        }
        (false, true) => {
            sphere_recurse(node.negative(), query, search);
            sphere_polygons(node, query, search);
            sphere_recurse(node.positive(), query, search);
        }
    }
}

/// Tests the swept sphere against the polygons stored at `node`.
fn sphere_polygons<'a>(node: NodeRef<'a>, query: &SphereQuery, search: &mut SphereSearch<'a>) {
    for polygon in node.polygons() {
        if polygon.collision_mask() & query.collision_mask == 0
            || polygon.distance_squared(query.move_center) >= query.move_radius_sq
        {
            continue;
        }
        SPHERE_POLYGON_TESTS.fetch_add(1, Ordering::Relaxed);
        sphere_polygon(polygon, query, search);
    }
}

fn sphere_polygon<'a>(polygon: PolygonRef<'a>, query: &SphereQuery, search: &mut SphereSearch<'a>) {
    let (start, delta, r) = (query.start, query.delta, query.radius);
    let plane = polygon.plane();
    let start_dist = plane.signed_distance(start);
    let end_dist = plane.signed_distance(query.end);

    let stays_in_front = start_dist - r > PLANE_THICKNESS && end_dist - r > PLANE_THICKNESS;
    let stays_behind = -start_dist - r > PLANE_THICKNESS && -end_dist - r > PLANE_THICKNESS;
    if stays_in_front || stays_behind {
        return;
    }

    // Face: the sphere already touches the plane, or its front point
    // crosses the plane inside the polygon.
    let normal = plane.normal();
    let shift = normal * -r;
    if let Some(u) = line_plane(start, shift, plane) {
        let point = start + shift * u;
        if polygon.is_point_in_polygon(point) {
            search.offer(start, 0.0, polygon, normal, point);
            return;
        }
    } else {
        let shifted_start = start + shift;
        if let Some(u) = line_plane(shifted_start, delta, plane).filter(|&u| u <= search.t) {
            let point = shifted_start + delta * u;
            if polygon.is_point_in_polygon(point) {
                search.offer(start, u, polygon, normal, point);
                return;
            }
        }
    }

    // Vertices
    for vertex in polygon.vertices() {
        let Some(u) = line_sphere(start, delta, vertex, r).filter(|&u| u <= search.t) else {
            continue;
        };
        let center = start + delta * u;
        let contact_normal = (center - vertex)
            .try_normalize(f32::MIN_POSITIVE)
            .unwrap_or(normal);
        let point = if u == 0.0 {
            vertex
        } else {
            center - contact_normal * r
        };
        search.offer(start, u, polygon, contact_normal, point);
    }

    // Edges (k, i)
    let count = polygon.vertex_count();
    for i in 0..count {
        let e0 = polygon.vertex((i + count - 1) % count);
        let e1 = polygon.vertex(i);
        let axis = e1 - e0;
        let length = axis.norm();
        if length <= MIN_EDGE_LENGTH {
            continue;
        }

        let mid = Point3::from((e0.coords + e1.coords) * 0.5);
        let hit = line_cylinder(start, delta, mid, axis / length, r, length * 0.5);
        let Some(hit) = hit.filter(|hit| hit.t <= search.t) else {
            continue;
        };
        let center = start + delta * hit.t;
        let point = if hit.t == 0.0 {
            center - hit.normal * hit.normal.dot(&(center - mid))
        } else {
            center - hit.normal * r
        };
        search.offer(start, hit.t, polygon, hit.normal, point);
    }
}
