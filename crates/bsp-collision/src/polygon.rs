//! Polygon records stored in the BSP arena.

use std::fmt;

use nalgebra::{Point3, Vector3};

use crate::{BspStorage, Plane3D};

/// Collision mask matching every collision channel.
pub const COLLIDE_ALL: u32 = u32::MAX;

/// A convex polygon stored in a [`BspStorage`].
///
/// Vertices are kept in the storage's shared vertex pool and referenced
/// through the shared index pool, so a record on its own only carries
/// offsets plus the values derived from its vertices at creation time:
/// the face plane, one edge plane per edge and a bounding sphere.
///
/// Vertices are in clockwise order when viewed from the front, which with
/// the right-handed normal `(v1 - v0) × (v2 - v0)` means the edge planes
/// face outwards. Records are never modified after creation.
#[derive(Debug, Clone)]
pub struct BspPolygon {
    id: i32,
    collision_mask: u32,
    first_index: u32,
    vertex_count: u32,
    plane: Plane3D,
    bound_center: Point3<f32>,
    bound_radius_sq: f32,
}

impl BspPolygon {
    /// Creates a polygon from vertices that are already in `storage`.
    ///
    /// Appends the indices and one edge plane per edge to the shared pools.
    ///
    /// # Panics
    /// Panics if fewer than 3 indices are given or an index is out of range.
    pub(crate) fn create(
        storage: &mut BspStorage,
        indices: &[u32],
        id: i32,
        collision_mask: u32,
    ) -> Self {
        assert!(indices.len() >= 3, "Polygon must have at least 3 vertices");
        assert_eq!(
            storage.indices.len(),
            storage.edge_planes.len(),
            "every stored index must have a matching edge plane"
        );

        let corners: Vec<Point3<f32>> = indices
            .iter()
            .map(|&i| storage.vertices[i as usize])
            .collect();
        let n = corners.len();

        let plane = Plane3D::from_polygon_points(corners[0], corners[1], corners[2]);
        let normal = plane.normal();

        // Edge (i-1, i) gets the plane containing the edge and the face normal.
        let edge_planes = (0..n).map(|i| {
            let start = corners[(i + n - 1) % n];
            let edge = corners[i] - start;
            let edge_normal = edge
                .cross(&normal)
                .try_normalize(f32::MIN_POSITIVE)
                .unwrap_or_else(Vector3::zeros);
            Plane3D::from_raw(edge_normal, start.coords.dot(&edge_normal))
        });

        let first_index = storage.indices.len() as u32;
        storage.indices.extend_from_slice(indices);
        storage.edge_planes.extend(edge_planes);

        let sum: Vector3<f32> = corners.iter().map(|p| p.coords).sum();
        let bound_center = Point3::from(sum * (1.0 / n as f32));
        let bound_radius_sq = corners
            .iter()
            .map(|p| (bound_center - p).norm_squared())
            .fold(0.0f32, f32::max);

        Self {
            id,
            collision_mask,
            first_index,
            vertex_count: n as u32,
            plane,
            bound_center,
            bound_radius_sq,
        }
    }

    /// Returns the user defined id of the polygon.
    #[inline]
    pub fn id(&self) -> i32 {
        self.id
    }

    /// Returns the collision mask used to filter collision queries.
    #[inline]
    pub fn collision_mask(&self) -> u32 {
        self.collision_mask
    }

    /// Returns the number of vertices.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertex_count as usize
    }

    /// Returns the plane of the polygon.
    #[inline]
    pub fn plane(&self) -> &Plane3D {
        &self.plane
    }

    /// Returns the squared bounding sphere radius.
    #[inline]
    pub fn bound_radius_squared(&self) -> f32 {
        self.bound_radius_sq
    }

    /// Returns the bounding sphere center.
    #[inline]
    pub fn bound_center(&self) -> Point3<f32> {
        self.bound_center
    }
}

/// A polygon record together with the storage that holds its vertices.
#[derive(Clone, Copy)]
pub struct PolygonRef<'a> {
    storage: &'a BspStorage,
    record: &'a BspPolygon,
}

impl<'a> PolygonRef<'a> {
    pub(crate) fn new(storage: &'a BspStorage, record: &'a BspPolygon) -> Self {
        Self { storage, record }
    }

    /// Returns the underlying record.
    #[inline]
    pub fn record(&self) -> &'a BspPolygon {
        self.record
    }

    /// Returns the storage the polygon lives in.
    #[inline]
    pub fn storage(&self) -> &'a BspStorage {
        self.storage
    }

    #[inline]
    pub fn id(&self) -> i32 {
        self.record.id
    }

    #[inline]
    pub fn collision_mask(&self) -> u32 {
        self.record.collision_mask
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.record.vertex_count()
    }

    #[inline]
    pub fn plane(&self) -> &'a Plane3D {
        &self.record.plane
    }

    /// Returns the index of the `i`th vertex in the shared vertex pool.
    #[inline]
    pub fn vertex_index(&self, i: usize) -> u32 {
        debug_assert!(i < self.vertex_count());
        self.storage.indices[self.record.first_index as usize + i]
    }

    /// Returns the `i`th vertex.
    #[inline]
    pub fn vertex(&self, i: usize) -> Point3<f32> {
        self.storage.vertices[self.vertex_index(i) as usize]
    }

    /// Iterates over the vertices in winding order.
    pub fn vertices(self) -> impl Iterator<Item = Point3<f32>> + 'a {
        (0..self.vertex_count()).map(move |i| self.vertex(i))
    }

    /// Returns the plane of the edge ending at vertex `i`.
    #[inline]
    pub fn edge_plane(&self, i: usize) -> &'a Plane3D {
        debug_assert!(i < self.vertex_count());
        &self.storage.edge_planes[self.record.first_index as usize + i]
    }

    /// Returns true if the point is inside the polygon, boundary included.
    ///
    /// Assumes the point already lies on the polygon plane.
    pub fn is_point_in_polygon(&self, point: Point3<f32>) -> bool {
        (0..self.vertex_count()).all(|i| self.edge_plane(i).signed_distance(point) <= 0.0)
    }

    /// Returns the squared distance from `point` to the bounding sphere
    /// center, minus the squared bounding radius.
    #[inline]
    pub fn distance_squared(&self, point: Point3<f32>) -> f32 {
        (self.record.bound_center - point).norm_squared() - self.record.bound_radius_sq
    }

    #[inline]
    pub fn bound_radius_squared(&self) -> f32 {
        self.record.bound_radius_sq
    }
}

impl PartialEq for PolygonRef<'_> {
    /// Polygons are equal when id, mask and every vertex position match exactly.
    fn eq(&self, other: &Self) -> bool {
        self.vertex_count() == other.vertex_count()
            && self.collision_mask() == other.collision_mask()
            && self.id() == other.id()
            && (0..self.vertex_count()).all(|i| self.vertex(i) == other.vertex(i))
    }
}

impl fmt::Debug for PolygonRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolygonRef")
            .field("id", &self.id())
            .field("collision_mask", &self.collision_mask())
            .field("vertices", &self.vertices().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn make_polygon(storage: &mut BspStorage, points: &[[f32; 3]], id: i32) -> crate::PolygonHandle {
        let points: Vec<Point3<f32>> = points.iter().map(|p| Point3::new(p[0], p[1], p[2])).collect();
        storage.create_polygon_from_points(&points, id, COLLIDE_ALL)
    }

    #[test]
    fn plane_and_bound_sphere() {
        let mut storage = BspStorage::new();
        let handle = make_polygon(
            &mut storage,
            &[[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [2.0, 2.0, 0.0], [0.0, 2.0, 0.0]],
            7,
        );
        let poly = storage.polygon(handle);

        assert_eq!(poly.id(), 7);
        assert_eq!(poly.vertex_count(), 4);
        assert_eq!(poly.plane().normal(), Vector3::new(0.0, 0.0, 1.0));
        assert_eq!(poly.record().bound_center(), Point3::new(1.0, 1.0, 0.0));
        assert_approx_eq!(poly.bound_radius_squared(), 2.0);
        assert_approx_eq!(poly.distance_squared(Point3::new(1.0, 1.0, 3.0)), 7.0);
    }

    #[test]
    fn point_in_polygon_is_inclusive() {
        let mut storage = BspStorage::new();
        let handle = make_polygon(&mut storage, &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]], 0);
        let poly = storage.polygon(handle);

        assert!(poly.is_point_in_polygon(Point3::new(0.2, 0.2, 0.0)));
        assert!(poly.is_point_in_polygon(Point3::new(0.0, 0.0, 0.0)));
        assert!(poly.is_point_in_polygon(Point3::new(0.5, 0.0, 0.0)));
        assert!(!poly.is_point_in_polygon(Point3::new(0.6, 0.6, 0.0)));
        assert!(!poly.is_point_in_polygon(Point3::new(-0.1, 0.5, 0.0)));
    }

    #[test]
    fn point_in_polygon_invariant_under_rotation() {
        let corners = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
        let probes = [
            Point3::new(0.5, 0.5, 0.0),
            Point3::new(1.5, 0.5, 0.0),
            Point3::new(0.9, 0.1, 0.0),
            Point3::new(-0.2, 0.3, 0.0),
        ];

        let mut storage = BspStorage::new();
        let base = make_polygon(&mut storage, &corners, 0);
        for shift in 1..4 {
            let mut rotated = corners;
            rotated.rotate_left(shift);
            let handle = make_polygon(&mut storage, &rotated, 0);
            for probe in probes {
                assert_eq!(
                    storage.polygon(base).is_point_in_polygon(probe),
                    storage.polygon(handle).is_point_in_polygon(probe)
                );
            }
        }
    }

    #[test]
    fn reversed_winding_flips_plane_and_edge_planes() {
        let mut storage = BspStorage::new();
        let forward = make_polygon(&mut storage, &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]], 0);
        let reversed = make_polygon(&mut storage, &[[0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 0.0]], 0);
        let forward = storage.polygon(forward);
        let reversed = storage.polygon(reversed);

        assert_eq!(forward.plane().normal(), -reversed.plane().normal());
        // Edge planes are derived from the face normal, so both stay outward facing.
        let inside = Point3::new(0.2, 0.2, 0.0);
        assert!(forward.is_point_in_polygon(inside));
        assert!(reversed.is_point_in_polygon(inside));
        assert!(!reversed.is_point_in_polygon(Point3::new(0.8, 0.8, 0.0)));
    }

    #[test]
    fn equality_by_value() {
        let mut storage = BspStorage::new();
        let tri = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let a = make_polygon(&mut storage, &tri, 1);
        let b = make_polygon(&mut storage, &tri, 1);
        let c = make_polygon(&mut storage, &tri, 2);
        let d = make_polygon(&mut storage, &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 2.0, 0.0]], 1);

        assert_eq!(storage.polygon(a), storage.polygon(b));
        assert_ne!(storage.polygon(a), storage.polygon(c));
        assert_ne!(storage.polygon(a), storage.polygon(d));
    }

    #[test]
    fn collinear_polygon_has_zero_plane() {
        let mut storage = BspStorage::new();
        let handle = make_polygon(&mut storage, &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]], 0);
        assert!(storage.polygon(handle).plane().is_degenerate());
    }
}
