//! Plane representation and operations for BSP trees.

use nalgebra::{Point3, Vector3};

/// Thickness (+-) of a node plane.
/// Points within this distance of a plane are considered to lie "on" it.
pub const PLANE_THICKNESS: f32 = 0.01;

/// Which side of a plane a point lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneSide {
    /// Point is in front of the plane (positive side of normal)
    Front,
    /// Point is behind the plane (negative side of normal)
    Back,
    /// Point lies inside the plane thickness band
    OnPlane,
}

/// A plane in 3D space, represented as `normal · point = offset`.
///
/// Planes built from geometry have a unit normal. The zero plane
/// (`normal = 0`, `offset = 0`) marks a node without a meaningful split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane3D {
    normal: Vector3<f32>,
    offset: f32,
}

impl Plane3D {
    /// The degenerate plane with a zero normal. Every point has distance 0 to it.
    #[inline]
    pub fn zero() -> Self {
        Self {
            normal: Vector3::zeros(),
            offset: 0.0,
        }
    }

    /// Creates a plane from a normal vector and offset, normalizing both.
    #[cfg(test)]
    pub(crate) fn new(normal: Vector3<f32>, offset: f32) -> Self {
        let norm = normal.norm();
        assert!(norm > f32::EPSILON, "Plane normal cannot be zero");
        Self {
            normal: normal / norm,
            offset: offset / norm,
        }
    }

    /// Creates a plane from its components as-is, without normalizing.
    ///
    /// Used for stored planes, which must come back bit-identical.
    #[inline]
    pub fn from_raw(normal: Vector3<f32>, offset: f32) -> Self {
        Self { normal, offset }
    }

    /// Creates the plane of a polygon from its first three vertices.
    ///
    /// The normal is `(b - a) × (c - a)`, normalized. Collinear points
    /// give a zero normal instead of panicking, so degenerate polygons
    /// still get a (useless but well-defined) plane.
    pub fn from_polygon_points(a: Point3<f32>, b: Point3<f32>, c: Point3<f32>) -> Self {
        let normal = (b - a).cross(&(c - a));
        let len = normal.norm();
        let normal = if len > f32::MIN_POSITIVE {
            normal / len
        } else {
            Vector3::zeros()
        };
        Self {
            normal,
            offset: a.coords.dot(&normal),
        }
    }

    /// Returns the normal vector of the plane.
    #[inline]
    pub fn normal(&self) -> Vector3<f32> {
        self.normal
    }

    /// Returns the signed distance from the origin to the plane along the normal.
    #[inline]
    pub fn offset(&self) -> f32 {
        self.offset
    }

    /// Returns true if every component is finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.normal.iter().all(|c| c.is_finite()) && self.offset.is_finite()
    }

    /// Returns true for the zero plane (all components exactly zero).
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.normal == Vector3::zeros() && self.offset == 0.0
    }

    /// Computes the signed distance from a point to the plane.
    /// - Positive: point is in front (same side as normal)
    /// - Negative: point is behind (opposite side from normal)
    /// - Zero: point is on the plane
    #[inline]
    pub fn signed_distance(&self, point: Point3<f32>) -> f32 {
        self.normal.dot(&point.coords) - self.offset
    }

    /// Classifies a point against the [`PLANE_THICKNESS`] band.
    ///
    /// Distances of exactly `±PLANE_THICKNESS` count as outside the band.
    #[inline]
    pub fn classify_point(&self, point: Point3<f32>) -> PlaneSide {
        let dist = self.signed_distance(point);
        if dist >= PLANE_THICKNESS {
            PlaneSide::Front
        } else if dist <= -PLANE_THICKNESS {
            PlaneSide::Back
        } else {
            PlaneSide::OnPlane
        }
    }
}
