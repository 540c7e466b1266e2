//! Line intersection primitives used by the collision queries.
//!
//! A "line" here is the segment `origin + delta * t` for `t` in `[0, 1)`.
//! Every function returns the parameter `t` of the first contact, measured
//! relative to the length of `delta`.

use nalgebra::{Point3, Vector3};

use crate::Plane3D;

/// Which surface of a capped cylinder was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CylinderContact {
    Inside,
    Cap,
    Wall,
}

/// Hit against a capped cylinder: line parameter and surface normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CylinderHit {
    pub t: f32,
    pub normal: Vector3<f32>,
}

/// Finds where a ray enters a plane from its positive side.
///
/// Returns `None` if the origin is on or behind the plane, or if the ray
/// points away from or along the plane.
pub fn ray_plane(origin: Point3<f32>, dir: Vector3<f32>, plane: &Plane3D) -> Option<f32> {
    let sdist = plane.signed_distance(origin);
    if sdist <= 0.0 {
        return None;
    }

    let d = dir.dot(&plane.normal());
    if d > -f32::MIN_POSITIVE {
        return None;
    }

    Some(-sdist / d)
}

/// Segment version of [`ray_plane`]: only hits with `t < 1` count.
pub fn line_plane(origin: Point3<f32>, delta: Vector3<f32>, plane: &Plane3D) -> Option<f32> {
    ray_plane(origin, delta, plane).filter(|&t| t < 1.0)
}

/// Finds the first contact of a ray with a sphere.
///
/// Returns `Some(0.0)` if the origin is already inside the sphere.
pub fn ray_sphere(
    origin: Point3<f32>,
    dir: Vector3<f32>,
    center: Point3<f32>,
    radius: f32,
) -> Option<f32> {
    let to_origin = origin - center;
    let origin_dist_sq = to_origin.norm_squared();
    let radius_sq = radius * radius;
    if origin_dist_sq <= radius_sq {
        return Some(0.0);
    }

    let a = dir.norm_squared();
    if a < f32::MIN_POSITIVE {
        return None;
    }

    let b = 2.0 * to_origin.dot(&dir);
    let c = origin_dist_sq - radius_sq;
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }

    let t0 = (-b - discriminant.sqrt()) * (0.5 / a);
    (t0 >= 0.0).then_some(t0)
}

/// Segment version of [`ray_sphere`]: only hits with `t < 1` count.
pub fn line_sphere(
    origin: Point3<f32>,
    delta: Vector3<f32>,
    center: Point3<f32>,
    radius: f32,
) -> Option<f32> {
    ray_sphere(origin, delta, center, radius).filter(|&t| t < 1.0)
}

/// Builds two unit vectors perpendicular to `axis` and to each other.
fn orthonormal_basis(axis: Vector3<f32>) -> (Vector3<f32>, Vector3<f32>) {
    let helper = if axis.x.abs() < 0.6 {
        Vector3::x()
    } else if axis.y.abs() < 0.6 {
        Vector3::y()
    } else {
        Vector3::z()
    };
    let u = axis.cross(&helper).normalize();
    let v = axis.cross(&u);
    (u, v)
}

/// Finds the first contact of a ray with a capped cylinder.
///
/// The cylinder is centered at `center`, extends `half_height` along the
/// unit `axis` in both directions and has the given `radius`. The returned
/// normal points out of the surface at the contact point. A ray starting
/// inside reports `t = 0` and the normal of the closest surface.
pub fn ray_cylinder(
    origin: Point3<f32>,
    dir: Vector3<f32>,
    center: Point3<f32>,
    axis: Vector3<f32>,
    radius: f32,
    half_height: f32,
) -> Option<CylinderHit> {
    debug_assert!((axis.norm() - 1.0).abs() < 1e-3, "cylinder axis must be unit length");

    const EPS: f32 = 1e-10;
    let radius_sq = radius * radius;
    let mut solutions: Vec<(f32, CylinderContact)> = Vec::with_capacity(2);

    // Cylinder space: x/y across the axis, z along it.
    let (bu, bv) = orthonormal_basis(axis);
    let to_local = |v: Vector3<f32>| Vector3::new(v.dot(&bu), v.dot(&bv), v.dot(&axis));
    let origin_c = to_local(origin - center);
    let mut dir_c = to_local(dir);

    let origin_in_infinite = origin_c.x * origin_c.x + origin_c.y * origin_c.y <= radius_sq;
    let origin_between_caps = origin_c.z.abs() <= half_height;

    if origin_in_infinite && origin_between_caps {
        solutions.push((0.0, CylinderContact::Inside));
    } else {
        let dir_len = dir_c.norm();
        if dir_len >= EPS {
            let dir_len_inv = 1.0 / dir_len;
            dir_c *= dir_len_inv;

            if dir_c.z.abs() >= 1.0 - EPS {
                // parallel to the axis: can only pass through the caps
                if origin_in_infinite {
                    let scale = dir_len_inv / dir_c.z;
                    solutions.push(((half_height - origin_c.z) * scale, CylinderContact::Cap));
                    solutions.push(((-half_height - origin_c.z) * scale, CylinderContact::Cap));
                }
            } else if dir_c.z.abs() <= EPS {
                // perpendicular to the axis: can only hit the wall
                if origin_between_caps {
                    let a = dir_c.x * dir_c.x + dir_c.y * dir_c.y;
                    let b = 2.0 * (origin_c.x * dir_c.x + origin_c.y * dir_c.y);
                    let c = origin_c.x * origin_c.x + origin_c.y * origin_c.y - radius_sq;
                    let discriminant = b * b - 4.0 * a * c;
                    if discriminant > f32::MIN_POSITIVE {
                        let root = discriminant.sqrt();
                        let scale = dir_len_inv / (2.0 * a);
                        solutions.push(((-b + root) * scale, CylinderContact::Wall));
                        solutions.push(((-b - root) * scale, CylinderContact::Wall));
                    }
                }
            } else {
                let inv = 1.0 / dir_c.z;
                let u0 = (half_height - origin_c.z) * inv;
                let u1 = (-half_height - origin_c.z) * inv;
                for u in [u0, u1] {
                    let x = origin_c.x + u * dir_c.x;
                    let y = origin_c.y + u * dir_c.y;
                    if x * x + y * y <= radius_sq {
                        solutions.push((u * dir_len_inv, CylinderContact::Cap));
                    }
                }

                if solutions.len() < 2 {
                    let a = dir_c.x * dir_c.x + dir_c.y * dir_c.y;
                    let b = origin_c.x * dir_c.x + origin_c.y * dir_c.y;
                    let c = origin_c.x * origin_c.x + origin_c.y * origin_c.y - radius_sq;
                    let discriminant = b * b - a * c;
                    if discriminant > f32::MIN_POSITIVE {
                        let root = discriminant.sqrt();
                        let (lo, hi) = if u0 <= u1 { (u0, u1) } else { (u1, u0) };
                        for u in [(-b - root) / a, (-b + root) / a] {
                            if solutions.len() >= 2 {
                                break;
                            }
                            if lo <= u && u <= hi {
                                solutions.push((u * dir_len_inv, CylinderContact::Wall));
                            }
                        }
                    }
                }
            }
        }
    }

    let (t, contact) = solutions
        .into_iter()
        .filter(|(t, _)| *t >= 0.0)
        .fold(None, |best: Option<(f32, CylinderContact)>, candidate| match best {
            Some(b) if b.0 <= candidate.0 => Some(b),
            _ => Some(candidate),
        })?;

    let hit_c = origin_c + to_local(dir * t);
    let contact = match contact {
        CylinderContact::Inside => {
            let cap_dist = (hit_c.z.abs() - half_height).abs();
            let wall_dist = ((hit_c.x * hit_c.x + hit_c.y * hit_c.y).sqrt() - radius).abs();
            if cap_dist < wall_dist {
                CylinderContact::Cap
            } else {
                CylinderContact::Wall
            }
        }
        other => other,
    };

    let normal = match contact {
        CylinderContact::Cap if hit_c.z < 0.0 => -axis,
        CylinderContact::Cap => axis,
        _ => {
            let radial_len = (hit_c.x * hit_c.x + hit_c.y * hit_c.y).sqrt();
            if radial_len < f32::MIN_POSITIVE {
                axis
            } else {
                (bu * hit_c.x + bv * hit_c.y) / radial_len
            }
        }
    };

    Some(CylinderHit { t, normal })
}

/// Segment version of [`ray_cylinder`]: only hits with `t < 1` count.
pub fn line_cylinder(
    origin: Point3<f32>,
    delta: Vector3<f32>,
    center: Point3<f32>,
    axis: Vector3<f32>,
    radius: f32,
    half_height: f32,
) -> Option<CylinderHit> {
    ray_cylinder(origin, delta, center, axis, radius, half_height).filter(|hit| hit.t < 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn floor() -> Plane3D {
        Plane3D::new(Vector3::new(0.0, 0.0, 1.0), 0.0)
    }

    #[test]
    fn line_plane_hits_from_front() {
        let t = line_plane(Point3::new(0.0, 0.0, 1.0), Vector3::new(0.0, 0.0, -4.0), &floor());
        assert_approx_eq!(t.unwrap(), 0.25);
    }

    #[test]
    fn line_plane_ignores_back_side_and_short_segments() {
        let plane = floor();
        assert!(line_plane(Point3::new(0.0, 0.0, -1.0), Vector3::new(0.0, 0.0, 4.0), &plane).is_none());
        assert!(line_plane(Point3::new(0.0, 0.0, 1.0), Vector3::new(0.0, 0.0, 1.0), &plane).is_none());
        assert!(line_plane(Point3::new(0.0, 0.0, 1.0), Vector3::new(0.0, 0.0, -0.5), &plane).is_none());
    }

    #[test]
    fn line_sphere_first_root() {
        let t = line_sphere(
            Point3::new(-4.0, 0.0, 0.0),
            Vector3::new(8.0, 0.0, 0.0),
            Point3::origin(),
            1.0,
        );
        assert_approx_eq!(t.unwrap(), 3.0 / 8.0);
    }

    #[test]
    fn line_sphere_inside_is_zero() {
        let t = line_sphere(
            Point3::new(0.5, 0.0, 0.0),
            Vector3::new(8.0, 0.0, 0.0),
            Point3::origin(),
            1.0,
        );
        assert_eq!(t, Some(0.0));
    }

    #[test]
    fn line_sphere_miss() {
        let t = line_sphere(
            Point3::new(-4.0, 2.0, 0.0),
            Vector3::new(8.0, 0.0, 0.0),
            Point3::origin(),
            1.0,
        );
        assert!(t.is_none());
    }

    #[test]
    fn cylinder_wall_hit_has_radial_normal() {
        let hit = line_cylinder(
            Point3::new(-5.0, 0.0, 0.0),
            Vector3::new(10.0, 0.0, 0.0),
            Point3::origin(),
            Vector3::z(),
            1.0,
            2.0,
        )
        .unwrap();
        assert_approx_eq!(hit.t, 0.4);
        assert_approx_eq!(hit.normal.x, -1.0);
        assert_approx_eq!(hit.normal.y, 0.0);
        assert_approx_eq!(hit.normal.z, 0.0);
    }

    #[test]
    fn cylinder_cap_hit_along_axis() {
        let hit = line_cylinder(
            Point3::new(0.0, 0.0, 5.0),
            Vector3::new(0.0, 0.0, -10.0),
            Point3::origin(),
            Vector3::z(),
            1.0,
            2.0,
        )
        .unwrap();
        assert_approx_eq!(hit.t, 0.3);
        assert_approx_eq!(hit.normal.z, 1.0);
    }

    #[test]
    fn cylinder_oblique_wall_hit() {
        // Enters the wall at x = -1 while still between the caps.
        let hit = line_cylinder(
            Point3::new(-3.0, 0.0, -1.0),
            Vector3::new(4.0, 0.0, 1.0),
            Point3::origin(),
            Vector3::z(),
            1.0,
            2.0,
        )
        .unwrap();
        assert_approx_eq!(hit.t, 0.5);
        assert_approx_eq!(hit.normal.x, -1.0);
    }

    #[test]
    fn cylinder_start_inside() {
        let hit = line_cylinder(
            Point3::new(0.0, 0.9, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Point3::origin(),
            Vector3::z(),
            1.0,
            2.0,
        )
        .unwrap();
        assert_eq!(hit.t, 0.0);
        assert_approx_eq!(hit.normal.y, 1.0);
    }

    #[test]
    fn cylinder_miss_beyond_caps() {
        let hit = line_cylinder(
            Point3::new(-5.0, 0.0, 3.0),
            Vector3::new(10.0, 0.0, 0.0),
            Point3::origin(),
            Vector3::z(),
            1.0,
            2.0,
        );
        assert!(hit.is_none());
    }
}
