//! Oriented bounding box fitting.

use nalgebra::{Matrix3, Point3, SymmetricEigen, Vector3};

/// An oriented bounding box: a center, three orthonormal axes and the
/// half-extent along each axis.
#[derive(Debug, Clone, PartialEq)]
pub struct OrientedBox {
    center: Point3<f32>,
    axes: Matrix3<f32>,
    half_extents: Vector3<f32>,
}

impl OrientedBox {
    /// Fits a box to a point set using principal component analysis.
    ///
    /// The axes are the eigenvectors of the point covariance matrix and the
    /// extents are the projected bounds along them. With fewer than two
    /// points the result is an axis-aligned box of zero size at their mean.
    pub fn fit(points: &[Point3<f32>]) -> Self {
        let count = points.len();
        let mut mean = Vector3::zeros();
        for p in points {
            mean += p.coords;
        }

        if count < 2 {
            return Self {
                center: Point3::from(mean),
                axes: Matrix3::identity(),
                half_extents: Vector3::zeros(),
            };
        }

        mean /= count as f32;
        if !mean.iter().all(|c| c.is_finite()) {
            mean = Vector3::zeros();
        }

        let mut covariance = Matrix3::zeros();
        for p in points {
            let d = p.coords - mean;
            covariance += d * d.transpose();
        }
        covariance /= count as f32;
        if !covariance.iter().all(|c| c.is_finite()) {
            covariance = Matrix3::identity();
        }

        let axes = SymmetricEigen::new(covariance).eigenvectors;

        let mut min = Vector3::repeat(f32::MAX);
        let mut max = Vector3::repeat(-f32::MAX);
        for p in points {
            let projected = axes.tr_mul(&p.coords);
            min = min.inf(&projected);
            max = max.sup(&projected);
        }

        let local_center = (min + max) * 0.5;
        Self {
            center: Point3::from(axes * local_center),
            axes,
            half_extents: (max - min) * 0.5,
        }
    }

    /// Returns the box center in world space.
    #[inline]
    pub fn center(&self) -> Point3<f32> {
        self.center
    }

    /// Returns the `i`th box axis (0, 1 or 2).
    #[inline]
    pub fn axis(&self, i: usize) -> Vector3<f32> {
        self.axes.column(i).into_owned()
    }

    /// Returns the half-extents along each axis.
    #[inline]
    pub fn half_extents(&self) -> Vector3<f32> {
        self.half_extents
    }

    /// Returns the index of the axis with the largest extent.
    pub fn longest_axis(&self) -> usize {
        self.half_extents.imax()
    }
}
