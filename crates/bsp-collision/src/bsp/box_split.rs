//! Bounding-box split selector.

use nalgebra::Point3;

use crate::{OrientedBox, Plane3D, PolygonRef, ProgressSink};

use super::selector::{depth_guess, SplitDecision, SplitSelector};

/// Tolerance for the split normal's deviation from unit length.
const NORMAL_LENGTH_TOLERANCE: f32 = 1e-3;

/// Cuts the oriented bounding box of the polygon set in half.
///
/// The plane goes through the box center, perpendicular to the longest box
/// axis. One call is O(n) in the number of vertices, so building is much
/// faster than with [`BalanceSplitSelector`](super::BalanceSplitSelector)
/// at the cost of less even trees.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoxSplitSelector;

impl BoxSplitSelector {
    pub fn new() -> Self {
        Self
    }
}

impl SplitSelector for BoxSplitSelector {
    fn guess_work(&self, polygon_count: usize) -> f64 {
        polygon_count as f64 * depth_guess(polygon_count)
    }

    fn split_plane(
        &self,
        polygons: &[PolygonRef<'_>],
        progress: &mut dyn ProgressSink,
    ) -> SplitDecision {
        progress.add_progress(polygons.len() as f64);

        let points: Vec<Point3<f32>> = polygons.iter().flat_map(|p| p.vertices()).collect();
        let bounds = OrientedBox::fit(&points);

        let normal = bounds.axis(bounds.longest_axis());
        let plane = Plane3D::from_raw(normal, normal.dot(&bounds.center().coords));

        if !plane.is_finite() {
            return SplitDecision::Leaf { fallback: None };
        }
        if (normal.norm() - 1.0).abs() >= NORMAL_LENGTH_TOLERANCE {
            return SplitDecision::Leaf {
                fallback: Some(plane),
            };
        }
        SplitDecision::Split(plane)
    }
}
