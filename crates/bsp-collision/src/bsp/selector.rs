//! Split plane selection strategies for BSP tree construction.
//!
//! The choice of splitting plane affects tree balance and the time needed
//! to build the tree. [`BalanceSplitSelector`](super::BalanceSplitSelector)
//! tries every polygon plane and keeps the most even split, while
//! [`BoxSplitSelector`](super::BoxSplitSelector) cuts the bounding box of
//! the polygon set in half.

use crate::{Plane3D, PlaneSide, PolygonRef, ProgressSink};

/// Result of asking a [`SplitSelector`] for a splitting plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SplitDecision {
    /// Partition the set with this plane.
    Split(Plane3D),

    /// Keep the whole set in a single leaf.
    ///
    /// `fallback` is the best plane the selector found, if it is finite.
    /// The leaf uses it as its plane.
    Leaf { fallback: Option<Plane3D> },
}

impl SplitDecision {
    /// Returns the splitting plane if the decision is to split.
    #[inline]
    pub fn split_plane(&self) -> Option<Plane3D> {
        match *self {
            Self::Split(plane) => Some(plane),
            Self::Leaf { .. } => None,
        }
    }
}

/// Strategy for choosing the plane that partitions a polygon set.
pub trait SplitSelector {
    /// Estimates the total work for building a tree of `polygon_count`
    /// polygons, in the same units the selector reports to the progress sink.
    ///
    /// Used only to turn reported work into a progress fraction.
    fn guess_work(&self, polygon_count: usize) -> f64;

    /// Chooses a splitting plane for a non-empty polygon set.
    ///
    /// Work done is reported to `progress`. Returning
    /// [`SplitDecision::Leaf`] tells the builder to stop dividing the set.
    fn split_plane(
        &self,
        polygons: &[PolygonRef<'_>],
        progress: &mut dyn ProgressSink,
    ) -> SplitDecision;
}

/// Scores a candidate plane by how evenly it separates the polygons.
///
/// Returns `min(positive, negative)`, where `positive` counts polygons with
/// every vertex at least [`PLANE_THICKNESS`](crate::PLANE_THICKNESS) in front of the plane and
/// `negative` those with every vertex at least that far behind it.
/// Straddling and on-plane polygons do not count.
pub fn plane_score(plane: &Plane3D, polygons: &[PolygonRef<'_>]) -> usize {
    let mut positive = 0;
    let mut negative = 0;

    for polygon in polygons {
        let mut front = 0;
        let mut back = 0;
        for vertex in polygon.vertices() {
            match plane.classify_point(vertex) {
                PlaneSide::Front => front += 1,
                PlaneSide::Back => back += 1,
                PlaneSide::OnPlane => {}
            }
        }

        let count = polygon.vertex_count();
        if front == count {
            positive += 1;
        } else if back == count {
            negative += 1;
        }
    }

    positive.min(negative)
}

/// Guesses the tree depth for `polygon_count` polygons: `floor(log2(n))`,
/// at least 1.
pub(crate) fn depth_guess(polygon_count: usize) -> f64 {
    if polygon_count < 2 {
        return 1.0;
    }
    f64::from(polygon_count.ilog2()).max(1.0)
}
