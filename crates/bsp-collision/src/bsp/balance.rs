//! Balance-optimizing split selector.

use crate::{PolygonRef, ProgressSink};

use super::selector::{depth_guess, plane_score, SplitDecision, SplitSelector};

/// Chooses the polygon plane that separates the set most evenly.
///
/// Every candidate is scored with [`plane_score`] against the whole set, so
/// one call costs O(n²). `poly_skip` skips that many candidates after each
/// one evaluated, trading tree quality for build speed.
#[derive(Debug, Clone, Copy, Default)]
pub struct BalanceSplitSelector {
    poly_skip: usize,
}

impl BalanceSplitSelector {
    /// Creates a selector evaluating every `poly_skip + 1`th polygon plane.
    pub fn new(poly_skip: usize) -> Self {
        Self { poly_skip }
    }

    #[inline]
    pub fn poly_skip(&self) -> usize {
        self.poly_skip
    }
}

impl SplitSelector for BalanceSplitSelector {
    fn guess_work(&self, polygon_count: usize) -> f64 {
        let half = (polygon_count / 2 + 1) as f64;
        half * half * depth_guess(polygon_count) / 1.5 / (self.poly_skip + 1) as f64
    }

    /// # Panics
    /// Panics if `polygons` is empty.
    fn split_plane(
        &self,
        polygons: &[PolygonRef<'_>],
        progress: &mut dyn ProgressSink,
    ) -> SplitDecision {
        assert!(!polygons.is_empty(), "cannot select a split plane for no polygons");

        let work_unit = polygons.len() as f64;
        let mut best: Option<(usize, usize)> = None;

        for (i, candidate) in polygons.iter().enumerate().step_by(self.poly_skip + 1) {
            progress.add_progress(work_unit);

            let score = plane_score(candidate.plane(), polygons);
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((i, score));
            }
        }

        let (index, score) = best.expect("first candidate is always evaluated");
        let plane = *polygons[index].plane();

        if !plane.is_finite() {
            SplitDecision::Leaf { fallback: None }
        } else if score == 0 {
            SplitDecision::Leaf {
                fallback: Some(plane),
            }
        } else {
            SplitDecision::Split(plane)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BspStorage, PolygonHandle, COLLIDE_ALL};
    use assert_approx_eq::assert_approx_eq;
    use nalgebra::Point3;

    /// Unit quad lying in a plane of constant x.
    fn make_quad(storage: &mut BspStorage, x: f32, id: i32) -> PolygonHandle {
        storage.create_polygon_from_points(
            &[
                Point3::new(x, 0.0, 0.0),
                Point3::new(x, 1.0, 0.0),
                Point3::new(x, 1.0, 1.0),
                Point3::new(x, 0.0, 1.0),
            ],
            id,
            COLLIDE_ALL,
        )
    }

    fn make_triangle(storage: &mut BspStorage, a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> PolygonHandle {
        storage.create_polygon_from_points(
            &[
                Point3::new(a[0], a[1], a[2]),
                Point3::new(b[0], b[1], b[2]),
                Point3::new(c[0], c[1], c[2]),
            ],
            0,
            COLLIDE_ALL,
        )
    }

    /// Four parallel quads split 2/2 by a fifth one in the middle.
    fn divided_quads(storage: &mut BspStorage) -> Vec<PolygonHandle> {
        [-2.0, -1.0, 0.0, 1.0, 2.0]
            .iter()
            .enumerate()
            .map(|(i, &x)| make_quad(storage, x, i as i32))
            .collect()
    }

    #[test]
    fn selects_plane_splitting_evenly() {
        let mut storage = BspStorage::new();
        let handles = divided_quads(&mut storage);
        let polygons: Vec<_> = handles.iter().map(|&h| storage.polygon(h)).collect();

        let decision = BalanceSplitSelector::new(0).split_plane(&polygons, &mut |_: f64| {});
        let plane = decision.split_plane().expect("2/2 split must be accepted");

        assert_eq!(plane, *polygons[2].plane());
        assert_eq!(plane_score(&plane, &polygons), 2);
    }

    #[test]
    fn poly_skip_limits_candidates() {
        let mut storage = BspStorage::new();
        let handles = divided_quads(&mut storage);
        let polygons: Vec<_> = handles.iter().map(|&h| storage.polygon(h)).collect();

        let mut full = 0.0;
        BalanceSplitSelector::new(0).split_plane(&polygons, &mut |w: f64| full += w);
        assert_eq!(full, 25.0);

        // Candidates 0, 2 and 4; the divider is still among them.
        let mut skipped = 0.0;
        let decision = BalanceSplitSelector::new(1).split_plane(&polygons, &mut |w: f64| skipped += w);
        assert_eq!(skipped, 15.0);
        assert_eq!(decision.split_plane(), Some(*polygons[2].plane()));
    }

    #[test]
    fn coplanar_polygons_decline_with_fallback() {
        let mut storage = BspStorage::new();
        let a = make_triangle(&mut storage, [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        let b = make_triangle(&mut storage, [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]);
        let polygons = [storage.polygon(a), storage.polygon(b)];

        let decision = BalanceSplitSelector::new(0).split_plane(&polygons, &mut |_: f64| {});
        assert_eq!(
            decision,
            SplitDecision::Leaf {
                fallback: Some(*polygons[0].plane())
            }
        );
    }

    #[test]
    fn guess_work_formula() {
        let selector = BalanceSplitSelector::new(0);
        // (8/2+1)^2 * 3 / 1.5
        assert_approx_eq!(selector.guess_work(8), 50.0, 1e-9);
        assert_approx_eq!(BalanceSplitSelector::new(1).guess_work(8), 25.0, 1e-9);
        assert!(selector.guess_work(1) > 0.0);
    }
}
