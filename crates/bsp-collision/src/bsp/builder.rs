//! Recursive BSP tree construction.

use std::mem;
use std::time::Instant;

use log::{debug, info, trace};
use nalgebra::Point3;

use crate::{
    ArenaConfig, BspStorage, BuildProgress, NodeHandle, Plane3D, PlaneSide, PolygonHandle,
    ProgressSink,
};

use super::selector::{SplitDecision, SplitSelector};
use super::tree::BspTree;

/// Squared distance below which two submitted vertices are merged.
const WELD_DISTANCE_SQUARED: f32 = f32::MIN_POSITIVE;

/// Collects polygons and builds a [`BspTree`] from them.
///
/// Polygons are submitted with [`add_polygon`](Self::add_polygon), then
/// [`build`](Self::build) partitions them with a [`SplitSelector`]:
///
/// ```ignore
/// let mut builder = BspTreeBuilder::new();
/// for (id, wall) in walls.iter().enumerate() {
///     builder.add_polygon(wall, id as i32, COLLIDE_ALL);
/// }
/// let tree = builder.build(&BalanceSplitSelector::new(0));
/// ```
///
/// Build progress can be watched from another thread through the handle
/// returned by [`progress_handle`](Self::progress_handle).
#[derive(Debug)]
pub struct BspTreeBuilder {
    config: ArenaConfig,
    storage: BspStorage,
    polygons: Vec<PolygonHandle>,
    progress: BuildProgress,
}

impl Default for BspTreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BspTreeBuilder {
    /// Creates a builder with the default arena chunk sizes.
    pub fn new() -> Self {
        Self::with_config(ArenaConfig::default())
    }

    /// Creates a builder whose trees use the given arena chunk sizes.
    pub fn with_config(config: ArenaConfig) -> Self {
        Self {
            config,
            storage: BspStorage::with_config(config),
            polygons: Vec::new(),
            progress: BuildProgress::new(),
        }
    }

    /// Submits a polygon.
    ///
    /// Points are in clockwise order seen from the front. Polygons with
    /// fewer than 3 points or a zero-length edge are dropped silently.
    /// Points matching an already submitted vertex share its storage.
    pub fn add_polygon(&mut self, points: &[Point3<f32>], id: i32, collision_mask: u32) {
        if !is_polygon_valid(points) {
            trace!("bsp: dropped degenerate polygon {id} with {} points", points.len());
            return;
        }

        let indices: Vec<u32> = points.iter().map(|&p| self.weld_vertex(p)).collect();
        let handle = self.storage.create_polygon(&indices, id, collision_mask);
        self.polygons.push(handle);

        if self.polygons.len() % 1000 == 0 {
            debug!("bsp: added polygon {}", self.polygons.len());
        }
    }

    /// Returns the index of a stored vertex at `point`, adding one if needed.
    fn weld_vertex(&mut self, point: Point3<f32>) -> u32 {
        let existing = self
            .storage
            .vertices()
            .iter()
            .position(|v| (v - point).norm_squared() < WELD_DISTANCE_SQUARED);
        match existing {
            Some(index) => index as u32,
            None => self.storage.add_vertex(point),
        }
    }

    /// Discards all submitted polygons and starts a fresh tree.
    pub fn remove_polygons(&mut self) {
        self.storage = BspStorage::with_config(self.config);
        self.polygons.clear();
        self.progress.set(0.0);
    }

    /// Returns the number of accepted polygons.
    #[inline]
    pub fn polygon_count(&self) -> usize {
        self.polygons.len()
    }

    /// Returns the number of distinct vertices of the accepted polygons.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.storage.vertex_count()
    }

    /// Returns a handle for polling build progress, from any thread.
    pub fn progress_handle(&self) -> BuildProgress {
        self.progress.clone()
    }

    /// Returns the progress of the running or last build in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        self.progress.progress()
    }

    /// Builds a tree from the submitted polygons.
    ///
    /// The builder is left empty, as after [`remove_polygons`](Self::remove_polygons),
    /// except that its progress stays at 1 until the next reset.
    /// An empty builder yields a tree whose root is a leaf with the zero
    /// plane and no polygons.
    pub fn build<S: SplitSelector + ?Sized>(&mut self, selector: &S) -> BspTree {
        let start = Instant::now();
        let polygons = mem::take(&mut self.polygons);
        let mut storage = mem::replace(&mut self.storage, BspStorage::with_config(self.config));

        self.progress.set(0.0);
        let mut tracker = ProgressTracker::new(&self.progress, selector.guess_work(polygons.len()));

        if build_node(&mut storage, selector, &mut tracker, &polygons).is_none() {
            storage.create_node(Plane3D::zero(), &[], None, None);
        }
        tracker.finish();

        let tree = BspTree::from_storage(storage);
        info!(
            "bsp: build done: time {:.3} seconds, depth {} levels, total {} polys, {} verts",
            start.elapsed().as_secs_f64(),
            tree.depth(),
            tree.polygon_count(),
            tree.vertex_count(),
        );
        tree
    }
}

/// Returns true if the polygon has at least 3 edges of non-zero length.
fn is_polygon_valid(points: &[Point3<f32>]) -> bool {
    if points.len() < 3 {
        return false;
    }
    let closing = (points[0], points[points.len() - 1]);
    points
        .windows(2)
        .map(|pair| (pair[0], pair[1]))
        .chain(std::iter::once(closing))
        .all(|(a, b)| (b - a).norm_squared() > WELD_DISTANCE_SQUARED)
}

/// Turns work reported by a selector into the shared progress fraction.
struct ProgressTracker<'a> {
    progress: &'a BuildProgress,
    work_done: f64,
    work_total: f64,
    last_logged: f32,
}

impl<'a> ProgressTracker<'a> {
    fn new(progress: &'a BuildProgress, work_total: f64) -> Self {
        Self {
            progress,
            work_done: 0.0,
            work_total,
            last_logged: 0.0,
        }
    }

    fn set(&mut self, fraction: f32) {
        self.progress.set(fraction);
        if fraction - self.last_logged > 0.01 {
            debug!("bsp: build progress {:.0}%", fraction * 100.0);
            self.last_logged = fraction;
        }
    }

    fn finish(&mut self) {
        self.set(1.0);
    }
}

impl ProgressSink for ProgressTracker<'_> {
    fn add_progress(&mut self, work: f64) {
        if self.work_total <= 0.0 {
            return;
        }
        self.work_done = (self.work_done + work).min(self.work_total);
        self.set((self.work_done / self.work_total) as f32);
    }
}

/// Polygons sorted by their side of a split plane.
struct Partition {
    negative: Vec<PolygonHandle>,
    on: Vec<PolygonHandle>,
    positive: Vec<PolygonHandle>,
}

/// Sorts polygons into the negative, on-plane and positive sets.
///
/// A straddling polygon goes into both side sets. Returns `None` unless
/// more polygons lie entirely in front and entirely behind than straddle.
fn partition(storage: &BspStorage, polygons: &[PolygonHandle], plane: &Plane3D) -> Option<Partition> {
    let mut result = Partition {
        negative: Vec::new(),
        on: Vec::new(),
        positive: Vec::new(),
    };
    let mut front_only = 0;
    let mut behind_only = 0;
    let mut straddling = 0;

    for &handle in polygons {
        let mut behind = false;
        let mut front = false;
        for vertex in storage.polygon(handle).vertices() {
            match plane.classify_point(vertex) {
                PlaneSide::Front => front = true,
                PlaneSide::Back => behind = true,
                PlaneSide::OnPlane => {}
            }
        }

        if !behind && !front {
            result.on.push(handle);
            continue;
        }
        if behind {
            result.negative.push(handle);
        }
        if front {
            result.positive.push(handle);
        }
        match (behind, front) {
            (true, true) => straddling += 1,
            (true, false) => behind_only += 1,
            (false, true) => front_only += 1,
            (false, false) => unreachable!("polygon is on the plane"),
        }
    }

    (front_only > straddling && behind_only > straddling).then_some(result)
}

/// Builds the subtree for `polygons` and returns its root.
///
/// Children are created before their parent, positive side first.
fn build_node<S: SplitSelector + ?Sized>(
    storage: &mut BspStorage,
    selector: &S,
    progress: &mut ProgressTracker<'_>,
    polygons: &[PolygonHandle],
) -> Option<NodeHandle> {
    let first = *polygons.first()?;

    let decision = if polygons.len() > 1 {
        let views: Vec<_> = polygons.iter().map(|&h| storage.polygon(h)).collect();
        selector.split_plane(&views, progress)
    } else {
        SplitDecision::Leaf { fallback: None }
    };

    let plane = match decision {
        SplitDecision::Split(plane) => plane,
        SplitDecision::Leaf { fallback } => {
            let plane = fallback.unwrap_or(*storage.polygon(first).plane());
            return Some(storage.create_node(plane, polygons, None, None));
        }
    };

    let Some(Partition {
        negative,
        on,
        positive,
    }) = partition(storage, polygons, &plane)
    else {
        return Some(storage.create_node(plane, polygons, None, None));
    };

    let positive_node = build_node(storage, selector, progress, &positive);
    drop(positive);
    let negative_node = build_node(storage, selector, progress, &negative);
    drop(negative);

    Some(storage.create_node(plane, &on, positive_node, negative_node))
}
