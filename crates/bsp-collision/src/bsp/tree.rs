//! BSP tree container.

use nalgebra::{Point3, Vector3};

use crate::{BspStorage, PolygonRef};

use super::collision::{
    find_last_line_intersection, find_line_intersection, find_moving_sphere_intersection, LineHit,
    SphereHit,
};
use super::node::NodeRef;

/// A built Binary Space Partitioning tree.
///
/// The tree owns the arena holding all of its polygons and nodes. It is
/// built bottom-up, so the root is the last node in the arena. A tree
/// never changes after it is built and can be queried from any number of
/// threads at once.
///
/// # Construction
///
/// Trees come from [`BspTreeBuilder::build`](super::BspTreeBuilder::build)
/// or [`read_tree`](crate::read_tree).
///
/// # Queries
///
/// ```ignore
/// if let Some(hit) = tree.find_moving_sphere_intersection(start, delta, 0.5, COLLIDE_ALL) {
///     let stop = start + delta * hit.t;
/// }
/// ```
#[derive(Debug)]
pub struct BspTree {
    storage: BspStorage,
}

impl BspTree {
    /// Wraps a storage holding at least one node.
    pub(crate) fn from_storage(storage: BspStorage) -> Self {
        debug_assert!(storage.node_count() > 0, "a tree needs a root node");
        Self { storage }
    }

    /// Returns the root node.
    #[inline]
    pub fn root(&self) -> NodeRef<'_> {
        self.storage
            .last_node()
            .expect("a built tree always has a root node")
    }

    /// Returns the arena holding the tree's polygons and nodes.
    #[inline]
    pub fn storage(&self) -> &BspStorage {
        &self.storage
    }

    /// Returns the number of distinct polygons in the tree.
    #[inline]
    pub fn polygon_count(&self) -> usize {
        self.storage.polygon_count()
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.storage.node_count()
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.storage.vertex_count()
    }

    /// Returns the maximum depth of the tree (1 for a single leaf).
    pub fn depth(&self) -> usize {
        self.root().depth()
    }

    /// Collects the polygons of every node, parents before children and
    /// positive subtrees before negative ones.
    ///
    /// A polygon stored in several nodes appears once per node.
    pub fn collect_polygons(&self) -> Vec<PolygonRef<'_>> {
        let mut result = Vec::new();
        collect_polygons_recursive(self.root(), &mut result);
        result
    }

    /// Finds the first polygon hit by the segment `start + delta * t`, `t` in `[0, 1)`.
    pub fn find_line_intersection(
        &self,
        start: Point3<f32>,
        delta: Vector3<f32>,
        collision_mask: u32,
    ) -> Option<LineHit<'_>> {
        find_line_intersection(self.root(), start, delta, collision_mask)
    }

    /// Finds the last polygon hit by the segment `start + delta * t`, `t` in `(0, 1]`.
    pub fn find_last_line_intersection(
        &self,
        start: Point3<f32>,
        delta: Vector3<f32>,
        collision_mask: u32,
    ) -> Option<LineHit<'_>> {
        find_last_line_intersection(self.root(), start, delta, collision_mask)
    }

    /// Finds the first contact of a sphere moving from `start` by `delta`.
    pub fn find_moving_sphere_intersection(
        &self,
        start: Point3<f32>,
        delta: Vector3<f32>,
        radius: f32,
        collision_mask: u32,
    ) -> Option<SphereHit<'_>> {
        find_moving_sphere_intersection(self.root(), start, delta, radius, collision_mask)
    }
}

fn collect_polygons_recursive<'a>(node: NodeRef<'a>, result: &mut Vec<PolygonRef<'a>>) {
    result.extend(node.polygons());
    if let Some(positive) = node.positive() {
        collect_polygons_recursive(positive, result);
    }
    if let Some(negative) = node.negative() {
        collect_polygons_recursive(negative, result);
    }
}
