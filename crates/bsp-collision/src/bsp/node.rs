//! BSP tree node implementation.

use std::fmt;

use crate::{BspStorage, NodeHandle, Plane3D, PolygonRef};

/// A node in the BSP tree.
///
/// Each node divides space about its plane into a positive and a negative
/// half space, stored in the respective child subtrees. Polygons lying on
/// the plane (within [`PLANE_THICKNESS`](crate::PLANE_THICKNESS)) are kept
/// at the node itself as a run in the storage's node-polygon pool.
///
/// A node without children is a leaf. Nodes are owned by [`BspStorage`]
/// and never change after creation.
#[derive(Debug, Clone)]
pub struct BspNode {
    /// The splitting plane for this node.
    plane: Plane3D,

    /// First entry of this node's run in the node-polygon pool.
    first_polygon: u32,

    /// Number of polygons on the node plane.
    polygon_count: u32,

    /// Subtree of the positive half space.
    positive: Option<NodeHandle>,

    /// Subtree of the negative half space.
    negative: Option<NodeHandle>,
}

impl BspNode {
    pub(crate) fn new(
        plane: Plane3D,
        first_polygon: u32,
        polygon_count: u32,
        positive: Option<NodeHandle>,
        negative: Option<NodeHandle>,
    ) -> Self {
        Self {
            plane,
            first_polygon,
            polygon_count,
            positive,
            negative,
        }
    }

    /// Returns a reference to the splitting plane.
    #[inline]
    pub fn plane(&self) -> &Plane3D {
        &self.plane
    }

    /// Checks if this node has any children.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.positive.is_none() && self.negative.is_none()
    }
}

/// A node together with the storage it lives in, for traversal.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    storage: &'a BspStorage,
    node: &'a BspNode,
}

impl<'a> NodeRef<'a> {
    pub(crate) fn new(storage: &'a BspStorage, node: &'a BspNode) -> Self {
        Self { storage, node }
    }

    /// Returns the underlying record.
    #[inline]
    pub fn record(&self) -> &'a BspNode {
        self.node
    }

    /// Returns a reference to the splitting plane.
    #[inline]
    pub fn plane(&self) -> &'a Plane3D {
        &self.node.plane
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.node.is_leaf()
    }

    /// Returns the positive half space subtree.
    #[inline]
    pub fn positive(&self) -> Option<NodeRef<'a>> {
        self.node.positive.map(|h| self.storage.node(h))
    }

    /// Returns the negative half space subtree.
    #[inline]
    pub fn negative(&self) -> Option<NodeRef<'a>> {
        self.node.negative.map(|h| self.storage.node(h))
    }

    /// Returns the number of polygons on the node plane.
    #[inline]
    pub fn polygon_count(&self) -> usize {
        self.node.polygon_count as usize
    }

    /// Returns the `i`th polygon on the node plane.
    ///
    /// As the plane has thickness, the polygon normal is not necessarily
    /// the same as the node plane normal.
    pub fn polygon(&self, i: usize) -> PolygonRef<'a> {
        assert!(i < self.polygon_count(), "node polygon index out of range");
        let handle = self.storage.node_polygons[self.node.first_polygon as usize + i];
        self.storage.polygon(handle)
    }

    /// Iterates over the polygons on the node plane.
    pub fn polygons(self) -> impl Iterator<Item = PolygonRef<'a>> + 'a {
        (0..self.polygon_count()).map(move |i| self.polygon(i))
    }

    /// Returns the depth of this subtree (1 for a leaf node).
    pub fn depth(&self) -> usize {
        let positive_depth = self.positive().map_or(0, |n| n.depth());
        let negative_depth = self.negative().map_or(0, |n| n.depth());
        1 + positive_depth.max(negative_depth)
    }

    /// Returns the number of nodes in this subtree, this node included.
    pub fn node_count(&self) -> usize {
        1 + self.positive().map_or(0, |n| n.node_count())
            + self.negative().map_or(0, |n| n.node_count())
    }

    /// Returns the total number of polygons in this subtree (including all descendants).
    pub fn subtree_polygon_count(&self) -> usize {
        self.polygon_count()
            + self.positive().map_or(0, |n| n.subtree_polygon_count())
            + self.negative().map_or(0, |n| n.subtree_polygon_count())
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("plane", self.plane())
            .field("polygons", &self.polygon_count())
            .field("positive", &self.positive())
            .field("negative", &self.negative())
            .finish()
    }
}
