//! Arena storage shared by all polygons and nodes of a BSP tree.
//!
//! Polygon and node records live in fixed-capacity chunks. A chunk is never
//! reallocated once created, so a record keeps its address for the lifetime
//! of the storage. Records are only ever appended; the storage is dropped
//! as a whole together with its tree.

use nalgebra::Point3;

use crate::bsp::{BspNode, NodeRef};
use crate::{BspPolygon, Plane3D, PolygonRef};

/// Chunk sizes used when allocating records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Number of polygon records allocated at once.
    pub polygon_chunk: usize,
    /// Number of node records allocated at once.
    pub node_chunk: usize,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            polygon_chunk: 200,
            node_chunk: 100,
        }
    }
}

/// Position of a record inside a [`ChunkList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Slot {
    chunk: u32,
    index: u32,
}

/// Handle to a polygon record in a [`BspStorage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PolygonHandle(Slot);

/// Handle to a node record in a [`BspStorage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle(Slot);

/// Append-only list of fixed-capacity chunks.
#[derive(Debug)]
struct ChunkList<T> {
    chunks: Vec<Vec<T>>,
    chunk_size: usize,
    len: usize,
}

impl<T> ChunkList<T> {
    fn new(chunk_size: usize) -> Self {
        Self {
            chunks: Vec::new(),
            chunk_size: chunk_size.max(1),
            len: 0,
        }
    }

    fn set_chunk_size(&mut self, chunk_size: usize) {
        self.chunk_size = chunk_size.max(1);
    }

    fn push(&mut self, item: T) -> Slot {
        // Pushing within capacity never moves existing items.
        let needs_chunk = self
            .chunks
            .last()
            .is_none_or(|chunk| chunk.len() >= chunk.capacity());
        if needs_chunk {
            self.chunks.push(Vec::with_capacity(self.chunk_size));
        }

        let chunk_index = self.chunks.len() - 1;
        let chunk = &mut self.chunks[chunk_index];
        chunk.push(item);
        self.len += 1;

        Slot {
            chunk: chunk_index as u32,
            index: (chunk.len() - 1) as u32,
        }
    }

    #[inline]
    fn get(&self, slot: Slot) -> &T {
        &self.chunks[slot.chunk as usize][slot.index as usize]
    }

    /// Finds the slot of the `i`th record by scanning the chunks.
    ///
    /// # Panics
    /// Panics if `i` is out of range.
    fn slot_at(&self, mut i: usize) -> Slot {
        for (chunk_index, chunk) in self.chunks.iter().enumerate() {
            if i < chunk.len() {
                return Slot {
                    chunk: chunk_index as u32,
                    index: i as u32,
                };
            }
            i -= chunk.len();
        }
        panic!("record index out of range (len {})", self.len);
    }

    /// Finds the global index of a record from its address.
    ///
    /// # Panics
    /// Panics if the record does not belong to this list.
    fn index_of(&self, item: &T) -> usize {
        let ptr = item as *const T;
        let mut base = 0;
        for chunk in &self.chunks {
            let range = chunk.as_ptr_range();
            if range.contains(&ptr) {
                let offset = (ptr as usize - range.start as usize) / std::mem::size_of::<T>();
                return base + offset;
            }
            base += chunk.len();
        }
        panic!("record does not belong to this storage");
    }

    fn last(&self) -> Option<&T> {
        self.chunks.last().and_then(|chunk| chunk.last())
    }

    #[inline]
    fn len(&self) -> usize {
        self.len
    }
}

/// Shared storage for all per-polygon and per-node data of a BSP tree.
///
/// The vertex, index and edge-plane pools are plain append-only vectors.
/// Every polygon edge contributes one index and one edge plane, appended
/// together, so `indices.len() == edge_planes.len()` always holds.
#[derive(Debug)]
pub struct BspStorage {
    pub(crate) vertices: Vec<Point3<f32>>,
    pub(crate) indices: Vec<u32>,
    pub(crate) edge_planes: Vec<Plane3D>,
    pub(crate) node_polygons: Vec<PolygonHandle>,
    polygons: ChunkList<BspPolygon>,
    nodes: ChunkList<BspNode>,
}

impl Default for BspStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl BspStorage {
    /// Creates empty storage with the default chunk sizes.
    pub fn new() -> Self {
        Self::with_config(ArenaConfig::default())
    }

    /// Creates empty storage with the given chunk sizes.
    pub fn with_config(config: ArenaConfig) -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            edge_planes: Vec::new(),
            node_polygons: Vec::new(),
            polygons: ChunkList::new(config.polygon_chunk),
            nodes: ChunkList::new(config.node_chunk),
        }
    }

    /// Sets the number of polygons to allocate at once. Values below 1 clamp to 1.
    pub fn set_polygon_chunk(&mut self, size: usize) {
        self.polygons.set_chunk_size(size);
    }

    /// Sets the number of nodes to allocate at once. Values below 1 clamp to 1.
    pub fn set_node_chunk(&mut self, size: usize) {
        self.nodes.set_chunk_size(size);
    }

    /// Appends a vertex to the shared vertex pool and returns its index.
    pub fn add_vertex(&mut self, vertex: Point3<f32>) -> u32 {
        self.vertices.push(vertex);
        (self.vertices.len() - 1) as u32
    }

    /// Returns all vertices in the shared pool.
    #[inline]
    pub fn vertices(&self) -> &[Point3<f32>] {
        &self.vertices
    }

    /// Creates a polygon from vertices already in the vertex pool.
    ///
    /// # Panics
    /// Panics if fewer than 3 indices are given or an index is out of range.
    pub fn create_polygon(&mut self, indices: &[u32], id: i32, collision_mask: u32) -> PolygonHandle {
        let record = BspPolygon::create(self, indices, id, collision_mask);
        PolygonHandle(self.polygons.push(record))
    }

    /// Creates a polygon from raw positions, adding one new vertex per corner.
    ///
    /// No vertex sharing is attempted; see the tree builder for welding.
    pub fn create_polygon_from_points(
        &mut self,
        points: &[Point3<f32>],
        id: i32,
        collision_mask: u32,
    ) -> PolygonHandle {
        let indices: Vec<u32> = points.iter().map(|&p| self.add_vertex(p)).collect();
        self.create_polygon(&indices, id, collision_mask)
    }

    /// Creates a node.
    ///
    /// `polygons` are the polygons lying on the node plane; `positive` and
    /// `negative` are the subtrees of the two half spaces.
    pub fn create_node(
        &mut self,
        plane: Plane3D,
        polygons: &[PolygonHandle],
        positive: Option<NodeHandle>,
        negative: Option<NodeHandle>,
    ) -> NodeHandle {
        let first_polygon = self.node_polygons.len() as u32;
        self.node_polygons.extend_from_slice(polygons);
        let node = BspNode::new(plane, first_polygon, polygons.len() as u32, positive, negative);
        NodeHandle(self.nodes.push(node))
    }

    /// Returns the polygon for a handle.
    #[inline]
    pub fn polygon(&self, handle: PolygonHandle) -> PolygonRef<'_> {
        PolygonRef::new(self, self.polygons.get(handle.0))
    }

    /// Returns the node for a handle.
    #[inline]
    pub fn node(&self, handle: NodeHandle) -> NodeRef<'_> {
        NodeRef::new(self, self.nodes.get(handle.0))
    }

    /// Returns the handle of the `i`th polygon in creation order.
    ///
    /// # Panics
    /// Panics if `i >= self.polygon_count()`.
    pub fn polygon_handle_at(&self, i: usize) -> PolygonHandle {
        PolygonHandle(self.polygons.slot_at(i))
    }

    /// Returns the `i`th polygon in creation order.
    ///
    /// # Panics
    /// Panics if `i >= self.polygon_count()`.
    pub fn polygon_at(&self, i: usize) -> PolygonRef<'_> {
        self.polygon(self.polygon_handle_at(i))
    }

    /// Returns the `i`th node in creation order.
    ///
    /// # Panics
    /// Panics if `i >= self.node_count()`.
    pub fn node_at(&self, i: usize) -> NodeRef<'_> {
        self.node(NodeHandle(self.nodes.slot_at(i)))
    }

    /// Returns the creation-order index of a polygon of this storage.
    ///
    /// # Panics
    /// Panics if the polygon belongs to another storage.
    pub fn polygon_index(&self, polygon: &PolygonRef<'_>) -> usize {
        self.polygons.index_of(polygon.record())
    }

    /// Returns the most recently created node.
    pub fn last_node(&self) -> Option<NodeRef<'_>> {
        self.nodes.last().map(|node| NodeRef::new(self, node))
    }

    /// Returns the number of polygons in storage.
    #[inline]
    pub fn polygon_count(&self) -> usize {
        self.polygons.len()
    }

    /// Returns the number of nodes in storage.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the number of vertices in storage.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Returns the total number of polygon references held by nodes.
    #[inline]
    pub fn node_polygon_count(&self) -> usize {
        self.node_polygons.len()
    }
}
