//! Binary BSP tree files.
//!
//! A file is a tree of named chunks. Every chunk is laid out as
//!
//! ```text
//! u8      name length
//! [u8]    name (ASCII)
//! u32     payload length
//! [u8]    payload
//! ```
//!
//! and all numbers are little-endian. The top level `bsptree` chunk holds
//! the version, the node count, the number of node polygon references, a
//! `vertices` chunk, a `polygons` chunk and the root `node` chunk. Each
//! `node` chunk holds its plane, child flags (1 = positive, 2 = negative),
//! the child `node` chunks and the global indices of its polygons.
//!
//! Polygon planes are not stored; they are derived again from the
//! vertices, which reproduces them exactly.

use std::io::{self, Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt, LE};
use log::debug;
use nalgebra::{Point3, Vector3};
use thiserror::Error;

use crate::{ArenaConfig, BspStorage, BspTree, NodeHandle, NodeRef, Plane3D, PolygonHandle};

/// Version written to and expected in the `bsptree` chunk.
pub const BSP_FILE_VERSION: i32 = 6;

/// Largest arena chunk size taken from the counts in a file header.
const MAX_CHUNK_HINT: usize = 1 << 16;

const CHILD_POSITIVE: i32 = 1;
const CHILD_NEGATIVE: i32 = 2;

/// Errors from reading or writing BSP tree files.
#[derive(Debug, Error)]
pub enum BspFileError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("expected {expected} chunk, found {found:?}")]
    UnexpectedChunk {
        expected: &'static str,
        found: String,
    },
    #[error("unsupported BSP file version {0} (expected {expected})", expected = BSP_FILE_VERSION)]
    UnsupportedVersion(i32),
    #[error("negative {what} count {count}")]
    NegativeCount { what: &'static str, count: i32 },
    #[error("polygon {index} has {vertex_count} vertices")]
    InvalidPolygon { index: usize, vertex_count: i32 },
    #[error("vertex index {0} out of range")]
    VertexIndexOutOfRange(i32),
    #[error("polygon index {0} out of range")]
    PolygonIndexOutOfRange(i32),
}

/// Writes `tree` to `out`.
pub fn write_tree<W: Write>(tree: &BspTree, out: &mut W) -> Result<(), BspFileError> {
    let storage = tree.storage();
    let root = tree.root();
    debug!(
        "bsp: writing BSP tree of {} nodes, {} polygons",
        tree.node_count(),
        tree.polygon_count()
    );

    let mut payload = Vec::new();
    payload.write_i32::<LE>(BSP_FILE_VERSION)?;
    payload.write_i32::<LE>(count_to_i32(tree.node_count()))?;
    payload.write_i32::<LE>(count_to_i32(root.subtree_polygon_count()))?;

    let mut vertices = Vec::new();
    vertices.write_i32::<LE>(count_to_i32(storage.vertex_count()))?;
    for vertex in storage.vertices() {
        for &c in vertex.coords.iter() {
            vertices.write_f32::<LE>(c)?;
        }
    }
    write_chunk(&mut payload, "vertices", &vertices)?;

    let mut polygons = Vec::new();
    polygons.write_i32::<LE>(count_to_i32(storage.polygon_count()))?;
    for i in 0..storage.polygon_count() {
        let polygon = storage.polygon_at(i);
        polygons.write_i32::<LE>(polygon.id())?;
        polygons.write_i32::<LE>(count_to_i32(polygon.vertex_count()))?;
        polygons.write_u32::<LE>(polygon.collision_mask())?;
        for k in 0..polygon.vertex_count() {
            polygons.write_i32::<LE>(count_to_i32(polygon.vertex_index(k) as usize))?;
        }
    }
    write_chunk(&mut payload, "polygons", &polygons)?;

    write_node(&mut payload, storage, root)?;

    write_chunk(out, "bsptree", &payload)?;
    Ok(())
}

fn write_node(out: &mut Vec<u8>, storage: &BspStorage, node: NodeRef<'_>) -> io::Result<()> {
    debug!("bsp: writing node of {} polygons", node.polygon_count());

    let mut payload = Vec::new();
    let plane = node.plane();
    for &c in plane.normal().iter() {
        payload.write_f32::<LE>(c)?;
    }
    payload.write_f32::<LE>(plane.offset())?;

    let mut child_flags = 0;
    if node.positive().is_some() {
        child_flags |= CHILD_POSITIVE;
    }
    if node.negative().is_some() {
        child_flags |= CHILD_NEGATIVE;
    }
    payload.write_i32::<LE>(child_flags)?;
    if let Some(positive) = node.positive() {
        write_node(&mut payload, storage, positive)?;
    }
    if let Some(negative) = node.negative() {
        write_node(&mut payload, storage, negative)?;
    }

    payload.write_i32::<LE>(count_to_i32(node.polygon_count()))?;
    for polygon in node.polygons() {
        payload.write_i32::<LE>(count_to_i32(storage.polygon_index(&polygon)))?;
    }

    write_chunk(out, "node", &payload)
}

fn write_chunk<W: Write + ?Sized>(out: &mut W, name: &str, payload: &[u8]) -> io::Result<()> {
    let name_len = u8::try_from(name.len()).expect("chunk names are short");
    let payload_len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "chunk exceeds 4 GiB"))?;
    out.write_u8(name_len)?;
    out.write_all(name.as_bytes())?;
    out.write_u32::<LE>(payload_len)?;
    out.write_all(payload)
}

fn count_to_i32(count: usize) -> i32 {
    i32::try_from(count).expect("tree sizes fit the file format")
}

/// Reads a tree written by [`write_tree`].
pub fn read_tree<R: Read>(mut input: R) -> Result<BspTree, BspFileError> {
    let mut chunk = open_chunk(&mut input, "bsptree")?;

    let version = chunk.read_i32::<LE>()?;
    if version != BSP_FILE_VERSION {
        return Err(BspFileError::UnsupportedVersion(version));
    }
    let node_count = read_count(&mut chunk, "node")?;
    let node_polygon_count = read_count(&mut chunk, "node polygon")?;

    let vertices = read_vertices(&mut chunk)?;

    let mut polygons = open_chunk(&mut chunk, "polygons")?;
    let polygon_count = read_count(&mut polygons, "polygon")?;
    let mut storage = BspStorage::with_config(ArenaConfig {
        polygon_chunk: polygon_count.clamp(1, MAX_CHUNK_HINT),
        node_chunk: node_count.clamp(1, MAX_CHUNK_HINT),
    });
    storage
        .node_polygons
        .reserve(node_polygon_count.min(MAX_CHUNK_HINT));
    for vertex in vertices {
        storage.add_vertex(vertex);
    }

    let mut handles = Vec::new();
    for index in 0..polygon_count {
        handles.push(read_polygon(&mut polygons, &mut storage, index)?);
    }
    close_chunk(polygons)?;

    read_node(&mut chunk, &mut storage, &handles)?;
    close_chunk(chunk)?;

    Ok(BspTree::from_storage(storage))
}

fn read_vertices(input: &mut dyn Read) -> Result<Vec<Point3<f32>>, BspFileError> {
    let mut chunk = open_chunk(input, "vertices")?;
    let count = read_count(&mut chunk, "vertex")?;
    let mut vertices = Vec::new();
    for _ in 0..count {
        let x = chunk.read_f32::<LE>()?;
        let y = chunk.read_f32::<LE>()?;
        let z = chunk.read_f32::<LE>()?;
        vertices.push(Point3::new(x, y, z));
    }
    close_chunk(chunk)?;
    Ok(vertices)
}

fn read_polygon(
    input: &mut dyn Read,
    storage: &mut BspStorage,
    index: usize,
) -> Result<PolygonHandle, BspFileError> {
    let id = input.read_i32::<LE>()?;
    let vertex_count = input.read_i32::<LE>()?;
    let collision_mask = input.read_u32::<LE>()?;
    if vertex_count < 3 {
        return Err(BspFileError::InvalidPolygon {
            index,
            vertex_count,
        });
    }

    // The count comes from the file, so it only bounds the capacity hint.
    let mut indices = Vec::with_capacity((vertex_count as usize).min(storage.vertex_count()));
    for _ in 0..vertex_count {
        let vertex = input.read_i32::<LE>()?;
        match usize::try_from(vertex) {
            Ok(v) if v < storage.vertex_count() => indices.push(vertex as u32),
            _ => return Err(BspFileError::VertexIndexOutOfRange(vertex)),
        }
    }

    Ok(storage.create_polygon(&indices, id, collision_mask))
}

fn read_node(
    input: &mut dyn Read,
    storage: &mut BspStorage,
    polygons: &[PolygonHandle],
) -> Result<NodeHandle, BspFileError> {
    let mut chunk = open_chunk(input, "node")?;

    let x = chunk.read_f32::<LE>()?;
    let y = chunk.read_f32::<LE>()?;
    let z = chunk.read_f32::<LE>()?;
    let offset = chunk.read_f32::<LE>()?;
    let plane = Plane3D::from_raw(Vector3::new(x, y, z), offset);

    let child_flags = chunk.read_i32::<LE>()?;
    let positive = if child_flags & CHILD_POSITIVE != 0 {
        Some(read_node(&mut chunk, storage, polygons)?)
    } else {
        None
    };
    let negative = if child_flags & CHILD_NEGATIVE != 0 {
        Some(read_node(&mut chunk, storage, polygons)?)
    } else {
        None
    };

    let count = read_count(&mut chunk, "node polygon")?;
    let mut on_plane = Vec::new();
    for _ in 0..count {
        let index = chunk.read_i32::<LE>()?;
        match usize::try_from(index).ok().and_then(|i| polygons.get(i)) {
            Some(&handle) => on_plane.push(handle),
            None => return Err(BspFileError::PolygonIndexOutOfRange(index)),
        }
    }
    close_chunk(chunk)?;

    Ok(storage.create_node(plane, &on_plane, positive, negative))
}

/// Reads a chunk header and returns a reader limited to the chunk payload.
fn open_chunk<'r>(
    input: &'r mut dyn Read,
    expected: &'static str,
) -> Result<io::Take<&'r mut dyn Read>, BspFileError> {
    let name_len = input.read_u8()?;
    let mut name = vec![0; usize::from(name_len)];
    input.read_exact(&mut name)?;
    if name != expected.as_bytes() {
        return Err(BspFileError::UnexpectedChunk {
            expected,
            found: String::from_utf8_lossy(&name).into_owned(),
        });
    }

    let length = input.read_u32::<LE>()?;
    Ok(input.take(u64::from(length)))
}

/// Skips whatever is left of a chunk payload.
fn close_chunk<R: Read>(mut chunk: io::Take<R>) -> io::Result<()> {
    io::copy(&mut chunk, &mut io::sink())?;
    if chunk.limit() > 0 {
        return Err(io::ErrorKind::UnexpectedEof.into());
    }
    Ok(())
}

fn read_count(input: &mut dyn Read, what: &'static str) -> Result<usize, BspFileError> {
    let count = input.read_i32::<LE>()?;
    usize::try_from(count).map_err(|_| BspFileError::NegativeCount { what, count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BalanceSplitSelector, BoxSplitSelector, BspTreeBuilder, SplitSelector, COLLIDE_ALL};

    fn walls_tree<S: SplitSelector>(selector: &S) -> BspTree {
        let edges = [
            ([10.0, 10.0], [20.0, 20.0]),
            ([10.0, 25.0], [30.0, 25.0]),
            ([10.0, 40.0], [20.0, 30.0]),
            ([25.0, 30.0], [25.0, 50.0]),
            ([0.0, 0.0], [0.0, 60.0]),
            ([40.0, 60.0], [40.0, 0.0]),
        ];
        let mut builder = BspTreeBuilder::new();
        for (id, (a, b)) in edges.into_iter().enumerate() {
            let v0 = Point3::new(a[0], a[1], -20.0);
            let v1 = Point3::new(b[0], b[1], -20.0);
            let up = Vector3::new(0.0, 0.0, 40.0);
            let mask = 1 << (id % 3);
            builder.add_polygon(&[v0, v1, v1 + up, v0 + up], id as i32, mask);
        }
        builder.build(selector)
    }

    fn assert_same_nodes(a: NodeRef<'_>, b: NodeRef<'_>) {
        assert_eq!(a.plane(), b.plane());
        assert_eq!(a.polygon_count(), b.polygon_count());
        for (pa, pb) in a.polygons().zip(b.polygons()) {
            assert_eq!(pa, pb);
            assert_eq!(pa.plane(), pb.plane());
        }
        assert_eq!(a.positive().is_some(), b.positive().is_some());
        assert_eq!(a.negative().is_some(), b.negative().is_some());
        if let (Some(pa), Some(pb)) = (a.positive(), b.positive()) {
            assert_same_nodes(pa, pb);
        }
        if let (Some(na), Some(nb)) = (a.negative(), b.negative()) {
            assert_same_nodes(na, nb);
        }
    }

    fn round_trip(tree: &BspTree) -> BspTree {
        let mut bytes = Vec::new();
        write_tree(tree, &mut bytes).unwrap();
        read_tree(bytes.as_slice()).unwrap()
    }

    #[test]
    fn round_trip_preserves_tree() {
        for tree in [walls_tree(&BalanceSplitSelector::new(0)), walls_tree(&BoxSplitSelector::new())] {
            let loaded = round_trip(&tree);

            assert_eq!(loaded.polygon_count(), tree.polygon_count());
            assert_eq!(loaded.node_count(), tree.node_count());
            assert_eq!(loaded.vertex_count(), tree.vertex_count());
            for i in 0..tree.polygon_count() {
                let (a, b) = (tree.storage().polygon_at(i), loaded.storage().polygon_at(i));
                assert_eq!(a, b);
                assert_eq!(a.plane(), b.plane());
            }
            assert_same_nodes(tree.root(), loaded.root());

            let start = Point3::new(28.0, 8.0, -20.0);
            let delta = Vector3::new(-30.0, 30.0, 40.0);
            let expected = tree.find_line_intersection(start, delta, COLLIDE_ALL).map(|h| h.t);
            let actual = loaded.find_line_intersection(start, delta, COLLIDE_ALL).map(|h| h.t);
            assert_eq!(expected, actual);
        }
    }

    #[test]
    fn round_trip_empty_tree() {
        let tree = BspTreeBuilder::new().build(&BoxSplitSelector::new());
        let loaded = round_trip(&tree);

        assert_eq!(loaded.node_count(), 1);
        assert!(loaded.root().plane().is_degenerate());
    }

    #[test]
    fn rejects_wrong_root_chunk() {
        let mut bytes = Vec::new();
        write_chunk(&mut bytes, "mesh", &[0; 4]).unwrap();

        let err = read_tree(bytes.as_slice()).unwrap_err();
        assert!(matches!(err, BspFileError::UnexpectedChunk { expected: "bsptree", ref found } if found == "mesh"));
    }

    #[test]
    fn rejects_other_version() {
        let mut payload = Vec::new();
        payload.write_i32::<LE>(BSP_FILE_VERSION + 1).unwrap();
        let mut bytes = Vec::new();
        write_chunk(&mut bytes, "bsptree", &payload).unwrap();

        let err = read_tree(bytes.as_slice()).unwrap_err();
        assert!(matches!(err, BspFileError::UnsupportedVersion(v) if v == BSP_FILE_VERSION + 1));
    }

    #[test]
    fn truncated_data_is_io_error() {
        let tree = walls_tree(&BalanceSplitSelector::new(0));
        let mut bytes = Vec::new();
        write_tree(&tree, &mut bytes).unwrap();
        bytes.truncate(bytes.len() / 2);

        let err = read_tree(bytes.as_slice()).unwrap_err();
        assert!(matches!(err, BspFileError::Io(ref e) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    fn file_with_triangle(indices: [i32; 3], node_polygon: i32) -> Vec<u8> {
        file_with_polygon(3, &indices, node_polygon)
    }

    /// Builds a file with three vertices and one polygon record claiming
    /// `vertex_count` corners, followed by `indices`.
    fn file_with_polygon(vertex_count: i32, indices: &[i32], node_polygon: i32) -> Vec<u8> {
        let mut vertices = Vec::new();
        vertices.write_i32::<LE>(3).unwrap();
        for v in [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
            for c in v {
                vertices.write_f32::<LE>(c).unwrap();
            }
        }

        let mut polygons = Vec::new();
        polygons.write_i32::<LE>(1).unwrap();
        polygons.write_i32::<LE>(0).unwrap();
        polygons.write_i32::<LE>(vertex_count).unwrap();
        polygons.write_u32::<LE>(COLLIDE_ALL).unwrap();
        for &i in indices {
            polygons.write_i32::<LE>(i).unwrap();
        }

        let mut node = Vec::new();
        for c in [0.0f32, 0.0, 1.0, 0.0] {
            node.write_f32::<LE>(c).unwrap();
        }
        node.write_i32::<LE>(0).unwrap();
        node.write_i32::<LE>(1).unwrap();
        node.write_i32::<LE>(node_polygon).unwrap();

        let mut payload = Vec::new();
        payload.write_i32::<LE>(BSP_FILE_VERSION).unwrap();
        payload.write_i32::<LE>(1).unwrap();
        payload.write_i32::<LE>(1).unwrap();
        write_chunk(&mut payload, "vertices", &vertices).unwrap();
        write_chunk(&mut payload, "polygons", &polygons).unwrap();
        write_chunk(&mut payload, "node", &node).unwrap();

        let mut bytes = Vec::new();
        write_chunk(&mut bytes, "bsptree", &payload).unwrap();
        bytes
    }

    #[test]
    fn reads_hand_written_file() {
        let tree = read_tree(file_with_triangle([0, 1, 2], 0).as_slice()).unwrap();
        let hit = tree
            .find_line_intersection(Point3::new(0.2, 0.2, 1.0), Vector3::new(0.0, 0.0, -2.0), COLLIDE_ALL)
            .expect("triangle is hit");
        assert_eq!(hit.polygon.id(), 0);
    }

    #[test]
    fn rejects_bad_vertex_index() {
        let err = read_tree(file_with_triangle([0, 1, 3], 0).as_slice()).unwrap_err();
        assert!(matches!(err, BspFileError::VertexIndexOutOfRange(3)));

        let err = read_tree(file_with_triangle([0, -1, 2], 0).as_slice()).unwrap_err();
        assert!(matches!(err, BspFileError::VertexIndexOutOfRange(-1)));
    }

    #[test]
    fn huge_vertex_count_is_an_error() {
        let bytes = file_with_polygon(i32::MAX, &[0, 1, 2], 0);
        let err = read_tree(bytes.as_slice()).unwrap_err();
        assert!(matches!(err, BspFileError::Io(ref e) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[test]
    fn too_few_vertices_is_an_error() {
        let bytes = file_with_polygon(2, &[0, 1], 0);
        let err = read_tree(bytes.as_slice()).unwrap_err();
        assert!(matches!(
            err,
            BspFileError::InvalidPolygon { index: 0, vertex_count: 2 }
        ));
    }

    #[test]
    fn rejects_bad_polygon_index() {
        let err = read_tree(file_with_triangle([0, 1, 2], 1).as_slice()).unwrap_err();
        assert!(matches!(err, BspFileError::PolygonIndexOutOfRange(1)));
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            BspFileError::UnsupportedVersion(2).to_string(),
            "unsupported BSP file version 2 (expected 6)"
        );
        assert_eq!(
            BspFileError::InvalidPolygon { index: 4, vertex_count: 2 }.to_string(),
            "polygon 4 has 2 vertices"
        );
    }
}
