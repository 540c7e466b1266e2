//! Binary Space Partitioning tree for collision queries.
//!
//! This module builds a BSP tree over static polygons and traverses it to
//! find the first contact of a moving line segment or sphere. The tree:
//!
//! - Is built bottom-up, so the last node created is the root
//! - Keeps polygons within [`PLANE_THICKNESS`](crate::PLANE_THICKNESS) of a
//!   node plane at that node
//! - Stores a polygon in both subtrees when it straddles a split plane
//!
//! # Example
//!
//! ```ignore
//! use bsp_collision::{BalanceSplitSelector, BspTreeBuilder, COLLIDE_ALL};
//! use nalgebra::{Point3, Vector3};
//!
//! let mut builder = BspTreeBuilder::new();
//! builder.add_polygon(&[/* points */], 0, COLLIDE_ALL);
//! let tree = builder.build(&BalanceSplitSelector::new(0));
//!
//! let start = Point3::new(0.2, 0.2, 1.0);
//! if let Some(hit) = tree.find_line_intersection(start, Vector3::new(0.0, 0.0, -2.0), COLLIDE_ALL) {
//!     println!("hit polygon {} at t = {}", hit.polygon.id(), hit.t);
//! }
//! ```
//!
//! # Architecture
//!
//! - [`BspTree`]: The arena holding every node and polygon of a tree
//! - [`NodeRef`]: Borrowed view of a node used for traversal
//! - [`SplitSelector`]: Strategy trait for choosing splitting planes
//! - [`BspTreeBuilder`]: Collects polygons and runs the recursive build

mod balance;
mod box_split;
mod builder;
mod collision;
mod node;
mod selector;
mod tree;

// Re-export main types
pub use balance::BalanceSplitSelector;
pub use box_split::BoxSplitSelector;
pub use builder::BspTreeBuilder;
pub use collision::{
    find_last_line_intersection, find_line_intersection, find_moving_sphere_intersection,
    reset_statistics, statistics, CollisionStatistics, LineHit, SphereHit,
};
pub use node::{BspNode, NodeRef};
pub use selector::{plane_score, SplitDecision, SplitSelector};
pub use tree::BspTree;
