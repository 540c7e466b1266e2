//! BSP (Binary Space Partitioning) collision trees for static polygon data.
//!
//! Polygons are submitted to a [`BspTreeBuilder`], which partitions them
//! with a [`SplitSelector`] into a [`BspTree`]. The finished tree answers
//! line segment and swept sphere queries.

pub mod bsp;
pub mod file;
pub mod intersect;
mod obb;
mod plane;
mod polygon;
mod progress;
mod storage;

pub use bsp::{
    BalanceSplitSelector, BoxSplitSelector, BspNode, BspTree, BspTreeBuilder, CollisionStatistics,
    LineHit, NodeRef, SphereHit, SplitDecision, SplitSelector,
};
pub use file::{read_tree, write_tree, BspFileError, BSP_FILE_VERSION};
pub use obb::OrientedBox;
pub use plane::{Plane3D, PlaneSide, PLANE_THICKNESS};
pub use polygon::{BspPolygon, PolygonRef, COLLIDE_ALL};
pub use progress::{BuildProgress, ProgressSink};
pub use storage::{ArenaConfig, BspStorage, NodeHandle, PolygonHandle};
