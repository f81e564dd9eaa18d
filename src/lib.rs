//! # Trundle
//!
//! Ball-pivoting surface reconstruction for oriented point clouds.
//!
//! Trundle takes points with unit normals sampled from an unknown surface
//! and produces a triangle mesh approximating it, by rolling a ball of
//! given radius over the samples: wherever the ball rests on three points
//! without containing any other, it leaves a triangle, and pivoting the
//! ball around the triangulation's advancing front grows the mesh outward.
//!
//! ## Features
//!
//! - **Multi-radius passes**: a sequence of increasing radii lets larger
//!   balls bridge regions of sparser sampling that smaller balls left open
//! - **Parallel reconstruction**: disjoint octree cells are meshed
//!   concurrently in waves and stitched back together
//! - **Hole filling**: a post-pass closes the triangular holes pivoting
//!   leaves behind
//!
//! ## Quick Start
//!
//! ```
//! use trundle::prelude::*;
//! use nalgebra::Point3;
//!
//! // Four samples of a tetrahedron, normals pointing away from the
//! // centroid.
//! let corners = [
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//!     Point3::new(0.0, 0.0, 1.0),
//! ];
//! let centroid = Point3::new(0.25, 0.25, 0.25);
//! let samples: Vec<Sample> = corners
//!     .into_iter()
//!     .map(|position| Sample { position, normal: (position - centroid).normalize() })
//!     .collect();
//!
//! let octree = Octree::for_radius(samples, 1.5);
//! let mut graph = MeshGraph::new(octree.num_points());
//! let mut mesher = Mesher::new(&octree, &mut graph);
//!
//! mesher.reconstruct(&[1.5]);
//! mesher.fill_holes();
//!
//! assert_eq!(mesher.n_facets(), 4);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod geometry;
pub mod graph;
pub mod io;
pub mod mesher;
pub mod octree;

/// Prelude module for convenient imports.
///
/// ```
/// use trundle::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::graph::{EdgeId, EdgeKind, FacetId, MeshGraph, VertexId, VertexKind};
    pub use crate::mesher::Mesher;
    pub use crate::octree::{NeighborSearch, Octree, Sample};
}

pub use error::{Error, Result};

// Re-export nalgebra for downstream coordinate handling.
pub use nalgebra;
