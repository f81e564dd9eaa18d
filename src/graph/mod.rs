//! Mesh graph: typed handles plus vertex/edge/facet records with
//! half-adjacency maintenance and per-element classification.

mod ids;
mod mesh;

pub use ids::{EdgeId, FacetId, VertexId};
pub use mesh::{seed_compatible, EdgeKind, EdgeRec, FacetRec, MeshGraph, VertexKind, VertexRec};
