//! Radius-limited neighbor queries over the octree.
//!
//! Every geometric test in the mesher is constrained through one of these
//! queries: cells whose dilation by the query radius misses the query point
//! are pruned, and only leaf samples within Euclidean distance of the query
//! are reported.

use nalgebra::Point3;

use super::{Octree, OctreeNode};
use crate::geometry::dist2;
use crate::graph::VertexId;

/// Neighbor query view over an octree. Each mesher holds its own instance.
#[derive(Debug, Clone, Copy)]
pub struct NeighborSearch<'a> {
    octree: &'a Octree,
}

impl<'a> NeighborSearch<'a> {
    /// Create a search view over `octree`.
    pub fn new(octree: &'a Octree) -> Self {
        Self { octree }
    }

    /// All samples within `radius` of `query`, in octree traversal order.
    pub fn neighbors(&self, query: &Point3<f64>, radius: f64) -> Vec<VertexId> {
        let mut out = Vec::new();
        self.gather(self.octree.root(), query, radius, &mut |v, _| out.push(v));
        out
    }

    /// Samples within `radius` of the vertex `v`, excluding `v` itself,
    /// sorted by squared distance with ties broken by vertex id.
    pub fn sorted_neighbors(&self, v: VertexId, radius: f64) -> Vec<(f64, VertexId)> {
        let query = *self.octree.position(v);
        let mut out = Vec::new();
        self.gather(self.octree.root(), &query, radius, &mut |n, d2| {
            if n != v {
                out.push((d2, n));
            }
        });
        out.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        out
    }

    /// Whether the ball of `radius` around `center` contains no sample other
    /// than the three given ones strictly in its interior ("strictly" minus
    /// 1e-16 on the squared distance, so tangent samples do not count).
    pub fn contains_only(
        &self,
        center: &Point3<f64>,
        radius: f64,
        keep: [VertexId; 3],
    ) -> bool {
        let sq_radius = radius * radius;
        let mut empty = true;
        self.gather(self.octree.root(), center, radius, &mut |v, d2| {
            if d2 < sq_radius - 1e-16 && !keep.contains(&v) {
                empty = false;
            }
        });
        empty
    }

    fn gather(
        &self,
        node: &OctreeNode,
        query: &Point3<f64>,
        radius: f64,
        visit: &mut impl FnMut(VertexId, f64),
    ) {
        if !node.is_inside(query, radius) {
            return;
        }
        if node.depth() == 0 {
            let sq_radius = radius * radius;
            for &v in node.points() {
                let d2 = dist2(query, self.octree.position(v));
                if d2 <= sq_radius {
                    visit(v, d2);
                }
            }
        } else {
            for child in node.children() {
                self.gather(child, query, radius, visit);
            }
        }
    }
}
