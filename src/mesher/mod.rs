//! The advancing-front pivoting core.
//!
//! A [`Mesher`] rolls a ball of the current radius over the samples stored
//! in an octree: it finds seed triangles among orphan vertices, then expands
//! the triangulation by pivoting the ball around each front edge and
//! attaching the sample it first touches. Edges whose pivot finds no valid
//! candidate retire to the border list; processing a larger radius next can
//! revive them where the bigger ball bridges sparser sampling.
//!
//! # Front discipline
//!
//! The front is popped from the head, and edges created by a new facet are
//! pushed back to the head, so freshly created edges are pivoted before
//! older ones. Retired edges never re-enter the front within one radius.

mod parallel;

use std::collections::VecDeque;

use log::{debug, info};
use nalgebra::Point3;

use crate::geometry::{self, dist2, midpoint};
use crate::graph::{
    seed_compatible, EdgeId, EdgeKind, FacetId, MeshGraph, VertexId, VertexKind,
};
use crate::octree::{NeighborSearch, Octree, OctreeNode};

/// Ball-pivoting mesher over an octree-indexed point cloud.
///
/// The octree owns the samples; the graph holds the evolving mesh topology.
/// The mesher tracks the advancing front, the retired border edges, and the
/// vertices and facets in emission order.
pub struct Mesher<'o, 'g> {
    octree: &'o Octree,
    search: NeighborSearch<'o>,
    graph: &'g mut MeshGraph,
    front: VecDeque<EdgeId>,
    border: Vec<EdgeId>,
    node_border: Vec<EdgeId>,
    facets: Vec<FacetId>,
    vertices: Vec<VertexId>,
    radius: f64,
    sq_radius: f64,
}

impl<'o, 'g> Mesher<'o, 'g> {
    /// Create a mesher over `octree` writing topology into `graph`.
    ///
    /// The graph must have one vertex record per octree sample.
    pub fn new(octree: &'o Octree, graph: &'g mut MeshGraph) -> Self {
        debug_assert_eq!(octree.num_points(), graph.num_vertices());
        Self {
            octree,
            search: NeighborSearch::new(octree),
            graph,
            front: VecDeque::new(),
            border: Vec::new(),
            node_border: Vec::new(),
            facets: Vec::new(),
            vertices: Vec::new(),
            radius: 0.0,
            sq_radius: 0.0,
        }
    }

    /// Set the current ball radius.
    pub fn set_radius(&mut self, radius: f64) {
        self.radius = radius;
        self.sq_radius = radius * radius;
    }

    /// The current ball radius.
    #[inline]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Number of emitted vertices.
    #[inline]
    pub fn n_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Number of facets.
    #[inline]
    pub fn n_facets(&self) -> usize {
        self.facets.len()
    }

    /// Number of edges currently queued on the front.
    #[inline]
    pub fn n_front_edges(&self) -> usize {
        self.front.len()
    }

    /// Number of retired border edges.
    #[inline]
    pub fn n_border_edges(&self) -> usize {
        self.border.len()
    }

    /// Emitted vertices, in emission-index order.
    #[inline]
    pub fn vertices(&self) -> &[VertexId] {
        &self.vertices
    }

    /// Facets, in creation order.
    #[inline]
    pub fn facets(&self) -> &[FacetId] {
        &self.facets
    }

    /// The mesh graph.
    #[inline]
    pub fn graph(&self) -> &MeshGraph {
        self.graph
    }

    /// The octree this mesher reads samples from.
    #[inline]
    pub fn octree(&self) -> &'o Octree {
        self.octree
    }

    /// Reconstruct with a sequence of radii in ascending order.
    ///
    /// Between radii, border edges whose ball is empty at the new radius are
    /// promoted back onto the front; larger balls can then bridge regions
    /// the smaller ones could not close.
    pub fn reconstruct(&mut self, radii: &[f64]) {
        for &radius in radii {
            self.change_radius(radius);
            self.run_radius();
        }
    }

    /// One radius pass: seed search when the front is empty, otherwise
    /// expansion of the existing front.
    pub(crate) fn run_radius(&mut self) {
        info!("ball radius {}", self.radius);
        if self.front.is_empty() {
            if !self.find_seed_triangle() {
                info!("no seed triangle found at radius {}", self.radius);
            }
        } else {
            self.expand();
        }
    }

    /// Switch to a new radius and revive every border edge whose supporting
    /// triangle carries an empty ball at that radius.
    pub(crate) fn change_radius(&mut self, radius: f64) {
        self.set_radius(radius);
        let border = std::mem::take(&mut self.border);
        for e in border {
            let facet = self
                .graph
                .edge(e)
                .facet1()
                .expect("border edge without a facet");
            let [v0, v1, v2] = self.graph.facet(facet).vertices();
            if self.empty_ball_configuration(v0, v1, v2).is_some() {
                self.graph.set_edge_kind(e, EdgeKind::Front);
                self.front.push_back(e);
            } else {
                self.border.push(e);
            }
        }
    }

    // ==================== Seed search ====================

    /// Scan the octree leaves bottom-up for seed triangles, expanding the
    /// front to exhaustion after each seed. Returns whether any seed was
    /// found.
    fn find_seed_triangle(&mut self) -> bool {
        let octree = self.octree;
        let mut found = false;
        self.seed_in_node(octree.root(), &mut found);
        found
    }

    fn seed_in_node(&mut self, node: &'o OctreeNode, found: &mut bool) {
        if node.depth() != 0 {
            for child in node.children() {
                self.seed_in_node(child, found);
            }
            return;
        }
        for &v in node.points() {
            if self.graph.vertex_kind(v) == VertexKind::Orphan && self.try_seed(v) {
                *found = true;
                self.expand();
            }
        }
    }

    /// Try to build a seed facet around the orphan vertex `v` from its
    /// 2r-neighborhood, nearest pairs first.
    fn try_seed(&mut self, v: VertexId) -> bool {
        let neighbors = self.search.sorted_neighbors(v, 2.0 * self.radius);
        // A seed needs two partners besides v itself.
        if neighbors.len() < 2 {
            return false;
        }

        for (i, &(_, va)) in neighbors.iter().enumerate() {
            if self.graph.vertex_kind(va) != VertexKind::Orphan {
                continue;
            }

            let mut seed = None;
            for &(_, vb) in &neighbors[i + 1..] {
                if let Some(center) = self.try_triangle_seed(v, va, vb, &neighbors) {
                    seed = Some((vb, center));
                    break;
                }
            }
            let Some((vb, center)) = seed else { continue };

            if self.seed_edges_blocked(v, va, vb) {
                continue;
            }
            self.add_facet([v, va, vb], Some(center));
            self.push_new_front_edges(v, va, vb);
            if !self.front.is_empty() {
                return true;
            }
        }
        false
    }

    /// Whether (v, va, vb) can seed a facet: `vb` orphan and compatible with
    /// the pair, no inner edge in the way, a ball center at the current
    /// radius, and no neighbor strictly inside that ball.
    fn try_triangle_seed(
        &self,
        v: VertexId,
        va: VertexId,
        vb: VertexId,
        neighbors: &[(f64, VertexId)],
    ) -> Option<Point3<f64>> {
        if self.graph.vertex_kind(vb) != VertexKind::Orphan
            || !seed_compatible(self.octree.samples(), vb, v, va)
        {
            return None;
        }

        for (a, b) in [(v, vb), (va, vb)] {
            if let Some(e) = self.graph.linking_edge(a, b) {
                if self.graph.edge(e).kind() == EdgeKind::Inner {
                    return None;
                }
            }
        }

        let center = self.ball_center(v, va, vb)?;
        for &(_, n) in neighbors {
            if n == v || n == va || n == vb {
                continue;
            }
            if dist2(&center, self.octree.position(n)) < self.sq_radius - 1e-16 {
                return None;
            }
        }
        Some(center)
    }

    /// Whether any of the three implicit seed edges already exists with a
    /// non-front classification.
    fn seed_edges_blocked(&self, v: VertexId, va: VertexId, vb: VertexId) -> bool {
        [(v, vb), (va, vb), (v, va)].into_iter().any(|(a, b)| {
            self.graph
                .linking_edge(a, b)
                .is_some_and(|e| self.graph.edge(e).kind() != EdgeKind::Front)
        })
    }

    /// Queue the still-front edges of a freshly created seed facet, newest
    /// first.
    fn push_new_front_edges(&mut self, v: VertexId, va: VertexId, vb: VertexId) {
        for (a, b) in [(v, vb), (va, vb), (v, va)] {
            if let Some(e) = self.graph.linking_edge(a, b) {
                if self.graph.edge(e).kind() == EdgeKind::Front {
                    self.front.push_front(e);
                }
            }
        }
    }

    // ==================== Front expansion ====================

    /// Pivot around front edges until the front is empty.
    pub(crate) fn expand(&mut self) {
        while let Some(e) = self.front.pop_front() {
            // Promoted to inner through another facet since it was queued.
            if self.graph.edge(e).kind() != EdgeKind::Front {
                continue;
            }

            let Some((candidate, center)) = self.find_candidate(e) else {
                self.retire(e);
                continue;
            };
            if self.graph.vertex_kind(candidate) == VertexKind::Inner
                || !self
                    .graph
                    .edge_compatible(self.octree.samples(), candidate, e)
            {
                self.retire(e);
                continue;
            }

            let (src, tgt) = {
                let rec = self.graph.edge(e);
                (rec.src(), rec.tgt())
            };
            if self.closing_edges_blocked(candidate, src, tgt) {
                self.retire(e);
                continue;
            }

            self.add_facet([src, candidate, tgt], Some(center));
            self.push_closing_front_edges(candidate, src, tgt);
        }
    }

    /// Roll the ball around `e` and return the sample it first touches,
    /// with the corresponding ball center: the neighbor minimizing the pivot
    /// angle from the current ball position whose ball is empty.
    fn find_candidate(&self, e: EdgeId) -> Option<(VertexId, Point3<f64>)> {
        let rec = self.graph.edge(e);
        let (src, tgt) = (rec.src(), rec.tgt());
        let old_center = self.graph.facet(rec.facet1()?).ball_center()?;
        let opp = self.graph.opposite_vertex(e);

        let ps = self.octree.position(src);
        let pt = self.octree.position(tgt);
        let mp = midpoint(ps, pt);

        // Every reachable ball center lies within this radius of the edge
        // midpoint.
        let reach = self.radius + (self.sq_radius - dist2(&mp, ps)).max(0.0).sqrt();
        let neighbors = self.search.neighbors(&mp, reach);

        let mut tangent = pt - ps;
        geometry::normalize(&mut tangent);
        let mut from_old = old_center - mp;
        geometry::normalize(&mut from_old);

        let mut best: Option<(f64, VertexId, Point3<f64>)> = None;
        for &v in &neighbors {
            if v == src || v == tgt || Some(v) == opp {
                continue;
            }
            let Some(new_center) = self.ball_center(src, tgt, v) else {
                continue;
            };

            let mut to_new = new_center - mp;
            geometry::normalize(&mut to_new);

            let cosine = from_old.dot(&to_new).clamp(-1.0, 1.0);
            let mut angle = cosine.acos();
            if from_old.cross(&to_new).dot(&tangent) < 0.0 {
                angle = 2.0 * std::f64::consts::PI - angle;
            }

            if best.as_ref().is_some_and(|&(a, _, _)| angle >= a) {
                continue;
            }
            if !self.ball_is_empty(&new_center, [src, tgt, v], &neighbors) {
                continue;
            }
            best = Some((angle, v, new_center));
        }
        best.map(|(_, v, c)| (v, c))
    }

    /// Whether closing a facet toward `candidate` is blocked by an existing
    /// non-front edge.
    fn closing_edges_blocked(&self, candidate: VertexId, src: VertexId, tgt: VertexId) -> bool {
        [(candidate, src), (candidate, tgt)].into_iter().any(|(a, b)| {
            self.graph
                .linking_edge(a, b)
                .is_some_and(|e| self.graph.edge(e).kind() != EdgeKind::Front)
        })
    }

    /// Queue the still-front edges toward a just-attached candidate, newest
    /// first.
    fn push_closing_front_edges(&mut self, candidate: VertexId, src: VertexId, tgt: VertexId) {
        for (a, b) in [(candidate, src), (candidate, tgt)] {
            if let Some(l) = self.graph.linking_edge(a, b) {
                if self.graph.edge(l).kind() == EdgeKind::Front {
                    self.front.push_front(l);
                }
            }
        }
    }

    fn retire(&mut self, e: EdgeId) {
        self.graph.set_edge_kind(e, EdgeKind::Border);
        self.border.push(e);
    }

    // ==================== Geometry helpers ====================

    fn ball_center(&self, v1: VertexId, v2: VertexId, v3: VertexId) -> Option<Point3<f64>> {
        geometry::ball_center(
            self.octree.position(v1),
            self.octree.position(v2),
            self.octree.position(v3),
            self.octree.normal(v1),
            self.octree.normal(v2),
            self.octree.normal(v3),
            self.radius,
        )
    }

    /// Ball center for (v1, v2, v3) at the current radius, provided no
    /// sample at all lies strictly inside the ball.
    fn empty_ball_configuration(
        &self,
        v1: VertexId,
        v2: VertexId,
        v3: VertexId,
    ) -> Option<Point3<f64>> {
        let center = self.ball_center(v1, v2, v3)?;
        self.search
            .contains_only(&center, self.radius, [v1, v2, v3])
            .then_some(center)
    }

    fn ball_is_empty(
        &self,
        center: &Point3<f64>,
        trio: [VertexId; 3],
        neighbors: &[VertexId],
    ) -> bool {
        neighbors.iter().all(|&v| {
            trio.contains(&v)
                || dist2(center, self.octree.position(v)) >= self.sq_radius - 1e-16
        })
    }

    // ==================== Emission bookkeeping ====================

    fn add_facet(
        &mut self,
        verts: [VertexId; 3],
        ball_center: Option<Point3<f64>>,
    ) -> FacetId {
        let fid = self.graph.add_facet(self.octree.samples(), verts, ball_center);
        for v in verts {
            self.add_vertex(v);
        }
        self.facets.push(fid);
        if self.facets.len() % 10_000 == 0 {
            debug!(
                "{} vertices, {} facets, {} front edges, {} border edges",
                self.vertices.len(),
                self.facets.len(),
                self.front.len(),
                self.border.len()
            );
        }
        fid
    }

    fn add_vertex(&mut self, v: VertexId) {
        if self.graph.emit(v).is_some() {
            return;
        }
        self.graph.set_emit(v, self.vertices.len() as u32);
        self.vertices.push(v);
    }

    // ==================== Hole filling ====================

    /// Close the triangular holes the pivoting left open: for each border
    /// edge, look for two more border edges forming a consistently oriented
    /// 3-loop and fill it with a facet. Larger holes are left alone.
    pub fn fill_holes(&mut self) {
        let border = std::mem::take(&mut self.border);
        for e in border {
            // Closed from the other side while filling.
            if self.graph.edge(e).kind() != EdgeKind::Border {
                continue;
            }
            let (src, tgt) = {
                let rec = self.graph.edge(e);
                (rec.src(), rec.tgt())
            };
            match self.find_border(src, tgt) {
                Some(v) => {
                    self.add_facet([src, tgt, v], None);
                }
                None => self.border.push(e),
            }
        }
    }

    /// Find a vertex `v` such that border edges run v -> src and tgt -> v,
    /// closing the loop of the border edge (src, tgt). Front edges are
    /// oriented consistently along the front, so the direction checks
    /// suffice.
    fn find_border(&self, src: VertexId, tgt: VertexId) -> Option<VertexId> {
        let e0 = self.graph.linking_edge(src, tgt)?;
        let facet = self.graph.edge(e0).facet1()?;

        for &e in self.graph.vertex(src).edges() {
            let rec = self.graph.edge(e);
            if rec.kind() != EdgeKind::Border {
                continue;
            }
            let v = rec.src();
            if v == src || self.graph.facet(facet).has_vertex(v) {
                continue;
            }
            let Some(closing) = self.graph.linking_edge(v, tgt) else {
                continue;
            };
            let crec = self.graph.edge(closing);
            if crec.kind() == EdgeKind::Border && crec.src() == tgt {
                return Some(v);
            }
        }
        None
    }
}
