//! Spatially decomposed parallel reconstruction.
//!
//! The octree is cut into cells at a depth sized to the largest radius, and
//! the cells are processed in eight waves per radius: all cells whose
//! integer coordinates share a parity pattern run concurrently, each one
//! meshed by a local mesher confined to the cell dilated by the band width
//! `d = 2.1 * r_max`. Same-color cells are at least two cell sides apart,
//! so concurrent tasks touch disjoint vertex records; between color groups
//! the rayon join is a global barrier, after which the local results merge
//! serially into the global mesher. A final sequential expansion at the
//! largest radius closes whatever the decomposition set aside.

use std::collections::BTreeSet;

use log::{info, warn};
use rayon::prelude::*;

use super::Mesher;
use crate::graph::{EdgeId, EdgeKind, FacetId, MeshGraph, VertexId, VertexKind};
use crate::octree::OctreeNode;

/// Hands the mesh graph to the worker tasks of one wave.
///
/// Soundness rests on the cell coloring: no two concurrently running tasks
/// ever touch the same vertex record (and all edge/facet storage lives
/// inside vertex records), and the merge phase runs strictly after the
/// parallel section of each wave.
struct GraphShare(*mut MeshGraph);

unsafe impl Send for GraphShare {}
unsafe impl Sync for GraphShare {}

impl GraphShare {
    /// Indirection so closures capture the whole `GraphShare` (and thus its
    /// manual `Sync` impl) rather than disjointly capturing just the raw
    /// pointer field, which would not be `Sync`.
    fn get(&self) -> *mut MeshGraph {
        self.0
    }
}

/// Front-bookkeeping state extracted from a finished cell-local mesher.
pub(crate) struct MesherParts {
    border: Vec<EdgeId>,
    node_border: Vec<EdgeId>,
    facets: Vec<FacetId>,
    vertices: Vec<VertexId>,
}

impl<'o, 'g> Mesher<'o, 'g> {
    /// Reconstruct with a sequence of radii in ascending order, meshing
    /// octree cells concurrently.
    ///
    /// Topologically equivalent to [`Mesher::reconstruct`] followed by the
    /// same hole filling, up to tie-breaking among geometrically equivalent
    /// pivot candidates.
    pub fn parallel_reconstruct(&mut self, radii: &[f64]) {
        let Some(&r_max) = radii.last() else {
            warn!("no radii given; nothing to reconstruct");
            return;
        };

        let octree = self.octree;
        let d = 2.1 * r_max;
        let total = i64::from(octree.depth());

        // Cells roughly 1.5 band widths wide, at most three levels below
        // the root.
        let mut depth = total - (octree.size() / (1.5 * d)).log2().floor() as i64;
        depth = depth.clamp((total - 3).max(0), total);
        let depth = depth as u32;
        let cell_side = octree.size() / f64::powi(2.0, (total - i64::from(depth)) as i32);
        info!(
            "processing depth {}; cell side {:.6}; dilation radius {:.6}",
            depth, cell_side, d
        );

        let groups = octree.color_groups(depth);
        let share = GraphShare(&mut *self.graph);

        for (wave, &radius) in radii.iter().enumerate() {
            for (color, group) in groups.iter().enumerate() {
                let parts: Vec<MesherParts> = group
                    .par_iter()
                    .map(|&cell| {
                        // SAFETY: see GraphShare. This task only touches
                        // vertex records inside `cell` dilated by `d`, and
                        // every other task of this wave works on a cell of
                        // the same color, at least 2 * cell_side > 2 * d
                        // away in L-infinity.
                        let graph = unsafe { &mut *share.get() };
                        let mut local = Mesher::new(octree, graph);
                        if wave > 0 {
                            local.collect_active_edges(cell);
                            local.collect_border_edges(cell);
                        }
                        local.change_radius(radius);
                        if wave == 0 {
                            local.reconstruct_around(cell, d);
                        } else {
                            local.expand_around(cell, d);
                        }
                        local.into_parts()
                    })
                    .collect();

                for parts in parts {
                    self.merge(parts);
                }
                info!(
                    "radius {} color {}/7: {} vertices, {} facets, {} front edges",
                    radius,
                    color,
                    self.n_vertices(),
                    self.n_facets(),
                    self.n_front_edges()
                );
            }
        }

        // Close the node-border remainder sequentially at the largest
        // radius.
        self.set_radius(r_max);
        self.expand();

        // Cells re-collect surviving border edges every wave, so the merged
        // list carries duplicates and stale entries; reconcile it once.
        self.border.sort_unstable();
        self.border.dedup();
        let graph = &*self.graph;
        self.border.retain(|&e| graph.edge(e).kind() == EdgeKind::Border);
    }

    /// Merge the outcome of one cell-local mesher into this (global) one.
    fn merge(&mut self, parts: MesherParts) {
        self.facets.extend(parts.facets);

        // Edges the local work promoted or retired leave the global front.
        let graph = &*self.graph;
        self.front.retain(|&e| graph.edge(e).kind() == EdgeKind::Front);

        // Renumber the local mesher's vertices after the global ones.
        let base = self.vertices.len() as u32;
        for v in parts.vertices {
            let emit = self.graph.emit(v).expect("merged vertex without an index");
            self.graph.set_emit(v, emit + base);
            self.vertices.push(v);
        }

        // Node-border edges stay front: neighbor cells or the final pass
        // will pivot them.
        for e in parts.node_border {
            self.front.push_back(e);
        }

        for e in parts.border {
            if self.graph.edge(e).facet2().is_none() {
                self.border.push(e);
            }
        }
    }

    fn into_parts(self) -> MesherParts {
        MesherParts {
            border: self.border,
            node_border: self.node_border,
            facets: self.facets,
            vertices: self.vertices,
        }
    }

    /// First-wave work for one cell: expand anything already queued, then
    /// seed and grow inside the dilated cell.
    fn reconstruct_around(&mut self, cell: &'o OctreeNode, d: f64) {
        if !self.front.is_empty() {
            self.expand_around(cell, d);
        }
        self.seed_around_in(cell, cell, d);
    }

    fn seed_around_in(&mut self, containment: &'o OctreeNode, node: &'o OctreeNode, d: f64) {
        if node.depth() != 0 {
            for child in node.children() {
                self.seed_around_in(containment, child, d);
            }
            return;
        }
        for &v in node.points() {
            match self.graph.vertex_kind(v) {
                VertexKind::Front => {
                    // Re-queue this vertex's front edges (left by an earlier
                    // cell) and grow from them.
                    let edges: Vec<EdgeId> = self
                        .graph
                        .vertex(v)
                        .edges()
                        .iter()
                        .copied()
                        .filter(|&e| self.graph.edge(e).kind() == EdgeKind::Front)
                        .collect();
                    for e in edges {
                        self.front.push_front(e);
                    }
                    self.expand_around(containment, d);
                }
                VertexKind::Orphan => {
                    if self.try_seed_around(v, containment, d) {
                        self.expand_around(containment, d);
                    }
                }
                VertexKind::Inner => {}
            }
        }
    }

    /// Seed search around `v` restricted to the dilated cell.
    fn try_seed_around(&mut self, v: VertexId, containment: &OctreeNode, d: f64) -> bool {
        let octree = self.octree;
        let neighbors = self.search.sorted_neighbors(v, 2.0 * self.radius);
        if neighbors.len() < 2 {
            return false;
        }

        for (i, &(_, va)) in neighbors.iter().enumerate() {
            if self.graph.vertex_kind(va) != VertexKind::Orphan
                || !containment.is_inside(octree.position(va), d)
            {
                continue;
            }

            let mut seed = None;
            for &(_, vb) in &neighbors[i + 1..] {
                if let Some(center) = self.try_triangle_seed(v, va, vb, &neighbors) {
                    seed = Some((vb, center));
                    break;
                }
            }

            match seed {
                None => {
                    // An earlier wave may have left a front edge here.
                    if let Some(e) = self.graph.linking_edge(v, va) {
                        if self.graph.edge(e).kind() == EdgeKind::Front {
                            self.front.push_front(e);
                        }
                    }
                }
                Some((vb, center)) if containment.is_inside(octree.position(vb), d) => {
                    if self.seed_edges_blocked(v, va, vb) {
                        continue;
                    }
                    self.add_facet([v, va, vb], Some(center));
                    self.push_new_front_edges(v, va, vb);
                    if !self.front.is_empty() {
                        return true;
                    }
                }
                Some(_) => {}
            }
        }
        !self.front.is_empty()
    }

    /// Front expansion restricted to the dilated cell: a pivot whose
    /// candidate lies outside is set aside as a node-border edge instead of
    /// being explored.
    fn expand_around(&mut self, containment: &OctreeNode, d: f64) {
        let octree = self.octree;
        while let Some(e) = self.front.pop_front() {
            if self.graph.edge(e).kind() != EdgeKind::Front {
                continue;
            }

            let Some((candidate, center)) = self.find_candidate(e) else {
                self.retire(e);
                continue;
            };
            if self.graph.vertex_kind(candidate) == VertexKind::Inner
                || !self.graph.edge_compatible(octree.samples(), candidate, e)
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

            // The front must stay within the dilated cell.
            if !containment.is_inside(octree.position(candidate), d) {
                self.node_border.push(e);
                continue;
            }

            self.add_facet([src, candidate, tgt], Some(center));
            self.push_closing_front_edges(candidate, src, tgt);
        }
    }

    /// Queue this cell's surviving front edges for a new radius wave.
    fn collect_active_edges(&mut self, cell: &OctreeNode) {
        let mut found = BTreeSet::new();
        self.collect_edges_of_kind(cell, EdgeKind::Front, &mut found);
        for e in found {
            self.front.push_back(e);
        }
    }

    /// Adopt this cell's border edges so the radius change can revive them.
    fn collect_border_edges(&mut self, cell: &OctreeNode) {
        let mut found = BTreeSet::new();
        self.collect_edges_of_kind(cell, EdgeKind::Border, &mut found);
        self.border.extend(found);
    }

    fn collect_edges_of_kind(
        &self,
        node: &OctreeNode,
        kind: EdgeKind,
        out: &mut BTreeSet<EdgeId>,
    ) {
        if node.depth() != 0 {
            for child in node.children() {
                self.collect_edges_of_kind(child, kind, out);
            }
            return;
        }
        for &v in node.points() {
            if self.graph.vertex_kind(v) != VertexKind::Front {
                continue;
            }
            for &e in self.graph.vertex(v).edges() {
                if self.graph.edge(e).kind() == kind {
                    out.insert(e);
                }
            }
        }
    }
}
