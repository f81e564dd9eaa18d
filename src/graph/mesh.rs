//! The mesh graph: vertices, edges and facets with half-adjacency upkeep.
//!
//! Every input sample has one [`VertexRec`] holding its classification,
//! emission index and adjacency sets. Edge and facet records are stored
//! inside the record of their lowest-id incident vertex, so the vertex table
//! never grows during meshing and all mutable graph state partitions by
//! vertex — the property the parallel driver's cell coloring relies on.
//!
//! # Classification
//!
//! Edges move between [`EdgeKind::Border`], [`EdgeKind::Front`] and
//! [`EdgeKind::Inner`] as facets attach and detach; vertices are
//! [`VertexKind::Orphan`] until their first edge, [`VertexKind::Inner`] once
//! every adjacent edge is, and [`VertexKind::Front`] in between. An edge is
//! oriented when its first facet is attached, and the orientation is never
//! revisited — not even if that facet is later removed and replaced.

use nalgebra::Point3;

use super::ids::{EdgeId, FacetId, VertexId};
use crate::octree::Sample;

/// Classification of a vertex.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum VertexKind {
    /// Not yet incident to any edge.
    #[default]
    Orphan,
    /// Incident to at least one non-inner edge.
    Front,
    /// Every adjacent edge is inner.
    Inner,
}

/// Classification of an edge.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum EdgeKind {
    /// Retired from the front with a single facet; may be revived at a
    /// larger radius.
    Border,
    /// One facet, still eligible for pivoting.
    Front,
    /// Two facets; interior.
    Inner,
}

/// An oriented edge between two vertices with up to two incident facets.
#[derive(Debug, Clone)]
pub struct EdgeRec {
    src: VertexId,
    tgt: VertexId,
    facet1: Option<FacetId>,
    facet2: Option<FacetId>,
    kind: EdgeKind,
    oriented: bool,
}

impl EdgeRec {
    /// Source vertex (orientation is meaningful once the first facet is
    /// attached).
    #[inline]
    pub fn src(&self) -> VertexId {
        self.src
    }

    /// Target vertex.
    #[inline]
    pub fn tgt(&self) -> VertexId {
        self.tgt
    }

    /// First incident facet.
    #[inline]
    pub fn facet1(&self) -> Option<FacetId> {
        self.facet1
    }

    /// Second incident facet.
    #[inline]
    pub fn facet2(&self) -> Option<FacetId> {
        self.facet2
    }

    /// Current classification.
    #[inline]
    pub fn kind(&self) -> EdgeKind {
        self.kind
    }

    /// Whether `v` is one of the endpoints.
    #[inline]
    pub fn has_vertex(&self, v: VertexId) -> bool {
        self.src == v || self.tgt == v
    }

    /// The endpoint that is not `v`.
    #[inline]
    pub fn other(&self, v: VertexId) -> VertexId {
        if self.src == v {
            self.tgt
        } else {
            self.src
        }
    }
}

/// An oriented triangle over three vertices.
#[derive(Debug, Clone)]
pub struct FacetRec {
    verts: [VertexId; 3],
    ball_center: Option<Point3<f64>>,
}

impl FacetRec {
    /// The three vertices, in orientation order.
    #[inline]
    pub fn vertices(&self) -> [VertexId; 3] {
        self.verts
    }

    /// Center of the empty ball that produced this facet, if it came from
    /// pivoting (hole-filling facets have none).
    #[inline]
    pub fn ball_center(&self) -> Option<Point3<f64>> {
        self.ball_center
    }

    /// Whether `v` is one of the three vertices.
    #[inline]
    pub fn has_vertex(&self, v: VertexId) -> bool {
        self.verts.contains(&v)
    }
}

/// Per-vertex mesh state: classification, emission index, adjacency, and the
/// edge/facet records this vertex owns.
#[derive(Debug, Default, Clone)]
pub struct VertexRec {
    kind: VertexKind,
    emit: Option<u32>,
    edges: Vec<EdgeId>,
    facets: Vec<FacetId>,
    owned_edges: Vec<Option<EdgeRec>>,
    owned_facets: Vec<Option<FacetRec>>,
}

impl VertexRec {
    /// Current classification.
    #[inline]
    pub fn kind(&self) -> VertexKind {
        self.kind
    }

    /// Emission index, assigned when the vertex joins its first facet.
    #[inline]
    pub fn emit(&self) -> Option<u32> {
        self.emit
    }

    /// Adjacent edges.
    #[inline]
    pub fn edges(&self) -> &[EdgeId] {
        &self.edges
    }

    /// Adjacent facets.
    #[inline]
    pub fn facets(&self) -> &[FacetId] {
        &self.facets
    }
}

/// The mesh graph over a fixed set of vertices.
#[derive(Debug, Default, Clone)]
pub struct MeshGraph {
    verts: Vec<VertexRec>,
}

impl MeshGraph {
    /// Create a graph with one (orphan) vertex record per sample.
    pub fn new(num_vertices: usize) -> Self {
        Self {
            verts: vec![VertexRec::default(); num_vertices],
        }
    }

    /// Number of vertex records.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.verts.len()
    }

    /// Access a vertex record.
    #[inline]
    pub fn vertex(&self, v: VertexId) -> &VertexRec {
        &self.verts[v.index()]
    }

    /// Classification of a vertex.
    #[inline]
    pub fn vertex_kind(&self, v: VertexId) -> VertexKind {
        self.vertex(v).kind()
    }

    /// Emission index of a vertex, if assigned.
    #[inline]
    pub fn emit(&self, v: VertexId) -> Option<u32> {
        self.vertex(v).emit
    }

    /// Set the emission index of a vertex.
    #[inline]
    pub fn set_emit(&mut self, v: VertexId, index: u32) {
        self.verts[v.index()].emit = Some(index);
    }

    /// Access an edge record.
    #[inline]
    pub fn edge(&self, e: EdgeId) -> &EdgeRec {
        self.verts[e.owner.index()].owned_edges[e.slot as usize]
            .as_ref()
            .expect("stale edge id")
    }

    fn edge_mut(&mut self, e: EdgeId) -> &mut EdgeRec {
        self.verts[e.owner.index()].owned_edges[e.slot as usize]
            .as_mut()
            .expect("stale edge id")
    }

    /// Access a facet record.
    #[inline]
    pub fn facet(&self, f: FacetId) -> &FacetRec {
        self.verts[f.owner.index()].owned_facets[f.slot as usize]
            .as_ref()
            .expect("stale facet id")
    }

    /// Reclassify an edge. Only the mesher's front bookkeeping transitions
    /// (front retirement and border revival) go through here; facet
    /// attachment maintains kinds itself.
    pub fn set_edge_kind(&mut self, e: EdgeId, kind: EdgeKind) {
        self.edge_mut(e).kind = kind;
    }

    /// The edge between `u` and `v`, if one exists.
    pub fn linking_edge(&self, u: VertexId, v: VertexId) -> Option<EdgeId> {
        self.vertex(u)
            .edges
            .iter()
            .copied()
            .find(|&e| self.edge(e).has_vertex(v))
    }

    /// The vertex of an edge's first facet that is not one of its endpoints.
    pub fn opposite_vertex(&self, e: EdgeId) -> Option<VertexId> {
        let rec = self.edge(e);
        let facet = self.facet(rec.facet1?);
        facet
            .vertices()
            .into_iter()
            .find(|&v| v != rec.src && v != rec.tgt)
    }

    /// Iterate over all live edges.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &EdgeRec)> + '_ {
        self.verts.iter().enumerate().flat_map(|(vi, rec)| {
            rec.owned_edges.iter().enumerate().filter_map(move |(slot, e)| {
                e.as_ref().map(|rec| {
                    (
                        EdgeId {
                            owner: VertexId::new(vi),
                            slot: slot as u32,
                        },
                        rec,
                    )
                })
            })
        })
    }

    /// Iterate over all live facets.
    pub fn facets(&self) -> impl Iterator<Item = (FacetId, &FacetRec)> + '_ {
        self.verts.iter().enumerate().flat_map(|(vi, rec)| {
            rec.owned_facets.iter().enumerate().filter_map(move |(slot, f)| {
                f.as_ref().map(|rec| {
                    (
                        FacetId {
                            owner: VertexId::new(vi),
                            slot: slot as u32,
                        },
                        rec,
                    )
                })
            })
        })
    }

    /// Create a facet over three vertices, creating any missing edges,
    /// attaching the facet to all three, and reclassifying edges and
    /// vertices.
    ///
    /// The vertex order fixes the facet's orientation; callers pass the
    /// pivoting order (edge source, new vertex, edge target for expansion
    /// facets). `ball_center` is the empty-ball center for pivoting facets
    /// and `None` for hole fills.
    pub fn add_facet(
        &mut self,
        samples: &[Sample],
        verts: [VertexId; 3],
        ball_center: Option<Point3<f64>>,
    ) -> FacetId {
        debug_assert!(verts[0] != verts[1] && verts[1] != verts[2] && verts[0] != verts[2]);

        let owner = verts.into_iter().min().expect("three vertices");
        let slot = self.verts[owner.index()].owned_facets.len() as u32;
        self.verts[owner.index()]
            .owned_facets
            .push(Some(FacetRec { verts, ball_center }));
        let fid = FacetId { owner, slot };

        for (u, v) in [(verts[0], verts[1]), (verts[1], verts[2]), (verts[2], verts[0])] {
            let eid = self
                .linking_edge(u, v)
                .unwrap_or_else(|| self.add_edge(u, v));
            self.attach_facet(samples, eid, fid);
        }

        for v in verts {
            self.verts[v.index()].facets.push(fid);
            self.update_vertex_kind(v);
        }

        fid
    }

    /// Remove a facet, detaching it from its edges and vertices. An edge
    /// losing its last facet is unlinked from both endpoints and destroyed.
    pub fn remove_facet(&mut self, f: FacetId) {
        let verts = self.facet(f).vertices();
        self.verts[f.owner.index()].owned_facets[f.slot as usize] = None;

        for (u, v) in [(verts[0], verts[1]), (verts[1], verts[2]), (verts[2], verts[0])] {
            let eid = self.linking_edge(u, v).expect("facet edge missing");
            let rec = self.edge_mut(eid);
            if rec.facet1 == Some(f) {
                rec.facet1 = None;
            } else if rec.facet2 == Some(f) {
                rec.facet2 = None;
            }
            if rec.facet1.is_none() && rec.facet2.is_none() {
                self.verts[u.index()].edges.retain(|&e| e != eid);
                self.verts[v.index()].edges.retain(|&e| e != eid);
                self.verts[eid.owner.index()].owned_edges[eid.slot as usize] = None;
            } else {
                self.edge_mut(eid).kind = EdgeKind::Front;
            }
        }

        for v in verts {
            self.verts[v.index()].facets.retain(|&g| g != f);
            self.update_vertex_kind(v);
        }
    }

    fn add_edge(&mut self, u: VertexId, v: VertexId) -> EdgeId {
        let owner = u.min(v);
        let slot = self.verts[owner.index()].owned_edges.len() as u32;
        self.verts[owner.index()].owned_edges.push(Some(EdgeRec {
            src: u,
            tgt: v,
            facet1: None,
            facet2: None,
            kind: EdgeKind::Front,
            oriented: false,
        }));
        let eid = EdgeId { owner, slot };
        self.verts[u.index()].edges.push(eid);
        self.verts[v.index()].edges.push(eid);
        eid
    }

    fn attach_facet(&mut self, samples: &[Sample], eid: EdgeId, fid: FacetId) {
        let rec = self.edge(eid);
        if rec.facet1 == Some(fid) || rec.facet2 == Some(fid) {
            return;
        }

        if rec.facet1.is_none() {
            let orient = !rec.oriented;
            let swap = orient && self.first_facet_reverses(samples, eid, fid);
            let rec = self.edge_mut(eid);
            rec.facet1 = Some(fid);
            rec.kind = EdgeKind::Front;
            if orient {
                rec.oriented = true;
                if swap {
                    std::mem::swap(&mut rec.src, &mut rec.tgt);
                }
            }
        } else if rec.facet2.is_none() {
            let rec = self.edge_mut(eid);
            rec.facet2 = Some(fid);
            rec.kind = EdgeKind::Inner;
        } else {
            debug_assert!(false, "edge {:?} already has two facets", eid);
        }
    }

    /// Whether attaching `fid` as the first facet of `eid` requires swapping
    /// the edge's endpoints: the cross product of (target - source) with
    /// (opposite - source) must not point against the summed vertex normals.
    fn first_facet_reverses(&self, samples: &[Sample], eid: EdgeId, fid: FacetId) -> bool {
        let rec = self.edge(eid);
        let (src, tgt) = (rec.src, rec.tgt);
        let opp = self
            .facet(fid)
            .vertices()
            .into_iter()
            .find(|&v| v != src && v != tgt)
            .expect("facet does not span the edge");

        let ps = &samples[src.index()].position;
        let pt = &samples[tgt.index()].position;
        let po = &samples[opp.index()].position;

        let winding = (pt - ps).cross(&(po - ps));
        let normal = samples[src.index()].normal
            + samples[tgt.index()].normal
            + samples[opp.index()].normal;

        winding.dot(&normal) < 0.0
    }

    fn update_vertex_kind(&mut self, v: VertexId) {
        let rec = &self.verts[v.index()];
        let kind = if rec.edges.is_empty() {
            VertexKind::Orphan
        } else if rec
            .edges
            .iter()
            .any(|&e| self.edge(e).kind != EdgeKind::Inner)
        {
            VertexKind::Front
        } else {
            VertexKind::Inner
        };
        self.verts[v.index()].kind = kind;
    }

    /// Verify the graph's structural invariants. Used by tests after each
    /// meshing stage; any violation is an implementation bug.
    pub fn check_invariants(&self) -> bool {
        // Adjacency symmetry, duplicate edges, vertex classification.
        for (vi, rec) in self.verts.iter().enumerate() {
            let v = VertexId::new(vi);
            let mut others = Vec::new();
            for &e in &rec.edges {
                let erec = self.edge(e);
                if !erec.has_vertex(v) {
                    return false;
                }
                others.push(erec.other(v));
            }
            others.sort_unstable();
            let before = others.len();
            others.dedup();
            if others.len() != before {
                return false;
            }

            let expected = if rec.edges.is_empty() {
                VertexKind::Orphan
            } else if rec
                .edges
                .iter()
                .any(|&e| self.edge(e).kind != EdgeKind::Inner)
            {
                VertexKind::Front
            } else {
                VertexKind::Inner
            };
            if rec.kind() != expected {
                return false;
            }
        }

        // Edge facet slots against kinds; endpoint adjacency.
        for (eid, erec) in self.edges() {
            let count = erec.facet1.iter().count() + erec.facet2.iter().count();
            let ok = match count {
                1 => erec.kind == EdgeKind::Front || erec.kind == EdgeKind::Border,
                2 => erec.kind == EdgeKind::Inner,
                _ => false,
            };
            if !ok || erec.src == erec.tgt {
                return false;
            }
            for v in [erec.src, erec.tgt] {
                if !self.vertex(v).edges.contains(&eid) {
                    return false;
                }
            }
        }

        // Facets: distinct vertices, bounding edges list the facet, ball
        // center equidistant from the three vertices.
        for (fid, frec) in self.facets() {
            let [a, b, c] = frec.verts;
            if a == b || b == c || a == c {
                return false;
            }
            for (u, v) in [(a, b), (b, c), (c, a)] {
                match self.linking_edge(u, v) {
                    Some(e) => {
                        let erec = self.edge(e);
                        if erec.facet1 != Some(fid) && erec.facet2 != Some(fid) {
                            return false;
                        }
                    }
                    None => return false,
                }
            }
            for v in frec.verts {
                if !self.vertex(v).facets.contains(&fid) {
                    return false;
                }
            }
        }

        // Emission indices unique and contiguous from zero.
        let mut emitted: Vec<u32> = self
            .verts
            .iter()
            .filter_map(|rec| rec.emit)
            .collect();
        emitted.sort_unstable();
        emitted.iter().enumerate().all(|(i, &e)| e == i as u32)
    }

    /// Check that every recorded ball center is equidistant from its
    /// facet's three vertices (within 1e-9 relative).
    pub fn check_ball_centers(&self, samples: &[Sample]) -> bool {
        self.facets().all(|(_, frec)| {
            let Some(center) = frec.ball_center else {
                return true;
            };
            let [a, b, c] = frec.verts;
            let d0 = (samples[a.index()].position - center).norm();
            let d1 = (samples[b.index()].position - center).norm();
            let d2 = (samples[c.index()].position - center).norm();
            d0 > 0.0 && ((d1 - d0) / d0).abs() < 1e-9 && ((d2 - d0) / d0).abs() < 1e-9
        })
    }
}

/// Seed compatibility of `v` with the oriented pair (`v1`, `v2`): the
/// triangle normal, flipped if needed toward `v`'s own normal, must not
/// point against either pair normal.
pub fn seed_compatible(samples: &[Sample], v: VertexId, v1: VertexId, v2: VertexId) -> bool {
    let p = &samples[v.index()].position;
    let p1 = &samples[v1.index()].position;
    let p2 = &samples[v2.index()].position;

    let mut nt = (p - p1).cross(&(p2 - p1));
    crate::geometry::normalize(&mut nt);

    if nt.dot(&samples[v.index()].normal) < -1e-16 {
        nt = -nt;
    }

    nt.dot(&samples[v1.index()].normal) > -1e-16 && nt.dot(&samples[v2.index()].normal) > -1e-16
}

impl MeshGraph {
    /// Compatibility of `v` with a front edge: the triangle normal (never
    /// flipped here — the edge orientation already encodes the surface side)
    /// must not point against the normals of `v` or either endpoint.
    pub fn edge_compatible(&self, samples: &[Sample], v: VertexId, e: EdgeId) -> bool {
        let rec = self.edge(e);
        let (src, tgt) = (rec.src, rec.tgt);

        let p = &samples[v.index()].position;
        let ps = &samples[src.index()].position;
        let pt = &samples[tgt.index()].position;

        let mut nt = (p - ps).cross(&(pt - ps));
        crate::geometry::normalize(&mut nt);

        nt.dot(&samples[v.index()].normal) > -1e-16
            && nt.dot(&samples[src.index()].normal) > -1e-16
            && nt.dot(&samples[tgt.index()].normal) > -1e-16
    }
}
