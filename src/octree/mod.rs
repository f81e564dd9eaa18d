//! Cubical octree over the input samples.
//!
//! The octree owns the sample storage; leaves hold the ids of the samples
//! that fall inside their cell. The cubical root is deduced from the
//! axis-aligned bounding box of the input (side = largest extent, slightly
//! enlarged), and the depth is either fixed or chosen so that a leaf cell is
//! at least twice the smallest pivoting radius wide — the diameter of the
//! smallest ball that will roll over the points.

mod search;

pub use search::NeighborSearch;

use nalgebra::{Point3, Vector3};

use crate::graph::VertexId;

/// One oriented input sample: a position and a unit normal.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Sample position.
    pub position: Point3<f64>,
    /// Unit outward normal.
    pub normal: Vector3<f64>,
}

/// A node of the octree. `depth` counts from the leaves up: leaves are at
/// depth 0 and the root at the octree's full depth.
#[derive(Debug)]
pub struct OctreeNode {
    center: Point3<f64>,
    side: f64,
    depth: u32,
    children: [Option<Box<OctreeNode>>; 8],
    points: Vec<VertexId>,
}

impl OctreeNode {
    fn new(center: Point3<f64>, side: f64, depth: u32) -> Self {
        Self {
            center,
            side,
            depth,
            children: Default::default(),
            points: Vec::new(),
        }
    }

    /// Cell center.
    #[inline]
    pub fn center(&self) -> &Point3<f64> {
        &self.center
    }

    /// Cell side length.
    #[inline]
    pub fn side(&self) -> f64 {
        self.side
    }

    /// Depth from the leaf level (0 for leaves).
    #[inline]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Number of samples in this leaf (0 for interior nodes).
    #[inline]
    pub fn npts(&self) -> usize {
        self.points.len()
    }

    /// Samples stored in this leaf.
    #[inline]
    pub fn points(&self) -> &[VertexId] {
        &self.points
    }

    /// Existing children, in slot order.
    pub fn children(&self) -> impl Iterator<Item = &OctreeNode> {
        self.children.iter().filter_map(|c| c.as_deref())
    }

    /// Whether `p` lies within this cell expanded by `margin` on every side
    /// (L-infinity test).
    pub fn is_inside(&self, p: &Point3<f64>, margin: f64) -> bool {
        let half = self.side * 0.5 + margin;
        (p.x - self.center.x).abs() <= half
            && (p.y - self.center.y).abs() <= half
            && (p.z - self.center.z).abs() <= half
    }

    fn child_slot(&self, p: &Point3<f64>) -> usize {
        (usize::from(p.x >= self.center.x))
            | (usize::from(p.y >= self.center.y) << 1)
            | (usize::from(p.z >= self.center.z) << 2)
    }

    fn insert(&mut self, id: VertexId, p: &Point3<f64>) {
        if self.depth == 0 {
            self.points.push(id);
            return;
        }
        let slot = self.child_slot(p);
        let quarter = self.side * 0.25;
        let center = self.center
            + Vector3::new(
                if slot & 1 != 0 { quarter } else { -quarter },
                if slot & 2 != 0 { quarter } else { -quarter },
                if slot & 4 != 0 { quarter } else { -quarter },
            );
        let (side, depth) = (self.side * 0.5, self.depth - 1);
        let child = self.children[slot]
            .get_or_insert_with(|| Box::new(OctreeNode::new(center, side, depth)));
        child.insert(id, p);
    }
}

/// Occupancy summary of a built octree.
#[derive(Debug, Clone, Copy)]
pub struct OctreeStats {
    /// Total number of samples.
    pub num_points: usize,
    /// Octree depth (number of subdivision levels).
    pub depth: u32,
    /// Root cell side length.
    pub size: f64,
    /// Number of non-empty leaf cells.
    pub leaves: usize,
    /// Largest number of samples in a single leaf.
    pub max_leaf_points: usize,
}

/// Adaptive cubical octree owning the input samples.
#[derive(Debug)]
pub struct Octree {
    samples: Vec<Sample>,
    root: OctreeNode,
    depth: u32,
    size: f64,
}

impl Octree {
    /// Build an octree of the given fixed depth.
    pub fn with_depth(samples: Vec<Sample>, depth: u32) -> Self {
        let (center, size) = bounding_cube(&samples);
        Self::build(samples, center, size, depth)
    }

    /// Build an octree whose leaf cells are at least `2 * min_radius` wide —
    /// the deepest subdivision through which a ball of the smallest pivoting
    /// radius still fits.
    pub fn for_radius(samples: Vec<Sample>, min_radius: f64) -> Self {
        let (center, size) = bounding_cube(&samples);
        let depth = if min_radius > 0.0 && size > 2.0 * min_radius {
            (size / (2.0 * min_radius)).log2().floor() as u32
        } else {
            0
        };
        Self::build(samples, center, size, depth)
    }

    fn build(samples: Vec<Sample>, center: Point3<f64>, size: f64, depth: u32) -> Self {
        let mut root = OctreeNode::new(center, size, depth);
        for (i, sample) in samples.iter().enumerate() {
            root.insert(VertexId::new(i), &sample.position);
        }
        Self { samples, root, depth, size }
    }

    /// Number of samples.
    #[inline]
    pub fn num_points(&self) -> usize {
        self.samples.len()
    }

    /// All samples, indexed by [`VertexId`].
    #[inline]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Position of a sample.
    #[inline]
    pub fn position(&self, v: VertexId) -> &Point3<f64> {
        &self.samples[v.index()].position
    }

    /// Normal of a sample.
    #[inline]
    pub fn normal(&self, v: VertexId) -> &Vector3<f64> {
        &self.samples[v.index()].normal
    }

    /// The root node.
    #[inline]
    pub fn root(&self) -> &OctreeNode {
        &self.root
    }

    /// Octree depth.
    #[inline]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Root cell side length.
    #[inline]
    pub fn size(&self) -> f64 {
        self.size
    }

    /// Collect the cells at the given depth (counted from the leaves) into
    /// eight groups by the parity pattern of their integer cell coordinates.
    ///
    /// Two distinct cells in the same group differ by at least two cells
    /// along some axis, so their one-cell-wide dilations never overlap —
    /// the guarantee the parallel driver's wave scheduling is built on.
    pub fn color_groups(&self, depth: u32) -> [Vec<&OctreeNode>; 8] {
        let mut groups: [Vec<&OctreeNode>; 8] = Default::default();
        collect_colored(&self.root, depth, 0, 0, 0, &mut groups);
        groups
    }

    /// Occupancy statistics.
    pub fn stats(&self) -> OctreeStats {
        let mut leaves = 0;
        let mut max_leaf_points = 0;
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            if node.depth == 0 {
                if !node.points.is_empty() {
                    leaves += 1;
                    max_leaf_points = max_leaf_points.max(node.points.len());
                }
            } else {
                stack.extend(node.children());
            }
        }
        OctreeStats {
            num_points: self.samples.len(),
            depth: self.depth,
            size: self.size,
            leaves,
            max_leaf_points,
        }
    }
}

fn collect_colored<'a>(
    node: &'a OctreeNode,
    depth: u32,
    x: u64,
    y: u64,
    z: u64,
    groups: &mut [Vec<&'a OctreeNode>; 8],
) {
    if node.depth == depth {
        let color = ((x & 1) | ((y & 1) << 1) | ((z & 1) << 2)) as usize;
        groups[color].push(node);
        return;
    }
    for (slot, child) in node.children.iter().enumerate() {
        if let Some(child) = child {
            collect_colored(
                child,
                depth,
                2 * x + (slot as u64 & 1),
                2 * y + ((slot as u64 >> 1) & 1),
                2 * z + ((slot as u64 >> 2) & 1),
                groups,
            );
        }
    }
}

fn bounding_cube(samples: &[Sample]) -> (Point3<f64>, f64) {
    if samples.is_empty() {
        return (Point3::origin(), 1.0);
    }
    let mut min = samples[0].position;
    let mut max = samples[0].position;
    for s in samples {
        for i in 0..3 {
            min[i] = min[i].min(s.position[i]);
            max[i] = max[i].max(s.position[i]);
        }
    }
    let extent = max - min;
    let largest = extent.x.max(extent.y).max(extent.z);
    let size = if largest > 0.0 { largest * (1.0 + 1e-6) } else { 1.0 };
    (Point3::from((min.coords + max.coords) * 0.5), size)
}
