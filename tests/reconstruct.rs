//! End-to-end reconstruction scenarios.

use nalgebra::{Point3, Vector3};
use trundle::graph::EdgeKind;
use trundle::prelude::*;

/// Four tetrahedron corners with outward normals.
fn tetrahedron(offset: Vector3<f64>) -> Vec<Sample> {
    let corners = [
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
        Point3::new(0.0, 0.0, 1.0),
    ];
    let centroid = Point3::new(0.25, 0.25, 0.25);
    corners
        .into_iter()
        .map(|p| Sample {
            position: p + offset,
            normal: (p - centroid).normalize(),
        })
        .collect()
}

/// A near-planar grid of `nx` by `ny` unit-spaced samples with up normals,
/// skipping the rows for which `keep_row` is false.
///
/// A checkerboard height jitter of 0.01 breaks the exact cosphericality of
/// square cells: on a perfectly flat grid every square's fourth corner lands
/// inside the empty-ball tolerance and no triangle survives.
fn grid(nx: usize, ny: usize, keep_row: impl Fn(usize) -> bool) -> Vec<Sample> {
    let mut samples = Vec::new();
    for j in 0..ny {
        if !keep_row(j) {
            continue;
        }
        for i in 0..nx {
            let z = if (i + j) % 2 == 1 { 0.01 } else { 0.0 };
            samples.push(Sample {
                position: Point3::new(i as f64, j as f64, z),
                normal: Vector3::new(0.0, 0.0, 1.0),
            });
        }
    }
    samples
}

/// Deterministic, roughly uniform sampling of the unit sphere.
fn fibonacci_sphere(n: usize) -> Vec<Sample> {
    let golden = std::f64::consts::PI * (3.0 - 5.0_f64.sqrt());
    (0..n)
        .map(|i| {
            let y = 1.0 - 2.0 * (i as f64 + 0.5) / n as f64;
            let ring = (1.0 - y * y).sqrt();
            let theta = golden * i as f64;
            let dir = Vector3::new(ring * theta.cos(), y, ring * theta.sin());
            Sample {
                position: Point3::from(dir),
                normal: dir,
            }
        })
        .collect()
}

fn edge_kind_counts(graph: &MeshGraph) -> (usize, usize, usize) {
    let mut counts = (0, 0, 0);
    for (_, e) in graph.edges() {
        match e.kind() {
            EdgeKind::Border => counts.0 += 1,
            EdgeKind::Front => counts.1 += 1,
            EdgeKind::Inner => counts.2 += 1,
        }
    }
    counts
}

/// Number of facet-connected components, via the vertices facets share.
fn connected_components(mesher: &Mesher<'_, '_>) -> usize {
    let graph = mesher.graph();
    let n = graph.num_vertices();
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut Vec<usize>, mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    for &f in mesher.facets() {
        let [a, b, c] = graph.facet(f).vertices();
        for v in [b, c] {
            let (ra, rv) = (find(&mut parent, a.index()), find(&mut parent, v.index()));
            parent[ra] = rv;
        }
    }

    let mut roots: Vec<usize> = mesher
        .facets()
        .iter()
        .map(|&f| find(&mut parent, graph.facet(f).vertices()[0].index()))
        .collect();
    roots.sort_unstable();
    roots.dedup();
    roots.len()
}

#[test]
fn tetrahedron_closes_completely() {
    let octree = Octree::for_radius(tetrahedron(Vector3::zeros()), 1.5);
    let mut graph = MeshGraph::new(octree.num_points());
    let mut mesher = Mesher::new(&octree, &mut graph);

    mesher.reconstruct(&[1.5]);

    assert_eq!(mesher.n_facets(), 4);
    assert_eq!(mesher.n_vertices(), 4);
    assert_eq!(mesher.n_border_edges(), 0);
    let (border, front, inner) = edge_kind_counts(mesher.graph());
    assert_eq!((border, front, inner), (0, 0, 6));

    assert!(mesher.graph().check_invariants());
    assert!(mesher.graph().check_ball_centers(octree.samples()));
}

#[test]
fn grid_surface_triangulates_every_square() {
    let octree = Octree::for_radius(grid(4, 4, |_| true), 0.8);
    let mut graph = MeshGraph::new(octree.num_points());
    let mut mesher = Mesher::new(&octree, &mut graph);

    mesher.reconstruct(&[0.8]);

    // Two triangles per unit square.
    assert_eq!(mesher.n_facets(), 18);
    assert_eq!(mesher.n_vertices(), 16);
    // The perimeter stays open: 12 border edges around a 4x4 grid.
    assert_eq!(mesher.n_border_edges(), 12);
    let (border, _, inner) = edge_kind_counts(mesher.graph());
    assert_eq!(border, 12);
    assert_eq!(inner, 21);

    assert!(mesher.graph().check_invariants());
    assert!(mesher.graph().check_ball_centers(octree.samples()));

    // No 3-loops on the perimeter: hole filling is a no-op, twice.
    mesher.fill_holes();
    assert_eq!(mesher.n_facets(), 18);
    assert_eq!(mesher.n_border_edges(), 12);
    mesher.fill_holes();
    assert_eq!(mesher.n_facets(), 18);
    assert_eq!(mesher.n_border_edges(), 12);
}

#[test]
fn separated_clusters_mesh_independently() {
    let mut samples = tetrahedron(Vector3::zeros());
    samples.extend(tetrahedron(Vector3::new(100.0, 0.0, 0.0)));

    let octree = Octree::for_radius(samples, 1.5);
    let mut graph = MeshGraph::new(octree.num_points());
    let mut mesher = Mesher::new(&octree, &mut graph);

    mesher.reconstruct(&[1.5]);

    assert_eq!(mesher.n_facets(), 8);
    assert_eq!(mesher.n_vertices(), 8);
    assert_eq!(connected_components(&mesher), 2);
    assert!(mesher.graph().check_invariants());
}

#[test]
fn larger_radius_bridges_the_gap() {
    // A grid surface with its central row missing: the small ball cannot
    // cross the two-unit gap, so the two halves mesh separately.
    let samples = grid(5, 5, |j| j != 2);

    let octree = Octree::for_radius(samples.clone(), 0.8);
    let mut graph = MeshGraph::new(octree.num_points());
    let mut single = Mesher::new(&octree, &mut graph);
    single.reconstruct(&[0.8]);
    let single_facets = single.n_facets();
    let (_, _, single_inner) = edge_kind_counts(single.graph());
    assert_eq!(single_facets, 16);
    assert!(single.n_border_edges() > 0);

    let octree2 = Octree::for_radius(samples, 0.8);
    let mut graph2 = MeshGraph::new(octree2.num_points());
    let mut multi = Mesher::new(&octree2, &mut graph2);
    multi.reconstruct(&[0.8, 1.6]);

    // Radius monotonicity: everything the small ball built is still there,
    // plus bridge triangles across the gap turning former border edges
    // inner.
    assert!(multi.n_facets() > single_facets);
    let (_, _, multi_inner) = edge_kind_counts(multi.graph());
    assert!(multi_inner > single_inner);
    assert!(multi.graph().check_invariants());
    assert!(multi.graph().check_ball_centers(octree2.samples()));
}

#[test]
fn parallel_matches_sequential_on_a_sphere() {
    let samples = fibonacci_sphere(1000);

    let octree = Octree::for_radius(samples.clone(), 0.15);
    let mut graph = MeshGraph::new(octree.num_points());
    let mut sequential = Mesher::new(&octree, &mut graph);
    sequential.reconstruct(&[0.15]);

    let octree2 = Octree::for_radius(samples, 0.15);
    let mut graph2 = MeshGraph::new(octree2.num_points());
    let mut parallel = Mesher::new(&octree2, &mut graph2);
    parallel.parallel_reconstruct(&[0.15]);

    // Every sample is used and the sphere closes completely: a genus-0
    // surface over 1000 vertices has 2V - 4 facets.
    assert_eq!(sequential.n_vertices(), 1000);
    assert_eq!(sequential.n_facets(), 1996);
    assert_eq!(sequential.n_border_edges(), 0);

    assert_eq!(parallel.n_vertices(), sequential.n_vertices());
    assert_eq!(parallel.n_facets(), sequential.n_facets());
    assert_eq!(parallel.n_border_edges(), 0);

    assert!(sequential.graph().check_invariants());
    assert!(parallel.graph().check_invariants());
    assert!(parallel.graph().check_ball_centers(parallel.octree().samples()));
}

#[test]
fn parallel_multi_radius_bridges_too() {
    let samples = grid(5, 5, |j| j != 2);
    let octree = Octree::for_radius(samples, 0.8);
    let mut graph = MeshGraph::new(octree.num_points());
    let mut mesher = Mesher::new(&octree, &mut graph);

    mesher.parallel_reconstruct(&[0.8, 1.6]);

    // The bridge facets appear in parallel mode as well.
    assert!(mesher.n_facets() > 16);
    assert!(mesher.graph().check_invariants());
}

#[test]
fn empty_input_is_fine() {
    let octree = Octree::with_depth(Vec::new(), 7);
    let mut graph = MeshGraph::new(0);
    let mut mesher = Mesher::new(&octree, &mut graph);

    mesher.reconstruct(&[0.5]);
    mesher.fill_holes();
    assert_eq!(mesher.n_facets(), 0);
    assert_eq!(mesher.n_vertices(), 0);

    let mut graph2 = MeshGraph::new(0);
    let mut parallel = Mesher::new(&octree, &mut graph2);
    parallel.parallel_reconstruct(&[0.5]);
    assert_eq!(parallel.n_facets(), 0);
}

#[test]
fn degenerate_inputs_produce_no_facets() {
    // Fewer than three points.
    let two = vec![
        Sample {
            position: Point3::new(0.0, 0.0, 0.0),
            normal: Vector3::new(0.0, 0.0, 1.0),
        },
        Sample {
            position: Point3::new(1.0, 0.0, 0.0),
            normal: Vector3::new(0.0, 0.0, 1.0),
        },
    ];
    let octree = Octree::for_radius(two, 1.0);
    let mut graph = MeshGraph::new(octree.num_points());
    let mut mesher = Mesher::new(&octree, &mut graph);
    mesher.reconstruct(&[1.0]);
    assert_eq!(mesher.n_facets(), 0);

    // Collinear points never carry a circumball.
    let collinear: Vec<Sample> = (0..5)
        .map(|i| Sample {
            position: Point3::new(i as f64, 0.0, 0.0),
            normal: Vector3::new(0.0, 0.0, 1.0),
        })
        .collect();
    let octree = Octree::for_radius(collinear, 1.0);
    let mut graph = MeshGraph::new(octree.num_points());
    let mut mesher = Mesher::new(&octree, &mut graph);
    mesher.reconstruct(&[1.0]);
    assert_eq!(mesher.n_facets(), 0);

    // A coincident pair is rejected by the degeneracy guard.
    let coincident = vec![
        Sample {
            position: Point3::new(0.0, 0.0, 0.0),
            normal: Vector3::new(0.0, 0.0, 1.0),
        },
        Sample {
            position: Point3::new(0.0, 0.0, 0.0),
            normal: Vector3::new(0.0, 0.0, 1.0),
        },
        Sample {
            position: Point3::new(1.0, 0.0, 0.0),
            normal: Vector3::new(0.0, 0.0, 1.0),
        },
    ];
    let octree = Octree::for_radius(coincident, 1.0);
    let mut graph = MeshGraph::new(octree.num_points());
    let mut mesher = Mesher::new(&octree, &mut graph);
    mesher.reconstruct(&[1.0]);
    assert_eq!(mesher.n_facets(), 0);
}

#[test]
fn oversized_radius_still_closes_the_tetrahedron() {
    // A ball far wider than the cloud still rests on each face from
    // outside; the empty-ball test keeps the interior clean.
    let octree = Octree::with_depth(tetrahedron(Vector3::zeros()), 3);
    let mut graph = MeshGraph::new(octree.num_points());
    let mut mesher = Mesher::new(&octree, &mut graph);

    mesher.reconstruct(&[20.0]);
    assert_eq!(mesher.n_facets(), 4);
    assert_eq!(mesher.n_border_edges(), 0);
    assert!(mesher.graph().check_invariants());
}

#[test]
fn no_radii_means_empty_mesh() {
    let octree = Octree::with_depth(tetrahedron(Vector3::zeros()), 3);
    let mut graph = MeshGraph::new(octree.num_points());
    let mut mesher = Mesher::new(&octree, &mut graph);

    mesher.reconstruct(&[]);
    assert_eq!(mesher.n_facets(), 0);

    let mut graph2 = MeshGraph::new(octree.num_points());
    let mut parallel = Mesher::new(&octree, &mut graph2);
    parallel.parallel_reconstruct(&[]);
    assert_eq!(parallel.n_facets(), 0);
}
