//! Trundle CLI - ball-pivoting surface reconstruction.
//!
//! Reads an oriented point cloud (`x y z nx ny nz` per line), reconstructs
//! a triangle mesh by ball pivoting, and writes it as ASCII PLY.

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use log::{info, warn};

use trundle::graph::MeshGraph;
use trundle::io;
use trundle::mesher::Mesher;
use trundle::octree::Octree;
use trundle::{Error, Result};

#[derive(Parser)]
#[command(name = "trundle")]
#[command(author, version, about = "Ball-pivoting surface reconstruction", long_about = None)]
struct Cli {
    /// Input point file (x y z nx ny nz per line)
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    /// Output PLY mesh file
    #[arg(short = 'o', long = "output")]
    output: PathBuf,

    /// Octree depth; ignored when radii are given
    #[arg(short = 'd', long = "depth", default_value_t = 7)]
    depth: u32,

    /// Pivoting radii, whitespace-separated, e.g. "0.5 1.0 2.0".
    /// Processed in ascending order; the smallest also sizes the octree
    #[arg(short = 'r', long = "radii")]
    radii: Option<String>,

    /// Mesh octree cells in parallel
    #[arg(short = 'p', long = "parallel")]
    parallel: bool,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let radii = parse_radii(cli.radii.as_deref())?;

    let start = Instant::now();
    let samples = io::points::load(&cli.input)?;
    let octree = match radii.first() {
        Some(&r_min) => Octree::for_radius(samples, r_min),
        None => Octree::with_depth(samples, cli.depth),
    };

    let stats = octree.stats();
    info!(
        "octree: {} points, depth {}, size {:.6}, {} occupied leaves (max {} points)",
        stats.num_points, stats.depth, stats.size, stats.leaves, stats.max_leaf_points
    );
    info!("reading and sorting points took {:.2?}", start.elapsed());

    if radii.is_empty() {
        warn!("no radii given (-r); writing an empty mesh");
    } else {
        info!(
            "reconstructing with radii {}",
            radii
                .iter()
                .map(f64::to_string)
                .collect::<Vec<_>>()
                .join(" ")
        );
    }

    let mut graph = MeshGraph::new(octree.num_points());
    let mut mesher = Mesher::new(&octree, &mut graph);

    let start = Instant::now();
    if cli.parallel {
        mesher.parallel_reconstruct(&radii);
    } else {
        mesher.reconstruct(&radii);
    }
    info!(
        "reconstructed mesh: {} vertices, {} facets, {} border edges ({:.2?})",
        mesher.n_vertices(),
        mesher.n_facets(),
        mesher.n_border_edges(),
        start.elapsed()
    );

    let start = Instant::now();
    mesher.fill_holes();
    info!(
        "after hole filling: {} facets, {} border edges ({:.2?})",
        mesher.n_facets(),
        mesher.n_border_edges(),
        start.elapsed()
    );

    io::ply::save(&cli.output, &mesher)?;
    info!("saved {}", cli.output.display());

    Ok(())
}

/// Parse the whitespace-separated radius list and sort it ascending.
fn parse_radii(arg: Option<&str>) -> Result<Vec<f64>> {
    let Some(arg) = arg else {
        return Ok(Vec::new());
    };
    let mut radii = Vec::new();
    for token in arg.split_whitespace() {
        let radius: f64 = token.parse().map_err(|_| Error::ParseRadius {
            value: token.to_string(),
        })?;
        if !radius.is_finite() || radius <= 0.0 {
            return Err(Error::ParseRadius {
                value: token.to_string(),
            });
        }
        radii.push(radius);
    }
    radii.sort_by(f64::total_cmp);
    Ok(radii)
}
