//! ASCII PLY 1.0 mesh writer.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::mesher::Mesher;

/// Save the reconstructed mesh as ASCII PLY with per-vertex normals.
///
/// Vertices are written in emission order; faces reference them by the
/// indices the mesher assigned during reconstruction.
pub fn save<P: AsRef<Path>>(path: P, mesher: &Mesher<'_, '_>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    let octree = mesher.octree();
    let graph = mesher.graph();

    writeln!(writer, "ply")?;
    writeln!(writer, "format ascii 1.0")?;
    writeln!(writer, "element vertex {}", mesher.n_vertices())?;
    writeln!(writer, "property float x")?;
    writeln!(writer, "property float y")?;
    writeln!(writer, "property float z")?;
    writeln!(writer, "property float nx")?;
    writeln!(writer, "property float ny")?;
    writeln!(writer, "property float nz")?;
    writeln!(writer, "element face {}", mesher.n_facets())?;
    writeln!(writer, "property list uchar int vertex_indices")?;
    writeln!(writer, "end_header")?;

    for &v in mesher.vertices() {
        let p = octree.position(v);
        let n = octree.normal(v);
        writeln!(writer, "{} {} {} {} {} {}", p.x, p.y, p.z, n.x, n.y, n.z)?;
    }

    for &f in mesher.facets() {
        let [a, b, c] = graph.facet(f).vertices();
        let index = |v| {
            graph.emit(v).ok_or_else(|| Error::SaveMesh {
                path: path.to_path_buf(),
                message: "facet references an unemitted vertex".to_string(),
            })
        };
        writeln!(writer, "3 {} {} {}", index(a)?, index(b)?, index(c)?)?;
    }

    writer.flush()?;
    Ok(())
}
