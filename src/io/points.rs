//! Oriented point-cloud reader.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use nalgebra::{Point3, Vector3};

use crate::error::{Error, Result};
use crate::geometry;
use crate::octree::Sample;

/// Load oriented samples from a whitespace-separated ASCII file.
///
/// Each non-empty, non-comment line must hold six doubles: position and
/// normal. Normals are expected to be unit length; others are normalized in
/// place, never reoriented.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Vec<Sample>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut samples = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split_whitespace().map(str::parse::<f64>);
        let mut next = |name: &str| -> Result<f64> {
            fields
                .next()
                .and_then(|f| f.ok())
                .ok_or_else(|| Error::ParsePoint {
                    path: path.to_path_buf(),
                    line: index + 1,
                    message: format!("expected {} as a double", name),
                })
        };

        let position = Point3::new(next("x")?, next("y")?, next("z")?);
        let mut normal = Vector3::new(next("nx")?, next("ny")?, next("nz")?);
        geometry::normalize(&mut normal);

        samples.push(Sample { position, normal });
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("trundle-{}-{}.txt", name, std::process::id()));
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_points() {
        let path = write_temp(
            "points",
            "# a comment\n\
             0 0 0 0 0 1\n\
             \n\
             1.5 -2.0 0.25 0 3 4\n",
        );
        let samples = load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].position, Point3::new(1.5, -2.0, 0.25));
        // Non-unit normals are normalized without reorientation.
        assert!((samples[1].normal - Vector3::new(0.0, 0.6, 0.8)).norm() < 1e-12);
    }

    #[test]
    fn test_malformed_line_reports_position() {
        let path = write_temp("malformed", "0 0 0 0 0 1\n1 2 3 nonsense 0 1\n");
        let err = load(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();

        match err {
            Error::ParsePoint { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_file() {
        assert!(load("/definitely/not/here.txt").is_err());
    }
}
