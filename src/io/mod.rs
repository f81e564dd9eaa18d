//! Point-cloud input and mesh output.
//!
//! Input is a whitespace-separated ASCII format, one sample per line:
//!
//! ```text
//! x y z nx ny nz
//! ```
//!
//! Blank lines and lines starting with `#` are ignored. Output is ASCII
//! PLY 1.0 with per-vertex normals.

pub mod ply;
pub mod points;
