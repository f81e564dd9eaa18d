//! Geometry kernel for ball pivoting.
//!
//! Pure functions over [`Point3`]/[`Vector3`] doubles: squared distance,
//! midpoint, guarded normalization, and the computation at the heart of the
//! algorithm — the center of a ball of given radius incident to three
//! oriented samples.

use nalgebra::{Point3, Vector3};

/// Squared Euclidean distance between two points.
#[inline]
pub fn dist2(p: &Point3<f64>, q: &Point3<f64>) -> f64 {
    (p - q).norm_squared()
}

/// Midpoint of the segment between two points.
#[inline]
pub fn midpoint(p: &Point3<f64>, q: &Point3<f64>) -> Point3<f64> {
    Point3::from((p.coords + q.coords) * 0.5)
}

/// Normalize a vector in place.
///
/// Near-zero vectors (norm below 1e-300) are left unchanged and `false` is
/// returned, so degenerate cross products flow through the callers' sign
/// tests instead of becoming NaN.
#[inline]
pub fn normalize(v: &mut Vector3<f64>) -> bool {
    let norm = v.norm();
    if norm < 1e-300 {
        return false;
    }
    *v /= norm;
    true
}

/// Unit normal of the triangle (p1, p2, p3), flipped if necessary so that it
/// points to the same side as the summed vertex normals.
pub fn outward_normal(
    p1: &Point3<f64>,
    p2: &Point3<f64>,
    p3: &Point3<f64>,
    n1: &Vector3<f64>,
    n2: &Vector3<f64>,
    n3: &Vector3<f64>,
) -> Vector3<f64> {
    let mut normal = (p2 - p1).cross(&(p3 - p1));
    normalize(&mut normal);
    if normal.dot(&(n1 + n2 + n3)) < 0.0 {
        -normal
    } else {
        normal
    }
}

/// Center of the ball of radius `radius` passing through three oriented
/// samples, on the side the vertex normals point to.
///
/// Returns `None` when the points are (nearly) aligned or when the triangle
/// circumradius exceeds `radius`. The opposite-side ball is intentionally
/// never produced.
pub fn ball_center(
    p1: &Point3<f64>,
    p2: &Point3<f64>,
    p3: &Point3<f64>,
    n1: &Vector3<f64>,
    n2: &Vector3<f64>,
    n3: &Vector3<f64>,
    radius: f64,
) -> Option<Point3<f64>> {
    // Circumcenter in barycentric coordinates.
    let c = dist2(p2, p1);
    let b = dist2(p1, p3);
    let a = dist2(p3, p2);

    let mut alpha = a * (b + c - a);
    let mut beta = b * (a + c - b);
    let mut gamma = c * (a + b - c);
    let total = alpha + beta + gamma;

    // Aligned or coincident points.
    if total < 1e-30 {
        return None;
    }

    alpha /= total;
    beta /= total;
    gamma /= total;

    let circumcenter =
        Point3::from(alpha * p1.coords + beta * p2.coords + gamma * p3.coords);

    let (sa, sb, sc) = (a.sqrt(), b.sqrt(), c.sqrt());
    let sq_circumradius =
        (a * b * c) / ((sa + sb + sc) * (sb + sc - sa) * (sc + sa - sb) * (sa + sb - sc));

    // Orthogonal distance from the ball center to the triangle plane.
    let sq_height = radius * radius - sq_circumradius;
    if sq_height.is_nan() || sq_height < 0.0 {
        return None;
    }

    let normal = outward_normal(p1, p2, p3, n1, n2, n3);
    Some(circumcenter + sq_height.sqrt() * normal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dist2_and_midpoint() {
        let p = Point3::new(1.0, 2.0, 3.0);
        let q = Point3::new(4.0, 6.0, 3.0);
        assert_eq!(dist2(&p, &q), 25.0);
        assert_eq!(midpoint(&p, &q), Point3::new(2.5, 4.0, 3.0));
    }

    #[test]
    fn test_normalize_guard() {
        let mut v = Vector3::new(3.0, 0.0, 4.0);
        assert!(normalize(&mut v));
        assert!((v.norm() - 1.0).abs() < 1e-15);

        let mut tiny = Vector3::new(1e-301, 0.0, 0.0);
        assert!(!normalize(&mut tiny));
        assert_eq!(tiny, Vector3::new(1e-301, 0.0, 0.0));
    }

    #[test]
    fn test_ball_center_equidistant() {
        let p1 = Point3::new(0.0, 0.0, 0.0);
        let p2 = Point3::new(1.0, 0.0, 0.0);
        let p3 = Point3::new(0.0, 1.0, 0.0);
        let up = Vector3::new(0.0, 0.0, 1.0);

        let r = 0.8;
        let center = ball_center(&p1, &p2, &p3, &up, &up, &up, r).unwrap();

        for p in [&p1, &p2, &p3] {
            assert!((dist2(&center, p).sqrt() - r).abs() < 1e-12);
        }
        // The ball sits on the side the normals point to.
        assert!(center.z > 0.0);
    }

    #[test]
    fn test_ball_center_respects_orientation() {
        let p1 = Point3::new(0.0, 0.0, 0.0);
        let p2 = Point3::new(1.0, 0.0, 0.0);
        let p3 = Point3::new(0.0, 1.0, 0.0);
        let down = Vector3::new(0.0, 0.0, -1.0);

        let center = ball_center(&p1, &p2, &p3, &down, &down, &down, 0.8).unwrap();
        assert!(center.z < 0.0);
    }

    #[test]
    fn test_ball_center_triangle_too_large() {
        let p1 = Point3::new(0.0, 0.0, 0.0);
        let p2 = Point3::new(10.0, 0.0, 0.0);
        let p3 = Point3::new(0.0, 10.0, 0.0);
        let up = Vector3::new(0.0, 0.0, 1.0);
        // Circumradius ~7.07, far beyond the ball.
        assert!(ball_center(&p1, &p2, &p3, &up, &up, &up, 1.0).is_none());
    }

    #[test]
    fn test_ball_center_degenerate() {
        let p1 = Point3::new(0.0, 0.0, 0.0);
        let p2 = Point3::new(1.0, 0.0, 0.0);
        let p3 = Point3::new(2.0, 0.0, 0.0);
        let up = Vector3::new(0.0, 0.0, 1.0);
        // Aligned points have no circumball.
        assert!(ball_center(&p1, &p2, &p3, &up, &up, &up, 5.0).is_none());

        // Coincident points hit the same rejection.
        assert!(ball_center(&p1, &p1, &p3, &up, &up, &up, 5.0).is_none());
    }
}
