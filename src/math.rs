use nalgebra as na;
use num_traits::Float;

#[inline]
pub fn lerp<T: Float>(a: T, b: T, factor: T) -> T {
    a * (T::one() - factor) + b * factor
}

/// Exact projective transform mapping four `src` points onto four `dst` points.
///
/// Solves the 8x8 system for `h11..h32` with `h33 = 1`; returns `None` when the
/// correspondences are degenerate (three or more collinear points).
pub fn perspective_transform(
    src: &[na::Point2<f64>; 4],
    dst: &[na::Point2<f64>; 4],
) -> Option<na::Matrix3<f64>> {
    if has_collinear_triple(src) || has_collinear_triple(dst) {
        return None;
    }

    let mut a = na::SMatrix::<f64, 8, 8>::zeros();
    let mut b = na::SVector::<f64, 8>::zeros();

    for (i, (s, d)) in src.iter().zip(dst.iter()).enumerate() {
        let (x, y, u, v) = (s.x, s.y, d.x, d.y);

        a[(i, 0)] = x;
        a[(i, 1)] = y;
        a[(i, 2)] = 1.0;
        a[(i, 6)] = -x * u;
        a[(i, 7)] = -y * u;
        b[i] = u;

        a[(i + 4, 3)] = x;
        a[(i + 4, 4)] = y;
        a[(i + 4, 5)] = 1.0;
        a[(i + 4, 6)] = -x * v;
        a[(i + 4, 7)] = -y * v;
        b[i + 4] = v;
    }

    let h = a.lu().solve(&b)?;

    Some(na::Matrix3::new(
        h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0,
    ))
}

fn has_collinear_triple(pts: &[na::Point2<f64>; 4]) -> bool {
    const TRIPLES: [(usize, usize, usize); 4] = [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)];

    let scale = pts
        .iter()
        .flat_map(|p| [p.x.abs(), p.y.abs()])
        .fold(1.0f64, f64::max);

    TRIPLES.iter().any(|&(i, j, k)| {
        let u = pts[j] - pts[i];
        let v = pts[k] - pts[i];

        (u.x * v.y - u.y * v.x).abs() < 1e-9 * scale * scale
    })
}

/// Applies a homography, `None` for points mapped to infinity
#[inline]
pub fn project(h: &na::Matrix3<f64>, p: na::Point2<f64>) -> Option<na::Point2<f64>> {
    let hp = h * na::Vector3::new(p.x, p.y, 1.0);

    if hp.z.abs() < 1e-12 {
        return None;
    }

    Some(na::Point2::new(hp.x / hp.z, hp.y / hp.z))
}

fn distance_to_segment(p: na::Point2<f32>, a: na::Point2<f32>, b: na::Point2<f32>) -> f32 {
    let ab = b - a;
    let len2 = ab.norm_squared();

    if len2 < f32::EPSILON {
        return na::distance(&p, &a);
    }

    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);

    na::distance(&p, &(a + ab * t))
}

/// Point-in-polygon test, points on the boundary count as inside
pub fn in_bounds(p: na::Point2<f32>, poly: &[na::Point2<f32>]) -> bool {
    let n = poly.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut p1 = poly[0];
    let mut xints = 0.0;

    for i in 1..=n {
        let p2 = poly[i % n];

        if distance_to_segment(p, p1, p2) < 1e-3 {
            return true;
        }

        if p.y > f32::min(p1.y, p2.y) && p.y <= f32::max(p1.y, p2.y) && p.x <= f32::max(p1.x, p2.x)
        {
            if (p1.y - p2.y).abs() > f32::EPSILON {
                xints = (p.y - p1.y) * (p2.x - p1.x) / (p2.y - p1.y) + p1.x;
            }

            if (p1.x - p2.x).abs() < f32::EPSILON || p.x <= xints {
                inside = !inside;
            }
        }

        p1 = p2;
    }

    inside
}
