//! Sparse feature selection and tracking on grayscale planes.
//!
//! Planes are `Array2<f32>` indexed `[[row, col]]`. Corners use the Shi-Tomasi
//! minimum eigenvalue score, tracking is coarse-to-fine Lucas-Kanade.

use nalgebra as na;
use ndarray::Array2;

/// Minimum eigenvalue of the normalized gradient matrix for a trackable window
const MIN_EIG_THRESHOLD: f32 = 1e-4;

#[derive(Debug, Clone)]
pub struct CornerParams {
    pub max_corners: usize,
    pub quality_level: f32,
    pub min_distance: f32,
    pub block_size: usize,
}

#[derive(Debug, Clone)]
pub struct FlowParams {
    pub win_size: usize,
    pub max_level: usize,
    pub max_iterations: usize,
    pub epsilon: f32,
}

/// Bilinear sample with border replication
#[inline]
fn sample(img: &Array2<f32>, x: f32, y: f32) -> f32 {
    let (h, w) = img.dim();
    let x = x.clamp(0.0, (w - 1) as f32);
    let y = y.clamp(0.0, (h - 1) as f32);

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let top = img[[y0, x0]] * (1.0 - fx) + img[[y0, x1]] * fx;
    let bottom = img[[y1, x0]] * (1.0 - fx) + img[[y1, x1]] * fx;

    top * (1.0 - fy) + bottom * fy
}

/// Central-difference gradients (d/dx, d/dy)
fn gradients(img: &Array2<f32>) -> (Array2<f32>, Array2<f32>) {
    let (h, w) = img.dim();
    let mut gx = Array2::zeros((h, w));
    let mut gy = Array2::zeros((h, w));

    for y in 0..h {
        for x in 0..w {
            let xl = x.saturating_sub(1);
            let xr = (x + 1).min(w - 1);
            let yt = y.saturating_sub(1);
            let yb = (y + 1).min(h - 1);

            if xr > xl {
                gx[[y, x]] = (img[[y, xr]] - img[[y, xl]]) / (xr - xl) as f32;
            }
            if yb > yt {
                gy[[y, x]] = (img[[yb, x]] - img[[yt, x]]) / (yb - yt) as f32;
            }
        }
    }

    (gx, gy)
}

#[inline]
fn min_eigenvalue(a: f32, b: f32, c: f32) -> f32 {
    // [[a, b], [b, c]]
    let half_trace = (a + c) * 0.5;
    let d = ((a - c) * 0.5).powi(2) + b * b;

    half_trace - d.sqrt()
}

/// Strongest corners inside `mask`, at least `min_distance` apart, strongest first
pub fn good_features<M>(img: &Array2<f32>, params: &CornerParams, mask: M) -> Vec<na::Point2<f32>>
where
    M: Fn(usize, usize) -> bool,
{
    let (h, w) = img.dim();
    let r = params.block_size.max(3) / 2;

    if h <= 2 * r + 2 || w <= 2 * r + 2 || params.max_corners == 0 {
        return Vec::new();
    }

    let (gx, gy) = gradients(img);
    let mut score = Array2::<f32>::zeros((h, w));
    let mut max_score = 0.0f32;

    for y in r + 1..h - r - 1 {
        for x in r + 1..w - r - 1 {
            if !mask(x, y) {
                continue;
            }

            let (mut sxx, mut sxy, mut syy) = (0.0f32, 0.0f32, 0.0f32);
            for yy in y - r..=y + r {
                for xx in x - r..=x + r {
                    let ix = gx[[yy, xx]];
                    let iy = gy[[yy, xx]];

                    sxx += ix * ix;
                    sxy += ix * iy;
                    syy += iy * iy;
                }
            }

            let s = min_eigenvalue(sxx, sxy, syy);
            score[[y, x]] = s;
            max_score = max_score.max(s);
        }
    }

    if max_score <= 0.0 {
        return Vec::new();
    }

    let threshold = max_score * params.quality_level;
    let mut candidates = Vec::new();

    for y in r + 1..h - r - 1 {
        for x in r + 1..w - r - 1 {
            let s = score[[y, x]];
            if s < threshold || s <= 0.0 {
                continue;
            }

            // 3x3 local maximum
            let is_max = (y - 1..=y + 1)
                .flat_map(|yy| (x - 1..=x + 1).map(move |xx| (xx, yy)))
                .all(|(xx, yy)| score[[yy, xx]] <= s);

            if is_max {
                candidates.push((s, x, y));
            }
        }
    }

    candidates.sort_unstable_by(|a, b| b.0.total_cmp(&a.0));

    let min_d2 = params.min_distance * params.min_distance;
    let mut corners: Vec<na::Point2<f32>> = Vec::with_capacity(params.max_corners);

    for (_, x, y) in candidates {
        let p = na::Point2::new(x as f32, y as f32);

        if corners
            .iter()
            .all(|c| na::distance_squared(c, &p) >= min_d2)
        {
            corners.push(p);

            if corners.len() >= params.max_corners {
                break;
            }
        }
    }

    corners
}

/// Halves resolution with a 2x2 box filter
fn downsample(img: &Array2<f32>) -> Array2<f32> {
    let (h, w) = img.dim();
    let (nh, nw) = ((h / 2).max(1), (w / 2).max(1));

    Array2::from_shape_fn((nh, nw), |(y, x)| {
        let (y0, x0) = ((2 * y).min(h - 1), (2 * x).min(w - 1));
        let (y1, x1) = ((2 * y + 1).min(h - 1), (2 * x + 1).min(w - 1));

        (img[[y0, x0]] + img[[y0, x1]] + img[[y1, x0]] + img[[y1, x1]]) * 0.25
    })
}

fn pyramid(img: &Array2<f32>, levels: usize) -> Vec<Array2<f32>> {
    let mut out = vec![img.clone()];

    for _ in 0..levels {
        let (h, w) = out[out.len() - 1].dim();
        if h < 8 || w < 8 {
            break;
        }

        let next = downsample(&out[out.len() - 1]);
        out.push(next);
    }

    out
}

/// Tracks `points` from `prev` into `next`, `None` for lost points
pub fn track(
    prev: &Array2<f32>,
    next: &Array2<f32>,
    points: &[na::Point2<f32>],
    params: &FlowParams,
) -> Vec<Option<na::Point2<f32>>> {
    let prev_pyr = pyramid(prev, params.max_level);
    let next_pyr = pyramid(next, params.max_level);
    let levels = prev_pyr.len().min(next_pyr.len());
    let (h, w) = prev.dim();

    points
        .iter()
        .map(|pt| {
            let mut guess = na::Vector2::<f32>::zeros();

            for level in (0..levels).rev() {
                let scale = (1u32 << level) as f32;
                let p = pt.coords / scale;

                let v = track_level(&prev_pyr[level], &next_pyr[level], p, guess, params)?;

                guess = if level > 0 { (guess + v) * 2.0 } else { guess + v };
            }

            let out = *pt + guess;

            if out.x < 0.0 || out.y < 0.0 || out.x > (w - 1) as f32 || out.y > (h - 1) as f32 {
                None
            } else {
                Some(out)
            }
        })
        .collect()
}

/// One Lucas-Kanade refinement at a single pyramid level. Returns the residual
/// displacement on top of `guess`.
fn track_level(
    prev: &Array2<f32>,
    next: &Array2<f32>,
    p: na::Vector2<f32>,
    guess: na::Vector2<f32>,
    params: &FlowParams,
) -> Option<na::Vector2<f32>> {
    let r = (params.win_size / 2) as i32;
    let n = ((2 * r + 1) * (2 * r + 1)) as usize;

    let mut patch = Vec::with_capacity(n);
    let (mut gxx, mut gxy, mut gyy) = (0.0f32, 0.0f32, 0.0f32);

    for dy in -r..=r {
        for dx in -r..=r {
            let x = p.x + dx as f32;
            let y = p.y + dy as f32;

            let i = sample(prev, x, y);
            let ix = (sample(prev, x + 1.0, y) - sample(prev, x - 1.0, y)) * 0.5;
            let iy = (sample(prev, x, y + 1.0) - sample(prev, x, y - 1.0)) * 0.5;

            gxx += ix * ix;
            gxy += ix * iy;
            gyy += iy * iy;

            patch.push((x, y, i, ix, iy));
        }
    }

    // Gradients are on the 0..255 scale
    let norm = n as f32 * 255.0 * 255.0;
    if min_eigenvalue(gxx / norm, gxy / norm, gyy / norm) < MIN_EIG_THRESHOLD {
        return None;
    }

    let g = na::Matrix2::new(gxx, gxy, gxy, gyy);
    let g_inv = g.try_inverse()?;

    let mut v = na::Vector2::<f32>::zeros();

    for _ in 0..params.max_iterations {
        let offset = guess + v;
        let mut b = na::Vector2::<f32>::zeros();

        for &(x, y, i, ix, iy) in &patch {
            let diff = i - sample(next, x + offset.x, y + offset.y);

            b.x += diff * ix;
            b.y += diff * iy;
        }

        let eta = g_inv * b;
        v += eta;

        if eta.norm() < params.epsilon {
            break;
        }
    }

    Some(v)
}
