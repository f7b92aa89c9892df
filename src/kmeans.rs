use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::track::Rgb;

#[inline]
fn distance2(a: &Rgb, b: &Rgb) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[derive(Debug, Clone, PartialEq)]
pub struct KMeans {
    centroids: Vec<Rgb>,
}

impl KMeans {
    /// Lloyd iterations from a k-means++ seeding. Returns the model and the label of
    /// every point, `None` when there are fewer points than clusters.
    pub fn fit(
        points: &[Rgb],
        k: usize,
        max_iterations: usize,
        seed: u64,
    ) -> Option<(Self, Vec<usize>)> {
        if k == 0 || points.len() < k {
            return None;
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut centroids = Vec::with_capacity(k);
        centroids.push(points[rng.gen_range(0..points.len())]);

        while centroids.len() < k {
            let weights: Vec<f32> = points
                .iter()
                .map(|p| {
                    centroids
                        .iter()
                        .map(|c| distance2(p, c))
                        .fold(f32::INFINITY, f32::min)
                })
                .collect();

            let total: f32 = weights.iter().sum();
            if total <= 0.0 {
                // All points coincide with the chosen centroids
                let first = centroids[0];
                centroids.push(first);
                continue;
            }

            let mut target = rng.gen::<f32>() * total;
            let mut chosen = points.len() - 1;
            for (idx, w) in weights.iter().enumerate() {
                if target < *w {
                    chosen = idx;
                    break;
                }
                target -= w;
            }

            centroids.push(points[chosen]);
        }

        let mut model = KMeans { centroids };
        let mut labels: Vec<usize> = points.iter().map(|p| model.predict(p)).collect();

        for _ in 0..max_iterations {
            let mut sums = vec![[0.0f32; 3]; k];
            let mut counts = vec![0usize; k];

            for (p, &l) in points.iter().zip(labels.iter()) {
                for c in 0..3 {
                    sums[l][c] += p[c];
                }
                counts[l] += 1;
            }

            for (idx, centroid) in model.centroids.iter_mut().enumerate() {
                // Empty clusters keep their previous centroid
                if counts[idx] > 0 {
                    let n = counts[idx] as f32;
                    *centroid = [sums[idx][0] / n, sums[idx][1] / n, sums[idx][2] / n];
                }
            }

            let next: Vec<usize> = points.iter().map(|p| model.predict(p)).collect();
            if next == labels {
                break;
            }
            labels = next;
        }

        Some((model, labels))
    }

    /// Index of the nearest centroid, ties go to the lower index
    pub fn predict(&self, p: &Rgb) -> usize {
        let mut best = 0;
        let mut best_d = f32::INFINITY;

        for (idx, c) in self.centroids.iter().enumerate() {
            let d = distance2(p, c);
            if d < best_d {
                best = idx;
                best_d = d;
            }
        }

        best
    }

    #[inline]
    pub fn centroids(&self) -> &[Rgb] {
        &self.centroids
    }
}
