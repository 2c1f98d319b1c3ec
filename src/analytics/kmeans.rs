//! Seeded k-means.
//!
//! 1. k-means++ seeding from `StdRng::seed_from_u64(seed)`
//! 2. Lloyd iterations until the largest centroid shift is ≤ tolerance or
//!    `max_iterations` is reached
//! 3. `n_init` restarts drawn from the same RNG stream; lowest inertia wins
//! 4. Labels renumbered by first appearance, empty clusters dropped
//!
//! Same points, seed and config always give the same labels.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::error::AnalyticsError;

#[derive(Debug, Clone)]
pub struct KMeansConfig {
    pub k: usize,
    pub max_iterations: usize,
    pub tolerance: f64,
    pub n_init: usize,
    pub seed: u64,
}

impl KMeansConfig {
    pub fn new(
        k: usize,
        max_iterations: usize,
        tolerance: f64,
        n_init: usize,
        seed: u64,
    ) -> Result<Self, AnalyticsError> {
        if k == 0 {
            return Err(AnalyticsError::Config("k must be > 0".into()));
        }
        if max_iterations == 0 {
            return Err(AnalyticsError::Config("max_iterations must be > 0".into()));
        }
        if n_init == 0 {
            return Err(AnalyticsError::Config("n_init must be > 0".into()));
        }
        if !(tolerance.is_finite() && tolerance > 0.0) {
            return Err(AnalyticsError::Config(
                "tolerance must be a finite positive number".into(),
            ));
        }
        Ok(Self {
            k,
            max_iterations,
            tolerance,
            n_init,
            seed,
        })
    }
}

#[derive(Debug, Clone)]
pub struct KMeansFit<const D: usize> {
    /// One label per input point, in `0..centroids.len()`.
    pub labels: Vec<u32>,
    pub centroids: Vec<[f64; D]>,
    /// Sum of squared distances to the assigned centroid.
    pub inertia: f64,
    pub iterations: usize,
    pub converged: bool,
}

impl<const D: usize> KMeansFit<D> {
    pub fn n_clusters(&self) -> usize {
        self.centroids.len()
    }
}

/// Partition `points` into at most `config.k` clusters.
///
/// `k` larger than the number of points is an error; callers clamp first.
pub fn fit<const D: usize>(points: &[[f64; D]], config: &KMeansConfig) -> Result<KMeansFit<D>, AnalyticsError> {
    if points.is_empty() {
        return Err(AnalyticsError::Config("cannot cluster an empty matrix".into()));
    }
    if config.k > points.len() {
        return Err(AnalyticsError::Config(format!(
            "k ({}) must be <= number of points ({})",
            config.k,
            points.len()
        )));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut best: Option<KMeansFit<D>> = None;

    for _ in 0..config.n_init {
        let candidate = lloyd(points, config, &mut rng);
        if best.as_ref().map_or(true, |b| candidate.inertia < b.inertia) {
            best = Some(candidate);
        }
    }

    let mut fit = best.ok_or_else(|| AnalyticsError::Config("n_init must be > 0".into()))?;
    renumber(&mut fit);

    tracing::debug!(
        k = fit.n_clusters(),
        n = points.len(),
        iterations = fit.iterations,
        converged = fit.converged,
        inertia = fit.inertia,
        "k-means finished"
    );

    Ok(fit)
}

fn lloyd<const D: usize>(points: &[[f64; D]], config: &KMeansConfig, rng: &mut StdRng) -> KMeansFit<D> {
    let mut centroids = kmeans_plus_plus(points, config.k, rng);
    let mut labels = vec![0u32; points.len()];
    let mut iterations = 0;
    let mut converged = false;

    for _ in 0..config.max_iterations {
        iterations += 1;
        assign(points, &centroids, &mut labels);

        let updated = compute_centroids(points, &labels, &centroids);
        let shift = centroids
            .iter()
            .zip(&updated)
            .map(|(old, new)| distance_squared(old, new).sqrt())
            .fold(0.0f64, f64::max);
        centroids = updated;

        if shift <= config.tolerance {
            converged = true;
            break;
        }
    }

    let inertia = assign(points, &centroids, &mut labels);

    KMeansFit {
        labels,
        centroids,
        inertia,
        iterations,
        converged,
    }
}

/// k-means++ seeding: each next centroid is drawn with probability
/// proportional to its squared distance from the nearest chosen one.
fn kmeans_plus_plus<const D: usize>(points: &[[f64; D]], k: usize, rng: &mut StdRng) -> Vec<[f64; D]> {
    let n = points.len();
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.gen_range(0..n)]);

    let mut nearest = vec![f64::INFINITY; n];
    while centroids.len() < k {
        if let Some(last) = centroids.last() {
            for (d, point) in nearest.iter_mut().zip(points) {
                *d = d.min(distance_squared(point, last));
            }
        }

        let total: f64 = nearest.iter().sum();
        let next = if total > 0.0 && total.is_finite() {
            let mut target = rng.gen::<f64>() * total;
            let mut chosen = nearest.iter().rposition(|d| *d > 0.0).unwrap_or(n - 1);
            for (i, d) in nearest.iter().enumerate() {
                if *d > 0.0 && target < *d {
                    chosen = i;
                    break;
                }
                target -= d;
            }
            chosen
        } else {
            // Every point coincides with a centroid already.
            rng.gen_range(0..n)
        };
        centroids.push(points[next]);
    }

    centroids
}

/// Assign each point to its nearest centroid (ties to the lowest index).
/// Returns the inertia of the assignment.
fn assign<const D: usize>(points: &[[f64; D]], centroids: &[[f64; D]], labels: &mut [u32]) -> f64 {
    let mut inertia = 0.0;
    for (label, point) in labels.iter_mut().zip(points) {
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (j, centroid) in centroids.iter().enumerate() {
            let dist = distance_squared(point, centroid);
            if dist < best_dist {
                best_dist = dist;
                best = j;
            }
        }
        *label = best as u32;
        inertia += best_dist;
    }
    inertia
}

/// Mean of assigned points; an empty cluster keeps its previous centroid.
fn compute_centroids<const D: usize>(
    points: &[[f64; D]],
    labels: &[u32],
    previous: &[[f64; D]],
) -> Vec<[f64; D]> {
    let mut sums = vec![[0.0f64; D]; previous.len()];
    let mut counts = vec![0usize; previous.len()];

    for (point, &label) in points.iter().zip(labels) {
        let cluster = label as usize;
        counts[cluster] += 1;
        for (s, x) in sums[cluster].iter_mut().zip(point) {
            *s += x;
        }
    }

    sums.into_iter()
        .zip(counts)
        .zip(previous)
        .map(|((mut sum, count), prev)| {
            if count == 0 {
                return *prev;
            }
            for s in &mut sum {
                *s /= count as f64;
            }
            sum
        })
        .collect()
}

/// Relabel clusters in order of first appearance and drop empty ones.
fn renumber<const D: usize>(fit: &mut KMeansFit<D>) {
    let mut mapping: Vec<Option<u32>> = vec![None; fit.centroids.len()];
    let mut order: Vec<usize> = Vec::new();

    for label in &mut fit.labels {
        let old = *label as usize;
        let new = match mapping[old] {
            Some(new) => new,
            None => {
                let new = order.len() as u32;
                mapping[old] = Some(new);
                order.push(old);
                new
            }
        };
        *label = new;
    }

    fit.centroids = order.iter().map(|&old| fit.centroids[old]).collect();
}

#[inline]
fn distance_squared<const D: usize>(a: &[f64; D], b: &[f64; D]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
