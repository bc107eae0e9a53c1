//! Segmenter: behavioural tiers from k-means over standardised features.
//!
//! This stage:
//!   1. Standardises the four party features over the current population
//!   2. Clusters them into `segment_count` groups (k-means++, seeded restarts)
//!   3. Relabels clusters by ascending mean payment ratio, so segment 0 is
//!      always the worst payers and k-1 the best
//!
//! RULE: Raw cluster ids never leave this module. Only the reordered
//! segment ids are written onto the aggregates.

use crate::{
    aggregator::PartyAggregate,
    config::{EngineConfig, KMeansConfig},
    error::{EngineError, EngineResult},
    features::{feature_matrix, Matrix, StandardScaler},
    rng::StageRng,
};
use ndarray::{ArrayView1, Axis};
use serde::{Deserialize, Serialize};

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ClusterFit {
    /// Raw (arbitrary) cluster id per row.
    pub labels: Vec<usize>,
    pub inertia: f64,
    pub iterations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSummary {
    pub segment: usize,
    pub members: usize,
    pub mean_payment_ratio: f64,
}

// ── K-means ──────────────────────────────────────────────────────────────────

pub struct KMeans {
    k: usize,
    config: KMeansConfig,
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(&x, &y)| (x - y).powi(2)).sum()
}

fn nearest(point: ArrayView1<f64>, centroids: &Matrix) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (j, c) in centroids.rows().into_iter().enumerate() {
        let d = squared_distance(point, c);
        if d < best.1 {
            best = (j, d);
        }
    }
    best
}

impl KMeans {
    pub fn new(k: usize, config: KMeansConfig) -> Self {
        Self { k, config }
    }

    /// Best of `n_init` seeded runs by inertia.
    pub fn fit(&self, data: &Matrix, rng: &mut StageRng) -> EngineResult<ClusterFit> {
        let n = data.nrows();
        if n < self.k || self.k == 0 {
            return Err(EngineError::computation(format!(
                "n_samples={n} should be >= n_clusters={}",
                self.k
            )));
        }

        let tolerance = self.config.tolerance * mean_variance(data);
        let mut best: Option<ClusterFit> = None;
        for _ in 0..self.config.n_init {
            let fit = self.run_once(data, tolerance, rng);
            if best.as_ref().map_or(true, |b| fit.inertia < b.inertia) {
                best = Some(fit);
            }
        }
        best.ok_or_else(|| EngineError::computation("k-means produced no run"))
    }

    fn run_once(&self, data: &Matrix, tolerance: f64, rng: &mut StageRng) -> ClusterFit {
        let mut centroids = self.init_plus_plus(data, rng);
        let mut labels = vec![0usize; data.nrows()];
        let mut iterations = 0;

        for iter in 0..self.config.max_iter {
            iterations = iter + 1;
            for (i, point) in data.rows().into_iter().enumerate() {
                labels[i] = nearest(point, &centroids).0;
            }

            let updated = self.recompute_centroids(data, &mut labels, &centroids);
            let shift = (&centroids - &updated).mapv(|v| v * v).sum();
            centroids = updated;
            if shift <= tolerance {
                break;
            }
        }

        // Final assignment against the converged centroids.
        let mut inertia = 0.0;
        for (i, point) in data.rows().into_iter().enumerate() {
            let (j, d) = nearest(point, &centroids);
            labels[i] = j;
            inertia += d;
        }

        ClusterFit {
            labels,
            inertia,
            iterations,
        }
    }

    /// k-means++ seeding: each new centre is drawn with probability
    /// proportional to its squared distance from the closest chosen centre.
    fn init_plus_plus(&self, data: &Matrix, rng: &mut StageRng) -> Matrix {
        let n = data.nrows();
        let mut centroids = Matrix::zeros((self.k, data.ncols()));
        let first = rng.next_index(n);
        centroids.row_mut(0).assign(&data.row(first));

        let mut closest: Vec<f64> = data
            .rows()
            .into_iter()
            .map(|p| squared_distance(p, data.row(first)))
            .collect();

        for c in 1..self.k {
            let total: f64 = closest.iter().sum();
            let pick = if total <= 0.0 {
                rng.next_index(n)
            } else {
                let target = rng.next_f64() * total;
                let mut acc = 0.0;
                let mut chosen = n - 1;
                for (i, d) in closest.iter().enumerate() {
                    acc += d;
                    if acc > target {
                        chosen = i;
                        break;
                    }
                }
                chosen
            };

            let centre = data.row(pick);
            for (d, p) in closest.iter_mut().zip(data.rows()) {
                *d = d.min(squared_distance(p, centre));
            }
            centroids.row_mut(c).assign(&centre);
        }
        centroids
    }

    /// Mean of each cluster's members. An empty cluster takes over the point
    /// lying farthest from its current centre.
    fn recompute_centroids(&self, data: &Matrix, labels: &mut [usize], previous: &Matrix) -> Matrix {
        let mut sums = Matrix::zeros((self.k, data.ncols()));
        let mut counts = vec![0usize; self.k];
        for (point, &label) in data.rows().into_iter().zip(labels.iter()) {
            counts[label] += 1;
            sums.row_mut(label).zip_mut_with(&point, |s, &v| *s += v);
        }

        for empty in 0..self.k {
            if counts[empty] > 0 {
                continue;
            }
            let farthest = data
                .rows()
                .into_iter()
                .enumerate()
                .filter(|(i, _)| counts[labels[*i]] > 1)
                .map(|(i, p)| (i, squared_distance(p, previous.row(labels[i]))))
                .max_by(|a, b| a.1.total_cmp(&b.1));
            if let Some((i, _)) = farthest {
                let donor = labels[i];
                counts[donor] -= 1;
                sums.row_mut(donor).zip_mut_with(&data.row(i), |s, &v| *s -= v);
                labels[i] = empty;
                counts[empty] = 1;
                sums.row_mut(empty).assign(&data.row(i));
            }
        }

        for (j, &count) in counts.iter().enumerate() {
            if count == 0 {
                sums.row_mut(j).assign(&previous.row(j));
            } else {
                sums.row_mut(j).mapv_inplace(|v| v / count as f64);
            }
        }
        sums
    }
}

fn mean_variance(data: &Matrix) -> f64 {
    data.var_axis(Axis(0), 0.0).mean().unwrap_or(0.0)
}

// ── Reordering ───────────────────────────────────────────────────────────────

/// Map raw cluster ids to ordinal ids sorted ascending by each cluster's mean
/// payment ratio. Ties keep raw-id order; empty clusters rank last.
pub fn reorder_by_payment_ratio(raw_labels: &[usize], ratios: &[f64], k: usize) -> Vec<usize> {
    let mut sums = vec![0.0; k];
    let mut counts = vec![0usize; k];
    for (&label, &ratio) in raw_labels.iter().zip(ratios) {
        sums[label] += ratio;
        counts[label] += 1;
    }

    let mut order: Vec<usize> = (0..k).collect();
    order.sort_by(|&a, &b| {
        let mean = |c: usize| {
            if counts[c] == 0 {
                f64::INFINITY
            } else {
                sums[c] / counts[c] as f64
            }
        };
        mean(a).total_cmp(&mean(b)).then(a.cmp(&b))
    });

    let mut mapping = vec![0usize; k];
    for (rank, &raw) in order.iter().enumerate() {
        mapping[raw] = rank;
    }
    mapping
}

// ── Stage ────────────────────────────────────────────────────────────────────

pub struct Segmenter {
    segment_count: usize,
    kmeans: KMeansConfig,
}

impl Segmenter {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            segment_count: config.segment_count,
            kmeans: config.kmeans.clone(),
        }
    }

    /// Assign `segment` on every aggregate and return per-segment summaries
    /// ordered by segment id.
    pub fn segment(
        &self,
        parties: &mut [PartyAggregate],
        rng: &mut StageRng,
    ) -> EngineResult<Vec<SegmentSummary>> {
        let (_, scaled) = StandardScaler::fit_transform(&feature_matrix(parties))?;
        let fit = KMeans::new(self.segment_count, self.kmeans.clone()).fit(&scaled, rng)?;

        let ratios: Vec<f64> = parties.iter().map(|p| p.payment_ratio).collect();
        let mapping = reorder_by_payment_ratio(&fit.labels, &ratios, self.segment_count);

        let mut summaries: Vec<SegmentSummary> = (0..self.segment_count)
            .map(|segment| SegmentSummary {
                segment,
                members: 0,
                mean_payment_ratio: 0.0,
            })
            .collect();
        for (party, &raw) in parties.iter_mut().zip(&fit.labels) {
            let segment = mapping[raw];
            party.segment = Some(segment);
            summaries[segment].members += 1;
            summaries[segment].mean_payment_ratio += party.payment_ratio;
        }
        for s in &mut summaries {
            if s.members > 0 {
                s.mean_payment_ratio /= s.members as f64;
            }
        }

        log::debug!(
            "Segmented {} parties in {} iterations (inertia {:.4}): sizes {:?}",
            parties.len(),
            fit.iterations,
            fit.inertia,
            summaries.iter().map(|s| s.members).collect::<Vec<_>>()
        );
        Ok(summaries)
    }
}
