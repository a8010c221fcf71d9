//! Deterministic k-means with silhouette-guided cluster-count selection
//!
//! The engine is synchronous, CPU-bound, and stateless between calls.
//! Every fit reseeds its generator from the configured seed, so identical
//! input always yields identical centroids, labels, and chosen cluster
//! count.

use chargeflow_core::{ChargeError, ChargeResult, CLUSTER_FEATURE_COUNT};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ClusteringConfig;

/// Observations below this count produce the empty result, not an error
const MIN_OBSERVATIONS: usize = 2;

/// Cluster count used when no candidate beats the sentinel score
const FALLBACK_CLUSTER_COUNT: usize = 3;

/// One caller-supplied observation naming two features
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub feature1_name: String,
    pub feature2_name: String,
    #[serde(default)]
    pub feature1_value: Option<f64>,
    #[serde(default)]
    pub feature2_value: Option<f64>,
}

/// Final partition of the valid observations
#[derive(Debug, Clone, Serialize)]
pub struct Clustering {
    pub feature_x: String,
    pub feature_y: String,
    pub points: Vec<[f64; 2]>,
    pub centroids: Vec<[f64; 2]>,
    pub labels: Vec<usize>,
    pub cluster_count: usize,
}

impl Clustering {
    fn empty(feature_x: String, feature_y: String) -> Self {
        Self {
            feature_x,
            feature_y,
            points: Vec::new(),
            centroids: Vec::new(),
            labels: Vec::new(),
            cluster_count: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

struct KMeansRun {
    centroids: Vec<[f64; 2]>,
    labels: Vec<usize>,
    inertia: f64,
}

pub struct ClusteringEngine {
    config: ClusteringConfig,
}

impl ClusteringEngine {
    pub fn new(config: ClusteringConfig) -> Self {
        Self { config }
    }

    /// Partition the observations into clusters.
    ///
    /// Fewer than two raw observations, or fewer than two left after
    /// dropping incomplete ones, is the empty result. Anything other than
    /// exactly two distinct feature names across the input is a policy
    /// error. The cluster count is fixed to 1 when at most two points
    /// remain; otherwise it is chosen by silhouette score over the
    /// candidate range, strictly-greater scores winning so the first
    /// candidate takes ties.
    pub fn classify(&self, observations: &[Observation]) -> ChargeResult<Clustering> {
        if observations.len() < MIN_OBSERVATIONS {
            let (feature_x, feature_y) = leading_feature_names(observations);
            return Ok(Clustering::empty(feature_x, feature_y));
        }

        let (feature_x, feature_y) = distinct_feature_names(observations)?;

        let points: Vec<[f64; 2]> = observations
            .iter()
            .filter_map(|obs| match (obs.feature1_value, obs.feature2_value) {
                (Some(x), Some(y)) => Some([x, y]),
                _ => None,
            })
            .collect();

        if points.len() < MIN_OBSERVATIONS {
            debug!(
                "Only {} of {} observations usable, returning empty clustering",
                points.len(),
                observations.len()
            );
            return Ok(Clustering::empty(feature_x, feature_y));
        }

        let candidate_cap = self.config.max_candidates.min(points.len());
        let cluster_count = if candidate_cap <= 2 {
            1
        } else {
            self.search_cluster_count(&points, candidate_cap)?
        };

        let run = self.fit(&points, cluster_count)?;
        debug!(
            "Clustered {} points into {} clusters (inertia {:.4})",
            points.len(),
            cluster_count,
            run.inertia
        );

        Ok(Clustering {
            feature_x,
            feature_y,
            points,
            centroids: run.centroids,
            labels: run.labels,
            cluster_count,
        })
    }

    /// Silhouette-scored search over k in [2, candidate_cap)
    fn search_cluster_count(
        &self,
        points: &[[f64; 2]],
        candidate_cap: usize,
    ) -> ChargeResult<usize> {
        let mut best_score = -1.0_f64;
        let mut best_k = None;

        for k in 2..candidate_cap {
            let run = self.fit(points, k)?;
            let score = silhouette_score(points, &run.labels, k);
            debug!("Candidate k={} scored {:.4}", k, score);
            if score > best_score {
                best_score = score;
                best_k = Some(k);
            }
        }

        Ok(best_k.unwrap_or(FALLBACK_CLUSTER_COUNT))
    }

    /// Best-inertia run out of n_init restarts, reseeded per call
    fn fit(&self, points: &[[f64; 2]], k: usize) -> ChargeResult<KMeansRun> {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut best: Option<KMeansRun> = None;

        for _ in 0..self.config.n_init {
            let run = self.lloyd_once(points, k, &mut rng)?;
            let better = match &best {
                Some(current) => run.inertia < current.inertia,
                None => true,
            };
            if better {
                best = Some(run);
            }
        }

        best.ok_or_else(|| ChargeError::clustering("No successful k-means run"))
    }

    fn lloyd_once(
        &self,
        points: &[[f64; 2]],
        k: usize,
        rng: &mut StdRng,
    ) -> ChargeResult<KMeansRun> {
        let mut centroids = spread_initial_centroids(points, k, rng)?;

        let mut labels = vec![0usize; points.len()];
        for iteration in 0..self.config.max_iterations {
            let mut changed = false;
            for (i, point) in points.iter().enumerate() {
                let nearest = nearest_centroid(point, &centroids)?;
                if labels[i] != nearest {
                    labels[i] = nearest;
                    changed = true;
                }
            }

            // The initial labels are arbitrary, so the first pass always
            // recomputes the means
            if !changed && iteration > 0 {
                break;
            }

            let mut sums = vec![[0.0_f64; 2]; k];
            let mut counts = vec![0usize; k];
            for (point, &label) in points.iter().zip(labels.iter()) {
                sums[label][0] += point[0];
                sums[label][1] += point[1];
                counts[label] += 1;
            }
            for (centroid, (sum, &count)) in
                centroids.iter_mut().zip(sums.iter().zip(counts.iter()))
            {
                // An emptied cluster keeps its previous centroid
                if count > 0 {
                    *centroid = [sum[0] / count as f64, sum[1] / count as f64];
                }
            }
        }

        let inertia: f64 = points
            .iter()
            .zip(labels.iter())
            .map(|(point, &label)| squared_distance(point, &centroids[label]))
            .sum();
        if !inertia.is_finite() {
            return Err(ChargeError::clustering("Non-finite inertia in k-means fit"));
        }

        Ok(KMeansRun {
            centroids,
            labels,
            inertia,
        })
    }
}

/// Distance-weighted initial centroid choice. The first centroid is a
/// uniformly drawn point, each further one is drawn with probability
/// proportional to its squared distance from the nearest centroid so far.
/// When no distance mass remains (coincident points) the draw falls back
/// to uniform.
fn spread_initial_centroids(
    points: &[[f64; 2]],
    k: usize,
    rng: &mut StdRng,
) -> ChargeResult<Vec<[f64; 2]>> {
    let mut centroids = Vec::with_capacity(k);
    let first = rng.gen_range(0..points.len());
    centroids.push(points[first]);

    let mut distances: Vec<f64> = points
        .iter()
        .map(|p| squared_distance(p, &points[first]))
        .collect();

    while centroids.len() < k {
        let total: f64 = distances.iter().sum();
        if !total.is_finite() {
            return Err(ChargeError::clustering(
                "Non-finite distance in k-means initialization",
            ));
        }

        let chosen = if total <= f64::EPSILON {
            rng.gen_range(0..points.len())
        } else {
            let mut target = rng.gen::<f64>() * total;
            let mut index = points.len() - 1;
            for (i, &distance) in distances.iter().enumerate() {
                if target <= distance {
                    index = i;
                    break;
                }
                target -= distance;
            }
            index
        };

        centroids.push(points[chosen]);
        for (distance, point) in distances.iter_mut().zip(points.iter()) {
            *distance = distance.min(squared_distance(point, &points[chosen]));
        }
    }

    Ok(centroids)
}

/// First feature-name pair in the input, empty strings when there is none
fn leading_feature_names(observations: &[Observation]) -> (String, String) {
    match observations.first() {
        Some(obs) => (obs.feature1_name.clone(), obs.feature2_name.clone()),
        None => (String::new(), String::new()),
    }
}

fn distinct_feature_names(observations: &[Observation]) -> ChargeResult<(String, String)> {
    let mut names: Vec<&str> = Vec::new();
    for obs in observations {
        for name in [obs.feature1_name.as_str(), obs.feature2_name.as_str()] {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }

    if names.len() != CLUSTER_FEATURE_COUNT {
        return Err(ChargeError::policy(format!(
            "Clustering requires exactly {} distinct feature names, got {}",
            CLUSTER_FEATURE_COUNT,
            names.len()
        )));
    }

    Ok((names[0].to_string(), names[1].to_string()))
}

fn nearest_centroid(point: &[f64; 2], centroids: &[[f64; 2]]) -> ChargeResult<usize> {
    let mut best = 0usize;
    let mut best_distance = f64::INFINITY;
    for (i, centroid) in centroids.iter().enumerate() {
        let distance = squared_distance(point, centroid);
        if distance < best_distance {
            best_distance = distance;
            best = i;
        }
    }

    if best_distance.is_finite() {
        Ok(best)
    } else {
        Err(ChargeError::clustering("Non-finite distance in k-means fit"))
    }
}

fn squared_distance(a: &[f64; 2], b: &[f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}

/// Mean silhouette coefficient over all points.
///
/// a is the mean distance to the point's own cluster, b the smallest mean
/// distance to any other cluster. Points with a degenerate denominator
/// (singleton clusters, coincident points) score 0.
fn silhouette_score(points: &[[f64; 2]], labels: &[usize], k: usize) -> f64 {
    let n = points.len();
    let mut total = 0.0;

    for i in 0..n {
        let mut sums = vec![0.0_f64; k];
        let mut counts = vec![0usize; k];
        for j in 0..n {
            if i == j {
                continue;
            }
            let distance = squared_distance(&points[i], &points[j]).sqrt();
            sums[labels[j]] += distance;
            counts[labels[j]] += 1;
        }

        let own = labels[i];
        let a = if counts[own] > 0 {
            sums[own] / counts[own] as f64
        } else {
            0.0
        };

        let mut b = f64::INFINITY;
        for cluster in 0..k {
            if cluster != own && counts[cluster] > 0 {
                b = b.min(sums[cluster] / counts[cluster] as f64);
            }
        }

        let denominator = a.max(b);
        if counts[own] > 0 && b.is_finite() && denominator > f64::EPSILON {
            total += (b - a) / denominator;
        }
    }

    total / n as f64
}
