//! # Vocabulary Quantizer
//!
//! Collapses a large set of unit word vectors into a bounded number of
//! centroid pseudo-words: an [`AnnForest`] neighbour graph is clustered with
//! [`SparseDbscan`], every noise point becomes its own singleton cluster,
//! and each cluster is represented by its renormalized mean.

use crate::{
    math::{NORM_EPSILON, normalize_in_place},
    types::Matrix,
    vocab::{AnnForest, NOISE, SparseDbscan},
};

/// The result of [`VocabularyQuantizer::quantize`].
#[derive(Debug, Clone, PartialEq)]
pub struct Quantization {
    /// Cluster id of every input row.
    pub assignments: Vec<usize>,

    /// Unit-norm centroid of every cluster, one per row.
    pub centroids: Matrix,

    /// The number of dense (non-singleton-noise) clusters.
    ///
    /// Dense clusters come first; noise singletons follow in input order.
    pub n_dense_clusters: usize,
}

impl Quantization {
    /// The total number of clusters, noise singletons included.
    pub fn n_clusters(&self) -> usize {
        self.centroids.rows()
    }
}

/// Options and entry point for vocabulary quantization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VocabularyQuantizer {
    budget: usize,
    seed: u64,
}

impl VocabularyQuantizer {
    /// Create a quantizer.
    ///
    /// ## Arguments
    /// * `budget` - the requested vocabulary size; at least 1.
    pub fn new(budget: usize) -> Self {
        Self {
            budget: budget.max(1),
            seed: 0,
        }
    }

    /// Set the forest seed.
    pub fn with_seed(
        self,
        seed: u64,
    ) -> Self {
        Self { seed, ..self }
    }

    /// The requested vocabulary size.
    pub fn budget(&self) -> usize {
        self.budget
    }

    /// The number of forest trees for `n` points.
    pub fn n_trees(n: usize) -> usize {
        ((n as f64).sqrt().round() as usize).max(10)
    }

    /// The neighbour count (self included) retrieved for each of `n` points.
    pub fn n_neighbours(
        &self,
        n: usize,
    ) -> usize {
        (3 * (n / self.budget).max(1)).min(n.saturating_sub(1))
    }

    /// The DBSCAN core-point threshold for `n` points.
    pub fn min_samples(
        &self,
        n: usize,
    ) -> usize {
        (n / (4 * self.budget)).max(1)
    }

    /// Cluster the rows of `vectors`.
    ///
    /// ## Arguments
    /// * `vectors` - unit-norm word vectors, one per row.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, vectors)))]
    pub fn quantize(
        &self,
        vectors: &Matrix,
    ) -> Quantization {
        let n = vectors.rows();
        let k = self.n_neighbours(n);
        if k == 0 {
            return Quantization {
                assignments: (0..n).collect(),
                centroids: vectors.clone(),
                n_dense_clusters: 0,
            };
        }

        log::info!("Calculation of the neighbourhood graph is started...");
        let forest = AnnForest::build(vectors, Self::n_trees(n), self.seed);
        log::info!("Forest of {} trees has been built.", forest.n_trees());

        let graph = neighbour_graph(&forest, n, k);
        let n_edges = graph.iter().map(Vec::len).sum::<usize>().max(1);
        let eps = graph
            .iter()
            .flat_map(|edges| edges.iter().map(|(_, d)| *d as f64))
            .sum::<f64>()
            / n_edges as f64;
        let eps = eps as f32;
        let min_samples = self.min_samples(n);

        log::info!(
            "Part of nonzero elements is {:.3}%.",
            100.0 * n_edges as f64 / (n as f64 * n as f64)
        );
        log::info!("DBSCAN: n_samples = {n}, min_samples = {min_samples}, eps = {eps:.6}");

        let labels = SparseDbscan::new(eps, min_samples).fit_predict(&graph);
        let quantization = collect_clusters(vectors, &labels);

        log::info!(
            "Number of dense clusters is {}; number of all clusters (including noise) is {}.",
            quantization.n_dense_clusters,
            quantization.n_clusters()
        );
        quantization
    }
}

fn neighbour_graph(
    forest: &AnnForest,
    n: usize,
    k: usize,
) -> Vec<Vec<(usize, f32)>> {
    #[cfg(feature = "rayon")]
    {
        use rayon::prelude::*;
        (0..n)
            .into_par_iter()
            .map(|item| forest.nearest_to_item(item, k))
            .collect()
    }
    #[cfg(not(feature = "rayon"))]
    {
        let part = (n / 10).max(1);
        (0..n)
            .map(|item| {
                if (item + 1) % part == 0 {
                    log::debug!("{}% of vectors processed", 100 * (item + 1) / n);
                }
                forest.nearest_to_item(item, k)
            })
            .collect()
    }
}

/// Turn DBSCAN labels into cluster assignments and centroids.
///
/// Noise points become singleton clusters appended after the dense ones.
fn collect_clusters(
    vectors: &Matrix,
    labels: &[isize],
) -> Quantization {
    let n_dense_clusters = labels
        .iter()
        .filter(|&&l| l != NOISE)
        .map(|&l| l as usize + 1)
        .max()
        .unwrap_or(0);

    let mut next_noise = n_dense_clusters;
    let assignments = labels
        .iter()
        .map(|&label| {
            if label == NOISE {
                next_noise += 1;
                next_noise - 1
            } else {
                label as usize
            }
        })
        .collect::<Vec<_>>();

    let mut centroids = Matrix::zeros(next_noise, vectors.cols());
    let mut counts = vec![0usize; next_noise];
    for (row, &cluster) in assignments.iter().enumerate() {
        counts[cluster] += 1;
        for (acc, x) in centroids.row_mut(cluster).iter_mut().zip(vectors.row(row)) {
            *acc += x;
        }
    }
    for (cluster, &count) in counts.iter().enumerate() {
        let centroid = centroids.row_mut(cluster);
        for x in centroid.iter_mut() {
            *x /= count.max(1) as f32;
        }
        normalize_in_place(centroid, NORM_EPSILON);
    }

    Quantization {
        assignments,
        centroids,
        n_dense_clusters,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::l2_norm;

    /// Tight bundles of vectors around `n_groups` directions in the plane.
    fn bundles(
        n_groups: usize,
        per_group: usize,
    ) -> Matrix {
        let mut data = Vec::new();
        for g in 0..n_groups {
            let base = g as f32 * core::f32::consts::TAU / n_groups as f32;
            for j in 0..per_group {
                let theta = base + 0.001 * j as f32;
                data.extend([theta.cos(), theta.sin()]);
            }
        }
        Matrix::from_vec(n_groups * per_group, 2, data).unwrap()
    }

    #[test]
    fn test_parameters() {
        let q = VocabularyQuantizer::new(10);
        assert_eq!(q.n_neighbours(100), 30);
        assert_eq!(q.n_neighbours(5), 3);
        assert_eq!(q.n_neighbours(2), 1);
        assert_eq!(q.min_samples(100), 2);
        assert_eq!(q.min_samples(10), 1);
        assert_eq!(VocabularyQuantizer::n_trees(9), 10);
        assert_eq!(VocabularyQuantizer::n_trees(400), 20);
    }

    #[test]
    fn test_bundles_collapse() {
        let vectors = bundles(4, 10);
        let q = VocabularyQuantizer::new(4).with_seed(1).quantize(&vectors);

        assert_eq!(q.assignments.len(), 40);
        assert!(q.n_clusters() <= 4 * 4 + 40);
        assert!(q.n_clusters() < 40);
        for row in q.centroids.iter_rows() {
            assert!((l2_norm(row) - 1.0).abs() < 1e-5);
        }
        // Members of one bundle never split across opposite directions.
        for g in 0..4 {
            let first = q.assignments[g * 10];
            let centroid = q.centroids.row(first);
            let member = vectors.row(g * 10);
            assert!(crate::math::dot(centroid, member) > 0.9);
        }
    }

    #[test]
    fn test_collect_clusters_noise_singletons() {
        let vectors = Matrix::from_vec(4, 2, vec![1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, -1.0]).unwrap();
        let q = collect_clusters(&vectors, &[0, 0, NOISE, NOISE]);
        assert_eq!(q.assignments, vec![0, 0, 1, 2]);
        assert_eq!(q.n_dense_clusters, 1);
        assert_eq!(q.centroids.row(0), &[1.0, 0.0]);
        assert_eq!(q.centroids.row(2), &[0.0, -1.0]);
    }

    #[test]
    fn test_single_vector_passes_through() {
        let vectors = Matrix::from_vec(1, 2, vec![0.6, 0.8]).unwrap();
        let q = VocabularyQuantizer::new(1).quantize(&vectors);
        assert_eq!(q.assignments, vec![0]);
        assert_eq!(q.centroids, vectors);
    }
}
