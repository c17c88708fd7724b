//! # Sparse DBSCAN
//!
//! Density clustering over a precomputed sparse neighbour-distance graph.
//! Only stored edges count; every point is its own neighbour.

/// Label for points that belong to no cluster.
pub const NOISE: isize = -1;

/// DBSCAN over a sparse distance graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SparseDbscan {
    /// Neighbourhood radius; edges with distance `<= eps` are neighbours.
    pub eps: f32,

    /// Minimum neighbourhood size (self included) of a core point.
    pub min_samples: usize,
}

impl SparseDbscan {
    /// Create a clusterer.
    pub fn new(
        eps: f32,
        min_samples: usize,
    ) -> Self {
        Self { eps, min_samples }
    }

    /// Label every point.
    ///
    /// ## Arguments
    /// * `graph` - per point, its stored `(neighbour, distance)` edges.
    ///
    /// ## Returns
    /// One label per point: a cluster id in `0..n_clusters`, or [`NOISE`].
    /// Cluster ids are assigned in order of each cluster's lowest core point.
    pub fn fit_predict(
        &self,
        graph: &[Vec<(usize, f32)>],
    ) -> Vec<isize> {
        let n = graph.len();

        let neighborhoods = graph
            .iter()
            .enumerate()
            .map(|(idx, edges)| {
                let mut nbrs = edges
                    .iter()
                    .filter(|(_, dist)| *dist <= self.eps)
                    .map(|(j, _)| *j)
                    .collect::<Vec<_>>();
                if !nbrs.contains(&idx) {
                    nbrs.push(idx);
                }
                nbrs
            })
            .collect::<Vec<_>>();

        let is_core = neighborhoods
            .iter()
            .map(|nbrs| nbrs.len() >= self.min_samples)
            .collect::<Vec<_>>();

        let mut labels = vec![NOISE; n];
        let mut label_num: isize = 0;
        let mut stack = Vec::new();
        for start in 0..n {
            if labels[start] != NOISE || !is_core[start] {
                continue;
            }
            let mut i = start;
            loop {
                if labels[i] == NOISE {
                    labels[i] = label_num;
                    if is_core[i] {
                        for &j in &neighborhoods[i] {
                            if labels[j] == NOISE {
                                stack.push(j);
                            }
                        }
                    }
                }
                match stack.pop() {
                    Some(next) => i = next,
                    None => break,
                }
            }
            label_num += 1;
        }
        labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(
        n: usize,
        dist: f32,
    ) -> Vec<Vec<(usize, f32)>> {
        (0..n)
            .map(|i| {
                let mut edges = vec![(i, 0.0)];
                if i > 0 {
                    edges.push((i - 1, dist));
                }
                if i + 1 < n {
                    edges.push((i + 1, dist));
                }
                edges
            })
            .collect()
    }

    #[test]
    fn test_two_clusters_and_noise() {
        // 0-1-2 tight, 3-4 tight, 5 isolated.
        let graph = vec![
            vec![(0, 0.0), (1, 0.1)],
            vec![(1, 0.0), (0, 0.1), (2, 0.1)],
            vec![(2, 0.0), (1, 0.1)],
            vec![(3, 0.0), (4, 0.1)],
            vec![(4, 0.0), (3, 0.1)],
            vec![(5, 0.0), (4, 0.9)],
        ];
        let labels = SparseDbscan::new(0.2, 2).fit_predict(&graph);
        assert_eq!(labels, vec![0, 0, 0, 1, 1, NOISE]);
    }

    #[test]
    fn test_min_samples_one_makes_every_point_core() {
        let labels = SparseDbscan::new(0.05, 1).fit_predict(&chain(4, 0.1));
        assert_eq!(labels, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_border_points_join_first_cluster() {
        // Point 1 is a border point reachable from core 0 only.
        let graph = vec![
            vec![(0, 0.0), (1, 0.1), (2, 0.1)],
            vec![(1, 0.0), (0, 0.1)],
            vec![(2, 0.0), (0, 0.1)],
        ];
        let labels = SparseDbscan::new(0.2, 3).fit_predict(&graph);
        assert_eq!(labels, vec![0, 0, 0]);
    }

    #[test]
    fn test_chain_is_one_cluster() {
        let labels = SparseDbscan::new(0.2, 2).fit_predict(&chain(6, 0.1));
        assert!(labels.iter().all(|&l| l == 0));
    }
}
