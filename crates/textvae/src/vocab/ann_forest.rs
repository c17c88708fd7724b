//! # Random Projection Forest
//!
//! An approximate nearest-neighbour index over unit vectors, in the
//! style of Annoy's angular index: each tree recursively splits its points
//! by a hyperplane through the origin, normal to the difference of two
//! sampled points. Queries walk all trees best-margin-first until enough
//! candidates have been collected, then rank the candidates exactly.
//!
//! Every tree is seeded from the forest seed and its own index, so the
//! forest is identical whether or not it is built in parallel.

use core::cmp::Ordering;
use std::collections::BinaryHeap;

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    math::{NORM_EPSILON, cosine_distance, dot, normalize_in_place},
    types::{Matrix, TVHashSet},
};

/// Maximum number of points in a leaf.
pub const DEFAULT_LEAF_SIZE: usize = 16;

enum Node {
    Leaf(Vec<usize>),
    Split {
        normal: Vec<f32>,
        left: usize,
        right: usize,
    },
}

struct Tree {
    nodes: Vec<Node>,
    root: usize,
}

/// Heap entry; ordered by margin so the most promising node pops first.
struct Frontier {
    margin: f32,
    tree: usize,
    node: usize,
}

impl PartialEq for Frontier {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl Ord for Frontier {
    fn cmp(
        &self,
        other: &Self,
    ) -> Ordering {
        self.margin
            .total_cmp(&other.margin)
            .then_with(|| other.tree.cmp(&self.tree))
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(
        &self,
        other: &Self,
    ) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// An approximate nearest-neighbour forest over the rows of a matrix.
pub struct AnnForest<'a> {
    points: &'a Matrix,
    trees: Vec<Tree>,
}

impl<'a> AnnForest<'a> {
    /// Build a forest.
    ///
    /// ## Arguments
    /// * `points` - the indexed vectors, one per row.
    /// * `n_trees` - the number of trees.
    /// * `seed` - the forest seed.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(points)))]
    pub fn build(
        points: &'a Matrix,
        n_trees: usize,
        seed: u64,
    ) -> Self {
        let build_tree = |tree_idx: usize| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(tree_idx as u64));
            let mut nodes = Vec::new();
            let all = (0..points.rows()).collect::<Vec<_>>();
            let root = grow(points, all, &mut nodes, &mut rng);
            Tree { nodes, root }
        };

        #[cfg(feature = "rayon")]
        let trees = {
            use rayon::prelude::*;
            (0..n_trees).into_par_iter().map(build_tree).collect()
        };
        #[cfg(not(feature = "rayon"))]
        let trees = (0..n_trees).map(build_tree).collect();

        Self { points, trees }
    }

    /// The number of trees.
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Find the `k` nearest neighbours of an indexed point.
    ///
    /// The point itself is included (at distance `0`).
    ///
    /// ## Returns
    /// `(index, cosine distance)` pairs, nearest first; ties by index.
    pub fn nearest_to_item(
        &self,
        item: usize,
        k: usize,
    ) -> Vec<(usize, f32)> {
        self.nearest(self.points.row(item), k)
    }

    /// Find the `k` nearest neighbours of a query vector.
    ///
    /// ## Returns
    /// `(index, cosine distance)` pairs, nearest first; ties by index.
    pub fn nearest(
        &self,
        query: &[f32],
        k: usize,
    ) -> Vec<(usize, f32)> {
        if k == 0 {
            return Vec::new();
        }
        let search_k = self.trees.len().max(1) * k;

        let mut heap = BinaryHeap::with_capacity(self.trees.len());
        for (tree, t) in self.trees.iter().enumerate() {
            heap.push(Frontier {
                margin: f32::INFINITY,
                tree,
                node: t.root,
            });
        }

        let mut seen: TVHashSet<usize> = TVHashSet::default();
        let mut candidates = Vec::with_capacity(search_k);
        while candidates.len() < search_k {
            let Some(Frontier { margin, tree, node }) = heap.pop() else {
                break;
            };
            match &self.trees[tree].nodes[node] {
                Node::Leaf(items) => {
                    for &idx in items {
                        if seen.insert(idx) {
                            candidates.push(idx);
                        }
                    }
                }
                Node::Split {
                    normal,
                    left,
                    right,
                } => {
                    let side = dot(normal, query);
                    heap.push(Frontier {
                        margin: margin.min(side),
                        tree,
                        node: *right,
                    });
                    heap.push(Frontier {
                        margin: margin.min(-side),
                        tree,
                        node: *left,
                    });
                }
            }
        }

        let mut ranked = candidates
            .into_iter()
            .map(|idx| (idx, cosine_distance(query, self.points.row(idx))))
            .collect::<Vec<_>>();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        ranked.truncate(k);
        ranked
    }
}

/// Recursively split `items`; returns the index of the new node.
fn grow(
    points: &Matrix,
    items: Vec<usize>,
    nodes: &mut Vec<Node>,
    rng: &mut StdRng,
) -> usize {
    if items.len() <= DEFAULT_LEAF_SIZE {
        nodes.push(Node::Leaf(items));
        return nodes.len() - 1;
    }

    let mut normal = split_normal(points, &items, rng);
    let (mut left, mut right): (Vec<usize>, Vec<usize>) = match &normal {
        Some(normal) => items
            .iter()
            .copied()
            .partition(|&idx| dot(normal, points.row(idx)) <= 0.0),
        None => (Vec::new(), Vec::new()),
    };

    // Degenerate split: assign sides at random; queries then visit both.
    if left.is_empty() || right.is_empty() {
        normal = None;
        left.clear();
        right.clear();
        for &idx in &items {
            if rng.random_bool(0.5) {
                right.push(idx);
            } else {
                left.push(idx);
            }
        }
        if left.is_empty() || right.is_empty() {
            let mid = items.len() / 2;
            left = items[..mid].to_vec();
            right = items[mid..].to_vec();
        }
    }

    let normal = normal.unwrap_or_else(|| vec![0.0; points.cols()]);
    let left = grow(points, left, nodes, rng);
    let right = grow(points, right, nodes, rng);
    nodes.push(Node::Split {
        normal,
        left,
        right,
    });
    nodes.len() - 1
}

/// The normalized difference of two distinct sampled points.
fn split_normal(
    points: &Matrix,
    items: &[usize],
    rng: &mut StdRng,
) -> Option<Vec<f32>> {
    for _ in 0..8 {
        let a = items[rng.random_range(0..items.len())];
        let b = items[rng.random_range(0..items.len())];
        if a == b {
            continue;
        }
        let mut normal = points
            .row(a)
            .iter()
            .zip(points.row(b))
            .map(|(x, y)| x - y)
            .collect::<Vec<f32>>();
        if normalize_in_place(&mut normal, NORM_EPSILON) >= NORM_EPSILON {
            return Some(normal);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(n: usize) -> Matrix {
        let mut data = Vec::with_capacity(n * 2);
        for i in 0..n {
            let theta = i as f32 * core::f32::consts::TAU / n as f32;
            data.push(theta.cos());
            data.push(theta.sin());
        }
        Matrix::from_vec(n, 2, data).unwrap()
    }

    #[test]
    fn test_self_is_nearest() {
        let points = ring(100);
        let forest = AnnForest::build(&points, 10, 7);
        assert_eq!(forest.n_trees(), 10);

        for item in [0, 17, 99] {
            let nns = forest.nearest_to_item(item, 3);
            assert_eq!(nns.len(), 3);
            assert_eq!(nns[0].0, item);
            assert!(nns[0].1.abs() < 1e-6);
            assert!(nns[1].1 <= nns[2].1);
        }
    }

    #[test]
    fn test_small_sets_are_exact() {
        // Fits in one leaf.
        let points = ring(12);
        let forest = AnnForest::build(&points, 10, 3);
        let nns = forest.nearest_to_item(4, 3);
        let mut ids = nns.iter().map(|(i, _)| *i).collect::<Vec<_>>();
        ids.sort();
        assert_eq!(ids, vec![3, 4, 5]);
    }

    #[test]
    fn test_recall_on_ring() {
        let n = 200;
        let points = ring(n);
        let forest = AnnForest::build(&points, 14, 5);

        let mut hits = 0;
        for item in 0..n {
            let ids = forest
                .nearest_to_item(item, 3)
                .into_iter()
                .map(|(i, _)| i)
                .collect::<Vec<_>>();
            for expected in [(item + n - 1) % n, (item + 1) % n] {
                if ids.contains(&expected) {
                    hits += 1;
                }
            }
        }
        assert!(hits as f32 / (2 * n) as f32 > 0.8, "recall too low: {hits}");
    }

    #[test]
    fn test_deterministic() {
        let points = ring(50);
        let a = AnnForest::build(&points, 10, 11).nearest_to_item(5, 4);
        let b = AnnForest::build(&points, 10, 11).nearest_to_item(5, 4);
        assert_eq!(a, b);
    }
}
