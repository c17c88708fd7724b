#![allow(missing_docs)]

use divan::{Bencher, black_box};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::StandardNormal;
use textvae::{
    math::{NORM_EPSILON, normalize_in_place},
    types::Matrix,
    vocab::{AnnForest, VocabularyQuantizer},
};

#[global_allocator]
static ALLOC: divan::AllocProfiler = divan::AllocProfiler::system();

fn main() {
    divan::main();
}

const DIM: usize = 32;

fn unit_vectors(n: usize) -> Matrix {
    let mut rng = StdRng::seed_from_u64(42);
    let data = (0..n * DIM)
        .map(|_| rng.sample::<f32, _>(StandardNormal))
        .collect::<Vec<_>>();
    let mut vectors = Matrix::from_vec(n, DIM, data).unwrap();
    for row in 0..n {
        normalize_in_place(vectors.row_mut(row), NORM_EPSILON);
    }
    vectors
}

#[divan::bench(args = [1_000, 4_000])]
fn build_forest(
    bencher: Bencher,
    n: usize,
) {
    let vectors = unit_vectors(n);
    bencher.bench(|| {
        AnnForest::build(black_box(&vectors), VocabularyQuantizer::n_trees(n), 0).n_trees()
    });
}

#[divan::bench(args = [1_000, 4_000])]
fn quantize(
    bencher: Bencher,
    n: usize,
) {
    let vectors = unit_vectors(n);
    let quantizer = VocabularyQuantizer::new(n / 10).with_seed(0);
    bencher.bench(|| quantizer.quantize(black_box(&vectors)));
}
