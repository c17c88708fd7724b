//! # Batch Sources
//!
//! Pull-based batching: a [`BatchSource`] maps a batch index to a batch,
//! and a [`BatchPlan`] decides which items land in which batch.

use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use crate::errors::TVResult;

/// Maps a batch index to a batch.
///
/// The same index always yields the same batch contents.
pub trait BatchSource {
    /// The batch type.
    type Batch;

    /// The number of batches per epoch.
    fn n_batches(&self) -> usize;

    /// Build batch `idx`.
    fn batch(
        &self,
        idx: usize,
    ) -> TVResult<Self::Batch>;
}

/// The item layout of fixed-size batches over `n_items` items.
///
/// There are `ceil(n_items / batch_size)` batches; the last one is filled
/// by wrapping around to the first items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlan {
    n_items: usize,
    batch_size: usize,
}

impl BatchPlan {
    /// Create a plan.
    pub fn new(
        n_items: usize,
        batch_size: usize,
    ) -> Self {
        Self {
            n_items,
            batch_size: batch_size.max(1),
        }
    }

    /// The number of items.
    pub fn n_items(&self) -> usize {
        self.n_items
    }

    /// The batch size.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// The number of batches.
    pub fn n_batches(&self) -> usize {
        self.n_items.div_ceil(self.batch_size)
    }

    /// The item indices of batch `idx`; always `batch_size` long.
    pub fn items(
        &self,
        idx: usize,
    ) -> Vec<usize> {
        if self.n_items == 0 {
            return Vec::new();
        }
        let start = idx * self.batch_size;
        (start..start + self.batch_size)
            .map(|i| i % self.n_items)
            .collect()
    }

    /// The number of real (non-wrapped) items in batch `idx`.
    pub fn n_fresh(
        &self,
        idx: usize,
    ) -> usize {
        let start = idx * self.batch_size;
        self.n_items.saturating_sub(start).min(self.batch_size)
    }

    /// The batch visiting order for one epoch.
    ///
    /// ## Arguments
    /// * `seed` - the training seed.
    /// * `epoch` - the epoch number.
    pub fn epoch_order(
        &self,
        seed: u64,
        epoch: usize,
    ) -> Vec<usize> {
        epoch_order(self.n_batches(), seed, epoch)
    }
}

/// A seeded shuffle of `0..n_batches` for one epoch.
pub fn epoch_order(
    n_batches: usize,
    seed: u64,
    epoch: usize,
) -> Vec<usize> {
    let mut order = (0..n_batches).collect::<Vec<_>>();
    let mut rng = StdRng::seed_from_u64(seed ^ (epoch as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    order.shuffle(&mut rng);
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_around() {
        let plan = BatchPlan::new(5, 2);
        assert_eq!(plan.n_batches(), 3);
        assert_eq!(plan.items(0), vec![0, 1]);
        assert_eq!(plan.items(2), vec![4, 0]);
        assert_eq!(plan.n_fresh(2), 1);
        assert_eq!(plan.n_fresh(0), 2);

        let plan = BatchPlan::new(2, 5);
        assert_eq!(plan.n_batches(), 1);
        assert_eq!(plan.items(0), vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn test_epoch_order_is_a_seeded_permutation() {
        let plan = BatchPlan::new(100, 8);
        let a = plan.epoch_order(3, 1);
        let b = plan.epoch_order(3, 1);
        assert_eq!(a, b);

        let mut sorted = a.clone();
        sorted.sort();
        assert_eq!(sorted, (0..13).collect::<Vec<_>>());
    }
}
