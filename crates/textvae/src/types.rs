//! # Common Types

cfg_if::cfg_if! {
    if #[cfg(feature = "ahash")] {
        /// Type Alias for hash maps in this crate.
        pub type TVHashMap<K, V> = ahash::AHashMap<K, V>;

        /// Create a new empty hash map.
        pub fn hash_map_new<K, V>() -> TVHashMap<K, V> {
            TVHashMap::new()
        }

        /// Create a new hash map with the given capacity.
        pub fn hash_map_with_capacity<K, V>(capacity: usize) -> TVHashMap<K, V> {
            TVHashMap::with_capacity(capacity)
        }

        /// Type Alias for hash sets in this crate.
        pub type TVHashSet<V> = ahash::AHashSet<V>;

    } else if #[cfg(feature = "foldhash")] {
        /// Type Alias for hash maps in this crate.
        pub type TVHashMap<K, V> = foldhash::HashMap<K, V>;

        /// Create a new empty hash map.
        pub fn hash_map_new<K, V>() -> TVHashMap<K, V> {
            foldhash::HashMapExt::new()
        }

        /// Create a new hash map with the given capacity.
        pub fn hash_map_with_capacity<K, V>(capacity: usize) -> TVHashMap<K, V> {
            foldhash::HashMapExt::with_capacity(capacity)
        }

        /// Type Alias for hash sets in this crate.
        pub type TVHashSet<V> = foldhash::HashSet<V>;

    } else {
        /// Type Alias for hash maps in this crate.
        pub type TVHashMap<K, V> = std::collections::HashMap<K, V>;

        /// Create a new empty hash map.
        pub fn hash_map_new<K, V>() -> TVHashMap<K, V> {
            TVHashMap::new()
        }

        /// Create a new hash map with the given capacity.
        pub fn hash_map_with_capacity<K, V>(capacity: usize) -> TVHashMap<K, V> {
            TVHashMap::with_capacity(capacity)
        }

        /// Type Alias for hash sets in this crate.
        pub type TVHashSet<V> = std::collections::HashSet<V>;
    }
}

/// A fixed-size latent summary of one text; the encoder mean.
pub type LatentVector = Vec<f32>;

/// A dense row-major `(rows, cols)` matrix of `f32`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Matrix {
    /// Create a zero matrix.
    pub fn zeros(
        rows: usize,
        cols: usize,
    ) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Wrap row-major data.
    ///
    /// ## Returns
    /// `None` if `data.len() != rows * cols`.
    pub fn from_vec(
        rows: usize,
        cols: usize,
        data: Vec<f32>,
    ) -> Option<Self> {
        if data.len() != rows * cols {
            return None;
        }
        Some(Self { rows, cols, data })
    }

    /// The number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// The number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Borrow one row.
    pub fn row(
        &self,
        idx: usize,
    ) -> &[f32] {
        &self.data[idx * self.cols..(idx + 1) * self.cols]
    }

    /// Mutably borrow one row.
    pub fn row_mut(
        &mut self,
        idx: usize,
    ) -> &mut [f32] {
        &mut self.data[idx * self.cols..(idx + 1) * self.cols]
    }

    /// Iterate over the rows.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.cols.max(1)).take(self.rows)
    }

    /// The row-major backing data.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// The mutable row-major backing data.
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Release the row-major backing data.
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }
}
