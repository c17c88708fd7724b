//! # Vocabulary
//!
//! A closed word → row index plus the matrix of row vectors.
//!
//! With `s` special symbols, row vectors have width `V = dim + s + 2`:
//!
//! | columns        | meaning                      |
//! |----------------|------------------------------|
//! | `0..dim`       | unit-norm word embedding     |
//! | `dim..dim + s` | special symbol indicators    |
//! | `V - 2`        | "unknown word" indicator     |
//! | `V - 1`        | "end of sequence" indicator  |
//!
//! Rows are laid out as the word (or cluster) rows, then the unknown row,
//! then one row per special symbol, then the end row.

use crate::{
    types::{Matrix, TVHashMap},
    vocab::Quantization,
};

/// The token that stands for "past the end" of a text.
pub const PADDING_TOKEN: &str = "";

/// The width of a vocabulary row for an embedding dimension and special symbols.
pub fn vector_width(
    embedding_dim: usize,
    n_specials: usize,
) -> usize {
    embedding_dim + n_specials + 2
}

/// Where a token lives in the vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowKind {
    /// A word (or word cluster) row.
    Word(usize),

    /// The unknown-word row.
    Unknown,

    /// A special symbol row, by symbol index.
    Special(usize),

    /// The end-of-sequence row.
    End,
}

/// A closed vocabulary with its row vectors.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    embedding_dim: usize,
    special_symbols: Vec<String>,
    words: TVHashMap<String, usize>,
    vectors: Matrix,
    n_word_rows: usize,
    n_dense_clusters: Option<usize>,
}

impl Vocabulary {
    /// Assemble a vocabulary from word rows.
    ///
    /// ## Arguments
    /// * `embedding_dim` - the embedding width.
    /// * `special_symbols` - the ordered special symbols.
    /// * `words` - word → word row.
    /// * `word_vectors` - unit-norm word rows, `embedding_dim` wide.
    pub fn from_word_rows(
        embedding_dim: usize,
        special_symbols: Vec<String>,
        words: TVHashMap<String, usize>,
        word_vectors: &Matrix,
    ) -> Self {
        let n_word_rows = word_vectors.rows();
        let n_specials = special_symbols.len();
        let width = vector_width(embedding_dim, n_specials);

        let mut vectors = Matrix::zeros(n_word_rows + n_specials + 2, width);
        for (idx, row) in word_vectors.iter_rows().enumerate() {
            vectors.row_mut(idx)[..embedding_dim].copy_from_slice(row);
        }
        vectors.row_mut(n_word_rows)[width - 2] = 1.0;
        for s in 0..n_specials {
            vectors.row_mut(n_word_rows + 1 + s)[embedding_dim + s] = 1.0;
        }
        let end = vectors.rows() - 1;
        vectors.row_mut(end)[width - 1] = 1.0;

        Self {
            embedding_dim,
            special_symbols,
            words,
            vectors,
            n_word_rows,
            n_dense_clusters: None,
        }
    }

    /// Assemble a vocabulary whose words map onto quantized clusters.
    ///
    /// ## Arguments
    /// * `embedding_dim` - the embedding width.
    /// * `special_symbols` - the ordered special symbols.
    /// * `words` - word → raw word index (the row fed to the quantizer).
    /// * `quantization` - the clustering of the raw word rows.
    pub fn from_quantization(
        embedding_dim: usize,
        special_symbols: Vec<String>,
        words: TVHashMap<String, usize>,
        quantization: &Quantization,
    ) -> Self {
        let words = words
            .into_iter()
            .map(|(word, raw)| (word, quantization.assignments[raw]))
            .collect();
        let mut vocab = Self::from_word_rows(
            embedding_dim,
            special_symbols,
            words,
            &quantization.centroids,
        );
        vocab.n_dense_clusters = Some(quantization.n_dense_clusters);
        vocab
    }

    /// The embedding width.
    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    /// The row vector width.
    pub fn vector_width(&self) -> usize {
        self.vectors.cols()
    }

    /// The ordered special symbols.
    pub fn special_symbols(&self) -> &[String] {
        &self.special_symbols
    }

    /// The number of word (or cluster) rows.
    pub fn n_word_rows(&self) -> usize {
        self.n_word_rows
    }

    /// The total number of rows.
    pub fn n_rows(&self) -> usize {
        self.vectors.rows()
    }

    /// The number of distinct words registered.
    pub fn n_words(&self) -> usize {
        self.words.len()
    }

    /// Was this vocabulary quantized?
    pub fn is_quantized(&self) -> bool {
        self.n_dense_clusters.is_some()
    }

    /// The row vectors.
    pub fn vectors(&self) -> &Matrix {
        &self.vectors
    }

    /// The unknown-word row.
    pub fn unknown_row(&self) -> usize {
        self.n_word_rows
    }

    /// The row of special symbol `idx`.
    pub fn special_row(
        &self,
        idx: usize,
    ) -> usize {
        self.n_word_rows + 1 + idx
    }

    /// The end-of-sequence row.
    pub fn end_row(&self) -> usize {
        self.vectors.rows() - 1
    }

    /// The unknown-word indicator column.
    pub fn unknown_column(&self) -> usize {
        self.vector_width() - 2
    }

    /// The end-of-sequence indicator column.
    pub fn end_column(&self) -> usize {
        self.vector_width() - 1
    }

    /// The indicator column of special symbol `idx`.
    pub fn special_column(
        &self,
        idx: usize,
    ) -> usize {
        self.embedding_dim + idx
    }

    /// Classify a token.
    ///
    /// Special symbols and [`PADDING_TOKEN`] resolve first; unregistered
    /// words resolve to [`RowKind::Unknown`].
    pub fn kind_of(
        &self,
        token: &str,
    ) -> RowKind {
        if token == PADDING_TOKEN {
            return RowKind::End;
        }
        if let Some(idx) = self.special_symbols.iter().position(|s| s == token) {
            return RowKind::Special(idx);
        }
        match self.words.get(token) {
            Some(&row) => RowKind::Word(row),
            None => RowKind::Unknown,
        }
    }

    /// The row of a token.
    pub fn row_of(
        &self,
        token: &str,
    ) -> usize {
        match self.kind_of(token) {
            RowKind::Word(row) => row,
            RowKind::Unknown => self.unknown_row(),
            RowKind::Special(idx) => self.special_row(idx),
            RowKind::End => self.end_row(),
        }
    }

    /// The registered words, sorted.
    pub fn sorted_words(&self) -> Vec<String> {
        let mut words = self.words.keys().cloned().collect::<Vec<_>>();
        words.sort();
        words
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::hash_map_new;

    fn toy() -> Vocabulary {
        let mut words = hash_map_new();
        words.insert("a".to_string(), 0);
        words.insert("b".to_string(), 1);
        let vectors = Matrix::from_vec(2, 2, vec![1.0, 0.0, 0.0, 1.0]).unwrap();
        Vocabulary::from_word_rows(2, vec!["<n>".to_string()], words, &vectors)
    }

    #[test]
    fn test_layout() {
        let vocab = toy();
        assert_eq!(vocab.vector_width(), 5);
        assert_eq!(vocab.n_rows(), 5);
        assert_eq!(vocab.unknown_row(), 2);
        assert_eq!(vocab.special_row(0), 3);
        assert_eq!(vocab.end_row(), 4);

        assert_eq!(vocab.vectors().row(0), &[1.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(vocab.vectors().row(2), &[0.0, 0.0, 0.0, 1.0, 0.0]);
        assert_eq!(vocab.vectors().row(3), &[0.0, 0.0, 1.0, 0.0, 0.0]);
        assert_eq!(vocab.vectors().row(4), &[0.0, 0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_row_of() {
        let vocab = toy();
        assert_eq!(vocab.row_of("b"), 1);
        assert_eq!(vocab.row_of("zzz"), vocab.unknown_row());
        assert_eq!(vocab.row_of("<n>"), vocab.special_row(0));
        assert_eq!(vocab.row_of(PADDING_TOKEN), vocab.end_row());
        assert_eq!(vocab.kind_of("a"), RowKind::Word(0));
        assert_eq!(vocab.sorted_words(), vec!["a", "b"]);
    }

    #[test]
    fn test_empty_vocabulary_has_reserved_rows() {
        let vocab = Vocabulary::from_word_rows(3, vec![], hash_map_new(), &Matrix::zeros(0, 3));
        assert_eq!(vocab.n_rows(), 2);
        assert_eq!(vocab.unknown_row(), 0);
        assert_eq!(vocab.end_row(), 1);
        assert_eq!(vocab.vectors().row(1), &[0.0, 0.0, 0.0, 0.0, 1.0]);
    }
}
