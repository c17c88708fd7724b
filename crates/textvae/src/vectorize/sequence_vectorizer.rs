//! # Sequence Vectorizer
//!
//! Fixed-length `(time, width)` matrices from token sequences.
//!
//! For a text of `L` tokens and an output length `T`:
//! * steps `t < min(L, T)` hold the token's row;
//! * step `L` (if `L < T`) holds the end-of-sequence indicator;
//! * steps past `L` hold the end indicator again ([`PaddingMode::Indicator`])
//!   or stay all-zero ([`PaddingMode::Zeros`]).
//!
//! Longer texts are truncated silently.

use crate::{
    embeddings::EmbeddingLookup,
    math::{NORM_EPSILON, l2_norm},
    text::TokenizedText,
    types::Matrix,
    vocab::{Vocabulary, vector_width},
};

/// How steps past the end indicator are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaddingMode {
    /// Every step past the text is an end indicator row.
    Indicator,

    /// Steps past the end indicator are all-zero (masked) rows.
    Zeros,
}

/// Writes the row for one token.
pub trait RowEncoder {
    /// The row width.
    fn width(&self) -> usize;

    /// Write the row of `token` into a zeroed `out`.
    fn write_token(
        &self,
        token: &str,
        out: &mut [f32],
    );

    /// Write the end-of-sequence row into a zeroed `out`.
    fn write_end(
        &self,
        out: &mut [f32],
    ) {
        let width = self.width();
        out[width - 1] = 1.0;
    }
}

impl RowEncoder for Vocabulary {
    fn width(&self) -> usize {
        self.vector_width()
    }

    fn write_token(
        &self,
        token: &str,
        out: &mut [f32],
    ) {
        out.copy_from_slice(self.vectors().row(self.row_of(token)));
    }
}

/// Encodes tokens straight from an embedding lookup.
///
/// Uses the [`Vocabulary`] column layout: normalized embedding, special
/// symbol indicators, unknown indicator, end indicator.
#[derive(Clone, Copy)]
pub struct EmbeddingEncoder<'a> {
    embeddings: &'a dyn EmbeddingLookup,
    special_symbols: &'a [String],
}

impl<'a> EmbeddingEncoder<'a> {
    /// Create an encoder.
    pub fn new(
        embeddings: &'a dyn EmbeddingLookup,
        special_symbols: &'a [String],
    ) -> Self {
        Self {
            embeddings,
            special_symbols,
        }
    }
}

impl RowEncoder for EmbeddingEncoder<'_> {
    fn width(&self) -> usize {
        vector_width(self.embeddings.dimension(), self.special_symbols.len())
    }

    fn write_token(
        &self,
        token: &str,
        out: &mut [f32],
    ) {
        let dim = self.embeddings.dimension();
        if let Some(idx) = self.special_symbols.iter().position(|s| s == token) {
            out[dim + idx] = 1.0;
            return;
        }
        match self.embeddings.vector(token) {
            Some(vector) => {
                let norm = l2_norm(vector);
                if norm <= NORM_EPSILON {
                    out[self.width() - 2] = 1.0;
                    return;
                }
                for (o, x) in out[..dim].iter_mut().zip(vector) {
                    *o = x / norm;
                }
            }
            None => out[self.width() - 2] = 1.0,
        }
    }
}

/// Turns token sequences into fixed-length matrices.
pub struct SequenceVectorizer<'a, E: RowEncoder + ?Sized> {
    encoder: &'a E,
    length: usize,
    padding: PaddingMode,
}

impl<'a, E: RowEncoder + ?Sized> SequenceVectorizer<'a, E> {
    /// Create a vectorizer.
    ///
    /// ## Arguments
    /// * `encoder` - the per-token row encoder.
    /// * `length` - the fixed number of time steps.
    /// * `padding` - how steps past the text are filled.
    pub fn new(
        encoder: &'a E,
        length: usize,
        padding: PaddingMode,
    ) -> Self {
        Self {
            encoder,
            length,
            padding,
        }
    }

    /// The fixed number of time steps.
    pub fn length(&self) -> usize {
        self.length
    }

    /// The row width.
    pub fn width(&self) -> usize {
        self.encoder.width()
    }

    /// Write one text into a zeroed `(length * width)` buffer.
    pub fn vectorize_into(
        &self,
        tokens: &TokenizedText,
        out: &mut [f32],
    ) {
        let width = self.width();
        for (t, row) in out.chunks_exact_mut(width).take(self.length).enumerate() {
            if let Some(token) = tokens.tokens().get(t) {
                self.encoder.write_token(token, row);
            } else if t == tokens.len() || self.padding == PaddingMode::Indicator {
                self.encoder.write_end(row);
            }
        }
    }

    /// Vectorize one text.
    pub fn vectorize(
        &self,
        tokens: &TokenizedText,
    ) -> Matrix {
        let mut matrix = Matrix::zeros(self.length, self.width());
        self.vectorize_into(tokens, matrix.as_mut_slice());
        matrix
    }

    /// Vectorize a batch into a flat `(batch, length, width)` buffer.
    pub fn vectorize_batch(
        &self,
        texts: &[&TokenizedText],
    ) -> Vec<f32> {
        let step = self.length * self.width();
        let mut data = vec![0.0; texts.len() * step];
        for (text, out) in texts.iter().zip(data.chunks_exact_mut(step.max(1))) {
            self.vectorize_into(text, out);
        }
        data
    }
}

/// Per-step target rows and loss mask for a text.
///
/// Masked steps point at the end row with mask `0`.
///
/// ## Arguments
/// * `vocab` - the output vocabulary.
/// * `tokens` - the target text.
/// * `length` - the fixed number of time steps.
///
/// ## Returns
/// `(row indices, mask)`, each `length` long.
pub fn target_rows(
    vocab: &Vocabulary,
    tokens: &TokenizedText,
    length: usize,
) -> (Vec<u32>, Vec<f32>) {
    let mut rows = Vec::with_capacity(length);
    let mut mask = Vec::with_capacity(length);
    for t in 0..length {
        match tokens.tokens().get(t) {
            Some(token) => {
                rows.push(vocab.row_of(token) as u32);
                mask.push(1.0);
            }
            None => {
                rows.push(vocab.end_row() as u32);
                mask.push(if t == tokens.len() { 1.0 } else { 0.0 });
            }
        }
    }
    (rows, mask)
}
