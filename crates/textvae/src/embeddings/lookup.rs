//! # Embedding Lookup Capability

/// Word → fixed-width vector lookup.
///
/// Implementations are shared between the estimator and its fitted state,
/// so they must be thread-safe.
pub trait EmbeddingLookup: Send + Sync {
    /// The width of every vector.
    fn dimension(&self) -> usize;

    /// Look up a word.
    ///
    /// ## Returns
    /// The vector, or `None` if the word is unknown.
    fn vector(
        &self,
        word: &str,
    ) -> Option<&[f32]>;

    /// Membership test.
    fn contains(
        &self,
        word: &str,
    ) -> bool {
        self.vector(word).is_some()
    }
}
