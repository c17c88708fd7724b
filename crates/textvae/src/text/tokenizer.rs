//! # Tokenizer Capability

use core::ops::Range;

/// Word-boundary segmentation of raw text.
///
/// Boundaries are byte ranges into the source text, in text order.
pub trait Tokenizer: Send + Sync {
    /// Find the word boundaries of `text`.
    ///
    /// ## Arguments
    /// * `text` - the source text.
    ///
    /// ## Returns
    /// Ordered, non-overlapping byte ranges; one per word.
    fn word_boundaries(
        &self,
        text: &str,
    ) -> Vec<Range<usize>>;

    /// Symbols that are matched verbatim and kept out of the embedding space.
    fn special_symbols(&self) -> &[String] {
        &[]
    }

    /// Re-segment `text` into characters, given its word boundaries.
    ///
    /// Word characters are kept verbatim; every gap between (or after)
    /// words collapses to a single separator: `'\n'` if the gap contains
    /// a newline, `' '` otherwise.
    ///
    /// ## Arguments
    /// * `text` - the source text.
    /// * `word_boundaries` - the boundaries from [`Tokenizer::word_boundaries`].
    fn characters(
        &self,
        text: &str,
        word_boundaries: &[Range<usize>],
    ) -> Vec<char> {
        characters_of(text, word_boundaries)
    }
}

/// The gap-collapsing character re-segmentation used by [`Tokenizer::characters`].
pub fn characters_of(
    text: &str,
    word_boundaries: &[Range<usize>],
) -> Vec<char> {
    let separator = |gap: &str| if gap.contains('\n') { '\n' } else { ' ' };

    let mut chars = Vec::with_capacity(text.len());
    let mut start = 0;
    for bounds in word_boundaries {
        if bounds.start > start {
            chars.push(separator(&text[start..bounds.start]));
        }
        chars.extend(text[bounds.clone()].chars());
        start = bounds.end;
    }
    if start < text.len() {
        chars.push(separator(&text[start..]));
    }
    chars
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_characters_collapse_gaps() {
        let text = "ab  cd\n\n e ";
        let bounds = vec![0..2, 4..6, 9..10];
        let chars: String = characters_of(text, &bounds).into_iter().collect();
        assert_eq!(chars, "ab cd\ne ");
    }

    #[test]
    fn test_characters_leading_gap() {
        // The gap before the first word is still a gap.
        let text = "  hi";
        let chars: String = characters_of(text, &[2..4]).into_iter().collect();
        assert_eq!(chars, " hi");
    }
}
