//! # Character Alphabet
//!
//! A closed character index with begin/end sentinels at indices `0` and `1`,
//! followed by the observed characters in sorted order.

use crate::{
    errors::{TVResult, TextVaeError},
    types::{TVHashMap, hash_map_with_capacity},
};

/// The begin-of-sequence sentinel.
pub const BOS: char = '\u{2}';

/// The end-of-sequence sentinel.
pub const EOS: char = '\u{3}';

/// The index of [`BOS`].
pub const BOS_INDEX: usize = 0;

/// The index of [`EOS`].
pub const EOS_INDEX: usize = 1;

/// Slack added to the longest observed text to bound generation.
pub const CHAR_BOUND_SLACK: usize = 3;

/// A closed character alphabet.
#[derive(Debug, Clone, PartialEq)]
pub struct CharAlphabet {
    chars: Vec<char>,
    index: TVHashMap<char, usize>,
}

impl CharAlphabet {
    /// Collect the alphabet of a set of character sequences.
    pub fn from_texts<T: AsRef<[char]>>(texts: &[T]) -> Self {
        let mut observed = texts
            .iter()
            .flat_map(|t| t.as_ref().iter().copied())
            .filter(|&c| c != BOS && c != EOS)
            .collect::<Vec<_>>();
        observed.sort_unstable();
        observed.dedup();

        let mut chars = Vec::with_capacity(observed.len() + 2);
        chars.push(BOS);
        chars.push(EOS);
        chars.extend(observed);
        Self::index(chars)
    }

    /// Rebuild an alphabet from its character table.
    ///
    /// ## Errors
    /// [`TextVaeError::State`] unless the table starts with the sentinels
    /// and has no repeats.
    pub fn from_chars(chars: Vec<char>) -> TVResult<Self> {
        if chars.len() < 2 || chars[BOS_INDEX] != BOS || chars[EOS_INDEX] != EOS {
            return Err(TextVaeError::state(
                "the character table must start with the begin and end sentinels",
            ));
        }
        let alphabet = Self::index(chars);
        if alphabet.index.len() != alphabet.chars.len() {
            return Err(TextVaeError::state("the character table has repeats"));
        }
        Ok(alphabet)
    }

    fn index(chars: Vec<char>) -> Self {
        let mut index = hash_map_with_capacity(chars.len());
        for (idx, &c) in chars.iter().enumerate() {
            index.insert(c, idx);
        }
        Self { chars, index }
    }

    /// The character table.
    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    /// The number of characters, sentinels included.
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// Is this only the sentinels?
    pub fn is_empty(&self) -> bool {
        self.chars.len() <= 2
    }

    /// The index of a character.
    pub fn index_of(
        &self,
        c: char,
    ) -> Option<usize> {
        self.index.get(&c).copied()
    }

    /// The character at an index.
    pub fn char_at(
        &self,
        idx: usize,
    ) -> Option<char> {
        self.chars.get(idx).copied()
    }

    /// Decode indices to text, skipping sentinels and unknown indices.
    pub fn decode(
        &self,
        indices: &[usize],
    ) -> String {
        indices
            .iter()
            .filter(|&&i| i != BOS_INDEX && i != EOS_INDEX)
            .filter_map(|&i| self.char_at(i))
            .collect()
    }
}

/// Teacher-forced decoder inputs and targets of one text.
///
/// With `n = min(len, max_chars - 3)` kept characters:
/// * inputs are `BOS, c0 .. c(n-1), EOS`;
/// * targets are `c0 .. c(n-1), EOS, EOS`;
/// * both are `None` (masked) past step `n + 1`.
///
/// Characters missing from the alphabet are masked.
///
/// ## Returns
/// `(inputs, targets)`, each `max_chars` long.
pub fn teacher_forcing(
    alphabet: &CharAlphabet,
    chars: &[char],
    max_chars: usize,
) -> (Vec<Option<usize>>, Vec<Option<usize>>) {
    let n = chars.len().min(max_chars.saturating_sub(CHAR_BOUND_SLACK));
    let mut inputs = vec![None; max_chars];
    let mut targets = vec![None; max_chars];
    if max_chars < 2 {
        return (inputs, targets);
    }

    inputs[0] = Some(BOS_INDEX);
    for (t, &c) in chars[..n].iter().enumerate() {
        let idx = alphabet.index_of(c);
        inputs[t + 1] = idx;
        targets[t] = idx;
    }
    inputs[n + 1] = Some(EOS_INDEX);
    targets[n] = Some(EOS_INDEX);
    targets[n + 1] = Some(EOS_INDEX);
    (inputs, targets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn test_alphabet() {
        let alphabet = CharAlphabet::from_texts(&[chars("ba a"), chars("c")]);
        assert_eq!(alphabet.chars(), &[BOS, EOS, ' ', 'a', 'b', 'c']);
        assert_eq!(alphabet.index_of('a'), Some(3));
        assert_eq!(alphabet.index_of('z'), None);
        assert_eq!(alphabet.decode(&[0, 4, 3, 1, 99]), "ba");

        let rebuilt = CharAlphabet::from_chars(alphabet.chars().to_vec()).unwrap();
        assert_eq!(rebuilt, alphabet);

        assert!(CharAlphabet::from_chars(vec!['a', EOS]).is_err());
        assert!(CharAlphabet::from_chars(vec![BOS, EOS, 'a', 'a']).is_err());
    }

    #[test]
    fn test_teacher_forcing() {
        let alphabet = CharAlphabet::from_texts(&[chars("ab")]);
        let (inputs, targets) = teacher_forcing(&alphabet, &chars("ab"), 6);
        assert_eq!(
            inputs,
            vec![Some(0), Some(2), Some(3), Some(1), None, None]
        );
        assert_eq!(
            targets,
            vec![Some(2), Some(3), Some(1), Some(1), None, None]
        );

        // Truncated to max_chars - 3.
        let (inputs, targets) = teacher_forcing(&alphabet, &chars("abab"), 5);
        assert_eq!(inputs, vec![Some(0), Some(2), Some(3), Some(1), None]);
        assert_eq!(targets, vec![Some(2), Some(3), Some(1), Some(1), None]);
    }
}
