//! # Word Resolver
//!
//! Maps one decoded row back to words. The row competes against four
//! classes of reference vectors:
//!
//! | class     | reference                        | tie priority |
//! |-----------|----------------------------------|--------------|
//! | `End`     | end indicator                    | 0            |
//! | `Unknown` | unknown indicator                | 1            |
//! | `Special` | nearest special symbol indicator | 2            |
//! | `Word`    | nearest known word               | 3            |
//!
//! The class with the smallest cosine distance wins; on equal distances the
//! higher priority wins.

use core::cmp::{Ordering, Reverse};

use crate::{
    embeddings::EmbeddingLookup,
    math::{NORM_EPSILON, cosine_distance, dot, l2_norm},
    types::Matrix,
    vocab::vector_width,
};

/// The outcome of resolving one decoded row.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The text ends here.
    End,

    /// An unknown word; contributes nothing.
    Unknown,

    /// A special symbol and its distance.
    Special(String, f32),

    /// Candidate words, by ascending distance then word.
    Words(Vec<(String, f32)>),
}

impl Resolution {
    /// The candidate list this resolution contributes to a text.
    ///
    /// ## Returns
    /// `None` for [`Resolution::End`].
    pub fn candidates(self) -> Option<Vec<(String, f32)>> {
        match self {
            Resolution::End => None,
            Resolution::Unknown => Some(Vec::new()),
            Resolution::Special(symbol, distance) => Some(vec![(symbol, distance)]),
            Resolution::Words(words) => Some(words),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Class {
    End = 0,
    Unknown = 1,
    Special = 2,
    Word = 3,
}

#[derive(Debug, Clone, Copy)]
struct Contender {
    distance: f32,
    class: Class,
    idx: usize,
}

impl Contender {
    fn key(&self) -> (f32, Reverse<Class>) {
        (self.distance, Reverse(self.class))
    }

    fn rank(
        &self,
        other: &Self,
    ) -> Ordering {
        let (a, ca) = self.key();
        let (b, cb) = other.key();
        a.total_cmp(&b).then(ca.cmp(&cb))
    }
}

/// Nearest-word lookup over a fixed candidate word list.
#[derive(Debug, Clone)]
pub struct WordResolver {
    embedding_dim: usize,
    special_symbols: Vec<String>,
    words: Vec<String>,
    vectors: Matrix,
}

impl WordResolver {
    /// Build a resolver.
    ///
    /// Words missing from the lookup, or with near-zero vectors, are
    /// dropped.
    ///
    /// ## Arguments
    /// * `embeddings` - the output embeddings.
    /// * `words` - the candidate words.
    /// * `special_symbols` - the ordered special symbols.
    pub fn new(
        embeddings: &dyn EmbeddingLookup,
        words: &[String],
        special_symbols: &[String],
    ) -> Self {
        let dim = embeddings.dimension();
        let width = vector_width(dim, special_symbols.len());

        let mut kept = Vec::with_capacity(words.len());
        let mut data = Vec::with_capacity(words.len() * width);
        for word in words {
            let Some(vector) = embeddings.vector(word) else {
                continue;
            };
            let norm = l2_norm(vector);
            if norm <= NORM_EPSILON {
                continue;
            }
            kept.push(word.clone());
            data.extend(vector.iter().map(|x| x / norm));
            data.extend(core::iter::repeat_n(0.0, width - dim));
        }
        let vectors = Matrix::from_vec(kept.len(), width, data)
            .unwrap_or_else(|| Matrix::zeros(0, width));

        Self {
            embedding_dim: dim,
            special_symbols: special_symbols.to_vec(),
            words: kept,
            vectors,
        }
    }

    /// The candidate words.
    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// The decoded row width.
    pub fn vector_width(&self) -> usize {
        self.vectors.cols()
    }

    /// The `n` words whose embeddings are most similar to the embedding
    /// block of `vector`, best first.
    fn nearest_words(
        &self,
        vector: &[f32],
        n: usize,
    ) -> Vec<usize> {
        let block = &vector[..self.embedding_dim];
        let mut scored = self
            .vectors
            .iter_rows()
            .enumerate()
            .map(|(idx, row)| (dot(block, &row[..self.embedding_dim]), idx))
            .collect::<Vec<_>>();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        scored.truncate(n);
        scored.into_iter().map(|(_, idx)| idx).collect()
    }

    fn indicator(
        &self,
        column: usize,
    ) -> Vec<f32> {
        let mut v = vec![0.0; self.vector_width()];
        v[column] = 1.0;
        v
    }

    /// Resolve one decoded row.
    ///
    /// ## Arguments
    /// * `vector` - the decoded row, [`WordResolver::vector_width`] wide.
    /// * `n` - the number of candidate words.
    pub fn resolve(
        &self,
        vector: &[f32],
        n: usize,
    ) -> Resolution {
        let width = self.vector_width();
        let nearest = self.nearest_words(vector, n.max(1));

        let mut contenders = vec![
            Contender {
                distance: cosine_distance(vector, &self.indicator(width - 1)),
                class: Class::End,
                idx: 0,
            },
            Contender {
                distance: cosine_distance(vector, &self.indicator(width - 2)),
                class: Class::Unknown,
                idx: 0,
            },
        ];
        let best_special = (0..self.special_symbols.len())
            .map(|s| Contender {
                distance: cosine_distance(vector, &self.indicator(self.embedding_dim + s)),
                class: Class::Special,
                idx: s,
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance).then(a.idx.cmp(&b.idx)));
        contenders.extend(best_special);
        contenders.push(Contender {
            distance: nearest
                .first()
                .map(|&idx| cosine_distance(vector, self.vectors.row(idx)))
                .unwrap_or(f32::INFINITY),
            class: Class::Word,
            idx: 0,
        });

        let Some(winner) = contenders.into_iter().min_by(|a, b| a.rank(b)) else {
            return Resolution::Unknown;
        };
        match winner.class {
            Class::End => Resolution::End,
            Class::Unknown => Resolution::Unknown,
            Class::Special => {
                Resolution::Special(self.special_symbols[winner.idx].clone(), winner.distance)
            }
            Class::Word => {
                let mut words = nearest
                    .into_iter()
                    .map(|idx| {
                        (
                            self.words[idx].clone(),
                            cosine_distance(vector, self.vectors.row(idx)),
                        )
                    })
                    .collect::<Vec<_>>();
                words.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
                Resolution::Words(words)
            }
        }
    }

    /// Resolve a decoded sequence up to its end.
    ///
    /// Unknown positions are dropped.
    ///
    /// ## Arguments
    /// * `rows` - `(time, width)` decoded rows.
    /// * `n` - the number of candidate words per position.
    pub fn resolve_sequence(
        &self,
        rows: &Matrix,
        n: usize,
    ) -> Vec<Vec<(String, f32)>> {
        let mut positions = Vec::new();
        for row in rows.iter_rows() {
            match self.resolve(row, n).candidates() {
                None => break,
                Some(candidates) if candidates.is_empty() => continue,
                Some(candidates) => positions.push(candidates),
            }
        }
        positions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::InMemoryEmbeddings;

    fn resolver(specials: &[&str]) -> WordResolver {
        let table = InMemoryEmbeddings::from_entries(
            2,
            [
                ("east", vec![1.0, 0.0]),
                ("north", vec![0.0, 2.0]),
                ("northeast", vec![1.0, 1.0]),
                ("void", vec![0.0, 0.0]),
            ],
        )
        .unwrap();
        let words = ["east", "north", "northeast", "void", "missing"]
            .iter()
            .map(|w| w.to_string())
            .collect::<Vec<_>>();
        let specials = specials.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        WordResolver::new(&table, &words, &specials)
    }

    #[test]
    fn test_candidate_words() {
        let resolver = resolver(&[]);
        assert_eq!(resolver.words(), &["east", "north", "northeast"]);
        assert_eq!(resolver.vector_width(), 4);

        let Resolution::Words(words) = resolver.resolve(&[1.0, 0.1, 0.0, 0.0], 2) else {
            panic!("expected words");
        };
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].0, "east");
        assert_eq!(words[1].0, "northeast");
        assert!(words[0].1 < words[1].1);
    }

    #[test]
    fn test_markers_win() {
        let resolver = resolver(&["<n>"]);
        assert_eq!(resolver.vector_width(), 5);
        assert_eq!(resolver.resolve(&[0.0, 0.1, 0.0, 0.0, 1.0], 3), Resolution::End);
        assert_eq!(
            resolver.resolve(&[0.1, 0.0, 0.0, 1.0, 0.0], 3),
            Resolution::Unknown
        );
        let Resolution::Special(symbol, _) = resolver.resolve(&[0.0, 0.0, 1.0, 0.0, 0.2], 3) else {
            panic!("expected a special symbol");
        };
        assert_eq!(symbol, "<n>");
    }

    #[test]
    fn test_ties_prefer_words_then_markers() {
        let resolver = resolver(&[]);
        // Equidistant from "east" and the end indicator.
        let Resolution::Words(_) = resolver.resolve(&[1.0, 0.0, 0.0, 1.0], 1) else {
            panic!("expected words");
        };
        // Equidistant from the unknown and end indicators.
        assert_eq!(
            resolver.resolve(&[0.0, 0.0, 1.0, 1.0], 1),
            Resolution::Unknown
        );
    }

    #[test]
    fn test_no_words() {
        let table = InMemoryEmbeddings::new(2);
        let resolver = WordResolver::new(&table, &[], &[]);
        assert_eq!(resolver.resolve(&[0.5, 0.5, 0.0, 0.0], 3), Resolution::Unknown);
    }

    #[test]
    fn test_resolve_sequence() {
        let resolver = resolver(&[]);
        let rows = Matrix::from_vec(
            4,
            4,
            vec![
                1.0, 0.0, 0.0, 0.0, //
                0.0, 0.0, 1.0, 0.0, //
                0.0, 1.0, 0.0, 0.0, //
                0.0, 0.0, 0.0, 1.0,
            ],
        )
        .unwrap();
        let positions = resolver.resolve_sequence(&rows, 1);
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0][0].0, "east");
        assert_eq!(positions[1][0].0, "north");
    }
}
