//! # Vocabulary Builder

use crate::{
    embeddings::EmbeddingLookup,
    math::{NORM_EPSILON, l2_norm},
    text::TokenizedText,
    types::{Matrix, TVHashMap, hash_map_new},
    vocab::{Vocabulary, VocabularyQuantizer},
};

/// Options for building a [`Vocabulary`] from a corpus.
#[derive(Clone)]
pub struct VocabularyBuilder<'a> {
    embeddings: &'a dyn EmbeddingLookup,
    special_symbols: Vec<String>,
    budget: Option<usize>,
    seed: u64,
}

impl<'a> VocabularyBuilder<'a> {
    /// Create a builder over an embedding lookup.
    pub fn new(embeddings: &'a dyn EmbeddingLookup) -> Self {
        Self {
            embeddings,
            special_symbols: Vec::new(),
            budget: None,
            seed: 0,
        }
    }

    /// Set the ordered special symbols.
    pub fn with_special_symbols<S: AsRef<str>>(
        self,
        special_symbols: &[S],
    ) -> Self {
        Self {
            special_symbols: special_symbols
                .iter()
                .map(|s| s.as_ref().to_string())
                .collect(),
            ..self
        }
    }

    /// Set the word-row budget; larger vocabularies are quantized.
    pub fn with_budget(
        self,
        budget: Option<usize>,
    ) -> Self {
        Self { budget, ..self }
    }

    /// Set the quantizer seed.
    pub fn with_seed(
        self,
        seed: u64,
    ) -> Self {
        Self { seed, ..self }
    }

    /// Scan the corpus and build the vocabulary.
    ///
    /// Words are registered in first-seen order. Special symbols, words
    /// missing from the lookup, and words whose vectors have near-zero
    /// norm are skipped.
    ///
    /// ## Arguments
    /// * `texts` - the tokenized corpus.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub fn build(
        &self,
        texts: &[TokenizedText],
    ) -> Vocabulary {
        let dim = self.embeddings.dimension();

        let mut words: TVHashMap<String, usize> = hash_map_new();
        let mut data: Vec<f32> = Vec::new();
        for text in texts {
            for token in text.iter() {
                if token.is_empty()
                    || words.contains_key(token)
                    || self.special_symbols.iter().any(|s| s == token)
                {
                    continue;
                }
                let Some(vector) = self.embeddings.vector(token) else {
                    continue;
                };
                let norm = l2_norm(vector);
                if norm <= NORM_EPSILON {
                    continue;
                }
                words.insert(token.to_string(), words.len());
                data.extend(vector.iter().map(|x| x / norm));
            }
        }
        let n_words = words.len();
        let word_vectors = Matrix::from_vec(n_words, dim, data)
            .unwrap_or_else(|| Matrix::zeros(n_words, dim));

        match self.budget {
            Some(budget) if budget < n_words => {
                log::info!("Vocabulary of {n_words} words exceeds the budget of {budget}; quantizing.");
                let quantization = VocabularyQuantizer::new(budget)
                    .with_seed(self.seed)
                    .quantize(&word_vectors);
                Vocabulary::from_quantization(
                    dim,
                    self.special_symbols.clone(),
                    words,
                    &quantization,
                )
            }
            _ => {
                log::info!("Vocabulary size is {n_words}.");
                Vocabulary::from_word_rows(dim, self.special_symbols.clone(), words, &word_vectors)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{embeddings::InMemoryEmbeddings, vocab::RowKind};

    fn tokens(words: &[&str]) -> TokenizedText {
        TokenizedText::from(words.iter().map(|w| w.to_string()).collect::<Vec<_>>())
    }

    fn table() -> InMemoryEmbeddings {
        InMemoryEmbeddings::from_entries(
            2,
            [
                ("cat", vec![3.0, 4.0]),
                ("dog", vec![0.0, 2.0]),
                ("zero", vec![0.0, 0.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_build_registers_in_order() {
        let table = table();
        let vocab = VocabularyBuilder::new(&table)
            .with_special_symbols(&["<n>"])
            .build(&[
                tokens(&["dog", "<n>", "zero", "missing"]),
                tokens(&["cat", "dog"]),
            ]);

        assert_eq!(vocab.n_word_rows(), 2);
        assert_eq!(vocab.n_rows(), 2 + 2 + 1);
        assert_eq!(vocab.kind_of("dog"), RowKind::Word(0));
        assert_eq!(vocab.kind_of("cat"), RowKind::Word(1));
        assert_eq!(vocab.kind_of("zero"), RowKind::Unknown);
        assert_eq!(vocab.kind_of("<n>"), RowKind::Special(0));
        assert_eq!(vocab.vectors().row(1), &[0.6, 0.8, 0.0, 0.0, 0.0]);
        assert!(!vocab.is_quantized());
    }

    #[test]
    fn test_empty_corpus() {
        let table = table();
        let vocab = VocabularyBuilder::new(&table).build(&[]);
        assert_eq!(vocab.n_rows(), 2);
    }

    #[test]
    fn test_budget_triggers_quantization() {
        let mut entries = Vec::new();
        let mut corpus = Vec::new();
        for i in 0..30 {
            let theta = (if i % 2 == 0 { 0.0f32 } else { 3.0 }) + 0.001 * i as f32;
            entries.push((format!("w{i}"), vec![theta.cos(), theta.sin()]));
            corpus.push(format!("w{i}"));
        }
        let table = InMemoryEmbeddings::from_entries(2, entries).unwrap();
        let corpus = TokenizedText::from(corpus);

        let vocab = VocabularyBuilder::new(&table)
            .with_budget(Some(2))
            .build(&[corpus]);
        assert!(vocab.is_quantized());
        assert_eq!(vocab.n_words(), 30);
        assert!(vocab.n_word_rows() < 30);
        assert_eq!(vocab.row_of("w0"), vocab.row_of("w2"));
        assert_ne!(vocab.row_of("w0"), vocab.row_of("w1"));

        // A budget at or above the word count leaves rows untouched.
        let vocab = VocabularyBuilder::new(&table)
            .with_budget(Some(30))
            .build(&[TokenizedText::from(vec!["w0".to_string()])]);
        assert!(!vocab.is_quantized());
    }

    #[test]
    fn test_centroids_pass_through_a_covering_budget() {
        let mut entries = Vec::new();
        let mut corpus = Vec::new();
        for i in 0..30 {
            let theta = (if i % 2 == 0 { 0.0f32 } else { 3.0 }) + 0.001 * i as f32;
            entries.push((format!("w{i}"), vec![theta.cos(), theta.sin()]));
            corpus.push(format!("w{i}"));
        }
        let table = InMemoryEmbeddings::from_entries(2, entries).unwrap();
        let quantized = VocabularyBuilder::new(&table)
            .with_budget(Some(2))
            .build(&[TokenizedText::from(corpus)]);
        assert!(quantized.is_quantized());

        let n_clusters = quantized.n_word_rows();
        let centroids = (0..n_clusters)
            .map(|k| quantized.vectors().row(k)[..2].to_vec())
            .collect::<Vec<_>>();
        let centroid_table = InMemoryEmbeddings::from_entries(
            2,
            centroids
                .iter()
                .enumerate()
                .map(|(k, c)| (format!("c{k}"), c.clone())),
        )
        .unwrap();
        let names = (0..n_clusters).map(|k| format!("c{k}")).collect::<Vec<_>>();

        let vocab = VocabularyBuilder::new(&centroid_table)
            .with_budget(Some(n_clusters))
            .build(&[TokenizedText::from(names.clone())]);
        assert!(!vocab.is_quantized());
        assert_eq!(vocab.n_word_rows(), n_clusters);
        assert_eq!(
            vocab.n_rows(),
            quantized.n_rows() - quantized.n_word_rows() + n_clusters
        );
        for (k, name) in names.iter().enumerate() {
            let row = vocab.vectors().row(vocab.row_of(name));
            for (x, c) in row[..2].iter().zip(&centroids[k]) {
                assert!((x - c).abs() < 1e-6);
            }
            assert_eq!(&row[2..], &[0.0, 0.0]);
        }
    }

    proptest! {
        #[test]
        fn test_rows_are_unit_or_one_hot(
            raw in proptest::collection::vec(
                proptest::collection::vec(-10.0f32..10.0, 3),
                1..20,
            )
        ) {
            let entries = raw
                .iter()
                .enumerate()
                .map(|(i, v)| (format!("w{i}"), v.clone()))
                .collect::<Vec<_>>();
            let table = InMemoryEmbeddings::from_entries(3, entries).unwrap();
            let corpus = TokenizedText::from(
                (0..raw.len()).map(|i| format!("w{i}")).collect::<Vec<_>>(),
            );
            let vocab = VocabularyBuilder::new(&table).build(&[corpus]);

            for row in vocab.vectors().iter_rows() {
                let norm = l2_norm(row);
                let ones = row.iter().filter(|&&x| x == 1.0).count();
                let zeros = row.iter().filter(|&&x| x == 0.0).count();
                let one_hot = ones == 1 && zeros == row.len() - 1;
                prop_assert!(one_hot || (norm - 1.0).abs() < 1e-5);
            }
        }
    }
}
