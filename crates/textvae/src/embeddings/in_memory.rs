//! # In-Memory Embedding Table

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use crate::{
    embeddings::EmbeddingLookup,
    errors::{TVResult, TextVaeError},
    types::{TVHashMap, hash_map_new},
};

/// An [`EmbeddingLookup`] over an owned word → vector table.
#[derive(Debug, Clone)]
pub struct InMemoryEmbeddings {
    dimension: usize,
    vectors: TVHashMap<String, Vec<f32>>,
}

impl InMemoryEmbeddings {
    /// Create an empty table.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: hash_map_new(),
        }
    }

    /// Build a table from `(word, vector)` pairs.
    ///
    /// Later duplicates replace earlier ones.
    ///
    /// ## Arguments
    /// * `dimension` - the vector width.
    /// * `entries` - the `(word, vector)` pairs.
    pub fn from_entries<W, I>(
        dimension: usize,
        entries: I,
    ) -> TVResult<Self>
    where
        W: Into<String>,
        I: IntoIterator<Item = (W, Vec<f32>)>,
    {
        let mut table = Self::new(dimension);
        for (word, vector) in entries {
            table.insert(word, vector)?;
        }
        Ok(table)
    }

    /// Insert one word.
    ///
    /// ## Errors
    /// [`TextVaeError::Data`] if the vector width is wrong.
    pub fn insert<W: Into<String>>(
        &mut self,
        word: W,
        vector: Vec<f32>,
    ) -> TVResult<()> {
        let word = word.into();
        if vector.len() != self.dimension {
            return Err(TextVaeError::data(format!(
                "vector for {word:?} has width {}, expected {}",
                vector.len(),
                self.dimension
            )));
        }
        self.vectors.insert(word, vector);
        Ok(())
    }

    /// The number of words.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Is the table empty?
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Read the word2vec / fastText text format.
    ///
    /// Each line is a word followed by its whitespace-separated components.
    /// An optional first line `count dim` is accepted as a header.
    ///
    /// ## Arguments
    /// * `reader` - the text source.
    pub fn read_word2vec<R: BufRead>(reader: R) -> TVResult<Self> {
        let mut dimension: Option<usize> = None;
        let mut entries: Vec<(String, Vec<f32>)> = Vec::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let mut fields = line.split_whitespace();
            let Some(word) = fields.next() else {
                continue;
            };
            let rest: Vec<&str> = fields.collect();

            if line_no == 0 && rest.len() == 1 {
                if let (Ok(_), Ok(dim)) = (word.parse::<usize>(), rest[0].parse::<usize>()) {
                    dimension = Some(dim);
                    continue;
                }
            }

            let vector = rest
                .iter()
                .map(|s| {
                    s.parse::<f32>().map_err(|e| {
                        TextVaeError::Parse(format!("line {}: {s:?}: {e}", line_no + 1))
                    })
                })
                .collect::<TVResult<Vec<f32>>>()?;

            match dimension {
                None => dimension = Some(vector.len()),
                Some(dim) if dim != vector.len() => {
                    return Err(TextVaeError::Parse(format!(
                        "line {}: expected {dim} components, found {}",
                        line_no + 1,
                        vector.len()
                    )));
                }
                _ => {}
            }
            entries.push((word.to_string(), vector));
        }

        let dimension = dimension
            .ok_or_else(|| TextVaeError::Parse("no embedding vectors found".to_string()))?;
        log::info!(
            "Loaded {} embedding vectors of dimension {dimension}",
            entries.len()
        );
        Self::from_entries(dimension, entries)
    }

    /// Load a word2vec / fastText text file.
    pub fn load_word2vec<P: AsRef<Path>>(path: P) -> TVResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        Self::read_word2vec(reader)
    }
}

impl EmbeddingLookup for InMemoryEmbeddings {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn vector(
        &self,
        word: &str,
    ) -> Option<&[f32]> {
        self.vectors.get(word).map(Vec::as_slice)
    }
}
