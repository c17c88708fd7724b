//! # Word Embeddings
//!
//! The [`EmbeddingLookup`] capability, and [`InMemoryEmbeddings`], a
//! table-backed implementation readable from the word2vec text format.

mod in_memory;
mod lookup;

#[doc(inline)]
pub use in_memory::*;
#[doc(inline)]
pub use lookup::*;
