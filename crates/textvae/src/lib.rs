//! # `textvae` Text Variational Autoencoder
//!
//! A convolutional variational autoencoder over word-embedding sequences,
//! with a character-level recurrent generator that writes text back out of
//! the reconstructions.
//!
//! See:
//! * [`estimator`] for the fit / transform / predict surface.
//! * [`vocab`] to build (and quantize) output vocabularies.
//! * [`vae`] for the encoder, decoder, and reconstruction losses.
//! * [`generator`] for the character generator and greedy decoding.
//! * [`inference`] to resolve reconstructions into words and ranked texts.
//!
//! Tokenization and word vectors are collaborators:
//! * [`text::Tokenizer`], with [`text::RegexTokenizer`] as the default.
//! * [`embeddings::EmbeddingLookup`], with [`embeddings::InMemoryEmbeddings`]
//!   reading the word2vec text format.
//!
//! ## Crate Features
#![doc = document_features::document_features!()]
#![warn(missing_docs, unused)]

pub mod embeddings;
pub mod errors;
pub mod estimator;
pub mod generator;
pub mod inference;
pub mod math;
pub mod nn;
pub mod text;
pub mod types;
pub mod vae;
pub mod vectorize;
pub mod vocab;
