//! # Vocabulary
//!
//! [`VocabularyBuilder`] scans a tokenized corpus into a closed
//! [`Vocabulary`]; vocabularies over budget are collapsed by the
//! [`VocabularyQuantizer`] (an [`AnnForest`] neighbour graph clustered by
//! [`SparseDbscan`]).

mod ann_forest;
mod builder;
mod dbscan;
mod quantizer;
mod vocabulary;

#[doc(inline)]
pub use ann_forest::*;
#[doc(inline)]
pub use builder::*;
#[doc(inline)]
pub use dbscan::*;
#[doc(inline)]
pub use quantizer::*;
#[doc(inline)]
pub use vocabulary::*;
