//! # Vectorization
//!
//! Token sequences become fixed-length matrices ([`SequenceVectorizer`]),
//! served in batches by index ([`BatchSource`], [`BatchPlan`]).

mod batches;
mod sequence_vectorizer;

#[doc(inline)]
pub use batches::*;
#[doc(inline)]
pub use sequence_vectorizer::*;
