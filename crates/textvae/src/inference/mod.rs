//! # Inference
//!
//! Turning decoded rows back into words and ranked texts.

mod text_ranker;
mod word_resolver;

#[doc(inline)]
pub use text_ranker::*;
#[doc(inline)]
pub use word_resolver::*;
