//! # Text Segmentation
//!
//! The [`Tokenizer`] capability splits raw text into word boundaries and
//! re-segments it into characters; [`RegexTokenizer`] is the default
//! implementation.

mod regex_tokenizer;
mod tokenized;
mod tokenizer;

#[doc(inline)]
pub use regex_tokenizer::*;
#[doc(inline)]
pub use tokenized::*;
#[doc(inline)]
pub use tokenizer::*;
