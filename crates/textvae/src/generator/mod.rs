//! # Character Generator
//!
//! A recurrent encoder/decoder pair that turns postprocessed VAE
//! reconstructions into text one character at a time.

mod alphabet;
mod decode;
mod network;
mod training;

#[doc(inline)]
pub use alphabet::*;
#[doc(inline)]
pub use decode::*;
#[doc(inline)]
pub use network::*;
#[doc(inline)]
pub use training::*;
