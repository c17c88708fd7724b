//! # Variational Autoencoder
//!
//! A convolutional encoder maps a padded embedding sequence to latent
//! moments; a transposed-convolution decoder maps a latent sample back to a
//! sequence of output vocabulary rows.

mod architecture;
mod decoder;
mod encoder;
mod loss;
mod postprocess;
mod training;

#[doc(inline)]
pub use architecture::*;
#[doc(inline)]
pub use decoder::*;
#[doc(inline)]
pub use encoder::*;
#[doc(inline)]
pub use loss::*;
#[doc(inline)]
pub use postprocess::*;
#[doc(inline)]
pub use training::*;
