//! # Neural Network Building Blocks
//!
//! Layers, a GRU, deterministic initialization, optimizer steps, weight
//! blobs, and the training schedule shared by the VAE and the generator.

mod gru;
mod init;
mod layers;
mod noise;
mod optim;
mod schedule;
mod weights;

#[doc(inline)]
pub use gru::*;
#[doc(inline)]
pub use init::*;
#[doc(inline)]
pub use layers::*;
#[doc(inline)]
pub use noise::*;
#[doc(inline)]
pub use optim::*;
#[doc(inline)]
pub use schedule::*;
#[doc(inline)]
pub use weights::*;
