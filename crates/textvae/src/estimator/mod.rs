//! # Estimator
//!
//! [`TextVae`] wires the pieces into a fit / transform / predict surface
//! with persisted state.

mod collection;
mod fitted;
mod fitting;
mod options;
mod state;
mod text_vae;

#[doc(inline)]
pub use collection::*;
pub(crate) use fitted::*;
#[doc(inline)]
pub use fitting::*;
#[doc(inline)]
pub use options::*;
#[doc(inline)]
pub use state::*;
#[doc(inline)]
pub use text_vae::*;
