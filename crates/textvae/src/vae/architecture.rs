//! # VAE Architecture
//!
//! Shape bookkeeping for the convolutional encoder and the mirrored
//! decoder.

use candle_core::Tensor;
use candle_nn::VarBuilder;

use crate::{
    errors::TVResult,
    nn::{Activation, BatchNorm1d, Conv1d, ConvPadding},
};

/// The sizes that fix a VAE's variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaeArchitecture {
    /// Filters per convolution stage, encoder order.
    pub n_filters: Vec<usize>,

    /// Convolution window length.
    pub kernel_size: usize,

    /// Latent width.
    pub latent_dim: usize,

    /// Batch-normalize after each convolution?
    pub use_batch_norm: bool,

    /// Encoder time steps.
    pub input_text_size: usize,

    /// Decoder time steps.
    pub output_text_size: usize,

    /// Encoder row width.
    pub input_vector_size: usize,

    /// Decoder row width.
    pub output_vector_size: usize,
}

impl VaeArchitecture {
    /// The shortest encoder input that survives every stage.
    ///
    /// Each stage is a valid convolution followed by pooling by 2, so the
    /// bound is built backwards from one surviving step: `l = 2l + k - 1`.
    pub fn min_input_text_size(
        n_stages: usize,
        kernel_size: usize,
    ) -> usize {
        (0..n_stages).fold(1, |l, _| 2 * l + kernel_size - 1)
    }

    /// The number of stages.
    pub fn n_stages(&self) -> usize {
        self.n_filters.len()
    }

    /// The encoder's time steps after the last pooling.
    pub fn encoded_len(&self) -> usize {
        self.n_filters.iter().fold(self.input_text_size, |l, _| {
            (l + 1).saturating_sub(self.kernel_size) / 2
        })
    }

    /// The flattened encoder feature width.
    pub fn flat_size(&self) -> usize {
        self.encoded_len() * self.n_filters.last().copied().unwrap_or(0)
    }

    /// The decoder's starting time steps.
    ///
    /// Mirrors the encoder's shrinkage from `output_text_size`, rounding up.
    pub fn decoder_steps(&self) -> usize {
        let k = self.kernel_size as i64;
        let n = self.n_filters.iter().fold(self.output_text_size as i64, |n, _| {
            let a = n - k + 1;
            // Integer division truncates toward zero, which is the ceiling
            // for non-positive numerators.
            if a > 0 { (a + 1) / 2 } else { a / 2 }
        });
        n.max(1) as usize
    }

    /// The decoder's starting channels.
    pub fn decoder_width(&self) -> usize {
        10.max(self.latent_dim.div_ceil(self.decoder_steps()))
    }
}

/// Convolution, ReLU, then optional batch norm.
#[derive(Debug, Clone)]
pub(crate) struct ConvBlock {
    conv: Conv1d,
    norm: Option<BatchNorm1d>,
}

impl ConvBlock {
    pub(crate) fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        padding: ConvPadding,
        use_batch_norm: bool,
        vb: VarBuilder,
    ) -> TVResult<Self> {
        let conv = Conv1d::new(
            in_channels,
            out_channels,
            kernel_size,
            padding,
            Activation::Relu,
            vb.pp("conv"),
        )?;
        let norm = if use_batch_norm {
            Some(BatchNorm1d::new(out_channels, vb.pp("batch_norm"))?)
        } else {
            None
        };
        Ok(Self { conv, norm })
    }

    /// Apply; `train` selects batch statistics in the norm.
    pub(crate) fn forward(
        &self,
        x: &Tensor,
        train: bool,
    ) -> TVResult<Tensor> {
        let y = self.conv.forward(x)?;
        match &self.norm {
            Some(norm) => norm.forward(&y, train),
            None => Ok(y),
        }
    }
}
