//! # Sequence Layers
//!
//! Channels-last `(batch, time, channels)` layers built from differentiable
//! tensor primitives only.

use candle_core::{D, Module, Tensor, Var};
use candle_nn::{Init, Linear, VarBuilder};

use crate::errors::{TVResult, TextVaeError};

/// Element-wise activations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Activation {
    /// Identity.
    #[default]
    Linear,

    /// `max(x, 0)`.
    Relu,

    /// Hyperbolic tangent.
    Tanh,

    /// Logistic sigmoid.
    Sigmoid,
}

impl Activation {
    /// Apply the activation.
    pub fn apply(
        &self,
        x: &Tensor,
    ) -> TVResult<Tensor> {
        Ok(match self {
            Activation::Linear => x.clone(),
            Activation::Relu => x.relu()?,
            Activation::Tanh => x.tanh()?,
            Activation::Sigmoid => sigmoid(x)?,
        })
    }
}

/// Logistic sigmoid, `1 / (1 + exp(-x))`.
pub fn sigmoid(x: &Tensor) -> TVResult<Tensor> {
    Ok(x.neg()?.exp()?.affine(1.0, 1.0)?.recip()?)
}

/// Apply a linear map to the last axis of a tensor of any rank.
pub fn linear_last_axis(
    linear: &Linear,
    x: &Tensor,
) -> TVResult<Tensor> {
    let dims = x.dims().to_vec();
    let (lead, last) = dims.split_at(dims.len() - 1);
    let rows = lead.iter().product::<usize>();
    let y = linear.forward(&x.contiguous()?.reshape((rows, last[0]))?)?;
    let mut out_dims = lead.to_vec();
    out_dims.push(y.dim(1)?);
    Ok(y.reshape(out_dims)?)
}

/// A fully connected layer with an activation.
#[derive(Debug, Clone)]
pub struct Dense {
    linear: Linear,
    activation: Activation,
}

impl Dense {
    /// Create a dense layer.
    ///
    /// ## Arguments
    /// * `in_dim` - input width.
    /// * `out_dim` - output width.
    /// * `bias` - whether the layer has a bias.
    /// * `activation` - the output activation.
    /// * `vb` - the variable scope.
    pub fn new(
        in_dim: usize,
        out_dim: usize,
        bias: bool,
        activation: Activation,
        vb: VarBuilder,
    ) -> TVResult<Self> {
        let linear = if bias {
            candle_nn::linear(in_dim, out_dim, vb)?
        } else {
            candle_nn::linear_no_bias(in_dim, out_dim, vb)?
        };
        Ok(Self { linear, activation })
    }

    /// Apply to the last axis.
    pub fn forward(
        &self,
        x: &Tensor,
    ) -> TVResult<Tensor> {
        self.activation.apply(&linear_last_axis(&self.linear, x)?)
    }
}

/// Time-axis padding of a [`Conv1d`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConvPadding {
    /// No padding; `t - k + 1` outputs.
    Valid,

    /// Length-preserving padding; `t` outputs.
    Same,

    /// `k - 1` zeros on both sides; `t + k - 1` outputs.
    ///
    /// This is the stride-1 transposed convolution.
    Full,
}

impl ConvPadding {
    /// The `(left, right)` zero padding for a kernel size.
    pub fn pads(
        &self,
        kernel_size: usize,
    ) -> (usize, usize) {
        let k = kernel_size.saturating_sub(1);
        match self {
            ConvPadding::Valid => (0, 0),
            ConvPadding::Same => (k / 2, k - k / 2),
            ConvPadding::Full => (k, k),
        }
    }

    /// The output length for an input length.
    pub fn output_len(
        &self,
        input_len: usize,
        kernel_size: usize,
    ) -> usize {
        let (l, r) = self.pads(kernel_size);
        (input_len + l + r + 1).saturating_sub(kernel_size)
    }
}

/// A stride-1 1-D convolution over the time axis.
///
/// Implemented as a window concatenation (im2col) followed by a linear map
/// from `kernel_size * in_channels` to `out_channels`.
#[derive(Debug, Clone)]
pub struct Conv1d {
    proj: Linear,
    kernel_size: usize,
    padding: ConvPadding,
    activation: Activation,
}

impl Conv1d {
    /// Create a convolution.
    ///
    /// ## Arguments
    /// * `in_channels` - input channels.
    /// * `out_channels` - output channels (filters).
    /// * `kernel_size` - window length.
    /// * `padding` - time-axis padding.
    /// * `activation` - output activation.
    /// * `vb` - the variable scope.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        padding: ConvPadding,
        activation: Activation,
        vb: VarBuilder,
    ) -> TVResult<Self> {
        let proj = candle_nn::linear(kernel_size * in_channels, out_channels, vb)?;
        Ok(Self {
            proj,
            kernel_size,
            padding,
            activation,
        })
    }

    /// The output length for an input length.
    pub fn output_len(
        &self,
        input_len: usize,
    ) -> usize {
        self.padding.output_len(input_len, self.kernel_size)
    }

    /// Apply to a `(batch, time, channels)` tensor.
    pub fn forward(
        &self,
        x: &Tensor,
    ) -> TVResult<Tensor> {
        let (left, right) = self.padding.pads(self.kernel_size);
        let x = if left + right > 0 {
            x.pad_with_zeros(1, left, right)?
        } else {
            x.clone()
        };
        let t = x.dim(1)?;
        let out_len = (t + 1).saturating_sub(self.kernel_size);
        if out_len == 0 {
            return Err(TextVaeError::data(format!(
                "sequence of length {t} is shorter than the kernel size {}",
                self.kernel_size
            )));
        }
        let windows = (0..self.kernel_size)
            .map(|j| x.narrow(1, j, out_len))
            .collect::<candle_core::Result<Vec<_>>>()?;
        let windows = Tensor::cat(&windows, 2)?;
        self.activation
            .apply(&linear_last_axis(&self.proj, &windows)?)
    }
}

/// Batch normalization over the channel axis of `(batch, time, channels)`.
///
/// Running statistics live in the variable map next to the learned scale
/// and shift; they are updated in place during training.
#[derive(Debug, Clone)]
pub struct BatchNorm1d {
    gamma: Tensor,
    beta: Tensor,
    running_mean: Var,
    running_var: Var,
    momentum: f64,
    eps: f64,
}

/// Name suffixes of non-trainable batch-norm statistics.
pub const RUNNING_STAT_SUFFIXES: [&str; 2] = ["running_mean", "running_var"];

impl BatchNorm1d {
    /// Create a batch norm layer.
    pub fn new(
        channels: usize,
        vb: VarBuilder,
    ) -> TVResult<Self> {
        let gamma = vb.get_with_hints(channels, "gamma", Init::Const(1.0))?;
        let beta = vb.get_with_hints(channels, "beta", Init::Const(0.0))?;
        let running_mean = vb.get_with_hints(channels, "running_mean", Init::Const(0.0))?;
        let running_var = vb.get_with_hints(channels, "running_var", Init::Const(1.0))?;
        Ok(Self {
            gamma,
            beta,
            running_mean: Var::from_tensor(&running_mean)?,
            running_var: Var::from_tensor(&running_var)?,
            momentum: 0.99,
            eps: 1e-3,
        })
    }

    /// Normalize.
    ///
    /// ## Arguments
    /// * `x` - `(batch, time, channels)`.
    /// * `train` - use (and fold in) batch statistics.
    pub fn forward(
        &self,
        x: &Tensor,
        train: bool,
    ) -> TVResult<Tensor> {
        let (b, t, c) = x.dims3()?;
        let (mean, var) = if train {
            let flat = x.reshape((b * t, c))?;
            let mean = flat.mean_keepdim(0)?;
            let var = flat.broadcast_sub(&mean)?.sqr()?.mean_keepdim(0)?;

            let m = self.momentum;
            let new_mean = self
                .running_mean
                .as_tensor()
                .affine(m, 0.0)?
                .add(&mean.detach().squeeze(0)?.affine(1.0 - m, 0.0)?)?;
            let new_var = self
                .running_var
                .as_tensor()
                .affine(m, 0.0)?
                .add(&var.detach().squeeze(0)?.affine(1.0 - m, 0.0)?)?;
            self.running_mean.set(&new_mean)?;
            self.running_var.set(&new_var)?;

            (mean.reshape((1, 1, c))?, var.reshape((1, 1, c))?)
        } else {
            (
                self.running_mean.as_tensor().reshape((1, 1, c))?,
                self.running_var.as_tensor().reshape((1, 1, c))?,
            )
        };

        let x = x
            .broadcast_sub(&mean)?
            .broadcast_div(&var.affine(1.0, self.eps)?.sqrt()?)?;
        Ok(x.broadcast_mul(&self.gamma.reshape((1, 1, c))?)?
            .broadcast_add(&self.beta.reshape((1, 1, c))?)?)
    }
}

/// Max pooling with window and stride 2 over the time axis.
///
/// An odd trailing step is dropped.
pub fn max_pool2(x: &Tensor) -> TVResult<Tensor> {
    let (b, t, c) = x.dims3()?;
    let half = t / 2;
    let x = x.narrow(1, 0, half * 2)?.contiguous()?;
    Ok(x.reshape((b, half, 2, c))?.max(2)?)
}

/// Nearest-neighbour upsampling by 2 over the time axis.
pub fn upsample2(x: &Tensor) -> TVResult<Tensor> {
    let (b, t, c) = x.dims3()?;
    Ok(x.unsqueeze(2)?
        .broadcast_as((b, t, 2, c))?
        .contiguous()?
        .reshape((b, t * 2, c))?)
}

/// Crop (from the end) or zero-pad the time axis to `len`.
pub fn fit_time_axis(
    x: &Tensor,
    len: usize,
) -> TVResult<Tensor> {
    let t = x.dim(1)?;
    Ok(if t > len {
        x.narrow(1, 0, len)?
    } else if t < len {
        x.pad_with_zeros(1, 0, len - t)?
    } else {
        x.clone()
    })
}

/// Scale each vector along the last axis to unit length.
///
/// Computes `x / sqrt(sum(x^2) + 1e-12)`.
pub fn l2_normalize_last(x: &Tensor) -> TVResult<Tensor> {
    let norm = x.sqr()?.sum_keepdim(D::Minus1)?.affine(1.0, 1e-12)?.sqrt()?;
    Ok(x.broadcast_div(&norm)?)
}
