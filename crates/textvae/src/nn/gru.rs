//! # Gated Recurrent Unit
//!
//! A GRU with the reset gate applied before the recurrent projection of the
//! candidate state:
//!
//! ```text
//! z  = σ(x Wz + bz + h Uz)
//! r  = σ(x Wr + br + h Ur)
//! hh = tanh(x Wh + bh + (r * h) Uh)
//! h' = z * h + (1 - z) * hh
//! ```
//!
//! Masked steps carry the previous state through unchanged.

use candle_core::{Device, Module, Tensor};
use candle_nn::{Linear, VarBuilder};

use crate::{
    errors::TVResult,
    nn::{Noise, linear_last_axis, sigmoid},
};

/// Per-sequence dropout masks of a [`Gru`].
///
/// The same masks apply at every time step.
#[derive(Debug, Clone, Default)]
pub struct GruDropout {
    /// `(batch, input)` mask on the inputs.
    pub input: Option<Tensor>,

    /// `(batch, hidden)` mask on the recurrent state.
    pub recurrent: Option<Tensor>,
}

impl GruDropout {
    /// No dropout.
    pub fn none() -> Self {
        Self::default()
    }

    /// Draw training masks.
    ///
    /// ## Arguments
    /// * `noise` - the noise source.
    /// * `batch` - the batch size.
    /// * `input_dim` - the input width.
    /// * `hidden` - the state width.
    /// * `input_rate` - input drop rate.
    /// * `recurrent_rate` - recurrent drop rate.
    pub fn sample(
        noise: &mut Noise,
        batch: usize,
        input_dim: usize,
        hidden: usize,
        input_rate: f32,
        recurrent_rate: f32,
    ) -> TVResult<Self> {
        Ok(Self {
            input: Some(noise.dropout_mask((batch, input_dim), input_rate)?),
            recurrent: Some(noise.dropout_mask((batch, hidden), recurrent_rate)?),
        })
    }
}

/// A single-layer GRU over `(batch, time, input)` sequences.
#[derive(Debug, Clone)]
pub struct Gru {
    input_proj: Linear,
    rec_z: Linear,
    rec_r: Linear,
    rec_h: Linear,
    input_dim: usize,
    hidden: usize,
}

impl Gru {
    /// Create a GRU.
    pub fn new(
        input_dim: usize,
        hidden: usize,
        vb: VarBuilder,
    ) -> TVResult<Self> {
        Ok(Self {
            input_proj: candle_nn::linear(input_dim, 3 * hidden, vb.pp("input"))?,
            rec_z: candle_nn::linear_no_bias(hidden, hidden, vb.pp("rec_z"))?,
            rec_r: candle_nn::linear_no_bias(hidden, hidden, vb.pp("rec_r"))?,
            rec_h: candle_nn::linear_no_bias(hidden, hidden, vb.pp("rec_h"))?,
            input_dim,
            hidden,
        })
    }

    /// The input width.
    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    /// The state width.
    pub fn hidden_size(&self) -> usize {
        self.hidden
    }

    /// An all-zero `(batch, hidden)` state.
    pub fn zero_state(
        &self,
        batch: usize,
        device: &Device,
    ) -> TVResult<Tensor> {
        Ok(Tensor::zeros(
            (batch, self.hidden),
            candle_core::DType::F32,
            device,
        )?)
    }

    fn cell(
        &self,
        projected: &Tensor,
        h: &Tensor,
        dropout: &GruDropout,
    ) -> TVResult<Tensor> {
        let hd = match &dropout.recurrent {
            Some(mask) => h.mul(mask)?,
            None => h.clone(),
        };
        let n = self.hidden;
        let xz = projected.narrow(1, 0, n)?;
        let xr = projected.narrow(1, n, n)?;
        let xh = projected.narrow(1, 2 * n, n)?;

        let z = sigmoid(&xz.add(&self.rec_z.forward(&hd)?)?)?;
        let r = sigmoid(&xr.add(&self.rec_r.forward(&hd)?)?)?;
        let hh = xh.add(&self.rec_h.forward(&r.mul(&hd)?)?)?.tanh()?;

        Ok(z.mul(h)?.add(&z.affine(-1.0, 1.0)?.mul(&hh)?)?)
    }

    /// Run over a sequence.
    ///
    /// ## Arguments
    /// * `x` - `(batch, time, input)`.
    /// * `h0` - the initial `(batch, hidden)` state; zeros if `None`.
    /// * `mask` - optional `(batch, time)` step mask; `0` steps are skipped.
    /// * `dropout` - dropout masks.
    ///
    /// ## Returns
    /// `(outputs, final_state)`: `(batch, time, hidden)` and `(batch, hidden)`.
    pub fn forward(
        &self,
        x: &Tensor,
        h0: Option<&Tensor>,
        mask: Option<&Tensor>,
        dropout: &GruDropout,
    ) -> TVResult<(Tensor, Tensor)> {
        let (b, t, _) = x.dims3()?;
        let x = match &dropout.input {
            Some(m) => x.broadcast_mul(&m.unsqueeze(1)?)?,
            None => x.clone(),
        };
        let projected = linear_last_axis(&self.input_proj, &x)?;

        let mut h = match h0 {
            Some(h0) => h0.clone(),
            None => self.zero_state(b, x.device())?,
        };
        let mut outputs = Vec::with_capacity(t);
        for step in 0..t {
            let p = projected.narrow(1, step, 1)?.squeeze(1)?;
            let h_new = self.cell(&p, &h, dropout)?;
            h = match mask {
                Some(mask) => {
                    let m = mask.narrow(1, step, 1)?;
                    h_new
                        .broadcast_mul(&m)?
                        .add(&h.broadcast_mul(&m.affine(-1.0, 1.0)?)?)?
                }
                None => h_new,
            };
            outputs.push(h.clone());
        }
        if outputs.is_empty() {
            let empty = Tensor::zeros((b, 0, self.hidden), candle_core::DType::F32, x.device())?;
            return Ok((empty, h));
        }
        Ok((Tensor::stack(&outputs, 1)?, h))
    }

    /// Advance one step without dropout.
    ///
    /// ## Arguments
    /// * `x` - `(batch, input)`.
    /// * `h` - `(batch, hidden)`.
    pub fn step(
        &self,
        x: &Tensor,
        h: &Tensor,
    ) -> TVResult<Tensor> {
        let projected = self.input_proj.forward(x)?;
        self.cell(&projected, h, &GruDropout::none())
    }
}

/// The `(batch, time)` mask of steps whose input row has any nonzero entry.
pub fn nonzero_step_mask(x: &Tensor) -> TVResult<Tensor> {
    Ok(x.abs()?
        .max(candle_core::D::Minus1)?
        .gt(0.0)?
        .to_dtype(candle_core::DType::F32)?)
}
