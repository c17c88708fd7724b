//! # Generator Networks
//!
//! The recurrent encoder reads a postprocessed reconstruction and returns
//! its final state; the recurrent decoder reads one-hot characters from that
//! state and scores the next character.

use std::path::Path;

use candle_core::{D, DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};

use crate::{
    errors::TVResult,
    nn::{
        Activation,
        Dense,
        Gru,
        GruDropout,
        Noise,
        dump_weights,
        initialize_varmap,
        load_weights,
        nonzero_step_mask,
    },
};

/// GRU input dropout rate.
pub const GRU_INPUT_DROPOUT: f32 = 0.5;

/// GRU recurrent dropout rate.
pub const GRU_RECURRENT_DROPOUT: f32 = 0.3;

fn sample_dropout(
    noise: Option<&mut Noise>,
    batch: usize,
    gru: &Gru,
) -> TVResult<GruDropout> {
    match noise {
        Some(noise) => GruDropout::sample(
            noise,
            batch,
            gru.input_dim(),
            gru.hidden_size(),
            GRU_INPUT_DROPOUT,
            GRU_RECURRENT_DROPOUT,
        ),
        None => Ok(GruDropout::none()),
    }
}

/// Re-weights time steps by a learned softmax over the time axis, averaged
/// over feature channels.
#[derive(Debug, Clone)]
struct TimeAttention {
    dense: Dense,
}

impl TimeAttention {
    fn new(
        text_size: usize,
        vb: VarBuilder,
    ) -> TVResult<Self> {
        Ok(Self {
            dense: Dense::new(text_size, text_size, false, Activation::Linear, vb)?,
        })
    }

    fn forward(
        &self,
        x: &Tensor,
    ) -> TVResult<Tensor> {
        // (batch, features, time)
        let per_feature = self.dense.forward(&x.transpose(1, 2)?.contiguous()?)?;
        let weights = candle_nn::ops::softmax(&per_feature, D::Minus1)?.mean(1)?;
        Ok(x.broadcast_mul(&weights.unsqueeze(2)?)?)
    }
}

/// The recurrent encoder of the character generator.
pub struct GeneratorEncoder {
    varmap: VarMap,
    attention: Option<TimeAttention>,
    gru: Gru,
}

impl GeneratorEncoder {
    /// Build a freshly initialized encoder.
    ///
    /// ## Arguments
    /// * `text_size` - the reconstruction time steps.
    /// * `input_width` - the reconstruction row width.
    /// * `hidden` - recurrent units.
    /// * `use_attention` - add time attention before the GRU.
    /// * `seed` - the initialization seed.
    /// * `device` - the tensor device.
    pub fn new(
        text_size: usize,
        input_width: usize,
        hidden: usize,
        use_attention: bool,
        seed: u64,
        device: &Device,
    ) -> TVResult<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let attention = if use_attention {
            Some(TimeAttention::new(text_size, vb.pp("attention"))?)
        } else {
            None
        };
        let gru = Gru::new(input_width, hidden, vb.pp("gru"))?;
        initialize_varmap(&varmap, seed)?;
        Ok(Self {
            varmap,
            attention,
            gru,
        })
    }

    /// The variables.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Encode `(batch, time, width)` into a `(batch, hidden)` state.
    ///
    /// All-zero steps are masked.
    pub fn forward(
        &self,
        x: &Tensor,
        noise: Option<&mut Noise>,
    ) -> TVResult<Tensor> {
        let x = match &self.attention {
            Some(attention) => attention.forward(x)?,
            None => x.clone(),
        };
        let mask = nonzero_step_mask(&x)?;
        let dropout = sample_dropout(noise, x.dim(0)?, &self.gru)?;
        let (_, state) = self.gru.forward(&x, None, Some(&mask), &dropout)?;
        Ok(state)
    }

    /// Serialize the weights.
    pub fn dump(&self) -> TVResult<Vec<u8>> {
        dump_weights(&self.varmap)
    }

    /// Overwrite the weights from a blob.
    pub fn load(
        &mut self,
        bytes: &[u8],
    ) -> TVResult<()> {
        load_weights(&mut self.varmap, bytes)
    }

    pub(crate) fn save_to(
        &self,
        path: &Path,
    ) -> TVResult<()> {
        Ok(self.varmap.save(path)?)
    }

    pub(crate) fn load_from(
        &mut self,
        path: &Path,
    ) -> TVResult<()> {
        Ok(self.varmap.load(path)?)
    }
}

/// The recurrent character decoder.
pub struct GeneratorDecoder {
    varmap: VarMap,
    gru: Gru,
    output: Dense,
}

impl GeneratorDecoder {
    /// Build a freshly initialized decoder.
    ///
    /// ## Arguments
    /// * `n_chars` - the alphabet size.
    /// * `hidden` - recurrent units.
    /// * `seed` - the initialization seed.
    /// * `device` - the tensor device.
    pub fn new(
        n_chars: usize,
        hidden: usize,
        seed: u64,
        device: &Device,
    ) -> TVResult<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let gru = Gru::new(n_chars, hidden, vb.pp("gru"))?;
        let output = Dense::new(hidden, n_chars, true, Activation::Linear, vb.pp("output"))?;
        initialize_varmap(&varmap, seed)?;
        Ok(Self {
            varmap,
            gru,
            output,
        })
    }

    /// The variables.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// The alphabet size.
    pub fn n_chars(&self) -> usize {
        self.gru.input_dim()
    }

    /// Teacher-forced character logits.
    ///
    /// ## Arguments
    /// * `x` - `(batch, steps, n_chars)` one-hot inputs; zero rows are masked.
    /// * `state` - `(batch, hidden)` initial state.
    /// * `noise` - dropout noise; `None` runs in inference mode.
    ///
    /// ## Returns
    /// `(batch, steps, n_chars)` logits.
    pub fn forward(
        &self,
        x: &Tensor,
        state: &Tensor,
        noise: Option<&mut Noise>,
    ) -> TVResult<Tensor> {
        let mask = nonzero_step_mask(x)?;
        let dropout = sample_dropout(noise, x.dim(0)?, &self.gru)?;
        let (outputs, _) = self.gru.forward(x, Some(state), Some(&mask), &dropout)?;
        self.output.forward(&outputs)
    }

    /// One greedy step.
    ///
    /// ## Arguments
    /// * `x` - `(batch, n_chars)` one-hot inputs.
    /// * `state` - `(batch, hidden)` state.
    ///
    /// ## Returns
    /// `(probabilities, next_state)`.
    pub fn step(
        &self,
        x: &Tensor,
        state: &Tensor,
    ) -> TVResult<(Tensor, Tensor)> {
        let state = self.gru.step(x, state)?;
        let probs = candle_nn::ops::softmax(&self.output.forward(&state)?, D::Minus1)?;
        Ok((probs, state))
    }

    /// Serialize the weights.
    pub fn dump(&self) -> TVResult<Vec<u8>> {
        dump_weights(&self.varmap)
    }

    /// Overwrite the weights from a blob.
    pub fn load(
        &mut self,
        bytes: &[u8],
    ) -> TVResult<()> {
        load_weights(&mut self.varmap, bytes)
    }

    pub(crate) fn save_to(
        &self,
        path: &Path,
    ) -> TVResult<()> {
        Ok(self.varmap.save(path)?)
    }

    pub(crate) fn load_from(
        &mut self,
        path: &Path,
    ) -> TVResult<()> {
        Ok(self.varmap.load(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoder_state_shapes() {
        for use_attention in [false, true] {
            let encoder = GeneratorEncoder::new(4, 3, 5, use_attention, 0, &Device::Cpu).unwrap();
            let x = Tensor::rand(0.0f32, 1.0, (2, 4, 3), &Device::Cpu).unwrap();
            assert_eq!(encoder.forward(&x, None).unwrap().dims2().unwrap(), (2, 5));

            let mut noise = Noise::new(0, &Device::Cpu);
            assert_eq!(
                encoder.forward(&x, Some(&mut noise)).unwrap().dims2().unwrap(),
                (2, 5)
            );
        }
    }

    #[test]
    fn test_decoder_shapes() {
        let decoder = GeneratorDecoder::new(6, 5, 0, &Device::Cpu).unwrap();
        let state = decoder.gru.zero_state(2, &Device::Cpu).unwrap();
        let x = Tensor::zeros((2, 7, 6), DType::F32, &Device::Cpu).unwrap();
        assert_eq!(
            decoder.forward(&x, &state, None).unwrap().dims3().unwrap(),
            (2, 7, 6)
        );

        let x = Tensor::zeros((2, 6), DType::F32, &Device::Cpu).unwrap();
        let (probs, next) = decoder.step(&x, &state).unwrap();
        assert_eq!(probs.dims2().unwrap(), (2, 6));
        assert_eq!(next.dims2().unwrap(), (2, 5));
        let total = probs.sum(1).unwrap().to_vec1::<f32>().unwrap();
        assert!(total.iter().all(|t| (t - 1.0).abs() < 1e-5));
    }
}
