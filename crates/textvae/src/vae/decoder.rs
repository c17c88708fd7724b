//! # VAE Decoder
//!
//! Mirrors the encoder: a dense projection reshaped to
//! `(decoder_steps, decoder_width)`, transposed convolution blocks with
//! upsampling in reverse filter order, a crop (or pad) to the output length,
//! and a final linear "same" convolution to the output row width.

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};

use crate::{
    errors::TVResult,
    nn::{
        Activation,
        Conv1d,
        ConvPadding,
        Dense,
        Noise,
        dump_weights,
        fit_time_axis,
        initialize_varmap,
        load_weights,
        upsample2,
    },
    vae::{ConvBlock, VaeArchitecture},
};

/// Dropout rate on the latent input of the decoder.
pub const DECODER_DROPOUT: f32 = 0.3;

/// The transposed-convolution decoder.
pub struct VaeDecoder {
    varmap: VarMap,
    dense: Dense,
    blocks: Vec<ConvBlock>,
    output: Conv1d,
    steps: usize,
    width: usize,
    output_text_size: usize,
}

impl VaeDecoder {
    /// Build a freshly initialized decoder.
    pub fn new(
        arch: &VaeArchitecture,
        seed: u64,
        device: &Device,
    ) -> TVResult<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);

        let steps = arch.decoder_steps();
        let width = arch.decoder_width();
        let dense = Dense::new(
            arch.latent_dim,
            steps * width,
            true,
            Activation::Relu,
            vb.pp("dense"),
        )?;

        let mut blocks = Vec::with_capacity(arch.n_stages());
        let mut channels = width;
        for (idx, &filters) in arch.n_filters.iter().rev().enumerate() {
            blocks.push(ConvBlock::new(
                channels,
                filters,
                arch.kernel_size,
                ConvPadding::Full,
                arch.use_batch_norm,
                vb.pp(format!("block_{idx}")),
            )?);
            channels = filters;
        }
        let output = Conv1d::new(
            channels,
            arch.output_vector_size,
            arch.kernel_size,
            ConvPadding::Same,
            Activation::Linear,
            vb.pp("output"),
        )?;

        initialize_varmap(&varmap, seed)?;
        Ok(Self {
            varmap,
            dense,
            blocks,
            output,
            steps,
            width,
            output_text_size: arch.output_text_size,
        })
    }

    /// The variables.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Decode `(batch, latent)` into `(batch, output_text_size, width)`.
    ///
    /// ## Arguments
    /// * `z` - latent vectors.
    /// * `noise` - dropout noise; `None` runs in inference mode.
    pub fn forward(
        &self,
        z: &Tensor,
        noise: Option<&mut Noise>,
    ) -> TVResult<Tensor> {
        let train = noise.is_some();
        let z = match noise {
            Some(noise) => noise.dropout(z, DECODER_DROPOUT)?,
            None => z.clone(),
        };
        let batch = z.dim(0)?;
        let mut h = self
            .dense
            .forward(&z)?
            .reshape((batch, self.steps, self.width))?;
        for block in &self.blocks {
            h = upsample2(&block.forward(&h, train)?)?;
        }
        let h = fit_time_axis(&h, self.output_text_size)?;
        self.output.forward(&h)
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
    fn test_decode_shapes() {
        for (n_filters, output_text_size) in [(vec![6], 7), (vec![6, 4], 7), (vec![8, 6, 4], 3)] {
            let arch = VaeArchitecture {
                n_filters,
                kernel_size: 3,
                latent_dim: 2,
                use_batch_norm: true,
                input_text_size: 30,
                output_text_size,
                input_vector_size: 5,
                output_vector_size: 6,
            };
            let decoder = VaeDecoder::new(&arch, 0, &Device::Cpu).unwrap();
            let z = Tensor::rand(0.0f32, 1.0, (3, 2), &Device::Cpu).unwrap();

            let y = decoder.forward(&z, None).unwrap();
            assert_eq!(y.dims3().unwrap(), (3, output_text_size, 6));

            let mut noise = Noise::new(0, &Device::Cpu);
            let y = decoder.forward(&z, Some(&mut noise)).unwrap();
            assert_eq!(y.dims3().unwrap(), (3, output_text_size, 6));
        }
    }
}
