//! # VAE Encoder
//!
//! Valid convolution blocks with pooling, a flattening dropout, and the two
//! latent projections.

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};

use crate::{
    errors::TVResult,
    nn::{Activation, ConvPadding, Dense, Noise, dump_weights, initialize_varmap, load_weights, max_pool2},
    vae::{ConvBlock, VaeArchitecture},
};

/// Dropout rate on the flattened encoder features.
pub const ENCODER_DROPOUT: f32 = 0.3;

/// Latent moments of a batch.
#[derive(Debug, Clone)]
pub struct LatentMoments {
    /// `(batch, latent)` means.
    pub mean: Tensor,

    /// `(batch, latent)` log-variances.
    pub log_var: Tensor,
}

impl LatentMoments {
    /// Draw `z = mean + exp(log_var) * eps`, `eps ~ N(0, 1)`.
    pub fn sample(
        &self,
        noise: &mut Noise,
    ) -> TVResult<Tensor> {
        let eps = noise.standard_normal(self.mean.shape().clone())?;
        Ok(self.mean.add(&self.log_var.exp()?.mul(&eps)?)?)
    }

    /// The per-sample term `mean(1 + log_var - mean^2 - exp(log_var))`.
    pub fn kl_term(&self) -> TVResult<Tensor> {
        Ok(self
            .log_var
            .affine(1.0, 1.0)?
            .sub(&self.mean.sqr()?)?
            .sub(&self.log_var.exp()?)?
            .mean(1)?)
    }
}

/// The convolutional encoder.
///
/// A frozen encoder keeps its batch norms in inference mode; the frozen /
/// trainable split is fixed at construction.
pub struct VaeEncoder {
    varmap: VarMap,
    blocks: Vec<ConvBlock>,
    z_mean: Dense,
    z_log_var: Dense,
    frozen: bool,
}

impl VaeEncoder {
    /// Build a freshly initialized encoder.
    ///
    /// ## Arguments
    /// * `arch` - the sizes.
    /// * `frozen` - exclude the encoder from training.
    /// * `seed` - the initialization seed.
    /// * `device` - the tensor device.
    pub fn new(
        arch: &VaeArchitecture,
        frozen: bool,
        seed: u64,
        device: &Device,
    ) -> TVResult<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);

        let mut blocks = Vec::with_capacity(arch.n_stages());
        let mut channels = arch.input_vector_size;
        for (idx, &filters) in arch.n_filters.iter().enumerate() {
            blocks.push(ConvBlock::new(
                channels,
                filters,
                arch.kernel_size,
                ConvPadding::Valid,
                arch.use_batch_norm,
                vb.pp(format!("block_{idx}")),
            )?);
            channels = filters;
        }
        let flat = arch.flat_size();
        let z_mean = Dense::new(flat, arch.latent_dim, true, Activation::Linear, vb.pp("z_mean"))?;
        let z_log_var = Dense::new(
            flat,
            arch.latent_dim,
            true,
            Activation::Linear,
            vb.pp("z_log_var"),
        )?;

        initialize_varmap(&varmap, seed)?;
        Ok(Self {
            varmap,
            blocks,
            z_mean,
            z_log_var,
            frozen,
        })
    }

    /// The variables.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Is the encoder excluded from training?
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Encode a `(batch, time, width)` batch.
    ///
    /// ## Arguments
    /// * `x` - the input rows.
    /// * `noise` - dropout noise; `None` runs in inference mode.
    pub fn forward(
        &self,
        x: &Tensor,
        noise: Option<&mut Noise>,
    ) -> TVResult<LatentMoments> {
        let train = noise.is_some() && !self.frozen;
        let mut h = x.clone();
        for block in &self.blocks {
            h = max_pool2(&block.forward(&h, train)?)?;
        }
        let mut h = h.flatten_from(1)?;
        if let Some(noise) = noise {
            h = noise.dropout(&h, ENCODER_DROPOUT)?;
        }
        Ok(LatentMoments {
            mean: self.z_mean.forward(&h)?,
            log_var: self.z_log_var.forward(&h)?,
        })
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
