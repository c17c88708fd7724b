//! # Reconstruction Losses
//!
//! Both losses take decoder output `(batch, time, width)` and the latent
//! moments, and return a scalar.

use candle_core::{D, Tensor};
use serde::{Deserialize, Serialize};

use crate::{errors::TVResult, nn::l2_normalize_last, vae::LatentMoments};

/// Inverse temperature of the soft nearest-vocabulary projection.
pub const INVERSE_TEMPERATURE: f64 = 10.0;

/// KL weight of the direct cosine loss.
pub const COSINE_KL_WEIGHT: f64 = 5e-4;

/// The reconstruction objective; also picks the inference path.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReconstructionLoss {
    /// Cross-entropy over a softmax against every vocabulary row, minus the
    /// KL term. Texts are generated by the character generator.
    #[default]
    SoftNearestVocabulary,

    /// `1 - cos` against the target rows, minus `5e-4` times the KL term.
    /// Texts are resolved word by word against the output embeddings.
    DirectCosine,
}

/// Targets of one batch.
#[derive(Debug, Clone)]
pub struct ReconstructionTargets {
    /// `(batch, time)` vocabulary row per step, `u32`.
    pub rows: Tensor,

    /// `(batch, time)` loss mask.
    pub mask: Tensor,

    /// `(batch, time, width)` target row vectors.
    pub vectors: Tensor,
}

/// The soft nearest-vocabulary loss.
///
/// Each normalized output is scored against every (unit or one-hot)
/// vocabulary row; the masked cross-entropy against the target row is
/// averaged per sample, and the KL term is subtracted.
///
/// ## Arguments
/// * `output` - decoder output.
/// * `vocabulary_t` - `(width, n_rows)` transposed vocabulary matrix.
/// * `targets` - the batch targets.
/// * `moments` - the latent moments.
pub fn soft_nearest_vocabulary_loss(
    output: &Tensor,
    vocabulary_t: &Tensor,
    targets: &ReconstructionTargets,
    moments: &LatentMoments,
) -> TVResult<Tensor> {
    let (b, t, w) = output.dims3()?;
    let normalized = l2_normalize_last(output)?.reshape((b * t, w))?;
    let logits = normalized
        .matmul(vocabulary_t)?
        .affine(INVERSE_TEMPERATURE, 0.0)?;
    let log_probs = candle_nn::ops::log_softmax(&logits, D::Minus1)?;
    let picked = log_probs
        .gather(&targets.rows.reshape((b * t, 1))?, 1)?
        .reshape((b, t))?;

    let xent = picked
        .neg()?
        .mul(&targets.mask)?
        .sum(1)?
        .div(&targets.mask.sum(1)?)?;
    Ok(xent.sub(&moments.kl_term()?)?.mean_all()?)
}

/// The direct cosine loss.
///
/// ## Arguments
/// * `output` - decoder output.
/// * `targets` - the batch targets.
/// * `moments` - the latent moments.
pub fn direct_cosine_loss(
    output: &Tensor,
    targets: &ReconstructionTargets,
    moments: &LatentMoments,
) -> TVResult<Tensor> {
    let cos = l2_normalize_last(output)?
        .mul(&l2_normalize_last(&targets.vectors)?)?
        .sum(D::Minus1)?;
    let reconstruction = cos.affine(-1.0, 1.0)?.mean_all()?;
    let kl = moments.kl_term()?.mean_all()?.affine(COSINE_KL_WEIGHT, 0.0)?;
    Ok(reconstruction.sub(&kl)?)
}

impl ReconstructionLoss {
    /// Evaluate this loss.
    pub fn evaluate(
        &self,
        output: &Tensor,
        vocabulary_t: &Tensor,
        targets: &ReconstructionTargets,
        moments: &LatentMoments,
    ) -> TVResult<Tensor> {
        match self {
            ReconstructionLoss::SoftNearestVocabulary => {
                soft_nearest_vocabulary_loss(output, vocabulary_t, targets, moments)
            }
            ReconstructionLoss::DirectCosine => direct_cosine_loss(output, targets, moments),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use candle_core::{DType, Device};

    use super::*;

    fn zero_moments(batch: usize) -> LatentMoments {
        let zeros = Tensor::zeros((batch, 2), DType::F32, &Device::Cpu).unwrap();
        LatentMoments {
            mean: zeros.clone(),
            log_var: zeros,
        }
    }

    fn targets(
        rows: &[u32],
        mask: &[f32],
        vectors: Vec<f32>,
        width: usize,
    ) -> ReconstructionTargets {
        let t = rows.len();
        ReconstructionTargets {
            rows: Tensor::from_slice(rows, (1, t), &Device::Cpu).unwrap(),
            mask: Tensor::from_slice(mask, (1, t), &Device::Cpu).unwrap(),
            vectors: Tensor::from_vec(vectors, (1, t, width), &Device::Cpu).unwrap(),
        }
    }

    #[test]
    fn test_names() {
        assert_eq!(
            ReconstructionLoss::SoftNearestVocabulary.to_string(),
            "soft_nearest_vocabulary"
        );
        assert_eq!(
            ReconstructionLoss::from_str("direct_cosine").unwrap(),
            ReconstructionLoss::DirectCosine
        );
    }

    #[test]
    fn test_soft_nearest_vocabulary_loss() {
        // Two orthogonal rows.
        let vocabulary_t = Tensor::new(&[[1.0f32, 0.0], [0.0, 1.0]], &Device::Cpu).unwrap();
        let output = Tensor::new(&[[[2.0f32, 0.0], [0.0, 5.0], [9.0, 9.0]]], &Device::Cpu).unwrap();
        let targets = targets(&[0, 1, 0], &[1.0, 1.0, 0.0], vec![0.0; 6], 2);

        let loss = soft_nearest_vocabulary_loss(&output, &vocabulary_t, &targets, &zero_moments(1))
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();
        // Masked step 2 is ignored; steps 0 and 1 each cost log(1 + e^-10).
        let expected = (1.0f32 + (-10.0f32).exp()).ln();
        assert!((loss - expected).abs() < 1e-5);
    }

    #[test]
    fn test_direct_cosine_loss() {
        let output = Tensor::new(&[[[2.0f32, 0.0], [0.0, -1.0]]], &Device::Cpu).unwrap();
        let targets = targets(&[0, 0], &[1.0, 1.0], vec![1.0, 0.0, 0.0, 1.0], 2);

        let loss = direct_cosine_loss(&output, &targets, &zero_moments(1))
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();
        // Costs 0 and 2.
        assert!((loss - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_kl_sign() {
        let vocabulary_t = Tensor::new(&[[1.0f32], [0.0]], &Device::Cpu).unwrap();
        let output = Tensor::new(&[[[1.0f32, 0.0]]], &Device::Cpu).unwrap();
        let targets = targets(&[0], &[1.0], vec![1.0, 0.0], 2);

        let moments = LatentMoments {
            mean: Tensor::new(&[[1.0f32, 1.0]], &Device::Cpu).unwrap(),
            log_var: Tensor::zeros((1, 2), DType::F32, &Device::Cpu).unwrap(),
        };
        // kl_term = mean(1 + 0 - 1 - 1) = -1, subtracted.
        let loss = soft_nearest_vocabulary_loss(&output, &vocabulary_t, &targets, &moments)
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();
        assert!((loss - 1.0).abs() < 1e-5);

        let loss = direct_cosine_loss(&output, &targets, &moments)
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();
        assert!((loss - 5e-4).abs() < 1e-6);
    }
}
