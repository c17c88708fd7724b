//! # Seeded Noise
//!
//! Reparameterization noise and dropout masks are drawn on the host from a
//! seeded [`StdRng`] and uploaded, so a given seed always yields the same
//! tensors.

use candle_core::{Device, Shape, Tensor};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, StandardNormal};

use crate::errors::TVResult;

/// Mix a base seed with stream coordinates into a derived seed.
///
/// ## Arguments
/// * `seed` - the base seed.
/// * `parts` - stream coordinates, e.g. `(phase, epoch, batch)`.
pub fn derive_seed(
    seed: u64,
    parts: &[u64],
) -> u64 {
    // splitmix64 over each coordinate.
    let mut state = seed;
    for &part in parts {
        state = state.wrapping_add(part).wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        state = z ^ (z >> 31);
    }
    state
}

/// A seeded source of training noise.
pub struct Noise {
    rng: StdRng,
    device: Device,
}

impl Noise {
    /// Create a noise source.
    pub fn new(
        seed: u64,
        device: &Device,
    ) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            device: device.clone(),
        }
    }

    /// A tensor of independent standard normal samples.
    pub fn standard_normal<S: Into<Shape>>(
        &mut self,
        shape: S,
    ) -> TVResult<Tensor> {
        let shape = shape.into();
        let data = (0..shape.elem_count())
            .map(|_| StandardNormal.sample(&mut self.rng))
            .collect::<Vec<f32>>();
        Ok(Tensor::from_vec(data, shape, &self.device)?)
    }

    /// An inverted-dropout mask: `0` with probability `rate`, else `1 / (1 - rate)`.
    pub fn dropout_mask<S: Into<Shape>>(
        &mut self,
        shape: S,
        rate: f32,
    ) -> TVResult<Tensor> {
        let shape = shape.into();
        let keep = 1.0 - rate;
        let scale = if keep > 0.0 { 1.0 / keep } else { 0.0 };
        let data = (0..shape.elem_count())
            .map(|_| {
                if self.rng.random::<f32>() < rate {
                    0.0
                } else {
                    scale
                }
            })
            .collect::<Vec<f32>>();
        Ok(Tensor::from_vec(data, shape, &self.device)?)
    }

    /// Apply inverted dropout to `x`.
    pub fn dropout(
        &mut self,
        x: &Tensor,
        rate: f32,
    ) -> TVResult<Tensor> {
        let mask = self.dropout_mask(x.shape().clone(), rate)?;
        Ok(x.mul(&mask)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_seed() {
        assert_eq!(derive_seed(1, &[2, 3]), derive_seed(1, &[2, 3]));
        assert_ne!(derive_seed(1, &[2, 3]), derive_seed(1, &[3, 2]));
        assert_ne!(derive_seed(1, &[2]), derive_seed(2, &[2]));
    }

    #[test]
    fn test_noise_is_reproducible() {
        let device = Device::Cpu;
        let a = Noise::new(5, &device)
            .standard_normal((3, 4))
            .unwrap()
            .to_vec2::<f32>()
            .unwrap();
        let b = Noise::new(5, &device)
            .standard_normal((3, 4))
            .unwrap()
            .to_vec2::<f32>()
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_dropout_mask_values() {
        let device = Device::Cpu;
        let mask = Noise::new(1, &device)
            .dropout_mask((1000,), 0.5)
            .unwrap()
            .to_vec1::<f32>()
            .unwrap();
        assert!(mask.iter().all(|&m| m == 0.0 || m == 2.0));
        let dropped = mask.iter().filter(|&&m| m == 0.0).count();
        assert!(dropped > 400 && dropped < 600);
    }
}
