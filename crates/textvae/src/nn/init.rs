//! # Deterministic Initialization

use candle_core::Tensor;
use candle_nn::VarMap;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::errors::TVResult;

/// Re-initialize every variable of a map from `seed`.
///
/// Variables are visited in name order:
/// * `*weight` - Glorot uniform over `(fan_out, fan_in)`;
/// * `*gamma`, `*running_var` - ones;
/// * everything else - zeros.
pub fn initialize_varmap(
    varmap: &VarMap,
    seed: u64,
) -> TVResult<()> {
    let data = varmap
        .data()
        .lock()
        .map_err(|_| candle_core::Error::Msg("variable map lock poisoned".to_string()))?;

    let mut names = data.keys().cloned().collect::<Vec<_>>();
    names.sort();

    let mut rng = StdRng::seed_from_u64(seed);
    for name in names {
        let Some(var) = data.get(&name) else {
            continue;
        };
        let shape = var.shape().clone();
        let device = var.device().clone();
        let value = if name.ends_with("weight") {
            let dims = shape.dims();
            let fan_out = dims.first().copied().unwrap_or(1);
            let fan_in = dims.get(1).copied().unwrap_or(1);
            let limit = (6.0 / (fan_in + fan_out).max(1) as f32).sqrt();
            let values = (0..shape.elem_count())
                .map(|_| rng.random_range(-limit..=limit))
                .collect::<Vec<f32>>();
            Tensor::from_vec(values, shape, &device)?
        } else if name.ends_with("gamma") || name.ends_with("running_var") {
            Tensor::ones(shape, var.dtype(), &device)?
        } else {
            Tensor::zeros(shape, var.dtype(), &device)?
        };
        var.set(&value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use candle_core::{DType, Device};
    use candle_nn::VarBuilder;

    use super::*;
    use crate::nn::BatchNorm1d;

    fn build(seed: u64) -> VarMap {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        candle_nn::linear(4, 3, vb.pp("dense")).unwrap();
        BatchNorm1d::new(3, vb.pp("bn")).unwrap();
        initialize_varmap(&varmap, seed).unwrap();
        varmap
    }

    fn values(
        varmap: &VarMap,
        name: &str,
    ) -> Vec<f32> {
        let data = varmap.data().lock().unwrap();
        data[name].as_tensor().flatten_all().unwrap().to_vec1().unwrap()
    }

    #[test]
    fn test_initialization_is_seeded() {
        let a = build(7);
        let b = build(7);
        let c = build(8);
        assert_eq!(values(&a, "dense.weight"), values(&b, "dense.weight"));
        assert_ne!(values(&a, "dense.weight"), values(&c, "dense.weight"));

        let limit = (6.0f32 / 7.0).sqrt();
        assert!(values(&a, "dense.weight").iter().all(|w| w.abs() <= limit));
        assert_eq!(values(&a, "dense.bias"), vec![0.0; 3]);
        assert_eq!(values(&a, "bn.gamma"), vec![1.0; 3]);
        assert_eq!(values(&a, "bn.running_var"), vec![1.0; 3]);
        assert_eq!(values(&a, "bn.running_mean"), vec![0.0; 3]);
    }
}
