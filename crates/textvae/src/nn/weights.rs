//! # Weight Blobs
//!
//! Each sub-network's variables round-trip through a safetensors file in a
//! scoped temporary directory. The directory is removed on every exit path.

use std::fs;

use candle_nn::VarMap;
use tempdir::TempDir;

use crate::errors::{TVResult, TextVaeError};

const BLOB_FILE: &str = "weights.safetensors";

/// Serialize every variable of a map to bytes.
pub fn dump_weights(varmap: &VarMap) -> TVResult<Vec<u8>> {
    let dir = TempDir::new("textvae-weights")?;
    let path = dir.path().join(BLOB_FILE);
    varmap.save(&path)?;
    Ok(fs::read(&path)?)
}

/// Overwrite the variables of a map from bytes.
///
/// ## Errors
/// [`TextVaeError::State`] if the blob is unreadable or does not match the
/// map's variable names and shapes.
pub fn load_weights(
    varmap: &mut VarMap,
    bytes: &[u8],
) -> TVResult<()> {
    let dir = TempDir::new("textvae-weights")?;
    let path = dir.path().join(BLOB_FILE);
    fs::write(&path, bytes)?;
    varmap
        .load(&path)
        .map_err(|err| TextVaeError::state(format!("weights do not fit the network: {err}")))
}

#[cfg(test)]
mod tests {
    use candle_core::{DType, Device, Tensor};
    use candle_nn::{Module, VarBuilder};

    use super::*;
    use crate::nn::initialize_varmap;

    fn dense(
        seed: u64,
        out_dim: usize,
    ) -> (VarMap, candle_nn::Linear) {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let linear = candle_nn::linear(3, out_dim, vb.pp("dense")).unwrap();
        initialize_varmap(&varmap, seed).unwrap();
        (varmap, linear)
    }

    #[test]
    fn test_round_trip_is_exact() {
        let (source, source_layer) = dense(1, 2);
        let (mut target, target_layer) = dense(2, 2);

        let x = Tensor::new(&[[1.0f32, 2.0, 3.0]], &Device::Cpu).unwrap();
        let expected = source_layer.forward(&x).unwrap().to_vec2::<f32>().unwrap();
        assert_ne!(
            target_layer.forward(&x).unwrap().to_vec2::<f32>().unwrap(),
            expected
        );

        let blob = dump_weights(&source).unwrap();
        load_weights(&mut target, &blob).unwrap();
        assert_eq!(
            target_layer.forward(&x).unwrap().to_vec2::<f32>().unwrap(),
            expected
        );
    }

    #[test]
    fn test_mismatched_blob_is_a_state_error() {
        let (source, _) = dense(1, 2);
        let (mut target, _) = dense(1, 4);
        let blob = dump_weights(&source).unwrap();
        assert!(matches!(
            load_weights(&mut target, &blob),
            Err(TextVaeError::State(_))
        ));
        assert!(matches!(
            load_weights(&mut target, b"not a safetensors file"),
            Err(TextVaeError::State(_))
        ));
    }
}
