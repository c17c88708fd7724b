//! # Reconstructed-Vector Postprocessing
//!
//! Turns raw decoder rows into the embedding-only sequence read by the
//! character generator.

use candle_core::Tensor;

use crate::{
    errors::TVResult,
    math::{NORM_EPSILON, argmax, normalize_in_place},
    types::Matrix,
};

/// The number of leading steps kept from a raw `(time, width)` decoding.
///
/// The first step whose arg-max is the end column (the last one) ends the
/// text; at least one step is kept. Without an end step, every step is kept.
pub fn retained_steps(raw: &Matrix) -> usize {
    let end_column = raw.cols().saturating_sub(1);
    raw.iter_rows()
        .position(|row| argmax(row) == Some(end_column))
        .map(|t| t.max(1))
        .unwrap_or(raw.rows())
}

/// Postprocess one raw decoding.
///
/// Kept steps drop the end column and are renormalized to unit length;
/// later steps are zero.
///
/// ## Returns
/// A `(time, width - 1)` matrix.
pub fn postprocess_reconstruction(raw: &Matrix) -> Matrix {
    let width = raw.cols().saturating_sub(1);
    let mut out = Matrix::zeros(raw.rows(), width);
    for t in 0..retained_steps(raw) {
        let row = out.row_mut(t);
        row.copy_from_slice(&raw.row(t)[..width]);
        normalize_in_place(row, NORM_EPSILON);
    }
    out
}

/// Postprocess a `(batch, time, width)` decoder output.
///
/// ## Returns
/// A `(batch, time, width - 1)` tensor on the same device.
pub fn postprocess_batch(raw: &Tensor) -> TVResult<Tensor> {
    let (b, t, w) = raw.dims3()?;
    let host = raw.flatten_all()?.to_vec1::<f32>()?;
    let mut data = Vec::with_capacity(b * t * w.saturating_sub(1));
    for sample in host.chunks_exact((t * w).max(1)).take(b) {
        if let Some(matrix) = Matrix::from_vec(t, w, sample.to_vec()) {
            data.extend(postprocess_reconstruction(&matrix).into_vec());
        }
    }
    Ok(Tensor::from_vec(
        data,
        (b, t, w.saturating_sub(1)),
        raw.device(),
    )?)
}
