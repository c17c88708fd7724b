//! # Vector Math Helpers
//!
//! Small host-side helpers shared by the vocabulary, the word resolver,
//! and the reconstructed-vector postprocessing.

use num_traits::Float;

/// Norm threshold below which a vector is treated as zero.
pub const NORM_EPSILON: f32 = 1e-7;

/// Dot product of two equal-length slices.
pub fn dot<F: Float>(
    a: &[F],
    b: &[F],
) -> F {
    a.iter()
        .zip(b.iter())
        .fold(F::zero(), |acc, (&x, &y)| acc + x * y)
}

/// Euclidean norm.
pub fn l2_norm<F: Float>(v: &[F]) -> F {
    dot(v, v).sqrt()
}

/// Scale `v` to unit length in place.
///
/// ## Returns
/// The original norm; vectors with norm below `epsilon` are left unchanged.
pub fn normalize_in_place<F: Float>(
    v: &mut [F],
    epsilon: F,
) -> F {
    let norm = l2_norm(v);
    if norm >= epsilon {
        for x in v.iter_mut() {
            *x = *x / norm;
        }
    }
    norm
}

/// Cosine distance, `1 - cos(a, b)`.
///
/// A zero vector has distance `1` to everything.
pub fn cosine_distance<F: Float>(
    a: &[F],
    b: &[F],
) -> F {
    let denom = l2_norm(a) * l2_norm(b);
    if denom <= F::zero() {
        return F::one();
    }
    F::one() - dot(a, b) / denom
}

/// Index of the first maximal element.
///
/// ## Returns
/// `None` for an empty slice.
pub fn argmax<F: Float>(v: &[F]) -> Option<usize> {
    let mut best: Option<(usize, F)> = None;
    for (idx, &x) in v.iter().enumerate() {
        match best {
            Some((_, b)) if x <= b => {}
            _ => best = Some((idx, x)),
        }
    }
    best.map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        let mut v = vec![3.0f32, 4.0];
        let norm = normalize_in_place(&mut v, NORM_EPSILON);
        assert_eq!(norm, 5.0);
        assert!((l2_norm(&v) - 1.0).abs() < 1e-6);

        let mut z = vec![0.0f32, 0.0];
        normalize_in_place(&mut z, NORM_EPSILON);
        assert_eq!(z, vec![0.0, 0.0]);
    }

    #[test]
    fn test_cosine_distance() {
        assert!(cosine_distance(&[1.0f32, 0.0], &[1.0, 0.0]).abs() < 1e-6);
        assert!((cosine_distance(&[1.0f32, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_distance(&[1.0f32, 0.0], &[-2.0, 0.0]) - 2.0).abs() < 1e-6);
        assert_eq!(cosine_distance(&[0.0f32, 0.0], &[1.0, 0.0]), 1.0);
    }

    #[test]
    fn test_argmax_first_wins() {
        assert_eq!(argmax(&[1.0f32, 3.0, 3.0, 2.0]), Some(1));
        assert_eq!(argmax::<f32>(&[]), None);
    }
}
