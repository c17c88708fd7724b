//! # Optimization
//!
//! Adam steps with global-norm gradient clipping.

use candle_core::{Tensor, Var, backprop::GradStore};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarMap};

use crate::{errors::TVResult, nn::RUNNING_STAT_SUFFIXES};

/// The default global gradient-norm bound.
pub const DEFAULT_CLIP_NORM: f64 = 10.0;

/// The trainable variables of a map, in name order.
///
/// Batch-norm running statistics are excluded.
pub fn trainable_vars(varmap: &VarMap) -> TVResult<Vec<Var>> {
    let data = varmap
        .data()
        .lock()
        .map_err(|_| candle_core::Error::Msg("variable map lock poisoned".to_string()))?;
    let mut named = data
        .iter()
        .filter(|(name, _)| {
            !RUNNING_STAT_SUFFIXES
                .iter()
                .any(|suffix| name.ends_with(suffix))
        })
        .map(|(name, var)| (name.clone(), var.clone()))
        .collect::<Vec<_>>();
    named.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(named.into_iter().map(|(_, var)| var).collect())
}

/// Scale gradients so their joint L2 norm is at most `max_norm`.
///
/// ## Returns
/// The norm before clipping.
pub fn clip_grad_norm(
    grads: &mut GradStore,
    vars: &[Var],
    max_norm: f64,
) -> TVResult<f64> {
    let mut total = 0.0f64;
    for var in vars {
        if let Some(grad) = grads.get(var.as_tensor()) {
            total += grad.sqr()?.sum_all()?.to_scalar::<f32>()? as f64;
        }
    }
    let norm = total.sqrt();
    if norm > max_norm {
        let scale = max_norm / norm;
        for var in vars {
            let Some(grad) = grads.get(var.as_tensor()) else {
                continue;
            };
            let clipped = grad.affine(scale, 0.0)?;
            grads.insert(var.as_tensor(), clipped);
        }
    }
    Ok(norm)
}

/// An Adam optimizer over a fixed variable set.
pub struct Trainer {
    optimizer: AdamW,
    vars: Vec<Var>,
    clip_norm: f64,
}

impl Trainer {
    /// Create a trainer.
    ///
    /// ## Arguments
    /// * `vars` - the variables to update.
    /// * `lr` - the initial learning rate.
    pub fn new(
        vars: Vec<Var>,
        lr: f64,
    ) -> TVResult<Self> {
        let params = ParamsAdamW {
            lr,
            weight_decay: 0.0,
            ..Default::default()
        };
        Ok(Self {
            optimizer: AdamW::new(vars.clone(), params)?,
            vars,
            clip_norm: DEFAULT_CLIP_NORM,
        })
    }

    /// Set the clipping bound.
    pub fn with_clip_norm(
        self,
        clip_norm: f64,
    ) -> Self {
        Self { clip_norm, ..self }
    }

    /// Backpropagate a scalar loss and take one step.
    ///
    /// ## Returns
    /// The loss value.
    pub fn step(
        &mut self,
        loss: &Tensor,
    ) -> TVResult<f32> {
        let value = loss.to_scalar::<f32>()?;
        let mut grads = loss.backward()?;
        clip_grad_norm(&mut grads, &self.vars, self.clip_norm)?;
        self.optimizer.step(&grads)?;
        Ok(value)
    }

    /// The current learning rate.
    pub fn learning_rate(&self) -> f64 {
        self.optimizer.learning_rate()
    }

    /// Change the learning rate.
    pub fn set_learning_rate(
        &mut self,
        lr: f64,
    ) {
        self.optimizer.set_learning_rate(lr)
    }
}
