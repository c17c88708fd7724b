//! # Estimator Options

use serde::{Deserialize, Serialize};

use crate::{
    errors::{TVResult, TextVaeError},
    vae::ReconstructionLoss,
};

/// Hyperparameters of a [`crate::estimator::TextVae`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextVaeOptions {
    /// Filter count of each convolution stage.
    pub n_filters: Vec<usize>,

    /// The convolution kernel size.
    pub kernel_size: usize,

    /// The latent vector size.
    pub latent_dim: usize,

    /// Recurrent units of the character generator.
    pub n_recurrent_units: usize,

    /// Encoder time steps; `None` uses the longest input text.
    pub input_text_size: Option<usize>,

    /// Decoder time steps; `None` uses the longest target text.
    pub output_text_size: Option<usize>,

    /// The training batch size.
    pub batch_size: usize,

    /// The epoch cap of each training phase.
    pub max_epochs: usize,

    /// The initial learning rate.
    pub lr: f64,

    /// The share of pairs held out for validation.
    pub validation_fraction: f64,

    /// Normalize after each convolution.
    pub use_batch_norm: bool,

    /// Add time attention in front of the generator encoder.
    pub use_attention: bool,

    /// The output vocabulary budget; larger vocabularies are quantized.
    pub output_onehot_size: Option<usize>,

    /// Continue from the current fit, freezing the encoder first.
    pub warm_start: bool,

    /// The reconstruction objective.
    pub loss: ReconstructionLoss,

    /// Candidate words per position on the word resolver path.
    pub n_variants: usize,

    /// Seeds initialization, shuffling, dropout, and sampling.
    pub seed: u64,
}

impl Default for TextVaeOptions {
    fn default() -> Self {
        Self {
            n_filters: vec![128],
            kernel_size: 3,
            latent_dim: 5,
            n_recurrent_units: 128,
            input_text_size: None,
            output_text_size: None,
            batch_size: 64,
            max_epochs: 100,
            lr: 0.001,
            validation_fraction: 0.2,
            use_batch_norm: false,
            use_attention: true,
            output_onehot_size: None,
            warm_start: false,
            loss: ReconstructionLoss::default(),
            n_variants: 3,
            seed: 0,
        }
    }
}

fn positive(
    name: &str,
    value: usize,
) -> TVResult<()> {
    if value == 0 {
        return Err(TextVaeError::configuration(format!(
            "`{name}` must be positive"
        )));
    }
    Ok(())
}

impl TextVaeOptions {
    /// Set the convolution filter counts.
    pub fn with_n_filters(
        self,
        n_filters: Vec<usize>,
    ) -> Self {
        Self { n_filters, ..self }
    }

    /// Set the kernel size.
    pub fn with_kernel_size(
        self,
        kernel_size: usize,
    ) -> Self {
        Self {
            kernel_size,
            ..self
        }
    }

    /// Set the latent size.
    pub fn with_latent_dim(
        self,
        latent_dim: usize,
    ) -> Self {
        Self { latent_dim, ..self }
    }

    /// Set the generator's recurrent units.
    pub fn with_n_recurrent_units(
        self,
        n_recurrent_units: usize,
    ) -> Self {
        Self {
            n_recurrent_units,
            ..self
        }
    }

    /// Fix the encoder time steps.
    pub fn with_input_text_size(
        self,
        input_text_size: Option<usize>,
    ) -> Self {
        Self {
            input_text_size,
            ..self
        }
    }

    /// Fix the decoder time steps.
    pub fn with_output_text_size(
        self,
        output_text_size: Option<usize>,
    ) -> Self {
        Self {
            output_text_size,
            ..self
        }
    }

    /// Set the batch size.
    pub fn with_batch_size(
        self,
        batch_size: usize,
    ) -> Self {
        Self { batch_size, ..self }
    }

    /// Set the epoch cap.
    pub fn with_max_epochs(
        self,
        max_epochs: usize,
    ) -> Self {
        Self { max_epochs, ..self }
    }

    /// Set the learning rate.
    pub fn with_lr(
        self,
        lr: f64,
    ) -> Self {
        Self { lr, ..self }
    }

    /// Set the validation share.
    pub fn with_validation_fraction(
        self,
        validation_fraction: f64,
    ) -> Self {
        Self {
            validation_fraction,
            ..self
        }
    }

    /// Toggle batch normalization.
    pub fn with_batch_norm(
        self,
        use_batch_norm: bool,
    ) -> Self {
        Self {
            use_batch_norm,
            ..self
        }
    }

    /// Toggle generator attention.
    pub fn with_attention(
        self,
        use_attention: bool,
    ) -> Self {
        Self {
            use_attention,
            ..self
        }
    }

    /// Set the output vocabulary budget.
    pub fn with_output_onehot_size(
        self,
        output_onehot_size: Option<usize>,
    ) -> Self {
        Self {
            output_onehot_size,
            ..self
        }
    }

    /// Toggle warm starts.
    pub fn with_warm_start(
        self,
        warm_start: bool,
    ) -> Self {
        Self { warm_start, ..self }
    }

    /// Set the reconstruction objective.
    pub fn with_loss(
        self,
        loss: ReconstructionLoss,
    ) -> Self {
        Self { loss, ..self }
    }

    /// Set the candidate words per position.
    pub fn with_n_variants(
        self,
        n_variants: usize,
    ) -> Self {
        Self { n_variants, ..self }
    }

    /// Set the seed.
    pub fn with_seed(
        self,
        seed: u64,
    ) -> Self {
        Self { seed, ..self }
    }

    /// Check every hyperparameter.
    ///
    /// ## Errors
    /// [`TextVaeError::Configuration`] naming the first bad value.
    pub fn validate(&self) -> TVResult<()> {
        positive("batch_size", self.batch_size)?;
        positive("max_epochs", self.max_epochs)?;
        positive("latent_dim", self.latent_dim)?;
        positive("n_recurrent_units", self.n_recurrent_units)?;
        positive("kernel_size", self.kernel_size)?;
        positive("n_variants", self.n_variants)?;

        if self.n_filters.is_empty() {
            return Err(TextVaeError::configuration("`n_filters` must not be empty"));
        }
        for &filters in &self.n_filters {
            positive("n_filters", filters)?;
        }
        if let Some(size) = self.input_text_size {
            positive("input_text_size", size)?;
        }
        if let Some(size) = self.output_text_size {
            positive("output_text_size", size)?;
        }
        if let Some(size) = self.output_onehot_size {
            positive("output_onehot_size", size)?;
        }

        if !(self.validation_fraction > 0.0 && self.validation_fraction < 1.0) {
            return Err(TextVaeError::configuration(format!(
                "`validation_fraction` must be in (0, 1), got {}",
                self.validation_fraction
            )));
        }
        if !(self.lr.is_finite() && self.lr > 0.0) {
            return Err(TextVaeError::configuration(format!(
                "`lr` must be positive and finite, got {}",
                self.lr
            )));
        }
        Ok(())
    }

    /// The encoder hyperparameters that differ from `fitted`'s.
    ///
    /// A warm start carries encoder weights over, so these must all match.
    pub fn encoder_changes(
        &self,
        fitted: &TextVaeOptions,
    ) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.n_filters != fitted.n_filters {
            changed.push("n_filters");
        }
        if self.kernel_size != fitted.kernel_size {
            changed.push("kernel_size");
        }
        if self.latent_dim != fitted.latent_dim {
            changed.push("latent_dim");
        }
        if self.use_batch_norm != fitted.use_batch_norm {
            changed.push("use_batch_norm");
        }
        changed
    }
}
