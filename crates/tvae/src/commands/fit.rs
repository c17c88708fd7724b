use std::sync::Arc;

use textvae::{
    estimator::{TextVae, TextVaeOptions},
    text::RegexTokenizer,
    vae::ReconstructionLoss,
};

use crate::{
    embedding_args::EmbeddingArgs,
    input_output::read_text_file,
    logging::{CommandVerbosity, LogArgs},
};

/// Hyperparameter flags; unset flags keep the base options.
#[derive(clap::Args, Debug)]
pub struct HyperparameterArgs {
    /// Filter count of each convolution stage, comma separated.
    #[arg(long, value_delimiter = ',')]
    n_filters: Option<Vec<usize>>,

    /// Convolution kernel size.
    #[arg(long)]
    kernel_size: Option<usize>,

    /// Latent vector size.
    #[arg(long)]
    latent_dim: Option<usize>,

    /// Recurrent units of the character generator.
    #[arg(long)]
    n_recurrent_units: Option<usize>,

    /// Encoder time steps.
    #[arg(long)]
    input_text_size: Option<usize>,

    /// Decoder time steps.
    #[arg(long)]
    output_text_size: Option<usize>,

    /// Training batch size.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Epoch cap of each training phase.
    #[arg(long)]
    max_epochs: Option<usize>,

    /// Initial learning rate.
    #[arg(long)]
    lr: Option<f64>,

    /// Share of pairs held out for validation.
    #[arg(long)]
    validation_fraction: Option<f64>,

    /// Normalize after each convolution.
    #[arg(long)]
    batch_norm: bool,

    /// Drop the time attention of the generator encoder.
    #[arg(long)]
    no_attention: bool,

    /// Output vocabulary budget.
    #[arg(long)]
    output_onehot_size: Option<usize>,

    /// Reconstruction objective: `soft_nearest_vocabulary` or `direct_cosine`.
    #[arg(long)]
    loss: Option<ReconstructionLoss>,

    /// Candidate words per position on the word resolver path.
    #[arg(long)]
    n_variants: Option<usize>,

    /// Random seed.
    #[arg(long)]
    seed: Option<u64>,
}

impl HyperparameterArgs {
    /// Apply the set flags to `base`.
    pub fn apply(
        &self,
        base: TextVaeOptions,
    ) -> TextVaeOptions {
        let mut options = base;
        if let Some(n_filters) = &self.n_filters {
            options.n_filters = n_filters.clone();
        }
        if let Some(kernel_size) = self.kernel_size {
            options.kernel_size = kernel_size;
        }
        if let Some(latent_dim) = self.latent_dim {
            options.latent_dim = latent_dim;
        }
        if let Some(units) = self.n_recurrent_units {
            options.n_recurrent_units = units;
        }
        if self.input_text_size.is_some() {
            options.input_text_size = self.input_text_size;
        }
        if self.output_text_size.is_some() {
            options.output_text_size = self.output_text_size;
        }
        if let Some(batch_size) = self.batch_size {
            options.batch_size = batch_size;
        }
        if let Some(max_epochs) = self.max_epochs {
            options.max_epochs = max_epochs;
        }
        if let Some(lr) = self.lr {
            options.lr = lr;
        }
        if let Some(fraction) = self.validation_fraction {
            options.validation_fraction = fraction;
        }
        if self.batch_norm {
            options.use_batch_norm = true;
        }
        if self.no_attention {
            options.use_attention = false;
        }
        if self.output_onehot_size.is_some() {
            options.output_onehot_size = self.output_onehot_size;
        }
        if let Some(loss) = self.loss {
            options.loss = loss;
        }
        if let Some(n_variants) = self.n_variants {
            options.n_variants = n_variants;
        }
        if let Some(seed) = self.seed {
            options.seed = seed;
        }
        options
    }
}

/// Args for the fit command.
#[derive(clap::Args, Debug)]
pub struct FitArgs {
    /// Input texts, one per line.
    #[arg(long)]
    input: String,

    /// Target texts, parallel to the inputs; defaults to the inputs.
    #[arg(long)]
    targets: Option<String>,

    #[command(flatten)]
    embeddings: EmbeddingArgs,

    /// Where to write the fitted state.
    #[arg(long)]
    state: String,

    /// Continue training from a saved state.
    #[arg(long)]
    warm_start: Option<String>,

    /// Special symbols the tokenizer keeps whole; repeatable.
    #[arg(long = "special")]
    specials: Vec<String>,

    #[command(flatten)]
    hyperparameters: HyperparameterArgs,

    #[clap(flatten)]
    pub logging: LogArgs,
}

impl FitArgs {
    /// Fit and save.
    pub fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.logging.setup_logging(CommandVerbosity::Training)?;

        let mut vae = match &self.warm_start {
            Some(path) => {
                let vae = self.embeddings.load_estimator(path)?;
                let options = self.hyperparameters.apply(vae.options().clone());
                vae.with_options(options.with_warm_start(true))
            }
            None => {
                let tokenizer = Arc::new(RegexTokenizer::new(&self.specials)?);
                let options = self.hyperparameters.apply(TextVaeOptions::default());
                let vae =
                    TextVae::new(tokenizer, self.embeddings.load_input()?).with_options(options);
                match self.embeddings.load_output()? {
                    Some(output) => vae.with_output_embeddings(output),
                    None => vae,
                }
            }
        };

        log::info!("Reading inputs: {}", self.input);
        let inputs = read_text_file(&self.input)?;
        let targets = match &self.targets {
            Some(path) => {
                log::info!("Reading targets: {path}");
                Some(read_text_file(path)?)
            }
            None => None,
        };

        let report = vae.fit(&inputs, targets.as_ref())?;
        for (idx, phase) in report.vae.iter().enumerate() {
            log::info!(
                "VAE phase {idx}: {} epochs, best validation loss {:?}",
                phase.history.len(),
                phase.best_validation
            );
        }
        if let Some(phase) = &report.generator {
            log::info!(
                "Generator: {} epochs, best validation loss {:?}",
                phase.history.len(),
                phase.best_validation
            );
        }

        log::info!("Writing state: {}", self.state);
        vae.save_state(&self.state)?;

        Ok(())
    }
}
