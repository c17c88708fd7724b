//! # Text VAE Estimator
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use textvae::{
//!     embeddings::InMemoryEmbeddings,
//!     estimator::{TextVae, TextVaeOptions},
//!     text::RegexTokenizer,
//! };
//!
//! # fn main() -> textvae::errors::TVResult<()> {
//! let embeddings = Arc::new(InMemoryEmbeddings::load_word2vec("vectors.txt")?);
//! let mut vae = TextVae::new(Arc::new(RegexTokenizer::default()), embeddings)
//!     .with_options(TextVaeOptions::default().with_max_epochs(20));
//!
//! let texts = vec!["a short text", "another short text", "and one more"];
//! vae.fit(&texts, None)?;
//! let latents = vae.transform(&texts)?;
//! let generated = vae.predict(&texts)?;
//! # Ok(())
//! # }
//! ```

use std::{path::Path, sync::Arc};

use candle_core::{Device, Tensor};

use crate::{
    embeddings::EmbeddingLookup,
    errors::{TVResult, TextVaeError},
    estimator::{FitContext, FitReport, FittedModel, PersistedState, TextCollection, TextVaeOptions},
    text::{Tokenizer, tokenize_all},
    types::LatentVector,
};

/// A convolutional text VAE with a character generator.
///
/// Texts are encoded with `input_embeddings`; reconstructions are scored
/// and resolved against `output_embeddings` (the input embeddings unless
/// set).
pub struct TextVae {
    tokenizer: Arc<dyn Tokenizer>,
    input_embeddings: Arc<dyn EmbeddingLookup>,
    output_embeddings: Option<Arc<dyn EmbeddingLookup>>,
    options: TextVaeOptions,
    fitted: Option<FittedModel>,
    device: Device,
}

impl TextVae {
    /// Create an unfitted estimator with default options.
    ///
    /// ## Arguments
    /// * `tokenizer` - word-boundary segmentation.
    /// * `input_embeddings` - the input word vectors.
    pub fn new(
        tokenizer: Arc<dyn Tokenizer>,
        input_embeddings: Arc<dyn EmbeddingLookup>,
    ) -> Self {
        Self {
            tokenizer,
            input_embeddings,
            output_embeddings: None,
            options: TextVaeOptions::default(),
            fitted: None,
            device: Device::Cpu,
        }
    }

    /// Set the options.
    pub fn with_options(
        self,
        options: TextVaeOptions,
    ) -> Self {
        Self { options, ..self }
    }

    /// Set distinct output embeddings.
    pub fn with_output_embeddings(
        self,
        output_embeddings: Arc<dyn EmbeddingLookup>,
    ) -> Self {
        Self {
            output_embeddings: Some(output_embeddings),
            ..self
        }
    }

    /// The options.
    pub fn options(&self) -> &TextVaeOptions {
        &self.options
    }

    /// Replace the options; the current fit is kept for warm starts.
    ///
    /// The fitted networks keep the options they were fitted with; those
    /// are the ones [`TextVae::to_state`] records.
    pub fn set_options(
        &mut self,
        options: TextVaeOptions,
    ) {
        self.options = options;
    }

    /// Has a fit succeeded?
    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    fn output_embeddings(&self) -> &dyn EmbeddingLookup {
        match &self.output_embeddings {
            Some(embeddings) => embeddings.as_ref(),
            None => self.input_embeddings.as_ref(),
        }
    }

    fn fitted(&self) -> TVResult<&FittedModel> {
        self.fitted.as_ref().ok_or(TextVaeError::NotFitted)
    }

    /// Fit on input texts and optional targets.
    ///
    /// Without targets the model learns to reconstruct its inputs. The
    /// last `round(n * validation_fraction)` pairs are held out for
    /// validation. On any error the previous fit is left untouched.
    ///
    /// ## Arguments
    /// * `inputs` - the input texts.
    /// * `targets` - the target texts, parallel to `inputs`.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub fn fit<C: TextCollection + ?Sized>(
        &mut self,
        inputs: &C,
        targets: Option<&C>,
    ) -> TVResult<FitReport> {
        self.options.validate()?;
        let inputs = inputs.texts();
        let targets = match targets {
            Some(targets) => targets.texts(),
            None => inputs.clone(),
        };

        let context = FitContext {
            tokenizer: self.tokenizer.as_ref(),
            input_embeddings: self.input_embeddings.as_ref(),
            output_embeddings: self.output_embeddings(),
            options: &self.options,
            device: &self.device,
        };
        let (fitted, report) = context.fit(&inputs, &targets, self.fitted.as_ref())?;
        self.fitted = Some(fitted);
        Ok(report)
    }

    /// Fit, then encode the inputs.
    pub fn fit_transform<C: TextCollection + ?Sized>(
        &mut self,
        inputs: &C,
        targets: Option<&C>,
    ) -> TVResult<Vec<LatentVector>> {
        self.fit(inputs, targets)?;
        self.transform(inputs)
    }

    /// Fit, then generate from the inputs.
    pub fn fit_predict<C: TextCollection + ?Sized>(
        &mut self,
        inputs: &C,
        targets: Option<&C>,
    ) -> TVResult<C::Generated> {
        self.fit(inputs, targets)?;
        self.predict(inputs)
    }

    /// Run `f` over the encoder inputs of `texts`, one batch at a time.
    fn map_batches<T, F>(
        &self,
        texts: &[&str],
        mut f: F,
    ) -> TVResult<Vec<T>>
    where
        F: FnMut(&FittedModel, &Tensor) -> TVResult<Vec<T>>,
    {
        self.options.validate()?;
        let fitted = self.fitted()?;
        let tokens = tokenize_all(self.tokenizer.as_ref(), texts);

        let mut outputs = Vec::with_capacity(texts.len());
        for (idx, chunk) in tokens.chunks(self.options.batch_size).enumerate() {
            let chunk = chunk.iter().collect::<Vec<_>>();
            let inputs = fitted.input_tensor(self.input_embeddings.as_ref(), &chunk, &self.device)?;
            outputs.extend(f(fitted, &inputs)?);
            log::debug!(
                "{:.0}% of texts are processed...",
                100.0 * ((idx + 1) * self.options.batch_size).min(texts.len()) as f32
                    / texts.len() as f32
            );
        }
        Ok(outputs)
    }

    /// Encode texts to their latent means.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub fn transform<C: TextCollection + ?Sized>(
        &self,
        inputs: &C,
    ) -> TVResult<Vec<LatentVector>> {
        self.map_batches(&inputs.texts(), |fitted, x| {
            Ok(fitted.latent_means(x)?.to_vec2::<f32>()?)
        })
    }

    /// Raw decoder output per text: `output_text_size` rows of
    /// `output_vector_size` values.
    pub fn reconstruct<C: TextCollection + ?Sized>(
        &self,
        inputs: &C,
    ) -> TVResult<Vec<Vec<Vec<f32>>>> {
        self.map_batches(&inputs.texts(), |fitted, x| {
            Ok(fitted.reconstruct(x)?.to_vec3::<f32>()?)
        })
    }

    /// Generate one text per input, shaped like the input collection.
    ///
    /// With [`crate::vae::ReconstructionLoss::SoftNearestVocabulary`] the
    /// character generator writes the text; with
    /// [`crate::vae::ReconstructionLoss::DirectCosine`] the text is the best
    /// word-by-word resolution.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub fn predict<C: TextCollection + ?Sized>(
        &self,
        inputs: &C,
    ) -> TVResult<C::Generated> {
        let n_candidates = self.options.n_variants;
        let generated = self.map_batches(&inputs.texts(), |fitted, x| {
            let raw = fitted.reconstruct(x)?;
            if fitted.generator.is_some() {
                return fitted.generate(&raw);
            }
            Ok(fitted
                .resolve(&raw, n_candidates, 1)?
                .into_iter()
                .map(|mut texts| texts.swap_remove(0))
                .collect())
        })?;
        inputs.collect_generated(generated)
    }

    /// Rank up to `ntop` word-by-word resolutions per input.
    ///
    /// ## Returns
    /// Per input, the most confident text first.
    pub fn predict_variants<C: TextCollection + ?Sized>(
        &self,
        inputs: &C,
        ntop: usize,
    ) -> TVResult<Vec<Vec<String>>> {
        let n_candidates = self.options.n_variants;
        self.map_batches(&inputs.texts(), |fitted, x| {
            fitted.resolve(&fitted.reconstruct(x)?, n_candidates, ntop)
        })
    }

    /// Snapshot the fit.
    pub fn to_state(&self) -> TVResult<PersistedState> {
        self.fitted()?.to_state()
    }

    /// Rebuild a fitted estimator.
    ///
    /// ## Arguments
    /// * `tokenizer` - the tokenizer the state was fitted with.
    /// * `input_embeddings` - the input word vectors.
    /// * `output_embeddings` - distinct output word vectors, if any.
    /// * `state` - the persisted record.
    pub fn from_state(
        tokenizer: Arc<dyn Tokenizer>,
        input_embeddings: Arc<dyn EmbeddingLookup>,
        output_embeddings: Option<Arc<dyn EmbeddingLookup>>,
        state: &PersistedState,
    ) -> TVResult<Self> {
        let mut vae = Self::new(tokenizer, input_embeddings).with_options(state.options.clone());
        vae.output_embeddings = output_embeddings;
        let fitted = FittedModel::from_state(
            state,
            vae.input_embeddings.as_ref(),
            vae.output_embeddings(),
            &vae.device,
        )?;
        vae.fitted = Some(fitted);
        Ok(vae)
    }

    /// Save the fit as JSON.
    pub fn save_state<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> TVResult<()> {
        self.to_state()?.save(path)
    }

    /// Load a fit saved by [`TextVae::save_state`].
    pub fn load_state<P: AsRef<Path>>(
        tokenizer: Arc<dyn Tokenizer>,
        input_embeddings: Arc<dyn EmbeddingLookup>,
        output_embeddings: Option<Arc<dyn EmbeddingLookup>>,
        path: P,
    ) -> TVResult<Self> {
        let state = PersistedState::load(path)?;
        Self::from_state(tokenizer, input_embeddings, output_embeddings, &state)
    }
}
