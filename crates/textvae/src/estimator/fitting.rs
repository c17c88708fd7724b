//! # Fitting
//!
//! One fit runs up to three phases on a fixed validation split:
//!
//! 1. warm starts only: the VAE decoder against a frozen copy of the
//!    previous encoder;
//! 2. the full VAE;
//! 3. the character generator, on reconstructions from the VAE
//!    (skipped for [`ReconstructionLoss::DirectCosine`]).

use candle_core::Device;

use crate::{
    embeddings::EmbeddingLookup,
    errors::{TVResult, TextVaeError},
    estimator::{FittedGenerator, FittedModel, FittedSizes, TextVaeOptions},
    generator::{
        CHAR_BOUND_SLACK,
        CharAlphabet,
        GeneratorBatches,
        GeneratorDecoder,
        GeneratorEncoder,
        GeneratorTask,
        Reconstructor,
    },
    inference::WordResolver,
    nn::{TrainingReport, TrainingSchedule, derive_seed},
    text::{TokenizedText, Tokenizer, text_characters, tokenize_all},
    vae::{ReconstructionLoss, VaeArchitecture, VaeBatches, VaeDecoder, VaeEncoder, VaeTask},
    vectorize::EmbeddingEncoder,
    vocab::{Vocabulary, VocabularyBuilder, vector_width},
};

const PHASE_FROZEN_VAE: u64 = 0;
const PHASE_VAE: u64 = 1;
const PHASE_GENERATOR: u64 = 2;

const SEED_VAE_ENCODER: u64 = 10;
const SEED_VAE_DECODER: u64 = 11;
const SEED_GENERATOR_ENCODER: u64 = 12;
const SEED_GENERATOR_DECODER: u64 = 13;
const SEED_GENERATOR_TRAIN: u64 = 14;
const SEED_GENERATOR_VALIDATION: u64 = 15;

/// Loss histories of one fit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FitReport {
    /// The VAE phases, in order; two on warm starts.
    pub vae: Vec<TrainingReport>,

    /// The generator phase.
    pub generator: Option<TrainingReport>,
}

/// The number of pairs held out for validation.
///
/// ## Arguments
/// * `n` - the number of pairs.
/// * `fraction` - the validation share.
///
/// ## Errors
/// [`TextVaeError::Data`] unless both splits are non-empty.
pub fn validation_split(
    n: usize,
    fraction: f64,
) -> TVResult<usize> {
    let n_eval = (n as f64 * fraction).round() as usize;
    if n_eval < 1 {
        return Err(TextVaeError::data(
            "`validation_fraction` is too small: no pairs are left for validation",
        ));
    }
    if n_eval >= n {
        return Err(TextVaeError::data(
            "`validation_fraction` is too large: no pairs are left for training",
        ));
    }
    Ok(n_eval)
}

/// The collaborators of a fit.
pub(crate) struct FitContext<'a> {
    pub tokenizer: &'a dyn Tokenizer,
    pub input_embeddings: &'a dyn EmbeddingLookup,
    pub output_embeddings: &'a dyn EmbeddingLookup,
    pub options: &'a TextVaeOptions,
    pub device: &'a Device,
}

/// A corpus split into training and validation parts.
struct Split<'a, T> {
    train: &'a [T],
    validation: &'a [T],
}

impl<'a, T> Split<'a, T> {
    fn new(
        items: &'a [T],
        n_eval: usize,
    ) -> Self {
        let (train, validation) = items.split_at(items.len() - n_eval);
        Self { train, validation }
    }
}

fn longest(texts: &[TokenizedText]) -> usize {
    texts.iter().map(TokenizedText::len).max().unwrap_or(0)
}

impl FitContext<'_> {
    /// The sorted special symbols of the tokenizer.
    fn special_symbols(&self) -> Vec<String> {
        let mut specials = self.tokenizer.special_symbols().to_vec();
        specials.sort();
        specials.dedup();
        specials
    }

    /// Fit a fresh bundle.
    ///
    /// Every data check runs before any training.
    ///
    /// ## Arguments
    /// * `inputs` - the input texts.
    /// * `targets` - the target texts, parallel to `inputs`.
    /// * `previous` - the current fit; required for warm starts.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub fn fit(
        &self,
        inputs: &[&str],
        targets: &[&str],
        previous: Option<&FittedModel>,
    ) -> TVResult<(FittedModel, FitReport)> {
        let options = self.options;
        let n = inputs.len();
        if n == 0 {
            return Err(TextVaeError::data("there are no texts to fit"));
        }
        if targets.len() != n {
            return Err(TextVaeError::data(format!(
                "{n} input texts but {} target texts",
                targets.len()
            )));
        }
        let n_eval = validation_split(n, options.validation_fraction)?;

        let special_symbols = self.special_symbols();
        let input_vector_size =
            vector_width(self.input_embeddings.dimension(), special_symbols.len());
        let previous = match (options.warm_start, previous) {
            (false, _) => None,
            (true, None) => return Err(TextVaeError::NotFitted),
            (true, Some(previous)) => {
                let changed = options.encoder_changes(&previous.options);
                if !changed.is_empty() {
                    return Err(TextVaeError::configuration(format!(
                        "a warm start cannot change the encoder: {} differ from the fit",
                        changed.join(", ")
                    )));
                }
                if previous.sizes.input_vector_size != input_vector_size {
                    return Err(TextVaeError::data(
                        "the input embeddings do not fit the network being warm started",
                    ));
                }
                Some(previous)
            }
        };

        let input_tokens = tokenize_all(self.tokenizer, inputs);
        let target_tokens = tokenize_all(self.tokenizer, targets);
        let max_target = longest(&target_tokens);
        if max_target == 0 {
            return Err(TextVaeError::data("all target texts are empty"));
        }
        let input_text_size = match previous {
            Some(previous) => previous.sizes.input_text_size,
            None => {
                let max_input = longest(&input_tokens);
                if max_input == 0 {
                    return Err(TextVaeError::data("all input texts are empty"));
                }
                let min_size = VaeArchitecture::min_input_text_size(
                    options.n_filters.len(),
                    options.kernel_size,
                );
                options.input_text_size.unwrap_or(max_input).max(min_size)
            }
        };

        let target_chars = targets
            .iter()
            .map(|text| text_characters(self.tokenizer, text))
            .collect::<Vec<_>>();
        let alphabet = CharAlphabet::from_texts(&target_chars);
        let max_chars = target_chars.iter().map(Vec::len).max().unwrap_or(0) + CHAR_BOUND_SLACK;

        log::info!("Building the output vocabulary...");
        let vocabulary = VocabularyBuilder::new(self.output_embeddings)
            .with_special_symbols(&special_symbols)
            .with_budget(options.output_onehot_size)
            .with_seed(options.seed)
            .build(&target_tokens);

        let sizes = FittedSizes {
            input_text_size,
            output_text_size: options.output_text_size.unwrap_or(max_target),
            input_vector_size,
            output_vector_size: vocabulary.vector_width(),
            max_chars,
        };
        log::info!(
            "Text sizes: {} input words, {} output words, {} output characters.",
            sizes.input_text_size,
            sizes.output_text_size,
            sizes.max_chars
        );

        let input_encoder = EmbeddingEncoder::new(self.input_embeddings, &special_symbols);
        let inputs = Split::new(&input_tokens, n_eval);
        let targets = Split::new(&target_tokens, n_eval);
        let schedule = TrainingSchedule::new(options.max_epochs, options.seed);

        let mut report = FitReport::default();
        let (encoder, decoder) = self.fit_vae(
            &sizes,
            &vocabulary,
            &input_encoder,
            &inputs,
            &targets,
            &schedule,
            previous.map(|p| &p.encoder),
            &mut report,
        )?;

        let generator = match options.loss {
            ReconstructionLoss::DirectCosine => None,
            ReconstructionLoss::SoftNearestVocabulary => {
                let (generator, generator_report) = self.fit_generator(
                    &sizes,
                    alphabet,
                    Reconstructor {
                        encoder: &encoder,
                        decoder: &decoder,
                    },
                    &input_encoder,
                    &inputs,
                    &Split::new(&target_chars, n_eval),
                    &schedule,
                )?;
                report.generator = Some(generator_report);
                Some(generator)
            }
        };

        let resolver = WordResolver::new(
            self.output_embeddings,
            &vocabulary.sorted_words(),
            &special_symbols,
        );
        Ok((
            FittedModel {
                options: options.clone(),
                sizes,
                special_symbols,
                encoder,
                decoder,
                generator,
                resolver,
            },
            report,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn fit_vae(
        &self,
        sizes: &FittedSizes,
        vocabulary: &Vocabulary,
        input_encoder: &EmbeddingEncoder<'_>,
        inputs: &Split<'_, TokenizedText>,
        targets: &Split<'_, TokenizedText>,
        schedule: &TrainingSchedule,
        previous: Option<&VaeEncoder>,
        report: &mut FitReport,
    ) -> TVResult<(VaeEncoder, VaeDecoder)> {
        let options = self.options;
        let device = self.device;
        let arch = sizes.architecture(options);
        let text_sizes = (sizes.input_text_size, sizes.output_text_size);
        let train = VaeBatches::new(
            input_encoder,
            vocabulary,
            inputs.train,
            targets.train,
            options.batch_size,
            text_sizes,
            device,
        );
        let validation = VaeBatches::new(
            input_encoder,
            vocabulary,
            inputs.validation,
            targets.validation,
            options.batch_size,
            text_sizes,
            device,
        );

        let encoder_seed = derive_seed(options.seed, &[SEED_VAE_ENCODER]);
        let mut decoder = VaeDecoder::new(
            &arch,
            derive_seed(options.seed, &[SEED_VAE_DECODER]),
            device,
        )?;

        let mut encoder = VaeEncoder::new(&arch, false, encoder_seed, device)?;
        if let Some(previous) = previous {
            let weights = previous.dump()?;
            let mut frozen = VaeEncoder::new(&arch, true, encoder_seed, device)?;
            frozen.load(&weights)?;

            log::info!("VAE training with a frozen encoder...");
            let mut task = VaeTask::new(
                frozen,
                decoder,
                options.loss,
                vocabulary,
                options.lr,
                device,
            )?;
            report.vae.push(schedule.run(
                PHASE_FROZEN_VAE,
                "vae (frozen encoder)",
                &mut task,
                &train,
                &validation,
            )?);
            let (frozen, trained) = task.into_parts();
            encoder.load(&frozen.dump()?)?;
            decoder = trained;
        }

        log::info!("VAE training...");
        let mut task = VaeTask::new(
            encoder,
            decoder,
            options.loss,
            vocabulary,
            options.lr,
            device,
        )?;
        report
            .vae
            .push(schedule.run(PHASE_VAE, "vae", &mut task, &train, &validation)?);
        Ok(task.into_parts())
    }

    #[allow(clippy::too_many_arguments)]
    fn fit_generator(
        &self,
        sizes: &FittedSizes,
        alphabet: CharAlphabet,
        reconstructor: Reconstructor<'_>,
        input_encoder: &EmbeddingEncoder<'_>,
        inputs: &Split<'_, TokenizedText>,
        targets: &Split<'_, Vec<char>>,
        schedule: &TrainingSchedule,
    ) -> TVResult<(FittedGenerator, TrainingReport)> {
        let options = self.options;
        let device = self.device;
        let text_sizes = (sizes.input_text_size, sizes.max_chars);
        let train = GeneratorBatches::new(
            input_encoder,
            reconstructor,
            &alphabet,
            inputs.train,
            targets.train,
            options.batch_size,
            text_sizes,
            derive_seed(options.seed, &[SEED_GENERATOR_TRAIN]),
            device,
        );
        let validation = GeneratorBatches::new(
            input_encoder,
            reconstructor,
            &alphabet,
            inputs.validation,
            targets.validation,
            options.batch_size,
            text_sizes,
            derive_seed(options.seed, &[SEED_GENERATOR_VALIDATION]),
            device,
        );

        let encoder = GeneratorEncoder::new(
            sizes.output_text_size,
            sizes.generator_input_width(),
            options.n_recurrent_units,
            options.use_attention,
            derive_seed(options.seed, &[SEED_GENERATOR_ENCODER]),
            device,
        )?;
        let decoder = GeneratorDecoder::new(
            alphabet.len(),
            options.n_recurrent_units,
            derive_seed(options.seed, &[SEED_GENERATOR_DECODER]),
            device,
        )?;

        log::info!("Generator training...");
        let mut task = GeneratorTask::new(encoder, decoder, options.lr)?;
        let report = schedule.run(PHASE_GENERATOR, "generator", &mut task, &train, &validation)?;
        let (encoder, decoder) = task.into_parts();
        Ok((
            FittedGenerator {
                alphabet,
                encoder,
                decoder,
            },
            report,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_split() {
        assert_eq!(validation_split(10, 0.3).unwrap(), 3);
        assert_eq!(validation_split(10, 0.2).unwrap(), 2);
        assert!(matches!(
            validation_split(10, 0.04),
            Err(TextVaeError::Data(_))
        ));
        assert!(matches!(
            validation_split(2, 0.8),
            Err(TextVaeError::Data(_))
        ));
    }

    #[test]
    fn test_split_takes_the_tail() {
        let items = [1, 2, 3, 4, 5];
        let split = Split::new(&items, 2);
        assert_eq!(split.train, &[1, 2, 3]);
        assert_eq!(split.validation, &[4, 5]);
    }
}
