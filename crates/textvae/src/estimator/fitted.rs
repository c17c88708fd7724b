//! # Fitted Networks
//!
//! The trained network bundle of an estimator. The bundle owns every
//! parameter buffer; dropping it releases them.

use candle_core::{Device, Tensor};

use crate::{
    embeddings::EmbeddingLookup,
    errors::{TVResult, TextVaeError},
    estimator::{PersistedState, TextVaeOptions, WeightBlobs, decode_blob, encode_blob},
    generator::{CharAlphabet, GeneratorDecoder, GeneratorEncoder, GreedyDecoder},
    inference::{WordResolver, find_best_texts},
    text::TokenizedText,
    types::Matrix,
    vae::{ReconstructionLoss, VaeArchitecture, VaeDecoder, VaeEncoder, postprocess_batch},
    vectorize::{EmbeddingEncoder, PaddingMode, SequenceVectorizer},
    vocab::vector_width,
};

/// The sizes fixed by a fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FittedSizes {
    pub input_text_size: usize,
    pub output_text_size: usize,
    pub input_vector_size: usize,
    pub output_vector_size: usize,
    pub max_chars: usize,
}

impl FittedSizes {
    pub fn architecture(
        &self,
        options: &TextVaeOptions,
    ) -> VaeArchitecture {
        VaeArchitecture {
            n_filters: options.n_filters.clone(),
            kernel_size: options.kernel_size,
            latent_dim: options.latent_dim,
            use_batch_norm: options.use_batch_norm,
            input_text_size: self.input_text_size,
            output_text_size: self.output_text_size,
            input_vector_size: self.input_vector_size,
            output_vector_size: self.output_vector_size,
        }
    }

    /// The generator encoder's row width: the decoder width minus the end column.
    pub fn generator_input_width(&self) -> usize {
        self.output_vector_size - 1
    }
}

/// The character generator and its alphabet.
pub(crate) struct FittedGenerator {
    pub alphabet: CharAlphabet,
    pub encoder: GeneratorEncoder,
    pub decoder: GeneratorDecoder,
}

/// A fitted network bundle.
pub(crate) struct FittedModel {
    /// The options the networks were fitted with.
    pub options: TextVaeOptions,
    pub sizes: FittedSizes,
    pub special_symbols: Vec<String>,
    pub encoder: VaeEncoder,
    pub decoder: VaeDecoder,
    pub generator: Option<FittedGenerator>,
    pub resolver: WordResolver,
}

impl FittedModel {
    /// Encoder input for a batch of texts.
    pub fn input_tensor(
        &self,
        embeddings: &dyn EmbeddingLookup,
        texts: &[&TokenizedText],
        device: &Device,
    ) -> TVResult<Tensor> {
        let encoder = EmbeddingEncoder::new(embeddings, &self.special_symbols);
        let vectorizer =
            SequenceVectorizer::new(&encoder, self.sizes.input_text_size, PaddingMode::Indicator);
        Ok(Tensor::from_vec(
            vectorizer.vectorize_batch(texts),
            (texts.len(), vectorizer.length(), vectorizer.width()),
            device,
        )?)
    }

    /// `(batch, latent_dim)` latent means.
    pub fn latent_means(
        &self,
        inputs: &Tensor,
    ) -> TVResult<Tensor> {
        Ok(self.encoder.forward(inputs, None)?.mean)
    }

    /// `(batch, output_text_size, output_vector_size)` decoded latent means.
    pub fn reconstruct(
        &self,
        inputs: &Tensor,
    ) -> TVResult<Tensor> {
        self.decoder.forward(&self.latent_means(inputs)?, None)
    }

    /// Greedily generate one text per raw reconstruction.
    pub fn generate(
        &self,
        raw: &Tensor,
    ) -> TVResult<Vec<String>> {
        let generator = self.generator.as_ref().ok_or_else(|| {
            TextVaeError::state("this estimator was fitted without a character generator")
        })?;
        let states = generator
            .encoder
            .forward(&postprocess_batch(raw)?, None)?;
        GreedyDecoder::new(&generator.decoder, &generator.alphabet, self.sizes.max_chars)
            .generate(&states)
    }

    /// Resolve raw reconstructions word by word into ranked texts.
    ///
    /// ## Arguments
    /// * `raw` - `(batch, time, width)` reconstructions.
    /// * `n_candidates` - candidate words per position.
    /// * `ntop` - texts per reconstruction.
    pub fn resolve(
        &self,
        raw: &Tensor,
        n_candidates: usize,
        ntop: usize,
    ) -> TVResult<Vec<Vec<String>>> {
        let (_, time, width) = raw.dims3()?;
        raw.to_vec3::<f32>()?
            .into_iter()
            .map(|rows| {
                let rows = Matrix::from_vec(time, width, rows.concat())
                    .ok_or_else(|| TextVaeError::data("ragged reconstruction"))?;
                let positions = self.resolver.resolve_sequence(&rows, n_candidates);
                Ok(find_best_texts(&positions, ntop))
            })
            .collect()
    }

    /// Snapshot into a persisted record.
    pub fn to_state(&self) -> TVResult<PersistedState> {
        let (alphabet, generator_encoder, generator_decoder) = match &self.generator {
            Some(generator) => (
                generator.alphabet.chars().to_vec(),
                Some(encode_blob(&generator.encoder.dump()?)),
                Some(encode_blob(&generator.decoder.dump()?)),
            ),
            None => (Vec::new(), None, None),
        };
        Ok(PersistedState {
            options: self.options.clone(),
            input_text_size: self.sizes.input_text_size,
            output_text_size: self.sizes.output_text_size,
            input_vector_size: self.sizes.input_vector_size,
            output_vector_size: self.sizes.output_vector_size,
            output_text_size_in_characters: self.sizes.max_chars,
            special_symbols: self.special_symbols.clone(),
            alphabet,
            output_words: self.resolver.words().to_vec(),
            weights: WeightBlobs {
                vae_encoder: encode_blob(&self.encoder.dump()?),
                vae_decoder: encode_blob(&self.decoder.dump()?),
                generator_encoder,
                generator_decoder,
            },
        })
    }

    /// Rebuild from a persisted record.
    ///
    /// ## Arguments
    /// * `state` - the record.
    /// * `input_embeddings` - the encoder's embeddings.
    /// * `output_embeddings` - the word resolver's embeddings.
    /// * `device` - the tensor device.
    ///
    /// ## Errors
    /// [`TextVaeError::State`] when the record is inconsistent with itself
    /// or with the embeddings.
    pub fn from_state(
        state: &PersistedState,
        input_embeddings: &dyn EmbeddingLookup,
        output_embeddings: &dyn EmbeddingLookup,
        device: &Device,
    ) -> TVResult<Self> {
        let options = &state.options;
        options
            .validate()
            .map_err(|err| TextVaeError::state(format!("persisted options: {err}")))?;

        let n_specials = state.special_symbols.len();
        let expected_input = vector_width(input_embeddings.dimension(), n_specials);
        if state.input_vector_size != expected_input {
            return Err(TextVaeError::state(format!(
                "input embeddings give rows of width {expected_input}, the state expects {}",
                state.input_vector_size
            )));
        }
        let expected_output = vector_width(output_embeddings.dimension(), n_specials);
        if state.output_vector_size != expected_output {
            return Err(TextVaeError::state(format!(
                "output embeddings give rows of width {expected_output}, the state expects {}",
                state.output_vector_size
            )));
        }

        let sizes = FittedSizes {
            input_text_size: state.input_text_size,
            output_text_size: state.output_text_size,
            input_vector_size: state.input_vector_size,
            output_vector_size: state.output_vector_size,
            max_chars: state.output_text_size_in_characters,
        };
        let arch = sizes.architecture(options);
        if arch.encoded_len() == 0 {
            return Err(TextVaeError::state(format!(
                "`input_text_size` {} is too short for the convolution stages",
                sizes.input_text_size
            )));
        }

        let weights = &state.weights;
        let mut encoder = VaeEncoder::new(&arch, false, 0, device)?;
        encoder.load(&decode_blob("vae_encoder", &weights.vae_encoder)?)?;
        let mut decoder = VaeDecoder::new(&arch, 0, device)?;
        decoder.load(&decode_blob("vae_decoder", &weights.vae_decoder)?)?;

        let generator = match options.loss {
            ReconstructionLoss::DirectCosine => None,
            ReconstructionLoss::SoftNearestVocabulary => {
                let alphabet = CharAlphabet::from_chars(state.alphabet.clone())?;
                let mut encoder = GeneratorEncoder::new(
                    sizes.output_text_size,
                    sizes.generator_input_width(),
                    options.n_recurrent_units,
                    options.use_attention,
                    0,
                    device,
                )?;
                encoder.load(&decode_blob(
                    "generator_encoder",
                    WeightBlobs::required("generator_encoder", &weights.generator_encoder)?,
                )?)?;
                let mut decoder =
                    GeneratorDecoder::new(alphabet.len(), options.n_recurrent_units, 0, device)?;
                decoder.load(&decode_blob(
                    "generator_decoder",
                    WeightBlobs::required("generator_decoder", &weights.generator_decoder)?,
                )?)?;
                Some(FittedGenerator {
                    alphabet,
                    encoder,
                    decoder,
                })
            }
        };

        Ok(Self {
            options: options.clone(),
            sizes,
            special_symbols: state.special_symbols.clone(),
            encoder,
            decoder,
            generator,
            resolver: WordResolver::new(
                output_embeddings,
                &state.output_words,
                &state.special_symbols,
            ),
        })
    }
}
