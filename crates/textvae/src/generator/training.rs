//! # Generator Training
//!
//! Generator batches pair postprocessed VAE reconstructions of the inputs
//! with teacher-forced character sequences of the targets.

use std::path::Path;

use candle_core::{D, Device, Tensor};

use crate::{
    errors::TVResult,
    generator::{CharAlphabet, GeneratorDecoder, GeneratorEncoder, teacher_forcing},
    nn::{Noise, Trainer, TrainingTask, derive_seed, trainable_vars},
    text::TokenizedText,
    vae::{VaeDecoder, VaeEncoder, postprocess_batch},
    vectorize::{BatchPlan, BatchSource, PaddingMode, RowEncoder, SequenceVectorizer},
};

/// One generator batch.
#[derive(Debug, Clone)]
pub struct GeneratorBatch {
    /// `(batch, output_text_size, width - 1)` postprocessed reconstructions.
    pub encoder_inputs: Tensor,

    /// `(batch, max_chars, n_chars)` one-hot teacher-forced inputs.
    pub decoder_inputs: Tensor,

    /// `(batch, max_chars)` target character indices, `u32`.
    pub targets: Tensor,

    /// `(batch, max_chars)` loss mask.
    pub mask: Tensor,
}

/// The trained VAE halves a generator batch source reconstructs with.
#[derive(Clone, Copy)]
pub struct Reconstructor<'a> {
    /// The VAE encoder.
    pub encoder: &'a VaeEncoder,

    /// The VAE decoder.
    pub decoder: &'a VaeDecoder,
}

impl Reconstructor<'_> {
    /// Postprocessed reconstructions of encoder inputs.
    ///
    /// ## Arguments
    /// * `inputs` - `(batch, time, width)` encoder input.
    /// * `noise` - sample the latent with this noise; `None` uses the mean.
    pub fn reconstruct(
        &self,
        inputs: &Tensor,
        noise: Option<&mut Noise>,
    ) -> TVResult<Tensor> {
        let moments = self.encoder.forward(inputs, None)?;
        let z = match noise {
            Some(noise) => moments.sample(noise)?,
            None => moments.mean,
        };
        postprocess_batch(&self.decoder.forward(&z, None)?)
    }
}

/// Generator batches, served by index.
pub struct GeneratorBatches<'a, E: RowEncoder + ?Sized> {
    input_encoder: &'a E,
    reconstructor: Reconstructor<'a>,
    alphabet: &'a CharAlphabet,
    inputs: &'a [TokenizedText],
    targets: &'a [Vec<char>],
    plan: BatchPlan,
    input_text_size: usize,
    max_chars: usize,
    seed: u64,
    device: Device,
}

impl<'a, E: RowEncoder + ?Sized> GeneratorBatches<'a, E> {
    /// Create a batch source.
    ///
    /// ## Arguments
    /// * `input_encoder` - encodes input tokens.
    /// * `reconstructor` - the trained VAE.
    /// * `alphabet` - the character alphabet.
    /// * `inputs` - input texts.
    /// * `targets` - target characters, parallel to `inputs`.
    /// * `batch_size` - the batch size.
    /// * `sizes` - `(input_text_size, max_chars)`.
    /// * `seed` - seeds the latent samples of each batch.
    /// * `device` - the tensor device.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        input_encoder: &'a E,
        reconstructor: Reconstructor<'a>,
        alphabet: &'a CharAlphabet,
        inputs: &'a [TokenizedText],
        targets: &'a [Vec<char>],
        batch_size: usize,
        sizes: (usize, usize),
        seed: u64,
        device: &Device,
    ) -> Self {
        Self {
            input_encoder,
            reconstructor,
            alphabet,
            inputs,
            targets,
            plan: BatchPlan::new(inputs.len(), batch_size),
            input_text_size: sizes.0,
            max_chars: sizes.1,
            seed,
            device: device.clone(),
        }
    }
}

impl<E: RowEncoder + ?Sized> BatchSource for GeneratorBatches<'_, E> {
    type Batch = GeneratorBatch;

    fn n_batches(&self) -> usize {
        self.plan.n_batches()
    }

    fn batch(
        &self,
        idx: usize,
    ) -> TVResult<GeneratorBatch> {
        let items = self.plan.items(idx);
        let b = items.len();

        let inputs = items.iter().map(|&i| &self.inputs[i]).collect::<Vec<_>>();
        let vectorizer = SequenceVectorizer::new(
            self.input_encoder,
            self.input_text_size,
            PaddingMode::Indicator,
        );
        let inputs = Tensor::from_vec(
            vectorizer.vectorize_batch(&inputs),
            (b, self.input_text_size, vectorizer.width()),
            &self.device,
        )?;
        let mut noise = Noise::new(derive_seed(self.seed, &[idx as u64]), &self.device);
        let encoder_inputs = self.reconstructor.reconstruct(&inputs, Some(&mut noise))?;

        let n_chars = self.alphabet.len();
        let steps = self.max_chars;
        let mut one_hot = vec![0.0f32; b * steps * n_chars];
        let mut targets = vec![0u32; b * steps];
        let mut mask = vec![0.0f32; b * steps];
        for (row, &item) in items.iter().enumerate() {
            let (dec_in, dec_out) = teacher_forcing(self.alphabet, &self.targets[item], steps);
            for t in 0..steps {
                let at = row * steps + t;
                if let Some(c) = dec_in[t] {
                    one_hot[at * n_chars + c] = 1.0;
                    if let Some(target) = dec_out[t] {
                        targets[at] = target as u32;
                        mask[at] = 1.0;
                    }
                }
            }
        }

        Ok(GeneratorBatch {
            encoder_inputs,
            decoder_inputs: Tensor::from_vec(one_hot, (b, steps, n_chars), &self.device)?,
            targets: Tensor::from_vec(targets, (b, steps), &self.device)?,
            mask: Tensor::from_vec(mask, (b, steps), &self.device)?,
        })
    }
}

const ENCODER_CHECKPOINT: &str = "generator_encoder.safetensors";
const DECODER_CHECKPOINT: &str = "generator_decoder.safetensors";

/// Fits the generator networks with masked categorical cross-entropy.
pub struct GeneratorTask {
    encoder: GeneratorEncoder,
    decoder: GeneratorDecoder,
    trainer: Trainer,
}

impl GeneratorTask {
    /// Create a task.
    pub fn new(
        encoder: GeneratorEncoder,
        decoder: GeneratorDecoder,
        lr: f64,
    ) -> TVResult<Self> {
        let mut vars = trainable_vars(encoder.varmap())?;
        vars.extend(trainable_vars(decoder.varmap())?);
        Ok(Self {
            encoder,
            decoder,
            trainer: Trainer::new(vars, lr)?,
        })
    }

    /// Release the trained networks.
    pub fn into_parts(self) -> (GeneratorEncoder, GeneratorDecoder) {
        (self.encoder, self.decoder)
    }

    fn loss(
        &self,
        batch: &GeneratorBatch,
        mut noise: Option<Noise>,
    ) -> TVResult<Tensor> {
        let state = self
            .encoder
            .forward(&batch.encoder_inputs, noise.as_mut())?;
        let logits = self
            .decoder
            .forward(&batch.decoder_inputs, &state, noise.as_mut())?;
        masked_cross_entropy(&logits, &batch.targets, &batch.mask)
    }
}

/// Mean cross-entropy over unmasked steps.
///
/// ## Arguments
/// * `logits` - `(batch, steps, classes)`.
/// * `targets` - `(batch, steps)` class indices, `u32`.
/// * `mask` - `(batch, steps)`.
pub fn masked_cross_entropy(
    logits: &Tensor,
    targets: &Tensor,
    mask: &Tensor,
) -> TVResult<Tensor> {
    let (b, s, c) = logits.dims3()?;
    let log_probs = candle_nn::ops::log_softmax(&logits.reshape((b * s, c))?, D::Minus1)?;
    let picked = log_probs
        .gather(&targets.reshape((b * s, 1))?, 1)?
        .reshape((b, s))?;
    let count = mask.sum_all()?.affine(1.0, 1e-7)?;
    Ok(picked.neg()?.mul(mask)?.sum_all()?.div(&count)?)
}

impl TrainingTask for GeneratorTask {
    type Batch = GeneratorBatch;

    fn train_batch(
        &mut self,
        batch: &GeneratorBatch,
        seed: u64,
    ) -> TVResult<f32> {
        let noise = Noise::new(seed, batch.encoder_inputs.device());
        let loss = self.loss(batch, Some(noise))?;
        self.trainer.step(&loss)
    }

    fn eval_batch(
        &mut self,
        batch: &GeneratorBatch,
        _seed: u64,
    ) -> TVResult<f32> {
        Ok(self.loss(batch, None)?.to_scalar::<f32>()?)
    }

    fn learning_rate(&self) -> f64 {
        self.trainer.learning_rate()
    }

    fn set_learning_rate(
        &mut self,
        lr: f64,
    ) {
        self.trainer.set_learning_rate(lr)
    }

    fn save_checkpoint(
        &self,
        dir: &Path,
    ) -> TVResult<()> {
        self.encoder.save_to(&dir.join(ENCODER_CHECKPOINT))?;
        self.decoder.save_to(&dir.join(DECODER_CHECKPOINT))
    }

    fn load_checkpoint(
        &mut self,
        dir: &Path,
    ) -> TVResult<()> {
        self.encoder.load_from(&dir.join(ENCODER_CHECKPOINT))?;
        self.decoder.load_from(&dir.join(DECODER_CHECKPOINT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        embeddings::InMemoryEmbeddings,
        nn::TrainingSchedule,
        vae::VaeArchitecture,
        vectorize::EmbeddingEncoder,
    };

    #[test]
    fn test_masked_cross_entropy() {
        let logits = Tensor::new(&[[[0.0f32, 0.0], [5.0, -5.0]]], &Device::Cpu).unwrap();
        let targets = Tensor::new(&[[1u32, 1]], &Device::Cpu).unwrap();
        let mask = Tensor::new(&[[1.0f32, 0.0]], &Device::Cpu).unwrap();
        let loss = masked_cross_entropy(&logits, &targets, &mask)
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();
        assert!((loss - 2.0f32.ln()).abs() < 1e-5);
    }

    #[test]
    fn test_generator_batches_and_training() {
        let table = InMemoryEmbeddings::from_entries(
            2,
            [("hi", vec![1.0, 0.0]), ("yo", vec![0.0, 1.0])],
        )
        .unwrap();
        let input_encoder = EmbeddingEncoder::new(&table, &[]);
        let arch = VaeArchitecture {
            n_filters: vec![4],
            kernel_size: 3,
            latent_dim: 2,
            use_batch_norm: false,
            input_text_size: 4,
            output_text_size: 2,
            input_vector_size: 4,
            output_vector_size: 4,
        };
        let vae_encoder = VaeEncoder::new(&arch, false, 0, &Device::Cpu).unwrap();
        let vae_decoder = VaeDecoder::new(&arch, 1, &Device::Cpu).unwrap();
        let reconstructor = Reconstructor {
            encoder: &vae_encoder,
            decoder: &vae_decoder,
        };

        let inputs = vec![
            TokenizedText::from(vec!["hi".to_string()]),
            TokenizedText::from(vec!["yo".to_string()]),
        ];
        let targets = vec!["hi".chars().collect::<Vec<_>>(), "yo".chars().collect()];
        let alphabet = CharAlphabet::from_texts(&targets);
        let max_chars = 5;

        let batches = GeneratorBatches::new(
            &input_encoder,
            reconstructor,
            &alphabet,
            &inputs,
            &targets,
            2,
            (4, max_chars),
            0,
            &Device::Cpu,
        );
        let batch = batches.batch(0).unwrap();
        assert_eq!(batch.encoder_inputs.dims3().unwrap(), (2, 2, 3));
        assert_eq!(
            batch.decoder_inputs.dims3().unwrap(),
            (2, max_chars, alphabet.len())
        );
        assert_eq!(
            batch.mask.to_vec2::<f32>().unwrap()[0],
            vec![1.0, 1.0, 1.0, 1.0, 0.0]
        );

        let mut task = GeneratorTask::new(
            GeneratorEncoder::new(2, 3, 4, true, 2, &Device::Cpu).unwrap(),
            GeneratorDecoder::new(alphabet.len(), 4, 3, &Device::Cpu).unwrap(),
            0.01,
        )
        .unwrap();
        let report = TrainingSchedule::new(3, 0)
            .run(1, "generator", &mut task, &batches, &batches)
            .unwrap();
        assert_eq!(report.history.len(), 3);
        assert!(report.best_validation.unwrap().is_finite());
    }
}
