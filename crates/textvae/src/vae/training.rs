//! # VAE Training
//!
//! Batch assembly and the [`TrainingTask`] that fits an encoder/decoder
//! pair.

use std::path::Path;

use candle_core::{Device, Tensor};

use crate::{
    errors::TVResult,
    nn::{Noise, Trainer, TrainingTask, trainable_vars},
    text::TokenizedText,
    vae::{ReconstructionLoss, ReconstructionTargets, VaeDecoder, VaeEncoder},
    vectorize::{BatchPlan, BatchSource, PaddingMode, RowEncoder, SequenceVectorizer, target_rows},
    vocab::Vocabulary,
};

/// One VAE batch.
#[derive(Debug, Clone)]
pub struct VaeBatch {
    /// `(batch, input_text_size, input_width)` encoder input.
    pub inputs: Tensor,

    /// Reconstruction targets.
    pub targets: ReconstructionTargets,
}

/// Encoder inputs and reconstruction targets, served by batch index.
pub struct VaeBatches<'a, E: RowEncoder + ?Sized> {
    input_encoder: &'a E,
    vocabulary: &'a Vocabulary,
    inputs: &'a [TokenizedText],
    targets: &'a [TokenizedText],
    plan: BatchPlan,
    input_text_size: usize,
    output_text_size: usize,
    device: Device,
}

impl<'a, E: RowEncoder + ?Sized> VaeBatches<'a, E> {
    /// Create a batch source.
    ///
    /// ## Arguments
    /// * `input_encoder` - encodes input tokens.
    /// * `vocabulary` - the output vocabulary.
    /// * `inputs` - input texts.
    /// * `targets` - target texts, parallel to `inputs`.
    /// * `batch_size` - the batch size.
    /// * `sizes` - `(input_text_size, output_text_size)`.
    /// * `device` - the tensor device.
    pub fn new(
        input_encoder: &'a E,
        vocabulary: &'a Vocabulary,
        inputs: &'a [TokenizedText],
        targets: &'a [TokenizedText],
        batch_size: usize,
        sizes: (usize, usize),
        device: &Device,
    ) -> Self {
        Self {
            input_encoder,
            vocabulary,
            inputs,
            targets,
            plan: BatchPlan::new(inputs.len(), batch_size),
            input_text_size: sizes.0,
            output_text_size: sizes.1,
            device: device.clone(),
        }
    }
}

impl<E: RowEncoder + ?Sized> BatchSource for VaeBatches<'_, E> {
    type Batch = VaeBatch;

    fn n_batches(&self) -> usize {
        self.plan.n_batches()
    }

    fn batch(
        &self,
        idx: usize,
    ) -> TVResult<VaeBatch> {
        let items = self.plan.items(idx);
        let b = items.len();

        let inputs = items.iter().map(|&i| &self.inputs[i]).collect::<Vec<_>>();
        let input_vectorizer = SequenceVectorizer::new(
            self.input_encoder,
            self.input_text_size,
            PaddingMode::Indicator,
        );
        let input_width = input_vectorizer.width();
        let inputs = Tensor::from_vec(
            input_vectorizer.vectorize_batch(&inputs),
            (b, self.input_text_size, input_width),
            &self.device,
        )?;

        let targets = items.iter().map(|&i| &self.targets[i]).collect::<Vec<_>>();
        let target_vectorizer =
            SequenceVectorizer::new(self.vocabulary, self.output_text_size, PaddingMode::Zeros);
        let vectors = Tensor::from_vec(
            target_vectorizer.vectorize_batch(&targets),
            (b, self.output_text_size, target_vectorizer.width()),
            &self.device,
        )?;
        let mut rows = Vec::with_capacity(b * self.output_text_size);
        let mut mask = Vec::with_capacity(b * self.output_text_size);
        for text in &targets {
            let (r, m) = target_rows(self.vocabulary, text, self.output_text_size);
            rows.extend(r);
            mask.extend(m);
        }

        Ok(VaeBatch {
            inputs,
            targets: ReconstructionTargets {
                rows: Tensor::from_vec(rows, (b, self.output_text_size), &self.device)?,
                mask: Tensor::from_vec(mask, (b, self.output_text_size), &self.device)?,
                vectors,
            },
        })
    }
}

const ENCODER_CHECKPOINT: &str = "vae_encoder.safetensors";
const DECODER_CHECKPOINT: &str = "vae_decoder.safetensors";

/// Fits a VAE; a frozen encoder is left out of the optimizer.
pub struct VaeTask {
    encoder: VaeEncoder,
    decoder: VaeDecoder,
    loss: ReconstructionLoss,
    vocabulary_t: Tensor,
    trainer: Trainer,
}

impl VaeTask {
    /// Create a task.
    ///
    /// ## Arguments
    /// * `encoder` - the encoder.
    /// * `decoder` - the decoder.
    /// * `loss` - the reconstruction objective.
    /// * `vocabulary` - the output vocabulary.
    /// * `lr` - the initial learning rate.
    /// * `device` - the tensor device.
    pub fn new(
        encoder: VaeEncoder,
        decoder: VaeDecoder,
        loss: ReconstructionLoss,
        vocabulary: &Vocabulary,
        lr: f64,
        device: &Device,
    ) -> TVResult<Self> {
        let mut vars = trainable_vars(decoder.varmap())?;
        if !encoder.is_frozen() {
            vars.extend(trainable_vars(encoder.varmap())?);
        }
        let matrix = vocabulary.vectors();
        let vocabulary_t = Tensor::from_slice(
            matrix.as_slice(),
            (matrix.rows(), matrix.cols()),
            device,
        )?
        .t()?
        .contiguous()?;
        Ok(Self {
            encoder,
            decoder,
            loss,
            vocabulary_t,
            trainer: Trainer::new(vars, lr)?,
        })
    }

    /// Release the trained networks.
    pub fn into_parts(self) -> (VaeEncoder, VaeDecoder) {
        (self.encoder, self.decoder)
    }

    fn loss(
        &self,
        batch: &VaeBatch,
        seed: u64,
        train: bool,
    ) -> TVResult<Tensor> {
        let mut noise = Noise::new(seed, batch.inputs.device());
        let (moments, output) = if train {
            let moments = self.encoder.forward(&batch.inputs, Some(&mut noise))?;
            let z = moments.sample(&mut noise)?;
            let output = self.decoder.forward(&z, Some(&mut noise))?;
            (moments, output)
        } else {
            let moments = self.encoder.forward(&batch.inputs, None)?;
            let z = moments.sample(&mut noise)?;
            let output = self.decoder.forward(&z, None)?;
            (moments, output)
        };
        self.loss
            .evaluate(&output, &self.vocabulary_t, &batch.targets, &moments)
    }
}

impl TrainingTask for VaeTask {
    type Batch = VaeBatch;

    fn train_batch(
        &mut self,
        batch: &VaeBatch,
        seed: u64,
    ) -> TVResult<f32> {
        let loss = self.loss(batch, seed, true)?;
        self.trainer.step(&loss)
    }

    fn eval_batch(
        &mut self,
        batch: &VaeBatch,
        seed: u64,
    ) -> TVResult<f32> {
        Ok(self.loss(batch, seed, false)?.to_scalar::<f32>()?)
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
        vocab::VocabularyBuilder,
    };

    fn toks(text: &str) -> TokenizedText {
        TokenizedText::from(text.split(' ').map(|w| w.to_string()).collect::<Vec<_>>())
    }

    fn table() -> InMemoryEmbeddings {
        InMemoryEmbeddings::from_entries(
            3,
            [
                ("a", vec![1.0, 0.0, 0.0]),
                ("b", vec![0.0, 1.0, 0.0]),
                ("c", vec![0.0, 0.0, 1.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_batches() {
        let table = table();
        let texts = vec![toks("a b"), toks("c"), toks("a b c")];
        let vocabulary = VocabularyBuilder::new(&table).build(&texts);
        let encoder = EmbeddingEncoder::new(&table, &[]);

        let batches = VaeBatches::new(&encoder, &vocabulary, &texts, &texts, 2, (4, 3), &Device::Cpu);
        assert_eq!(batches.n_batches(), 2);

        let batch = batches.batch(1).unwrap();
        assert_eq!(batch.inputs.dims3().unwrap(), (2, 4, 5));
        assert_eq!(batch.targets.vectors.dims3().unwrap(), (2, 3, 5));
        assert_eq!(
            batch.targets.mask.to_vec2::<f32>().unwrap(),
            vec![vec![1.0, 1.0, 1.0], vec![1.0, 1.0, 1.0]]
        );
        // Item 0 again: "a b" then end.
        assert_eq!(
            batch.targets.rows.to_vec2::<u32>().unwrap()[1],
            vec![0, 1, vocabulary.end_row() as u32]
        );
    }

    #[test]
    fn test_training_reduces_loss() {
        let table = table();
        let texts = vec![toks("a b"), toks("c"), toks("a b c"), toks("b a")];
        let vocabulary = VocabularyBuilder::new(&table).build(&texts);
        let encoder = EmbeddingEncoder::new(&table, &[]);
        let arch = VaeArchitecture {
            n_filters: vec![8],
            kernel_size: 3,
            latent_dim: 2,
            use_batch_norm: false,
            input_text_size: 4,
            output_text_size: 4,
            input_vector_size: 5,
            output_vector_size: vocabulary.vector_width(),
        };

        let mut task = VaeTask::new(
            VaeEncoder::new(&arch, false, 0, &Device::Cpu).unwrap(),
            VaeDecoder::new(&arch, 1, &Device::Cpu).unwrap(),
            ReconstructionLoss::SoftNearestVocabulary,
            &vocabulary,
            0.01,
            &Device::Cpu,
        )
        .unwrap();

        let batches = VaeBatches::new(&encoder, &vocabulary, &texts, &texts, 4, (4, 4), &Device::Cpu);
        let report = TrainingSchedule::new(20, 0)
            .with_early_stopping_patience(20)
            .run(0, "vae", &mut task, &batches, &batches)
            .unwrap();

        let first = report.history[0].validation;
        let best = report.best_validation.unwrap();
        assert!(best.is_finite());
        assert!(best <= first);
    }
}
