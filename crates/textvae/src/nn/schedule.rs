//! # Training Schedule
//!
//! Epoch loop with early stopping, learning-rate reduction on plateaus, and
//! a best-so-far checkpoint.
//!
//! The checkpoint lives in a temporary directory owned by
//! [`TrainingSchedule::run`]; it is written only when the validation loss
//! strictly improves and is loaded back once the loop ends.

use std::path::Path;

use tempdir::TempDir;

use crate::{
    errors::TVResult,
    nn::derive_seed,
    vectorize::{BatchSource, epoch_order},
};

/// A trainable model driven by [`TrainingSchedule`].
pub trait TrainingTask {
    /// The batch type.
    type Batch;

    /// Take one optimizer step on a batch.
    ///
    /// ## Arguments
    /// * `batch` - the batch.
    /// * `seed` - the noise seed for this step.
    ///
    /// ## Returns
    /// The batch loss.
    fn train_batch(
        &mut self,
        batch: &Self::Batch,
        seed: u64,
    ) -> TVResult<f32>;

    /// Score a batch without updating anything.
    fn eval_batch(
        &mut self,
        batch: &Self::Batch,
        seed: u64,
    ) -> TVResult<f32>;

    /// The current learning rate.
    fn learning_rate(&self) -> f64;

    /// Change the learning rate.
    fn set_learning_rate(
        &mut self,
        lr: f64,
    );

    /// Write all weights under `dir`.
    fn save_checkpoint(
        &self,
        dir: &Path,
    ) -> TVResult<()>;

    /// Restore the weights written by [`TrainingTask::save_checkpoint`].
    fn load_checkpoint(
        &mut self,
        dir: &Path,
    ) -> TVResult<()>;
}

/// Train and validation loss of one epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochLoss {
    /// Mean training batch loss.
    pub train: f32,

    /// Mean validation batch loss.
    pub validation: f32,
}

/// The outcome of [`TrainingSchedule::run`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingReport {
    /// Per-epoch losses.
    pub history: Vec<EpochLoss>,

    /// The best validation loss.
    pub best_validation: Option<f32>,

    /// Did early stopping end the loop?
    pub stopped_early: bool,
}

/// Epoch loop hyperparameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSchedule {
    max_epochs: usize,
    early_stopping_patience: usize,
    plateau_patience: usize,
    plateau_factor: f64,
    plateau_min_delta: f32,
    seed: u64,
}

impl TrainingSchedule {
    /// Create a schedule with the default callbacks.
    ///
    /// Early stopping waits `min(5, max_epochs)` epochs; the learning rate
    /// drops by 10x after 2 epochs without a `1e-4` improvement.
    pub fn new(
        max_epochs: usize,
        seed: u64,
    ) -> Self {
        Self {
            max_epochs,
            early_stopping_patience: max_epochs.min(5),
            plateau_patience: 2,
            plateau_factor: 0.1,
            plateau_min_delta: 1e-4,
            seed,
        }
    }

    /// Set the early stopping patience.
    pub fn with_early_stopping_patience(
        self,
        early_stopping_patience: usize,
    ) -> Self {
        Self {
            early_stopping_patience,
            ..self
        }
    }

    /// Set the plateau patience.
    pub fn with_plateau_patience(
        self,
        plateau_patience: usize,
    ) -> Self {
        Self {
            plateau_patience,
            ..self
        }
    }

    /// The epoch cap.
    pub fn max_epochs(&self) -> usize {
        self.max_epochs
    }

    /// Run one training phase.
    ///
    /// ## Arguments
    /// * `phase` - a phase number; keeps noise streams of phases apart.
    /// * `name` - a label for log lines.
    /// * `task` - the model.
    /// * `train` - training batches.
    /// * `validation` - validation batches.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, task, train, validation)))]
    pub fn run<T, S, E>(
        &self,
        phase: u64,
        name: &str,
        task: &mut T,
        train: &S,
        validation: &E,
    ) -> TVResult<TrainingReport>
    where
        T: TrainingTask,
        S: BatchSource<Batch = T::Batch>,
        E: BatchSource<Batch = T::Batch>,
    {
        let checkpoint = TempDir::new("textvae-checkpoint")?;
        let mut report = TrainingReport::default();

        let mut best_stop = f32::INFINITY;
        let mut stop_wait = 0;
        let mut best_plateau = f32::INFINITY;
        let mut plateau_wait = 0;

        log::info!(
            "{name}: {} training and {} validation batches per epoch.",
            train.n_batches(),
            validation.n_batches()
        );

        let phase_seed = derive_seed(self.seed, &[phase]);
        for epoch in 0..self.max_epochs {
            let order = epoch_order(train.n_batches(), phase_seed, epoch);
            let mut train_total = 0.0f32;
            for (done, &idx) in order.iter().enumerate() {
                let batch = train.batch(idx)?;
                let seed = derive_seed(phase_seed, &[0, epoch as u64, idx as u64]);
                train_total += task.train_batch(&batch, seed)?;
                log::debug!(
                    "{name}: epoch {} {:.0}%",
                    epoch + 1,
                    100.0 * (done + 1) as f32 / order.len() as f32
                );
            }

            let mut validation_total = 0.0f32;
            for idx in 0..validation.n_batches() {
                let batch = validation.batch(idx)?;
                let seed = derive_seed(phase_seed, &[1, epoch as u64, idx as u64]);
                validation_total += task.eval_batch(&batch, seed)?;
            }

            let loss = EpochLoss {
                train: train_total / train.n_batches().max(1) as f32,
                validation: validation_total / validation.n_batches().max(1) as f32,
            };
            report.history.push(loss);
            log::info!(
                "{name}: epoch {}/{}: loss {:.6}, val_loss {:.6}",
                epoch + 1,
                self.max_epochs,
                loss.train,
                loss.validation
            );

            if report
                .best_validation
                .is_none_or(|best| !best.is_finite() || loss.validation < best)
            {
                report.best_validation = Some(loss.validation);
                task.save_checkpoint(checkpoint.path())?;
                log::debug!("{name}: val_loss improved; checkpoint saved.");
            }

            if loss.validation < best_plateau - self.plateau_min_delta {
                best_plateau = loss.validation;
                plateau_wait = 0;
            } else {
                plateau_wait += 1;
                if plateau_wait >= self.plateau_patience {
                    let lr = task.learning_rate() * self.plateau_factor;
                    task.set_learning_rate(lr);
                    plateau_wait = 0;
                    log::info!("{name}: reducing learning rate to {lr:e}.");
                }
            }

            if loss.validation < best_stop {
                best_stop = loss.validation;
                stop_wait = 0;
            } else {
                stop_wait += 1;
                if stop_wait >= self.early_stopping_patience {
                    log::info!("{name}: early stopping after epoch {}.", epoch + 1);
                    report.stopped_early = true;
                    break;
                }
            }
        }

        if report.best_validation.is_some() {
            task.load_checkpoint(checkpoint.path())?;
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    struct Scripted {
        losses: Vec<f32>,
        epoch: usize,
        weights: usize,
        lr: f64,
        train_steps: usize,
    }

    struct Batches(usize);

    impl BatchSource for Batches {
        type Batch = usize;

        fn n_batches(&self) -> usize {
            self.0
        }

        fn batch(
            &self,
            idx: usize,
        ) -> TVResult<usize> {
            Ok(idx)
        }
    }

    impl TrainingTask for Scripted {
        type Batch = usize;

        fn train_batch(
            &mut self,
            _batch: &usize,
            _seed: u64,
        ) -> TVResult<f32> {
            self.train_steps += 1;
            self.weights = self.train_steps;
            Ok(1.0)
        }

        fn eval_batch(
            &mut self,
            _batch: &usize,
            _seed: u64,
        ) -> TVResult<f32> {
            let loss = self.losses[self.epoch];
            self.epoch += 1;
            Ok(loss)
        }

        fn learning_rate(&self) -> f64 {
            self.lr
        }

        fn set_learning_rate(
            &mut self,
            lr: f64,
        ) {
            self.lr = lr;
        }

        fn save_checkpoint(
            &self,
            dir: &Path,
        ) -> TVResult<()> {
            fs::write(dir.join("w"), self.weights.to_string())?;
            Ok(())
        }

        fn load_checkpoint(
            &mut self,
            dir: &Path,
        ) -> TVResult<()> {
            let text = fs::read_to_string(dir.join("w"))?;
            self.weights = text.parse().unwrap_or(0);
            Ok(())
        }
    }

    fn scripted(losses: &[f32]) -> Scripted {
        Scripted {
            losses: losses.to_vec(),
            epoch: 0,
            weights: 0,
            lr: 1.0,
            train_steps: 0,
        }
    }

    #[test]
    fn test_best_checkpoint_is_restored() {
        let mut task = scripted(&[3.0, 1.0, 2.0, 2.5]);
        let report = TrainingSchedule::new(4, 0)
            .run(0, "test", &mut task, &Batches(1), &Batches(1))
            .unwrap();
        assert_eq!(report.history.len(), 4);
        assert_eq!(report.best_validation, Some(1.0));
        // Weights after epoch 2.
        assert_eq!(task.weights, 2);
        // Two epochs without improvement.
        assert!((task.lr - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_first_loss_is_replaced() {
        let mut task = scripted(&[f32::NAN, 2.0, 3.0, 3.0]);
        let report = TrainingSchedule::new(4, 0)
            .run(0, "test", &mut task, &Batches(1), &Batches(1))
            .unwrap();
        assert_eq!(report.best_validation, Some(2.0));
        assert_eq!(task.weights, 2);
    }

    #[test]
    fn test_early_stopping() {
        let mut task = scripted(&[1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0]);
        let report = TrainingSchedule::new(8, 0)
            .with_early_stopping_patience(2)
            .run(0, "test", &mut task, &Batches(2), &Batches(1))
            .unwrap();
        assert!(report.stopped_early);
        assert_eq!(report.history.len(), 3);
        assert_eq!(task.weights, 2);
    }
}
