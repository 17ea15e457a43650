//! The epoch/phase training loop.
//!
//! Runs the train phase (gradient tracking, one optimizer step per batch)
//! and the val phase (metrics only) each epoch, advances the learning-rate
//! schedule after the train phase, and snapshots the model whenever
//! validation accuracy strictly improves. The best snapshot is part of the
//! returned outcome: persisting it is the caller's decision, the loop keeps
//! no hidden global state. A NaN or Inf loss is not caught here; it flows
//! into the history and surfaces to the caller.

use std::path::Path;

use burn::{
    module::{AutodiffModule, Module},
    nn::loss::CrossEntropyLossConfig,
    optim::{decay::WeightDecayConfig, AdamConfig, GradientsParams, Optimizer},
    record::CompactRecorder,
    tensor::{
        backend::{AutodiffBackend, Backend},
        ElementConversion, Int, Tensor,
    },
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::TrainingConfig;
use crate::data::PhaseData;
use crate::model::SeverityNet;
use crate::utils::error::{Error, Result};

/// Per-epoch loss and accuracy for both phases
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochRecord {
    pub train_loss: f64,
    pub val_loss: f64,
    pub train_acc: f64,
    pub val_acc: f64,
}

/// Mutable training-run state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingState {
    /// Current epoch (0-indexed)
    pub epoch: usize,
    /// Best validation accuracy seen so far
    pub best_val_accuracy: f64,
    /// Learning rate in effect for the next optimizer step
    pub current_lr: f64,
    /// Append-only per-epoch history
    pub history: Vec<EpochRecord>,
}

impl TrainingState {
    fn new(initial_lr: f64) -> Self {
        Self {
            epoch: 0,
            best_val_accuracy: 0.0,
            current_lr: initial_lr,
            history: Vec::new(),
        }
    }

    /// Track the best validation accuracy.
    ///
    /// Returns true only on strict improvement; ties never replace the
    /// snapshot.
    pub fn update_best(&mut self, val_accuracy: f64) -> bool {
        if val_accuracy > self.best_val_accuracy {
            self.best_val_accuracy = val_accuracy;
            true
        } else {
            false
        }
    }
}

/// Result of a completed training run
pub struct FitOutcome<B: AutodiffBackend> {
    /// One record per epoch
    pub history: Vec<EpochRecord>,
    /// Best validation accuracy reached
    pub best_val_accuracy: f64,
    /// Snapshot of the model at its best validation accuracy
    pub best_model: SeverityNet<B::InnerBackend>,
}

/// Trainer binding a backbone to an optimizer configuration
pub struct Trainer<B: AutodiffBackend> {
    model: SeverityNet<B>,
    config: TrainingConfig,
    state: TrainingState,
    rng: ChaCha8Rng,
    device: B::Device,
}

impl<B: AutodiffBackend> Trainer<B> {
    /// Create a trainer for the given model
    pub fn new(model: SeverityNet<B>, config: TrainingConfig, device: B::Device) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        let state = TrainingState::new(config.learning_rate);
        Self {
            model,
            config,
            state,
            rng,
            device,
        }
    }

    /// Run the configured number of epochs.
    ///
    /// Each epoch trains on all `train` batches (one optimizer step per
    /// batch, loss weighted by batch size), then scores all `val` batches
    /// without gradient tracking. Returns the full history plus the best
    /// validation snapshot.
    pub fn fit(
        &mut self,
        train: &PhaseData<B>,
        val: &PhaseData<B::InnerBackend>,
    ) -> Result<FitOutcome<B>> {
        if train.is_empty() {
            return Err(Error::Training("train phase has no data".to_string()));
        }
        if val.is_empty() {
            return Err(Error::Training("val phase has no data".to_string()));
        }

        let mut optimizer = AdamConfig::new()
            .with_weight_decay(Some(WeightDecayConfig::new(self.config.weight_decay as f32)))
            .init();
        let mut best_model = self.model.valid();

        info!(
            "Training for {} epochs ({} train / {} val samples)",
            self.config.epochs,
            train.num_samples(),
            val.num_samples()
        );

        for epoch in 0..self.config.epochs {
            self.state.epoch = epoch;

            // Train phase
            let mut running_loss = 0.0;
            let mut correct = 0usize;
            for (batch_idx, batch) in train.batches().iter().enumerate() {
                let batch_size = batch.len();
                let logits = self.model.forward_train(batch.images.clone(), &mut self.rng);

                let loss = CrossEntropyLossConfig::new()
                    .init(&logits.device())
                    .forward(logits.clone(), batch.targets.clone());
                let loss_value: f64 = loss.clone().into_scalar().elem();

                running_loss += loss_value * batch_size as f64;
                correct += count_correct(logits, batch.targets.clone());

                let grads = loss.backward();
                let grads = GradientsParams::from_grads(grads, &self.model);
                self.model = optimizer.step(self.state.current_lr, self.model.clone(), grads);

                debug!(
                    "epoch {} batch {}/{}: loss = {:.4}",
                    epoch + 1,
                    batch_idx + 1,
                    train.batches().len(),
                    loss_value
                );
            }
            let train_loss = running_loss / train.num_samples() as f64;
            let train_acc = correct as f64 / train.num_samples() as f64;

            // Schedule advances once per epoch, after the train phase.
            self.state.current_lr = self
                .config
                .schedule
                .lr_at(self.config.learning_rate, epoch + 1);

            // Val phase: inner (non-autodiff) model, metrics only
            let model_valid = self.model.valid();
            let mut running_loss = 0.0;
            let mut correct = 0usize;
            for batch in val.batches() {
                let logits = model_valid.forward(batch.images.clone());

                let loss = CrossEntropyLossConfig::new()
                    .init(&logits.device())
                    .forward(logits.clone(), batch.targets.clone());
                let loss_value: f64 = loss.into_scalar().elem();

                running_loss += loss_value * batch.len() as f64;
                correct += count_correct(logits, batch.targets.clone());
            }
            let val_loss = running_loss / val.num_samples() as f64;
            let val_acc = correct as f64 / val.num_samples() as f64;

            self.state.history.push(EpochRecord {
                train_loss,
                val_loss,
                train_acc,
                val_acc,
            });

            info!(
                "Epoch {}/{}: train_loss = {:.4}, train_acc = {:.2}%, val_loss = {:.4}, val_acc = {:.2}%",
                epoch + 1,
                self.config.epochs,
                train_loss,
                train_acc * 100.0,
                val_loss,
                val_acc * 100.0
            );

            if self.state.update_best(val_acc) {
                info!(
                    "New best model at epoch {}: val_acc = {:.2}%",
                    epoch + 1,
                    val_acc * 100.0
                );
                best_model = self.model.valid();
            }
        }

        Ok(FitOutcome {
            history: self.state.history.clone(),
            best_val_accuracy: self.state.best_val_accuracy,
            best_model,
        })
    }

    /// Persist the current model to the single checkpoint slot.
    ///
    /// Plain overwrite; a crash mid-write can corrupt the slot.
    pub fn save_checkpoint(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let recorder = CompactRecorder::new();
        self.model
            .clone()
            .save_file(path, &recorder)
            .map_err(|e| anyhow::anyhow!("Failed to save checkpoint: {:?}", e))?;
        info!("Checkpoint saved to {:?}", path);
        Ok(())
    }

    /// Load model weights from the checkpoint slot
    pub fn load_checkpoint(&mut self, path: &Path) -> anyhow::Result<()> {
        let recorder = CompactRecorder::new();
        self.model = self
            .model
            .clone()
            .load_file(path, &recorder, &self.device)
            .map_err(|e| anyhow::anyhow!("Failed to load checkpoint: {:?}", e))?;
        info!("Checkpoint loaded from {:?}", path);
        Ok(())
    }

    /// Current training state
    pub fn state(&self) -> &TrainingState {
        &self.state
    }

    /// Reference to the model being trained
    pub fn model(&self) -> &SeverityNet<B> {
        &self.model
    }
}

/// Count exact-match predictions in a batch of logits.
fn count_correct<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> usize {
    let [batch_size, _] = logits.dims();
    let predictions = logits.argmax(1).reshape([batch_size]);
    let correct: i64 = predictions.equal(targets).int().sum().into_scalar().elem();
    correct as usize
}
