//! Training: configuration, learning-rate schedules, and the epoch loop.

pub mod scheduler;
pub mod trainer;

pub use scheduler::LrSchedule;
pub use trainer::{EpochRecord, FitOutcome, Trainer, TrainingState};

use serde::{Deserialize, Serialize};

/// Training hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Number of training epochs
    pub epochs: usize,

    /// Base learning rate for the Adam optimizer
    pub learning_rate: f64,

    /// Weight decay (L2 penalty)
    pub weight_decay: f64,

    /// Learning-rate schedule
    pub schedule: LrSchedule,

    /// Seed for the stochastic-pooling RNG
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 20,
            learning_rate: 1e-4,
            weight_decay: 1e-4,
            schedule: LrSchedule::Constant,
            seed: 42,
        }
    }
}

impl TrainingConfig {
    /// Configuration for short runs (hyperparameter search, repeated
    /// comparison runs)
    pub fn short(epochs: usize) -> Self {
        Self {
            epochs,
            ..Default::default()
        }
    }

    /// Replace the optimizer hyperparameters
    pub fn with_optimizer(mut self, learning_rate: f64, weight_decay: f64) -> Self {
        self.learning_rate = learning_rate;
        self.weight_decay = weight_decay;
        self
    }

    /// Replace the RNG seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}
