//! Hyperparameter search: the bounded 2-D space, the swarm minimizer, and
//! the training-loop objective it drives.
//!
//! Each objective evaluation is itself a full (short) training run on a
//! fresh model, so a single bad draw must never abort the search: failures
//! and non-finite losses are converted to a large finite penalty at the
//! objective boundary.

pub mod cso;

pub use cso::{CatSwarm, CatSwarmConfig, SearchOutcome};

use burn::tensor::backend::AutodiffBackend;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::data::PhaseData;
use crate::model::{SeverityNet, SeverityNetConfig};
use crate::training::{Trainer, TrainingConfig};
use crate::utils::error::Result;

/// Objective value substituted for a failed or diverged evaluation
pub const DIVERGENCE_PENALTY: f64 = 1e9;

/// A candidate optimizer configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HyperPoint {
    pub learning_rate: f64,
    pub weight_decay: f64,
}

impl HyperPoint {
    /// View as a fixed-size array (learning rate first)
    pub fn to_array(self) -> [f64; 2] {
        [self.learning_rate, self.weight_decay]
    }

    /// Build from a fixed-size array (learning rate first)
    pub fn from_array(values: [f64; 2]) -> Self {
        Self {
            learning_rate: values[0],
            weight_decay: values[1],
        }
    }
}

/// Box constraints for the two optimizer hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSpace {
    /// Learning-rate bounds (low, high)
    pub learning_rate: (f64, f64),

    /// Weight-decay bounds (low, high)
    pub weight_decay: (f64, f64),
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self {
            learning_rate: (1e-5, 1e-3),
            weight_decay: (0.0, 1e-2),
        }
    }
}

impl SearchSpace {
    /// Bounds in array order (learning rate first)
    pub fn bounds(&self) -> [(f64, f64); 2] {
        [self.learning_rate, self.weight_decay]
    }

    /// Draw a uniform point inside the box
    pub fn sample(&self, rng: &mut ChaCha8Rng) -> HyperPoint {
        let bounds = self.bounds();
        let mut values = [0.0; 2];
        for dim in 0..2 {
            let (low, high) = bounds[dim];
            values[dim] = low + (high - low) * rng.gen::<f64>();
        }
        HyperPoint::from_array(values)
    }

    /// Whether a point satisfies the box constraints
    pub fn contains(&self, point: &HyperPoint) -> bool {
        let (lr_low, lr_high) = self.learning_rate;
        let (wd_low, wd_high) = self.weight_decay;
        point.learning_rate >= lr_low
            && point.learning_rate <= lr_high
            && point.weight_decay >= wd_low
            && point.weight_decay <= wd_high
    }
}

/// Full search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// The bounded hyperparameter box
    pub space: SearchSpace,

    /// Swarm parameters (population, iterations, behavior split)
    pub swarm: CatSwarmConfig,

    /// Epochs per objective evaluation
    pub tuning_epochs: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            space: SearchSpace::default(),
            swarm: CatSwarmConfig::default(),
            tuning_epochs: 3,
        }
    }
}

/// Build the black-box objective the swarm minimizes.
///
/// Each call constructs a fresh backbone and trainer with the candidate
/// learning rate and weight decay, runs a short training, and returns the
/// final epoch's validation loss. Any error or non-finite loss becomes
/// `DIVERGENCE_PENALTY` so the population search continues.
pub fn tuning_objective<'a, B: AutodiffBackend>(
    model_config: &'a SeverityNetConfig,
    base: &'a TrainingConfig,
    tuning_epochs: usize,
    train: &'a PhaseData<B>,
    val: &'a PhaseData<B::InnerBackend>,
    device: &'a B::Device,
) -> impl FnMut(&HyperPoint) -> f64 + 'a {
    move |point: &HyperPoint| {
        let run = || -> Result<f64> {
            let mut config = base
                .clone()
                .with_optimizer(point.learning_rate, point.weight_decay);
            config.epochs = tuning_epochs;

            let model = SeverityNet::<B>::new(model_config, device)?;
            let mut trainer = Trainer::new(model, config, device.clone());
            let outcome = trainer.fit(train, val)?;

            Ok(outcome
                .history
                .last()
                .map(|record| record.val_loss)
                .unwrap_or(f64::INFINITY))
        };

        match run() {
            Ok(loss) if loss.is_finite() => {
                debug!(
                    "Objective at lr = {:.2e}, wd = {:.2e}: val_loss = {:.4}",
                    point.learning_rate, point.weight_decay, loss
                );
                loss
            }
            Ok(loss) => {
                warn!(
                    "Diverged at lr = {:.2e}, wd = {:.2e} (loss = {}); penalizing",
                    point.learning_rate, point.weight_decay, loss
                );
                DIVERGENCE_PENALTY
            }
            Err(err) => {
                warn!(
                    "Evaluation failed at lr = {:.2e}, wd = {:.2e}: {}; penalizing",
                    point.learning_rate, point.weight_decay, err
                );
                DIVERGENCE_PENALTY
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SeverityBatcher, SeverityItem};
    use burn::backend::Autodiff;
    use burn_ndarray::NdArray;
    use rand::SeedableRng;

    type TestBackend = Autodiff<NdArray>;

    #[test]
    fn test_space_sample_and_contains() {
        let space = SearchSpace::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        for _ in 0..100 {
            let point = space.sample(&mut rng);
            assert!(space.contains(&point));
        }

        assert!(!space.contains(&HyperPoint {
            learning_rate: 2e-3,
            weight_decay: 0.0,
        }));
        assert!(!space.contains(&HyperPoint {
            learning_rate: 1e-4,
            weight_decay: -1e-6,
        }));
    }

    #[test]
    fn test_hyper_point_array_round_trip() {
        let point = HyperPoint {
            learning_rate: 3e-4,
            weight_decay: 2e-3,
        };
        assert_eq!(HyperPoint::from_array(point.to_array()), point);
    }

    fn tiny_setup() -> (
        SeverityNetConfig,
        PhaseData<TestBackend>,
        PhaseData<NdArray>,
    ) {
        let device = Default::default();
        let batcher = SeverityBatcher::with_image_size(16);
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut items = |count: usize| -> Vec<SeverityItem> {
            (0..count)
                .map(|i| {
                    let image: Vec<f32> =
                        (0..3 * 16 * 16).map(|_| rng.gen::<f32>()).collect();
                    SeverityItem::new(image, i % 3)
                })
                .collect()
        };

        let train = PhaseData::<TestBackend>::from_items(items(6), 3, &batcher, &device);
        let val = PhaseData::<NdArray>::from_items(items(3), 3, &batcher, &device);

        let model_config = SeverityNetConfig {
            num_classes: 3,
            cardinality: 2,
            stem_channels: 4,
            stage_widths: [4, 4, 4, 4],
            stage_depths: [1, 1, 1, 1],
        };
        (model_config, train, val)
    }

    #[test]
    fn test_objective_returns_finite_loss() {
        let (model_config, train, val) = tiny_setup();
        let base = TrainingConfig::default();
        let device = Default::default();

        let mut objective =
            tuning_objective::<TestBackend>(&model_config, &base, 1, &train, &val, &device);

        let loss = objective(&HyperPoint {
            learning_rate: 1e-4,
            weight_decay: 1e-4,
        });
        assert!(loss.is_finite());
        assert!(loss < DIVERGENCE_PENALTY);
    }

    #[test]
    fn test_objective_penalizes_failed_construction() {
        let (mut model_config, train, val) = tiny_setup();
        // Width not divisible by cardinality: model construction fails and
        // the failure must become a penalty, not an abort.
        model_config.stage_widths = [5, 4, 4, 4];

        let base = TrainingConfig::default();
        let device = Default::default();
        let mut objective =
            tuning_objective::<TestBackend>(&model_config, &base, 1, &train, &val, &device);

        let loss = objective(&HyperPoint {
            learning_rate: 1e-4,
            weight_decay: 1e-4,
        });
        assert_eq!(loss, DIVERGENCE_PENALTY);
    }
}
