//! # Leaf-Disease Severity Classification
//!
//! A Rust library for multi-class severity classification of leaf-disease
//! images using the Burn framework. The backbone is an enhanced ResNeXt-50
//! variant: stochastic pooling after the stem, Swish activations, and
//! 32-way cardinality blocks with residual fusion. Optimizer
//! hyperparameters (learning rate, weight decay) are tuned by Cat Swarm
//! Optimization over a bounded 2-D box, and repeated training runs are
//! compared with a paired t-test.
//!
//! ## Modules
//!
//! - `model`: the backbone and its building blocks (Swish, stochastic
//!   pooling, cardinality blocks)
//! - `data`: batch types and per-phase batch collections
//! - `training`: the epoch/phase loop, schedules, and checkpointing
//! - `evaluation`: accuracy, Cohen's Kappa, ROC-AUC, classification report,
//!   confusion matrix and its heatmap
//! - `search`: the swarm-based hyperparameter search and its objective
//! - `stats`: paired significance testing
//! - `experiment`: the fixed train/evaluate/search/retrain/compare protocol
//! - `utils`: errors, logging, metrics, chart rendering
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use leaf_severity::backend::TrainingBackend;
//! use leaf_severity::experiment::{self, ExperimentConfig, ExperimentData};
//!
//! let device = leaf_severity::backend::default_device();
//! let data: ExperimentData<TrainingBackend> = /* batches from your loader */;
//! let report = experiment::run(&data, &ExperimentConfig::default(), &device)?;
//! report.print_summary(&leaf_severity::CLASS_NAMES);
//! ```

pub mod backend;
pub mod data;
pub mod evaluation;
pub mod experiment;
pub mod model;
pub mod search;
pub mod stats;
pub mod training;
pub mod utils;

// Re-export commonly used items
pub use data::{PhaseData, SeverityBatch, SeverityBatcher, SeverityItem};
pub use evaluation::{evaluate, EvaluationReport};
pub use experiment::{ExperimentConfig, ExperimentData, ExperimentReport};
pub use model::{SeverityNet, SeverityNetConfig, StochasticPool2d, Swish};
pub use search::{CatSwarm, CatSwarmConfig, HyperPoint, SearchConfig, SearchOutcome, SearchSpace};
pub use stats::{paired_t_test, TTest};
pub use training::{EpochRecord, FitOutcome, LrSchedule, Trainer, TrainingConfig};
pub use utils::error::{Error, Result};

/// Number of severity classes
pub const NUM_CLASSES: usize = 3;

/// Default input image size (square)
pub const IMAGE_SIZE: usize = 224;

/// Severity class names, indexed by label
pub const CLASS_NAMES: [&str; NUM_CLASSES] = ["Low", "Moderate", "Severe"];

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
