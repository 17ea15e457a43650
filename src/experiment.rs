//! The fixed experiment protocol.
//!
//! train -> evaluate -> hyperparameter-search -> retrain -> evaluate ->
//! repeated runs -> paired significance test. The caller supplies the phase
//! data; this module wires the trainer, evaluator, swarm search, and t-test
//! together and prints the final artifacts.

use burn::tensor::backend::AutodiffBackend;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::data::PhaseData;
use crate::evaluation::{evaluate, EvaluationReport};
use crate::model::{SeverityNet, SeverityNetConfig};
use crate::search::{tuning_objective, CatSwarm, SearchConfig, SearchOutcome};
use crate::stats::{paired_t_test, TTest};
use crate::training::{Trainer, TrainingConfig};
use crate::utils::error::{Error, Result};

/// Experiment-wide configuration with the protocol's defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Backbone configuration
    pub model: SeverityNetConfig,

    /// Full-run training configuration (also the baseline arm)
    pub training: TrainingConfig,

    /// Hyperparameter-search configuration
    pub search: SearchConfig,

    /// Repeated short runs per arm for the significance test
    pub comparison_runs: usize,

    /// Epochs per comparison run
    pub comparison_epochs: usize,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            model: SeverityNetConfig::default(),
            training: TrainingConfig::default(),
            search: SearchConfig::default(),
            comparison_runs: 5,
            comparison_epochs: 3,
        }
    }
}

/// Phase data consumed by one experiment
pub struct ExperimentData<B: AutodiffBackend> {
    /// Training batches on the autodiff backend
    pub train: PhaseData<B>,
    /// Validation batches on the inner backend
    pub val: PhaseData<B::InnerBackend>,
}

/// Everything the protocol produces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentReport {
    /// Best validation accuracy of the baseline full run
    pub baseline_best_val_accuracy: f64,

    /// Evaluation of the baseline best snapshot
    pub baseline_eval: EvaluationReport,

    /// Search result over (learning rate, weight decay)
    pub search: SearchOutcome,

    /// Best validation accuracy of the retrained full run
    pub tuned_best_val_accuracy: f64,

    /// Evaluation of the retrained best snapshot
    pub tuned_eval: EvaluationReport,

    /// Validation accuracies of the repeated baseline runs
    pub baseline_scores: Vec<f64>,

    /// Validation accuracies of the repeated tuned runs
    pub tuned_scores: Vec<f64>,

    /// Paired t-test over the repeated runs
    pub comparison: TTest,
}

impl ExperimentReport {
    /// Print the protocol's final artifacts
    pub fn print_summary(&self, class_names: &[&str]) {
        println!("{}", "=== Experiment summary ===".bold());
        println!(
            "Baseline best validation accuracy: {}",
            format!("{:.2}%", self.baseline_best_val_accuracy * 100.0).green()
        );
        println!(
            "Tuned best validation accuracy:    {}",
            format!("{:.2}%", self.tuned_best_val_accuracy * 100.0).green()
        );

        println!();
        println!("{}", "Classification report (tuned model):".bold());
        println!("{}", self.tuned_eval.classification_report(class_names));

        println!(
            "Accuracy: {:.4}  Cohen's Kappa: {:.4}  ROC-AUC: {}",
            self.tuned_eval.accuracy,
            self.tuned_eval.kappa,
            match self.tuned_eval.roc_auc {
                Some(auc) => format!("{:.4}", auc),
                None => "undefined".to_string(),
            }
        );
        if !self.tuned_eval.degenerate_classes.is_empty() {
            println!(
                "{} degenerate classes in evaluation: {:?}",
                "warning:".yellow(),
                self.tuned_eval.degenerate_classes
            );
        }

        println!();
        println!(
            "Best hyperparameters: learning_rate = {:.3e}, weight_decay = {:.3e} (objective {:.4})",
            self.search.best.learning_rate, self.search.best.weight_decay, self.search.objective
        );
        println!(
            "Paired t-test (baseline vs tuned): t = {:.4}, p = {:.4}",
            self.comparison.statistic, self.comparison.p_value
        );
    }
}

/// Run the full protocol against the supplied phase data.
pub fn run<B: AutodiffBackend>(
    data: &ExperimentData<B>,
    config: &ExperimentConfig,
    device: &B::Device,
) -> Result<ExperimentReport> {
    if config.comparison_runs < 2 {
        return Err(Error::InvalidArgument(
            "comparison needs at least two runs per arm".to_string(),
        ));
    }

    // 1. Baseline full training
    info!("Protocol step 1/6: baseline training");
    let model = SeverityNet::<B>::new(&config.model, device)?;
    let mut trainer = Trainer::new(model, config.training.clone(), device.clone());
    let baseline = trainer.fit(&data.train, &data.val)?;

    // 2. Evaluate the baseline snapshot
    info!("Protocol step 2/6: baseline evaluation");
    let baseline_eval = evaluate(&baseline.best_model, &data.val)?;

    // 3. Swarm search over the optimizer hyperparameters
    info!("Protocol step 3/6: hyperparameter search");
    let mut swarm = CatSwarm::new(config.search.space.clone(), config.search.swarm.clone());
    let objective = tuning_objective::<B>(
        &config.model,
        &config.training,
        config.search.tuning_epochs,
        &data.train,
        &data.val,
        device,
    );
    let search = swarm.minimize(objective);

    // 4. Retrain at the selected point
    info!("Protocol step 4/6: retraining at the searched optimum");
    let tuned_config = config
        .training
        .clone()
        .with_optimizer(search.best.learning_rate, search.best.weight_decay);
    let model = SeverityNet::<B>::new(&config.model, device)?;
    let mut trainer = Trainer::new(model, tuned_config.clone(), device.clone());
    let tuned = trainer.fit(&data.train, &data.val)?;

    // 5. Evaluate the retrained snapshot
    info!("Protocol step 5/6: tuned evaluation");
    let tuned_eval = evaluate(&tuned.best_model, &data.val)?;

    // 6. Repeated independent short runs per arm, then the paired test
    info!(
        "Protocol step 6/6: {} comparison runs per arm",
        config.comparison_runs
    );
    let baseline_scores = repeated_runs::<B>(
        &config.model,
        &config.training,
        config,
        data,
        device,
        0x5eed_0000,
    )?;
    let tuned_scores = repeated_runs::<B>(
        &config.model,
        &tuned_config,
        config,
        data,
        device,
        0x5eed_1000,
    )?;
    let comparison = paired_t_test(&baseline_scores, &tuned_scores)?;

    Ok(ExperimentReport {
        baseline_best_val_accuracy: baseline.best_val_accuracy,
        baseline_eval,
        search,
        tuned_best_val_accuracy: tuned.best_val_accuracy,
        tuned_eval,
        baseline_scores,
        tuned_scores,
        comparison,
    })
}

/// Independent short trainings with distinct seeds; one score per run.
fn repeated_runs<B: AutodiffBackend>(
    model_config: &SeverityNetConfig,
    arm: &TrainingConfig,
    config: &ExperimentConfig,
    data: &ExperimentData<B>,
    device: &B::Device,
    seed_base: u64,
) -> Result<Vec<f64>> {
    let mut scores = Vec::with_capacity(config.comparison_runs);

    for run_idx in 0..config.comparison_runs {
        let mut run_config = arm.clone().with_seed(seed_base + run_idx as u64);
        run_config.epochs = config.comparison_epochs;

        let model = SeverityNet::<B>::new(model_config, device)?;
        let mut trainer = Trainer::new(model, run_config, device.clone());
        let outcome = trainer.fit(&data.train, &data.val)?;

        info!(
            "Comparison run {}/{}: best val_acc = {:.2}%",
            run_idx + 1,
            config.comparison_runs,
            outcome.best_val_accuracy * 100.0
        );
        scores.push(outcome.best_val_accuracy);
    }

    Ok(scores)
}
