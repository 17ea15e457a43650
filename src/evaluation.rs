//! Evaluation of a trained backbone on held-out data.
//!
//! Runs the deterministic forward pass (sampled pooling is replaced by its
//! expected value, so a frozen model and a fixed batch order always produce
//! the same metrics), collects predictions and probability rows, and
//! derives the full metric bundle: accuracy, Cohen's Kappa, one-vs-rest
//! ROC-AUC, per-class precision/recall/F1, and the confusion matrix.

use std::path::Path;

use burn::tensor::{activation, backend::Backend};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::data::PhaseData;
use crate::model::SeverityNet;
use crate::utils::charts;
use crate::utils::error::{Error, Result};
use crate::utils::metrics::{roc_auc_ovr, ClassMetrics, ConfusionMatrix};

/// Complete evaluation bundle for one model/data pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Fraction of exact-match predictions
    pub accuracy: f64,

    /// Chance-corrected agreement
    pub kappa: f64,

    /// Macro one-vs-rest ROC-AUC; `None` when every class was degenerate
    pub roc_auc: Option<f64>,

    /// Per-class AUC values (`None` per degenerate class)
    pub per_class_auc: Vec<Option<f64>>,

    /// Classes with no positives or no negatives in this data
    pub degenerate_classes: Vec<usize>,

    /// Per-class precision/recall/F1/support
    pub per_class: Vec<ClassMetrics>,

    /// Class x class count grid (rows = actual)
    pub confusion: ConfusionMatrix,

    /// Predicted class per sample, in evaluation order
    pub predictions: Vec<usize>,

    /// True class per sample, in evaluation order
    pub targets: Vec<usize>,

    /// Number of samples evaluated
    pub total_samples: usize,
}

impl EvaluationReport {
    /// Render the per-class table in the usual classification-report layout
    pub fn classification_report(&self, class_names: &[&str]) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{:>12} {:>10} {:>10} {:>10} {:>10}\n",
            "", "precision", "recall", "f1-score", "support"
        ));
        out.push('\n');

        for metrics in &self.per_class {
            let name = class_names
                .get(metrics.class_idx)
                .copied()
                .unwrap_or("?");
            out.push_str(&format!(
                "{:>12} {:>10.4} {:>10.4} {:>10.4} {:>10}\n",
                name, metrics.precision, metrics.recall, metrics.f1, metrics.support
            ));
        }

        let classes = self.per_class.len().max(1) as f64;
        let macro_precision: f64 =
            self.per_class.iter().map(|m| m.precision).sum::<f64>() / classes;
        let macro_recall: f64 = self.per_class.iter().map(|m| m.recall).sum::<f64>() / classes;
        let macro_f1: f64 = self.per_class.iter().map(|m| m.f1).sum::<f64>() / classes;

        out.push('\n');
        out.push_str(&format!(
            "{:>12} {:>10.4} {:>10.4} {:>10.4} {:>10}\n",
            "macro avg", macro_precision, macro_recall, macro_f1, self.total_samples
        ));
        out.push_str(&format!(
            "{:>12} {:>10.4}\n",
            "accuracy", self.accuracy
        ));
        out
    }

    /// Write the confusion-matrix heatmap SVG
    pub fn render_heatmap(&self, class_names: &[&str], path: &Path) -> Result<()> {
        charts::confusion_heatmap(&self.confusion, class_names, path)?;
        Ok(())
    }
}

/// Evaluate a trained backbone over a phase's batches.
///
/// Deterministic for a frozen model and fixed batch order. Degenerate
/// classes (absent from the targets, or covering all of them) are surfaced
/// in the report and logged; they never silently vanish into an average.
pub fn evaluate<B: Backend>(
    model: &SeverityNet<B>,
    data: &PhaseData<B>,
) -> Result<EvaluationReport> {
    if data.is_empty() {
        return Err(Error::Evaluation("no batches to evaluate".to_string()));
    }

    let num_classes = model.num_classes();
    let mut predictions: Vec<usize> = Vec::with_capacity(data.num_samples());
    let mut targets: Vec<usize> = Vec::with_capacity(data.num_samples());
    let mut probabilities: Vec<Vec<f32>> = Vec::with_capacity(data.num_samples());

    for batch in data.batches() {
        let batch_size = batch.len();
        let logits = model.forward(batch.images.clone());
        let probs = activation::softmax(logits, 1);

        let predicted = probs.clone().argmax(1).reshape([batch_size]);
        let pred_vec: Vec<i64> = predicted.into_data().to_vec().map_err(|e| {
            Error::Evaluation(format!("failed to read predictions: {:?}", e))
        })?;
        let target_vec: Vec<i64> = batch.targets.clone().into_data().to_vec().map_err(|e| {
            Error::Evaluation(format!("failed to read targets: {:?}", e))
        })?;
        let prob_vec: Vec<f32> = probs.into_data().to_vec().map_err(|e| {
            Error::Evaluation(format!("failed to read probabilities: {:?}", e))
        })?;

        predictions.extend(pred_vec.iter().map(|&p| p as usize));
        targets.extend(target_vec.iter().map(|&t| t as usize));
        probabilities.extend(prob_vec.chunks(num_classes).map(|row| row.to_vec()));
    }

    let total_samples = targets.len();
    let correct = predictions
        .iter()
        .zip(targets.iter())
        .filter(|(p, t)| p == t)
        .count();
    let accuracy = correct as f64 / total_samples as f64;

    let confusion = ConfusionMatrix::from_predictions(&predictions, &targets, num_classes);
    let kappa = confusion.cohen_kappa();

    let auc = roc_auc_ovr(&probabilities, &targets, num_classes);
    if !auc.degenerate_classes.is_empty() {
        warn!(
            "Evaluation had degenerate classes {:?}: ROC-AUC restricted to the remaining classes",
            auc.degenerate_classes
        );
    }

    let per_class = (0..num_classes)
        .map(|idx| ClassMetrics::from_confusion_matrix(&confusion, idx))
        .collect();

    info!(
        "Evaluation: accuracy = {:.2}%, kappa = {:.4}, samples = {}",
        accuracy * 100.0,
        kappa,
        total_samples
    );

    Ok(EvaluationReport {
        accuracy,
        kappa,
        roc_auc: auc.macro_auc,
        per_class_auc: auc.per_class,
        degenerate_classes: auc.degenerate_classes,
        per_class,
        confusion,
        predictions,
        targets,
        total_samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{PhaseData, SeverityBatcher, SeverityItem};
    use crate::model::SeverityNetConfig;
    use burn_ndarray::NdArray;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    type TestBackend = NdArray;

    fn tiny_model(device: &<TestBackend as Backend>::Device) -> SeverityNet<TestBackend> {
        let config = SeverityNetConfig {
            num_classes: 3,
            cardinality: 2,
            stem_channels: 4,
            stage_widths: [4, 4, 4, 4],
            stage_depths: [1, 1, 1, 1],
        };
        SeverityNet::new(&config, device).unwrap()
    }

    fn phase(count: usize, seed: u64) -> PhaseData<TestBackend> {
        let device = Default::default();
        let batcher = SeverityBatcher::with_image_size(16);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let items: Vec<SeverityItem> = (0..count)
            .map(|i| {
                let image: Vec<f32> = (0..3 * 16 * 16).map(|_| rng.gen::<f32>()).collect();
                SeverityItem::new(image, i % 3)
            })
            .collect();
        PhaseData::from_items(items, 4, &batcher, &device)
    }

    #[test]
    fn test_accuracy_matches_raw_counts() {
        let device = Default::default();
        let model = tiny_model(&device);
        let report = evaluate(&model, &phase(9, 5)).unwrap();

        let correct = report
            .predictions
            .iter()
            .zip(report.targets.iter())
            .filter(|(p, t)| p == t)
            .count();
        assert_eq!(report.total_samples, 9);
        assert!((report.accuracy - correct as f64 / 9.0).abs() < 1e-12);
        assert_eq!(report.confusion.total(), 9);
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let device = Default::default();
        let model = tiny_model(&device);
        let data = phase(8, 6);

        let a = evaluate(&model, &data).unwrap();
        let b = evaluate(&model, &data).unwrap();

        assert_eq!(a.predictions, b.predictions);
        assert_eq!(a.accuracy, b.accuracy);
        assert_eq!(a.kappa, b.kappa);
    }

    #[test]
    fn test_report_fields_are_consistent() {
        let device = Default::default();
        let model = tiny_model(&device);
        let report = evaluate(&model, &phase(12, 7)).unwrap();

        assert!((0.0..=1.0).contains(&report.accuracy));
        assert!((-1.0..=1.0).contains(&report.kappa));
        assert_eq!(report.per_class.len(), 3);
        assert_eq!(report.per_class_auc.len(), 3);
        if let Some(auc) = report.roc_auc {
            assert!((0.0..=1.0).contains(&auc));
        }

        let table = report.classification_report(&["Low", "Moderate", "Severe"]);
        assert!(table.contains("Moderate"));
        assert!(table.contains("accuracy"));
    }

    #[test]
    fn test_empty_phase_rejected() {
        let device = Default::default();
        let model = tiny_model(&device);
        let empty = PhaseData::<TestBackend>::new(Vec::new());
        assert!(evaluate(&model, &empty).is_err());
    }
}
