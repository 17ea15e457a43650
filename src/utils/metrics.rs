//! Classification metrics for severity evaluation.
//!
//! Provides the numeric core consumed by the evaluation module:
//! - Confusion matrix (class x class count grid)
//! - Per-class precision, recall, F1 and support
//! - Cohen's Kappa (chance-corrected agreement)
//! - One-vs-rest ROC-AUC for multi-class probability outputs
//!
//! Degenerate inputs (a class with no positives or no negatives in the
//! evaluated set) are reported back to the caller rather than silently
//! folded into an average.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Confusion matrix for multi-class classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// Number of classes
    pub num_classes: usize,

    /// Matrix data (row = actual, column = predicted), row-major
    pub matrix: Vec<usize>,
}

impl ConfusionMatrix {
    /// Create a new empty confusion matrix
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            matrix: vec![0; num_classes * num_classes],
        }
    }

    /// Create confusion matrix from predictions and ground truth
    pub fn from_predictions(
        predictions: &[usize],
        ground_truth: &[usize],
        num_classes: usize,
    ) -> Self {
        let mut cm = Self::new(num_classes);
        for (&pred, &actual) in predictions.iter().zip(ground_truth.iter()) {
            cm.add(actual, pred);
        }
        cm
    }

    /// Add a single prediction to the matrix
    pub fn add(&mut self, actual: usize, predicted: usize) {
        if actual < self.num_classes && predicted < self.num_classes {
            self.matrix[actual * self.num_classes + predicted] += 1;
        }
    }

    /// Get the count at (actual, predicted)
    pub fn get(&self, actual: usize, predicted: usize) -> usize {
        if actual < self.num_classes && predicted < self.num_classes {
            self.matrix[actual * self.num_classes + predicted]
        } else {
            0
        }
    }

    /// Total number of samples
    pub fn total(&self) -> usize {
        self.matrix.iter().sum()
    }

    /// Number of correct predictions (diagonal sum)
    pub fn correct(&self) -> usize {
        (0..self.num_classes).map(|i| self.get(i, i)).sum()
    }

    /// Overall accuracy
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total > 0 {
            self.correct() as f64 / total as f64
        } else {
            0.0
        }
    }

    /// Row sums (actual class counts)
    pub fn row_sums(&self) -> Vec<usize> {
        (0..self.num_classes)
            .map(|row| (0..self.num_classes).map(|col| self.get(row, col)).sum())
            .collect()
    }

    /// Column sums (predicted class counts)
    pub fn col_sums(&self) -> Vec<usize> {
        (0..self.num_classes)
            .map(|col| (0..self.num_classes).map(|row| self.get(row, col)).sum())
            .collect()
    }

    /// Cohen's Kappa: agreement between predictions and labels beyond chance.
    ///
    /// `kappa = (p_o - p_e) / (1 - p_e)` where `p_o` is the observed
    /// agreement and `p_e` the agreement expected from the marginals. When
    /// chance agreement saturates (`p_e == 1`, a single class on both axes)
    /// the statistic is undefined and 0.0 is returned.
    pub fn cohen_kappa(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let n = total as f64;
        let p_o = self.correct() as f64 / n;
        let rows = self.row_sums();
        let cols = self.col_sums();
        let p_e: f64 = rows
            .iter()
            .zip(cols.iter())
            .map(|(&r, &c)| (r as f64 / n) * (c as f64 / n))
            .sum();

        if (1.0 - p_e).abs() < f64::EPSILON {
            return 0.0;
        }
        (p_o - p_e) / (1.0 - p_e)
    }

    /// Pretty print the matrix (rows = actual, cols = predicted)
    pub fn display(&self, class_names: Option<&[&str]>) -> String {
        let mut out = String::from("\nConfusion matrix (rows=actual, cols=predicted):\n\n");

        out.push_str("          ");
        for col in 0..self.num_classes {
            match class_names {
                Some(names) => {
                    let name = names.get(col).unwrap_or(&"?");
                    out.push_str(&format!("{:>9}", &name[..name.len().min(9)]));
                }
                None => out.push_str(&format!("{:>9}", col)),
            }
        }
        out.push('\n');

        for row in 0..self.num_classes {
            match class_names {
                Some(names) => {
                    let name = names.get(row).unwrap_or(&"?");
                    out.push_str(&format!("{:>9} ", &name[..name.len().min(9)]));
                }
                None => out.push_str(&format!("{:>9} ", row)),
            }
            for col in 0..self.num_classes {
                let count = self.get(row, col);
                if row == col {
                    out.push_str(&format!("  [{:>4}] ", count));
                } else {
                    out.push_str(&format!("   {:>4}  ", count));
                }
            }
            out.push('\n');
        }

        out.push_str(&format!("\nAccuracy: {:.2}%\n", self.accuracy() * 100.0));
        out
    }
}

impl std::fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display(None))
    }
}

/// Per-class metrics derived from a confusion matrix
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassMetrics {
    /// Class index
    pub class_idx: usize,

    /// Precision = TP / (TP + FP)
    pub precision: f64,

    /// Recall = TP / (TP + FN)
    pub recall: f64,

    /// F1 = 2 * precision * recall / (precision + recall)
    pub f1: f64,

    /// Number of actual samples of this class
    pub support: usize,
}

impl ClassMetrics {
    /// Calculate metrics for one class from a confusion matrix
    pub fn from_confusion_matrix(cm: &ConfusionMatrix, class_idx: usize) -> Self {
        let true_positives = cm.get(class_idx, class_idx);

        let false_positives: usize = (0..cm.num_classes)
            .filter(|&i| i != class_idx)
            .map(|i| cm.get(i, class_idx))
            .sum();

        let false_negatives: usize = (0..cm.num_classes)
            .filter(|&i| i != class_idx)
            .map(|i| cm.get(class_idx, i))
            .sum();

        let support = true_positives + false_negatives;

        let precision = if true_positives + false_positives > 0 {
            true_positives as f64 / (true_positives + false_positives) as f64
        } else {
            0.0
        };

        let recall = if support > 0 {
            true_positives as f64 / support as f64
        } else {
            0.0
        };

        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            class_idx,
            precision,
            recall,
            f1,
            support,
        }
    }
}

/// One-vs-rest ROC-AUC result across all classes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocAuc {
    /// AUC per class; `None` where the class was degenerate in this set
    pub per_class: Vec<Option<f64>>,

    /// Macro average over the non-degenerate classes
    pub macro_auc: Option<f64>,

    /// Classes that had no positives or no negatives
    pub degenerate_classes: Vec<usize>,
}

/// Compute one-vs-rest ROC-AUC from per-sample probability rows.
///
/// `probabilities[i]` is the softmax row for sample `i` (length
/// `num_classes`), `targets[i]` the true class index. Each class is
/// binarized against the rest and scored by its predicted probability; the
/// AUC is the Mann-Whitney rank statistic with midranks for ties. A class
/// absent from the targets (or covering all of them) has no defined AUC; it
/// is recorded in `degenerate_classes` and excluded from the macro average.
pub fn roc_auc_ovr(probabilities: &[Vec<f32>], targets: &[usize], num_classes: usize) -> RocAuc {
    let mut per_class: Vec<Option<f64>> = Vec::with_capacity(num_classes);
    let mut degenerate = Vec::new();

    for class_idx in 0..num_classes {
        let n_pos = targets.iter().filter(|&&t| t == class_idx).count();
        let n_neg = targets.len() - n_pos;

        if n_pos == 0 || n_neg == 0 {
            warn!(
                "ROC-AUC undefined for class {}: {} positive / {} negative samples",
                class_idx, n_pos, n_neg
            );
            degenerate.push(class_idx);
            per_class.push(None);
            continue;
        }

        let scores: Vec<(f64, bool)> = probabilities
            .iter()
            .zip(targets.iter())
            .map(|(row, &t)| (row[class_idx] as f64, t == class_idx))
            .collect();

        per_class.push(Some(binary_auc(scores, n_pos, n_neg)));
    }

    let defined: Vec<f64> = per_class.iter().filter_map(|a| *a).collect();
    let macro_auc = if defined.is_empty() {
        None
    } else {
        Some(defined.iter().sum::<f64>() / defined.len() as f64)
    };

    RocAuc {
        per_class,
        macro_auc,
        degenerate_classes: degenerate,
    }
}

/// Rank-based binary AUC with midranks for tied scores.
fn binary_auc(mut scores: Vec<(f64, bool)>, n_pos: usize, n_neg: usize) -> f64 {
    scores.sort_by(|a, b| a.0.total_cmp(&b.0));

    // Sum of positive ranks, averaging ranks within tie groups.
    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < scores.len() {
        let mut j = i;
        while j < scores.len() && scores[j].0 == scores[i].0 {
            j += 1;
        }
        // Ranks are 1-based; ties share the group mean rank.
        let mid_rank = ((i + 1) + j) as f64 / 2.0;
        let pos_in_group = scores[i..j].iter().filter(|(_, p)| *p).count();
        rank_sum_pos += mid_rank * pos_in_group as f64;
        i = j;
    }

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    (rank_sum_pos - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confusion_matrix_counts() {
        let predictions = vec![0, 1, 2, 0, 1, 2, 0, 0, 2, 2];
        let ground_truth = vec![0, 1, 2, 0, 2, 2, 1, 0, 1, 2];

        let cm = ConfusionMatrix::from_predictions(&predictions, &ground_truth, 3);

        assert_eq!(cm.get(0, 0), 3);
        assert_eq!(cm.get(1, 1), 1);
        assert_eq!(cm.get(2, 2), 3);
        assert_eq!(cm.total(), 10);
        assert_eq!(cm.correct(), 7);
        assert!((cm.accuracy() - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_class_metrics() {
        let predictions = vec![0, 0, 0, 1, 1];
        let ground_truth = vec![0, 0, 1, 1, 0];

        let cm = ConfusionMatrix::from_predictions(&predictions, &ground_truth, 2);
        let class0 = ClassMetrics::from_confusion_matrix(&cm, 0);

        // Class 0: TP=2, FP=1, FN=1
        assert!((class0.precision - 2.0 / 3.0).abs() < 1e-9);
        assert!((class0.recall - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(class0.support, 3);
    }

    #[test]
    fn test_kappa_perfect_agreement() {
        let labels = vec![0, 1, 2, 0, 1, 2];
        let cm = ConfusionMatrix::from_predictions(&labels, &labels, 3);
        assert!((cm.cohen_kappa() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_kappa_known_value() {
        // Classic 2x2 example: p_o = 0.7, p_e = 0.5 -> kappa = 0.4
        let mut cm = ConfusionMatrix::new(2);
        cm.matrix = vec![35, 15, 15, 35];
        assert!((cm.cohen_kappa() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_kappa_degenerate_single_class() {
        let labels = vec![1, 1, 1, 1];
        let cm = ConfusionMatrix::from_predictions(&labels, &labels, 3);
        assert_eq!(cm.cohen_kappa(), 0.0);
    }

    #[test]
    fn test_roc_auc_perfect_ranking() {
        let probabilities = vec![
            vec![0.9, 0.05, 0.05],
            vec![0.8, 0.1, 0.1],
            vec![0.1, 0.8, 0.1],
            vec![0.05, 0.9, 0.05],
            vec![0.1, 0.1, 0.8],
            vec![0.05, 0.05, 0.9],
        ];
        let targets = vec![0, 0, 1, 1, 2, 2];

        let auc = roc_auc_ovr(&probabilities, &targets, 3);
        assert!(auc.degenerate_classes.is_empty());
        assert!((auc.macro_auc.unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_roc_auc_uninformative_scores() {
        // Constant scores rank nothing: midranks give AUC = 0.5.
        let probabilities = vec![vec![0.5, 0.5]; 6];
        let targets = vec![0, 0, 0, 1, 1, 1];

        let auc = roc_auc_ovr(&probabilities, &targets, 2);
        assert!((auc.per_class[0].unwrap() - 0.5).abs() < 1e-9);
        assert!((auc.per_class[1].unwrap() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_roc_auc_degenerate_class() {
        let probabilities = vec![vec![0.7, 0.2, 0.1], vec![0.6, 0.3, 0.1]];
        let targets = vec![0, 0];

        let auc = roc_auc_ovr(&probabilities, &targets, 3);
        // Class 0 covers every sample; classes 1 and 2 have none.
        assert_eq!(auc.degenerate_classes, vec![0, 1, 2]);
        assert!(auc.macro_auc.is_none());
    }

    #[test]
    fn test_roc_auc_reversed_ranking() {
        let probabilities = vec![vec![0.1], vec![0.2], vec![0.8], vec![0.9]];
        // Positives scored lowest -> AUC 0.
        let targets = vec![0, 0, 1, 1];
        let probabilities: Vec<Vec<f32>> = probabilities
            .into_iter()
            .map(|row| vec![row[0], 1.0 - row[0]])
            .collect();

        let auc = roc_auc_ovr(&probabilities, &targets, 2);
        assert!((auc.per_class[0].unwrap() - 0.0).abs() < 1e-9);
        assert!((auc.per_class[1].unwrap() - 0.0).abs() < 1e-9);
    }
}
