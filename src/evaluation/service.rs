//! Metric computation and offline evaluation of a persisted bundle.

use std::collections::BTreeMap;

use tracing::info;

use crate::common::error::{CoreError, CoreResult};
use crate::data::domain::Table;
use crate::training::domain::{ModelBundle, TrainParams};
use crate::training::split::stratified_split;

use super::domain::{BinaryMetrics, ClassScores, ClassificationReport, EvalReport};

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn harmonic(precision: f64, recall: f64) -> f64 {
    if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    }
}

/// Confusion-matrix metrics with class 1 as positive. Pairs beyond the
/// shorter slice are ignored.
pub fn binary_metrics(predictions: &[u8], labels: &[u8]) -> BinaryMetrics {
    let (mut tp, mut fp, mut tn, mut fn_count) = (0usize, 0usize, 0usize, 0usize);
    for (&pred, &label) in predictions.iter().zip(labels) {
        match (pred == 1, label == 1) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, false) => tn += 1,
            (false, true) => fn_count += 1,
        }
    }

    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_count);
    BinaryMetrics {
        accuracy: ratio(tp + tn, tp + fp + tn + fn_count),
        precision,
        recall,
        f1: harmonic(precision, recall),
        tp,
        fp,
        tn,
        fn_count,
    }
}

fn class_scores(predictions: &[u8], labels: &[u8], class: u8) -> ClassScores {
    let mut hit = 0;
    let mut predicted = 0;
    let mut support = 0;
    for (&p, &l) in predictions.iter().zip(labels) {
        if p == class {
            predicted += 1;
        }
        if l == class {
            support += 1;
            if p == class {
                hit += 1;
            }
        }
    }
    let precision = ratio(hit, predicted);
    let recall = ratio(hit, support);
    ClassScores {
        precision,
        recall,
        f1: harmonic(precision, recall),
        support,
    }
}

/// Per-class report over both labels with macro and support-weighted
/// averages.
pub fn classification_report(predictions: &[u8], labels: &[u8]) -> ClassificationReport {
    let per_class = [
        class_scores(predictions, labels, 0),
        class_scores(predictions, labels, 1),
    ];
    let total: usize = per_class.iter().map(|c| c.support).sum();

    let average = |weight: &dyn Fn(&ClassScores) -> f64, norm: f64| ClassScores {
        precision: per_class.iter().map(|c| weight(c) * c.precision).sum::<f64>() / norm,
        recall: per_class.iter().map(|c| weight(c) * c.recall).sum::<f64>() / norm,
        f1: per_class.iter().map(|c| weight(c) * c.f1).sum::<f64>() / norm,
        support: total,
    };
    let macro_avg = average(&|_: &ClassScores| 1.0, per_class.len() as f64);
    let weighted_avg = if total == 0 {
        average(&|_: &ClassScores| 0.0, 1.0)
    } else {
        average(&|c: &ClassScores| c.support as f64, total as f64)
    };

    let accuracy = binary_metrics(predictions, labels).accuracy;
    let mut classes = BTreeMap::new();
    let [negative, positive] = per_class;
    classes.insert("0".to_string(), negative);
    classes.insert("1".to_string(), positive);

    ClassificationReport {
        classes,
        accuracy,
        macro_avg,
        weighted_avg,
    }
}

/// Area under the ROC curve via the rank-sum statistic, averaging ranks of
/// tied scores. `None` unless both classes are present.
pub fn roc_auc(scores: &[f64], labels: &[u8]) -> Option<f64> {
    let n = scores.len().min(labels.len());
    let n_pos = labels[..n].iter().filter(|&&l| l == 1).count();
    let n_neg = n - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // Ranks are 1-based; tied block i..=j shares the mean rank.
        let mean_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            if labels[idx] == 1 {
                rank_sum_pos += mean_rank;
            }
        }
        i = j + 1;
    }

    let u = rank_sum_pos - (n_pos * (n_pos + 1)) as f64 / 2.0;
    Some(u / (n_pos as f64 * n_neg as f64))
}

/// Rebuild the seeded hold-out split of `table`, score its test rows with
/// `bundle` and summarise.
pub fn evaluate(bundle: &ModelBundle, table: &Table, params: &TrainParams) -> CoreResult<EvalReport> {
    let target = table.column_index(&params.target).ok_or_else(|| {
        CoreError::config(format!("target column '{}' not present in table", params.target))
    })?;
    let labels: Vec<u8> = (0..table.n_rows())
        .map(|r| params.label_of(table.cell(r, target)))
        .collect();
    let split = stratified_split(&labels, params.test_size, params.seed)?;

    let probabilities: Vec<f64> = split
        .test
        .iter()
        .map(|&r| bundle.predict_proba(&table.row(r)))
        .collect();
    let predictions: Vec<u8> = probabilities.iter().map(|&p| u8::from(p >= 0.5)).collect();
    let truth: Vec<u8> = split.test.iter().map(|&r| labels[r]).collect();

    let report = EvalReport {
        classification_report: classification_report(&predictions, &truth),
        roc_auc: roc_auc(&probabilities, &truth),
        n_test: truth.len(),
    };
    info!(
        n_test = report.n_test,
        accuracy = report.classification_report.accuracy,
        roc_auc = ?report.roc_auc,
        "evaluated bundle on held-out split"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_predictions() {
        let m = binary_metrics(&[0, 0, 1, 1], &[0, 0, 1, 1]);
        assert!((m.accuracy - 1.0).abs() < 1e-9);
        assert!((m.f1 - 1.0).abs() < 1e-9);
        assert_eq!((m.tp, m.fp, m.tn, m.fn_count), (2, 0, 2, 0));
    }

    #[test]
    fn no_positive_predictions_gives_zero_f1() {
        let m = binary_metrics(&[0, 0, 0], &[1, 0, 0]);
        assert_eq!(m.f1, 0.0);
        assert!((m.accuracy - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn report_averages() {
        let report = classification_report(&[1, 0, 1, 0], &[1, 0, 0, 0]);
        let pos = &report.classes["1"];
        assert_eq!(pos.support, 1);
        assert!((pos.precision - 0.5).abs() < 1e-9);
        assert!((pos.recall - 1.0).abs() < 1e-9);
        let neg = &report.classes["0"];
        assert!((neg.precision - 1.0).abs() < 1e-9);
        assert!((neg.recall - 2.0 / 3.0).abs() < 1e-9);
        assert!((report.macro_avg.recall - (1.0 + 2.0 / 3.0) / 2.0).abs() < 1e-9);
        assert!((report.weighted_avg.recall - 0.75).abs() < 1e-9);
        assert_eq!(report.accuracy, 0.75);
    }

    #[test]
    fn auc_matches_known_values() {
        assert_eq!(roc_auc(&[0.1, 0.4, 0.35, 0.8], &[0, 0, 1, 1]), Some(0.75));
        assert_eq!(roc_auc(&[0.2, 0.9], &[0, 1]), Some(1.0));
        assert_eq!(roc_auc(&[0.5, 0.5], &[0, 1]), Some(0.5));
        assert_eq!(roc_auc(&[0.5, 0.7], &[1, 1]), None);
    }
}
