//! Cross-validated grid search over [`HyperGrid`].
//!
//! TODO: Score grid points in parallel; candidates are independent and run one by one today.

use tracing::{debug, info};

use crate::common::error::{CoreError, CoreResult};
use crate::evaluation::service::binary_metrics;

use super::domain::{HyperGrid, Hyperparams, Scoring};
use super::forest::RandomForest;
use super::split::stratified_folds;

/// Mean cross-validation score of one grid point.
#[derive(Clone, Debug, PartialEq)]
pub struct CandidateScore {
    pub params: Hyperparams,
    pub mean_score: f64,
    pub fold_scores: Vec<f64>,
}

/// Outcome of a grid search.
#[derive(Clone, Debug)]
pub struct SearchResult {
    pub best: CandidateScore,
    pub candidates: Vec<CandidateScore>,
}

/// Settings shared by every candidate of one search.
#[derive(Copy, Clone, Debug)]
pub struct SearchSettings {
    pub folds: usize,
    pub scoring: Scoring,
    pub seed: u64,
}

/// Score predicted labels against the truth with the chosen metric.
pub fn score(scoring: Scoring, predictions: &[u8], labels: &[u8]) -> f64 {
    let m = binary_metrics(predictions, labels);
    match scoring {
        Scoring::F1 => m.f1,
        Scoring::Accuracy => m.accuracy,
    }
}

/// Evaluate every grid point with stratified k-fold CV over `rows` and pick
/// the highest mean score. Ties go to the earlier grid point.
pub fn grid_search(
    x: &[Vec<f64>],
    y: &[u8],
    rows: &[usize],
    grid: &HyperGrid,
    settings: SearchSettings,
) -> CoreResult<SearchResult> {
    grid.validate()?;
    let folds = stratified_folds(rows, y, settings.folds, settings.seed)?;

    let mut candidates = Vec::new();
    for params in grid.combinations() {
        let mut fold_scores = Vec::with_capacity(folds.len());
        for (k, held_out) in folds.iter().enumerate() {
            let fit_rows: Vec<usize> = folds
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != k)
                .flat_map(|(_, f)| f.iter().copied())
                .collect();
            let forest = RandomForest::fit(x, y, &fit_rows, &params, settings.seed)?;
            let predictions: Vec<u8> = held_out
                .iter()
                .map(|&r| u8::from(forest.predict_proba(&x[r]) >= 0.5))
                .collect();
            let truth: Vec<u8> = held_out.iter().map(|&r| y[r]).collect();
            fold_scores.push(score(settings.scoring, &predictions, &truth));
        }
        let mean_score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
        debug!(params = %params, mean_score, "scored grid point");
        candidates.push(CandidateScore {
            params,
            mean_score,
            fold_scores,
        });
    }

    let best = candidates
        .iter()
        .fold(None::<&CandidateScore>, |best, c| match best {
            Some(b) if b.mean_score >= c.mean_score => Some(b),
            _ => Some(c),
        })
        .cloned()
        .ok_or_else(|| CoreError::config("hyperparameter grid produced no candidates"))?;

    info!(
        candidates = candidates.len(),
        best = %best.params,
        score = best.mean_score,
        scoring = ?settings.scoring,
        "grid search finished"
    );
    Ok(SearchResult { best, candidates })
}
