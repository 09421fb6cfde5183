//! Training orchestration: split, extract the schema, search the grid,
//! refit, score the hold-out and persist.
//!
//! TODO: Re-extract the schema per CV fold so fold scores never count
//! categories seen only in their own held-out rows.

use tracing::{info, warn};

use crate::common::error::{CoreError, CoreResult};
use crate::common::time;
use crate::data::domain::Table;
use crate::evaluation::service::binary_metrics;
use crate::features::{encode_table, Schema};

use super::domain::{ArtifactStore, ModelBundle, TrainParams, TrainReport};
use super::forest::RandomForest;
use super::search::{grid_search, SearchSettings};
use super::split::{class_count, stratified_split};

/// Everything a successful run produced.
#[derive(Clone, Debug)]
pub struct TrainOutcome {
    pub bundle: ModelBundle,
    pub report: TrainReport,
}

/// Fit, select and persist a classifier for `table`.
///
/// Nothing is written to `store` unless every step succeeds.
pub fn train(
    table: &Table,
    params: &TrainParams,
    store: &dyn ArtifactStore,
) -> CoreResult<TrainOutcome> {
    params.validate()?;
    let target = table.column_index(&params.target).ok_or_else(|| {
        CoreError::config(format!(
            "target column '{}' not present in table",
            params.target
        ))
    })?;
    if table.n_rows() == 0 {
        return Err(CoreError::invalid("training table has no rows"));
    }

    let labels: Vec<u8> = (0..table.n_rows())
        .map(|r| params.label_of(table.cell(r, target)))
        .collect();
    let split = stratified_split(&labels, params.test_size, params.seed)?;
    if class_count(&split.train, &labels) < 2 {
        return Err(CoreError::config(format!(
            "training split needs both classes; no row has {} = '{}' or every row does",
            params.target, params.positive_label
        )));
    }

    let schema = Schema::extract(&table.select_rows(&split.train), &params.target)?;
    let x = encode_table(&schema, table);
    info!(
        rows = table.n_rows(),
        n_train = split.train.len(),
        n_test = split.test.len(),
        width = schema.width(),
        "encoded training table"
    );

    let search = grid_search(
        &x,
        &labels,
        &split.train,
        &params.model.grid,
        SearchSettings {
            folds: params.cv_folds,
            scoring: params.scoring,
            seed: params.seed,
        },
    )?;
    let best = search.best;

    let model = RandomForest::fit(&x, &labels, &split.train, &best.params, params.seed)?;
    let predictions: Vec<u8> = split
        .test
        .iter()
        .map(|&r| u8::from(model.predict_proba(&x[r]) >= 0.5))
        .collect();
    let truth: Vec<u8> = split.test.iter().map(|&r| labels[r]).collect();
    if truth.is_empty() {
        warn!("hold-out split is empty; test metrics are zero");
    }
    let metrics = binary_metrics(&predictions, &truth);

    let report = TrainReport {
        best_params: best.params.clone(),
        scoring: params.scoring,
        cv_score: best.mean_score,
        accuracy: metrics.accuracy,
        f1: metrics.f1,
        n_train: split.train.len(),
        n_test: split.test.len(),
    };
    let bundle = ModelBundle::new(schema, best.params, model, time::now_ms())?;
    store.save(&bundle, &report)?;

    info!(
        best = %report.best_params,
        cv_score = report.cv_score,
        test = %metrics,
        "training finished"
    );
    Ok(TrainOutcome { bundle, report })
}
