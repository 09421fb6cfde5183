use std::fs;
use std::path::Path;

use serde_json::{json, Map, Value};

use mlcore::common::error::CoreCode;
use mlcore::data::domain::Table;
use mlcore::data::service::{load_table, write_table};
use mlcore::evaluation::service::evaluate;
use mlcore::features::encode;
use mlcore::training::domain::{ArtifactStore, HyperGrid, ModelParams};
use mlcore::training::{train, FsArtifactStore, TrainParams};

fn bank_table(n: usize) -> Table {
    let header = vec!["job".to_string(), "age".to_string(), "y".to_string()];
    let rows = (0..n)
        .map(|i| {
            let job = if i % 3 == 0 { "admin" } else { "blue-collar" };
            let age = 20 + (i * 7) % 60;
            let y = if age >= 55 || (job == "admin" && age < 30) { "yes" } else { "no" };
            vec![job.to_string(), age.to_string(), y.to_string()]
        })
        .collect();
    Table::new(header, rows).unwrap()
}

fn params() -> TrainParams {
    TrainParams {
        model: ModelParams {
            grid: HyperGrid {
                n_estimators: vec![8],
                max_depth: vec![Some(4), None],
                min_samples_split: vec![2, 6],
            },
        },
        ..TrainParams::default()
    }
}

fn store(dir: &Path) -> FsArtifactStore {
    FsArtifactStore::with_paths(
        &dir.join("artifacts/model.json"),
        &dir.join("artifacts/feature_info.json"),
        &dir.join("artifacts/metrics.json"),
    )
}

fn record(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

#[test]
fn reloaded_bundle_scores_identically() {
    let dir = tempfile::tempdir().unwrap();
    train(&bank_table(150), &params(), &store(dir.path())).unwrap();

    let bundle = store(dir.path()).load().unwrap();
    let rec = record(json!({"job": "admin", "age": 25}));
    let first = bundle.predict_proba(&rec);
    let second = bundle.predict_proba(&rec);
    assert_eq!(first.to_bits(), second.to_bits());
    assert!((0.0..=1.0).contains(&first));
}

#[test]
fn unseen_category_encodes_to_zero_indicators() {
    let dir = tempfile::tempdir().unwrap();
    let outcome = train(&bank_table(90), &params(), &store(dir.path())).unwrap();
    let schema = &outcome.bundle.schema;
    assert_eq!(schema.vocab("job"), ["admin", "blue-collar"]);

    let rec = record(json!({"job": "unknown-value", "age": 40}));
    assert_eq!(encode(schema, &rec), vec![0.0, 0.0, 40.0]);
    let p = outcome.bundle.predict_proba(&rec);
    assert!((0.0..=1.0).contains(&p));

    let empty = Map::new();
    assert_eq!(encode(schema, &empty), encode(schema, &empty));
    assert_eq!(encode(schema, &empty).len(), schema.width());
}

#[test]
fn staged_csv_round_trip_trains_the_same_model() {
    let dir = tempfile::tempdir().unwrap();
    let staged = dir.path().join("staged/data.csv");
    write_table(&bank_table(120), &staged).unwrap();
    let reloaded = load_table(&staged).unwrap();

    let a = train(&bank_table(120), &params(), &store(&dir.path().join("a"))).unwrap();
    let b = train(&reloaded, &params(), &store(&dir.path().join("b"))).unwrap();
    assert_eq!(a.bundle.schema, b.bundle.schema);
    assert_eq!(a.bundle.model, b.bundle.model);
    assert_eq!(a.report, b.report);
}

#[test]
fn tampered_fingerprint_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());
    train(&bank_table(90), &params(), &store).unwrap();

    let raw = fs::read_to_string(store.model_path()).unwrap();
    let mut bundle: Value = serde_json::from_str(&raw).unwrap();
    bundle["schema_fingerprint"] = json!("0000");
    fs::write(store.model_path(), serde_json::to_vec(&bundle).unwrap()).unwrap();

    let err = store.load().unwrap_err();
    assert_eq!(err.code(), CoreCode::ArtifactCorrupt);
}

#[test]
fn metrics_report_has_expected_fields() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());
    let outcome = train(&bank_table(100), &params(), &store).unwrap();

    let raw = fs::read_to_string(store.metrics_path()).unwrap();
    let report: Value = serde_json::from_str(&raw).unwrap();
    for key in ["best_params", "accuracy", "f1", "n_train", "n_test"] {
        assert!(report.get(key).is_some(), "metrics.json lacks {key}");
    }
    assert_eq!(report["n_train"], outcome.report.n_train);

    let schema: Value =
        serde_json::from_str(&fs::read_to_string(store.schema_path()).unwrap()).unwrap();
    assert_eq!(schema["categorical"], json!(["job"]));
    assert_eq!(schema["numeric"], json!(["age"]));
}

#[test]
fn evaluation_uses_the_training_hold_out() {
    let dir = tempfile::tempdir().unwrap();
    let table = bank_table(150);
    let outcome = train(&table, &params(), &store(dir.path())).unwrap();

    let report = evaluate(&outcome.bundle, &table, &params()).unwrap();
    assert_eq!(report.n_test, outcome.report.n_test);
    assert!((report.classification_report.accuracy - outcome.report.accuracy).abs() < 1e-12);
    if let Some(auc) = report.roc_auc {
        assert!((0.0..=1.0).contains(&auc));
    }
}
