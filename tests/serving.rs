use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use mlcore::api::router;
use mlcore::common::error::CoreResult;
use mlcore::data::domain::Table;
use mlcore::inference::{AppContext, MetricsSink};
use mlcore::training::domain::{ArtifactStore, HyperGrid, ModelBundle, ModelParams, TrainReport};
use mlcore::training::{train, FsArtifactStore, TrainParams};

/// Delegating store that counts loads.
struct CountingStore {
    inner: FsArtifactStore,
    loads: AtomicUsize,
}

impl ArtifactStore for CountingStore {
    fn save(&self, bundle: &ModelBundle, report: &TrainReport) -> CoreResult<()> {
        self.inner.save(bundle, report)
    }

    fn load(&self) -> CoreResult<ModelBundle> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load()
    }
}

fn fs_store(dir: &Path) -> FsArtifactStore {
    FsArtifactStore::with_paths(
        &dir.join("model.json"),
        &dir.join("feature_info.json"),
        &dir.join("metrics.json"),
    )
}

fn train_into(store: &dyn ArtifactStore) {
    let header = vec!["job".to_string(), "age".to_string(), "y".to_string()];
    let rows = (0..90)
        .map(|i| {
            let job = if i % 2 == 0 { "admin" } else { "blue-collar" };
            let age = 18 + (i * 11) % 70;
            let y = if age > 60 || (job == "admin" && i % 5 == 0) { "yes" } else { "no" };
            vec![job.to_string(), age.to_string(), y.to_string()]
        })
        .collect();
    let table = Table::new(header, rows).unwrap();
    let params = TrainParams {
        model: ModelParams {
            grid: HyperGrid {
                n_estimators: vec![6],
                max_depth: vec![Some(5)],
                min_samples_split: vec![2],
            },
        },
        ..TrainParams::default()
    };
    train(&table, &params, store).unwrap();
}

fn app_with(store: Arc<dyn ArtifactStore>) -> Router {
    router(Arc::new(AppContext::new(store, MetricsSink::disabled())))
}

async fn get(app: &Router, uri: &str) -> Response {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.clone().oneshot(req).await.unwrap()
}

async fn post(app: &Router, uri: &str, body: &str) -> Response {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.clone().oneshot(req).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn assert_valid_prediction(body: &Value) {
    let prediction = body["prediction"].as_u64().unwrap();
    let probability = body["probability"].as_f64().unwrap();
    assert!(prediction == 0 || prediction == 1);
    assert!((0.0..=1.0).contains(&probability));
    assert_eq!(prediction == 1, probability >= 0.5);
    assert!(body["latency_ms"].as_f64().unwrap() >= 0.0);
}

#[tokio::test]
async fn health_turns_ok_once_artifact_appears() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with(Arc::new(fs_store(dir.path())));

    let body = json_body(get(&app, "/health").await).await;
    assert_eq!(body["status"], "error");

    train_into(&fs_store(dir.path()));

    for _ in 0..3 {
        let response = get(&app, "/health").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }
    assert_eq!(json_body(get(&app, "/ping").await).await["status"], "ok");
}

#[tokio::test]
async fn empty_record_still_predicts() {
    let dir = tempfile::tempdir().unwrap();
    train_into(&fs_store(dir.path()));
    let app = app_with(Arc::new(fs_store(dir.path())));

    let response = post(&app, "/predict", r#"{"data": {}}"#).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_valid_prediction(&json_body(response).await);
}

#[tokio::test]
async fn malformed_fields_degrade_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    train_into(&fs_store(dir.path()));
    let app = app_with(Arc::new(fs_store(dir.path())));

    for body in [
        r#"{"data": {"job": "unknown-value", "age": 40}}"#,
        r#"{"data": {"job": 7, "age": "forty", "extra": [1, 2]}}"#,
        r#"{"data": {"job": null, "age": null}}"#,
    ] {
        let response = post(&app, "/invocations", body).await;
        assert_eq!(response.status(), StatusCode::OK, "body {body}");
        assert_valid_prediction(&json_body(response).await);
    }
}

#[tokio::test]
async fn concurrent_first_requests_load_once() {
    let dir = tempfile::tempdir().unwrap();
    train_into(&fs_store(dir.path()));
    let store = Arc::new(CountingStore {
        inner: fs_store(dir.path()),
        loads: AtomicUsize::new(0),
    });
    let app = app_with(store.clone());

    let mut handles = Vec::new();
    for i in 0..16 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            let body = format!(r#"{{"data": {{"job": "admin", "age": {}}}}}"#, 20 + i);
            post(&app, "/predict", &body).await.status()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::OK);
    }
    assert_eq!(store.loads.load(Ordering::SeqCst), 1);
}
