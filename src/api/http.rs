//! HTTP surface of the prediction service.
//!
//! `/health` and `/predict` plus the `/ping` and `/invocations` aliases
//! expected by container model hosts.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::common::error::{CoreCode, CoreError};
use crate::inference::domain::PredictRequest;
use crate::inference::AppContext;

/// Build the router around a shared context.
pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ping", get(health_handler))
        .route("/predict", post(predict_handler))
        .route("/invocations", post(predict_handler))
        .with_state(ctx)
}

/// Reports load state in the body; the status code is always 200.
async fn health_handler(State(ctx): State<Arc<AppContext>>) -> Response {
    Json(ctx.health().await).into_response()
}

async fn predict_handler(
    State(ctx): State<Arc<AppContext>>,
    Json(request): Json<PredictRequest>,
) -> Response {
    match ctx.predict(&request.data).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => api_error(&e),
    }
}

fn status_for(code: CoreCode) -> StatusCode {
    match code {
        CoreCode::InvalidInput => StatusCode::BAD_REQUEST,
        CoreCode::ArtifactMissing | CoreCode::ArtifactCorrupt | CoreCode::Io | CoreCode::Config => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        CoreCode::Ok | CoreCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_error(err: &CoreError) -> Response {
    let code = err.code();
    let body = json!({
        "error": {
            "code": code.as_str(),
            "message": err.to_string(),
        }
    });
    (status_for(code), Json(body)).into_response()
}
