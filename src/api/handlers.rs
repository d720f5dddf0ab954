// ============================================================
// HTTP Handlers
// ============================================================
//   GET  /health   → {"status": "healthy"}
//   GET  /metrics  → Prometheus text exposition
//   POST /predict  → multipart field "file" → PredictionResponse
//
// Client mistakes (no file, undecodable image) answer 400 with
// {"detail": "..."}; anything else is a 500 with the same shape.

use std::{sync::Arc, time::Instant};

use anyhow::anyhow;
use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::api::state::AppState;
use crate::domain::prediction::{Prediction, PredictionResponse};
use crate::error::Error;

const FILE_FIELD: &str = "file";

// ─── Errors ───────────────────────────────────────────────────────────────────
#[derive(Debug)]
pub enum ApiError {
    /// 4xx with a message safe to show the caller.
    Client(StatusCode, String),
    Internal(anyhow::Error),
}

impl ApiError {
    fn bad_request(detail: impl Into<String>) -> Self {
        Self::Client(StatusCode::BAD_REQUEST, detail.into())
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        if err.is_client_error() {
            Self::bad_request(err.to_string())
        } else {
            Self::Internal(err.into())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::Client(status, detail) => {
                tracing::warn!(status = status.as_u16(), %detail, "Rejected request");
                (status, detail)
            }
            Self::Internal(err) => {
                tracing::error!("Request failed: {:#}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

// ─── Handlers ─────────────────────────────────────────────────────────────────
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

pub async fn metrics(State(state): State<AppState>) -> Result<Response, ApiError> {
    let body = state.metrics.render().map_err(ApiError::Internal)?;
    Ok(([(header::CONTENT_TYPE, state.metrics.content_type())], body).into_response())
}

struct Upload {
    file_name:    String,
    content_type: String,
    bytes:        Vec<u8>,
}

/// Pull the first `file` field out of the form.
async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Client(e.status(), e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name    = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().unwrap_or("application/octet-stream").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::Client(e.status(), e.body_text()))?;
        return Ok(Upload { file_name, content_type, bytes: bytes.to_vec() });
    }
    Err(ApiError::bad_request(format!("missing multipart field '{FILE_FIELD}'")))
}

pub async fn predict(
    State(state): State<AppState>,
    multipart:    Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let started   = Instant::now();
    let multipart = multipart.map_err(|e| ApiError::Client(e.status(), e.body_text()))?;
    let upload    = read_upload(multipart).await?;

    let preprocessor = state.preprocessor;
    let classifier   = Arc::clone(&state.classifier);
    let bytes        = upload.bytes;

    // Decode, resize and the forward pass are CPU-bound.
    let prediction: Prediction = tokio::task::spawn_blocking(move || -> Result<Prediction, ApiError> {
        let tensor = preprocessor.preprocess_bytes(&bytes)?;
        classifier.classify(&tensor).map_err(ApiError::Internal)
    })
    .await
    .map_err(|e| ApiError::Internal(anyhow!("inference task failed: {e}")))??;

    state.metrics.observe_prediction(prediction.label());

    tracing::info!(
        label        = %prediction.label(),
        confidence   = prediction.confidence(),
        latency_ms   = started.elapsed().as_secs_f64() * 1000.0,
        filename     = %upload.file_name,
        content_type = %upload.content_type,
        "prediction"
    );

    Ok(Json(PredictionResponse::from(&prediction)))
}
