use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use crate::error::PredictError;
use crate::pipeline::{summarize, InferencePipeline, PreparedInput};
use crate::types::{FeatureRequest, FeatureRow, FieldSpec, Prediction, FIELD_SPECS};

// ---------- Server state ----------

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<InferencePipeline>,
    pub log_pred: bool,
}

// ---------- Response types ----------

#[derive(Serialize)]
struct PredictOut {
    t: i64,
    prediction_kw: f64,
    unit: &'static str,
    display: String,
}

impl PredictOut {
    fn new(p: Prediction) -> Self {
        Self {
            t: now_ms(),
            prediction_kw: p.value_kw,
            unit: p.unit,
            display: p.display,
        }
    }
}

#[derive(Serialize)]
struct ExplainOut {
    #[serde(flatten)]
    prediction: PredictOut,
    #[serde(flatten)]
    input: PreparedInput,
}

#[derive(Serialize)]
struct FormOut {
    fields: &'static [FieldSpec],
    descriptions: Vec<String>,
    default_description: Option<String>,
}

/// Per-request failure rendered as `{"error", "kind"}`.
pub enum ApiError {
    /// The body is not a JSON feature row.
    Body(JsonRejection),
    Predict(PredictError),
}

impl From<PredictError> for ApiError {
    fn from(e: PredictError) -> Self {
        Self::Predict(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::Body(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            ApiError::Body(rejection) => {
                tracing::info!(kind = "bad_request", "rejected body: {}", rejection.body_text());
                (rejection.status(), "bad_request", rejection.body_text())
            }
            ApiError::Predict(e) if e.is_user_error() => {
                tracing::info!(kind = e.kind(), "rejected request: {}", e);
                (StatusCode::UNPROCESSABLE_ENTITY, e.kind(), e.to_string())
            }
            ApiError::Predict(e) => {
                tracing::error!(kind = e.kind(), "artifact/schema inconsistency: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.kind(), e.to_string())
            }
        };
        (status, Json(json!({ "error": message, "kind": kind }))).into_response()
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

// ---------- Handlers ----------

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "columns": state.pipeline.bundle().schema.len(),
    }))
}

async fn form(State(state): State<AppState>) -> Json<FormOut> {
    let categories = &state.pipeline.bundle().categories;
    Json(FormOut {
        fields: &FIELD_SPECS,
        descriptions: categories.labels().to_vec(),
        default_description: categories.default_label().map(str::to_string),
    })
}

fn run(state: &AppState, row: &FeatureRow) -> Result<(Prediction, PreparedInput), PredictError> {
    row.validate()?;
    let prepared = state.pipeline.prepare(row)?;

    // Debug signal so we can confirm we're not sending all-zeros
    if state.log_pred {
        tracing::info!(
            "recv description={:?} pre_scale: {}",
            row.description,
            summarize(&prepared.columns, &prepared.pre_scale)
        );
        tracing::info!("scaled: {}", summarize(&prepared.columns, &prepared.scaled));
    }

    let prediction = state.pipeline.score(&prepared)?;
    Ok((prediction, prepared))
}

fn into_row(state: &AppState, body: Result<Json<FeatureRequest>, JsonRejection>) -> Result<FeatureRow, ApiError> {
    let Json(req) = body?;
    let default_label = state.pipeline.bundle().categories.default_label();
    Ok(req.into_row(default_label))
}

async fn predict(
    State(state): State<AppState>,
    body: Result<Json<FeatureRequest>, JsonRejection>,
) -> Result<Json<PredictOut>, ApiError> {
    let row = into_row(&state, body)?;
    let (prediction, _) = run(&state, &row)?;
    Ok(Json(PredictOut::new(prediction)))
}

async fn explain(
    State(state): State<AppState>,
    body: Result<Json<FeatureRequest>, JsonRejection>,
) -> Result<Json<ExplainOut>, ApiError> {
    let row = into_row(&state, body)?;
    let (prediction, input) = run(&state, &row)?;
    Ok(Json(ExplainOut {
        prediction: PredictOut::new(prediction),
        input,
    }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/form", get(form))
        .route("/predict", post(predict))
        .route("/predict/explain", post(explain))
        .with_state(state)
}
