//! # API REST
//!
//! REST API implementation for SPMR.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI documentation
//! - REST-specific concerns (JSON serialization, CORS, bearer tokens)
//!
//! Uses `api-shared` for common types and utilities.

#![warn(rust_2018_idioms)]

pub mod auth;

use api_shared::{
    ErrorRes, HealthRes, HealthService, JwtKeys, LatestAnalysisRes, ListAlertsRes,
    ListReadingsRes, Role, SaveVitalsReq, SaveVitalsRes,
};
use auth::{AuthRejection, AuthUser};
use axum::{
    extract::{rejection::JsonRejection, FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use spmr_core::{PatientId, TriageError, TriageService, TriageSubmission};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;

/// Application state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub triage: TriageService,
    pub keys: JwtKeys,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(health, save_vitals, latest_analysis, list_vitals, list_alerts),
    components(schemas(
        HealthRes,
        ErrorRes,
        Role,
        SaveVitalsReq,
        SaveVitalsRes,
        api_shared::AnalysisRes,
        api_shared::VitalsDto,
        api_shared::ClassificationDto,
        LatestAnalysisRes,
        api_shared::ReadingRes,
        ListReadingsRes,
        api_shared::AlertRes,
        ListAlertsRes,
    ))
)]
pub struct ApiDoc;

/// Builds the REST router over `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api-docs/openapi.json", get(openapi_json))
        .route("/vitals", post(save_vitals))
        .route("/patients/:id/analysis", get(latest_analysis))
        .route("/patients/:id/vitals", get(list_vitals))
        .route("/patients/:id/alerts", get(list_alerts))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Errors a handler can return, mapped onto HTTP status codes.
#[derive(Debug)]
pub enum ApiError {
    Auth(AuthRejection),
    BadRequest(String),
    NotFound(String),
    Internal(&'static str),
}

impl From<AuthRejection> for ApiError {
    fn from(rejection: AuthRejection) -> Self {
        ApiError::Auth(rejection)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            ApiError::Auth(rejection) => return rejection.into_response(),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.to_string()),
        };
        (status, Json(ErrorRes::new(msg))).into_response()
    }
}

fn parse_patient_id(raw: &str) -> Result<PatientId, ApiError> {
    PatientId::parse(raw).map_err(|e| ApiError::BadRequest(format!("invalid patient_id: {e}")))
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for monitoring and load balancers. No token required.
#[axum::debug_handler]
async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[utoipa::path(
    post,
    path = "/vitals",
    request_body = SaveVitalsReq,
    responses(
        (status = 201, description = "Reading stored and classified", body = SaveVitalsRes),
        (status = 400, description = "Missing patient_id or vitals", body = ErrorRes),
        (status = 401, description = "Missing or invalid token", body = ErrorRes),
        (status = 500, description = "Reading could not be persisted", body = ErrorRes)
    )
)]
/// Submit a vitals reading for triage.
///
/// The reading is stored, classified, and if severe enough an alert is stored and sent to the
/// configured channels. Once the reading is stored the request succeeds, whatever happens to
/// the classifier or the channels.
///
/// # Errors
/// Returns `400 Bad Request` if the body is not JSON, or if `patient_id` or `vitals` is missing.
/// Returns `500 Internal Server Error` if the reading could not be written.
#[axum::debug_handler]
async fn save_vitals(
    State(state): State<AppState>,
    user: AuthUser,
    body: Result<Json<SaveVitalsReq>, JsonRejection>,
) -> Result<(StatusCode, Json<SaveVitalsRes>), ApiError> {
    user.require(Role::ANY)?;
    let Json(req) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    match state.triage.submit(TriageSubmission::from(req)).await {
        Ok(outcome) => {
            tracing::info!(
                "vitals from {} for patient {} classified {}",
                user.subject(),
                outcome.reading.patient_id,
                outcome.classification.label
            );
            Ok((StatusCode::CREATED, Json(SaveVitalsRes::from(&outcome))))
        }
        Err(TriageError::Validation(msg)) => Err(ApiError::BadRequest(msg)),
        Err(e) => {
            tracing::error!("save vitals error: {}", e);
            Err(ApiError::Internal("failed to persist reading"))
        }
    }
}

#[utoipa::path(
    get,
    path = "/patients/{id}/analysis",
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Latest reading, re-classified", body = LatestAnalysisRes),
        (status = 404, description = "No readings for this patient", body = ErrorRes)
    )
)]
/// Re-classify the patient's most recent reading. Never raises an alert.
#[axum::debug_handler]
async fn latest_analysis(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<LatestAnalysisRes>, ApiError> {
    user.require(Role::ANY)?;
    let patient_id = parse_patient_id(&id)?;

    match state.triage.latest_analysis(&patient_id).await {
        Ok(Some(analysis)) => Ok(Json(LatestAnalysisRes::from(&analysis))),
        Ok(None) => Err(ApiError::NotFound(format!(
            "no readings for patient {patient_id}"
        ))),
        Err(e) => {
            tracing::error!("latest analysis error: {}", e);
            Err(ApiError::Internal("Internal error"))
        }
    }
}

#[utoipa::path(
    get,
    path = "/patients/{id}/vitals",
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Stored readings, oldest first", body = ListReadingsRes)
    )
)]
#[axum::debug_handler]
async fn list_vitals(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ListReadingsRes>, ApiError> {
    user.require(Role::ANY)?;
    let patient_id = parse_patient_id(&id)?;

    let readings = state.triage.readings(&patient_id).await.map_err(|e| {
        tracing::error!("list readings error: {}", e);
        ApiError::Internal("Internal error")
    })?;
    Ok(Json(ListReadingsRes {
        readings: readings.iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/patients/{id}/alerts",
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Stored alerts with delivery flags", body = ListAlertsRes),
        (status = 403, description = "Caller is not clinical staff", body = ErrorRes)
    )
)]
/// List a patient's alerts. Doctors and admins only.
#[axum::debug_handler]
async fn list_alerts(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ListAlertsRes>, ApiError> {
    user.require(Role::STAFF)?;
    let patient_id = parse_patient_id(&id)?;

    let alerts = state.triage.alerts(&patient_id).await.map_err(|e| {
        tracing::error!("list alerts error: {}", e);
        ApiError::Internal("Internal error")
    })?;
    Ok(Json(ListAlertsRes {
        alerts: alerts.iter().map(Into::into).collect(),
    }))
}
