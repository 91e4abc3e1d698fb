use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::ApiState;
use crate::error::{AppError, Result};
use crate::models::{Article, DraftOutcome, DraftRequest, ManualDraft};
use crate::pipeline::AnalyzeReport;

#[derive(Debug, Serialize)]
struct ErrorBody {
    status: &'static str,
    kind: &'static str,
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::SiteNotFound(_) => StatusCode::NOT_FOUND,
            AppError::NotAnalyzed(_) => StatusCode::CONFLICT,
            AppError::Generation(_)
            | AppError::GenerationIncomplete(_)
            | AppError::Remote { .. }
            | AppError::RemoteUnreachable { .. }
            | AppError::Protocol(_) => StatusCode::BAD_GATEWAY,
            AppError::RemoteTimeout { .. } | AppError::RemoteInterrupted { .. } => {
                StatusCode::GATEWAY_TIMEOUT
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Request failed: {}", self);
        }

        let body = ErrorBody {
            status: "error",
            kind: self.kind(),
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
pub(super) struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub(super) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub(super) async fn analyze(
    State(state): State<ApiState>,
    Path(site_id): Path<i64>,
) -> Result<Json<AnalyzeReport>> {
    let report = state.engine.analyze(site_id).await?;
    Ok(Json(report))
}

fn outcome_response(outcome: DraftOutcome) -> (StatusCode, Json<DraftOutcome>) {
    let status = if outcome.is_duplicate() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    (status, Json(outcome))
}

pub(super) async fn generate_draft(
    State(state): State<ApiState>,
    Path(site_id): Path<i64>,
    payload: std::result::Result<Json<DraftRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DraftOutcome>)> {
    let Json(request) = payload?;
    let outcome = state.engine.generate_draft(site_id, &request).await?;
    Ok(outcome_response(outcome))
}

pub(super) async fn create_draft(
    State(state): State<ApiState>,
    Path(site_id): Path<i64>,
    payload: std::result::Result<Json<ManualDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<DraftOutcome>)> {
    let Json(draft) = payload?;
    let outcome = state.engine.create_draft(site_id, &draft).await?;
    Ok(outcome_response(outcome))
}

#[derive(Debug, Deserialize)]
pub(super) struct ListQuery {
    limit: Option<usize>,
}

pub(super) async fn list_articles(
    State(state): State<ApiState>,
    Path(site_id): Path<i64>,
    query: std::result::Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Vec<Article>>> {
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let articles = state.engine.list_articles(site_id, limit).await?;
    Ok(Json(articles))
}
