use super::dto::{JobResponse, TranscodeRequest, TranscodeResponse};
use super::service::JobService;
use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::modules::auth::dto::TokenClaims;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;
use validator::Validate;

/// Submit a transcoding job
#[utoipa::path(
    post,
    path = "/api/v1/jobs",
    request_body = TranscodeRequest,
    responses(
        (status = 202, description = "Job accepted", body = ApiResponse<TranscodeResponse>),
        (status = 400, description = "Bad Request"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Jobs",
    security(("bearer_auth" = []))
)]
pub async fn submit_job(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Json(payload): Json<TranscodeRequest>,
) -> impl IntoResponse {
    if let Err(e) = payload.validate() {
        return ApiError(e.to_string(), StatusCode::BAD_REQUEST).into_response();
    }
    if let Some(name) = payload.colliding_name() {
        return ApiError(
            format!("name {} is declared as both input and output", name),
            StatusCode::BAD_REQUEST,
        )
        .into_response();
    }

    match JobService::submit(state, claims.sub, payload).await {
        Ok(res) => ApiSuccess(
            ApiResponse::success(res, "Job accepted"),
            StatusCode::ACCEPTED,
        )
        .into_response(),
        Err(e) => ApiError(e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// Get the progress and result of a job
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{uuid}",
    params(
        ("uuid" = Uuid, Path, description = "Job UUID")
    ),
    responses(
        (status = 200, description = "Job snapshot", body = ApiResponse<JobResponse>),
        (status = 404, description = "Job Not Found")
    ),
    tag = "Jobs",
    security(("bearer_auth" = []))
)]
pub async fn get_job(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path(uuid): Path<Uuid>,
) -> impl IntoResponse {
    match JobService::get_status(state, uuid, claims.sub).await {
        Ok(res) => ApiSuccess(
            ApiResponse::success(res, "Job retrieved successfully"),
            StatusCode::OK,
        )
        .into_response(),
        Err(e) => ApiError(e.to_string(), StatusCode::NOT_FOUND).into_response(),
    }
}

/// List the authenticated user's jobs
#[utoipa::path(
    get,
    path = "/api/v1/jobs",
    responses(
        (status = 200, description = "Jobs for the current user", body = ApiResponse<Vec<JobResponse>>),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Jobs",
    security(("bearer_auth" = []))
)]
pub async fn list_jobs(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
) -> impl IntoResponse {
    match JobService::list_jobs(state, claims.sub).await {
        Ok(res) => ApiSuccess(
            ApiResponse::success(res, "Jobs retrieved successfully"),
            StatusCode::OK,
        )
        .into_response(),
        Err(e) => ApiError(e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}
