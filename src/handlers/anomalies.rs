use axum::extract::{Json, Path, State};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{services::anomalies::AnomalyDetail, ApiResponse, ApiResult, AppState};

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ResolveAnomalyRequest {
    /// User recording the resolution
    pub resolved_by: Option<Uuid>,
}

#[utoipa::path(
    get,
    path = "/api/v1/anomalies/{id}",
    params(("id" = Uuid, Path, description = "Anomaly id")),
    responses(
        (status = 200, description = "Anomaly detail", body = ApiResponse<AnomalyDetail>),
        (status = 404, description = "Anomaly not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Anomalies"
)]
pub async fn get_anomaly(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<AnomalyDetail> {
    let detail = state.services.anomalies.get_anomaly(id).await?;
    Ok(Json(ApiResponse::success(detail)))
}

#[utoipa::path(
    post,
    path = "/api/v1/anomalies/{id}/resolve",
    params(("id" = Uuid, Path, description = "Anomaly id")),
    request_body = ResolveAnomalyRequest,
    responses(
        (status = 200, description = "Anomaly resolved", body = ApiResponse<AnomalyDetail>),
        (status = 404, description = "Anomaly or user not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Already resolved", body = crate::errors::ErrorResponse),
    ),
    tag = "Anomalies"
)]
pub async fn resolve_anomaly(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<ResolveAnomalyRequest>>,
) -> ApiResult<AnomalyDetail> {
    let resolver = body.and_then(|Json(request)| request.resolved_by);
    let detail = state.services.anomalies.resolve_anomaly(id, resolver).await?;
    Ok(Json(ApiResponse::success(detail)))
}

#[utoipa::path(
    post,
    path = "/api/v1/anomalies/{id}/hide",
    params(("id" = Uuid, Path, description = "Anomaly id")),
    responses(
        (status = 200, description = "Anomaly hidden from the dashboard", body = ApiResponse<AnomalyDetail>),
        (status = 404, description = "Anomaly not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Anomalies"
)]
pub async fn hide_anomaly(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<AnomalyDetail> {
    let detail = state.services.anomalies.hide_anomaly(id).await?;
    Ok(Json(ApiResponse::success(detail)))
}
