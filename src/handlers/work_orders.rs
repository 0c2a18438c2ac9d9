use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    services::routing::{
        MaterialLine, MaterialRequirementView, WorkOrderDetail, WorkOrderDraft, WorkOrderSummary,
    },
    ApiResponse, ApiResult, AppState, ListQuery, PaginatedResponse,
};

#[utoipa::path(
    get,
    path = "/api/v1/work-orders",
    summary = "List work orders",
    description = "Live (non-archived) work orders, newest first",
    params(ListQuery),
    responses(
        (status = 200, description = "Work orders retrieved", body = ApiResponse<PaginatedResponse<WorkOrderSummary>>),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    tag = "Work Orders"
)]
pub async fn list_work_orders(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<WorkOrderSummary>> {
    let page = state
        .services
        .routing
        .list_work_orders(query.search, query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(page)))
}

#[utoipa::path(
    post,
    path = "/api/v1/work-orders",
    summary = "Create work order",
    request_body = WorkOrderDraft,
    responses(
        (status = 201, description = "Work order created", body = ApiResponse<WorkOrderDetail>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown work center, machine or material", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order number already used", body = crate::errors::ErrorResponse),
    ),
    tag = "Work Orders"
)]
pub async fn create_work_order(
    State(state): State<AppState>,
    Json(draft): Json<WorkOrderDraft>,
) -> Result<(StatusCode, Json<ApiResponse<WorkOrderDetail>>), ServiceError> {
    let detail = state.services.routing.create_work_order(draft).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(detail))))
}

#[utoipa::path(
    get,
    path = "/api/v1/work-orders/{id}",
    summary = "Get work order",
    params(("id" = Uuid, Path, description = "Work order id")),
    responses(
        (status = 200, description = "Work order with its routing", body = ApiResponse<WorkOrderDetail>),
        (status = 404, description = "Work order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Work Orders"
)]
pub async fn get_work_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<WorkOrderDetail> {
    let detail = state.services.routing.get_work_order(id).await?;
    Ok(Json(ApiResponse::success(detail)))
}

#[utoipa::path(
    put,
    path = "/api/v1/work-orders/{id}",
    summary = "Update work order",
    description = "Edits the header and routing. Phases are matched by phase number.",
    params(("id" = Uuid, Path, description = "Work order id")),
    request_body = WorkOrderDraft,
    responses(
        (status = 200, description = "Work order updated", body = ApiResponse<WorkOrderDetail>),
        (status = 404, description = "Work order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Archived order or phase with time entries removed", body = crate::errors::ErrorResponse),
    ),
    tag = "Work Orders"
)]
pub async fn update_work_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(draft): Json<WorkOrderDraft>,
) -> ApiResult<WorkOrderDetail> {
    let detail = state.services.routing.update_work_order(id, draft).await?;
    Ok(Json(ApiResponse::success(detail)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/work-orders/{id}",
    summary = "Delete work order",
    params(("id" = Uuid, Path, description = "Work order id")),
    responses(
        (status = 200, description = "Work order deleted"),
        (status = 404, description = "Work order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Work order has time entries", body = crate::errors::ErrorResponse),
    ),
    tag = "Work Orders"
)]
pub async fn delete_work_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Value> {
    state.services.routing.delete_work_order(id).await?;
    Ok(Json(ApiResponse::with_message(
        json!({ "id": id }),
        "Work order deleted",
    )))
}

/// Recompute the input-quantity chain of an order
#[utoipa::path(
    post,
    path = "/api/v1/work-orders/{id}/sync-routing",
    params(("id" = Uuid, Path, description = "Work order id")),
    responses(
        (status = 200, description = "Routing synchronized", body = ApiResponse<WorkOrderDetail>),
        (status = 404, description = "Work order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Work Orders"
)]
pub async fn sync_routing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<WorkOrderDetail> {
    let detail = state.services.routing.sync_routing(id).await?;
    Ok(Json(ApiResponse::success(detail)))
}

#[utoipa::path(
    get,
    path = "/api/v1/archives",
    summary = "List archived work orders",
    params(ListQuery),
    responses(
        (status = 200, description = "Archived work orders", body = ApiResponse<PaginatedResponse<WorkOrderSummary>>),
    ),
    tag = "Work Orders"
)]
pub async fn list_archives(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<WorkOrderSummary>> {
    let page = state
        .services
        .routing
        .list_archives(query.search, query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(page)))
}

#[utoipa::path(
    put,
    path = "/api/v1/operations/{id}/materials",
    summary = "Replace operation materials",
    params(("id" = Uuid, Path, description = "Operation id")),
    request_body = Vec<MaterialLine>,
    responses(
        (status = 200, description = "Requirements replaced", body = ApiResponse<Vec<MaterialRequirementView>>),
        (status = 400, description = "Invalid quantities or duplicate materials", body = crate::errors::ErrorResponse),
        (status = 404, description = "Operation or material not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Work Orders"
)]
pub async fn set_operation_materials(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(lines): Json<Vec<MaterialLine>>,
) -> ApiResult<Vec<MaterialRequirementView>> {
    let views = state
        .services
        .routing
        .set_material_requirements(id, lines)
        .await?;
    Ok(Json(ApiResponse::success(views)))
}
