use axum::{
    extract::{Json, State},
    http::StatusCode,
};

use crate::{
    errors::ServiceError,
    services::reference_data::{
        MachineView, MaterialView, NewMachine, NewMaterial, NewOperator, NewWorkCenter,
        OperatorView, WorkCenterView,
    },
    ApiResponse, ApiResult, AppState,
};

type Created<T> = Result<(StatusCode, Json<ApiResponse<T>>), ServiceError>;

#[utoipa::path(
    get,
    path = "/api/v1/work-centers",
    responses((status = 200, description = "Work centers", body = ApiResponse<Vec<WorkCenterView>>)),
    tag = "Reference Data"
)]
pub async fn list_work_centers(State(state): State<AppState>) -> ApiResult<Vec<WorkCenterView>> {
    let items = state.services.reference_data.list_work_centers().await?;
    Ok(Json(ApiResponse::success(items)))
}

#[utoipa::path(
    post,
    path = "/api/v1/work-centers",
    request_body = NewWorkCenter,
    responses(
        (status = 201, description = "Work center created", body = ApiResponse<WorkCenterView>),
        (status = 409, description = "Name already used", body = crate::errors::ErrorResponse),
    ),
    tag = "Reference Data"
)]
pub async fn create_work_center(
    State(state): State<AppState>,
    Json(input): Json<NewWorkCenter>,
) -> Created<WorkCenterView> {
    let created = state.services.reference_data.create_work_center(input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

#[utoipa::path(
    get,
    path = "/api/v1/operators",
    responses((status = 200, description = "Operators with qualifications", body = ApiResponse<Vec<OperatorView>>)),
    tag = "Reference Data"
)]
pub async fn list_operators(State(state): State<AppState>) -> ApiResult<Vec<OperatorView>> {
    let items = state.services.reference_data.list_operators().await?;
    Ok(Json(ApiResponse::success(items)))
}

#[utoipa::path(
    post,
    path = "/api/v1/operators",
    request_body = NewOperator,
    responses(
        (status = 201, description = "Operator created", body = ApiResponse<OperatorView>),
        (status = 404, description = "Unknown work center", body = crate::errors::ErrorResponse),
        (status = 409, description = "Code already used", body = crate::errors::ErrorResponse),
    ),
    tag = "Reference Data"
)]
pub async fn create_operator(
    State(state): State<AppState>,
    Json(input): Json<NewOperator>,
) -> Created<OperatorView> {
    let created = state.services.reference_data.create_operator(input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

#[utoipa::path(
    get,
    path = "/api/v1/machines",
    responses((status = 200, description = "Machines", body = ApiResponse<Vec<MachineView>>)),
    tag = "Reference Data"
)]
pub async fn list_machines(State(state): State<AppState>) -> ApiResult<Vec<MachineView>> {
    let items = state.services.reference_data.list_machines().await?;
    Ok(Json(ApiResponse::success(items)))
}

#[utoipa::path(
    post,
    path = "/api/v1/machines",
    request_body = NewMachine,
    responses(
        (status = 201, description = "Machine created", body = ApiResponse<MachineView>),
        (status = 409, description = "Name already used", body = crate::errors::ErrorResponse),
    ),
    tag = "Reference Data"
)]
pub async fn create_machine(
    State(state): State<AppState>,
    Json(input): Json<NewMachine>,
) -> Created<MachineView> {
    let created = state.services.reference_data.create_machine(input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

#[utoipa::path(
    get,
    path = "/api/v1/materials",
    responses((status = 200, description = "Raw materials with stock", body = ApiResponse<Vec<MaterialView>>)),
    tag = "Reference Data"
)]
pub async fn list_materials(State(state): State<AppState>) -> ApiResult<Vec<MaterialView>> {
    let items = state.services.reference_data.list_materials().await?;
    Ok(Json(ApiResponse::success(items)))
}

#[utoipa::path(
    post,
    path = "/api/v1/materials",
    request_body = NewMaterial,
    responses(
        (status = 201, description = "Material created", body = ApiResponse<MaterialView>),
        (status = 409, description = "Reference already used", body = crate::errors::ErrorResponse),
    ),
    tag = "Reference Data"
)]
pub async fn create_material(
    State(state): State<AppState>,
    Json(input): Json<NewMaterial>,
) -> Created<MaterialView> {
    let created = state.services.reference_data.create_material(input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}
