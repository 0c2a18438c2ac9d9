use axum::extract::{Json, Path, Query, State};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    services::{
        daily_reports::HistoryReport,
        reporting::{
            Alerts, DailyKpis, Dashboard, LedgerRow, OperationScrapRow, OrderDayReport,
            ProductionByOrderReport, ScrapByOrderFilter, ScrapByOrderReport, SevenDaySeries,
            TimeEntryFilter,
        },
    },
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DateQuery {
    /// Reference day, today when omitted
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductionQuery {
    pub date: Option<NaiveDate>,
    pub number_contains: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Number of days to show, configured default when omitted
    pub days: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/kpis",
    params(DateQuery),
    responses((status = 200, description = "KPIs for the day", body = ApiResponse<DailyKpis>)),
    tag = "Reports"
)]
pub async fn kpis(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> ApiResult<DailyKpis> {
    let day = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let kpis = state.services.reporting.compute_kpis_for_date(day).await?;
    Ok(Json(ApiResponse::success(kpis)))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/series",
    params(DateQuery),
    responses((status = 200, description = "7-day series ending at the day", body = ApiResponse<SevenDaySeries>)),
    tag = "Reports"
)]
pub async fn series(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> ApiResult<SevenDaySeries> {
    let day = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let series = state.services.reporting.build_7day_series(day).await?;
    Ok(Json(ApiResponse::success(series)))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/alerts",
    responses((status = 200, description = "Low stock, overdue entries and open anomalies", body = ApiResponse<Alerts>)),
    tag = "Reports"
)]
pub async fn alerts(State(state): State<AppState>) -> ApiResult<Alerts> {
    let alerts = state.services.reporting.build_alerts(Utc::now()).await?;
    Ok(Json(ApiResponse::success(alerts)))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/dashboard",
    responses((status = 200, description = "KPIs, series and alerts", body = ApiResponse<Dashboard>)),
    tag = "Reports"
)]
pub async fn dashboard(State(state): State<AppState>) -> ApiResult<Dashboard> {
    let dashboard = state.services.reporting.dashboard(Utc::now()).await?;
    Ok(Json(ApiResponse::success(dashboard)))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/scrap-by-order",
    params(ScrapByOrderFilter),
    responses((status = 200, description = "Orders with scrap and totals", body = ApiResponse<ScrapByOrderReport>)),
    tag = "Reports"
)]
pub async fn scrap_by_order(
    State(state): State<AppState>,
    Query(filter): Query<ScrapByOrderFilter>,
) -> ApiResult<ScrapByOrderReport> {
    let report = state.services.reporting.scrap_by_order(filter).await?;
    Ok(Json(ApiResponse::success(report)))
}

#[utoipa::path(
    get,
    path = "/api/v1/work-orders/{id}/scrap-by-operation",
    params(("id" = Uuid, Path, description = "Work order id")),
    responses(
        (status = 200, description = "Scrap per phase", body = ApiResponse<Vec<OperationScrapRow>>),
        (status = 404, description = "Work order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Reports"
)]
pub async fn scrap_by_operation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<OperationScrapRow>> {
    let rows = state.services.reporting.scrap_by_operation(id).await?;
    Ok(Json(ApiResponse::success(rows)))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/production-by-order",
    params(ProductionQuery),
    responses((status = 200, description = "Orders first completed on the day", body = ApiResponse<ProductionByOrderReport>)),
    tag = "Reports"
)]
pub async fn production_by_order(
    State(state): State<AppState>,
    Query(query): Query<ProductionQuery>,
) -> ApiResult<ProductionByOrderReport> {
    let day = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let report = state
        .services
        .reporting
        .production_by_order(day, query.number_contains)
        .await?;
    Ok(Json(ApiResponse::success(report)))
}

#[utoipa::path(
    get,
    path = "/api/v1/work-orders/{id}/day-report/{date}",
    params(
        ("id" = Uuid, Path, description = "Work order id"),
        ("date" = String, Path, description = "Day as YYYY-MM-DD"),
    ),
    responses(
        (status = 200, description = "Entries closed on the day", body = ApiResponse<OrderDayReport>),
        (status = 404, description = "Work order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Reports"
)]
pub async fn order_day_report(
    State(state): State<AppState>,
    Path((id, date)): Path<(Uuid, NaiveDate)>,
) -> ApiResult<OrderDayReport> {
    let report = state.services.reporting.order_day_report(id, date).await?;
    Ok(Json(ApiResponse::success(report)))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/time-entries",
    params(TimeEntryFilter),
    responses((status = 200, description = "Time-entry export rows", body = ApiResponse<Vec<LedgerRow>>)),
    tag = "Reports"
)]
pub async fn time_entry_ledger(
    State(state): State<AppState>,
    Query(filter): Query<TimeEntryFilter>,
) -> ApiResult<Vec<LedgerRow>> {
    let rows = state
        .services
        .reporting
        .time_entry_ledger(filter, Utc::now())
        .await?;
    Ok(Json(ApiResponse::success(rows)))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/history",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Stored daily snapshots", body = ApiResponse<HistoryReport>),
        (status = 400, description = "Invalid day count", body = crate::errors::ErrorResponse),
    ),
    tag = "Reports"
)]
pub async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<HistoryReport> {
    let days = query.days.unwrap_or(state.config.history_default_days);
    let report = state
        .services
        .daily_reports
        .history(days, Utc::now().date_naive())
        .await?;
    Ok(Json(ApiResponse::success(report)))
}
