//! Shop-floor production tracking API
//!
//! Work orders, their routing of operations, operator time entries and the
//! quantity flow between phases, plus the reporting built on top of them.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    extract::State,
    response::Json,
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::services::factory::{ServiceContainer, ServiceFactory};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: ServiceContainer,
}

impl AppState {
    pub fn new(db: Arc<DatabaseConnection>, config: config::AppConfig) -> Self {
        let services = ServiceContainer::new(&ServiceFactory::new(db.clone()));
        Self {
            db,
            config,
            services,
        }
    }
}

// Common query parameters for list endpoints
#[derive(Debug, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
    /// Case-insensitive match on order number or title
    pub search: Option<String>,
}

fn default_page() -> u64 {
    1
}
fn default_limit() -> u64 {
    20
}

// Common response wrappers
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::success(data)
        }
    }
}


/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

pub fn api_v1_routes() -> Router<AppState> {
    // Operator station: two-step claim and completion
    let production = Router::new()
        .route(
            "/production/start/propose",
            post(handlers::production::propose_start),
        )
        .route(
            "/production/start/confirm",
            post(handlers::production::confirm_start),
        )
        .route(
            "/production/finish/propose",
            post(handlers::production::propose_finish),
        )
        .route(
            "/production/finish/confirm",
            post(handlers::production::confirm_finish),
        );

    let work_orders = Router::new()
        .route(
            "/work-orders",
            get(handlers::work_orders::list_work_orders)
                .post(handlers::work_orders::create_work_order),
        )
        .route(
            "/work-orders/:id",
            get(handlers::work_orders::get_work_order)
                .put(handlers::work_orders::update_work_order)
                .delete(handlers::work_orders::delete_work_order),
        )
        .route(
            "/work-orders/:id/sync-routing",
            post(handlers::work_orders::sync_routing),
        )
        .route(
            "/work-orders/:id/scrap-by-operation",
            get(handlers::reports::scrap_by_operation),
        )
        .route(
            "/work-orders/:id/day-report/:date",
            get(handlers::reports::order_day_report),
        )
        .route("/archives", get(handlers::work_orders::list_archives))
        .route(
            "/operations/:id/materials",
            put(handlers::work_orders::set_operation_materials),
        );

    let reference_data = Router::new()
        .route(
            "/work-centers",
            get(handlers::reference_data::list_work_centers)
                .post(handlers::reference_data::create_work_center),
        )
        .route(
            "/operators",
            get(handlers::reference_data::list_operators)
                .post(handlers::reference_data::create_operator),
        )
        .route(
            "/machines",
            get(handlers::reference_data::list_machines)
                .post(handlers::reference_data::create_machine),
        )
        .route(
            "/materials",
            get(handlers::reference_data::list_materials)
                .post(handlers::reference_data::create_material),
        );

    let reports = Router::new()
        .route("/reports/kpis", get(handlers::reports::kpis))
        .route("/reports/series", get(handlers::reports::series))
        .route("/reports/alerts", get(handlers::reports::alerts))
        .route("/reports/dashboard", get(handlers::reports::dashboard))
        .route(
            "/reports/scrap-by-order",
            get(handlers::reports::scrap_by_order),
        )
        .route(
            "/reports/production-by-order",
            get(handlers::reports::production_by_order),
        )
        .route(
            "/reports/time-entries",
            get(handlers::reports::time_entry_ledger),
        )
        .route("/reports/history", get(handlers::reports::history));

    let anomalies = Router::new()
        .route("/anomalies/:id", get(handlers::anomalies::get_anomaly))
        .route(
            "/anomalies/:id/resolve",
            post(handlers::anomalies::resolve_anomaly),
        )
        .route("/anomalies/:id/hide", post(handlers::anomalies::hide_anomaly));

    Router::new()
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        .merge(production)
        .merge(work_orders)
        .merge(reference_data)
        .merge(reports)
        .merge(anomalies)
}

async fn api_status() -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let version = env!("CARGO_PKG_VERSION");
    let git = option_env!("GIT_HASH").unwrap_or("unknown");
    let build_time = option_env!("BUILD_TIME").unwrap_or("unknown");
    let status_data = json!({
        "status": "ok",
        "version": version,
        "git": git,
        "build_time": build_time,
        "service": "shopfloor-api",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let db_status = match db::check_connection(&state.db).await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "environment": state.config.environment,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}
