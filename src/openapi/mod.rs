use axum::{routing::get, Json, Router};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Shop-floor API",
        version = "0.1.0",
        description = r#"
# Shop-floor production tracking API

Tracks manufacturing work orders through their routing of operations.

## Features

- **Work Orders**: Create and edit orders with their ordered phases and material needs
- **Production**: Two-step claim and completion of operations by operators
- **Quantity Flow**: Good output of a phase becomes the input of the next one
- **Materials**: Raw-material stock consumed when the first phase completes
- **Anomalies**: Problems reported at completion time, resolved from the dashboard
- **Reports**: KPIs, 7-day series, scrap analysis, daily snapshots and exports

## Error Handling

Errors share one response shape with the matching HTTP status code:

```json
{
  "error": "Unprocessable Entity",
  "code": "quantity_mismatch",
  "message": "Quantity mismatch: declared 11 pieces for a claim of 12",
  "request_id": "req-abc123xyz",
  "timestamp": "2024-12-09T10:30:00.000Z"
}
```

## Pagination

List endpoints accept `page` (default 1), `limit` (default 20) and `search`.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080/api/v1", description = "Local development")
    ),
    tags(
        (name = "Production", description = "Operator station: claim and complete operations"),
        (name = "Work Orders", description = "Work orders, routing and archives"),
        (name = "Reference Data", description = "Work centers, operators, machines and materials"),
        (name = "Reports", description = "KPIs, series, alerts and production reports"),
        (name = "Anomalies", description = "Problems reported during production")
    ),
    paths(
        // Production
        crate::handlers::production::propose_start,
        crate::handlers::production::confirm_start,
        crate::handlers::production::propose_finish,
        crate::handlers::production::confirm_finish,

        // Work orders
        crate::handlers::work_orders::list_work_orders,
        crate::handlers::work_orders::create_work_order,
        crate::handlers::work_orders::get_work_order,
        crate::handlers::work_orders::update_work_order,
        crate::handlers::work_orders::delete_work_order,
        crate::handlers::work_orders::sync_routing,
        crate::handlers::work_orders::list_archives,
        crate::handlers::work_orders::set_operation_materials,

        // Reference data
        crate::handlers::reference_data::list_work_centers,
        crate::handlers::reference_data::create_work_center,
        crate::handlers::reference_data::list_operators,
        crate::handlers::reference_data::create_operator,
        crate::handlers::reference_data::list_machines,
        crate::handlers::reference_data::create_machine,
        crate::handlers::reference_data::list_materials,
        crate::handlers::reference_data::create_material,

        // Reports
        crate::handlers::reports::kpis,
        crate::handlers::reports::series,
        crate::handlers::reports::alerts,
        crate::handlers::reports::dashboard,
        crate::handlers::reports::scrap_by_order,
        crate::handlers::reports::scrap_by_operation,
        crate::handlers::reports::production_by_order,
        crate::handlers::reports::order_day_report,
        crate::handlers::reports::time_entry_ledger,
        crate::handlers::reports::history,

        // Anomalies
        crate::handlers::anomalies::get_anomaly,
        crate::handlers::anomalies::resolve_anomaly,
        crate::handlers::anomalies::hide_anomaly,
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,
            crate::ListQuery,

            // Request bodies
            crate::handlers::production::OperationTarget,
            crate::handlers::production::ProposeStartRequest,
            crate::handlers::production::ConfirmStartRequest,
            crate::handlers::production::ProposeFinishRequest,
            crate::handlers::anomalies::ResolveAnomalyRequest,
            crate::services::production_flow::FinishDeclaration,
            crate::services::routing::WorkOrderDraft,
            crate::services::routing::OperationDraft,
            crate::services::routing::MaterialLine,

            // Status enums
            crate::entities::work_order::WorkOrderStatus,
            crate::entities::operation::OperationStatus,
            crate::entities::operation::OperationType,
            crate::entities::machine::MachineStatus,
            crate::entities::anomaly::AnomalyStatus,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

/// Serves the generated document at `/api-docs/openapi.json`
pub fn openapi_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDocV1::openapi()) }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_generation() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Shop-floor API"));
        assert!(json.contains("/api/v1/production/start/propose"));
        assert!(json.contains("/api/v1/work-orders/{id}/day-report/{date}"));
        assert!(json.contains("ErrorResponse"));
    }

    #[test]
    fn every_tag_has_operations() {
        let json = serde_json::to_value(ApiDocV1::openapi()).unwrap();
        let paths = json["paths"].as_object().unwrap();
        for tag in ["Production", "Work Orders", "Reference Data", "Reports", "Anomalies"] {
            let used = paths.values().any(|item| {
                item.as_object().unwrap().values().any(|op| {
                    op["tags"]
                        .as_array()
                        .map(|tags| tags.iter().any(|t| t == tag))
                        .unwrap_or(false)
                })
            });
            assert!(used, "no operation tagged {tag}");
        }
    }
}
