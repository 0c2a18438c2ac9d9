//! End-to-end HTTP tests against the v1 router

mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{response_json, TestApp};

#[tokio::test]
async fn health_and_status_respond() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/v1/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["success"], true);

    let response = app.request(Method::GET, "/api/v1/status", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["service"], "shopfloor-api");
}

#[tokio::test]
async fn reference_data_is_created_over_http() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/work-centers",
            Some(json!({ "name": "Cutting" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let center = response_json(response).await;
    let center_id = center["data"]["id"].as_str().unwrap().to_string();

    let response = app
        .request(
            Method::POST,
            "/api/v1/operators",
            Some(json!({
                "code": "c1",
                "first_name": "Chris",
                "last_name": "Martin",
                "hourly_cost": "32.50",
                "work_center_ids": [center_id],
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let operator = response_json(response).await;
    assert_eq!(operator["data"]["code"], "C1");

    let response = app.request(Method::GET, "/api/v1/operators", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let list = response_json(response).await;
    assert_eq!(list["data"].as_array().unwrap().len(), 1);

    let response = app
        .request(
            Method::POST,
            "/api/v1/work-centers",
            Some(json!({ "name": "" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = response_json(response).await;
    assert_eq!(error["code"], "validation_error");
}

#[tokio::test]
async fn scan_code_drives_the_station_flow() {
    let app = TestApp::new().await;
    let wc = app.seed_work_center("Cutting").await;
    let operator = app.seed_operator("S1", &[wc]).await;
    let detail = app.seed_order("OF-1001", 6, wc, 1).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/production/start/propose",
            Some(json!({ "operator_code": "s1", "scan_code": "OF-1001/1" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let proposal = response_json(response).await;
    assert_eq!(proposal["data"]["available_quantity"], 6);
    assert_eq!(
        proposal["data"]["operation_id"],
        detail.operations[0].id.to_string()
    );

    let response = app
        .request(
            Method::POST,
            "/api/v1/production/start/confirm",
            Some(json!({
                "operation_id": detail.operations[0].id,
                "operator_id": operator.id,
                "quantity": 6,
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .request(
            Method::POST,
            "/api/v1/production/finish/propose",
            Some(json!({
                "operator_code": "S1",
                "order_number": "OF-1001",
                "phase_number": 1,
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let finish = response_json(response).await;
    let entry_id = finish["data"]["time_entry_id"].clone();

    let response = app
        .request(
            Method::POST,
            "/api/v1/production/finish/confirm",
            Some(json!({
                "time_entry_id": entry_id,
                "good_quantity": 4,
                "scrap_quantity": 1,
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let error = response_json(response).await;
    assert_eq!(error["code"], "quantity_mismatch");
    assert!(error["request_id"].is_string());

    let response = app
        .request(
            Method::POST,
            "/api/v1/production/finish/confirm",
            Some(json!({
                "time_entry_id": entry_id,
                "good_quantity": 5,
                "scrap_quantity": 1,
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let outcome = response_json(response).await;
    assert_eq!(outcome["data"]["operation_completed"], true);
    assert_eq!(outcome["data"]["order_status"], "done");

    let response = app
        .request(
            Method::POST,
            "/api/v1/production/start/propose",
            Some(json!({ "operator_code": "S1", "scan_code": "OF-1001/1" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let error = response_json(response).await;
    assert_eq!(error["code"], "locked");
}

#[tokio::test]
async fn malformed_scan_code_is_rejected() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/production/start/propose",
            Some(json!({ "operator_code": "S1", "scan_code": "OF-1001" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = response_json(response).await;
    assert_eq!(error["code"], "invalid_input");

    let response = app
        .request(
            Method::POST,
            "/api/v1/production/start/propose",
            Some(json!({ "operator_code": "S1" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn work_orders_and_reports_over_http() {
    let app = TestApp::new().await;
    let wc = app.seed_work_center("Cutting").await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/work-orders",
            Some(json!({
                "order_number": "OF-2001",
                "title": "Brackets",
                "target_quantity": 12,
                "operations": [
                    { "phase_number": 1, "title": "Cut", "work_center_id": wc, "estimated_minutes": 20 },
                    { "phase_number": 2, "title": "Bend", "work_center_id": wc, "estimated_minutes": 15 },
                ],
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = response_json(response).await;
    let order_id = created["data"]["order"]["id"].as_str().unwrap().to_string();
    assert_eq!(created["data"]["operations"][0]["input_quantity"], 12);

    let response = app
        .request(Method::GET, "/api/v1/work-orders?search=2001", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = response_json(response).await;
    assert_eq!(page["data"]["total"], 1);

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/work-orders/{}/sync-routing", order_id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(Method::GET, "/api/v1/reports/dashboard", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let dashboard = response_json(response).await;
    assert_eq!(
        dashboard["data"]["series"]["production"]
            .as_array()
            .unwrap()
            .len(),
        7
    );

    let response = app
        .request(Method::GET, "/api/v1/reports/history?days=0", None)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/work-orders/{}", uuid::Uuid::new_v4()),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let error = response_json(response).await;
    assert_eq!(error["code"], "not_found");

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/work-orders/{}", order_id),
            None,
        )
        .await;
    assert!(response.status().is_success());
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api-docs/openapi.json", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let doc = response_json(response).await;
    assert!(doc["paths"]["/api/v1/production/finish/confirm"].is_object());
    assert!(doc["paths"]["/api/v1/reports/dashboard"].is_object());
}
