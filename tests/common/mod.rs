#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    middleware, Router,
};
use rust_decimal::Decimal;
use sea_orm::{sea_query::Expr, ColumnTrait, EntityTrait, QueryFilter};
use serde_json::Value;
use shopfloor_api::{
    config::AppConfig,
    db,
    entities::{material, work_order},
    services::{
        production_flow::{FinishDeclaration, FinishOutcome, TimeEntryView},
        reference_data::{NewMaterial, NewOperator, NewWorkCenter, OperatorView},
        routing::{MaterialLine, OperationDraft, WorkOrderDetail, WorkOrderDraft},
    },
    AppState,
};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

/// Application state backed by a throwaway SQLite file.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _dir: TempDir,
}

impl TestApp {
    /// Construct a new test application with fresh, migrated database state.
    pub async fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let db_path = dir.path().join("shopfloor_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.auto_migrate = true;
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(Arc::new(pool), cfg);

        let router = Router::new()
            .nest("/api/v1", shopfloor_api::api_v1_routes())
            .merge(shopfloor_api::openapi::openapi_routes())
            .layer(middleware::from_fn(
                shopfloor_api::middleware_helpers::request_id::request_id_middleware,
            ))
            .with_state(state.clone());

        Self {
            router,
            state,
            _dir: dir,
        }
    }

    /// Send a request against the router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn seed_work_center(&self, name: &str) -> Uuid {
        self.state
            .services
            .reference_data
            .create_work_center(NewWorkCenter {
                name: name.to_string(),
                description: None,
            })
            .await
            .expect("seed work center")
            .id
    }

    pub async fn seed_operator(&self, code: &str, work_center_ids: &[Uuid]) -> OperatorView {
        self.state
            .services
            .reference_data
            .create_operator(NewOperator {
                code: code.to_string(),
                first_name: "Test".to_string(),
                last_name: code.to_string(),
                hourly_cost: Decimal::from(30),
                work_center_ids: work_center_ids.to_vec(),
            })
            .await
            .expect("seed operator")
    }

    pub async fn seed_material(&self, reference: &str, stock: i64, threshold: i64) -> Uuid {
        self.state
            .services
            .reference_data
            .create_material(NewMaterial {
                reference: reference.to_string(),
                designation: format!("Material {}", reference),
                stock_quantity: Decimal::from(stock),
                unit_of_measure: "kg".to_string(),
                alert_threshold: Decimal::from(threshold),
            })
            .await
            .expect("seed material")
            .id
    }

    /// Creates an order whose phases are numbered 1..n, all on `work_center_id`.
    pub async fn seed_order(
        &self,
        number: &str,
        target: i32,
        work_center_id: Uuid,
        phases: usize,
    ) -> WorkOrderDetail {
        self.seed_order_with_materials(number, target, work_center_id, phases, Vec::new())
            .await
    }

    pub async fn seed_order_with_materials(
        &self,
        number: &str,
        target: i32,
        work_center_id: Uuid,
        phases: usize,
        first_phase_materials: Vec<MaterialLine>,
    ) -> WorkOrderDetail {
        let operations = (1..=phases)
            .map(|phase| OperationDraft {
                phase_number: phase as i32,
                title: format!("Phase {}", phase),
                work_center_id,
                operation_type: Default::default(),
                machine_id: None,
                estimated_minutes: 30,
                materials: if phase == 1 {
                    first_phase_materials.clone()
                } else {
                    Vec::new()
                },
            })
            .collect();

        self.state
            .services
            .routing
            .create_work_order(WorkOrderDraft {
                order_number: number.to_string(),
                title: format!("Order {}", number),
                target_quantity: target,
                planned_start: None,
                planned_end: None,
                operations,
            })
            .await
            .expect("seed work order")
    }

    pub async fn claim(&self, operation_id: Uuid, operator_id: Uuid, quantity: i32) -> TimeEntryView {
        self.state
            .services
            .production
            .confirm_start(operation_id, operator_id, quantity)
            .await
            .expect("claim operation")
    }

    pub async fn finish(&self, time_entry_id: Uuid, good: i32, scrap: i32) -> FinishOutcome {
        self.state
            .services
            .production
            .confirm_finish(FinishDeclaration {
                time_entry_id,
                good_quantity: good,
                scrap_quantity: scrap,
                problem: false,
                problem_description: None,
            })
            .await
            .expect("finish time entry")
    }

    /// Runs a phase to completion with a single claim.
    pub async fn complete_phase(
        &self,
        operation_id: Uuid,
        operator_id: Uuid,
        claim: i32,
        scrap: i32,
    ) -> FinishOutcome {
        let entry = self.claim(operation_id, operator_id, claim).await;
        self.finish(entry.id, claim - scrap, scrap).await
    }

    pub async fn stock_of(&self, material_id: Uuid) -> Decimal {
        material::Entity::find_by_id(material_id)
            .one(&*self.state.db)
            .await
            .expect("load material")
            .expect("material exists")
            .stock_quantity
    }

    /// Moves an order's creation date into the past.
    pub async fn backdate_order(&self, order_id: Uuid, days: i64) {
        work_order::Entity::update_many()
            .col_expr(
                work_order::Column::CreatedAt,
                Expr::value(chrono::Utc::now() - chrono::Duration::days(days)),
            )
            .filter(work_order::Column::Id.eq(order_id))
            .exec(&*self.state.db)
            .await
            .expect("backdate order");
    }
}

pub async fn response_json(response: axum::response::Response) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&body).expect("response body is json")
}
