//! Integration tests for work-order editing and input-chain synchronization

mod common;

use assert_matches::assert_matches;
use rust_decimal::Decimal;
use shopfloor_api::{
    entities::{operation::OperationStatus, work_order::WorkOrderStatus},
    errors::ServiceError,
    services::routing::{MaterialLine, OperationDraft, WorkOrderDetail, WorkOrderDraft},
};
use uuid::Uuid;

use common::TestApp;

fn draft_from(detail: &WorkOrderDetail, target: i32, phases: &[i32], wc: Uuid) -> WorkOrderDraft {
    WorkOrderDraft {
        order_number: detail.order.order_number.clone(),
        title: detail.order.title.clone(),
        target_quantity: target,
        planned_start: None,
        planned_end: None,
        operations: phases
            .iter()
            .map(|&phase| OperationDraft {
                phase_number: phase,
                title: format!("Phase {}", phase),
                work_center_id: wc,
                operation_type: Default::default(),
                machine_id: None,
                estimated_minutes: 30,
                materials: Vec::new(),
            })
            .collect(),
    }
}

#[tokio::test]
async fn editing_target_resyncs_untouched_first_phase() {
    let app = TestApp::new().await;
    let wc = app.seed_work_center("Cutting").await;
    let detail = app.seed_order("OF-100", 10, wc, 2).await;

    let updated = app
        .state
        .services
        .routing
        .update_work_order(detail.order.id, draft_from(&detail, 25, &[1, 2], wc))
        .await
        .unwrap();

    assert_eq!(updated.order.target_quantity, 25);
    assert_eq!(updated.operations[0].input_quantity, 25);
    assert_eq!(updated.operations[1].input_quantity, 0);
    assert_eq!(updated.operations[0].id, detail.operations[0].id);
}

#[tokio::test]
async fn started_phases_keep_their_input() {
    let app = TestApp::new().await;
    let wc = app.seed_work_center("Cutting").await;
    let op = app.seed_operator("C1", &[wc]).await;
    let detail = app.seed_order("OF-101", 10, wc, 2).await;

    app.complete_phase(detail.operations[0].id, op.id, 10, 2).await;

    // Target change after phase 1 is done: phase 1 keeps 10, phase 2 keeps 8
    let updated = app
        .state
        .services
        .routing
        .update_work_order(detail.order.id, draft_from(&detail, 30, &[1, 2, 3], wc))
        .await
        .unwrap();

    assert_eq!(updated.operations.len(), 3);
    assert_eq!(updated.operations[0].status, OperationStatus::Done);
    assert_eq!(updated.operations[0].input_quantity, 10);
    assert_eq!(updated.operations[1].input_quantity, 8);
    assert_eq!(updated.operations[2].input_quantity, 0);
    assert_eq!(updated.operations[2].status, OperationStatus::Todo);
    assert_eq!(updated.order.status, WorkOrderStatus::InProduction);
}

#[tokio::test]
async fn sync_routing_is_idempotent() {
    let app = TestApp::new().await;
    let wc = app.seed_work_center("Cutting").await;
    let op = app.seed_operator("C1", &[wc]).await;
    let detail = app.seed_order("OF-102", 6, wc, 3).await;

    app.complete_phase(detail.operations[0].id, op.id, 6, 1).await;

    let routing = &app.state.services.routing;
    let first = routing.sync_routing(detail.order.id).await.unwrap();
    let second = routing.sync_routing(detail.order.id).await.unwrap();

    let inputs = |d: &WorkOrderDetail| d.operations.iter().map(|o| o.input_quantity).collect::<Vec<_>>();
    assert_eq!(inputs(&first), vec![6, 5, 0]);
    assert_eq!(inputs(&first), inputs(&second));
}

#[tokio::test]
async fn phase_with_time_entries_cannot_be_removed() {
    let app = TestApp::new().await;
    let wc = app.seed_work_center("Cutting").await;
    let op = app.seed_operator("C1", &[wc]).await;
    let detail = app.seed_order("OF-103", 5, wc, 2).await;
    app.claim(detail.operations[0].id, op.id, 2).await;

    let routing = &app.state.services.routing;
    let err = routing
        .update_work_order(detail.order.id, draft_from(&detail, 5, &[2], wc))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(_));

    // Phase 2 has never been worked on and can go
    let updated = routing
        .update_work_order(detail.order.id, draft_from(&detail, 5, &[1], wc))
        .await
        .unwrap();
    assert_eq!(updated.operations.len(), 1);
}

#[tokio::test]
async fn delete_refuses_orders_with_time_entries() {
    let app = TestApp::new().await;
    let wc = app.seed_work_center("Cutting").await;
    let op = app.seed_operator("C1", &[wc]).await;
    let worked = app.seed_order("OF-104", 5, wc, 1).await;
    let fresh = app.seed_order("OF-105", 5, wc, 2).await;
    app.claim(worked.operations[0].id, op.id, 1).await;

    let routing = &app.state.services.routing;
    assert_matches!(
        routing.delete_work_order(worked.order.id).await,
        Err(ServiceError::InvalidState(_))
    );

    routing.delete_work_order(fresh.order.id).await.unwrap();
    assert_matches!(
        routing.get_work_order(fresh.order.id).await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn order_numbers_are_unique() {
    let app = TestApp::new().await;
    let wc = app.seed_work_center("Cutting").await;
    let first = app.seed_order("OF-106", 5, wc, 1).await;

    let err = app
        .state
        .services
        .routing
        .create_work_order(draft_from(&first, 5, &[1], wc))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));
}

#[tokio::test]
async fn invalid_drafts_are_rejected() {
    let app = TestApp::new().await;
    let wc = app.seed_work_center("Cutting").await;
    let detail = app.seed_order("OF-107", 5, wc, 1).await;
    let routing = &app.state.services.routing;

    let mut duplicate_phase = draft_from(&detail, 5, &[1, 1], wc);
    duplicate_phase.order_number = "OF-108".into();
    assert_matches!(
        routing.create_work_order(duplicate_phase).await,
        Err(ServiceError::InvalidInput(_))
    );

    let mut zero_target = draft_from(&detail, 0, &[1], wc);
    zero_target.order_number = "OF-109".into();
    assert_matches!(
        routing.create_work_order(zero_target).await,
        Err(ServiceError::ValidationError(_))
    );

    let mut unknown_center = draft_from(&detail, 5, &[1], Uuid::new_v4());
    unknown_center.order_number = "OF-110".into();
    assert_matches!(
        routing.create_work_order(unknown_center).await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn material_requirements_are_replaced() {
    let app = TestApp::new().await;
    let wc = app.seed_work_center("Cutting").await;
    let steel = app.seed_material("STEEL", 100, 5).await;
    let paint = app.seed_material("PAINT", 40, 5).await;
    let detail = app.seed_order("OF-111", 5, wc, 1).await;
    let op_id = detail.operations[0].id;
    let routing = &app.state.services.routing;

    let views = routing
        .set_material_requirements(
            op_id,
            vec![
                MaterialLine {
                    material_id: steel,
                    quantity_per_unit: Decimal::new(15, 1),
                },
                MaterialLine {
                    material_id: paint,
                    quantity_per_unit: Decimal::from(1),
                },
            ],
        )
        .await
        .unwrap();
    let refs: Vec<&str> = views.iter().map(|v| v.reference.as_str()).collect();
    assert_eq!(refs, vec!["PAINT", "STEEL"]);

    let views = routing
        .set_material_requirements(
            op_id,
            vec![MaterialLine {
                material_id: paint,
                quantity_per_unit: Decimal::from(2),
            }],
        )
        .await
        .unwrap();
    assert_eq!(views.len(), 1);

    assert_matches!(
        routing
            .set_material_requirements(
                op_id,
                vec![MaterialLine {
                    material_id: paint,
                    quantity_per_unit: Decimal::ZERO,
                }],
            )
            .await,
        Err(ServiceError::InvalidInput(_))
    );
}

#[tokio::test]
async fn listing_searches_number_and_title() {
    let app = TestApp::new().await;
    let wc = app.seed_work_center("Cutting").await;
    app.seed_order("OF-200", 5, wc, 1).await;
    app.seed_order("OF-201", 5, wc, 1).await;
    app.seed_order("XK-300", 5, wc, 1).await;
    let routing = &app.state.services.routing;

    let page = routing
        .list_work_orders(Some("of-2".into()), 1, 20)
        .await
        .unwrap();
    assert_eq!(page.total, 2);

    let page = routing
        .list_work_orders(Some("ORDER XK".into()), 1, 20)
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].order_number, "XK-300");

    let page = routing.list_work_orders(None, 1, 2).await.unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.total_pages, 2);
}
