//! Integration tests for the claim/complete protocol
//!
//! Covers the quantity flow between phases, stock consumption on the first
//! phase, and the rejection paths that must leave the database untouched.

mod common;

use assert_matches::assert_matches;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use shopfloor_api::{
    entities::{
        anomaly::{self, AnomalyStatus},
        operation::OperationStatus,
        time_entry,
        work_order::WorkOrderStatus,
    },
    errors::ServiceError,
    services::{
        flow_rules::OperationRef,
        production_flow::FinishDeclaration,
        routing::{MaterialLine, OperationDraft, WorkOrderDraft},
    },
};

use common::TestApp;

fn target(code: &str) -> OperationRef {
    code.parse().expect("valid scan code")
}

#[tokio::test]
async fn two_operators_complete_a_two_phase_order() {
    let app = TestApp::new().await;
    let wc = app.seed_work_center("Cutting").await;
    let alice = app.seed_operator("A", &[wc]).await;
    let bob = app.seed_operator("B", &[wc]).await;
    let steel = app.seed_material("STEEL", 100, 10).await;

    let detail = app
        .seed_order_with_materials(
            "OF1",
            20,
            wc,
            2,
            vec![MaterialLine {
                material_id: steel,
                quantity_per_unit: Decimal::from(2),
            }],
        )
        .await;
    assert_eq!(detail.order.status, WorkOrderStatus::InProduction);
    let phase1 = detail.operations[0].id;
    let phase2 = detail.operations[1].id;
    assert_eq!(detail.operations[0].input_quantity, 20);
    assert_eq!(detail.operations[1].input_quantity, 0);

    let production = &app.state.services.production;

    // A scans the travel sheet and takes 12 of 20
    let proposal = production
        .propose_start("a", &target("OF1/1"), Some(12))
        .await
        .unwrap();
    assert_eq!(proposal.available_quantity, 20);
    assert_eq!(proposal.suggested_quantity, 12);
    let entry_a = app.claim(phase1, alice.id, 12).await;

    let order = app.state.services.routing.get_work_order(detail.order.id).await.unwrap();
    assert_eq!(order.order.status, WorkOrderStatus::InProduction);
    assert_eq!(order.operations[0].status, OperationStatus::InProgress);

    // B sees what is left
    let proposal = production
        .propose_start("B", &target("OF1/1"), None)
        .await
        .unwrap();
    assert_eq!(proposal.available_quantity, 8);
    assert_eq!(proposal.suggested_quantity, 8);
    let entry_b = app.claim(phase1, bob.id, 8).await;

    let outcome = app.finish(entry_a.id, 10, 2).await;
    assert!(!outcome.operation_completed);
    assert_eq!(outcome.total_output, 12);
    assert!(outcome.next_phase.is_none());
    assert!(outcome.stock_consumed.is_empty());
    assert_eq!(app.stock_of(steel).await, Decimal::from(100));

    let outcome = app.finish(entry_b.id, 8, 0).await;
    assert!(outcome.operation_completed);
    assert_eq!(outcome.operation_status, OperationStatus::Done);
    let next = outcome.next_phase.expect("phase 2 unlocked");
    assert_eq!(next.operation_id, phase2);
    assert_eq!(next.input_quantity, 18);
    assert_eq!(outcome.stock_consumed.len(), 1);
    assert_eq!(outcome.stock_consumed[0].quantity, Decimal::from(40));
    assert_eq!(app.stock_of(steel).await, Decimal::from(60));
    assert_eq!(outcome.order_status, WorkOrderStatus::InProduction);

    // Phase 2 runs on the good output of phase 1
    let outcome = app.complete_phase(phase2, alice.id, 18, 0).await;
    assert!(outcome.operation_completed);
    assert!(outcome.next_phase.is_none());
    assert!(outcome.stock_consumed.is_empty());
    assert_eq!(outcome.order_status, WorkOrderStatus::Done);
    assert_eq!(outcome.first_completed_on, Some(Utc::now().date_naive()));
    assert_eq!(app.stock_of(steel).await, Decimal::from(60));

    let order = app.state.services.routing.get_work_order(detail.order.id).await.unwrap();
    assert_eq!(order.order.produced_quantity, 18);
    assert_eq!(order.order.total_scrap, 2);
    assert_eq!(order.order.progress, 90.0);
}

#[tokio::test]
async fn materials_are_consumed_once_per_order() {
    let app = TestApp::new().await;
    let wc = app.seed_work_center("Welding").await;
    let op = app.seed_operator("W1", &[wc]).await;
    let steel = app.seed_material("STEEL", 100, 5).await;
    let lines = vec![MaterialLine {
        material_id: steel,
        quantity_per_unit: Decimal::ONE,
    }];
    let phase = |number: i32| OperationDraft {
        phase_number: number,
        title: format!("Phase {}", number),
        work_center_id: wc,
        operation_type: Default::default(),
        machine_id: None,
        estimated_minutes: 20,
        materials: lines.clone(),
    };
    let draft = |operations: Vec<OperationDraft>| WorkOrderDraft {
        order_number: "OF-ONCE".to_string(),
        title: "Brackets".to_string(),
        target_quantity: 10,
        planned_start: None,
        planned_end: None,
        operations,
    };

    let routing = &app.state.services.routing;
    let detail = routing.create_work_order(draft(vec![phase(5)])).await.unwrap();
    let outcome = app.complete_phase(detail.operations[0].id, op.id, 10, 0).await;
    assert_eq!(outcome.stock_consumed.len(), 1);
    assert_eq!(app.stock_of(steel).await, Decimal::from(90));
    assert_eq!(outcome.order_status, WorkOrderStatus::Done);

    // A lower-numbered phase becomes the new first phase
    let detail = routing
        .update_work_order(detail.order.id, draft(vec![phase(1), phase(5)]))
        .await
        .unwrap();
    assert_eq!(detail.order.status, WorkOrderStatus::InProduction);
    let new_first = detail
        .operations
        .iter()
        .find(|o| o.phase_number == 1)
        .expect("phase 1 inserted");
    assert_eq!(new_first.input_quantity, 10);

    let outcome = app.complete_phase(new_first.id, op.id, 10, 0).await;
    assert!(outcome.operation_completed);
    assert!(outcome.stock_consumed.is_empty());
    assert_eq!(app.stock_of(steel).await, Decimal::from(90));
    assert_eq!(outcome.order_status, WorkOrderStatus::Done);
}

#[tokio::test]
async fn done_phase_is_locked() {
    let app = TestApp::new().await;
    let wc = app.seed_work_center("Milling").await;
    let op = app.seed_operator("OP1", &[wc]).await;
    let detail = app.seed_order("OF2", 5, wc, 2).await;
    let phase1 = detail.operations[0].id;

    app.complete_phase(phase1, op.id, 5, 0).await;

    let err = app
        .state
        .services
        .production
        .propose_start("OP1", &target("OF2/1"), None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Locked(_));

    let err = app
        .state
        .services
        .production
        .confirm_start(phase1, op.id, 1)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Locked(_));
}

#[tokio::test]
async fn quantity_mismatch_leaves_entry_open() {
    let app = TestApp::new().await;
    let wc = app.seed_work_center("Welding").await;
    let op = app.seed_operator("W1", &[wc]).await;
    let detail = app.seed_order("OF3", 10, wc, 1).await;
    let phase1 = detail.operations[0].id;

    let entry = app.claim(phase1, op.id, 5).await;

    let err = app
        .state
        .services
        .production
        .confirm_finish(FinishDeclaration {
            time_entry_id: entry.id,
            good_quantity: 3,
            scrap_quantity: 1,
            problem: true,
            problem_description: Some("Burr on edge".into()),
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::QuantityMismatch(_));

    // Nothing was written: entry still open, no anomaly recorded
    let proposal = app
        .state
        .services
        .production
        .propose_finish("W1", &target("OF3/1"))
        .await
        .unwrap();
    assert_eq!(proposal.time_entry_id, entry.id);
    assert_eq!(proposal.claimed_quantity, 5);

    let anomalies = anomaly::Entity::find().count(&*app.state.db).await.unwrap();
    assert_eq!(anomalies, 0);

    let stored = time_entry::Entity::find_by_id(entry.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_open());
    assert_eq!(stored.good_quantity, 0);
}

#[tokio::test]
async fn unqualified_operator_cannot_claim() {
    let app = TestApp::new().await;
    let cutting = app.seed_work_center("Cutting").await;
    let painting = app.seed_work_center("Painting").await;
    let painter = app.seed_operator("P1", &[painting]).await;
    let detail = app.seed_order("OF4", 10, cutting, 1).await;
    let phase1 = detail.operations[0].id;

    let err = app
        .state
        .services
        .production
        .propose_start("P1", &target("OF4/1"), None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Unqualified(_));

    let err = app
        .state
        .services
        .production
        .confirm_start(phase1, painter.id, 3)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Unqualified(_));

    let entries = time_entry::Entity::find()
        .filter(time_entry::Column::OperationId.eq(phase1))
        .count(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(entries, 0);

    let order = app.state.services.routing.get_work_order(detail.order.id).await.unwrap();
    assert_eq!(order.operations[0].status, OperationStatus::Todo);
    assert_eq!(order.order.status, WorkOrderStatus::InProduction);
}

#[tokio::test]
async fn claims_cannot_exceed_availability() {
    let app = TestApp::new().await;
    let wc = app.seed_work_center("Press").await;
    let op = app.seed_operator("X1", &[wc]).await;
    let detail = app.seed_order("OF5", 10, wc, 2).await;
    let production = &app.state.services.production;

    let err = production
        .confirm_start(detail.operations[0].id, op.id, 11)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NoQuantityAvailable(_));

    let err = production
        .confirm_start(detail.operations[0].id, op.id, -1)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    // Phase 2 has no input until phase 1 is done
    let err = production
        .propose_start("X1", &target("OF5/2"), None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NoQuantityAvailable(_));

    app.claim(detail.operations[0].id, op.id, 10).await;
    let err = production
        .confirm_start(detail.operations[0].id, op.id, 1)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NoQuantityAvailable(_));
}

#[tokio::test]
async fn problem_report_creates_open_anomaly() {
    let app = TestApp::new().await;
    let wc = app.seed_work_center("Assembly").await;
    let op = app.seed_operator("AS1", &[wc]).await;
    let detail = app.seed_order("OF6", 4, wc, 1).await;

    let entry = app.claim(detail.operations[0].id, op.id, 4).await;
    let outcome = app
        .state
        .services
        .production
        .confirm_finish(FinishDeclaration {
            time_entry_id: entry.id,
            good_quantity: 3,
            scrap_quantity: 1,
            problem: true,
            problem_description: Some("   ".into()),
        })
        .await
        .unwrap();

    let anomaly_id = outcome.anomaly_id.expect("anomaly recorded");
    let anomaly = app
        .state
        .services
        .anomalies
        .get_anomaly(anomaly_id)
        .await
        .unwrap();
    assert_eq!(anomaly.description, "Not specified");
    assert_eq!(anomaly.status, AnomalyStatus::Open);
    assert_eq!(anomaly.order_number, "OF6");
    assert!(!anomaly.hidden_from_dashboard);

    let resolved = app
        .state
        .services
        .anomalies
        .resolve_anomaly(anomaly_id, None)
        .await
        .unwrap();
    assert_eq!(resolved.status, AnomalyStatus::Resolved);
    assert!(resolved.resolved_at.is_some());

    let err = app
        .state
        .services
        .anomalies
        .resolve_anomaly(anomaly_id, None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(_));
}

#[tokio::test]
async fn closed_entry_cannot_be_closed_again() {
    let app = TestApp::new().await;
    let wc = app.seed_work_center("Lathe").await;
    let op = app.seed_operator("L1", &[wc]).await;
    let detail = app.seed_order("OF7", 10, wc, 1).await;

    let entry = app.claim(detail.operations[0].id, op.id, 4).await;
    app.finish(entry.id, 4, 0).await;

    let err = app
        .state
        .services
        .production
        .confirm_finish(FinishDeclaration {
            time_entry_id: entry.id,
            good_quantity: 4,
            scrap_quantity: 0,
            problem: false,
            problem_description: None,
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(_));

    let err = app
        .state
        .services
        .production
        .propose_finish("L1", &target("OF7/1"))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn unknown_scan_targets_are_not_found() {
    let app = TestApp::new().await;
    let wc = app.seed_work_center("Deburring").await;
    app.seed_operator("D1", &[wc]).await;
    app.seed_order("OF8", 3, wc, 1).await;
    let production = &app.state.services.production;

    assert_matches!(
        production.propose_start("D1", &target("OF8/9"), None).await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        production.propose_start("D1", &target("NOPE/1"), None).await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        production.propose_start("ZZ", &target("OF8/1"), None).await,
        Err(ServiceError::NotFound(_))
    );
}
