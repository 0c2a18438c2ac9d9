mod common;

use assert_matches::assert_matches;
use chrono::Utc;
use shopfloor_api::{
    entities::work_order::WorkOrderStatus,
    errors::ServiceError,
    services::{
        reporting::{ScrapByOrderFilter, TimeEntryFilter},
        routing::{OperationDraft, WorkOrderDraft},
    },
};

use common::TestApp;

#[tokio::test]
async fn only_old_completed_orders_are_archived() {
    let app = TestApp::new().await;
    let wc = app.seed_work_center("Cutting").await;
    let op = app.seed_operator("A", &[wc]).await;

    let old_done = app.seed_order("OF-OLD", 10, wc, 1).await;
    app.complete_phase(old_done.operations[0].id, op.id, 10, 1).await;
    app.backdate_order(old_done.order.id, 45).await;

    let recent_done = app.seed_order("OF-RECENT", 10, wc, 1).await;
    app.complete_phase(recent_done.operations[0].id, op.id, 10, 0).await;
    app.backdate_order(recent_done.order.id, 5).await;

    let old_running = app.seed_order("OF-RUNNING", 10, wc, 1).await;
    app.claim(old_running.operations[0].id, op.id, 4).await;
    app.backdate_order(old_running.order.id, 60).await;

    let archived = app
        .state
        .services
        .archival
        .archive_completed_orders(Utc::now(), 30)
        .await
        .unwrap();
    assert_eq!(archived, 1);

    let routing = &app.state.services.routing;
    let archives = routing.list_archives(None, 1, 20).await.unwrap();
    assert_eq!(archives.total, 1);
    assert_eq!(archives.items[0].order_number, "OF-OLD");
    assert_eq!(archives.items[0].status, WorkOrderStatus::Archived);

    let live = routing.list_work_orders(None, 1, 20).await.unwrap();
    let numbers: Vec<&str> = live.items.iter().map(|o| o.order_number.as_str()).collect();
    assert_eq!(live.total, 2);
    assert!(!numbers.contains(&"OF-OLD"));

    // A second run has nothing left to do
    let again = app
        .state
        .services
        .archival
        .archive_completed_orders(Utc::now(), 30)
        .await
        .unwrap();
    assert_eq!(again, 0);
}

#[tokio::test]
async fn archived_orders_leave_reports_and_are_frozen() {
    let app = TestApp::new().await;
    let wc = app.seed_work_center("Cutting").await;
    let op = app.seed_operator("A", &[wc]).await;

    let detail = app.seed_order("OF-ARCH", 10, wc, 1).await;
    app.complete_phase(detail.operations[0].id, op.id, 10, 3).await;
    app.backdate_order(detail.order.id, 40).await;

    let reporting = &app.state.services.reporting;
    let today = Utc::now().date_naive();
    let before = reporting
        .scrap_by_order(ScrapByOrderFilter::default())
        .await
        .unwrap();
    assert_eq!(before.rows.len(), 1);

    app.state
        .services
        .archival
        .archive_completed_orders(Utc::now(), 30)
        .await
        .unwrap();

    let after = reporting
        .scrap_by_order(ScrapByOrderFilter::default())
        .await
        .unwrap();
    assert!(after.rows.is_empty());

    let kpis = reporting.compute_kpis_for_date(today).await.unwrap();
    assert_eq!(kpis.produced_quantity, 0);
    assert_eq!(kpis.active_operators, 0);

    let production = reporting.production_by_order(today, None).await.unwrap();
    assert!(production.orders.is_empty());

    // The ledger is an export and still lists archived work
    let ledger = reporting
        .time_entry_ledger(TimeEntryFilter::default(), Utc::now())
        .await
        .unwrap();
    assert_eq!(ledger.len(), 1);

    let draft = WorkOrderDraft {
        order_number: "OF-ARCH".into(),
        title: "Reopened".into(),
        target_quantity: 12,
        planned_start: None,
        planned_end: None,
        operations: vec![OperationDraft {
            phase_number: 1,
            title: "Phase 1".into(),
            work_center_id: wc,
            operation_type: Default::default(),
            machine_id: None,
            estimated_minutes: 30,
            materials: Vec::new(),
        }],
    };
    assert_matches!(
        app.state
            .services
            .routing
            .update_work_order(detail.order.id, draft)
            .await,
        Err(ServiceError::InvalidState(_))
    );

    assert_matches!(
        app.state
            .services
            .production
            .confirm_start(detail.operations[0].id, op.id, 1)
            .await,
        Err(ServiceError::Locked(_))
    );
}

#[tokio::test]
async fn retention_must_be_positive() {
    let app = TestApp::new().await;
    assert_matches!(
        app.state
            .services
            .archival
            .archive_completed_orders(Utc::now(), 0)
            .await,
        Err(ServiceError::InvalidInput(_))
    );
}
