use chrono::{DateTime, NaiveDate, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait,
    ActiveValue::Set,
    ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{
        anomaly, machine, material, material_requirement,
        operation::{self, OperationStatus, OperationType},
        time_entry, work_center,
        work_order::{self, WorkOrderStatus},
    },
    errors::ServiceError,
    services::flow_rules::{self, OrderFigures, PhaseSnapshot},
    PaginatedResponse,
};

/// Header and routing submitted when creating or editing a work order
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct WorkOrderDraft {
    #[validate(length(min = 1, max = 50))]
    pub order_number: String,
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(range(min = 1))]
    pub target_quantity: i32,
    pub planned_start: Option<NaiveDate>,
    pub planned_end: Option<NaiveDate>,
    #[serde(default)]
    pub operations: Vec<OperationDraft>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct OperationDraft {
    #[validate(range(min = 1))]
    pub phase_number: i32,
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub work_center_id: Uuid,
    #[serde(default)]
    pub operation_type: OperationType,
    pub machine_id: Option<Uuid>,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub estimated_minutes: i32,
    #[serde(default)]
    pub materials: Vec<MaterialLine>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct MaterialLine {
    pub material_id: Uuid,
    #[schema(value_type = String, example = "0.5")]
    pub quantity_per_unit: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WorkOrderSummary {
    pub id: Uuid,
    pub order_number: String,
    pub title: String,
    pub target_quantity: i32,
    pub status: WorkOrderStatus,
    pub first_completed_on: Option<NaiveDate>,
    pub planned_start: Option<NaiveDate>,
    pub planned_end: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub produced_quantity: i64,
    pub total_scrap: i64,
    pub progress: f64,
}

impl WorkOrderSummary {
    pub(crate) fn new(order: &work_order::Model, figures: OrderFigures) -> Self {
        Self {
            id: order.id,
            order_number: order.order_number.clone(),
            title: order.title.clone(),
            target_quantity: order.target_quantity,
            status: order.status,
            first_completed_on: order.first_completed_on,
            planned_start: order.planned_start,
            planned_end: order.planned_end,
            created_at: order.created_at,
            produced_quantity: figures.produced_quantity,
            total_scrap: figures.total_scrap,
            progress: flow_rules::round2(flow_rules::progress_percent(
                figures.produced_quantity,
                i64::from(order.target_quantity),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MaterialRequirementView {
    pub material_id: Uuid,
    pub reference: String,
    pub designation: String,
    #[schema(value_type = String)]
    pub quantity_per_unit: Decimal,
    pub unit_of_measure: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OperationView {
    pub id: Uuid,
    pub phase_number: i32,
    pub title: String,
    pub work_center_id: Uuid,
    pub work_center_name: Option<String>,
    pub operation_type: OperationType,
    pub status: OperationStatus,
    pub input_quantity: i32,
    pub machine_id: Option<Uuid>,
    pub machine_name: Option<String>,
    pub estimated_minutes: i32,
    pub good_output: i64,
    pub scrap_output: i64,
    pub scrap_rate: f64,
    pub open_claims: i64,
    pub materials: Vec<MaterialRequirementView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WorkOrderDetail {
    pub order: WorkOrderSummary,
    pub operations: Vec<OperationView>,
}

/// A loaded operation with its aggregated time-entry outputs.
#[derive(Debug, Clone)]
pub(crate) struct LoadedPhase {
    pub operation: operation::Model,
    pub snapshot: PhaseSnapshot,
    pub open_claims: i64,
}

/// Loads an order's operations sorted by phase, with their outputs.
pub(crate) async fn load_phases<C>(conn: &C, order_id: Uuid) -> Result<Vec<LoadedPhase>, ServiceError>
where
    C: ConnectionTrait,
{
    let operations = operation::Entity::find()
        .filter(operation::Column::WorkOrderId.eq(order_id))
        .order_by_asc(operation::Column::PhaseNumber)
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;

    if operations.is_empty() {
        return Ok(Vec::new());
    }

    let entries = time_entry::Entity::find()
        .filter(time_entry::Column::OperationId.is_in(operations.iter().map(|op| op.id)))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;

    let mut totals: HashMap<Uuid, (i64, i64, i64)> = HashMap::new();
    for entry in &entries {
        let slot = totals.entry(entry.operation_id).or_default();
        slot.0 += i64::from(entry.good_quantity);
        slot.1 += i64::from(entry.scrap_quantity);
        if entry.is_open() {
            slot.2 += i64::from(entry.claimed_quantity);
        }
    }

    Ok(operations
        .into_iter()
        .map(|op| {
            let (good, scrap, open) = totals.get(&op.id).copied().unwrap_or_default();
            LoadedPhase {
                snapshot: PhaseSnapshot {
                    phase_number: op.phase_number,
                    status: op.status,
                    good_output: good,
                    scrap_output: scrap,
                },
                operation: op,
                open_claims: open,
            }
        })
        .collect())
}

/// Produced quantity and total scrap for a batch of orders.
pub(crate) async fn figures_for_orders<C>(
    conn: &C,
    order_ids: &[Uuid],
) -> Result<HashMap<Uuid, OrderFigures>, ServiceError>
where
    C: ConnectionTrait,
{
    if order_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let operations = operation::Entity::find()
        .filter(operation::Column::WorkOrderId.is_in(order_ids.iter().copied()))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;

    let mut outputs: HashMap<Uuid, (i64, i64)> = HashMap::new();
    if !operations.is_empty() {
        let entries = time_entry::Entity::find()
            .filter(time_entry::Column::OperationId.is_in(operations.iter().map(|op| op.id)))
            .all(conn)
            .await
            .map_err(ServiceError::db_error)?;
        for entry in entries {
            let slot = outputs.entry(entry.operation_id).or_default();
            slot.0 += i64::from(entry.good_quantity);
            slot.1 += i64::from(entry.scrap_quantity);
        }
    }

    let mut per_order: HashMap<Uuid, Vec<PhaseSnapshot>> = HashMap::new();
    for op in operations {
        let (good, scrap) = outputs.get(&op.id).copied().unwrap_or_default();
        per_order.entry(op.work_order_id).or_default().push(PhaseSnapshot {
            phase_number: op.phase_number,
            status: op.status,
            good_output: good,
            scrap_output: scrap,
        });
    }

    Ok(order_ids
        .iter()
        .map(|id| {
            let figures = per_order
                .get(id)
                .map(|phases| flow_rules::order_figures(phases))
                .unwrap_or_default();
            (*id, figures)
        })
        .collect())
}

/// Rewrites the input quantity of every `Todo` phase from the chain rule.
///
/// Returns the number of operations whose input changed.
pub(crate) async fn sync_routing_on<C>(
    conn: &C,
    order: &work_order::Model,
) -> Result<usize, ServiceError>
where
    C: ConnectionTrait,
{
    let phases = load_phases(conn, order.id).await?;
    let snapshots: Vec<PhaseSnapshot> = phases.iter().map(|p| p.snapshot).collect();
    let plan = flow_rules::plan_input_quantities(order.target_quantity, &snapshots);

    let mut changed = 0;
    for (phase, planned) in phases.iter().zip(plan) {
        let Some(quantity) = planned else { continue };
        if phase.operation.input_quantity == quantity {
            continue;
        }
        let result = operation::Entity::update_many()
            .col_expr(operation::Column::InputQuantity, Expr::value(quantity))
            .col_expr(operation::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(operation::Column::Id.eq(phase.operation.id))
            .filter(operation::Column::Status.eq(OperationStatus::Todo))
            .exec(conn)
            .await
            .map_err(ServiceError::db_error)?;
        changed += result.rows_affected as usize;
    }

    Ok(changed)
}

/// Re-derives the order status from its operations and stamps the
/// first-completion date the first time everything is done.
pub(crate) async fn refresh_order_status<C>(
    conn: &C,
    order: work_order::Model,
    today: NaiveDate,
) -> Result<work_order::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let statuses: Vec<OperationStatus> = operation::Entity::find()
        .filter(operation::Column::WorkOrderId.eq(order.id))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?
        .into_iter()
        .map(|op| op.status)
        .collect();

    let derived = flow_rules::derive_order_status(order.status, &statuses);

    if derived == WorkOrderStatus::Done && order.first_completed_on.is_none() {
        work_order::Entity::update_many()
            .col_expr(work_order::Column::FirstCompletedOn, Expr::value(today))
            .filter(work_order::Column::Id.eq(order.id))
            .filter(work_order::Column::FirstCompletedOn.is_null())
            .exec(conn)
            .await
            .map_err(ServiceError::db_error)?;
        info!(order_number = %order.order_number, %today, "Work order completed for the first time");
    }

    if derived != order.status {
        work_order::Entity::update_many()
            .col_expr(work_order::Column::Status, Expr::value(derived))
            .col_expr(work_order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(work_order::Column::Id.eq(order.id))
            .exec(conn)
            .await
            .map_err(ServiceError::db_error)?;
    }

    work_order::Entity::find_by_id(order.id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Work order {} not found", order.id)))
}

/// Lower-cased substring match over order number and title.
pub(crate) fn search_condition(search: Option<&str>) -> Condition {
    match search.map(str::trim).filter(|s| !s.is_empty()) {
        Some(q) => {
            let pattern = format!("%{}%", q.to_lowercase());
            Condition::any()
                .add(
                    Expr::expr(Func::lower(Expr::col(work_order::Column::OrderNumber)))
                        .like(pattern.clone()),
                )
                .add(Expr::expr(Func::lower(Expr::col(work_order::Column::Title))).like(pattern))
        }
        None => Condition::all(),
    }
}

/// Manages work orders and their routing (operations and materials)
#[derive(Clone)]
pub struct RoutingService {
    db: Arc<DatabaseConnection>,
}

impl RoutingService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Creates a work order with its routing in one transaction
    #[instrument(skip(self, draft), fields(order_number = %draft.order_number))]
    pub async fn create_work_order(
        &self,
        draft: WorkOrderDraft,
    ) -> Result<WorkOrderDetail, ServiceError> {
        validate_draft(&draft)?;

        let db = &*self.db;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let duplicate = work_order::Entity::find()
            .filter(work_order::Column::OrderNumber.eq(draft.order_number.trim()))
            .count(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if duplicate > 0 {
            return Err(ServiceError::Conflict(format!(
                "Work order number {} already exists",
                draft.order_number.trim()
            )));
        }

        check_references(&txn, &draft.operations).await?;

        let order = work_order::ActiveModel {
            order_number: Set(draft.order_number.trim().to_string()),
            title: Set(draft.title.trim().to_string()),
            target_quantity: Set(draft.target_quantity),
            status: Set(WorkOrderStatus::Planned),
            first_completed_on: Set(None),
            planned_start: Set(draft.planned_start),
            planned_end: Set(draft.planned_end),
            materials_consumed_at: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;

        for op in &draft.operations {
            insert_operation(&txn, order.id, op).await?;
        }

        sync_routing_on(&txn, &order).await?;
        let order = refresh_order_status(&txn, order, Utc::now().date_naive()).await?;
        let detail = build_detail(&txn, order).await?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        counter!("shopfloor.work_orders.created", 1);
        info!(
            order_id = %detail.order.id,
            operations = detail.operations.len(),
            "Work order created"
        );

        Ok(detail)
    }

    /// Edits the header and routing of a work order.
    ///
    /// Operations are matched by phase number. Phases missing from the draft
    /// are removed unless they already carry time entries.
    #[instrument(skip(self, draft), fields(order_id = %id))]
    pub async fn update_work_order(
        &self,
        id: Uuid,
        draft: WorkOrderDraft,
    ) -> Result<WorkOrderDetail, ServiceError> {
        validate_draft(&draft)?;

        let db = &*self.db;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let order = find_order(&txn, id).await?;
        if order.status == WorkOrderStatus::Archived {
            return Err(ServiceError::InvalidState(format!(
                "Work order {} is archived",
                order.order_number
            )));
        }

        let new_number = draft.order_number.trim().to_string();
        if new_number != order.order_number {
            let duplicate = work_order::Entity::find()
                .filter(work_order::Column::OrderNumber.eq(new_number.as_str()))
                .filter(work_order::Column::Id.ne(id))
                .count(&txn)
                .await
                .map_err(ServiceError::db_error)?;
            if duplicate > 0 {
                return Err(ServiceError::Conflict(format!(
                    "Work order number {} already exists",
                    new_number
                )));
            }
        }

        check_references(&txn, &draft.operations).await?;

        let mut active: work_order::ActiveModel = order.into();
        active.order_number = Set(new_number);
        active.title = Set(draft.title.trim().to_string());
        active.target_quantity = Set(draft.target_quantity);
        active.planned_start = Set(draft.planned_start);
        active.planned_end = Set(draft.planned_end);
        let order = active.update(&txn).await.map_err(ServiceError::db_error)?;

        let existing = operation::Entity::find()
            .filter(operation::Column::WorkOrderId.eq(order.id))
            .all(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        let mut by_phase: HashMap<i32, operation::Model> = existing
            .into_iter()
            .map(|op| (op.phase_number, op))
            .collect();

        for op_draft in &draft.operations {
            match by_phase.remove(&op_draft.phase_number) {
                Some(current) => update_operation(&txn, current, op_draft).await?,
                None => {
                    insert_operation(&txn, order.id, op_draft).await?;
                }
            }
        }

        // Whatever is left was dropped from the draft
        for (phase_number, removed) in by_phase {
            let entries = time_entry::Entity::find()
                .filter(time_entry::Column::OperationId.eq(removed.id))
                .count(&txn)
                .await
                .map_err(ServiceError::db_error)?;
            if entries > 0 {
                return Err(ServiceError::InvalidState(format!(
                    "Phase {} of {} has time entries and cannot be removed",
                    phase_number, order.order_number
                )));
            }
            delete_operation(&txn, removed.id).await?;
        }

        sync_routing_on(&txn, &order).await?;
        let order = refresh_order_status(&txn, order, Utc::now().date_naive()).await?;
        let detail = build_detail(&txn, order).await?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        counter!("shopfloor.work_orders.updated", 1);
        info!(order_id = %id, "Work order updated");

        Ok(detail)
    }

    /// Deletes a work order that has never been worked on
    #[instrument(skip(self))]
    pub async fn delete_work_order(&self, id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let order = find_order(&txn, id).await?;

        let op_ids: Vec<Uuid> = operation::Entity::find()
            .filter(operation::Column::WorkOrderId.eq(id))
            .all(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|op| op.id)
            .collect();

        if !op_ids.is_empty() {
            let entries = time_entry::Entity::find()
                .filter(time_entry::Column::OperationId.is_in(op_ids.clone()))
                .count(&txn)
                .await
                .map_err(ServiceError::db_error)?;
            if entries > 0 {
                return Err(ServiceError::InvalidState(format!(
                    "Work order {} has time entries and cannot be deleted",
                    order.order_number
                )));
            }
        }

        for op_id in op_ids {
            delete_operation(&txn, op_id).await?;
        }

        work_order::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        counter!("shopfloor.work_orders.deleted", 1);
        info!(order_number = %order.order_number, "Work order deleted");

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_work_order(&self, id: Uuid) -> Result<WorkOrderDetail, ServiceError> {
        let db = &*self.db;
        let order = find_order(db, id).await?;
        build_detail(db, order).await
    }

    /// Lists live (non-archived) orders, newest first
    #[instrument(skip(self))]
    pub async fn list_work_orders(
        &self,
        search: Option<String>,
        page: u64,
        limit: u64,
    ) -> Result<PaginatedResponse<WorkOrderSummary>, ServiceError> {
        self.list_orders(
            Condition::all().add(work_order::Column::Status.ne(WorkOrderStatus::Archived)),
            search,
            page,
            limit,
        )
        .await
    }

    /// Lists archived orders, newest first
    #[instrument(skip(self))]
    pub async fn list_archives(
        &self,
        search: Option<String>,
        page: u64,
        limit: u64,
    ) -> Result<PaginatedResponse<WorkOrderSummary>, ServiceError> {
        self.list_orders(
            Condition::all().add(work_order::Column::Status.eq(WorkOrderStatus::Archived)),
            search,
            page,
            limit,
        )
        .await
    }

    async fn list_orders(
        &self,
        scope: Condition,
        search: Option<String>,
        page: u64,
        limit: u64,
    ) -> Result<PaginatedResponse<WorkOrderSummary>, ServiceError> {
        let db = &*self.db;
        let page = page.max(1);
        let limit = limit.clamp(1, 200);

        let paginator = work_order::Entity::find()
            .filter(scope)
            .filter(search_condition(search.as_deref()))
            .order_by_desc(work_order::Column::CreatedAt)
            .paginate(db, limit);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let orders = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::db_error)?;

        let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let figures = figures_for_orders(db, &ids).await?;

        let items = orders
            .iter()
            .map(|o| WorkOrderSummary::new(o, figures.get(&o.id).copied().unwrap_or_default()))
            .collect();

        Ok(PaginatedResponse {
            items,
            total,
            page,
            limit,
            total_pages: total.div_ceil(limit),
        })
    }

    /// Replaces the material requirements of one operation
    #[instrument(skip(self, lines))]
    pub async fn set_material_requirements(
        &self,
        operation_id: Uuid,
        lines: Vec<MaterialLine>,
    ) -> Result<Vec<MaterialRequirementView>, ServiceError> {
        validate_material_lines(&lines)?;

        let db = &*self.db;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let op = operation::Entity::find_by_id(operation_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Operation {} not found", operation_id)))?;

        check_materials(&txn, &lines).await?;
        replace_materials(&txn, op.id, &lines).await?;
        let views = material_views(&txn, &[op.id])
            .await?
            .remove(&op.id)
            .unwrap_or_default();

        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(operation_id = %operation_id, lines = views.len(), "Material requirements replaced");
        Ok(views)
    }

    /// Recomputes the input chain of an order on demand
    #[instrument(skip(self))]
    pub async fn sync_routing(&self, order_id: Uuid) -> Result<WorkOrderDetail, ServiceError> {
        let db = &*self.db;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let order = find_order(&txn, order_id).await?;
        let changed = sync_routing_on(&txn, &order).await?;
        let order = refresh_order_status(&txn, order, Utc::now().date_naive()).await?;
        let detail = build_detail(&txn, order).await?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(order_id = %order_id, changed, "Routing synchronized");
        Ok(detail)
    }
}

pub(crate) async fn find_order<C>(conn: &C, id: Uuid) -> Result<work_order::Model, ServiceError>
where
    C: ConnectionTrait,
{
    work_order::Entity::find_by_id(id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Work order {} not found", id)))
}

fn validate_draft(draft: &WorkOrderDraft) -> Result<(), ServiceError> {
    draft.validate()?;

    if draft.order_number.trim().is_empty() {
        return Err(ServiceError::InvalidInput(
            "Work order number cannot be empty".to_string(),
        ));
    }

    if let (Some(start), Some(end)) = (draft.planned_start, draft.planned_end) {
        if end < start {
            return Err(ServiceError::InvalidInput(format!(
                "Planned end ({}) cannot be before planned start ({})",
                end, start
            )));
        }
    }

    let mut phases = HashSet::new();
    for op in &draft.operations {
        op.validate()?;
        if !phases.insert(op.phase_number) {
            return Err(ServiceError::InvalidInput(format!(
                "Phase number {} appears more than once",
                op.phase_number
            )));
        }
        validate_material_lines(&op.materials)?;
    }

    Ok(())
}

fn validate_material_lines(lines: &[MaterialLine]) -> Result<(), ServiceError> {
    let mut seen = HashSet::new();
    for line in lines {
        if line.quantity_per_unit <= Decimal::ZERO {
            return Err(ServiceError::InvalidInput(format!(
                "Quantity per unit must be positive, got: {}",
                line.quantity_per_unit
            )));
        }
        if !seen.insert(line.material_id) {
            return Err(ServiceError::InvalidInput(format!(
                "Material {} is listed more than once",
                line.material_id
            )));
        }
    }
    Ok(())
}

async fn check_references<C>(conn: &C, operations: &[OperationDraft]) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    let centers: HashSet<Uuid> = operations.iter().map(|op| op.work_center_id).collect();
    if !centers.is_empty() {
        let found = work_center::Entity::find()
            .filter(work_center::Column::Id.is_in(centers.iter().copied()))
            .count(conn)
            .await
            .map_err(ServiceError::db_error)?;
        if found as usize != centers.len() {
            return Err(ServiceError::NotFound(
                "One or more work centers do not exist".to_string(),
            ));
        }
    }

    let machines: HashSet<Uuid> = operations.iter().filter_map(|op| op.machine_id).collect();
    if !machines.is_empty() {
        let found = machine::Entity::find()
            .filter(machine::Column::Id.is_in(machines.iter().copied()))
            .count(conn)
            .await
            .map_err(ServiceError::db_error)?;
        if found as usize != machines.len() {
            return Err(ServiceError::NotFound(
                "One or more machines do not exist".to_string(),
            ));
        }
    }

    let lines: Vec<MaterialLine> = operations
        .iter()
        .flat_map(|op| op.materials.iter().cloned())
        .collect();
    check_materials(conn, &lines).await
}

async fn check_materials<C>(conn: &C, lines: &[MaterialLine]) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    let ids: HashSet<Uuid> = lines.iter().map(|l| l.material_id).collect();
    if ids.is_empty() {
        return Ok(());
    }
    let found = material::Entity::find()
        .filter(material::Column::Id.is_in(ids.iter().copied()))
        .count(conn)
        .await
        .map_err(ServiceError::db_error)?;
    if found as usize != ids.len() {
        return Err(ServiceError::NotFound(
            "One or more materials do not exist".to_string(),
        ));
    }
    Ok(())
}

async fn insert_operation<C>(
    conn: &C,
    order_id: Uuid,
    draft: &OperationDraft,
) -> Result<operation::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let op = operation::ActiveModel {
        work_order_id: Set(order_id),
        phase_number: Set(draft.phase_number),
        title: Set(draft.title.trim().to_string()),
        work_center_id: Set(draft.work_center_id),
        operation_type: Set(draft.operation_type),
        status: Set(OperationStatus::Todo),
        input_quantity: Set(0),
        machine_id: Set(draft.machine_id),
        estimated_minutes: Set(draft.estimated_minutes),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(ServiceError::db_error)?;

    replace_materials(conn, op.id, &draft.materials).await?;
    Ok(op)
}

async fn update_operation<C>(
    conn: &C,
    current: operation::Model,
    draft: &OperationDraft,
) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    if current.status == OperationStatus::Rework {
        warn!(operation_id = %current.id, "Editing an operation flagged for rework");
    }

    let op_id = current.id;
    let mut active: operation::ActiveModel = current.into();
    active.title = Set(draft.title.trim().to_string());
    active.work_center_id = Set(draft.work_center_id);
    active.operation_type = Set(draft.operation_type);
    active.machine_id = Set(draft.machine_id);
    active.estimated_minutes = Set(draft.estimated_minutes);
    active.update(conn).await.map_err(ServiceError::db_error)?;

    replace_materials(conn, op_id, &draft.materials).await
}

async fn delete_operation<C>(conn: &C, operation_id: Uuid) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    material_requirement::Entity::delete_many()
        .filter(material_requirement::Column::OperationId.eq(operation_id))
        .exec(conn)
        .await
        .map_err(ServiceError::db_error)?;
    anomaly::Entity::delete_many()
        .filter(anomaly::Column::OperationId.eq(operation_id))
        .exec(conn)
        .await
        .map_err(ServiceError::db_error)?;
    operation::Entity::delete_by_id(operation_id)
        .exec(conn)
        .await
        .map_err(ServiceError::db_error)?;
    Ok(())
}

async fn replace_materials<C>(
    conn: &C,
    operation_id: Uuid,
    lines: &[MaterialLine],
) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    material_requirement::Entity::delete_many()
        .filter(material_requirement::Column::OperationId.eq(operation_id))
        .exec(conn)
        .await
        .map_err(ServiceError::db_error)?;

    for line in lines {
        material_requirement::ActiveModel {
            operation_id: Set(operation_id),
            material_id: Set(line.material_id),
            quantity_per_unit: Set(line.quantity_per_unit),
            ..Default::default()
        }
        .insert(conn)
        .await
        .map_err(ServiceError::db_error)?;
    }
    Ok(())
}

async fn material_views<C>(
    conn: &C,
    operation_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<MaterialRequirementView>>, ServiceError>
where
    C: ConnectionTrait,
{
    if operation_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = material_requirement::Entity::find()
        .filter(material_requirement::Column::OperationId.is_in(operation_ids.iter().copied()))
        .find_also_related(material::Entity)
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;

    let mut views: HashMap<Uuid, Vec<MaterialRequirementView>> = HashMap::new();
    for (req, mat) in rows {
        let Some(mat) = mat else { continue };
        views
            .entry(req.operation_id)
            .or_default()
            .push(MaterialRequirementView {
                material_id: mat.id,
                reference: mat.reference,
                designation: mat.designation,
                quantity_per_unit: req.quantity_per_unit,
                unit_of_measure: mat.unit_of_measure,
            });
    }
    for list in views.values_mut() {
        list.sort_by(|a, b| a.reference.cmp(&b.reference));
    }
    Ok(views)
}

pub(crate) async fn build_detail<C>(
    conn: &C,
    order: work_order::Model,
) -> Result<WorkOrderDetail, ServiceError>
where
    C: ConnectionTrait,
{
    let phases = load_phases(conn, order.id).await?;
    let snapshots: Vec<PhaseSnapshot> = phases.iter().map(|p| p.snapshot).collect();
    let figures = flow_rules::order_figures(&snapshots);

    let op_ids: Vec<Uuid> = phases.iter().map(|p| p.operation.id).collect();
    let mut materials = material_views(conn, &op_ids).await?;

    let center_ids: HashSet<Uuid> = phases.iter().map(|p| p.operation.work_center_id).collect();
    let centers: HashMap<Uuid, String> = if center_ids.is_empty() {
        HashMap::new()
    } else {
        work_center::Entity::find()
            .filter(work_center::Column::Id.is_in(center_ids))
            .all(conn)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect()
    };

    let machine_ids: HashSet<Uuid> = phases.iter().filter_map(|p| p.operation.machine_id).collect();
    let machines: HashMap<Uuid, String> = if machine_ids.is_empty() {
        HashMap::new()
    } else {
        machine::Entity::find()
            .filter(machine::Column::Id.is_in(machine_ids))
            .all(conn)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|m| (m.id, m.name))
            .collect()
    };

    let operations = phases
        .into_iter()
        .map(|phase| {
            let op = phase.operation;
            OperationView {
                id: op.id,
                phase_number: op.phase_number,
                title: op.title,
                work_center_id: op.work_center_id,
                work_center_name: centers.get(&op.work_center_id).cloned(),
                operation_type: op.operation_type,
                status: op.status,
                input_quantity: op.input_quantity,
                machine_id: op.machine_id,
                machine_name: op.machine_id.and_then(|id| machines.get(&id).cloned()),
                estimated_minutes: op.estimated_minutes,
                good_output: phase.snapshot.good_output,
                scrap_output: phase.snapshot.scrap_output,
                scrap_rate: flow_rules::round2(flow_rules::scrap_rate(
                    phase.snapshot.good_output,
                    phase.snapshot.scrap_output,
                )),
                open_claims: phase.open_claims,
                materials: materials.remove(&op.id).unwrap_or_default(),
            }
        })
        .collect();

    Ok(WorkOrderDetail {
        order: WorkOrderSummary::new(&order, figures),
        operations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn draft() -> WorkOrderDraft {
        WorkOrderDraft {
            order_number: "OF-1".into(),
            title: "Brackets".into(),
            target_quantity: 20,
            planned_start: None,
            planned_end: None,
            operations: vec![OperationDraft {
                phase_number: 10,
                title: "Cut".into(),
                work_center_id: Uuid::new_v4(),
                operation_type: OperationType::Production,
                machine_id: None,
                estimated_minutes: 30,
                materials: vec![],
            }],
        }
    }

    #[test]
    fn draft_rejects_duplicate_phases() {
        let mut d = draft();
        d.operations.push(d.operations[0].clone());
        assert_matches!(validate_draft(&d), Err(ServiceError::InvalidInput(_)));
    }

    #[test]
    fn draft_rejects_inverted_planning() {
        let mut d = draft();
        d.planned_start = NaiveDate::from_ymd_opt(2024, 5, 2);
        d.planned_end = NaiveDate::from_ymd_opt(2024, 5, 1);
        assert_matches!(validate_draft(&d), Err(ServiceError::InvalidInput(_)));
    }

    #[test]
    fn draft_rejects_non_positive_target() {
        let mut d = draft();
        d.target_quantity = 0;
        assert_matches!(validate_draft(&d), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn material_lines_must_be_positive_and_unique() {
        let id = Uuid::new_v4();
        let zero = vec![MaterialLine {
            material_id: id,
            quantity_per_unit: dec!(0),
        }];
        assert_matches!(validate_material_lines(&zero), Err(ServiceError::InvalidInput(_)));

        let twice = vec![
            MaterialLine {
                material_id: id,
                quantity_per_unit: dec!(1),
            },
            MaterialLine {
                material_id: id,
                quantity_per_unit: dec!(2),
            },
        ];
        assert_matches!(validate_material_lines(&twice), Err(ServiceError::InvalidInput(_)));
    }

    #[test]
    fn valid_draft_passes() {
        assert!(validate_draft(&draft()).is_ok());
    }
}
