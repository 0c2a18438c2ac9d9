//! Claim and completion protocol for operations.
//!
//! Every transition is a propose/confirm pair. The propose step is a read
//! used to show the operator what will happen; the confirm step re-reads
//! the operation inside a transaction and re-validates before writing.

use chrono::{DateTime, NaiveDate, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait,
    DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::{
        anomaly, material, material_requirement,
        operation::{self, OperationStatus},
        operator, operator_qualification, time_entry,
        work_order::{self, WorkOrderStatus},
    },
    errors::ServiceError,
    services::{
        flow_rules::{self, OperationRef},
        routing::{find_order, refresh_order_status},
    },
};

const UNSPECIFIED_PROBLEM: &str = "Not specified";

/// What an operator is about to claim
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StartProposal {
    pub operation_id: Uuid,
    pub operator_id: Uuid,
    pub order_number: String,
    pub phase_number: i32,
    pub operation_title: String,
    pub available_quantity: i64,
    pub suggested_quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FinishProposal {
    pub time_entry_id: Uuid,
    pub operation_id: Uuid,
    pub operation_title: String,
    pub claimed_quantity: i32,
    pub started_at: DateTime<Utc>,
}

/// Declared output when closing a time entry
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FinishDeclaration {
    pub time_entry_id: Uuid,
    pub good_quantity: i32,
    pub scrap_quantity: i32,
    #[serde(default)]
    pub problem: bool,
    pub problem_description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TimeEntryView {
    pub id: Uuid,
    pub operation_id: Uuid,
    pub operator_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub claimed_quantity: i32,
    pub good_quantity: i32,
    pub scrap_quantity: i32,
}

impl From<time_entry::Model> for TimeEntryView {
    fn from(entry: time_entry::Model) -> Self {
        Self {
            id: entry.id,
            operation_id: entry.operation_id,
            operator_id: entry.operator_id,
            started_at: entry.started_at,
            ended_at: entry.ended_at,
            claimed_quantity: entry.claimed_quantity,
            good_quantity: entry.good_quantity,
            scrap_quantity: entry.scrap_quantity,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UnlockedPhase {
    pub operation_id: Uuid,
    pub phase_number: i32,
    pub input_quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StockMovement {
    pub material_id: Uuid,
    pub reference: String,
    #[schema(value_type = String)]
    pub quantity: Decimal,
}

/// Result of closing a time entry
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FinishOutcome {
    pub time_entry: TimeEntryView,
    pub operation_status: OperationStatus,
    pub operation_completed: bool,
    pub total_output: i64,
    pub input_quantity: i32,
    pub next_phase: Option<UnlockedPhase>,
    pub stock_consumed: Vec<StockMovement>,
    pub anomaly_id: Option<Uuid>,
    pub order_status: WorkOrderStatus,
    pub first_completed_on: Option<NaiveDate>,
}

/// Drives the operator-facing claim/complete transitions
#[derive(Clone)]
pub struct ProductionFlowService {
    db: Arc<DatabaseConnection>,
}

impl ProductionFlowService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Validates a claim request and reports the claimable quantity
    #[instrument(skip(self), fields(order = %target.order_number, phase = target.phase_number))]
    pub async fn propose_start(
        &self,
        operator_code: &str,
        target: &OperationRef,
        requested_quantity: Option<i32>,
    ) -> Result<StartProposal, ServiceError> {
        let db = &*self.db;

        let op_row = find_operator(db, operator_code).await?;
        let (order, op) = find_operation(db, target).await?;
        ensure_qualified(db, &op_row, &op).await?;
        ensure_claimable(&order, &op)?;

        let available = flow_rules::available_quantity(op.input_quantity, open_claims(db, op.id).await?);
        if available <= 0 && op.status != OperationStatus::InProgress {
            return Err(ServiceError::NoQuantityAvailable(format!(
                "Phase {} of {} has nothing left to claim",
                op.phase_number, order.order_number
            )));
        }

        let ceiling = available.max(0);
        let suggested_quantity = requested_quantity
            .map(|q| i64::from(q).clamp(0, ceiling))
            .unwrap_or(ceiling);

        Ok(StartProposal {
            operation_id: op.id,
            operator_id: op_row.id,
            order_number: order.order_number,
            phase_number: op.phase_number,
            operation_title: op.title,
            available_quantity: available,
            suggested_quantity,
        })
    }

    /// Opens a time entry after re-validating availability under lock
    #[instrument(skip(self))]
    pub async fn confirm_start(
        &self,
        operation_id: Uuid,
        operator_id: Uuid,
        claim_quantity: i32,
    ) -> Result<TimeEntryView, ServiceError> {
        if claim_quantity < 0 {
            return Err(ServiceError::ValidationError(format!(
                "Claim quantity cannot be negative, got: {}",
                claim_quantity
            )));
        }

        let db = &*self.db;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let op = lock_operation(&txn, operation_id).await?;
        let op_row = operator::Entity::find_by_id(operator_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Operator {} not found", operator_id)))?;
        let order = find_order(&txn, op.work_order_id).await?;

        ensure_qualified(&txn, &op_row, &op).await?;
        ensure_claimable(&order, &op)?;

        let available =
            flow_rules::available_quantity(op.input_quantity, open_claims(&txn, op.id).await?);
        if available <= 0 && op.status != OperationStatus::InProgress {
            return Err(ServiceError::NoQuantityAvailable(format!(
                "Phase {} of {} has nothing left to claim",
                op.phase_number, order.order_number
            )));
        }
        if i64::from(claim_quantity) > available.max(0) {
            return Err(ServiceError::NoQuantityAvailable(format!(
                "Requested {} but only {} available",
                claim_quantity,
                available.max(0)
            )));
        }
        if claim_quantity == 0 && op.status != OperationStatus::InProgress {
            return Err(ServiceError::ValidationError(
                "Claim quantity must be positive".to_string(),
            ));
        }

        let entry = time_entry::ActiveModel {
            operation_id: Set(op.id),
            operator_id: Set(op_row.id),
            ended_at: Set(None),
            claimed_quantity: Set(claim_quantity),
            good_quantity: Set(0),
            scrap_quantity: Set(0),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;

        if op.status == OperationStatus::Todo {
            operation::Entity::update_many()
                .col_expr(operation::Column::Status, Expr::value(OperationStatus::InProgress))
                .col_expr(operation::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(operation::Column::Id.eq(op.id))
                .filter(operation::Column::Status.eq(OperationStatus::Todo))
                .exec(&txn)
                .await
                .map_err(ServiceError::db_error)?;
        }

        refresh_order_status(&txn, order, Utc::now().date_naive()).await?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        counter!("shopfloor.claims.opened", 1);
        info!(
            time_entry_id = %entry.id,
            operation_id = %op.id,
            operator = %op_row.code,
            claimed = claim_quantity,
            "Time entry opened"
        );

        Ok(entry.into())
    }

    /// Finds the operator's open time entry on an operation
    #[instrument(skip(self), fields(order = %target.order_number, phase = target.phase_number))]
    pub async fn propose_finish(
        &self,
        operator_code: &str,
        target: &OperationRef,
    ) -> Result<FinishProposal, ServiceError> {
        let db = &*self.db;

        let op_row = find_operator(db, operator_code).await?;
        let (order, op) = find_operation(db, target).await?;

        let entry = time_entry::Entity::find()
            .filter(time_entry::Column::OperationId.eq(op.id))
            .filter(time_entry::Column::OperatorId.eq(op_row.id))
            .filter(time_entry::Column::EndedAt.is_null())
            .order_by_desc(time_entry::Column::StartedAt)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "No open time entry for {} on phase {} of {}",
                    op_row.code, op.phase_number, order.order_number
                ))
            })?;

        Ok(FinishProposal {
            time_entry_id: entry.id,
            operation_id: op.id,
            operation_title: op.title,
            claimed_quantity: entry.claimed_quantity,
            started_at: entry.started_at,
        })
    }

    /// Closes a time entry and propagates completion down the routing
    #[instrument(skip(self, declaration), fields(time_entry_id = %declaration.time_entry_id))]
    pub async fn confirm_finish(
        &self,
        declaration: FinishDeclaration,
    ) -> Result<FinishOutcome, ServiceError> {
        if declaration.good_quantity < 0 || declaration.scrap_quantity < 0 {
            return Err(ServiceError::ValidationError(
                "Good and scrap quantities cannot be negative".to_string(),
            ));
        }

        let db = &*self.db;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let entry = time_entry::Entity::find_by_id(declaration.time_entry_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Time entry {} not found",
                    declaration.time_entry_id
                ))
            })?;
        let op = lock_operation(&txn, entry.operation_id).await?;

        if op.status == OperationStatus::Done {
            return Err(ServiceError::Locked(format!(
                "Phase {} is already done",
                op.phase_number
            )));
        }
        if !entry.is_open() {
            return Err(ServiceError::InvalidState(format!(
                "Time entry {} is already closed",
                entry.id
            )));
        }
        let declared = i64::from(declaration.good_quantity) + i64::from(declaration.scrap_quantity);
        if declared != i64::from(entry.claimed_quantity) {
            return Err(ServiceError::QuantityMismatch(format!(
                "Good ({}) + scrap ({}) must equal the claimed quantity ({})",
                declaration.good_quantity, declaration.scrap_quantity, entry.claimed_quantity
            )));
        }

        let now = Utc::now();
        let closed = time_entry::Entity::update_many()
            .col_expr(time_entry::Column::EndedAt, Expr::value(now))
            .col_expr(time_entry::Column::GoodQuantity, Expr::value(declaration.good_quantity))
            .col_expr(time_entry::Column::ScrapQuantity, Expr::value(declaration.scrap_quantity))
            .filter(time_entry::Column::Id.eq(entry.id))
            .filter(time_entry::Column::EndedAt.is_null())
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if closed.rows_affected != 1 {
            return Err(ServiceError::InvalidState(format!(
                "Time entry {} is already closed",
                entry.id
            )));
        }

        let anomaly_id = if declaration.problem {
            let description = declaration
                .problem_description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .unwrap_or(UNSPECIFIED_PROBLEM)
                .to_string();
            let reported = anomaly::ActiveModel {
                operation_id: Set(op.id),
                operator_id: Set(Some(entry.operator_id)),
                description: Set(description),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(ServiceError::db_error)?;
            counter!("shopfloor.anomalies.reported", 1);
            warn!(anomaly_id = %reported.id, operation_id = %op.id, "Anomaly reported at completion");
            Some(reported.id)
        } else {
            None
        };

        let (good_output, scrap_output) = outputs(&txn, op.id).await?;
        let total_output = good_output + scrap_output;

        let mut operation_completed = false;
        let mut next_phase = None;
        let mut stock_consumed = Vec::new();

        if flow_rules::reaches_input(total_output, op.input_quantity) {
            let flipped = operation::Entity::update_many()
                .col_expr(operation::Column::Status, Expr::value(OperationStatus::Done))
                .col_expr(operation::Column::UpdatedAt, Expr::value(now))
                .filter(operation::Column::Id.eq(op.id))
                .filter(operation::Column::Status.ne(OperationStatus::Done))
                .exec(&txn)
                .await
                .map_err(ServiceError::db_error)?;

            if flipped.rows_affected == 1 {
                operation_completed = true;
                counter!("shopfloor.operations.completed", 1);

                if is_first_phase(&txn, &op).await? {
                    stock_consumed = consume_materials(&txn, &op, now).await?;
                }
                next_phase = unlock_next_phase(&txn, &op, good_output).await?;
            }
        }

        let order = find_order(&txn, op.work_order_id).await?;
        let order = refresh_order_status(&txn, order, now.date_naive()).await?;

        let entry = time_entry::Entity::find_by_id(entry.id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Time entry {} not found", entry.id)))?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        counter!("shopfloor.claims.closed", 1);
        info!(
            time_entry_id = %entry.id,
            operation_id = %op.id,
            good = declaration.good_quantity,
            scrap = declaration.scrap_quantity,
            operation_completed,
            "Time entry closed"
        );

        Ok(FinishOutcome {
            time_entry: entry.into(),
            operation_status: if operation_completed {
                OperationStatus::Done
            } else {
                op.status
            },
            operation_completed,
            total_output,
            input_quantity: op.input_quantity,
            next_phase,
            stock_consumed,
            anomaly_id,
            order_status: order.status,
            first_completed_on: order.first_completed_on,
        })
    }
}

async fn find_operator<C>(conn: &C, code: &str) -> Result<operator::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let normalized = operator::normalize_code(code);
    operator::Entity::find()
        .filter(operator::Column::Code.eq(normalized.as_str()))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Operator {} not found", normalized)))
}

async fn find_operation<C>(
    conn: &C,
    target: &OperationRef,
) -> Result<(work_order::Model, operation::Model), ServiceError>
where
    C: ConnectionTrait,
{
    let order = work_order::Entity::find()
        .filter(work_order::Column::OrderNumber.eq(target.order_number.trim()))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Work order {} not found", target.order_number))
        })?;

    let op = operation::Entity::find()
        .filter(operation::Column::WorkOrderId.eq(order.id))
        .filter(operation::Column::PhaseNumber.eq(target.phase_number))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| {
            ServiceError::NotFound(format!(
                "Phase {} of {} not found",
                target.phase_number, order.order_number
            ))
        })?;

    Ok((order, op))
}

async fn lock_operation<C>(conn: &C, id: Uuid) -> Result<operation::Model, ServiceError>
where
    C: ConnectionTrait,
{
    operation::Entity::find_by_id(id)
        .lock_exclusive()
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Operation {} not found", id)))
}

async fn ensure_qualified<C>(
    conn: &C,
    op_row: &operator::Model,
    op: &operation::Model,
) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    let qualified = operator_qualification::Entity::find()
        .filter(operator_qualification::Column::OperatorId.eq(op_row.id))
        .filter(operator_qualification::Column::WorkCenterId.eq(op.work_center_id))
        .count(conn)
        .await
        .map_err(ServiceError::db_error)?;

    if qualified == 0 {
        counter!("shopfloor.claims.unqualified", 1);
        return Err(ServiceError::Unqualified(format!(
            "Operator {} is not qualified for the work center of phase {}",
            op_row.code, op.phase_number
        )));
    }
    Ok(())
}

/// Status gate shared by both claim steps.
fn ensure_claimable(order: &work_order::Model, op: &operation::Model) -> Result<(), ServiceError> {
    match op.status {
        OperationStatus::Done => Err(ServiceError::Locked(format!(
            "Phase {} of {} is already done",
            op.phase_number, order.order_number
        ))),
        OperationStatus::Todo | OperationStatus::InProgress => {
            if order.status == WorkOrderStatus::Archived {
                Err(ServiceError::InvalidState(format!(
                    "Work order {} is archived",
                    order.order_number
                )))
            } else {
                Ok(())
            }
        }
        OperationStatus::Rework => Err(ServiceError::InvalidState(format!(
            "Phase {} of {} is flagged for rework",
            op.phase_number, order.order_number
        ))),
    }
}

async fn open_claims<C>(conn: &C, operation_id: Uuid) -> Result<i64, ServiceError>
where
    C: ConnectionTrait,
{
    Ok(time_entry::Entity::find()
        .filter(time_entry::Column::OperationId.eq(operation_id))
        .filter(time_entry::Column::EndedAt.is_null())
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?
        .iter()
        .map(|e| i64::from(e.claimed_quantity))
        .sum())
}

async fn outputs<C>(conn: &C, operation_id: Uuid) -> Result<(i64, i64), ServiceError>
where
    C: ConnectionTrait,
{
    let entries = time_entry::Entity::find()
        .filter(time_entry::Column::OperationId.eq(operation_id))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;

    Ok(entries.iter().fold((0, 0), |(good, scrap), e| {
        (
            good + i64::from(e.good_quantity),
            scrap + i64::from(e.scrap_quantity),
        )
    }))
}

async fn is_first_phase<C>(conn: &C, op: &operation::Model) -> Result<bool, ServiceError>
where
    C: ConnectionTrait,
{
    let earlier = operation::Entity::find()
        .filter(operation::Column::WorkOrderId.eq(op.work_order_id))
        .filter(operation::Column::PhaseNumber.lt(op.phase_number))
        .count(conn)
        .await
        .map_err(ServiceError::db_error)?;
    Ok(earlier == 0)
}

/// Decrements stock for the whole order, at most once per work order.
async fn consume_materials<C>(
    conn: &C,
    op: &operation::Model,
    now: DateTime<Utc>,
) -> Result<Vec<StockMovement>, ServiceError>
where
    C: ConnectionTrait,
{
    let claimed = work_order::Entity::update_many()
        .col_expr(work_order::Column::MaterialsConsumedAt, Expr::value(now))
        .filter(work_order::Column::Id.eq(op.work_order_id))
        .filter(work_order::Column::MaterialsConsumedAt.is_null())
        .exec(conn)
        .await
        .map_err(ServiceError::db_error)?;
    if claimed.rows_affected != 1 {
        warn!(order_id = %op.work_order_id, "Materials already consumed for this work order");
        return Ok(Vec::new());
    }

    let requirements = material_requirement::Entity::find()
        .filter(material_requirement::Column::OperationId.eq(op.id))
        .find_also_related(material::Entity)
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;

    let mut movements = Vec::with_capacity(requirements.len());
    for (req, mat) in requirements {
        let delta = req.quantity_per_unit * Decimal::from(op.input_quantity);
        material::Entity::update_many()
            .col_expr(
                material::Column::StockQuantity,
                Expr::col(material::Column::StockQuantity).sub(delta),
            )
            .col_expr(material::Column::UpdatedAt, Expr::value(now))
            .filter(material::Column::Id.eq(req.material_id))
            .exec(conn)
            .await
            .map_err(ServiceError::db_error)?;

        counter!("shopfloor.stock.decrements", 1);
        let reference = mat.map(|m| m.reference).unwrap_or_default();
        info!(material = %reference, quantity = %delta, "Stock decremented");
        movements.push(StockMovement {
            material_id: req.material_id,
            reference,
            quantity: delta,
        });
    }

    Ok(movements)
}

async fn unlock_next_phase<C>(
    conn: &C,
    op: &operation::Model,
    good_output: i64,
) -> Result<Option<UnlockedPhase>, ServiceError>
where
    C: ConnectionTrait,
{
    let Some(next) = operation::Entity::find()
        .filter(operation::Column::WorkOrderId.eq(op.work_order_id))
        .filter(operation::Column::PhaseNumber.gt(op.phase_number))
        .order_by_asc(operation::Column::PhaseNumber)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
    else {
        return Ok(None);
    };

    if next.status == OperationStatus::Done {
        return Ok(None);
    }

    let input_quantity = i32::try_from(good_output).map_err(|_| {
        ServiceError::InternalError(format!("Good output {} overflows", good_output))
    })?;

    let mut active: operation::ActiveModel = next.into();
    active.input_quantity = Set(input_quantity);
    active.status = Set(OperationStatus::Todo);
    let next = active.update(conn).await.map_err(ServiceError::db_error)?;

    info!(
        operation_id = %next.id,
        phase = next.phase_number,
        input_quantity,
        "Next phase unlocked"
    );

    Ok(Some(UnlockedPhase {
        operation_id: next.id,
        phase_number: next.phase_number,
        input_quantity,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn order(status: WorkOrderStatus) -> work_order::Model {
        let now = Utc::now();
        work_order::Model {
            id: Uuid::new_v4(),
            order_number: "OF-7".into(),
            title: "Hinges".into(),
            target_quantity: 10,
            status,
            first_completed_on: None,
            planned_start: None,
            planned_end: None,
            materials_consumed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn op(status: OperationStatus) -> operation::Model {
        let now = Utc::now();
        operation::Model {
            id: Uuid::new_v4(),
            work_order_id: Uuid::new_v4(),
            phase_number: 1,
            title: "Drill".into(),
            work_center_id: Uuid::new_v4(),
            operation_type: Default::default(),
            status,
            input_quantity: 10,
            machine_id: None,
            estimated_minutes: 15,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn done_operation_is_locked() {
        assert_matches!(
            ensure_claimable(&order(WorkOrderStatus::InProduction), &op(OperationStatus::Done)),
            Err(ServiceError::Locked(_))
        );
    }

    #[test]
    fn rework_operation_is_not_claimable() {
        assert_matches!(
            ensure_claimable(&order(WorkOrderStatus::InProduction), &op(OperationStatus::Rework)),
            Err(ServiceError::InvalidState(_))
        );
    }

    #[test]
    fn archived_order_is_not_claimable() {
        assert_matches!(
            ensure_claimable(&order(WorkOrderStatus::Archived), &op(OperationStatus::Todo)),
            Err(ServiceError::InvalidState(_))
        );
    }

    #[test]
    fn todo_and_in_progress_are_claimable() {
        let o = order(WorkOrderStatus::Planned);
        assert!(ensure_claimable(&o, &op(OperationStatus::Todo)).is_ok());
        assert!(ensure_claimable(&o, &op(OperationStatus::InProgress)).is_ok());
    }
}
