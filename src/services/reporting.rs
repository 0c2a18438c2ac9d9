//! Read-only production reports.
//!
//! Every query excludes archived work orders unless stated otherwise and
//! returns structured rows; rendering them is the caller's concern.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Func},
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, JoinType, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    entities::{
        anomaly::{self, AnomalyStatus},
        machine, material, operation, operator, time_entry, work_center,
        work_order::{self, WorkOrderStatus},
    },
    errors::ServiceError,
    services::{
        flow_rules::{self, OrderFigures},
        routing::{figures_for_orders, find_order, load_phases, WorkOrderSummary},
    },
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DailyKpis {
    pub date: NaiveDate,
    /// Open time entries on live orders
    pub active_operations: u64,
    /// Distinct operators who started work on `date`
    pub active_operators: u64,
    pub produced_quantity: i64,
    pub scrap_rate: f64,
}

/// Four parallel 7-point series, oldest day first
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SevenDaySeries {
    pub labels: Vec<String>,
    pub production: Vec<i64>,
    pub scrap: Vec<i64>,
    pub scrap_rate: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LowStockAlert {
    pub material_id: Uuid,
    pub reference: String,
    pub designation: String,
    #[schema(value_type = String)]
    pub stock_quantity: Decimal,
    #[schema(value_type = String)]
    pub alert_threshold: Decimal,
    pub unit_of_measure: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OverdueEntryAlert {
    pub time_entry_id: Uuid,
    pub order_id: Uuid,
    pub order_number: String,
    pub operation_title: String,
    pub operator_code: String,
    pub elapsed_minutes: i64,
    pub estimated_minutes: i32,
    pub overrun_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OpenAnomalyAlert {
    pub anomaly_id: Uuid,
    pub order_number: String,
    pub operation_title: String,
    pub work_center_name: Option<String>,
    pub reported_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct Alerts {
    pub low_stock: Vec<LowStockAlert>,
    pub overdue_entries: Vec<OverdueEntryAlert>,
    pub open_anomalies: Vec<OpenAnomalyAlert>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ScrapByOrderFilter {
    /// Case-insensitive substring of the order number
    pub number_contains: Option<String>,
    pub completed_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScrapByOrderRow {
    pub order_id: Uuid,
    pub order_number: String,
    pub title: String,
    pub completed_on: Option<NaiveDate>,
    pub produced_quantity: i64,
    pub target_quantity: i32,
    pub total_scrap: i64,
    pub scrap_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ScrapTotals {
    pub produced_quantity: i64,
    pub total_scrap: i64,
    pub scrap_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScrapByOrderReport {
    pub rows: Vec<ScrapByOrderRow>,
    pub totals: ScrapTotals,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OperationScrapRow {
    pub operation_id: Uuid,
    pub phase_number: i32,
    pub title: String,
    pub good_output: i64,
    pub scrap_output: i64,
    pub scrap_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductionByOrderReport {
    pub date: NaiveDate,
    pub orders: Vec<WorkOrderSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DayEntryRow {
    pub time_entry_id: Uuid,
    pub phase_number: i32,
    pub operation_title: String,
    pub operator_code: String,
    pub operator_name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub good_quantity: i32,
    pub scrap_quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderDayReport {
    pub order: WorkOrderSummary,
    pub date: NaiveDate,
    pub entries: Vec<DayEntryRow>,
    pub total_good: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    Open,
    Closed,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct TimeEntryFilter {
    pub order_id: Option<Uuid>,
    pub started_on: Option<NaiveDate>,
    pub operator_id: Option<Uuid>,
    pub state: Option<EntryState>,
}

/// One line of the time-entry export
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LedgerRow {
    pub time_entry_id: Uuid,
    pub order_number: String,
    pub order_title: String,
    pub phase_number: i32,
    pub operation_title: String,
    pub machine_name: Option<String>,
    pub operator_code: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_minutes: i64,
    pub good_quantity: i32,
    pub scrap_quantity: i32,
    #[schema(value_type = String)]
    pub labor_cost: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Dashboard {
    pub kpis: DailyKpis,
    pub series: SevenDaySeries,
    pub alerts: Alerts,
}

/// `[day 00:00, next day 00:00)` in UTC.
pub(crate) fn day_bounds(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = day.and_time(NaiveTime::MIN).and_utc();
    (start, start + chrono::Duration::days(1))
}

/// Buckets per-order figures into the 7-day window.
pub fn shape_series(window: &[NaiveDate; 7], completed: &[(NaiveDate, OrderFigures)]) -> SevenDaySeries {
    let mut production = vec![0i64; 7];
    let mut scrap = vec![0i64; 7];

    for (day, figures) in completed {
        if let Some(slot) = window.iter().position(|d| d == day) {
            production[slot] += figures.produced_quantity;
            scrap[slot] += figures.total_scrap;
        }
    }

    let scrap_rate = production
        .iter()
        .zip(&scrap)
        .map(|(p, s)| flow_rules::round2(flow_rules::scrap_rate(*p, *s)))
        .collect();

    SevenDaySeries {
        labels: window.iter().map(|d| d.format("%d/%m").to_string()).collect(),
        production,
        scrap,
        scrap_rate,
    }
}

/// Sorts scrap rows: completion date desc with undated rows last, then
/// total scrap desc, then newest order first.
fn sort_scrap_rows(rows: &mut [(ScrapByOrderRow, DateTime<Utc>)]) {
    rows.sort_by(|(a, a_created), (b, b_created)| {
        let by_date = match (a.completed_on, b.completed_on) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        };
        by_date
            .then_with(|| b.total_scrap.cmp(&a.total_scrap))
            .then_with(|| b_created.cmp(a_created))
    });
}

fn live_orders() -> sea_orm::Condition {
    sea_orm::Condition::all().add(work_order::Column::Status.ne(WorkOrderStatus::Archived))
}

#[derive(Clone)]
pub struct ReportingService {
    db: Arc<DatabaseConnection>,
}

impl ReportingService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn compute_kpis_for_date(&self, date: NaiveDate) -> Result<DailyKpis, ServiceError> {
        let db = &*self.db;

        let completed = work_order::Entity::find()
            .filter(live_orders())
            .filter(work_order::Column::FirstCompletedOn.eq(date))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        let ids: Vec<Uuid> = completed.iter().map(|o| o.id).collect();
        let figures = figures_for_orders(db, &ids).await?;
        let (produced, scrap) = figures.values().fold((0i64, 0i64), |(p, s), f| {
            (p + f.produced_quantity, s + f.total_scrap)
        });

        let active_operations = live_entries()
            .filter(time_entry::Column::EndedAt.is_null())
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;

        let (start, end) = day_bounds(date);
        let operators: HashSet<Uuid> = live_entries()
            .filter(time_entry::Column::StartedAt.gte(start))
            .filter(time_entry::Column::StartedAt.lt(end))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|e| e.operator_id)
            .collect();

        Ok(DailyKpis {
            date,
            active_operations,
            active_operators: operators.len() as u64,
            produced_quantity: produced,
            scrap_rate: flow_rules::scrap_rate(produced, scrap),
        })
    }

    #[instrument(skip(self))]
    pub async fn build_7day_series(&self, date: NaiveDate) -> Result<SevenDaySeries, ServiceError> {
        let db = &*self.db;
        let window = flow_rules::seven_day_window(date);

        let orders = work_order::Entity::find()
            .filter(live_orders())
            .filter(work_order::Column::FirstCompletedOn.gte(window[0]))
            .filter(work_order::Column::FirstCompletedOn.lte(window[6]))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let figures = figures_for_orders(db, &ids).await?;

        let completed: Vec<(NaiveDate, OrderFigures)> = orders
            .iter()
            .filter_map(|o| {
                o.first_completed_on
                    .map(|d| (d, figures.get(&o.id).copied().unwrap_or_default()))
            })
            .collect();

        debug!(orders = completed.len(), "Series built");
        Ok(shape_series(&window, &completed))
    }

    #[instrument(skip(self))]
    pub async fn build_alerts(&self, now: DateTime<Utc>) -> Result<Alerts, ServiceError> {
        let db = &*self.db;

        let low_stock = material::Entity::find()
            .filter(
                Expr::col(material::Column::StockQuantity)
                    .lte(Expr::col(material::Column::AlertThreshold)),
            )
            .order_by_asc(material::Column::Reference)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|m| LowStockAlert {
                material_id: m.id,
                reference: m.reference,
                designation: m.designation,
                stock_quantity: m.stock_quantity,
                alert_threshold: m.alert_threshold,
                unit_of_measure: m.unit_of_measure,
            })
            .collect();

        let open_entries = live_entries()
            .filter(time_entry::Column::EndedAt.is_null())
            .order_by_asc(time_entry::Column::StartedAt)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        let ctx = EntryContext::load(db, &open_entries).await?;

        let mut overdue_entries = Vec::new();
        for entry in &open_entries {
            let (Some(op), Some(order)) = (ctx.operation(entry), ctx.order(entry)) else {
                continue;
            };
            let elapsed = entry.duration_minutes(now);
            if elapsed > i64::from(op.estimated_minutes) {
                overdue_entries.push(OverdueEntryAlert {
                    time_entry_id: entry.id,
                    order_id: order.id,
                    order_number: order.order_number.clone(),
                    operation_title: op.title.clone(),
                    operator_code: ctx.operator_code(entry),
                    elapsed_minutes: elapsed,
                    estimated_minutes: op.estimated_minutes,
                    overrun_minutes: elapsed - i64::from(op.estimated_minutes),
                });
            }
        }

        let anomalies = anomaly::Entity::find()
            .join(JoinType::InnerJoin, anomaly::Relation::Operation.def())
            .join(JoinType::InnerJoin, operation::Relation::WorkOrder.def())
            .filter(anomaly::Column::Status.eq(AnomalyStatus::Open))
            .filter(anomaly::Column::HiddenFromDashboard.eq(false))
            .filter(live_orders())
            .order_by_desc(anomaly::Column::ReportedAt)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let op_ids: HashSet<Uuid> = anomalies.iter().map(|a| a.operation_id).collect();
        let operations = operations_by_id(db, &op_ids).await?;
        let order_ids: HashSet<Uuid> = operations.values().map(|o| o.work_order_id).collect();
        let orders = orders_by_id(db, &order_ids).await?;
        let center_ids: HashSet<Uuid> = operations.values().map(|o| o.work_center_id).collect();
        let centers: HashMap<Uuid, String> = if center_ids.is_empty() {
            HashMap::new()
        } else {
            work_center::Entity::find()
                .filter(work_center::Column::Id.is_in(center_ids))
                .all(db)
                .await
                .map_err(ServiceError::db_error)?
                .into_iter()
                .map(|c| (c.id, c.name))
                .collect()
        };

        let open_anomalies = anomalies
            .into_iter()
            .filter_map(|a| {
                let op = operations.get(&a.operation_id)?;
                let order = orders.get(&op.work_order_id)?;
                Some(OpenAnomalyAlert {
                    anomaly_id: a.id,
                    order_number: order.order_number.clone(),
                    operation_title: op.title.clone(),
                    work_center_name: centers.get(&op.work_center_id).cloned(),
                    reported_at: a.reported_at,
                })
            })
            .collect();

        Ok(Alerts {
            low_stock,
            overdue_entries,
            open_anomalies,
        })
    }

    /// Orders with declared scrap, plus a totals line
    #[instrument(skip(self))]
    pub async fn scrap_by_order(
        &self,
        filter: ScrapByOrderFilter,
    ) -> Result<ScrapByOrderReport, ServiceError> {
        let db = &*self.db;

        let mut query = work_order::Entity::find().filter(live_orders());
        if let Some(number) = filter
            .number_contains
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            query = query.filter(
                Expr::expr(Func::lower(Expr::col(work_order::Column::OrderNumber)))
                    .like(format!("%{}%", number.to_lowercase())),
            );
        }
        if let Some(day) = filter.completed_on {
            query = query.filter(work_order::Column::FirstCompletedOn.eq(day));
        }

        let orders = query.all(db).await.map_err(ServiceError::db_error)?;
        let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let figures = figures_for_orders(db, &ids).await?;

        let mut rows: Vec<(ScrapByOrderRow, DateTime<Utc>)> = orders
            .into_iter()
            .filter_map(|o| {
                let f = figures.get(&o.id).copied().unwrap_or_default();
                (f.total_scrap > 0).then(|| {
                    (
                        ScrapByOrderRow {
                            order_id: o.id,
                            order_number: o.order_number,
                            title: o.title,
                            completed_on: o.first_completed_on,
                            produced_quantity: f.produced_quantity,
                            target_quantity: o.target_quantity,
                            total_scrap: f.total_scrap,
                            scrap_rate: flow_rules::round2(flow_rules::scrap_rate(
                                f.produced_quantity,
                                f.total_scrap,
                            )),
                        },
                        o.created_at,
                    )
                })
            })
            .collect();
        sort_scrap_rows(&mut rows);

        let rows: Vec<ScrapByOrderRow> = rows.into_iter().map(|(row, _)| row).collect();
        let produced: i64 = rows.iter().map(|r| r.produced_quantity).sum();
        let scrap: i64 = rows.iter().map(|r| r.total_scrap).sum();

        Ok(ScrapByOrderReport {
            rows,
            totals: ScrapTotals {
                produced_quantity: produced,
                total_scrap: scrap,
                scrap_rate: flow_rules::round2(flow_rules::scrap_rate(produced, scrap)),
            },
        })
    }

    /// Per-phase scrap of one order, phases without scrap omitted
    #[instrument(skip(self))]
    pub async fn scrap_by_operation(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<OperationScrapRow>, ServiceError> {
        let db = &*self.db;
        find_order(db, order_id).await?;

        Ok(load_phases(db, order_id)
            .await?
            .into_iter()
            .filter(|p| p.snapshot.scrap_output > 0)
            .map(|p| OperationScrapRow {
                operation_id: p.operation.id,
                phase_number: p.operation.phase_number,
                title: p.operation.title,
                good_output: p.snapshot.good_output,
                scrap_output: p.snapshot.scrap_output,
                scrap_rate: flow_rules::round2(flow_rules::scrap_rate(
                    p.snapshot.good_output,
                    p.snapshot.scrap_output,
                )),
            })
            .collect())
    }

    /// Live orders first completed on `date`
    #[instrument(skip(self))]
    pub async fn production_by_order(
        &self,
        date: NaiveDate,
        number_contains: Option<String>,
    ) -> Result<ProductionByOrderReport, ServiceError> {
        let db = &*self.db;

        let mut query = work_order::Entity::find()
            .filter(live_orders())
            .filter(work_order::Column::FirstCompletedOn.eq(date));
        if let Some(number) = number_contains
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            query = query.filter(
                Expr::expr(Func::lower(Expr::col(work_order::Column::OrderNumber)))
                    .like(format!("%{}%", number.to_lowercase())),
            );
        }

        let orders = query
            .order_by_desc(work_order::Column::CreatedAt)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let figures = figures_for_orders(db, &ids).await?;

        Ok(ProductionByOrderReport {
            date,
            orders: orders
                .iter()
                .map(|o| WorkOrderSummary::new(o, figures.get(&o.id).copied().unwrap_or_default()))
                .collect(),
        })
    }

    /// Time entries of an order closed on `date`, by end time
    #[instrument(skip(self))]
    pub async fn order_day_report(
        &self,
        order_id: Uuid,
        date: NaiveDate,
    ) -> Result<OrderDayReport, ServiceError> {
        let db = &*self.db;
        let order = find_order(db, order_id).await?;

        let op_ids: Vec<Uuid> = operation::Entity::find()
            .filter(operation::Column::WorkOrderId.eq(order_id))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|op| op.id)
            .collect();

        let (start, end) = day_bounds(date);
        let entries = if op_ids.is_empty() {
            Vec::new()
        } else {
            time_entry::Entity::find()
                .filter(time_entry::Column::OperationId.is_in(op_ids))
                .filter(time_entry::Column::EndedAt.gte(start))
                .filter(time_entry::Column::EndedAt.lt(end))
                .order_by_asc(time_entry::Column::EndedAt)
                .all(db)
                .await
                .map_err(ServiceError::db_error)?
        };
        let ctx = EntryContext::load(db, &entries).await?;

        let rows: Vec<DayEntryRow> = entries
            .iter()
            .filter_map(|e| {
                let op = ctx.operation(e)?;
                let who = ctx.operators.get(&e.operator_id);
                Some(DayEntryRow {
                    time_entry_id: e.id,
                    phase_number: op.phase_number,
                    operation_title: op.title.clone(),
                    operator_code: who.map(|o| o.code.clone()).unwrap_or_default(),
                    operator_name: who.map(operator::Model::full_name).unwrap_or_default(),
                    started_at: e.started_at,
                    ended_at: e.ended_at,
                    good_quantity: e.good_quantity,
                    scrap_quantity: e.scrap_quantity,
                })
            })
            .collect();
        let total_good = rows.iter().map(|r| i64::from(r.good_quantity)).sum();

        let figures = figures_for_orders(db, &[order.id]).await?;
        Ok(OrderDayReport {
            order: WorkOrderSummary::new(&order, figures.get(&order.id).copied().unwrap_or_default()),
            date,
            entries: rows,
            total_good,
        })
    }

    /// Structured time-entry export
    #[instrument(skip(self))]
    pub async fn time_entry_ledger(
        &self,
        filter: TimeEntryFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<LedgerRow>, ServiceError> {
        let db = &*self.db;

        let mut query = time_entry::Entity::find();
        if let Some(order_id) = filter.order_id {
            find_order(db, order_id).await?;
            let op_ids: Vec<Uuid> = operation::Entity::find()
                .filter(operation::Column::WorkOrderId.eq(order_id))
                .all(db)
                .await
                .map_err(ServiceError::db_error)?
                .into_iter()
                .map(|op| op.id)
                .collect();
            if op_ids.is_empty() {
                return Ok(Vec::new());
            }
            query = query.filter(time_entry::Column::OperationId.is_in(op_ids));
        }
        if let Some(day) = filter.started_on {
            let (start, end) = day_bounds(day);
            query = query
                .filter(time_entry::Column::StartedAt.gte(start))
                .filter(time_entry::Column::StartedAt.lt(end));
        }
        if let Some(operator_id) = filter.operator_id {
            query = query.filter(time_entry::Column::OperatorId.eq(operator_id));
        }
        match filter.state {
            Some(EntryState::Open) => query = query.filter(time_entry::Column::EndedAt.is_null()),
            Some(EntryState::Closed) => {
                query = query.filter(time_entry::Column::EndedAt.is_not_null())
            }
            None => {}
        }

        let entries = query
            .order_by_asc(time_entry::Column::StartedAt)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        let ctx = EntryContext::load(db, &entries).await?;

        let mut rows: Vec<LedgerRow> = entries
            .iter()
            .filter_map(|e| {
                let op = ctx.operation(e)?;
                let order = ctx.order(e)?;
                let who = ctx.operators.get(&e.operator_id);
                Some(LedgerRow {
                    time_entry_id: e.id,
                    order_number: order.order_number.clone(),
                    order_title: order.title.clone(),
                    phase_number: op.phase_number,
                    operation_title: op.title.clone(),
                    machine_name: op.machine_id.and_then(|id| ctx.machines.get(&id).cloned()),
                    operator_code: who.map(|o| o.code.clone()).unwrap_or_default(),
                    started_at: e.started_at,
                    ended_at: e.ended_at,
                    duration_minutes: e.duration_minutes(now),
                    good_quantity: e.good_quantity,
                    scrap_quantity: e.scrap_quantity,
                    labor_cost: who
                        .map(|o| e.labor_cost(o.hourly_cost, now))
                        .unwrap_or(Decimal::ZERO),
                })
            })
            .collect();

        rows.sort_by(|a, b| {
            a.order_number
                .cmp(&b.order_number)
                .then(a.phase_number.cmp(&b.phase_number))
                .then(a.started_at.cmp(&b.started_at))
        });
        Ok(rows)
    }

    /// KPIs, series and alerts in one payload
    pub async fn dashboard(&self, now: DateTime<Utc>) -> Result<Dashboard, ServiceError> {
        let today = now.date_naive();
        Ok(Dashboard {
            kpis: self.compute_kpis_for_date(today).await?,
            series: self.build_7day_series(today).await?,
            alerts: self.build_alerts(now).await?,
        })
    }
}

/// Time entries whose work order is not archived.
fn live_entries() -> sea_orm::Select<time_entry::Entity> {
    time_entry::Entity::find()
        .join(JoinType::InnerJoin, time_entry::Relation::Operation.def())
        .join(JoinType::InnerJoin, operation::Relation::WorkOrder.def())
        .filter(live_orders())
}

async fn operations_by_id<C>(
    conn: &C,
    ids: &HashSet<Uuid>,
) -> Result<HashMap<Uuid, operation::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    Ok(operation::Entity::find()
        .filter(operation::Column::Id.is_in(ids.iter().copied()))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?
        .into_iter()
        .map(|op| (op.id, op))
        .collect())
}

async fn orders_by_id<C>(
    conn: &C,
    ids: &HashSet<Uuid>,
) -> Result<HashMap<Uuid, work_order::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    Ok(work_order::Entity::find()
        .filter(work_order::Column::Id.is_in(ids.iter().copied()))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?
        .into_iter()
        .map(|o| (o.id, o))
        .collect())
}

/// Rows referenced by a batch of time entries
struct EntryContext {
    operations: HashMap<Uuid, operation::Model>,
    orders: HashMap<Uuid, work_order::Model>,
    operators: HashMap<Uuid, operator::Model>,
    machines: HashMap<Uuid, String>,
}

impl EntryContext {
    async fn load<C>(conn: &C, entries: &[time_entry::Model]) -> Result<Self, ServiceError>
    where
        C: ConnectionTrait,
    {
        let op_ids: HashSet<Uuid> = entries.iter().map(|e| e.operation_id).collect();
        let operations = operations_by_id(conn, &op_ids).await?;

        let order_ids: HashSet<Uuid> = operations.values().map(|op| op.work_order_id).collect();
        let orders = orders_by_id(conn, &order_ids).await?;

        let operator_ids: HashSet<Uuid> = entries.iter().map(|e| e.operator_id).collect();
        let operators = if operator_ids.is_empty() {
            HashMap::new()
        } else {
            operator::Entity::find()
                .filter(operator::Column::Id.is_in(operator_ids))
                .all(conn)
                .await
                .map_err(ServiceError::db_error)?
                .into_iter()
                .map(|o| (o.id, o))
                .collect()
        };

        let machine_ids: HashSet<Uuid> = operations.values().filter_map(|op| op.machine_id).collect();
        let machines = if machine_ids.is_empty() {
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

        Ok(Self {
            operations,
            orders,
            operators,
            machines,
        })
    }

    fn operation(&self, entry: &time_entry::Model) -> Option<&operation::Model> {
        self.operations.get(&entry.operation_id)
    }

    fn order(&self, entry: &time_entry::Model) -> Option<&work_order::Model> {
        self.operation(entry)
            .and_then(|op| self.orders.get(&op.work_order_id))
    }

    fn operator_code(&self, entry: &time_entry::Model) -> String {
        self.operators
            .get(&entry.operator_id)
            .map(|o| o.code.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn series_always_has_seven_points() {
        let window = flow_rules::seven_day_window(day(10));
        let series = shape_series(&window, &[]);
        assert_eq!(series.labels.len(), 7);
        assert_eq!(series.production, vec![0; 7]);
        assert_eq!(series.scrap, vec![0; 7]);
        assert_eq!(series.scrap_rate, vec![0.0; 7]);
        assert_eq!(series.labels[0], "04/03");
        assert_eq!(series.labels[6], "10/03");
    }

    #[test]
    fn series_buckets_by_completion_day() {
        let window = flow_rules::seven_day_window(day(10));
        let completed = [
            (
                day(10),
                OrderFigures {
                    produced_quantity: 18,
                    total_scrap: 2,
                },
            ),
            (
                day(10),
                OrderFigures {
                    produced_quantity: 2,
                    total_scrap: 1,
                },
            ),
            (
                day(1),
                OrderFigures {
                    produced_quantity: 99,
                    total_scrap: 99,
                },
            ),
        ];
        let series = shape_series(&window, &completed);
        assert_eq!(series.production[6], 20);
        assert_eq!(series.scrap[6], 3);
        assert_eq!(series.scrap_rate[6], 13.04);
        assert_eq!(series.production.iter().sum::<i64>(), 20);
    }

    #[test]
    fn scrap_rows_sort_undated_last() {
        let created = Utc::now();
        let row = |number: &str, completed_on: Option<NaiveDate>, scrap: i64| ScrapByOrderRow {
            order_id: Uuid::new_v4(),
            order_number: number.into(),
            title: String::new(),
            completed_on,
            produced_quantity: 0,
            target_quantity: 1,
            total_scrap: scrap,
            scrap_rate: 0.0,
        };
        let mut rows = vec![
            (row("A", None, 50), created),
            (row("B", Some(day(1)), 1), created),
            (row("C", Some(day(2)), 1), created),
            (row("D", Some(day(2)), 5), created),
        ];
        sort_scrap_rows(&mut rows);
        let order: Vec<&str> = rows.iter().map(|(r, _)| r.order_number.as_str()).collect();
        assert_eq!(order, vec!["D", "C", "B", "A"]);
    }

    #[test]
    fn day_bounds_cover_one_day() {
        let (start, end) = day_bounds(day(5));
        assert_eq!(end - start, chrono::Duration::days(1));
        assert_eq!(start.date_naive(), day(5));
    }
}
