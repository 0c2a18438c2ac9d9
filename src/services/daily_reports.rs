use chrono::{Duration, NaiveDate};
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::{daily_report, time_entry},
    errors::ServiceError,
    services::{flow_rules, reporting::day_bounds},
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DailyReportView {
    pub id: Uuid,
    pub report_date: NaiveDate,
    pub good_quantity: i64,
    pub scrap_quantity: i64,
    pub scrap_rate: f64,
    pub active_operators: i32,
}

impl From<daily_report::Model> for DailyReportView {
    fn from(m: daily_report::Model) -> Self {
        Self {
            id: m.id,
            report_date: m.report_date,
            good_quantity: m.good_quantity,
            scrap_quantity: m.scrap_quantity,
            scrap_rate: m.scrap_rate,
            active_operators: m.active_operators,
        }
    }
}

/// Stored snapshots over a date range, with chart-ready vectors
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HistoryReport {
    pub days: i64,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub reports: Vec<DailyReportView>,
    pub labels: Vec<String>,
    pub production: Vec<i64>,
    pub scrap: Vec<i64>,
    pub scrap_rate: Vec<f64>,
}

#[derive(Clone)]
pub struct DailyReportService {
    db: Arc<DatabaseConnection>,
}

impl DailyReportService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Aggregates entries closed on `day` and upserts that day's snapshot
    #[instrument(skip(self))]
    pub async fn generate_daily_report(
        &self,
        day: NaiveDate,
    ) -> Result<DailyReportView, ServiceError> {
        let db = &*self.db;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let (start, end) = day_bounds(day);
        let entries = time_entry::Entity::find()
            .filter(time_entry::Column::EndedAt.gte(start))
            .filter(time_entry::Column::EndedAt.lt(end))
            .all(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        let good: i64 = entries.iter().map(|e| i64::from(e.good_quantity)).sum();
        let scrap: i64 = entries.iter().map(|e| i64::from(e.scrap_quantity)).sum();
        let operators: HashSet<Uuid> = entries.iter().map(|e| e.operator_id).collect();
        let active_operators = i32::try_from(operators.len()).unwrap_or(i32::MAX);
        let rate = flow_rules::scrap_rate(good, scrap);

        let existing = daily_report::Entity::find()
            .filter(daily_report::Column::ReportDate.eq(day))
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        let saved = match existing {
            Some(row) => {
                let mut active: daily_report::ActiveModel = row.into();
                active.good_quantity = Set(good);
                active.scrap_quantity = Set(scrap);
                active.scrap_rate = Set(rate);
                active.active_operators = Set(active_operators);
                active.update(&txn).await.map_err(ServiceError::db_error)?
            }
            None => daily_report::ActiveModel {
                report_date: Set(day),
                good_quantity: Set(good),
                scrap_quantity: Set(scrap),
                scrap_rate: Set(rate),
                active_operators: Set(active_operators),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(ServiceError::db_error)?,
        };

        txn.commit().await.map_err(ServiceError::db_error)?;

        counter!("shopfloor.daily_reports.generated", 1);
        info!(%day, good, scrap, active_operators, "Daily report saved");

        Ok(saved.into())
    }

    /// Stored reports for the `days` days ending at `today`, oldest first
    #[instrument(skip(self))]
    pub async fn history(&self, days: i64, today: NaiveDate) -> Result<HistoryReport, ServiceError> {
        if days < 1 {
            return Err(ServiceError::InvalidInput(format!(
                "History window must be at least one day, got: {}",
                days
            )));
        }

        let start = today - Duration::days(days - 1);
        let reports: Vec<DailyReportView> = daily_report::Entity::find()
            .filter(daily_report::Column::ReportDate.gte(start))
            .filter(daily_report::Column::ReportDate.lte(today))
            .order_by_asc(daily_report::Column::ReportDate)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(Into::into)
            .collect();

        Ok(HistoryReport {
            days,
            start,
            end: today,
            labels: reports
                .iter()
                .map(|r| r.report_date.format("%d/%m").to_string())
                .collect(),
            production: reports.iter().map(|r| r.good_quantity).collect(),
            scrap: reports.iter().map(|r| r.scrap_quantity).collect(),
            scrap_rate: reports.iter().map(|r| flow_rules::round2(r.scrap_rate)).collect(),
            reports,
        })
    }
}
