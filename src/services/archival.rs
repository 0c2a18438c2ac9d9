use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use sea_orm::{sea_query::Expr, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::{
    entities::work_order::{self, WorkOrderStatus},
    errors::ServiceError,
};

/// Moves old completed orders out of the live views
#[derive(Clone)]
pub struct ArchivalService {
    db: Arc<DatabaseConnection>,
}

impl ArchivalService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Archives `Done` orders created more than `retention_days` before `now`.
    ///
    /// Returns the number of archived orders.
    #[instrument(skip(self))]
    pub async fn archive_completed_orders(
        &self,
        now: DateTime<Utc>,
        retention_days: i64,
    ) -> Result<u64, ServiceError> {
        if retention_days < 1 {
            return Err(ServiceError::InvalidInput(format!(
                "Retention must be at least one day, got: {}",
                retention_days
            )));
        }

        let cutoff = now - Duration::days(retention_days);
        let result = work_order::Entity::update_many()
            .col_expr(work_order::Column::Status, Expr::value(WorkOrderStatus::Archived))
            .col_expr(work_order::Column::UpdatedAt, Expr::value(now))
            .filter(work_order::Column::Status.eq(WorkOrderStatus::Done))
            .filter(work_order::Column::CreatedAt.lt(cutoff))
            .exec(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        counter!("shopfloor.work_orders.archived", result.rows_affected);
        info!(archived = result.rows_affected, %cutoff, "Archival run finished");

        Ok(result.rows_affected)
    }
}
