use chrono::{DateTime, Utc};
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, DatabaseConnection, EntityTrait, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::{
        anomaly::{self, AnomalyStatus},
        operation, operator, user, work_order,
    },
    errors::ServiceError,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnomalyDetail {
    pub id: Uuid,
    pub operation_id: Uuid,
    pub operation_title: String,
    pub order_number: String,
    pub operator_name: Option<String>,
    pub reported_at: DateTime<Utc>,
    pub description: String,
    pub status: AnomalyStatus,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub hidden_from_dashboard: bool,
}

#[derive(Clone)]
pub struct AnomalyService {
    db: Arc<DatabaseConnection>,
}

impl AnomalyService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn get_anomaly(&self, id: Uuid) -> Result<AnomalyDetail, ServiceError> {
        let db = &*self.db;
        let row = find_anomaly(db, id).await?;

        let op = operation::Entity::find_by_id(row.operation_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Operation {} not found", row.operation_id))
            })?;
        let order = work_order::Entity::find_by_id(op.work_order_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Work order {} not found", op.work_order_id))
            })?;
        let operator_name = match row.operator_id {
            Some(operator_id) => operator::Entity::find_by_id(operator_id)
                .one(db)
                .await
                .map_err(ServiceError::db_error)?
                .map(|o| o.full_name()),
            None => None,
        };

        Ok(AnomalyDetail {
            id: row.id,
            operation_id: op.id,
            operation_title: op.title,
            order_number: order.order_number,
            operator_name,
            reported_at: row.reported_at,
            description: row.description,
            status: row.status,
            resolved_by: row.resolved_by,
            resolved_at: row.resolved_at,
            hidden_from_dashboard: row.hidden_from_dashboard,
        })
    }

    /// Marks an open anomaly resolved
    #[instrument(skip(self))]
    pub async fn resolve_anomaly(
        &self,
        id: Uuid,
        resolver: Option<Uuid>,
    ) -> Result<AnomalyDetail, ServiceError> {
        let db = &*self.db;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let row = find_anomaly(&txn, id).await?;
        if row.status == AnomalyStatus::Resolved {
            return Err(ServiceError::InvalidState(format!(
                "Anomaly {} is already resolved",
                id
            )));
        }

        if let Some(user_id) = resolver {
            user::Entity::find_by_id(user_id)
                .one(&txn)
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;
        }

        let mut active: anomaly::ActiveModel = row.into();
        active.status = Set(AnomalyStatus::Resolved);
        active.resolved_by = Set(resolver);
        active.resolved_at = Set(Some(Utc::now()));
        active.update(&txn).await.map_err(ServiceError::db_error)?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        counter!("shopfloor.anomalies.resolved", 1);
        info!(anomaly_id = %id, "Anomaly resolved");

        self.get_anomaly(id).await
    }

    /// Removes an anomaly from the dashboard alerts without resolving it
    #[instrument(skip(self))]
    pub async fn hide_anomaly(&self, id: Uuid) -> Result<AnomalyDetail, ServiceError> {
        let db = &*self.db;
        let row = find_anomaly(db, id).await?;

        if !row.hidden_from_dashboard {
            let mut active: anomaly::ActiveModel = row.into();
            active.hidden_from_dashboard = Set(true);
            active.update(db).await.map_err(ServiceError::db_error)?;
        }

        self.get_anomaly(id).await
    }
}

async fn find_anomaly<C>(conn: &C, id: Uuid) -> Result<anomaly::Model, ServiceError>
where
    C: sea_orm::ConnectionTrait,
{
    anomaly::Entity::find_by_id(id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Anomaly {} not found", id)))
}
