use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, ActiveValue, ConnectionTrait};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An operator's claim on an operation ("pointage"); open while `ended_at` is null
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "time_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub operation_id: Uuid,
    pub operator_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub claimed_quantity: i32,
    pub good_quantity: i32,
    pub scrap_quantity: i32,
}

impl Model {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Elapsed minutes, measured against `now` while the entry is still open.
    pub fn duration_minutes(&self, now: DateTime<Utc>) -> i64 {
        let end = self.ended_at.unwrap_or(now);
        (end - self.started_at).num_minutes().max(0)
    }

    pub fn labor_cost(&self, hourly_cost: Decimal, now: DateTime<Utc>) -> Decimal {
        (Decimal::from(self.duration_minutes(now)) / Decimal::from(60) * hourly_cost).round_dp(2)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::operation::Entity",
        from = "Column::OperationId",
        to = "super::operation::Column::Id"
    )]
    Operation,
    #[sea_orm(
        belongs_to = "super::operator::Entity",
        from = "Column::OperatorId",
        to = "super::operator::Column::Id"
    )]
    Operator,
}

impl Related<super::operation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Operation.def()
    }
}

impl Related<super::operator::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Operator.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if insert {
            if let ActiveValue::NotSet = self.id {
                self.id = ActiveValue::Set(Uuid::new_v4());
            }
            if let ActiveValue::NotSet = self.started_at {
                self.started_at = ActiveValue::Set(Utc::now());
            }
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn entry(minutes: Option<i64>) -> Model {
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap();
        Model {
            id: Uuid::new_v4(),
            operation_id: Uuid::new_v4(),
            operator_id: Uuid::new_v4(),
            started_at: start,
            ended_at: minutes.map(|m| start + Duration::minutes(m)),
            claimed_quantity: 10,
            good_quantity: 0,
            scrap_quantity: 0,
        }
    }

    #[test]
    fn closed_entry_duration_uses_end_time() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 8, 0, 0).unwrap();
        assert_eq!(entry(Some(90)).duration_minutes(now), 90);
    }

    #[test]
    fn open_entry_duration_runs_until_now() {
        let now = Utc.with_ymd_and_hms(2024, 3, 4, 8, 45, 0).unwrap();
        let open = entry(None);
        assert!(open.is_open());
        assert_eq!(open.duration_minutes(now), 45);
    }

    #[test]
    fn labor_cost_is_prorated_by_hour() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 8, 0, 0).unwrap();
        assert_eq!(entry(Some(90)).labor_cost(dec!(30), now), dec!(45.00));
    }
}
