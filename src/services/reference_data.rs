use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{
        machine::{self, MachineStatus},
        material, operator, operator_qualification, work_center,
    },
    errors::ServiceError,
};

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct NewWorkCenter {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct NewOperator {
    #[validate(length(min = 1, max = 32))]
    pub code: String,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[schema(value_type = String, example = "32.50")]
    pub hourly_cost: Decimal,
    #[serde(default)]
    pub work_center_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct NewMachine {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub description: Option<String>,
    pub status: Option<MachineStatus>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct NewMaterial {
    #[validate(length(min = 1, max = 64))]
    pub reference: String,
    #[validate(length(min = 1, max = 255))]
    pub designation: String,
    #[schema(value_type = String)]
    pub stock_quantity: Decimal,
    #[validate(length(min = 1, max = 16))]
    pub unit_of_measure: String,
    #[schema(value_type = String)]
    pub alert_threshold: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WorkCenterView {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

impl From<work_center::Model> for WorkCenterView {
    fn from(m: work_center::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            description: m.description,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OperatorView {
    pub id: Uuid,
    pub code: String,
    pub full_name: String,
    #[schema(value_type = String)]
    pub hourly_cost: Decimal,
    pub work_center_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MachineView {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: MachineStatus,
}

impl From<machine::Model> for MachineView {
    fn from(m: machine::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            description: m.description,
            status: m.status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MaterialView {
    pub id: Uuid,
    pub reference: String,
    pub designation: String,
    #[schema(value_type = String)]
    pub stock_quantity: Decimal,
    pub unit_of_measure: String,
    #[schema(value_type = String)]
    pub alert_threshold: Decimal,
    pub below_threshold: bool,
}

impl From<material::Model> for MaterialView {
    fn from(m: material::Model) -> Self {
        Self {
            below_threshold: m.is_below_threshold(),
            id: m.id,
            reference: m.reference,
            designation: m.designation,
            stock_quantity: m.stock_quantity,
            unit_of_measure: m.unit_of_measure,
            alert_threshold: m.alert_threshold,
        }
    }
}

/// Work centers, operators, machines and materials
#[derive(Clone)]
pub struct ReferenceDataService {
    db: Arc<DatabaseConnection>,
}

impl ReferenceDataService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_work_center(
        &self,
        input: NewWorkCenter,
    ) -> Result<WorkCenterView, ServiceError> {
        input.validate()?;
        let db = &*self.db;
        let name = input.name.trim().to_string();

        let taken = work_center::Entity::find()
            .filter(work_center::Column::Name.eq(name.as_str()))
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;
        if taken > 0 {
            return Err(ServiceError::Conflict(format!(
                "Work center {} already exists",
                name
            )));
        }

        let created = work_center::ActiveModel {
            name: Set(name),
            description: Set(input.description),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(ServiceError::db_error)?;

        info!(work_center_id = %created.id, "Work center created");
        Ok(created.into())
    }

    pub async fn list_work_centers(&self) -> Result<Vec<WorkCenterView>, ServiceError> {
        Ok(work_center::Entity::find()
            .order_by_asc(work_center::Column::Name)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    /// Creates an operator and its qualifications in one transaction
    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn create_operator(&self, input: NewOperator) -> Result<OperatorView, ServiceError> {
        input.validate()?;
        if input.hourly_cost < Decimal::ZERO {
            return Err(ServiceError::InvalidInput(format!(
                "Hourly cost cannot be negative, got: {}",
                input.hourly_cost
            )));
        }

        let code = operator::normalize_code(&input.code);
        let centers: BTreeSet<Uuid> = input.work_center_ids.iter().copied().collect();

        let db = &*self.db;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let taken = operator::Entity::find()
            .filter(operator::Column::Code.eq(code.as_str()))
            .count(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if taken > 0 {
            return Err(ServiceError::Conflict(format!(
                "Operator code {} already exists",
                code
            )));
        }

        if !centers.is_empty() {
            let found = work_center::Entity::find()
                .filter(work_center::Column::Id.is_in(centers.iter().copied()))
                .count(&txn)
                .await
                .map_err(ServiceError::db_error)?;
            if found as usize != centers.len() {
                return Err(ServiceError::NotFound(
                    "One or more work centers do not exist".to_string(),
                ));
            }
        }

        let created = operator::ActiveModel {
            code: Set(code),
            first_name: Set(input.first_name.trim().to_string()),
            last_name: Set(input.last_name.trim().to_string()),
            hourly_cost: Set(input.hourly_cost),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;

        for center in &centers {
            operator_qualification::ActiveModel {
                operator_id: Set(created.id),
                work_center_id: Set(*center),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        }

        txn.commit().await.map_err(ServiceError::db_error)?;

        counter!("shopfloor.operators.created", 1);
        info!(operator_id = %created.id, qualifications = centers.len(), "Operator created");

        Ok(OperatorView {
            id: created.id,
            full_name: created.full_name(),
            code: created.code,
            hourly_cost: created.hourly_cost,
            work_center_ids: centers.into_iter().collect(),
        })
    }

    pub async fn list_operators(&self) -> Result<Vec<OperatorView>, ServiceError> {
        let db = &*self.db;
        let operators = operator::Entity::find()
            .order_by_asc(operator::Column::Code)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        let qualifications = qualifications_by_operator(db).await?;

        Ok(operators
            .into_iter()
            .map(|o| OperatorView {
                id: o.id,
                full_name: o.full_name(),
                work_center_ids: qualifications.get(&o.id).cloned().unwrap_or_default(),
                code: o.code,
                hourly_cost: o.hourly_cost,
            })
            .collect())
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_machine(&self, input: NewMachine) -> Result<MachineView, ServiceError> {
        input.validate()?;
        let db = &*self.db;
        let name = input.name.trim().to_string();

        let taken = machine::Entity::find()
            .filter(machine::Column::Name.eq(name.as_str()))
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;
        if taken > 0 {
            return Err(ServiceError::Conflict(format!("Machine {} already exists", name)));
        }

        let created = machine::ActiveModel {
            name: Set(name),
            description: Set(input.description),
            status: Set(input.status.unwrap_or(MachineStatus::Available)),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(ServiceError::db_error)?;

        info!(machine_id = %created.id, "Machine created");
        Ok(created.into())
    }

    pub async fn list_machines(&self) -> Result<Vec<MachineView>, ServiceError> {
        Ok(machine::Entity::find()
            .order_by_asc(machine::Column::Name)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    #[instrument(skip(self, input), fields(reference = %input.reference))]
    pub async fn create_material(&self, input: NewMaterial) -> Result<MaterialView, ServiceError> {
        input.validate()?;
        if input.alert_threshold < Decimal::ZERO {
            return Err(ServiceError::InvalidInput(format!(
                "Alert threshold cannot be negative, got: {}",
                input.alert_threshold
            )));
        }

        let db = &*self.db;
        let reference = input.reference.trim().to_string();

        let taken = material::Entity::find()
            .filter(material::Column::Reference.eq(reference.as_str()))
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;
        if taken > 0 {
            return Err(ServiceError::Conflict(format!(
                "Material {} already exists",
                reference
            )));
        }

        let created = material::ActiveModel {
            reference: Set(reference),
            designation: Set(input.designation.trim().to_string()),
            stock_quantity: Set(input.stock_quantity),
            unit_of_measure: Set(input.unit_of_measure.trim().to_string()),
            alert_threshold: Set(input.alert_threshold),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(ServiceError::db_error)?;

        info!(material_id = %created.id, "Material created");
        Ok(created.into())
    }

    pub async fn list_materials(&self) -> Result<Vec<MaterialView>, ServiceError> {
        Ok(material::Entity::find()
            .order_by_asc(material::Column::Reference)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(Into::into)
            .collect())
    }
}

async fn qualifications_by_operator<C>(conn: &C) -> Result<HashMap<Uuid, Vec<Uuid>>, ServiceError>
where
    C: ConnectionTrait,
{
    let mut map: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for q in operator_qualification::Entity::find()
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?
    {
        map.entry(q.operator_id).or_default().push(q.work_center_id);
    }
    for centers in map.values_mut() {
        centers.sort();
    }
    Ok(map)
}
