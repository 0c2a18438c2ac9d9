use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_reference_tables::Migration),
            Box::new(m20240301_000002_create_work_order_tables::Migration),
            Box::new(m20240301_000003_create_time_entry_tables::Migration),
            Box::new(m20240301_000004_create_daily_reports_table::Migration),
            Box::new(m20240301_000005_create_users_tables::Migration),
        ]
    }
}

// Migration implementations

mod m20240301_000001_create_reference_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_reference_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(WorkCenters::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(WorkCenters::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WorkCenters::Name)
                                .string_len(100)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(WorkCenters::Description).text().null())
                        .col(
                            ColumnDef::new(WorkCenters::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WorkCenters::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Operators::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Operators::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Operators::Code)
                                .string_len(50)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Operators::FirstName).string().not_null())
                        .col(ColumnDef::new(Operators::LastName).string().not_null())
                        .col(
                            ColumnDef::new(Operators::HourlyCost)
                                .decimal_len(10, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Operators::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Operators::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OperatorQualifications::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OperatorQualifications::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OperatorQualifications::OperatorId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OperatorQualifications::WorkCenterId)
                                .uuid()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_operator_qualifications_operator_id")
                                .from(
                                    OperatorQualifications::Table,
                                    OperatorQualifications::OperatorId,
                                )
                                .to(Operators::Table, Operators::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_operator_qualifications_work_center_id")
                                .from(
                                    OperatorQualifications::Table,
                                    OperatorQualifications::WorkCenterId,
                                )
                                .to(WorkCenters::Table, WorkCenters::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_operator_qualifications_pair")
                        .table(OperatorQualifications::Table)
                        .col(OperatorQualifications::OperatorId)
                        .col(OperatorQualifications::WorkCenterId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Machines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Machines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Machines::Name)
                                .string_len(100)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Machines::Description).text().null())
                        .col(
                            ColumnDef::new(Machines::Status)
                                .string_len(32)
                                .not_null()
                                .default("available"),
                        )
                        .col(
                            ColumnDef::new(Machines::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Machines::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Materials::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Materials::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Materials::Reference)
                                .string_len(50)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Materials::Designation).string().not_null())
                        .col(
                            ColumnDef::new(Materials::StockQuantity)
                                .decimal_len(12, 3)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Materials::UnitOfMeasure)
                                .string_len(20)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Materials::AlertThreshold)
                                .decimal_len(12, 3)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Materials::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Materials::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Materials::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Machines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(OperatorQualifications::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Operators::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(WorkCenters::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum WorkCenters {
        Table,
        Id,
        Name,
        Description,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Operators {
        Table,
        Id,
        Code,
        FirstName,
        LastName,
        HourlyCost,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum OperatorQualifications {
        Table,
        Id,
        OperatorId,
        WorkCenterId,
    }

    #[derive(DeriveIden)]
    enum Machines {
        Table,
        Id,
        Name,
        Description,
        Status,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Materials {
        Table,
        Id,
        Reference,
        Designation,
        StockQuantity,
        UnitOfMeasure,
        AlertThreshold,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000002_create_work_order_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_work_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(WorkOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(WorkOrders::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WorkOrders::OrderNumber)
                                .string_len(50)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(WorkOrders::Title).string().not_null())
                        .col(
                            ColumnDef::new(WorkOrders::TargetQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WorkOrders::Status)
                                .string_len(32)
                                .not_null()
                                .default("planned"),
                        )
                        .col(ColumnDef::new(WorkOrders::FirstCompletedOn).date().null())
                        .col(ColumnDef::new(WorkOrders::PlannedStart).date().null())
                        .col(ColumnDef::new(WorkOrders::PlannedEnd).date().null())
                        .col(
                            ColumnDef::new(WorkOrders::MaterialsConsumedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(WorkOrders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WorkOrders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_work_orders_status")
                        .table(WorkOrders::Table)
                        .col(WorkOrders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_work_orders_first_completed_on")
                        .table(WorkOrders::Table)
                        .col(WorkOrders::FirstCompletedOn)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Operations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Operations::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Operations::WorkOrderId).uuid().not_null())
                        .col(ColumnDef::new(Operations::PhaseNumber).integer().not_null())
                        .col(ColumnDef::new(Operations::Title).string().not_null())
                        .col(ColumnDef::new(Operations::WorkCenterId).uuid().not_null())
                        .col(
                            ColumnDef::new(Operations::OperationType)
                                .string_len(32)
                                .not_null()
                                .default("production"),
                        )
                        .col(
                            ColumnDef::new(Operations::Status)
                                .string_len(32)
                                .not_null()
                                .default("todo"),
                        )
                        .col(
                            ColumnDef::new(Operations::InputQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Operations::MachineId).uuid().null())
                        .col(
                            ColumnDef::new(Operations::EstimatedMinutes)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Operations::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Operations::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_operations_work_order_id")
                                .from(Operations::Table, Operations::WorkOrderId)
                                .to(WorkOrders::Table, WorkOrders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_operations_work_center_id")
                                .from(Operations::Table, Operations::WorkCenterId)
                                .to(WorkCenters::Table, WorkCenters::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_operations_machine_id")
                                .from(Operations::Table, Operations::MachineId)
                                .to(Machines::Table, Machines::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_operations_order_phase")
                        .table(Operations::Table)
                        .col(Operations::WorkOrderId)
                        .col(Operations::PhaseNumber)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(MaterialRequirements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(MaterialRequirements::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MaterialRequirements::OperationId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MaterialRequirements::MaterialId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MaterialRequirements::QuantityPerUnit)
                                .decimal_len(12, 4)
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_material_requirements_operation_id")
                                .from(
                                    MaterialRequirements::Table,
                                    MaterialRequirements::OperationId,
                                )
                                .to(Operations::Table, Operations::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_material_requirements_material_id")
                                .from(
                                    MaterialRequirements::Table,
                                    MaterialRequirements::MaterialId,
                                )
                                .to(Materials::Table, Materials::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_material_requirements_pair")
                        .table(MaterialRequirements::Table)
                        .col(MaterialRequirements::OperationId)
                        .col(MaterialRequirements::MaterialId)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(MaterialRequirements::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Operations::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(WorkOrders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum WorkOrders {
        Table,
        Id,
        OrderNumber,
        Title,
        TargetQuantity,
        Status,
        FirstCompletedOn,
        PlannedStart,
        PlannedEnd,
        MaterialsConsumedAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Operations {
        Table,
        Id,
        WorkOrderId,
        PhaseNumber,
        Title,
        WorkCenterId,
        OperationType,
        Status,
        InputQuantity,
        MachineId,
        EstimatedMinutes,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum MaterialRequirements {
        Table,
        Id,
        OperationId,
        MaterialId,
        QuantityPerUnit,
    }

    #[derive(DeriveIden)]
    enum WorkCenters {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum Machines {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum Materials {
        Table,
        Id,
    }
}

mod m20240301_000003_create_time_entry_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_time_entry_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(TimeEntries::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(TimeEntries::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(TimeEntries::OperationId).uuid().not_null())
                        .col(ColumnDef::new(TimeEntries::OperatorId).uuid().not_null())
                        .col(
                            ColumnDef::new(TimeEntries::StartedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TimeEntries::EndedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(TimeEntries::ClaimedQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(TimeEntries::GoodQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(TimeEntries::ScrapQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_time_entries_operation_id")
                                .from(TimeEntries::Table, TimeEntries::OperationId)
                                .to(Operations::Table, Operations::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_time_entries_operator_id")
                                .from(TimeEntries::Table, TimeEntries::OperatorId)
                                .to(Operators::Table, Operators::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_time_entries_operation_id")
                        .table(TimeEntries::Table)
                        .col(TimeEntries::OperationId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_time_entries_ended_at")
                        .table(TimeEntries::Table)
                        .col(TimeEntries::EndedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Anomalies::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Anomalies::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Anomalies::OperationId).uuid().not_null())
                        .col(ColumnDef::new(Anomalies::OperatorId).uuid().null())
                        .col(ColumnDef::new(Anomalies::Description).text().not_null())
                        .col(
                            ColumnDef::new(Anomalies::ReportedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Anomalies::Status)
                                .string_len(32)
                                .not_null()
                                .default("open"),
                        )
                        .col(ColumnDef::new(Anomalies::ResolvedBy).uuid().null())
                        .col(
                            ColumnDef::new(Anomalies::ResolvedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Anomalies::HiddenFromDashboard)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_anomalies_operation_id")
                                .from(Anomalies::Table, Anomalies::OperationId)
                                .to(Operations::Table, Operations::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_anomalies_operator_id")
                                .from(Anomalies::Table, Anomalies::OperatorId)
                                .to(Operators::Table, Operators::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Anomalies::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(TimeEntries::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum TimeEntries {
        Table,
        Id,
        OperationId,
        OperatorId,
        StartedAt,
        EndedAt,
        ClaimedQuantity,
        GoodQuantity,
        ScrapQuantity,
    }

    #[derive(DeriveIden)]
    enum Anomalies {
        Table,
        Id,
        OperationId,
        OperatorId,
        Description,
        ReportedAt,
        Status,
        ResolvedBy,
        ResolvedAt,
        HiddenFromDashboard,
    }

    #[derive(DeriveIden)]
    enum Operations {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum Operators {
        Table,
        Id,
    }
}

mod m20240301_000004_create_daily_reports_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_daily_reports_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(DailyReports::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DailyReports::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DailyReports::ReportDate)
                                .date()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(DailyReports::GoodQuantity)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(DailyReports::ScrapQuantity)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(DailyReports::ScrapRate)
                                .double()
                                .not_null()
                                .default(0.0),
                        )
                        .col(
                            ColumnDef::new(DailyReports::ActiveOperators)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(DailyReports::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DailyReports::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DailyReports::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum DailyReports {
        Table,
        Id,
        ReportDate,
        GoodQuantity,
        ScrapQuantity,
        ScrapRate,
        ActiveOperators,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000005_create_users_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000005_create_users_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Users::Username)
                                .string_len(150)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Users::Email).string().not_null())
                        .col(ColumnDef::new(Users::FirstName).string().not_null())
                        .col(ColumnDef::new(Users::LastName).string().not_null())
                        .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                        .col(
                            ColumnDef::new(Users::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Users::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Profiles::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Profiles::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Profiles::UserId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Profiles::Role)
                                .string_len(32)
                                .not_null()
                                .default("station"),
                        )
                        .col(
                            ColumnDef::new(Profiles::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_profiles_user_id")
                                .from(Profiles::Table, Profiles::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Profiles::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Users {
        Table,
        Id,
        Username,
        Email,
        FirstName,
        LastName,
        PasswordHash,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Profiles {
        Table,
        Id,
        UserId,
        Role,
        CreatedAt,
    }
}
