use std::sync::Arc;

use crate::{
    db::DbPool,
    services::{
        anomalies::AnomalyService, archival::ArchivalService, daily_reports::DailyReportService,
        production_flow::ProductionFlowService, reference_data::ReferenceDataService,
        reporting::ReportingService, routing::RoutingService, users::UserService,
    },
};

/// Factory for creating service instances over one shared pool
pub struct ServiceFactory {
    db_pool: Arc<DbPool>,
}

impl ServiceFactory {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    pub fn production_flow_service(&self) -> ProductionFlowService {
        ProductionFlowService::new(self.db_pool.clone())
    }

    pub fn routing_service(&self) -> RoutingService {
        RoutingService::new(self.db_pool.clone())
    }

    pub fn reference_data_service(&self) -> ReferenceDataService {
        ReferenceDataService::new(self.db_pool.clone())
    }

    pub fn reporting_service(&self) -> ReportingService {
        ReportingService::new(self.db_pool.clone())
    }

    pub fn daily_report_service(&self) -> DailyReportService {
        DailyReportService::new(self.db_pool.clone())
    }

    pub fn archival_service(&self) -> ArchivalService {
        ArchivalService::new(self.db_pool.clone())
    }

    pub fn anomaly_service(&self) -> AnomalyService {
        AnomalyService::new(self.db_pool.clone())
    }

    pub fn user_service(&self) -> UserService {
        UserService::new(self.db_pool.clone())
    }

    /// Gets a reference to the database pool
    pub fn db_pool(&self) -> &Arc<DbPool> {
        &self.db_pool
    }
}

/// Service container holding all service instances
#[derive(Clone)]
pub struct ServiceContainer {
    pub production: Arc<ProductionFlowService>,
    pub routing: Arc<RoutingService>,
    pub reference_data: Arc<ReferenceDataService>,
    pub reporting: Arc<ReportingService>,
    pub daily_reports: Arc<DailyReportService>,
    pub archival: Arc<ArchivalService>,
    pub anomalies: Arc<AnomalyService>,
    pub users: Arc<UserService>,
}

impl ServiceContainer {
    pub fn new(factory: &ServiceFactory) -> Self {
        Self {
            production: Arc::new(factory.production_flow_service()),
            routing: Arc::new(factory.routing_service()),
            reference_data: Arc::new(factory.reference_data_service()),
            reporting: Arc::new(factory.reporting_service()),
            daily_reports: Arc::new(factory.daily_report_service()),
            archival: Arc::new(factory.archival_service()),
            anomalies: Arc::new(factory.anomaly_service()),
            users: Arc::new(factory.user_service()),
        }
    }
}
