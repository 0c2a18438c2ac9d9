// Pure rules shared by the services below
pub mod flow_rules;

// Operator-facing production flow
pub mod production_flow;

// Manager-side routing and reference data
pub mod reference_data;
pub mod routing;

// Reporting and snapshots
pub mod daily_reports;
pub mod reporting;

// Maintenance and follow-up
pub mod anomalies;
pub mod archival;
pub mod users;

// Service factory for dependency injection
pub mod factory;
