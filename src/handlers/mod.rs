//! HTTP handlers, one module per API area.
//!
//! Handlers stay thin: extract, call the matching service on
//! [`crate::AppState::services`], wrap the result in [`crate::ApiResponse`].

pub mod anomalies;
pub mod production;
pub mod reference_data;
pub mod reports;
pub mod work_orders;

pub use crate::AppState;
