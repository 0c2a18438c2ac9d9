//! Database entities for the shop-floor model

pub mod anomaly;
pub mod daily_report;
pub mod machine;
pub mod material;
pub mod material_requirement;
pub mod operation;
pub mod operator;
pub mod operator_qualification;
pub mod profile;
pub mod time_entry;
pub mod user;
pub mod work_center;
pub mod work_order;
