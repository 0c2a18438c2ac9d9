//! Pure production-flow rules shared by the services.
//!
//! Everything here is a function of already-loaded rows so it can be unit
//! tested and benchmarked without a database.

use chrono::{Duration, NaiveDate};
use std::str::FromStr;

use crate::entities::{operation::OperationStatus, work_order::WorkOrderStatus};
use crate::errors::ServiceError;

/// Derives the order status from its operation statuses.
///
/// `Archived` is terminal and an order without operations is `Planned`. The
/// stored status is otherwise ignored.
pub fn derive_order_status(
    current: WorkOrderStatus,
    operations: &[OperationStatus],
) -> WorkOrderStatus {
    if current == WorkOrderStatus::Archived {
        return WorkOrderStatus::Archived;
    }
    if operations.is_empty() {
        return WorkOrderStatus::Planned;
    }
    if operations.iter().all(|s| *s == OperationStatus::Done) {
        return WorkOrderStatus::Done;
    }
    WorkOrderStatus::InProduction
}

/// scrap / (good + scrap) x 100, or 0 when nothing was declared.
pub fn scrap_rate(good: i64, scrap: i64) -> f64 {
    let total = good + scrap;
    if total <= 0 {
        return 0.0;
    }
    scrap as f64 / total as f64 * 100.0
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// min(100, produced / target x 100), 0 when the target is not positive.
pub fn progress_percent(produced: i64, target: i64) -> f64 {
    if target <= 0 {
        return 0.0;
    }
    (produced as f64 / target as f64 * 100.0).min(100.0)
}

/// Quantity still claimable on an operation.
pub fn available_quantity(input_quantity: i32, open_claims: i64) -> i64 {
    i64::from(input_quantity) - open_claims
}

/// An operation is complete once declared output reaches its input.
pub fn reaches_input(total_output: i64, input_quantity: i32) -> bool {
    total_output >= i64::from(input_quantity)
}

/// Minimal view of a phase needed for chain computations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseSnapshot {
    pub phase_number: i32,
    pub status: OperationStatus,
    pub good_output: i64,
    pub scrap_output: i64,
}

/// Recomputes the input chain of a routing.
///
/// `phases` must be sorted by phase number. Returns one entry per phase:
/// `Some(qty)` for `Todo` phases, `None` for phases that must not be touched.
pub fn plan_input_quantities(target_quantity: i32, phases: &[PhaseSnapshot]) -> Vec<Option<i32>> {
    phases
        .iter()
        .enumerate()
        .map(|(i, phase)| {
            if phase.status != OperationStatus::Todo {
                return None;
            }
            let computed = if i == 0 {
                target_quantity
            } else {
                let previous = &phases[i - 1];
                if previous.status == OperationStatus::Done {
                    clamp_to_i32(previous.good_output)
                } else {
                    0
                }
            };
            Some(computed)
        })
        .collect()
}

fn clamp_to_i32(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(if value < 0 { i32::MIN } else { i32::MAX })
}

/// Produced quantity and total scrap of an order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderFigures {
    /// Good output of the highest-phase `Done` operation
    pub produced_quantity: i64,
    pub total_scrap: i64,
}

pub fn order_figures(phases: &[PhaseSnapshot]) -> OrderFigures {
    let produced_quantity = phases
        .iter()
        .filter(|p| p.status == OperationStatus::Done)
        .max_by_key(|p| p.phase_number)
        .map(|p| p.good_output)
        .unwrap_or(0);
    let total_scrap = phases.iter().map(|p| p.scrap_output).sum();

    OrderFigures {
        produced_quantity,
        total_scrap,
    }
}

/// The 7 calendar days ending at `day`, oldest first.
pub fn seven_day_window(day: NaiveDate) -> [NaiveDate; 7] {
    let mut days = [day; 7];
    for (offset, slot) in days.iter_mut().enumerate() {
        *slot = day - Duration::days(6 - offset as i64);
    }
    days
}

/// Order number and phase parsed from a travel-sheet barcode (`OF-1001/2`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRef {
    pub order_number: String,
    pub phase_number: i32,
}

impl FromStr for OperationRef {
    type Err = ServiceError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        let (order, phase) = code
            .trim()
            .rsplit_once('/')
            .ok_or_else(|| ServiceError::InvalidInput(format!("Malformed scan code: {}", code)))?;
        let order = order.trim();
        if order.is_empty() {
            return Err(ServiceError::InvalidInput(format!(
                "Malformed scan code: {}",
                code
            )));
        }
        let phase_number = phase
            .trim()
            .parse::<i32>()
            .map_err(|_| ServiceError::InvalidInput(format!("Malformed scan code: {}", code)))?;

        Ok(Self {
            order_number: order.to_string(),
            phase_number,
        })
    }
}
