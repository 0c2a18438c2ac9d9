use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    services::{
        flow_rules::OperationRef,
        production_flow::{
            FinishDeclaration, FinishOutcome, FinishProposal, StartProposal, TimeEntryView,
        },
    },
    ApiResponse, ApiResult, AppState,
};

/// Identifies an operation either by a scanned travel-sheet code
/// (`OF-1001/2`) or by its order number and phase.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct OperationTarget {
    pub scan_code: Option<String>,
    pub order_number: Option<String>,
    pub phase_number: Option<i32>,
}

impl OperationTarget {
    pub fn resolve(&self) -> Result<OperationRef, ServiceError> {
        if let Some(code) = self.scan_code.as_deref().filter(|c| !c.trim().is_empty()) {
            return code.parse();
        }
        match (self.order_number.as_deref(), self.phase_number) {
            (Some(order_number), Some(phase_number)) if !order_number.trim().is_empty() => {
                Ok(OperationRef {
                    order_number: order_number.trim().to_string(),
                    phase_number,
                })
            }
            _ => Err(ServiceError::InvalidInput(
                "Provide either scan_code or order_number with phase_number".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProposeStartRequest {
    pub operator_code: String,
    #[serde(flatten)]
    pub target: OperationTarget,
    pub requested_quantity: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmStartRequest {
    pub operation_id: Uuid,
    pub operator_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProposeFinishRequest {
    pub operator_code: String,
    #[serde(flatten)]
    pub target: OperationTarget,
}

/// First step of a claim: validate and report what can be claimed
#[utoipa::path(
    post,
    path = "/api/v1/production/start/propose",
    request_body = ProposeStartRequest,
    responses(
        (status = 200, description = "Claim can proceed", body = ApiResponse<StartProposal>),
        (status = 403, description = "Operator not qualified", body = crate::errors::ErrorResponse),
        (status = 404, description = "Operator or operation not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Operation locked or in an invalid state", body = crate::errors::ErrorResponse),
        (status = 422, description = "Nothing left to claim", body = crate::errors::ErrorResponse),
    ),
    tag = "Production"
)]
pub async fn propose_start(
    State(state): State<AppState>,
    Json(request): Json<ProposeStartRequest>,
) -> ApiResult<StartProposal> {
    let target = request.target.resolve()?;
    let proposal = state
        .services
        .production
        .propose_start(&request.operator_code, &target, request.requested_quantity)
        .await?;
    Ok(Json(ApiResponse::success(proposal)))
}

/// Second step of a claim: open the time entry
#[utoipa::path(
    post,
    path = "/api/v1/production/start/confirm",
    request_body = ConfirmStartRequest,
    responses(
        (status = 201, description = "Time entry opened", body = ApiResponse<TimeEntryView>),
        (status = 409, description = "Operation locked", body = crate::errors::ErrorResponse),
        (status = 422, description = "Claim exceeds availability", body = crate::errors::ErrorResponse),
    ),
    tag = "Production"
)]
pub async fn confirm_start(
    State(state): State<AppState>,
    Json(request): Json<ConfirmStartRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TimeEntryView>>), ServiceError> {
    let entry = state
        .services
        .production
        .confirm_start(request.operation_id, request.operator_id, request.quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(entry))))
}

#[utoipa::path(
    post,
    path = "/api/v1/production/finish/propose",
    request_body = ProposeFinishRequest,
    responses(
        (status = 200, description = "Open time entry found", body = ApiResponse<FinishProposal>),
        (status = 404, description = "No open time entry", body = crate::errors::ErrorResponse),
    ),
    tag = "Production"
)]
pub async fn propose_finish(
    State(state): State<AppState>,
    Json(request): Json<ProposeFinishRequest>,
) -> ApiResult<FinishProposal> {
    let target = request.target.resolve()?;
    let proposal = state
        .services
        .production
        .propose_finish(&request.operator_code, &target)
        .await?;
    Ok(Json(ApiResponse::success(proposal)))
}

#[utoipa::path(
    post,
    path = "/api/v1/production/finish/confirm",
    request_body = FinishDeclaration,
    responses(
        (status = 200, description = "Time entry closed", body = ApiResponse<FinishOutcome>),
        (status = 409, description = "Operation locked or entry already closed", body = crate::errors::ErrorResponse),
        (status = 422, description = "Good + scrap differs from the claim", body = crate::errors::ErrorResponse),
    ),
    tag = "Production"
)]
pub async fn confirm_finish(
    State(state): State<AppState>,
    Json(declaration): Json<FinishDeclaration>,
) -> ApiResult<FinishOutcome> {
    let outcome = state.services.production.confirm_finish(declaration).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn scan_code_takes_precedence() {
        let target = OperationTarget {
            scan_code: Some("OF-9/3".into()),
            order_number: Some("OF-1".into()),
            phase_number: Some(1),
        };
        let resolved = target.resolve().unwrap();
        assert_eq!(resolved.order_number, "OF-9");
        assert_eq!(resolved.phase_number, 3);
    }

    #[test]
    fn explicit_fields_are_used_without_scan_code() {
        let target = OperationTarget {
            scan_code: None,
            order_number: Some(" OF-2 ".into()),
            phase_number: Some(20),
        };
        assert_eq!(
            target.resolve().unwrap(),
            OperationRef {
                order_number: "OF-2".into(),
                phase_number: 20
            }
        );
    }

    #[test]
    fn missing_target_is_invalid_input() {
        assert_matches!(
            OperationTarget::default().resolve(),
            Err(ServiceError::InvalidInput(_))
        );
    }
}
