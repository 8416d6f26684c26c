//! REST API handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use stratus_core::OptimizationRequest;
use stratus_placement::{
    OptimizeOptions, PlacementError, PlacementOutcome, TracingListener, build_report, optimize,
};
use tracing::{error, info, warn};

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

// ── Placements ─────────────────────────────────────────────────

/// POST /api/v1/placements
///
/// Infeasible and timed-out searches are answered with 200 and a failure
/// report in `data`; `success` reflects whether a placement was found.
pub async fn create_placement(
    State(state): State<ApiState>,
    Json(body): Json<OptimizationRequest>,
) -> impl IntoResponse {
    let options = OptimizeOptions {
        workers: body.workers.or(state.default_workers),
    };
    let request = match body.into_request() {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "rejected placement request");
            return error_response(&e.to_string(), StatusCode::BAD_REQUEST).into_response();
        }
    };
    info!(scenario = %request.scenario_label(), "placement request accepted");

    let solved = tokio::task::spawn_blocking(move || {
        optimize(&request, &options, &TracingListener).map(|solution| build_report(&request, &solution))
    })
    .await;

    match solved {
        Ok(Ok(outcome)) => outcome_response(outcome).into_response(),
        Ok(Err(PlacementError::Input(e))) => {
            warn!(error = %e, "rejected placement request");
            error_response(&e.to_string(), StatusCode::BAD_REQUEST).into_response()
        }
        Ok(Err(e)) => {
            error!(error = %e, "placement optimization failed");
            error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
        }
        Err(e) => {
            error!(error = %e, "placement worker panicked");
            error_response("placement worker failed", StatusCode::INTERNAL_SERVER_ERROR).into_response()
        }
    }
}

fn outcome_response(outcome: PlacementOutcome) -> Json<ApiResponse<PlacementOutcome>> {
    let success = outcome.is_solved();
    Json(ApiResponse {
        success,
        error: (!success).then(|| match &outcome {
            PlacementOutcome::Failed(failure) => failure.error_message.clone(),
            PlacementOutcome::Solved(_) => String::new(),
        }),
        data: Some(outcome),
    })
}

// ── Health ─────────────────────────────────────────────────────

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    ApiResponse::ok("ok")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> ApiState {
        ApiState {
            default_workers: Some(1),
        }
    }

    fn one_provider_request() -> OptimizationRequest {
        serde_json::from_value(serde_json::json!({
            "cloudProvidersQuantity": 1,
            "machineTypesQuantity": 1,
            "applicationsQuantity": 1,
            "distribuitionMachineTypesPerCloudProvider": [0],
            "vcpuPerMachineType": [4000],
            "memoryPerMachineType": [8192],
            "costPerMachineType": [10000],
            "carbonFootprintPerMachineType": [0],
            "vcpuPerApplication": [1000],
            "memoryPerApplication": [1024],
            "instancesPerApplication": [2],
            "isMirroringEnabled": false,
            "targetCloudCount": 1,
            "maxTimeInSeconds": 5.0
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn feasible_request_is_solved() {
        let resp = create_placement(State(test_state()), Json(one_provider_request())).await;
        let resp = resp.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn mismatched_vectors_are_rejected() {
        let mut req = one_provider_request();
        req.vcpu_per_machine_type.push(2000);
        let resp = create_placement(State(test_state()), Json(req)).await;
        let resp = resp.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn infeasible_request_is_still_ok() {
        let mut req = one_provider_request();
        req.vcpu_per_application = vec![8000];
        let resp = create_placement(State(test_state()), Json(req)).await;
        let resp = resp.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn zero_instances_fail_validation() {
        let mut req = one_provider_request();
        req.instances_per_application = vec![0];
        let resp = create_placement(State(test_state()), Json(req)).await;
        let resp = resp.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn healthz_is_ok() {
        let resp = healthz().await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
