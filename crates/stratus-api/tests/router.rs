//! Router round-trips: JSON in, envelope and report out.

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use stratus_api::{ApiState, build_router};
use tower::ServiceExt;

fn router() -> axum::Router {
    build_router(ApiState {
        default_workers: Some(2),
    })
}

fn mirrored_body() -> Value {
    json!({
        "cloudProvidersQuantity": 2,
        "machineTypesQuantity": 2,
        "applicationsQuantity": 1,
        "distributionMachineTypesPerCloudProvider": [0, 1],
        "vcpuPerMachineType": [4000, 4000],
        "memoryPerMachineType": [8192, 8192],
        "costPerMachineType": [10000, 8000],
        "carbonFootprintPerMachineType": [10000000000i64, 20000000000i64],
        "vcpuPerApplication": [1000],
        "memoryPerApplication": [1024],
        "instancesPerApplication": [3],
        "applicationNames": ["api"],
        "clusterCostPerCloudProvider": [30000, 20000],
        "fixedCost": 0,
        "isMirroringEnabled": true,
        "targetCloudCount": 2,
        "maxTimeInSeconds": 10.0,
        "cloudProviderNames": ["aws", "gcp"],
        "scenario": "mirrored-pair"
    })
}

async fn post(body: &Value) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/placements")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();
    let resp = router().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn mirrored_request_returns_full_report() {
    let (status, body) = post(&mirrored_body()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let data = &body["data"];
    assert_eq!(data["scenario"], "mirrored-pair");
    assert_eq!(data["solverResults"]["status"], "OPTIMAL");
    assert_eq!(data["solverResults"]["costZ"], 1040.0);
    assert_eq!(data["inputMetrics"]["analyzedCloudProviders"], 2);
    assert_eq!(data["infrastructure"]["instances"].as_array().unwrap().len(), 6);
    assert_eq!(data["totalCarbon"], 9.0);
    assert_eq!(data["providers"][1]["name"], "gcp");
}

#[tokio::test]
async fn carbon_ceiling_makes_request_infeasible() {
    let mut body = mirrored_body();
    body["maxTotalCarbonFootprint"] = json!(5.0);
    let (status, body) = post(&body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["data"]["status"], "INFEASIBLE");
    assert!(body["data"]["errorMessage"].is_string());
}

#[tokio::test]
async fn unknown_provider_index_is_bad_request() {
    let mut body = mirrored_body();
    body["distributionMachineTypesPerCloudProvider"] = json!([0, 5]);
    let (status, body) = post(&body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("provider 5"));
}

#[tokio::test]
async fn healthz_answers() {
    let req = Request::builder().uri("/healthz").body(Body::empty()).unwrap();
    let resp = router().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn unrepresentable_time_budget_is_bad_request() {
    let mut body = mirrored_body();
    body["maxTimeInSeconds"] = json!(1e30);
    let (status, body) = post(&body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("maxTimeInSeconds"));
}

#[tokio::test]
async fn overflowing_demand_is_bad_request() {
    let mut body = mirrored_body();
    body["applicationsQuantity"] = json!(2);
    body["vcpuPerApplication"] = json!([1000, 1000]);
    body["memoryPerApplication"] = json!([1024, 1024]);
    body["instancesPerApplication"] = json!([u64::MAX, 1]);
    body["applicationNames"] = json!(["api", "worker"]);
    let (status, body) = post(&body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}
