use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use super::common::*;
use crate::credit::domain::ApplicationId;
use crate::credit::repository::{ApplicationQuery, ApplicationRepository};
use crate::credit::router::submit_handler;
use crate::credit::service::CreditEvaluationService;

fn json_request(method: &str, uri: &str, payload: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(payload).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn submit_route_creates_pending_application() {
    let (service, _) = build_service();
    let router = router_with_service(service);

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/applications",
            &serde_json::to_value(strong_submission()).unwrap(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json_body(response).await;
    assert_eq!(body["id"], json!(1));
    assert_eq!(body["applicant_id"], json!("APP000001"));
    assert_eq!(body["status"], json!("pending"));
    assert_eq!(body["business_type"], json!("Manufacturing"));
    assert_eq!(body["loan_tenure_months"], json!(36));
}

#[tokio::test]
async fn submit_route_applies_defaults_for_minimal_payload() {
    let (service, _) = build_service();
    let router = router_with_service(service);

    let payload = json!({
        "business_type": "Services",
        "years_in_operation": 3,
        "annual_revenue": 2000000.0,
        "monthly_cashflow": 90000.0,
        "loan_amount_requested": 500000.0,
        "credit_score": 700,
        "existing_loans": 0,
        "debt_to_income_ratio": 0.2,
        "collateral_value": 400000.0,
        "repayment_history": "Good"
    });
    let response = router
        .oneshot(json_request("POST", "/api/applications", &payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json_body(response).await;
    assert_eq!(body["loan_purpose"], json!("Working Capital"));
    assert_eq!(body["collateral_type"], json!("None"));
    assert_eq!(body["total_debt"], json!(0.0));
}

#[tokio::test]
async fn submit_handler_returns_unprocessable_for_invalid_fields() {
    let (service, _) = build_service();
    let mut submission = strong_submission();
    submission.credit_score = 120;

    let response = submit_handler(State(Arc::new(service)), axum::Json(submission)).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json_body(response).await;
    assert_eq!(body["field"], json!("credit_score"));
}

#[tokio::test]
async fn submit_handler_returns_internal_error_on_repository_failure() {
    let service = Arc::new(CreditEvaluationService::new(
        Arc::new(UnavailableRepository),
        baseline_engine(),
    ));

    let response = submit_handler(State(service), axum::Json(strong_submission())).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn unknown_application_returns_not_found() {
    let (service, _) = build_service();
    let router = router_with_service(service);

    let response = router.oneshot(get("/api/applications/99")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = read_json_body(response).await;
    assert_eq!(body["error"], json!("application not found"));
}

#[tokio::test]
async fn evaluate_route_reports_summary_then_rejects_repeat() {
    let (service, _) = build_service();
    service.submit(weak_submission()).expect("accepted");
    let router = router_with_service(service);

    let response = router
        .clone()
        .oneshot(post_empty("/api/applications/1/evaluate"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["message"], json!("Evaluation completed successfully"));
    assert_eq!(body["evaluation_id"], json!(1));
    assert_eq!(body["recommendation"], json!("reject"));
    assert!(body["risk_score"].as_f64().unwrap() > 90.0);

    let repeat = router
        .clone()
        .oneshot(post_empty("/api/applications/1/evaluate"))
        .await
        .unwrap();
    assert_eq!(repeat.status(), StatusCode::BAD_REQUEST);

    let stored = router
        .oneshot(get("/api/applications/1/evaluation"))
        .await
        .unwrap();
    assert_eq!(stored.status(), StatusCode::OK);
    let body = read_json_body(stored).await;
    assert_eq!(body["application_id"], json!(1));
    assert_eq!(body["model_version"], json!("v2-logistic-calibrated"));
}

#[tokio::test]
async fn evaluate_unknown_application_returns_not_found() {
    let (service, _) = build_service();
    let router = router_with_service(service);

    let response = router
        .oneshot(post_empty("/api/applications/5/evaluate"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_route_filters_by_status() {
    let (service, _) = build_service();
    service.submit(strong_submission()).expect("accepted");
    service.submit(weak_submission()).expect("accepted");
    service
        .evaluate(ApplicationId(1))
        .expect("evaluated");
    let router = router_with_service(service);

    let response = router
        .clone()
        .oneshot(get("/api/applications?status=pending"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    let records = body.as_array().expect("array payload");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["id"], json!(2));

    let response = router
        .oneshot(get("/api/applications?skip=1&limit=5"))
        .await
        .unwrap();
    let body = read_json_body(response).await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn detailed_evaluation_route_includes_application() {
    let (service, _) = build_service();
    service.submit(strong_submission()).expect("accepted");
    service
        .evaluate(ApplicationId(1))
        .expect("evaluated");
    let router = router_with_service(service);

    let response = router
        .clone()
        .oneshot(get("/api/evaluations/1/detailed"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["application"]["applicant_id"], json!("APP000001"));
    assert_eq!(body["evaluation"]["recommendation"], json!("approve"));
    assert_eq!(body["top_features"][0]["reason"], json!("Low Debt Coverage"));

    let missing = router
        .oneshot(get("/api/evaluations/9"))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn predict_route_scores_without_storing() {
    let (service, repository) = build_service();
    let router = router_with_service(service);

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/predict",
            &serde_json::to_value(borderline_submission()).unwrap(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["id"], json!(0));
    assert_eq!(body["application_id"], json!(0));
    assert_eq!(body["recommendation"], json!("review"));
    assert!(body["key_ratios"]["dscr"].is_number());

    assert!(repository
        .list(&ApplicationQuery::default())
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn metrics_route_is_not_found_without_training_metrics() {
    let (service, _) = build_service();
    let router = router_with_service(service);

    let response = router.oneshot(get("/api/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
