use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use super::domain::{ApplicationId, ApplicationSubmission, EvaluationId};
use super::evaluation::EvaluationOutcome;
use super::repository::{ApplicationQuery, ApplicationRepository, RepositoryError};
use super::service::{CreditEvaluationService, ServiceError};

/// Transient evaluation returned by the what-if endpoint; ids are always zero.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionView {
    pub id: u64,
    pub application_id: u64,
    #[serde(flatten)]
    pub outcome: EvaluationOutcome,
    pub evaluated_at: DateTime<Utc>,
}

/// Router builder exposing HTTP endpoints for intake, evaluation, and model metrics.
pub fn credit_router<R>(service: Arc<CreditEvaluationService<R>>) -> Router
where
    R: ApplicationRepository + 'static,
{
    Router::new()
        .route(
            "/api/applications",
            post(submit_handler::<R>).get(list_handler::<R>),
        )
        .route("/api/applications/:application_id", get(application_handler::<R>))
        .route(
            "/api/applications/:application_id/evaluate",
            post(evaluate_handler::<R>),
        )
        .route(
            "/api/applications/:application_id/evaluation",
            get(application_evaluation_handler::<R>),
        )
        .route("/api/evaluations/:evaluation_id", get(evaluation_handler::<R>))
        .route(
            "/api/evaluations/:evaluation_id/detailed",
            get(detailed_evaluation_handler::<R>),
        )
        .route("/api/predict", post(predict_handler::<R>))
        .route("/api/metrics", get(model_metrics_handler::<R>))
        .with_state(service)
}

pub(crate) async fn submit_handler<R>(
    State(service): State<Arc<CreditEvaluationService<R>>>,
    axum::Json(submission): axum::Json<ApplicationSubmission>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    match service.submit(submission) {
        Ok(record) => (StatusCode::CREATED, axum::Json(record)).into_response(),
        Err(err) => error_response(err, "application"),
    }
}

pub(crate) async fn list_handler<R>(
    State(service): State<Arc<CreditEvaluationService<R>>>,
    Query(query): Query<ApplicationQuery>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    match service.list(&query) {
        Ok(records) => (StatusCode::OK, axum::Json(records)).into_response(),
        Err(err) => error_response(err, "application"),
    }
}

pub(crate) async fn application_handler<R>(
    State(service): State<Arc<CreditEvaluationService<R>>>,
    Path(application_id): Path<u64>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    match service.get(ApplicationId(application_id)) {
        Ok(record) => (StatusCode::OK, axum::Json(record)).into_response(),
        Err(err) => error_response(err, "application"),
    }
}

pub(crate) async fn evaluate_handler<R>(
    State(service): State<Arc<CreditEvaluationService<R>>>,
    Path(application_id): Path<u64>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    match service.evaluate(ApplicationId(application_id)) {
        Ok(record) => {
            let payload = json!({
                "message": "Evaluation completed successfully",
                "evaluation_id": record.id,
                "risk_score": record.outcome.risk_score,
                "recommendation": record.outcome.recommendation,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => error_response(err, "application"),
    }
}

pub(crate) async fn application_evaluation_handler<R>(
    State(service): State<Arc<CreditEvaluationService<R>>>,
    Path(application_id): Path<u64>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    match service.evaluation_for_application(ApplicationId(application_id)) {
        Ok(record) => (StatusCode::OK, axum::Json(record)).into_response(),
        Err(err) => error_response(err, "evaluation"),
    }
}

pub(crate) async fn evaluation_handler<R>(
    State(service): State<Arc<CreditEvaluationService<R>>>,
    Path(evaluation_id): Path<u64>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    match service.evaluation(EvaluationId(evaluation_id)) {
        Ok(record) => (StatusCode::OK, axum::Json(record)).into_response(),
        Err(err) => error_response(err, "evaluation"),
    }
}

pub(crate) async fn detailed_evaluation_handler<R>(
    State(service): State<Arc<CreditEvaluationService<R>>>,
    Path(evaluation_id): Path<u64>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    match service.detailed_evaluation(EvaluationId(evaluation_id)) {
        Ok(detailed) => (StatusCode::OK, axum::Json(detailed)).into_response(),
        Err(err) => error_response(err, "evaluation"),
    }
}

pub(crate) async fn predict_handler<R>(
    State(service): State<Arc<CreditEvaluationService<R>>>,
    axum::Json(submission): axum::Json<ApplicationSubmission>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    match service.predict(&submission) {
        Ok(outcome) => {
            let view = PredictionView {
                id: 0,
                application_id: 0,
                outcome,
                evaluated_at: Utc::now(),
            };
            (StatusCode::OK, axum::Json(view)).into_response()
        }
        Err(err) => error_response(err, "application"),
    }
}

pub(crate) async fn model_metrics_handler<R>(
    State(service): State<Arc<CreditEvaluationService<R>>>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    match service.model_metrics() {
        Some(metrics) => {
            let payload = json!({
                "model_version": service.engine().model_version(),
                "metrics": metrics,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        None => {
            let payload = json!({
                "error": "metrics not available for the loaded model",
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
    }
}

fn error_response(err: ServiceError, resource: &str) -> Response {
    let (status, payload) = match &err {
        ServiceError::Validation(violation) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({ "error": violation.to_string(), "field": violation.field() }),
        ),
        ServiceError::AlreadyEvaluated(_) => (
            StatusCode::BAD_REQUEST,
            json!({ "error": "application already evaluated" }),
        ),
        ServiceError::Repository(RepositoryError::NotFound) => (
            StatusCode::NOT_FOUND,
            json!({ "error": format!("{resource} not found") }),
        ),
        ServiceError::Repository(RepositoryError::Conflict) => (
            StatusCode::CONFLICT,
            json!({ "error": format!("{resource} already exists") }),
        ),
        ServiceError::Repository(RepositoryError::Unavailable(_)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": err.to_string() }),
        ),
    };
    (status, axum::Json(payload)).into_response()
}
