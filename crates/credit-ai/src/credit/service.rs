use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use super::domain::{
    ApplicationId, ApplicationRecord, ApplicationStatus, ApplicationSubmission, EvaluationId,
    EvaluationRecord,
};
use super::evaluation::{EvaluationEngine, EvaluationOutcome, FeatureInsight};
use super::intake::{IntakeGuard, ValidationError};
use super::model::TrainingMetrics;
use super::repository::{ApplicationQuery, ApplicationRepository, RepositoryError};

/// Evaluation joined with its application and the explanation list.
#[derive(Debug, Clone, Serialize)]
pub struct DetailedEvaluation {
    pub evaluation: EvaluationRecord,
    pub application: ApplicationRecord,
    pub top_features: Vec<FeatureInsight>,
}

/// Loaded-model summary for health reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelStatus {
    pub model_loaded: bool,
    pub model_version: String,
}

/// Service composing intake validation, the repository, and the evaluation engine.
pub struct CreditEvaluationService<R> {
    guard: IntakeGuard,
    repository: Arc<R>,
    engine: Arc<EvaluationEngine>,
}

impl<R> CreditEvaluationService<R>
where
    R: ApplicationRepository + 'static,
{
    pub fn new(repository: Arc<R>, engine: EvaluationEngine) -> Self {
        Self {
            guard: IntakeGuard,
            repository,
            engine: Arc::new(engine),
        }
    }

    pub fn engine(&self) -> &EvaluationEngine {
        &self.engine
    }

    /// Validate and store a new application in the pending state.
    pub fn submit(
        &self,
        submission: ApplicationSubmission,
    ) -> Result<ApplicationRecord, ServiceError> {
        if let Err(err) = self.guard.validate(&submission) {
            debug!(field = err.field(), error = %err, "application rejected at intake");
            return Err(err.into());
        }

        let record = self.repository.insert(submission, Utc::now())?;
        info!(
            application_id = %record.id,
            applicant_id = %record.applicant_id,
            "application received"
        );
        Ok(record)
    }

    pub fn list(&self, query: &ApplicationQuery) -> Result<Vec<ApplicationRecord>, ServiceError> {
        Ok(self.repository.list(query)?)
    }

    pub fn get(&self, application_id: ApplicationId) -> Result<ApplicationRecord, ServiceError> {
        let record = self
            .repository
            .fetch(application_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(record)
    }

    /// Score a pending application and persist its one evaluation.
    pub fn evaluate(
        &self,
        application_id: ApplicationId,
    ) -> Result<EvaluationRecord, ServiceError> {
        let application = self.get(application_id)?;
        if application.status != ApplicationStatus::Pending {
            return Err(ServiceError::AlreadyEvaluated(application_id));
        }

        let outcome = self.engine.evaluate(&application.submission);
        let record = self
            .repository
            .record_evaluation(application_id, outcome, Utc::now())
            .map_err(|err| match err {
                RepositoryError::Conflict => ServiceError::AlreadyEvaluated(application_id),
                other => ServiceError::Repository(other),
            })?;

        info!(
            application_id = %application_id,
            evaluation_id = %record.id,
            recommendation = record.outcome.recommendation.label(),
            default_probability = record.outcome.default_probability,
            model_version = %record.outcome.model_version,
            "application evaluated"
        );
        Ok(record)
    }

    pub fn evaluation(&self, evaluation_id: EvaluationId) -> Result<EvaluationRecord, ServiceError> {
        let record = self
            .repository
            .fetch_evaluation(evaluation_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(record)
    }

    pub fn evaluation_for_application(
        &self,
        application_id: ApplicationId,
    ) -> Result<EvaluationRecord, ServiceError> {
        let record = self
            .repository
            .evaluation_for(application_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(record)
    }

    pub fn detailed_evaluation(
        &self,
        evaluation_id: EvaluationId,
    ) -> Result<DetailedEvaluation, ServiceError> {
        let evaluation = self.evaluation(evaluation_id)?;
        let application = self.get(evaluation.application_id)?;
        let top_features = evaluation.outcome.feature_importance.clone();
        Ok(DetailedEvaluation {
            evaluation,
            application,
            top_features,
        })
    }

    /// What-if scoring: validated and evaluated, never stored.
    pub fn predict(
        &self,
        submission: &ApplicationSubmission,
    ) -> Result<EvaluationOutcome, ServiceError> {
        self.guard.validate(submission)?;
        Ok(self.engine.evaluate(submission))
    }

    pub fn model_status(&self) -> ModelStatus {
        ModelStatus {
            model_loaded: self.engine.model_loaded(),
            model_version: self.engine.model_version().to_string(),
        }
    }

    pub fn model_metrics(&self) -> Option<&TrainingMetrics> {
        self.engine.model_metrics()
    }
}

/// Error raised by the credit evaluation service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("application {0} already evaluated")]
    AlreadyEvaluated(ApplicationId),
}
