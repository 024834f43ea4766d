use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::domain::{
    ApplicationId, ApplicationRecord, ApplicationStatus, ApplicationSubmission, EvaluationId,
    EvaluationRecord,
};
use super::evaluation::EvaluationOutcome;

pub const DEFAULT_PAGE_LIMIT: usize = 100;

/// Listing filter mirroring the `skip`/`limit`/`status` query parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApplicationQuery {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub status: Option<ApplicationStatus>,
}

fn default_limit() -> usize {
    DEFAULT_PAGE_LIMIT
}

impl Default for ApplicationQuery {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_PAGE_LIMIT,
            status: None,
        }
    }
}

/// Storage abstraction so the service module can be exercised in isolation.
pub trait ApplicationRepository: Send + Sync {
    /// Persist a new pending application, assigning its id.
    fn insert(
        &self,
        submission: ApplicationSubmission,
        received_at: DateTime<Utc>,
    ) -> Result<ApplicationRecord, RepositoryError>;
    fn fetch(&self, id: ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError>;
    fn list(&self, query: &ApplicationQuery) -> Result<Vec<ApplicationRecord>, RepositoryError>;
    /// Attach the single evaluation and mark the application evaluated in one step.
    /// Fails with `Conflict` when the application already has one.
    fn record_evaluation(
        &self,
        application_id: ApplicationId,
        outcome: EvaluationOutcome,
        evaluated_at: DateTime<Utc>,
    ) -> Result<EvaluationRecord, RepositoryError>;
    fn fetch_evaluation(
        &self,
        id: EvaluationId,
    ) -> Result<Option<EvaluationRecord>, RepositoryError>;
    fn evaluation_for(
        &self,
        application_id: ApplicationId,
    ) -> Result<Option<EvaluationRecord>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

#[derive(Default)]
struct Tables {
    applications: BTreeMap<ApplicationId, ApplicationRecord>,
    evaluations: BTreeMap<EvaluationId, EvaluationRecord>,
    evaluation_by_application: BTreeMap<ApplicationId, EvaluationId>,
    next_application: u64,
    next_evaluation: u64,
}

/// Process-local store with sequential ids, ordered by id.
#[derive(Default, Clone)]
pub struct InMemoryApplicationRepository {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryApplicationRepository {
    fn lock(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
    }
}

impl ApplicationRepository for InMemoryApplicationRepository {
    fn insert(
        &self,
        submission: ApplicationSubmission,
        received_at: DateTime<Utc>,
    ) -> Result<ApplicationRecord, RepositoryError> {
        let mut tables = self.lock()?;
        tables.next_application += 1;
        let id = ApplicationId(tables.next_application);
        let record = ApplicationRecord {
            id,
            applicant_id: id.applicant_reference(),
            submission,
            status: ApplicationStatus::Pending,
            created_at: received_at,
            updated_at: received_at,
        };
        tables.applications.insert(id, record.clone());
        Ok(record)
    }

    fn fetch(&self, id: ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Ok(self.lock()?.applications.get(&id).cloned())
    }

    fn list(&self, query: &ApplicationQuery) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let tables = self.lock()?;
        Ok(tables
            .applications
            .values()
            .filter(|record| query.status.map_or(true, |status| record.status == status))
            .skip(query.skip)
            .take(query.limit)
            .cloned()
            .collect())
    }

    fn record_evaluation(
        &self,
        application_id: ApplicationId,
        outcome: EvaluationOutcome,
        evaluated_at: DateTime<Utc>,
    ) -> Result<EvaluationRecord, RepositoryError> {
        let mut tables = self.lock()?;
        if tables
            .evaluation_by_application
            .contains_key(&application_id)
        {
            return Err(RepositoryError::Conflict);
        }

        let application = tables
            .applications
            .get_mut(&application_id)
            .ok_or(RepositoryError::NotFound)?;
        if application.status == ApplicationStatus::Evaluated {
            return Err(RepositoryError::Conflict);
        }
        application.status = ApplicationStatus::Evaluated;
        application.updated_at = evaluated_at;

        tables.next_evaluation += 1;
        let id = EvaluationId(tables.next_evaluation);
        let record = EvaluationRecord {
            id,
            application_id,
            outcome,
            evaluated_at,
        };
        tables.evaluations.insert(id, record.clone());
        tables.evaluation_by_application.insert(application_id, id);
        Ok(record)
    }

    fn fetch_evaluation(
        &self,
        id: EvaluationId,
    ) -> Result<Option<EvaluationRecord>, RepositoryError> {
        Ok(self.lock()?.evaluations.get(&id).cloned())
    }

    fn evaluation_for(
        &self,
        application_id: ApplicationId,
    ) -> Result<Option<EvaluationRecord>, RepositoryError> {
        let tables = self.lock()?;
        Ok(tables
            .evaluation_by_application
            .get(&application_id)
            .and_then(|id| tables.evaluations.get(id))
            .cloned())
    }
}
