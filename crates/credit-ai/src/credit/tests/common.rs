use std::sync::Arc;

use axum::response::Response;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::credit::domain::{
    ApplicationId, ApplicationRecord, ApplicationSubmission, BusinessType, EvaluationId,
    EvaluationRecord, RepaymentHistory, DEFAULT_COLLATERAL_TYPE, DEFAULT_LOAN_PURPOSE,
    DEFAULT_LOAN_TENURE_MONTHS,
};
use crate::credit::evaluation::{DecisionPolicy, EvaluationEngine, EvaluationOutcome};
use crate::credit::model::{CalibratedModel, ModelArtifact, Scorer};
use crate::credit::repository::{
    ApplicationQuery, ApplicationRepository, InMemoryApplicationRepository, RepositoryError,
};
use crate::credit::service::CreditEvaluationService;
use crate::credit::credit_router;

/// Established manufacturer with solid collateral; the baseline model approves it.
pub(super) fn strong_submission() -> ApplicationSubmission {
    ApplicationSubmission {
        business_type: BusinessType::Manufacturing,
        years_in_operation: 10,
        annual_revenue: 5_000_000.0,
        monthly_cashflow: 300_000.0,
        loan_amount_requested: 2_000_000.0,
        credit_score: 720,
        existing_loans: 2,
        debt_to_income_ratio: 0.45,
        collateral_value: 3_000_000.0,
        repayment_history: RepaymentHistory::Good,
        gst_turnover: None,
        ebitda_margin: None,
        net_margin: None,
        loan_tenure_months: DEFAULT_LOAN_TENURE_MONTHS,
        loan_purpose: DEFAULT_LOAN_PURPOSE.to_string(),
        promoter_credit_score: None,
        promoter_exp_years: None,
        collateral_type: DEFAULT_COLLATERAL_TYPE.to_string(),
        total_debt: 0.0,
        existing_emi: None,
    }
}

/// Young trader with a poor repayment record; the baseline model rejects it.
pub(super) fn weak_submission() -> ApplicationSubmission {
    ApplicationSubmission {
        business_type: BusinessType::Trading,
        years_in_operation: 1,
        annual_revenue: 1_000_000.0,
        monthly_cashflow: 20_000.0,
        loan_amount_requested: 2_000_000.0,
        credit_score: 560,
        existing_loans: 4,
        debt_to_income_ratio: 0.9,
        collateral_value: 100_000.0,
        repayment_history: RepaymentHistory::Poor,
        total_debt: 480_000.0,
        ..strong_submission()
    }
}

/// Mid-sized services firm that lands between the approve and reject cut-offs.
pub(super) fn borderline_submission() -> ApplicationSubmission {
    ApplicationSubmission {
        business_type: BusinessType::Services,
        years_in_operation: 5,
        annual_revenue: 3_000_000.0,
        monthly_cashflow: 100_000.0,
        loan_amount_requested: 1_000_000.0,
        credit_score: 660,
        existing_loans: 1,
        debt_to_income_ratio: 0.3,
        collateral_value: 800_000.0,
        repayment_history: RepaymentHistory::Average,
        ..strong_submission()
    }
}

/// Passes intake, but the near-zero loan drives coverage ratios to opposite infinities.
pub(super) fn degenerate_submission() -> ApplicationSubmission {
    ApplicationSubmission {
        loan_amount_requested: 1e-300,
        collateral_value: 1e10,
        monthly_cashflow: -1e10,
        ..strong_submission()
    }
}

pub(super) fn baseline_engine() -> EvaluationEngine {
    let artifact = ModelArtifact::baseline().expect("baseline artifact parses");
    let model = CalibratedModel::new(artifact).expect("baseline artifact validates");
    EvaluationEngine::new(Scorer::new(Arc::new(model)), DecisionPolicy::default())
}

pub(super) fn fallback_engine() -> EvaluationEngine {
    EvaluationEngine::new(Scorer::unloaded(), DecisionPolicy::default())
}

pub(super) fn build_service() -> (
    CreditEvaluationService<InMemoryApplicationRepository>,
    Arc<InMemoryApplicationRepository>,
) {
    let repository = Arc::new(InMemoryApplicationRepository::default());
    let service = CreditEvaluationService::new(repository.clone(), baseline_engine());
    (service, repository)
}

pub(super) fn router_with_service(
    service: CreditEvaluationService<InMemoryApplicationRepository>,
) -> axum::Router {
    credit_router(Arc::new(service))
}

pub(super) struct UnavailableRepository;

fn offline() -> RepositoryError {
    RepositoryError::Unavailable("database offline".to_string())
}

impl ApplicationRepository for UnavailableRepository {
    fn insert(
        &self,
        _submission: ApplicationSubmission,
        _received_at: DateTime<Utc>,
    ) -> Result<ApplicationRecord, RepositoryError> {
        Err(offline())
    }

    fn fetch(&self, _id: ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Err(offline())
    }

    fn list(&self, _query: &ApplicationQuery) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        Err(offline())
    }

    fn record_evaluation(
        &self,
        _application_id: ApplicationId,
        _outcome: EvaluationOutcome,
        _evaluated_at: DateTime<Utc>,
    ) -> Result<EvaluationRecord, RepositoryError> {
        Err(offline())
    }

    fn fetch_evaluation(
        &self,
        _id: EvaluationId,
    ) -> Result<Option<EvaluationRecord>, RepositoryError> {
        Err(offline())
    }

    fn evaluation_for(
        &self,
        _application_id: ApplicationId,
    ) -> Result<Option<EvaluationRecord>, RepositoryError> {
        Err(offline())
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
