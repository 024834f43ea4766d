//! Small-business credit evaluation: intake, feature derivation, calibrated
//! scoring, decision policy, and the HTTP surface over them.

pub mod domain;
pub mod evaluation;
pub mod features;
pub mod intake;
pub mod model;
pub mod repository;
pub mod router;
pub mod service;
pub mod training;

#[cfg(test)]
mod tests;

pub use domain::{
    ApplicationId, ApplicationRecord, ApplicationStatus, ApplicationSubmission, BusinessType,
    EvaluationId, EvaluationRecord, RepaymentHistory,
};
pub use evaluation::{
    DecisionPolicy, EvaluationEngine, EvaluationOutcome, FeatureInsight, InsightImpact,
    Recommendation, FALLBACK_MODEL_VERSION,
};
pub use features::{DerivedFeatures, FeatureDeriver, KeyRatios};
pub use intake::{IntakeGuard, ValidationError};
pub use model::{
    CalibratedModel, ModelArtifact, ModelError, ProbabilityModel, Scorer, TrainingMetrics,
};
pub use repository::{
    ApplicationQuery, ApplicationRepository, InMemoryApplicationRepository, RepositoryError,
};
pub use router::credit_router;
pub use service::{CreditEvaluationService, DetailedEvaluation, ModelStatus, ServiceError};
pub use training::{train_from_reader, CalibrationMethod, TrainingError, TrainingOptions};
