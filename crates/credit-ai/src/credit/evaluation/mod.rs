mod insights;
mod policy;

pub use insights::{FeatureInsight, InsightImpact};
pub use policy::{DecisionPolicy, Recommendation};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::domain::ApplicationSubmission;
use super::features::{FeatureDeriver, KeyRatios};
use super::model::{Scorer, TrainingMetrics};
use policy::{confidence, risk_score};

pub const FALLBACK_MODEL_VERSION: &str = "fallback-heuristic";
const FALLBACK_DEFAULT_PROBABILITY: f64 = 0.75;
const FALLBACK_CONFIDENCE: f64 = 0.8;
/// Probability used when a loaded model fails on a single input.
const PREDICTION_FAILURE_PROBABILITY: f64 = 0.5;

/// Scoring result for one application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    pub risk_score: f64,
    pub default_probability: f64,
    pub recommendation: Recommendation,
    pub confidence_score: f64,
    pub model_version: String,
    pub feature_importance: Vec<FeatureInsight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_ratios: Option<KeyRatios>,
}

impl EvaluationOutcome {
    /// Constant outcome returned while no model is loaded.
    pub fn fallback() -> Self {
        Self {
            risk_score: risk_score(FALLBACK_DEFAULT_PROBABILITY),
            default_probability: FALLBACK_DEFAULT_PROBABILITY,
            recommendation: Recommendation::Reject,
            confidence_score: FALLBACK_CONFIDENCE,
            model_version: FALLBACK_MODEL_VERSION.to_string(),
            feature_importance: Vec::new(),
            key_ratios: None,
        }
    }
}

/// Stateless pipeline: derive features, score, apply the decision policy, explain.
#[derive(Debug, Clone)]
pub struct EvaluationEngine {
    deriver: FeatureDeriver,
    scorer: Scorer,
    policy: DecisionPolicy,
}

impl EvaluationEngine {
    pub fn new(scorer: Scorer, policy: DecisionPolicy) -> Self {
        Self {
            deriver: FeatureDeriver,
            scorer,
            policy,
        }
    }

    pub fn policy(&self) -> &DecisionPolicy {
        &self.policy
    }

    pub fn model_loaded(&self) -> bool {
        self.scorer.is_loaded()
    }

    pub fn model_version(&self) -> &str {
        self.scorer
            .model_version()
            .unwrap_or(FALLBACK_MODEL_VERSION)
    }

    pub fn model_metrics(&self) -> Option<&TrainingMetrics> {
        self.scorer.metrics()
    }

    pub fn evaluate(&self, submission: &ApplicationSubmission) -> EvaluationOutcome {
        let Some(model) = self.scorer.model() else {
            return EvaluationOutcome::fallback();
        };

        let features = self.deriver.derive(submission);
        let default_probability = match model.predict(&features) {
            Ok(probability) => probability,
            Err(err) => {
                warn!(error = %err, model_version = model.version(), "prediction failed; scoring at the decision boundary");
                PREDICTION_FAILURE_PROBABILITY
            }
        };

        EvaluationOutcome {
            risk_score: risk_score(default_probability),
            default_probability,
            recommendation: self.policy.recommend(default_probability),
            confidence_score: confidence(default_probability),
            model_version: model.version().to_string(),
            feature_importance: insights::explain(&features, default_probability),
            key_ratios: Some(features.key_ratios()),
        }
    }
}
