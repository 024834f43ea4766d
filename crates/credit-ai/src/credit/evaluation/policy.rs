use serde::{Deserialize, Serialize};

use crate::config::ScoringConfig;

/// Three-way lending recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Approve,
    Review,
    Reject,
}

impl Recommendation {
    pub const fn label(self) -> &'static str {
        match self {
            Recommendation::Approve => "approve",
            Recommendation::Review => "review",
            Recommendation::Reject => "reject",
        }
    }
}

/// Probability cut-offs separating approve, review, and reject.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionPolicy {
    pub approve_below: f64,
    pub reject_above: f64,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self::from(&ScoringConfig::default())
    }
}

impl From<&ScoringConfig> for DecisionPolicy {
    fn from(config: &ScoringConfig) -> Self {
        Self {
            approve_below: config.approve_below,
            reject_above: config.reject_above,
        }
    }
}

impl DecisionPolicy {
    pub fn recommend(&self, default_probability: f64) -> Recommendation {
        if default_probability < self.approve_below {
            Recommendation::Approve
        } else if default_probability > self.reject_above {
            Recommendation::Reject
        } else {
            Recommendation::Review
        }
    }
}

/// Risk on a 0-100 scale, one decimal; higher is riskier.
pub(crate) fn risk_score(default_probability: f64) -> f64 {
    (default_probability * 1000.0).round() / 10.0
}

/// Distance from the 0.5 decision boundary, scaled to [0, 1].
pub(crate) fn confidence(default_probability: f64) -> f64 {
    (2.0 * (0.5 - default_probability).abs()).clamp(0.0, 1.0)
}
