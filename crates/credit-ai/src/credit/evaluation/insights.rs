use serde::{Deserialize, Serialize};

use super::super::features::DerivedFeatures;

const LOW_DSCR: f64 = 1.2;
const STRONG_DSCR: f64 = 2.0;
const LOW_CREDIT_SCORE: f64 = 650.0;
const HIGH_REVENUE: f64 = 10_000_000.0;
const LOW_COLLATERAL_COVERAGE: f64 = 0.5;
const HIGH_DEBT_TO_INCOME: f64 = 0.4;
const STRONG_PROFILE_PD: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightImpact {
    Positive,
    Negative,
}

/// One human-readable reason attached to an evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureInsight {
    pub feature: String,
    pub importance: f64,
    pub value: f64,
    pub reason: String,
    pub impact: InsightImpact,
}

fn insight(
    feature: &str,
    importance: f64,
    value: f64,
    reason: &str,
    impact: InsightImpact,
) -> FeatureInsight {
    FeatureInsight {
        feature: feature.to_string(),
        importance,
        value,
        reason: reason.to_string(),
        impact,
    }
}

/// Red and green flags relative to fixed underwriting baselines, most important first.
pub(crate) fn explain(features: &DerivedFeatures, default_probability: f64) -> Vec<FeatureInsight> {
    let mut insights = Vec::new();
    let reported = features.key_ratios();

    if features.dscr < LOW_DSCR {
        insights.push(insight(
            "DSCR",
            0.4,
            reported.dscr,
            "Low Debt Coverage",
            InsightImpact::Negative,
        ));
    } else if features.dscr > STRONG_DSCR {
        insights.push(insight(
            "DSCR",
            0.2,
            reported.dscr,
            "Strong Cashflow",
            InsightImpact::Positive,
        ));
    }

    if features.promoter_credit_score < LOW_CREDIT_SCORE {
        insights.push(insight(
            "Credit Score",
            0.35,
            features.promoter_credit_score,
            "Low Credit Score",
            InsightImpact::Negative,
        ));
    }

    if features.annual_revenue > HIGH_REVENUE {
        insights.push(insight(
            "Revenue",
            0.15,
            features.annual_revenue,
            "High Revenue Volume",
            InsightImpact::Positive,
        ));
    }

    if features.collateral_coverage < LOW_COLLATERAL_COVERAGE {
        insights.push(insight(
            "Collateral",
            0.25,
            reported.collateral_coverage,
            "Insufficient Collateral",
            InsightImpact::Negative,
        ));
    }

    if features.debt_to_income_ratio > HIGH_DEBT_TO_INCOME {
        insights.push(insight(
            "Debt-to-Income",
            0.2,
            features.debt_to_income_ratio,
            "High Debt-to-Income Ratio",
            InsightImpact::Negative,
        ));
    }

    if default_probability < STRONG_PROFILE_PD {
        insights.push(insight(
            "Default Probability",
            0.1,
            default_probability,
            "Strong Credit Profile",
            InsightImpact::Positive,
        ));
    }

    // stable sort keeps rule order for equal weights
    insights.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    insights
}
