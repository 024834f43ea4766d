//! Offline fitting of the calibrated logistic model from labelled CSV history.
//!
//! Every fifth row is held out. The scaler, one-hot vocabularies, classifier
//! and calibration (Platt or isotonic) are fitted on the remaining rows only.
//! Rows go through the same intake checks as live submissions.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;

use serde::Deserialize;
use tracing::info;

use super::domain::{
    ApplicationSubmission, BusinessType, RepaymentHistory, DEFAULT_COLLATERAL_TYPE,
    DEFAULT_LOAN_PURPOSE, DEFAULT_LOAN_TENURE_MONTHS,
};
use super::evaluation::DecisionPolicy;
use super::features::{CategoricalFeature, DerivedFeatures, FeatureDeriver, NumericFeature};
use super::intake::{IntakeGuard, ValidationError};
use super::model::{
    logistic, Calibration, CalibratedModel, CategoricalColumn, Classifier, ModelArtifact,
    ModelError, NumericColumn, Preprocessor, ProbabilityModel, TrainingMetrics,
};

const MIN_ROWS: usize = 10;
const HOLDOUT_EVERY: usize = 5;
const PLATT_STEPS: usize = 300;
const PLATT_LEARNING_RATE: f64 = 0.1;

const NUMERIC_FEATURES: [NumericFeature; 19] = [
    NumericFeature::YearsInOperation,
    NumericFeature::PromoterCreditScore,
    NumericFeature::PromoterExpYears,
    NumericFeature::PriorDefault,
    NumericFeature::AnnualRevenue,
    NumericFeature::GstTurnover,
    NumericFeature::EbitdaMargin,
    NumericFeature::NetMargin,
    NumericFeature::TotalDebt,
    NumericFeature::ExistingEmi,
    NumericFeature::LoanAmountRequested,
    NumericFeature::LoanTenureMonths,
    NumericFeature::ProposedEmi,
    NumericFeature::Dscr,
    NumericFeature::CollateralValue,
    NumericFeature::LoanToRevenue,
    NumericFeature::CollateralCoverage,
    NumericFeature::CashflowAdequacy,
    NumericFeature::DebtToIncomeRatio,
];

const CATEGORICAL_FEATURES: [CategoricalFeature; 4] = [
    CategoricalFeature::BusinessType,
    CategoricalFeature::LoanPurpose,
    CategoricalFeature::CollateralType,
    CategoricalFeature::RepaymentHistory,
];

#[derive(Debug, thiserror::Error)]
pub enum TrainingError {
    #[error("unable to read training data: {0}")]
    Csv(#[from] csv::Error),
    #[error("need at least {required} labelled rows, found {found}")]
    TooFewRows { found: usize, required: usize },
    #[error("row {row} is invalid: {source}")]
    InvalidRow {
        row: usize,
        source: ValidationError,
    },
    #[error("training split contains a single outcome class")]
    SingleClass,
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// How raw classifier output is mapped to a calibrated probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalibrationMethod {
    #[default]
    Sigmoid,
    Isotonic,
}

impl CalibrationMethod {
    pub fn default_version(self) -> &'static str {
        match self {
            CalibrationMethod::Sigmoid => "v3-logistic-platt",
            CalibrationMethod::Isotonic => "v3-logistic-isotonic",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainingOptions {
    pub version: String,
    pub epochs: usize,
    pub learning_rate: f64,
    pub l2: f64,
    pub calibration: CalibrationMethod,
    pub policy: DecisionPolicy,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        let calibration = CalibrationMethod::default();
        Self {
            version: calibration.default_version().to_string(),
            epochs: 500,
            learning_rate: 0.1,
            l2: 0.001,
            calibration,
            policy: DecisionPolicy::default(),
        }
    }
}

/// One labelled historical application.
#[derive(Debug, Clone, Deserialize)]
struct TrainingRow {
    business_type: BusinessType,
    years_in_operation: u32,
    annual_revenue: f64,
    monthly_cashflow: f64,
    loan_amount_requested: f64,
    credit_score: u16,
    #[serde(default)]
    existing_loans: u32,
    debt_to_income_ratio: f64,
    collateral_value: f64,
    repayment_history: RepaymentHistory,
    #[serde(default)]
    gst_turnover: Option<f64>,
    #[serde(default)]
    ebitda_margin: Option<f64>,
    #[serde(default)]
    net_margin: Option<f64>,
    #[serde(default)]
    loan_tenure_months: Option<u32>,
    #[serde(default)]
    loan_purpose: Option<String>,
    #[serde(default)]
    promoter_credit_score: Option<u16>,
    #[serde(default)]
    promoter_exp_years: Option<u32>,
    #[serde(default)]
    collateral_type: Option<String>,
    #[serde(default)]
    total_debt: Option<f64>,
    #[serde(default)]
    existing_emi: Option<f64>,
    default_flag: u8,
}

impl TrainingRow {
    fn into_labelled(self) -> (ApplicationSubmission, bool) {
        let defaulted = self.default_flag != 0;
        let submission = ApplicationSubmission {
            business_type: self.business_type,
            years_in_operation: self.years_in_operation,
            annual_revenue: self.annual_revenue,
            monthly_cashflow: self.monthly_cashflow,
            loan_amount_requested: self.loan_amount_requested,
            credit_score: self.credit_score,
            existing_loans: self.existing_loans,
            debt_to_income_ratio: self.debt_to_income_ratio,
            collateral_value: self.collateral_value,
            repayment_history: self.repayment_history,
            gst_turnover: self.gst_turnover,
            ebitda_margin: self.ebitda_margin,
            net_margin: self.net_margin,
            loan_tenure_months: self
                .loan_tenure_months
                .unwrap_or(DEFAULT_LOAN_TENURE_MONTHS),
            loan_purpose: non_blank(self.loan_purpose, DEFAULT_LOAN_PURPOSE),
            promoter_credit_score: self.promoter_credit_score,
            promoter_exp_years: self.promoter_exp_years,
            collateral_type: non_blank(self.collateral_type, DEFAULT_COLLATERAL_TYPE),
            total_debt: self.total_debt.unwrap_or(0.0),
            existing_emi: self.existing_emi,
        };
        (submission, defaulted)
    }
}

fn non_blank(value: Option<String>, default: &str) -> String {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .unwrap_or_else(|| default.to_string())
}

struct Example {
    features: DerivedFeatures,
    defaulted: bool,
}

/// Read labelled rows from CSV and fit a model artifact with holdout metrics attached.
pub fn train_from_reader<Rd: Read>(
    reader: Rd,
    options: &TrainingOptions,
) -> Result<ModelArtifact, TrainingError> {
    let deriver = FeatureDeriver;
    let guard = IntakeGuard;
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let mut training = Vec::new();
    let mut holdout = Vec::new();
    for (index, row) in csv_reader.deserialize::<TrainingRow>().enumerate() {
        let (submission, defaulted) = row?.into_labelled();
        guard
            .validate(&submission)
            .map_err(|source| TrainingError::InvalidRow {
                row: index + 1,
                source,
            })?;
        let example = Example {
            features: deriver.derive(&submission),
            defaulted,
        };
        if index % HOLDOUT_EVERY == HOLDOUT_EVERY - 1 {
            holdout.push(example);
        } else {
            training.push(example);
        }
    }

    let total = training.len() + holdout.len();
    if total < MIN_ROWS {
        return Err(TrainingError::TooFewRows {
            found: total,
            required: MIN_ROWS,
        });
    }
    let positives = training.iter().filter(|example| example.defaulted).count();
    if positives == 0 || positives == training.len() {
        return Err(TrainingError::SingleClass);
    }

    let preprocessor = fit_preprocessor(&training);
    let encoded: Vec<Vec<f64>> = training
        .iter()
        .map(|example| preprocessor.encode(&example.features))
        .collect();
    let labels: Vec<f64> = training
        .iter()
        .map(|example| if example.defaulted { 1.0 } else { 0.0 })
        .collect();

    let (coefficients, intercept) = fit_logistic(&encoded, &labels, options);
    let classifier = Classifier::Logistic {
        coefficients,
        intercept,
    };
    let margins: Vec<f64> = encoded.iter().map(|row| classifier.margin(row)).collect();
    let calibration = match options.calibration {
        CalibrationMethod::Sigmoid => fit_platt(&margins, &labels),
        CalibrationMethod::Isotonic => fit_isotonic(&margins, &labels),
    };

    let mut artifact = ModelArtifact {
        version: options.version.clone(),
        preprocessor,
        classifier,
        calibration,
        metrics: None,
    };
    let model = CalibratedModel::new(artifact.clone())?;

    let evaluation_set = if holdout.is_empty() {
        &training
    } else {
        &holdout
    };
    let metrics = holdout_metrics(&model, evaluation_set, training.len(), holdout.len(), options)?;
    info!(
        version = %options.version,
        auc = metrics.auc,
        accuracy = metrics.accuracy,
        training_rows = metrics.training_rows,
        holdout_rows = metrics.holdout_rows,
        "credit model trained"
    );
    artifact.metrics = Some(metrics);
    Ok(artifact)
}

fn fit_preprocessor(training: &[Example]) -> Preprocessor {
    let count = training.len() as f64;
    let numeric = NUMERIC_FEATURES
        .iter()
        .map(|feature| {
            let values: Vec<f64> = training
                .iter()
                .map(|example| example.features.numeric(*feature))
                .collect();
            let mean = values.iter().sum::<f64>() / count;
            let variance = values.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / count;
            let scale = variance.sqrt();
            NumericColumn {
                feature: *feature,
                mean,
                scale: if scale > f64::EPSILON { scale } else { 1.0 },
            }
        })
        .collect();

    let categorical = CATEGORICAL_FEATURES
        .iter()
        .map(|feature| {
            let categories: BTreeSet<String> = training
                .iter()
                .map(|example| example.features.categorical(*feature).to_string())
                .collect();
            CategoricalColumn {
                feature: *feature,
                categories: categories.into_iter().collect(),
            }
        })
        .collect();

    Preprocessor {
        numeric,
        categorical,
    }
}

/// Full-batch gradient descent on L2-regularised log loss.
fn fit_logistic(rows: &[Vec<f64>], labels: &[f64], options: &TrainingOptions) -> (Vec<f64>, f64) {
    let width = rows.first().map_or(0, Vec::len);
    let count = rows.len() as f64;
    let mut weights = vec![0.0; width];
    let mut intercept = 0.0;

    for _ in 0..options.epochs {
        let mut gradient = vec![0.0; width];
        let mut intercept_gradient = 0.0;
        for (row, label) in rows.iter().zip(labels) {
            let margin = intercept
                + weights
                    .iter()
                    .zip(row)
                    .map(|(weight, value)| weight * value)
                    .sum::<f64>();
            let error = logistic(margin) - label;
            for (slot, value) in gradient.iter_mut().zip(row) {
                *slot += error * value;
            }
            intercept_gradient += error;
        }
        for (weight, slot) in weights.iter_mut().zip(&gradient) {
            *weight -= options.learning_rate * (slot / count + options.l2 * *weight);
        }
        intercept -= options.learning_rate * intercept_gradient / count;
    }

    (weights, intercept)
}

/// Platt scaling fitted by gradient descent, starting from the identity link.
fn fit_platt(margins: &[f64], labels: &[f64]) -> Calibration {
    let count = margins.len() as f64;
    let mut a = -1.0;
    let mut b = 0.0;
    for _ in 0..PLATT_STEPS {
        let mut grad_a = 0.0;
        let mut grad_b = 0.0;
        for (margin, label) in margins.iter().zip(labels) {
            let probability = 1.0 / (1.0 + (a * margin + b).exp());
            let residual = label - probability;
            grad_a += residual * margin;
            grad_b += residual;
        }
        a -= PLATT_LEARNING_RATE * grad_a / count;
        b -= PLATT_LEARNING_RATE * grad_b / count;
    }
    Calibration::Sigmoid { a, b }
}

/// Pool-adjacent-violators fit of the label rate against the raw logistic probability.
pub(crate) fn fit_isotonic(margins: &[f64], labels: &[f64]) -> Calibration {
    let mut points: Vec<(f64, f64)> = margins
        .iter()
        .map(|margin| logistic(*margin))
        .zip(labels.iter().copied())
        .collect();
    points.sort_by(|a, b| a.0.total_cmp(&b.0));

    // (label sum, weight, lowest probability, highest probability)
    let mut blocks: Vec<(f64, f64, f64, f64)> = Vec::with_capacity(points.len());
    for (probability, label) in points {
        let mut block = (label, 1.0, probability, probability);
        while let Some(previous) = blocks.last().copied() {
            let tied = previous.3 == block.2;
            if !tied && previous.0 / previous.1 < block.0 / block.1 {
                break;
            }
            blocks.pop();
            block = (
                previous.0 + block.0,
                previous.1 + block.1,
                previous.2,
                block.3,
            );
        }
        blocks.push(block);
    }

    let mut thresholds = Vec::with_capacity(blocks.len() * 2);
    let mut values = Vec::with_capacity(blocks.len() * 2);
    for (sum, weight, low, high) in blocks {
        let rate = sum / weight;
        thresholds.push(low);
        values.push(rate);
        if high > low {
            thresholds.push(high);
            values.push(rate);
        }
    }
    Calibration::Isotonic { thresholds, values }
}

fn holdout_metrics(
    model: &CalibratedModel,
    examples: &[Example],
    training_rows: usize,
    holdout_rows: usize,
    options: &TrainingOptions,
) -> Result<TrainingMetrics, TrainingError> {
    let mut scored = Vec::with_capacity(examples.len());
    for example in examples {
        scored.push((model.predict(&example.features)?, example.defaulted));
    }

    let correct = scored
        .iter()
        .filter(|(probability, defaulted)| (*probability >= 0.5) == *defaulted)
        .count();
    let accuracy = correct as f64 / scored.len().max(1) as f64;

    let mut approvals: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for (example, (probability, _)) in examples.iter().zip(&scored) {
        let entry = approvals
            .entry(example.features.business_type.label().to_string())
            .or_default();
        entry.1 += 1;
        if *probability < options.policy.approve_below {
            entry.0 += 1;
        }
    }
    let fairness_approval_rates = approvals
        .into_iter()
        .map(|(business_type, (approved, total))| {
            (business_type, approved as f64 / total as f64)
        })
        .collect();

    Ok(TrainingMetrics {
        auc: roc_auc(&scored),
        accuracy,
        training_rows,
        holdout_rows,
        fairness_approval_rates,
        feature_names: model.artifact().preprocessor.column_names(),
    })
}

/// Mann-Whitney AUC with tied scores sharing their average rank. 0.5 when only one class is present.
pub(crate) fn roc_auc(scored: &[(f64, bool)]) -> f64 {
    let positives = scored.iter().filter(|(_, positive)| *positive).count();
    let negatives = scored.len() - positives;
    if positives == 0 || negatives == 0 {
        return 0.5;
    }

    let mut ordered: Vec<&(f64, bool)> = scored.iter().collect();
    ordered.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut positive_rank_sum = 0.0;
    let mut start = 0;
    while start < ordered.len() {
        let mut end = start;
        while end + 1 < ordered.len() && ordered[end + 1].0 == ordered[start].0 {
            end += 1;
        }
        // ranks are 1-based
        let average_rank = (start + end) as f64 / 2.0 + 1.0;
        positive_rank_sum += ordered[start..=end]
            .iter()
            .filter(|(_, positive)| *positive)
            .count() as f64
            * average_rank;
        start = end + 1;
    }

    let positives = positives as f64;
    let negatives = negatives as f64;
    (positive_rank_sum - positives * (positives + 1.0) / 2.0) / (positives * negatives)
}
