//! Ratio and fallback derivation from raw application inputs.
//!
//! Everything here is a pure function of the submission. Missing optional
//! inputs and zero denominators resolve to fixed constants instead of errors.

use serde::{Deserialize, Serialize};

use super::domain::{ApplicationSubmission, BusinessType, RepaymentHistory};

/// Share of revenue assumed to be reported as GST turnover.
pub const GST_TURNOVER_SHARE: f64 = 0.9;
pub const DEFAULT_EBITDA_MARGIN: f64 = 0.12;
pub const DEFAULT_NET_MARGIN: f64 = 0.05;
/// Nominal annual rate used to amortize the requested loan.
pub const ASSUMED_ANNUAL_RATE: f64 = 0.15;
/// Months over which outstanding debt is spread when no EMI is declared.
pub const EXISTING_DEBT_SPREAD_MONTHS: f64 = 48.0;
/// Coverage reported when there are no monthly obligations at all.
pub const UNCONSTRAINED_COVERAGE: f64 = 2.0;
/// Bound on headline ratios so stored evaluations stay valid JSON numbers.
pub const REPORTED_RATIO_LIMIT: f64 = 1e9;

/// Numeric model inputs, addressable by name from a model artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericFeature {
    YearsInOperation,
    PromoterCreditScore,
    PromoterExpYears,
    PriorDefault,
    AnnualRevenue,
    GstTurnover,
    EbitdaMargin,
    NetMargin,
    TotalDebt,
    ExistingEmi,
    LoanAmountRequested,
    LoanTenureMonths,
    ProposedEmi,
    Dscr,
    CollateralValue,
    LoanToRevenue,
    CollateralCoverage,
    CashflowAdequacy,
    DebtToIncomeRatio,
}

/// Categorical model inputs, one-hot encoded by the preprocessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalFeature {
    BusinessType,
    LoanPurpose,
    CollateralType,
    RepaymentHistory,
}

/// Feature record produced for one application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedFeatures {
    pub years_in_operation: f64,
    pub promoter_credit_score: f64,
    pub promoter_exp_years: f64,
    pub prior_default: f64,
    pub annual_revenue: f64,
    pub gst_turnover: f64,
    pub ebitda_margin: f64,
    pub net_margin: f64,
    pub total_debt: f64,
    pub existing_emi: f64,
    pub loan_amount_requested: f64,
    pub loan_tenure_months: f64,
    pub proposed_emi: f64,
    pub dscr: f64,
    pub collateral_value: f64,
    pub loan_to_revenue: f64,
    pub collateral_coverage: f64,
    pub cashflow_adequacy: f64,
    pub debt_to_income_ratio: f64,
    pub business_type: BusinessType,
    pub loan_purpose: String,
    pub collateral_type: String,
    pub repayment_history: RepaymentHistory,
}

impl DerivedFeatures {
    pub fn numeric(&self, feature: NumericFeature) -> f64 {
        match feature {
            NumericFeature::YearsInOperation => self.years_in_operation,
            NumericFeature::PromoterCreditScore => self.promoter_credit_score,
            NumericFeature::PromoterExpYears => self.promoter_exp_years,
            NumericFeature::PriorDefault => self.prior_default,
            NumericFeature::AnnualRevenue => self.annual_revenue,
            NumericFeature::GstTurnover => self.gst_turnover,
            NumericFeature::EbitdaMargin => self.ebitda_margin,
            NumericFeature::NetMargin => self.net_margin,
            NumericFeature::TotalDebt => self.total_debt,
            NumericFeature::ExistingEmi => self.existing_emi,
            NumericFeature::LoanAmountRequested => self.loan_amount_requested,
            NumericFeature::LoanTenureMonths => self.loan_tenure_months,
            NumericFeature::ProposedEmi => self.proposed_emi,
            NumericFeature::Dscr => self.dscr,
            NumericFeature::CollateralValue => self.collateral_value,
            NumericFeature::LoanToRevenue => self.loan_to_revenue,
            NumericFeature::CollateralCoverage => self.collateral_coverage,
            NumericFeature::CashflowAdequacy => self.cashflow_adequacy,
            NumericFeature::DebtToIncomeRatio => self.debt_to_income_ratio,
        }
    }

    pub fn categorical(&self, feature: CategoricalFeature) -> &str {
        match feature {
            CategoricalFeature::BusinessType => self.business_type.label(),
            CategoricalFeature::LoanPurpose => &self.loan_purpose,
            CategoricalFeature::CollateralType => &self.collateral_type,
            CategoricalFeature::RepaymentHistory => self.repayment_history.label(),
        }
    }

    pub fn key_ratios(&self) -> KeyRatios {
        KeyRatios {
            loan_to_revenue: bounded(self.loan_to_revenue),
            dscr: bounded(self.dscr),
            collateral_coverage: bounded(self.collateral_coverage),
            cashflow_adequacy: bounded(self.cashflow_adequacy),
        }
    }
}

/// Headline ratios surfaced alongside an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyRatios {
    pub loan_to_revenue: f64,
    pub dscr: f64,
    pub collateral_coverage: f64,
    pub cashflow_adequacy: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureDeriver;

impl FeatureDeriver {
    pub fn derive(&self, submission: &ApplicationSubmission) -> DerivedFeatures {
        let annual_revenue = submission.annual_revenue;
        let loan_amount = submission.loan_amount_requested;
        let tenure = submission.loan_tenure_months;

        let gst_turnover = submission
            .gst_turnover
            .filter(|turnover| *turnover > 0.0)
            .unwrap_or(annual_revenue * GST_TURNOVER_SHARE);
        let ebitda_margin = submission.ebitda_margin.unwrap_or(DEFAULT_EBITDA_MARGIN);
        let net_margin = submission.net_margin.unwrap_or(DEFAULT_NET_MARGIN);

        let proposed_emi = amortized_payment(loan_amount, ASSUMED_ANNUAL_RATE, tenure);
        let existing_emi = submission
            .existing_emi
            .filter(|emi| *emi > 0.0)
            .unwrap_or(submission.total_debt / EXISTING_DEBT_SPREAD_MONTHS);
        let monthly_obligation = existing_emi + proposed_emi;

        let monthly_ebitda = annual_revenue * ebitda_margin / 12.0;
        let dscr = coverage(monthly_ebitda, monthly_obligation);
        let cashflow_adequacy = coverage(submission.monthly_cashflow, monthly_obligation);

        let loan_to_revenue = ratio_or_zero(loan_amount, annual_revenue);
        let collateral_coverage = ratio_or_zero(submission.collateral_value, loan_amount);

        let promoter_credit_score = submission
            .promoter_credit_score
            .unwrap_or(submission.credit_score);
        let promoter_exp_years = submission
            .promoter_exp_years
            .unwrap_or_else(|| submission.years_in_operation.max(1));
        let prior_default = match submission.repayment_history {
            RepaymentHistory::Poor => 1.0,
            RepaymentHistory::Good | RepaymentHistory::Average => 0.0,
        };

        DerivedFeatures {
            years_in_operation: submission.years_in_operation as f64,
            promoter_credit_score: promoter_credit_score as f64,
            promoter_exp_years: promoter_exp_years as f64,
            prior_default,
            annual_revenue,
            gst_turnover,
            ebitda_margin,
            net_margin,
            total_debt: submission.total_debt,
            existing_emi,
            loan_amount_requested: loan_amount,
            loan_tenure_months: tenure as f64,
            proposed_emi,
            dscr,
            collateral_value: submission.collateral_value,
            loan_to_revenue,
            collateral_coverage,
            cashflow_adequacy,
            debt_to_income_ratio: submission.debt_to_income_ratio,
            business_type: submission.business_type,
            loan_purpose: submission.loan_purpose.clone(),
            collateral_type: submission.collateral_type.clone(),
            repayment_history: submission.repayment_history,
        }
    }
}

/// Level monthly installment for `principal` over `months` at a nominal annual rate.
pub fn amortized_payment(principal: f64, annual_rate: f64, months: u32) -> f64 {
    if months == 0 || principal <= 0.0 {
        return 0.0;
    }

    let monthly_rate = annual_rate / 12.0;
    if monthly_rate <= 0.0 {
        return principal / months as f64;
    }

    let periods = i32::try_from(months).unwrap_or(i32::MAX);
    let growth = (1.0 + monthly_rate).powi(periods);
    if !growth.is_finite() {
        // interest-only in the limit
        return principal * monthly_rate;
    }
    principal * monthly_rate * growth / (growth - 1.0)
}

fn coverage(available: f64, obligation: f64) -> f64 {
    if obligation > 0.0 {
        available / obligation
    } else {
        UNCONSTRAINED_COVERAGE
    }
}

fn bounded(ratio: f64) -> f64 {
    if ratio.is_nan() {
        0.0
    } else {
        ratio.clamp(-REPORTED_RATIO_LIMIT, REPORTED_RATIO_LIMIT)
    }
}

fn ratio_or_zero(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}
