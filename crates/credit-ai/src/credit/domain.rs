use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::evaluation::EvaluationOutcome;

pub const DEFAULT_LOAN_TENURE_MONTHS: u32 = 36;
pub const DEFAULT_LOAN_PURPOSE: &str = "Working Capital";
pub const DEFAULT_COLLATERAL_TYPE: &str = "None";

/// Row identifier assigned by the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub u64);

impl ApplicationId {
    /// Human-facing reference, e.g. `APP000042`.
    pub fn applicant_reference(self) -> String {
        format!("APP{:06}", self.0)
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvaluationId(pub u64);

impl fmt::Display for EvaluationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BusinessType {
    Manufacturing,
    Trading,
    Services,
}

impl BusinessType {
    pub const fn label(self) -> &'static str {
        match self {
            BusinessType::Manufacturing => "Manufacturing",
            BusinessType::Trading => "Trading",
            BusinessType::Services => "Services",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RepaymentHistory {
    Good,
    Average,
    Poor,
}

impl RepaymentHistory {
    pub const fn label(self) -> &'static str {
        match self {
            RepaymentHistory::Good => "Good",
            RepaymentHistory::Average => "Average",
            RepaymentHistory::Poor => "Poor",
        }
    }
}

/// Loan application as submitted by the applicant.
///
/// The optional block mirrors the extended underwriting form; the feature
/// deriver substitutes fallback constants for anything left out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationSubmission {
    pub business_type: BusinessType,
    pub years_in_operation: u32,
    pub annual_revenue: f64,
    pub monthly_cashflow: f64,
    pub loan_amount_requested: f64,
    pub credit_score: u16,
    pub existing_loans: u32,
    pub debt_to_income_ratio: f64,
    pub collateral_value: f64,
    pub repayment_history: RepaymentHistory,

    #[serde(default)]
    pub gst_turnover: Option<f64>,
    #[serde(default)]
    pub ebitda_margin: Option<f64>,
    #[serde(default)]
    pub net_margin: Option<f64>,
    #[serde(default = "default_tenure")]
    pub loan_tenure_months: u32,
    #[serde(default = "default_loan_purpose")]
    pub loan_purpose: String,
    #[serde(default)]
    pub promoter_credit_score: Option<u16>,
    #[serde(default)]
    pub promoter_exp_years: Option<u32>,
    #[serde(default = "default_collateral_type")]
    pub collateral_type: String,
    #[serde(default)]
    pub total_debt: f64,
    #[serde(default)]
    pub existing_emi: Option<f64>,
}

fn default_tenure() -> u32 {
    DEFAULT_LOAN_TENURE_MONTHS
}

fn default_loan_purpose() -> String {
    DEFAULT_LOAN_PURPOSE.to_string()
}

fn default_collateral_type() -> String {
    DEFAULT_COLLATERAL_TYPE.to_string()
}

/// Lifecycle of an application. Transitions only ever go forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Evaluated,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Evaluated => "evaluated",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "evaluated" => Some(Self::Evaluated),
            _ => None,
        }
    }
}

/// Stored application row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: ApplicationId,
    pub applicant_id: String,
    #[serde(flatten)]
    pub submission: ApplicationSubmission,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored evaluation row; exactly one per evaluated application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub id: EvaluationId,
    pub application_id: ApplicationId,
    #[serde(flatten)]
    pub outcome: EvaluationOutcome,
    pub evaluated_at: DateTime<Utc>,
}
