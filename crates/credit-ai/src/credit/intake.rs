use super::domain::ApplicationSubmission;

const MAX_YEARS_IN_OPERATION: u32 = 100;
const MIN_CREDIT_SCORE: u16 = 300;
const MAX_CREDIT_SCORE: u16 = 900;

/// Validation errors raised while accepting a submission.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },
    #[error("{field} must be greater than zero (found {found})")]
    NotPositive { field: &'static str, found: f64 },
    #[error("{field} must not be negative (found {found})")]
    Negative { field: &'static str, found: f64 },
    #[error("{field} must be between {min} and {max} (found {found})")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        found: f64,
    },
}

impl ValidationError {
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::NotFinite { field }
            | ValidationError::NotPositive { field, .. }
            | ValidationError::Negative { field, .. }
            | ValidationError::OutOfRange { field, .. } => field,
        }
    }
}

/// Gatekeeper applied before a submission is stored or scored.
#[derive(Debug, Clone, Default)]
pub struct IntakeGuard;

impl IntakeGuard {
    pub fn validate(&self, submission: &ApplicationSubmission) -> Result<(), ValidationError> {
        within(
            "years_in_operation",
            submission.years_in_operation as f64,
            0.0,
            MAX_YEARS_IN_OPERATION as f64,
        )?;
        positive("annual_revenue", submission.annual_revenue)?;
        finite("monthly_cashflow", submission.monthly_cashflow)?;
        positive("loan_amount_requested", submission.loan_amount_requested)?;
        credit_score("credit_score", submission.credit_score)?;
        non_negative("debt_to_income_ratio", submission.debt_to_income_ratio)?;
        non_negative("collateral_value", submission.collateral_value)?;
        non_negative("total_debt", submission.total_debt)?;

        if let Some(turnover) = submission.gst_turnover {
            non_negative("gst_turnover", turnover)?;
        }
        if let Some(emi) = submission.existing_emi {
            non_negative("existing_emi", emi)?;
        }
        if let Some(margin) = submission.ebitda_margin {
            within("ebitda_margin", margin, -1.0, 1.0)?;
        }
        if let Some(margin) = submission.net_margin {
            within("net_margin", margin, -1.0, 1.0)?;
        }
        if let Some(score) = submission.promoter_credit_score {
            credit_score("promoter_credit_score", score)?;
        }

        Ok(())
    }
}

fn finite(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NotFinite { field })
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ValidationError> {
    finite(field, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::NotPositive {
            field,
            found: value,
        })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    finite(field, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(ValidationError::Negative {
            field,
            found: value,
        })
    }
}

fn within(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ValidationError> {
    finite(field, value)?;
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field,
            min,
            max,
            found: value,
        })
    }
}

fn credit_score(field: &'static str, score: u16) -> Result<(), ValidationError> {
    within(
        field,
        score as f64,
        MIN_CREDIT_SCORE as f64,
        MAX_CREDIT_SCORE as f64,
    )
}
