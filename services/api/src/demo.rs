use crate::infra::{credit_service, evaluation_engine};
use clap::{Args, ValueEnum};
use credit_ai::config::AppConfig;
use credit_ai::credit::{
    train_from_reader, ApplicationSubmission, BusinessType, CalibrationMethod, DecisionPolicy,
    IntakeGuard, RepaymentHistory, TrainingOptions,
};
use credit_ai::error::AppError;
use credit_ai::telemetry;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Application JSON file in the intake schema
    #[arg(long)]
    pub(crate) input: PathBuf,
}

#[derive(Args, Debug)]
pub(crate) struct TrainArgs {
    /// Labelled CSV history with a `default_flag` column
    #[arg(long)]
    pub(crate) data: PathBuf,
    /// Destination for the model artifact JSON
    #[arg(long)]
    pub(crate) out: PathBuf,
    /// Version string recorded in the artifact
    #[arg(long)]
    pub(crate) version: Option<String>,
    /// Gradient-descent passes over the training split
    #[arg(long)]
    pub(crate) epochs: Option<usize>,
    /// Probability calibration fitted after the classifier
    #[arg(long, value_enum, default_value_t = CalibrationArg::Sigmoid)]
    pub(crate) calibration: CalibrationArg,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CalibrationArg {
    Sigmoid,
    Isotonic,
}

impl From<CalibrationArg> for CalibrationMethod {
    fn from(value: CalibrationArg) -> Self {
        match value {
            CalibrationArg::Sigmoid => CalibrationMethod::Sigmoid,
            CalibrationArg::Isotonic => CalibrationMethod::Isotonic,
        }
    }
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Score with this artifact instead of the configured one.
    #[arg(long)]
    pub(crate) model: Option<PathBuf>,
}

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let raw = std::fs::read_to_string(&args.input)?;
    let submission: ApplicationSubmission = serde_json::from_str(&raw)?;
    IntakeGuard.validate(&submission)?;

    let outcome = evaluation_engine(&config).evaluate(&submission);
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

pub(crate) fn run_train(args: TrainArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let calibration = CalibrationMethod::from(args.calibration);
    let mut options = TrainingOptions {
        version: args
            .version
            .unwrap_or_else(|| calibration.default_version().to_string()),
        calibration,
        policy: DecisionPolicy::from(&config.scoring),
        ..TrainingOptions::default()
    };
    if let Some(epochs) = args.epochs {
        options.epochs = epochs;
    }

    let file = File::open(&args.data)?;
    let artifact = train_from_reader(BufReader::new(file), &options)?;
    artifact.write_to(&args.out)?;

    println!(
        "Model {} ({:?} calibration) written to {}",
        artifact.version,
        calibration,
        args.out.display()
    );
    if let Some(metrics) = &artifact.metrics {
        println!(
            "- holdout AUC {:.3} | accuracy {:.1}% | {} training rows / {} holdout rows",
            metrics.auc,
            metrics.accuracy * 100.0,
            metrics.training_rows,
            metrics.holdout_rows
        );
        println!("Approval rate by business type:");
        for (business_type, rate) in &metrics.fairness_approval_rates {
            println!("  - {business_type}: {:.0}%", rate * 100.0);
        }
    }
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    if let Some(model) = args.model {
        config.scoring.model_path = Some(model);
    }

    let service = credit_service(&config);
    let status = service.model_status();
    println!("Credit evaluation demo");
    println!(
        "- model {} ({})",
        status.model_version,
        if status.model_loaded {
            "loaded"
        } else {
            "fallback outcome"
        }
    );
    println!(
        "- approve below {:.2} | reject above {:.2}",
        config.scoring.approve_below, config.scoring.reject_above
    );

    for (label, submission) in sample_applications() {
        println!("\n{label}");
        let record = match service.submit(submission) {
            Ok(record) => record,
            Err(err) => {
                println!("  Submission rejected: {err}");
                continue;
            }
        };
        println!(
            "- Received {} ({} | {} years | revenue {:.0})",
            record.applicant_id,
            record.submission.business_type.label(),
            record.submission.years_in_operation,
            record.submission.annual_revenue
        );

        let evaluation = match service.evaluate(record.id) {
            Ok(evaluation) => evaluation,
            Err(err) => {
                println!("  Evaluation unavailable: {err}");
                continue;
            }
        };
        let outcome = &evaluation.outcome;
        println!(
            "  Recommendation: {} | default probability {:.1}% | risk {:.1} | confidence {:.2}",
            outcome.recommendation.label(),
            outcome.default_probability * 100.0,
            outcome.risk_score,
            outcome.confidence_score
        );
        if let Some(ratios) = &outcome.key_ratios {
            println!(
                "  Ratios: DSCR {:.2} | loan/revenue {:.2} | collateral cover {:.2} | cashflow cover {:.2}",
                ratios.dscr,
                ratios.loan_to_revenue,
                ratios.collateral_coverage,
                ratios.cashflow_adequacy
            );
        }
        for insight in &outcome.feature_importance {
            println!(
                "    - {} ({:?}, weight {:.2}): {}",
                insight.feature, insight.impact, insight.importance, insight.reason
            );
        }
    }

    Ok(())
}

fn sample_applications() -> Vec<(&'static str, ApplicationSubmission)> {
    let established = ApplicationSubmission {
        business_type: BusinessType::Manufacturing,
        years_in_operation: 12,
        annual_revenue: 8_000_000.0,
        monthly_cashflow: 450_000.0,
        loan_amount_requested: 2_500_000.0,
        credit_score: 745,
        existing_loans: 1,
        debt_to_income_ratio: 0.25,
        collateral_value: 4_000_000.0,
        repayment_history: RepaymentHistory::Good,
        gst_turnover: None,
        ebitda_margin: None,
        net_margin: None,
        loan_tenure_months: 36,
        loan_purpose: "Expansion".to_string(),
        promoter_credit_score: None,
        promoter_exp_years: None,
        collateral_type: "Property".to_string(),
        total_debt: 0.0,
        existing_emi: None,
    };
    let growing = ApplicationSubmission {
        business_type: BusinessType::Services,
        years_in_operation: 5,
        annual_revenue: 3_000_000.0,
        monthly_cashflow: 100_000.0,
        loan_amount_requested: 1_000_000.0,
        credit_score: 660,
        debt_to_income_ratio: 0.3,
        collateral_value: 800_000.0,
        repayment_history: RepaymentHistory::Average,
        loan_purpose: "Working Capital".to_string(),
        collateral_type: "Receivables".to_string(),
        ..established.clone()
    };
    let stretched = ApplicationSubmission {
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
        collateral_type: "None".to_string(),
        total_debt: 480_000.0,
        ..established.clone()
    };

    vec![
        ("Established manufacturer", established),
        ("Growing services firm", growing),
        ("Stretched trader", stretched),
    ]
}
