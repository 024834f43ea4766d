use std::sync::Arc;

use super::common::*;
use crate::credit::evaluation::{DecisionPolicy, EvaluationEngine};
use crate::credit::model::{
    logistic, Calibration, CalibratedModel, Classifier, ModelArtifact, Scorer,
};
use crate::credit::training::{
    fit_isotonic, roc_auc, train_from_reader, CalibrationMethod, TrainingError, TrainingOptions,
};

const HEADER: &str = "business_type,years_in_operation,annual_revenue,monthly_cashflow,\
loan_amount_requested,credit_score,existing_loans,debt_to_income_ratio,collateral_value,\
repayment_history,default_flag";

/// Labelled history where defaults track low scores, thin collateral, and poor repayment.
fn separable_history(rows: usize) -> String {
    let business_types = ["Manufacturing", "Trading", "Services"];
    let mut csv = String::from(HEADER);
    csv.push('\n');
    for index in 0..rows {
        let business_type = business_types[index % business_types.len()];
        let jitter = (index % 7) as f64;
        let line = if index % 2 == 1 {
            format!(
                "{business_type},{},{},{},1500000,{},3,0.8,{},Poor,1",
                1 + index % 3,
                900_000.0 + jitter * 10_000.0,
                15_000.0 + jitter * 1_000.0,
                560 + (index % 7) * 5,
                150_000.0 + jitter * 5_000.0,
            )
        } else {
            format!(
                "{business_type},{},{},{},1500000,{},1,0.2,{},Good,0",
                8 + index % 5,
                6_000_000.0 + jitter * 100_000.0,
                350_000.0 + jitter * 5_000.0,
                760 + (index % 7) * 5,
                2_500_000.0 + jitter * 50_000.0,
            )
        };
        csv.push_str(&line);
        csv.push('\n');
    }
    csv
}

#[test]
fn trains_calibrated_logistic_model_with_holdout_metrics() {
    let options = TrainingOptions::default();
    let artifact =
        train_from_reader(separable_history(60).as_bytes(), &options).expect("model trains");

    assert_eq!(artifact.version, "v3-logistic-platt");
    assert!(matches!(artifact.classifier, Classifier::Logistic { .. }));

    let metrics = artifact.metrics.as_ref().expect("metrics attached");
    assert_eq!(metrics.training_rows, 48);
    assert_eq!(metrics.holdout_rows, 12);
    assert!(metrics.auc >= 0.9, "auc was {}", metrics.auc);
    assert!(metrics.accuracy >= 0.9, "accuracy was {}", metrics.accuracy);
    assert_eq!(metrics.feature_names.len(), artifact.preprocessor.width());
    assert!(metrics
        .feature_names
        .contains(&"business_type=Trading".to_string()));
    assert!(!metrics.fairness_approval_rates.is_empty());
    assert!(metrics
        .fairness_approval_rates
        .values()
        .all(|rate| (0.0..=1.0).contains(rate)));
}

#[test]
fn trained_artifact_ranks_applicants_by_risk() {
    let artifact = train_from_reader(
        separable_history(60).as_bytes(),
        &TrainingOptions {
            version: "ranking-test".to_string(),
            ..TrainingOptions::default()
        },
    )
    .expect("model trains");
    let model = CalibratedModel::new(artifact).expect("trained artifact validates");
    let engine = EvaluationEngine::new(Scorer::new(Arc::new(model)), DecisionPolicy::default());

    let strong = engine.evaluate(&strong_submission());
    let weak = engine.evaluate(&weak_submission());

    assert_eq!(strong.model_version, "ranking-test");
    assert!(weak.default_probability > strong.default_probability);
    assert!(engine.model_metrics().is_some());
}

#[test]
fn isotonic_training_produces_monotone_calibration() {
    let options = TrainingOptions {
        version: CalibrationMethod::Isotonic.default_version().to_string(),
        calibration: CalibrationMethod::Isotonic,
        ..TrainingOptions::default()
    };
    let artifact =
        train_from_reader(separable_history(60).as_bytes(), &options).expect("model trains");

    assert_eq!(artifact.version, "v3-logistic-isotonic");
    let Calibration::Isotonic { thresholds, values } = &artifact.calibration else {
        panic!("expected isotonic calibration, got {:?}", artifact.calibration);
    };
    assert!(!thresholds.is_empty());
    assert_eq!(thresholds.len(), values.len());
    assert!(thresholds.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(values.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(values.iter().all(|value| (0.0..=1.0).contains(value)));

    let raw = serde_json::to_string(&artifact).expect("artifact serializes");
    let restored = ModelArtifact::from_json(&raw).expect("artifact parses");
    assert!(matches!(restored.calibration, Calibration::Isotonic { .. }));
    assert!(restored.metrics.is_some());
}

#[test]
fn isotonic_fit_pools_adjacent_violators() {
    let margins = [-2.0, -1.0, 0.0, 1.0, 2.0];
    let labels = [0.0, 1.0, 0.0, 1.0, 1.0];

    let Calibration::Isotonic { thresholds, values } = fit_isotonic(&margins, &labels) else {
        panic!("expected isotonic calibration");
    };

    let expected_thresholds: Vec<f64> = margins.iter().map(|margin| logistic(*margin)).collect();
    assert_eq!(thresholds, expected_thresholds);
    assert_eq!(values, vec![0.0, 0.5, 0.5, 1.0, 1.0]);
}

#[test]
fn rows_failing_intake_are_reported_by_position() {
    let history = format!(
        "{}Services,3,2000000,90000,500000,0,0,0.2,400000,Good,0\n",
        separable_history(20)
    );

    let result = train_from_reader(history.as_bytes(), &TrainingOptions::default());

    assert!(matches!(
        result,
        Err(TrainingError::InvalidRow { row: 21, ref source }) if source.field() == "credit_score"
    ));
}

#[test]
fn non_finite_rows_are_rejected_before_fitting() {
    let history = format!(
        "{}Services,3,NaN,90000,500000,700,0,0.2,400000,Good,0\n",
        separable_history(12)
    );

    let result = train_from_reader(history.as_bytes(), &TrainingOptions::default());

    assert!(matches!(
        result,
        Err(TrainingError::InvalidRow { row: 13, ref source }) if source.field() == "annual_revenue"
    ));
}

#[test]
fn too_few_rows_are_rejected() {
    let result = train_from_reader(separable_history(6).as_bytes(), &TrainingOptions::default());

    assert!(matches!(
        result,
        Err(TrainingError::TooFewRows {
            found: 6,
            required: 10
        })
    ));
}

#[test]
fn single_outcome_history_is_rejected() {
    let history: String = separable_history(30)
        .lines()
        .filter(|line| !line.ends_with(",1"))
        .map(|line| format!("{line}\n"))
        .collect();

    let result = train_from_reader(history.as_bytes(), &TrainingOptions::default());

    assert!(matches!(result, Err(TrainingError::SingleClass)));
}

#[test]
fn malformed_rows_surface_csv_errors() {
    let history = format!("{HEADER}\nManufacturing,ten,1,1,1,700,0,0.1,1,Good,0\n");

    let result = train_from_reader(history.as_bytes(), &TrainingOptions::default());

    assert!(matches!(result, Err(TrainingError::Csv(_))));
}

#[test]
fn roc_auc_handles_ordering_and_ties() {
    let perfect = [(0.1, false), (0.2, false), (0.8, true), (0.9, true)];
    let inverted = [(0.9, false), (0.8, false), (0.2, true), (0.1, true)];
    let tied = [(0.5, false), (0.5, true), (0.5, false), (0.5, true)];
    let one_class = [(0.3, true), (0.7, true)];

    assert_eq!(roc_auc(&perfect), 1.0);
    assert_eq!(roc_auc(&inverted), 0.0);
    assert_eq!(roc_auc(&tied), 0.5);
    assert_eq!(roc_auc(&one_class), 0.5);
}
