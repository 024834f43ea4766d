//! Pre-trained default-probability model and its artifact format.
//!
//! Artifacts are JSON documents produced offline (see `credit::training`).
//! A baseline artifact is compiled into the crate so the service can score
//! without any files on disk.

mod calibration;
mod classifier;
mod preprocess;

pub use calibration::{logistic, Calibration};
pub use classifier::{Classifier, RegressionTree, TreeNode};
pub use preprocess::{CategoricalColumn, NumericColumn, Preprocessor};

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::features::DerivedFeatures;
use crate::config::ScoringConfig;

const BASELINE_ARTIFACT: &str = include_str!("../../../assets/baseline_model.json");

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("unable to read model artifact {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed model artifact: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("classifier expects {expected} inputs but artifact declares {found}")]
    ShapeMismatch { expected: usize, found: usize },
    #[error("tree {tree} is invalid: {reason}")]
    InvalidTree { tree: usize, reason: String },
    #[error("invalid calibration: {0}")]
    InvalidCalibration(String),
    #[error("model produced a non-finite margin or probability")]
    NonFinite,
}

/// Offline evaluation figures recorded next to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub auc: f64,
    pub accuracy: f64,
    pub training_rows: usize,
    pub holdout_rows: usize,
    /// Approval rate per business type at the approve threshold.
    #[serde(default)]
    pub fairness_approval_rates: BTreeMap<String, f64>,
    #[serde(default)]
    pub feature_names: Vec<String>,
}

/// Serialized model: preprocessing, classifier, and calibration in one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub version: String,
    pub preprocessor: Preprocessor,
    pub classifier: Classifier,
    #[serde(default)]
    pub calibration: Calibration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<TrainingMetrics>,
}

impl ModelArtifact {
    pub fn baseline() -> Result<Self, ModelError> {
        Self::from_json(BASELINE_ARTIFACT)
    }

    pub fn from_json(raw: &str) -> Result<Self, ModelError> {
        let artifact: ModelArtifact = serde_json::from_str(raw)?;
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let artifact: ModelArtifact = serde_json::from_reader(BufReader::new(file))?;
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        self.classifier.validate(self.preprocessor.width())?;
        self.calibration.validate()
    }
}

/// Seam between the evaluation engine and whatever produces default probabilities.
pub trait ProbabilityModel: Send + Sync {
    fn version(&self) -> &str;
    fn predict(&self, features: &DerivedFeatures) -> Result<f64, ModelError>;
    fn metrics(&self) -> Option<&TrainingMetrics> {
        None
    }
}

/// Artifact-backed model: encode, score, calibrate.
#[derive(Debug, Clone)]
pub struct CalibratedModel {
    artifact: ModelArtifact,
}

impl CalibratedModel {
    pub fn new(artifact: ModelArtifact) -> Result<Self, ModelError> {
        artifact.validate()?;
        Ok(Self { artifact })
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }
}

impl ProbabilityModel for CalibratedModel {
    fn version(&self) -> &str {
        &self.artifact.version
    }

    fn predict(&self, features: &DerivedFeatures) -> Result<f64, ModelError> {
        let encoded = self.artifact.preprocessor.encode(features);
        let margin = self.artifact.classifier.margin(&encoded);
        if !margin.is_finite() {
            return Err(ModelError::NonFinite);
        }
        let probability = self.artifact.calibration.probability(margin);
        if !probability.is_finite() {
            return Err(ModelError::NonFinite);
        }
        Ok(probability.clamp(0.0, 1.0))
    }

    fn metrics(&self) -> Option<&TrainingMetrics> {
        self.artifact.metrics.as_ref()
    }
}

/// Holds the loaded model, or nothing when loading failed.
#[derive(Clone, Default)]
pub struct Scorer {
    model: Option<Arc<dyn ProbabilityModel>>,
}

impl std::fmt::Debug for Scorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scorer")
            .field("model_version", &self.model_version())
            .finish()
    }
}

impl Scorer {
    pub fn new(model: Arc<dyn ProbabilityModel>) -> Self {
        Self { model: Some(model) }
    }

    /// Scorer without a model; every evaluation takes the fallback path.
    pub fn unloaded() -> Self {
        Self { model: None }
    }

    /// Load the configured artifact, or the baseline when no path is set.
    /// Load failures are logged and leave the scorer unloaded.
    pub fn from_config(config: &ScoringConfig) -> Self {
        let loaded = match &config.model_path {
            Some(path) => ModelArtifact::from_path(path),
            None => ModelArtifact::baseline(),
        }
        .and_then(CalibratedModel::new);

        match loaded {
            Ok(model) => {
                info!(
                    model_version = model.version(),
                    source = ?config.model_path,
                    "credit model loaded"
                );
                Self::new(Arc::new(model))
            }
            Err(err) => {
                warn!(error = %err, source = ?config.model_path, "credit model unavailable; using fallback outcome");
                Self::unloaded()
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn model_version(&self) -> Option<&str> {
        self.model.as_deref().map(|model| model.version())
    }

    pub fn metrics(&self) -> Option<&TrainingMetrics> {
        self.model.as_deref().and_then(|model| model.metrics())
    }

    pub(crate) fn model(&self) -> Option<&dyn ProbabilityModel> {
        self.model.as_deref()
    }
}
