use serde::{Deserialize, Serialize};

use super::super::features::{CategoricalFeature, DerivedFeatures, NumericFeature};

/// Standard-scaler parameters for one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericColumn {
    pub feature: NumericFeature,
    pub mean: f64,
    pub scale: f64,
}

impl NumericColumn {
    fn transform(&self, value: f64) -> f64 {
        let scale = if self.scale.abs() > f64::EPSILON && self.scale.is_finite() {
            self.scale
        } else {
            1.0
        };
        (value - self.mean) / scale
    }
}

/// One-hot vocabulary for one categorical column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalColumn {
    pub feature: CategoricalFeature,
    pub categories: Vec<String>,
}

/// Column transformer: scaled numerics followed by one-hot blocks, in declaration order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Preprocessor {
    #[serde(default)]
    pub numeric: Vec<NumericColumn>,
    #[serde(default)]
    pub categorical: Vec<CategoricalColumn>,
}

impl Preprocessor {
    /// Width of the encoded vector.
    pub fn width(&self) -> usize {
        self.numeric.len()
            + self
                .categorical
                .iter()
                .map(|column| column.categories.len())
                .sum::<usize>()
    }

    /// Names of the encoded columns, e.g. `dscr` or `business_type=Trading`.
    pub fn column_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.width());
        for column in &self.numeric {
            names.push(feature_name(&column.feature));
        }
        for column in &self.categorical {
            let prefix = feature_name(&column.feature);
            for category in &column.categories {
                names.push(format!("{prefix}={category}"));
            }
        }
        names
    }

    /// Unknown categories encode as an all-zero block.
    pub fn encode(&self, features: &DerivedFeatures) -> Vec<f64> {
        let mut encoded = Vec::with_capacity(self.width());
        for column in &self.numeric {
            encoded.push(column.transform(features.numeric(column.feature)));
        }
        for column in &self.categorical {
            let value = features.categorical(column.feature);
            encoded.extend(
                column
                    .categories
                    .iter()
                    .map(|category| if category == value { 1.0 } else { 0.0 }),
            );
        }
        encoded
    }
}

fn feature_name<T: Serialize>(feature: &T) -> String {
    serde_json::to_value(feature)
        .ok()
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_default()
}
