use serde::{Deserialize, Serialize};

use super::ModelError;

/// Raw classifier producing a log-odds margin for the default class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classifier {
    Logistic {
        coefficients: Vec<f64>,
        intercept: f64,
    },
    TreeEnsemble {
        #[serde(default)]
        base_margin: f64,
        trees: Vec<RegressionTree>,
    },
}

impl Classifier {
    pub(crate) fn validate(&self, width: usize) -> Result<(), ModelError> {
        match self {
            Classifier::Logistic { coefficients, .. } => {
                if coefficients.len() != width {
                    return Err(ModelError::ShapeMismatch {
                        expected: width,
                        found: coefficients.len(),
                    });
                }
                Ok(())
            }
            Classifier::TreeEnsemble { trees, .. } => trees
                .iter()
                .enumerate()
                .try_for_each(|(index, tree)| tree.validate(index, width)),
        }
    }

    pub fn margin(&self, encoded: &[f64]) -> f64 {
        match self {
            Classifier::Logistic {
                coefficients,
                intercept,
            } => {
                intercept
                    + coefficients
                        .iter()
                        .zip(encoded)
                        .map(|(weight, value)| weight * value)
                        .sum::<f64>()
            }
            Classifier::TreeEnsemble { base_margin, trees } => {
                base_margin + trees.iter().map(|tree| tree.leaf_value(encoded)).sum::<f64>()
            }
        }
    }

    /// Per-column weights for linear models; trees carry none.
    pub fn coefficients(&self) -> Option<&[f64]> {
        match self {
            Classifier::Logistic { coefficients, .. } => Some(coefficients),
            Classifier::TreeEnsemble { .. } => None,
        }
    }
}

/// Boosted regression tree stored as a flat node array rooted at index 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

impl RegressionTree {
    fn validate(&self, index: usize, width: usize) -> Result<(), ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::InvalidTree {
                tree: index,
                reason: "tree has no nodes".to_string(),
            });
        }
        for (position, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split {
                feature,
                left,
                right,
                ..
            } = node
            {
                if *feature >= width {
                    return Err(ModelError::InvalidTree {
                        tree: index,
                        reason: format!("node {position} splits on column {feature} of {width}"),
                    });
                }
                // children must point forward so traversal always terminates
                if *left <= position
                    || *right <= position
                    || *left >= self.nodes.len()
                    || *right >= self.nodes.len()
                {
                    return Err(ModelError::InvalidTree {
                        tree: index,
                        reason: format!("node {position} has out-of-order children"),
                    });
                }
            }
        }
        Ok(())
    }

    fn leaf_value(&self, encoded: &[f64]) -> f64 {
        let mut position = 0;
        loop {
            match self.nodes.get(position) {
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = encoded.get(*feature).copied().unwrap_or(0.0);
                    position = if value < *threshold { *left } else { *right };
                }
                Some(TreeNode::Leaf { value }) => return *value,
                None => return 0.0,
            }
        }
    }
}
