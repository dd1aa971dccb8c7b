//! Random-forest regressor serialized as JSON.
//!
//! Layout mirrors a fitted scikit-learn `RandomForestRegressor`: each tree is
//! a flat node array rooted at index 0, split nodes send a row left when
//! `row[feature] <= threshold`, and the forest predicts the mean of its trees.
//!
//! ```json
//! {
//!   "format_version": 1,
//!   "n_features": 2,
//!   "feature_names": ["PubchemFP0", "PubchemFP1"],
//!   "trees": [
//!     { "nodes": [
//!         { "feature": 0, "threshold": 0.5, "left": 1, "right": 2 },
//!         { "value": 5.1 },
//!         { "value": 6.3 }
//!     ] }
//!   ]
//! }
//! ```

use std::path::Path;

use bioactivity_common::{BioactivityError, FeatureMatrix, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::predictor::{ensure_finite, Predictor};

/// Serialization version this build reads.
pub const FOREST_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    fn predict_row(&self, row: &[f64]) -> f64 {
        let mut i = 0;
        loop {
            match &self.nodes[i] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    i = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Children must point forward; this rules out cycles and guarantees
    /// every walk ends on a leaf.
    fn validate(&self, tree_idx: usize, n_features: usize) -> std::result::Result<(), String> {
        if self.nodes.is_empty() {
            return Err(format!("tree {} has no nodes", tree_idx));
        }
        let n = self.nodes.len();
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Leaf { value } if !value.is_finite() => {
                    return Err(format!("tree {} node {} has a non-finite leaf value", tree_idx, i));
                }
                Node::Leaf { .. } => {}
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= n_features {
                        return Err(format!(
                            "tree {} node {} splits on feature {} but the model has {} features",
                            tree_idx, i, feature, n_features
                        ));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("tree {} node {} has a non-finite threshold", tree_idx, i));
                    }
                    for child in [*left, *right] {
                        if child <= i || child >= n {
                            return Err(format!(
                                "tree {} node {} has invalid child index {}",
                                tree_idx, i, child
                            ));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// On-disk representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestModel {
    pub format_version: u32,
    pub n_features: usize,
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
    pub trees: Vec<Tree>,
}

#[derive(Debug, Clone)]
pub struct RandomForestPredictor {
    model: ForestModel,
}

impl RandomForestPredictor {
    pub fn new(model: ForestModel) -> std::result::Result<Self, String> {
        if model.format_version != FOREST_FORMAT_VERSION {
            return Err(format!(
                "incompatible serialization version {} (this build reads version {})",
                model.format_version, FOREST_FORMAT_VERSION
            ));
        }
        if model.n_features == 0 {
            return Err("model declares zero features".to_string());
        }
        if model.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        if let Some(names) = &model.feature_names {
            if names.len() != model.n_features {
                return Err(format!(
                    "model lists {} feature names for {} features",
                    names.len(),
                    model.n_features
                ));
            }
        }
        for (t, tree) in model.trees.iter().enumerate() {
            tree.validate(t, model.n_features)?;
        }
        debug!(
            "Random forest validated: {} trees, {} nodes",
            model.trees.len(),
            model.trees.iter().map(|t| t.nodes.len()).sum::<usize>()
        );
        Ok(Self { model })
    }

    pub fn from_slice(bytes: &[u8], path: &Path) -> Result<Self> {
        let model: ForestModel =
            serde_json::from_slice(bytes).map_err(|e| BioactivityError::model_load(path, e))?;
        Self::new(model).map_err(|reason| BioactivityError::model_load(path, reason))
    }

    pub fn n_trees(&self) -> usize {
        self.model.trees.len()
    }
}

impl Predictor for RandomForestPredictor {
    fn kind(&self) -> &'static str {
        "random_forest"
    }

    fn n_features(&self) -> usize {
        self.model.n_features
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.model.feature_names.as_deref()
    }

    fn predict(&self, matrix: &FeatureMatrix) -> Result<Vec<f64>> {
        if matrix.n_cols() != self.model.n_features {
            return Err(BioactivityError::InferenceShape {
                expected: self.model.n_features,
                actual: matrix.n_cols(),
            });
        }
        ensure_finite(matrix)?;
        let n_trees = self.model.trees.len() as f64;
        Ok(matrix
            .rows()
            .map(|row| self.model.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / n_trees)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump(feature: usize, threshold: f64, low: f64, high: f64) -> Tree {
        Tree {
            nodes: vec![
                Node::Split {
                    feature,
                    threshold,
                    left: 1,
                    right: 2,
                },
                Node::Leaf { value: low },
                Node::Leaf { value: high },
            ],
        }
    }

    fn forest() -> RandomForestPredictor {
        RandomForestPredictor::new(ForestModel {
            format_version: FOREST_FORMAT_VERSION,
            n_features: 2,
            feature_names: None,
            trees: vec![stump(0, 0.5, 4.0, 6.0), stump(1, 10.0, 5.0, 7.0)],
        })
        .unwrap()
    }

    fn matrix(rows: &[[f64; 2]]) -> FeatureMatrix {
        let ids = (0..rows.len()).map(|i| format!("MOL{}", i)).collect();
        FeatureMatrix::from_flat(
            vec!["a".to_string(), "b".to_string()],
            ids,
            rows.iter().flatten().copied().collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_forest_averages_trees() {
        let preds = forest().predict(&matrix(&[[0.0, 3.0], [1.0, 20.0], [0.5, 10.0]])).unwrap();
        assert_eq!(preds, vec![4.5, 6.5, 4.5]);
    }

    #[test]
    fn test_forest_rejects_wrong_width() {
        let m = FeatureMatrix::from_flat(vec!["a".to_string()], vec!["MOL1".to_string()], vec![1.0])
            .unwrap();
        let err = forest().predict(&m).unwrap_err();
        assert!(matches!(
            err,
            BioactivityError::InferenceShape {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_nan_feature_is_rejected_not_routed() {
        let m = FeatureMatrix::from_flat(
            vec!["a".to_string(), "b".to_string()],
            vec!["MOL1".to_string(), "MOL2".to_string()],
            vec![0.0, 3.0, f64::NAN, 20.0],
        )
        .unwrap();
        match forest().predict(&m).unwrap_err() {
            BioactivityError::NonFiniteFeature {
                identifier, column, ..
            } => {
                assert_eq!(identifier, "MOL2");
                assert_eq!(column, "a");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_json_round_trip_through_loader() {
        let json = r#"{
            "format_version": 1,
            "n_features": 1,
            "feature_names": ["PubchemFP0"],
            "trees": [{ "nodes": [
                { "feature": 0, "threshold": 0.5, "left": 1, "right": 2 },
                { "value": 5.0 },
                { "value": 6.0 }
            ] }]
        }"#;
        let p = RandomForestPredictor::from_slice(json.as_bytes(), Path::new("model.json")).unwrap();
        assert_eq!(p.n_trees(), 1);
        assert_eq!(p.feature_names(), Some(&["PubchemFP0".to_string()][..]));
    }

    #[test]
    fn test_corrupt_json_is_model_load_error() {
        let err = RandomForestPredictor::from_slice(b"\x80\x04\x95pickle", Path::new("model.json"))
            .unwrap_err();
        assert!(matches!(err, BioactivityError::ModelLoad { .. }));
    }

    #[test]
    fn test_future_version_is_rejected() {
        let err = RandomForestPredictor::new(ForestModel {
            format_version: 2,
            n_features: 1,
            feature_names: None,
            trees: vec![stump(0, 0.5, 1.0, 2.0)],
        })
        .unwrap_err();
        assert!(err.contains("incompatible serialization version 2"));
    }

    #[test]
    fn test_cyclic_tree_is_rejected() {
        let tree = Tree {
            nodes: vec![
                Node::Split {
                    feature: 0,
                    threshold: 0.5,
                    left: 0,
                    right: 1,
                },
                Node::Leaf { value: 1.0 },
            ],
        };
        let err = RandomForestPredictor::new(ForestModel {
            format_version: 1,
            n_features: 1,
            feature_names: None,
            trees: vec![tree],
        })
        .unwrap_err();
        assert!(err.contains("invalid child index 0"));
    }

    #[test]
    fn test_split_on_unknown_feature_is_rejected() {
        let err = RandomForestPredictor::new(ForestModel {
            format_version: 1,
            n_features: 1,
            feature_names: None,
            trees: vec![stump(3, 0.5, 1.0, 2.0)],
        })
        .unwrap_err();
        assert!(err.contains("feature 3"));
    }
}
