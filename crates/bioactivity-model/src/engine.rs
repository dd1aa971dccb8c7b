//! Inference engine: a loaded model bound to the feature schema.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use bioactivity_common::{
    BioactivityError, FeatureMatrix, FeatureSchema, PredictionResult, Result, Stage,
};
use tracing::{debug, info};

use crate::predictor::{ensure_finite, load_model, Predictor};

/// Read-only after construction; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct InferenceEngine {
    predictor: Arc<dyn Predictor>,
    schema: Arc<FeatureSchema>,
}

impl InferenceEngine {
    /// Bind a predictor to a schema, checking the model's width once up front.
    pub fn new(predictor: Arc<dyn Predictor>, schema: Arc<FeatureSchema>) -> Result<Self> {
        if predictor.n_features() != schema.len() {
            return Err(BioactivityError::InferenceShape {
                expected: predictor.n_features(),
                actual: schema.len(),
            });
        }
        Ok(Self { predictor, schema })
    }

    /// Load the model artifact at `path` and bind it to `schema`.
    ///
    /// If the artifact stores its own feature names they must match the
    /// schema exactly, order included.
    pub fn load(path: &Path, schema: Arc<FeatureSchema>) -> Result<Self> {
        let start = Instant::now();
        let predictor = load_model(path)?;

        if let Some(names) = predictor.feature_names() {
            if names != schema.names() {
                let first_diff = names
                    .iter()
                    .zip(schema.names())
                    .position(|(a, b)| a != b)
                    .unwrap_or_else(|| names.len().min(schema.len()));
                return Err(BioactivityError::model_load(
                    path,
                    format!(
                        "model feature names disagree with the feature schema at column {}",
                        first_diff + 1
                    ),
                ));
            }
        }

        let engine = Self::new(predictor, schema)?;
        info!("Inference engine ready in {:.2}s", start.elapsed().as_secs_f32());
        Ok(engine)
    }

    pub fn predictor(&self) -> &dyn Predictor {
        self.predictor.as_ref()
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Predict one value per matrix row, keeping row order.
    pub fn predict(&self, matrix: &FeatureMatrix) -> Result<Vec<PredictionResult>> {
        let expected = self.predictor.n_features();
        if matrix.n_cols() != expected {
            return Err(BioactivityError::InferenceShape {
                expected,
                actual: matrix.n_cols(),
            });
        }

        ensure_finite(matrix)?;

        let start = Instant::now();
        let values = self.predictor.predict(matrix)?;
        if values.len() != matrix.n_rows() {
            return Err(BioactivityError::RowCountMismatch {
                stage: Stage::Inference,
                expected: matrix.n_rows(),
                actual: values.len(),
            });
        }

        debug!(
            "Predicted {} rows with {} in {:.2}ms",
            values.len(),
            self.predictor.kind(),
            start.elapsed().as_secs_f32() * 1000.0
        );

        Ok(matrix
            .identifiers()
            .iter()
            .zip(values)
            .map(|(id, v)| PredictionResult {
                identifier: id.clone(),
                predicted_value: v,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::{ForestModel, Node, RandomForestPredictor, Tree};

    #[derive(Debug)]
    struct ShortPredictor;

    impl Predictor for ShortPredictor {
        fn kind(&self) -> &'static str {
            "short"
        }
        fn n_features(&self) -> usize {
            1
        }
        fn predict(&self, _matrix: &FeatureMatrix) -> Result<Vec<f64>> {
            Ok(vec![1.0])
        }
    }

    fn schema(names: &[&str]) -> Arc<FeatureSchema> {
        Arc::new(FeatureSchema::new(names.iter().copied()).unwrap())
    }

    fn forest_json(names: &[&str]) -> String {
        let model = ForestModel {
            format_version: 1,
            n_features: names.len(),
            feature_names: Some(names.iter().map(|s| s.to_string()).collect()),
            trees: vec![Tree {
                nodes: vec![Node::Leaf { value: 6.5 }],
            }],
        };
        serde_json::to_string(&model).unwrap()
    }

    #[test]
    fn test_width_is_checked_at_construction() {
        let err = InferenceEngine::new(Arc::new(ShortPredictor), schema(&["a", "b"])).unwrap_err();
        assert!(matches!(err, BioactivityError::InferenceShape { expected: 1, actual: 2 }));
    }

    #[test]
    fn test_short_prediction_is_row_count_mismatch() {
        let engine = InferenceEngine::new(Arc::new(ShortPredictor), schema(&["a"])).unwrap();
        let m = FeatureMatrix::from_flat(
            vec!["a".to_string()],
            vec!["MOL1".to_string(), "MOL2".to_string()],
            vec![0.0, 1.0],
        )
        .unwrap();
        let err = engine.predict(&m).unwrap_err();
        assert!(matches!(err, BioactivityError::RowCountMismatch { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn test_predictions_keep_identifiers_in_order() {
        let forest = RandomForestPredictor::new(ForestModel {
            format_version: 1,
            n_features: 1,
            feature_names: None,
            trees: vec![Tree {
                nodes: vec![Node::Leaf { value: 5.0 }],
            }],
        })
        .unwrap();
        let engine = InferenceEngine::new(Arc::new(forest), schema(&["a"])).unwrap();
        let m = FeatureMatrix::from_flat(
            vec!["a".to_string()],
            vec!["B".to_string(), "A".to_string(), "B".to_string()],
            vec![0.0, 1.0, 2.0],
        )
        .unwrap();

        let ids: Vec<String> = engine.predict(&m).unwrap().into_iter().map(|p| p.identifier).collect();
        assert_eq!(ids, vec!["B", "A", "B"]);
    }

    #[test]
    fn test_infinite_feature_never_reaches_predictor() {
        let engine = InferenceEngine::new(Arc::new(ShortPredictor), schema(&["a"])).unwrap();
        let m = FeatureMatrix::from_flat(
            vec!["a".to_string()],
            vec!["MOL1".to_string()],
            vec![f64::INFINITY],
        )
        .unwrap();
        assert!(matches!(
            engine.predict(&m).unwrap_err(),
            BioactivityError::NonFiniteFeature { .. }
        ));
    }

    #[test]
    fn test_load_checks_stored_feature_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, forest_json(&["PubchemFP1", "PubchemFP0"])).unwrap();

        let err = InferenceEngine::load(&path, schema(&["PubchemFP0", "PubchemFP1"])).unwrap_err();
        assert!(err.to_string().contains("at column 1"));

        let engine = InferenceEngine::load(&path, schema(&["PubchemFP1", "PubchemFP0"])).unwrap();
        assert_eq!(engine.predictor().kind(), "random_forest");
    }
}
