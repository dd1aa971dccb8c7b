//! Process-wide prediction resources.

use std::path::Path;
use std::sync::Arc;

use bioactivity_common::{FeatureSchema, Result};
use bioactivity_model::InferenceEngine;
use tracing::info;

/// Feature schema and inference engine, loaded once and shared read-only by
/// every pipeline run. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct PredictionContext {
    engine: Arc<InferenceEngine>,
}

impl PredictionContext {
    /// The engine already holds the schema it was bound to.
    pub fn new(engine: InferenceEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    /// Load the schema header file and the model artifact, checking that the
    /// model was fit on exactly the schema's features.
    pub fn load(schema_path: &Path, model_path: &Path) -> Result<Self> {
        let schema = Arc::new(FeatureSchema::from_csv_path(schema_path)?);
        let engine = InferenceEngine::load(model_path, Arc::clone(&schema))?;
        info!(
            "Prediction context ready: {} features, {} model",
            schema.len(),
            engine.predictor().kind()
        );
        Ok(Self::new(engine))
    }

    pub fn schema(&self) -> &FeatureSchema {
        self.engine.schema()
    }

    pub fn engine(&self) -> &InferenceEngine {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bioactivity_common::BioactivityError;
    use std::fs;

    const MODEL: &str = r#"{
        "format_version": 1,
        "n_features": 2,
        "trees": [{ "nodes": [{ "value": 6.0 }] }]
    }"#;

    #[test]
    fn test_load_context() {
        let dir = tempfile::tempdir().unwrap();
        let schema_path = dir.path().join("descriptor_list.csv");
        let model_path = dir.path().join("model.json");
        fs::write(&schema_path, "PubchemFP0,PubchemFP1\n").unwrap();
        fs::write(&model_path, MODEL).unwrap();

        let ctx = PredictionContext::load(&schema_path, &model_path).unwrap();
        assert_eq!(ctx.schema().len(), 2);
        assert_eq!(ctx.engine().predictor().n_features(), 2);
    }

    #[test]
    fn test_model_width_must_match_schema() {
        let dir = tempfile::tempdir().unwrap();
        let schema_path = dir.path().join("descriptor_list.csv");
        let model_path = dir.path().join("model.json");
        fs::write(&schema_path, "PubchemFP0,PubchemFP1,PubchemFP2\n").unwrap();
        fs::write(&model_path, MODEL).unwrap();

        let err = PredictionContext::load(&schema_path, &model_path).unwrap_err();
        assert!(matches!(
            err,
            BioactivityError::InferenceShape {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_missing_schema_file() {
        let err = PredictionContext::load(Path::new("/nonexistent/list.csv"), Path::new("m.json"))
            .unwrap_err();
        assert!(matches!(err, BioactivityError::Config(_)));
    }
}
