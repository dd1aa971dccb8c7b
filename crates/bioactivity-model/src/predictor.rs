//! Predictor capability and model artifact loading.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use bioactivity_common::{BioactivityError, FeatureMatrix, Result};
use tracing::info;

use crate::forest::RandomForestPredictor;
use crate::linear::LinearPredictor;

/// A loaded regression model.
///
/// Only batch prediction is exposed; rows must follow the feature schema's
/// column count and order. Implementations are immutable after loading and
/// safe to share between concurrent runs.
pub trait Predictor: Send + Sync + fmt::Debug {
    /// Short model family name, for logs.
    fn kind(&self) -> &'static str;

    /// Number of feature columns the model was fit on.
    fn n_features(&self) -> usize;

    /// Feature names stored with the model, if the artifact carries them.
    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    /// One prediction per matrix row, in row order.
    fn predict(&self, matrix: &FeatureMatrix) -> Result<Vec<f64>>;
}

/// Reject NaN and infinite cells, naming the first offending row and column.
///
/// Split comparisons route NaN down one branch without complaint, so the
/// matrix is checked before any model sees it.
pub fn ensure_finite(matrix: &FeatureMatrix) -> Result<()> {
    match matrix.first_non_finite() {
        None => Ok(()),
        Some((row, col)) => Err(BioactivityError::NonFiniteFeature {
            identifier: matrix.identifiers()[row].clone(),
            column: matrix.columns()[col].clone(),
            value: matrix.as_slice()[row * matrix.n_cols() + col],
        }),
    }
}

/// Serialization formats understood by [`load_model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    /// Random-forest regressor serialized as JSON (`.json`).
    RandomForestJson,
    /// Linear regressor weights in safetensors (`.safetensors`).
    LinearSafetensors,
}

impl ModelFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("json") => Ok(Self::RandomForestJson),
            Some("safetensors") => Ok(Self::LinearSafetensors),
            Some(other) => Err(BioactivityError::model_load(
                path,
                format!("unsupported model format '.{}' (expected .json or .safetensors)", other),
            )),
            None => Err(BioactivityError::model_load(
                path,
                "model file has no extension; cannot tell its format",
            )),
        }
    }
}

/// Deserialize the model artifact at `path`.
///
/// The file is read as raw bytes; decoding is left to the format.
pub fn load_model(path: &Path) -> Result<Arc<dyn Predictor>> {
    let format = ModelFormat::from_path(path)?;
    let bytes = std::fs::read(path).map_err(|e| BioactivityError::model_load(path, e))?;

    let predictor: Arc<dyn Predictor> = match format {
        ModelFormat::RandomForestJson => Arc::new(RandomForestPredictor::from_slice(&bytes, path)?),
        ModelFormat::LinearSafetensors => Arc::new(LinearPredictor::from_safetensors(&bytes, path)?),
    };

    info!(
        "Model loaded: {} with {} features from {:?}",
        predictor.kind(),
        predictor.n_features(),
        path
    );
    Ok(predictor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ModelFormat::from_path(Path::new("model.json")).unwrap(),
            ModelFormat::RandomForestJson
        );
        assert_eq!(
            ModelFormat::from_path(Path::new("weights.SafeTensors")).unwrap(),
            ModelFormat::LinearSafetensors
        );
    }

    #[test]
    fn test_pickle_is_not_supported() {
        let err = ModelFormat::from_path(Path::new("sars_cov_proteinase_model.pkl")).unwrap_err();
        assert!(matches!(err, BioactivityError::ModelLoad { .. }));
        assert!(err.to_string().contains(".pkl"));
    }

    #[test]
    fn test_ensure_finite_names_identifier_and_column() {
        let m = FeatureMatrix::from_flat(
            vec!["PubchemFP0".to_string(), "PubchemFP1".to_string()],
            vec!["MOL1".to_string(), "MOL2".to_string()],
            vec![0.0, 1.0, 1.0, f64::NEG_INFINITY],
        )
        .unwrap();
        match ensure_finite(&m).unwrap_err() {
            BioactivityError::NonFiniteFeature {
                identifier, column, value,
            } => {
                assert_eq!(identifier, "MOL2");
                assert_eq!(column, "PubchemFP1");
                assert_eq!(value, f64::NEG_INFINITY);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_file_is_model_load_error() {
        let err = load_model(Path::new("/nonexistent/model.json")).unwrap_err();
        assert!(matches!(err, BioactivityError::ModelLoad { .. }));
    }
}
