//! Linear regressor stored as safetensors, evaluated with Candle.
//!
//! Expected tensors: `weight` with shape `(n)` or `(1, n)`, and `bias` with
//! shape `()` or `(1)`. Any float dtype is accepted and widened to f64.

use std::collections::HashMap;
use std::path::Path;

use bioactivity_common::{BioactivityError, FeatureMatrix, Result};
use candle_core::{DType, Device, Tensor};

use crate::predictor::Predictor;

#[derive(Debug, Clone)]
pub struct LinearPredictor {
    /// Shape (n_features, 1), f64.
    weight: Tensor,
    bias: f64,
    n_features: usize,
    device: Device,
}

impl LinearPredictor {
    pub fn from_safetensors(bytes: &[u8], path: &Path) -> Result<Self> {
        let device = Device::Cpu;
        let tensors = candle_core::safetensors::load_buffer(bytes, &device)
            .map_err(|e| BioactivityError::model_load(path, e))?;
        Self::from_tensors(tensors, device).map_err(|reason| BioactivityError::model_load(path, reason))
    }

    pub fn from_tensors(
        mut tensors: HashMap<String, Tensor>,
        device: Device,
    ) -> std::result::Result<Self, String> {
        let weight = tensors
            .remove("weight")
            .ok_or_else(|| "missing tensor 'weight'".to_string())?;
        let bias = tensors
            .remove("bias")
            .ok_or_else(|| "missing tensor 'bias'".to_string())?;

        let weight = match weight.dims() {
            [_] => weight,
            [1, _] => weight.flatten_all().map_err(|e| e.to_string())?,
            dims => return Err(format!("tensor 'weight' has unsupported shape {:?}", dims)),
        };
        let n_features = weight.dims1().map_err(|e| e.to_string())?;
        if n_features == 0 {
            return Err("tensor 'weight' is empty".to_string());
        }

        let weight = weight
            .to_dtype(DType::F64)
            .and_then(|w| w.reshape((n_features, 1)))
            .map_err(|e| format!("tensor 'weight': {}", e))?;

        let bias_values = bias
            .to_dtype(DType::F64)
            .and_then(|b| b.flatten_all())
            .and_then(|b| b.to_vec1::<f64>())
            .map_err(|e| format!("tensor 'bias': {}", e))?;
        let bias = match bias_values.as_slice() {
            [b] => *b,
            other => return Err(format!("tensor 'bias' must hold one value, found {}", other.len())),
        };

        Ok(Self {
            weight,
            bias,
            n_features,
            device,
        })
    }
}

impl Predictor for LinearPredictor {
    fn kind(&self) -> &'static str {
        "linear"
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, matrix: &FeatureMatrix) -> Result<Vec<f64>> {
        if matrix.n_cols() != self.n_features {
            return Err(BioactivityError::InferenceShape {
                expected: self.n_features,
                actual: matrix.n_cols(),
            });
        }
        if matrix.n_rows() == 0 {
            return Ok(Vec::new());
        }

        let x = Tensor::from_slice(matrix.as_slice(), matrix.shape(), &self.device)
            .map_err(|e| BioactivityError::Inference(e.to_string()))?;
        let y = x
            .matmul(&self.weight)
            .and_then(|y| y.flatten_all())
            .and_then(|y| y.to_vec1::<f64>())
            .map_err(|e| BioactivityError::Inference(e.to_string()))?;

        Ok(y.into_iter().map(|v| v + self.bias).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tensors(weight: Tensor, bias: Tensor) -> HashMap<String, Tensor> {
        let mut t = HashMap::new();
        t.insert("weight".to_string(), weight);
        t.insert("bias".to_string(), bias);
        t
    }

    fn matrix() -> FeatureMatrix {
        FeatureMatrix::from_flat(
            vec!["a".to_string(), "b".to_string()],
            vec!["MOL1".to_string(), "MOL2".to_string()],
            vec![1.0, 2.0, 0.0, 4.0],
        )
        .unwrap()
    }

    #[test]
    fn test_linear_prediction() {
        let weight = Tensor::new(&[0.5f32, 0.25], &Device::Cpu).unwrap();
        let bias = Tensor::new(&[5.0f32], &Device::Cpu).unwrap();
        let p = LinearPredictor::from_tensors(tensors(weight, bias), Device::Cpu).unwrap();

        assert_eq!(p.n_features(), 2);
        assert_eq!(p.predict(&matrix()).unwrap(), vec![6.0, 6.0]);
    }

    #[test]
    fn test_row_vector_weight_is_accepted() {
        let weight = Tensor::new(&[[1.0f64, 1.0]], &Device::Cpu).unwrap();
        let bias = Tensor::new(0.0f64, &Device::Cpu).unwrap();
        let p = LinearPredictor::from_tensors(tensors(weight, bias), Device::Cpu).unwrap();
        assert_eq!(p.predict(&matrix()).unwrap(), vec![3.0, 4.0]);
    }

    #[test]
    fn test_missing_bias() {
        let mut t = HashMap::new();
        t.insert(
            "weight".to_string(),
            Tensor::new(&[1.0f64], &Device::Cpu).unwrap(),
        );
        let err = LinearPredictor::from_tensors(t, Device::Cpu).unwrap_err();
        assert!(err.contains("'bias'"));
    }

    #[test]
    fn test_safetensors_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.safetensors");
        let t = tensors(
            Tensor::new(&[2.0f32, 0.0], &Device::Cpu).unwrap(),
            Tensor::new(&[1.0f32], &Device::Cpu).unwrap(),
        );
        candle_core::safetensors::save(&t, &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let p = LinearPredictor::from_safetensors(&bytes, &path).unwrap();
        assert_eq!(p.predict(&matrix()).unwrap(), vec![3.0, 1.0]);
    }

    #[test]
    fn test_garbage_bytes_are_model_load_error() {
        let err = LinearPredictor::from_safetensors(b"not a tensor file", Path::new("m.safetensors"))
            .unwrap_err();
        assert!(matches!(err, BioactivityError::ModelLoad { .. }));
    }

    #[test]
    fn test_width_mismatch() {
        let weight = Tensor::new(&[1.0f64, 1.0, 1.0], &Device::Cpu).unwrap();
        let bias = Tensor::new(&[0.0f64], &Device::Cpu).unwrap();
        let p = LinearPredictor::from_tensors(tensors(weight, bias), Device::Cpu).unwrap();
        assert!(matches!(
            p.predict(&matrix()),
            Err(BioactivityError::InferenceShape { expected: 3, actual: 2 })
        ));
    }
}
