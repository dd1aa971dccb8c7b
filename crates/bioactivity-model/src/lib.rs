//! bioactivity-model — Regression model loading and batch inference.
//!
//! Two artifact formats are supported:
//!   - `.json`: random-forest regressor (see [`forest`])
//!   - `.safetensors`: linear regressor evaluated with Candle (see [`linear`])
//!
//! [`InferenceEngine`] binds a loaded model to the feature schema so a width
//! mismatch is caught before any descriptor tool runs.

pub mod engine;
pub mod forest;
pub mod linear;
pub mod predictor;

pub use engine::InferenceEngine;
pub use forest::RandomForestPredictor;
pub use linear::LinearPredictor;
pub use predictor::{ensure_finite, load_model, ModelFormat, Predictor};
