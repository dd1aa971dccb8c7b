//! bioactivity-pipeline — pIC50 prediction over a batch of molecules.
//!
//! Stages, strictly in order:
//!   1. Parse the raw delimited input into molecule records
//!   2. Generate descriptors with an external tool
//!   3. Align descriptors to the model's feature schema
//!   4. Predict one value per molecule
//!   5. Join identifiers with predictions and encode the export payload
//!
//! The schema and model are loaded once into a [`PredictionContext`] and
//! shared read-only by every run.

pub mod aligner;
pub mod cancel;
pub mod context;
pub mod exporter;
pub mod parser;
pub mod pipeline;

pub use aligner::align;
pub use cancel::CancellationToken;
pub use context::PredictionContext;
pub use exporter::{build_result_table, encode_results, ExportOptions, ExportPayload};
pub use parser::{parse_molecules, ParserOptions};
pub use pipeline::{
    BioactivityPipeline, PipelineError, PipelineProgress, PipelineState, PredictionReport,
};
