//! bioactivity-common — Shared types and errors used across all bioactivity crates.

pub mod entities;
pub mod error;
pub mod schema;

// Re-export commonly used types
pub use entities::{
    DescriptorRow, DescriptorTable, FeatureMatrix, MoleculeRecord, PredictionResult, ResultTable,
};
pub use error::{BioactivityError, Result, Stage};
pub use schema::FeatureSchema;
