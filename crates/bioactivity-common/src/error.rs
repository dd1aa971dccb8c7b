use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest stderr excerpt rendered in an error message.
const STDERR_TAIL_CHARS: usize = 2_000;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Parsing,
    DescriptorGeneration,
    FeatureAlignment,
    Inference,
    Exporting,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Parsing,
        Stage::DescriptorGeneration,
        Stage::FeatureAlignment,
        Stage::Inference,
        Stage::Exporting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Parsing => "parsing",
            Stage::DescriptorGeneration => "descriptor_generation",
            Stage::FeatureAlignment => "feature_alignment",
            Stage::Inference => "inference",
            Stage::Exporting => "exporting",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum BioactivityError {
    #[error("Malformed input{}: {reason}", line_suffix(.line))]
    MalformedInput { line: Option<u64>, reason: String },

    #[error("Descriptor tool failed ({}): {message}{}", exit_label(.exit_code), stderr_tail(.stderr))]
    DescriptorTool {
        exit_code: Option<i32>,
        stderr: String,
        message: String,
    },

    #[error("Descriptor tool did not finish within {}s", .timeout.as_secs_f64())]
    DescriptorToolTimeout { timeout: Duration },

    #[error("Descriptor table is missing {} feature column(s): {}", .missing.len(), .missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    #[error("Failed to load model from {}: {reason}", .path.display())]
    ModelLoad { path: PathBuf, reason: String },

    #[error("Model expects {expected} feature column(s), feature matrix has {actual}")]
    InferenceShape { expected: usize, actual: usize },

    #[error("Feature '{column}' of '{identifier}' is not a finite number ({value})")]
    NonFiniteFeature {
        identifier: String,
        column: String,
        value: f64,
    },

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Cannot encode result table as {encoding}: {reason}")]
    ExportEncoding { encoding: &'static str, reason: String },

    #[error("Stage {stage} produced {actual} row(s), expected {expected}")]
    RowCountMismatch {
        stage: Stage,
        expected: usize,
        actual: usize,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Pipeline run was cancelled")]
    Cancelled,
}

impl BioactivityError {
    pub fn malformed(line: Option<u64>, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            line,
            reason: reason.into(),
        }
    }

    /// Tool failure that happened before or around the process itself
    /// (spawn error, unreadable output), so there is no exit code.
    pub fn tool(message: impl Into<String>) -> Self {
        Self::DescriptorTool {
            exit_code: None,
            stderr: String::new(),
            message: message.into(),
        }
    }

    pub fn model_load(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Self::ModelLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

fn line_suffix(line: &Option<u64>) -> String {
    match line {
        Some(n) => format!(" (line {})", n),
        None => String::new(),
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {}", c),
        None => "no exit code".to_string(),
    }
}

fn stderr_tail(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let count = trimmed.chars().count();
    if count <= STDERR_TAIL_CHARS {
        format!("\nstderr: {}", trimmed)
    } else {
        let tail: String = trimmed.chars().skip(count - STDERR_TAIL_CHARS).collect();
        format!("\nstderr (last {} chars): ...{}", STDERR_TAIL_CHARS, tail)
    }
}

pub type Result<T> = std::result::Result<T, BioactivityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_mismatch_lists_every_column() {
        let err = BioactivityError::SchemaMismatch {
            missing: vec!["PubchemFP12".to_string(), "PubchemFP180".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Descriptor table is missing 2 feature column(s): PubchemFP12, PubchemFP180"
        );
    }

    #[test]
    fn test_tool_error_carries_exit_code_and_stderr() {
        let err = BioactivityError::DescriptorTool {
            exit_code: Some(3),
            stderr: "java.lang.OutOfMemoryError\n".to_string(),
            message: "process exited unsuccessfully".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("exit code 3"));
        assert!(msg.contains("java.lang.OutOfMemoryError"));
    }

    #[test]
    fn test_long_stderr_is_truncated() {
        let stderr = "x".repeat(STDERR_TAIL_CHARS * 2);
        let err = BioactivityError::DescriptorTool {
            exit_code: None,
            stderr,
            message: "boom".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("no exit code"));
        assert!(msg.len() < STDERR_TAIL_CHARS + 200);
    }

    #[test]
    fn test_malformed_input_mentions_line() {
        let err = BioactivityError::malformed(Some(4), "empty structure");
        assert_eq!(err.to_string(), "Malformed input (line 4): empty structure");
    }

    #[test]
    fn test_non_finite_feature_names_row_and_column() {
        let err = BioactivityError::NonFiniteFeature {
            identifier: "MOL2".to_string(),
            column: "PubchemFP0".to_string(),
            value: f64::NAN,
        };
        assert_eq!(
            err.to_string(),
            "Feature 'PubchemFP0' of 'MOL2' is not a finite number (NaN)"
        );
    }

    #[test]
    fn test_stage_names() {
        let names: Vec<&str> = Stage::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(
            names,
            ["parsing", "descriptor_generation", "feature_alignment", "inference", "exporting"]
        );
    }
}
