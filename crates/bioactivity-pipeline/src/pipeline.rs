//! Pipeline orchestrator.
//!
//! Drives one run through
//! `Idle → Parsing → DescriptorGeneration → FeatureAlignment → Inference → Exporting → Done`,
//! or into `Failed(stage, error)` from any stage. Nothing is retried.
//! Cancellation is honoured between stages and while the descriptor tool runs.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use bioactivity_common::{
    BioactivityError, DescriptorTable, FeatureMatrix, MoleculeRecord, PredictionResult,
    ResultTable, Stage,
};
use bioactivity_descriptors::DescriptorGenerator;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::aligner::align;
use crate::cancel::CancellationToken;
use crate::context::PredictionContext;
use crate::exporter::{build_result_table, encode_results, ExportOptions, ExportPayload};
use crate::parser::{parse_molecules, ParserOptions};

// ── State machine ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Parsing,
    DescriptorGeneration,
    FeatureAlignment,
    Inference,
    Exporting,
    Done,
    Failed { stage: Stage, error: String },
}

impl PipelineState {
    fn running(stage: Stage) -> Self {
        match stage {
            Stage::Parsing => Self::Parsing,
            Stage::DescriptorGeneration => Self::DescriptorGeneration,
            Stage::FeatureAlignment => Self::FeatureAlignment,
            Stage::Inference => Self::Inference,
            Stage::Exporting => Self::Exporting,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed { .. })
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Parsing => f.write_str("parsing"),
            Self::DescriptorGeneration => f.write_str("descriptor_generation"),
            Self::FeatureAlignment => f.write_str("feature_alignment"),
            Self::Inference => f.write_str("inference"),
            Self::Exporting => f.write_str("exporting"),
            Self::Done => f.write_str("done"),
            Self::Failed { stage, .. } => write!(f, "failed({})", stage),
        }
    }
}

// ── Progress events ──────────────────────────────────────────────────────────

/// Emitted on every state transition (cloneable for broadcast).
#[derive(Debug, Clone, Serialize)]
pub struct PipelineProgress {
    pub run_id: Uuid,
    pub state: PipelineState,
    pub message: String,
    /// Rows produced by the previous stage, once known.
    pub rows: Option<usize>,
}

// ── Errors ───────────────────────────────────────────────────────────────────

/// Terminal `Failed` state of a run: the stage that failed and why.
#[derive(Debug, Error)]
#[error("Pipeline failed during {stage}: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    pub source: BioactivityError,
}

// ── Report ───────────────────────────────────────────────────────────────────

/// Every intermediate artifact of a successful run.
#[derive(Debug, Clone)]
pub struct PredictionReport {
    pub run_id: Uuid,
    pub records: Vec<MoleculeRecord>,
    pub descriptors: DescriptorTable,
    pub features: FeatureMatrix,
    pub predictions: Vec<PredictionResult>,
    pub results: ResultTable,
    pub payload: ExportPayload,
    pub duration_ms: u64,
}

impl PredictionReport {
    pub fn descriptor_shape(&self) -> (usize, usize) {
        self.descriptors.shape()
    }

    pub fn feature_shape(&self) -> (usize, usize) {
        self.features.shape()
    }
}

// ── Run tracker ──────────────────────────────────────────────────────────────

struct RunTracker<'a> {
    run_id: Uuid,
    stage: Stage,
    progress: Option<&'a broadcast::Sender<PipelineProgress>>,
    cancel: &'a CancellationToken,
}

impl RunTracker<'_> {
    fn emit(&self, state: PipelineState, message: String, rows: Option<usize>) {
        if let Some(tx) = self.progress {
            // No subscribers is fine.
            let _ = tx.send(PipelineProgress {
                run_id: self.run_id,
                state,
                message,
                rows,
            });
        }
    }

    /// Move to `stage` unless the run has been cancelled.
    fn enter(&mut self, stage: Stage, rows: Option<usize>) -> Result<(), PipelineError> {
        self.stage = stage;
        if self.cancel.is_cancelled() {
            return Err(self.fail(BioactivityError::Cancelled));
        }
        info!("▶ {}", stage);
        self.emit(PipelineState::running(stage), format!("Entering {}", stage), rows);
        Ok(())
    }

    fn check_rows(&self, expected: usize, actual: usize) -> Result<(), PipelineError> {
        if expected != actual {
            return Err(self.fail(BioactivityError::RowCountMismatch {
                stage: self.stage,
                expected,
                actual,
            }));
        }
        Ok(())
    }

    fn fail(&self, error: BioactivityError) -> PipelineError {
        warn!("Pipeline failed during {}: {}", self.stage, error);
        self.emit(
            PipelineState::Failed {
                stage: self.stage,
                error: error.to_string(),
            },
            error.to_string(),
            None,
        );
        PipelineError {
            stage: self.stage,
            source: error,
        }
    }
}

// ── Pipeline orchestrator ────────────────────────────────────────────────────

/// Runs prediction over one batch at a time.
///
/// Holds no per-run state, so one instance can serve concurrent runs; each
/// descriptor run gets its own scratch directory.
#[derive(Clone)]
pub struct BioactivityPipeline {
    context: PredictionContext,
    generator: Arc<dyn DescriptorGenerator>,
    parser: ParserOptions,
    export: ExportOptions,
}

impl BioactivityPipeline {
    pub fn new(context: PredictionContext, generator: Arc<dyn DescriptorGenerator>) -> Self {
        Self {
            context,
            generator,
            parser: ParserOptions::default(),
            export: ExportOptions::default(),
        }
    }

    pub fn with_parser_options(mut self, parser: ParserOptions) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_export_options(mut self, export: ExportOptions) -> Self {
        self.export = export;
        self
    }

    pub fn context(&self) -> &PredictionContext {
        &self.context
    }

    /// Run the whole pipeline on raw input bytes under a fresh run id.
    pub async fn run(
        &self,
        input: &[u8],
        cancel: &CancellationToken,
        progress: Option<&broadcast::Sender<PipelineProgress>>,
    ) -> Result<PredictionReport, PipelineError> {
        self.run_with_id(Uuid::new_v4(), input, cancel, progress).await
    }

    #[instrument(skip(self, input, cancel, progress), fields(run_id = %run_id))]
    pub async fn run_with_id(
        &self,
        run_id: Uuid,
        input: &[u8],
        cancel: &CancellationToken,
        progress: Option<&broadcast::Sender<PipelineProgress>>,
    ) -> Result<PredictionReport, PipelineError> {
        let start = Instant::now();
        let mut run = RunTracker {
            run_id,
            stage: Stage::Parsing,
            progress,
            cancel,
        };
        run.emit(PipelineState::Idle, "Run created".to_string(), None);

        // ── Parsing ──
        run.enter(Stage::Parsing, None)?;
        let records = parse_molecules(input, &self.parser).map_err(|e| run.fail(e))?;
        let n = records.len();

        // ── Descriptor generation ──
        run.enter(Stage::DescriptorGeneration, Some(n))?;
        info!("Generating descriptors with {}", self.generator.name());
        // Dropping the generate future terminates the tool and removes its
        // scratch directory.
        let descriptors = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(BioactivityError::Cancelled),
            res = self.generator.generate(&records) => res,
        }
        .map_err(|e| run.fail(e))?;
        run.check_rows(n, descriptors.n_rows())?;
        info!(
            "Descriptor table: {} x {}",
            descriptors.n_rows(),
            descriptors.n_cols()
        );

        // ── Feature alignment ──
        run.enter(Stage::FeatureAlignment, Some(n))?;
        let features = align(&descriptors, self.context.schema()).map_err(|e| run.fail(e))?;
        run.check_rows(n, features.n_rows())?;

        // ── Inference ──
        run.enter(Stage::Inference, Some(n))?;
        let predictions = self
            .context
            .engine()
            .predict(&features)
            .map_err(|e| run.fail(e))?;
        run.check_rows(n, predictions.len())?;

        // ── Exporting ──
        run.enter(Stage::Exporting, Some(n))?;
        let results =
            build_result_table(&records, &predictions, &self.export).map_err(|e| run.fail(e))?;
        let payload = encode_results(&results, &self.export).map_err(|e| run.fail(e))?;

        let duration_ms = start.elapsed().as_millis() as u64;
        run.emit(
            PipelineState::Done,
            format!("Predicted {} molecules in {}ms", n, duration_ms),
            Some(n),
        );
        info!("✅ Predicted {} molecules in {}ms", n, duration_ms);

        Ok(PredictionReport {
            run_id,
            records,
            descriptors,
            features,
            predictions,
            results,
            payload,
            duration_ms,
        })
    }
}
