//! bioactivity — pIC50 prediction from molecular structures.
//! Entry point for the command line binary.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use bioactivity_descriptors::PadelDescriptorGenerator;
use bioactivity_pipeline::{
    BioactivityPipeline, CancellationToken, PipelineProgress, PredictionContext,
};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bioactivity", version)]
#[command(about = "Predict pIC50 bioactivity of small molecules from their structures", long_about = None)]
struct Cli {
    /// Config TOML file (defaults to ./bioactivity.toml when present)
    #[arg(short, long, env = "BIOACTIVITY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline on one input table
    Predict {
        /// Delimited input with a structure column and an identifier column
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the result table (defaults to the export filename)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        resources: ResourceArgs,

        /// PaDEL-Descriptor jar
        #[arg(long, value_name = "JAR")]
        jar: Option<PathBuf>,

        /// Wall-clock limit for the descriptor tool
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Load the feature schema and model, then exit
    Check {
        #[command(flatten)]
        resources: ResourceArgs,
    },
}

#[derive(clap::Args)]
struct ResourceArgs {
    /// Feature schema file (header row lists the model's features)
    #[arg(long, value_name = "CSV")]
    schema: Option<PathBuf>,

    /// Model artifact (.json or .safetensors)
    #[arg(long, value_name = "PATH")]
    model: Option<PathBuf>,
}

impl ResourceArgs {
    fn apply(&self, config: &mut config::Config) {
        if let Some(ref p) = self.schema {
            config.resources.schema_path = p.clone();
        }
        if let Some(ref p) = self.model {
            config.resources.model_path = p.clone();
        }
    }
}

fn load_context(config: &config::Config) -> anyhow::Result<PredictionContext> {
    PredictionContext::load(&config.resources.schema_path, &config.resources.model_path)
        .context("Could not load the feature schema and model")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("bioactivity=debug,info")),
        )
        .init();

    let cli = Cli::parse();
    info!("🧪 bioactivity {}", env!("CARGO_PKG_VERSION"));

    let mut config = config::Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Check { resources } => {
            resources.apply(&mut config);
            let context = load_context(&config)?;
            info!(
                "✅ Schema {:?}: {} features",
                config.resources.schema_path,
                context.schema().len()
            );
            info!(
                "✅ Model {:?}: {}",
                config.resources.model_path,
                context.engine().predictor().kind()
            );
            Ok(())
        }
        Commands::Predict {
            input,
            output,
            resources,
            jar,
            timeout_secs,
        } => {
            resources.apply(&mut config);
            if let Some(jar) = jar {
                config.descriptors.jar_path = jar;
            }
            if let Some(secs) = timeout_secs {
                config.descriptors.timeout_secs = secs;
            }
            predict(&config, input, output).await
        }
    }
}

async fn predict(
    config: &config::Config,
    input: PathBuf,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let context = load_context(config)?;
    let generator = Arc::new(PadelDescriptorGenerator::new(config.padel_config()));
    let pipeline = BioactivityPipeline::new(context, generator)
        .with_parser_options(config.parser_options()?)
        .with_export_options(config.export_options());

    let bytes = tokio::fs::read(&input)
        .await
        .with_context(|| format!("Cannot read input {}", input.display()))?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling run");
                cancel.cancel();
            }
        });
    }

    let (progress_tx, mut progress_rx) = broadcast::channel::<PipelineProgress>(16);
    let progress_log = tokio::spawn(async move {
        while let Ok(event) = progress_rx.recv().await {
            debug!(run_id = %event.run_id, state = %event.state, rows = ?event.rows, "{}", event.message);
            if event.state.is_terminal() {
                break;
            }
        }
    });

    let result = pipeline.run(&bytes, &cancel, Some(&progress_tx)).await;
    drop(progress_tx);
    let _ = progress_log.await;
    let report = result?;

    info!("Input molecules: {}", report.records.len());
    info!("Descriptor table shape: {:?}", report.descriptor_shape());
    info!("Feature matrix shape: {:?}", report.feature_shape());

    let output = output.unwrap_or_else(|| PathBuf::from(&report.payload.filename));
    let csv = report.payload.csv_bytes()?;
    tokio::fs::write(&output, &csv)
        .await
        .with_context(|| format!("Cannot write {}", output.display()))?;
    info!("✅ Wrote {} predictions to {}", report.results.len(), output.display());

    println!("{}\t{}", report.results.identifier_column, report.results.value_column);
    for row in &report.results.rows {
        println!("{}\t{}", row.identifier, row.predicted_value);
    }
    Ok(())
}
