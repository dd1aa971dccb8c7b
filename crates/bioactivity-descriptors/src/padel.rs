//! Descriptor calculation using PaDEL-Descriptor.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

use bioactivity_common::{BioactivityError, DescriptorTable, MoleculeRecord, Result};

use crate::generator::DescriptorGenerator;
use crate::table::{read_descriptor_table, write_structure_file};

const STRUCTURE_FILE: &str = "molecule.smi";
const OUTPUT_FILE: &str = "descriptors_output.csv";

/// Configuration for a PaDEL-Descriptor run.
#[derive(Debug, Clone)]
pub struct PadelConfig {
    /// Java launcher.
    pub java: PathBuf,
    pub jar_path: PathBuf,
    /// Descriptor types file naming the descriptor set to compute.
    pub descriptor_types_path: PathBuf,
    pub jvm_args: Vec<String>,
    /// PaDEL flags placed before `-descriptortypes`.
    pub flags: Vec<String>,
    /// Wall-clock bound for one invocation; PaDEL has no timeout of its own.
    pub timeout: Duration,
    /// Parent of the per-run scratch directories (system temp dir if unset).
    pub work_dir: Option<PathBuf>,
    /// Output column that echoes the per-line molecule name.
    pub name_column: String,
}

impl Default for PadelConfig {
    fn default() -> Self {
        Self {
            java: PathBuf::from("java"),
            jar_path: PathBuf::from("./PaDEL-Descriptor/PaDEL-Descriptor.jar"),
            descriptor_types_path: PathBuf::from("./PaDEL-Descriptor/PubchemFingerprinter.xml"),
            jvm_args: vec![
                "-Xms2G".to_string(),
                "-Xmx2G".to_string(),
                "-Djava.awt.headless=true".to_string(),
            ],
            flags: vec![
                "-removesalt".to_string(),
                "-standardizenitro".to_string(),
                "-fingerprints".to_string(),
            ],
            timeout: Duration::from_secs(600),
            work_dir: None,
            name_column: "Name".to_string(),
        }
    }
}

impl PadelConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }
}

/// Scratch directory owned by exactly one invocation.
///
/// Dropping it removes the structure file, the output file and anything else
/// the tool left behind, on every exit path.
struct RunWorkspace {
    dir: TempDir,
    input_dir: PathBuf,
    output_path: PathBuf,
}

impl RunWorkspace {
    fn create(parent: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("padel-run-");
        let dir = match parent {
            Some(p) => builder.tempdir_in(p),
            None => builder.tempdir(),
        }
        .map_err(|e| BioactivityError::tool(format!("cannot create scratch directory: {}", e)))?;

        let input_dir = dir.path().join("input");
        std::fs::create_dir(&input_dir)
            .map_err(|e| BioactivityError::tool(format!("cannot create input directory: {}", e)))?;
        let output_path = dir.path().join(OUTPUT_FILE);

        Ok(Self {
            dir,
            input_dir,
            output_path,
        })
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Wrapper for PaDEL-Descriptor execution.
#[derive(Debug, Clone)]
pub struct PadelDescriptorGenerator {
    config: PadelConfig,
}

impl PadelDescriptorGenerator {
    pub fn new(config: PadelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PadelConfig {
        &self.config
    }

    fn command(&self, ws: &RunWorkspace) -> Command {
        let mut cmd = Command::new(&self.config.java);
        cmd.args(&self.config.jvm_args)
            .arg("-jar")
            .arg(&self.config.jar_path)
            .args(&self.config.flags)
            .arg("-descriptortypes")
            .arg(&self.config.descriptor_types_path)
            .arg("-dir")
            .arg(&ws.input_dir)
            .arg("-file")
            .arg(&ws.output_path)
            .current_dir(ws.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Run the tool to completion or until the timeout fires.
    ///
    /// On timeout the child is killed and reaped before returning. If the
    /// caller drops this future instead, `kill_on_drop` terminates the child.
    async fn run_tool(&self, ws: &RunWorkspace) -> Result<(ExitStatus, String)> {
        let mut cmd = self.command(ws);
        debug!("Descriptor tool command: {:?}", cmd.as_std());

        let mut child = cmd.spawn().map_err(|e| {
            BioactivityError::tool(format!(
                "failed to launch {}: {}",
                self.config.java.display(),
                e
            ))
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let outcome = tokio::time::timeout(self.config.timeout, async {
            tokio::join!(child.wait(), drain(stdout), drain(stderr))
        })
        .await;

        let (status, stdout, stderr) = match outcome {
            Ok(done) => done,
            Err(_) => {
                warn!(
                    "PaDEL-Descriptor exceeded {:?}; terminating pid {:?}",
                    self.config.timeout,
                    child.id()
                );
                if let Err(e) = child.kill().await {
                    warn!("Failed to terminate descriptor tool: {}", e);
                }
                return Err(BioactivityError::DescriptorToolTimeout {
                    timeout: self.config.timeout,
                });
            }
        };

        let status = status
            .map_err(|e| BioactivityError::tool(format!("failed waiting for descriptor tool: {}", e)))?;

        if !stdout.is_empty() {
            debug!("PaDEL-Descriptor stdout:\n{}", String::from_utf8_lossy(&stdout));
        }

        Ok((status, String::from_utf8_lossy(&stderr).into_owned()))
    }
}

async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        if let Err(e) = pipe.read_to_end(&mut buf).await {
            debug!("Stopped reading descriptor tool pipe: {}", e);
        }
    }
    buf
}

#[async_trait]
impl DescriptorGenerator for PadelDescriptorGenerator {
    fn name(&self) -> &str {
        "padel"
    }

    async fn generate(&self, records: &[MoleculeRecord]) -> Result<DescriptorTable> {
        if records.is_empty() {
            return Err(BioactivityError::malformed(None, "no molecules to describe"));
        }

        let structures = write_structure_file(records)?;
        let ws = RunWorkspace::create(self.config.work_dir.as_deref())?;
        debug!("Descriptor run workspace: {:?}", ws.path());

        let structure_path = ws.input_dir.join(STRUCTURE_FILE);
        tokio::fs::write(&structure_path, structures)
            .await
            .map_err(|e| BioactivityError::tool(format!("cannot write {}: {}", STRUCTURE_FILE, e)))?;

        info!("Running PaDEL-Descriptor on {} molecules", records.len());
        let (status, stderr) = self.run_tool(&ws).await?;

        if !status.success() {
            return Err(BioactivityError::DescriptorTool {
                exit_code: status.code(),
                stderr,
                message: "PaDEL-Descriptor exited unsuccessfully".to_string(),
            });
        }

        let bytes = match tokio::fs::read(&ws.output_path).await {
            Ok(b) => b,
            Err(e) => {
                return Err(BioactivityError::DescriptorTool {
                    exit_code: status.code(),
                    stderr,
                    message: format!("output file {} was not produced: {}", OUTPUT_FILE, e),
                });
            }
        };

        let table = read_descriptor_table(&bytes, &self.config.name_column, records)?;
        info!(
            "PaDEL-Descriptor completed: {} rows x {} descriptors",
            table.n_rows(),
            table.n_cols()
        );
        Ok(table)
    }
}
