//! Configuration loading for the bioactivity CLI.
//! Reads bioactivity.toml from the current directory or the path in BIOACTIVITY_CONFIG.
//! A missing default file is not an error; built-in defaults match the usual
//! PaDEL-Descriptor layout.

use anyhow::Context;
use bioactivity_descriptors::PadelConfig;
use bioactivity_pipeline::{ExportOptions, ParserOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "bioactivity.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub resources: ResourcesConfig,
    #[serde(default)]
    pub descriptors: DescriptorsConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcesConfig {
    #[serde(default = "default_schema_path")]
    pub schema_path: PathBuf,
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
}

fn default_schema_path() -> PathBuf { PathBuf::from("descriptor_list.csv") }
fn default_model_path()  -> PathBuf { PathBuf::from("model.json") }

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            schema_path: default_schema_path(),
            model_path: default_model_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptorsConfig {
    #[serde(default = "default_java")]
    pub java: PathBuf,
    #[serde(default = "default_jar_path")]
    pub jar_path: PathBuf,
    #[serde(default = "default_descriptor_types")]
    pub descriptor_types_path: PathBuf,
    #[serde(default = "default_jvm_args")]
    pub jvm_args: Vec<String>,
    #[serde(default = "default_padel_flags")]
    pub flags: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Parent of per-run scratch directories; system temp dir if unset.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
    #[serde(default = "default_name_column")]
    pub name_column: String,
}

fn default_java()             -> PathBuf { PathBuf::from("java") }
fn default_jar_path()         -> PathBuf { PathBuf::from("./PaDEL-Descriptor/PaDEL-Descriptor.jar") }
fn default_descriptor_types() -> PathBuf { PathBuf::from("./PaDEL-Descriptor/PubchemFingerprinter.xml") }
fn default_timeout_secs()     -> u64     { 600 }
fn default_name_column()      -> String  { "Name".to_string() }

fn default_jvm_args() -> Vec<String> {
    vec![
        "-Xms2G".to_string(),
        "-Xmx2G".to_string(),
        "-Djava.awt.headless=true".to_string(),
    ]
}

fn default_padel_flags() -> Vec<String> {
    vec![
        "-removesalt".to_string(),
        "-standardizenitro".to_string(),
        "-fingerprints".to_string(),
    ]
}

impl Default for DescriptorsConfig {
    fn default() -> Self {
        Self {
            java: default_java(),
            jar_path: default_jar_path(),
            descriptor_types_path: default_descriptor_types(),
            jvm_args: default_jvm_args(),
            flags: default_padel_flags(),
            timeout_secs: default_timeout_secs(),
            work_dir: None,
            name_column: default_name_column(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Single ASCII character; `"\t"` for tab-separated uploads.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default = "default_structure_column")]
    pub structure_column: String,
    #[serde(default = "default_identifier_column")]
    pub identifier_column: String,
}

fn default_delimiter()         -> String { ",".to_string() }
fn default_structure_column()  -> String { "canonical_smiles".to_string() }
fn default_identifier_column() -> String { "molecule_chembl_id".to_string() }

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            structure_column: default_structure_column(),
            identifier_column: default_identifier_column(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_export_filename")]
    pub filename: String,
    #[serde(default = "default_value_column")]
    pub value_column: String,
    #[serde(default = "default_export_identifier_column")]
    pub identifier_column: String,
}

fn default_export_filename()          -> String { "prediction.csv".to_string() }
fn default_value_column()             -> String { "pIC50".to_string() }
fn default_export_identifier_column() -> String { "Molecule Name".to_string() }

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            filename: default_export_filename(),
            value_column: default_value_column(),
            identifier_column: default_export_identifier_column(),
        }
    }
}

mod tests;

impl Config {
    /// Load configuration from `path`, or from bioactivity.toml when `None`.
    ///
    /// An explicitly named file must exist. Resource path overrides from the
    /// environment are applied afterwards.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Config file not readable: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Only resource locations can come from the environment.
    pub fn apply_env_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = var("BIOACTIVITY_SCHEMA_PATH").filter(|v| !v.is_empty()) {
            self.resources.schema_path = PathBuf::from(v);
        }
        if let Some(v) = var("BIOACTIVITY_MODEL_PATH").filter(|v| !v.is_empty()) {
            self.resources.model_path = PathBuf::from(v);
        }
        if let Some(v) = var("BIOACTIVITY_DESCRIPTOR_JAR").filter(|v| !v.is_empty()) {
            self.descriptors.jar_path = PathBuf::from(v);
        }
    }

    pub fn padel_config(&self) -> PadelConfig {
        let d = &self.descriptors;
        PadelConfig {
            java: d.java.clone(),
            jar_path: d.jar_path.clone(),
            descriptor_types_path: d.descriptor_types_path.clone(),
            jvm_args: d.jvm_args.clone(),
            flags: d.flags.clone(),
            timeout: Duration::from_secs(d.timeout_secs),
            work_dir: d.work_dir.clone(),
            name_column: d.name_column.clone(),
        }
    }

    pub fn parser_options(&self) -> anyhow::Result<ParserOptions> {
        let delimiter = match self.input.delimiter.as_bytes() {
            [b] if b.is_ascii() => *b,
            _ => anyhow::bail!(
                "input.delimiter must be a single ASCII character, got {:?}",
                self.input.delimiter
            ),
        };
        Ok(ParserOptions {
            delimiter,
            structure_column: self.input.structure_column.clone(),
            identifier_column: self.input.identifier_column.clone(),
        })
    }

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            filename: self.export.filename.clone(),
            identifier_column: self.export.identifier_column.clone(),
            value_column: self.export.value_column.clone(),
        }
    }
}
