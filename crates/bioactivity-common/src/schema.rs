//! The ordered feature set the regression model was fit on.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{BioactivityError, Result};

/// Ordered, duplicate-free list of descriptor names.
///
/// Loaded once per process and shared read-only (behind an `Arc`) by the
/// aligner and the inference engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(BioactivityError::Config(
                "feature schema has no columns".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(BioactivityError::Config(format!(
                    "feature schema column {} has an empty name",
                    i + 1
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(BioactivityError::Config(format!(
                    "feature schema lists column '{}' more than once",
                    name
                )));
            }
        }

        Ok(Self { names })
    }

    /// Read the schema from the header row of a delimited file.
    ///
    /// Data rows, if any, are ignored.
    pub fn from_csv_reader<R: std::io::Read>(reader: R, delimiter: u8) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .from_reader(reader);

        let headers = reader
            .headers()
            .map_err(|e| BioactivityError::Config(format!("unreadable feature schema header: {}", e)))?;

        Self::new(headers.iter().map(|h| h.trim().to_string()))
    }

    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading feature schema from {:?}", path);

        let file = std::fs::File::open(path).map_err(|e| {
            BioactivityError::Config(format!("cannot open feature schema {}: {}", path.display(), e))
        })?;
        let schema = Self::from_csv_reader(file, b',')?;

        info!("Feature schema loaded: {} columns from {:?}", schema.len(), path);
        Ok(schema)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }
}
