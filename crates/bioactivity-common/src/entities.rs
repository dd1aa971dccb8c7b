//! Request-scoped records that flow through the prediction pipeline.
//!
//! Every table here keeps rows in input order. Row position is the only
//! correlation key between stages, because identifiers may repeat.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Molecule
// ---------------------------------------------------------------------------

/// One input row: a structure in structural notation (SMILES) and the
/// caller's identifier for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoleculeRecord {
    pub structure: String,
    pub identifier: String,
}

impl MoleculeRecord {
    pub fn new(structure: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            structure: structure.into(),
            identifier: identifier.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Descriptor table
// ---------------------------------------------------------------------------

/// Descriptor values for one molecule, aligned with `DescriptorTable::columns`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptorRow {
    pub identifier: String,
    pub values: Vec<f64>,
}

/// Full output of the descriptor tool, one row per molecule.
///
/// The column set is whatever the tool version produced; nothing downstream
/// may assume its width.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DescriptorTable {
    pub columns: Vec<String>,
    pub rows: Vec<DescriptorRow>,
}

impl DescriptorTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// (rows, columns), as the tool output would be displayed.
    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows(), self.n_cols())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Value of `column` in row `row`, if both exist.
    pub fn get(&self, row: usize, column: &str) -> Option<f64> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.values.get(idx)).copied()
    }
}

// ---------------------------------------------------------------------------
// Feature matrix
// ---------------------------------------------------------------------------

/// Descriptor table projected onto the feature schema. Row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    identifiers: Vec<String>,
    values: Vec<f64>,
}

impl FeatureMatrix {
    /// Build a matrix from a flat row-major buffer.
    ///
    /// Returns `None` when the buffer length is not `identifiers.len() * columns.len()`.
    pub fn from_flat(columns: Vec<String>, identifiers: Vec<String>, values: Vec<f64>) -> Option<Self> {
        if values.len() != identifiers.len() * columns.len() {
            return None;
        }
        Some(Self {
            columns,
            identifiers,
            values,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    pub fn n_rows(&self) -> usize {
        self.identifiers.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows(), self.n_cols())
    }

    pub fn row(&self, i: usize) -> Option<&[f64]> {
        if i >= self.n_rows() {
            return None;
        }
        let width = self.n_cols();
        Some(&self.values[i * width..(i + 1) * width])
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        // chunks_exact(0) panics; a zero-width matrix yields empty rows instead
        let width = self.n_cols();
        (0..self.n_rows()).map(move |i| &self.values[i * width..(i + 1) * width])
    }

    /// First NaN or infinite cell as (row, column), scanning row by row.
    pub fn first_non_finite(&self) -> Option<(usize, usize)> {
        let width = self.n_cols();
        if width == 0 {
            return None;
        }
        self.values
            .iter()
            .position(|v| !v.is_finite())
            .map(|i| (i / width, i % width))
    }

    /// The flat row-major buffer.
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}

// ---------------------------------------------------------------------------
// Predictions and results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub identifier: String,
    pub predicted_value: f64,
}

/// Joined (identifier, predicted value) table handed to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    pub identifier_column: String,
    pub value_column: String,
    pub rows: Vec<PredictionResult>,
}

impl ResultTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
