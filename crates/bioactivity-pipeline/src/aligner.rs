//! Feature schema aligner.

use bioactivity_common::{
    BioactivityError, DescriptorTable, FeatureMatrix, FeatureSchema, Result, Stage,
};
use tracing::{debug, info};

/// Project `table` onto `schema`: exactly the schema's columns, in schema
/// order, one row per table row.
///
/// Every schema column absent from the table is reported at once. Missing
/// values are never filled in. Columns outside the schema are dropped.
pub fn align(table: &DescriptorTable, schema: &FeatureSchema) -> Result<FeatureMatrix> {
    let mut indices = Vec::with_capacity(schema.len());
    let mut missing = Vec::new();
    for name in schema.names() {
        match table.column_index(name) {
            Some(idx) => indices.push(idx),
            None => missing.push(name.clone()),
        }
    }
    if !missing.is_empty() {
        return Err(BioactivityError::SchemaMismatch { missing });
    }

    let mut values = Vec::with_capacity(table.n_rows() * indices.len());
    let mut identifiers = Vec::with_capacity(table.n_rows());
    for (i, row) in table.rows.iter().enumerate() {
        if row.values.len() != table.n_cols() {
            return Err(BioactivityError::tool(format!(
                "descriptor row {} has {} value(s) for {} column(s)",
                i + 1,
                row.values.len(),
                table.n_cols()
            )));
        }
        values.extend(indices.iter().map(|&idx| row.values[idx]));
        identifiers.push(row.identifier.clone());
    }

    let dropped = table.n_cols() - indices.len();
    if dropped > 0 {
        debug!("Dropped {} descriptor columns outside the feature schema", dropped);
    }

    let matrix = FeatureMatrix::from_flat(schema.names().to_vec(), identifiers, values).ok_or(
        BioactivityError::RowCountMismatch {
            stage: Stage::FeatureAlignment,
            expected: table.n_rows(),
            actual: 0,
        },
    )?;

    info!("Aligned features: {} x {}", matrix.n_rows(), matrix.n_cols());
    Ok(matrix)
}
