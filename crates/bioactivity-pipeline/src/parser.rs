//! Molecule table parser.
//!
//! Reads the caller's delimited upload into [`MoleculeRecord`]s. Both columns
//! are looked up by header name (trimmed, ASCII case-insensitive), never by
//! position.

use bioactivity_common::{BioactivityError, MoleculeRecord, Result};
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserOptions {
    pub delimiter: u8,
    pub structure_column: String,
    pub identifier_column: String,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            structure_column: "canonical_smiles".to_string(),
            identifier_column: "molecule_chembl_id".to_string(),
        }
    }
}

fn find_column(headers: &StringRecord, name: &str) -> Option<usize> {
    let name = name.trim();
    headers.iter().position(|h| h.eq_ignore_ascii_case(name))
}

fn csv_error(e: csv::Error) -> BioactivityError {
    let line = e.position().map(|p| p.line());
    let reason = match e.kind() {
        csv::ErrorKind::UnequalLengths {
            expected_len, len, ..
        } => format!("row has {} field(s) but the header has {}", len, expected_len),
        csv::ErrorKind::Utf8 { .. } => "input is not valid UTF-8".to_string(),
        _ => e.to_string(),
    };
    BioactivityError::malformed(line, reason)
}

/// Parse raw tabular bytes into molecule records, in input order.
///
/// Zero data rows is an error, not an empty batch. Duplicate identifiers are
/// kept as independent records.
pub fn parse_molecules(input: &[u8], options: &ParserOptions) -> Result<Vec<MoleculeRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(true)
        .flexible(false)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader.headers().map_err(csv_error)?.clone();
    if headers.len() < 2 {
        return Err(BioactivityError::malformed(
            Some(1),
            format!(
                "header has {} column(s); a structure column and an identifier column are required",
                headers.len()
            ),
        ));
    }

    let found = || headers.iter().collect::<Vec<_>>().join(", ");
    let structure_idx = find_column(&headers, &options.structure_column).ok_or_else(|| {
        BioactivityError::malformed(
            Some(1),
            format!(
                "no structure column '{}' in header (found: {})",
                options.structure_column,
                found()
            ),
        )
    })?;
    let identifier_idx = find_column(&headers, &options.identifier_column).ok_or_else(|| {
        BioactivityError::malformed(
            Some(1),
            format!(
                "no identifier column '{}' in header (found: {})",
                options.identifier_column,
                found()
            ),
        )
    })?;
    if structure_idx == identifier_idx {
        return Err(BioactivityError::malformed(
            Some(1),
            "structure and identifier must be different columns",
        ));
    }
    debug!(
        "Input columns: structure={} identifier={}",
        structure_idx, identifier_idx
    );

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(csv_error)?;
        let line = row.position().map(|p| p.line());

        // Width is enforced by the reader, so both indices are in range.
        let structure = row.get(structure_idx).unwrap_or_default();
        let identifier = row.get(identifier_idx).unwrap_or_default();
        if structure.is_empty() {
            return Err(BioactivityError::malformed(
                line,
                format!("empty structure for identifier '{}'", identifier),
            ));
        }
        records.push(MoleculeRecord::new(structure, identifier));
    }

    if records.is_empty() {
        return Err(BioactivityError::malformed(None, "input table has no data rows"));
    }

    info!("Parsed {} molecules", records.len());
    Ok(records)
}
