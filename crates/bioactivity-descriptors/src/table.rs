//! Structural input file and descriptor output file formats.

use std::collections::HashSet;

use bioactivity_common::{
    BioactivityError, DescriptorRow, DescriptorTable, MoleculeRecord, Result,
};
use tracing::debug;

/// Prefix of the positional key written next to each structure.
const ROW_KEY_PREFIX: &str = "row";

/// Identifiers listed in a "missing rows" error before eliding the rest.
const MAX_LISTED: usize = 10;

pub(crate) fn row_key(index: usize) -> String {
    format!("{}{}", ROW_KEY_PREFIX, index)
}

fn parse_row_key(key: &str) -> Option<usize> {
    key.strip_prefix(ROW_KEY_PREFIX)?.parse().ok()
}

/// Serialize records as a headerless `structure<TAB>name` file.
///
/// The name field the tool sees is `row<N>`, the record's position, and
/// never the caller's identifier. This is a deliberate change to the tool
/// input: PaDEL echoes the name field into its `Name` column, and only a
/// positional key survives reordered output and repeated identifiers.
/// [`read_descriptor_table`] maps the keys back to identifiers.
pub fn write_structure_file(records: &[MoleculeRecord]) -> Result<String> {
    let mut out = String::with_capacity(records.len() * 48);
    for (i, record) in records.iter().enumerate() {
        let structure = record.structure.trim();
        if structure.is_empty() || structure.contains(['\t', '\n', '\r']) {
            return Err(BioactivityError::malformed(
                None,
                format!(
                    "structure for '{}' cannot be written as a single tab-separated field",
                    record.identifier
                ),
            ));
        }
        out.push_str(structure);
        out.push('\t');
        out.push_str(&row_key(i));
        out.push('\n');
    }
    Ok(out)
}

/// Parse the tool's delimited output back into a table in input order.
///
/// `key_column` names the column echoing the per-line key. Every other column
/// is a descriptor and every cell must be numeric.
pub fn read_descriptor_table(
    bytes: &[u8],
    key_column: &str,
    records: &[MoleculeRecord],
) -> Result<DescriptorTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| BioactivityError::tool(format!("unreadable descriptor header: {}", e)))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let key_idx = headers.iter().position(|h| h == key_column).ok_or_else(|| {
        BioactivityError::tool(format!(
            "descriptor output has no '{}' column",
            key_column
        ))
    })?;

    let mut seen = HashSet::with_capacity(headers.len());
    for h in &headers {
        if !seen.insert(h.as_str()) {
            return Err(BioactivityError::tool(format!(
                "descriptor output lists column '{}' more than once",
                h
            )));
        }
    }

    let columns: Vec<String> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != key_idx)
        .map(|(_, h)| h.clone())
        .collect();

    let mut slots: Vec<Option<Vec<f64>>> = vec![None; records.len()];

    for result in reader.records() {
        let record = result
            .map_err(|e| BioactivityError::tool(format!("unreadable descriptor row: {}", e)))?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let key = record.get(key_idx).unwrap_or("").trim();
        let index = parse_row_key(key)
            .filter(|i| *i < records.len())
            .ok_or_else(|| {
                BioactivityError::tool(format!(
                    "descriptor output line {} has unexpected key '{}'",
                    line, key
                ))
            })?;

        if slots[index].is_some() {
            return Err(BioactivityError::tool(format!(
                "descriptor output has more than one row for '{}' (key {})",
                records[index].identifier, key
            )));
        }

        let mut values = Vec::with_capacity(columns.len());
        for (i, cell) in record.iter().enumerate() {
            if i == key_idx {
                continue;
            }
            let cell = cell.trim();
            let value = cell.parse::<f64>().map_err(|_| {
                BioactivityError::tool(format!(
                    "descriptor '{}' for '{}' is not numeric: '{}'",
                    headers[i], records[index].identifier, cell
                ))
            })?;
            values.push(value);
        }
        slots[index] = Some(values);
    }

    let missing: Vec<&str> = slots
        .iter()
        .zip(records)
        .filter(|(slot, _)| slot.is_none())
        .map(|(_, r)| r.identifier.as_str())
        .collect();
    if !missing.is_empty() {
        let mut listed = missing.iter().take(MAX_LISTED).copied().collect::<Vec<_>>().join(", ");
        if missing.len() > MAX_LISTED {
            listed.push_str(", ...");
        }
        return Err(BioactivityError::tool(format!(
            "descriptor output has {} of {} rows; no descriptors for: {}",
            records.len() - missing.len(),
            records.len(),
            listed
        )));
    }

    let rows = slots
        .into_iter()
        .flatten()
        .zip(records)
        .map(|(values, r)| DescriptorRow {
            identifier: r.identifier.clone(),
            values,
        })
        .collect();

    let table = DescriptorTable { columns, rows };
    debug!("Parsed descriptor table with shape {:?}", table.shape());
    Ok(table)
}
