//! Result exporter.
//!
//! The result table is written as UTF-8 CSV and carried as standard base64.
//! [`ExportPayload::decode`] is the exact inverse of [`encode_results`].

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bioactivity_common::{
    BioactivityError, MoleculeRecord, PredictionResult, Result, ResultTable, Stage,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const CSV_MEDIA_TYPE: &str = "text/csv; charset=utf-8";
/// Text encoding of the CSV body.
pub const TEXT_ENCODING: &str = "utf-8";
/// Transfer encoding of [`ExportPayload::data`].
pub const TRANSFER_ENCODING: &str = "base64";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOptions {
    pub filename: String,
    pub identifier_column: String,
    pub value_column: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            filename: "prediction.csv".to_string(),
            identifier_column: "Molecule Name".to_string(),
            value_column: "pIC50".to_string(),
        }
    }
}

/// Encoded result table, ready to hand to a download link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportPayload {
    pub media_type: String,
    pub filename: String,
    pub text_encoding: String,
    pub transfer_encoding: String,
    /// Base64 of the UTF-8 CSV bytes.
    pub data: String,
}

impl ExportPayload {
    /// Raw CSV bytes.
    pub fn csv_bytes(&self) -> Result<Vec<u8>> {
        STANDARD.decode(&self.data).map_err(|e| encoding_error(TRANSFER_ENCODING, e))
    }

    /// Reverse [`encode_results`], reproducing the exact result table.
    pub fn decode(&self) -> Result<ResultTable> {
        let bytes = self.csv_bytes()?;
        let text = String::from_utf8(bytes).map_err(|e| encoding_error(TEXT_ENCODING, e))?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(text.as_bytes());

        let headers = reader.headers().map_err(|e| encoding_error(TEXT_ENCODING, e))?;
        if headers.len() != 2 {
            return Err(encoding_error(
                TEXT_ENCODING,
                format!("expected 2 columns, found {}", headers.len()),
            ));
        }
        let identifier_column = headers[0].to_string();
        let value_column = headers[1].to_string();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| encoding_error(TEXT_ENCODING, e))?;
            let value = record[1].parse::<f64>().map_err(|e| {
                encoding_error(TEXT_ENCODING, format!("value '{}': {}", &record[1], e))
            })?;
            rows.push(PredictionResult {
                identifier: record[0].to_string(),
                predicted_value: value,
            });
        }

        Ok(ResultTable {
            identifier_column,
            value_column,
            rows,
        })
    }

    /// `data:` URI for a download link.
    pub fn data_uri(&self) -> String {
        format!(
            "data:{};{},{}",
            self.media_type.replace(' ', ""),
            self.transfer_encoding,
            self.data
        )
    }
}

fn encoding_error(encoding: &'static str, reason: impl std::fmt::Display) -> BioactivityError {
    BioactivityError::ExportEncoding {
        encoding,
        reason: reason.to_string(),
    }
}

/// Join identifiers with predictions by row position.
///
/// Identifiers may repeat, so position is the only valid join key.
pub fn build_result_table(
    records: &[MoleculeRecord],
    predictions: &[PredictionResult],
    options: &ExportOptions,
) -> Result<ResultTable> {
    if records.len() != predictions.len() {
        return Err(BioactivityError::RowCountMismatch {
            stage: Stage::Exporting,
            expected: records.len(),
            actual: predictions.len(),
        });
    }

    let rows = records
        .iter()
        .zip(predictions)
        .map(|(record, prediction)| PredictionResult {
            identifier: record.identifier.clone(),
            predicted_value: prediction.predicted_value,
        })
        .collect();

    Ok(ResultTable {
        identifier_column: options.identifier_column.clone(),
        value_column: options.value_column.clone(),
        rows,
    })
}

/// Serialize `table` to the export payload.
pub fn encode_results(table: &ResultTable, options: &ExportOptions) -> Result<ExportPayload> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([&table.identifier_column, &table.value_column])
        .map_err(|e| encoding_error(TEXT_ENCODING, e))?;

    for (i, row) in table.rows.iter().enumerate() {
        if !row.predicted_value.is_finite() {
            return Err(encoding_error(
                TEXT_ENCODING,
                format!(
                    "row {} ('{}') has non-finite value {}",
                    i + 1,
                    row.identifier,
                    row.predicted_value
                ),
            ));
        }
        if row.identifier.chars().any(char::is_control) {
            return Err(encoding_error(
                TEXT_ENCODING,
                format!("row {} identifier contains a control character", i + 1),
            ));
        }
        // Display for f64 is the shortest text that parses back to the same value.
        let value = row.predicted_value.to_string();
        writer
            .write_record([row.identifier.as_str(), value.as_str()])
            .map_err(|e| encoding_error(TEXT_ENCODING, e))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| encoding_error(TEXT_ENCODING, e.error()))?;
    debug!("Encoded {} result rows into {} CSV bytes", table.len(), bytes.len());

    let payload = ExportPayload {
        media_type: CSV_MEDIA_TYPE.to_string(),
        filename: options.filename.clone(),
        text_encoding: TEXT_ENCODING.to_string(),
        transfer_encoding: TRANSFER_ENCODING.to_string(),
        data: STANDARD.encode(&bytes),
    };
    info!("Export payload ready: {} ({} rows)", payload.filename, table.len());
    Ok(payload)
}
